// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0-only

use std::result;

use thiserror::Error;

/// Custom Result wrapper to simplify usage.
pub type Result<T> = result::Result<T, Error>;

/// Represents bus submission related errors.
#[derive(Error, Debug)]
pub enum Error {
    /// An error which occurs when a message is put with an empty kind,
    /// kinds must be non-empty strings.
    #[error("the message kind must be a non-empty string")]
    EmptyKind,
}
