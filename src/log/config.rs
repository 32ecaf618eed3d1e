// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use super::Level;

/// Log handler configuration used to construct a root logger.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The minimum level to actually emit.
    pub level: Level,
    /// Emit structured JSON instead of human readable terminal output.
    pub json: bool,
}
