// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::fmt;
use std::str::FromStr;

use super::{Error, Result};

/// The set of configurable log levels, mapping onto the [slog] levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Only log critical failures.
    Critical,
    /// Log errors and above.
    Error,
    /// Log warnings and above.
    Warning,
    /// Log informational messages and above.
    Info,
    /// Log debugging messages and above.
    Debug,
    /// Log everything.
    Trace,
}

impl Level {
    /// Convert this level into its [slog::Level] equivalent.
    pub fn to_slog(self) -> slog::Level {
        match self {
            Self::Critical => slog::Level::Critical,
            Self::Error => slog::Level::Error,
            Self::Warning => slog::Level::Warning,
            Self::Info => slog::Level::Info,
            Self::Debug => slog::Level::Debug,
            Self::Trace => slog::Level::Trace,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        write!(f, "{}", level)
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "crit" | "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(Error::InvalidLevel {
                level: s.to_string(),
            }),
        }
    }
}
