//! Command values submitted to the cli stack.

use std::fmt;

/// Whether a command reads from or mutates the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Read,
    Write,
}

/// A single command for the device.
///
/// Two read commands with the same raw text are interchangeable as far as
/// caching is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    raw: String,
    kind: CommandKind,
    skip_cache: bool,
}

impl Command {
    /// Create a read command.
    pub fn read(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            kind: CommandKind::Read,
            skip_cache: false,
        }
    }

    /// Create a write command.
    pub fn write(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            kind: CommandKind::Write,
            skip_cache: false,
        }
    }

    /// Bypass every cache layer for this command.
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn is_write(&self) -> bool {
        self.kind == CommandKind::Write
    }

    pub fn skips_cache(&self) -> bool {
        self.skip_cache
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
