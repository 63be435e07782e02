//! Per-device dialects.
//!
//! A [`Dialect`] bundles everything that differs between vendors: the
//! prompt, failure markers, commands run at session start, the heartbeat
//! command and the grammar used to split "dump" command output into
//! sections. Dialects are plain immutable values handed to each session at
//! construction; there is no process-wide table of them.

mod section;
pub mod vendors;

pub use section::{ParsedCommand, SectionGrammar};

use std::fmt;
use std::sync::Arc;

use regex::bytes::Regex;

use crate::channel::compile_prompt_pattern;

/// Hooks for vendor-specific output handling.
pub trait VendorBehavior: Send + Sync {
    /// Normalize command output (strip command echo and line-ending noise).
    ///
    /// `raw` has already had the trailing prompt removed.
    fn normalize_output(&self, raw: &str, command: &str) -> String {
        DefaultBehavior.normalize_output(raw, command)
    }

    /// Detect command failure from normalized output.
    fn detect_failure(&self, _output: &str) -> Option<String> {
        None
    }
}

/// Default vendor behavior implementation.
pub struct DefaultBehavior;

impl VendorBehavior for DefaultBehavior {
    fn normalize_output(&self, raw: &str, command: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "");

        // Strip command echo from the beginning
        let text = text.trim_start_matches('\n');
        let text = match text.strip_prefix(command.trim()) {
            Some(rest) if rest.is_empty() || rest.starts_with('\n') => rest,
            _ => text,
        };

        text.trim_start_matches('\n').trim_end().to_string()
    }
}

/// Everything vendor-specific a session needs.
#[derive(Clone)]
pub struct Dialect {
    /// Dialect name (e.g., "ubiquiti", "cisco_ios").
    pub name: String,

    /// Pattern matching the device prompt at the end of the output.
    pub prompt: Regex,

    /// Substrings that mark command output as a failure.
    pub failed_when_contains: Vec<String>,

    /// Commands to run once the first prompt has been seen.
    pub on_open_commands: Vec<String>,

    /// Command sent to keep an idle session alive.
    pub heartbeat_command: String,

    /// Section grammar for dump commands. `None` disables the section cache.
    pub sections: Option<SectionGrammar>,

    /// Optional vendor-specific behavior.
    pub behavior: Option<Arc<dyn VendorBehavior>>,
}

impl Dialect {
    /// Create a dialect with a name and prompt pattern.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: compile_prompt_pattern(prompt)?,
            failed_when_contains: vec![],
            on_open_commands: vec![],
            heartbeat_command: String::new(),
            sections: None,
            behavior: None,
        })
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set the heartbeat command.
    pub fn with_heartbeat(mut self, command: impl Into<String>) -> Self {
        self.heartbeat_command = command.into();
        self
    }

    /// Set the section grammar used by the section cache.
    pub fn with_sections(mut self, grammar: SectionGrammar) -> Self {
        self.sections = Some(grammar);
        self
    }

    /// Set vendor behavior.
    pub fn with_behavior(mut self, behavior: Arc<dyn VendorBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// The behavior to use, falling back to [`DefaultBehavior`].
    pub fn behavior(&self) -> Arc<dyn VendorBehavior> {
        self.behavior
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultBehavior))
    }

    /// First failure marker contained in `output`, if any.
    pub fn failure_in(&self, output: &str) -> Option<String> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .cloned()
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("prompt", &self.prompt.as_str())
            .field("failed_when_contains", &self.failed_when_contains)
            .field("on_open_commands", &self.on_open_commands)
            .field("heartbeat_command", &self.heartbeat_command)
            .field("sections", &self.sections)
            .field(
                "behavior",
                &self.behavior.as_ref().map(|_| "<VendorBehavior>"),
            )
            .finish()
    }
}
