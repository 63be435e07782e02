//! Cisco IOS dialect.
//!
//! Running-config sections are indented and separated by `!` lines:
//!
//! ```text
//! interface GigabitEthernet0/1
//!  description uplink
//!  no shutdown
//! !
//! ```

use std::sync::Arc;

use crate::dialect::{DefaultBehavior, Dialect, SectionGrammar, VendorBehavior};

/// Dialect name for Cisco IOS.
pub const DIALECT_NAME: &str = "cisco_ios";

/// Create the Cisco IOS dialect.
pub fn dialect() -> Dialect {
    let sections = SectionGrammar::new(
        r"^(?P<base>show running-config)(?:\s+(?P<sub>.+))?$",
        "!",
    )
    .unwrap()
    .with_indented_body(true);

    Dialect::new(DIALECT_NAME, r"(?m)^[\w.\-@/:]{1,63}(?:\(config[\w.\-@/:+]{0,32}\))?[>#]")
        .unwrap()
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
        .with_heartbeat("")
        .with_sections(sections)
        .with_behavior(Arc::new(CiscoIosBehavior))
}

/// Cisco IOS-specific behavior.
pub struct CiscoIosBehavior;

impl VendorBehavior for CiscoIosBehavior {
    fn normalize_output(&self, raw: &str, command: &str) -> String {
        // Drop the running-config preamble
        DefaultBehavior
            .normalize_output(raw, command)
            .lines()
            .skip_while(|line| {
                line.starts_with("Building configuration")
                    || line.starts_with("Current configuration")
                    || line.trim().is_empty()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
