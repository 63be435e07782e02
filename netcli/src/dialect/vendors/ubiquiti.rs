//! Ubiquiti EdgeSwitch dialect.
//!
//! # Prompt Examples
//!
//! ```text
//! (UBNT) >                  # exec
//! (UBNT) #                  # privileged
//! (UBNT) (Config)#          # configuration
//! (UBNT) (Interface 0/1)#   # interface configuration
//! ```
//!
//! # Running config
//!
//! Section bodies are not indented; every section is closed by `exit` at
//! column zero:
//!
//! ```text
//! interface 0/1
//! description 'uplink'
//! vlan pvid 2
//! exit
//! ```

use crate::dialect::{Dialect, SectionGrammar};

/// Dialect name for Ubiquiti EdgeSwitch.
pub const DIALECT_NAME: &str = "ubiquiti";

/// Create the Ubiquiti EdgeSwitch dialect.
pub fn dialect() -> Dialect {
    let sections = SectionGrammar::new(
        r"^(?P<base>show running-config)(?:\s+(?P<sub>.+))?$",
        "exit",
    )
    .unwrap()
    .with_header(r"^(?:interface|vlan database|line|router|ip access-list|class-map|policy-map)\b")
    .unwrap();

    Dialect::new(DIALECT_NAME, r"\([\w.\-]+\) (?:\([\w./\- ]+\))?\s?[>#]")
        .unwrap()
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("An invalid")
        .with_failure_pattern("Command not found")
        .with_failure_pattern("ERROR:")
        .with_on_open_command("terminal length 0")
        .with_heartbeat("")
        .with_sections(sections)
}
