//! Prompt pattern helpers.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Patterns without an explicit end anchor are anchored to the end of the
/// buffer (allowing trailing whitespace), since a prompt is only meaningful
/// as the last thing the device printed.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}
