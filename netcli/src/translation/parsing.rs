//! Helpers for pulling values out of command output.

use std::str::FromStr;

use memchr::memchr_iter;
use regex::Regex;

use super::Keys;
use crate::error::SerializationError;

/// Non-blank lines of `output`, without line endings.
pub fn parse_lines(output: &str) -> impl Iterator<Item = &str> {
    let bytes = output.as_bytes();
    let mut start = 0;
    memchr_iter(b'\n', bytes)
        .chain(std::iter::once(bytes.len()))
        .filter_map(move |end| {
            let line = output.get(start..end)?;
            start = end + 1;
            let line = line.trim_end_matches('\r');
            (!line.trim().is_empty()).then_some(line)
        })
}

/// Capture `group` of the first match of `pattern` in `output`.
pub fn extract_value<'a>(output: &'a str, pattern: &Regex, group: &str) -> Option<&'a str> {
    pattern
        .captures(output)?
        .name(group)
        .map(|m| m.as_str().trim())
}

/// Like [`extract_value`], converted to `T`.
///
/// No match is `Ok(None)`; a match that does not convert is an error.
pub fn parse_leaf<T: FromStr>(
    output: &str,
    pattern: &Regex,
    group: &str,
) -> Result<Option<T>, SerializationError> {
    let Some(value) = extract_value(output, pattern, group) else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|_| SerializationError::InvalidValue {
            value: value.to_string(),
            target: std::any::type_name::<T>(),
        })
}

/// One [`Keys`] per line where `pattern` matches, keyed `key_name`.
pub fn parse_keys(output: &str, pattern: &Regex, group: &str, key_name: &str) -> Vec<Keys> {
    parse_lines(output)
        .filter_map(|line| extract_value(line, pattern, group))
        .map(|value| Keys::single(key_name, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIEF: &str = "Interface  Name   Status\r\n\
                         ---------  -----  ------\r\n\
                         0/1        uplink Up\r\n\
                         \r\n\
                         0/2               Down\r\n";

    #[test]
    fn test_parse_lines_skips_blank() {
        let lines: Vec<_> = parse_lines(BRIEF).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "0/1        uplink Up");
        assert_eq!(parse_lines("").count(), 0);
        assert_eq!(parse_lines("no newline").collect::<Vec<_>>(), vec!["no newline"]);
    }

    #[test]
    fn test_parse_keys() {
        let pattern = Regex::new(r"^(?P<id>\d+/\d+)\s").unwrap();
        let keys = parse_keys(BRIEF, &pattern, "id", "name");
        assert_eq!(keys, vec![Keys::single("name", "0/1"), Keys::single("name", "0/2")]);
    }

    #[test]
    fn test_parse_leaf() {
        let pattern = Regex::new(r"(?m)^mtu (?P<mtu>\S+)$").unwrap();
        assert_eq!(parse_leaf::<u32>("description x\nmtu 1500", &pattern, "mtu"), Ok(Some(1500)));
        assert_eq!(parse_leaf::<u32>("description x", &pattern, "mtu"), Ok(None));
        assert!(matches!(
            parse_leaf::<u32>("mtu jumbo", &pattern, "mtu"),
            Err(SerializationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_extract_value_trims() {
        let pattern = Regex::new(r"description (?P<d>.+)").unwrap();
        assert_eq!(extract_value("description uplink  \n", &pattern, "d"), Some("uplink"));
    }
}
