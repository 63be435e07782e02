//! Absolute, optionally keyed paths into the device tree.
//!
//! Textual form: `/interfaces/interface[name="0/3"]/config`. Key values are
//! quoted with `"` or `'`, so they may contain `/`. Inside quotes a backslash
//! escapes the next character.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::PathError;

/// Ordered key/value pairs selecting one element of a list.
#[derive(Debug, Clone, Default)]
pub struct Keys(IndexMap<String, String>);

impl Keys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-key shorthand.
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().with(name, value)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Order matters: `[a=1][b=2]` and `[b=2][a=1]` are different paths.
impl PartialEq for Keys {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().eq(other.0.iter())
    }
}

impl Eq for Keys {}

impl Hash for Keys {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, v) in &self.0 {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl fmt::Display for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            let quote = if value.contains('"') && !value.contains('\'') {
                '\''
            } else {
                '"'
            };
            write!(f, "[{}={}", name, quote)?;
            for c in value.chars() {
                if c == quote || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, "{}]", quote)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Keys {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    name: String,
    keys: Option<Keys>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> Option<&Keys> {
        self.keys.as_ref()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(keys) = &self.keys {
            write!(f, "{}", keys)?;
        }
        Ok(())
    }
}

/// An absolute path. The root has no segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, PathError> {
        Parser::new(text).parse()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Name of the last segment; empty for the root.
    pub fn name(&self) -> &str {
        self.last().map(Segment::name).unwrap_or("")
    }

    /// Keys on the last segment.
    pub fn keys(&self) -> Option<&Keys> {
        self.last().and_then(Segment::keys)
    }

    /// Whether any segment carries keys.
    pub fn is_keyed(&self) -> bool {
        self.segments.iter().any(|s| s.keys.is_some())
    }

    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(self.prefix(self.depth() - 1))
    }

    /// The first `depth` segments.
    pub fn prefix(&self, depth: usize) -> Path {
        Path {
            segments: self.segments[..depth.min(self.depth())].to_vec(),
        }
    }

    /// Append an unkeyed segment.
    pub fn child(&self, name: impl Into<String>) -> Path {
        let mut path = self.clone();
        path.segments.push(Segment::new(name));
        path
    }

    /// Append a copy of an existing segment, keys included.
    pub fn child_segment(&self, segment: &Segment) -> Path {
        let mut path = self.clone();
        path.segments.push(segment.clone());
        path
    }

    /// Attach keys to the last segment.
    pub fn with_keys(&self, keys: Keys) -> Result<Path, PathError> {
        let mut path = self.clone();
        let last = path.segments.last_mut().ok_or(PathError::RootKeys)?;
        if last.keys.is_some() {
            return Err(PathError::KeysAlreadySet {
                segment: last.name.clone(),
            });
        }
        last.keys = Some(keys);
        Ok(path)
    }

    /// Keys carried by the segment at `depth` (1-based, matching [`prefix`](Self::prefix)).
    pub fn keys_at(&self, depth: usize) -> Option<&Keys> {
        depth
            .checked_sub(1)
            .and_then(|i| self.segments.get(i))
            .and_then(Segment::keys)
    }

    /// Keys of the segment in `self` that corresponds to the last segment of `list`.
    ///
    /// `list` is matched by segment names only.
    pub fn keys_for(&self, list: &Path) -> Option<&Keys> {
        if self.unkeyed().prefix(list.depth()) != list.unkeyed() {
            return None;
        }
        self.keys_at(list.depth())
    }

    /// Same path with every key removed.
    pub fn unkeyed(&self) -> Path {
        Path {
            segments: self
                .segments
                .iter()
                .map(|s| Segment::new(s.name.clone()))
                .collect(),
        }
    }

    /// Every ancestor from the root down to, and including, this path.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (0..=self.depth()).map(|depth| self.prefix(depth))
    }

    /// Whether `self` is `other` or one of its ancestors, comparing names only.
    pub fn contains(&self, other: &Path) -> bool {
        self.depth() <= other.depth()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.name == b.name)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::Malformed {
            path: self.text.to_string(),
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<Path, PathError> {
        if !self.text.starts_with('/') {
            return Err(PathError::NotAbsolute(self.text.to_string()));
        }
        if self.text == "/" {
            return Ok(Path::root());
        }

        let mut segments = Vec::new();
        while self.chars.next().is_some() {
            segments.push(self.segment()?);
        }
        Ok(Path { segments })
    }

    /// Parse one segment; the leading `/` has been consumed.
    fn segment(&mut self) -> Result<Segment, PathError> {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '/' || c == '[' {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error("empty segment"));
        }

        let mut keys: Option<Keys> = None;
        while let Some(&(_, '[')) = self.chars.peek() {
            self.chars.next();
            let (key, value) = self.key_value()?;
            let keys = keys.get_or_insert_with(Keys::new);
            if keys.get(&key).is_some() {
                return Err(self.error(format!("duplicate key '{}'", key)));
            }
            keys.insert(key, value);
        }

        match self.chars.peek() {
            None | Some(&(_, '/')) => Ok(Segment { name, keys }),
            Some(&(i, c)) => Err(self.error(format!("unexpected '{}' at {}", c, i))),
        }
    }

    /// Parse `name=value]`; the `[` has been consumed.
    fn key_value(&mut self) -> Result<(String, String), PathError> {
        let mut key = String::new();
        loop {
            match self.chars.next() {
                Some((_, '=')) => break,
                Some((_, c)) if c != ']' && c != '[' => key.push(c),
                _ => return Err(self.error("expected '=' in key")),
            }
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(self.error("empty key name"));
        }

        let mut value = String::new();
        match self.chars.peek() {
            Some(&(_, q)) if q == '"' || q == '\'' => {
                self.chars.next();
                loop {
                    match self.chars.next() {
                        Some((_, '\\')) => match self.chars.next() {
                            Some((_, c)) => value.push(c),
                            None => return Err(self.error("unterminated quote")),
                        },
                        Some((_, c)) if c == q => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(self.error("unterminated quote")),
                    }
                }
                match self.chars.next() {
                    Some((_, ']')) => {}
                    _ => return Err(self.error("expected ']' after key value")),
                }
            }
            _ => loop {
                match self.chars.next() {
                    Some((_, ']')) => break,
                    Some((_, c)) => value.push(c),
                    None => return Err(self.error("unterminated key")),
                }
            },
        }

        Ok((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = Path::parse("/interfaces/interface[name='0/3']/config").unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.segments()[1].keys().unwrap().get("name"), Some("0/3"));
        assert_eq!(path.to_string(), "/interfaces/interface[name=\"0/3\"]/config");
        assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_key_value_with_both_quotes_round_trips() {
        let keys = Keys::single("description", r#"it's "up" \ ok"#);
        let path = Path::parse("/interfaces/interface")
            .unwrap()
            .with_keys(keys.clone())
            .unwrap();

        let text = path.to_string();
        assert_eq!(text, r#"/interfaces/interface[description="it's \"up\" \\ ok"]"#);
        assert_eq!(Path::parse(&text).unwrap().segments()[1].keys(), Some(&keys));

        let single = Keys::single("name", r#"say "hi""#);
        assert_eq!(single.to_string(), r#"[name='say "hi"']"#);
    }

    #[test]
    fn test_root() {
        let root = Path::parse("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.to_string(), "/");
        assert!(root.parent().is_none());
        assert_eq!(root, Path::root());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Path::parse("interfaces"),
            Err(PathError::NotAbsolute(_))
        ));
        for bad in [
            "/interfaces/",
            "//x",
            "/a[k=\"v\"",
            "/a[=v]",
            "/a[k=v][k=w]",
            "/a[k='v']x",
        ] {
            assert!(
                matches!(Path::parse(bad), Err(PathError::Malformed { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_multiple_keys_keep_order() {
        let path = Path::parse("/acl/entry[set=\"in\"][seq=10]").unwrap();
        let keys: Vec<_> = path.keys().unwrap().iter().collect();
        assert_eq!(keys, vec![("set", "in"), ("seq", "10")]);
    }

    #[test]
    fn test_keys_cannot_be_reattached() {
        let path = Path::parse("/interfaces/interface").unwrap();
        let keyed = path.with_keys(Keys::single("id", "1")).unwrap();
        assert_eq!(keyed.to_string(), "/interfaces/interface[id=\"1\"]");
        assert_eq!(
            keyed.with_keys(Keys::single("id", "2")),
            Err(PathError::KeysAlreadySet {
                segment: "interface".to_string()
            })
        );
        assert_eq!(Path::root().with_keys(Keys::new()), Err(PathError::RootKeys));
    }

    #[test]
    fn test_unkeyed_and_ancestors() {
        let path = Path::parse("/interfaces/interface[id=\"1\"]/config").unwrap();
        assert_eq!(path.unkeyed().to_string(), "/interfaces/interface/config");
        assert!(path.is_keyed());
        assert!(!path.unkeyed().is_keyed());

        let ancestors: Vec<String> = path.unkeyed().ancestors().map(|p| p.to_string()).collect();
        assert_eq!(
            ancestors,
            vec!["/", "/interfaces", "/interfaces/interface", "/interfaces/interface/config"]
        );
    }

    #[test]
    fn test_keys_for_and_contains() {
        let path = Path::parse("/interfaces/interface[id=\"1\"]/config").unwrap();
        let list = Path::parse("/interfaces/interface").unwrap();
        assert_eq!(path.keys_for(&list).unwrap().get("id"), Some("1"));
        assert!(list.contains(&path));
        assert!(!path.contains(&list));
        assert!(path.keys_for(&Path::parse("/vlans/vlan").unwrap()).is_none());
    }
}
