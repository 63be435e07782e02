//! Section grammar for "dump" commands.
//!
//! A dump command (e.g. `show running-config`) prints many logical sections
//! at once. The grammar recognizes dump commands with an optional subcommand
//! suffix (`show running-config interface 0/1`) and splits a dump's output into
//! sections keyed by their tokenized header line.
//!
//! A section opens at a line indented exactly `indent_level` times with
//! `indent_char`. It closes at the first line at the same level equal to the
//! terminator (inclusive). When `indented_body` is set, any other non-blank
//! line at or above the section's level closes it too (exclusive), which suits
//! dialects that indent section bodies.

use log::debug;
use regex::Regex;

/// A dump command split into its base and subcommand tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedCommand {
    /// The dump command that produces the full output.
    pub base: String,

    /// Tokenized subcommand path; empty for the bare dump command.
    pub tokens: Vec<String>,
}

impl ParsedCommand {
    /// Whether this is the bare dump command.
    pub fn is_dump(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Dialect rules for recognizing dump commands and splitting their output.
#[derive(Debug, Clone)]
pub struct SectionGrammar {
    /// Matches dump commands; needs a `base` group and an optional `sub` group.
    dump_pattern: Regex,

    /// Character used for indentation.
    indent_char: char,

    /// Indentation level at which sections start.
    indent_level: usize,

    /// Line closing a section.
    terminator: String,

    /// Restricts which lines may open a section.
    header: Option<Regex>,

    /// Section bodies are indented deeper than the header.
    indented_body: bool,
}

impl SectionGrammar {
    /// Create a grammar from a dump pattern and section terminator.
    pub fn new(dump_pattern: &str, terminator: impl Into<String>) -> Result<Self, regex::Error> {
        let dump_pattern = Regex::new(dump_pattern)?;
        if !dump_pattern.capture_names().flatten().any(|n| n == "base") {
            return Err(regex::Error::Syntax(
                "dump pattern needs a named group 'base'".to_string(),
            ));
        }

        Ok(Self {
            dump_pattern,
            indent_char: ' ',
            indent_level: 0,
            terminator: terminator.into(),
            header: None,
            indented_body: false,
        })
    }

    /// Set the indentation character and the level sections start at.
    pub fn with_indent(mut self, indent_char: char, level: usize) -> Self {
        self.indent_char = indent_char;
        self.indent_level = level;
        self
    }

    /// Only lines matching `pattern` open sections.
    pub fn with_header(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.header = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Treat any line at or above the section level as the end of a section.
    pub fn with_indented_body(mut self, indented: bool) -> Self {
        self.indented_body = indented;
        self
    }

    /// The section terminator.
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    /// Classify a command. Returns `None` for anything that is not a dump command.
    pub fn parse_command(&self, raw: &str) -> Option<ParsedCommand> {
        let raw = raw.trim();
        let caps = self.dump_pattern.captures(raw)?;
        let base = caps.name("base")?.as_str().trim().to_string();
        let tokens = caps
            .name("sub")
            .map(|sub| tokenize(sub.as_str()))
            .unwrap_or_default();

        Some(ParsedCommand { base, tokens })
    }

    /// Tokenize a subcommand or header line into path tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize(text)
    }

    /// Split dump output into `(tokens, section text)` pairs in output order.
    ///
    /// Section text is a slice of `output` from the start of the header line
    /// to the end of the last section line, without its line break.
    pub fn split_sections<'a>(&self, output: &'a str) -> Vec<(Vec<String>, &'a str)> {
        let mut sections = Vec::new();
        let mut current: Option<(Vec<String>, usize)> = None;
        let mut offset = 0;

        for line in output.split_inclusive('\n') {
            let start = offset;
            offset += line.len();

            let content = line.trim_end_matches(['\r', '\n']);
            if content.trim().is_empty() {
                continue;
            }

            let indent = self.indent_of(content);
            let text = content.trim();

            if let Some((key, section_start)) = current.take() {
                if indent == self.indent_level && text == self.terminator {
                    sections.push((key, trim_break(&output[section_start..offset])));
                    continue;
                }
                if !self.indented_body || indent > self.indent_level {
                    current = Some((key, section_start));
                    continue;
                }
                // Dedented line ends the section and may open the next one
                sections.push((key, trim_break(&output[section_start..start])));
            }

            if indent == self.indent_level && text != self.terminator && self.opens_section(text) {
                current = Some((tokenize(text), start));
            }
        }

        if let Some((key, section_start)) = current {
            if self.indented_body {
                sections.push((key, trim_break(&output[section_start..])));
            } else {
                debug!("discarding unterminated section {:?}", key);
            }
        }

        sections
    }

    /// Indentation level of a line; other leading whitespace counts as deeper.
    fn indent_of(&self, line: &str) -> usize {
        let rest = line.trim_start_matches(self.indent_char);
        let level = (line.len() - rest.len()) / self.indent_char.len_utf8();
        if rest.starts_with(char::is_whitespace) {
            level + 1
        } else {
            level
        }
    }

    fn opens_section(&self, text: &str) -> bool {
        self.header.as_ref().is_none_or(|header| header.is_match(text))
    }
}

fn trim_break(section: &str) -> &str {
    section.trim_end_matches(['\r', '\n'])
}

/// Split on whitespace, keeping quoted runs together and dropping the quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut quoted = false;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                quoted = true;
            }
            None if c.is_whitespace() => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                    quoted = false;
                }
            }
            None => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminated() -> SectionGrammar {
        SectionGrammar::new(
            r"^(?P<base>show running-config)(?:\s+(?P<sub>.+))?$",
            "exit",
        )
        .unwrap()
        .with_header(r"^(?:interface|vlan database)\b")
        .unwrap()
    }

    fn indented() -> SectionGrammar {
        SectionGrammar::new(
            r"^(?P<base>show running-config)(?:\s+(?P<sub>.+))?$",
            "!",
        )
        .unwrap()
        .with_indented_body(true)
    }

    #[test]
    fn test_dump_pattern_needs_base_group() {
        assert!(SectionGrammar::new(r"^show run$", "exit").is_err());
    }

    #[test]
    fn test_parse_command() {
        let grammar = terminated();

        let parsed = grammar
            .parse_command("show running-config interface 0/1")
            .unwrap();
        assert_eq!(parsed.base, "show running-config");
        assert_eq!(parsed.tokens, vec!["interface", "0/1"]);

        let parsed = grammar.parse_command("show running-config").unwrap();
        assert!(parsed.is_dump());

        assert!(grammar.parse_command("show interfaces status").is_none());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"description "uplink to core"  mtu 1500"#),
            vec!["description", "uplink to core", "mtu", "1500"]
        );
        assert_eq!(tokenize("name ''"), vec!["name", ""]);
    }

    #[test]
    fn test_split_terminated_sections() {
        let output = "hostname \"UBNT\"\n\
                      interface 0/1\n\
                      description 'uplink'\n\
                      exit\n\
                      \n\
                      interface 0/2\n\
                      shutdown\n\
                      exit\n";
        let sections = terminated().split_sections(output);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, vec!["interface", "0/1"]);
        assert_eq!(sections[0].1, "interface 0/1\ndescription 'uplink'\nexit");
        assert_eq!(sections[1].0, vec!["interface", "0/2"]);
        assert_eq!(sections[1].1, "interface 0/2\nshutdown\nexit");
    }

    #[test]
    fn test_unterminated_section_is_dropped() {
        let output = "interface 0/1\ndescription 'x'\nexit\ninterface 0/2\nshutdown\n";
        let sections = terminated().split_sections(output);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, vec!["interface", "0/1"]);
    }

    #[test]
    fn test_split_indented_sections() {
        let output = "hostname R1\n\
                      !\n\
                      interface GigabitEthernet0/1\n \
                      description uplink\n \
                      no shutdown\n\
                      !\n\
                      router ospf 1\n \
                      network 10.0.0.0 0.0.0.255 area 0\n\
                      line vty 0 4\n \
                      login\n";
        let sections = indented().split_sections(output);

        let keys: Vec<_> = sections.iter().map(|(k, _)| k.join(" ")).collect();
        assert_eq!(
            keys,
            vec![
                "hostname R1",
                "interface GigabitEthernet0/1",
                "router ospf 1",
                "line vty 0 4"
            ]
        );
        assert_eq!(sections[0].1, "hostname R1\n!");
        assert_eq!(
            sections[1].1,
            "interface GigabitEthernet0/1\n description uplink\n no shutdown\n!"
        );
        assert_eq!(
            sections[2].1,
            "router ospf 1\n network 10.0.0.0 0.0.0.255 area 0"
        );
        assert_eq!(sections[3].1, "line vty 0 4\n login");
    }

    #[test]
    fn test_nested_indent_level() {
        let grammar = indented().with_indent(' ', 1);
        let output = "router bgp 1\n neighbor 1.1.1.1\n  remote-as 2\n neighbor 2.2.2.2\n  remote-as 3\n";
        let sections = grammar.split_sections(output);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, vec!["neighbor", "1.1.1.1"]);
        assert_eq!(sections[0].1, " neighbor 1.1.1.1\n  remote-as 2");
    }
}
