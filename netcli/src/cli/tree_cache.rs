//! Section cache for dump commands.
//!
//! Reading `show running-config interface 0/3` on a device that can print
//! its entire configuration in one go is wasteful: the section is already
//! part of `show running-config`. [`TreeCache`] keeps the last dump output
//! split into sections and [`TreeCacheCli`] answers narrower reads from it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::Mutex;

use super::{Cli, Command};
use crate::dialect::{ParsedCommand, SectionGrammar};
use crate::error::Result;

type Sections = HashMap<Vec<String>, String>;

/// Parsed sections of dump command output, per base command.
///
/// A base's sections are only ever replaced wholesale by [`update`](Self::update).
#[derive(Debug)]
pub struct TreeCache {
    grammar: SectionGrammar,
    sections: RwLock<HashMap<String, Sections>>,
}

impl TreeCache {
    pub fn new(grammar: SectionGrammar) -> Self {
        Self {
            grammar,
            sections: RwLock::new(HashMap::new()),
        }
    }

    pub fn grammar(&self) -> &SectionGrammar {
        &self.grammar
    }

    /// Classify a command. `None` means the cache does not apply.
    pub fn parse_command(&self, raw: &str) -> Option<ParsedCommand> {
        self.grammar.parse_command(raw)
    }

    /// Replace the sections of `base` with those parsed from `output`.
    ///
    /// The first section with a given key wins. Returns the number of sections stored.
    pub fn update(&self, base: &str, output: &str) -> usize {
        let mut parsed = Sections::new();
        for (key, text) in self.grammar.split_sections(output) {
            parsed.entry(key).or_insert_with(|| text.to_string());
        }

        let count = parsed.len();
        self.sections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(base.to_string(), parsed);

        debug!("cached {} sections for '{}'", count, base);
        count
    }

    /// Exact lookup of a section by its tokens.
    pub fn get_section(&self, command: &ParsedCommand) -> Option<String> {
        self.sections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&command.base)?
            .get(&command.tokens)
            .cloned()
    }

    /// Whether nothing is cached for `base`.
    pub fn is_empty(&self, base: &str) -> bool {
        self.sections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(base)
            .is_none_or(|sections| sections.is_empty())
    }

    /// Drop every cached section.
    pub fn clear(&self) {
        self.sections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        trace!("section cache cleared");
    }
}

/// Answers section reads from a [`TreeCache`].
///
/// Writes and commands that are not dump commands pass straight through.
/// Running the bare dump command refreshes the cache with its output.
pub struct TreeCacheCli<C> {
    inner: C,
    cache: Arc<TreeCache>,
    populate: Mutex<()>,
}

impl<C: Cli> TreeCacheCli<C> {
    pub fn new(inner: C, cache: Arc<TreeCache>) -> Self {
        Self {
            inner,
            cache,
            populate: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    async fn read_section(&self, command: Command, parsed: ParsedCommand) -> Result<String> {
        if let Some(section) = self.cache.get_section(&parsed) {
            trace!("section cache hit for {:?}", command.raw());
            return Ok(section);
        }

        if self.cache.is_empty(&parsed.base) {
            {
                let _populating = self.populate.lock().await;
                if self.cache.is_empty(&parsed.base) {
                    let dump = self
                        .inner
                        .execute_read(Command::read(parsed.base.clone()))
                        .await?;
                    self.cache.update(&parsed.base, &dump);
                }
            }

            if let Some(section) = self.cache.get_section(&parsed) {
                return Ok(section);
            }
            debug!("no section for {:?} after refresh, running it", command.raw());
        } else {
            debug!("no cached section for {:?}, running it", command.raw());
        }

        self.inner.execute_read(command).await
    }
}

#[async_trait]
impl<C: Cli> Cli for TreeCacheCli<C> {
    async fn execute_read(&self, command: Command) -> Result<String> {
        if command.skips_cache() {
            return self.inner.execute_read(command).await;
        }

        match self.cache.parse_command(command.raw()) {
            Some(parsed) if parsed.is_dump() => {
                let output = self.inner.execute_read(command).await?;
                self.cache.update(&parsed.base, &output);
                Ok(output)
            }
            Some(parsed) => self.read_section(command, parsed).await,
            None => self.inner.execute_read(command).await,
        }
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.inner.execute_write(command).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
