//! Whole-response cache for read commands.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use log::trace;

use super::{Cli, Command};
use crate::error::Result;

/// Bounded map from raw command text to its last output.
///
/// Entries are kept in recency order; the least recently used one is
/// evicted when the capacity is exceeded.
#[derive(Debug)]
pub struct ReadCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, String>>,
}

impl ReadCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn get(&self, raw: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let index = entries.get_index_of(raw)?;
        let last = entries.len() - 1;
        entries.move_index(index, last);
        entries.get_index(last).map(|(_, output)| output.clone())
    }

    pub fn insert(&self, raw: &str, output: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.shift_remove(raw);
        entries.insert(raw.to_string(), output.to_string());
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Serves repeated reads from a [`ReadCache`].
pub struct ReadCachingCli<C> {
    inner: C,
    cache: Arc<ReadCache>,
}

impl<C: Cli> ReadCachingCli<C> {
    pub fn new(inner: C, cache: Arc<ReadCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }
}

#[async_trait]
impl<C: Cli> Cli for ReadCachingCli<C> {
    async fn execute_read(&self, command: Command) -> Result<String> {
        if !command.skips_cache() {
            if let Some(output) = self.cache.get(command.raw()) {
                trace!("read cache hit for {:?}", command.raw());
                return Ok(output);
            }
        }

        let raw = command.raw().to_string();
        let output = self.inner.execute_read(command).await?;
        self.cache.insert(&raw, &output);
        Ok(output)
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.inner.execute_write(command).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCli;

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ReadCache::new(2);
        cache.insert("a", "1");
        cache.insert("b", "2");
        assert_eq!(cache.get("a").as_deref(), Some("1"));

        cache.insert("c", "3");
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test]
    async fn test_repeated_reads_hit_cache() {
        let inner = Arc::new(ScriptedCli::new().respond("show version", "1.0"));
        let cli = ReadCachingCli::new(Arc::clone(&inner), Arc::new(ReadCache::new(8)));

        for _ in 0..3 {
            assert_eq!(cli.execute_read(Command::read("show version")).await.unwrap(), "1.0");
        }
        assert_eq!(inner.count("show version"), 1);
    }

    #[tokio::test]
    async fn test_skip_cache_refreshes_entry() {
        let inner = Arc::new(ScriptedCli::new().respond("show version", "1.0"));
        let cli = ReadCachingCli::new(Arc::clone(&inner), Arc::new(ReadCache::new(8)));

        cli.execute_read(Command::read("show version")).await.unwrap();
        inner.set_response("show version", "2.0");

        let fresh = cli
            .execute_read(Command::read("show version").skip_cache())
            .await
            .unwrap();
        assert_eq!(fresh, "2.0");
        assert_eq!(cli.execute_read(Command::read("show version")).await.unwrap(), "2.0");
        assert_eq!(inner.count("show version"), 2);
    }

    #[tokio::test]
    async fn test_writes_and_clear() {
        let inner = Arc::new(ScriptedCli::new());
        let cli = ReadCachingCli::new(Arc::clone(&inner), Arc::new(ReadCache::new(8)));

        cli.execute_read(Command::read("show a")).await.unwrap();
        cli.execute_write(Command::write("hostname x")).await.unwrap();
        assert_eq!(cli.cache().len(), 1);

        cli.cache().clear();
        cli.execute_read(Command::read("show a")).await.unwrap();
        assert_eq!(inner.count("show a"), 2);
    }
}
