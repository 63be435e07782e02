//! Writer registry: applies a diff through path-scoped writers in
//! dependency order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, info};

use super::{DeviceAccess, Path, Schema, TreeValue};
use crate::error::{Result, WriterError, WriterRegistryError};

/// Pushes changes of one node to the device.
///
/// `path` is the concrete path of the changed value, keys included.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn create(&self, path: &Path, after: &TreeValue, device: &DeviceAccess) -> Result<()>;

    async fn update(
        &self,
        path: &Path,
        _before: &TreeValue,
        _after: &TreeValue,
        _device: &DeviceAccess,
    ) -> Result<()> {
        Err(WriterError::Unsupported {
            path: path.to_string(),
            message: "update not implemented".to_string(),
        }
        .into())
    }

    async fn delete(&self, path: &Path, before: &TreeValue, device: &DeviceAccess) -> Result<()>;
}

/// One change to one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create { after: TreeValue },
    Update { before: TreeValue, after: TreeValue },
    Delete { before: TreeValue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub path: Path,
    pub change: Change,
}

/// Pending changes grouped by writer path.
///
/// Entries are grouped under their path with keys removed and keep
/// insertion order within a group.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    entries: IndexMap<Path, Vec<DiffEntry>>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: Path, change: Change) {
        self.entries
            .entry(path.unkeyed())
            .or_default()
            .push(DiffEntry { path, change });
    }

    pub fn create(mut self, path: Path, after: impl Into<TreeValue>) -> Self {
        self.push(path, Change::Create { after: after.into() });
        self
    }

    pub fn update(
        mut self,
        path: Path,
        before: impl Into<TreeValue>,
        after: impl Into<TreeValue>,
    ) -> Self {
        self.push(
            path,
            Change::Update {
                before: before.into(),
                after: after.into(),
            },
        );
        self
    }

    pub fn delete(mut self, path: Path, before: impl Into<TreeValue>) -> Self {
        self.push(path, Change::Delete { before: before.into() });
        self
    }

    /// Entries for a writer path; keys in `path` are ignored.
    pub fn get(&self, path: &Path) -> &[DiffEntry] {
        self.entries
            .get(&path.unkeyed())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[DiffEntry])> {
        self.entries
            .iter()
            .map(|(path, entries)| (path, entries.as_slice()))
    }
}

struct Registration {
    text: String,
    writer: Arc<dyn Writer>,
    dependencies: Vec<String>,
}

/// Collects writers and their dependencies and builds a [`WriterRegistry`].
#[derive(Default)]
pub struct WriterRegistryBuilder {
    schema: Option<Arc<dyn Schema>>,
    registrations: Vec<Registration>,
}

impl WriterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn add(self, path: &str, writer: impl Writer + 'static) -> Self {
        self.add_with_dependencies(path, writer, &[])
    }

    /// Register a writer that must run after the writers at `dependencies`.
    pub fn add_with_dependencies(
        mut self,
        path: &str,
        writer: impl Writer + 'static,
        dependencies: &[&str],
    ) -> Self {
        self.registrations.push(Registration {
            text: path.to_string(),
            writer: Arc::new(writer),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> std::result::Result<WriterRegistry, WriterRegistryError> {
        let schema = self.schema.as_deref();

        let mut index: IndexMap<Path, usize> = IndexMap::new();
        for registration in &self.registrations {
            let path = Path::parse(&registration.text)
                .ok()
                .filter(|path| !path.is_root() && !path.is_keyed())
                .filter(|path| schema.is_none_or(|schema| schema.is_path_valid(path)))
                .ok_or_else(|| WriterRegistryError::InvalidPath(registration.text.clone()))?;
            if index.contains_key(&path) {
                return Err(WriterRegistryError::DuplicateWriter(path.to_string()));
            }
            index.insert(path, index.len());
        }

        // dependents[a] holds every writer that runs after a
        let mut dependents = vec![Vec::new(); index.len()];
        let mut pending = vec![0usize; index.len()];
        for (position, registration) in self.registrations.iter().enumerate() {
            for dependency in &registration.dependencies {
                let target = Path::parse(dependency)
                    .ok()
                    .and_then(|path| index.get(&path).copied())
                    .ok_or_else(|| WriterRegistryError::UnknownDependency {
                        path: registration.text.clone(),
                        dependency: dependency.clone(),
                    })?;
                dependents[target].push(position);
                pending[position] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(position, _)| Reverse(position))
            .collect();
        let mut sorted = Vec::with_capacity(index.len());
        while let Some(Reverse(position)) = ready.pop() {
            sorted.push(position);
            for &next in &dependents[position] {
                pending[next] -= 1;
                if pending[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        let paths: Vec<Path> = index.into_keys().collect();
        if sorted.len() < paths.len() {
            let stuck: Vec<bool> = pending.iter().map(|count| *count > 0).collect();
            let cycle = (0..paths.len())
                .filter(|&position| stuck[position] && on_cycle(&dependents, &stuck, position))
                .map(|position| paths[position].to_string())
                .collect();
            return Err(WriterRegistryError::Cycle { paths: cycle });
        }

        let writers: Vec<Arc<dyn Writer>> = self
            .registrations
            .into_iter()
            .map(|registration| registration.writer)
            .collect();
        let order = sorted
            .into_iter()
            .map(|position| (paths[position].clone(), Arc::clone(&writers[position])))
            .collect();

        Ok(WriterRegistry { order })
    }
}

/// Writers in the order diffs are applied.
pub struct WriterRegistry {
    order: Vec<(Path, Arc<dyn Writer>)>,
}

impl WriterRegistry {
    pub fn builder() -> WriterRegistryBuilder {
        WriterRegistryBuilder::new()
    }

    /// Writer paths in application order.
    pub fn order(&self) -> Vec<&Path> {
        self.order.iter().map(|(path, _)| path).collect()
    }

    /// Apply every entry of `diff`.
    ///
    /// A diff touching a path without a writer is rejected before anything
    /// is written. Otherwise writers run in dependency order, one call per
    /// entry. The first failure stops the apply; changes already written
    /// stay on the device.
    pub async fn apply(&self, diff: &Diff, device: &DeviceAccess) -> Result<()> {
        if let Some((path, _)) = diff
            .iter()
            .find(|(path, _)| !self.order.iter().any(|(registered, _)| registered == *path))
        {
            return Err(WriterError::NoWriter {
                path: path.to_string(),
            }
            .into());
        }

        info!("Applying {} changes to {}", diff.len(), device.id());
        for (path, writer) in &self.order {
            for entry in diff.get(path) {
                debug!("Writing {} ({})", entry.path, change_kind(&entry.change));
                match &entry.change {
                    Change::Create { after } => writer.create(&entry.path, after, device).await?,
                    Change::Update { before, after } => {
                        writer.update(&entry.path, before, after, device).await?
                    }
                    Change::Delete { before } => writer.delete(&entry.path, before, device).await?,
                }
            }
        }
        Ok(())
    }
}

/// Whether `start` leads back to itself through unresolved writers.
fn on_cycle(dependents: &[Vec<usize>], stuck: &[bool], start: usize) -> bool {
    let mut seen = vec![false; dependents.len()];
    let mut stack = dependents[start].clone();
    while let Some(position) = stack.pop() {
        if position == start {
            return true;
        }
        if !stuck[position] || std::mem::replace(&mut seen[position], true) {
            continue;
        }
        stack.extend_from_slice(&dependents[position]);
    }
    false
}

fn change_kind(change: &Change) -> &'static str {
    match change {
        Change::Create { .. } => "create",
        Change::Update { .. } => "update",
        Change::Delete { .. } => "delete",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{CliError, Error};
    use crate::testing::device_access;
    use crate::translation::StaticSchema;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        log: Log,
        fail: bool,
    }

    impl Recorder {
        fn new(log: &Log) -> Self {
            Self {
                log: Arc::clone(log),
                fail: false,
            }
        }

        fn failing(log: &Log) -> Self {
            Self {
                log: Arc::clone(log),
                fail: true,
            }
        }

        fn record(&self, what: String) -> Result<()> {
            self.log.lock().unwrap().push(what);
            if self.fail {
                return Err(CliError::CommandFailed {
                    command: "vlan database".to_string(),
                    message: "% Invalid input".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Writer for Recorder {
        async fn create(&self, path: &Path, _after: &TreeValue, _device: &DeviceAccess) -> Result<()> {
            self.record(format!("create {}", path))
        }

        async fn delete(&self, path: &Path, _before: &TreeValue, _device: &DeviceAccess) -> Result<()> {
            self.record(format!("delete {}", path))
        }
    }

    fn path(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_cycle_is_rejected() {
        let log = log();
        let result = WriterRegistryBuilder::new()
            .add_with_dependencies("/a", Recorder::new(&log), &["/b"])
            .add_with_dependencies("/b", Recorder::new(&log), &["/a"])
            .add("/c", Recorder::new(&log))
            .build();

        match result {
            Err(WriterRegistryError::Cycle { paths }) => assert_eq!(paths, vec!["/a", "/b"]),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("cyclic registry was built"),
        }
    }

    #[test]
    fn test_cycle_lists_only_its_members() {
        let log = log();
        let result = WriterRegistryBuilder::new()
            .add_with_dependencies("/a", Recorder::new(&log), &["/b"])
            .add_with_dependencies("/b", Recorder::new(&log), &["/a"])
            .add_with_dependencies("/c", Recorder::new(&log), &["/a"])
            .add_with_dependencies("/d", Recorder::new(&log), &["/c", "/e"])
            .add("/e", Recorder::new(&log))
            .build();

        assert_eq!(
            result.err(),
            Some(WriterRegistryError::Cycle {
                paths: vec!["/a".to_string(), "/b".to_string()],
            })
        );
    }

    #[test]
    fn test_change_kind_names() {
        let value = TreeValue::empty();
        let kinds: Vec<String> = [
            Change::Create { after: value.clone() },
            Change::Update { before: value.clone(), after: value.clone() },
            Change::Delete { before: value },
        ]
        .iter()
        .map(|change| format!("({})", change_kind(change)))
        .collect();
        assert_eq!(kinds, ["(create)", "(update)", "(delete)"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let result = WriterRegistryBuilder::new()
            .add_with_dependencies("/a", Recorder::new(&log()), &["/a"])
            .build();
        assert!(matches!(result, Err(WriterRegistryError::Cycle { .. })));
    }

    #[test]
    fn test_build_errors() {
        let log = log();
        let result = WriterRegistryBuilder::new()
            .add_with_dependencies("/a", Recorder::new(&log), &["/missing"])
            .build();
        assert!(matches!(
            result,
            Err(WriterRegistryError::UnknownDependency { ref dependency, .. }) if dependency == "/missing"
        ));

        let result = WriterRegistryBuilder::new()
            .add("/a", Recorder::new(&log))
            .add("/a", Recorder::new(&log))
            .build();
        assert!(matches!(result, Err(WriterRegistryError::DuplicateWriter(_))));

        let result = WriterRegistryBuilder::new()
            .add("/interfaces/interface[name=\"0/1\"]", Recorder::new(&log))
            .build();
        assert!(matches!(result, Err(WriterRegistryError::InvalidPath(_))));

        let schema = StaticSchema::new().container(&path("/interfaces"));
        let result = WriterRegistryBuilder::new()
            .with_schema(Arc::new(schema))
            .add("/vlans", Recorder::new(&log))
            .build();
        assert!(matches!(result, Err(WriterRegistryError::InvalidPath(_))));
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let log = log();
        let registry = WriterRegistryBuilder::new()
            .add("/c", Recorder::new(&log))
            .add_with_dependencies("/b", Recorder::new(&log), &["/a"])
            .add("/a", Recorder::new(&log))
            .build()
            .unwrap();
        let order: Vec<String> = registry.order().iter().map(|p| p.to_string()).collect();
        assert_eq!(order, vec!["/c", "/a", "/b"]);
    }

    #[tokio::test]
    async fn test_dependencies_are_written_first() {
        let log = log();
        let registry = WriterRegistryBuilder::new()
            .add_with_dependencies(
                "/interfaces/interface/config",
                Recorder::new(&log),
                &["/network-instances"],
            )
            .add("/network-instances", Recorder::new(&log))
            .build()
            .unwrap();

        let diff = Diff::new()
            .create(
                path("/interfaces/interface[name=\"0/1\"]/config"),
                TreeValue::empty().with("mtu", 9000u32),
            )
            .delete(
                path("/interfaces/interface[name=\"0/2\"]/config"),
                TreeValue::empty().with("mtu", 1500u32),
            )
            .create(path("/network-instances"), TreeValue::empty().with("name", "mgmt"));
        assert_eq!(diff.len(), 3);

        registry.apply(&diff, &device_access()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "create /network-instances",
                "create /interfaces/interface[name=\"0/1\"]/config",
                "delete /interfaces/interface[name=\"0/2\"]/config",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_path_writes_nothing() {
        let log = log();
        let registry = WriterRegistryBuilder::new()
            .add("/network-instances", Recorder::new(&log))
            .build()
            .unwrap();
        let diff = Diff::new()
            .create(path("/network-instances"), "mgmt")
            .create(path("/vlans"), "10");

        let err = registry.apply(&diff, &device_access()).await.unwrap_err();
        assert!(matches!(err, Error::Writer(WriterError::NoWriter { ref path }) if path == "/vlans"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_apply() {
        let log = log();
        let registry = WriterRegistryBuilder::new()
            .add("/vlans", Recorder::failing(&log))
            .add_with_dependencies("/interfaces", Recorder::new(&log), &["/vlans"])
            .build()
            .unwrap();
        let diff = Diff::new()
            .create(path("/interfaces"), "x")
            .create(path("/vlans"), "10");

        let err = registry.apply(&diff, &device_access()).await.unwrap_err();
        assert!(matches!(err, Error::Cli(CliError::CommandFailed { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["create /vlans"]);
    }

    #[tokio::test]
    async fn test_update_unsupported_by_default() {
        let log = log();
        let registry = WriterRegistryBuilder::new()
            .add("/system/config", Recorder::new(&log))
            .build()
            .unwrap();
        let diff = Diff::new().update(path("/system/config"), "a", "b");

        let err = registry.apply(&diff, &device_access()).await.unwrap_err();
        assert!(matches!(err, Error::Writer(WriterError::Unsupported { .. })));
    }
}
