//! Schema collaborator used to validate and classify registry paths.

use indexmap::IndexMap;

use super::Path;

/// Answers structural questions about the device model.
///
/// Paths passed in are unkeyed.
pub trait Schema: Send + Sync {
    fn is_path_valid(&self, path: &Path) -> bool;

    fn is_list(&self, path: &Path) -> bool;

    /// Config (intended) as opposed to state (observed) data.
    fn is_config_node(&self, path: &Path) -> bool;

    /// Key leaf names of a list node.
    fn keys(&self, path: &Path) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
struct NodeInfo {
    list_keys: Option<Vec<String>>,
    state: bool,
}

/// Schema given as an explicit set of nodes.
///
/// Registering a node registers its ancestors as containers. A node is
/// state data if it or any ancestor was marked with [`state`](Self::state).
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    nodes: IndexMap<Path, NodeInfo>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(mut self, path: &Path) -> Self {
        self.node(path);
        self
    }

    pub fn list(mut self, path: &Path, keys: &[&str]) -> Self {
        self.node(path).list_keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Mark a node and everything below it as state data.
    pub fn state(mut self, path: &Path) -> Self {
        self.node(path).state = true;
        self
    }

    fn node(&mut self, path: &Path) -> &mut NodeInfo {
        let path = path.unkeyed();
        for ancestor in path.ancestors() {
            self.nodes.entry(ancestor).or_default();
        }
        self.nodes.entry(path).or_default()
    }
}

impl Schema for StaticSchema {
    fn is_path_valid(&self, path: &Path) -> bool {
        self.nodes.contains_key(&path.unkeyed())
    }

    fn is_list(&self, path: &Path) -> bool {
        self.nodes
            .get(&path.unkeyed())
            .is_some_and(|node| node.list_keys.is_some())
    }

    fn is_config_node(&self, path: &Path) -> bool {
        !path
            .unkeyed()
            .ancestors()
            .any(|ancestor| self.nodes.get(&ancestor).is_some_and(|node| node.state))
    }

    fn keys(&self, path: &Path) -> Vec<String> {
        self.nodes
            .get(&path.unkeyed())
            .and_then(|node| node.list_keys.clone())
            .unwrap_or_default()
    }
}
