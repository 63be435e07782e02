//! Reader registry.
//!
//! Readers are registered per (unkeyed) path. At build time every
//! registered path's ancestors become nodes of a hierarchy; nodes without a
//! reader only exist to visit their children. A read walks that hierarchy,
//! running a node's reader and its children concurrently and merging the
//! results under the node's name.
//!
//! Failures below the requested path only drop that subtree from the
//! result. Failures of the requested node itself, or of a list on the way
//! to it, fail the read.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, join};
use futures_util::stream::{self, StreamExt};
use indexmap::IndexMap;
use log::{debug, warn};

use super::{DeviceAccess, Keys, Path, Schema, TreeValue};
use crate::error::{ReaderError, ReaderRegistryError, Result};

/// Reads the data of one node.
#[async_trait]
pub trait Reader: Send + Sync {
    /// `path` is concrete: list segments above it carry keys.
    async fn read(&self, path: &Path, device: &DeviceAccess) -> Result<TreeValue>;
}

/// Reads a list node: its element keys and, optionally, per-element data.
#[async_trait]
pub trait ListReader: Send + Sync {
    /// Keys of every element. The last segment of `path` carries no keys.
    async fn read_keys(&self, path: &Path, device: &DeviceAccess) -> Result<Vec<Keys>>;

    /// Data of one element besides its keys. `path` ends with the element's keys.
    async fn read(&self, _path: &Path, _device: &DeviceAccess) -> Result<TreeValue> {
        Ok(TreeValue::empty())
    }
}

/// Which kind of data a read collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Intended configuration; state subtrees are skipped.
    #[default]
    Config,
    /// Observed state; config readers are skipped but list keys are kept.
    State,
}

struct FnReader<F>(F);

#[async_trait]
impl<F, Fut> Reader for FnReader<F>
where
    F: Fn(Path, DeviceAccess) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TreeValue>> + Send,
{
    async fn read(&self, path: &Path, device: &DeviceAccess) -> Result<TreeValue> {
        (self.0)(path.clone(), device.clone()).await
    }
}

struct FnListReader<F>(F);

#[async_trait]
impl<F, Fut> ListReader for FnListReader<F>
where
    F: Fn(Path, DeviceAccess) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Keys>>> + Send,
{
    async fn read_keys(&self, path: &Path, device: &DeviceAccess) -> Result<Vec<Keys>> {
        (self.0)(path.clone(), device.clone()).await
    }
}

#[derive(Clone)]
enum Handler {
    Structural,
    Scalar(Arc<dyn Reader>),
    List(Arc<dyn ListReader>),
}

impl Handler {
    fn is_list(&self) -> bool {
        matches!(self, Handler::List(_))
    }

    fn is_registered(&self) -> bool {
        !matches!(self, Handler::Structural)
    }
}

struct Node {
    path: Path,
    handler: Handler,
    config: bool,
    children: IndexMap<String, Node>,
}

impl Node {
    fn name(&self) -> &str {
        self.path.name()
    }

    fn visible(&self, mode: ReadMode) -> bool {
        mode == ReadMode::State || self.config
    }

    fn contributes(&self, mode: ReadMode) -> bool {
        match mode {
            ReadMode::Config => self.config,
            ReadMode::State => !self.config,
        }
    }

    /// Put `content` under this node's name; the root is not wrapped.
    fn wrap(&self, content: TreeValue) -> TreeValue {
        if self.path.is_root() || content.is_empty() {
            content
        } else {
            content.wrap(self.name())
        }
    }

    fn collect_paths(&self, out: &mut Vec<Path>) {
        if self.handler.is_registered() {
            out.push(self.path.clone());
        }
        for child in self.children.values() {
            child.collect_paths(out);
        }
    }
}

/// Collects readers and builds a [`ReaderRegistry`].
pub struct ReaderRegistryBuilder {
    schema: Option<Arc<dyn Schema>>,
    concurrency: usize,
    handlers: Vec<(String, Handler)>,
}

impl Default for ReaderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            schema: None,
            concurrency: 8,
            handlers: Vec::new(),
        }
    }

    /// Validate and classify paths against `schema`.
    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Maximum number of child reads in flight per node.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn add(mut self, path: &str, reader: impl Reader + 'static) -> Self {
        self.handlers
            .push((path.to_string(), Handler::Scalar(Arc::new(reader))));
        self
    }

    pub fn add_list(mut self, path: &str, reader: impl ListReader + 'static) -> Self {
        self.handlers
            .push((path.to_string(), Handler::List(Arc::new(reader))));
        self
    }

    /// Register a closure as a reader.
    pub fn add_fn<F, Fut>(self, path: &str, read: F) -> Self
    where
        F: Fn(Path, DeviceAccess) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TreeValue>> + Send + 'static,
    {
        self.add(path, FnReader(read))
    }

    /// Register a closure enumerating list keys as a list reader.
    pub fn add_list_fn<F, Fut>(self, path: &str, read_keys: F) -> Self
    where
        F: Fn(Path, DeviceAccess) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Keys>>> + Send + 'static,
    {
        self.add_list(path, FnListReader(read_keys))
    }

    pub fn build(self) -> std::result::Result<ReaderRegistry, ReaderRegistryError> {
        let schema = self.schema.as_deref();

        let mut registered: IndexMap<Path, Handler> = IndexMap::new();
        for (text, handler) in self.handlers {
            let path = Path::parse(&text)
                .ok()
                .filter(|path| !path.is_keyed())
                .ok_or_else(|| ReaderRegistryError::InvalidPath(text.clone()))?;
            if schema.is_some_and(|schema| !schema.is_path_valid(&path)) {
                return Err(ReaderRegistryError::InvalidPath(text));
            }
            if registered.contains_key(&path) {
                return Err(ReaderRegistryError::DuplicateReader(path.to_string()));
            }
            registered.insert(path, handler);
        }

        let mut nodes: IndexMap<Path, Handler> = IndexMap::new();
        nodes.insert(Path::root(), Handler::Structural);
        for path in registered.keys() {
            for ancestor in path.ancestors() {
                nodes.entry(ancestor).or_insert(Handler::Structural);
            }
        }
        nodes.extend(registered);

        if let Some(schema) = schema {
            for (path, handler) in &nodes {
                if !path.is_root() && schema.is_list(path) && !handler.is_list() {
                    return Err(ReaderRegistryError::ListWithoutListReader(path.to_string()));
                }
            }
        }

        let mut children: IndexMap<Path, Vec<Path>> = IndexMap::new();
        for path in nodes.keys() {
            if let Some(parent) = path.parent() {
                children.entry(parent).or_default().push(path.clone());
            }
        }

        let root = assemble(&Path::root(), &nodes, &children, schema);
        debug!("reader registry built with {} nodes", nodes.len());
        Ok(ReaderRegistry {
            root,
            concurrency: self.concurrency,
        })
    }
}

fn assemble(
    path: &Path,
    nodes: &IndexMap<Path, Handler>,
    children: &IndexMap<Path, Vec<Path>>,
    schema: Option<&dyn Schema>,
) -> Node {
    let child_nodes = children
        .get(path)
        .into_iter()
        .flatten()
        .map(|child| {
            (
                child.name().to_string(),
                assemble(child, nodes, children, schema),
            )
        })
        .collect();

    Node {
        path: path.clone(),
        handler: nodes.get(path).cloned().unwrap_or(Handler::Structural),
        config: schema.is_none_or(|schema| schema.is_config_node(path)),
        children: child_nodes,
    }
}

/// Composite reader over every registered path.
pub struct ReaderRegistry {
    root: Node,
    concurrency: usize,
}

impl ReaderRegistry {
    pub fn builder() -> ReaderRegistryBuilder {
        ReaderRegistryBuilder::new()
    }

    /// Paths with a registered reader, parents before children.
    pub fn paths(&self) -> Vec<Path> {
        let mut paths = Vec::new();
        self.root.collect_paths(&mut paths);
        paths
    }

    /// Read the whole tree.
    pub async fn read_all(&self, mode: ReadMode, device: &DeviceAccess) -> Result<TreeValue> {
        self.read(&Path::root(), mode, device).await
    }

    /// Read `path` and everything below it.
    ///
    /// The result is wrapped under the last segment's name, e.g. reading
    /// `/interfaces/interface[id="1"]/config` yields `{"config": {..}}`.
    /// Lists come back as `{"interface": [..]}`, one entry per element with
    /// its key leaves included.
    pub async fn read(&self, path: &Path, mode: ReadMode, device: &DeviceAccess) -> Result<TreeValue> {
        let chain = self.resolve(path)?;
        let (target, ancestors) = match chain.split_last() {
            Some(split) => split,
            None => return Ok(TreeValue::empty()),
        };

        for node in ancestors {
            if !node.visible(mode) {
                return Ok(TreeValue::empty());
            }
            if let Handler::List(list) = &node.handler {
                let concrete = path.prefix(node.path.depth());
                let keys = concrete.keys().ok_or_else(|| ReaderError::MissingKeys {
                    path: path.to_string(),
                    reader: node.path.to_string(),
                })?;
                self.check_element(node, list.as_ref(), &concrete, keys, device)
                    .await?;
            }
        }

        self.read_child(target, path.clone(), mode, device, true)
            .await
    }

    /// Nodes from the root to the one `request` names.
    fn resolve(&self, request: &Path) -> std::result::Result<Vec<&Node>, ReaderError> {
        let mut chain = vec![&self.root];
        let mut node = &self.root;
        let mut nearest = &self.root;

        for segment in request.segments() {
            if node.handler.is_registered() {
                nearest = node;
            }
            node = node
                .children
                .get(segment.name())
                .ok_or_else(|| ReaderError::NoReader {
                    path: request.to_string(),
                    nearest: nearest.path.to_string(),
                })?;
            if segment.keys().is_some() && !node.handler.is_list() {
                return Err(ReaderError::KeyNotFound {
                    path: request.to_string(),
                    reader: node.path.to_string(),
                });
            }
            chain.push(node);
        }
        Ok(chain)
    }

    async fn check_element(
        &self,
        node: &Node,
        list: &dyn ListReader,
        concrete: &Path,
        keys: &Keys,
        device: &DeviceAccess,
    ) -> Result<()> {
        let existing = list.read_keys(&list_path(concrete), device).await?;
        if existing.contains(keys) {
            Ok(())
        } else {
            Err(ReaderError::KeyNotFound {
                path: concrete.to_string(),
                reader: node.path.to_string(),
            }
            .into())
        }
    }

    fn read_child<'a>(
        &'a self,
        node: &'a Node,
        concrete: Path,
        mode: ReadMode,
        device: &'a DeviceAccess,
        target: bool,
    ) -> BoxFuture<'a, Result<TreeValue>> {
        async move {
            if !node.visible(mode) {
                return Ok(TreeValue::empty());
            }
            match &node.handler {
                Handler::List(list) => {
                    self.read_list(node, list.as_ref(), concrete, mode, device, target)
                        .await
                }
                _ => {
                    let content = self.read_content(node, &concrete, mode, device).await?;
                    Ok(node.wrap(content))
                }
            }
        }
        .boxed()
    }

    async fn read_list(
        &self,
        node: &Node,
        list: &dyn ListReader,
        concrete: Path,
        mode: ReadMode,
        device: &DeviceAccess,
        target: bool,
    ) -> Result<TreeValue> {
        let list_path = list_path(&concrete);
        let existing = list.read_keys(&list_path, device).await?;

        let elements = match concrete.keys() {
            Some(wanted) if existing.contains(wanted) => vec![wanted.clone()],
            Some(_) => {
                return Err(ReaderError::KeyNotFound {
                    path: concrete.to_string(),
                    reader: node.path.to_string(),
                }
                .into());
            }
            None => existing,
        };

        let reads: Vec<BoxFuture<'_, Result<TreeValue>>> = elements
            .into_iter()
            .map(|keys| {
                let element = list_path.with_keys(keys.clone());
                async move {
                    let element = element?;
                    let mut value = TreeValue::from_keys(&keys);
                    value.merge(self.read_content(node, &element, mode, device).await?);
                    Ok(value)
                }
                .boxed()
            })
            .collect();
        let results: Vec<_> = stream::iter(reads)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut values = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) if target => return Err(e),
                Err(e) => warn!("dropping element of {} from read: {}", list_path, e),
            }
        }

        Ok(node.wrap(TreeValue::List(values)))
    }

    /// The node's own data merged with its children's.
    async fn read_content(
        &self,
        node: &Node,
        concrete: &Path,
        mode: ReadMode,
        device: &DeviceAccess,
    ) -> Result<TreeValue> {
        let own = async {
            match &node.handler {
                Handler::Scalar(reader) if node.contributes(mode) => {
                    reader.read(concrete, device).await
                }
                Handler::List(list) if node.contributes(mode) => list.read(concrete, device).await,
                _ => Ok(TreeValue::empty()),
            }
        };
        let (own, children) = join(own, self.read_children(node, concrete, mode, device)).await;

        let mut content = own?;
        content.merge(children);
        Ok(content)
    }

    async fn read_children(
        &self,
        node: &Node,
        concrete: &Path,
        mode: ReadMode,
        device: &DeviceAccess,
    ) -> TreeValue {
        let reads: Vec<BoxFuture<'_, (Path, Result<TreeValue>)>> = node
            .children
            .values()
            .map(|child| {
                let path = concrete.child(child.name());
                async move {
                    let result = self.read_child(child, path.clone(), mode, device, false).await;
                    (path, result)
                }
                .boxed()
            })
            .collect();
        let results: Vec<_> = stream::iter(reads)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut merged = TreeValue::empty();
        for (path, result) in results {
            match result {
                Ok(value) => merged.merge(value),
                Err(e) => warn!("dropping {} from read: {}", path, e),
            }
        }
        merged
    }
}

/// `concrete` with the keys of its last segment removed.
fn list_path(concrete: &Path) -> Path {
    match concrete.parent() {
        Some(parent) => parent.child(concrete.name()),
        None => Path::root(),
    }
}
