//! Translation between device CLI and a tree-shaped data model.
//!
//! Handlers are registered per path: [`Reader`]s and [`ListReader`]s build
//! the tree from command output, [`Writer`]s push a [`Diff`] back as
//! commands. Registries compose them into whole-tree operations.

mod device;
pub mod parsing;
mod path;
mod reader;
mod schema;
mod value;
mod writer;

pub use device::DeviceAccess;
pub use path::{Keys, Path, Segment};
pub use reader::{ListReader, ReadMode, Reader, ReaderRegistry, ReaderRegistryBuilder};
pub use schema::{Schema, StaticSchema};
pub use value::{Leaf, TreeValue};
pub use writer::{Change, Diff, DiffEntry, Writer, WriterRegistry, WriterRegistryBuilder};
