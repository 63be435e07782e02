//! # netcli
//!
//! Resilient CLI sessions and tree-shaped translation for network devices
//! that only speak an interactive shell.
//!
//! ## Features
//!
//! - Async SSH shell transport via russh
//! - One command at a time per device, FIFO, with fast failure on disconnect
//! - Idle heartbeats, per-command deadlines and bounded, event-driven teardown
//! - Section cache answering `show running-config <section>` from one dump
//! - Path-scoped readers and dependency-ordered writers composed into
//!   whole-tree operations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netcli::dialect::vendors;
//! use netcli::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netcli::Error> {
//!     let session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .dialect(vendors::ubiquiti::dialect())
//!         .connect()
//!         .await?;
//!
//!     let section = session.read("show running-config interface 0/1").await?;
//!     println!("{}", section);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod cli;
pub mod device;
pub mod dialect;
pub mod error;
pub mod translation;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use cli::{Cli, Command, Session, SessionBuilder, StackConfig};
pub use device::Device;
pub use dialect::{Dialect, SectionGrammar};
pub use error::{Error, Result};
pub use translation::{
    DeviceAccess, Diff, Path, ReadMode, ReaderRegistry, TreeValue, WriterRegistry,
};
pub use transport::{AuthMethod, SshConfig};
