//! Error types for netcli.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netcli operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Command execution errors raised by the cli stack
    #[error("Cli error: {0}")]
    Cli(#[from] CliError),

    /// Malformed path
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Invalid read request
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Reader registry could not be built
    #[error("Reader registry error: {0}")]
    ReaderRegistry(#[from] ReaderRegistryError),

    /// Writer registry could not be built
    #[error("Writer registry error: {0}")]
    WriterRegistry(#[from] WriterRegistryError),

    /// Diff application errors
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    /// Structured parsing of device output failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Invalid session or dialect configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error means the device session is gone.
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            Error::Cli(CliError::Disconnected) | Error::Transport(TransportError::Disconnected)
        )
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching, shell I/O).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Prompt did not show up in time
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),
}

/// Errors surfaced by the command execution stack.
#[derive(Error, Debug)]
pub enum CliError {
    /// The transport was lost; pending and queued commands fail with this
    #[error("Device disconnected")]
    Disconnected,

    /// The per-command deadline elapsed; the command outcome is unknown
    #[error("Command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// The session is being torn down and accepts no new commands
    #[error("Session is shutting down")]
    ShuttingDown,

    /// The device reported an error for the command
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// A worker task panicked or was cancelled
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

/// Path parsing and manipulation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Path does not start with the separator
    #[error("Path '{0}' is not absolute")]
    NotAbsolute(String),

    /// Path text could not be parsed
    #[error("Malformed path '{path}': {message}")]
    Malformed { path: String, message: String },

    /// Keys were attached to a segment that already carries keys
    #[error("Segment '{segment}' already has keys")]
    KeysAlreadySet { segment: String },

    /// Keys cannot be attached to the root path
    #[error("Cannot attach keys to the root path")]
    RootKeys,
}

/// Invalid read requests. These are caller errors, not device faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// No registered reader covers the requested path
    #[error("No reader found for '{path}' (nearest reader: '{nearest}')")]
    NoReader { path: String, nearest: String },

    /// The requested list element is not among the enumerated keys
    #[error("List element '{path}' not found (reader: '{reader}')")]
    KeyNotFound { path: String, reader: String },

    /// A path descends through a list node without selecting an element
    #[error("Path '{path}' must carry keys for list '{reader}'")]
    MissingKeys { path: String, reader: String },
}

/// Reader registry build errors. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderRegistryError {
    /// Path rejected by the schema
    #[error("Invalid reader path '{0}'")]
    InvalidPath(String),

    /// Two readers registered for the same path
    #[error("Reader already registered for '{0}'")]
    DuplicateReader(String),

    /// Schema says the node is a list but no list reader was registered
    #[error("'{0}' is a list but has no list reader")]
    ListWithoutListReader(String),
}

/// Writer registry build errors. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterRegistryError {
    /// Declared dependencies form a cycle
    #[error("Writer dependency cycle between: {}", paths.join(", "))]
    Cycle { paths: Vec<String> },

    /// A dependency names a path with no registered writer
    #[error("Writer '{path}' depends on unregistered writer '{dependency}'")]
    UnknownDependency { path: String, dependency: String },

    /// Path rejected by the schema
    #[error("Invalid writer path '{0}'")]
    InvalidPath(String),

    /// Two writers registered for the same path
    #[error("Writer already registered for '{0}'")]
    DuplicateWriter(String),
}

/// Diff application errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// The diff touches a path that has no writer
    #[error("No writer registered for '{path}'")]
    NoWriter { path: String },

    /// The writer does not support this kind of change
    #[error("Unsupported change at '{path}': {message}")]
    Unsupported { path: String, message: String },
}

/// Malformed device output where structured parsing was expected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// A captured value could not be converted to the target type
    #[error("Cannot parse '{value}' as {target}")]
    InvalidValue { value: String, target: &'static str },

    /// Expected output is missing
    #[error("Missing value: {0}")]
    Missing(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration in a builder
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type alias using netcli's Error.
pub type Result<T> = std::result::Result<T, Error>;
