//! Builder for device sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::runtime::Handle;

use super::{Session, StackConfig};
use crate::channel::{ChannelConfig, PromptChannel};
use crate::dialect::Dialect;
use crate::error::{ConfigError, Result};
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::transport::{SshTransport, Transport};

/// Builder for connecting to a device and assembling its [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use netcli::cli::SessionBuilder;
/// use netcli::dialect::vendors::ubiquiti;
///
/// # async fn example() -> Result<(), netcli::Error> {
/// let session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .dialect(ubiquiti::dialect())
///     .connect()
///     .await?;
///
/// let config = session.read("show running-config interface 0/1").await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    id: Option<String>,
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    dialect: Option<Dialect>,
    timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    config: StackConfig,
    executor: Option<Handle>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            id: None,
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            dialect: None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            config: StackConfig::default(),
            executor: None,
        }
    }

    /// Device identifier used in logs (default: the host).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the device dialect. Required.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set host key verification mode (default: accept new).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set stack timeouts and limits.
    pub fn config(mut self, config: StackConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime for command workers (default: the current runtime).
    pub fn executor(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Connect over SSH and assemble the session.
    pub async fn connect(self) -> Result<Session> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| ConfigError::Invalid {
                message: "Username is required".to_string(),
            })?;

        let ssh_config = SshConfig {
            host: self.host.clone(),
            port: self.port,
            username,
            auth: self.auth.clone(),
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
        };

        self.config.validate()?;
        let transport = SshTransport::connect(ssh_config).await?;
        self.build_with_transport(transport).await
    }

    /// Assemble the session over an already connected transport.
    pub async fn build_with_transport<T: Transport + 'static>(self, transport: T) -> Result<Session> {
        self.config.validate()?;
        let dialect = self.dialect.ok_or_else(|| ConfigError::Invalid {
            message: "Dialect must be specified".to_string(),
        })?;
        let dialect = Arc::new(dialect);

        let mut channel = PromptChannel::new(
            transport,
            Arc::clone(&dialect),
            ChannelConfig {
                read_timeout: self.config.read_timeout,
                search_depth: self.config.search_depth,
            },
        );
        channel.open().await?;

        let executor = self.executor.unwrap_or_else(Handle::current);
        let id = self.id.unwrap_or(self.host);
        Ok(Session::assemble(id, channel, dialect, &self.config, executor))
    }
}
