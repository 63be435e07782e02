//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::cli::{Cli, Command};
use crate::dialect::{Dialect, SectionGrammar};
use crate::error::{CliError, Result, TransportError};
use crate::translation::DeviceAccess;
use crate::transport::Transport;

const PROMPT: &str = "(test) #";

/// In-memory shell that echoes commands and answers with canned output.
pub struct FakeTransport {
    responses: HashMap<String, String>,
    disconnects: HashSet<String>,
    silent: HashSet<String>,
    late: HashMap<String, Duration>,
    delay: Option<Duration>,
    pending: VecDeque<(Instant, Vec<u8>)>,
    open: bool,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            disconnects: HashSet::new(),
            silent: HashSet::new(),
            late: HashMap::new(),
            delay: None,
            pending: VecDeque::from([(Instant::now(), PROMPT.as_bytes().to_vec())]),
            open: true,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn respond(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Drop the connection when `command` is sent.
    pub fn disconnect_on(mut self, command: &str) -> Self {
        self.disconnects.insert(command.to_string());
        self
    }

    /// Never answer `command`.
    pub fn silent_on(mut self, command: &str) -> Self {
        self.silent.insert(command.to_string());
        self
    }

    /// Answer `command` only `after` it was sent.
    pub fn late_on(mut self, command: &str, after: Duration) -> Self {
        self.late.insert(command.to_string(), after);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lines sent so far, line endings stripped.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    /// Set once [`Transport::close`] is called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, data: &str) -> Result<()> {
        if !self.open {
            return Err(TransportError::Disconnected.into());
        }
        let command = data.trim_end_matches(['\r', '\n']).to_string();
        self.sent.lock().unwrap().push(command.clone());

        if self.disconnects.contains(&command) {
            self.open = false;
            return Ok(());
        }
        if self.silent.contains(&command) {
            return Ok(());
        }

        let reply = match self.responses.get(&command) {
            Some(output) if !output.is_empty() => format!("{}\r\n{}\r\n{}", command, output, PROMPT),
            _ => format!("{}\r\n{}", command, PROMPT),
        };
        let ready = Instant::now() + self.late.get(&command).copied().unwrap_or_default();
        self.pending.push_back((ready, reply.into_bytes()));
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(&(ready, _)) = self.pending.front() {
            tokio::time::sleep_until(ready).await;
            return Ok(self.pending.pop_front().map(|(_, chunk)| chunk));
        }
        if !self.open {
            return Ok(None);
        }
        std::future::pending().await
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Grammar for `show running-config [interface <name>]` style dumps.
pub fn test_grammar() -> SectionGrammar {
    SectionGrammar::new(
        r"^(?P<base>show running-config)(?:\s+(?P<sub>.+))?$",
        "exit",
    )
    .unwrap()
    .with_header(r"^interface\b")
    .unwrap()
}

pub fn test_dialect() -> Dialect {
    Dialect::new("test", r"\(test\) #")
        .unwrap()
        .with_failure_pattern("% Invalid input")
        .with_on_open_command("terminal length 0")
        .with_heartbeat("")
        .with_sections(test_grammar())
}

/// A [`Cli`] with canned answers that records every command it runs.
#[derive(Default)]
pub struct ScriptedCli {
    responses: Mutex<HashMap<String, String>>,
    failures: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ScriptedCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command: &str, output: &str) -> Self {
        self.set_response(command, output);
        self
    }

    /// Answer `command` with [`CliError::CommandFailed`].
    pub fn fail_on(mut self, command: &str) -> Self {
        self.failures.insert(command.to_string());
        self
    }

    /// Sleep before answering; the call is recorded first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, command: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `raw` was run.
    pub fn count(&self, raw: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == raw).count()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn run(&self, command: Command) -> Result<String> {
        self.calls.lock().unwrap().push(command.raw().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.contains(command.raw()) {
            return Err(CliError::CommandFailed {
                command: command.raw().to_string(),
                message: "% Invalid input".to_string(),
            }
            .into());
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses.get(command.raw()).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Cli for ScriptedCli {
    async fn execute_read(&self, command: Command) -> Result<String> {
        self.run(command).await
    }

    async fn execute_write(&self, command: Command) -> Result<String> {
        self.run(command).await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// [`DeviceAccess`] over a [`ScriptedCli`] that answers everything with "".
pub fn device_access() -> DeviceAccess {
    DeviceAccess::new("test", Arc::new(ScriptedCli::new()), Handle::current())
}
