//! Line-delimited JSON-RPC transport.
//!
//! [`StdioTransport`] talks to a tool server over a pair of byte streams,
//! normally the stdin/stdout of a spawned child process. Whole
//! request/response cycles are serialized behind one lock, so at most one
//! invocation is in flight per channel.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Maximum number of non-JSON lines to skip before declaring the server broken.
const MAX_SKIP_LINES: usize = 1000;

/// How long a shut-down server gets to exit on its own
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default timeout for handshake and discovery requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// How to launch a tool server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ServerCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Split a whitespace-separated command line into program and arguments
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let command = parts.next()?;
        Some(Self::new(command).with_args(parts))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Newline-delimited JSON-RPC over a reader/writer pair.
pub struct StdioTransport {
    /// `None` once shut down; dropping it closes the server's stdin.
    writer: Mutex<Option<BoxedWriter>>,
    reader: Mutex<BoxedReader>,
    child: Mutex<Option<Child>>,
    /// Serializes full request/response cycles to prevent response mismatching.
    request_lock: Mutex<()>,
    next_id: AtomicU64,
    alive: AtomicBool,
    timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server process and attach to its stdin/stdout.
    ///
    /// The child's stderr is inherited so server diagnostics reach the
    /// operator console. The child is killed if the transport is dropped
    /// without a shutdown.
    pub fn spawn(server: &ServerCommand) -> Result<Self> {
        let mut cmd = tokio::process::Command::new(&server.command);
        cmd.args(&server.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in &server.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &server.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: server.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            McpError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdin",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            McpError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdout",
            ))
        })?;

        tracing::debug!(command = %server, pid = ?child.id(), "spawned tool server");

        let mut transport = Self::from_streams(BufReader::new(stdout), stdin);
        transport.child = Mutex::new(Some(child));
        Ok(transport)
    }

    /// Attach to an already-connected stream pair (no child process).
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            reader: Mutex::new(Box::new(reader)),
            child: Mutex::new(None),
            request_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn write_line(&self, json: &str) -> Result<()> {
        if !self.is_alive() {
            return Err(McpError::ProcessExited);
        }

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(McpError::ProcessExited);
        };
        let written = async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                self.alive.store(false, Ordering::SeqCst);
                return Err(McpError::ProcessExited);
            }
            return Err(McpError::Io(e));
        }
        Ok(())
    }

    /// Read one JSON line, skipping blank and non-JSON lines.
    async fn read_line(&self) -> Result<String> {
        if !self.is_alive() {
            return Err(McpError::ProcessExited);
        }

        let mut reader = self.reader.lock().await;
        let mut skipped = 0usize;
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                self.alive.store(false, Ordering::SeqCst);
                return Err(McpError::ProcessExited);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('{') {
                return Ok(trimmed.to_string());
            }
            skipped += 1;
            if skipped >= MAX_SKIP_LINES {
                self.alive.store(false, Ordering::SeqCst);
                return Err(McpError::Protocol(
                    "tool server produced too many non-JSON lines on stdout".into(),
                ));
            }
            tracing::debug!(line = %trimmed, "skipping non-JSON line from tool server");
        }
    }

    /// Send a request and wait for the response carrying the same id,
    /// bounded by the transport's request timeout.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        self.send_request_within(method, params, Some(self.timeout)).await
    }

    /// Send a request with an explicit deadline; `None` waits indefinitely.
    ///
    /// A response arriving after its deadline is discarded by the next
    /// request, which only accepts its own id.
    pub async fn send_request_within(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<JsonRpcResponse> {
        let _guard = self.request_lock.lock().await;

        let id = self.next_request_id();
        let json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        tracing::debug!(id, method, "sending request");
        self.write_line(&json).await?;

        let exchange = async {
            loop {
                let line = self.read_line().await?;
                match serde_json::from_str::<JsonRpcResponse>(&line) {
                    Ok(resp) if resp.answers(id) => return Ok(resp),
                    Ok(resp) => {
                        tracing::debug!(expected_id = id, got_id = %resp.id, "response for another request");
                    }
                    Err(_) => tracing::debug!(line = %line, "skipping non-response message"),
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| Err(McpError::Timeout(method.to_string()))),
            None => exchange.await,
        }
    }

    pub async fn send_notification(&self, method: &str) -> Result<()> {
        let json = serde_json::to_string(&JsonRpcNotification::new(method))?;
        tracing::debug!(method, "sending notification");
        self.write_line(&json).await
    }

    /// Close stdin, give the child a moment to exit, then kill it.
    ///
    /// Returns the exit status when the child exited on its own.
    pub async fn shutdown(&self) -> Option<ExitStatus> {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "error closing tool server stdin");
            }
        }

        let mut child = self.child.lock().await;
        let child = child.as_mut()?;

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "tool server exited");
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error waiting for tool server");
                None
            }
            Err(_) => {
                tracing::warn!("tool server did not exit within timeout, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill tool server");
                }
                None
            }
        }
    }
}
