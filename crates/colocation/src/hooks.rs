//! Runtime hook server
//!
//! Container runtimes call into the agent before sandboxes and containers
//! start. The server speaks newline-delimited JSON over TCP or a unix
//! socket: one request object per line, one response object per line.
//!
//! Best-effort (`BE`) pods are only admitted on nodes whose resolved
//! strategy enables reclamation, since they run entirely on reclaimed
//! headroom.

use crate::nodes::NodeCache;
use crate::observability::{ColocationMetrics, StructuredLogger};
use crate::store::StrategyStore;
use crate::strategy::ColocationStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// QoS class whose pods consume reclaimed resources
pub const BEST_EFFORT_QOS: &str = "BE";

/// Longest request line accepted, newline excluded
pub const MAX_HOOK_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unsupported hook network {0:?}, expected \"tcp\" or \"unix\"")]
    UnsupportedNetwork(String),

    #[error("hook server address must not be empty")]
    EmptyAddress,

    #[error("invalid tcp address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("refusing to replace {0}: not a socket")]
    NotASocket(PathBuf),

    #[error("hook server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport the hook server listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookNetwork {
    Tcp,
    Unix,
}

impl FromStr for HookNetwork {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(HookNetwork::Tcp),
            "unix" => Ok(HookNetwork::Unix),
            other => Err(HookError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for HookNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookNetwork::Tcp => f.write_str("tcp"),
            HookNetwork::Unix => f.write_str("unix"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookServerConfig {
    pub network: HookNetwork,
    /// `host:port` (or `:port`) for tcp, a socket path for unix
    pub addr: String,
}

impl HookServerConfig {
    pub fn new(network: &str, addr: impl Into<String>) -> Result<Self, HookError> {
        let config = Self {
            network: network.parse()?,
            addr: addr.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HookError> {
        if self.addr.trim().is_empty() {
            return Err(HookError::EmptyAddress);
        }
        if self.network == HookNetwork::Tcp {
            self.tcp_addr()?;
        }
        Ok(())
    }

    fn tcp_addr(&self) -> Result<SocketAddr, HookError> {
        // ":port" binds every interface
        let addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };
        addr.parse().map_err(|source| HookError::InvalidAddress {
            addr: self.addr.clone(),
            source,
        })
    }
}

/// Lifecycle point the runtime is calling from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookType {
    PreRunPodSandbox,
    PreStartContainer,
    PostStopPodSandbox,
}

impl HookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::PreRunPodSandbox => "PreRunPodSandbox",
            HookType::PreStartContainer => "PreStartContainer",
            HookType::PostStopPodSandbox => "PostStopPodSandbox",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRequest {
    pub hook: HookType,
    #[serde(default)]
    pub pod_uid: String,
    #[serde(default)]
    pub qos_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ColocationStrategy>,
}

impl HookResponse {
    fn deny(reason: impl Into<String>, strategy: Option<ColocationStrategy>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            strategy,
        }
    }
}

/// State shared by every hook connection
#[derive(Clone)]
pub struct HookContext {
    pub node_name: String,
    pub store: Arc<StrategyStore>,
    pub nodes: Arc<NodeCache>,
    pub metrics: ColocationMetrics,
    pub logger: StructuredLogger,
}

impl HookContext {
    /// Strategy currently resolved for this node, if any
    fn local_strategy(&self) -> Option<ColocationStrategy> {
        let node = self.nodes.get(&self.node_name).ok()?;
        self.store.resolve(&node).ok().map(|r| r.resolution.strategy)
    }

    /// Decide a single hook request
    pub fn handle(&self, request: &HookRequest) -> HookResponse {
        let response = match request.hook {
            HookType::PostStopPodSandbox => HookResponse {
                allowed: true,
                reason: None,
                strategy: None,
            },
            HookType::PreRunPodSandbox | HookType::PreStartContainer => {
                let strategy = self.local_strategy();
                let best_effort = request.qos_class == BEST_EFFORT_QOS;
                match strategy {
                    None if best_effort => HookResponse::deny(
                        format!("no colocation strategy available for node {}", self.node_name),
                        None,
                    ),
                    Some(s) if best_effort && !s.is_enabled() => HookResponse::deny(
                        format!("colocation disabled on node {}", self.node_name),
                        Some(s),
                    ),
                    strategy => HookResponse {
                        allowed: true,
                        reason: None,
                        strategy,
                    },
                }
            }
        };

        self.metrics
            .inc_hook_request(request.hook.as_str(), response.allowed);
        self.logger.log_hook_decision(
            request.hook.as_str(),
            &request.pod_uid,
            &request.qos_class,
            response.allowed,
        );
        response
    }

    fn handle_line(&self, line: &str) -> HookResponse {
        match serde_json::from_str::<HookRequest>(line) {
            Ok(request) => self.handle(&request),
            Err(e) => HookResponse::deny(format!("malformed hook request: {}", e), None),
        }
    }
}

trait HookStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> HookStream for T {}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

impl Listener {
    async fn accept(&self) -> std::io::Result<Box<dyn HookStream>> {
        match self {
            Listener::Tcp(l) => {
                let (stream, _) = l.accept().await?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            Listener::Unix(l, _) => {
                let (stream, _) = l.accept().await?;
                Ok(Box::new(stream))
            }
        }
    }

    /// Remove the socket file of a unix listener
    fn cleanup(&self) {
        match self {
            Listener::Tcp(_) => {}
            #[cfg(unix)]
            Listener::Unix(_, path) => {
                if let Err(e) = std::fs::remove_file(path) {
                    debug!(path = %path.display(), error = %e, "Failed to remove hook socket");
                }
            }
        }
    }
}

/// Hook server before binding
pub struct RuntimeHookServer {
    config: HookServerConfig,
    context: HookContext,
}

impl RuntimeHookServer {
    pub fn new(config: HookServerConfig, context: HookContext) -> Result<Self, HookError> {
        config.validate()?;
        Ok(Self { config, context })
    }

    /// Bind the listener
    pub async fn bind(self) -> Result<BoundHookServer, HookError> {
        let listener = match self.config.network {
            HookNetwork::Tcp => Listener::Tcp(TcpListener::bind(self.config.tcp_addr()?).await?),
            #[cfg(unix)]
            HookNetwork::Unix => {
                let path = PathBuf::from(&self.config.addr);
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                remove_stale_socket(&path)?;
                Listener::Unix(UnixListener::bind(&path)?, path)
            }
            #[cfg(not(unix))]
            HookNetwork::Unix => {
                return Err(HookError::UnsupportedNetwork(HookNetwork::Unix.to_string()))
            }
        };

        info!(
            network = %self.config.network,
            addr = %self.config.addr,
            "Runtime hook server listening"
        );

        Ok(BoundHookServer {
            listener,
            context: self.context,
        })
    }

    /// Bind and serve until `shutdown` fires
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), HookError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// Remove a socket left behind by a previous run; anything else is kept
#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> Result<(), HookError> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(HookError::NotASocket(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Hook server with a bound listener
pub struct BoundHookServer {
    listener: Listener,
    context: HookContext,
}

impl BoundHookServer {
    /// Local address for tcp listeners
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Listener::Tcp(l) => l.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(..) => None,
        }
    }

    /// Serve connections until `shutdown` fires, then drain in-flight ones
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), HookError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Stopping runtime hook server");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(stream) => {
                        let context = self.context.clone();
                        let stop = stop_rx.clone();
                        connections.spawn(serve_connection(stream, context, stop));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept hook connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}

        self.listener.cleanup();
        Ok(())
    }
}

enum Frame {
    Line(String),
    Oversized,
    Eof,
}

/// Read one newline-terminated request of at most [`MAX_HOOK_LINE_BYTES`]
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_HOOK_LINE_BYTES as u64 + 1;
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_HOOK_LINE_BYTES {
        return Ok(Frame::Oversized);
    }
    Ok(Frame::Line(String::from_utf8_lossy(buf).into_owned()))
}

async fn write_response<W>(writer: &mut W, response: &HookResponse) -> bool
where
    W: AsyncWrite + Unpin,
{
    let mut payload = match serde_json::to_vec(response) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Failed to encode hook response");
            return false;
        }
    };
    payload.push(b'\n');
    if let Err(e) = writer.write_all(&payload).await {
        debug!(error = %e, "Hook connection write failed");
        return false;
    }
    true
}

async fn serve_connection(
    stream: Box<dyn HookStream>,
    context: HookContext,
    mut stop: watch::Receiver<bool>,
) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            frame = read_frame(&mut reader, &mut buf) => {
                let line = match frame {
                    Ok(Frame::Line(line)) => line,
                    Ok(Frame::Eof) => break,
                    Ok(Frame::Oversized) => {
                        warn!(limit = MAX_HOOK_LINE_BYTES, "Hook request too long, closing connection");
                        let response = HookResponse::deny(
                            format!("hook request exceeds {} bytes", MAX_HOOK_LINE_BYTES),
                            None,
                        );
                        write_response(&mut writer, &response).await;
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "Hook connection read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = context.handle_line(&line);
                if !write_response(&mut writer, &response).await {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColocationConfig, NodeColocationConfig};
    use crate::nodes::new_node;
    #[cfg(unix)]
    use tempfile::TempDir;

    fn context(zone: &str) -> HookContext {
        let store = Arc::new(StrategyStore::new(ColocationConfig::default().with_node_config(
            NodeColocationConfig::for_labels(
                [("zone", "a")],
                ColocationStrategy {
                    enable: Some(true),
                    ..Default::default()
                },
            ),
        )));
        let nodes = Arc::new(NodeCache::new());
        nodes
            .upsert(new_node(
                "node-1",
                [("zone".to_string(), zone.to_string())].into_iter().collect(),
            ))
            .unwrap();

        HookContext {
            node_name: "node-1".to_string(),
            store,
            nodes,
            metrics: ColocationMetrics::new(),
            logger: StructuredLogger::new("node-1"),
        }
    }

    fn request(hook: HookType, qos: &str) -> HookRequest {
        HookRequest {
            hook,
            pod_uid: "uid-1".to_string(),
            qos_class: qos.to_string(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(HookServerConfig::new("tcp", ":0").is_ok());
        assert!(HookServerConfig::new("tcp", "127.0.0.1:9318").is_ok());
        assert!(HookServerConfig::new("unix", "/tmp/hooks.sock").is_ok());
        assert!(matches!(
            HookServerConfig::new("udp", ":0"),
            Err(HookError::UnsupportedNetwork(_))
        ));
        assert!(matches!(
            HookServerConfig::new("unix", " "),
            Err(HookError::EmptyAddress)
        ));
        assert!(matches!(
            HookServerConfig::new("tcp", "not-an-addr"),
            Err(HookError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_best_effort_admitted_when_enabled() {
        let ctx = context("a");
        let response = ctx.handle(&request(HookType::PreRunPodSandbox, BEST_EFFORT_QOS));
        assert!(response.allowed);
        assert_eq!(response.strategy.and_then(|s| s.enable), Some(true));
    }

    #[test]
    fn test_best_effort_denied_when_disabled() {
        let ctx = context("b");
        let response = ctx.handle(&request(HookType::PreRunPodSandbox, BEST_EFFORT_QOS));
        assert!(!response.allowed);
        assert!(response.reason.unwrap().contains("disabled"));

        // Latency-sensitive pods are unaffected
        assert!(ctx.handle(&request(HookType::PreRunPodSandbox, "LS")).allowed);
        assert!(ctx
            .handle(&request(HookType::PostStopPodSandbox, BEST_EFFORT_QOS))
            .allowed);
    }

    #[test]
    fn test_best_effort_denied_for_unknown_node() {
        let mut ctx = context("a");
        ctx.node_name = "other".to_string();
        let response = ctx.handle(&request(HookType::PreStartContainer, BEST_EFFORT_QOS));
        assert!(!response.allowed);
        assert!(response.strategy.is_none());
    }

    #[test]
    fn test_malformed_request() {
        let ctx = context("a");
        let response = ctx.handle_line(r#"{"hook": "Unknown"}"#);
        assert!(!response.allowed);
        assert!(response.reason.unwrap().starts_with("malformed"));
    }

    async fn exchange<S>(stream: S, line: &str) -> HookResponse
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        let mut lines = BufReader::new(reader).lines();
        let reply = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_run_as_tcp_server() {
        let config = HookServerConfig::new("tcp", "127.0.0.1:0").unwrap();
        let server = RuntimeHookServer::new(config, context("a"))
            .unwrap()
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.serve(shutdown_rx));

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let response = exchange(
            stream,
            r#"{"hook":"PreRunPodSandbox","podUid":"p1","qosClass":"BE"}"#,
        )
        .await;
        assert!(response.allowed);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_with_idle_connection() {
        let config = HookServerConfig::new("tcp", "127.0.0.1:0").unwrap();
        let server = RuntimeHookServer::new(config, context("a"))
            .unwrap()
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.serve(shutdown_rx));

        // Held open without sending anything
        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server should stop with idle connections open")
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_as_unix_socket() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colocation.sock");

        let config = HookServerConfig::new("unix", path.to_string_lossy()).unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = RuntimeHookServer::new(config, context("b")).unwrap().bind().await.unwrap();
        let handle = tokio::spawn(server.serve(shutdown_rx));

        let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
        let response = exchange(
            stream,
            r#"{"hook":"PreRunPodSandbox","podUid":"p1","qosClass":"BE"}"#,
        )
        .await;
        assert!(!response.allowed);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_stops_immediately() {
        let config = HookServerConfig::new("tcp", "127.0.0.1:0").unwrap();
        let server = RuntimeHookServer::new(config, context("a")).unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();
        server.run(shutdown_rx).await.unwrap();
    }

    type ServerHandle = tokio::task::JoinHandle<Result<(), HookError>>;

    async fn spawn_tcp_server() -> (SocketAddr, broadcast::Sender<()>, ServerHandle) {
        let config = HookServerConfig::new("tcp", "127.0.0.1:0").unwrap();
        let server = RuntimeHookServer::new(config, context("a"))
            .unwrap()
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.serve(shutdown_rx));
        (addr, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn test_connection_survives_malformed_line() {
        let (addr, shutdown_tx, handle) = spawn_tcp_server().await;

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        writer
            .write_all(b"{ not json\n{\"hook\":\"PreRunPodSandbox\",\"podUid\":\"p1\",\"qosClass\":\"BE\"}\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(reader).lines();
        let first: HookResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(!first.allowed);
        assert!(first.reason.unwrap().starts_with("malformed"));

        let second: HookResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(second.allowed);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let (addr, shutdown_tx, handle) = spawn_tcp_server().await;

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        // One byte past the limit and no newline
        writer
            .write_all(&vec![b'x'; MAX_HOOK_LINE_BYTES + 1])
            .await
            .unwrap();

        let mut lines = BufReader::new(reader).lines();
        let reply: HookResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(!reply.allowed);
        assert!(reply.reason.unwrap().contains("exceeds"));
        // Connection is closed afterwards
        assert!(lines.next_line().await.unwrap().is_none());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let mut input = std::io::Cursor::new({
            let mut bytes = vec![b' '; MAX_HOOK_LINE_BYTES];
            bytes.push(b'\n');
            bytes.extend_from_slice(b"tail");
            bytes
        });
        let mut buf = Vec::new();

        match read_frame(&mut input, &mut buf).await.unwrap() {
            Frame::Line(line) => assert_eq!(line.len(), MAX_HOOK_LINE_BYTES),
            _ => panic!("expected a full line"),
        }
        match read_frame(&mut input, &mut buf).await.unwrap() {
            Frame::Line(line) => assert_eq!(line, "tail"),
            _ => panic!("expected trailing line"),
        }
        assert!(matches!(read_frame(&mut input, &mut buf).await.unwrap(), Frame::Eof));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colocation.sock");
        let _stale = std::os::unix::net::UnixListener::bind(&path).unwrap();

        let config = HookServerConfig::new("unix", path.to_string_lossy()).unwrap();
        let server = RuntimeHookServer::new(config, context("a")).unwrap().bind().await.unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.serve(shutdown_rx));

        let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
        let response = exchange(
            stream,
            r#"{"hook":"PreRunPodSandbox","podUid":"p1","qosClass":"BE"}"#,
        )
        .await;
        assert!(response.allowed);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_keeps_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colocation.sock");
        std::fs::write(&path, b"keep me").unwrap();

        let config = HookServerConfig::new("unix", path.to_string_lossy()).unwrap();
        let result = RuntimeHookServer::new(config, context("a")).unwrap().bind().await;

        assert!(matches!(result, Err(HookError::NotASocket(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }
}
