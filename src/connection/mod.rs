//! CAT connection manager
//!
//! Owns the TCP stream to the CAT server and keeps it alive forever:
//!
//! ```text
//! Disconnected ──▶ Connecting ──ok──▶ Connected ──error/close──▶ Disconnected
//!      ▲               │                                              │
//!      └──fail─────────┘◀──────────── fixed reconnect delay ◀─────────┘
//! ```
//!
//! A single task drives the loop, so there is never more than one connect
//! attempt in flight. Inbound bytes and lifecycle changes are reported as
//! [`ConnectionEvent`]s; the dispatcher replays the read-requests on every
//! `Connected`. Writes go through a cloneable [`ConnectionHandle`] and are
//! dropped (not queued) while the link is down.

mod status;

pub use status::{ConnectionState, ConnectionStatus, StatusCallback};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cat::CatCommand;
use crate::config::CatConfig;
use crate::error::{CatError, Result};

/// Socket read buffer size
const READ_BUFFER_SIZE: usize = 1024;

/// Lifecycle and data events emitted by the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Stream is open; the device should be re-synchronized
    Connected,
    /// Raw inbound chunk, in arrival order
    Data(Bytes),
    /// Stream closed or failed; a reconnect is scheduled
    Disconnected,
}

/// State shared between the connection task and its handles
struct Shared {
    state: RwLock<ConnectionState>,
    current_status: RwLock<ConnectionStatus>,
    status_callbacks: RwLock<Vec<StatusCallback>>,
    /// Outbound queue of the live session, `None` while disconnected
    writer_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        match state {
            ConnectionState::Connected => self.emit_status(ConnectionStatus::Connected),
            ConnectionState::Disconnected => self.emit_status(ConnectionStatus::Disconnected),
            ConnectionState::Connecting => {}
        }
    }

    /// Emit connection status to all subscribers
    fn emit_status(&self, status: ConnectionStatus) {
        *self.current_status.write() = status.clone();
        for callback in self.status_callbacks.read().iter() {
            callback(status.clone());
        }
    }
}

/// Cloneable handle for sending commands and observing the link
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Send a command, fire-and-forget
    ///
    /// Returns `false` when the command was dropped because the link is not
    /// connected. Nothing is queued for a later connection.
    pub fn send(&self, command: &CatCommand) -> bool {
        let wire = command.to_wire();

        if *self.shared.state.read() != ConnectionState::Connected {
            debug!("CAT TX dropped (not connected): {}", wire);
            return false;
        }

        let guard = self.shared.writer_tx.lock();
        match guard.as_ref() {
            Some(tx) if tx.send(Bytes::from(wire.clone())).is_ok() => {
                debug!("➡️ CAT TX: {}", wire);
                true
            }
            _ => {
                debug!("CAT TX dropped (session closing): {}", wire);
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.current_status.read().clone()
    }

    /// Subscribe to connection status changes
    pub fn subscribe_status(&self, callback: StatusCallback) {
        self.shared.status_callbacks.write().push(callback);
    }

    /// Stop the connection task and close the stream
    pub fn shutdown(&self) {
        let _ = self.shared.shutdown_tx.send(true);
    }
}

/// Connection manager for one CAT server
pub struct CatConnection {
    config: CatConfig,
    shared: Arc<Shared>,
    shutdown_rx: watch::Receiver<bool>,
}

impl CatConnection {
    /// Create a connection manager; nothing is opened until [`spawn`](Self::spawn)
    pub fn new(config: CatConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                current_status: RwLock::new(ConnectionStatus::Disconnected),
                status_callbacks: RwLock::new(Vec::new()),
                writer_tx: Mutex::new(None),
                shutdown_tx,
            }),
            shutdown_rx,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the connect/reconnect loop
    pub fn spawn(
        self,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run(events));
        (handle, task)
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    async fn run(mut self, events: mpsc::UnboundedSender<ConnectionEvent>) {
        let addr = self.config.addr();
        let delay = self.config.reconnect_delay();
        let mut attempt = 0usize;

        loop {
            if self.is_shutdown() {
                break;
            }

            self.shared.set_state(ConnectionState::Connecting);
            debug!("Connecting to CAT server at {}", addr);

            let connected = tokio::select! {
                res = connect(&addr, self.config.connect_timeout()) => res,
                _ = self.shutdown_rx.changed() => break,
            };

            match connected {
                Ok(stream) => {
                    attempt = 0;
                    info!("✅ Connected to CAT server at {}", addr);
                    self.run_session(stream, &events).await;
                }
                Err(e) => {
                    warn!("❌ CAT error: {}", e);
                    self.shared.set_state(ConnectionState::Disconnected);
                }
            }

            if self.is_shutdown() {
                break;
            }

            attempt += 1;
            self.shared
                .emit_status(ConnectionStatus::Reconnecting { attempt });
            info!(
                "⚠️ CAT connection closed. Reconnecting in {}ms (attempt #{})...",
                delay.as_millis(),
                attempt
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => {}
            }
        }

        self.shared.set_state(ConnectionState::Disconnected);
        debug!("CAT connection task stopped");
    }

    /// Pump one connected stream until it fails, closes or shutdown is requested
    async fn run_session(
        &mut self,
        stream: TcpStream,
        events: &mpsc::UnboundedSender<ConnectionEvent>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            trace!("Failed to set TCP_NODELAY: {}", e);
        }
        let (mut reader, mut writer) = stream.into_split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        *self.shared.writer_tx.lock() = Some(tx);
        self.shared.set_state(ConnectionState::Connected);
        let _ = events.send(ConnectionEvent::Connected);

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let reason = loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => break "closed by server".to_string(),
                    Ok(n) => {
                        debug!("📡 CAT RX: {}", String::from_utf8_lossy(&buf[..n]).trim());
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        let _ = events.send(ConnectionEvent::Data(chunk));
                    }
                    Err(e) => break format!("read error: {}", e),
                },
                Some(frame) = rx.recv() => {
                    if let Err(e) = writer.write_all(&frame).await {
                        break format!("write error: {}", e);
                    }
                }
                _ = self.shutdown_rx.changed() => break "shutdown".to_string(),
            }
        };

        *self.shared.writer_tx.lock() = None;
        self.shared.set_state(ConnectionState::Disconnected);
        let _ = writer.shutdown().await;

        debug!("CAT session ended: {}", reason);
        let _ = events.send(ConnectionEvent::Disconnected);
    }
}

/// Open the stream, bounded by the connect timeout
async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(CatError::Io(e)),
        Err(_) => Err(CatError::ConnectTimeout {
            addr: addr.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn test_config(port: u16) -> CatConfig {
        CatConfig {
            host: "127.0.0.1".to_string(),
            port,
            reconnect_delay_ms: 50,
            connect_timeout_ms: 500,
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for connection event")
            .expect("event channel closed")
    }

    #[test]
    fn test_send_dropped_while_disconnected() {
        let conn = CatConnection::new(test_config(1));
        let handle = conn.handle();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!handle.send(&CatCommand::Read { tag: "FA" }));
    }

    #[tokio::test]
    async fn test_connect_send_and_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (handle, task) = CatConnection::new(test_config(port)).spawn(tx);

        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Connected);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.status(), ConnectionStatus::Connected);

        assert!(handle.send(&CatCommand::Read { tag: "FA" }));
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"FA;");

        server.write_all(b"FA00014200000;").await.unwrap();
        let mut received = Vec::new();
        while received.len() < 14 {
            match next_event(&mut rx).await {
                ConnectionEvent::Data(chunk) => received.extend_from_slice(&chunk),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(received, b"FA00014200000;");

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = CatConnection::new(test_config(port));
        let recorded = Arc::clone(&statuses);
        conn.handle()
            .subscribe_status(Arc::new(move |s| recorded.lock().push(s)));
        let (handle, task) = conn.spawn(tx);

        let (server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Connected);

        drop(server);
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
        assert!(!handle.send(&CatCommand::BandUp));

        let (_server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Connected);

        assert!(statuses
            .lock()
            .contains(&ConnectionStatus::Reconnecting { attempt: 1 }));

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_retries_forever_while_server_absent() {
        // Reserve a port, then free it so connects are refused
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = CatConnection::new(test_config(port));
        let recorded = Arc::clone(&statuses);
        conn.handle()
            .subscribe_status(Arc::new(move |s| recorded.lock().push(s)));
        let (handle, task) = conn.spawn(tx);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(statuses
            .lock()
            .contains(&ConnectionStatus::Reconnecting { attempt: 3 }));
        assert_ne!(handle.state(), ConnectionState::Connected);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}
