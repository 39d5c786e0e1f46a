//! Transport channel — a reconnecting text-frame pipe
//!
//! `Channel::open` spawns a background task that owns the connection. The
//! task connects through a `Transport`, forwards inbound frames in arrival
//! order, writes queued outbound frames, and reconnects with a fixed
//! backoff when the connection drops. Everything crosses the task boundary
//! through channels; connection state is published on a `watch`.

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::transport::{Connection, Transport};
use crate::types::ConnectionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

/// Depth of the outbound queue
const OUTBOUND_CAPACITY: usize = 64;

/// Reconnect and send policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub reconnect_backoff: Duration,
    pub max_reconnect_attempts: Option<u32>,
    pub send_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for ChannelOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            reconnect_backoff: config.reconnect_backoff(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            send_timeout: config.send_timeout(),
        }
    }
}

/// An outbound frame and the slot its write result goes to
type Outgoing = (String, oneshot::Sender<Result<()>>);

/// Handle to a background connection
pub struct Channel {
    outbound_tx: mpsc::Sender<Outgoing>,
    inbound_rx: mpsc::UnboundedReceiver<String>,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    send_timeout: Duration,
}

impl Channel {
    /// Start connecting in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(transport: Arc<dyn Transport>, options: ChannelOptions) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let send_timeout = options.send_timeout;

        let task = tokio::spawn(
            ConnectionTask {
                transport,
                options,
                inbound_tx,
                outbound_rx,
                status_tx,
                shutdown_rx,
            }
            .run(),
        );

        Self {
            outbound_tx,
            inbound_rx,
            status_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            send_timeout,
        }
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Receiver for status changes
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Stream of status values, starting with the current one
    pub fn status_stream(&self) -> WatchStream<ConnectionStatus> {
        WatchStream::new(self.status_rx.clone())
    }

    /// Next inbound text frame
    ///
    /// Returns `None` once the channel is closed for good.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound_rx.recv().await
    }

    /// Send a text frame
    ///
    /// Waits for an open connection, bounded by the send timeout. Fails
    /// with `ChatError::Closed` once the channel has closed.
    pub async fn send(&self, text: String) -> Result<()> {
        let timeout = self.send_timeout;
        tokio::time::timeout(timeout, self.send_when_open(text))
            .await
            .map_err(|_| {
                ChatError::Timeout(format!("send did not complete within {:?}", timeout))
            })?
    }

    async fn send_when_open(&self, text: String) -> Result<()> {
        self.wait_open().await?;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.outbound_tx
            .send((text, ack_tx))
            .await
            .map_err(|_| ChatError::Closed)?;
        ack_rx.await.map_err(|_| ChatError::Closed)?
    }

    /// Wait until the connection is open
    pub async fn wait_open(&self) -> Result<()> {
        let mut rx = self.status_rx.clone();
        loop {
            match *rx.borrow_and_update() {
                ConnectionStatus::Open => return Ok(()),
                ConnectionStatus::Closed => return Err(ChatError::Closed),
                ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {}
            }
            rx.changed().await.map_err(|_| ChatError::Closed)?;
        }
    }

    /// Close the connection and stop reconnecting
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Channel task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// How a live connection ended
enum Ended {
    Lost,
    Shutdown,
}

struct ConnectionTask {
    transport: Arc<dyn Transport>,
    options: ChannelOptions,
    inbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: mpsc::Receiver<Outgoing>,
    status_tx: watch::Sender<ConnectionStatus>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl ConnectionTask {
    async fn run(mut self) {
        let transport = self.transport.name().to_string();
        let mut failures: u32 = 0;

        loop {
            let connected = tokio::select! {
                _ = &mut self.shutdown_rx => break,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(connection) => {
                    failures = 0;
                    tracing::info!(transport = %transport, "Chat connection open");
                    self.set_status(ConnectionStatus::Open);
                    match self.pump(connection).await {
                        Ended::Shutdown => break,
                        Ended::Lost => {
                            tracing::warn!(transport = %transport, "Chat connection lost");
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        transport = %transport,
                        attempt = failures,
                        error = %e,
                        "Chat connection failed"
                    );
                    if self
                        .options
                        .max_reconnect_attempts
                        .is_some_and(|max| failures >= max)
                    {
                        tracing::warn!(
                            transport = %transport,
                            attempts = failures,
                            "Giving up on reconnecting"
                        );
                        break;
                    }
                }
            }

            self.set_status(ConnectionStatus::Reconnecting);
            tokio::select! {
                _ = &mut self.shutdown_rx => break,
                _ = tokio::time::sleep(self.options.reconnect_backoff) => {}
            }
        }

        self.set_status(ConnectionStatus::Closed);
        tracing::info!(transport = %transport, "Chat channel closed");
    }

    async fn pump(&mut self, connection: Connection) -> Ended {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        let ended = loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => break Ended::Shutdown,
                frame = stream.next_frame() => match frame {
                    Ok(Some(text)) => {
                        if self.inbound_tx.send(text).is_err() {
                            break Ended::Shutdown;
                        }
                    }
                    Ok(None) => break Ended::Lost,
                    Err(e) => {
                        tracing::warn!(error = %e, "Receive failed");
                        break Ended::Lost;
                    }
                },
                outgoing = self.outbound_rx.recv() => match outgoing {
                    Some((text, ack)) => {
                        let result = sink.send(text).await;
                        let failed = result.is_err();
                        let _ = ack.send(result);
                        if failed {
                            break Ended::Lost;
                        }
                    }
                    None => break Ended::Shutdown,
                },
            }
        };

        if matches!(ended, Ended::Shutdown) {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Close failed");
            }
        }
        ended
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?status, "Channel status");
            *current = status;
            true
        });
    }
}
