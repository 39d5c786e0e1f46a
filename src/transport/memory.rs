//! In-process transport for tests and embedding
//!
//! `MemoryTransport::pair()` returns the client-side transport and a
//! `MemoryServer`. Every successful `connect` hands the server a
//! `MemoryPeer` that can push frames to the client and read the actions
//! it sends. Dropping the peer closes that connection.

use super::{Connection, FrameSink, FrameStream, Transport};
use crate::error::{ChatError, Result};
use crate::protocol::OutboundAction;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Client side of an in-memory transport
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusals: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

/// Server side of an in-memory transport
#[derive(Debug)]
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    refusals: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

/// One accepted connection, seen from the server
#[derive(Debug)]
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// Create a connected transport/server pair
    pub fn pair() -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let refusals = Arc::new(AtomicUsize::new(0));
        let connects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                accept_tx,
                refusals: Arc::clone(&refusals),
                connects: Arc::clone(&connects),
            },
            MemoryServer {
                accept_rx,
                refusals,
                connects,
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChatError::Connection("connection refused".to_string()));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        self.accept_tx
            .send(MemoryPeer {
                to_client,
                from_client,
            })
            .map_err(|_| ChatError::Connection("memory server dropped".to_string()))?;

        Ok(Connection::new(
            MemorySink {
                tx: Some(client_tx),
            },
            MemoryStream { rx: client_rx },
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl MemoryServer {
    /// Wait for the next client connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    /// Total connection attempts, including refused ones
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl MemoryPeer {
    /// Push a raw text frame to the client. Returns false if it hung up.
    pub fn send_frame(&self, raw: impl Into<String>) -> bool {
        self.to_client.send(raw.into()).is_ok()
    }

    /// Push a JSON frame to the client
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_frame(value.to_string())
    }

    /// Next raw frame from the client, `None` once it closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame from the client, decoded as an action
    pub async fn recv_action(&mut self) -> Option<OutboundAction> {
        let raw = self.recv().await?;
        serde_json::from_str(&raw).ok()
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(ChatError::Closed)?;
        tx.send(text)
            .map_err(|_| ChatError::Connection("peer closed".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let (transport, mut server) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        let mut peer = server.accept().await.unwrap();

        conn.sink
            .send(r#"{"action":"new_session"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(peer.recv_action().await, Some(OutboundAction::NewSession));

        assert!(peer.send_json(&serde_json::json!({"type": "done"})));
        assert_eq!(
            conn.stream.next_frame().await.unwrap().as_deref(),
            Some(r#"{"type":"done"}"#)
        );
    }

    #[tokio::test]
    async fn test_peer_drop_ends_stream() {
        let (transport, mut server) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        drop(server.accept().await.unwrap());

        assert_eq!(conn.stream.next_frame().await.unwrap(), None);
        assert!(conn.sink.send("x".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_client_close_ends_peer() {
        let (transport, mut server) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        let mut peer = server.accept().await.unwrap();

        conn.sink.close().await.unwrap();
        assert_eq!(peer.recv().await, None);
        assert!(matches!(
            conn.sink.send("x".to_string()).await,
            Err(ChatError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_refuse_next() {
        let (transport, server) = MemoryTransport::pair();
        server.refuse_next(2);

        assert!(transport.connect().await.unwrap_err().is_transport());
        assert_err!(transport.connect().await);
        assert_ok!(transport.connect().await);
        assert_eq!(server.connect_attempts(), 3);
    }
}
