//! WebSocket transport

use super::{Connection, FrameSink, FrameStream, Transport};
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for `ws://` and `wss://` endpoints
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Connection> {
        let (socket, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| {
                ChatError::Connection(format!("Failed to connect to {}: {}", self.url, e))
            })?;
        tracing::debug!(
            url = %self.url,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        let (sender, receiver) = socket.split();
        Ok(Connection::new(
            WsSink { inner: sender },
            WsFrames { inner: receiver },
        ))
    }

    fn name(&self) -> &str {
        "ws"
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| ChatError::Connection(format!("WebSocket send failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| ChatError::Connection(format!("WebSocket close failed: {}", e)))
    }
}

struct WsFrames {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        while let Some(msg) = self.inner.next().await {
            let msg = msg
                .map_err(|e| ChatError::Connection(format!("WebSocket receive failed: {}", e)))?;
            match msg {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    tracing::debug!(frame = ?frame, "WebSocket closed by server");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}
