//! Transport abstraction for the chat channel
//!
//! A `Transport` opens connections; each `Connection` is split into a
//! sending half and a receiving half of UTF-8 text frames so the channel
//! can read and write concurrently.
//!
//! - [`memory`] — in-process transport with a scriptable server peer
//! - [`ws`] — WebSocket transport via `tokio-tungstenite`

pub mod memory;
pub mod ws;

pub use memory::{MemoryPeer, MemoryServer, MemoryTransport};
pub use ws::WsTransport;

use crate::error::Result;
use async_trait::async_trait;

/// Opens connections to a chat server
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Establish a new connection
    async fn connect(&self) -> Result<Connection>;

    /// Transport name for logging (e.g., "ws", "memory")
    fn name(&self) -> &str;
}

/// Sending half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection from the client side
    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of a connection
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame, or `None` once the peer closed the connection
    async fn next_frame(&mut self) -> Result<Option<String>>;
}

/// An established connection
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

impl Connection {
    pub fn new(sink: impl FrameSink + 'static, stream: impl FrameStream + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            stream: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
