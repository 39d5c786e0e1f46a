//! # a3s-chat
//!
//! Client-side session protocol and conversation state machine for A3S
//! agent chat.
//!
//! ## Overview
//!
//! `a3s-chat` connects to an agent's streaming chat socket, folds the
//! server's frames (`delta`, `event`, `done`, ...) into an ordered list of
//! conversation turns, and paces bursty reasoning text into a readable
//! word window. It renders nothing: consumers read `Turn`s, the reasoning
//! window and connection status, and draw them however they like.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_chat::{ChatClient, ChatConfig, ChatUpdate};
//!
//! # async fn example() -> a3s_chat::Result<()> {
//! let mut client = ChatClient::connect(&ChatConfig::from_env()?)?;
//! client.new_session().await?;
//! client.send("What's the weather in Paris?").await?;
//!
//! loop {
//!     match client.next_update().await {
//!         ChatUpdate::Frame(outcome) if outcome.conversation_changed => {
//!             if let Some(turn) = client.session().turns().last() {
//!                 println!("{:?}: {}", turn.role, turn.content);
//!             }
//!         }
//!         ChatUpdate::Reasoning => {
//!             let words: Vec<_> = client
//!                 .session()
//!                 .reasoning_window()
//!                 .iter()
//!                 .map(|w| w.text.as_str())
//!                 .collect();
//!             println!("… {}", words.join(" "));
//!         }
//!         ChatUpdate::Closed => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **ws** — WebSocket via `tokio-tungstenite`
//! - **memory** — in-process pair with a scriptable server peer, for tests
//!
//! ## Architecture
//!
//! - **Channel** — background connection task with fixed-backoff reconnect
//! - **protocol** — typed inbound frames and outbound actions
//! - **Conversation** — reducer from frames to turns
//! - **ReasoningTicker** — timer-driven word cursor over reasoning text
//! - **ChatSession** — synchronous controller binding reducer and ticker
//! - **ChatClient** — async run loop, model refresh and preferences

pub mod api;
pub mod channel;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod prefs;
pub mod protocol;
pub mod reducer;
pub mod session;
pub mod ticker;
pub mod transport;
pub mod types;

// Re-export core types
pub use api::{AgentApi, HttpAgentApi, MemoryAgentApi};
pub use channel::{Channel, ChannelOptions};
pub use client::{ChatClient, ChatUpdate};
pub use commands::SlashCommand;
pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use protocol::{decode_frame, encode_action, AgentEvent, EventFrame, InboundFrame, OutboundAction};
pub use reducer::{Conversation, ReducerEffect, SendIntent};
pub use session::{ChatSession, ChatSnapshot, FrameOutcome};
pub use ticker::{
    ManualScheduler, ReasoningTicker, Tick, TickScheduler, TickerConfig, TimerHandle,
    TokioScheduler,
};
pub use transport::{Connection, MemoryPeer, MemoryServer, MemoryTransport, Transport, WsTransport};
pub use types::{
    ConnectionStatus, ModelInfo, ModelList, Role, SessionInfo, SkillInfo, ToolCall, ToolStatus,
    Turn, WindowWord,
};
