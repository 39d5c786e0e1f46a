//! Session controller — binds the reducer to the reasoning ticker
//!
//! `ChatSession` is the synchronous core of a chat client. It has no I/O:
//! it consumes inbound frames and ticks, produces outbound actions, and
//! exposes read-only state for rendering. The async `ChatClient` drives it
//! from a single run loop.

use crate::commands;
use crate::error::{ChatError, Result};
use crate::protocol::{decode_frame, InboundFrame, OutboundAction};
use crate::reducer::{Conversation, ReducerEffect};
use crate::ticker::{ReasoningTicker, Tick, TickScheduler, TickerConfig};
use crate::types::{ConnectionStatus, ModelInfo, ModelList, SessionInfo, Turn, WindowWord};
use serde::Serialize;
use std::sync::Arc;

/// What changed while applying a frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Turns, thinking flag, tools or status text may have changed
    pub conversation_changed: bool,

    /// The reasoning window changed
    pub reasoning_changed: bool,

    /// The model list should be refreshed
    pub refresh_models: bool,

    /// The server announced (created or resumed) this session
    pub session_announced: Option<String>,
}

/// A ticker and the reply it belongs to
struct BoundTicker {
    ticker: ReasoningTicker,

    /// Owning open reply; `None` for replay
    reply_id: Option<String>,
}

/// Serializable view of the session for renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub turns: Vec<Turn>,
    pub status: ConnectionStatus,
    pub thinking: bool,
    pub active_tools: Vec<String>,
    pub reasoning_window: Vec<WindowWord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Synchronous chat session controller
pub struct ChatSession {
    conversation: Conversation,
    ticker: Option<BoundTicker>,
    ticker_config: TickerConfig,
    scheduler: Arc<dyn TickScheduler>,
    next_epoch: u64,
    status: ConnectionStatus,
    session: Option<SessionInfo>,
    model: Option<String>,
    models: Vec<ModelInfo>,
}

impl ChatSession {
    /// Create a session whose tickers schedule through `scheduler`
    pub fn new(ticker_config: TickerConfig, scheduler: Arc<dyn TickScheduler>) -> Self {
        Self {
            conversation: Conversation::new(),
            ticker: None,
            ticker_config,
            scheduler,
            next_epoch: 1,
            status: ConnectionStatus::default(),
            session: None,
            model: None,
            models: Vec::new(),
        }
    }

    // ─── Read-only state ───

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_thinking(&self) -> bool {
        self.conversation.is_thinking()
    }

    pub fn is_streaming(&self) -> bool {
        self.conversation.is_streaming()
    }

    pub fn active_tools(&self) -> Vec<&str> {
        self.conversation.active_tools()
    }

    /// Current reasoning window (empty when no ticker is live)
    pub fn reasoning_window(&self) -> &[WindowWord] {
        self.ticker
            .as_ref()
            .map(|bound| bound.ticker.window())
            .unwrap_or(&[])
    }

    pub fn ticker(&self) -> Option<&ReasoningTicker> {
        self.ticker.as_ref().map(|bound| &bound.ticker)
    }

    pub fn status_text(&self) -> Option<&str> {
        self.conversation.status_text()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// Capture the renderable state
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            turns: self.turns().to_vec(),
            status: self.status,
            thinking: self.is_thinking(),
            active_tools: self
                .active_tools()
                .into_iter()
                .map(str::to_string)
                .collect(),
            reasoning_window: self.reasoning_window().to_vec(),
            status_text: self.status_text().map(str::to_string),
            session: self.session.clone(),
            model: self.model.clone(),
        }
    }

    // ─── Inbound ───

    /// Decode and apply a raw text frame
    ///
    /// Malformed frames fail with `ChatError::Protocol` and leave all
    /// state untouched.
    pub fn handle_text(&mut self, raw: &str) -> Result<FrameOutcome> {
        let frame = decode_frame(raw)?;
        Ok(self.apply(frame))
    }

    /// Apply one decoded frame
    pub fn apply(&mut self, frame: InboundFrame) -> FrameOutcome {
        tracing::debug!(frame = frame.type_name(), "Applying frame");
        let mut outcome = FrameOutcome::default();

        match frame {
            InboundFrame::SessionCreated { session_id } => {
                tracing::info!(session = %session_id, "Session created");
                self.session = Some(SessionInfo {
                    model: self.model.clone(),
                    ..SessionInfo::new(session_id.clone())
                });
                outcome.session_announced = Some(session_id);
            }
            InboundFrame::SessionResumed {
                session_id,
                message_count,
            } => {
                tracing::info!(
                    session = %session_id,
                    message_count = ?message_count,
                    "Session resumed"
                );
                let mut info = match self.session.take() {
                    Some(info) if info.id == session_id => info,
                    _ => SessionInfo::new(session_id.clone()),
                };
                if let Some(count) = message_count {
                    info.message_count = count;
                }
                self.session = Some(info);
                outcome.session_announced = Some(session_id);
            }
            frame => {
                outcome.conversation_changed = true;
                for effect in self.conversation.apply(frame) {
                    match effect {
                        ReducerEffect::Reasoning { reply_id, text } => {
                            outcome.reasoning_changed |= self.feed_bound(Some(reply_id), &text);
                        }
                        ReducerEffect::ReplyEnded => {
                            outcome.reasoning_changed |= self.stop_ticker();
                        }
                        ReducerEffect::RefreshModels => outcome.refresh_models = true,
                    }
                }
            }
        }

        outcome
    }

    /// Deliver a scheduled tick
    ///
    /// Ticks for a destroyed ticker, a previous epoch, or a reply that is
    /// no longer open are ignored. Returns whether the window changed.
    pub fn on_tick(&mut self, tick: Tick) -> bool {
        let Some(bound) = self.ticker.as_mut() else {
            tracing::trace!(epoch = tick.epoch, "Tick without live ticker");
            return false;
        };
        if bound.ticker.epoch() != tick.epoch {
            tracing::trace!(
                epoch = tick.epoch,
                live = bound.ticker.epoch(),
                "Tick from previous ticker"
            );
            return false;
        }
        if let Some(owner) = bound.reply_id.as_deref() {
            if self.conversation.open_reply_id() != Some(owner) {
                tracing::debug!(reply = %owner, "Ticker outlived its reply");
                self.stop_ticker();
                return false;
            }
        }

        match bound.ticker.on_tick(tick) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(error = %e, "Reasoning ticker failed, stopping");
                self.stop_ticker();
                true
            }
        }
    }

    /// Record a connection status change. Returns whether it changed.
    ///
    /// Conversation state is never touched by transport events.
    pub fn set_connection_status(&mut self, status: ConnectionStatus) -> bool {
        if self.status == status {
            return false;
        }
        tracing::info!(from = ?self.status, to = ?status, "Connection status changed");
        self.status = status;
        true
    }

    /// Replace the model list; adopt the server's current model if given
    pub fn apply_model_list(&mut self, list: ModelList) {
        self.models = list.models;
        if let Some(current) = list.current {
            self.model = Some(current);
        }
    }

    // ─── Outbound ───

    /// Select the model sent with subsequent messages
    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
    }

    /// Record an outgoing message and build its action
    ///
    /// Fails with `InvalidInput` for blank text and `Busy` while a reply
    /// is streaming; neither touches state.
    pub fn send(&mut self, text: &str) -> Result<OutboundAction> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message is empty".to_string()));
        }
        let intent = commands::classify(text);
        self.conversation.push_user(text, intent)?;
        Ok(OutboundAction::Send {
            message: text.to_string(),
            model: self.model.clone(),
            session_id: self.session.as_ref().map(|info| info.id.clone()),
        })
    }

    /// Hard reset and request a fresh server session
    pub fn new_session(&mut self) -> OutboundAction {
        self.reset();
        self.session = None;
        OutboundAction::NewSession
    }

    /// Hard reset and request replay of an existing session
    pub fn resume_session(&mut self, session_id: &str) -> Result<OutboundAction> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ChatError::InvalidInput("session id is empty".to_string()));
        }
        self.reset();
        self.session = Some(SessionInfo::new(session_id));
        Ok(OutboundAction::ResumeSession {
            session_id: session_id.to_string(),
        })
    }

    // ─── Replay ───

    /// Feed reasoning text to a ticker not bound to any reply
    pub fn feed_reasoning(&mut self, text: &str) -> bool {
        self.feed_bound(None, text)
    }

    /// Destroy the current ticker. Returns whether one was live.
    pub fn clear_reasoning(&mut self) -> bool {
        self.stop_ticker()
    }

    fn reset(&mut self) {
        self.conversation.reset();
        self.stop_ticker();
    }

    fn feed_bound(&mut self, reply_id: Option<String>, text: &str) -> bool {
        let rebind = self
            .ticker
            .as_ref()
            .is_some_and(|bound| bound.reply_id != reply_id);
        if rebind {
            self.stop_ticker();
        }

        if self.ticker.is_none() {
            let epoch = self.next_epoch;
            self.next_epoch += 1;
            tracing::debug!(epoch, reply = ?reply_id, "Starting reasoning ticker");
            self.ticker = Some(BoundTicker {
                ticker: ReasoningTicker::new(
                    self.ticker_config.clone(),
                    Arc::clone(&self.scheduler),
                    epoch,
                ),
                reply_id,
            });
        }

        let Some(bound) = self.ticker.as_mut() else {
            return false;
        };
        match bound.ticker.feed(text) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(error = %e, "Reasoning ticker failed, stopping");
                self.stop_ticker();
                true
            }
        }
    }

    fn stop_ticker(&mut self) -> bool {
        match self.ticker.take() {
            Some(mut bound) => {
                bound.ticker.stop();
                true
            }
            None => false,
        }
    }
}
