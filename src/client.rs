//! Chat client — the async run loop around `ChatSession`
//!
//! `ChatClient` owns the channel, the session controller and the tick
//! receiver, and interleaves inbound frames, ticks and status changes on a
//! single task: each `next_update` call applies exactly one of them.

use crate::api::{AgentApi, HttpAgentApi};
use crate::channel::{Channel, ChannelOptions};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
use crate::protocol::{encode_action, OutboundAction};
use crate::session::{ChatSession, ChatSnapshot, FrameOutcome};
use crate::ticker::{Tick, TokioScheduler};
use crate::transport::{Transport, WsTransport};
use crate::types::ConnectionStatus;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// One applied input, as reported by [`ChatClient::next_update`]
#[derive(Debug)]
pub enum ChatUpdate {
    /// An inbound frame was applied
    Frame(FrameOutcome),

    /// The reasoning window advanced
    Reasoning,

    /// The connection status changed
    Connection(ConnectionStatus),

    /// A malformed frame was dropped; state is unchanged
    Dropped(ChatError),

    /// The channel closed for good
    Closed,
}

/// Async chat client
pub struct ChatClient {
    channel: Channel,
    session: ChatSession,
    ticks: mpsc::UnboundedReceiver<Tick>,
    status_rx: watch::Receiver<ConnectionStatus>,
    status_ended: bool,
    api: Option<Arc<dyn AgentApi>>,
    prefs: Option<Arc<dyn PreferenceStore>>,
}

impl ChatClient {
    /// Connect over WebSocket with an HTTP agent API, as configured
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &ChatConfig) -> Result<Self> {
        config.validate()?;
        let prefs: Arc<dyn PreferenceStore> = match &config.preferences_path {
            Some(path) => Arc::new(FilePreferenceStore::new(path)),
            None => Arc::new(MemoryPreferenceStore::default()),
        };
        Ok(Self::new(Arc::new(WsTransport::new(&config.url)), config)
            .with_api(Arc::new(HttpAgentApi::new(&config.api_url)))
            .with_preferences(prefs))
    }

    /// Create a client over any transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, config: &ChatConfig) -> Self {
        let (scheduler, ticks) = TokioScheduler::channel();
        let session = ChatSession::new(config.ticker.clone(), Arc::new(scheduler));
        let channel = Channel::open(transport, ChannelOptions::from(config));
        let status_rx = channel.status_receiver();

        Self {
            channel,
            session,
            ticks,
            status_rx,
            status_ended: false,
            api: None,
            prefs: None,
        }
    }

    /// Use `api` for model refreshes
    pub fn with_api(mut self, api: Arc<dyn AgentApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Persist preferences to `store`, restoring the saved model
    pub fn with_preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        match store.load() {
            Ok(prefs) => {
                if prefs.model.is_some() {
                    self.session.set_model(prefs.model);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load chat preferences"),
        }
        self.prefs = Some(store);
        self
    }

    // ─── State ───

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.session.snapshot()
    }

    pub fn api(&self) -> Option<&Arc<dyn AgentApi>> {
        self.api.as_ref()
    }

    /// Saved preferences, if a store is configured
    pub fn preferences(&self) -> Option<Preferences> {
        let store = self.prefs.as_ref()?;
        match store.load() {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load chat preferences");
                None
            }
        }
    }

    // ─── Run loop ───

    /// Wait for and apply the next input
    ///
    /// Status changes take priority, then inbound frames in arrival
    /// order, then ticks. Returns `ChatUpdate::Closed` once the channel
    /// has closed and every buffered frame has been applied.
    pub async fn next_update(&mut self) -> ChatUpdate {
        loop {
            tokio::select! {
                biased;

                changed = self.status_rx.changed(), if !self.status_ended => {
                    let status = match changed {
                        Ok(()) => *self.status_rx.borrow_and_update(),
                        Err(_) => {
                            self.status_ended = true;
                            ConnectionStatus::Closed
                        }
                    };
                    if self.session.set_connection_status(status) {
                        return ChatUpdate::Connection(status);
                    }
                }
                frame = self.channel.recv() => match frame {
                    Some(raw) => return self.handle_frame(&raw).await,
                    None => {
                        self.session.set_connection_status(ConnectionStatus::Closed);
                        return ChatUpdate::Closed;
                    }
                },
                Some(tick) = self.ticks.recv() => {
                    if self.session.on_tick(tick) {
                        return ChatUpdate::Reasoning;
                    }
                }
            }
        }
    }

    async fn handle_frame(&mut self, raw: &str) -> ChatUpdate {
        match self.session.handle_text(raw) {
            Ok(outcome) => {
                if let Some(session_id) = &outcome.session_announced {
                    let session_id = session_id.clone();
                    self.persist(move |prefs| prefs.last_session_id = Some(session_id));
                }
                if outcome.refresh_models {
                    if let Err(e) = self.refresh_models().await {
                        tracing::warn!(error = %e, "Model refresh failed");
                    }
                }
                ChatUpdate::Frame(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping inbound frame");
                ChatUpdate::Dropped(e)
            }
        }
    }

    // ─── Outbound ───

    /// Send a user message or slash command
    ///
    /// The user turn is recorded before transmission and stays in the
    /// conversation if the transport then fails.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let action = self.session.send(text)?;
        self.transmit(&action).await
    }

    /// Start a fresh server session, discarding local state
    pub async fn new_session(&mut self) -> Result<()> {
        let action = self.session.new_session();
        self.transmit(&action).await
    }

    /// Resume `session_id`, discarding local state
    pub async fn resume_session(&mut self, session_id: &str) -> Result<()> {
        let action = self.session.resume_session(session_id)?;
        self.transmit(&action).await
    }

    /// Resume the session saved in preferences. Returns false if none.
    pub async fn resume_last_session(&mut self) -> Result<bool> {
        let Some(session_id) = self.preferences().and_then(|p| p.last_session_id) else {
            return Ok(false);
        };
        self.resume_session(&session_id).await?;
        Ok(true)
    }

    /// Select the model sent with subsequent messages and persist it
    pub fn set_model(&mut self, model: Option<String>) {
        self.session.set_model(model.clone());
        self.persist(move |prefs| prefs.model = model);
    }

    /// Fetch the model list, adopt the server's current model and persist it
    pub async fn refresh_models(&mut self) -> Result<()> {
        let api = self
            .api
            .clone()
            .ok_or_else(|| ChatError::Config("no agent API configured".to_string()))?;
        let list = api.list_models().await?;
        tracing::debug!(
            models = list.models.len(),
            current = ?list.current,
            "Model list refreshed"
        );
        self.session.apply_model_list(list);

        let model = self.session.model().map(str::to_string);
        self.persist(move |prefs| prefs.model = model);
        Ok(())
    }

    /// Close the channel; buffered frames can still be drained
    pub async fn close(&mut self) {
        self.channel.close().await;
    }

    async fn transmit(&self, action: &OutboundAction) -> Result<()> {
        let raw = encode_action(action)?;
        tracing::debug!(action = action.name(), "Sending action");
        self.channel.send(raw).await
    }

    fn persist(&self, update: impl FnOnce(&mut Preferences)) {
        let Some(store) = &self.prefs else {
            return;
        };
        let result = store.load().and_then(|mut prefs| {
            update(&mut prefs);
            store.save(&prefs.touch())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save chat preferences");
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("status", &self.session.status())
            .field("turns", &self.session.turns().len())
            .finish_non_exhaustive()
    }
}
