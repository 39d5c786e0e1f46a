//! Conversation reducer — folds inbound frames into an ordered turn list
//!
//! The reducer owns the turn list and the single "open reply": the
//! assistant turn still accepting deltas and tool events. Everything it
//! cannot do itself (driving the reasoning ticker, refreshing the model
//! list) is returned as a `ReducerEffect` for the session to act on.

use crate::error::{ChatError, Result};
use crate::protocol::{AgentEvent, InboundFrame};
use crate::types::{Role, ToolCall, Turn};

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerEffect {
    /// Reasoning text to feed to the ticker bound to `reply_id`
    Reasoning { reply_id: String, text: String },

    /// The open reply ended (`done` or `error`); the ticker must stop
    ReplyEnded,

    /// A model-switch command completed; refresh the model list
    RefreshModels,
}

/// How an outgoing message affects reply state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendIntent {
    /// The message is a slash command (no thinking indicator)
    pub command: bool,

    /// The next `done` should refresh the model list
    pub refresh_models: bool,
}

impl SendIntent {
    /// Plain conversational text
    pub fn message() -> Self {
        Self::default()
    }

    /// A slash command
    pub fn command(refresh_models: bool) -> Self {
        Self {
            command: true,
            refresh_models,
        }
    }
}

/// Ordered conversation state for one connection
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,

    /// Index of the open reply in `turns`
    open_reply: Option<usize>,

    // Per-reply accumulators
    reasoning: String,
    skill: Option<String>,
    status_text: Option<String>,
    thinking: bool,
    pending_model_refresh: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns in conversation order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The assistant turn still accumulating content
    pub fn open_reply(&self) -> Option<&Turn> {
        self.open_reply.and_then(|idx| self.turns.get(idx))
    }

    pub fn open_reply_id(&self) -> Option<&str> {
        self.open_reply().map(|turn| turn.id.as_str())
    }

    pub fn is_streaming(&self) -> bool {
        self.open_reply.is_some()
    }

    /// Waiting for the first text of a reply to a plain message
    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// Latest side-channel status (skill, subagent, tool)
    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Reasoning accumulated for the open reply
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn pending_model_refresh(&self) -> bool {
        self.pending_model_refresh
    }

    /// Names of running tools in the open reply, in start order
    pub fn active_tools(&self) -> Vec<&str> {
        self.open_reply()
            .map(|turn| {
                turn.tool_calls()
                    .iter()
                    .filter(|call| call.is_running())
                    .map(|call| call.tool.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append an optimistic user turn for an outgoing message
    ///
    /// Rejected while a reply is still streaming.
    pub fn push_user(&mut self, text: &str, intent: SendIntent) -> Result<&Turn> {
        if let Some(reply) = self.open_reply() {
            return Err(ChatError::Busy(format!(
                "reply {} is still streaming",
                reply.id
            )));
        }

        if intent.refresh_models {
            self.pending_model_refresh = true;
        }
        if !intent.command {
            self.thinking = true;
        }

        let idx = self.turns.len();
        self.turns.push(Turn::user(text));
        Ok(&self.turns[idx])
    }

    /// Apply one inbound frame
    pub fn apply(&mut self, frame: InboundFrame) -> Vec<ReducerEffect> {
        let mut effects = Vec::new();

        match frame {
            InboundFrame::Delta { content } => {
                let reply = self.ensure_open_reply();
                reply.content.push_str(&content);
                self.thinking = false;
            }
            InboundFrame::Message { content } => {
                self.thinking = false;
                match self.open_reply_mut() {
                    Some(reply) => {
                        reply.content = content;
                        self.close_reply();
                    }
                    None => self.turns.push(Turn::assistant(content)),
                }
            }
            InboundFrame::Event(frame) => self.apply_event(frame.into(), &mut effects),
            InboundFrame::Done => {
                if self.open_reply.is_some() {
                    self.close_reply();
                }
                if self.pending_model_refresh {
                    effects.push(ReducerEffect::RefreshModels);
                }
                self.clear_accumulators();
                effects.push(ReducerEffect::ReplyEnded);
            }
            InboundFrame::Cards { cards } => self.turns.push(Turn::with_cards(cards)),
            InboundFrame::Media { files } => self.turns.push(Turn::with_media(files)),
            InboundFrame::System { content } => self.turns.push(Turn::system(content)),
            InboundFrame::Error { content } => {
                if let Some(idx) = self.open_reply.take() {
                    let discarded = self.turns.remove(idx);
                    tracing::debug!(
                        turn = %discarded.id,
                        partial_len = discarded.content.len(),
                        "Discarding open reply on server error"
                    );
                }
                self.turns.push(Turn::error(content));
                self.clear_accumulators();
                effects.push(ReducerEffect::ReplyEnded);
            }
            InboundFrame::SessionCreated { .. } | InboundFrame::SessionResumed { .. } => {}
        }

        effects
    }

    /// Drop every turn and accumulator
    pub fn reset(&mut self) {
        self.turns.clear();
        self.open_reply = None;
        self.clear_accumulators();
    }

    fn apply_event(&mut self, event: AgentEvent, effects: &mut Vec<ReducerEffect>) {
        match event {
            AgentEvent::Reasoning { text } => {
                if text.is_empty() {
                    return;
                }
                let reply_id = self.ensure_open_reply().id.clone();
                self.reasoning.push_str(&text);
                effects.push(ReducerEffect::Reasoning { reply_id, text });
            }
            AgentEvent::ToolStart {
                tool,
                call_id,
                arguments,
            } => {
                self.status_text = Some(tool.clone());
                let reply = self.ensure_open_reply();
                reply
                    .tool_calls
                    .get_or_insert_with(Vec::new)
                    .push(ToolCall::running(tool, call_id, arguments));
            }
            AgentEvent::ToolDone { call_id, result } => {
                let completed = call_id
                    .as_deref()
                    .and_then(|id| self.find_tool_call(id))
                    .map(|call| call.complete(result))
                    .unwrap_or(false);
                if !completed {
                    tracing::debug!(call_id = ?call_id, "tool_done for unknown call");
                }
            }
            AgentEvent::ToolProgress { call_id, message } => {
                if let Some(call) = call_id.as_deref().and_then(|id| self.find_tool_call(id)) {
                    if call.is_running() {
                        call.progress = message.clone();
                    }
                }
                if message.is_some() {
                    self.status_text = message;
                }
            }
            AgentEvent::Skill { name } => {
                self.status_text = Some(name.clone());
                self.skill = Some(name);
            }
            AgentEvent::SubagentStart { name } | AgentEvent::SubagentDone { name } => {
                self.status_text = Some(name);
            }
            AgentEvent::Other { event } => {
                tracing::trace!(event = %event, "Ignoring agent event");
            }
        }
    }

    fn open_reply_mut(&mut self) -> Option<&mut Turn> {
        self.open_reply.and_then(|idx| self.turns.get_mut(idx))
    }

    fn ensure_open_reply(&mut self) -> &mut Turn {
        let idx = match self.open_reply {
            Some(idx) => idx,
            None => {
                self.turns.push(Turn::assistant(""));
                let idx = self.turns.len() - 1;
                self.open_reply = Some(idx);
                idx
            }
        };
        &mut self.turns[idx]
    }

    fn find_tool_call(&mut self, call_id: &str) -> Option<&mut ToolCall> {
        self.open_reply_mut()?
            .tool_calls
            .as_mut()?
            .iter_mut()
            .find(|call| call.call_id == call_id)
    }

    /// Attach accumulated reasoning and skill, then release the reply
    fn close_reply(&mut self) {
        let reasoning = std::mem::take(&mut self.reasoning);
        let skill = self.skill.take();
        if let Some(reply) = self.open_reply_mut() {
            if !reasoning.is_empty() {
                reply.reasoning = Some(reasoning);
            }
            if reply.tool_calls.as_ref().is_some_and(|calls| calls.is_empty()) {
                reply.tool_calls = None;
            }
            if skill.is_some() {
                reply.skill = skill;
            }
            tracing::debug!(
                turn = %reply.id,
                content_len = reply.content.len(),
                tool_calls = reply.tool_calls().len(),
                "Reply closed"
            );
        }
        self.open_reply = None;
    }

    fn clear_accumulators(&mut self) {
        self.reasoning.clear();
        self.skill = None;
        self.status_text = None;
        self.thinking = false;
        self.pending_model_refresh = false;
    }
}
