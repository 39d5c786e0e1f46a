//! Wire protocol — the closed set of frames exchanged with the chat server
//!
//! Server → client frames are discriminated by `type`, client → server
//! actions by `action`. Decoding is strict about the discriminator and
//! required fields, lenient about unknown fields.

use crate::error::{ChatError, Result};
use crate::types::{CardPayload, MediaRef};
use serde::{Deserialize, Deserializer, Serialize};

/// A frame received from the chat server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Incremental fragment of streamed assistant text
    Delta { content: String },

    /// Complete, non-streamed assistant text (terminal for the open reply)
    Message { content: String },

    /// End of the current reply
    Done,

    /// Agent runtime event (reasoning, tool lifecycle, skills, subagents)
    Event(EventFrame),

    /// Rich card payloads, always a separate turn
    Cards { cards: Vec<CardPayload> },

    /// Outgoing media files, always a separate turn
    Media { files: Vec<MediaRef> },

    /// System notice
    System { content: String },

    /// Server-reported error; aborts the open reply
    Error { content: String },

    /// Acknowledgement of `new_session`
    SessionCreated { session_id: String },

    /// Acknowledgement of `resume_session`
    SessionResumed {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_count: Option<usize>,
    },
}

impl InboundFrame {
    /// The wire discriminator of this frame
    pub fn type_name(&self) -> &'static str {
        match self {
            InboundFrame::Delta { .. } => "delta",
            InboundFrame::Message { .. } => "message",
            InboundFrame::Done => "done",
            InboundFrame::Event(_) => "event",
            InboundFrame::Cards { .. } => "cards",
            InboundFrame::Media { .. } => "media",
            InboundFrame::System { .. } => "system",
            InboundFrame::Error { .. } => "error",
            InboundFrame::SessionCreated { .. } => "session_created",
            InboundFrame::SessionResumed { .. } => "session_resumed",
        }
    }

    /// Build a reasoning event frame
    pub fn reasoning(text: impl Into<String>) -> Self {
        InboundFrame::Event(EventFrame {
            event: "reasoning".to_string(),
            text: Some(text.into()),
            ..Default::default()
        })
    }

    /// Build a `tool_start` event frame
    pub fn tool_start(tool: impl Into<String>, call_id: impl Into<String>) -> Self {
        InboundFrame::Event(EventFrame {
            event: "tool_start".to_string(),
            tool: Some(tool.into()),
            call_id: Some(call_id.into()),
            ..Default::default()
        })
    }

    /// Build a `tool_done` event frame
    pub fn tool_done(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        InboundFrame::Event(EventFrame {
            event: "tool_done".to_string(),
            call_id: Some(call_id.into()),
            result: Some(result.into()),
            ..Default::default()
        })
    }
}

/// Raw payload of an `event` frame
///
/// `arguments` and `result` accept either strings or structured JSON, which
/// is stringified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name (e.g., "reasoning", "tool_start")
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_or_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub arguments: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_or_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Progress message (`tool_progress`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Typed view of an `event` frame
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Reasoning text for the ticker
    Reasoning { text: String },

    ToolStart {
        tool: String,
        call_id: String,
        arguments: Option<String>,
    },

    ToolDone {
        call_id: Option<String>,
        result: Option<String>,
    },

    ToolProgress {
        call_id: Option<String>,
        message: Option<String>,
    },

    Skill { name: String },

    SubagentStart { name: String },

    SubagentDone { name: String },

    /// Event name this client does not act on
    Other { event: String },
}

impl From<EventFrame> for AgentEvent {
    fn from(frame: EventFrame) -> Self {
        let name = |n: Option<String>| n.unwrap_or_else(|| "unknown".to_string());
        match frame.event.as_str() {
            "reasoning" => AgentEvent::Reasoning {
                text: frame.text.unwrap_or_default(),
            },
            "tool_start" => AgentEvent::ToolStart {
                tool: name(frame.tool),
                call_id: frame.call_id.unwrap_or_default(),
                arguments: frame.arguments,
            },
            "tool_done" => AgentEvent::ToolDone {
                call_id: frame.call_id,
                result: frame.result,
            },
            "tool_progress" => AgentEvent::ToolProgress {
                call_id: frame.call_id,
                message: frame.message.or(frame.text),
            },
            "skill" => AgentEvent::Skill {
                name: name(frame.name),
            },
            "subagent_start" => AgentEvent::SubagentStart {
                name: name(frame.name),
            },
            "subagent_done" => AgentEvent::SubagentDone {
                name: name(frame.name),
            },
            _ => AgentEvent::Other { event: frame.event },
        }
    }
}

/// An action sent to the chat server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    NewSession,

    ResumeSession { session_id: String },

    Send {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Session the message belongs to, when one is known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
}

impl OutboundAction {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundAction::NewSession => "new_session",
            OutboundAction::ResumeSession { .. } => "resume_session",
            OutboundAction::Send { .. } => "send",
        }
    }
}

/// Decode a raw text frame into an `InboundFrame`
///
/// Fails with `ChatError::Protocol` on invalid JSON, a missing or unknown
/// `type`, or a missing required field.
pub fn decode_frame(raw: &str) -> Result<InboundFrame> {
    serde_json::from_str(raw).map_err(|e| {
        let preview: String = raw.chars().take(100).collect();
        ChatError::Protocol(format!("{} (frame: {})", e, preview))
    })
}

/// Encode an outbound action as a text frame
pub fn encode_action(action: &OutboundAction) -> Result<String> {
    Ok(serde_json::to_string(action)?)
}

fn string_or_json<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_delta() {
        let frame = decode_frame(r#"{"type":"delta","content":"He"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Delta {
                content: "He".to_string()
            }
        );
        assert_eq!(frame.type_name(), "delta");
    }

    #[test]
    fn test_decode_done_ignores_extra_fields() {
        let frame = decode_frame(r#"{"type":"done","elapsed_ms":1200}"#).unwrap();
        assert_eq!(frame, InboundFrame::Done);
    }

    #[test]
    fn test_decode_unknown_fields_ignored() {
        let frame =
            decode_frame(r#"{"type":"system","content":"hi","priority":"high"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::System {
                content: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_missing_type() {
        let err = decode_frame(r#"{"content":"hi"}"#).unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode_frame(r#"{"type":"sandbox_result","ok":true}"#).unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
    }

    #[test]
    fn test_decode_missing_required_field() {
        assert!(decode_frame(r#"{"type":"delta"}"#).is_err());
        assert!(decode_frame(r#"{"type":"cards"}"#).is_err());
        assert!(decode_frame(r#"{"type":"event","tool":"x"}"#).is_err());
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_frame("{not json").unwrap_err();
        assert!(matches!(err, ChatError::Protocol(_)));
        assert!(decode_frame("[1,2,3]").is_err());
    }

    #[test]
    fn test_decode_tool_start_event() {
        let frame = decode_frame(
            r#"{"type":"event","event":"tool_start","tool":"calc","call_id":"1","arguments":{"a":1}}"#,
        )
        .unwrap();
        let InboundFrame::Event(event) = frame else {
            panic!("expected event frame");
        };
        assert_eq!(event.arguments.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(
            AgentEvent::from(event),
            AgentEvent::ToolStart {
                tool: "calc".to_string(),
                call_id: "1".to_string(),
                arguments: Some(r#"{"a":1}"#.to_string()),
            }
        );
    }

    #[test]
    fn test_decode_tool_done_null_result() {
        let frame =
            decode_frame(r#"{"type":"event","event":"tool_done","call_id":"c1","result":null}"#)
                .unwrap();
        let InboundFrame::Event(event) = frame else {
            panic!("expected event frame");
        };
        assert_eq!(
            AgentEvent::from(event),
            AgentEvent::ToolDone {
                call_id: Some("c1".to_string()),
                result: None,
            }
        );
    }

    #[test]
    fn test_unknown_event_name_is_other() {
        let frame = decode_frame(r#"{"type":"event","event":"sandbox_exec"}"#).unwrap();
        let InboundFrame::Event(event) = frame else {
            panic!("expected event frame");
        };
        assert_eq!(
            AgentEvent::from(event),
            AgentEvent::Other {
                event: "sandbox_exec".to_string()
            }
        );
    }

    #[test]
    fn test_tool_start_name_fallback() {
        let event = EventFrame {
            event: "tool_start".to_string(),
            call_id: Some("c9".to_string()),
            ..Default::default()
        };
        match AgentEvent::from(event) {
            AgentEvent::ToolStart { tool, .. } => assert_eq!(tool, "unknown"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_session_frames() {
        let created = decode_frame(r#"{"type":"session_created","session_id":"s1"}"#).unwrap();
        assert_eq!(
            created,
            InboundFrame::SessionCreated {
                session_id: "s1".to_string()
            }
        );

        let resumed =
            decode_frame(r#"{"type":"session_resumed","session_id":"s1","message_count":6}"#)
                .unwrap();
        assert_eq!(
            resumed,
            InboundFrame::SessionResumed {
                session_id: "s1".to_string(),
                message_count: Some(6),
            }
        );
    }

    #[test]
    fn test_encode_actions() {
        assert_eq!(
            encode_action(&OutboundAction::NewSession).unwrap(),
            r#"{"action":"new_session"}"#
        );
        assert_eq!(
            encode_action(&OutboundAction::ResumeSession {
                session_id: "abc".to_string()
            })
            .unwrap(),
            r#"{"action":"resume_session","session_id":"abc"}"#
        );
        assert_eq!(
            encode_action(&OutboundAction::Send {
                message: "Hi".to_string(),
                model: None,
                session_id: None,
            })
            .unwrap(),
            r#"{"action":"send","message":"Hi"}"#
        );

        let json = encode_action(&OutboundAction::Send {
            message: "Hi".to_string(),
            model: Some("gpt-4.1".to_string()),
            session_id: Some("abc".to_string()),
        })
        .unwrap();
        assert!(json.contains("\"model\":\"gpt-4.1\""));
        assert!(json.contains("\"session_id\":\"abc\""));
    }

    #[test]
    fn test_frame_builders_encode_to_wire_shape() {
        let json = serde_json::to_value(InboundFrame::tool_done("1", "4")).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"], "tool_done");
        assert_eq!(json["call_id"], "1");
        assert_eq!(json["result"], "4");

        let done = serde_json::to_string(&InboundFrame::Done).unwrap();
        assert_eq!(done, r#"{"type":"done"}"#);
    }
}
