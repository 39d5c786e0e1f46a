//! Chat client integration tests
//!
//! End-to-end tests driving a `ChatClient` against the in-memory
//! transport's scriptable server peer. Covers streaming replies, tool
//! calls, reasoning pacing, model refresh, reconnects and session resets.

use a3s_chat::{
    ChatClient, ChatConfig, ChatError, ChatUpdate, ConnectionStatus, FrameOutcome,
    MemoryAgentApi, MemoryPeer, MemoryPreferenceStore, MemoryServer, MemoryTransport, ModelInfo,
    ModelList, OutboundAction, PreferenceStore, Preferences, Role, ToolStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn test_config() -> ChatConfig {
    ChatConfig {
        reconnect_backoff_ms: 20,
        send_timeout_ms: 2_000,
        ..Default::default()
    }
}

async fn connected_client() -> (ChatClient, MemoryServer, MemoryPeer) {
    let (transport, mut server) = MemoryTransport::pair();
    let mut client = ChatClient::new(Arc::new(transport), &test_config());
    let peer = server.accept().await.unwrap();
    wait_for_status(&mut client, ConnectionStatus::Open).await;
    (client, server, peer)
}

async fn wait_for_status(client: &mut ChatClient, status: ConnectionStatus) {
    while client.status() != status {
        if let ChatUpdate::Closed = client.next_update().await {
            assert_eq!(status, ConnectionStatus::Closed, "channel closed early");
            return;
        }
    }
}

/// Skip ticks and status changes until the next applied frame
async fn next_frame(client: &mut ChatClient) -> FrameOutcome {
    loop {
        match client.next_update().await {
            ChatUpdate::Frame(outcome) => return outcome,
            ChatUpdate::Closed => panic!("channel closed while waiting for a frame"),
            _ => {}
        }
    }
}

// ─── Streaming replies ───────────────────────────────────────────

#[tokio::test]
async fn test_full_reply_roundtrip() {
    let (mut client, _server, mut peer) = connected_client().await;

    client.send("Hi").await.unwrap();
    assert_eq!(
        peer.recv_action().await,
        Some(OutboundAction::Send {
            message: "Hi".to_string(),
            model: None,
            session_id: None,
        })
    );
    assert!(client.session().is_thinking());

    peer.send_json(&json!({"type": "delta", "content": "Hel"}));
    peer.send_json(&json!({"type": "delta", "content": "lo"}));
    peer.send_json(&json!({"type": "event", "event": "reasoning", "text": "I am thinking"}));
    peer.send_json(&json!({"type": "event", "event": "tool_start", "tool": "calc", "call_id": "1"}));
    peer.send_json(&json!({"type": "event", "event": "tool_done", "call_id": "1", "result": "4"}));
    peer.send_json(&json!({"type": "done"}));

    for _ in 0..5 {
        next_frame(&mut client).await;
    }
    assert!(client.session().is_streaming());
    next_frame(&mut client).await;
    assert!(!client.session().is_streaming());

    let turns = client.session().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "Hi");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Hello");
    assert_eq!(turns[1].reasoning.as_deref(), Some("I am thinking"));

    let calls = turns[1].tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool, "calc");
    assert_eq!(calls[0].call_id, "1");
    assert_eq!(calls[0].status, ToolStatus::Done);
    assert_eq!(calls[0].result.as_deref(), Some("4"));

    assert!(client.session().reasoning_window().is_empty());
    assert!(!client.session().is_thinking());
}

#[tokio::test]
async fn test_structured_tool_payloads_are_stringified() {
    let (mut client, _server, peer) = connected_client().await;

    peer.send_json(&json!({
        "type": "event",
        "event": "tool_start",
        "tool": "search",
        "call_id": "c1",
        "arguments": {"query": "rust"}
    }));
    peer.send_json(&json!({
        "type": "event",
        "event": "tool_done",
        "call_id": "c1",
        "result": {"hits": 3}
    }));
    next_frame(&mut client).await;
    assert_eq!(client.session().active_tools(), vec!["search"]);
    next_frame(&mut client).await;
    assert!(client.session().active_tools().is_empty());

    let reply = client.session().conversation().open_reply().unwrap();
    let call = &reply.tool_calls()[0];
    let args: serde_json::Value = serde_json::from_str(call.arguments.as_deref().unwrap()).unwrap();
    assert_eq!(args["query"], "rust");
    assert_eq!(call.result.as_deref(), Some(r#"{"hits":3}"#));
}

#[tokio::test]
async fn test_cards_and_media_are_separate_turns() {
    let (mut client, _server, peer) = connected_client().await;

    client.send("Show me").await.unwrap();
    peer.send_json(&json!({"type": "delta", "content": "Here"}));
    peer.send_json(&json!({"type": "cards", "cards": [{"contentType": "hero"}]}));
    peer.send_json(&json!({"type": "media", "files": ["/media/chart.png"]}));
    peer.send_json(&json!({"type": "done"}));
    for _ in 0..4 {
        next_frame(&mut client).await;
    }

    let roles: Vec<Role> = client.session().turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Assistant, Role::Assistant]
    );
    let turns = client.session().turns();
    assert_eq!(turns[1].content, "Here");
    assert!(turns[2].cards.is_some());
    assert!(turns[3].media.is_some());
}

// ─── Errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_discards_partial_reply() {
    let (mut client, _server, peer) = connected_client().await;

    client.send("Hi").await.unwrap();
    peer.send_json(&json!({"type": "delta", "content": "partial"}));
    peer.send_json(&json!({"type": "event", "event": "tool_start", "tool": "a", "call_id": "1"}));
    peer.send_json(&json!({"type": "error", "content": "Agent error -- check server logs"}));
    for _ in 0..3 {
        next_frame(&mut client).await;
    }

    let turns = client.session().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Error);
    assert_eq!(turns[1].content, "Agent error -- check server logs");
    assert!(!client.session().is_streaming());
    assert!(!client.session().is_thinking());
    assert!(client.session().active_tools().is_empty());
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let (mut client, _server, peer) = connected_client().await;
    client.send("Hi").await.unwrap();
    let before = client.snapshot();

    peer.send_frame("{not json");
    peer.send_json(&json!({"type": "sandbox_result", "ok": true}));
    peer.send_json(&json!({"type": "delta"}));

    for _ in 0..3 {
        match client.next_update().await {
            ChatUpdate::Dropped(ChatError::Protocol(_)) => {}
            other => panic!("expected dropped frame, got {:?}", other),
        }
    }
    assert_eq!(client.snapshot(), before);

    peer.send_json(&json!({"type": "delta", "content": "ok"}));
    next_frame(&mut client).await;
    assert_eq!(client.session().turns()[1].content, "ok");
}

#[tokio::test]
async fn test_double_send_rejected_without_transmitting() {
    let (mut client, _server, mut peer) = connected_client().await;

    client.send("one").await.unwrap();
    peer.recv_action().await.unwrap();
    peer.send_json(&json!({"type": "delta", "content": "rep"}));
    next_frame(&mut client).await;

    assert!(matches!(client.send("two").await, Err(ChatError::Busy(_))));
    assert!(matches!(client.send("  ").await, Err(ChatError::InvalidInput(_))));
    assert_eq!(client.session().turns().len(), 2);

    peer.send_json(&json!({"type": "done"}));
    next_frame(&mut client).await;
    client.send("two").await.unwrap();
    match peer.recv_action().await {
        Some(OutboundAction::Send { message, .. }) => assert_eq!(message, "two"),
        other => panic!("unexpected action {:?}", other),
    }
}

// ─── Reasoning ticker ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_reasoning_is_paced() {
    let (mut client, _server, peer) = connected_client().await;

    client.send("Think").await.unwrap();
    peer.send_json(&json!({"type": "event", "event": "reasoning", "text": "alpha beta gamma"}));
    let outcome = next_frame(&mut client).await;
    assert!(outcome.reasoning_changed);
    assert_eq!(client.session().ticker().unwrap().cursor(), Some(0));

    let started = tokio::time::Instant::now();
    assert!(matches!(client.next_update().await, ChatUpdate::Reasoning));
    // (160 + 12) * 0.6 for "alpha"
    assert!(started.elapsed() >= Duration::from_millis(103));
    assert_eq!(client.session().ticker().unwrap().cursor(), Some(1));

    assert!(matches!(client.next_update().await, ChatUpdate::Reasoning));
    let window: Vec<&str> = client
        .session()
        .reasoning_window()
        .iter()
        .map(|w| w.text.as_str())
        .collect();
    assert_eq!(window, vec!["alpha", "beta", "gamma"]);
    assert_eq!(client.session().ticker().unwrap().cursor(), Some(2));

    peer.send_json(&json!({"type": "done"}));
    next_frame(&mut client).await;
    assert!(client.session().ticker().is_none());
    assert_eq!(
        client.session().turns()[1].reasoning.as_deref(),
        Some("alpha beta gamma")
    );
}

// ─── Models & preferences ────────────────────────────────────────

#[tokio::test]
async fn test_model_command_refreshes_and_persists() {
    let (transport, mut server) = MemoryTransport::pair();
    let api = Arc::new(MemoryAgentApi::new());
    let prefs = Arc::new(MemoryPreferenceStore::default());
    let mut client = ChatClient::new(Arc::new(transport), &test_config())
        .with_api(api.clone())
        .with_preferences(prefs.clone());
    let mut peer = server.accept().await.unwrap();
    wait_for_status(&mut client, ConnectionStatus::Open).await;

    api.set_models(ModelList {
        models: vec![ModelInfo {
            id: "gpt-4.1".to_string(),
            name: "GPT-4.1".to_string(),
            policy: "enabled".to_string(),
            billing_multiplier: 1.0,
            reasoning_efforts: vec![],
        }],
        current: Some("gpt-4.1".to_string()),
    });

    client.send("/model gpt-4.1").await.unwrap();
    assert!(!client.session().is_thinking());
    peer.recv_action().await.unwrap();

    peer.send_json(&json!({"type": "message", "content": "Model switched to gpt-4.1"}));
    peer.send_json(&json!({"type": "done"}));
    assert!(!next_frame(&mut client).await.refresh_models);
    assert!(next_frame(&mut client).await.refresh_models);

    assert_eq!(client.session().model(), Some("gpt-4.1"));
    assert_eq!(client.session().models().len(), 1);
    assert_eq!(prefs.load().unwrap().model.as_deref(), Some("gpt-4.1"));

    client.send("Hi").await.unwrap();
    match peer.recv_action().await {
        Some(OutboundAction::Send { model, .. }) => assert_eq!(model.as_deref(), Some("gpt-4.1")),
        other => panic!("unexpected action {:?}", other),
    }
}

// ─── Sessions & reconnect ────────────────────────────────────────

#[tokio::test]
async fn test_new_session_resets_and_records_id() {
    let prefs = Arc::new(MemoryPreferenceStore::default());
    let (transport, mut server) = MemoryTransport::pair();
    let mut client =
        ChatClient::new(Arc::new(transport), &test_config()).with_preferences(prefs.clone());
    let mut peer = server.accept().await.unwrap();
    wait_for_status(&mut client, ConnectionStatus::Open).await;

    client.send("Hi").await.unwrap();
    peer.recv_action().await.unwrap();
    peer.send_json(&json!({"type": "delta", "content": "partial"}));
    next_frame(&mut client).await;

    assert_ok!(client.new_session().await);
    assert_eq!(peer.recv_action().await, Some(OutboundAction::NewSession));
    assert!(client.session().turns().is_empty());
    assert!(!client.session().is_streaming());

    peer.send_json(&json!({"type": "session_created", "session_id": "s-42"}));
    let outcome = next_frame(&mut client).await;
    assert_eq!(outcome.session_announced.as_deref(), Some("s-42"));
    assert_eq!(client.session().session().unwrap().id, "s-42");
    assert_eq!(prefs.load().unwrap().last_session_id.as_deref(), Some("s-42"));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_keeps_conversation_then_resumes() {
    let prefs = Arc::new(MemoryPreferenceStore::default());
    prefs
        .save(&Preferences {
            last_session_id: Some("s-1".to_string()),
            ..Default::default()
        })
        .unwrap();

    let (transport, mut server) = MemoryTransport::pair();
    let mut client =
        ChatClient::new(Arc::new(transport), &test_config()).with_preferences(prefs.clone());
    let peer = server.accept().await.unwrap();
    wait_for_status(&mut client, ConnectionStatus::Open).await;

    client.send("Hi").await.unwrap();
    peer.send_json(&json!({"type": "delta", "content": "half a rep"}));
    next_frame(&mut client).await;

    drop(peer);
    wait_for_status(&mut client, ConnectionStatus::Reconnecting).await;
    assert_eq!(client.session().turns().len(), 2);
    assert!(client.session().is_streaming());

    let mut peer = server.accept().await.unwrap();
    wait_for_status(&mut client, ConnectionStatus::Open).await;
    assert_eq!(server.connect_attempts(), 2);

    assert!(assert_ok!(client.resume_last_session().await));
    assert_eq!(
        peer.recv_action().await,
        Some(OutboundAction::ResumeSession {
            session_id: "s-1".to_string()
        })
    );
    assert!(client.session().turns().is_empty());

    peer.send_json(&json!({"type": "session_resumed", "session_id": "s-1", "message_count": 6}));
    next_frame(&mut client).await;
    assert_eq!(client.session().session().unwrap().message_count, 6);
}

#[tokio::test]
async fn test_close_ends_updates() {
    let (mut client, _server, mut peer) = connected_client().await;
    client.close().await;
    assert_eq!(peer.recv().await, None);

    let mut saw_closed_status = false;
    loop {
        match client.next_update().await {
            ChatUpdate::Connection(ConnectionStatus::Closed) => saw_closed_status = true,
            ChatUpdate::Closed => break,
            _ => {}
        }
    }
    assert!(saw_closed_status);
    assert!(matches!(client.send("Hi").await, Err(ChatError::Closed)));
}
