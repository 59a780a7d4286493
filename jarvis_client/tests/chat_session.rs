use jarvis_client::{ChatSession, FileStore, SessionEvent, HISTORY_KEY};
use jarvis_content::ContentBlock;
use jarvis_link::client::ScriptedTransport;
use jarvis_link::traits::{KeyValueStore, MemoryStore, NativeRuntime};
use jarvis_link::{ClientConfig, ConnectionManager, SendOptions, SendOutcome};
use std::sync::Arc;
use tokio::sync::broadcast;

fn session_over(store: Arc<dyn KeyValueStore>) -> (ChatSession, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let link = ConnectionManager::new(
        ClientConfig::default(),
        transport.clone(),
        store.clone(),
        Arc::new(NativeRuntime),
    );
    (ChatSession::new(link, store), transport)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_user_turn_is_appended_and_sent() {
    let (session, transport) = session_over(Arc::new(MemoryStore::new()));
    transport.last().unwrap().open();
    settle().await;

    let outcome = session.send("draw ```x``` please", &SendOptions::default());
    assert_eq!(outcome, Some(SendOutcome::Sent));

    let turns = session.turns();
    assert_eq!(turns.len(), 1);
    assert!(turns[0].is_user);
    assert_eq!(transport.sent_contents(), vec!["draw ```x``` please"]);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let (session, transport) = session_over(Arc::new(MemoryStore::new()));
    transport.last().unwrap().open();
    settle().await;

    assert_eq!(session.send("   \n", &SendOptions::default()), None);
    assert!(session.is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_assistant_reply_is_parsed() {
    let (session, transport) = session_over(Arc::new(MemoryStore::new()));
    let mut events = session.subscribe();
    let link = transport.last().unwrap();
    link.open();
    link.deliver(r#"{"content":"Chart:\n```diagram-chart\n{\"series\":[1,2,3]}\n```"}"#);
    settle().await;

    let turns = session.turns();
    assert_eq!(turns.len(), 1);
    assert!(!turns[0].is_user);
    match &turns[0].content[1] {
        ContentBlock::ChartSpec { parsed, .. } => {
            assert_eq!(parsed["series"], serde_json::json!([1, 2, 3]))
        }
        other => panic!("unexpected {:?}", other),
    }

    let names: Vec<_> = drain_events(&mut events).iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["connectivity", "turn_appended"]);
}

#[tokio::test]
async fn test_backend_error_is_not_a_turn() {
    let (session, transport) = session_over(Arc::new(MemoryStore::new()));
    let mut events = session.subscribe();
    let link = transport.last().unwrap();
    link.open();
    link.deliver(r#"{"error":"model unavailable"}"#);
    settle().await;

    assert!(session.is_empty());
    let errors: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::BackendError(msg) => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["model unavailable".to_string()]);
}

#[tokio::test]
async fn test_offline_send_is_queued_then_flushed() {
    let (session, transport) = session_over(Arc::new(MemoryStore::new()));
    assert_eq!(
        session.send("first", &SendOptions::default()),
        Some(SendOutcome::Queued)
    );
    assert_eq!(session.len(), 1);

    transport.last().unwrap().open();
    settle().await;
    assert_eq!(transport.sent_contents(), vec!["first"]);
    assert_eq!(session.link().pending_count(), 0);
}

#[tokio::test]
async fn test_history_is_restored() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    {
        let (session, transport) = session_over(store.clone());
        let link = transport.last().unwrap();
        link.open();
        settle().await;
        session.send("hello", &SendOptions::default());
        link.deliver(r#"{"content":"```rust\nfn main() {}\n```"}"#);
        settle().await;
        session.link().disconnect();
    }
    assert!(store.get(HISTORY_KEY).unwrap().is_some());

    let (restored, _transport) = session_over(store);
    let turns = restored.turns();
    assert_eq!(turns.len(), 2);
    assert!(turns[0].is_user);
    assert!(matches!(
        &turns[1].content[0],
        ContentBlock::Code { language: Some(lang), .. } if lang == "rust"
    ));
}

#[tokio::test]
async fn test_new_conversation_keeps_queue() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (session, transport) = session_over(store.clone());
    let mut events = session.subscribe();
    let old = session.session_id();

    session.send("offline turn", &SendOptions::default());
    let new = session.new_conversation();

    assert_ne!(old, new);
    assert!(session.is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    assert_eq!(session.link().pending_count(), 1);
    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Cleared { session_id } if *session_id == new)));

    transport.last().unwrap().open();
    settle().await;
    let sent = transport.sent();
    let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(frame["sessionId"], old.as_str());
}

#[tokio::test]
async fn test_file_store_keeps_queue_and_history_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = jarvis_common::state_path(dir.path());
    {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
        let (session, _transport) = session_over(store);
        session.send("while offline", &SendOptions::default());
        session.link().disconnect();
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
    let (session, transport) = session_over(store);
    assert_eq!(session.len(), 1);
    assert_eq!(session.link().pending_count(), 1);

    transport.last().unwrap().open();
    settle().await;
    assert_eq!(transport.sent_contents(), vec!["while offline"]);
}
