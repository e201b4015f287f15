//! Two coordinators sharing one state directory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tokenflight::{
    AccessToken, Coordinator, LogoutReason, RecordingNavigator, RefreshToken, SessionEvent,
};
use tokenflight_core::{
    BroadcastChannel, KeyValueStorage, RefreshFailure, RefreshGrant, RefreshRequest,
    RefreshTransport,
};
use tokenflight_file::{FileStorage, StateDir};

const CHANNEL: &str = "auth_events";

struct FixedTransport;

#[async_trait]
impl RefreshTransport for FixedTransport {
    async fn exchange(&self, request: RefreshRequest) -> Result<RefreshGrant, RefreshFailure> {
        Ok(RefreshGrant {
            access_token: AccessToken::new(format!("access-for-{}", request.refresh_token.as_str())),
            refresh_token: None,
            expires_at: i64::MAX / 2,
        })
    }
}

fn coordinator(state: &StateDir, navigator: Arc<RecordingNavigator>) -> Coordinator {
    Coordinator::builder(
        Arc::new(state.local_storage().unwrap()),
        Arc::new(FixedTransport),
    )
    .session_storage(Arc::new(state.session_storage().unwrap()))
    .channel(Arc::new(state.channel(CHANNEL).unwrap()))
    .navigator(navigator)
    .build()
}

#[tokio::test(flavor = "multi_thread")]
async fn session_is_shared_through_files() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());

    let a = coordinator(&state, Arc::new(RecordingNavigator::new()));
    a.establish_session(
        AccessToken::new("a1"),
        RefreshToken::new("r1"),
        Some(Duration::from_secs(600)),
    )
    .unwrap();

    let b = coordinator(&state, Arc::new(RecordingNavigator::new()));
    assert!(b.has_session());
    assert_eq!(b.get_access_token().await.unwrap().as_str(), "access-for-r1");

    let local = FileStorage::open(dir.path(), "local").unwrap();
    assert_eq!(local.get("refresh_token").unwrap().as_deref(), Some("r1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_reaches_other_process() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());

    let a = coordinator(&state, Arc::new(RecordingNavigator::new()));
    a.establish_session(AccessToken::new("a1"), RefreshToken::new("r1"), None)
        .unwrap();

    let b_navigator = Arc::new(RecordingNavigator::new());
    let b = coordinator(&state, b_navigator.clone());
    b.get_access_token().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    b.on_session_cleared(move |reason| {
        let _ = tx.send(reason);
    });
    let listener = b.spawn_listener().unwrap();

    a.logout();

    let reason = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("logout never observed");
    assert_eq!(reason, Some(LogoutReason::ClearedElsewhere));
    assert_eq!(b_navigator.redirects(), vec![LogoutReason::ClearedElsewhere]);
    assert!(!b.has_session());

    listener.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_delivers_only_foreign_events() {
    let dir = TempDir::new().unwrap();
    let state = StateDir::new(dir.path());
    let a = state.channel(CHANNEL).unwrap();
    let b = state.channel(CHANNEL).unwrap();

    let mut a_events = a.subscribe().unwrap();
    let mut b_events = b.subscribe().unwrap();

    a.publish(&SessionEvent::RefreshCompleted { expires_at: 42 });

    let received = timeout(Duration::from_secs(5), b_events.next())
        .await
        .expect("event never delivered");
    assert_eq!(received, Some(SessionEvent::RefreshCompleted { expires_at: 42 }));

    assert!(
        timeout(Duration::from_millis(800), a_events.next())
            .await
            .is_err()
    );
}
