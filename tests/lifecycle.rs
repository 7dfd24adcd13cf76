//! End-to-end connection lifecycle against the in-memory page.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cantoo_embed::host::MemoryHost;
use cantoo_embed::{
    ConnectionConfig, ConnectionState, DocumentRequest, Embed, Error, EventKind, Listener,
};
use common::{
    CONTAINER, DEVELOP_ORIGIN, completed, connect, destroyed, develop_config, logout, page, ready,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Connect
// ============================================================================

#[tokio::test]
async fn connect_mounts_editor_and_reaches_ready() -> anyhow::Result<()> {
    let (host, embed) = page();

    let (connection, frame) =
        connect(&host, &embed, DocumentRequest::load("10", Some(true))?).await?;

    let expected = "https://develop.cantoo.fr/api/embed?idEnt=1&uai=2&userId=10&fileId=10&readOnly";
    assert_eq!(connection.url(), expected);
    assert_eq!(connection.state(), ConnectionState::Ready);
    assert_eq!(connection.frame_id(), Some(frame));

    let mounted = host.frame(frame).expect("frame exists");
    assert_eq!(mounted.src, expected);
    assert_eq!(mounted.container.as_str(), CONTAINER);
    assert!(mounted.attached);
    assert_eq!(
        mounted.attributes.allow,
        "fullscreen; camera; display-capture; local-fonts; microphone"
    );
    assert_eq!(
        mounted.attributes.style,
        "flex: 1; width: 100%; height: 100%; border: none;"
    );

    // The handshake subscription is gone once connect returns.
    assert_eq!(connection.listener_count(EventKind::Ready), 0);
    assert_eq!(embed.connection_count(), 1);
    Ok(())
}

#[tokio::test]
async fn connect_creation_request_encodes_title() -> anyhow::Result<()> {
    let (host, embed) = page();

    let request = DocumentRequest::creation("Mon devoir", Some("lined".into()))?;
    let (connection, _) = connect(&host, &embed, request).await?;

    assert!(
        connection
            .url()
            .ends_with("userId=10&title=Mon%20devoir&template=lined")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_releases_everything() {
    let (host, embed) = page();

    let err = assert_err!(
        embed
            .connect(develop_config(), DocumentRequest::load("10", None).expect("valid"))
            .await
    );

    assert!(matches!(err, Error::ConnectTimeout { timeout_ms: 300_000 }));
    assert_eq!(host.frame_ids().len(), 1);
    assert_eq!(host.attached_frame_count(), 0);
    assert_eq!(host.listener_count(), 0);
    assert_eq!(embed.connection_count(), 0);
}

#[test]
fn unknown_environment_fails_before_side_effects() {
    let result = ConnectionConfig::builder()
        .container(CONTAINER)
        .env("staging")
        .build();

    assert!(matches!(result, Err(Error::InvalidEnvironment { ref value }) if value == "staging"));
}

#[tokio::test]
async fn malformed_request_never_mounts() {
    let (host, embed) = page();

    let request = DocumentRequest::Load {
        file_id: String::new(),
        read_only: None,
    };
    let err = assert_err!(embed.connect(develop_config(), request).await);

    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(host.frame_ids().is_empty());
    assert_eq!(host.listener_count(), 0);
}

#[tokio::test]
async fn mount_failure_removes_listener() {
    common::init_logging();
    let host = MemoryHost::new();
    let embed = Embed::builder().host(host.clone()).build().expect("builds");

    let err = assert_err!(
        embed
            .connect(develop_config(), DocumentRequest::load("10", None).expect("valid"))
            .await
    );

    assert!(matches!(err, Error::Host { .. }));
    assert_eq!(host.listener_count(), 0);
}

#[tokio::test]
async fn destroyed_during_connect_closes_it() {
    let (host, embed) = page();

    let task = tokio::spawn({
        let embed = embed.clone();
        async move {
            embed
                .connect(develop_config(), DocumentRequest::load("10", None)?)
                .await
        }
    });

    let frame = host.wait_for_mounts(1).await.expect("mounted");
    host.emit_from(frame, destroyed());

    let result = task.await.expect("task completes");
    assert!(matches!(result, Err(Error::ConnectionClosed)));
    assert_eq!(host.attached_frame_count(), 0);
}

// ============================================================================
// Load Document
// ============================================================================

#[tokio::test]
async fn load_document_reloads_frame() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let task = tokio::spawn({
        let connection = connection.clone();
        async move { connection.load_document("11", Some(true)).await }
    });

    host.wait_for_navigations(frame, 1).await;
    let src = host.frame(frame).expect("frame").src;
    assert_eq!(
        src,
        "https://develop.cantoo.fr/api/embed?idEnt=1&uai=2&userId=10&fileId=11&readOnly"
    );

    host.emit_from(frame, ready("11"));
    task.await??;

    assert_eq!(connection.state(), ConnectionState::Ready);
    assert_eq!(connection.current_request().file_id(), Some("11"));
    assert!(connection.config().read_only);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn load_timeout_destroys_connection() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let err = assert_err!(connection.load_document("99", Some(true)).await);

    assert!(matches!(
        err,
        Error::LoadTimeout { ref file_id, timeout_ms: 60_000 } if file_id == "99"
    ));
    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert!(!host.frame(frame).expect("frame").attached);
    assert_eq!(host.listener_count(), 0);
    Ok(())
}

#[tokio::test]
async fn overlapping_load_is_rejected() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let first = tokio::spawn({
        let connection = connection.clone();
        async move { connection.load_document("11", None).await }
    });
    host.wait_for_navigations(frame, 1).await;

    let err = assert_err!(connection.load_document("12", None).await);
    assert!(matches!(err, Error::OperationInProgress { .. }));

    host.emit_from(frame, ready("11"));
    first.await??;

    // The slot is free again.
    let second = tokio::spawn({
        let connection = connection.clone();
        async move { connection.load_document("12", None).await }
    });
    host.wait_for_navigations(frame, 2).await;
    host.emit_from(frame, ready("12"));
    second.await??;
    Ok(())
}

#[tokio::test]
async fn load_rejects_empty_file_id() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let err = assert_err!(connection.load_document("", None).await);
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(host.frame(frame).expect("frame").history.len(), 1);
    assert_eq!(connection.state(), ConnectionState::Ready);
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn completed_then_logout_keeps_completed_state() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let completed_tx = tx.clone();
    connection.add_event_listener(Listener::on_completed(move |event| {
        let _ = completed_tx.send(format!("completed:{}", event.title));
    }));
    connection.add_event_listener(Listener::on_logout(move |event| {
        let _ = tx.send(format!("logout:{}", event.user_id));
    }));

    host.emit_from(frame, completed("10", "Mon devoir"));
    assert_eq!(rx.recv().await.as_deref(), Some("completed:Mon devoir"));
    assert_eq!(connection.state(), ConnectionState::Completed);

    host.emit_from(frame, logout());
    assert_eq!(rx.recv().await.as_deref(), Some("logout:10"));
    assert_eq!(connection.state(), ConnectionState::Completed);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_fires_twice_and_removes_together() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let listener = Listener::on_completed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let marker = Listener::on_completed(move |_| {
        let _ = tx.send(());
    });

    connection.add_event_listener(listener.clone());
    connection.add_event_listener(listener.clone());
    connection.add_event_listener(marker);
    assert_eq!(connection.listener_count(EventKind::Completed), 3);

    host.emit_from(frame, completed("10", "a"));
    rx.recv().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(connection.remove_event_listener(&listener), 2);
    assert_eq!(connection.listener_count(EventKind::Completed), 1);

    host.emit_from(frame, completed("10", "b"));
    rx.recv().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn foreign_origin_is_ignored() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    connection.add_event_listener(Listener::on_completed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.add_event_listener(Listener::on_logout(move |_| {
        let _ = tx.send(());
    }));

    host.emit("https://evil.example", completed("10", "forged"));
    host.emit("", json!("not json at all"));
    host.emit_from(frame, logout());
    rx.recv().await;

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(connection.state(), ConnectionState::Ready);
    Ok(())
}

#[tokio::test]
async fn stringified_messages_are_accepted() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, _) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.add_event_listener(Listener::on_completed(move |event| {
        let _ = tx.send(event.file_id.clone());
    }));

    let payload = r#"{"type":"completed","userId":10,"fileId":42,"title":"t"}"#;
    host.emit(DEVELOP_ORIGIN, json!(payload));

    assert_eq!(rx.recv().await.as_deref(), Some("42"));
    Ok(())
}

#[tokio::test]
async fn unsolicited_destroyed_tears_down() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.add_event_listener(Listener::on_destroyed(move || {
        let _ = tx.send(());
    }));

    host.emit_from(frame, destroyed());
    rx.recv().await;
    host.wait_for(|h| h.attached_frame_count() == 0 && h.listener_count() == 0)
        .await;

    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert!(!connection.is_active());
    for kind in EventKind::ALL {
        assert_eq!(connection.listener_count(kind), 0);
    }
    Ok(())
}

// ============================================================================
// Destroy
// ============================================================================

#[tokio::test]
async fn destroy_posts_close_and_waits_for_ack() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;
    connection.add_event_listener(Listener::on_ready(|_| {}));

    let task = tokio::spawn({
        let connection = connection.clone();
        async move { connection.destroy().await }
    });

    host.wait_for_posts(frame, 1).await;
    let posted = host.frame(frame).expect("frame").posted;
    assert_eq!(posted[0].message, json!({ "type": "close" }));
    assert_eq!(posted[0].target_origin, DEVELOP_ORIGIN);

    host.emit_from(frame, destroyed());
    assert_ok!(task.await?);

    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert!(!host.frame(frame).expect("frame").attached);
    assert_eq!(host.listener_count(), 0);
    for kind in EventKind::ALL {
        assert_eq!(connection.listener_count(kind), 0);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn destroy_timeout_still_releases() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;
    connection.add_event_listener(Listener::on_logout(|_| {}));

    let err = assert_err!(connection.destroy().await);

    assert!(matches!(err, Error::DestroyTimeout { timeout_ms: 10_000 }));
    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert!(!host.frame(frame).expect("frame").attached);
    assert_eq!(connection.listener_count(EventKind::Logout), 0);
    Ok(())
}

#[tokio::test]
async fn operations_after_destroy_fail() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let task = tokio::spawn({
        let connection = connection.clone();
        async move { connection.destroy().await }
    });
    host.wait_for_posts(frame, 1).await;
    host.emit_from(frame, destroyed());
    task.await??;

    assert!(matches!(
        connection.load_document("11", None).await,
        Err(Error::NoActiveConnection)
    ));
    assert!(matches!(connection.destroy().await, Err(Error::NoActiveConnection)));

    // Late messages reach nobody, not even a fresh subscriber.
    assert_eq!(host.listener_count(), 0);
    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.add_event_listener(Listener::on_ready(move |_| {
        let _ = tx.send(());
    }));
    host.emit_from(frame, ready("10"));
    host.emit(DEVELOP_ORIGIN, ready("10"));

    // A full connect on the same page runs every task woken before it.
    let (other, _) = connect(&host, &embed, DocumentRequest::load("11", None)?).await?;
    assert_eq!(other.state(), ConnectionState::Ready);

    assert!(rx.try_recv().is_err());
    assert_eq!(connection.state(), ConnectionState::Destroyed);
    Ok(())
}

#[tokio::test]
async fn destroy_closes_pending_load() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, frame) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;

    let load = tokio::spawn({
        let connection = connection.clone();
        async move { connection.load_document("11", None).await }
    });
    host.wait_for_navigations(frame, 1).await;

    let destroy = tokio::spawn({
        let connection = connection.clone();
        async move { connection.destroy().await }
    });
    host.wait_for_posts(frame, 1).await;
    host.emit_from(frame, destroyed());

    assert!(matches!(load.await?, Err(Error::ConnectionClosed)));
    assert_ok!(destroy.await?);
    Ok(())
}

// ============================================================================
// Drop & Embed
// ============================================================================

#[tokio::test]
async fn dropping_last_handle_releases_page() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, _) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;
    assert_eq!(host.listener_count(), 1);

    drop(connection);

    assert_eq!(host.listener_count(), 0);
    host.wait_for(|h| h.attached_frame_count() == 0).await;
    assert_eq!(embed.connection_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn close_all_destroys_live_connections() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (connection, _) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;
    assert_eq!(embed.connection_count(), 1);

    embed.close_all().await;

    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert_eq!(embed.connection_count(), 0);
    assert_eq!(host.attached_frame_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn custom_timeouts_apply() {
    common::init_logging();
    let host = MemoryHost::new();
    host.add_container(CONTAINER);
    let embed = Embed::builder()
        .host(host.clone())
        .connect_timeout(Duration::from_secs(2))
        .build()
        .expect("builds");

    let err = assert_err!(
        embed
            .connect(develop_config(), DocumentRequest::load("10", None).expect("valid"))
            .await
    );
    assert!(matches!(err, Error::ConnectTimeout { timeout_ms: 2_000 }));
}

// ============================================================================
// Several connections on one page
// ============================================================================

/// Counts callbacks per kind and signals every logout.
struct Recorder {
    ready: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    logouts: mpsc::UnboundedReceiver<()>,
}

impl Recorder {
    fn attach(connection: &cantoo_embed::Connection) -> Self {
        let ready = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let (tx, logouts) = mpsc::unbounded_channel();

        let counter = Arc::clone(&ready);
        connection.add_event_listener(Listener::on_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = Arc::clone(&completed);
        connection.add_event_listener(Listener::on_completed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        connection.add_event_listener(Listener::on_logout(move |_| {
            let _ = tx.send(());
        }));

        Self {
            ready,
            completed,
            logouts,
        }
    }

    fn ready(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Waits until `frame`'s connection has handled everything emitted before.
///
/// Each bus handles its messages in order, so once the logout sent now is
/// observed, earlier messages on that bus are done.
async fn settle(host: &MemoryHost, frame: cantoo_embed::FrameId, recorder: &mut Recorder) {
    host.emit_from(frame, logout());
    recorder.logouts.recv().await.expect("logout observed");
}

#[tokio::test]
async fn connections_on_one_page_are_isolated() -> anyhow::Result<()> {
    let (host, embed) = page();
    let (a, frame_a) = connect(&host, &embed, DocumentRequest::load("10", None)?).await?;
    let (b, frame_b) = connect(&host, &embed, DocumentRequest::load("20", None)?).await?;
    assert_ne!(frame_a, frame_b);
    assert_eq!(embed.connection_count(), 2);

    let mut seen_a = Recorder::attach(&a);
    let mut seen_b = Recorder::attach(&b);

    // Logout and completed from A stay with A.
    host.emit_from(frame_a, completed("10", "devoir A"));
    settle(&host, frame_a, &mut seen_a).await;
    settle(&host, frame_b, &mut seen_b).await;

    assert_eq!(seen_a.completed(), 1);
    assert_eq!(seen_b.completed(), 0);
    assert!(seen_b.logouts.try_recv().is_err());
    assert_eq!(a.state(), ConnectionState::Completed);
    assert_eq!(b.state(), ConnectionState::Ready);

    // A ready from A does not answer B's pending load.
    let load = tokio::spawn({
        let b = b.clone();
        async move { b.load_document("21", None).await }
    });
    host.wait_for_navigations(frame_b, 1).await;

    host.emit_from(frame_a, ready("21"));
    settle(&host, frame_b, &mut seen_b).await;
    assert_eq!(seen_b.ready(), 0);
    assert!(!load.is_finished());

    host.emit_from(frame_b, ready("21"));
    load.await??;
    assert_eq!(seen_b.ready(), 1);

    // A destroyed from A tears down A only.
    host.emit_from(frame_a, destroyed());
    host.wait_for(|h| h.frame(frame_a).is_some_and(|f| !f.attached))
        .await;
    settle(&host, frame_b, &mut seen_b).await;

    assert_eq!(a.state(), ConnectionState::Destroyed);
    assert_eq!(b.state(), ConnectionState::Ready);
    assert!(host.frame(frame_b).expect("frame b").attached);
    assert_eq!(b.listener_count(EventKind::Logout), 1);
    assert_eq!(host.listener_count(), 1);
    assert_eq!(embed.connection_count(), 1);

    // B still completes its own close handshake.
    let destroy = tokio::spawn({
        let b = b.clone();
        async move { b.destroy().await }
    });
    host.wait_for_posts(frame_b, 1).await;
    host.emit_from(frame_b, destroyed());
    destroy.await??;

    assert_eq!(host.attached_frame_count(), 0);
    assert_eq!(host.listener_count(), 0);
    Ok(())
}

#[tokio::test]
async fn destroying_each_connection_in_turn() -> anyhow::Result<()> {
    let (host, embed) = page();
    let mut connections = Vec::new();
    for file_id in ["1", "2", "3"] {
        connections.push(connect(&host, &embed, DocumentRequest::load(file_id, None)?).await?);
    }

    for (index, (connection, frame)) in connections.iter().enumerate() {
        let destroy = tokio::spawn({
            let connection = connection.clone();
            async move { connection.destroy().await }
        });
        host.wait_for_posts(*frame, 1).await;
        host.emit_from(*frame, destroyed());
        destroy.await??;

        assert_eq!(connection.state(), ConnectionState::Destroyed);
        assert_eq!(embed.connection_count(), connections.len() - index - 1);
        for (other, _) in &connections[index + 1..] {
            assert_eq!(other.state(), ConnectionState::Ready);
        }
    }

    assert_eq!(host.attached_frame_count(), 0);
    Ok(())
}
