//! Shared fixtures for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use cantoo_embed::host::MemoryHost;
use cantoo_embed::{Connection, ConnectionConfig, DocumentRequest, Embed, FrameId};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

pub const CONTAINER: &str = "editor";

pub const DEVELOP_ORIGIN: &str = "https://develop.cantoo.fr";

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing once per test binary; honours `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Config used by the reference scenario.
pub fn develop_config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .container(CONTAINER)
        .env("develop")
        .id_ent("1")
        .uai("2")
        .user_id("10")
        .build()
        .expect("valid config")
}

/// A page with one container and an embed bound to it.
pub fn page() -> (MemoryHost, Embed) {
    init_logging();
    let host = MemoryHost::new();
    host.add_container(CONTAINER);
    let embed = Embed::builder()
        .host(host.clone())
        .build()
        .expect("embed builds");
    (host, embed)
}

pub fn ready(file_id: &str) -> Value {
    json!({ "type": "ready", "userId": "10", "fileId": file_id })
}

pub fn completed(file_id: &str, title: &str) -> Value {
    json!({ "type": "completed", "userId": "10", "fileId": file_id, "title": title })
}

pub fn logout() -> Value {
    json!({ "type": "logout", "userId": "10" })
}

pub fn destroyed() -> Value {
    json!({ "type": "destroyed" })
}

/// Connects with `request`, playing the editor's first `ready`.
pub async fn connect(
    host: &MemoryHost,
    embed: &Embed,
    request: DocumentRequest,
) -> anyhow::Result<(Connection, FrameId)> {
    let task = tokio::spawn({
        let embed = embed.clone();
        async move { embed.connect(develop_config(), request).await }
    });

    let frame = host
        .wait_for_mounts(host.frame_ids().len() + 1)
        .await
        .ok_or_else(|| anyhow::anyhow!("no frame mounted"))?;
    host.emit_from(frame, ready("10"));

    let connection = task.await??;
    Ok((connection, frame))
}
