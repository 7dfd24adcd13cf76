//! Embed the editor in a real page through the WebSocket bridge.
//!
//! Demonstrates:
//! - Binding the bridge server and waiting for the page shim
//! - Connecting an editor and subscribing to its events
//! - Reloading another document
//! - Closing the editor
//!
//! Usage:
//!   cargo run --example bridge_embed
//!   cargo run --example bridge_embed -- --debug
//!   cargo run --example bridge_embed -- --env preprod --file 42 --reload 43

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use cantoo_embed::host::BridgeHost;
use cantoo_embed::transport::BridgeServer;
use cantoo_embed::{ConnectionConfig, DocumentRequest, Embed, Listener, Result};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const CONTAINER: &str = "editor";

const BRIDGE_PORT: u16 = 9555;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    env: String,
    file_id: String,
    reload: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            env: value_of("--env").unwrap_or_else(|| "develop".to_string()),
            file_id: value_of("--file").unwrap_or_else(|| "10".to_string()),
            reload: value_of("--reload"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "cantoo_embed=debug"
    } else {
        "cantoo_embed=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Bridge Embed ===\n");

    // ========================================================================
    // Wait for the page
    // ========================================================================

    let server = BridgeServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), BRIDGE_PORT).await?;
    println!("[1] Waiting for the page shim on {}...", server.ws_url());

    let host = Arc::new(BridgeHost::accept(server).await?);
    println!("    ✓ Page connected: {}\n", host.page_url());

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Connecting editor (env {}, file {})...", args.env, args.file_id);

    let embed = Embed::builder().shared_host(host.clone()).build()?;
    let config = ConnectionConfig::builder()
        .container(CONTAINER)
        .env(args.env.as_str())
        .id_ent("1")
        .uai("2")
        .user_id("10")
        .build()?;

    let connection = embed
        .connect(config, DocumentRequest::load(args.file_id.as_str(), None)?)
        .await?;
    println!("    ✓ {}\n", connection.url());

    connection.add_event_listener(Listener::on_completed(|event| {
        println!("    [completed] {} ({})", event.title, event.file_id);
    }));
    connection.add_event_listener(Listener::on_logout(|event| {
        println!("    [logout] user {}", event.user_id);
    }));

    // ========================================================================
    // Reload
    // ========================================================================

    if let Some(file_id) = args.reload {
        println!("[3] Loading file {file_id} read-only...");
        connection.load_document(file_id, Some(true)).await?;
        println!("    ✓ {}\n", connection.url());
    }

    // ========================================================================
    // Close
    // ========================================================================

    println!("Press Ctrl+C to close the editor...");
    tokio::signal::ctrl_c().await.ok();

    let closed = match connection.destroy().await {
        Ok(()) => {
            println!("    ✓ Editor closed");
            Ok(())
        }
        Err(e) if e.is_timeout() => {
            println!("    ! Editor did not acknowledge; iframe removed");
            Ok(())
        }
        Err(e) => Err(e),
    };

    host.shutdown();
    println!("    ✓ Bridge closed");

    closed
}
