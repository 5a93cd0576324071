//! Pair with a wallet through a local bridge and list its accounts.
//!
//! Demonstrates:
//! - Building a client against a bridge WebSocket
//! - Restoring a persisted session, or pairing when there is none
//! - Requesting accounts and signing a message
//! - Logging out
//!
//! Usage:
//!   cargo run --example pairing -- --project <id>
//!   cargo run --example pairing -- --project <id> --bridge ws://127.0.0.1:9876
//!   cargo run --example pairing -- --project <id> --debug --logout

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result, bail};
use qubic_connect::{BridgeConnector, MessageRequest, WalletClient};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_BRIDGE: &str = "ws://127.0.0.1:9876";

const SESSION_FILE: &str = "./qubic-session.json";

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    project: Option<String>,
    bridge: String,
    debug: bool,
    logout: bool,
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
            project: value_of("--project"),
            bridge: value_of("--bridge").unwrap_or_else(|| DEFAULT_BRIDGE.to_string()),
            debug: args.iter().any(|a| a == "--debug"),
            logout: args.iter().any(|a| a == "--logout"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "qubic_connect=debug,activity=info"
    } else {
        "qubic_connect=info,activity=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
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
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Qubic Connect: Pairing ===\n");

    let Some(project) = args.project else {
        bail!("--project <id> is required");
    };

    // ========================================================================
    // Initialize
    // ========================================================================

    println!("[1] Connecting to bridge {}...", args.bridge);

    let client = WalletClient::builder()
        .project_id(project)
        .connector(BridgeConnector::new(&args.bridge)?)
        .file_store(SESSION_FILE)
        .build()?;

    client
        .initialize()
        .await
        .context("bridge did not initialize")?;

    println!("    ✓ State: {}\n", client.state());

    // ========================================================================
    // Pair
    // ========================================================================

    if client.is_active() {
        println!("[2] Restored session {:?}\n", client.topic());
    } else {
        println!("[2] Pairing...");
        let pairing = client.begin_pairing().await?;
        println!("    URI:       {}", pairing.uri);
        println!("    Deep link: {}", pairing.deep_link);
        println!("    Waiting for approval in the wallet...");

        let session = pairing.wait().await?;
        println!("    ✓ Connected, topic {}\n", session.topic);
    }

    // ========================================================================
    // Requests
    // ========================================================================

    println!("[3] Requesting accounts...");
    let accounts = client.request_accounts().await?;
    println!("    {accounts}\n");

    if let Some(address) = accounts
        .get(0)
        .and_then(|a| a.get("address"))
        .and_then(|a| a.as_str())
    {
        println!("[4] Signing a message with {address}...");
        let signed = client
            .sign_message(&MessageRequest {
                from: Some(address.to_string()),
                message: Some("Qubic Connect demo".to_string()),
            })
            .await?;
        println!("    {signed}\n");
    }

    // ========================================================================
    // Logout
    // ========================================================================

    if args.logout {
        println!("[5] Logging out...");
        client.logout().await?;
        println!("    ✓ State: {}", client.state());
    }

    Ok(())
}
