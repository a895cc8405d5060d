//! Simple relay server example with a synthetic market-data feed
//!
//! Run with: cargo run --example simple_relay [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_relay                  # binds to 0.0.0.0:3001
//!   cargo run --example simple_relay localhost        # binds to 127.0.0.1:3001
//!   cargo run --example simple_relay 127.0.0.1:4000   # binds to 127.0.0.1:4000
//!
//! ## Connecting
//!
//! The demo accepts two fixed tokens:
//!   tok-alice -> identity "alice"
//!   tok-bob   -> identity "bob"
//!
//! With websocat:
//!   websocat "ws://localhost:3001/?token=tok-alice"
//!
//! Then subscribe to the synthetic feed:
//!   {"type":"subscribe","channel":"AAPL"}
//!
//! A background task broadcasts a tick to the AAPL channel every second and
//! unicasts an order update to "alice" every five seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use relay_rs::server::config::DEFAULT_PORT;
use relay_rs::{RelayServer, ServerConfig, StaticTokenVerifier, UserId};

/// Parse bind address from command line argument.
///
/// Accepts "localhost", "IP", or "IP:PORT"; the default port fills in when
/// omitted.
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_relay [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:3001)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=debug".parse()?)
                .add_directive("simple_relay=debug".parse()?),
        )
        .init();

    let config = ServerConfig::from_env().bind(bind_addr);

    let verifier = StaticTokenVerifier::new()
        .with_token("tok-alice", "alice")
        .with_token("tok-bob", "bob");

    println!("Starting relay server on {}", bind_addr);
    println!();
    println!("=== Connect ===");
    println!("websocat \"ws://localhost:{}/?token=tok-alice\"", bind_addr.port());
    println!();
    println!("=== Subscribe to the synthetic feed ===");
    println!("{{\"type\":\"subscribe\",\"channel\":\"AAPL\"}}");
    println!();

    let server = Arc::new(RelayServer::new(config, verifier));

    // Synthetic event source: a tick per second, an order update for alice
    // every five.
    let router = Arc::clone(server.router());
    let feed = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let alice = UserId::new("alice");
        let mut seq: u64 = 0;

        loop {
            ticker.tick().await;
            seq += 1;

            let price = 150.0 + (seq % 20) as f64 * 0.25;
            router
                .broadcast_market_data("AAPL", json!({"price": price, "seq": seq}))
                .await;

            if seq % 5 == 0 {
                router
                    .broadcast_order_update(
                        &alice,
                        json!({"orderId": format!("o-{}", seq), "status": "FILLED"}),
                    )
                    .await;
            }
        }
    });

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    feed.abort();
    Ok(())
}
