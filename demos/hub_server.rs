//! Overlay hub server with a console-side event log
//!
//! Run with: cargo run --example hub_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example hub_server                    # binds to 0.0.0.0:8765
//!   cargo run --example hub_server localhost          # binds to 127.0.0.1:8765
//!   cargo run --example hub_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Talking to the hub
//!
//! With websocat:
//!   websocat ws://localhost:8765
//!   {"type":"subscribe","channel":"lower"}
//!   {"type":"publish","channel":"lower","data":{"type":"show","payload":{"title":"Alice","duration":5}}}
//!
//! The server also connects an event log to itself as a client. Every show
//! and hide on the standard overlay channels is logged and persisted under
//! the system temp directory.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use overlay_hub::eventlog::{FileStore, HubDispatcher};
use overlay_hub::protocol::channel;
use overlay_hub::server::config::DEFAULT_PORT;
use overlay_hub::{
    Channel, ChannelConnection, ClientConfig, EventLogReconciler, HubServer, ReconcilerConfig,
    ServerConfig,
};

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
    eprintln!("Usage: hub_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
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

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("overlay_hub=debug".parse()?)
                .add_directive("hub_server=debug".parse()?),
        )
        .init();

    let server = Arc::new(HubServer::new(ServerConfig::with_addr(bind_addr)));
    let listener = server.bind().await?;
    let local_addr = listener.local_addr()?;

    // Console-side event log, connected like any other client
    let mut client_config = ClientConfig::new(format!("ws://127.0.0.1:{}", local_addr.port()));
    for name in [
        channel::LOWER,
        channel::POSTER,
        channel::POSTER_BIGPICTURE,
        channel::CHAT_HIGHLIGHT,
    ] {
        client_config = client_config.subscribe(Channel::new(name)?);
    }
    let (console, events) = ChannelConnection::new(client_config);

    let store = Arc::new(FileStore::new(std::env::temp_dir().join("overlay-hub"))?);
    let log = Arc::new(EventLogReconciler::open(
        store,
        HubDispatcher::new(server.hub().clone()),
        ReconcilerConfig::default(),
    ));
    tokio::spawn({
        let log = log.clone();
        async move { log.run(events).await }
    });

    let stats_task = tokio::spawn({
        let server = server.clone();
        let log = log.clone();
        async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                let stats = server.hub().stats().await;
                println!(
                    "Stats: connections={} channels={} published={} delivered={} dropped={} logged={}",
                    stats.connections,
                    stats.channels,
                    stats.messages_published,
                    stats.frames_delivered,
                    stats.subscribers_dropped,
                    log.len(),
                );
            }
        }
    });

    println!("Overlay hub listening on ws://{}", local_addr);
    println!("Press Ctrl+C to stop");

    let serve = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .serve_until(listener, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
        })
    };
    console.start();

    if let Err(e) = serve.await? {
        eprintln!("Server error: {}", e);
    }

    stats_task.abort();
    console.close().await;
    log.shutdown();
    println!("Shutting down...");
    Ok(())
}
