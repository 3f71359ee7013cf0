//! CLI for netgraph
//!
//! Subcommands:
//! - `server`: run the broker with graph publishing
//! - `watch`: subscribe to the graph topic and print every snapshot

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use netgraph::broker::Broker;
use netgraph::config::load_config;
use netgraph::graph::Snapshot;
use netgraph::transport::message::{ClientMessage, ServerMessage};
use netgraph::transport::websocket::start_websocket_server;
use netgraph::utils::logging;
use netgraph::utils::memory::CountingAllocator;
use std::sync::{Arc, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

#[derive(Parser)]
#[command(name = "netgraph")]
enum Command {
    /// Start the WebSocket broker
    Server,
    /// Print the topology graph published by a running server
    Watch {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Graph topic to subscribe to (default: the configured one)
        #[arg(long)]
        topic: Option<String>,
        /// Send one latency probe after connecting
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                logging::init("info");
                error!("Server failed: {}", e);
            }
        }
        Command::Watch { url, topic, probe } => {
            if let Err(e) = run_watch(&url, topic, probe).await {
                logging::init("info");
                error!("Watch failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.log.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Arc::new(Mutex::new(Broker::new(config.graph.clone())));

    tokio::spawn(Broker::start_graph_loop(broker.clone()));

    tokio::select! {
        result = start_websocket_server(&addr, broker) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_watch(
    url: &str,
    topic: Option<String>,
    probe: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.log.level);
    let topic = topic.unwrap_or(config.graph.topic);

    let (mut ws_stream, _response) = connect_async(url).await?;
    info!("Connected to {}", url);

    let subscribe = ClientMessage::Subscribe {
        topic: topic.clone(),
    };
    ws_stream
        .send(WsMessage::text(serde_json::to_string(&subscribe)?))
        .await?;

    if probe {
        let request = ClientMessage::Publish {
            topic: config.graph.latency_topic.clone(),
            payload: String::new(),
            retain: false,
        };
        ws_stream
            .send(WsMessage::text(serde_json::to_string(&request)?))
            .await?;
    }

    while let Some(frame) = ws_stream.next().await {
        let frame = frame?;
        if !frame.is_text() {
            continue;
        }
        match serde_json::from_str::<ServerMessage>(frame.to_text()?)? {
            ServerMessage::Message {
                topic: received,
                payload,
                ..
            } if received == topic => print_snapshot(&payload),
            ServerMessage::Message {
                topic: received,
                payload,
                ..
            } => println!("{received}: {payload}"),
            ServerMessage::Probe {} => {
                let ack = ClientMessage::ProbeAck {};
                ws_stream
                    .send(WsMessage::text(serde_json::to_string(&ack)?))
                    .await?;
            }
            ServerMessage::Error { message } => warn!("Server error: {}", message),
        }
    }

    info!("Connection closed");
    Ok(())
}

fn print_snapshot(payload: &str) {
    let snapshot: Snapshot = match serde_json::from_str(payload) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Unreadable graph document: {}", e);
            return;
        }
    };

    println!(
        "graph: {} ips, {} topics",
        snapshot.ips.len(),
        snapshot.topics.len()
    );
    for ip in &snapshot.ips {
        println!("  {}", ip.id);
        for client in &ip.clients {
            let latency = client
                .latency
                .map_or_else(|| "-".to_string(), |ms| format!("{ms:.3} ms"));
            println!("    {} (latency {})", client.name, latency);
            for edge in &client.published {
                println!("      -> {} {:.3} B/s", edge.topic, edge.bps);
            }
        }
    }
    for topic in &snapshot.topics {
        let subscribers: Vec<&str> = topic
            .subscriptions
            .iter()
            .map(|s| s.client.as_str())
            .collect();
        println!(
            "  [{}] {:.3} B/s{} -> {}",
            topic.name,
            topic.bps,
            if topic.retain { " retained" } else { "" },
            subscribers.join(", ")
        );
    }
}
