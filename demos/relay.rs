//! TCP relay demo.
//!
//! Listens for clients, connects each one to the upstream server and runs
//! an inject session between them. Decoded messages and reports are written
//! as JSON lines to stdout.
//!
//! ```text
//! cargo run --example relay -- 127.0.0.1:5555 game.example.net:5555 registry.json [bridge.json]
//! ```
//!
//! `registry.json` maps wire ids to MessagePack-encoded message names:
//!
//! ```json
//! { "861": "ChatClientMultiMessage", "5806": "ExchangeBidHouseSearchMessage" }
//! ```
//!
//! Set `RUST_LOG=wirebridge=debug` to log every frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use wirebridge::policy::{Inject, TraceMessages};
use wirebridge::registry::MessageRegistry;
use wirebridge::sink::{JsonLinesSink, PersistenceSink, ReportingSink};
use wirebridge::{BridgeConfig, BridgeError, Result, Session};

fn load_registry(path: &str) -> Result<MessageRegistry> {
    let content = std::fs::read_to_string(path)?;
    let names: BTreeMap<u16, String> = serde_json::from_str(&content)?;

    let mut registry = MessageRegistry::new();
    for (id, name) in &names {
        registry.register_msgpack(*id, name)?;
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [listen, upstream, registry_path, rest @ ..] = args.as_slice() else {
        return Err(BridgeError::Config(
            "usage: relay <listen> <upstream> <registry.json> [bridge.json]".into(),
        ));
    };

    let config = match rest.first() {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    let registry = Arc::new(load_registry(registry_path)?);
    info!(messages = registry.len(), "registry loaded");

    let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let listener = TcpListener::bind(listen).await?;
    info!("listening on {}, relaying to {}", listen, upstream);

    loop {
        let (client, peer) = listener.accept().await?;
        let server = match TcpStream::connect(upstream.as_str()).await {
            Ok(server) => server,
            Err(e) => {
                error!(%peer, "upstream connect failed: {}", e);
                continue;
            }
        };
        client.set_nodelay(true)?;
        server.set_nodelay(true)?;

        let persistence: Arc<dyn PersistenceSink> = sink.clone();
        let reporting: Arc<dyn ReportingSink> = sink.clone();
        let policy = Inject::with_callback(registry.clone(), TraceMessages::new())
            .configure(&config, Some(reporting))
            .with_persistence(persistence);
        let session = Session::new(client, server, policy).with_config(&config.session);

        tokio::spawn(async move {
            info!(%peer, "client connected");
            if let Err(e) = session.run().await {
                error!(%peer, "session failed: {}", e);
            }
        });
    }
}
