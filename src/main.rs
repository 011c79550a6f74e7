use price_relay::{Relay, RelayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Price Relay - live mean-price websocket broadcaster

USAGE:
    price-relay [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    HOST                Listen host (default: 0.0.0.0)
    PORT                Listen port (default: 8080)
    UPSTREAM_URL        Upstream depth-stream endpoint
    WORKERS             Fan-out worker count (default: 4)
    RUST_LOG            Log level filter

EXAMPLES:
    # Run with defaults (btcusdt@depth20 from Binance, port 8080)
    price-relay

    # Run with config file
    price-relay --config config.json

    # Run with custom port
    PORT=9000 price-relay
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_relay=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = if let Some(path) = config_path {
        tracing::info!("Loading configuration from: {}", path);
        RelayConfig::from_file(&path)?
    } else {
        RelayConfig::default()
    };

    // Environment overrides
    if let Ok(host) = std::env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        config.port = port.parse().unwrap_or(config.port);
    }
    if let Ok(url) = std::env::var("UPSTREAM_URL") {
        config.upstream_url = url;
    }
    if let Ok(workers) = std::env::var("WORKERS") {
        config.workers = workers.parse().unwrap_or(config.workers);
    }
    config.validate()?;

    tracing::info!("Starting price relay");
    tracing::info!("Subscribers: ws://{}/ws", config.listen_addr());
    tracing::info!("Health: http://{}/health", config.listen_addr());
    tracing::info!("Upstream: {}", config.upstream_url);
    tracing::info!("Fan-out workers: {}", config.worker_count());

    let relay = Relay::new(config);
    relay.run().await?;

    Ok(())
}
