use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use transcriber::config::{ModelRegistry, resolve_api_key};
use transcriber::session::handle_connection;

#[derive(Parser, Debug)]
#[command(name = "transcriber")]
struct Args {
    #[arg(short, long, default_value = "[::]", help = "address to listen on")]
    address: String,

    #[arg(short, long, default_value = "8000", help = "port to listen on")]
    port: u16,

    #[arg(
        short,
        long,
        default_value = "models.json",
        help = "path to the model registry file"
    )]
    models: String,

    #[arg(
        long,
        help = "path to the API key file (default: API_KEY environment variable)"
    )]
    api_key_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;

    let api_key = resolve_api_key(args.api_key_file.as_deref())?;

    info!("Loading model registry: {}", args.models);
    let registry = Arc::new(ModelRegistry::load(&args.models)?);
    for option in registry.options() {
        info!("Model available: {} ({})", option.model_key, option.display_name);
    }

    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("Connection from {}", peer_addr);
        let registry = registry.clone();
        let api_key = api_key.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, registry, api_key).await {
                error!("Connection error: {}", e);
            }
        });
    }
    Ok(())
}
