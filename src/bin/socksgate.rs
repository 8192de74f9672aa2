use anyhow::Result;
use clap::Parser;
use socksgate::{ProxyConfig, Socks5Server, config::DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "An authenticating SOCKS5 proxy", long_about = None)]
struct Args {
    /// JSON config file with port, user and pass
    #[arg(short, long, env = "SOCKSGATE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    // Priority: --verbose flag, then RUST_LOG, then info
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Resolve config: environment > file > defaults
    let config = ProxyConfig::load(&args.config);

    info!("Starting SOCKS5 proxy on port {}", config.port);
    info!("Auth username: {:?}", config.username);

    // Instantiate server and run it
    let mut server = Socks5Server::from_config(&config);
    server.run().await
}
