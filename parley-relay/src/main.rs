use clap::Parser;
use parley_relay::{RelayConfig, SignalingService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("parley_relay=info,tower_http=info")),
        )
        .init();

    let config = RelayConfig::parse();
    let addr = config.bind_addr()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    parley_relay::serve(listener, SignalingService::new(config)).await
}
