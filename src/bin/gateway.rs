//! Gateway binary entry point: loads configuration, builds the server
//! context, and serves the HTTP surface.

use llm_gateway::gateway::context::ServerContext;
use llm_gateway::gateway::http;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = llm_gateway::gateway::config::GatewayConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    let context = ServerContext::build(config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to build gateway context: {e}"))?;
    let state: Arc<ServerContext> = Arc::new(context);

    let app = http::routes(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
