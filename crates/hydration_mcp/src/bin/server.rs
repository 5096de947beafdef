use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::info;

use hydration_core::config::Config;
use hydration_mcp::http::{AppState, app_router};
use hydration_mcp::{HydrationMcpHandler, HydrationService, build_store, resolve_log_filter};

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

fn max_body_size_from(raw: Option<String>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_BODY_BYTES)
}

fn address_from(raw: Option<String>) -> SocketAddr {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)))
}


#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let log_env = resolve_log_filter(|k| std::env::var(k).ok());
    let env_filter = tracing_subscriber::EnvFilter::try_new(log_env.clone())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "hydration_mcp:http: log filter");

    let handle = PrometheusBuilder::new().install_recorder()?;

    let config = Config::from_env()?;
    let store = build_store(&config).await?;
    let service = HydrationService::new(store, config);
    let state = Arc::new(AppState {
        service: service.clone(),
        metrics: Some(handle),
    });

    let max_body_size = max_body_size_from(std::env::var("MAX_HTTP_BODY_SIZE").ok());

    // rmcp StreamableHttpService mounted at /mcp, sharing the same store
    let handler = HydrationMcpHandler::from_service(service);
    let factory = move || -> Result<_, std::io::Error> { Ok(handler.clone()) };
    let session = Arc::new(
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default(),
    );
    let mcp_service = rmcp::transport::streamable_http_server::tower::StreamableHttpService::new(
        factory,
        session,
        rmcp::transport::streamable_http_server::tower::StreamableHttpServerConfig::default(),
    );

    let app = app_router(state)
        .nest_service("/mcp", mcp_service)
        .layer(axum::extract::DefaultBodyLimit::max(max_body_size));

    let addr = address_from(std::env::var("ADDRESS").ok());
    info!(%addr, max_body_bytes = max_body_size, "starting HTTP server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app.into_make_service());
    if let Err(e) = server
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl+c: {e}");
            }
        })
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
