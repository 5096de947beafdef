use hydration_core::config::Config;
use hydration_mcp::{HydrationMcpHandler, build_store, resolve_log_filter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_env = resolve_log_filter(|k| std::env::var(k).ok());

    // Append per-target overrides to keep rmcp internals quiet by default
    let combined_filter = format!("{},rmcp=warn,serve_inner=warn", log_env);
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    // stdout carries the MCP transport; logs go to stderr
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("hydration_mcp: log filter: {}", log_env);

    let config = Config::from_env()?;
    let store = build_store(&config).await?;
    let handler = HydrationMcpHandler::new(store, config);

    tracing::info!(
        "hydration_mcp: registered {} tools and {} prompts",
        handler.tool_count(),
        handler.prompt_count()
    );

    tracing::info!("hydration_mcp: starting stdio MCP server...");

    use rmcp::serve_server;
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = serve_server(handler, transport).await?;

    tracing::info!("hydration_mcp: service initialized as server");

    server.waiting().await?;

    Ok(())
}
