//! ReddKit proxy server binary.
//!
//! Serves the login handshake and the `/api` forwarding routes until Ctrl-C.

use clap::Parser;
use tracing::info;

/// CLI arguments for the proxy server.
#[derive(Parser, Debug)]
#[command(name = "reddkit_server", about = "ReddKit authenticated Reddit API proxy")]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reddkit_api=debug,reddkit_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = reddkit_api::config::ApiConfig::from_env()?;
    config.bind_addr = format!("{}:{}", args.host, args.port);

    info!(
        api_base = %config.api_base,
        upstream_timeout_secs = config.upstream_timeout.map(|d| d.as_secs()),
        session_idle_ttl_secs = config.session_idle_ttl.map(|d| d.as_secs()),
        "starting reddkit_server"
    );

    let state = reddkit_api::AppState::new(config.clone())?;
    let sessions = state.sessions.clone();
    let pending_logins = state.pending_logins.clone();
    let eviction = sessions.spawn_eviction_task();
    let login_cleanup = pending_logins.spawn_cleanup_task();

    let app = reddkit_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "proxy listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sessions.shutdown();
    pending_logins.shutdown();
    let _ = eviction.await;
    let _ = login_cleanup.await;

    result?;
    Ok(())
}
