//! Board Server entry point.

use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use board_server::config::Config;

/// How often expired rate-limit entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = match board_server::build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "invalid store configuration");
            std::process::exit(2);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = ?config.store,
        posting_enabled = config.post_enabled,
        "Board Server starting",
    );

    let addr = SocketAddr::new(config.host.parse().expect("invalid host"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    // Spawn rate-limiter sweep task
    let sweep_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            let removed = sweep_state.sweep();
            if removed > 0 {
                tracing::debug!(removed, "Swept expired rate-limit entries");
            }
        }
    });

    tracing::info!(%addr, "Board Server ready");

    board_server::serve(listener, state, shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("Board Server shut down");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install signal handler");
    tracing::info!("Shutdown signal received");
}
