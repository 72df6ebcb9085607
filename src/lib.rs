//! Board Server - message board with an anti-abuse write gate.
//!
//! The binary wires three pieces together:
//! - `board-service`: gate, stores, change feed, metrics
//! - `board-http`: axum transport
//! - [`config`]: CLI and environment settings

pub mod config;

use std::sync::Arc;

use board_service::ServiceState;
use board_service::error::ServiceError;
use board_service::store::{BoardStore, MemoryStore, RestStore, UnconfiguredStore};

pub use board_http::{AppState, router, serve};
use config::{Config, StoreBackend};

/// Builds the configured store.
///
/// A rest backend without URL or key still starts, but every store call
/// answers "Server is misconfigured".
pub fn build_store(config: &Config) -> Result<Arc<dyn BoardStore>, ServiceError> {
    match config.store {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Rest => match (&config.store_url, &config.store_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                let store = RestStore::new(url, key, &config.store_table)?;
                tracing::info!(endpoint = %store.endpoint(), "using remote store");
                Ok(Arc::new(store))
            }
            _ => {
                tracing::warn!("remote store selected without URL or key; posts will fail");
                Ok(Arc::new(UnconfiguredStore::default()))
            }
        },
    }
}

/// Builds the HTTP application state from the process config.
pub fn build_state(config: &Config) -> Result<AppState, ServiceError> {
    let store = build_store(config)?;
    let service = ServiceState::new(&config.service_config(), store);
    Ok(AppState::new(service, config.secure_cookie))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[tokio::test]
    async fn rest_without_credentials_is_misconfigured() {
        let config = Config::try_parse_from(["board-server", "--store", "rest"]).unwrap();
        let Ok(store) = build_store(&Config {
            store_url: None,
            store_key: None,
            ..config
        }) else {
            panic!("store should build");
        };
        assert!(matches!(store.list(1).await, Err(ServiceError::Misconfigured)));
    }

    #[test]
    fn rest_with_bad_url_fails_at_startup() {
        let config = Config::try_parse_from([
            "board-server",
            "--store",
            "rest",
            "--store-url",
            "not a url",
            "--store-key",
            "k",
        ])
        .unwrap();
        assert!(build_state(&config).is_err());
    }
}
