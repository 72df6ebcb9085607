//! HTTP application state: wraps `ServiceState` with HTTP-specific fields.
//!
//! `AppState` provides transparent access to all `ServiceState` methods
//! via `Deref`, and adds transport-specific config like cookie flags.

use std::ops::Deref;
use std::sync::Arc;

use board_service::{ServiceConfig, ServiceState};

/// Shared HTTP application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    service: ServiceState,
    secure_cookie: bool,
}

impl Deref for AppState {
    type Target = ServiceState;

    fn deref(&self) -> &ServiceState {
        &self.inner.service
    }
}

impl AppState {
    /// Creates a new HTTP application state.
    pub fn new(service: ServiceState, secure_cookie: bool) -> Self {
        Self {
            inner: Arc::new(AppInner {
                service,
                secure_cookie,
            }),
        }
    }

    /// Creates an in-memory application state (for tests and ephemeral use).
    pub fn new_in_memory(config: &ServiceConfig) -> Self {
        Self::new(ServiceState::new_in_memory(config), false)
    }

    /// Whether the CSRF cookie carries the `Secure` attribute.
    pub fn secure_cookie(&self) -> bool {
        self.inner.secure_cookie
    }

    /// Returns a reference to the underlying service state.
    pub fn service(&self) -> &ServiceState {
        &self.inner.service
    }
}
