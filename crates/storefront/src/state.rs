//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{BackendClient, BackendError};
use crate::checkout::{PaymentAttempts, PaymentCompletionHandler};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It is created once at
/// startup and torn down with [`AppState::shutdown`] after the server stops.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    attempts: PaymentAttempts,
    completion: Arc<PaymentCompletionHandler<BackendClient>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;
        let attempts = PaymentAttempts::with_late_window(
            config.checkout.attempt_ttl,
            config.checkout.late_callback_window,
        );
        let completion = Arc::new(PaymentCompletionHandler::new(
            backend.clone(),
            &config.checkout,
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                attempts,
                completion,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the payment attempt registry.
    #[must_use]
    pub fn attempts(&self) -> &PaymentAttempts {
        &self.inner.attempts
    }

    /// Get a handle to the payment completion handler.
    #[must_use]
    pub fn completion(&self) -> Arc<PaymentCompletionHandler<BackendClient>> {
        Arc::clone(&self.inner.completion)
    }

    /// Drop pending attempts and cached catalog data.
    pub async fn shutdown(&self) {
        self.inner.attempts.shutdown().await;
        self.inner.backend.shutdown().await;
    }
}
