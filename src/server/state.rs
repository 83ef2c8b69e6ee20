//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::gateway::{Gateway, OpenAiGateway};

/// Shared application state.
pub struct AppState {
    /// Language model gateway used by every request.
    pub gateway: Arc<dyn Gateway>,
}

impl AppState {
    /// Wrap an existing gateway.
    pub fn new(gateway: Arc<dyn Gateway>) -> Arc<Self> {
        Arc::new(Self { gateway })
    }

    /// Build state around an [`OpenAiGateway`] for `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: GatewayConfig) -> Result<Arc<Self>> {
        let gateway = OpenAiGateway::new(config)?;
        Ok(Self::new(Arc::new(gateway)))
    }
}
