//! Model registry lookup.
//!
//! Resolves a caller-supplied model identifier to the model row joined with
//! its owning provider. Anything other than an active, non-deleted row is a
//! rejection: the gateway never silently substitutes a different model at
//! this stage.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::store::ChatStore;
use crate::types::ResolvedModel;
use crate::{GatewayError, Result};

/// Read-only view over the model/provider tables.
#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn ChatStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Resolve `model_id` to `{model, provider}`.
    ///
    /// Returns [`GatewayError::InvalidModelConfiguration`] when no active,
    /// non-deleted row matches.
    #[instrument(name = "registry.resolve", skip(self))]
    pub async fn resolve(&self, model_id: &str) -> Result<ResolvedModel> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(GatewayError::InvalidModelConfiguration(
                "empty model identifier".into(),
            ));
        }

        let (model, provider) = self
            .store
            .find_model(model_id, false)
            .await?
            .ok_or_else(|| GatewayError::InvalidModelConfiguration(model_id.to_string()))?;

        if !model.is_servable() {
            debug!(status = ?model.status, "model row is not servable");
            return Err(GatewayError::InvalidModelConfiguration(model_id.to_string()));
        }

        Ok(ResolvedModel { model, provider })
    }
}
