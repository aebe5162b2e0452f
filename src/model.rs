//! The model-invocation capability consumed by the generation orchestrator.
//!
//! Implementations are constructed explicitly and injected; there is no
//! process-wide client.

use async_trait::async_trait;

use crate::config::KindParams;
use crate::error::ModelError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
  /// Run one system+user completion and return the raw text.
  async fn invoke(&self, system: &str, user: &str, params: KindParams) -> Result<String, ModelError>;
}

/// Stand-in used when no credential is configured: every call fails, so the
/// orchestrator always serves fallbacks.
pub struct UnconfiguredModel;

#[async_trait]
impl ModelClient for UnconfiguredModel {
  async fn invoke(&self, _system: &str, _user: &str, _params: KindParams) -> Result<String, ModelError> {
    Err(ModelError::MissingCredential)
  }
}
