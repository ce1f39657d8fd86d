//! Inference gateway
//!
//! Single entry point for model calls. Each call is forwarded once to the
//! underlying [`Provider`] (which owns retry behaviour) and recorded exactly
//! once in the audit trail, whether it succeeded or not.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::{AuditRecord, AuditSink};
use crate::{InferenceRequest, InferenceResponse, Provider, ProviderError};

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("INFERENCE UNAVAILABLE: {0}")]
    InferenceUnavailable(#[source] ProviderError),

    #[error("AUDIT WRITE FAILED FOR CALL {sequence}: {source}")]
    Audit {
        sequence: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("REQUEST ENCODING FAILED: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Audited access to a model provider
pub struct InferenceGateway<P: Provider> {
    provider: Arc<P>,
    audit: Arc<dyn AuditSink>,
    session: String,
    sequence: AtomicU64,
}

impl<P: Provider> InferenceGateway<P> {
    /// Create a gateway with a fresh random session id
    pub fn new(provider: P, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            provider: Arc::new(provider),
            audit,
            session: uuid::Uuid::new_v4().to_string(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of calls issued so far
    pub fn calls(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Send one request and wait for the answer
    pub async fn complete(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let input = serde_json::to_value(&request)?;

        debug!(
            "Inference call {} ({} turns, {} tools)",
            sequence,
            request.conversation.len(),
            request.tools.len()
        );

        let outcome = self.provider.complete(request).await;

        let record = AuditRecord {
            sequence,
            session: self.session.clone(),
            timestamp: Utc::now(),
            input,
            output: match &outcome {
                Ok(response) => Some(serde_json::to_value(response)?),
                Err(_) => None,
            },
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };

        self.audit
            .record(&record)
            .await
            .map_err(|source| GatewayError::Audit { sequence, source })?;

        match outcome {
            Ok(response) => {
                info!(
                    "Inference call {} finished: {} ({} tokens)",
                    sequence, response.stop_reason, response.usage.total_tokens
                );
                Ok(response)
            }
            Err(e) => {
                warn!("Inference call {} failed: {}", sequence, e);
                Err(GatewayError::InferenceUnavailable(e))
            }
        }
    }
}
