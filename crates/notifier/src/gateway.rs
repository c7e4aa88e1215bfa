//! Push gateway: resolves device tokens and sends one multicast per batch.
//!
//! Per-token failures are expected (uninstalled apps, rotated tokens) and are
//! logged, never raised. Only a missing transport or an unreachable push
//! service fails the call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PushError;
use crate::message::PushMessage;
use crate::registry::DeviceRegistry;

/// Outcome of sending to a single device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResult {
    pub token: String,
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    /// The push service reported the token as no longer registered.
    pub stale: bool,
}

impl TokenResult {
    pub fn delivered(token: &str, message_id: Option<String>) -> Self {
        Self {
            token: token.to_string(),
            success: true,
            message_id,
            error: None,
            stale: false,
        }
    }

    pub fn failed(token: &str, error: String, stale: bool) -> Self {
        Self {
            token: token.to_string(),
            success: false,
            message_id: None,
            error: Some(error),
            stale,
        }
    }
}

/// Result of one multicast call, in token order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MulticastReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<TokenResult>,
}

impl MulticastReport {
    pub fn from_results(results: Vec<TokenResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }
}

/// A vendor push service able to deliver one message to many tokens.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError>;
}

/// Summary of a push leg, as seen by the fanout engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub users: usize,
    pub tokens: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Engine-facing push capability: "push this to these users".
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn push_to_users(
        &self,
        user_ids: &[Uuid],
        message: &PushMessage,
    ) -> Result<PushOutcome, PushError>;
}

/// Device registry plus an optional transport.
///
/// Without a transport every push returns [`PushError::NotConfigured`], so an
/// environment without Firebase credentials still runs the other channels.
pub struct PushGateway {
    registry: Arc<dyn DeviceRegistry>,
    transport: Option<Arc<dyn PushTransport>>,
}

impl PushGateway {
    pub fn new(registry: Arc<dyn DeviceRegistry>, transport: Option<Arc<dyn PushTransport>>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Look up device tokens for `user_ids`.
    pub async fn resolve_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<String>, PushError> {
        self.registry.tokens_for(user_ids).await
    }

    /// Send `message` to every token in one multicast, logging each failure.
    pub async fn send_batch(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        let transport = self.transport.as_ref().ok_or(PushError::NotConfigured)?;

        let report = transport.send_multicast(tokens, message).await?;

        for (index, result) in report.results.iter().enumerate() {
            if !result.success {
                tracing::warn!(
                    token_index = index,
                    stale = result.stale,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Push to device token failed"
                );
            }
        }

        tracing::info!(
            success_count = report.success_count,
            total = tokens.len(),
            "Push multicast sent"
        );

        Ok(report)
    }
}

#[async_trait]
impl PushChannel for PushGateway {
    async fn push_to_users(
        &self,
        user_ids: &[Uuid],
        message: &PushMessage,
    ) -> Result<PushOutcome, PushError> {
        if !self.is_configured() {
            return Err(PushError::NotConfigured);
        }

        let tokens = self.resolve_tokens(user_ids).await?;
        if tokens.is_empty() {
            tracing::debug!(users = user_ids.len(), "No device tokens for push recipients");
            return Ok(PushOutcome {
                users: user_ids.len(),
                ..Default::default()
            });
        }

        let report = self.send_batch(&tokens, message).await?;

        Ok(PushOutcome {
            users: user_ids.len(),
            tokens: tokens.len(),
            success_count: report.success_count,
            failure_count: report.failure_count,
        })
    }
}
