//! Upstream inference provider seam.
//!
//! The orchestrator talks to the provider through [`UpstreamProvider`];
//! tests inject doubles, production wires in [`HttpUpstream`]. Implementors
//! return either a usage-bearing [`Completion`] or a distinct error kind,
//! never a silent empty success.

mod http;

pub use http::{DEFAULT_UPSTREAM_TIMEOUT, HttpUpstream};

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;
use crate::types::{Completion, Message};

/// Request forwarded to the upstream provider.
///
/// The system instruction is assembled by the orchestrator from the
/// operator's templates and is never echoed to the tenant.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Bounded token budget for the completion
    pub max_tokens: u32,
    /// System instruction
    pub system: String,
    /// Role-tagged message sequence
    pub messages: Vec<Message>,
}

/// A pay-per-token inference provider.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Execute one completion call.
    ///
    /// Failure modes map onto the crate error taxonomy:
    /// [`crate::Error::Upstream`] for provider error envelopes,
    /// [`crate::Error::UpstreamUnreachable`] for network failures and
    /// timeouts (retryable, nothing is billed).
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
