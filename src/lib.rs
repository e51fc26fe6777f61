//! # tollgate
//!
//! Core of a multi-tenant metering gateway: it sits between client
//! organizations ("tenants") and a single pay-per-token inference provider,
//! enforcing per-tenant spend caps and model entitlements while keeping the
//! operator's instruction templates out of tenant-facing responses.
//!
//! The crate owns tenant authentication, per-request authorization (model
//! entitlement + spend-cap admission), atomic usage accounting, and cost
//! computation. HTTP routing and process bootstrap live outside this crate;
//! callers hand the [`Gateway`] a bearer credential per call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tollgate::{Gateway, GatewayConfig, GenerateRequest, UserContent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let config = GatewayConfig::from_env()?;
//!     let gateway = Gateway::builder().config(config).build()?;
//!
//!     let response = gateway
//!         .generate(
//!             "tg-0b0c5d2e-...",
//!             GenerateRequest {
//!                 model: "claude-sonnet-4".into(),
//!                 request_type: "general".into(),
//!                 content: UserContent::Text("Summarize this visit".into()),
//!                 custom_instruction: None,
//!             },
//!         )
//!         .await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod catalog;
pub mod config;
pub mod gate;
pub mod gateway;
pub mod ledger;
pub mod templates;
pub mod tenant;
pub mod types;
pub mod upstream;

// Re-exports for convenience
pub use catalog::{ModelCatalog, ModelDescriptor, Tier};
pub use config::GatewayConfig;
pub use gate::EntitlementGate;
pub use gateway::{
    CreatedTenant, Dashboard, Gateway, GatewayBuilder, GenerateRequest, GenerateResponse,
    GenerateUsage, Health, TenantDigest, TenantOverview, TenantStatus, TenantUsageReport,
};
pub use ledger::{
    GatewayStore, ModelUsageSummary, PeriodKey, UsageEvent, UsageLedger, UsageReport,
};
pub use templates::InstructionTemplates;
pub use tenant::{Plan, Tenant, TenantDirectory, TenantSpec, TenantUpdate};
pub use types::{Completion, ContentPart, ImageSource, Message, Role, Usage, UserContent};
pub use upstream::{CompletionRequest, HttpUpstream, UpstreamProvider};

use rust_decimal::Decimal;

/// Error type for tollgate operations.
///
/// Every failure surfaces to the immediate caller with a distinguishing kind
/// and a human-readable message; nothing is silently swallowed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid bearer credential, or a bad admin secret.
    #[error("authentication failed: {message}")]
    Unauthenticated { message: String },

    /// Valid credential, but the tenant has been deactivated.
    #[error("tenant {tenant} is deactivated")]
    Deactivated { tenant: String },

    /// The requested model is not in the tenant's allow-list.
    #[error("model {model} is not included in this tenant's plan")]
    ModelNotEntitled { model: String },

    /// The tenant's period spend has reached its cap.
    #[error("monthly spend cap of ${limit} reached (current usage: ${used})")]
    QuotaExceeded { limit: Decimal, used: Decimal },

    /// The upstream provider returned an error envelope.
    #[error("upstream provider error: {message}")]
    Upstream { message: String },

    /// The upstream provider returned success with no usable content.
    #[error("upstream provider returned an empty completion")]
    UpstreamEmpty,

    /// Network failure or timeout reaching the upstream provider.
    ///
    /// Retryable by the caller; no usage is recorded.
    #[error("upstream provider unreachable: {message}")]
    UpstreamUnreachable { message: String },

    /// Unknown tenant identity on an administrative lookup.
    #[error("tenant not found: {tenant}")]
    NotFound { tenant: String },

    /// Missing or malformed request fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistence medium rejected a ledger or directory write.
    ///
    /// The in-flight request is aborted rather than reporting a success
    /// inconsistent with recorded history.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential or admin-secret failures, deactivated tenants.
    Authorization,
    /// Model entitlement or spend-cap denials.
    Entitlement,
    /// Upstream provider rejected the request or returned nothing usable.
    Upstream,
    /// Network-level failures that may succeed on retry.
    Transient,
    /// Bad input: unknown tenants, missing fields, unrecognized content parts.
    Validation,
    /// Storage, serialization, configuration, and other internal failures.
    Internal,
}

impl Error {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Error::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Unauthenticated { .. } | Error::Deactivated { .. } => {
                ErrorCategory::Authorization
            }
            Error::ModelNotEntitled { .. } | Error::QuotaExceeded { .. } => {
                ErrorCategory::Entitlement
            }
            Error::Upstream { .. } | Error::UpstreamEmpty => ErrorCategory::Upstream,
            Error::UpstreamUnreachable { .. } => ErrorCategory::Transient,
            Error::NotFound { .. } | Error::Validation(_) => ErrorCategory::Validation,
            Error::Storage { .. } | Error::Json(_) | Error::Io(_) | Error::Config(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Whether the failure was a pre-flight denial (nothing was billed).
    pub fn is_denial(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Authorization | ErrorCategory::Entitlement
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = Error::QuotaExceeded {
            limit: dec!(50),
            used: dec!(49.999),
        };
        let text = err.to_string();
        assert!(text.contains("$50"));
        assert!(text.contains("$49.999"));
    }

    #[test]
    fn test_error_is_retryable() {
        let unreachable = Error::UpstreamUnreachable {
            message: "connection reset".into(),
        };
        assert!(unreachable.is_retryable());

        let envelope = Error::Upstream {
            message: "model overloaded".into(),
        };
        assert!(!envelope.is_retryable());

        let auth = Error::unauthenticated("invalid credential");
        assert!(!auth.is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::Deactivated { tenant: "x".into() }.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            Error::ModelNotEntitled { model: "m".into() }.category(),
            ErrorCategory::Entitlement
        );
        assert_eq!(Error::UpstreamEmpty.category(), ErrorCategory::Upstream);
        assert_eq!(
            Error::NotFound { tenant: "x".into() }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::storage("disk full").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_denials_are_preflight() {
        assert!(Error::unauthenticated("nope").is_denial());
        assert!(
            Error::QuotaExceeded {
                limit: dec!(10),
                used: dec!(10),
            }
            .is_denial()
        );
        assert!(!Error::UpstreamEmpty.is_denial());
    }
}
