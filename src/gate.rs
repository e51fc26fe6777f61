//! Entitlement gate: the two checks that must pass before any billable call.
//!
//! Model authorization consults the tenant's explicit allow-list; the
//! spend-cap check is a pre-flight admission decision against usage
//! measured before the new request. A request's own cost is unknown until
//! the upstream call returns, so a single admitted request may push the
//! tenant past the cap; the overshoot is bounded by one request.

use rust_decimal::Decimal;

use crate::tenant::Tenant;
use crate::{Error, Result};

/// Stateless authorization checks evaluated by the orchestrator.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntitlementGate;

impl EntitlementGate {
    pub fn new() -> Self {
        Self
    }

    /// Deny unless the model is in the tenant's allow-list.
    pub fn authorize_model(&self, tenant: &Tenant, model: &str) -> Result<()> {
        if tenant.models_allowed.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(Error::ModelNotEntitled {
                model: model.to_string(),
            })
        }
    }

    /// Deny unless measured period spend is strictly below the cap.
    ///
    /// The denial reports both the cap and the measured usage so callers
    /// can surface an actionable message.
    pub fn admit_spend(&self, tenant: &Tenant, used: Decimal) -> Result<()> {
        if used < tenant.monthly_limit_usd {
            Ok(())
        } else {
            Err(Error::QuotaExceeded {
                limit: tenant.monthly_limit_usd,
                used,
            })
        }
    }
}
