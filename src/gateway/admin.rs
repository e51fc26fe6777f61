//! Administrative surface: tenant lifecycle and usage reporting.
//!
//! Every operation authenticates with the administrative secret, which is
//! distinct from all tenant credentials and compared by SHA-256 digest like
//! they are.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{Gateway, TOTAL_DP};
use crate::catalog::ModelDescriptor;
use crate::ledger::{ModelUsageSummary, PeriodKey, UsageEvent};
use crate::tenant::{Plan, Tenant, TenantSpec, TenantUpdate};
use crate::{Error, Result};

/// A freshly created tenant plus its one-time-displayed credential.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    /// Hand this to the tenant; listings only ever show it masked
    pub credential: String,
}

/// Listing row: full record with the credential masked and current-period
/// usage attached.
#[derive(Debug, Clone, Serialize)]
pub struct TenantOverview {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub credential: String,
    pub plan: Plan,
    pub monthly_limit_usd: Decimal,
    pub models_allowed: Vec<String>,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub usage_this_month_usd: Decimal,
}

/// Per-tenant usage report for an arbitrary period.
#[derive(Debug, Clone, Serialize)]
pub struct TenantUsageReport {
    pub tenant: String,
    pub period: PeriodKey,
    pub total_requests: usize,
    pub total_cost_usd: Decimal,
    pub limit_usd: Decimal,
    pub by_model: std::collections::BTreeMap<String, ModelUsageSummary>,
    pub recent: Vec<UsageEvent>,
}

/// One tenant's row in the global dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct TenantDigest {
    pub id: String,
    pub name: String,
    pub plan: Plan,
    pub active: bool,
    pub limit_usd: Decimal,
    pub used_usd: Decimal,
    /// Whole-number percentage of the cap consumed; 0 for a zero cap
    pub percent: u32,
}

/// Global summary for the current period.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub period: PeriodKey,
    pub total_tenants: usize,
    pub active_tenants: usize,
    pub total_requests: usize,
    pub total_cost_usd: Decimal,
    pub tenants: Vec<TenantDigest>,
    pub available_models: Vec<ModelDescriptor>,
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

impl Gateway {
    fn authorize_admin(&self, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return Err(Error::unauthenticated("admin secret required"));
        }
        if digest(secret) != digest(self.admin_secret().expose_secret()) {
            return Err(Error::unauthenticated("invalid admin secret"));
        }
        Ok(())
    }

    /// Create a tenant and return it with its new credential.
    pub async fn create_tenant(&self, secret: &str, spec: TenantSpec) -> Result<CreatedTenant> {
        self.authorize_admin(secret)?;
        let tenant = self.directory().create(spec, self.catalog()).await?;
        Ok(CreatedTenant {
            credential: tenant.credential.clone(),
            tenant,
        })
    }

    /// Apply a partial edit to a tenant.
    pub async fn update_tenant(
        &self,
        secret: &str,
        id: &str,
        update: TenantUpdate,
    ) -> Result<Tenant> {
        self.authorize_admin(secret)?;
        self.directory().update(id, update).await
    }

    /// Rotate a tenant's credential, returning the replacement.
    pub async fn rotate_credential(&self, secret: &str, id: &str) -> Result<String> {
        self.authorize_admin(secret)?;
        self.directory().rotate_credential(id).await
    }

    /// Every tenant with masked credentials and current-period usage.
    pub async fn list_tenants(&self, secret: &str) -> Result<Vec<TenantOverview>> {
        self.authorize_admin(secret)?;
        let period = PeriodKey::current();

        let mut rows = Vec::new();
        for tenant in self.directory().list().await {
            let used = self.ledger().sum_cost(&tenant.id, &period).await;
            rows.push(TenantOverview {
                credential: tenant.masked_credential(),
                usage_this_month_usd: used.round_dp(TOTAL_DP),
                id: tenant.id,
                name: tenant.name,
                contact: tenant.contact,
                plan: tenant.plan,
                monthly_limit_usd: tenant.monthly_limit_usd,
                models_allowed: tenant.models_allowed,
                active: tenant.active,
                created: tenant.created,
            });
        }
        Ok(rows)
    }

    /// Usage report for one tenant over an arbitrary period (defaults to
    /// the current one).
    pub async fn usage_report(
        &self,
        secret: &str,
        id: &str,
        period: Option<PeriodKey>,
    ) -> Result<TenantUsageReport> {
        self.authorize_admin(secret)?;
        let tenant = self.directory().get(id).await?;
        let period = period.unwrap_or_else(PeriodKey::current);
        let report = self.ledger().report(&tenant.id, &period).await;

        Ok(TenantUsageReport {
            tenant: tenant.name,
            period: report.period,
            total_requests: report.total_requests,
            total_cost_usd: report.total_cost_usd.round_dp(TOTAL_DP),
            limit_usd: tenant.monthly_limit_usd,
            by_model: report.by_model,
            recent: report.recent,
        })
    }

    /// Global dashboard for the current period.
    pub async fn dashboard(&self, secret: &str) -> Result<Dashboard> {
        self.authorize_admin(secret)?;
        let period = PeriodKey::current();
        let tenants = self.directory().list().await;

        let mut digests = Vec::with_capacity(tenants.len());
        for tenant in &tenants {
            let used = self.ledger().sum_cost(&tenant.id, &period).await;
            let percent = if tenant.monthly_limit_usd.is_zero() {
                0
            } else {
                (used / tenant.monthly_limit_usd * dec!(100))
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            };
            digests.push(TenantDigest {
                id: tenant.id.clone(),
                name: tenant.name.clone(),
                plan: tenant.plan,
                active: tenant.active,
                limit_usd: tenant.monthly_limit_usd,
                used_usd: used.round_dp(TOTAL_DP),
                percent,
            });
        }

        Ok(Dashboard {
            total_tenants: tenants.len(),
            active_tenants: tenants.iter().filter(|t| t.active).count(),
            total_requests: self.ledger().total_requests(&period).await,
            total_cost_usd: self.ledger().total_cost(&period).await.round_dp(TOTAL_DP),
            tenants: digests,
            available_models: self.catalog().models().to_vec(),
            period,
        })
    }
}
