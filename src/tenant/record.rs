//! Tenant records: plans, creation specs, and partial updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Tier;

/// Maximum length of a derived tenant identity.
const IDENTITY_MAX_LEN: usize = 30;

/// Prefix carried by every issued credential.
const CREDENTIAL_PREFIX: &str = "tg-";

/// Billing plan a tenant subscribes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    #[default]
    Pro,
    Premium,
}

impl Plan {
    /// Model tiers this plan may use when auto-deriving an allow-list.
    ///
    /// The tenant's explicit allow-list is the authority at request time;
    /// this mapping only seeds it at creation.
    pub fn allowed_tiers(&self) -> &'static [Tier] {
        match self {
            Plan::Basic => &[Tier::Basic],
            Plan::Pro => &[Tier::Basic, Tier::Pro],
            Plan::Premium => &[Tier::Basic, Tier::Pro, Tier::Premium],
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Premium => "premium",
        };
        f.write_str(name)
    }
}

/// A billable client organization.
///
/// Identity is unique and immutable once assigned; the credential is a
/// bearer secret unique across all tenants. Tenants are never physically
/// deleted; deactivation via `active` is the deletion mechanism.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable identity; the ledger's partition key
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact string
    pub contact: String,
    /// Bearer secret; rotate with
    /// [`crate::tenant::TenantDirectory::rotate_credential`]
    pub credential: String,
    /// Billing plan
    pub plan: Plan,
    /// Monthly spend cap in USD
    pub monthly_limit_usd: Decimal,
    /// Explicit model allow-list; the authority at request time
    pub models_allowed: Vec<String>,
    /// Inactive tenants are rejected even with a valid credential
    pub active: bool,
    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl Tenant {
    pub fn new(
        id: String,
        name: String,
        contact: String,
        credential: String,
        plan: Plan,
        monthly_limit_usd: Decimal,
        models_allowed: Vec<String>,
    ) -> Self {
        Self {
            id,
            name,
            contact,
            credential,
            plan,
            monthly_limit_usd,
            models_allowed,
            active: true,
            created: Utc::now(),
        }
    }

    /// Credential safe for listings: first eight characters plus an ellipsis.
    pub fn masked_credential(&self) -> String {
        let visible: String = self.credential.chars().take(8).collect();
        format!("{visible}...")
    }
}

// Credentials are bearer secrets; keep them out of debug output.
impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("credential", &self.masked_credential())
            .field("plan", &self.plan)
            .field("monthly_limit_usd", &self.monthly_limit_usd)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Fields accepted when creating a tenant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantSpec {
    /// Display name; required
    pub name: String,
    /// Contact string
    #[serde(default)]
    pub contact: Option<String>,
    /// Billing plan; defaults to [`Plan::Pro`]
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Monthly spend cap; defaults to $50
    #[serde(default)]
    pub monthly_limit_usd: Option<Decimal>,
    /// Explicit allow-list; defaults to every model the plan's tiers cover
    #[serde(default)]
    pub models_allowed: Option<Vec<String>>,
}

impl TenantSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn default_limit() -> Decimal {
        dec!(50)
    }
}

/// Partial administrative edit: absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub monthly_limit_usd: Option<Decimal>,
    #[serde(default)]
    pub models_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl TenantUpdate {
    /// Apply only the fields present in this update.
    pub(crate) fn apply(self, tenant: &mut Tenant) {
        if let Some(name) = self.name {
            tenant.name = name;
        }
        if let Some(contact) = self.contact {
            tenant.contact = contact;
        }
        if let Some(plan) = self.plan {
            tenant.plan = plan;
        }
        if let Some(limit) = self.monthly_limit_usd {
            tenant.monthly_limit_usd = limit;
        }
        if let Some(models) = self.models_allowed {
            tenant.models_allowed = models;
        }
        if let Some(active) = self.active {
            tenant.active = active;
        }
    }
}

/// Derive a URL-safe identity from a display name: lower-cased, runs of
/// non-alphanumerics collapsed to `-`, trimmed, length-bounded.
pub(crate) fn derive_identity(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug.truncate(IDENTITY_MAX_LEN);
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Mint a fresh bearer credential.
pub(crate) fn generate_credential() -> String {
    format!("{CREDENTIAL_PREFIX}{}", Uuid::new_v4())
}
