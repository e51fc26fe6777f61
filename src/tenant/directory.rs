//! Credential-indexed tenant directory over the shared store.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::record::{Tenant, TenantSpec, TenantUpdate, derive_identity, generate_credential};
use crate::catalog::ModelCatalog;
use crate::ledger::GatewayStore;
use crate::{Error, Result};

/// Digest of a bearer credential.
///
/// Lookups compare SHA-256 digests instead of the raw strings: digests have
/// a fixed length and reveal nothing useful through comparison timing, so a
/// probing caller learns only found/not-found.
fn credential_digest(credential: &str) -> [u8; 32] {
    Sha256::digest(credential.as_bytes()).into()
}

/// Tenant directory: resolve, create, edit, rotate.
///
/// Reads are frequent and cheap; writes are rare administrative operations
/// and run as single-writer critical sections on the shared store.
#[derive(Clone, Debug)]
pub struct TenantDirectory {
    store: Arc<GatewayStore>,
}

impl TenantDirectory {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    /// Authenticate a bearer credential.
    ///
    /// Unknown credentials fail with [`Error::Unauthenticated`]; a valid
    /// credential for a deactivated tenant fails with [`Error::Deactivated`].
    pub async fn resolve(&self, credential: &str) -> Result<Tenant> {
        if credential.is_empty() {
            return Err(Error::unauthenticated("tenant credential required"));
        }
        let candidate = credential_digest(credential);

        let tenant = self
            .store
            .read(|state| {
                state
                    .tenants
                    .values()
                    .find(|t| credential_digest(&t.credential) == candidate)
                    .cloned()
            })
            .await
            .ok_or_else(|| Error::unauthenticated("invalid tenant credential"))?;

        if !tenant.active {
            return Err(Error::Deactivated { tenant: tenant.id });
        }
        Ok(tenant)
    }

    /// Fetch a tenant by identity.
    pub async fn get(&self, id: &str) -> Result<Tenant> {
        self.store
            .read(|state| state.tenants.get(id).cloned())
            .await
            .ok_or_else(|| Error::NotFound { tenant: id.into() })
    }

    /// All tenants, in identity order.
    pub async fn list(&self) -> Vec<Tenant> {
        self.store
            .read(|state| state.tenants.values().cloned().collect())
            .await
    }

    /// Create a tenant from a spec.
    ///
    /// Derives the identity from the display name and mints a fresh
    /// credential. An identity collision is rejected rather than silently
    /// overwriting the existing record. When no allow-list is given, one is
    /// derived from the plan's tiers against `catalog`.
    pub async fn create(&self, spec: TenantSpec, catalog: &ModelCatalog) -> Result<Tenant> {
        let id = derive_identity(&spec.name);
        if id.is_empty() {
            return Err(Error::Validation("tenant name is required".into()));
        }

        let plan = spec.plan.unwrap_or_default();
        let models_allowed = spec
            .models_allowed
            .unwrap_or_else(|| catalog.models_for_plan(plan));

        let tenant = Tenant::new(
            id.clone(),
            spec.name,
            spec.contact.unwrap_or_default(),
            generate_credential(),
            plan,
            spec.monthly_limit_usd
                .unwrap_or_else(TenantSpec::default_limit),
            models_allowed,
        );

        self.store
            .mutate(move |state| {
                if state.tenants.contains_key(&id) {
                    return Err(Error::Validation(format!(
                        "tenant identity {id:?} already exists"
                    )));
                }
                state.tenants.insert(id.clone(), tenant.clone());
                Ok(tenant)
            })
            .await
            .inspect(|tenant| {
                tracing::info!(tenant = %tenant.id, plan = %tenant.plan, "tenant created");
            })
    }

    /// Apply a partial edit; absent fields are left untouched.
    pub async fn update(&self, id: &str, update: TenantUpdate) -> Result<Tenant> {
        let id = id.to_string();
        self.store
            .mutate(move |state| {
                let tenant = state
                    .tenants
                    .get_mut(&id)
                    .ok_or_else(|| Error::NotFound { tenant: id.clone() })?;
                update.apply(tenant);
                Ok(tenant.clone())
            })
            .await
    }

    /// Replace the credential atomically and return the new one.
    ///
    /// The old credential stops authenticating the moment this call
    /// returns: the replacement commits under the store's writer lock, and
    /// every resolve that starts afterwards sees the new record.
    pub async fn rotate_credential(&self, id: &str) -> Result<String> {
        let id = id.to_string();
        let fresh = generate_credential();
        self.store
            .mutate({
                let id = id.clone();
                let fresh = fresh.clone();
                move |state| {
                    let tenant = state
                        .tenants
                        .get_mut(&id)
                        .ok_or_else(|| Error::NotFound { tenant: id.clone() })?;
                    tenant.credential = fresh;
                    Ok(())
                }
            })
            .await?;

        tracing::info!(tenant = %id, "credential rotated");
        Ok(fresh)
    }
}
