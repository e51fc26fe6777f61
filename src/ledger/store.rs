//! Shared persisted state: tenants by identity plus the ordered usage log.
//!
//! The store is the one shared mutable resource in the gateway. Every
//! mutation runs as a single-writer critical section: the new state is
//! built aside, flushed to disk as a complete snapshot (tmp file + atomic
//! rename), and only then committed to memory. A flush failure therefore
//! leaves both memory and disk on the previous consistent snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::UsageEvent;
use crate::tenant::Tenant;
use crate::{Error, Result};

/// Persisted snapshot layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    /// Tenant records keyed by identity.
    pub tenants: BTreeMap<String, Tenant>,
    /// Append-only log of billable events, in commit order.
    pub usage_log: Vec<UsageEvent>,
}

/// Tenant directory + usage ledger backing store.
///
/// Explicitly owned and injected into the [`crate::Gateway`]; tests create
/// isolated instances with [`GatewayStore::in_memory`].
#[derive(Debug)]
pub struct GatewayStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl GatewayStore {
    /// Open (or initialize) a store persisted at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            StoreState::default()
        };

        Ok(Arc::new(Self {
            state: RwLock::new(state),
            path: Some(path),
        }))
    }

    /// A store with no persistence, for tests and ephemeral deployments.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        })
    }

    /// Default snapshot location under the platform data directory.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "tollgate")
            .map(|dirs| dirs.data_dir().join("gateway.json"))
            .unwrap_or_else(|| PathBuf::from("gateway.json"))
    }

    /// Run a read-only closure against the current snapshot.
    pub(crate) async fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Run a mutation as a single-writer critical section.
    ///
    /// The closure edits a copy of the state; the copy is flushed to disk
    /// before it replaces the in-memory snapshot, so a storage failure
    /// aborts the mutation without losing or corrupting prior events.
    pub(crate) async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.flush(&next)?;
        *guard = next;
        Ok(out)
    }

    fn flush(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match Self::write_snapshot(path, state) {
            Ok(()) => Ok(()),
            Err(err) => {
                // One retry before aborting the in-flight request; losing a
                // ledger write silently would break the accounting invariant.
                tracing::warn!(error = %err, path = %path.display(), "snapshot flush failed, retrying");
                Self::write_snapshot(path, state).map_err(|err| Error::Storage {
                    message: format!("cannot persist snapshot to {}: {err}", path.display()),
                })
            }
        }
    }

    fn write_snapshot(path: &Path, state: &StoreState) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)
    }
}
