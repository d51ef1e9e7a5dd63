//! Device record holding a backend and its lazily created shaper store.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::backend::ShaperOps;
use super::handle::{Handle, Scope};
use super::store::{ShaperLimits, ShaperStore, TxnId};
use super::types::{Capabilities, ScopeCapabilities, ShaperInfo};
use crate::{Error, Result};

/// A network device that may carry hardware shapers.
///
/// The store is created on first mutation and dropped by
/// [`Device::teardown`]. Its lock is held only around cache updates,
/// never across backend calls.
pub struct Device {
    ifindex: u32,
    name: String,
    backend: Option<Arc<dyn ShaperOps>>,
    limits: ShaperLimits,
    store: Mutex<Option<ShaperStore>>,
    next_txn: AtomicU64,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("ifindex", &self.ifindex)
            .field("name", &self.name)
            .field("backend", &self.backend.is_some())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a device without shaper support.
    pub fn new(ifindex: u32, name: impl Into<String>) -> Self {
        Self {
            ifindex,
            name: name.into(),
            backend: None,
            limits: ShaperLimits::default(),
            store: Mutex::new(None),
            next_txn: AtomicU64::new(1),
        }
    }

    /// Attach the driver operations.
    pub fn with_backend(mut self, backend: Arc<dyn ShaperOps>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the store limits.
    pub fn with_limits(mut self, limits: ShaperLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Interface index.
    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if a driver backend is attached.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// The driver backend, or `Unsupported` if there is none.
    pub fn backend(&self) -> Result<&Arc<dyn ShaperOps>> {
        self.backend.as_ref().ok_or_else(|| {
            Error::Unsupported(format!("device {} does not support H/W shaper", self.name))
        })
    }

    /// Look up a committed shaper.
    pub fn get(&self, handle: Handle) -> Result<ShaperInfo> {
        self.backend()?;
        self.read_store(|store| store.lookup(handle).copied())
            .flatten()
            .ok_or(Error::NotFound { handle })
    }

    /// Up to `limit` committed shapers strictly after `cursor`, in handle
    /// order.
    pub fn dump(&self, cursor: Option<Handle>, limit: usize) -> Result<Vec<ShaperInfo>> {
        self.backend()?;
        Ok(self
            .read_store(|store| store.range_after(cursor).take(limit).copied().collect())
            .unwrap_or_default())
    }

    /// Every committed shaper, in handle order.
    pub fn shapers(&self) -> Result<Vec<ShaperInfo>> {
        self.dump(None, usize::MAX)
    }

    /// Features the backend supports for `scope`.
    pub async fn capabilities(&self, scope: Scope) -> Result<Capabilities> {
        let backend = self.backend()?;
        backend.capabilities(self, scope).await
    }

    /// Capabilities of every exposed scope the backend answers for.
    ///
    /// Scopes for which the backend returns an error are skipped.
    pub async fn capabilities_all(&self) -> Result<Vec<ScopeCapabilities>> {
        let backend = self.backend()?;
        let mut out = Vec::new();
        for scope in Scope::EXPOSED {
            match backend.capabilities(self, scope).await {
                Ok(caps) => out.push(ScopeCapabilities {
                    ifindex: self.ifindex,
                    scope,
                    caps,
                }),
                Err(e) => {
                    tracing::debug!(dev = %self.name, %scope, error = %e, "skipping scope capabilities");
                }
            }
        }
        Ok(out)
    }

    /// Drop every cached shaper and the detached id space.
    ///
    /// Called when the device goes away. Hardware is not touched.
    pub fn teardown(&self) {
        if let Some(mut store) = self.store.lock().take() {
            let n = store.teardown();
            tracing::info!(dev = %self.name, shapers = n, "shaper store torn down");
        }
    }

    /// True once the store has been created.
    pub fn has_store(&self) -> bool {
        self.store.lock().is_some()
    }

    /// Number of detached ids currently allocated.
    pub fn detached_ids_in_use(&self) -> usize {
        self.read_store(|store| store.detached_ids_in_use())
            .unwrap_or(0)
    }

    /// Number of cache entries inserted by unresolved transactions.
    pub fn tentative_count(&self) -> usize {
        self.read_store(|store| store.tentative_count())
            .unwrap_or(0)
    }

    /// Number of cache entries held by unresolved transactions.
    pub fn held_count(&self) -> usize {
        self.read_store(|store| store.held_count()).unwrap_or(0)
    }

    /// Run `f` on the store if it exists.
    pub(crate) fn read_store<R>(&self, f: impl FnOnce(&ShaperStore) -> R) -> Option<R> {
        self.store.lock().as_ref().map(f)
    }

    /// Run `f` on the store, creating it first if needed.
    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&mut ShaperStore) -> R) -> R {
        let mut guard = self.store.lock();
        let store = guard.get_or_insert_with(|| {
            tracing::info!(dev = %self.name, ifindex = self.ifindex, "shaper store created");
            ShaperStore::new(self.limits)
        });
        f(store)
    }

    /// Run `f` on the store if it exists, without creating it.
    pub(crate) fn with_existing_store<R>(
        &self,
        f: impl FnOnce(&mut ShaperStore) -> R,
    ) -> Option<R> {
        self.store.lock().as_mut().map(f)
    }

    pub(crate) fn next_txn_id(&self) -> TxnId {
        TxnId(self.next_txn.fetch_add(1, Ordering::Relaxed))
    }
}
