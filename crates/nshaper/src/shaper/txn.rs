//! Prepare/commit/rollback around a backend call.
//!
//! A [`Transaction`] holds every shaper it touches and inserts tentative
//! placeholders for shapers that are not cached yet. It then either
//! commits candidate records after the backend succeeded, or erases its
//! own placeholders and drops its holds. Candidate values live with the
//! caller until commit, so cached shapers are never touched by a failed
//! request.

use super::device::Device;
use super::handle::{Handle, Scope};
use super::store::{Prepared, TxnId};
use super::types::ShaperInfo;
use crate::{Error, Result};

/// Child count change applied at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChildDelta {
    pub handle: Handle,
    pub delta: i64,
}

/// An in-flight update of a device's shaper store.
///
/// Dropping an uncommitted transaction rolls it back.
#[must_use = "a transaction rolls back when dropped"]
pub(crate) struct Transaction<'a> {
    dev: &'a Device,
    id: TxnId,
    inserted: usize,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(dev: &'a Device) -> Self {
        let id = dev.next_txn_id();
        tracing::trace!(dev = dev.name(), txn = id.0, "transaction started");
        Self {
            dev,
            id,
            inserted: 0,
            committed: false,
        }
    }

    pub(crate) fn id(&self) -> TxnId {
        self.id
    }

    /// Make sure `handle` has a cache entry held by this transaction.
    ///
    /// A detached handle with an unspecified id gets a fresh id; the
    /// returned handle is the one that was reserved. A detached handle
    /// with a specified id must already exist.
    pub(crate) fn prepare(&mut self, handle: Handle) -> Result<Handle> {
        let txn = self.id;
        let (handle, prepared) = self.dev.with_store(|store| -> Result<_> {
            let mut handle = handle;
            let mut allocated = false;
            if handle.scope() == Scope::Detached {
                if !handle.is_id_unspec() {
                    store.hold(handle, txn).map_err(|e| match e {
                        Error::NotFound { handle } => Error::InvalidRequest(format!(
                            "detached shaper {} does not exist",
                            handle
                        )),
                        e => e,
                    })?;
                    return Ok((handle, Prepared::Exists));
                }
                handle = Handle::new(Scope::Detached, store.allocate_detached_id()?);
                allocated = true;
            }
            match store.insert_tentative(handle, txn) {
                Ok(prepared) => Ok((handle, prepared)),
                Err(e) => {
                    if allocated {
                        store.release_detached_id(handle.id());
                    }
                    Err(e)
                }
            }
        })?;

        if prepared == Prepared::Inserted {
            self.inserted += 1;
            tracing::debug!(dev = self.dev.name(), txn = txn.0, %handle, "prepared tentative shaper");
        }
        Ok(handle)
    }

    /// Hold the committed shaper `handle` and return its cached value.
    pub(crate) fn hold(&mut self, handle: Handle) -> Result<ShaperInfo> {
        let txn = self.id;
        self.dev
            .with_existing_store(|store| store.hold(handle, txn))
            .unwrap_or(Err(Error::NotFound { handle }))
    }

    /// Publish the candidate records and child count changes, then drop
    /// the holds on shapers that were only read.
    pub(crate) fn commit(mut self, shapers: &[ShaperInfo], deltas: &[ChildDelta]) {
        self.dev.with_store(|store| {
            for info in shapers {
                store.mark_committed(info);
            }
            for d in deltas {
                if store.adjust_children(d.handle, d.delta).is_none() {
                    tracing::warn!(handle = %d.handle, "child count update for uncached shaper");
                }
            }
            store.release_holds(self.id);
        });
        self.committed = true;
        tracing::debug!(
            dev = self.dev.name(),
            txn = self.id.0,
            shapers = shapers.len(),
            "transaction committed"
        );
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let txn = self.id;
        let erased = self
            .dev
            .with_existing_store(|store| store.rollback(txn))
            .unwrap_or(0);
        if erased > 0 || self.inserted > 0 {
            tracing::warn!(
                dev = self.dev.name(),
                txn = txn.0,
                erased,
                "transaction rolled back"
            );
        } else {
            tracing::debug!(dev = self.dev.name(), txn = txn.0, "transaction rolled back");
        }
    }
}
