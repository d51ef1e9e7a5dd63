//! Per-device shaper cache.
//!
//! The store maps handles to shapers in ascending handle order and owns
//! the id space of detached shapers. Every entry a transaction touches
//! is held by that transaction until it resolves, so a second writer
//! can't update it concurrently. Entries a transaction inserted are
//! tentative on top of that and invisible to lookups and dumps.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use super::handle::{Handle, ID_UNSPEC, Scope};
use super::types::ShaperInfo;
use crate::{Error, Result};

/// Identifier of a transaction, unique within a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub(crate) u64);

/// Size limits of a device's shaper store.
///
/// # Example
///
/// ```
/// use nshaper::shaper::ShaperLimits;
///
/// let limits = ShaperLimits::new().max_detached(8).max_shapers(64);
/// assert_eq!(limits.detached_ids(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaperLimits {
    max_detached: u32,
    max_shapers: Option<usize>,
}

impl Default for ShaperLimits {
    fn default() -> Self {
        Self {
            max_detached: ID_UNSPEC,
            max_shapers: None,
        }
    }
}

impl ShaperLimits {
    /// Create limits with the full detached id space and no shaper cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of detached ids, allocated from `0..n`.
    ///
    /// Clamped so that [`ID_UNSPEC`] is never handed out.
    pub fn max_detached(mut self, n: u32) -> Self {
        self.max_detached = n.min(ID_UNSPEC);
        self
    }

    /// Maximum number of cached shapers, tentative ones included.
    pub fn max_shapers(mut self, n: usize) -> Self {
        self.max_shapers = Some(n);
        self
    }

    /// Size of the detached id space.
    pub fn detached_ids(&self) -> u32 {
        self.max_detached
    }

    /// Shaper capacity, if capped.
    pub fn shaper_capacity(&self) -> Option<usize> {
        self.max_shapers
    }
}

/// Hands out the lowest free id in `0..max`.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    max: u32,
    used: BTreeSet<u32>,
}

impl IdAllocator {
    pub(crate) fn new(max: u32) -> Self {
        Self {
            max,
            used: BTreeSet::new(),
        }
    }

    pub(crate) fn alloc(&mut self) -> Option<u32> {
        let mut candidate = 0u32;
        for &id in &self.used {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        if candidate >= self.max {
            return None;
        }
        self.used.insert(candidate);
        Some(candidate)
    }

    /// Mark a specific id as used. Returns false if it was already taken
    /// or lies outside the id space.
    pub(crate) fn reserve(&mut self, id: u32) -> bool {
        id < self.max && self.used.insert(id)
    }

    pub(crate) fn release(&mut self, id: u32) -> bool {
        self.used.remove(&id)
    }

    pub(crate) fn in_use(&self) -> usize {
        self.used.len()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    info: ShaperInfo,
    owner: Option<TxnId>,
    tentative: bool,
}

impl Entry {
    fn held_by_other(&self, txn: TxnId) -> bool {
        self.owner.is_some_and(|owner| owner != txn)
    }
}

fn busy(handle: Handle) -> Error {
    Error::InvalidRequest(format!(
        "shaper {} is being updated by another request",
        handle
    ))
}

/// Outcome of [`ShaperStore::insert_tentative`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// A placeholder was inserted for this transaction.
    Inserted,
    /// The shaper already exists and is now held for this transaction.
    Exists,
}

/// Shapers cached for one device.
#[derive(Debug)]
pub struct ShaperStore {
    shapers: BTreeMap<Handle, Entry>,
    ids: IdAllocator,
    limits: ShaperLimits,
}

impl ShaperStore {
    /// Create an empty store.
    pub fn new(limits: ShaperLimits) -> Self {
        Self {
            shapers: BTreeMap::new(),
            ids: IdAllocator::new(limits.detached_ids()),
            limits,
        }
    }

    /// The store's limits.
    pub fn limits(&self) -> &ShaperLimits {
        &self.limits
    }

    /// Committed shaper for `handle`.
    pub fn lookup(&self, handle: Handle) -> Option<&ShaperInfo> {
        self.shapers
            .get(&handle)
            .filter(|e| !e.tentative)
            .map(|e| &e.info)
    }

    /// True if `handle` was inserted by an unresolved transaction.
    pub fn is_tentative(&self, handle: Handle) -> bool {
        self.shapers.get(&handle).is_some_and(|e| e.tentative)
    }

    /// True if an unresolved transaction holds `handle`.
    pub fn is_held(&self, handle: Handle) -> bool {
        self.shapers.get(&handle).is_some_and(|e| e.owner.is_some())
    }

    /// Allocate a fresh detached id.
    pub fn allocate_detached_id(&mut self) -> Result<u32> {
        self.ids.alloc().ok_or_else(|| {
            Error::ResourceExhausted(format!(
                "all {} detached shaper ids are in use",
                self.limits.detached_ids()
            ))
        })
    }

    /// Give a detached id back to the allocator.
    pub fn release_detached_id(&mut self, id: u32) {
        self.ids.release(id);
    }

    /// Number of detached ids in use.
    pub fn detached_ids_in_use(&self) -> usize {
        self.ids.in_use()
    }

    /// Insert a zero-valued placeholder for `handle` owned by `txn`, or
    /// hold the existing entry for `txn`.
    ///
    /// Fails if another transaction holds `handle`, or if the store is at
    /// capacity.
    pub fn insert_tentative(&mut self, handle: Handle, txn: TxnId) -> Result<Prepared> {
        if let Some(entry) = self.shapers.get_mut(&handle) {
            if entry.held_by_other(txn) {
                return Err(busy(handle));
            }
            entry.owner = Some(txn);
            return Ok(Prepared::Exists);
        }

        if let Some(cap) = self.limits.shaper_capacity()
            && self.shapers.len() >= cap
        {
            return Err(Error::OutOfMemory(format!(
                "can't cache more than {} shapers",
                cap
            )));
        }

        self.shapers.insert(
            handle,
            Entry {
                info: ShaperInfo {
                    handle,
                    ..Default::default()
                },
                owner: Some(txn),
                tentative: true,
            },
        );
        Ok(Prepared::Inserted)
    }

    /// Hold the committed shaper `handle` for `txn` and return it.
    ///
    /// Fails with `NotFound` if it is not cached or still tentative, and
    /// with `InvalidRequest` if another transaction holds it.
    pub fn hold(&mut self, handle: Handle, txn: TxnId) -> Result<ShaperInfo> {
        let entry = self
            .shapers
            .get_mut(&handle)
            .filter(|e| !e.tentative)
            .ok_or(Error::NotFound { handle })?;
        if entry.held_by_other(txn) {
            return Err(busy(handle));
        }
        entry.owner = Some(txn);
        Ok(entry.info)
    }

    /// Overwrite the cached shaper with `info`, clear its tentative tag
    /// and drop its hold.
    ///
    /// The child count of the cached entry is kept; counts change only
    /// through [`ShaperStore::adjust_children`]. A shaper that vanished
    /// while its transaction was in flight is re-inserted.
    pub fn mark_committed(&mut self, info: &ShaperInfo) {
        match self.shapers.get_mut(&info.handle) {
            Some(entry) => {
                let children = entry.info.children;
                entry.info = *info;
                entry.info.children = children;
                entry.owner = None;
                entry.tentative = false;
            }
            None => {
                if info.handle.scope() == Scope::Detached {
                    self.ids.reserve(info.handle.id());
                }
                self.shapers.insert(
                    info.handle,
                    Entry {
                        info: ShaperInfo {
                            children: 0,
                            ..*info
                        },
                        owner: None,
                        tentative: false,
                    },
                );
            }
        }
    }

    /// Add `delta` to a shaper's child count, saturating at zero.
    ///
    /// Returns the new count, or `None` if the shaper is not cached.
    pub fn adjust_children(&mut self, handle: Handle, delta: i64) -> Option<u32> {
        let entry = self.shapers.get_mut(&handle)?;
        let count = (entry.info.children as i64 + delta).clamp(0, u32::MAX as i64);
        entry.info.children = count as u32;
        Some(entry.info.children)
    }

    /// Remove a shaper from the cache. Its id is not released.
    pub fn erase(&mut self, handle: Handle) -> Option<ShaperInfo> {
        self.shapers.remove(&handle).map(|e| e.info)
    }

    /// Drop every hold of `txn` on existing shapers.
    pub fn release_holds(&mut self, txn: TxnId) {
        for entry in self.shapers.values_mut() {
            if entry.owner == Some(txn) && !entry.tentative {
                entry.owner = None;
            }
        }
    }

    /// Erase every placeholder owned by `txn`, release their ids and drop
    /// its holds.
    ///
    /// Returns the number of erased entries.
    pub fn rollback(&mut self, txn: TxnId) -> usize {
        let doomed: Vec<Handle> = self
            .shapers
            .iter()
            .filter(|(_, e)| e.tentative && e.owner == Some(txn))
            .map(|(h, _)| *h)
            .collect();

        for handle in &doomed {
            self.shapers.remove(handle);
            if handle.scope() == Scope::Detached {
                self.ids.release(handle.id());
            }
        }
        self.release_holds(txn);
        doomed.len()
    }

    /// Committed shapers strictly after `cursor`, in handle order.
    pub fn range_after(
        &self,
        cursor: Option<Handle>,
    ) -> impl Iterator<Item = &ShaperInfo> + '_ {
        let start = match cursor {
            Some(h) => Bound::Excluded(h),
            None => Bound::Unbounded,
        };
        self.shapers
            .range((start, Bound::Unbounded))
            .filter(|(_, e)| !e.tentative)
            .map(|(_, e)| &e.info)
    }

    /// All committed shapers, in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &ShaperInfo> + '_ {
        self.range_after(None)
    }

    /// Number of cached shapers, tentative ones included.
    pub fn len(&self) -> usize {
        self.shapers.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.shapers.is_empty()
    }

    /// Number of entries inserted by unresolved transactions.
    pub fn tentative_count(&self) -> usize {
        self.shapers.values().filter(|e| e.tentative).count()
    }

    /// Number of entries held by unresolved transactions, tentative
    /// ones included.
    pub fn held_count(&self) -> usize {
        self.shapers.values().filter(|e| e.owner.is_some()).count()
    }

    /// Drop every shaper and reset the id space.
    pub fn teardown(&mut self) -> usize {
        let n = self.shapers.len();
        self.shapers.clear();
        self.ids = IdAllocator::new(self.limits.detached_ids());
        n
    }
}
