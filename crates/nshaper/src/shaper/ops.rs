//! Mutating shaper operations: set, delete and group.
//!
//! Each operation runs in a [`Transaction`] that holds every shaper it
//! reads before deriving candidate values from it, so a concurrent
//! writer on the same shaper fails instead of committing a stale base.

use std::collections::HashSet;

use super::device::Device;
use super::handle::{Handle, Scope};
use super::txn::{ChildDelta, Transaction};
use super::types::{ShaperInfo, ShaperPatch};
use crate::{Error, Result};

impl Device {
    /// Create or update one shaper.
    ///
    /// Fields absent from `patch` keep their cached values, or zero for a
    /// shaper that is not cached yet. Detached shapers must already exist;
    /// they are created through [`Device::group`].
    pub async fn set(&self, patch: &ShaperPatch) -> Result<Handle> {
        let backend = self.backend()?;
        let handle = patch.handle;

        if matches!(handle.scope(), Scope::Port | Scope::Unspec) {
            return Err(Error::InvalidScope(format!(
                "can't set shaper with scope {}",
                handle.scope()
            )));
        }
        if handle.scope() == Scope::Detached && self.cached(handle).is_none() {
            return Err(Error::InvalidRequest(format!(
                "use 'group' to create detached shaper {}",
                handle
            )));
        }

        let mut txn = Transaction::begin(self);
        txn.prepare(handle)?;

        let mut shaper = self.cached(handle).unwrap_or_else(|| ShaperInfo::new(handle));
        if let Some(parent) = patch.parent
            && parent != shaper.parent
        {
            return Err(Error::InvalidRequest(format!(
                "can't move shaper {} to {} with 'set', use 'group'",
                handle, parent
            )));
        }
        patch.apply_to(&mut shaper);

        if let Err(e) = backend.set(self, &shaper).await {
            tracing::warn!(dev = self.name(), %handle, error = %e, "backend set failed");
            return Err(e);
        }

        txn.commit(&[shaper], &[]);
        Ok(handle)
    }

    /// Delete a shaper.
    ///
    /// A detached parent left without children is deleted too, repeating
    /// up the tree. A backend failure stops the cascade; shapers already
    /// deleted stay deleted. The cascade also stops at a parent another
    /// request holds.
    pub async fn delete(&self, handle: Handle) -> Result<()> {
        let backend = self.backend()?;

        let mut txn = Transaction::begin(self);
        let shaper = txn.hold(handle)?;

        if handle.scope() == Scope::Detached && shaper.children > 0 {
            return Err(Error::HasChildren {
                handle,
                children: shaper.children,
            });
        }

        let txn_id = txn.id();
        let mut current = shaper;
        loop {
            if let Err(e) = backend.delete(self, current.handle).await {
                tracing::warn!(dev = self.name(), handle = %current.handle, error = %e, "backend delete failed");
                return Err(e);
            }

            let next = self
                .with_existing_store(|store| {
                    store.erase(current.handle)?;
                    if current.handle.scope() == Scope::Detached {
                        store.release_detached_id(current.handle.id());
                    }

                    let parent = current.parent;
                    if parent.scope() != Scope::Detached {
                        return None;
                    }
                    match store.adjust_children(parent, -1) {
                        Some(0) => match store.hold(parent, txn_id) {
                            Ok(info) => Some(info),
                            Err(e) => {
                                tracing::debug!(handle = %parent, error = %e, "empty parent left in place");
                                None
                            }
                        },
                        _ => None,
                    }
                })
                .flatten();

            tracing::debug!(dev = self.name(), handle = %current.handle, "shaper deleted");

            match next {
                Some(parent) => {
                    tracing::debug!(dev = self.name(), handle = %parent.handle, "cascading delete to empty parent");
                    current = parent;
                }
                None => break,
            }
        }

        txn.commit(&[], &[]);
        Ok(())
    }

    /// Nest `inputs` under `output`, creating shapers as needed.
    ///
    /// `output` is a netdev shaper or a detached one; a detached output
    /// with an unspecified id is created with a fresh id. Inputs are queue
    /// shapers or existing detached shapers. Returns the output handle.
    pub async fn group(&self, inputs: &[ShaperPatch], output: &ShaperPatch) -> Result<Handle> {
        let backend = self.backend()?;
        check_group_request(inputs, output)?;

        let mut txn = Transaction::begin(self);
        let GroupPlan {
            output: mut out,
            output_cached,
            inputs: mut ins,
            mut deltas,
        } = self.plan_group(&mut txn, inputs, output)?;

        for input in &mut ins {
            if input.parent != out.handle {
                if input.parent.scope() == Scope::Detached {
                    deltas.push(ChildDelta {
                        handle: input.parent,
                        delta: -1,
                    });
                }
                input.parent = out.handle;
                out.children += 1;
                deltas.push(ChildDelta {
                    handle: out.handle,
                    delta: 1,
                });
            }
        }

        if let Some(prev) = output_cached
            && prev.parent != out.parent
            && prev.parent.scope() == Scope::Detached
        {
            deltas.push(ChildDelta {
                handle: prev.parent,
                delta: -1,
            });
        }

        if let Err(e) = backend.group(self, &ins, &out).await {
            tracing::warn!(dev = self.name(), output = %out.handle, error = %e, "backend group failed");
            return Err(e);
        }

        let mut shapers = Vec::with_capacity(ins.len() + 1);
        shapers.push(out);
        shapers.extend_from_slice(&ins);
        txn.commit(&shapers, &deltas);

        tracing::debug!(dev = self.name(), output = %out.handle, inputs = ins.len(), "group committed");
        Ok(out.handle)
    }

    /// Hold the shapers a group request touches and resolve the
    /// candidate records.
    ///
    /// The output, its detached ancestors and every input are held by
    /// `txn`; cached values are read only after the hold.
    fn plan_group(
        &self,
        txn: &mut Transaction<'_>,
        inputs: &[ShaperPatch],
        output: &ShaperPatch,
    ) -> Result<GroupPlan> {
        let out_handle = txn.prepare(output.handle)?;
        let output_cached = self.cached(out_handle);

        let mut out = output_cached.unwrap_or_else(|| ShaperInfo::new(out_handle));
        output.apply_to(&mut out);

        let parent = out.parent;
        if parent.scope() != Scope::Detached && parent.scope() != Scope::Netdev {
            return Err(Error::InvalidScope(format!(
                "invalid scope {} for output parent shaper",
                parent.scope()
            )));
        }
        if parent == out_handle {
            return Err(Error::InvalidRequest(format!(
                "shaper {} can't be its own parent",
                out_handle
            )));
        }

        // Detached ancestors of the output, nearest first.
        let mut ancestors = Vec::new();
        if parent.scope() == Scope::Detached {
            let mut cur = txn.hold(parent).map_err(|e| match e {
                Error::NotFound { .. } => Error::InvalidRequest(format!(
                    "output parent shaper {} does not exist",
                    parent
                )),
                e => e,
            })?;
            let mut seen = HashSet::new();
            while seen.insert(cur.handle) {
                ancestors.push(cur.handle);
                if cur.parent.scope() != Scope::Detached {
                    break;
                }
                match txn.hold(cur.parent) {
                    Ok(next) => cur = next,
                    Err(Error::NotFound { .. }) => break,
                    Err(e) => return Err(e),
                }
            }
            if ancestors.contains(&out_handle) {
                return Err(Error::InvalidRequest(format!(
                    "moving shaper {} under {} would create a loop",
                    out_handle, parent
                )));
            }
        }

        let mut ins = Vec::with_capacity(inputs.len());
        for patch in inputs {
            let handle = patch.handle;
            if ancestors.contains(&handle) {
                return Err(Error::InvalidRequest(format!(
                    "input shaper {} is an ancestor of the output",
                    handle
                )));
            }

            txn.prepare(handle)?;
            let mut info = self.cached(handle).unwrap_or_else(|| ShaperInfo::new(handle));
            patch.apply_to(&mut info);
            ins.push(info);
        }

        let mut deltas = Vec::new();
        let parent_is_new = output_cached.is_none_or(|prev| prev.parent != out.parent);
        if parent.scope() == Scope::Detached && parent_is_new {
            deltas.push(ChildDelta {
                handle: parent,
                delta: 1,
            });
        }

        Ok(GroupPlan {
            output: out,
            output_cached,
            inputs: ins,
            deltas,
        })
    }

    /// Committed shaper for `handle`, if cached.
    fn cached(&self, handle: Handle) -> Option<ShaperInfo> {
        self.read_store(|s| s.lookup(handle).copied()).flatten()
    }
}

/// Checks of a group request that don't need the cache.
fn check_group_request(inputs: &[ShaperPatch], output: &ShaperPatch) -> Result<()> {
    if inputs.is_empty() {
        return Err(Error::InvalidRequest("group needs at least one input".into()));
    }

    let out_handle = output.handle;
    let out_scope = out_handle.scope();
    if out_scope != Scope::Detached && out_scope != Scope::Netdev {
        return Err(Error::InvalidScope(format!(
            "invalid scope {} for output shaper",
            out_scope
        )));
    }

    let mut seen = HashSet::new();
    for patch in inputs {
        let handle = patch.handle;
        let scope = handle.scope();
        if scope != Scope::Queue && scope != Scope::Detached {
            return Err(Error::InvalidScope(format!(
                "invalid scope {} for input shaper",
                scope
            )));
        }
        if scope == Scope::Detached && handle.is_id_unspec() {
            return Err(Error::InvalidRequest(
                "can't create new detached shaper as input".into(),
            ));
        }
        if handle == out_handle {
            return Err(Error::InvalidRequest(format!(
                "shaper {} can't be both input and output",
                handle
            )));
        }
        if patch.parent.is_some() {
            return Err(Error::InvalidRequest(format!(
                "input shaper {} takes the output as parent, drop its parent",
                handle
            )));
        }
        if !seen.insert(handle) {
            return Err(Error::InvalidRequest(format!(
                "input shaper {} listed twice",
                handle
            )));
        }
    }
    Ok(())
}

struct GroupPlan {
    output: ShaperInfo,
    output_cached: Option<ShaperInfo>,
    inputs: Vec<ShaperInfo>,
    deltas: Vec<ChildDelta>,
}
