// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Port/flow descriptor table.
//!
//! The IRMd hands out a `port_id` for every flow it knows about, local
//! or remote-facing. A `port_id` is live if and only if its bit is set
//! in the allocation bitmap and an entry for it exists in the table;
//! the two are always updated together under the same lock, so that
//! invariant can never observe a torn state.
//!
//! A descriptor starts in `Pending` the moment `insert` is called (the
//! request has been sent to the peer but not yet confirmed), moves to
//! `Allocated` once the peer's `FLOW_ALLOC_REPLY` arrives, or to `Null`
//! on rejection, timeout or explicit deallocation. `Pending -> Null`
//! and `Pending -> Allocated` are the only transitions out of
//! `Pending`; anything can move to `Null`. Callers waiting on
//! `flow_alloc_res` observe exactly one terminal state: the
//! [`tokio::sync::Notify`] on the entry is only ever fired after the
//! state has already flipped, so a late waiter still sees it on its
//! first poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Notify, RwLock};

use crate::error::AriError;

/// Upper bound on live port-ids, i.e. the width of the allocation
/// bitmap. Mirrors `IRMD_MAX_FLOWS`.
pub const IRMD_MAX_FLOWS: u32 = 4096;

/// Lifecycle of a port/flow descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Allocation requested, no reply yet.
    Pending,
    /// Flow confirmed by the remote end, ready for data transfer.
    Allocated,
    /// Rejected, timed out, or torn down.
    Null,
}

/// A single port/flow descriptor.
#[derive(Debug, Clone)]
pub struct PortEntry {
    pub port_id: u32,
    /// Application/process on the N side of this flow.
    pub n_api: u64,
    /// Peer (application or underlying IPCP) on the N-1 side.
    pub n_1_api: u64,
    pub state: PortState,
    /// Timestamp the entry was inserted, used by the reaper to detect
    /// requests stuck in `Pending`.
    pub t0: Instant,
}

struct Descriptor {
    entry: PortEntry,
    signal: Arc<Notify>,
}

/// The port/flow descriptor table (§4.1).
///
/// Named `FlowAllocator` for historical reasons (the IRMd's flow
/// allocation protocol, §4.4, is the table's only caller), but its
/// job is strictly bookkeeping: allocating port-ids, recording their
/// state, and waking whoever is blocked on a pending one.
#[derive(Debug)]
pub struct FlowAllocator {
    bitmap: RwLock<Vec<bool>>,
    entries: RwLock<HashMap<u32, Descriptor>>,
}

impl FlowAllocator {
    pub fn new() -> Self {
        Self {
            bitmap: RwLock::new(vec![false; IRMD_MAX_FLOWS as usize]),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Draws the lowest free port-id and marks its bitmap bit set.
    /// The entry itself is created separately by [`Self::insert`].
    pub async fn allocate(&self) -> Result<u32, AriError> {
        let mut bitmap = self.bitmap.write().await;
        match bitmap.iter().position(|used| !used) {
            Some(idx) => {
                bitmap[idx] = true;
                Ok(idx as u32)
            }
            None => Err(AriError::Resource(
                "port-id bitmap exhausted (IRMD_MAX_FLOWS)".to_string(),
            )),
        }
    }

    /// Inserts a `Pending` descriptor for a previously allocated
    /// port-id. Returns the `Notify` handle callers can await on.
    pub async fn insert(&self, port_id: u32, n_api: u64, n_1_api: u64) -> Result<(), AriError> {
        let bitmap = self.bitmap.read().await;
        if !bitmap.get(port_id as usize).copied().unwrap_or(false) {
            return Err(AriError::InvalidArg(format!(
                "port_id {port_id} has no bitmap bit set"
            )));
        }
        drop(bitmap);

        let mut entries = self.entries.write().await;
        entries.insert(
            port_id,
            Descriptor {
                entry: PortEntry {
                    port_id,
                    n_api,
                    n_1_api,
                    state: PortState::Pending,
                    t0: Instant::now(),
                },
                signal: Arc::new(Notify::new()),
            },
        );
        Ok(())
    }

    pub async fn lookup(&self, port_id: u32) -> Option<PortEntry> {
        self.entries
            .read()
            .await
            .get(&port_id)
            .map(|d| d.entry.clone())
    }

    pub async fn lookup_by_n_api(&self, n_api: u64) -> Option<PortEntry> {
        self.entries
            .read()
            .await
            .values()
            .find(|d| d.entry.n_api == n_api)
            .map(|d| d.entry.clone())
    }

    /// Moves a descriptor to a new state. Only `Pending -> Allocated`,
    /// `Pending -> Null` and `* -> Null` are legal; anything else is
    /// rejected rather than silently ignored, since the port-map is
    /// the single source of truth for invariant 1.
    pub async fn transition(&self, port_id: u32, new_state: PortState) -> Result<(), AriError> {
        let mut entries = self.entries.write().await;
        let desc = entries
            .get_mut(&port_id)
            .ok_or_else(|| AriError::NotFound(format!("port_id {port_id}")))?;

        let allowed = matches!(
            (desc.entry.state, new_state),
            (PortState::Pending, PortState::Allocated)
                | (PortState::Pending, PortState::Null)
                | (_, PortState::Null)
        );
        if !allowed {
            return Err(AriError::State(format!(
                "illegal port state transition {:?} -> {:?}",
                desc.entry.state, new_state
            )));
        }
        desc.entry.state = new_state;
        desc.signal.notify_waiters();
        Ok(())
    }

    /// Blocks until the descriptor leaves `Pending`, returning the
    /// terminal state. Tolerant of spurious wakeups: re-checks state
    /// on every notification.
    pub async fn wait_terminal(&self, port_id: u32) -> Result<PortState, AriError> {
        loop {
            let signal = {
                let entries = self.entries.read().await;
                let desc = entries
                    .get(&port_id)
                    .ok_or_else(|| AriError::NotFound(format!("port_id {port_id}")))?;
                if desc.entry.state != PortState::Pending {
                    return Ok(desc.entry.state);
                }
                desc.signal.clone()
            };
            signal.notified().await;
        }
    }

    /// Releases a port-id: drops the entry and clears its bitmap bit.
    /// Idempotent on a port-id that is already gone.
    pub async fn release(&self, port_id: u32) -> Result<(), AriError> {
        let mut entries = self.entries.write().await;
        if let Some(desc) = entries.remove(&port_id) {
            desc.signal.notify_waiters();
        }
        drop(entries);

        let mut bitmap = self.bitmap.write().await;
        if let Some(bit) = bitmap.get_mut(port_id as usize) {
            *bit = false;
        }
        Ok(())
    }

    pub async fn flow_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Entries still `Pending` after `deadline` — used by the reaper
    /// (§4.5) to sweep abandoned flow-allocation requests.
    pub async fn pending_older_than(&self, deadline: std::time::Duration) -> Vec<u32> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .values()
            .filter(|d| d.entry.state == PortState::Pending && now - d.entry.t0 > deadline)
            .map(|d| d.entry.port_id)
            .collect()
    }

    /// A snapshot of every live descriptor — used by the reaper to
    /// check owning-process liveness across the whole table.
    pub async fn all_entries(&self) -> Vec<PortEntry> {
        self.entries
            .read()
            .await
            .values()
            .map(|d| d.entry.clone())
            .collect()
    }
}

impl Default for FlowAllocator {
    fn default() -> Self {
        Self::new()
    }
}
