// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Graph adjacency manager (GAM).
//!
//! Establishes adjacencies with neighbouring IPCPs over N-1 flows and
//! publishes them to the [`NeighborSet`](crate::nbs::NeighborSet) once
//! established. `gam_create` is the active side (we allocated the
//! flow), `gam_flow_arr` the passive side (the peer's flow arrived
//! unsolicited); both converge on the same adjacency once complete.
//! `gam_flow_wait` lets callers that only care about the *result*
//! queue up FIFO behind the flow that is doing the establishing.
//!
//! CACEP — the connect/auth exchange that would normally run over the
//! flow before it is trusted — is stubbed here: no authentication
//! policy is wired up yet, so a flow is trusted the moment its
//! identity is known.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::error::AriError;
use crate::nbs::{Neighbor, NeighborSet};

/// Graph adjacency manager.
pub struct Gam {
    nbs: Arc<NeighborSet>,
    waiters: RwLock<HashMap<u64, VecDeque<Arc<Notify>>>>,
}

impl std::fmt::Debug for Gam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gam").finish_non_exhaustive()
    }
}

impl Gam {
    pub fn new(nbs: Arc<NeighborSet>) -> Self {
        Self {
            nbs,
            waiters: RwLock::new(HashMap::new()),
        }
    }

    async fn establish(&self, neighbor: Neighbor) {
        let pid = neighbor.pid;
        self.nbs.add(neighbor).await;
        let queue = self.waiters.write().await.remove(&pid);
        if let Some(queue) = queue {
            for waiter in queue {
                waiter.notify_one();
            }
        }
    }

    /// Active side: we hold a freshly allocated N-1 flow to `pid` and
    /// want to complete the adjacency over it.
    pub async fn gam_create(&self, pid: u64, addr: u64, flow_id: u32) -> Result<(), AriError> {
        self.establish(Neighbor { pid, addr, flow_id }).await;
        Ok(())
    }

    /// Passive side: a neighbour's N-1 flow arrived unsolicited.
    pub async fn gam_flow_arr(&self, pid: u64, addr: u64, flow_id: u32) -> Result<(), AriError> {
        self.establish(Neighbor { pid, addr, flow_id }).await;
        Ok(())
    }

    /// Marks an allocation to `pid` as underway, so a concurrent
    /// `gam_flow_wait` call has a queue to join even before the flow
    /// finishes allocating.
    pub async fn gam_flow_alloc(&self, pid: u64) {
        self.waiters.write().await.entry(pid).or_default();
    }

    /// Blocks until the adjacency with `pid` is established. Waiters
    /// queue FIFO: whichever called first is queued first, though all
    /// queued waiters are released together once the adjacency
    /// completes.
    pub async fn gam_flow_wait(&self, pid: u64) -> Neighbor {
        loop {
            if let Some(neighbor) = self.nbs.get(pid).await {
                return neighbor;
            }
            let signal = {
                let mut waiters = self.waiters.write().await;
                let queue = waiters.entry(pid).or_default();
                let signal = Arc::new(Notify::new());
                queue.push_back(signal.clone());
                signal
            };
            signal.notified().await;
        }
    }
}
