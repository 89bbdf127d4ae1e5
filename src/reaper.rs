// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Flow reaper.
//!
//! A periodic sweep that reclaims two kinds of abandoned state: port
//! descriptors stuck in `Pending` past a timeout, and flows whose
//! owning process has died without deallocating them. The dead-pid
//! check is injected as a [`LivenessProbe`] rather than hard-coded to
//! a syscall, so the sweep can be driven deterministically in tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fal::{FlowAllocator, PortState};

/// Checks whether a process is still alive. Implementations outside
/// tests back this with a real liveness check (e.g. signalling pid 0
/// to the process); in tests it is a closure returning a canned
/// answer.
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, pid: u64) -> bool;
}

impl<F> LivenessProbe for F
where
    F: Fn(u64) -> bool + Send + Sync,
{
    fn is_alive(&self, pid: u64) -> bool {
        self(pid)
    }
}

/// Always reports every pid alive. The reaper's default when no
/// process-liveness integration is wired up, so it only ever reclaims
/// timed-out pending ports, never acts on pid death.
pub struct AlwaysAlive;

impl LivenessProbe for AlwaysAlive {
    fn is_alive(&self, _pid: u64) -> bool {
        true
    }
}

/// One sweep's findings, returned so callers (and tests) can observe
/// what the reaper did without scraping logs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out_ports: Vec<u32>,
    pub dead_owner_ports: Vec<u32>,
}

/// Runs a single sweep over `fal`, releasing any port stuck in
/// `Pending` longer than `flow_timeout`. Does not consult process
/// liveness; see [`sweep_with_probe`] for the combined sweep.
pub async fn sweep_once(fal: &FlowAllocator, flow_timeout: Duration) -> SweepReport {
    let stale = reclaim_timed_out(fal, flow_timeout).await;
    SweepReport {
        timed_out_ports: stale,
        dead_owner_ports: Vec::new(),
    }
}

/// Runs a single sweep that reclaims both timed-out `Pending` ports
/// and any port, `Pending` or `Allocated`, whose owning process
/// (`n_api`) `probe` reports as no longer alive.
pub async fn sweep_with_probe(
    fal: &FlowAllocator,
    flow_timeout: Duration,
    probe: &dyn LivenessProbe,
) -> SweepReport {
    let timed_out = reclaim_timed_out(fal, flow_timeout).await;

    let mut dead_owner = Vec::new();
    for entry in fal.all_entries().await {
        if timed_out.contains(&entry.port_id) {
            continue;
        }
        if probe.is_alive(entry.n_api) {
            continue;
        }
        if fal.transition(entry.port_id, PortState::Null).await.is_ok() {
            let _ = fal.release(entry.port_id).await;
            warn!(
                port_id = entry.port_id,
                n_api = entry.n_api,
                "reaper reclaimed port owned by dead process"
            );
            dead_owner.push(entry.port_id);
        }
    }
    if !dead_owner.is_empty() {
        info!(count = dead_owner.len(), "reaper swept dead-owner ports");
    }

    SweepReport {
        timed_out_ports: timed_out,
        dead_owner_ports: dead_owner,
    }
}

async fn reclaim_timed_out(fal: &FlowAllocator, flow_timeout: Duration) -> Vec<u32> {
    let stale = fal.pending_older_than(flow_timeout).await;
    for port_id in &stale {
        if let Err(e) = fal.transition(*port_id, PortState::Null).await {
            warn!(port_id, error = %e, "reaper failed to null out stale port");
            continue;
        }
        let _ = fal.release(*port_id).await;
        debug!(port_id, "reaper reclaimed stale pending port");
    }
    if !stale.is_empty() {
        info!(count = stale.len(), "reaper swept stale pending ports");
    }
    stale
}

/// Spawns the periodic sweeper. `resolution` is the sweep interval,
/// conventionally `flow_timeout / 20` so a request is reclaimed well
/// within a small multiple of its own timeout rather than waiting a
/// full extra period.
pub fn spawn(
    fal: Arc<FlowAllocator>,
    flow_timeout: Duration,
    resolution: Duration,
    probe: Arc<dyn LivenessProbe>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(resolution);
        loop {
            interval.tick().await;
            sweep_with_probe(&fal, flow_timeout, probe.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweep_reclaims_stale_pending_port() {
        let fal = FlowAllocator::new();
        let port_id = fal.allocate().await.unwrap();
        fal.insert(port_id, 1, 2).await.unwrap();

        let report = sweep_once(&fal, Duration::from_millis(500)).await;
        assert!(report.timed_out_ports.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = sweep_once(&fal, Duration::from_millis(10)).await;
        assert_eq!(report.timed_out_ports, vec![port_id]);
        assert!(fal.lookup(port_id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_leaves_allocated_ports_alone() {
        let fal = FlowAllocator::new();
        let port_id = fal.allocate().await.unwrap();
        fal.insert(port_id, 1, 2).await.unwrap();
        fal.transition(port_id, PortState::Allocated).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = sweep_once(&fal, Duration::from_millis(10)).await;
        assert!(report.timed_out_ports.is_empty());
        assert!(fal.lookup(port_id).await.is_some());
    }

    #[test]
    fn always_alive_probe_reports_alive() {
        let probe = AlwaysAlive;
        assert!(probe.is_alive(1234));
    }

    #[test]
    fn closure_probe_can_report_dead() {
        let probe = |pid: u64| pid != 999;
        assert!(probe.is_alive(1));
        assert!(!probe.is_alive(999));
    }

    #[tokio::test]
    async fn probe_sweep_reclaims_allocated_port_with_dead_owner() {
        let fal = FlowAllocator::new();
        let port_id = fal.allocate().await.unwrap();
        fal.insert(port_id, 999, 2).await.unwrap();
        fal.transition(port_id, PortState::Allocated).await.unwrap();

        let probe: fn(u64) -> bool = |pid| pid != 999;
        let report = sweep_with_probe(&fal, Duration::from_secs(3600), &probe).await;

        assert_eq!(report.dead_owner_ports, vec![port_id]);
        assert!(report.timed_out_ports.is_empty());
        assert!(fal.lookup(port_id).await.is_none());
    }

    #[tokio::test]
    async fn probe_sweep_leaves_live_owners_alone() {
        let fal = FlowAllocator::new();
        let port_id = fal.allocate().await.unwrap();
        fal.insert(port_id, 1, 2).await.unwrap();
        fal.transition(port_id, PortState::Allocated).await.unwrap();

        let report = sweep_with_probe(&fal, Duration::from_secs(3600), &AlwaysAlive).await;

        assert!(report.dead_owner_ports.is_empty());
        assert!(fal.lookup(port_id).await.is_some());
    }
}
