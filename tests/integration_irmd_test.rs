// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Integration test for the IRMd: flow allocation protocol, flow
//! manager delivery over an allocated port, graph adjacency, and the
//! reaper reclaiming abandoned state, composed the way a running IPCP
//! actually wires them together rather than exercised module-by-module.

use std::sync::Arc;
use std::time::Duration;

use ari::efcp::{Efcp, FlowConfig};
use ari::fal::PortState;
use ari::reaper::{sweep_with_probe, AlwaysAlive};
use ari::rmt::Pff;
use ari::{AutoMode, FlowManager, Gam, Irmd, NeighborSet};
use tokio::sync::RwLock;

#[tokio::test]
async fn flow_allocation_protocol_delivers_data_over_allocated_port() {
    let irmd = Irmd::new();
    irmd.reg("echo-server".to_string(), AutoMode::AutoAccept)
        .await
        .unwrap();

    // Client side: request a flow to the registered name.
    let client_port = irmd.flow_alloc(1001, "echo-server").await.unwrap();

    // Server side: pick up the arrived request and accept it.
    let server_port = irmd.flow_accept("echo-server").await.unwrap();
    assert_eq!(server_port, client_port);
    irmd.flow_alloc_reply(server_port, true).await.unwrap();

    let state = irmd.flow_alloc_res(client_port).await.unwrap();
    assert_eq!(state, PortState::Allocated);

    // Wire a flow manager around the same port map, with a PFF route
    // and an EFCP flow standing in for the underlying N-1 transport.
    let efcp = Arc::new(RwLock::new(Efcp::new()));
    let flow_id = {
        let mut efcp = efcp.write().await;
        efcp.allocate_flow(1001, 2002, FlowConfig::default())
    };
    let pff = Arc::new(Pff::new());
    let entry = irmd.flow_entry(client_port).await.unwrap();
    pff.add(entry.n_1_api, 0, flow_id).await.unwrap();

    let fmgr = FlowManager::new(irmd.port_map(), efcp.clone(), pff);
    let (pdu, next_hop) = fmgr.n_write(client_port, b"ping".to_vec()).await.unwrap();
    assert_eq!(next_hop, flow_id);

    let delivered = fmgr.n_1_read(flow_id, pdu).await.unwrap();
    assert_eq!(delivered, Some(b"ping".to_vec()));

    irmd.flow_dealloc(client_port).await.unwrap();
    assert!(irmd.flow_entry(client_port).await.is_none());
}

#[tokio::test]
async fn gam_establishes_adjacency_over_an_irmd_allocated_flow() {
    let irmd = Irmd::new();
    irmd.reg("neighbor-ipcp".to_string(), AutoMode::AutoAccept)
        .await
        .unwrap();

    let port_id = irmd.flow_alloc(1001, "neighbor-ipcp").await.unwrap();
    irmd.flow_accept("neighbor-ipcp").await.unwrap();
    irmd.flow_alloc_reply(port_id, true).await.unwrap();
    irmd.flow_alloc_res(port_id).await.unwrap();

    let nbs = Arc::new(NeighborSet::new());
    let gam = Gam::new(nbs.clone());
    gam.gam_create(2002, 2002, port_id).await.unwrap();

    let neighbor = nbs.get(2002).await.unwrap();
    assert_eq!(neighbor.flow_id, port_id);
    assert_eq!(nbs.len().await, 1);
}

#[tokio::test]
async fn reaper_reclaims_abandoned_allocation_without_disturbing_live_one() {
    let irmd = Irmd::new();
    irmd.reg("app-a".to_string(), AutoMode::AutoAccept)
        .await
        .unwrap();
    irmd.reg("app-b".to_string(), AutoMode::AutoAccept)
        .await
        .unwrap();

    // A request that never gets accepted, from a process that then dies.
    let abandoned_port = irmd.flow_alloc(999, "app-a").await.unwrap();

    // A request that completes normally, from a live process.
    let live_port = irmd.flow_alloc(1, "app-b").await.unwrap();
    irmd.flow_accept("app-b").await.unwrap();
    irmd.flow_alloc_reply(live_port, true).await.unwrap();
    irmd.flow_alloc_res(live_port).await.unwrap();

    let probe: fn(u64) -> bool = |pid| pid != 999;
    let report = sweep_with_probe(&irmd.port_map(), Duration::from_secs(3600), &probe).await;

    assert_eq!(report.dead_owner_ports, vec![abandoned_port]);
    assert!(irmd.flow_entry(abandoned_port).await.is_none());
    assert!(irmd.flow_entry(live_port).await.is_some());

    // A sweep with everyone alive touches nothing further.
    let report = sweep_with_probe(&irmd.port_map(), Duration::from_secs(3600), &AlwaysAlive).await;
    assert!(report.dead_owner_ports.is_empty());
}
