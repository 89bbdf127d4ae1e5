// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

use ari::config::{CliArgs, IpcpConfiguration, IpcpMode};
use ari::enrollment::EnrollmentConfig;
use ari::reaper::AlwaysAlive;
use ari::rib::{Rib, RibValue};
use ari::routing::{RouteResolver, RouteResolverConfig};
use ari::shim::UdpShim;
use ari::{
    AutoMode, Dif, Directory, EfcpActor, EfcpHandle, EfcpMessage, EnrollmentManager,
    FlowAllocator, FlowConfig, ForwardingEntry, Gam, IpcProcess, IpcpState, Irmd, NeighborSet,
    PriorityScheduling, RibActor, RibHandle, RibMessage, RmtActor, RmtHandle, RmtMessage,
    RoutingPolicy, Shim, ShimActor, ShimHandle, ShimMessage, ShortestPathRouting,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{error, info, warn};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = CliArgs::parse();
    let config = match IpcpConfiguration::from_cli(args) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    match config.mode {
        IpcpMode::Demo => run_demo().await,
        IpcpMode::Bootstrap => run_bootstrap(config).await,
        IpcpMode::Member => run_member(config).await,
    }
}

/// Sets up the RIB, route resolver, IRMd and enrollment manager shared
/// by the bootstrap and member entry points.
async fn shared_setup(
    config: &IpcpConfiguration,
) -> (Rib, Arc<UdpShim>, Arc<RouteResolver>, Arc<Irmd>) {
    let rib = Rib::with_change_log_size(config.change_log_size);

    let shim = Arc::new(UdpShim::new(config.address.unwrap_or(0)));
    if let Err(e) = shim.bind(&config.bind_address) {
        error!(error = %e, bind_address = %config.bind_address, "failed to bind UDP shim");
        std::process::exit(1);
    }

    let irmd = Arc::new(Irmd::new());
    ari::reaper::spawn(
        irmd.port_map(),
        Duration::from_secs(config.flow_timeout_secs),
        Duration::from_secs(config.reaper_resolution_secs),
        Arc::new(AlwaysAlive),
    );

    for route in &config.static_routes {
        let mut fields = std::collections::HashMap::new();
        fields.insert(
            "next_hop_address".to_string(),
            Box::new(RibValue::String(route.next_hop_address.clone())),
        );
        if let Err(e) = rib
            .create(
                format!("/routing/static/{}", route.destination),
                "route".to_string(),
                RibValue::Struct(fields),
            )
            .await
        {
            warn!(error = %e, destination = route.destination, "failed to seed static route");
        }
    }

    let resolver_config = RouteResolverConfig {
        enable_persistence: config.enable_route_persistence,
        snapshot_path: PathBuf::from(&config.route_snapshot_path),
        default_ttl_seconds: config.route_ttl_seconds,
        snapshot_interval_seconds: config.route_snapshot_interval_seconds,
    };
    let resolver = Arc::new(RouteResolver::new(
        Arc::new(RwLock::new(rib.clone())),
        resolver_config,
    ));

    if let Err(e) = resolver.load_snapshot().await {
        warn!(error = %e, "failed to load route snapshot");
    }
    if config.enable_route_persistence {
        resolver.clone().start_snapshot_task();
    }

    (rib, shim, resolver, irmd)
}

fn enrollment_config(config: &IpcpConfiguration) -> EnrollmentConfig {
    EnrollmentConfig {
        timeout: Duration::from_secs(config.enrollment_timeout_secs),
        max_retries: config.enrollment_max_retries,
        initial_backoff_ms: config.enrollment_initial_backoff_ms,
        heartbeat_interval_secs: 30,
        connection_timeout_secs: 90,
    }
}

/// Runs a background loop receiving PDUs off the shim and feeding CDAP
/// traffic to the enrollment manager.
fn spawn_control_loop(shim: Arc<UdpShim>, em: Arc<EnrollmentManager>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            match shim.recv_from() {
                Ok(Some((bytes, src))) => match postcard::from_bytes(&bytes) {
                    Ok(pdu) => {
                        if let Err(e) = em.handle_cdap_message(&pdu, src).await {
                            warn!(error = %e, %src, "failed to handle CDAP message");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to deserialize inbound PDU"),
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "shim receive failed");
                }
            }
        }
    });
}

async fn run_bootstrap(config: IpcpConfiguration) {
    info!(name = %config.name, dif = %config.dif_name, "starting bootstrap IPCP");

    let (rib, shim, resolver, irmd) = shared_setup(&config).await;
    let address = config.address.expect("validated by IpcpConfiguration::validate");
    irmd.reg(config.name.clone(), AutoMode::AutoAccept)
        .await
        .expect("bootstrap name registration cannot collide on a fresh IRMd");

    let mut em = EnrollmentManager::new_bootstrap(
        rib,
        shim.clone(),
        address,
        config.address_pool_start,
        config.address_pool_end,
    );
    em.set_route_resolver(resolver.clone());
    let em = Arc::new(em);

    spawn_control_loop(shim, em.clone());

    info!(
        address,
        pool = format!("{}-{}", config.address_pool_start, config.address_pool_end),
        "bootstrap IPCP ready, waiting for member enrollments"
    );

    wait_for_shutdown().await;
}

async fn run_member(config: IpcpConfiguration) {
    info!(name = %config.name, dif = %config.dif_name, "starting member IPCP");

    let (rib, shim, resolver, irmd) = shared_setup(&config).await;
    irmd.reg(config.name.clone(), AutoMode::AutoAccept)
        .await
        .expect("member name registration cannot collide on a fresh IRMd");

    let mut em = EnrollmentManager::with_config(rib, shim.clone(), 0, enrollment_config(&config));
    em.set_ipcp_name(config.name.clone());
    em.set_route_resolver(resolver.clone());

    for (i, peer) in config.bootstrap_peers.iter().enumerate() {
        match peer.parse::<SocketAddr>() {
            Ok(socket_addr) => {
                // Bootstrap peers are conventionally addressed starting at
                // config.address_pool_start - 1 until a real name service exists.
                let bootstrap_rina_addr = config.address_pool_start.saturating_sub(1) + i as u64;
                shim.register_peer(bootstrap_rina_addr, socket_addr);

                match em.enrol_with_bootstrap(bootstrap_rina_addr).await {
                    Ok(dif_name) => {
                        info!(%dif_name, peer = %peer, "enrolled with bootstrap peer");
                        break;
                    }
                    Err(e) => warn!(error = %e, peer = %peer, "enrollment attempt failed"),
                }
            }
            Err(e) => warn!(error = %e, peer = %peer, "invalid bootstrap peer address"),
        }
    }

    if !em.is_enrolled() {
        error!("failed to enroll with any configured bootstrap peer");
        std::process::exit(1);
    }

    let monitor = em.start_connection_monitoring();
    let em = Arc::new(em);
    spawn_control_loop(shim, em.clone());

    info!(local_addr = em.local_addr(), "member IPCP enrolled and running");

    wait_for_shutdown().await;
    monitor.abort();
}

async fn wait_for_shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}

async fn run_demo() {
    println!("=== RINA (Recursive InterNetwork Architecture) ===");
    println!("=== Enhanced with Modular Extensions ===\n");
    println!("Initializing a new Distributed IPC Facility (DIF).\n");

    // Create an enhanced DIF with all new features
    let mut dif = Dif::new_with_name("test-dif".to_string());
    println!("✓ Created DIF: {}", dif.name);
    println!("✓ DIF has directory service and member management");

    // Add members to DIF
    dif.add_member(1001);
    dif.add_member(1002);
    println!("✓ Added {} members to DIF\n", dif.member_count());

    // Spawn actor tasks for each component
    let local_addr = 1001;
    println!("✓ Spawning RINA component actors...\n");

    // RIB Actor
    let (rib_tx, rib_rx) = mpsc::channel(32);
    let rib_handle = RibHandle::new(rib_tx);
    tokio::spawn(async move {
        let actor = RibActor::new(rib_rx);
        actor.run().await;
    });
    println!("  → RIB Actor spawned");

    // EFCP Actor
    let (efcp_tx, efcp_rx) = mpsc::channel(32);
    let efcp_handle = EfcpHandle::new(efcp_tx);
    tokio::spawn(async move {
        let actor = EfcpActor::new(efcp_rx);
        actor.run().await;
    });
    println!("  → EFCP Actor spawned");

    // RMT Actor
    let (rmt_tx, rmt_rx) = mpsc::channel(32);
    let rmt_handle = RmtHandle::new(rmt_tx);
    tokio::spawn(async move {
        let actor = RmtActor::new(local_addr, rmt_rx);
        actor.run().await;
    });
    println!("  → RMT Actor spawned");

    // Shim Actor
    let (shim_tx, shim_rx) = mpsc::channel(32);
    let shim_handle = ShimHandle::new(shim_tx);
    tokio::spawn(async move {
        let actor = ShimActor::new(local_addr, shim_rx);
        actor.run().await;
    });
    println!("  → Shim Actor spawned");

    println!("\n✓ All actors running concurrently\n");

    // Also create enhanced IPCP with all new components
    let mut ipcp = IpcProcess::with_name_and_address("ipcp-0".to_string(), local_addr);
    ipcp.set_dif_name("test-dif".to_string());
    ipcp.set_state(IpcpState::Ready);

    println!(
        "✓ Created Enhanced IPCP: {:?} with address {} in DIF {:?}",
        ipcp.name,
        ipcp.address.unwrap(),
        ipcp.dif_name
    );
    println!("  Components: RIB, CDAP, EFCP, RMT, Shim, FAL, Directory, Enrollment\n");

    // === RIB Operations (Actor-based) ===
    println!("=== 1. Resource Information Base (RIB Actor) ===");

    // Create objects via RIB actor
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rib_handle
        .send(RibMessage::Create {
            name: "neighbor/ipcp-1".to_string(),
            class: "neighbor".to_string(),
            value: RibValue::Integer(1002),
            response: resp_tx,
        })
        .await
        .unwrap();
    resp_rx
        .recv()
        .await
        .unwrap()
        .expect("Failed to create neighbor");

    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rib_handle
        .send(RibMessage::Create {
            name: "flow/app-1".to_string(),
            class: "flow".to_string(),
            value: RibValue::String("allocated".to_string()),
            response: resp_tx,
        })
        .await
        .unwrap();
    resp_rx
        .recv()
        .await
        .unwrap()
        .expect("Failed to create flow");

    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rib_handle
        .send(RibMessage::Create {
            name: "config/max-flows".to_string(),
            class: "config".to_string(),
            value: RibValue::Integer(100),
            response: resp_tx,
        })
        .await
        .unwrap();
    resp_rx
        .recv()
        .await
        .unwrap()
        .expect("Failed to create config");

    // Query RIB count
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rib_handle
        .send(RibMessage::Count { response: resp_tx })
        .await
        .unwrap();
    let count = resp_rx.recv().await.unwrap();
    println!("  Added {} objects to RIB (via actor)", count);

    // List flows
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rib_handle
        .send(RibMessage::ListByClass {
            class: "flow".to_string(),
            response: resp_tx,
        })
        .await
        .unwrap();
    let flows = resp_rx.recv().await.unwrap();
    println!("  Flows in RIB: {:?}\n", flows);

    // === CDAP Operations ===
    println!("=== 2. Common Distributed Application Protocol (CDAP) ===");
    let read_msg = ipcp.cdap.read_request("neighbor/ipcp-1".to_string());
    let response = ipcp.cdap.process_message(&read_msg).await;
    println!("  CDAP READ request for 'neighbor/ipcp-1'");
    println!("  Response success: {}", response.is_success());
    if let Some(value) = response.obj_value {
        println!("  Retrieved value: {:?}\n", value.as_integer());
    }

    // === EFCP Operations (Actor-based) ===
    println!("=== 3. Error and Flow Control Protocol (EFCP Actor) ===");

    // Allocate flow via actor
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    efcp_handle
        .send(EfcpMessage::AllocateFlow {
            local_addr: 1001,
            remote_addr: 1002,
            config: FlowConfig::default(),
            response: resp_tx,
        })
        .await
        .unwrap();
    let flow_id = resp_rx.recv().await.unwrap();
    println!("  Allocated flow with ID: {} (via actor)", flow_id);

    // Send data via actor
    let test_data = b"Hello from RINA!".to_vec();
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    efcp_handle
        .send(EfcpMessage::SendData {
            flow_id,
            data: test_data.clone(),
            response: resp_tx,
        })
        .await
        .unwrap();

    match resp_rx.recv().await.unwrap() {
        Ok(pdu) => {
            println!("  Sent PDU with seq_num: {}", pdu.sequence_num);
            println!("  Payload: {:?}", String::from_utf8_lossy(&pdu.payload));
        }
        Err(e) => println!("  Error sending: {}", e),
    }

    // Get flow count
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    efcp_handle
        .send(EfcpMessage::GetFlowCount { response: resp_tx })
        .await
        .unwrap();
    let flow_count = resp_rx.recv().await.unwrap();
    println!("  Active flows: {} (via actor)\n", flow_count);

    // === RMT Operations (Actor-based) ===
    println!("=== 4. Relaying and Multiplexing Task (RMT Actor) ===");

    // Add forwarding entries via actor
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rmt_handle
        .send(RmtMessage::AddForwardingEntry {
            entry: ForwardingEntry {
                dst_addr: 1002,
                next_hop: 1002,
                cost: 1,
            },
            response: resp_tx,
        })
        .await
        .unwrap();
    resp_rx.recv().await.unwrap();

    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rmt_handle
        .send(RmtMessage::AddForwardingEntry {
            entry: ForwardingEntry {
                dst_addr: 1003,
                next_hop: 1002,
                cost: 2,
            },
            response: resp_tx,
        })
        .await
        .unwrap();
    resp_rx.recv().await.unwrap();

    // Get forwarding table size
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    rmt_handle
        .send(RmtMessage::GetForwardingTableSize { response: resp_tx })
        .await
        .unwrap();
    let table_size = resp_rx.recv().await.unwrap();
    println!("  Added {} forwarding entries (via actor)", table_size);

    // Also update synchronous IPCP for demonstration
    ipcp.rmt.add_forwarding_entry(ForwardingEntry {
        dst_addr: 1002,
        next_hop: 1002,
        cost: 1,
    });
    ipcp.rmt.add_forwarding_entry(ForwardingEntry {
        dst_addr: 1003,
        next_hop: 1002,
        cost: 2,
    });
    println!("  Next hop for addr 1002: {:?}", ipcp.rmt.lookup(1002));
    println!("  Next hop for addr 1003: {:?}\n", ipcp.rmt.lookup(1003));

    // === Directory Service ===
    println!("=== 6. Directory Service ===");
    let directory = Directory::new();
    directory.register("app.example".to_string(), 1001).unwrap();
    directory
        .register("service.example".to_string(), 1002)
        .unwrap();
    directory
        .register("service.example".to_string(), 1003)
        .unwrap(); // Multiple addresses

    println!("  Registered {} names in directory", directory.count());
    if let Some(addrs) = directory.resolve("service.example") {
        println!("  'service.example' resolves to addresses: {:?}", addrs);
    }
    println!();

    // === Flow Allocator ===
    println!("=== 7. Flow Allocator (port/flow descriptor table) ===");
    let fal = FlowAllocator::new();
    let port_id = fal.allocate().await.expect("bitmap not exhausted");
    fal.insert(port_id, 1001, 1002).await.expect("bitmap bit set");
    println!("  Allocated port_id {port_id}, state Pending");

    fal.transition(port_id, ari::fal::PortState::Allocated)
        .await
        .expect("Pending -> Allocated is legal");
    let entry = fal.lookup(port_id).await.expect("entry present");
    println!("  Flow allocated: port_id={}, state={:?}", entry.port_id, entry.state);
    println!("  Active flows: {}\n", fal.flow_count().await);

    // === Enrollment Manager ===
    println!("=== 8. Enrollment Manager ===");
    let rib = Rib::new();
    let shim = Arc::new(UdpShim::new(1001));
    let mut em = EnrollmentManager::new(rib, shim, 1001);
    em.set_ipcp_name("ipcp-1".to_string());
    println!("  Set IPCP name for enrollment: ipcp-1");
    println!("  Enrollment state: {:?}\n", em.state());

    // === Pluggable Policies ===
    println!("=== 9. Pluggable Policies ===");

    // Routing policy
    let routing = ShortestPathRouting::new();
    println!("  Routing policy: {}", routing.name());

    // Scheduling policy
    let _sched = PriorityScheduling::default();
    println!("  Scheduling policy: Priority");
    println!("  Queue capacity: {} PDUs per priority level\n", 250);

    // === 5. UDP/IP Shim Layer (Shim Actor) ===
    println!("=== 5. UDP/IP Shim Layer (Shim Actor) ===");
    println!("  Shim layer ready for RINA address: {}", local_addr);

    // Bind via actor
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    shim_handle
        .send(ShimMessage::Bind {
            addr: "127.0.0.1:0".to_string(),
            response: resp_tx,
        })
        .await
        .unwrap();

    match resp_rx.recv().await.unwrap() {
        Ok(_) => {
            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            shim_handle
                .send(ShimMessage::GetLocalAddr { response: resp_tx })
                .await
                .unwrap();

            if let Ok(addr) = resp_rx.recv().await.unwrap() {
                println!("  Bound to UDP socket: {} (via actor)", addr);
            }
        }
        Err(e) => println!("  Failed to bind: {}", e),
    }

    // === IRMd: flow allocation protocol + graph adjacency ===
    println!("=== 10. IPC Resource Manager daemon (IRMd) ===");
    let irmd = Irmd::new();
    irmd.reg("demo-app".to_string(), AutoMode::AutoAccept)
        .await
        .unwrap();
    let requested_port = irmd.flow_alloc(local_addr, "demo-app").await.unwrap();
    let accepted_port = irmd.flow_accept("demo-app").await.unwrap();
    irmd.flow_alloc_reply(accepted_port, true).await.unwrap();
    let state = irmd.flow_alloc_res(requested_port).await.unwrap();
    println!("  Registered name 'demo-app', allocated port_id {requested_port}, resolved to {state:?}");

    let nbs = Arc::new(NeighborSet::new());
    let gam = Gam::new(nbs.clone());
    gam.gam_create(1002, 1002, accepted_port).await.unwrap();
    println!("  GAM established adjacency with pid 1002 over port_id {accepted_port}");
    println!("  Neighbour set size: {}\n", nbs.len().await);

    println!("\n=== Summary ===");
    println!("✓ DIF: Enhanced with directory and member management");
    println!("✓ IPCP: Complete with {} components", 8);
    println!("✓ PDU: Consolidated definitions with QoS support");
    println!("✓ Directory: Name resolution and registration service");
    println!("✓ FAL: Flow allocation protocol");
    println!("✓ Enrollment: IPCP enrollment manager");
    println!("✓ Policies: Pluggable routing, scheduling, and QoS");
    println!("✓ RIB Actor: Managing distributed state");
    println!("✓ EFCP Actor: Managing flows concurrently");
    println!("✓ RMT Actor: Handling PDU forwarding");
    println!("✓ Shim Actor: Network I/O abstraction");
    println!("✓ IRMd: Flow allocation protocol and graph adjacency manager");
    println!("\nDemo mode complete. Run with --mode bootstrap or --mode member for real networking.");

    // Keep the main task alive for a moment
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
}
