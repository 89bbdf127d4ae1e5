// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! IPCP Enrollment
//!
//! Handles the enrollment process where a new IPCP joins a DIF.
//! Fully async implementation with timeout and retry logic, plus
//! connection-health monitoring and re-enrollment once a member has
//! joined (§4.10).

use crate::cdap::{CdapMessage, CdapOpCode};
use crate::directory::AddressPool;
use crate::pdu::Pdu;
use crate::rib::{Rib, RibValue};
use crate::routing::RouteResolver;
use crate::shim::UdpShim;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Configuration for enrollment behavior
#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    /// Timeout for a single enrollment attempt
    pub timeout: Duration,
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds (doubles on each retry)
    pub initial_backoff_ms: u64,
    /// Interval between connection-health heartbeat checks
    pub heartbeat_interval_secs: u64,
    /// Maximum time since the last heartbeat before the connection is
    /// considered unhealthy
    pub connection_timeout_secs: u64,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff_ms: 1000,
            heartbeat_interval_secs: 30,
            connection_timeout_secs: 90,
        }
    }
}

/// Enrollment state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentState {
    /// Not enrolled
    NotEnrolled,
    /// Enrollment initiated
    Initiated,
    /// Authenticating
    Authenticating,
    /// Synchronizing RIB
    Synchronizing,
    /// Enrollment complete
    Enrolled,
    /// Enrollment failed
    Failed(String),
}

/// Enrollment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    /// IPCP name requesting enrollment
    pub ipcp_name: String,
    /// IPCP address (0 if requesting dynamic assignment)
    pub ipcp_address: u64,
    /// DIF name to join
    pub dif_name: String,
    /// Timestamp of request
    pub timestamp: u64,
    /// Whether requesting dynamic address assignment
    pub request_address: bool,
}

/// Enrollment response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    /// Whether enrollment was accepted
    pub accepted: bool,
    /// Error message if rejected
    pub error: Option<String>,
    /// Assigned address (if requested and accepted)
    pub assigned_address: Option<u64>,
    /// DIF name
    pub dif_name: String,
    /// RIB snapshot for synchronization
    pub rib_snapshot: Option<Vec<u8>>,
}

/// DIF configuration provided during enrollment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifConfiguration {
    /// DIF name
    pub dif_name: String,
    /// Address assignment for the new IPCP
    pub assigned_address: u64,
    /// List of neighbor IPCPs
    pub neighbors: Vec<NeighborInfo>,
    /// RIB snapshot for synchronization
    pub rib_snapshot: Vec<u8>, // Serialized RIB data
}

/// Information about a neighbor IPCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborInfo {
    /// Neighbor IPCP name
    pub name: String,
    /// Neighbor address
    pub address: u64,
    /// Whether this neighbor is currently reachable
    pub reachable: bool,
}

/// Enrollment manager - fully async implementation
#[derive(Debug)]
pub struct EnrollmentManager {
    /// Current enrollment state
    state: EnrollmentState,
    /// Local IPCP name
    ipcp_name: Option<String>,
    /// Local RINA address
    local_addr: u64,
    /// Local RIB
    rib: Rib,
    /// UDP shim for network communication
    shim: Arc<UdpShim>,
    /// Enrollment configuration
    config: EnrollmentConfig,
    /// Address pool for bootstrap IPCP (None for member IPCPs)
    address_pool: Option<Arc<AddressPool>>,
    /// Optional route resolver used for dynamic route bookkeeping
    route_resolver: Option<Arc<RouteResolver>>,
    /// Address of the bootstrap last enrolled with, for `re_enroll`
    bootstrap_addr: Option<u64>,
    /// Timestamp of the last observed liveness signal from the bootstrap
    last_heartbeat: Arc<RwLock<Option<Instant>>>,
}

impl EnrollmentManager {
    /// Creates a new enrollment manager
    pub fn new(rib: Rib, shim: Arc<UdpShim>, local_addr: u64) -> Self {
        Self::with_config(rib, shim, local_addr, EnrollmentConfig::default())
    }

    /// Creates a new enrollment manager with custom configuration
    pub fn with_config(
        rib: Rib,
        shim: Arc<UdpShim>,
        local_addr: u64,
        config: EnrollmentConfig,
    ) -> Self {
        Self {
            state: EnrollmentState::NotEnrolled,
            ipcp_name: None,
            local_addr,
            rib,
            shim,
            config,
            address_pool: None,
            route_resolver: None,
            bootstrap_addr: None,
            last_heartbeat: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a bootstrap enrollment manager with address pool
    pub fn new_bootstrap(
        rib: Rib,
        shim: Arc<UdpShim>,
        local_addr: u64,
        pool_start: u64,
        pool_end: u64,
    ) -> Self {
        Self {
            state: EnrollmentState::Enrolled, // Bootstrap is pre-enrolled
            ipcp_name: None,
            local_addr,
            rib,
            shim,
            config: EnrollmentConfig::default(),
            address_pool: Some(Arc::new(AddressPool::new(pool_start, pool_end))),
            route_resolver: None,
            bootstrap_addr: None,
            last_heartbeat: Arc::new(RwLock::new(Some(Instant::now()))),
        }
    }

    /// Sets the IPCP name
    pub fn set_ipcp_name(&mut self, name: String) {
        self.ipcp_name = Some(name);
        self.state = EnrollmentState::Initiated;
    }

    /// Registers a route resolver used to maintain dynamic routes learned
    /// during enrollment, instead of writing them into the RIB by hand.
    pub fn set_route_resolver(&mut self, resolver: Arc<RouteResolver>) {
        self.route_resolver = Some(resolver);
    }

    /// Returns the current enrollment state
    pub fn state(&self) -> &EnrollmentState {
        &self.state
    }

    /// Checks if enrolled
    pub fn is_enrolled(&self) -> bool {
        self.state == EnrollmentState::Enrolled
    }

    /// Returns the local address (may be updated after enrollment)
    pub fn local_addr(&self) -> u64 {
        self.local_addr
    }

    /// Records a fresh liveness signal from the bootstrap/peer.
    pub async fn update_heartbeat(&self) {
        *self.last_heartbeat.write().await = Some(Instant::now());
    }

    /// Whether the connection is considered healthy: a heartbeat must have
    /// been recorded, and within `connection_timeout_secs` of now.
    pub async fn is_connection_healthy(&self) -> bool {
        match *self.last_heartbeat.read().await {
            Some(last) => {
                last.elapsed() <= Duration::from_secs(self.config.connection_timeout_secs)
            }
            None => false,
        }
    }

    /// Spawns a background task that periodically checks connection
    /// health and logs a warning when the heartbeat has gone stale. The
    /// caller is responsible for acting on persistent unhealthiness (e.g.
    /// calling `re_enroll`); this task only observes.
    pub fn start_connection_monitoring(&self) -> JoinHandle<()> {
        let last_heartbeat = self.last_heartbeat.clone();
        let interval = Duration::from_secs(self.config.heartbeat_interval_secs.max(1));
        let connection_timeout = Duration::from_secs(self.config.connection_timeout_secs);
        let ipcp_name = self.ipcp_name.clone().unwrap_or_else(|| "<unnamed>".to_string());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let healthy = match *last_heartbeat.read().await {
                    Some(last) => last.elapsed() <= connection_timeout,
                    None => false,
                };
                if !healthy {
                    warn!(ipcp = %ipcp_name, "connection to bootstrap looks unhealthy");
                } else {
                    debug!(ipcp = %ipcp_name, "connection to bootstrap healthy");
                }
            }
        })
    }

    /// Re-enrolls with the bootstrap last used by `enrol_with_bootstrap`.
    pub async fn re_enroll(&mut self) -> Result<String, String> {
        let bootstrap_addr = self
            .bootstrap_addr
            .ok_or("no prior bootstrap address recorded; call enrol_with_bootstrap first")?;
        self.enrol_with_bootstrap(bootstrap_addr).await
    }

    /// Enrol with bootstrap IPCP with timeout and retry logic
    pub async fn enrol_with_bootstrap(&mut self, bootstrap_addr: u64) -> Result<String, String> {
        self.bootstrap_addr = Some(bootstrap_addr);

        for attempt in 1..=self.config.max_retries {
            info!(attempt, max_retries = self.config.max_retries, "enrollment attempt");

            match timeout(self.config.timeout, self.try_enrol(bootstrap_addr)).await {
                Ok(Ok(dif_name)) => {
                    info!(dif_name = %dif_name, "enrollment succeeded");
                    self.update_heartbeat().await;
                    return Ok(dif_name);
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "enrollment attempt failed");
                }
                Err(_) => {
                    warn!(attempt, "enrollment attempt timed out");
                }
            }

            if attempt < self.config.max_retries {
                let backoff =
                    Duration::from_millis(self.config.initial_backoff_ms * (1 << (attempt - 1)));
                debug!(?backoff, "retrying enrollment");
                sleep(backoff).await;
            }
        }

        Err(format!(
            "Enrollment failed after {} attempts",
            self.config.max_retries
        ))
    }

    /// Single enrollment attempt
    async fn try_enrol(&mut self, bootstrap_addr: u64) -> Result<String, String> {
        let ipcp_name = self.ipcp_name.as_ref().ok_or("IPCP name not set")?.clone();

        // Create enrollment request
        let request = EnrollmentRequest {
            ipcp_name: ipcp_name.clone(),
            ipcp_address: self.local_addr,
            dif_name: String::new(), // Will be provided by bootstrap
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            request_address: self.local_addr == 0, // Request address if we don't have one
        };

        // Create CDAP message with enrollment request
        let cdap_msg = CdapMessage {
            op_code: CdapOpCode::Create,
            obj_name: ipcp_name.clone(),
            obj_class: Some("enrollment".to_string()),
            obj_value: Some(RibValue::Bytes(
                postcard::to_allocvec(&request)
                    .map_err(|e| format!("Failed to serialize request: {}", e))?,
            )),
            invoke_id: 1,
            result: 0,
            result_reason: None,
            sync_request: None,
            sync_response: None,
        };

        // Serialize CDAP message with postcard
        let cdap_bytes = postcard::to_allocvec(&cdap_msg)
            .map_err(|e| format!("Failed to serialize CDAP message: {}", e))?;

        // Create PDU with CDAP payload
        let pdu = Pdu::new_data(
            self.local_addr, // src_addr - member's configured address (or 0)
            bootstrap_addr,  // dst_addr
            0,               // src_cep_id
            0,               // dst_cep_id
            0,               // sequence_num
            cdap_bytes,      // payload
        );

        // Send enrollment request
        self.shim
            .send_pdu(&pdu)
            .map_err(|e| format!("Failed to send enrollment request: {}", e))?;

        debug!("sent enrollment request to bootstrap IPCP");

        // Wait for response
        let response = self.receive_response().await?;

        // Deserialize enrollment response from CDAP message
        let response_bytes = response
            .obj_value
            .as_ref()
            .ok_or("Response does not contain value")?;

        let enroll_response: EnrollmentResponse = match response_bytes {
            RibValue::Bytes(bytes) => postcard::from_bytes(bytes)
                .map_err(|e| format!("Failed to deserialize enrollment response: {}", e))?,
            RibValue::String(s) => {
                // Legacy support for old string-based responses
                EnrollmentResponse {
                    accepted: true,
                    error: None,
                    assigned_address: None,
                    dif_name: s.clone(),
                    rib_snapshot: None,
                }
            }
            _ => return Err("Invalid response format".to_string()),
        };

        if !enroll_response.accepted {
            return Err(enroll_response
                .error
                .unwrap_or_else(|| "Enrollment rejected".to_string()));
        }

        // Update local address if one was assigned
        if let Some(assigned_addr) = enroll_response.assigned_address {
            info!(assigned_addr, "received assigned address");
            self.local_addr = assigned_addr;

            // Store assigned address in RIB
            let _ = self
                .rib
                .create(
                    "/local/address".to_string(),
                    "address".to_string(),
                    RibValue::Integer(assigned_addr as i64),
                )
                .await;
        }

        // Synchronize RIB if snapshot provided
        if let Some(rib_data) = enroll_response.rib_snapshot {
            debug!("synchronizing RIB");
            match self.rib.deserialize(&rib_data).await {
                Ok(count) => info!(count, "synchronized RIB objects"),
                Err(e) => warn!(error = %e, "failed to sync RIB"),
            }
        }

        let dif_name = enroll_response.dif_name.clone();

        // Update state
        self.state = EnrollmentState::Enrolled;

        // Store DIF name in RIB
        let _ = self
            .rib
            .create(
                "/dif/name".to_string(),
                "dif_info".to_string(),
                RibValue::String(dif_name.clone()),
            )
            .await;

        // Request routing table from bootstrap
        debug!("requesting routing table from bootstrap");
        let _ = self.sync_routes_from_bootstrap(bootstrap_addr).await;

        Ok(dif_name)
    }

    /// Synchronize routing table from bootstrap's RIB
    async fn sync_routes_from_bootstrap(&self, bootstrap_addr: u64) -> Result<(), String> {
        // Request all static routes from bootstrap
        let cdap_msg = CdapMessage {
            op_code: CdapOpCode::Read,
            obj_name: "/routing/static/*".to_string(),
            obj_class: Some("static_route".to_string()),
            obj_value: None,
            invoke_id: 2,
            result: 0,
            result_reason: None,
            sync_request: None,
            sync_response: None,
        };

        let cdap_bytes = postcard::to_allocvec(&cdap_msg)
            .map_err(|e| format!("Failed to serialize CDAP message: {}", e))?;

        let pdu = Pdu::new_data(self.local_addr, bootstrap_addr, 0, 0, 0, cdap_bytes);

        self.shim
            .send_pdu(&pdu)
            .map_err(|e| format!("Failed to send route request: {}", e))?;

        // Wait for routing table response (no filter on obj_class)
        match self.receive_cdap_response(None).await {
            Ok(response) => {
                if let Some(RibValue::Struct(routes)) = response.obj_value {
                    info!(count = routes.len(), "received routes from bootstrap");

                    // Store routes in local RIB
                    for (dest, route_info) in routes {
                        let route_name = format!("/routing/static/{}", dest);
                        let _ = self
                            .rib
                            .create(route_name, "static_route".to_string(), *route_info)
                            .await;
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to sync routes, continuing enrollment");
                Ok(()) // Non-fatal - continue enrollment
            }
        }
    }

    /// Receive enrollment response with polling
    async fn receive_response(&self) -> Result<CdapMessage, String> {
        self.receive_cdap_response(Some("enrollment")).await
    }

    /// Receive any CDAP response with polling
    async fn receive_cdap_response(
        &self,
        expected_class: Option<&str>,
    ) -> Result<CdapMessage, String> {
        let poll_interval = Duration::from_millis(100);
        let max_polls = (self.config.timeout.as_millis() / poll_interval.as_millis()) as u32;

        for _ in 0..max_polls {
            if let Some((pdu, _src_addr)) = self
                .shim
                .receive_pdu()
                .map_err(|e| format!("Failed to receive PDU: {}", e))?
            {
                // Deserialize CDAP message from PDU payload
                let cdap_msg: CdapMessage = postcard::from_bytes(&pdu.payload)
                    .map_err(|e| format!("Failed to deserialize CDAP message: {}", e))?;

                // If expected_class is specified, filter by it
                if let Some(expected) = expected_class {
                    if cdap_msg.obj_class.as_deref() == Some(expected) {
                        if cdap_msg.result == 0 {
                            return Ok(cdap_msg);
                        } else {
                            return Err(format!("Request rejected with code: {}", cdap_msg.result));
                        }
                    }
                } else {
                    // Accept any CDAP message if no filter specified
                    if cdap_msg.result == 0 {
                        return Ok(cdap_msg);
                    } else {
                        return Err(format!("Request rejected with code: {}", cdap_msg.result));
                    }
                }
            }

            sleep(poll_interval).await;
        }

        Err("No response received".to_string())
    }

    /// Handle incoming enrollment request (bootstrap side)
    pub async fn handle_enrollment_request(
        &self,
        pdu: &Pdu,
        src_socket_addr: SocketAddr,
    ) -> Result<(), String> {
        // Register the peer mapping so we can send response back
        self.shim.register_peer(pdu.src_addr, src_socket_addr);

        // Deserialize CDAP message from PDU payload
        let cdap_msg: CdapMessage = postcard::from_bytes(&pdu.payload)
            .map_err(|e| format!("Failed to deserialize CDAP message: {}", e))?;

        // Check if this is an enrollment request
        if cdap_msg.obj_class.as_deref() != Some("enrollment")
            || cdap_msg.op_code != CdapOpCode::Create
        {
            return Err("Not an enrollment request".to_string());
        }

        // Extract enrollment request
        let enroll_request: EnrollmentRequest = match &cdap_msg.obj_value {
            Some(RibValue::Bytes(bytes)) => postcard::from_bytes(bytes)
                .map_err(|e| format!("Failed to deserialize request: {}", e))?,
            Some(RibValue::String(name)) => {
                // Legacy support for old string-based requests
                EnrollmentRequest {
                    ipcp_name: name.clone(),
                    ipcp_address: pdu.src_addr,
                    dif_name: String::new(),
                    timestamp: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_secs(),
                    request_address: false,
                }
            }
            _ => return Err("Invalid enrollment request format".to_string()),
        };

        info!(
            ipcp_name = %enroll_request.ipcp_name,
            request_address = enroll_request.request_address,
            "received enrollment request"
        );

        // Get DIF name from RIB
        let dif_name_obj = self
            .rib
            .read("/dif/name")
            .await
            .ok_or("Bootstrap DIF name not set in RIB")?;
        let dif_name = dif_name_obj
            .value
            .as_string()
            .ok_or("DIF name is not a string")?
            .to_string();

        // Allocate address if requested
        let assigned_address = if enroll_request.request_address {
            match &self.address_pool {
                Some(pool) => match pool.allocate() {
                    Ok(addr) => {
                        info!(addr, "allocated address");
                        Some(addr)
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to allocate address");
                        // Send rejection response
                        let error_response = EnrollmentResponse {
                            accepted: false,
                            error: Some(format!("Address allocation failed: {}", e)),
                            assigned_address: None,
                            dif_name: dif_name.clone(),
                            rib_snapshot: None,
                        };
                        self.send_enroll_response(pdu, &error_response, &cdap_msg)
                            .await?;
                        return Ok(());
                    }
                },
                None => {
                    warn!("no address pool configured");
                    return Err("Bootstrap has no address pool".to_string());
                }
            }
        } else {
            None
        };

        // Get RIB snapshot for synchronization
        let rib_snapshot = Some(self.rib.serialize().await);

        // Create success response
        let response = EnrollmentResponse {
            accepted: true,
            error: None,
            assigned_address,
            dif_name: dif_name.clone(),
            rib_snapshot,
        };

        // Send response
        self.send_enroll_response(pdu, &response, &cdap_msg).await?;

        info!(
            ipcp_name = %enroll_request.ipcp_name,
            dif_name = %dif_name,
            "sent enrollment response"
        );

        // Add dynamic route for the enrolled member
        let member_addr = assigned_address.unwrap_or(pdu.src_addr);
        if member_addr != 0 {
            // If we assigned a new address, update the peer mapping
            if let Some(new_addr) = assigned_address {
                self.shim.register_peer(new_addr, src_socket_addr);
                debug!(new_addr, peer = %src_socket_addr, "updated peer mapping");
            }

            match &self.route_resolver {
                Some(resolver) => {
                    resolver
                        .add_dynamic_route(member_addr, src_socket_addr, None)
                        .await
                        .map_err(|e| format!("Failed to add dynamic route: {}", e))?;
                }
                None => {
                    let route_name = format!("/routing/dynamic/{}", member_addr);

                    if self.rib.read(&route_name).await.is_none() {
                        let route_value = RibValue::Struct({
                            let mut map = std::collections::HashMap::new();
                            map.insert(
                                "destination".to_string(),
                                Box::new(RibValue::String(member_addr.to_string())),
                            );
                            map.insert(
                                "next_hop_address".to_string(),
                                Box::new(RibValue::String(src_socket_addr.to_string())),
                            );
                            map.insert(
                                "next_hop_rina_addr".to_string(),
                                Box::new(RibValue::String(member_addr.to_string())),
                            );
                            map
                        });

                        self.rib
                            .create(route_name.clone(), "route".to_string(), route_value)
                            .await
                            .map_err(|e| format!("Failed to create dynamic route: {}", e))?;

                        info!(
                            member_addr,
                            peer = %src_socket_addr,
                            ipcp_name = %enroll_request.ipcp_name,
                            "created dynamic route"
                        );
                    }
                }
            }
        } else {
            warn!("member enrolled with address 0, skipping route creation");
        }

        Ok(())
    }

    /// Helper method to send enrollment response
    async fn send_enroll_response(
        &self,
        request_pdu: &Pdu,
        response: &EnrollmentResponse,
        request_cdap: &CdapMessage,
    ) -> Result<(), String> {
        // Serialize enrollment response
        let response_bytes = postcard::to_allocvec(response)
            .map_err(|e| format!("Failed to serialize enrollment response: {}", e))?;

        // Create CDAP response message
        let cdap_response = CdapMessage {
            op_code: CdapOpCode::Create,
            obj_name: request_cdap.obj_name.clone(),
            obj_class: Some("enrollment".to_string()),
            obj_value: Some(RibValue::Bytes(response_bytes)),
            invoke_id: request_cdap.invoke_id,
            result: if response.accepted { 0 } else { 1 },
            result_reason: response.error.clone(),
            sync_request: None,
            sync_response: None,
        };

        // Serialize CDAP response
        let cdap_bytes = postcard::to_allocvec(&cdap_response)
            .map_err(|e| format!("Failed to serialize CDAP response: {}", e))?;

        // Create response PDU
        let response_pdu = Pdu::new_data(
            self.local_addr,      // src_addr - bootstrap's address
            request_pdu.src_addr, // dst_addr - respond to sender
            0,                    // src_cep_id
            0,                    // dst_cep_id
            0,                    // sequence_num
            cdap_bytes,           // payload
        );

        // Send response
        self.shim
            .send_pdu(&response_pdu)
            .map_err(|e| format!("Failed to send enrollment response: {}", e))?;

        Ok(())
    }

    /// Handle incoming CDAP message (routes to appropriate handler)
    pub async fn handle_cdap_message(
        &self,
        pdu: &Pdu,
        src_socket_addr: SocketAddr,
    ) -> Result<(), String> {
        // Deserialize CDAP message from PDU payload
        let cdap_msg: CdapMessage = postcard::from_bytes(&pdu.payload)
            .map_err(|e| format!("Failed to deserialize CDAP message: {}", e))?;

        // Route based on operation type and object class
        match (&cdap_msg.op_code, cdap_msg.obj_class.as_deref()) {
            // Enrollment request
            (CdapOpCode::Create, Some("enrollment")) => {
                self.handle_enrollment_request(pdu, src_socket_addr).await
            }
            // Incremental RIB sync request
            (CdapOpCode::Read, _) if cdap_msg.sync_request.is_some() => {
                self.handle_sync_request(pdu, &cdap_msg).await
            }
            // Routing table read request
            (CdapOpCode::Read, _) if cdap_msg.obj_name.starts_with("/routing/") => {
                self.handle_routing_read_request(pdu, &cdap_msg).await
            }
            // Unknown/unhandled message type
            _ => {
                // Silently ignore other message types for now
                Ok(())
            }
        }
    }

    /// Handle an incremental RIB sync request (`CdapMessage::sync_request`),
    /// replying with the changes since the requester's last known version,
    /// or a full snapshot if that version has fallen out of the change log.
    async fn handle_sync_request(&self, pdu: &Pdu, request: &CdapMessage) -> Result<(), String> {
        use crate::cdap::CdapMessage as Msg;

        let sync_req = request
            .sync_request
            .as_ref()
            .ok_or("handle_sync_request called without a sync_request")?;

        let current_version = self.rib.current_version().await;
        let response = match self.rib.get_changes_since(sync_req.last_known_version).await {
            Ok(changes) => Msg::new_sync_response(
                request.invoke_id,
                current_version,
                Some(changes),
                None,
                None,
            ),
            Err(_) => Msg::new_sync_response(
                request.invoke_id,
                current_version,
                None,
                Some(self.rib.serialize().await),
                None,
            ),
        };

        let response_bytes = postcard::to_allocvec(&response)
            .map_err(|e| format!("Failed to serialize sync response: {}", e))?;
        let response_pdu = Pdu::new_data(self.local_addr, pdu.src_addr, 0, 0, 0, response_bytes);

        self.shim
            .send_pdu(&response_pdu)
            .map_err(|e| format!("Failed to send sync response: {}", e))?;

        Ok(())
    }

    /// Handle routing table read request
    async fn handle_routing_read_request(
        &self,
        pdu: &Pdu,
        request: &CdapMessage,
    ) -> Result<(), String> {
        // For now, return an empty routing table since member has static routes
        // In future phases, this could return actual routing information
        let response = CdapMessage {
            op_code: CdapOpCode::Read,
            obj_name: request.obj_name.clone(),
            obj_class: request.obj_class.clone(),
            obj_value: Some(RibValue::Struct(std::collections::HashMap::new())),
            invoke_id: request.invoke_id,
            result: 0,
            result_reason: None,
            sync_request: None,
            sync_response: None,
        };

        let response_bytes = postcard::to_allocvec(&response)
            .map_err(|e| format!("Failed to serialize routing response: {}", e))?;

        let response_pdu = Pdu::new_data(self.local_addr, pdu.src_addr, 0, 0, 0, response_bytes);

        self.shim
            .send_pdu(&response_pdu)
            .map_err(|e| format!("Failed to send routing response: {}", e))?;

        Ok(())
    }
}
