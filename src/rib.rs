// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Resource Information Base (RIB)
//!
//! The RIB is a central component in RINA that stores and manages all information
//! about the IPC Process state, including:
//! - Directory (name-to-address mappings)
//! - Flow state
//! - Neighbor information
//! - Routing information
//! - QoS/policy configurations
//!
//! The RIB is distributed across all IPCPs in a DIF and kept consistent through
//! CDAP. Nodes are stored flat, keyed by their full path, rather than as a
//! child/sibling linked list: this keeps path resolution and change-log
//! bookkeeping O(1)/O(depth) instead of O(nodes).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Default number of entries retained in the change log before the oldest
/// are evicted.
pub const DEFAULT_CHANGE_LOG_SIZE: usize = 1000;

/// Window within which a duplicate (name, seqno) CDAP operation is
/// acknowledged and ignored rather than re-applied.
pub const DEFAULT_RO_ID_TIMEOUT: Duration = Duration::from_secs(1);

/// Represents an object stored in the RIB with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RibObject {
    /// Unique identifier for this object
    pub name: String,
    /// Object class (e.g., "flow", "neighbor", "address")
    pub class: String,
    /// The actual data payload
    pub value: RibValue,
    /// Version counter for consistency tracking
    pub version: u64,
    /// Last modification timestamp (Unix epoch)
    pub last_modified: u64,
    /// Replication / expiry attributes
    #[serde(default)]
    pub attr: RibAttr,
}

/// Per-node replication and lifetime attributes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RibAttr {
    /// How this object's creation/update/delete should propagate to peers.
    pub recv_set: RecvSet,
    /// Whether this object is pushed to a newly enrolling neighbour.
    pub enrol_sync: bool,
    /// Time-to-live from creation; `None` means the object never expires.
    #[serde(skip)]
    pub expiry: Option<Duration>,
}

/// Propagation policy for a RIB object's replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecvSet {
    /// Local-only, never replicated.
    #[default]
    NoSync,
    /// Replicated to every management flow.
    AllMembers,
    /// Reserved for future neighbour-scoped recv-sets; the payload names
    /// the policy, which this implementation does not yet interpret.
    Reserved(String),
}

/// Represents different types of values that can be stored in the RIB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RibValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Struct(HashMap<String, Box<RibValue>>),
}

impl RibValue {
    /// Attempts to extract a string value
    pub fn as_string(&self) -> Option<&str> {
        match self {
            RibValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract an integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RibValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract a boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            RibValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// A single entry in the RIB's change log, used for incremental
/// synchronisation between peers (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RibChange {
    /// A new object was created.
    Created(RibObject),
    /// An existing object was overwritten.
    Updated(RibObject),
    /// An object was removed.
    Deleted { name: String, version: u64 },
}

impl RibChange {
    /// The version (seqno) this change carries.
    pub fn version(&self) -> u64 {
        match self {
            RibChange::Created(o) | RibChange::Updated(o) => o.version,
            RibChange::Deleted { version, .. } => *version,
        }
    }

    /// The full object name this change concerns.
    pub fn name(&self) -> &str {
        match self {
            RibChange::Created(o) | RibChange::Updated(o) => &o.name,
            RibChange::Deleted { name, .. } => name,
        }
    }
}

type CreatedCallback = Arc<dyn Fn(&RibObject) + Send + Sync>;
type UpdatedCallback = Arc<dyn Fn(&RibObject) + Send + Sync>;
type DeletedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A registered interest in a name prefix, with callbacks invoked on the
/// matching lifecycle events.
#[derive(Clone)]
struct Subscription {
    prefix: String,
    on_created: Option<CreatedCallback>,
    on_updated: Option<UpdatedCallback>,
    on_deleted: Option<DeletedCallback>,
}

struct ChangeLog {
    capacity: usize,
    entries: VecDeque<RibChange>,
    /// Version of the oldest entry still retained; `None` when empty.
    floor_version: Option<u64>,
}

impl ChangeLog {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            floor_version: None,
        }
    }

    fn push(&mut self, change: RibChange) {
        if self.floor_version.is_none() {
            self.floor_version = Some(change.version());
        }
        self.entries.push_back(change);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            if let Some(next) = self.entries.front() {
                self.floor_version = Some(next.version());
            }
        }
    }

    fn since(&self, version: u64) -> Result<Vec<RibChange>, String> {
        match self.floor_version {
            None => Ok(Vec::new()),
            Some(floor) if version + 1 < floor => Err(format!(
                "requested version {} predates retained window (floor {})",
                version, floor
            )),
            _ => Ok(self
                .entries
                .iter()
                .filter(|c| c.version() > version)
                .cloned()
                .collect()),
        }
    }
}

/// The Resource Information Base
///
/// Thread-safe storage for all IPC Process state information.
/// Uses RwLock for concurrent read access while maintaining write consistency.
#[derive(Clone)]
pub struct Rib {
    /// Internal storage of RIB objects, keyed by object name
    objects: Arc<RwLock<HashMap<String, RibObject>>>,
    /// Counter for generating object versions
    version_counter: Arc<RwLock<u64>>,
    /// Bounded log of recent changes, backing incremental CDAP sync
    change_log: Arc<RwLock<ChangeLog>>,
    /// Active subscriptions, keyed by subscription id
    subscriptions: Arc<RwLock<HashMap<u64, Subscription>>>,
    next_sub_id: Arc<RwLock<u64>>,
    /// De-duplication table for inbound CDAP ops: (full_name, seqno) -> seen at
    ro_ids: Arc<RwLock<HashMap<(String, u64), Instant>>>,
}

impl std::fmt::Debug for Rib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rib").finish_non_exhaustive()
    }
}

impl Rib {
    /// Creates a new, empty RIB with the default change-log capacity.
    pub fn new() -> Self {
        Self::with_change_log_size(DEFAULT_CHANGE_LOG_SIZE)
    }

    /// Creates a new, empty RIB with an explicit change-log capacity.
    pub fn with_change_log_size(capacity: usize) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            version_counter: Arc::new(RwLock::new(0)),
            change_log: Arc::new(RwLock::new(ChangeLog::new(capacity))),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            next_sub_id: Arc::new(RwLock::new(0)),
            ro_ids: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a RIB object with the given name, class, and value
    ///
    /// # Arguments
    /// * `name` - Unique identifier for the object
    /// * `class` - Object class/type
    /// * `value` - The value to store
    ///
    /// # Returns
    /// * `Ok(())` if the object was created successfully
    /// * `Err(String)` if an object with that name already exists
    pub async fn create(&self, name: String, class: String, value: RibValue) -> Result<(), String> {
        self.create_with_attr(name, class, value, RibAttr::default())
            .await
    }

    /// Creates a RIB object with explicit replication/expiry attributes.
    pub async fn create_with_attr(
        &self,
        name: String,
        class: String,
        value: RibValue,
        attr: RibAttr,
    ) -> Result<(), String> {
        let mut objects = self.objects.write().await;

        if objects.contains_key(&name) {
            return Err(format!("Object '{}' already exists", name));
        }

        let version = self.next_version().await;
        let now = now_secs();

        let obj = RibObject {
            name: name.clone(),
            class,
            value,
            version,
            last_modified: now,
            attr,
        };

        objects.insert(name, obj.clone());
        drop(objects);

        self.change_log.write().await.push(RibChange::Created(obj.clone()));
        self.notify_created(&obj).await;
        Ok(())
    }

    /// Reads a RIB object by name
    pub async fn read(&self, name: &str) -> Option<RibObject> {
        let objects = self.objects.read().await;
        objects.get(name).cloned()
    }

    /// Updates an existing RIB object
    pub async fn update(&self, name: &str, value: RibValue) -> Result<(), String> {
        let mut objects = self.objects.write().await;

        let obj = match objects.get_mut(name) {
            Some(obj) => {
                obj.value = value;
                obj.version = self.next_version().await;
                obj.last_modified = now_secs();
                obj.clone()
            }
            None => return Err(format!("Object '{}' not found", name)),
        };
        drop(objects);

        self.change_log.write().await.push(RibChange::Updated(obj.clone()));
        self.notify_updated(&obj).await;
        Ok(())
    }

    /// Deletes a RIB object by name
    pub async fn delete(&self, name: &str) -> Result<(), String> {
        let mut objects = self.objects.write().await;

        match objects.remove(name) {
            Some(_) => {
                drop(objects);
                let version = self.next_version().await;
                self.change_log
                    .write()
                    .await
                    .push(RibChange::Deleted { name: name.to_string(), version });
                self.notify_deleted(name).await;
                Ok(())
            }
            None => Err(format!("Object '{}' not found", name)),
        }
    }

    /// Lists all objects of a given class
    pub async fn list_by_class(&self, class: &str) -> Vec<String> {
        let objects = self.objects.read().await;
        objects
            .values()
            .filter(|obj| obj.class == class)
            .map(|obj| obj.name.clone())
            .collect()
    }

    /// Lists all object names in the RIB
    pub async fn list_all(&self) -> Vec<String> {
        let objects = self.objects.read().await;
        objects.keys().cloned().collect()
    }

    /// Returns the total number of objects in the RIB
    pub async fn count(&self) -> usize {
        let objects = self.objects.read().await;
        objects.len()
    }

    /// Clears all objects from the RIB
    pub async fn clear(&self) {
        let mut objects = self.objects.write().await;
        objects.clear();
    }

    /// Serializes the entire RIB into a byte vector for synchronization,
    /// using `postcard` for a compact binary snapshot.
    pub async fn serialize(&self) -> Vec<u8> {
        let objects = self.objects.read().await;
        let snapshot: Vec<RibObject> = objects.values().cloned().collect();
        postcard::to_allocvec(&snapshot).unwrap_or_default()
    }

    /// Deserializes a RIB snapshot and merges it into this RIB
    ///
    /// # Returns
    /// * `Ok(usize)` with the number of objects synchronized
    /// * `Err(String)` if deserialization fails
    pub async fn deserialize(&self, data: &[u8]) -> Result<usize, String> {
        if data.is_empty() {
            return Ok(0);
        }

        let snapshot: Vec<RibObject> =
            postcard::from_bytes(data).map_err(|e| format!("invalid RIB snapshot: {}", e))?;

        Ok(self.merge_objects(snapshot).await)
    }

    /// Gets all objects from the RIB (for synchronization)
    pub async fn get_all_objects(&self) -> Vec<RibObject> {
        let objects = self.objects.read().await;
        objects.values().cloned().collect()
    }

    /// Merges objects from another RIB, using version numbers to resolve
    /// conflicts. Also advances the local version counter so it never
    /// regresses below any merged object's version.
    pub async fn merge_objects(&self, objects: Vec<RibObject>) -> usize {
        let mut local_objects = self.objects.write().await;
        let mut merged_count = 0;
        let mut highest_version = 0u64;

        for obj in objects {
            highest_version = highest_version.max(obj.version);
            match local_objects.get(&obj.name) {
                Some(existing) => {
                    if obj.version > existing.version {
                        local_objects.insert(obj.name.clone(), obj);
                        merged_count += 1;
                    }
                }
                None => {
                    local_objects.insert(obj.name.clone(), obj);
                    merged_count += 1;
                }
            }
        }
        drop(local_objects);

        if highest_version > 0 {
            let mut counter = self.version_counter.write().await;
            if *counter < highest_version {
                *counter = highest_version;
            }
        }

        merged_count
    }

    /// The highest seqno issued by this RIB so far.
    pub async fn current_version(&self) -> u64 {
        *self.version_counter.read().await
    }

    /// Returns every change strictly after `version`, or an error if
    /// `version` predates what the bounded change log still retains.
    pub async fn get_changes_since(&self, version: u64) -> Result<Vec<RibChange>, String> {
        self.change_log.read().await.since(version)
    }

    /// Applies a batch of changes (as produced by `get_changes_since`) to
    /// this RIB, idempotently, and advances this RIB's own version counter
    /// to the highest version among the applied changes.
    pub async fn apply_changes(&self, changes: Vec<RibChange>) -> Result<usize, String> {
        let mut applied = 0usize;
        let mut highest_version = 0u64;

        for change in changes {
            highest_version = highest_version.max(change.version());
            match &change {
                RibChange::Created(obj) | RibChange::Updated(obj) => {
                    let mut objects = self.objects.write().await;
                    let should_apply = match objects.get(&obj.name) {
                        Some(existing) => obj.version > existing.version,
                        None => true,
                    };
                    if should_apply {
                        objects.insert(obj.name.clone(), obj.clone());
                        applied += 1;
                    }
                }
                RibChange::Deleted { name, version } => {
                    let mut objects = self.objects.write().await;
                    if let Some(existing) = objects.get(name) {
                        if *version >= existing.version {
                            objects.remove(name);
                            applied += 1;
                        }
                    }
                }
            }
        }

        if highest_version > 0 {
            let mut counter = self.version_counter.write().await;
            if *counter < highest_version {
                *counter = highest_version;
            }
        }

        Ok(applied)
    }

    /// Records that an inbound (name, seqno) CDAP op has been seen, for the
    /// de-duplication window in §4.10. Returns `true` if this is a fresh
    /// (name, seqno) pair, `false` if it's a duplicate within the window.
    pub async fn record_inbound_op(&self, name: &str, seqno: u64) -> bool {
        self.record_inbound_op_with_timeout(name, seqno, DEFAULT_RO_ID_TIMEOUT)
            .await
    }

    /// As [`Rib::record_inbound_op`], with an explicit de-dup window.
    pub async fn record_inbound_op_with_timeout(
        &self,
        name: &str,
        seqno: u64,
        window: Duration,
    ) -> bool {
        let mut ro_ids = self.ro_ids.write().await;
        let now = Instant::now();
        ro_ids.retain(|_, seen_at| now.duration_since(*seen_at) < window);

        let key = (name.to_string(), seqno);
        if ro_ids.contains_key(&key) {
            false
        } else {
            ro_ids.insert(key, now);
            true
        }
    }

    /// Subscribes to lifecycle events for objects whose full name starts
    /// with `prefix`. Returns a subscription id usable with `unsubscribe`.
    pub async fn subscribe(
        &self,
        prefix: impl Into<String>,
        on_created: Option<CreatedCallback>,
        on_updated: Option<UpdatedCallback>,
        on_deleted: Option<DeletedCallback>,
    ) -> u64 {
        let mut next_id = self.next_sub_id.write().await;
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        self.subscriptions.write().await.insert(
            id,
            Subscription {
                prefix: prefix.into(),
                on_created,
                on_updated,
                on_deleted,
            },
        );
        id
    }

    /// Removes a subscription previously registered with `subscribe`.
    pub async fn unsubscribe(&self, id: u64) {
        self.subscriptions.write().await.remove(&id);
    }

    async fn notify_created(&self, obj: &RibObject) {
        let subs = self.subscriptions.read().await;
        for sub in subs.values() {
            if obj.name.starts_with(&sub.prefix)
                && let Some(cb) = &sub.on_created
            {
                cb(obj);
            }
        }
    }

    async fn notify_updated(&self, obj: &RibObject) {
        let subs = self.subscriptions.read().await;
        for sub in subs.values() {
            if obj.name.starts_with(&sub.prefix)
                && let Some(cb) = &sub.on_updated
            {
                cb(obj);
            }
        }
    }

    async fn notify_deleted(&self, name: &str) {
        let subs = self.subscriptions.read().await;
        for sub in subs.values() {
            if name.starts_with(&sub.prefix)
                && let Some(cb) = &sub.on_deleted
            {
                cb(name);
            }
        }
    }

    /// Spawns a background task that periodically sweeps expired objects
    /// (non-zero `attr.expiry`) and removes them, per the RIB manager's
    /// timer-wheel design note. `resolution` is the sweep interval.
    pub fn spawn_expiry_sweeper(&self, resolution: Duration) -> JoinHandle<()> {
        let rib = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(resolution);
            loop {
                interval.tick().await;
                rib.sweep_expired().await;
            }
        })
    }

    async fn sweep_expired(&self) {
        let expired: Vec<String> = {
            let objects = self.objects.read().await;
            let now = now_secs();
            objects
                .values()
                .filter_map(|obj| {
                    obj.attr.expiry.and_then(|ttl| {
                        let expires_at = obj.last_modified + ttl.as_secs();
                        if now >= expires_at {
                            Some(obj.name.clone())
                        } else {
                            None
                        }
                    })
                })
                .collect()
        };

        for name in expired {
            let _ = self.delete(&name).await;
        }
    }

    /// Generates the next version number
    async fn next_version(&self) -> u64 {
        let mut counter = self.version_counter.write().await;
        *counter += 1;
        *counter
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

impl Default for Rib {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_rib_create_and_read() {
        let rib = Rib::new();

        let result = rib
            .create(
                "test-object".to_string(),
                "test-class".to_string(),
                RibValue::String("test-value".to_string()),
            )
            .await;

        assert!(result.is_ok());

        let obj = rib.read("test-object").await;
        assert!(obj.is_some());

        let obj = obj.unwrap();
        assert_eq!(obj.name, "test-object");
        assert_eq!(obj.class, "test-class");
        assert_eq!(obj.value.as_string(), Some("test-value"));
    }

    #[tokio::test]
    async fn test_rib_update() {
        let rib = Rib::new();

        rib.create(
            "test".to_string(),
            "class".to_string(),
            RibValue::Integer(42),
        )
        .await
        .unwrap();

        let result = rib.update("test", RibValue::Integer(100)).await;
        assert!(result.is_ok());

        let obj = rib.read("test").await.unwrap();
        assert_eq!(obj.value.as_integer(), Some(100));
    }

    #[tokio::test]
    async fn test_rib_delete() {
        let rib = Rib::new();

        rib.create(
            "test".to_string(),
            "class".to_string(),
            RibValue::Boolean(true),
        )
        .await
        .unwrap();

        assert!(rib.delete("test").await.is_ok());
        assert!(rib.read("test").await.is_none());
    }

    #[tokio::test]
    async fn test_rib_list_by_class() {
        let rib = Rib::new();

        rib.create(
            "obj1".to_string(),
            "type-a".to_string(),
            RibValue::Integer(1),
        )
        .await
        .unwrap();
        rib.create(
            "obj2".to_string(),
            "type-b".to_string(),
            RibValue::Integer(2),
        )
        .await
        .unwrap();
        rib.create(
            "obj3".to_string(),
            "type-a".to_string(),
            RibValue::Integer(3),
        )
        .await
        .unwrap();

        let type_a_objects = rib.list_by_class("type-a").await;
        assert_eq!(type_a_objects.len(), 2);
        assert!(type_a_objects.contains(&"obj1".to_string()));
        assert!(type_a_objects.contains(&"obj3".to_string()));
    }

    #[tokio::test]
    async fn test_rib_duplicate_create() {
        let rib = Rib::new();

        rib.create("dup".to_string(), "class".to_string(), RibValue::Integer(1))
            .await
            .unwrap();
        let result = rib
            .create("dup".to_string(), "class".to_string(), RibValue::Integer(2))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rib_snapshot_roundtrip() {
        let rib = Rib::new();
        rib.create("a".to_string(), "c".to_string(), RibValue::Integer(1))
            .await
            .unwrap();
        rib.create("b".to_string(), "c".to_string(), RibValue::String("x".to_string()))
            .await
            .unwrap();

        let snapshot = rib.serialize().await;

        let other = Rib::new();
        let count = other.deserialize(&snapshot).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(other.read("a").await.unwrap().value.as_integer(), Some(1));
    }

    #[tokio::test]
    async fn test_change_log_tracks_creates_updates_deletes() {
        let rib = Rib::new();
        rib.create("x".to_string(), "c".to_string(), RibValue::Integer(1))
            .await
            .unwrap();
        rib.update("x", RibValue::Integer(2)).await.unwrap();
        rib.delete("x").await.unwrap();

        let changes = rib.get_changes_since(0).await.unwrap();
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], RibChange::Created(_)));
        assert!(matches!(changes[1], RibChange::Updated(_)));
        assert!(matches!(changes[2], RibChange::Deleted { .. }));
    }

    #[tokio::test]
    async fn test_change_log_overflow_errors_on_stale_version() {
        let rib = Rib::with_change_log_size(10);
        for i in 0..15 {
            rib.create(format!("obj{}", i), "c".to_string(), RibValue::Integer(i))
                .await
                .unwrap();
        }

        assert!(rib.get_changes_since(0).await.is_err());
        let current = rib.current_version().await;
        assert!(rib.get_changes_since(current - 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_apply_changes_advances_version() {
        let bootstrap = Rib::new();
        bootstrap
            .create("shared".to_string(), "c".to_string(), RibValue::Integer(1))
            .await
            .unwrap();
        bootstrap.update("shared", RibValue::Integer(2)).await.unwrap();

        let member = Rib::new();
        let changes = bootstrap.get_changes_since(0).await.unwrap();
        let applied = member.apply_changes(changes).await.unwrap();
        assert_eq!(applied, 2);
        assert_eq!(
            member.current_version().await,
            bootstrap.current_version().await
        );
        assert_eq!(member.read("shared").await.unwrap().value.as_integer(), Some(2));
    }

    #[tokio::test]
    async fn test_subscription_fires_on_matching_prefix() {
        let rib = Rib::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();

        rib.subscribe(
            "/routing/",
            Some(Arc::new(move |_obj: &RibObject| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            })),
            None,
            None,
        )
        .await;

        rib.create(
            "/routing/static/1".to_string(),
            "route".to_string(),
            RibValue::Integer(1),
        )
        .await
        .unwrap();
        rib.create(
            "/local/address".to_string(),
            "address".to_string(),
            RibValue::Integer(2),
        )
        .await
        .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inbound_op_dedup() {
        let rib = Rib::new();
        assert!(rib.record_inbound_op("/x", 1).await);
        assert!(!rib.record_inbound_op("/x", 1).await);
        assert!(rib.record_inbound_op("/x", 2).await);
    }
}
