//! Response documents of the emulated cluster.
//!
//! Field names follow the OpenSearch REST API (`snake_case`, with a leading
//! underscore on envelope fields such as `_shards` and `_nodes`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cluster info
// ---------------------------------------------------------------------------

/// Version block of the `GET /` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Distribution name.
    pub distribution: String,
    /// Version number.
    pub number: String,
    /// Build flavour.
    pub build_type: String,
    /// Build commit hash.
    pub build_hash: String,
    /// Build date.
    pub build_date: String,
    /// Whether this is a snapshot build.
    pub build_snapshot: bool,
    /// Bundled Lucene version.
    pub lucene_version: String,
    /// Oldest wire-compatible version.
    pub minimum_wire_compatibility_version: String,
    /// Oldest index-compatible version.
    pub minimum_index_compatibility_version: String,
}

/// Response of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Node name.
    pub name: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Cluster UUID.
    pub cluster_uuid: String,
    /// Version descriptor.
    pub version: Version,
    /// Product tagline.
    pub tag_line: String,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Per-shard result counts (`_shards`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCounts {
    /// Shards the operation targeted.
    pub total: u32,
    /// Shards that succeeded.
    pub successful: u32,
    /// Shards that failed.
    pub failed: u32,
}

/// Per-node result counts (`_nodes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    /// Nodes the request targeted.
    pub total: u32,
    /// Nodes that answered.
    pub successful: u32,
    /// Nodes that failed.
    pub failed: u32,
}

/// Response of `POST /{index}/_refresh` and `POST /{index}/_forcemerge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardsAcknowledged {
    /// Shard results.
    #[serde(rename = "_shards")]
    pub shards: ShardCounts,
}

// ---------------------------------------------------------------------------
// Node stats
// ---------------------------------------------------------------------------

/// Operating system descriptor of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// OS name.
    pub name: String,
    /// OS version.
    pub version: String,
    /// Processors available to the node.
    pub available_processors: u32,
}

/// Garbage collector section of the runtime descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcInfo {
    /// Collectors by name; always empty.
    pub collectors: BTreeMap<String, CollectorInfo>,
}

/// A single garbage collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorInfo {
    /// Number of collections.
    pub collection_count: u64,
    /// Time spent collecting.
    pub collection_time_in_millis: u64,
}

/// Memory section of the runtime descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfo {
    /// Heap bytes in use.
    pub heap_used_in_bytes: u64,
    /// Maximum heap bytes.
    pub heap_max_in_bytes: u64,
    /// Memory pools by name; always empty.
    pub pools: BTreeMap<String, PoolInfo>,
}

/// A single memory pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Bytes in use.
    pub used_in_bytes: u64,
    /// Maximum bytes.
    pub max_in_bytes: u64,
}

/// Runtime descriptor of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JvmInfo {
    /// Runtime vendor.
    pub vm_vendor: String,
    /// Runtime version.
    pub vm_version: String,
    /// Garbage collectors.
    pub gc: GcInfo,
    /// Memory pools.
    pub mem: MemInfo,
}

/// Stats of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Node name.
    pub name: String,
    /// Node roles.
    pub roles: Vec<String>,
    /// Operating system.
    pub os: OsInfo,
    /// Runtime.
    pub jvm: JvmInfo,
}

/// Response of the node stats routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesStats {
    /// Node result counts.
    #[serde(rename = "_nodes")]
    pub nodes_counts: NodeCounts,
    /// Cluster name.
    pub cluster_name: String,
    /// Stats keyed by node id.
    pub nodes: BTreeMap<String, NodeStats>,
}

// ---------------------------------------------------------------------------
// Index stats
// ---------------------------------------------------------------------------

/// Document counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsStats {
    /// Live documents.
    pub count: u64,
    /// Deleted documents.
    pub deleted: u64,
}

/// Store size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Size on disk.
    pub size_in_bytes: u64,
}

/// One stats group (primaries or total).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsGroup {
    /// Document counts.
    pub docs: DocsStats,
    /// Store size.
    pub store: StoreStats,
}

/// Primaries and total stats of an index or the `_all` aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Index UUID; absent on the `_all` aggregate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Stats over primary shards.
    pub primaries: StatsGroup,
    /// Stats over all shards.
    pub total: StatsGroup,
}

/// Response of the index stats routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicesStats {
    /// Shard result counts.
    #[serde(rename = "_shards")]
    pub shards: ShardCounts,
    /// Aggregate over every index.
    #[serde(rename = "_all")]
    pub all: IndexStats,
    /// Per-index stats; omitted for the `_all` route.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indices: BTreeMap<String, IndexStats>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Response of the cluster health routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// `green`, `yellow` or `red`.
    pub status: String,
    /// Whether the health request timed out.
    pub timed_out: bool,
    /// Nodes in the cluster.
    pub number_of_nodes: u32,
    /// Data nodes in the cluster.
    pub number_of_data_nodes: u32,
    /// Active primary shards.
    pub active_primary_shards: u32,
    /// Active shards.
    pub active_shards: u32,
    /// Relocating shards.
    pub relocating_shards: u32,
    /// Initializing shards.
    pub initializing_shards: u32,
    /// Unassigned shards.
    pub unassigned_shards: u32,
    /// Unassigned shards whose allocation is delayed.
    pub delayed_unassigned_shards: u32,
    /// Pending cluster tasks.
    pub number_of_pending_tasks: u32,
    /// Outstanding shard fetches.
    pub number_of_in_flight_fetch: u32,
    /// Longest wait of a queued task.
    pub task_max_waiting_in_queue_millis: u64,
    /// Share of active shards, as a fraction.
    pub active_shards_percent_as_number: f64,
}
