//! The emulated single-node cluster.

use std::collections::BTreeMap;

use crate::model::{
    ClusterHealth, ClusterInfo, DocsStats, GcInfo, IndexStats, IndicesStats, JvmInfo, MemInfo,
    NodeCounts, NodeStats, NodesStats, OsInfo, ShardCounts, ShardsAcknowledged, StatsGroup,
    StoreStats, Version,
};

/// Name of the node and of the cluster.
pub const CLUSTER_NAME: &str = "serverless";

/// Id of the one synthetic node.
pub const NODE_ID: &str = "serverless-node-0";

const CLUSTER_UUID: &str = "0";
const TAG_LINE: &str = "The OpenSearch Project: https://opensearch.org/";

const SINGLE_SHARD: ShardCounts = ShardCounts {
    total: 1,
    successful: 1,
    failed: 0,
};

/// Fixed answers of a single, permanently healthy node.
///
/// Every method is a pure constructor: nothing is stored and nothing is
/// fetched, so the same call always returns the same document.
///
/// # Examples
///
/// ```
/// use sigproxy_emulator::EmulatedCluster;
///
/// let cluster = EmulatedCluster;
/// assert_eq!(cluster.info().version.distribution, "aoss");
/// assert_eq!(cluster.health().status, "green");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedCluster;

impl EmulatedCluster {
    /// `GET /`.
    #[must_use]
    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            name: CLUSTER_NAME.to_owned(),
            cluster_name: CLUSTER_NAME.to_owned(),
            cluster_uuid: CLUSTER_UUID.to_owned(),
            version: Version {
                distribution: "aoss".to_owned(),
                number: "2.3.0".to_owned(),
                build_type: "serverless".to_owned(),
                build_hash: "unknown".to_owned(),
                build_date: "2023-".to_owned(),
                build_snapshot: false,
                lucene_version: "8.10.1".to_owned(),
                minimum_wire_compatibility_version: "6.8.0".to_owned(),
                minimum_index_compatibility_version: "6.0.0-beta1".to_owned(),
            },
            tag_line: TAG_LINE.to_owned(),
        }
    }

    /// Node stats routes: `/_stats/{metrics}`, `/_nodes/stats[/{metrics}]`, `/_nodes/{node_id}`.
    #[must_use]
    pub fn node_stats(&self) -> NodesStats {
        let node = NodeStats {
            name: CLUSTER_NAME.to_owned(),
            roles: vec!["data".to_owned(), "ingest".to_owned(), "master".to_owned()],
            os: OsInfo {
                name: "Linux".to_owned(),
                version: "5.10".to_owned(),
                available_processors: 1,
            },
            jvm: JvmInfo {
                vm_vendor: "Amazon.com Inc.".to_owned(),
                vm_version: "17.0.6".to_owned(),
                gc: GcInfo::default(),
                mem: MemInfo::default(),
            },
        };

        NodesStats {
            nodes_counts: NodeCounts {
                total: 1,
                successful: 1,
                failed: 0,
            },
            cluster_name: CLUSTER_NAME.to_owned(),
            nodes: BTreeMap::from([(NODE_ID.to_owned(), node)]),
        }
    }

    /// Index stats routes.
    ///
    /// With `Some(index)` the index is echoed under `indices`; with `None`
    /// (the literal `/_all/_stats/_all` route) only the `_all` aggregate is
    /// reported.
    #[must_use]
    pub fn index_stats(&self, index: Option<&str>) -> IndicesStats {
        let indices = index
            .map(|name| {
                let stats = IndexStats {
                    uuid: Some(CLUSTER_UUID.to_owned()),
                    ..empty_stats()
                };
                BTreeMap::from([(name.to_owned(), stats)])
            })
            .unwrap_or_default();

        IndicesStats {
            shards: SINGLE_SHARD,
            all: empty_stats(),
            indices,
        }
    }

    /// `GET /_cluster/health[/{index}]`.
    #[must_use]
    pub fn health(&self) -> ClusterHealth {
        ClusterHealth {
            cluster_name: CLUSTER_NAME.to_owned(),
            status: "green".to_owned(),
            timed_out: false,
            number_of_nodes: 1,
            number_of_data_nodes: 1,
            active_primary_shards: 1,
            active_shards: 1,
            relocating_shards: 0,
            initializing_shards: 0,
            unassigned_shards: 0,
            delayed_unassigned_shards: 0,
            number_of_pending_tasks: 0,
            number_of_in_flight_fetch: 0,
            task_max_waiting_in_queue_millis: 0,
            active_shards_percent_as_number: 1.0,
        }
    }

    /// `POST /{index}/_refresh` and `POST /{index}/_forcemerge`.
    #[must_use]
    pub fn shards_acknowledged(&self) -> ShardsAcknowledged {
        ShardsAcknowledged {
            shards: SINGLE_SHARD,
        }
    }
}

fn empty_stats() -> IndexStats {
    let group = StatsGroup {
        docs: DocsStats::default(),
        store: StoreStats::default(),
    };
    IndexStats {
        uuid: None,
        primaries: group,
        total: group,
    }
}
