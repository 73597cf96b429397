//! Local answers for the emulated control-plane routes.

use http::StatusCode;
use sigproxy_emulator::EmulatedCluster;
use tracing::debug;

use crate::body::ProxyResponseBody;
use crate::response::json_response;
use crate::router::{LocalRoute, PathParams};

/// Produce the fixed response of a local route. Never touches the network.
#[must_use]
pub fn emulate(
    cluster: &EmulatedCluster,
    route: LocalRoute,
    params: &PathParams,
) -> http::Response<ProxyResponseBody> {
    debug!(?route, "answering emulated route");
    match route {
        LocalRoute::ClusterInfo => json_response(StatusCode::OK, &cluster.info()),
        LocalRoute::NodeStats => json_response(StatusCode::OK, &cluster.node_stats()),
        LocalRoute::AllIndexStats => json_response(StatusCode::OK, &cluster.index_stats(None)),
        LocalRoute::IndexStats => {
            json_response(StatusCode::OK, &cluster.index_stats(params.get("index")))
        }
        LocalRoute::Health => json_response(StatusCode::OK, &cluster.health()),
        LocalRoute::Refresh | LocalRoute::ForceMerge => {
            json_response(StatusCode::OK, &cluster.shards_acknowledged())
        }
    }
}
