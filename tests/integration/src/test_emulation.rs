//! Locally answered control-plane routes.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{MockUpstream, TestProxy, http_client, signing_config};

    async fn get_json(resp: reqwest::Response) -> Value {
        assert_eq!(
            resp.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json; charset=UTF-8")
        );
        resp.json().await.unwrap()
    }

    #[tokio::test]
    async fn test_should_answer_cluster_info_locally() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client().get(proxy.url("/")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            get_json(resp).await,
            json!({
                "name": "serverless",
                "cluster_name": "serverless",
                "cluster_uuid": "0",
                "version": {
                    "distribution": "aoss",
                    "number": "2.3.0",
                    "build_type": "serverless",
                    "build_hash": "unknown",
                    "build_date": "2023-",
                    "build_snapshot": false,
                    "lucene_version": "8.10.1",
                    "minimum_wire_compatibility_version": "6.8.0",
                    "minimum_index_compatibility_version": "6.0.0-beta1"
                },
                "tag_line": "The OpenSearch Project: https://opensearch.org/"
            })
        );
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_answer_health_locally() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let client = http_client();

        for path in ["/_cluster/health", "/_cluster/health/movies"] {
            let resp = client.get(proxy.url(path)).send().await.unwrap();
            assert_eq!(resp.status(), 200, "{path}");
            let body = get_json(resp).await;
            assert_eq!(body["status"], "green");
            assert_eq!(body["cluster_name"], "serverless");
            assert_eq!(body["number_of_nodes"], 1);
            assert_eq!(body["active_shards_percent_as_number"], json!(1.0));
        }
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_acknowledge_refresh_and_forcemerge_locally() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let client = http_client();

        for path in ["/movies/_refresh", "/movies/_forcemerge"] {
            let resp = client.post(proxy.url(path)).send().await.unwrap();
            assert_eq!(resp.status(), 200, "{path}");
            assert_eq!(
                resp.text().await.unwrap(),
                r#"{"_shards":{"total":1,"successful":1,"failed":0}}"#
            );
        }
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_answer_stats_locally() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let client = http_client();

        let nodes = get_json(client.get(proxy.url("/_nodes/stats")).send().await.unwrap()).await;
        assert_eq!(nodes["_nodes"]["total"], 1);
        assert_eq!(nodes["cluster_name"], "serverless");

        let all = get_json(
            client
                .get(proxy.url("/_all/_stats/_all"))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert!(all.get("indices").is_none());

        let index = get_json(
            client
                .get(proxy.url("/movies/_stats/docs"))
                .send()
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(index["indices"]["movies"]["primaries"]["docs"]["count"], 0);

        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_route_on_path_and_ignore_query() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client()
            .get(proxy.url("/_cluster/health?wait_for_status=yellow&timeout=5s"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(upstream.requests().is_empty());
    }
}
