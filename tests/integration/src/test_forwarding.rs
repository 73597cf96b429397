//! Signing and forwarding through the proxy.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;
    use chrono::NaiveDateTime;
    use http::StatusCode;
    use sha2::{Digest, Sha256};
    use sigproxy_auth::canonical::UriEncoding;
    use sigproxy_auth::{SigningParams, SigningRequest, sign};
    use tokio::task::JoinSet;

    use crate::{
        ACCESS_KEY_ID, MockResponse, MockUpstream, REGION, RecordedRequest, SERVICE,
        SESSION_TOKEN, TestProxy, http_client, signing_config, test_credentials,
    };

    /// Recompute the `Authorization` header from what the upstream received.
    fn expected_authorization(req: &RecordedRequest) -> String {
        let amz_date = req.header("x-amz-date").unwrap();
        let time = NaiveDateTime::parse_from_str(amz_date, "%Y%m%dT%H%M%SZ")
            .unwrap()
            .and_utc();
        let credentials = test_credentials();

        let output = sign(
            &SigningRequest {
                method: req.method.as_str(),
                path: &req.path,
                query: req.query.as_deref().unwrap_or(""),
                headers: &req.headers,
                payload_hash: req.header("x-amz-content-sha256").unwrap(),
            },
            &SigningParams {
                region: REGION,
                service: SERVICE,
                credentials: &credentials,
                time,
                uri_encoding: UriEncoding::Double,
            },
        )
        .unwrap();

        output
            .headers
            .iter()
            .find(|(name, _)| *name == http::header::AUTHORIZATION)
            .map(|(_, value)| value.to_str().unwrap().to_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_sign_and_forward_to_configured_host() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let body = r#"{"query":{"match":{"title":"star"}}}"#;

        let resp = http_client()
            .post(proxy.url("/movies/_search"))
            .header("content-type", "application/json")
            .header("x-amz-user-agent", "integration")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), r#"{"acknowledged":true}"#);

        let req = upstream.single_request();
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.path, "/movies/_search");
        assert_eq!(req.header("host"), Some(upstream.authority().as_str()));
        assert_eq!(req.body, Bytes::from(body));
        assert_eq!(
            req.header("content-length"),
            Some(body.len().to_string().as_str())
        );
        assert_eq!(
            req.header("x-amz-content-sha256"),
            Some(hex::encode(Sha256::digest(body.as_bytes())).as_str())
        );
        assert_eq!(req.header("x-amz-security-token"), Some(SESSION_TOKEN));

        let authorization = req.header("authorization").unwrap();
        assert!(authorization.starts_with(&format!(
            "AWS4-HMAC-SHA256 Credential={ACCESS_KEY_ID}/"
        )));
        assert!(authorization.contains(&format!("/{REGION}/{SERVICE}/aws4_request")));
        assert!(authorization.contains(concat!(
            "SignedHeaders=host;x-amz-content-sha256;x-amz-date;",
            "x-amz-security-token;x-amz-user-agent"
        )));
        assert_eq!(authorization, expected_authorization(&req));
    }

    #[tokio::test]
    async fn test_should_send_canonical_query_upstream() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client()
            .get(proxy.url("/movies/_search?size=5&q=title:star"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let req = upstream.single_request();
        assert_eq!(req.query.as_deref(), Some("q=title%3Astar&size=5"));
        assert_eq!(
            req.header("x-amz-content-sha256"),
            Some(hex::encode(Sha256::digest(b"")).as_str())
        );
        assert_eq!(req.header("authorization").unwrap(), expected_authorization(&req));
    }

    #[tokio::test]
    async fn test_should_strip_configured_headers_case_insensitively() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &["x-api-key", "Cookie"])).await;

        http_client()
            .get(proxy.url("/movies/_doc/1"))
            .header("X-Api-Key", "secret")
            .header("cookie", "session=1")
            .header("x-request-tag", "kept")
            .send()
            .await
            .unwrap();

        let req = upstream.single_request();
        assert!(req.header("x-api-key").is_none());
        assert!(req.header("cookie").is_none());
        assert_eq!(req.header("x-request-tag"), Some("kept"));
    }

    #[tokio::test]
    async fn test_should_replace_client_supplied_signing_headers() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        http_client()
            .get(proxy.url("/movies"))
            .header("authorization", "Basic Zm9vOmJhcg==")
            .header("x-amz-date", "19990101T000000Z")
            .header("x-amz-security-token", "stale")
            .send()
            .await
            .unwrap();

        let req = upstream.single_request();
        assert_eq!(req.headers.get_all("authorization").iter().count(), 1);
        assert!(req.header("authorization").unwrap().starts_with("AWS4-HMAC-SHA256 "));
        assert_ne!(req.header("x-amz-date"), Some("19990101T000000Z"));
        assert_eq!(req.header("x-amz-security-token"), Some(SESSION_TOKEN));
        assert_eq!(req.header("authorization").unwrap(), expected_authorization(&req));
    }

    #[tokio::test]
    async fn test_should_not_forward_hop_by_hop_headers() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        http_client()
            .get(proxy.url("/movies"))
            .header("connection", "x-hop-marker")
            .header("x-hop-marker", "1")
            .header("proxy-authorization", "Basic Zm9vOmJhcg==")
            .send()
            .await
            .unwrap();

        let req = upstream.single_request();
        assert!(req.header("x-hop-marker").is_none());
        assert!(req.header("proxy-authorization").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_sign_concurrent_requests_independently() {
        const REQUESTS: usize = 48;

        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let client = http_client();

        let mut tasks = JoinSet::new();
        for i in 0..REQUESTS {
            let client = client.clone();
            let url = proxy.url(&format!("/movies-{i}/_doc"));
            tasks.spawn(async move {
                let body = format!(r#"{{"id":{i},"title":"movie {i}"}}"#);
                client.post(url).body(body).send().await.unwrap().status()
            });
        }
        while let Some(status) = tasks.join_next().await {
            assert_eq!(status.unwrap(), 200);
        }

        let requests = upstream.requests();
        assert_eq!(requests.len(), REQUESTS);

        let mut paths = HashSet::new();
        for req in &requests {
            let id = req
                .path
                .trim_start_matches("/movies-")
                .trim_end_matches("/_doc");
            assert_eq!(
                req.body,
                Bytes::from(format!(r#"{{"id":{id},"title":"movie {id}"}}"#))
            );
            assert_eq!(
                req.header("x-amz-content-sha256"),
                Some(hex::encode(Sha256::digest(&req.body)).as_str())
            );
            assert_eq!(req.header("authorization").unwrap(), expected_authorization(req));
            paths.insert(req.path.clone());
        }
        assert_eq!(paths.len(), REQUESTS);
    }

    #[tokio::test]
    async fn test_should_relay_redirect_without_following() {
        let upstream = MockUpstream::start().await;
        upstream.respond_with(MockResponse {
            status: StatusCode::FOUND,
            headers: vec![("location", "http://example.com/elsewhere".to_owned())],
            body: Bytes::new(),
        });
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client().get(proxy.url("/movies")).send().await.unwrap();
        assert_eq!(resp.status(), 302);
        assert_eq!(
            resp.headers().get("location").unwrap(),
            "http://example.com/elsewhere"
        );
        assert_eq!(upstream.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_should_pass_through_upstream_failures_with_body_intact() {
        let upstream = MockUpstream::start().await;
        let failure = r#"{"error":{"type":"index_not_found_exception"},"status":404}"#;
        upstream.respond_with(MockResponse {
            status: StatusCode::NOT_FOUND,
            headers: vec![
                ("content-type", "application/json".to_owned()),
                ("x-upstream-marker", "kept".to_owned()),
            ],
            body: Bytes::from(failure),
        });
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client().get(proxy.url("/missing")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers().get("x-upstream-marker").unwrap(), "kept");
        assert_eq!(resp.text().await.unwrap(), failure);
        assert_eq!(upstream.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_should_forward_owned_path_prefixes_that_do_not_match() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        let resp = http_client()
            .get(proxy.url("/_cluster/settings"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(upstream.single_request().path, "/_cluster/settings");
    }
}
