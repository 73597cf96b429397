//! Failure handling integration tests.

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use sigproxy_core::{ProxyConfig, UpstreamScheme};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::{MockUpstream, TestProxy, http_client, signing_config};

    async fn error_body(resp: reqwest::Response) -> Value {
        resp.json().await.unwrap()
    }

    #[tokio::test]
    async fn test_should_return_bad_gateway_for_unreachable_upstream() {
        // Reserve a port, then release it so nothing is listening there.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let config = ProxyConfig::builder()
            .host_override(Some(dead.to_string()))
            .region_override(Some("us-east-1".to_owned()))
            .service_override(Some("es".to_owned()))
            .upstream_scheme(UpstreamScheme::Http)
            .build();
        let proxy = TestProxy::start(config).await;

        let resp = http_client().get(proxy.url("/movies")).send().await.unwrap();
        assert_eq!(resp.status(), 502);
        let body = error_body(resp).await;
        assert_eq!(body["status"], 502);
        assert_eq!(body["error"]["type"], "upstream_exception");
    }

    #[tokio::test]
    async fn test_should_reject_unresolvable_scope_before_contacting_upstream() {
        let upstream = MockUpstream::start().await;
        let config = ProxyConfig::builder()
            .host_override(Some(upstream.authority()))
            .upstream_scheme(UpstreamScheme::Http)
            .build();
        let proxy = TestProxy::start(config).await;

        let resp = http_client().get(proxy.url("/movies")).send().await.unwrap();
        assert_eq!(resp.status(), 502);
        assert_eq!(
            error_body(resp).await["error"]["type"],
            "signing_scope_exception"
        );
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_non_aws_client_host_without_overrides() {
        let proxy = TestProxy::start(ProxyConfig::default()).await;

        let resp = http_client()
            .get(proxy.url("/movies/_search"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        assert_eq!(
            error_body(resp).await["error"]["type"],
            "signing_scope_exception"
        );
    }

    #[tokio::test]
    async fn test_should_refuse_paths_that_would_be_rewritten_upstream() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;

        // Raw bytes: an HTTP client would normalize the path before sending.
        let mut stream = TcpStream::connect(proxy.addr()).await.unwrap();
        stream
            .write_all(
                b"GET /movies/%2e%2e/_cluster/settings HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Connection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 502"), "{response}");
        assert!(response.contains("invalid_target_exception"), "{response}");
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_owned_path_with_wrong_method() {
        let upstream = MockUpstream::start().await;
        let proxy = TestProxy::start(signing_config(&upstream, &[])).await;
        let client = http_client();

        let resp = client
            .delete(proxy.url("/_cluster/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body = error_body(resp).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"]["type"], "not_found_exception");

        let resp = client.get(proxy.url("/movies/_refresh")).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        assert!(upstream.requests().is_empty());
    }
}
