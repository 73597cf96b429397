//! SigProxy Server - SigV4 signing reverse proxy.
//!
//! Accepts plain HTTP from clients that cannot sign requests, signs each
//! request with AWS Signature Version 4 and forwards it to the configured
//! (or requested) AWS endpoint. A small set of cluster metadata calls is
//! answered locally so that search clients can start against serverless
//! collections.
//!
//! # Usage
//!
//! ```text
//! sigproxy-server --host abc123.us-east-1.aoss.amazonaws.com --port :8080
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORT` | `:8080` | Listen address |
//! | `HOST` | *(unset)* | Destination host override |
//! | `REGION` | *(inferred)* | Signing region override |
//! | `NAME` | *(inferred)* | Signing service override |
//! | `ROLE_ARN` | *(unset)* | Role to assume for signing credentials |
//! | `STRIP` | *(empty)* | Comma-separated headers to strip |
//! | `DEBUG` | `false` | Verbose logging |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `DEBUG`) |

mod cli;
mod credentials;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sigproxy_auth::RefreshingCredentialProvider;
use sigproxy_core::resolve_scope;
use sigproxy_http::{ProxyHttpService, SigningForwarder, build_upstream_client, serve};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::credentials::AwsCredentialSource;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise `debug` when verbose and `info` otherwise.
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::try_new(level).with_context(|| format!("invalid log level filter: {level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Request the emulated health endpoint of a running proxy.
///
/// Succeeds only on a `200` response.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET /_cluster/health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    let status_ok = response
        .lines()
        .next()
        .is_some_and(|line| line.split_whitespace().nth(1) == Some("200"));
    if status_ok {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal, draining connections");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --health-check for container HEALTHCHECK.
    if cli.health_check {
        let healthy = run_health_check(&cli.health_check_addr()).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(cli.verbose)?;

    let config = cli.proxy_config()?;
    let transport = cli.transport_config();

    // A fixed destination must have a resolvable scope before serving anything.
    if config.host_override.is_some() {
        let scope = resolve_scope(None, &config.scope_overrides())
            .context("cannot determine signing scope for the configured host")?;
        info!(
            host = %scope.host,
            region = %scope.region,
            service = %scope.service,
            "resolved signing scope",
        );
    }

    let source = AwsCredentialSource::load(config.region_override.as_deref(), cli.role_arn())
        .await
        .context("failed to configure AWS credentials")?;
    let credentials = RefreshingCredentialProvider::start(Arc::new(source))
        .await
        .context("failed to obtain initial AWS credentials")?;

    let client = build_upstream_client(&transport)?;

    let strip: Vec<&str> = config
        .strip_headers
        .names()
        .iter()
        .map(http::HeaderName::as_str)
        .collect();
    info!(strip_headers = ?strip, "stripping headers");

    let addr = cli.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        addr = %listener.local_addr()?,
        upstream_scheme = %config.upstream_scheme,
        idle_conn_timeout = ?transport.idle_conn_timeout,
        version = VERSION,
        "starting SigProxy",
    );

    let forwarder = SigningForwarder::new(client, Arc::new(config), Arc::new(credentials));
    serve(listener, ProxyHttpService::new(forwarder), shutdown_signal()).await;

    Ok(())
}
