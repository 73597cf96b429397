//! Command line and environment configuration.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sigproxy_core::{ProxyConfig, StripHeaders, TransportConfig, UpstreamScheme};

/// SigV4 signing reverse proxy for AWS search endpoints.
#[derive(Parser, Debug)]
#[command(name = "sigproxy-server", version, about)]
pub struct Cli {
    /// Enable additional logging, implies all the log-* options
    #[arg(short = 'v', long, env = "DEBUG")]
    pub verbose: bool,

    /// Log 4xx and 5xx response bodies
    #[arg(long = "log-failed-requests", env = "LOG_FAILED_RESPONSE")]
    pub log_failed_requests: bool,

    /// Log the SigV4 signing process
    #[arg(long = "log-signing-process", env = "LOG_SIGNING")]
    pub log_signing_process: bool,

    /// Address to serve HTTP on (`:8080` listens on all interfaces)
    #[arg(long, env = "PORT", default_value = ":8080")]
    pub port: String,

    /// Headers to strip from incoming requests
    #[arg(short = 's', long, env = "STRIP", value_delimiter = ',')]
    pub strip: Vec<String>,

    /// ARN of the role to assume for signing credentials
    #[arg(long = "role-arn", env = "ROLE_ARN")]
    pub role_arn: Option<String>,

    /// AWS service to sign for
    #[arg(long, env = "NAME")]
    pub name: Option<String>,

    /// Host to proxy to
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// AWS region to sign for
    #[arg(long, env = "REGION")]
    pub region: Option<String>,

    /// Disable peer TLS certificate validation
    #[arg(long = "no-verify-ssl", env = "NO_VERIFY_SSL")]
    pub no_verify_ssl: bool,

    /// Idle timeout of pooled upstream connections (e.g. `40s`, `500ms`, `2m`)
    #[arg(
        long = "transport.idle-conn-timeout",
        env = "TRANSPORT_IDLE_CONN_TIMEOUT",
        default_value = "40s",
        value_parser = parse_duration
    )]
    pub idle_conn_timeout: Duration,

    /// URL scheme of the upstream (`http` or `https`)
    #[arg(long = "upstream-url-scheme", env = "UPSTREAM_URL_SCHEME", default_value = "https")]
    pub upstream_url_scheme: UpstreamScheme,

    /// Check a running proxy's health endpoint and exit
    #[arg(long = "health-check")]
    pub health_check: bool,
}

impl Cli {
    /// Immutable forwarder configuration.
    pub fn proxy_config(&self) -> Result<ProxyConfig> {
        Ok(ProxyConfig::builder()
            .strip_headers(StripHeaders::from_names(&self.strip)?)
            .service_override(non_empty(self.name.as_deref()))
            .host_override(non_empty(self.host.as_deref()))
            .region_override(non_empty(self.region.as_deref()))
            .upstream_scheme(self.upstream_url_scheme)
            .verbose(self.verbose)
            .log_failed_requests(self.log_failed_requests)
            .log_signing(self.log_signing_process)
            .build())
    }

    /// Upstream transport settings.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::builder()
            .insecure_skip_verify(self.no_verify_ssl)
            .idle_conn_timeout(self.idle_conn_timeout)
            .build()
    }

    /// Address to bind the listener on.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        normalize_listen_addr(&self.port)
    }

    /// Address the health check connects to.
    #[must_use]
    pub fn health_check_addr(&self) -> String {
        self.listen_addr().replace("0.0.0.0", "127.0.0.1")
    }

    /// Role ARN, if one was given.
    #[must_use]
    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `:8080` and `8080` listen on all interfaces; anything else is used as-is.
fn normalize_listen_addr(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(port) = raw.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("0.0.0.0:{raw}")
    } else {
        raw.to_owned()
    }
}

/// Parse `40s`, `500ms`, `2m`, `1h`, `1m30s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".to_owned());
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let invalid = || format!("invalid duration: {raw}");
    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown duration unit '{unit}' in {raw}")),
        };
    }
    Ok(total)
}
