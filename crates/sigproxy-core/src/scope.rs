//! Signing scope resolution.
//!
//! Every forwarded request is signed for a `(host, region, service)` triple.
//! Explicit overrides always win; anything not overridden is inferred from the
//! destination host using the standard AWS endpoint naming convention.

use std::sync::LazyLock;

use regex::Regex;
use sigproxy_auth::canonical::UriEncoding;
use tracing::debug;

use crate::error::ProxyError;

/// Matches an AWS region name such as `us-east-1`, `us-gov-west-1` or `cn-north-1`.
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-\d+$").expect("region regex is valid")
});

/// Partition domains and whether they belong to the China partition.
const PARTITION_DOMAINS: [(&str, bool); 3] = [
    (".amazonaws.com.cn", true),
    (".amazonaws.com", false),
    (".api.aws", false),
];

/// Services whose endpoints carry the region before the service label.
const REGION_FIRST_SERVICES: [&str; 2] = ["es", "aoss"];

/// Services reachable through a region-less global endpoint.
const GLOBAL_SERVICES: [&str; 5] = ["iam", "sts", "s3", "route53", "cloudfront"];

/// The resolved destination and signing scope of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    /// Host the request is sent to (may include a port).
    pub host: String,
    /// Signing region.
    pub region: String,
    /// Signing service name.
    pub service: String,
}

impl SigningScope {
    /// Canonical URI encoding used for this scope's service.
    #[must_use]
    pub fn uri_encoding(&self) -> UriEncoding {
        UriEncoding::for_service(&self.service)
    }
}

/// Explicitly configured scope components.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeOverrides<'a> {
    /// Destination host override.
    pub host: Option<&'a str>,
    /// Signing region override.
    pub region: Option<&'a str>,
    /// Signing service override.
    pub service: Option<&'a str>,
}

/// Region and service inferred from an endpoint host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredScope {
    /// Signing region.
    pub region: String,
    /// Signing service name.
    pub service: String,
}

/// Resolve the signing scope of a request.
///
/// The host is the override if set, else `original_host`. Region and service
/// overrides are used as-is; inference is only consulted for components that
/// are not overridden.
///
/// # Examples
///
/// ```
/// use sigproxy_core::{ScopeOverrides, resolve_scope};
///
/// let scope = resolve_scope(
///     Some("search-logs.us-west-2.es.amazonaws.com"),
///     &ScopeOverrides::default(),
/// )
/// .unwrap();
/// assert_eq!(scope.region, "us-west-2");
/// assert_eq!(scope.service, "es");
/// ```
pub fn resolve_scope(
    original_host: Option<&str>,
    overrides: &ScopeOverrides<'_>,
) -> Result<SigningScope, ProxyError> {
    let host = overrides
        .host
        .or(original_host)
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingHost)?;

    let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_owned);
    let mut region = non_empty(overrides.region);
    let mut service = non_empty(overrides.service);

    if region.is_none() || service.is_none() {
        if let Some(inferred) = infer_scope(host) {
            debug!(
                %host,
                region = %inferred.region,
                service = %inferred.service,
                "Inferred signing scope from host"
            );
            region = region.or(Some(inferred.region));
            service = service.or(Some(inferred.service));
        }
    }

    let region = region.ok_or_else(|| ProxyError::UnresolvableScope {
        host: host.to_owned(),
        missing: "region",
    })?;
    let service = service.ok_or_else(|| ProxyError::UnresolvableScope {
        host: host.to_owned(),
        missing: "service",
    })?;

    Ok(SigningScope {
        host: host.to_owned(),
        region,
        service,
    })
}

/// Infer region and service from an AWS endpoint host.
///
/// Returns `None` for hosts outside the known partition domains or whose
/// labels do not follow a recognized shape.
#[must_use]
pub fn infer_scope(host: &str) -> Option<InferredScope> {
    let host = strip_port(host)?.to_ascii_lowercase();

    let (prefix, china) = PARTITION_DOMAINS
        .iter()
        .find_map(|(domain, china)| host.strip_suffix(domain).map(|p| (p, *china)))?;
    let labels: Vec<&str> = prefix.split('.').filter(|l| !l.is_empty()).collect();
    let last = *labels.last()?;

    // s3-us-west-2.amazonaws.com
    if let Some(rest) = last.strip_prefix("s3-") {
        if REGION_RE.is_match(rest) {
            return Some(inferred(rest, "s3"));
        }
        if rest == "external-1" {
            return Some(inferred("us-east-1", "s3"));
        }
    }

    // sqs.us-east-1, abc.execute-api.eu-west-1, bucket.s3.dualstack.us-west-2
    if REGION_RE.is_match(last) && labels.len() >= 2 {
        let mut service = labels[labels.len() - 2];
        if service == "dualstack" && labels.len() >= 3 {
            service = labels[labels.len() - 3];
        }
        return Some(inferred(last, &normalize_service(service)));
    }

    // search-x.us-west-2.es, abc.us-east-1.aoss
    if labels.len() >= 2 {
        let region = labels[labels.len() - 2];
        let service = normalize_service(last);
        if REGION_RE.is_match(region) && REGION_FIRST_SERVICES.contains(&service.as_str()) {
            return Some(inferred(region, &service));
        }
    }

    // iam.amazonaws.com, bucket.s3.amazonaws.com
    let service = normalize_service(last);
    if GLOBAL_SERVICES.contains(&service.as_str()) {
        let region = if china { "cn-north-1" } else { "us-east-1" };
        return Some(inferred(region, &service));
    }

    None
}

fn inferred(region: &str, service: &str) -> InferredScope {
    InferredScope {
        region: region.to_owned(),
        service: service.to_owned(),
    }
}

/// Map an endpoint label to its signing name.
fn normalize_service(label: &str) -> String {
    let label = label.strip_suffix("-fips").unwrap_or(label);
    match label {
        "email" => "ses".to_owned(),
        other => other.to_owned(),
    }
}

/// Drop a trailing `:port`. Bracketed IPv6 literals are never AWS endpoints.
fn strip_port(host: &str) -> Option<&str> {
    if host.starts_with('[') {
        return None;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => Some(name),
        Some(_) => None,
        None => Some(host),
    }
}
