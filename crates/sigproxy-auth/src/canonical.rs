//! SigV4 canonical request.
//!
//! A canonical request is six lines: method, canonical URI, canonical query,
//! the canonical header block (followed by a blank line), the signed header
//! list and the payload hash. The query normalization here is also what the
//! forwarder writes onto the outgoing URL.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, percent_encode};

/// Everything outside the RFC 3986 unreserved set.
const UNRESERVED_COMPLEMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// How the request path is turned into the canonical URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UriEncoding {
    /// Encode each path segment of the (already escaped) path once more.
    ///
    /// Every service except S3 expects this.
    #[default]
    Double,
    /// Use the escaped path exactly as sent. Only S3 signs this way.
    Single,
}

impl UriEncoding {
    /// Pick the encoding mode for a signing service name.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigproxy_auth::canonical::UriEncoding;
    ///
    /// assert_eq!(UriEncoding::for_service("s3"), UriEncoding::Single);
    /// assert_eq!(UriEncoding::for_service("aoss"), UriEncoding::Double);
    /// ```
    #[must_use]
    pub fn for_service(service: &str) -> Self {
        if service == "s3" {
            Self::Single
        } else {
            Self::Double
        }
    }
}

/// Assemble the canonical request for an outgoing request.
///
/// `headers` may contain more than what is signed; only names listed in
/// `signed_headers` enter the header block.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::canonical::{UriEncoding, build_canonical_request};
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/test.txt",
///     "",
///     &[("host", "examplebucket.s3.amazonaws.com")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
///     UriEncoding::Single,
/// );
/// assert!(canonical.starts_with("GET\n/test.txt\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
    encoding: UriEncoding,
) -> String {
    [
        method.to_owned(),
        build_canonical_uri(uri, encoding),
        build_canonical_query_string(query_string),
        build_canonical_headers(headers, signed_headers) + "\n",
        build_signed_headers_string(signed_headers),
        payload_hash.to_owned(),
    ]
    .join("\n")
}

/// Build the canonical URI from the escaped request path.
///
/// Empty paths are normalized to `/`. With [`UriEncoding::Double`] each segment
/// of the escaped path is URI-encoded again, so `%20` becomes `%2520`; forward
/// slashes are preserved.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::canonical::{UriEncoding, build_canonical_uri};
///
/// assert_eq!(build_canonical_uri("/test.txt", UriEncoding::Single), "/test.txt");
/// assert_eq!(build_canonical_uri("", UriEncoding::Double), "/");
/// assert_eq!(build_canonical_uri("/a%20b", UriEncoding::Double), "/a%2520b");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str, encoding: UriEncoding) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    match encoding {
        UriEncoding::Single => path.to_owned(),
        UriEncoding::Double => path
            .split('/')
            .map(|segment| percent_encode(segment.as_bytes(), UNRESERVED_COMPLEMENT).to_string())
            .collect::<Vec<_>>()
            .join("/"),
    }
}

/// Build the canonical query string.
///
/// Each key and value is percent-decoded (with `+` read as a space), re-encoded
/// with the unreserved character set, and the pairs are sorted by key and then
/// by value. Parameters without `=` get an empty value. The operation is
/// idempotent: applying it to its own output yields the same string.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(build_canonical_query_string("q=a+b:c"), "q=a%20b%3Ac");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            (normalize_query_component(key), normalize_query_component(value))
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// `name:value` lines for the signed headers, sorted by lowercase name.
///
/// Values are trimmed and inner whitespace runs become one space. Repeated
/// headers are joined with `,` in arrival order. No trailing newline.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::canonical::build_canonical_headers;
///
/// let headers = [("Host", "example.com"), ("X-Amz-Date", "20130524T000000Z")];
/// let result = build_canonical_headers(&headers, &["host", "x-amz-date"]);
/// assert_eq!(result, "host:example.com\nx-amz-date:20130524T000000Z");
/// ```
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if signed_headers.contains(&name.as_str()) {
            values.entry(name).or_default().push(collapse_whitespace(value));
        }
    }

    values
        .into_iter()
        .map(|(name, vals)| format!("{name}:{}", vals.join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sorted, `;`-joined signed header names.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Decode one query key or value and re-encode it with the unreserved set.
fn normalize_query_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded: Vec<u8> = percent_decode(spaced.as_bytes()).collect();
    percent_encode(&decoded, UNRESERVED_COMPLEMENT).to_string()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
