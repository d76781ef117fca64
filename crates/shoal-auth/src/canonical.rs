//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is the exact normalized string the signature is
//! computed over:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Every function here is a pure transform over the caller's request
//! description. Nothing is validated semantically; a malformed path or
//! query is canonicalized best effort and left for the service to reject.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters percent-encoded in URI path segments and query strings.
///
/// Everything except the RFC 3986 unreserved set (`A-Z a-z 0-9 - _ . ~`)
/// is encoded. Spaces therefore always become `%20`, never `+`.
const STRICT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string.
///
/// `headers` must already hold every header that will be sent; the signed
/// header list is derived from the same map, so the two always agree.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query: &BTreeMap<String, Vec<String>>,
    headers: &BTreeMap<String, Vec<String>>,
    payload_hash: &str,
) -> String {
    let canonical_uri = canonical_uri(path);
    let canonical_query = canonical_query_string(query);
    let canonical_headers = canonical_headers(headers);
    let signed = signed_headers(headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed}\n{payload_hash}"
    )
}

/// Normalize a request path into its canonical URI form.
///
/// Applies one pass of percent-encoding normalization to each segment
/// (decode, then re-encode, so pre-encoded input is not double-encoded),
/// resolves `.` and `..` segments, collapses duplicate slashes, preserves a
/// trailing slash, and renders an empty path as `/`.
///
/// # Examples
///
/// ```
/// use shoal_auth::canonical::canonical_uri;
///
/// assert_eq!(canonical_uri(""), "/");
/// assert_eq!(canonical_uri("/a/b/../c"), "/a/c");
/// assert_eq!(canonical_uri("/hello world/"), "/hello%20world/");
/// ```
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    let had_trailing_slash = path.ends_with('/');

    let mut resolved: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            segment => {
                let decoded = percent_decode_str(segment).decode_utf8_lossy();
                resolved.push(strict_encode(&decoded));
            }
        }
    }

    if resolved.is_empty() {
        return "/".to_owned();
    }

    let mut canonical = String::from("/");
    canonical.push_str(&resolved.join("/"));
    if had_trailing_slash {
        canonical.push('/');
    }
    canonical
}

/// Build the canonical query string from a multi-valued parameter map.
///
/// Names and values are percent-encoded (space as `%20`), `name=value`
/// pairs for one name are sorted among themselves, and the name groups are
/// ordered by encoded name before everything is joined with `&`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use shoal_auth::canonical::canonical_query_string;
///
/// let mut query = BTreeMap::new();
/// query.insert("b".to_owned(), vec!["2".to_owned()]);
/// query.insert("a".to_owned(), vec!["one two".to_owned()]);
/// assert_eq!(canonical_query_string(&query), "a=one%20two&b=2");
/// ```
#[must_use]
pub fn canonical_query_string(query: &BTreeMap<String, Vec<String>>) -> String {
    let mut groups: Vec<(String, Vec<String>)> = query
        .iter()
        .map(|(name, values)| {
            let encoded_name = strict_encode(name);
            let mut pairs: Vec<String> = values
                .iter()
                .map(|value| format!("{encoded_name}={}", strict_encode(value)))
                .collect();
            pairs.sort_unstable();
            (encoded_name, pairs)
        })
        .collect();

    // The map is ordered by raw name; the wire order is by encoded name.
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    groups
        .into_iter()
        .map(|(_, pairs)| pairs.join("&"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical header block.
///
/// Header names are lowercased, values trimmed of surrounding whitespace,
/// duplicate values sorted and comma-joined, and the resulting
/// `name:value` lines sorted by name and joined with newlines.
#[must_use]
pub fn canonical_headers(headers: &BTreeMap<String, Vec<String>>) -> String {
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, values)| {
            let mut trimmed: Vec<&str> = values.iter().map(|value| value.trim()).collect();
            trimmed.sort_unstable();
            format!("{}:{}", name.to_ascii_lowercase(), trimmed.join(","))
        })
        .collect();

    lines.sort_unstable();
    lines.join("\n")
}

/// Build the signed-header list: every header name, lowercased, sorted,
/// semicolon-joined. Matches the set canonicalized by
/// [`canonical_headers`] exactly.
#[must_use]
pub fn signed_headers(headers: &BTreeMap<String, Vec<String>>) -> String {
    let mut names: Vec<String> = headers
        .keys()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    names.sort_unstable();
    names.join(";")
}

fn strict_encode(input: &str) -> String {
    utf8_percent_encode(input, STRICT_ENCODE_SET).to_string()
}
