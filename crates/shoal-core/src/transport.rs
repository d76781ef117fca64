//! The HTTP transport seam.
//!
//! The client builds a [`Request`], the signer mutates its headers or query
//! parameters in place, and a [`Transport`] implementation turns it into
//! exactly one network call. Connection pooling, TLS, timeouts, and
//! cancellation all live behind the trait; the core only sees the typed
//! outcome.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};

use crate::error::TransportError;

/// An HTTP request in the shape the signer and transport agree on.
///
/// Header names are stored lowercase so canonicalization, lookups, and the
/// signed-header list all see the same keys. Query parameter names keep
/// their original spelling; their encoding is the canonicalizer's job.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Request authority, e.g. `bucket-host.example.com`.
    pub host: String,
    /// Absolute path, starting with `/`.
    pub path: String,
    /// Query parameters. A name maps to every value sent for it.
    pub query: BTreeMap<String, Vec<String>>,
    /// Headers keyed by lowercase name.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Request body. Empty for bodiless requests.
    pub body: Bytes,
}

impl Request {
    /// Create a bodiless request for the given method, host, and path.
    #[must_use]
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header, replacing any existing values for it.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    /// First value of a header, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Remove a header and all its values.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(&name.to_ascii_lowercase());
    }

    /// Set a query parameter, replacing any existing values for it.
    pub fn set_query(&mut self, name: &str, value: impl Into<String>) {
        self.query.insert(name.to_owned(), vec![value.into()]);
    }

    /// First value of a query parameter, if present.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether a query parameter is present, with or without a value.
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.query.contains_key(name)
    }
}

/// The raw response handed back by the transport.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: StatusCode,
    /// Headers keyed by lowercase name.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Response body, fully read.
    pub body: Bytes,
}

impl Response {
    /// Create a response with the given status and empty body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header, replacing any existing values for it.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    /// First value of a header, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Issues one network call per signed request.
///
/// Implementations must read the body to completion and must surface their
/// own timeout or cancellation as the matching [`TransportError`] variant
/// rather than blocking forever.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send the request and return the raw response.
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}
