//! The signed-request path.
//!
//! Every storage call follows the same route: build a request, sign it
//! (freshly, per attempt — a retried attempt is re-signed with a new
//! timestamp), hand it to the transport, and map a non-2xx response into
//! the typed service error by decoding its XML body.

use std::sync::Arc;

use http::Method;
use tracing::debug;

use shoal_auth::Signer;
use shoal_core::{Request, Response, ServiceError, ShoalError, ShoalResult, Transport};
use shoal_s3_xml::{XmlDeserialize, from_xml, sniff_error};

use crate::config::ClientConfig;

/// A client for one storage endpoint.
///
/// Holds the long-lived pieces: transport, signing context, endpoint host,
/// and configuration. The client itself is immutable; per-request state
/// lives in the request values it builds.
#[derive(Debug)]
pub struct ObjectClient {
    transport: Arc<dyn Transport>,
    signer: Signer,
    host: String,
    config: ClientConfig,
}

impl ObjectClient {
    /// Create a client for the endpoint reachable at `host`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        signer: Signer,
        host: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            signer,
            host: host.into(),
            config,
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A bucket-level request (path-style addressing, trailing slash).
    pub(crate) fn bucket_request(&self, method: Method, bucket: &str) -> Request {
        Request::new(method, self.host.clone(), format!("/{bucket}/"))
    }

    /// An object-level request (path-style addressing).
    pub(crate) fn object_request(&self, method: Method, bucket: &str, key: &str) -> Request {
        Request::new(method, self.host.clone(), format!("/{bucket}/{key}"))
    }

    /// Sign and send exactly one attempt.
    ///
    /// A non-2xx response is decoded into a [`ServiceError`]; retrying, if
    /// any, happens one level up by building and re-signing a fresh
    /// request.
    pub(crate) async fn round_trip(
        &self,
        mut request: Request,
        payload_hash: Option<&str>,
    ) -> ShoalResult<Response> {
        self.signer.sign(&mut request, payload_hash);
        let response = self.transport.execute(request).await?;

        if response.status.is_success() {
            return Ok(response);
        }
        Err(error_from_response(&response))
    }

    /// Run `build` + [`round_trip`](Self::round_trip) under the configured
    /// attempt budget.
    ///
    /// Each attempt either returns a result, returns a terminal error, or
    /// spends budget on a retry; once the budget is exhausted the last
    /// observed error is returned.
    pub(crate) async fn execute_with_retry(
        &self,
        build: impl Fn() -> Request,
        payload_hash: Option<&str>,
    ) -> ShoalResult<Response> {
        let mut budget = self.config.retry.begin();
        loop {
            match self.round_trip(build(), payload_hash).await {
                Ok(response) => return Ok(response),
                Err(err) if self.config.classifier.is_retryable(&err) && budget.try_consume() => {
                    debug!(error = %err, "retrying request");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Decode an XML response body, mapping codec failures to [`ShoalError`].
pub(crate) fn decode_body<T: XmlDeserialize>(body: &[u8]) -> ShoalResult<T> {
    from_xml(body).map_err(|err| ShoalError::Decode(err.to_string()))
}

/// Wrap a decoded error document in the typed service error.
pub(crate) fn error_from_document(
    status: http::StatusCode,
    detail: shoal_s3_xml::ErrorResponse,
) -> ShoalError {
    ShoalError::Service(ServiceError {
        status,
        code: detail.code,
        message: detail.message,
        request_id: detail.request_id,
    })
}

/// Map a non-2xx response to the typed service error.
fn error_from_response(response: &Response) -> ShoalError {
    match sniff_error(&response.body) {
        Some(detail) => error_from_document(response.status, detail),
        None => ShoalError::Service(ServiceError {
            status: response.status,
            code: "UnknownError".to_owned(),
            message: format!(
                "service returned status {} with no error document",
                response.status
            ),
            request_id: None,
        }),
    }
}
