//! The multipart-upload state machine.
//!
//! A session moves *Uninitiated → Active → Completed | Aborted* and never
//! leaves a terminal state. The [`MultipartUpload`] handle is immutable
//! once constructed — its identity is the `(bucket, key, upload id)`
//! triple — so uploading different parts of one session concurrently needs
//! no internal locking: every part is addressed solely by its own sequence
//! number, and all mutable state lives in the caller-owned [`Part`] values.
//!
//! Every operation wraps its network call in the configured attempt
//! budget. Part collections are re-sorted at the boundaries: `list_parts`
//! sorts what the service returned, `complete` sorts what the caller
//! supplied.

use std::io::{Read, Seek};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::Method;
use tracing::debug;

use shoal_auth::{md5_base64, sha256_hex};
use shoal_core::{Page, ShoalError, ShoalResult, collect_pages};
use shoal_s3_xml::{
    CompleteMultipartUpload, InitiateMultipartUploadResult, ListMultipartUploadsResult,
    ListPartsResult, Part, sniff_error, to_xml,
};

use crate::client::{ObjectClient, decode_body, error_from_document};

/// Canned access-control settings applied when a session is initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    /// Owner-only access.
    Private,
    /// World-readable.
    PublicRead,
    /// World-readable and writable.
    PublicReadWrite,
    /// Readable by any authenticated caller.
    AuthenticatedRead,
    /// Bucket owner may read the object.
    BucketOwnerRead,
    /// Bucket owner has full control of the object.
    BucketOwnerFullControl,
}

impl Acl {
    /// The `x-amz-acl` header value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// A handle on one in-progress multipart upload session.
///
/// Obtained from [`ObjectClient::initiate_multipart_upload`],
/// [`ObjectClient::find_or_create_upload`], or discovery via
/// [`ObjectClient::list_multipart_uploads`]. The storage service is the
/// authority for the session's existence; the handle stays valid until a
/// successful [`complete`](Self::complete) or [`abort`](Self::abort)
/// retires the session server-side.
#[derive(Debug)]
pub struct MultipartUpload<'a> {
    client: &'a ObjectClient,
    bucket: String,
    key: String,
    upload_id: String,
    initiated: Option<DateTime<Utc>>,
}

impl ObjectClient {
    /// List the in-progress multipart uploads in `bucket`.
    ///
    /// `prefix` limits the result to keys that begin with it; a non-empty
    /// `delimiter` groups keys sharing a prefix up to the next delimiter
    /// into the returned common-prefix list. Truncated responses are
    /// followed until the listing is complete.
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> ShoalResult<(Vec<MultipartUpload<'_>>, Vec<String>)> {
        let config = self.config();
        let max_uploads = config.max_uploads_per_page.to_string();
        let max_uploads = max_uploads.as_str();

        let chunks = collect_pages(
            config.retry.as_ref(),
            config.classifier.as_ref(),
            |marker: Option<(String, String)>| {
                Box::pin(async move {
                    let mut request = self.bucket_request(Method::GET, bucket);
                    request.set_query("uploads", "");
                    request.set_query("max-uploads", max_uploads);
                    request.set_query("prefix", prefix);
                    request.set_query("delimiter", delimiter);
                    if let Some((key_marker, upload_id_marker)) = marker {
                        request.set_query("key-marker", key_marker);
                        request.set_query("upload-id-marker", upload_id_marker);
                    }

                    let response = self.round_trip(request, None).await?;
                    let page: ListMultipartUploadsResult = decode_body(&response.body)?;
                    let next_marker = page.is_truncated.then(|| {
                        (
                            page.next_key_marker.clone().unwrap_or_default(),
                            page.next_upload_id_marker.clone().unwrap_or_default(),
                        )
                    });
                    Ok(Page {
                        // Uploads and common prefixes travel together, one
                        // chunk per page.
                        items: vec![(page.uploads, page.common_prefixes)],
                        next_marker,
                        is_truncated: page.is_truncated,
                    })
                })
            },
        )
        .await?;

        let mut uploads = Vec::new();
        let mut prefixes = Vec::new();
        for (page_uploads, page_prefixes) in chunks {
            for summary in page_uploads {
                uploads.push(MultipartUpload {
                    client: self,
                    bucket: bucket.to_owned(),
                    key: summary.key,
                    upload_id: summary.upload_id,
                    initiated: summary.initiated,
                });
            }
            prefixes.extend(page_prefixes);
        }

        debug!(bucket, uploads = uploads.len(), "listed multipart uploads");
        Ok((uploads, prefixes))
    }

    /// Return a handle for the session targeting `key`: the in-progress
    /// session when one exists, a freshly initiated one otherwise.
    ///
    /// A "no such upload" answer from the listing call means zero sessions
    /// exist; it is folded into the empty result and initiation proceeds
    /// instead of surfacing the absence as a failure.
    pub async fn find_or_create_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        acl: Acl,
    ) -> ShoalResult<MultipartUpload<'_>> {
        let uploads = match self.list_multipart_uploads(bucket, key, "").await {
            Ok((uploads, _prefixes)) => uploads,
            Err(err) if self.config().classifier.is_no_such_upload(&err) => Vec::new(),
            Err(err) => return Err(err),
        };

        for upload in uploads {
            if upload.key == key {
                debug!(
                    bucket,
                    key,
                    upload_id = %upload.upload_id,
                    "adopted in-progress multipart upload"
                );
                return Ok(upload);
            }
        }

        self.initiate_multipart_upload(bucket, key, content_type, acl).await
    }

    /// Initiate a new multipart upload session at `key`.
    pub async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        acl: Acl,
    ) -> ShoalResult<MultipartUpload<'_>> {
        let response = self
            .execute_with_retry(
                || {
                    let mut request = self.object_request(Method::POST, bucket, key);
                    request.set_query("uploads", "");
                    request.set_header("content-type", content_type);
                    request.set_header("content-length", "0");
                    request.set_header("x-amz-acl", acl.as_str());
                    request
                },
                None,
            )
            .await?;

        let result: InitiateMultipartUploadResult = decode_body(&response.body)?;
        debug!(
            bucket,
            key,
            upload_id = %result.upload_id,
            "initiated multipart upload"
        );

        Ok(MultipartUpload {
            client: self,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id: result.upload_id,
            initiated: None,
        })
    }
}

impl MultipartUpload<'_> {
    /// The bucket holding this session.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key this session targets.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The opaque session token issued by the service.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// When the session was initiated, if it was discovered via listing.
    #[must_use]
    pub fn initiated(&self) -> Option<DateTime<Utc>> {
        self.initiated
    }

    /// Upload part `number` from `payload`.
    ///
    /// The payload source is rewound to its beginning before every
    /// attempt, so a retry replays exactly the bytes an earlier attempt
    /// may have partially consumed; a failed rewind aborts the operation
    /// without issuing a network call. `md5_b64` travels as the
    /// `Content-MD5` header and `sha256_hex` is signed as the payload
    /// hash.
    ///
    /// Parts other than the last must meet the service's minimum part
    /// size. A success response without an `ETag` is itself a failure,
    /// raised without retry.
    pub async fn upload_part<R: Read + Seek>(
        &self,
        number: u32,
        payload: &mut R,
        size: u64,
        md5_b64: &str,
        sha256_hex: &str,
    ) -> ShoalResult<Part> {
        let mut budget = self.client.config().retry.begin();
        loop {
            payload.rewind().map_err(ShoalError::Payload)?;
            let mut body = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
            payload
                .by_ref()
                .take(size)
                .read_to_end(&mut body)
                .map_err(ShoalError::Payload)?;

            let mut request = self
                .client
                .object_request(Method::PUT, &self.bucket, &self.key);
            request.set_query("uploadId", self.upload_id.as_str());
            request.set_query("partNumber", number.to_string());
            request.set_header("content-length", size.to_string());
            request.set_header("content-md5", md5_b64);
            request.body = Bytes::from(body);

            match self.client.round_trip(request, Some(sha256_hex)).await {
                Ok(response) => {
                    let etag = response.header("etag").unwrap_or_default();
                    if etag.is_empty() {
                        return Err(ShoalError::MissingEtag {
                            part_number: number,
                        });
                    }
                    debug!(
                        bucket = %self.bucket,
                        key = %self.key,
                        upload_id = %self.upload_id,
                        part_number = number,
                        size,
                        "uploaded part"
                    );
                    return Ok(Part {
                        number,
                        etag: etag.to_owned(),
                        size,
                    });
                }
                Err(err)
                    if self.client.config().classifier.is_retryable(&err)
                        && budget.try_consume() =>
                {
                    debug!(part_number = number, error = %err, "retrying part upload");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// List the parts uploaded so far, ascending by sequence number.
    ///
    /// Pages are fetched until the service reports the listing complete,
    /// and the aggregate is sorted regardless of the order the service
    /// returned parts within or across pages.
    pub async fn list_parts(&self) -> ShoalResult<Vec<Part>> {
        let config = self.client.config();
        let max_parts = config.max_parts_per_page.to_string();
        let max_parts = max_parts.as_str();

        let mut parts = collect_pages(
            config.retry.as_ref(),
            config.classifier.as_ref(),
            |marker: Option<String>| {
                Box::pin(async move {
                    let mut request = self
                        .client
                        .object_request(Method::GET, &self.bucket, &self.key);
                    request.set_query("uploadId", self.upload_id.as_str());
                    request.set_query("max-parts", max_parts);
                    if let Some(marker) = marker {
                        request.set_query("part-number-marker", marker);
                    }

                    let response = self.client.round_trip(request, None).await?;
                    let page: ListPartsResult = decode_body(&response.body)?;
                    Ok(Page {
                        items: page.parts,
                        next_marker: page.next_part_number_marker,
                        is_truncated: page.is_truncated,
                    })
                })
            },
        )
        .await?;

        parts.sort_by_key(|part| part.number);
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %self.upload_id,
            parts = parts.len(),
            "listed parts"
        );
        Ok(parts)
    }

    /// Assemble the uploaded parts into the final object.
    ///
    /// The manifest is sorted ascending by sequence number whatever order
    /// `parts` arrives in. Server-side assembly can take much longer than
    /// a normal request, and the service may answer 200 and still report a
    /// failure in the body — the body is parsed and such an error is
    /// surfaced (and retried when transient) rather than swallowed. The
    /// session is Completed only once the body confirms success.
    pub async fn complete(&self, parts: &[Part]) -> ShoalResult<()> {
        let manifest = CompleteMultipartUpload::from_parts(parts);
        let body = to_xml("CompleteMultipartUpload", &manifest)
            .map_err(|err| ShoalError::Encode(err.to_string()))?;
        let body = Bytes::from(body);
        let payload_hash = sha256_hex(&body);
        let content_md5 = md5_base64(&body);

        let mut budget = self.client.config().retry.begin();
        loop {
            let mut request = self
                .client
                .object_request(Method::POST, &self.bucket, &self.key);
            request.set_query("uploadId", self.upload_id.as_str());
            request.set_header("content-length", body.len().to_string());
            request.set_header("content-md5", content_md5.as_str());
            request.body = body.clone();

            let outcome = match self.client.round_trip(request, Some(&payload_hash)).await {
                Ok(response) => match sniff_error(&response.body) {
                    // Assembly failed after the status line; the body is
                    // authoritative.
                    Some(detail) => Err(error_from_document(response.status, detail)),
                    None => Ok(()),
                },
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => {
                    debug!(
                        bucket = %self.bucket,
                        key = %self.key,
                        upload_id = %self.upload_id,
                        parts = manifest.parts.len(),
                        "completed multipart upload"
                    );
                    return Ok(());
                }
                Err(err)
                    if self.client.config().classifier.is_retryable(&err)
                        && budget.try_consume() =>
                {
                    debug!(error = %err, "retrying multipart completion");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Request deletion of the session and its uploaded parts.
    ///
    /// Best effort: parts uploaded concurrently with the abort may survive
    /// it, in which case a repeat abort is needed to reclaim all storage.
    /// The service does not guarantee idempotency — a repeat abort may
    /// answer success or "no such upload", and either is a legitimate
    /// outcome. Any non-error response retires the session on this side.
    pub async fn abort(&self) -> ShoalResult<()> {
        self.client
            .execute_with_retry(
                || {
                    let mut request = self
                        .client
                        .object_request(Method::DELETE, &self.bucket, &self.key);
                    request.set_query("uploadId", self.upload_id.as_str());
                    request
                },
                None,
            )
            .await?;

        debug!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %self.upload_id,
            "aborted multipart upload"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, SeekFrom};

    use super::*;
    use crate::testing::{
        INIT_RESULT, INTERNAL_ERROR, LIST_PARTS_PAGE_1, LIST_PARTS_PAGE_2, LIST_UPLOADS_RESULT,
        MockTransport, NO_SUCH_UPLOAD, TEST_UPLOAD_ID, test_client,
    };

    fn test_upload(client: &ObjectClient) -> MultipartUpload<'_> {
        MultipartUpload {
            client,
            bucket: "sample".to_owned(),
            key: "multi".to_owned(),
            upload_id: TEST_UPLOAD_ID.to_owned(),
            initiated: None,
        }
    }

    #[tokio::test]
    async fn test_should_initiate_multipart_upload() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], INIT_RESULT);
        let client = test_client(&transport, 1);

        let upload = client
            .initiate_multipart_upload("sample", "multi", "text/plain", Acl::Private)
            .await
            .unwrap();

        assert_eq!(upload.bucket(), "sample");
        assert_eq!(upload.key(), "multi");
        assert_eq!(upload.upload_id(), TEST_UPLOAD_ID);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/sample/multi");
        assert!(requests[0].has_query("uploads"));
        assert_eq!(requests[0].header("content-type"), Some("text/plain"));
        assert_eq!(requests[0].header("x-amz-acl"), Some("private"));
    }

    #[tokio::test]
    async fn test_should_list_multipart_uploads_with_common_prefixes() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], LIST_UPLOADS_RESULT);
        let client = test_client(&transport, 1);

        let (uploads, prefixes) = client
            .list_multipart_uploads("sample", "", "/")
            .await
            .unwrap();

        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].key(), "multi1");
        assert_eq!(uploads[0].upload_id(), "iUVug89pPvSswrikD");
        assert!(uploads[0].initiated().is_some());
        assert_eq!(uploads[1].key(), "multi2");
        assert_eq!(prefixes, vec!["a/", "b/"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path, "/sample/");
        assert!(requests[0].has_query("uploads"));
        assert_eq!(requests[0].query_value("max-uploads"), Some("1000"));
        assert_eq!(requests[0].query_value("prefix"), Some(""));
        assert_eq!(requests[0].query_value("delimiter"), Some("/"));
    }

    #[tokio::test]
    async fn test_should_follow_upload_listing_markers_across_pages() {
        let page_1 = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListMultipartUploadsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <NextKeyMarker>multi1</NextKeyMarker>
  <NextUploadIdMarker>iUVug89pPvSswrikD</NextUploadIdMarker>
  <IsTruncated>true</IsTruncated>
  <Upload>
    <Key>multi1</Key>
    <UploadId>iUVug89pPvSswrikD</UploadId>
  </Upload>
</ListMultipartUploadsResult>"#;
        let page_2 = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListMultipartUploadsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <IsTruncated>false</IsTruncated>
  <Upload>
    <Key>multi2</Key>
    <UploadId>DkirwsSvPp98guVUi</UploadId>
  </Upload>
</ListMultipartUploadsResult>"#;

        let transport = MockTransport::new();
        transport.push_response(200, &[], page_1);
        transport.push_response(200, &[], page_2);
        let client = test_client(&transport, 1);

        let (uploads, _prefixes) = client
            .list_multipart_uploads("sample", "", "")
            .await
            .unwrap();

        assert_eq!(uploads.len(), 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].has_query("key-marker"));
        assert_eq!(requests[1].query_value("key-marker"), Some("multi1"));
        assert_eq!(
            requests[1].query_value("upload-id-marker"),
            Some("iUVug89pPvSswrikD")
        );
    }

    #[tokio::test]
    async fn test_should_initiate_when_listing_reports_no_such_upload() {
        // Single-attempt budget: the 404 must not be consumed by retries.
        let transport = MockTransport::new();
        transport.push_response(404, &[], NO_SUCH_UPLOAD);
        transport.push_response(200, &[], INIT_RESULT);
        let client = test_client(&transport, 1);

        let upload = client
            .find_or_create_upload("sample", "multi", "text/plain", Acl::Private)
            .await
            .unwrap();

        assert_eq!(upload.upload_id(), TEST_UPLOAD_ID);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path, "/sample/");
        assert_eq!(requests[0].query_value("prefix"), Some("multi"));
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "/sample/multi");
    }

    #[tokio::test]
    async fn test_should_adopt_existing_upload_instead_of_initiating() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], LIST_UPLOADS_RESULT);
        let client = test_client(&transport, 1);

        let upload = client
            .find_or_create_upload("sample", "multi1", "text/plain", Acl::Private)
            .await
            .unwrap();

        assert_eq!(upload.key(), "multi1");
        assert_eq!(upload.upload_id(), "iUVug89pPvSswrikD");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_should_upload_part_with_integrity_headers() {
        let transport = MockTransport::new();
        transport.push_response(
            200,
            &[("ETag", "\"26f90efd10d614f100252ff56d88dad8\"")],
            "",
        );
        let client = test_client(&transport, 1);
        let upload = test_upload(&client);

        let payload = b"<part 1>";
        let mut source = Cursor::new(payload.to_vec());
        let part = upload
            .upload_part(
                1,
                &mut source,
                payload.len() as u64,
                &md5_base64(payload),
                &sha256_hex(payload),
            )
            .await
            .unwrap();

        assert_eq!(part.number, 1);
        assert_eq!(part.size, 8);
        assert_eq!(part.etag, "\"26f90efd10d614f100252ff56d88dad8\"");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].path, "/sample/multi");
        assert_eq!(requests[0].query_value("partNumber"), Some("1"));
        assert_eq!(requests[0].query_value("uploadId"), Some(TEST_UPLOAD_ID));
        assert_eq!(requests[0].header("content-length"), Some("8"));
        assert_eq!(
            requests[0].header("content-md5"),
            Some("JvkO/RDWFPEAJS/1bYja2A==")
        );
        assert_eq!(
            requests[0].header("x-amz-content-sha256"),
            Some(sha256_hex(payload).as_str())
        );
        assert_eq!(requests[0].body.as_ref(), payload);
    }

    #[tokio::test]
    async fn test_should_fail_part_upload_without_etag() {
        // Generous budget: the missing tag must fail without retrying.
        let transport = MockTransport::new();
        transport.push_response(200, &[], "");
        let client = test_client(&transport, 3);
        let upload = test_upload(&client);

        let payload = b"<part 1>";
        let mut source = Cursor::new(payload.to_vec());
        let err = upload
            .upload_part(
                1,
                &mut source,
                payload.len() as u64,
                &md5_base64(payload),
                &sha256_hex(payload),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShoalError::MissingEtag { part_number: 1 }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_should_rewind_payload_before_each_attempt() {
        let transport = MockTransport::new();
        transport.push_response(500, &[], "");
        transport.push_response(200, &[("ETag", "\"abc\"")], "");
        let client = test_client(&transport, 2);
        let upload = test_upload(&client);

        let payload = b"<part 1>";
        let mut source = Cursor::new(payload.to_vec());
        let part = upload
            .upload_part(
                1,
                &mut source,
                payload.len() as u64,
                &md5_base64(payload),
                &sha256_hex(payload),
            )
            .await
            .unwrap();

        assert_eq!(part.etag, "\"abc\"");

        // The retried attempt replayed the full payload, not the leftover
        // of a consumed stream.
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body.as_ref(), payload);
        assert_eq!(requests[1].body.as_ref(), payload);
    }

    #[tokio::test]
    async fn test_should_fail_before_any_network_attempt_when_rewind_fails() {
        struct BrokenSeek;

        impl Read for BrokenSeek {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Ok(0)
            }
        }

        impl Seek for BrokenSeek {
            fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
                Err(std::io::Error::other("seek failed"))
            }
        }

        let transport = MockTransport::new();
        let client = test_client(&transport, 3);
        let upload = test_upload(&client);

        let err = upload
            .upload_part(1, &mut BrokenSeek, 8, "md5", "sha256")
            .await
            .unwrap_err();

        assert!(matches!(err, ShoalError::Payload(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_should_merge_part_pages_across_transient_failure() {
        // Page 1, then a transient absence while the session settles, then
        // page 2 on retry.
        let transport = MockTransport::new();
        transport.push_response(200, &[], LIST_PARTS_PAGE_1);
        transport.push_response(404, &[], NO_SUCH_UPLOAD);
        transport.push_response(200, &[], LIST_PARTS_PAGE_2);
        let client = test_client(&transport, 2);
        let upload = test_upload(&client);

        let parts = upload.list_parts().await.unwrap();

        let numbers: Vec<u32> = parts.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(parts[0].etag, "\"ffc88b4ca90a355f8ddba6b2c3b2af5c\"");
        assert_eq!(parts[2].etag, "\"49dcd91231f801159e893fb5c6674985\"");

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].query_value("max-parts"), Some("1000"));
        assert!(!requests[0].has_query("part-number-marker"));
        // Only the in-flight page is re-fetched.
        assert_eq!(requests[1].query_value("part-number-marker"), Some("2"));
        assert_eq!(requests[2].query_value("part-number-marker"), Some("2"));
    }

    #[tokio::test]
    async fn test_should_complete_with_manifest_sorted_by_part_number() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], "");
        let client = test_client(&transport, 1);
        let upload = test_upload(&client);

        let parts = vec![
            Part {
                number: 2,
                etag: "\"ETag2\"".to_owned(),
                size: 32,
            },
            Part {
                number: 1,
                etag: "\"ETag1\"".to_owned(),
                size: 64,
            },
        ];
        upload.complete(&parts).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/sample/multi");
        assert_eq!(requests[0].query_value("uploadId"), Some(TEST_UPLOAD_ID));

        let body = String::from_utf8(requests[0].body.to_vec()).unwrap();
        let first = body.find("<PartNumber>1</PartNumber>").unwrap();
        let second = body.find("<PartNumber>2</PartNumber>").unwrap();
        assert!(first < second);
        assert!(body.contains("CompleteMultipartUpload"));
    }

    #[tokio::test]
    async fn test_should_retry_completion_when_success_body_encodes_error() {
        // Assembly holds the connection and can fail after a 200 status
        // line; the error in the body must be seen and retried.
        let transport = MockTransport::new();
        transport.push_response(200, &[], INTERNAL_ERROR);
        transport.push_response(200, &[], "");
        let client = test_client(&transport, 2);
        let upload = test_upload(&client);

        let parts = vec![Part {
            number: 1,
            etag: "\"ETag1\"".to_owned(),
            size: 64,
        }];
        upload.complete(&parts).await.unwrap();

        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_should_surface_error_body_when_budget_exhausted() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], INTERNAL_ERROR);
        let client = test_client(&transport, 1);
        let upload = test_upload(&client);

        let err = upload
            .complete(&[Part {
                number: 1,
                etag: "\"ETag1\"".to_owned(),
                size: 64,
            }])
            .await
            .unwrap_err();

        assert!(err.is_code("InternalError"));
    }

    #[tokio::test]
    async fn test_should_abort_upload() {
        let transport = MockTransport::new();
        transport.push_response(200, &[], "");
        let client = test_client(&transport, 1);
        let upload = test_upload(&client);

        upload.abort().await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::DELETE);
        assert_eq!(requests[0].path, "/sample/multi");
        assert_eq!(requests[0].query_value("uploadId"), Some(TEST_UPLOAD_ID));
    }

    #[tokio::test]
    async fn test_should_accept_either_outcome_of_repeat_abort() {
        // Abort is not idempotent service-side: a repeat abort may answer
        // success or report the session already gone. Both are legitimate.
        let transport = MockTransport::new();
        transport.push_response(200, &[], "");
        transport.push_response(404, &[], NO_SUCH_UPLOAD);
        let client = test_client(&transport, 1);
        let upload = test_upload(&client);

        upload.abort().await.unwrap();

        let repeat = upload.abort().await;
        match repeat {
            Ok(()) => {}
            Err(err) => assert!(err.is_code("NoSuchUpload")),
        }
    }

    #[tokio::test]
    async fn test_should_surface_last_part_upload_error_when_budget_exhausted() {
        let transport = MockTransport::new();
        transport.push_response(500, &[], "");
        transport.push_response(503, &[], "");
        let client = test_client(&transport, 2);
        let upload = test_upload(&client);

        let payload = b"bytes";
        let mut source = Cursor::new(payload.to_vec());
        let err = upload
            .upload_part(
                3,
                &mut source,
                payload.len() as u64,
                &md5_base64(payload),
                &sha256_hex(payload),
            )
            .await
            .unwrap_err();

        match err {
            ShoalError::Service(detail) => {
                assert_eq!(detail.status, http::StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("expected service error, got {other:?}"),
        }
        assert_eq!(transport.request_count(), 2);
    }
}
