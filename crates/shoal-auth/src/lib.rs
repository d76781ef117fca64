//! AWS Signature Version 4 request signing.
//!
//! The signing pipeline has three layers, leaf to root:
//!
//! - [`hash`] — the digest primitives (MD5, SHA-256, HMAC-SHA256) shared by
//!   signing and payload-integrity headers.
//! - [`canonical`] — pure functions that normalize a request into the exact
//!   byte form the signature is computed over.
//! - [`signer`] — one signing pass per request: timestamp resolution, key
//!   derivation, and attachment of either an `Authorization` header or
//!   pre-signed query parameters.
//!
//! A [`CanonicalRequest`](canonical) is derived fresh for every request and
//! never cached; the long-lived state is the [`Signer`] holding the
//! credential pair, service name, and region.

pub mod canonical;
pub mod hash;
pub mod signer;

pub use hash::{EMPTY_PAYLOAD_SHA256, hmac_sha256, md5_base64, sha256_hex};
pub use signer::{Credentials, Signer, UNSIGNED_PAYLOAD};
