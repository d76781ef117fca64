//! The signed-request path and multipart-upload state machine.
//!
//! An [`ObjectClient`] owns the transport collaborator, the SigV4 signer,
//! and the client configuration; every operation builds a fresh request,
//! signs it, and issues it through the transport inside a bounded attempt
//! loop. The multipart flow layers on top: discover or create an upload
//! session, stream parts through it, then complete or abort.
//!
//! Operations are `async fn`s awaited by the caller. The client spawns
//! nothing and holds no mutable state, so uploading different parts of the
//! same session concurrently is safe; racing `complete` against `abort` is
//! left to the service to arbitrate.

pub mod client;
pub mod config;
pub mod multipart;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ObjectClient;
pub use config::ClientConfig;
pub use multipart::{Acl, MultipartUpload};

pub use shoal_auth::{Credentials, Signer};
pub use shoal_core::{ShoalError, ShoalResult};
pub use shoal_s3_xml::Part;
