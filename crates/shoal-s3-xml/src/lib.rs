//! Wire model and XML codec for the multipart-upload protocol.
//!
//! The storage service speaks the S3 RestXml dialect; this crate holds the
//! handful of shapes the multipart flow exchanges with it, a serializer for
//! the completion manifest, and event-driven deserializers for the response
//! documents (including the error document, which can arrive inside a
//! nominally successful completion response).

pub mod deserialize;
pub mod error;
pub mod serialize;
pub mod types;

pub use deserialize::{XmlDeserialize, from_xml, sniff_error};
pub use error::XmlError;
pub use serialize::{XmlSerialize, to_xml};
pub use types::{
    CompleteMultipartUpload, CompletedPart, ErrorResponse, InitiateMultipartUploadResult,
    ListMultipartUploadsResult, ListPartsResult, Part, UploadSummary,
};
