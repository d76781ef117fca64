//! Error type for the XML codec.

/// Failure while encoding or decoding an S3 XML document.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("xml syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    /// A required element is absent.
    #[error("missing element: {0}")]
    MissingElement(String),

    /// The document ended or branched where it should not have.
    #[error("unexpected document structure: {0}")]
    UnexpectedStructure(String),

    /// An element's text could not be parsed into its typed value.
    #[error("invalid value: {0}")]
    Parse(String),

    /// Writing the encoded document failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
