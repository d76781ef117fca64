//! Encoding request bodies as S3-compatible XML.
//!
//! Follows the RestXml conventions: an XML declaration, a namespaced root
//! element, and plain text child elements. Only the completion manifest is
//! ever sent as a body by the multipart flow.

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::XmlError;
use crate::types::CompleteMultipartUpload;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for types encoded as XML request bodies.
///
/// Implementors write their child elements into the current context; the
/// declaration and namespaced root element are handled by [`to_xml`].
///
/// Uses `io::Result` because `quick_xml::Writer` closures require
/// `io::Result<()>`.
pub trait XmlSerialize {
    /// Write this value's child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Encode a value as a complete S3 XML document.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: XmlSerialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

impl XmlSerialize for CompleteMultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for part in &self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_text_element(w, "PartNumber", &part.part_number.to_string())?;
                write_text_element(w, "ETag", &part.etag)
            })?;
        }
        Ok(())
    }
}
