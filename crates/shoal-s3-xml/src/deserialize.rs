//! Decoding S3 XML response documents.
//!
//! Event-driven parsing: each type reads its child elements from the
//! reader, skipping anything it does not recognize, so new fields in
//! service responses never break decoding.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;
use crate::types::{
    ErrorResponse, InitiateMultipartUploadResult, ListMultipartUploadsResult, ListPartsResult,
    Part, UploadSummary,
};

/// Trait for types decoded from XML response bodies.
///
/// The reader is positioned just after the opening tag of the element; the
/// implementation consumes child content through the matching end tag.
pub trait XmlDeserialize: Sized {
    /// Decode an instance from the given XML reader.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or a value cannot be
    /// parsed.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Decode a complete S3 XML document into a typed value.
///
/// Skips the declaration, finds the root element, and delegates to the
/// type's [`XmlDeserialize`] implementation.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or has no root element.
pub fn from_xml<T: XmlDeserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Decode the body as an error document if its root element is `Error`.
///
/// Completion responses can carry an error document behind a 200 status;
/// this is the sniff callers run before trusting a nominal success. Returns
/// `None` for empty bodies, non-XML bodies, and documents rooted elsewhere.
#[must_use]
pub fn sniff_error(xml: &[u8]) -> Option<ErrorResponse> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"Error" {
                    return ErrorResponse::deserialize_xml(&mut reader).ok();
                }
                return None;
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e.decode().map_err(|err| XmlError::Parse(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::Parse(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedStructure(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedStructure(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn element_name(e: &quick_xml::events::BytesStart<'_>) -> Result<String, XmlError> {
    std::str::from_utf8(e.name().as_ref())
        .map(ToOwned::to_owned)
        .map_err(|err| XmlError::Parse(err.to_string()))
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::Parse(format!("invalid boolean: {s}"))),
    }
}

fn parse_u32(s: &str) -> Result<u32, XmlError> {
    s.parse::<u32>()
        .map_err(|e| XmlError::Parse(format!("invalid integer '{s}': {e}")))
}

fn parse_u64(s: &str) -> Result<u64, XmlError> {
    s.parse::<u64>()
        .map_err(|e| XmlError::Parse(format!("invalid integer '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, XmlError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::Parse(format!("invalid timestamp '{s}': {e}")))
}

impl XmlDeserialize for InitiateMultipartUploadResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "UploadId" => result.upload_id = read_text_content(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in InitiateMultipartUploadResult".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        if result.upload_id.is_empty() {
            return Err(XmlError::MissingElement("UploadId".to_owned()));
        }
        Ok(result)
    }
}

impl XmlDeserialize for UploadSummary {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut summary = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Key" => summary.key = read_text_content(reader)?,
                    "UploadId" => summary.upload_id = read_text_content(reader)?,
                    "Initiated" => {
                        summary.initiated = Some(parse_timestamp(&read_text_content(reader)?)?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in Upload".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(summary)
    }
}

impl XmlDeserialize for ListMultipartUploadsResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "NextKeyMarker" => result.next_key_marker = Some(read_text_content(reader)?),
                    "NextUploadIdMarker" => {
                        result.next_upload_id_marker = Some(read_text_content(reader)?);
                    }
                    "IsTruncated" => {
                        result.is_truncated = parse_bool(&read_text_content(reader)?)?;
                    }
                    "Upload" => result.uploads.push(UploadSummary::deserialize_xml(reader)?),
                    "CommonPrefixes" => read_common_prefixes(reader, &mut result.common_prefixes)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in ListMultipartUploadsResult".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

/// Collect every `<Prefix>` child of a `<CommonPrefixes>` group.
fn read_common_prefixes(
    reader: &mut Reader<&[u8]>,
    prefixes: &mut Vec<String>,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Prefix" => prefixes.push(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedStructure(
                    "unexpected EOF in CommonPrefixes".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

impl XmlDeserialize for Part {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut number = None;
        let mut etag = None;
        let mut size = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "PartNumber" => number = Some(parse_u32(&read_text_content(reader)?)?),
                    "ETag" => etag = Some(read_text_content(reader)?),
                    "Size" => size = Some(parse_u64(&read_text_content(reader)?)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in Part".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(Self {
            number: number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
            etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_owned()))?,
            size: size.unwrap_or_default(),
        })
    }
}

impl XmlDeserialize for ListPartsResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "NextPartNumberMarker" => {
                        result.next_part_number_marker = Some(read_text_content(reader)?);
                    }
                    "IsTruncated" => {
                        result.is_truncated = parse_bool(&read_text_content(reader)?)?;
                    }
                    "Part" => result.parts.push(Part::deserialize_xml(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in ListPartsResult".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

impl XmlDeserialize for ErrorResponse {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Code" => result.code = read_text_content(reader)?,
                    "Message" => result.message = read_text_content(reader)?,
                    "RequestId" => result.request_id = Some(read_text_content(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedStructure(
                        "unexpected EOF in Error".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(result)
    }
}
