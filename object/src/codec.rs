//! The VR-dispatched element codec.
//!
//! Reads convert a leaf element's raw bytes into a [`DicomValue`]; writes
//! fill an element from a UTF-8 string. Both directions dispatch over the
//! closed VR enumeration, so the compiler enforces that every
//! representation is handled. Reads are tolerant (malformed content
//! yields a null value), writes are strict.

use crate::mem::{Dataset, Element};
use crate::util::{decode_data_uri_scheme, trim_padding, DATA_URI_SCHEME_PREFIX};
use byteorder::{ByteOrder, LittleEndian};
use dcmio_core::error::{
    BadFileFormatSnafu, BadParameterTypeSnafu, InternalSnafu, NotImplementedSnafu,
    ParameterOutOfRangeSnafu, Result,
};
use dcmio_core::{dictionary, DicomMap, DicomValue, Tag, VrKind, VR};
use dcmio_encoding::{convert_from_utf8, convert_to_utf8, Encoding};
use std::collections::BTreeSet;
use tracing::error;

/// Maximum length of a converted string value before it is replaced by a
/// null value in summaries.
pub const DEFAULT_MAXIMUM_TAG_LENGTH: usize = 256;

/// The flag set steering element conversion and JSON emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionFlags {
    /// keep elements with an odd group number
    pub include_private_tags: bool,
    /// keep elements absent from the dictionary
    pub include_unknown_tags: bool,
    /// keep the Pixel Data element
    pub include_pixel_data: bool,
    /// keep binary elements other than Pixel Data
    pub include_binary: bool,
    /// project kept binary values to printable ASCII
    pub convert_binary_to_ascii: bool,
    /// turn binary values into null values
    pub convert_binary_to_null: bool,
}

impl Default for ConversionFlags {
    fn default() -> Self {
        ConversionFlags {
            include_private_tags: true,
            include_unknown_tags: true,
            include_pixel_data: true,
            include_binary: true,
            convert_binary_to_ascii: false,
            convert_binary_to_null: true,
        }
    }
}

/// Whether elements with this representation carry opaque binary content.
pub fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OW | VR::UN | VR::Unknown
    )
}

/// Convert a leaf element into a simplified value.
///
/// String content is converted from the active character set to UTF-8;
/// a result longer than `max_string_length` (when non-zero) becomes a
/// null value unless the tag is listed in `ignore_tag_length`. Numeric
/// content is decoded component-wise and joined with `\`. Binary content
/// is kept or nulled according to `flags`. Malformed content never
/// fails: it degrades to a null value.
pub fn convert_leaf_element(
    element: &Element,
    flags: ConversionFlags,
    max_string_length: usize,
    encoding: Encoding,
    has_code_extensions: bool,
    ignore_tag_length: &BTreeSet<Tag>,
) -> Result<DicomValue> {
    let tag = element.tag();
    let bytes = match element.bytes() {
        Some(bytes) => bytes,
        None => {
            return BadParameterTypeSnafu {
                message: format!("element {} is not a leaf", tag),
            }
            .fail()
        }
    };

    if element.vr() == VR::UN {
        // VR unknown on the wire: consult the dictionary. Notably the
        // case for private tags registered at run time. The character
        // set of such a value is not known to be the dataset's, so only
        // plain ASCII content is accepted.
        if let Some(entry) = dictionary::lookup_by_tag(tag, element.private_creator()) {
            if entry.vr.is_string() && bytes.is_ascii() {
                let trimmed = trim_padding(bytes);
                if max_string_length != 0
                    && trimmed.len() > max_string_length
                    && !ignore_tag_length.contains(&tag)
                {
                    return Ok(DicomValue::Null);
                }
                return Ok(DicomValue::String(
                    String::from_utf8_lossy(trimmed).into_owned(),
                ));
            }
        }
    }

    match element.vr().kind() {
        VrKind::String => {
            let trimmed = trim_padding(bytes);
            if trimmed.is_empty() {
                return Ok(DicomValue::String(String::new()));
            }
            let utf8 = convert_to_utf8(trimmed, encoding, has_code_extensions)?;
            if max_string_length != 0
                && utf8.len() > max_string_length
                && !ignore_tag_length.contains(&tag)
            {
                return Ok(DicomValue::Null);
            }
            Ok(DicomValue::String(utf8))
        }
        VrKind::Binary => {
            if flags.convert_binary_to_null {
                Ok(DicomValue::Null)
            } else {
                Ok(DicomValue::Binary(bytes.to_vec()))
            }
        }
        VrKind::SignedInteger => Ok(match element.vr() {
            VR::SL => convert_fixed_width(bytes, 4, LittleEndian::read_i32),
            _ => convert_fixed_width(bytes, 2, LittleEndian::read_i16),
        }),
        VrKind::UnsignedInteger => Ok(match element.vr() {
            VR::UL => convert_fixed_width(bytes, 4, LittleEndian::read_u32),
            _ => convert_fixed_width(bytes, 2, LittleEndian::read_u16),
        }),
        VrKind::Float => Ok(match element.vr() {
            VR::FL => convert_fixed_width(bytes, 4, LittleEndian::read_f32),
            _ => convert_fixed_width(bytes, 8, LittleEndian::read_f64),
        }),
        VrKind::AttributeTag => {
            if bytes.len() >= 4 {
                let group = LittleEndian::read_u16(&bytes[0..2]);
                let element = LittleEndian::read_u16(&bytes[2..4]);
                Ok(DicomValue::String(Tag(group, element).format()))
            } else {
                Ok(DicomValue::Null)
            }
        }
        // sequences are walked, never converted as leaves
        VrKind::Sequence => Ok(DicomValue::Null),
        VrKind::Internal => Ok(DicomValue::Null),
    }
}

/// Decode a fixed-width numeric value.
///
/// An exact multiple of the component width above one component yields
/// every component, stringified and joined with `\`. Any other length of
/// at least one component width decodes the first component alone.
/// Shorter payloads yield a null value.
fn convert_fixed_width<T, F>(bytes: &[u8], width: usize, read: F) -> DicomValue
where
    T: ToString,
    F: Fn(&[u8]) -> T,
{
    if bytes.len() > width && bytes.len() % width == 0 {
        let parts: Vec<String> = bytes
            .chunks_exact(width)
            .map(|chunk| read(chunk).to_string())
            .collect();
        DicomValue::String(parts.join("\\"))
    } else if bytes.len() >= width {
        DicomValue::String(read(&bytes[..width]).to_string())
    } else {
        DicomValue::Null
    }
}

fn out_of_range(tag: Tag, value: &[u8]) -> dcmio_core::Error {
    BadFileFormatSnafu {
        message: format!(
            "while creating a DICOM instance, tag ({}) has out-of-range value: \"{}\"",
            tag.format(),
            String::from_utf8_lossy(value)
        ),
    }
    .build()
}

/// Fill a leaf element from a UTF-8 string.
///
/// When `decode_data_uri` is set and the value is a `data:` URI, its
/// base64 payload is decoded and stored as binary. Otherwise the text is
/// transcoded to `dicom_encoding` first. Numeric representations parse
/// with strict lexical casting; a failure reports the tag and the
/// offending value.
pub fn fill_element(
    element: &mut Element,
    tag: Tag,
    utf8_value: &str,
    decode_data_uri: bool,
    dicom_encoding: Encoding,
) -> Result<()> {
    let decoded: Vec<u8> = if decode_data_uri && utf8_value.starts_with(DATA_URI_SCHEME_PREFIX) {
        let (_mime, bytes) = decode_data_uri_scheme(utf8_value).ok_or_else(|| {
            BadFileFormatSnafu {
                message: format!("tag ({}) carries an invalid data URI", tag.format()),
            }
            .build()
        })?;
        bytes
    } else if dicom_encoding != Encoding::Utf8 {
        convert_from_utf8(utf8_value, dicom_encoding)?
    } else {
        utf8_value.as_bytes().to_vec()
    };

    if tag.is_private() || is_binary_vr(element.vr()) {
        if element.vr() == VR::OW && decoded.len() % 2 != 0 {
            error!("a tag with OW VR must have an even number of bytes");
            return InternalSnafu {
                message: format!("odd byte count in OW value of tag ({})", tag.format()),
            }
            .fail();
        }
        element.set_bytes(decoded);
        return Ok(());
    }

    let stored: Vec<u8> = match element.vr().kind() {
        VrKind::String => decoded,
        VrKind::SignedInteger => {
            let text = std::str::from_utf8(&decoded).ok();
            match element.vr() {
                VR::SL => {
                    let v: i32 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 4];
                    LittleEndian::write_i32(&mut buf, v);
                    buf.to_vec()
                }
                _ => {
                    let v: i16 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 2];
                    LittleEndian::write_i16(&mut buf, v);
                    buf.to_vec()
                }
            }
        }
        VrKind::UnsignedInteger => {
            let text = std::str::from_utf8(&decoded).ok();
            match element.vr() {
                VR::UL => {
                    let v: u32 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 4];
                    LittleEndian::write_u32(&mut buf, v);
                    buf.to_vec()
                }
                _ => {
                    let v: u16 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 2];
                    LittleEndian::write_u16(&mut buf, v);
                    buf.to_vec()
                }
            }
        }
        VrKind::Float => {
            let text = std::str::from_utf8(&decoded).ok();
            match element.vr() {
                VR::FL => {
                    let v: f32 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 4];
                    LittleEndian::write_f32(&mut buf, v);
                    buf.to_vec()
                }
                _ => {
                    let v: f64 = text
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| out_of_range(tag, &decoded))?;
                    let mut buf = [0u8; 8];
                    LittleEndian::write_f64(&mut buf, v);
                    buf.to_vec()
                }
            }
        }
        VrKind::AttributeTag => {
            return NotImplementedSnafu {
                message: format!("cannot fill attribute-tag element ({})", tag.format()),
            }
            .fail()
        }
        VrKind::Sequence => return Err(out_of_range(tag, &decoded)),
        VrKind::Binary | VrKind::Internal => return Err(out_of_range(tag, &decoded)),
    };

    element.set_bytes(stored);
    Ok(())
}

/// Create a new empty leaf element for the given tag, typed per its
/// dictionary VR. Private tags and binary representations always become
/// Other Byte elements; sequences and attribute-tag elements cannot be
/// created through this path.
pub fn create_element_for_tag(tag: Tag) -> Result<Element> {
    let vr = dictionary::lookup_vr(tag);

    if tag.is_private() || is_binary_vr(vr) {
        return Ok(Element::new_leaf(tag, VR::OB));
    }

    match vr.kind() {
        VrKind::String
        | VrKind::SignedInteger
        | VrKind::UnsignedInteger
        | VrKind::Float => Ok(Element::new_leaf(tag, vr)),
        VrKind::Sequence => ParameterOutOfRangeSnafu {
            message: format!("cannot create a leaf element for sequence tag ({})", tag.format()),
        }
        .fail(),
        VrKind::AttributeTag => NotImplementedSnafu {
            message: format!("cannot create an attribute-tag element ({})", tag.format()),
        }
        .fail(),
        VrKind::Binary | VrKind::Internal => InternalSnafu {
            message: format!("no element type for tag ({})", tag.format()),
        }
        .fail(),
    }
}

/// Project the top-level leaves of a dataset into a [`DicomMap`],
/// using the default flag preset.
pub fn extract_summary(
    dataset: &Dataset,
    max_string_length: usize,
    default_encoding: Encoding,
) -> Result<DicomMap> {
    let ignore_tag_length = BTreeSet::new();
    let (encoding, has_code_extensions) = dataset.detect_encoding(default_encoding);

    let mut target = DicomMap::new();
    for element in dataset.iter() {
        if !element.is_leaf() {
            continue;
        }
        let value = convert_leaf_element(
            element,
            ConversionFlags::default(),
            max_string_length,
            encoding,
            has_code_extensions,
            &ignore_tag_length,
        )?;
        target.set_value(element.tag(), value);
    }
    Ok(target)
}
