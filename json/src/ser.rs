//! Emitting datasets and maps as JSON.

use dcmio_core::error::Result;
use dcmio_core::{dictionary, DicomMap, DicomValue, Tag};
use dcmio_encoding::Encoding;
use dcmio_object::codec::{convert_leaf_element, is_binary_vr, ConversionFlags};
use dcmio_object::util::format_data_uri_scheme;
use dcmio_object::{Dataset, Element};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// The output shape of a dataset projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFormat {
    /// `{ "ggggeeee": value }`
    Short,
    /// `{ "TagName": value }`
    Human,
    /// `{ "ggggeeee": { "Name", "Type", "Value" } }`
    Full,
}

/// The symbolic name of a tag, falling back to its hexadecimal form for
/// attributes outside the dictionary.
fn tag_key_name(tag: Tag, private_creator: Option<&str>) -> String {
    dictionary::tag_name(tag, private_creator).unwrap_or_else(|| tag.format())
}

/// Project a dataset to JSON.
///
/// The character set is resolved once from the dataset; `flags` selects
/// which elements are kept and how binary content is rendered. A string
/// leaf longer than `max_string_length` (when non-zero) is emitted as
/// `TooLong` with no value, unless its tag is in `ignore_tag_length`.
pub fn dataset_to_json(
    dataset: &Dataset,
    format: JsonFormat,
    flags: ConversionFlags,
    max_string_length: usize,
    default_encoding: Encoding,
    ignore_tag_length: &BTreeSet<Tag>,
) -> Result<Value> {
    let (encoding, has_code_extensions) = dataset.detect_encoding(default_encoding);
    let mut target = Map::new();
    dataset_to_json_internal(
        &mut target,
        dataset,
        format,
        flags,
        max_string_length,
        encoding,
        has_code_extensions,
        ignore_tag_length,
    )?;
    Ok(Value::Object(target))
}

/// Project a file meta information dataset to JSON. The meta group is
/// plain ASCII with no code extensions by definition.
pub fn meta_to_json(
    meta: &Dataset,
    format: JsonFormat,
    flags: ConversionFlags,
    max_string_length: usize,
) -> Result<Value> {
    let ignore_tag_length = BTreeSet::new();
    let mut target = Map::new();
    dataset_to_json_internal(
        &mut target,
        meta,
        format,
        flags,
        max_string_length,
        Encoding::Ascii,
        false,
        &ignore_tag_length,
    )?;
    Ok(Value::Object(target))
}

#[allow(clippy::too_many_arguments)]
fn dataset_to_json_internal(
    target: &mut Map<String, Value>,
    dataset: &Dataset,
    format: JsonFormat,
    flags: ConversionFlags,
    max_string_length: usize,
    encoding: Encoding,
    has_code_extensions: bool,
    ignore_tag_length: &BTreeSet<Tag>,
) -> Result<()> {
    for element in dataset.iter() {
        let tag = element.tag();

        if tag.is_private() && !flags.include_private_tags {
            continue;
        }
        if !flags.include_unknown_tags
            && dictionary::lookup_by_tag(tag, element.private_creator()).is_none()
        {
            continue;
        }
        if is_binary_vr(element.vr()) {
            let is_pixel_data = tag == dcmio_core::tags::PIXEL_DATA;
            if (is_pixel_data && !flags.include_pixel_data)
                || (!is_pixel_data && !flags.include_binary)
            {
                continue;
            }
        }

        element_to_json(
            target,
            element,
            format,
            flags,
            max_string_length,
            encoding,
            has_code_extensions,
            ignore_tag_length,
        )?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn element_to_json(
    parent: &mut Map<String, Value>,
    element: &Element,
    format: JsonFormat,
    flags: ConversionFlags,
    max_string_length: usize,
    encoding: Encoding,
    has_code_extensions: bool,
    ignore_tag_length: &BTreeSet<Tag>,
) -> Result<()> {
    let tag = element.tag();

    if element.is_leaf() {
        // the zero below defers the length bound to the rendering step,
        // which knows how to express "TooLong"
        let value = convert_leaf_element(
            element,
            flags,
            0,
            encoding,
            has_code_extensions,
            ignore_tag_length,
        )?;
        let effective_max = if ignore_tag_length.contains(&tag) {
            0
        } else {
            max_string_length
        };
        let (json_value, value_type) = leaf_value_to_json(value, flags, effective_max);
        insert_leaf_node(parent, element, format, json_value, value_type);
        return Ok(());
    }

    let mut items = Vec::new();
    for item in element.items().unwrap_or(&[]) {
        let mut node = Map::new();
        dataset_to_json_internal(
            &mut node,
            item,
            format,
            flags,
            max_string_length,
            encoding,
            has_code_extensions,
            ignore_tag_length,
        )?;
        items.push(Value::Object(node));
    }
    let items = Value::Array(items);

    match format {
        JsonFormat::Short => {
            parent.insert(tag.format(), items);
        }
        JsonFormat::Human => {
            parent.insert(tag_key_name(tag, element.private_creator()), items);
        }
        JsonFormat::Full => {
            let mut node = Map::new();
            node.insert(
                "Name".to_string(),
                Value::String(tag_key_name(tag, element.private_creator())),
            );
            node.insert("Type".to_string(), Value::String("Sequence".to_string()));
            node.insert("Value".to_string(), items);
            parent.insert(tag.format(), Value::Object(node));
        }
    }
    Ok(())
}

fn insert_leaf_node(
    parent: &mut Map<String, Value>,
    element: &Element,
    format: JsonFormat,
    json_value: Value,
    value_type: &'static str,
) {
    let tag = element.tag();
    match format {
        JsonFormat::Short => {
            parent.insert(tag.format(), json_value);
        }
        JsonFormat::Human => {
            parent.insert(tag_key_name(tag, element.private_creator()), json_value);
        }
        JsonFormat::Full => {
            let mut node = Map::new();
            node.insert(
                "Name".to_string(),
                Value::String(tag_key_name(tag, element.private_creator())),
            );
            if let Some(creator) = element.private_creator() {
                node.insert(
                    "PrivateCreator".to_string(),
                    Value::String(creator.to_string()),
                );
            }
            node.insert("Type".to_string(), Value::String(value_type.to_string()));
            node.insert("Value".to_string(), json_value);
            parent.insert(tag.format(), Value::Object(node));
        }
    }
}

fn leaf_value_to_json(
    value: DicomValue,
    flags: ConversionFlags,
    max_string_length: usize,
) -> (Value, &'static str) {
    match value {
        DicomValue::Null => (Value::Null, "Null"),
        DicomValue::Binary(bytes) => {
            if flags.convert_binary_to_ascii {
                (Value::String(to_printable_ascii(&bytes)), "Binary")
            } else {
                (
                    Value::String(format_data_uri_scheme("application/octet-stream", &bytes)),
                    "Binary",
                )
            }
        }
        DicomValue::String(text) => {
            if max_string_length == 0 || text.len() <= max_string_length {
                (Value::String(text), "String")
            } else {
                (Value::Null, "TooLong")
            }
        }
    }
}

fn to_printable_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .copied()
        .filter(|&b| (0x20..0x7F).contains(&b))
        .map(char::from)
        .collect()
}

/// Project a flat attribute map to JSON.
///
/// With `simplify`, the result maps symbolic names straight to values;
/// otherwise the full node shape is produced. The map does not record
/// whether a value was binary, so binary content is rendered through its
/// string form, as it always has been.
pub fn map_to_json(values: &DicomMap, simplify: bool) -> Value {
    let mut result = Map::new();
    for (tag, value) in values {
        let name = tag_key_name(*tag, None);
        let content = match value {
            DicomValue::Null => Value::Null,
            DicomValue::String(s) => Value::String(s.clone()),
            DicomValue::Binary(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        };
        if simplify {
            result.insert(name, content);
        } else {
            let mut node = Map::new();
            node.insert("Name".to_string(), Value::String(name));
            node.insert(
                "Type".to_string(),
                Value::String(if value.is_null() { "Null" } else { "String" }.to_string()),
            );
            node.insert("Value".to_string(), content);
            result.insert(tag.format(), Value::Object(node));
        }
    }
    Value::Object(result)
}
