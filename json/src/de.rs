//! Building datasets and maps from JSON descriptions.

use dcmio_core::error::{
    BadFileFormatSnafu, BadParameterTypeSnafu, ParameterOutOfRangeSnafu, Result,
};
use dcmio_core::{dictionary, tags, DicomMap, Tag, VR};
use dcmio_encoding::Encoding;
use dcmio_object::codec::{create_element_for_tag, fill_element};
use dcmio_object::uids::{generate_unique_identifier, ResourceLevel};
use dcmio_object::{Dataset, Element};
use serde_json::{Map, Value};

/// Build a dataset from a JSON description.
///
/// Keys may be hexadecimal tags or symbolic names; values may be plain
/// strings, nulls, item arrays (for sequences) or full element nodes
/// (`{"Type", "Value"}`), mirroring the three output shapes.
///
/// When `generate_identifiers` is set, a missing PatientID gets a fresh
/// UUID and missing Study/Series/SOP Instance UIDs are generated under
/// the site roots. Specific Character Set is always materialised first,
/// so every later element is encoded consistently.
pub fn json_to_dataset(
    json: &Value,
    generate_identifiers: bool,
    decode_data_uri: bool,
    default_encoding: Encoding,
) -> Result<Dataset> {
    let members = json.as_object().ok_or_else(|| {
        BadParameterTypeSnafu {
            message: "a dataset can only be built from a JSON object",
        }
        .build()
    })?;

    let encoding = extract_encoding(members, default_encoding)?;

    let mut dataset = Dataset::new();
    dataset.put_str(
        tags::SPECIFIC_CHARACTER_SET,
        VR::CS,
        encoding.dicom_code(),
    );

    let mut has_patient_id = false;
    let mut has_study_instance_uid = false;
    let mut has_series_instance_uid = false;
    let mut has_sop_instance_uid = false;

    for (key, value) in members {
        let tag = dictionary::parse_tag(key)?;

        if tag == tags::PATIENT_ID {
            has_patient_id = true;
        } else if tag == tags::STUDY_INSTANCE_UID {
            has_study_instance_uid = true;
        } else if tag == tags::SERIES_INSTANCE_UID {
            has_series_instance_uid = true;
        } else if tag == tags::SOP_INSTANCE_UID {
            has_sop_instance_uid = true;
        }

        if tag == tags::SPECIFIC_CHARACTER_SET {
            continue;
        }
        dataset.put(element_from_json(tag, value, decode_data_uri, encoding)?);
    }

    if generate_identifiers {
        if !has_patient_id {
            set_string(
                &mut dataset,
                tags::PATIENT_ID,
                &generate_unique_identifier(ResourceLevel::Patient),
                encoding,
            )?;
        }
        if !has_study_instance_uid {
            set_string(
                &mut dataset,
                tags::STUDY_INSTANCE_UID,
                &generate_unique_identifier(ResourceLevel::Study),
                encoding,
            )?;
        }
        if !has_series_instance_uid {
            set_string(
                &mut dataset,
                tags::SERIES_INSTANCE_UID,
                &generate_unique_identifier(ResourceLevel::Series),
                encoding,
            )?;
        }
        if !has_sop_instance_uid {
            set_string(
                &mut dataset,
                tags::SOP_INSTANCE_UID,
                &generate_unique_identifier(ResourceLevel::Instance),
                encoding,
            )?;
        }
    }

    Ok(dataset)
}

fn set_string(dataset: &mut Dataset, tag: Tag, value: &str, encoding: Encoding) -> Result<()> {
    let mut element = create_element_for_tag(tag)?;
    fill_element(&mut element, tag, value, false, encoding)?;
    dataset.put(element);
    Ok(())
}

/// Look for Specific Character Set (0008,0005) among the JSON members.
/// An empty value falls back to the default; an unrecognised one fails.
fn extract_encoding(
    members: &Map<String, Value>,
    default_encoding: Encoding,
) -> Result<Encoding> {
    for (key, value) in members {
        let tag = dictionary::parse_tag(key)?;
        if tag != tags::SPECIFIC_CHARACTER_SET {
            continue;
        }
        let text = match value {
            Value::String(text) => text.as_str(),
            // the full output shape, fed back in
            Value::Object(members) => members
                .get("Value")
                .and_then(Value::as_str)
                .unwrap_or(""),
            _ => {
                return BadParameterTypeSnafu {
                    message: "Specific Character Set must be a JSON string",
                }
                .fail()
            }
        };
        if text.is_empty() {
            return Ok(default_encoding);
        }
        return Encoding::from_dicom_code(text).ok_or_else(|| {
            ParameterOutOfRangeSnafu {
                message: format!("unknown encoding while creating DICOM from JSON: {}", text),
            }
            .build()
        });
    }
    Ok(default_encoding)
}

fn element_from_json(
    tag: Tag,
    value: &Value,
    decode_data_uri: bool,
    encoding: Encoding,
) -> Result<Element> {
    match value {
        Value::String(text) => {
            let mut element = create_element_for_tag(tag)?;
            fill_element(&mut element, tag, text, decode_data_uri, encoding)?;
            Ok(element)
        }
        Value::Null => {
            let mut element = create_element_for_tag(tag)?;
            fill_element(&mut element, tag, "", decode_data_uri, encoding)?;
            Ok(element)
        }
        Value::Array(items) => sequence_from_json(tag, items, decode_data_uri, encoding),
        Value::Object(members) => {
            // the full output shape, fed back in
            let inner = members.get("Value").unwrap_or(&Value::Null);
            match members.get("Type").and_then(Value::as_str) {
                Some("Sequence") => element_from_json(tag, inner, decode_data_uri, encoding),
                Some("Binary") => element_from_json(tag, inner, true, encoding),
                Some("String") => element_from_json(tag, inner, decode_data_uri, encoding),
                // a too-long value cannot be reconstructed
                Some("Null") | Some("TooLong") => element_from_json(
                    tag,
                    &Value::Null,
                    decode_data_uri,
                    encoding,
                ),
                Some(other) => BadParameterTypeSnafu {
                    message: format!(
                        "unsupported element type \"{}\" for tag ({})",
                        other,
                        tag.format()
                    ),
                }
                .fail(),
                None => element_from_json(tag, inner, decode_data_uri, encoding),
            }
        }
        _ => BadParameterTypeSnafu {
            message: format!("cannot build tag ({}) from this JSON value", tag.format()),
        }
        .fail(),
    }
}

fn sequence_from_json(
    tag: Tag,
    items: &[Value],
    decode_data_uri: bool,
    encoding: Encoding,
) -> Result<Element> {
    if dictionary::lookup_vr(tag) != VR::SQ {
        return BadParameterTypeSnafu {
            message: format!("tag ({}) is not a sequence", tag.format()),
        }
        .fail();
    }
    let mut datasets = Vec::new();
    for item in items {
        match item {
            Value::Object(members) => {
                let mut dataset = Dataset::new();
                for (key, value) in members {
                    let tag = dictionary::parse_tag(key)?;
                    dataset.put(element_from_json(tag, value, decode_data_uri, encoding)?);
                }
                datasets.push(dataset);
            }
            // scripting front ends cannot distinguish an empty mapping
            // from an empty array; both mean an empty item
            Value::Array(inner) if inner.is_empty() => datasets.push(Dataset::new()),
            _ => {
                return BadParameterTypeSnafu {
                    message: format!(
                        "items of sequence ({}) must be JSON objects",
                        tag.format()
                    ),
                }
                .fail()
            }
        }
    }
    Ok(Element::new_sequence(tag, datasets))
}

/// Build a flat attribute map from a JSON object whose values are all
/// strings.
pub fn map_from_json(json: &Value) -> Result<DicomMap> {
    let members = json.as_object().ok_or_else(|| {
        BadFileFormatSnafu {
            message: "an attribute map can only be built from a JSON object",
        }
        .build()
    })?;
    let mut target = DicomMap::new();
    for (key, value) in members {
        let text = value.as_str().ok_or_else(|| {
            BadFileFormatSnafu {
                message: "attribute map values must be JSON strings",
            }
            .build()
        })?;
        target.set_value(dictionary::parse_tag(key)?, text);
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmio_core::{DicomValue, Error};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init() {
        INIT.call_once(|| {
            dictionary::initialize(true).expect("dictionary initialisation failed");
        });
    }

    #[test]
    fn builds_from_symbolic_and_hex_keys() {
        init();
        let dataset = json_to_dataset(
            &json!({
                "PatientName": "DOE^JOHN",
                "00080060": "MR",
            }),
            false,
            false,
            Encoding::Latin1,
        )
        .unwrap();
        assert_eq!(
            dataset.string_value(tags::PATIENT_NAME).unwrap(),
            "DOE^JOHN"
        );
        assert_eq!(dataset.string_value(tags::MODALITY).unwrap(), "MR");
        // the character set element is materialised from the default
        assert_eq!(
            dataset.string_value(tags::SPECIFIC_CHARACTER_SET).unwrap(),
            "ISO_IR 100"
        );
    }

    #[test]
    fn generated_identifiers_fill_the_gaps() {
        init();
        let dataset = json_to_dataset(
            &json!({ "PatientName": "DOE^JOHN" }),
            true,
            false,
            Encoding::Latin1,
        )
        .unwrap();

        let patient_id = dataset.string_value(tags::PATIENT_ID).unwrap();
        assert_eq!(patient_id.len(), 36);
        assert!(dataset
            .string_value(tags::STUDY_INSTANCE_UID)
            .unwrap()
            .starts_with(dcmio_object::uids::SITE_STUDY_UID_ROOT));
        assert!(dataset
            .string_value(tags::SERIES_INSTANCE_UID)
            .unwrap()
            .starts_with(dcmio_object::uids::SITE_SERIES_UID_ROOT));
        assert!(dataset
            .string_value(tags::SOP_INSTANCE_UID)
            .unwrap()
            .starts_with(dcmio_object::uids::SITE_INSTANCE_UID_ROOT));
    }

    #[test]
    fn explicit_identifiers_are_kept() {
        init();
        let dataset = json_to_dataset(
            &json!({ "PatientID": "ABC", "StudyInstanceUID": "1.2.3" }),
            true,
            false,
            Encoding::Latin1,
        )
        .unwrap();
        assert_eq!(dataset.string_value(tags::PATIENT_ID).unwrap(), "ABC");
        assert_eq!(
            dataset.string_value(tags::STUDY_INSTANCE_UID).unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn declared_charset_drives_the_element_bytes() {
        init();
        let dataset = json_to_dataset(
            &json!({
                "SpecificCharacterSet": "ISO_IR 100",
                "PatientName": "Jérôme",
            }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap();
        assert_eq!(
            dataset.element(tags::PATIENT_NAME).unwrap().bytes().unwrap(),
            b"J\xE9r\xF4me"
        );
    }

    #[test]
    fn unknown_charset_is_rejected() {
        init();
        let err = json_to_dataset(
            &json!({ "SpecificCharacterSet": "KLINGON" }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ParameterOutOfRange { .. }));
    }

    #[test]
    fn sequences_build_from_item_arrays() {
        init();
        let dataset = json_to_dataset(
            &json!({
                "ReferencedStudySequence": [
                    { "ReferencedSOPClassUID": "1.2.3" },
                    [],
                ],
            }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap();
        let sequence = dataset.element(Tag(0x0008, 0x1110)).unwrap();
        let items = sequence.items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].string_value(Tag(0x0008, 0x1150)).unwrap(),
            "1.2.3"
        );
        assert!(items[1].is_empty());
    }

    #[test]
    fn arrays_require_a_sequence_tag() {
        init();
        let err = json_to_dataset(
            &json!({ "PatientName": [ {} ] }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap_err();
        assert!(matches!(err, Error::BadParameterType { .. }));
    }

    #[test]
    fn full_shape_nodes_are_accepted() {
        init();
        let dataset = json_to_dataset(
            &json!({
                "00100010": { "Name": "PatientName", "Type": "String", "Value": "DOE^JOHN" },
                "00101030": { "Name": "PatientWeight", "Type": "Null", "Value": null },
            }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap();
        assert_eq!(
            dataset.string_value(tags::PATIENT_NAME).unwrap(),
            "DOE^JOHN"
        );
        assert_eq!(dataset.string_value(tags::PATIENT_WEIGHT).unwrap(), "");
    }

    #[test]
    fn unknown_names_fail() {
        init();
        let err = json_to_dataset(
            &json!({ "NoSuchAttribute": "x" }),
            false,
            false,
            Encoding::Ascii,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownDicomTag { .. }));
    }

    #[test]
    fn map_building_requires_string_values() {
        init();
        let map = map_from_json(&json!({
            "PatientName": "DOE^JOHN",
            "00080060": "MR",
        }))
        .unwrap();
        assert_eq!(
            map.get(tags::PATIENT_NAME),
            Some(&DicomValue::String("DOE^JOHN".to_string()))
        );
        assert_eq!(map.len(), 2);

        let err = map_from_json(&json!({ "PatientName": 42 })).unwrap_err();
        assert!(matches!(err, Error::BadFileFormat { .. }));
    }
}
