//! Serializing datasets to DICOM byte streams.
//!
//! The writer always emits explicit lengths (items and sequences
//! included), recalculates every group length element it encounters and
//! appends no padding beyond the even-length rule. The output buffer is
//! pre-sized from an upper-bound estimate and shrunk to the written
//! size.

use crate::mem::{Dataset, Element, ElementValue, FileFormat};
use crate::meta::validate_meta;
use crate::transfer_syntax::TransferSyntax;
use crate::util::byte_swap_words;
use dcmio_core::error::{InternalSnafu, Result};
use dcmio_core::VR;
use snafu::ensure;
use std::collections::HashMap;

/// Groups which may never appear in a stored payload.
const INVALID_GROUPS: [u16; 6] = [0x0000, 0x0001, 0x0003, 0x0005, 0x0007, 0xFFFF];

impl FileFormat {
    /// Serialize this file to a byte buffer.
    ///
    /// The payload keeps its declared transfer syntax when it is one of
    /// the supported set; otherwise Explicit VR Little Endian is used.
    /// The meta information is validated and completed before writing.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let ts = self
            .transfer_syntax()
            .and_then(|uid| TransferSyntax::from_uid(&uid))
            .unwrap_or(TransferSyntax::ExplicitVRLittleEndian);
        save(&self.dataset, Some(&self.meta), ts)
    }
}

/// Serialize a payload dataset to a byte buffer, synthesizing the file
/// meta information.
///
/// The original transfer syntax is used when known; a dataset built in
/// memory has none and is written as Explicit VR Little Endian.
pub fn save_to_bytes(
    dataset: &Dataset,
    original_transfer_syntax: Option<TransferSyntax>,
) -> Result<Vec<u8>> {
    save(
        dataset,
        None,
        original_transfer_syntax.unwrap_or(TransferSyntax::ExplicitVRLittleEndian),
    )
}

fn save(
    dataset: &Dataset,
    existing_meta: Option<&Dataset>,
    ts: TransferSyntax,
) -> Result<Vec<u8>> {
    let mut payload = dataset.clone();
    for group in INVALID_GROUPS {
        payload.remove_group(group);
    }
    // the meta group never lives in the payload
    payload.remove_group(0x0002);

    let meta = validate_meta(existing_meta, &payload, ts);

    let estimate = 132
        + dataset_encoded_length(&meta, TransferSyntax::ExplicitVRLittleEndian)
        + dataset_encoded_length(&payload, ts);
    let mut buffer = Vec::with_capacity(estimate);
    buffer.extend_from_slice(&[0u8; 128]);
    buffer.extend_from_slice(b"DICM");
    write_dataset(&mut buffer, &meta, TransferSyntax::ExplicitVRLittleEndian)?;
    write_dataset(&mut buffer, &payload, ts)?;
    buffer.shrink_to_fit();
    Ok(buffer)
}

/// The representation actually written to the wire; internal sentinels
/// degrade to UN.
fn wire_vr(vr: VR) -> VR {
    match vr {
        VR::Unknown | VR::NotSupported => VR::UN,
        other => other,
    }
}

fn header_length(vr: VR, ts: TransferSyntax) -> usize {
    if !ts.explicit_vr() {
        8
    } else if wire_vr(vr).has_long_length_form() {
        12
    } else {
        8
    }
}

fn padding_byte(vr: VR) -> u8 {
    if vr.is_string() && vr != VR::UI {
        b' '
    } else {
        0
    }
}

fn dataset_encoded_length(dataset: &Dataset, ts: TransferSyntax) -> usize {
    dataset
        .iter()
        .map(|element| element_encoded_length(element, ts))
        .sum()
}

fn element_encoded_length(element: &Element, ts: TransferSyntax) -> usize {
    match element.value() {
        ElementValue::Bytes(bytes) => {
            header_length(element.vr(), ts) + bytes.len() + bytes.len() % 2
        }
        ElementValue::Items(items) => {
            header_length(VR::SQ, ts)
                + items
                    .iter()
                    .map(|item| 8 + dataset_encoded_length(item, ts))
                    .sum::<usize>()
        }
    }
}

fn write_u16(out: &mut Vec<u8>, value: u16, ts: TransferSyntax) {
    if ts.big_endian() {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn write_u32(out: &mut Vec<u8>, value: u32, ts: TransferSyntax) {
    if ts.big_endian() {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn write_dataset(out: &mut Vec<u8>, dataset: &Dataset, ts: TransferSyntax) -> Result<()> {
    // group length elements are recalculated from the encoded length of
    // the rest of their group
    let mut group_lengths: HashMap<u16, u32> = HashMap::new();
    for element in dataset.iter() {
        if element.tag().element() != 0x0000 {
            *group_lengths.entry(element.tag().group()).or_insert(0) +=
                element_encoded_length(element, ts) as u32;
        }
    }

    for element in dataset.iter() {
        if element.tag().element() == 0x0000 && element.is_leaf() {
            let value = group_lengths
                .get(&element.tag().group())
                .copied()
                .unwrap_or(0);
            let patched = Element::with_bytes(
                element.tag(),
                VR::UL,
                value.to_le_bytes().to_vec(),
            );
            write_element(out, &patched, ts)?;
        } else {
            write_element(out, element, ts)?;
        }
    }
    Ok(())
}

fn write_element(out: &mut Vec<u8>, element: &Element, ts: TransferSyntax) -> Result<()> {
    let tag = element.tag();
    write_u16(out, tag.group(), ts);
    write_u16(out, tag.element(), ts);

    match element.value() {
        ElementValue::Bytes(bytes) => {
            let vr = wire_vr(element.vr());
            let mut value = bytes.clone();
            if ts.big_endian() {
                byte_swap_words(&mut value, vr);
            }
            if value.len() % 2 != 0 {
                value.push(padding_byte(vr));
            }
            if ts.explicit_vr() {
                out.extend_from_slice(vr.to_str().as_bytes());
                if vr.has_long_length_form() {
                    out.extend_from_slice(&[0, 0]);
                    write_u32(out, value.len() as u32, ts);
                } else {
                    ensure!(
                        value.len() <= usize::from(u16::MAX),
                        InternalSnafu {
                            message: format!(
                                "value of element {} does not fit its length field",
                                tag
                            ),
                        }
                    );
                    write_u16(out, value.len() as u16, ts);
                }
            } else {
                write_u32(out, value.len() as u32, ts);
            }
            out.extend_from_slice(&value);
        }
        ElementValue::Items(items) => {
            let content_length: usize = items
                .iter()
                .map(|item| 8 + dataset_encoded_length(item, ts))
                .sum();
            if ts.explicit_vr() {
                out.extend_from_slice(b"SQ");
                out.extend_from_slice(&[0, 0]);
            }
            write_u32(out, content_length as u32, ts);
            for item in items {
                write_u16(out, 0xFFFE, ts);
                write_u16(out, 0xE000, ts);
                write_u32(out, dataset_encoded_length(item, ts) as u32, ts);
                write_dataset(out, item, ts)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmio_core::{dictionary, tags, Tag};
    use pretty_assertions::assert_eq;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init() {
        INIT.call_once(|| {
            dictionary::initialize(true).expect("dictionary initialisation failed");
        });
    }

    fn sample_dataset() -> Dataset {
        let item = Dataset::from_element_iter([Element::with_text(
            Tag(0x0008, 0x1150),
            VR::UI,
            "1.2.840.10008.5.1.4.1.1.7",
        )]);
        Dataset::from_element_iter([
            Element::with_text(tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.7"),
            Element::with_text(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4.5"),
            Element::with_text(tags::PATIENT_NAME, VR::PN, "Doe^John"),
            Element::with_bytes(Tag(0x0028, 0x0010), VR::US, vec![0x00, 0x02]),
            Element::new_sequence(Tag(0x0008, 0x1110), vec![item]),
            Element::with_bytes(tags::PIXEL_DATA, VR::OB, vec![1, 2, 3, 4]),
        ])
    }

    #[test]
    fn unknown_transfer_syntax_writes_explicit_le() {
        init();
        let bytes = save_to_bytes(&sample_dataset(), None).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        assert_eq!(file.transfer_syntax().unwrap(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn round_trip_preserves_the_payload() {
        init();
        let dataset = sample_dataset();
        let first = FileFormat::from_bytes(&save_to_bytes(&dataset, None).unwrap()).unwrap();
        assert_eq!(
            first.dataset.string_value(tags::PATIENT_NAME).unwrap(),
            "Doe^John"
        );
        assert_eq!(
            first.dataset.string_value(tags::SOP_INSTANCE_UID).unwrap(),
            "1.2.3.4.5"
        );
        let items = first
            .dataset
            .element(Tag(0x0008, 0x1110))
            .unwrap()
            .items()
            .unwrap();
        assert_eq!(
            items[0].string_value(Tag(0x0008, 0x1150)).unwrap(),
            "1.2.840.10008.5.1.4.1.1.7"
        );
        // once the even-length padding has been applied, the write/read
        // cycle is a fixed point
        let second =
            FileFormat::from_bytes(&save_to_bytes(&first.dataset, None).unwrap()).unwrap();
        assert_eq!(second.dataset, first.dataset);
    }

    #[test]
    fn round_trip_through_big_endian() {
        init();
        let dataset = sample_dataset();
        let first = FileFormat::from_bytes(&save_to_bytes(&dataset, None).unwrap()).unwrap();
        let bytes =
            save_to_bytes(&first.dataset, Some(TransferSyntax::ExplicitVRBigEndian)).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        assert_eq!(file.transfer_syntax().unwrap(), "1.2.840.10008.1.2.2");
        assert_eq!(file.dataset, first.dataset);
    }

    #[test]
    fn round_trip_through_implicit_le() {
        init();
        let dataset = sample_dataset();
        let bytes =
            save_to_bytes(&dataset, Some(TransferSyntax::ImplicitVRLittleEndian)).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        let element = file.dataset.element(Tag(0x0028, 0x0010)).unwrap();
        assert_eq!(element.vr(), VR::US);
        // the pixel data VR resolves through the dictionary to Other Byte
        let pixel = file.dataset.element(tags::PIXEL_DATA).unwrap();
        assert_eq!(pixel.bytes().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn invalid_groups_are_dropped_on_save() {
        init();
        let mut dataset = sample_dataset();
        dataset.put_str(Tag(0x0001, 0x0010), VR::LO, "bogus");
        dataset.put_str(Tag(0xFFFF, 0x0010), VR::LO, "bogus");
        dataset.put_str(Tag(0x0002, 0x0010), VR::UI, "1.2.840.10008.1.2.2");

        let bytes = save_to_bytes(&dataset, None).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        assert!(!file.dataset.contains(Tag(0x0001, 0x0010)));
        assert!(!file.dataset.contains(Tag(0xFFFF, 0x0010)));
        assert!(!file.dataset.contains(Tag(0x0002, 0x0010)));
        // and the stray transfer syntax did not hijack the file
        assert_eq!(file.transfer_syntax().unwrap(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn group_lengths_are_recalculated() {
        init();
        let mut dataset = Dataset::new();
        // stale group length with a wrong value
        dataset.put(Element::with_bytes(
            Tag(0x0008, 0x0000),
            VR::UL,
            vec![0xFF, 0xFF, 0xFF, 0x00],
        ));
        dataset.put_str(tags::MODALITY, VR::CS, "OT");

        let bytes = save_to_bytes(&dataset, None).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        let group_length = file.dataset.element(Tag(0x0008, 0x0000)).unwrap();
        // (0008,0060) CS "OT" in explicit LE: 8-byte header + 2-byte value
        assert_eq!(group_length.bytes().unwrap(), &10u32.to_le_bytes());
    }

    #[test]
    fn odd_values_are_padded_per_representation() {
        init();
        let dataset = Dataset::from_element_iter([
            Element::with_text(tags::PATIENT_NAME, VR::PN, "Doe"),
            Element::with_text(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3"),
        ]);
        let bytes = save_to_bytes(&dataset, None).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        // padding is stripped again by the reader accessors
        assert_eq!(
            file.dataset.string_value(tags::PATIENT_NAME).unwrap(),
            "Doe"
        );
        assert_eq!(
            file.dataset.string_value(tags::SOP_INSTANCE_UID).unwrap(),
            "1.2.3"
        );
        // names pad with a space, identifiers with NUL
        let name = file.dataset.element(tags::PATIENT_NAME).unwrap();
        assert_eq!(name.bytes().unwrap(), b"Doe ");
        let uid = file.dataset.element(tags::SOP_INSTANCE_UID).unwrap();
        assert_eq!(uid.bytes().unwrap(), b"1.2.3\0");
    }

    #[test]
    fn estimate_matches_written_length() {
        init();
        let dataset = sample_dataset();
        let meta = validate_meta(None, &dataset, TransferSyntax::ExplicitVRLittleEndian);
        let expected = 132
            + dataset_encoded_length(&meta, TransferSyntax::ExplicitVRLittleEndian)
            + dataset_encoded_length(&dataset, TransferSyntax::ExplicitVRLittleEndian);
        let bytes = save_to_bytes(&dataset, None).unwrap();
        assert_eq!(bytes.len(), expected);
    }
}
