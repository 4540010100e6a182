//! End-to-end checks of the dataset pipeline: byte stream in, mutable
//! dataset, summary projection, byte stream out.

use dcmio_core::{dictionary, tags, DicomValue, Tag, VR};
use dcmio_encoding::Encoding;
use dcmio_object::codec::DEFAULT_MAXIMUM_TAG_LENGTH;
use dcmio_object::write::save_to_bytes;
use dcmio_object::{
    create_element_for_tag, extract_summary, fill_element, Dataset, Element, FileFormat,
    TransferSyntax,
};
use std::sync::Once;

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        dictionary::initialize(true).expect("dictionary initialisation failed");
    });
}

fn build_text_dataset(values: &[(Tag, &str)]) -> Dataset {
    let mut dataset = Dataset::new();
    for (tag, value) in values {
        let mut element = create_element_for_tag(*tag).expect("creatable tag");
        fill_element(&mut element, *tag, value, false, Encoding::Ascii).expect("fillable value");
        dataset.put(element);
    }
    dataset
}

#[test]
fn textual_values_survive_serialize_then_parse() {
    init();
    let values = [
        (tags::PATIENT_NAME, "DOE^JOHN"),
        (tags::PATIENT_ID, "ABC-123"),
        (tags::MODALITY, "MR"),
        (tags::STUDY_INSTANCE_UID, "1.2.840.113619.2.1.1"),
    ];
    let dataset = build_text_dataset(&values);
    let bytes = save_to_bytes(&dataset, None).unwrap();
    let file = FileFormat::from_bytes(&bytes).unwrap();

    let summary =
        extract_summary(&file.dataset, DEFAULT_MAXIMUM_TAG_LENGTH, Encoding::Ascii).unwrap();
    for (tag, value) in values {
        assert_eq!(
            summary.get(tag),
            Some(&DicomValue::String(value.to_string())),
            "{} should round-trip",
            tag
        );
    }
}

#[test]
fn latin1_dataset_summary_is_utf8() {
    init();
    // scenario: (0008,0005) = ISO_IR 100, patient name carries é and ô
    let mut dataset = Dataset::new();
    dataset.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 100");
    dataset.put(Element::with_bytes(
        tags::PATIENT_NAME,
        VR::PN,
        b"J\xE9r\xF4me".to_vec(),
    ));

    assert_eq!(
        dataset.detect_encoding(Encoding::Ascii),
        (Encoding::Latin1, false)
    );

    let summary =
        extract_summary(&dataset, DEFAULT_MAXIMUM_TAG_LENGTH, Encoding::Ascii).unwrap();
    assert_eq!(
        summary.get(tags::PATIENT_NAME),
        Some(&DicomValue::String("Jérôme".to_string()))
    );
}

#[test]
fn code_extension_dataset_honours_escapes() {
    init();
    use encoding::{EncoderTrap, Encoding as _};
    // leading empty component: code extensions are active
    let mut dataset = Dataset::new();
    dataset.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, "\\ISO 2022 IR 87");
    let wire = encoding::all::ISO_2022_JP
        .encode("Yamada=山田", EncoderTrap::Strict)
        .unwrap();
    dataset.put(Element::with_bytes(tags::PATIENT_NAME, VR::PN, wire));

    let (detected, has_code_extensions) = dataset.detect_encoding(Encoding::Ascii);
    assert_eq!(detected, Encoding::JapaneseKanji);
    assert!(has_code_extensions);

    let summary =
        extract_summary(&dataset, DEFAULT_MAXIMUM_TAG_LENGTH, Encoding::Ascii).unwrap();
    assert_eq!(
        summary.get(tags::PATIENT_NAME),
        Some(&DicomValue::String("Yamada=山田".to_string()))
    );
}

#[test]
fn binary_payloads_are_preserved_exactly() {
    init();
    let payload: Vec<u8> = (0u8..=255).cycle().take(512).collect();
    let mut dataset = Dataset::new();
    dataset.put(Element::with_bytes(
        tags::PIXEL_DATA,
        VR::OB,
        payload.clone(),
    ));

    for ts in [
        None,
        Some(TransferSyntax::ImplicitVRLittleEndian),
        Some(TransferSyntax::ExplicitVRBigEndian),
    ] {
        let bytes = save_to_bytes(&dataset, ts).unwrap();
        let file = FileFormat::from_bytes(&bytes).unwrap();
        assert_eq!(
            file.dataset.element(tags::PIXEL_DATA).unwrap().bytes().unwrap(),
            payload.as_slice()
        );
    }
}

#[test]
fn reencoding_is_idempotent() {
    init();
    let mut dataset = Dataset::new();
    dataset.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 100");
    dataset.put(Element::with_bytes(
        tags::PATIENT_NAME,
        VR::PN,
        b"J\xE9r\xF4me".to_vec(),
    ));

    dataset
        .change_encoding(Encoding::Ascii, Encoding::Utf8)
        .unwrap();
    let converted = dataset.clone();
    dataset
        .change_encoding(Encoding::Ascii, Encoding::Utf8)
        .unwrap();
    assert_eq!(dataset, converted);
    assert_eq!(
        dataset.string_value(tags::PATIENT_NAME).unwrap(),
        "Jérôme"
    );
}

#[test]
fn parsed_files_expose_their_transfer_syntax() {
    init();
    let dataset = build_text_dataset(&[(tags::PATIENT_ID, "42")]);
    let bytes = save_to_bytes(&dataset, Some(TransferSyntax::ImplicitVRLittleEndian)).unwrap();
    let file = FileFormat::from_bytes(&bytes).unwrap();
    assert_eq!(file.transfer_syntax().unwrap(), "1.2.840.10008.1.2");
    // and saving again keeps the original transfer syntax
    let again = file.to_bytes().unwrap();
    let reparsed = FileFormat::from_bytes(&again).unwrap();
    assert_eq!(reparsed.transfer_syntax().unwrap(), "1.2.840.10008.1.2");
}
