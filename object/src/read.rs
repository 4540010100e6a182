//! Parsing DICOM byte streams into file formats.
//!
//! The reader accepts the standard file structure (128-byte preamble,
//! `DICM` magic code, Explicit VR LE meta group, payload in the declared
//! transfer syntax) and the same structure without the preamble. After a
//! successful parse every element payload is resident in memory.

use crate::mem::{Dataset, Element, FileFormat};
use crate::transfer_syntax::TransferSyntax;
use crate::util::byte_swap_words;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dcmio_core::error::{BadFileFormatSnafu, Error, NotImplementedSnafu, Result};
use dcmio_core::{dictionary, tags, Tag, VR};
use snafu::ensure;

const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;
const DICM_MAGIC_CODE: &[u8; 4] = b"DICM";

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        ensure!(
            count <= self.data.len() - self.pos,
            BadFileFormatSnafu {
                message: format!("unexpected end of data at offset {}", self.pos),
            }
        );
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn read_u16(&mut self, big_endian: bool) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(if big_endian {
            BigEndian::read_u16(bytes)
        } else {
            LittleEndian::read_u16(bytes)
        })
    }

    fn read_u32(&mut self, big_endian: bool) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(if big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        })
    }

    fn read_tag(&mut self, big_endian: bool) -> Result<Tag> {
        let group = self.read_u16(big_endian)?;
        let element = self.read_u16(big_endian)?;
        Ok(Tag(group, element))
    }
}

enum Parsed {
    Element(Element),
    ItemDelimiter,
    SequenceDelimiter,
}

impl FileFormat {
    /// Parse a complete DICOM file from a byte buffer.
    ///
    /// Fails with `BadFileFormat` on any structural error (the buffer
    /// size is included in the message) and with `NotImplemented` when
    /// the declared transfer syntax is encapsulated or otherwise outside
    /// the supported set.
    pub fn from_bytes(data: &[u8]) -> Result<FileFormat> {
        parse_file(data).map_err(|e| match e {
            Error::BadFileFormat { message } => BadFileFormatSnafu {
                message: format!(
                    "cannot parse an invalid DICOM file (size: {} bytes): {}",
                    data.len(),
                    message
                ),
            }
            .build(),
            other => other,
        })
    }
}

fn parse_file(data: &[u8]) -> Result<FileFormat> {
    let mut cursor = Cursor::new(data);
    if data.len() >= 132 && &data[128..132] == DICM_MAGIC_CODE {
        cursor.pos = 132;
    } else if data.len() >= 4 && &data[0..4] == DICM_MAGIC_CODE {
        cursor.pos = 4;
    } else {
        return BadFileFormatSnafu {
            message: "DICM magic code not found",
        }
        .fail();
    }

    let meta = parse_meta(&mut cursor)?;
    let ts_uid = meta
        .string_value(tags::TRANSFER_SYNTAX_UID)
        .ok_or_else(|| {
            BadFileFormatSnafu {
                message: "file meta information carries no transfer syntax",
            }
            .build()
        })?;
    let ts = TransferSyntax::from_uid(&ts_uid).ok_or_else(|| {
        NotImplementedSnafu {
            message: format!("unsupported transfer syntax: {}", ts_uid),
        }
        .build()
    })?;

    let end = cursor.data.len();
    let (dataset, _) = parse_dataset(&mut cursor, ts, end, false)?;
    Ok(FileFormat { meta, dataset })
}

/// Parse the file meta information group, which is always encoded in
/// Explicit VR Little Endian and starts with its group length element.
fn parse_meta(cursor: &mut Cursor<'_>) -> Result<Dataset> {
    let ts = TransferSyntax::ExplicitVRLittleEndian;
    let mut meta = Dataset::new();

    let group_length = match parse_next(cursor, ts, &meta)? {
        Parsed::Element(element)
            if element.tag() == tags::FILE_META_INFORMATION_GROUP_LENGTH =>
        {
            let bytes = element.bytes().unwrap_or_default();
            ensure!(
                bytes.len() == 4,
                BadFileFormatSnafu {
                    message: "file meta group length has an invalid size",
                }
            );
            let length = LittleEndian::read_u32(bytes);
            meta.put(element);
            length as usize
        }
        _ => {
            return BadFileFormatSnafu {
                message: "file meta information group length missing",
            }
            .fail()
        }
    };

    let end = cursor.pos + group_length;
    ensure!(
        end <= cursor.data.len(),
        BadFileFormatSnafu {
            message: "file meta information group is truncated",
        }
    );
    while cursor.pos < end {
        match parse_next(cursor, ts, &meta)? {
            Parsed::Element(element) => {
                meta.put(element);
            }
            _ => {
                return BadFileFormatSnafu {
                    message: "unexpected delimiter in the file meta information",
                }
                .fail()
            }
        }
    }
    Ok(meta)
}

/// Parse elements until `end` is reached, or until an item delimiter
/// when `until_item_delimiter` is set. Returns the dataset and whether a
/// delimiter ended it.
fn parse_dataset(
    cursor: &mut Cursor<'_>,
    ts: TransferSyntax,
    end: usize,
    until_item_delimiter: bool,
) -> Result<(Dataset, bool)> {
    let mut dataset = Dataset::new();
    while cursor.pos < end {
        match parse_next(cursor, ts, &dataset)? {
            Parsed::Element(element) => {
                dataset.put(element);
            }
            Parsed::ItemDelimiter if until_item_delimiter => return Ok((dataset, true)),
            Parsed::ItemDelimiter => {
                return BadFileFormatSnafu {
                    message: "unexpected item delimitation item",
                }
                .fail()
            }
            Parsed::SequenceDelimiter => {
                return BadFileFormatSnafu {
                    message: "unexpected sequence delimitation item",
                }
                .fail()
            }
        }
    }
    Ok((dataset, false))
}

/// Parse the items of a sequence. A defined `length` bounds the items;
/// an undefined length runs until the sequence delimitation item.
fn parse_items(
    cursor: &mut Cursor<'_>,
    ts: TransferSyntax,
    length: u32,
) -> Result<Vec<Dataset>> {
    let big_endian = ts.big_endian();
    let mut items = Vec::new();
    let end = if length == UNDEFINED_LENGTH {
        cursor.data.len()
    } else {
        cursor.pos + length as usize
    };

    loop {
        if length != UNDEFINED_LENGTH && cursor.pos >= end {
            break;
        }
        let item_tag = cursor.read_tag(big_endian)?;
        let item_length = cursor.read_u32(big_endian)?;
        if item_tag == tags::SEQUENCE_DELIMITER {
            ensure!(
                length == UNDEFINED_LENGTH,
                BadFileFormatSnafu {
                    message: "sequence delimitation item inside a defined-length sequence",
                }
            );
            break;
        }
        ensure!(
            item_tag == tags::ITEM,
            BadFileFormatSnafu {
                message: format!("expected an item, found tag {}", item_tag),
            }
        );
        if item_length == UNDEFINED_LENGTH {
            let (item, _) = parse_dataset(cursor, ts, cursor.data.len(), true)?;
            items.push(item);
        } else {
            let item_end = cursor.pos + item_length as usize;
            ensure!(
                item_end <= cursor.data.len(),
                BadFileFormatSnafu {
                    message: "item is truncated",
                }
            );
            let (item, _) = parse_dataset(cursor, ts, item_end, false)?;
            items.push(item);
        }
    }
    Ok(items)
}

fn parse_next(cursor: &mut Cursor<'_>, ts: TransferSyntax, current: &Dataset) -> Result<Parsed> {
    let big_endian = ts.big_endian();
    let tag = cursor.read_tag(big_endian)?;

    if tag == tags::ITEM_DELIMITER {
        let _length = cursor.read_u32(big_endian)?;
        return Ok(Parsed::ItemDelimiter);
    }
    if tag == tags::SEQUENCE_DELIMITER {
        let _length = cursor.read_u32(big_endian)?;
        return Ok(Parsed::SequenceDelimiter);
    }

    // scope private data elements under their creator, which precedes
    // them at the same level per the private block convention
    let private_creator = if tag.is_private() && tag.element() >= 0x1000 {
        current.string_value(Tag(tag.group(), tag.element() >> 8))
    } else {
        None
    };

    let (vr, length) = if ts.explicit_vr() {
        let vr_bytes = cursor.take(2)?;
        let vr = VR::from_binary([vr_bytes[0], vr_bytes[1]]).unwrap_or(VR::Unknown);
        if vr.has_long_length_form() {
            let _reserved = cursor.take(2)?;
            (vr, cursor.read_u32(big_endian)?)
        } else {
            (vr, u32::from(cursor.read_u16(big_endian)?))
        }
    } else {
        let length = cursor.read_u32(big_endian)?;
        let vr = dictionary::lookup_by_tag(tag, private_creator.as_deref())
            .map(|entry| entry.vr)
            .unwrap_or(VR::UN);
        (vr, length)
    };

    if vr == VR::SQ {
        let items = parse_items(cursor, ts, length)?;
        let mut element = Element::new_sequence(tag, items);
        element.set_private_creator(private_creator);
        return Ok(Parsed::Element(element));
    }

    if length == UNDEFINED_LENGTH {
        if vr == VR::UN {
            // an unknown element of undefined length holds an implicitly
            // encoded sequence
            let items = parse_items(cursor, TransferSyntax::ImplicitVRLittleEndian, length)?;
            let mut element = Element::new_sequence(tag, items);
            element.set_private_creator(private_creator);
            return Ok(Parsed::Element(element));
        }
        // encapsulated content (e.g. compressed pixel data) is not ours
        return NotImplementedSnafu {
            message: format!("element {} has an undefined length", tag),
        }
        .fail();
    }

    let mut bytes = cursor.take(length as usize)?.to_vec();
    if big_endian {
        byte_swap_words(&mut bytes, vr);
    }
    let mut element = Element::with_bytes(tag, vr, bytes);
    element.set_private_creator(private_creator);
    Ok(Parsed::Element(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmio_core::Error;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init() {
        INIT.call_once(|| {
            dictionary::initialize(true).expect("dictionary initialisation failed");
        });
    }

    fn meta_group(ts_uid: &str) -> Vec<u8> {
        // hand-encoded Explicit VR LE meta group with only the transfer
        // syntax element after the group length
        let mut uid = ts_uid.as_bytes().to_vec();
        if uid.len() % 2 != 0 {
            uid.push(0);
        }
        let mut body = Vec::new();
        body.extend_from_slice(&[0x02, 0x00, 0x10, 0x00]);
        body.extend_from_slice(b"UI");
        body.extend_from_slice(&(uid.len() as u16).to_le_bytes());
        body.extend_from_slice(&uid);

        let mut out = Vec::new();
        out.extend_from_slice(b"DICM");
        out.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        out.extend_from_slice(b"UL");
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn parses_explicit_le_elements() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2.1");
        // (0010,0010) PN, "Doe^John"
        data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
        data.extend_from_slice(b"PN");
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(b"Doe^John");

        let file = FileFormat::from_bytes(&data).unwrap();
        assert_eq!(file.transfer_syntax().unwrap(), "1.2.840.10008.1.2.1");
        assert_eq!(
            file.dataset.string_value(tags::PATIENT_NAME).unwrap(),
            "Doe^John"
        );
    }

    #[test]
    fn parses_implicit_le_with_dictionary_vr() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2");
        // (0028,0010) Rows = 512, implicit: tag + 4-byte length
        data.extend_from_slice(&[0x28, 0x00, 0x10, 0x00]);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&512u16.to_le_bytes());

        let file = FileFormat::from_bytes(&data).unwrap();
        let element = file.dataset.element(Tag(0x0028, 0x0010)).unwrap();
        assert_eq!(element.vr(), VR::US);
        assert_eq!(element.bytes().unwrap(), &[0x00, 0x02]);
    }

    #[test]
    fn parses_explicit_be_and_normalises_words() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2.2");
        // (0028,0010) Rows = 512 in big endian
        data.extend_from_slice(&[0x00, 0x28, 0x00, 0x10]);
        data.extend_from_slice(b"US");
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&512u16.to_be_bytes());

        let file = FileFormat::from_bytes(&data).unwrap();
        let element = file.dataset.element(Tag(0x0028, 0x0010)).unwrap();
        // stored little endian internally
        assert_eq!(element.bytes().unwrap(), &[0x00, 0x02]);
    }

    #[test]
    fn parses_nested_sequences_with_undefined_length() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2.1");
        // (0008,1110) SQ, undefined length
        data.extend_from_slice(&[0x08, 0x00, 0x10, 0x11]);
        data.extend_from_slice(b"SQ");
        data.extend_from_slice(&[0x00, 0x00]);
        data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        //   item, undefined length
        data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
        data.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        //     (0008,1150) UI "1.2"
        data.extend_from_slice(&[0x08, 0x00, 0x50, 0x11]);
        data.extend_from_slice(b"UI");
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(b"1.2\0");
        //   item delimiter
        data.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0]);
        data.extend_from_slice(&0u32.to_le_bytes());
        // sequence delimiter
        data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0]);
        data.extend_from_slice(&0u32.to_le_bytes());

        let file = FileFormat::from_bytes(&data).unwrap();
        let sequence = file.dataset.element(Tag(0x0008, 0x1110)).unwrap();
        let items = sequence.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].string_value(Tag(0x0008, 0x1150)).unwrap(),
            "1.2"
        );
    }

    #[test]
    fn preamble_is_accepted() {
        init();
        let mut data = vec![0u8; 128];
        data.extend_from_slice(&meta_group("1.2.840.10008.1.2.1"));
        let file = FileFormat::from_bytes(&data).unwrap();
        assert!(file.dataset.is_empty());
    }

    #[test]
    fn garbage_reports_the_buffer_size() {
        init();
        let err = FileFormat::from_bytes(&[0u8; 16]).unwrap_err();
        match err {
            Error::BadFileFormat { message } => {
                assert!(message.contains("size: 16 bytes"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn encapsulated_transfer_syntaxes_are_rejected() {
        init();
        let data = meta_group("1.2.840.10008.1.2.4.50");
        let err = FileFormat::from_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));
    }

    #[test]
    fn truncated_element_fails() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2.1");
        data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
        data.extend_from_slice(b"PN");
        data.extend_from_slice(&64u16.to_le_bytes());
        data.extend_from_slice(b"short");
        let err = FileFormat::from_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::BadFileFormat { .. }));
    }

    #[test]
    fn private_elements_pick_up_their_creator() {
        init();
        let mut data = meta_group("1.2.840.10008.1.2.1");
        // (0029,0010) LO "SIEMENS CSA HEADER" (private creator)
        data.extend_from_slice(&[0x29, 0x00, 0x10, 0x00]);
        data.extend_from_slice(b"LO");
        data.extend_from_slice(&18u16.to_le_bytes());
        data.extend_from_slice(b"SIEMENS CSA HEADER");
        // (0029,1008) CS "IMAGE NUM 4 " scoped under the block 0x10
        data.extend_from_slice(&[0x29, 0x00, 0x08, 0x10]);
        data.extend_from_slice(b"CS");
        data.extend_from_slice(&12u16.to_le_bytes());
        data.extend_from_slice(b"IMAGE NUM 4 ");

        let file = FileFormat::from_bytes(&data).unwrap();
        let element = file.dataset.element(Tag(0x0029, 0x1008)).unwrap();
        assert_eq!(element.private_creator(), Some("SIEMENS CSA HEADER"));
    }
}
