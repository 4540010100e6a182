//! The recursive dataset walker and its visitor contract.
//!
//! [`apply`] performs a depth-first, tag-ordered traversal of a dataset,
//! dispatching every leaf to the matching visitor method. The visitor may
//! replace string values in place; all other visits are read-only. The
//! walker resolves the character set once, at the root, and carries it
//! through the recursion.

use crate::mem::{Dataset, Element};
use crate::util::trim_padding;
use byteorder::{ByteOrder, LittleEndian};
use dcmio_core::error::{InternalSnafu, Result};
use dcmio_core::{tags, Tag, VrKind, VR};
use dcmio_encoding::{convert_from_utf8, convert_to_utf8, Encoding};

/// The outcome of a string visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringAction {
    /// Keep the stored value.
    None,
    /// Replace the stored value; the new text is re-encoded to the
    /// dataset's character set before being written back.
    Replace(String),
}

/// A borrowed view over a binary leaf's content.
///
/// Other Word values are exposed as 16-bit words; every other binary
/// representation is exposed as plain bytes. Views are only valid for
/// the duration of the visit and must not be retained.
#[derive(Debug, Clone, Copy)]
pub enum BinaryView<'a> {
    /// byte-grained content
    Bytes(&'a [u8]),
    /// word-grained content (VR OW)
    Words(&'a [u16]),
}

/// The visitor contract of the dataset walker.
///
/// `parents` holds the tags of the enclosing sequences and `indexes` the
/// item positions inside them; both always have the same length. All
/// methods default to doing nothing.
pub trait TagVisitor {
    /// An element whose representation this engine cannot process.
    fn visit_not_supported(&mut self, parents: &[Tag], indexes: &[usize], tag: Tag, vr: VR) {
        let _ = (parents, indexes, tag, vr);
    }

    /// A sequence element with no items.
    fn visit_empty_sequence(&mut self, parents: &[Tag], indexes: &[usize], tag: Tag) {
        let _ = (parents, indexes, tag);
    }

    /// A binary leaf.
    fn visit_binary(
        &mut self,
        parents: &[Tag],
        indexes: &[usize],
        tag: Tag,
        vr: VR,
        data: BinaryView<'_>,
    ) {
        let _ = (parents, indexes, tag, vr, data);
    }

    /// An integer leaf; one entry per decoded component.
    fn visit_integers(
        &mut self,
        parents: &[Tag],
        indexes: &[usize],
        tag: Tag,
        vr: VR,
        values: &[i64],
    ) {
        let _ = (parents, indexes, tag, vr, values);
    }

    /// A floating-point leaf; one entry per decoded component.
    fn visit_doubles(
        &mut self,
        parents: &[Tag],
        indexes: &[usize],
        tag: Tag,
        vr: VR,
        values: &[f64],
    ) {
        let _ = (parents, indexes, tag, vr, values);
    }

    /// An attribute-tag leaf; one entry per decoded component.
    fn visit_attributes(&mut self, parents: &[Tag], indexes: &[usize], tag: Tag, values: &[Tag]) {
        let _ = (parents, indexes, tag, values);
    }

    /// A string leaf, presented in UTF-8.
    fn visit_string(
        &mut self,
        parents: &[Tag],
        indexes: &[usize],
        tag: Tag,
        vr: VR,
        value: &str,
    ) -> StringAction {
        let _ = (parents, indexes, tag, vr, value);
        StringAction::None
    }
}

/// Walk a dataset, dispatching every element to the visitor.
///
/// The character set is resolved once from the dataset's
/// Specific Character Set element, with `default_encoding` as fallback.
pub fn apply(
    dataset: &mut Dataset,
    visitor: &mut dyn TagVisitor,
    default_encoding: Encoding,
) -> Result<()> {
    let (encoding, has_code_extensions) = dataset.detect_encoding(default_encoding);
    let mut parents = Vec::new();
    let mut indexes = Vec::new();
    apply_to_dataset(
        dataset,
        visitor,
        &mut parents,
        &mut indexes,
        encoding,
        has_code_extensions,
    )
}

fn apply_to_dataset(
    dataset: &mut Dataset,
    visitor: &mut dyn TagVisitor,
    parents: &mut Vec<Tag>,
    indexes: &mut Vec<usize>,
    encoding: Encoding,
    has_code_extensions: bool,
) -> Result<()> {
    debug_assert_eq!(parents.len(), indexes.len());
    for element in dataset.iter_mut() {
        apply_to_element(element, visitor, parents, indexes, encoding, has_code_extensions)?;
    }
    Ok(())
}

fn apply_to_element(
    element: &mut Element,
    visitor: &mut dyn TagVisitor,
    parents: &mut Vec<Tag>,
    indexes: &mut Vec<usize>,
    encoding: Encoding,
    has_code_extensions: bool,
) -> Result<()> {
    let tag = element.tag();
    if element.is_leaf() {
        return apply_to_leaf(element, visitor, parents, indexes, tag, encoding, has_code_extensions);
    }

    let items = match element.items_mut() {
        Some(items) => items,
        None => return Ok(()),
    };
    if items.is_empty() {
        visitor.visit_empty_sequence(parents, indexes, tag);
        return Ok(());
    }

    parents.push(tag);
    indexes.push(0);
    for (i, item) in items.iter_mut().enumerate() {
        if let Some(last) = indexes.last_mut() {
            *last = i;
        }
        apply_to_dataset(item, visitor, parents, indexes, encoding, has_code_extensions)?;
    }
    parents.pop();
    indexes.pop();
    Ok(())
}

fn apply_to_leaf(
    element: &mut Element,
    visitor: &mut dyn TagVisitor,
    parents: &[Tag],
    indexes: &[usize],
    tag: Tag,
    encoding: Encoding,
    has_code_extensions: bool,
) -> Result<()> {
    // wire VRs that could not be interpreted walk like UN
    let vr = match element.vr() {
        VR::Unknown => VR::UN,
        other => other,
    };

    let bytes = match element.bytes() {
        Some(bytes) => bytes,
        None => return Ok(()),
    };

    match vr.kind() {
        VrKind::Binary => {
            if vr == VR::OW {
                let words: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
                visitor.visit_binary(parents, indexes, tag, vr, BinaryView::Words(&words));
            } else {
                visitor.visit_binary(parents, indexes, tag, vr, BinaryView::Bytes(bytes));
            }
            Ok(())
        }
        VrKind::String => {
            let trimmed = trim_padding(bytes).to_vec();
            match convert_to_utf8(&trimmed, encoding, has_code_extensions) {
                Ok(utf8) => {
                    match visitor.visit_string(parents, indexes, tag, vr, &utf8) {
                        StringAction::None => {}
                        StringAction::Replace(new_value) => {
                            let raw =
                                convert_from_utf8(&new_value, encoding).ok().ok_or_else(|| {
                                    InternalSnafu {
                                        message: format!(
                                            "cannot replace value of tag: {}",
                                            tag.format()
                                        ),
                                    }
                                    .build()
                                })?;
                            element.set_bytes(raw);
                        }
                    }
                    Ok(())
                }
                Err(_) => {
                    // structurally malformed string content
                    visitor.visit_not_supported(parents, indexes, tag, vr);
                    Ok(())
                }
            }
        }
        VrKind::SignedInteger => {
            let values: Vec<i64> = match vr {
                VR::SL => bytes
                    .chunks_exact(4)
                    .map(|c| i64::from(LittleEndian::read_i32(c)))
                    .collect(),
                _ => bytes
                    .chunks_exact(2)
                    .map(|c| i64::from(LittleEndian::read_i16(c)))
                    .collect(),
            };
            visitor.visit_integers(parents, indexes, tag, vr, &values);
            Ok(())
        }
        VrKind::UnsignedInteger => {
            let values: Vec<i64> = match vr {
                VR::UL => bytes
                    .chunks_exact(4)
                    .map(|c| i64::from(LittleEndian::read_u32(c)))
                    .collect(),
                _ => bytes
                    .chunks_exact(2)
                    .map(|c| i64::from(LittleEndian::read_u16(c)))
                    .collect(),
            };
            visitor.visit_integers(parents, indexes, tag, vr, &values);
            Ok(())
        }
        VrKind::Float => {
            let values: Vec<f64> = match vr {
                VR::FL => bytes
                    .chunks_exact(4)
                    .map(|c| f64::from(LittleEndian::read_f32(c)))
                    .collect(),
                _ => bytes.chunks_exact(8).map(LittleEndian::read_f64).collect(),
            };
            visitor.visit_doubles(parents, indexes, tag, vr, &values);
            Ok(())
        }
        VrKind::AttributeTag => {
            let values: Vec<Tag> = bytes
                .chunks_exact(4)
                .map(|c| {
                    Tag(
                        LittleEndian::read_u16(&c[0..2]),
                        LittleEndian::read_u16(&c[2..4]),
                    )
                })
                .collect();
            visitor.visit_attributes(parents, indexes, tag, &values);
            Ok(())
        }
        // sequences never reach the leaf path
        VrKind::Sequence => Ok(()),
        VrKind::Internal => {
            visitor.visit_not_supported(parents, indexes, tag, VR::NotSupported);
            Ok(())
        }
    }
}

/// Re-encode every textual leaf of the dataset from `source` to `target`,
/// recursing through sequences. A no-op when the encodings are equal.
pub fn change_string_encoding(
    dataset: &mut Dataset,
    source: Encoding,
    has_source_code_extensions: bool,
    target: Encoding,
) -> Result<()> {
    if source == target {
        return Ok(());
    }
    for element in dataset.iter_mut() {
        if element.is_leaf() {
            if !element.vr().is_string() {
                continue;
            }
            let bytes = match element.bytes() {
                Some(bytes) if !bytes.is_empty() => trim_padding(bytes).to_vec(),
                _ => continue,
            };
            let utf8 = convert_to_utf8(&bytes, source, has_source_code_extensions)?;
            let raw = convert_from_utf8(&utf8, target)?;
            element.set_bytes(raw);
        } else if let Some(items) = element.items_mut() {
            for item in items {
                change_string_encoding(item, source, has_source_code_extensions, target)?;
            }
        }
    }
    Ok(())
}

impl Dataset {
    /// Switch this dataset to another character set: every textual leaf
    /// is re-encoded and Specific Character Set (0008,0005) is rewritten
    /// to the canonical name of the target, keeping both consistent.
    pub fn change_encoding(
        &mut self,
        default_encoding: Encoding,
        target: Encoding,
    ) -> Result<()> {
        let (source, has_code_extensions) = self.detect_encoding(default_encoding);
        change_string_encoding(self, source, has_code_extensions, target)?;
        self.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, target.dicom_code());
        Ok(())
    }
}
