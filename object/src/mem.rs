//! The in-memory dataset model.
//!
//! A [`Dataset`] maps attribute tags to owned [`Element`]s, keeping them
//! unique and in ascending tag order. Leaf elements own their raw bytes
//! (in the dataset character set, with numeric content normalised to
//! little endian); sequence elements own their items, which are datasets
//! themselves. The tree is strictly hierarchical.

use crate::util::trim_padding;
use dcmio_core::{tags, Tag, VR};
use dcmio_encoding::{detect_specific_character_set, Encoding};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// The payload of a data element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// A leaf payload: the raw value bytes.
    Bytes(Vec<u8>),
    /// A sequence payload: the ordered items.
    Items(Vec<Dataset>),
}

/// A single data element: a tag, its value representation and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: Tag,
    vr: VR,
    private_creator: Option<String>,
    value: ElementValue,
}

impl Element {
    /// Create an empty leaf element.
    pub fn new_leaf(tag: Tag, vr: VR) -> Self {
        Element {
            tag,
            vr,
            private_creator: None,
            value: ElementValue::Bytes(Vec::new()),
        }
    }

    /// Create a leaf element owning the given raw bytes.
    pub fn with_bytes(tag: Tag, vr: VR, bytes: Vec<u8>) -> Self {
        Element {
            tag,
            vr,
            private_creator: None,
            value: ElementValue::Bytes(bytes),
        }
    }

    /// Create a leaf element from text in the default repertoire.
    pub fn with_text(tag: Tag, vr: VR, text: &str) -> Self {
        Element::with_bytes(tag, vr, text.as_bytes().to_vec())
    }

    /// Create a sequence element owning the given items.
    pub fn new_sequence(tag: Tag, items: Vec<Dataset>) -> Self {
        Element {
            tag,
            vr: VR::SQ,
            private_creator: None,
            value: ElementValue::Items(items),
        }
    }

    /// The element's tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The element's value representation.
    #[inline]
    pub fn vr(&self) -> VR {
        self.vr
    }

    /// The private creator scoping this element, if any.
    pub fn private_creator(&self) -> Option<&str> {
        self.private_creator.as_deref()
    }

    /// Attach the private creator scoping this element.
    pub fn set_private_creator(&mut self, creator: Option<String>) {
        self.private_creator = creator;
    }

    /// Whether this element is a leaf (not a sequence).
    pub fn is_leaf(&self) -> bool {
        matches!(self.value, ElementValue::Bytes(_))
    }

    /// Borrow the raw bytes of a leaf element.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            ElementValue::Bytes(b) => Some(b),
            ElementValue::Items(_) => None,
        }
    }

    /// Replace the raw bytes of this element, turning it into a leaf.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.value = ElementValue::Bytes(bytes);
    }

    /// Borrow the items of a sequence element.
    pub fn items(&self) -> Option<&[Dataset]> {
        match &self.value {
            ElementValue::Items(items) => Some(items),
            ElementValue::Bytes(_) => None,
        }
    }

    /// Mutably borrow the items of a sequence element.
    pub fn items_mut(&mut self) -> Option<&mut Vec<Dataset>> {
        match &mut self.value {
            ElementValue::Items(items) => Some(items),
            ElementValue::Bytes(_) => None,
        }
    }

    /// Borrow the element's payload.
    pub fn value(&self) -> &ElementValue {
        &self.value
    }
}

/// An ordered collection of data elements, with at most one element per
/// tag. This is both the main payload type and the item type inside
/// sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    entries: BTreeMap<Tag, Element>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Construct a dataset from structured elements.
    pub fn from_element_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        Dataset {
            entries: iter.into_iter().map(|e| (e.tag(), e)).collect(),
        }
    }

    /// The number of elements at this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this dataset holds no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an element with the given tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Retrieve a data element by its tag.
    pub fn element(&self, tag: Tag) -> Option<&Element> {
        self.entries.get(&tag)
    }

    /// Mutably retrieve a data element by its tag.
    pub fn element_mut(&mut self, tag: Tag) -> Option<&mut Element> {
        self.entries.get_mut(&tag)
    }

    /// Insert a data element, replacing (and returning) any previous
    /// element under the same tag.
    pub fn put(&mut self, element: Element) -> Option<Element> {
        self.entries.insert(element.tag(), element)
    }

    /// Insert a leaf element holding the given text.
    pub fn put_str(&mut self, tag: Tag, vr: VR, text: &str) -> Option<Element> {
        self.put(Element::with_text(tag, vr, text))
    }

    /// Remove and return the element under the given tag.
    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.entries.remove(&tag)
    }

    /// Remove every element of the given group.
    pub fn remove_group(&mut self, group: u16) {
        self.entries.retain(|tag, _| tag.group() != group);
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> btree_map::Values<'_, Tag, Element> {
        self.entries.values()
    }

    /// Iterate mutably over the elements in ascending tag order.
    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, Tag, Element> {
        self.entries.values_mut()
    }

    /// Read a leaf element as text in the default repertoire, with the
    /// even-length padding stripped. Returns `None` for absent elements
    /// and for sequences.
    pub fn string_value(&self, tag: Tag) -> Option<String> {
        let bytes = self.element(tag)?.bytes()?;
        Some(String::from_utf8_lossy(trim_padding(bytes)).into_owned())
    }

    /// Resolve the active character set of this dataset from
    /// Specific Character Set (0008,0005).
    pub fn detect_encoding(&self, default_encoding: Encoding) -> (Encoding, bool) {
        let value = self.string_value(tags::SPECIFIC_CHARACTER_SET);
        detect_specific_character_set(value.as_deref(), default_encoding)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Element;
    type IntoIter = btree_map::Values<'a, Tag, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl FromIterator<Element> for Dataset {
    fn from_iter<T: IntoIterator<Item = Element>>(iter: T) -> Self {
        Dataset::from_element_iter(iter)
    }
}

/// A complete DICOM file: the file meta information dataset (group 0002)
/// paired with the main payload dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFormat {
    /// the file meta information (group 0002), always Explicit VR LE
    pub meta: Dataset,
    /// the main payload
    pub dataset: Dataset,
}

impl FileFormat {
    /// Read the transfer syntax UID declared in the meta information,
    /// tag (0002,0010), if present.
    pub fn transfer_syntax(&self) -> Option<String> {
        self.meta.string_value(tags::TRANSFER_SYNTAX_UID)
    }
}
