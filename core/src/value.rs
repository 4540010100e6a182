//! The simplified value model:
//! the tri-state element value and the flat dataset projection.

use crate::tag::Tag;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// A value extracted from a single data element.
///
/// Multi-valued textual content is carried in the `String` variant with
/// the component parts joined by the literal backslash (`\`).
#[derive(Debug, Clone, PartialEq)]
pub enum DicomValue {
    /// The element is absent, empty of meaning, or not representable.
    Null,
    /// Canonical UTF-8 text.
    String(String),
    /// A raw binary payload.
    Binary(Vec<u8>),
}

impl DicomValue {
    /// Whether this is the null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, DicomValue::Null)
    }

    /// Whether this value holds binary content.
    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, DicomValue::Binary(_))
    }

    /// Whether this value holds textual content.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, DicomValue::String(_))
    }

    /// Borrow the textual content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DicomValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the binary content, if this is a binary value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DicomValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Split a string value into its backslash-separated parts.
    /// Non-string values yield no parts.
    pub fn components(&self) -> Vec<&str> {
        match self {
            DicomValue::String(s) => s.split('\\').collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for DicomValue {
    fn from(value: &str) -> Self {
        DicomValue::String(value.to_string())
    }
}

impl From<String> for DicomValue {
    fn from(value: String) -> Self {
        DicomValue::String(value)
    }
}

impl From<Vec<u8>> for DicomValue {
    fn from(value: Vec<u8>) -> Self {
        DicomValue::Binary(value)
    }
}

/// An ordered mapping from attribute tags to simplified values,
/// used as the flat projection of a dataset.
///
/// Insertion order is irrelevant: entries are kept in ascending tag order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DicomMap {
    values: BTreeMap<Tag, DicomValue>,
}

impl DicomMap {
    /// Create an empty map.
    pub fn new() -> Self {
        DicomMap::default()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Insert or replace the value stored under the given tag.
    pub fn set_value<V>(&mut self, tag: Tag, value: V)
    where
        V: Into<DicomValue>,
    {
        self.values.insert(tag, value.into());
    }

    /// Retrieve the value stored under the given tag.
    pub fn get(&self, tag: Tag) -> Option<&DicomValue> {
        self.values.get(&tag)
    }

    /// Whether a value is stored under the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.values.contains_key(&tag)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the entries in ascending tag order.
    pub fn iter(&self) -> btree_map::Iter<'_, Tag, DicomValue> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a DicomMap {
    type Item = (&'a Tag, &'a DicomValue);
    type IntoIter = btree_map::Iter<'a, Tag, DicomValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl FromIterator<(Tag, DicomValue)> for DicomMap {
    fn from_iter<T: IntoIterator<Item = (Tag, DicomValue)>>(iter: T) -> Self {
        DicomMap {
            values: iter.into_iter().collect(),
        }
    }
}
