//! The DICOM attribute tag model.

use crate::error::{Error, InvalidTagSnafu, Result};
use std::fmt;
use std::str::FromStr;

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// A tag is an ordered `(group, element)` pair.
/// Both `(u16, u16)` and `[u16; 2]` can be efficiently converted
/// to this type.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Whether this tag belongs to an odd, vendor-reserved group.
    #[inline]
    pub fn is_private(self) -> bool {
        self.0 % 2 == 1
    }

    /// Format the tag as its canonical eight-hex-digit lowercase string,
    /// `"ggggeeee"`, as used for map and JSON keys.
    pub fn format(self) -> String {
        format!("{:04x}{:04x}", self.0, self.1)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl PartialEq<[u16; 2]> for Tag {
    fn eq(&self, other: &[u16; 2]) -> bool {
        self.0 == other[0] && self.1 == other[1]
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from(value: [u16; 2]) -> Tag {
        Tag(value[0], value[1])
    }
}

/// Obtain a tag from one of its textual forms.
///
/// The accepted forms are:
///
/// - `ggggeeee`: eight hexadecimal digits, the canonical form;
/// - `gggg,eeee`: a 4-digit group part and a 4-digit element part;
/// - `(gggg,eeee)`: the same, surrounded by parentheses.
///
/// Symbolic attribute names are resolved by the dictionary instead
/// (see [`dictionary::parse_tag`](crate::dictionary::parse_tag)).
impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut text = s.trim();
        if text.starts_with('(') && text.ends_with(')') {
            text = &text[1..text.len() - 1];
        }
        let (group, element) = match (text.len(), text.find(',')) {
            (8, None) => (&text[..4], &text[4..]),
            (9, Some(4)) => (&text[..4], &text[5..]),
            _ => return InvalidTagSnafu { text: s }.fail(),
        };
        let group = u16::from_str_radix(group, 16)
            .ok()
            .ok_or_else(|| InvalidTagSnafu { text: s }.build())?;
        let element = u16::from_str_radix(element, 16)
            .ok()
            .ok_or_else(|| InvalidTagSnafu { text: s }.build())?;
        Ok(Tag(group, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_from_u16_pair() {
        let t = Tag::from((0x0010u16, 0x0020u16));
        assert_eq!(0x0010u16, t.group());
        assert_eq!(0x0020u16, t.element());
    }

    #[test]
    fn tag_format_is_lowercase_hex() {
        assert_eq!(Tag(0x7FE0, 0x0010).format(), "7fe00010");
        assert_eq!(Tag(0x0010, 0x0010).format(), "00100010");
    }

    #[test]
    fn tag_parsing_accepts_all_forms() {
        assert_eq!("00100010".parse::<Tag>().unwrap(), Tag(0x0010, 0x0010));
        assert_eq!("7fe00010".parse::<Tag>().unwrap(), Tag(0x7FE0, 0x0010));
        assert_eq!("0010,0020".parse::<Tag>().unwrap(), Tag(0x0010, 0x0020));
        assert_eq!("(0008,0005)".parse::<Tag>().unwrap(), Tag(0x0008, 0x0005));
    }

    #[test]
    fn tag_parsing_rejects_malformed_text() {
        for text in ["", "0010", "0010 0010", "zzzz0010", "1111,2222,3333"] {
            assert!(matches!(
                text.parse::<Tag>(),
                Err(Error::InvalidTag { .. })
            ));
        }
    }

    #[test]
    fn private_groups_are_odd() {
        assert!(Tag(0x0009, 0x0010).is_private());
        assert!(Tag(0x0011, 0x1001).is_private());
        assert!(!Tag(0x0010, 0x0010).is_private());
    }
}
