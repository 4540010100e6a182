//! The value representation (VR) model.
//!
//! The enumeration is closed and every dispatch over it is exhaustive,
//! so the compiler enforces that each representation is handled,
//! including the internal sentinels.

use std::fmt;
use std::str::{from_utf8, FromStr};

/// An enum type for a DICOM value representation.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Single
    FL,
    /// Floating Point Double
    FD,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Double
    OD,
    /// Other Float
    OF,
    /// Other Long
    OL,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unlimited Characters
    UC,
    /// Unique Identifier (UID)
    UI,
    /// Unsigned Long
    UL,
    /// Unknown
    UN,
    /// Universal Resource Identifier or Locator (URI/URL)
    UR,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
    /// A value representation read from the wire which could not be
    /// interpreted. Internal to the toolkit.
    Unknown,
    /// Sentinel for representations that this engine cannot process.
    NotSupported,
}

/// Broad classification of a value representation,
/// driving the codec and walker dispatch.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum VrKind {
    /// Character data, possibly multi-valued with `\` separators.
    String,
    /// Fixed-width signed binary integers.
    SignedInteger,
    /// Fixed-width unsigned binary integers.
    UnsignedInteger,
    /// Fixed-width IEEE 754 floats.
    Float,
    /// Opaque binary payloads.
    Binary,
    /// A sequence of items.
    Sequence,
    /// A list of attribute tags.
    AttributeTag,
    /// Internal sentinels with no wire semantics of their own.
    Internal,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    /// The internal sentinels have no two-letter code and map to `"??"`.
    pub fn to_str(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OL => "OL",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
            Unknown | NotSupported => "??",
        }
    }

    /// Classify this representation for codec dispatch.
    pub fn kind(self) -> VrKind {
        use VR::*;
        match self {
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UC | UI | UR
            | UT => VrKind::String,
            SL | SS => VrKind::SignedInteger,
            UL | US => VrKind::UnsignedInteger,
            FL | FD => VrKind::Float,
            OB | OD | OF | OL | OW | UN => VrKind::Binary,
            SQ => VrKind::Sequence,
            AT => VrKind::AttributeTag,
            Unknown | NotSupported => VrKind::Internal,
        }
    }

    /// Whether values of this representation are character data.
    #[inline]
    pub fn is_string(self) -> bool {
        self.kind() == VrKind::String
    }

    /// Whether values of this representation are subject to
    /// Specific Character Set conversion.
    ///
    /// The remaining string representations only admit the default
    /// repertoire.
    pub fn is_textual(self) -> bool {
        use VR::*;
        matches!(self, LO | LT | PN | SH | ST | UC | UT)
    }

    /// The maximum value length fixed by the standard, in bytes.
    /// `None` when the standard sets no bound (or only the 32-bit
    /// length field bounds it).
    pub fn max_length(self) -> Option<u32> {
        use VR::*;
        match self {
            AE => Some(16),
            AS => Some(4),
            AT => Some(4),
            CS => Some(16),
            DA => Some(8),
            DS => Some(16),
            DT => Some(26),
            FL => Some(4),
            FD => Some(8),
            IS => Some(12),
            LO => Some(64),
            LT => Some(10240),
            PN => Some(64),
            SH => Some(16),
            SL => Some(4),
            SS => Some(2),
            ST => Some(1024),
            TM => Some(16),
            UI => Some(64),
            UL => Some(4),
            US => Some(2),
            OB | OD | OF | OL | OW | SQ | UC | UN | UR | UT | Unknown | NotSupported => None,
        }
    }

    /// Whether the explicit VR wire form of this representation uses the
    /// 2-byte reserved field followed by a 32-bit length.
    pub fn has_long_length_form(self) -> bool {
        use VR::*;
        matches!(self, OB | OD | OF | OL | OW | SQ | UC | UN | UR | UT | Unknown)
    }
}

/// Obtain the value representation corresponding to the given string.
/// The string should hold exactly two UTF-8 encoded alphabetic characters
/// in upper case, otherwise no match is made.
impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FL" => Ok(FL),
            "FD" => Ok(FD),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OD" => Ok(OD),
            "OF" => Ok(OF),
            "OL" => Ok(OL),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UC" => Ok(UC),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "UR" => Ok(UR),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(VR::to_str(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vr_string_round_trip() {
        for text in [
            "AE", "AS", "AT", "CS", "DA", "DS", "DT", "FL", "FD", "IS", "LO", "LT", "OB", "OD",
            "OF", "OL", "OW", "PN", "SH", "SL", "SQ", "SS", "ST", "TM", "UC", "UI", "UL", "UN",
            "UR", "US", "UT",
        ] {
            let vr: VR = text.parse().unwrap();
            assert_eq!(vr.to_str(), text);
        }
        assert!("ZZ".parse::<VR>().is_err());
        assert_eq!(VR::from_binary([b'P', b'N']), Some(VR::PN));
        assert_eq!(VR::from_binary([0x00, 0xFF]), None);
    }

    #[test]
    fn vr_classification() {
        assert_eq!(VR::PN.kind(), VrKind::String);
        assert_eq!(VR::UL.kind(), VrKind::UnsignedInteger);
        assert_eq!(VR::SS.kind(), VrKind::SignedInteger);
        assert_eq!(VR::FD.kind(), VrKind::Float);
        assert_eq!(VR::OW.kind(), VrKind::Binary);
        assert_eq!(VR::SQ.kind(), VrKind::Sequence);
        assert_eq!(VR::AT.kind(), VrKind::AttributeTag);
        assert_eq!(VR::Unknown.kind(), VrKind::Internal);
        assert_eq!(VR::NotSupported.kind(), VrKind::Internal);

        assert!(VR::PN.is_textual());
        assert!(!VR::UI.is_textual());
        assert!(VR::UI.is_string());
    }

    #[test]
    fn vr_length_bounds() {
        assert_eq!(VR::LO.max_length(), Some(64));
        assert_eq!(VR::UI.max_length(), Some(64));
        assert_eq!(VR::UT.max_length(), None);
        assert!(VR::OB.has_long_length_form());
        assert!(VR::SQ.has_long_length_form());
        assert!(!VR::LO.has_long_length_form());
    }
}
