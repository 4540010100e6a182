//! The supported character sets and the Specific Character Set
//! detection rule.

use tracing::warn;

/// An enum type for the supported character sets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Encoding {
    /// The default repertoire (ISO-IR 6); bytes above 0x7F are dropped.
    Ascii,
    /// Unicode in UTF-8 (ISO-IR 192).
    Utf8,
    /// ISO 8859-1, Western European (ISO-IR 100).
    Latin1,
    /// ISO 8859-2, Central European (ISO-IR 101).
    Latin2,
    /// ISO 8859-3, South European (ISO-IR 109).
    Latin3,
    /// ISO 8859-4, North European (ISO-IR 110).
    Latin4,
    /// ISO 8859-9, Turkish (ISO-IR 148).
    Latin5,
    /// ISO 8859-5, Cyrillic (ISO-IR 144).
    Cyrillic,
    /// ISO 8859-6, Arabic (ISO-IR 127).
    Arabic,
    /// ISO 8859-7, Greek (ISO-IR 126).
    Greek,
    /// ISO 8859-8, Hebrew (ISO-IR 138).
    Hebrew,
    /// TIS 620-2533, Thai (ISO-IR 166).
    Thai,
    /// JIS X 0201, Japanese romaji and half-width katakana (ISO-IR 13).
    Japanese,
    /// JIS X 0208 kanji through ISO 2022 escapes (ISO 2022 IR 87).
    JapaneseKanji,
    /// KS X 1001, Korean (ISO 2022 IR 149).
    Korean,
    /// GB 18030, Simplified Chinese.
    ChineseGb18030,
    /// GBK, Simplified Chinese.
    ChineseGbk,
    /// Windows code page 1251, Cyrillic.
    Windows1251,
    /// Windows code page 1252, Western European.
    Windows1252,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Ascii
    }
}

impl Encoding {
    /// Map a DICOM defined term of Specific Character Set (0008,0005)
    /// to the corresponding encoding. Both the `ISO_IR` and the
    /// `ISO 2022 IR` (code extension) families are recognised.
    pub fn from_dicom_code(code: &str) -> Option<Self> {
        use Encoding::*;
        match code.trim() {
            "ISO_IR 6" | "ISO 2022 IR 6" => Some(Ascii),
            "ISO_IR 192" => Some(Utf8),
            "ISO_IR 100" | "ISO 2022 IR 100" => Some(Latin1),
            "ISO_IR 101" | "ISO 2022 IR 101" => Some(Latin2),
            "ISO_IR 109" | "ISO 2022 IR 109" => Some(Latin3),
            "ISO_IR 110" | "ISO 2022 IR 110" => Some(Latin4),
            "ISO_IR 148" | "ISO 2022 IR 148" => Some(Latin5),
            "ISO_IR 144" | "ISO 2022 IR 144" => Some(Cyrillic),
            "ISO_IR 127" | "ISO 2022 IR 127" => Some(Arabic),
            "ISO_IR 126" | "ISO 2022 IR 126" => Some(Greek),
            "ISO_IR 138" | "ISO 2022 IR 138" => Some(Hebrew),
            "ISO_IR 166" | "ISO 2022 IR 166" => Some(Thai),
            "ISO_IR 13" | "ISO 2022 IR 13" => Some(Japanese),
            "ISO 2022 IR 87" | "ISO 2022 IR 159" => Some(JapaneseKanji),
            "ISO 2022 IR 149" => Some(Korean),
            "GB18030" => Some(ChineseGb18030),
            "GBK" => Some(ChineseGbk),
            "WINDOWS_1251" => Some(Windows1251),
            "WINDOWS_1252" => Some(Windows1252),
            _ => None,
        }
    }

    /// The canonical defined term to write into Specific Character Set
    /// (0008,0005) for this encoding.
    pub fn dicom_code(self) -> &'static str {
        use Encoding::*;
        match self {
            Ascii => "ISO_IR 6",
            Utf8 => "ISO_IR 192",
            Latin1 => "ISO_IR 100",
            Latin2 => "ISO_IR 101",
            Latin3 => "ISO_IR 109",
            Latin4 => "ISO_IR 110",
            Latin5 => "ISO_IR 148",
            Cyrillic => "ISO_IR 144",
            Arabic => "ISO_IR 127",
            Greek => "ISO_IR 126",
            Hebrew => "ISO_IR 138",
            Thai => "ISO_IR 166",
            Japanese => "ISO_IR 13",
            JapaneseKanji => "ISO 2022 IR 87",
            Korean => "ISO 2022 IR 149",
            ChineseGb18030 => "GB18030",
            ChineseGbk => "GBK",
            Windows1251 => "WINDOWS_1251",
            Windows1252 => "WINDOWS_1252",
        }
    }
}

/// Interpret the value of Specific Character Set (0008,0005) and return
/// the active encoding together with the code extension marker.
///
/// The value is split on the backslash separator; a component count above
/// one signals ISO 2022 code extensions even when the first component is
/// empty. The first recognised component wins; an unrecognised component
/// falls back to ASCII with a diagnostic. A missing element (`None`)
/// yields the given default with no code extensions.
pub fn detect_specific_character_set(
    value: Option<&str>,
    default_encoding: Encoding,
) -> (Encoding, bool) {
    let value = match value {
        Some(value) => value,
        None => return (default_encoding, false),
    };

    let components: Vec<&str> = value.split('\\').collect();
    let has_code_extensions = components.len() > 1;

    for component in components {
        let character_set = component.trim();
        if character_set.is_empty() {
            continue;
        }
        return match Encoding::from_dicom_code(character_set) {
            Some(encoding) => (encoding, has_code_extensions),
            None => {
                warn!(
                    "value of Specific Character Set (0008,0005) is not supported: {}, \
                     fallback to ASCII (remove all special characters)",
                    character_set
                );
                (Encoding::Ascii, has_code_extensions)
            }
        };
    }

    // only empty components: use the default encoding
    (default_encoding, has_code_extensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_codes() {
        assert_eq!(Encoding::from_dicom_code("ISO_IR 100"), Some(Encoding::Latin1));
        assert_eq!(Encoding::from_dicom_code("ISO_IR 192"), Some(Encoding::Utf8));
        assert_eq!(
            Encoding::from_dicom_code("ISO 2022 IR 87"),
            Some(Encoding::JapaneseKanji)
        );
        assert_eq!(Encoding::from_dicom_code(" GB18030 "), Some(Encoding::ChineseGb18030));
        assert_eq!(Encoding::from_dicom_code("ISO_IR 999"), None);
    }

    #[test]
    fn code_round_trip() {
        for encoding in [
            Encoding::Ascii,
            Encoding::Utf8,
            Encoding::Latin1,
            Encoding::Latin5,
            Encoding::Cyrillic,
            Encoding::Thai,
            Encoding::Japanese,
            Encoding::JapaneseKanji,
            Encoding::Korean,
            Encoding::ChineseGb18030,
        ] {
            assert_eq!(
                Encoding::from_dicom_code(encoding.dicom_code()),
                Some(encoding)
            );
        }
    }

    #[test]
    fn detect_single_component() {
        let (encoding, ext) = detect_specific_character_set(Some("ISO_IR 100"), Encoding::Ascii);
        assert_eq!(encoding, Encoding::Latin1);
        assert!(!ext);
    }

    #[test]
    fn detect_leading_empty_component() {
        let (encoding, ext) =
            detect_specific_character_set(Some("\\ISO 2022 IR 87"), Encoding::Ascii);
        assert_eq!(encoding, Encoding::JapaneseKanji);
        assert!(ext);
    }

    #[test]
    fn detect_unknown_code_falls_back_to_ascii() {
        let (encoding, ext) =
            detect_specific_character_set(Some("ISO_IR 999"), Encoding::Latin1);
        assert_eq!(encoding, Encoding::Ascii);
        assert!(!ext);
    }

    #[test]
    fn detect_missing_element_uses_default() {
        let (encoding, ext) = detect_specific_character_set(None, Encoding::Latin1);
        assert_eq!(encoding, Encoding::Latin1);
        assert!(!ext);
    }

    #[test]
    fn detect_empty_value_uses_default() {
        let (encoding, ext) = detect_specific_character_set(Some(""), Encoding::Latin2);
        assert_eq!(encoding, Encoding::Latin2);
        assert!(!ext);
    }
}
