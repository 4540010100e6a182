//! Conversion between declared DICOM character sets and UTF-8.
//!
//! Decoding supports ISO 2022 code extensions: escape sequences may
//! switch the active G0/G1 code elements in the middle of a value.
//! Encoding always targets a single character set; code extensions are
//! never produced.

use crate::charset::Encoding;
use dcmio_core::error::{BadFileFormatSnafu, BadParameterTypeSnafu, Result};
use encoding::all::{
    ASCII, EUC_JP, GB18030, GBK, ISO_2022_JP, ISO_8859_1, ISO_8859_2, ISO_8859_3, ISO_8859_4,
    ISO_8859_5, ISO_8859_6, ISO_8859_7, ISO_8859_8, UTF_8, WINDOWS_1251, WINDOWS_1252,
    WINDOWS_1254, WINDOWS_31J, WINDOWS_874, WINDOWS_949,
};
use encoding::{DecoderTrap, EncoderTrap, Encoding as _, EncodingRef};
use tracing::warn;

fn codec_for(encoding: Encoding) -> EncodingRef {
    use Encoding::*;
    match encoding {
        Ascii => ASCII,
        Utf8 => UTF_8,
        Latin1 => ISO_8859_1,
        Latin2 => ISO_8859_2,
        Latin3 => ISO_8859_3,
        Latin4 => ISO_8859_4,
        // ISO 8859-9 is handled through its windows-1254 superset
        Latin5 => WINDOWS_1254,
        Cyrillic => ISO_8859_5,
        Arabic => ISO_8859_6,
        Greek => ISO_8859_7,
        Hebrew => ISO_8859_8,
        // TIS 620 is handled through its windows-874 superset
        Thai => WINDOWS_874,
        Japanese => WINDOWS_31J,
        JapaneseKanji => ISO_2022_JP,
        Korean => WINDOWS_949,
        ChineseGb18030 => GB18030,
        ChineseGbk => GBK,
        Windows1251 => WINDOWS_1251,
        Windows1252 => WINDOWS_1252,
    }
}

/// Decode raw element bytes into UTF-8 text.
///
/// When `has_code_extensions` is set, ISO 2022 escape sequences inside
/// the value are honoured; otherwise the whole value is interpreted in
/// the single given character set. Undecodable byte sequences are
/// replaced, not fatal.
pub fn convert_to_utf8(
    bytes: &[u8],
    encoding: Encoding,
    has_code_extensions: bool,
) -> Result<String> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    if has_code_extensions {
        return decode_with_code_extensions(bytes, encoding);
    }
    match encoding {
        Encoding::Ascii => Ok(to_ascii(bytes)),
        Encoding::Utf8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => decode_bytes(bytes, codec_for(encoding)),
    }
}

/// Encode UTF-8 text into the given character set.
///
/// Fails when the text holds characters which the target set cannot
/// represent, except for ASCII, where characters outside the default
/// repertoire are removed.
pub fn convert_from_utf8(text: &str, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Ascii => Ok(text.chars().filter(char::is_ascii).map(|c| c as u8).collect()),
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        _ => {
            let codec = codec_for(encoding);
            codec.encode(text, EncoderTrap::Strict).map_err(|e| {
                BadParameterTypeSnafu {
                    message: format!("cannot represent text in {}: {}", codec.name(), e),
                }
                .build()
            })
        }
    }
}

fn decode_bytes(bytes: &[u8], codec: EncodingRef) -> Result<String> {
    codec.decode(bytes, DecoderTrap::Replace).map_err(|e| {
        BadFileFormatSnafu {
            message: format!("cannot decode text as {}: {}", codec.name(), e),
        }
        .build()
    })
}

/// Keep only characters of the default repertoire.
fn to_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .copied()
        .filter(|&b| (0x20..0x7F).contains(&b) || b == b'\t' || b == b'\n' || b == b'\r')
        .map(char::from)
        .collect()
}

/// An ISO 2022 code element designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeElement {
    /// ISO 646 (also covers JIS X 0201 romaji)
    Ascii,
    /// JIS X 0201 katakana
    Katakana,
    /// JIS X 0208 kanji
    JisX0208,
    /// JIS X 0212 supplementary kanji
    JisX0212,
    /// KS X 1001 hangul and hanja
    KsX1001,
    /// GB 2312 simplified hanzi
    Gb2312,
    /// right-hand half of a single-byte repertoire
    SingleByte(Encoding),
}

/// The G0/G1 code elements designated before any escape sequence,
/// as implied by the first value of Specific Character Set.
fn initial_code_elements(base: Encoding) -> (CodeElement, CodeElement) {
    use Encoding::*;
    match base {
        Japanese | JapaneseKanji => (CodeElement::Ascii, CodeElement::Katakana),
        Korean => (CodeElement::Ascii, CodeElement::KsX1001),
        Latin1 | Latin2 | Latin3 | Latin4 | Latin5 | Cyrillic | Arabic | Greek | Hebrew
        | Thai => (CodeElement::Ascii, CodeElement::SingleByte(base)),
        _ => (CodeElement::Ascii, CodeElement::Ascii),
    }
}

fn decode_with_code_extensions(bytes: &[u8], base: Encoding) -> Result<String> {
    let (mut g0, mut g1) = initial_code_elements(base);
    let mut out = String::new();
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != 0x1B {
            i += 1;
            continue;
        }
        decode_segment(&bytes[segment_start..i], g0, g1, &mut out)?;
        // escape sequence: ESC, intermediates in 0x20-0x2F, final in 0x30-0x7E
        let mut end = i + 1;
        while end < bytes.len() && (0x20..=0x2F).contains(&bytes[end]) {
            end += 1;
        }
        if end < bytes.len() {
            end += 1;
        }
        apply_designation(&bytes[i..end], &mut g0, &mut g1);
        i = end;
        segment_start = end;
    }
    decode_segment(&bytes[segment_start..], g0, g1, &mut out)?;
    Ok(out)
}

fn apply_designation(sequence: &[u8], g0: &mut CodeElement, g1: &mut CodeElement) {
    use CodeElement::{Gb2312, JisX0208, JisX0212, Katakana, KsX1001, SingleByte};
    match &sequence[1..] {
        b"(B" | b"(J" => *g0 = CodeElement::Ascii,
        b"(I" => *g0 = Katakana,
        b")I" => *g1 = Katakana,
        b"$@" | b"$B" => *g0 = JisX0208,
        b"$(D" => *g0 = JisX0212,
        b"$)C" => *g1 = KsX1001,
        b"$)A" => *g1 = Gb2312,
        b"-A" => *g1 = SingleByte(Encoding::Latin1),
        b"-B" => *g1 = SingleByte(Encoding::Latin2),
        b"-C" => *g1 = SingleByte(Encoding::Latin3),
        b"-D" => *g1 = SingleByte(Encoding::Latin4),
        b"-F" => *g1 = SingleByte(Encoding::Greek),
        b"-G" => *g1 = SingleByte(Encoding::Arabic),
        b"-H" => *g1 = SingleByte(Encoding::Hebrew),
        b"-L" => *g1 = SingleByte(Encoding::Cyrillic),
        b"-M" => *g1 = SingleByte(Encoding::Latin5),
        b"-T" => *g1 = SingleByte(Encoding::Thai),
        other => {
            warn!("unsupported ISO 2022 escape sequence {:02X?}, ignoring", other);
        }
    }
}

fn decode_segment(
    segment: &[u8],
    g0: CodeElement,
    g1: CodeElement,
    out: &mut String,
) -> Result<()> {
    if segment.is_empty() {
        return Ok(());
    }
    match g0 {
        CodeElement::JisX0208 => {
            // hand the segment back to the ISO 2022 JP codec, which owns
            // the multi-byte state machine
            let mut framed = Vec::with_capacity(segment.len() + 3);
            framed.extend_from_slice(b"\x1B$B");
            framed.extend_from_slice(segment);
            out.push_str(&decode_bytes(&framed, ISO_2022_JP)?);
            return Ok(());
        }
        CodeElement::JisX0212 => {
            // JIS X 0212 pairs are expressed in EUC-JP under the SS3 prefix
            let mut euc = Vec::with_capacity(segment.len() / 2 * 3);
            for pair in segment.chunks_exact(2) {
                euc.extend_from_slice(&[0x8F, pair[0] | 0x80, pair[1] | 0x80]);
            }
            out.push_str(&decode_bytes(&euc, EUC_JP)?);
            return Ok(());
        }
        CodeElement::Katakana => {
            // 7-bit katakana: shift into the GR range of JIS X 0201
            let shifted: Vec<u8> = segment
                .iter()
                .map(|&b| {
                    if (0x21..=0x5F).contains(&b) {
                        b + 0x80
                    } else {
                        b
                    }
                })
                .collect();
            out.push_str(&decode_bytes(&shifted, WINDOWS_31J)?);
            return Ok(());
        }
        _ => {}
    }

    // G0 is the default repertoire; G1 rules the right-hand half
    match g1 {
        CodeElement::Katakana => out.push_str(&decode_bytes(segment, WINDOWS_31J)?),
        CodeElement::KsX1001 => out.push_str(&decode_bytes(segment, WINDOWS_949)?),
        CodeElement::Gb2312 => out.push_str(&decode_bytes(segment, GBK)?),
        CodeElement::SingleByte(encoding) => {
            out.push_str(&decode_bytes(segment, codec_for(encoding))?)
        }
        _ => out.push_str(&to_ascii(segment)),
    }
    Ok(())
}
