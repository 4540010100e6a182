//! Small helpers shared across the crate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dcmio_core::VR;

/// The scheme prefix of inline binary payloads.
pub const DATA_URI_SCHEME_PREFIX: &str = "data:";

/// Strip the padding bytes which DICOM appends to even out value lengths
/// (trailing spaces for text, a trailing NUL for UIDs).
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b' ' || bytes[end - 1] == 0) {
        end -= 1;
    }
    &bytes[..end]
}

/// Decode a `data:<mime>;base64,<payload>` URI into its MIME type and
/// raw bytes. Returns `None` when the URI is not in that shape.
pub fn decode_data_uri_scheme(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix(DATA_URI_SCHEME_PREFIX)?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

/// Format raw bytes as a `data:` URI with a base64 payload.
pub fn format_data_uri_scheme(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// The width in bytes of the machine words making up values of this
/// representation, for endianness conversion. Byte-grained content has
/// a width of one.
pub(crate) fn word_size(vr: VR) -> usize {
    match vr {
        VR::US | VR::SS | VR::OW | VR::AT => 2,
        VR::UL | VR::SL | VR::OL | VR::FL | VR::OF => 4,
        VR::FD | VR::OD => 8,
        _ => 1,
    }
}

/// Reverse the byte order of every word in the value. An involution:
/// the same call converts between big endian and the internal little
/// endian form in both directions. Trailing partial words are left as
/// they are.
pub(crate) fn byte_swap_words(bytes: &mut [u8], vr: VR) {
    let width = word_size(vr);
    if width == 1 {
        return;
    }
    for chunk in bytes.chunks_exact_mut(width) {
        chunk.reverse();
    }
}
