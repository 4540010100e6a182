//! The transfer syntaxes understood by the reader and writer.

/// An uncompressed transfer syntax.
///
/// Encapsulated (compressed) syntaxes are outside the scope of this
/// engine and are rejected at the parser boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSyntax {
    /// Implicit VR Little Endian: Default Transfer Syntax for DICOM
    ImplicitVRLittleEndian,
    /// Explicit VR Little Endian
    ExplicitVRLittleEndian,
    /// Explicit VR Big Endian (retired, still found in archives)
    ExplicitVRBigEndian,
}

impl TransferSyntax {
    /// The unique identifier registered for this transfer syntax.
    pub fn uid(self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVRLittleEndian => "1.2.840.10008.1.2",
            TransferSyntax::ExplicitVRLittleEndian => "1.2.840.10008.1.2.1",
            TransferSyntax::ExplicitVRBigEndian => "1.2.840.10008.1.2.2",
        }
    }

    /// Resolve a transfer syntax from its UID.
    pub fn from_uid(uid: &str) -> Option<Self> {
        match uid.trim_end_matches(['\0', ' ']) {
            "1.2.840.10008.1.2" => Some(TransferSyntax::ImplicitVRLittleEndian),
            "1.2.840.10008.1.2.1" => Some(TransferSyntax::ExplicitVRLittleEndian),
            "1.2.840.10008.1.2.2" => Some(TransferSyntax::ExplicitVRBigEndian),
            _ => None,
        }
    }

    /// Whether data elements carry their VR on the wire.
    pub fn explicit_vr(self) -> bool {
        !matches!(self, TransferSyntax::ImplicitVRLittleEndian)
    }

    /// Whether multi-byte values are big endian.
    pub fn big_endian(self) -> bool {
        matches!(self, TransferSyntax::ExplicitVRBigEndian)
    }
}
