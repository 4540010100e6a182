//! The error kinds surfaced by every crate of the toolkit.
//!
//! The set is closed on purpose:
//! callers dispatch on the kind,
//! so new variants are a breaking change.

use snafu::Snafu;

/// Type alias for a result using the toolkit error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type of the toolkit.
///
/// Malformed values inside a single data element are recoverable and never
/// produce an error (the codec yields a null value instead); these variants
/// cover structural and usage failures which abort the whole operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum Error {
    /// A textual tag form could not be interpreted.
    #[snafu(display("invalid DICOM tag: \"{}\"", text))]
    InvalidTag {
        /// the offending text
        text: String,
    },
    /// The byte stream or value layout does not follow the expected format.
    #[snafu(display("bad file format: {}", message))]
    BadFileFormat {
        /// details of the failure
        message: String,
    },
    /// A parameter had an unexpected type (e.g. a JSON array where an
    /// object was required).
    #[snafu(display("bad parameter type: {}", message))]
    BadParameterType {
        /// details of the failure
        message: String,
    },
    /// A parameter was outside its admissible range.
    #[snafu(display("parameter out of range: {}", message))]
    ParameterOutOfRange {
        /// details of the failure
        message: String,
    },
    /// A symbolic name does not resolve to any dictionary entry.
    #[snafu(display("unknown DICOM tag: \"{}\"", name))]
    UnknownDicomTag {
        /// the name which failed to resolve
        name: String,
    },
    /// An attempt to register a second dictionary entry under a name
    /// already taken.
    #[snafu(display(
        "cannot register two tags with the same symbolic name \"{}\"",
        name
    ))]
    AlreadyExistingTag {
        /// the contested symbolic name
        name: String,
    },
    /// A declared dictionary file could not be read.
    #[snafu(display("cannot read dictionary file \"{}\"", path))]
    MissingFile {
        /// path of the unreadable file
        path: String,
    },
    /// An invariant of the library itself was broken.
    #[snafu(display("internal error: {}", message))]
    InternalError {
        /// details of the failure
        message: String,
    },
    /// The requested operation is not implemented for the given input.
    #[snafu(display("not implemented: {}", message))]
    NotImplemented {
        /// details of the request
        message: String,
    },
}
