#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Character repertoire handling for the `dcmio` DICOM toolkit.
//!
//! The character repertoires supported by DICOM include:
//! - ISO 8859 parts 1 to 9
//! - JIS X 0201-1976 Code for Information Interchange
//! - JIS X 0208-1990 Japanese Graphic Character set
//! - JIS X 0212-1990 supplementary Japanese Graphic Character set
//! - KS X 1001 (registered as ISO-IR 149) for the Korean language
//! - TIS 620-2533 (1990) Thai Characters Code for Information Interchange
//! - ISO 10646-1 (UTF-8)
//! - GB 18030 and GBK
//!
//! All textual output of the toolkit is UTF-8; this crate performs the
//! conversion in both directions, honouring ISO 2022 code extensions on
//! the way in.

pub mod charset;
pub mod convert;

pub use charset::{detect_specific_character_set, Encoding};
pub use convert::{convert_from_utf8, convert_to_utf8};
