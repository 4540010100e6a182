#![deny(unsafe_code)]
#![warn(missing_docs)]

//! This crate contains the base types of the `dcmio` DICOM toolkit:
//! the attribute tag and value representation models,
//! the simplified dataset projection ([`DicomMap`]),
//! the closed set of error kinds,
//! and the process-wide data element dictionary.
//!
//! The dictionary must be initialised once,
//! before any dataset is parsed or built:
//!
//! ```no_run
//! dcmio_core::dictionary::initialize(true).unwrap();
//! ```

pub mod dictionary;
pub mod error;
pub mod tag;
pub mod tags;
pub mod value;
pub mod vr;

pub use error::{Error, Result};
pub use tag::Tag;
pub use value::{DicomMap, DicomValue};
pub use vr::{VrKind, VR};
