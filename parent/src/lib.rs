//! This crate serves as a parent for the library crates of the dcmio
//! project: a DICOM dataset codec and transformation engine.
//!
//! For parsing, mutating and writing datasets, see [`object`];
//! for the JSON projections, see [`json`].
pub use dcmio_core as core;
pub use dcmio_encoding as encoding;
pub use dcmio_json as json;
pub use dcmio_object as object;
