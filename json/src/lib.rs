#![deny(unsafe_code)]
#![warn(missing_docs)]

//! JSON projections of DICOM datasets.
//!
//! Datasets are emitted in three shapes:
//!
//! - *Short*: `{ "ggggeeee": value }`;
//! - *Human*: `{ "TagName": value }`, using the dictionary's symbolic
//!   names;
//! - *Full*: `{ "ggggeeee": { "Name", "Type", "Value" } }`, optionally
//!   carrying the private creator.
//!
//! The same three shapes are accepted when building a dataset from JSON.
//! Values are always UTF-8; kept binary content travels as `data:` URIs.

pub mod de;
pub mod ser;

pub use de::{json_to_dataset, map_from_json};
pub use ser::{dataset_to_json, map_to_json, meta_to_json, JsonFormat};

pub use dcmio_object::ConversionFlags;
