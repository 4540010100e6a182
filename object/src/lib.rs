#![deny(unsafe_code)]
#![warn(missing_docs)]

//! In-memory DICOM datasets and their transformations.
//!
//! This crate carries the mutable dataset model ([`Dataset`], [`Element`],
//! [`FileFormat`]), the VR-dispatched element codec, the recursive dataset
//! walker with its visitor contract, and the byte-level reader and writer
//! for the uncompressed transfer syntaxes.
//!
//! The element dictionary of `dcmio-core` must be initialised before
//! datasets are parsed or built.

pub mod codec;
pub mod mem;
pub mod meta;
pub mod read;
pub mod transfer_syntax;
pub mod uids;
pub mod util;
pub mod walker;
pub mod write;

pub use codec::{
    convert_leaf_element, create_element_for_tag, extract_summary, fill_element, ConversionFlags,
};
pub use mem::{Dataset, Element, ElementValue, FileFormat};
pub use transfer_syntax::TransferSyntax;
pub use walker::{apply, change_string_encoding, BinaryView, StringAction, TagVisitor};
