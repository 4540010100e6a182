//! File meta information synthesis.
//!
//! The writer never emits a dataset without a valid group 0002 header:
//! missing parts are derived from the payload or stamped with the
//! identifiers of this implementation.

use crate::mem::Dataset;
use crate::mem::Element;
use crate::transfer_syntax::TransferSyntax;
use crate::uids;
use dcmio_core::{tags, VR};

/// A builder for file meta information datasets.
#[derive(Debug, Clone, Default)]
pub struct FileMetaBuilder {
    media_storage_sop_class_uid: Option<String>,
    media_storage_sop_instance_uid: Option<String>,
    transfer_syntax: Option<String>,
}

impl FileMetaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        FileMetaBuilder::default()
    }

    /// Take over the storage SOP identifiers of an existing meta dataset.
    pub fn seed_from(mut self, meta: &Dataset) -> Self {
        if let Some(value) = meta.string_value(tags::MEDIA_STORAGE_SOP_CLASS_UID) {
            self.media_storage_sop_class_uid = Some(value);
        }
        if let Some(value) = meta.string_value(tags::MEDIA_STORAGE_SOP_INSTANCE_UID) {
            self.media_storage_sop_instance_uid = Some(value);
        }
        self
    }

    /// Derive the storage SOP identifiers from the payload dataset,
    /// overriding any seeded values.
    pub fn derive_from(mut self, dataset: &Dataset) -> Self {
        if let Some(value) = dataset.string_value(tags::SOP_CLASS_UID) {
            self.media_storage_sop_class_uid = Some(value);
        }
        if let Some(value) = dataset.string_value(tags::SOP_INSTANCE_UID) {
            self.media_storage_sop_instance_uid = Some(value);
        }
        self
    }

    /// Define the transfer syntax of the payload.
    pub fn transfer_syntax(mut self, ts: TransferSyntax) -> Self {
        self.transfer_syntax = Some(ts.uid().to_string());
        self
    }

    /// Build the meta information dataset.
    ///
    /// The group length element is inserted with a placeholder value;
    /// the writer recalculates it when the group is encoded.
    pub fn build(self) -> Dataset {
        let mut meta = Dataset::new();
        meta.put(Element::with_bytes(
            tags::FILE_META_INFORMATION_GROUP_LENGTH,
            VR::UL,
            vec![0, 0, 0, 0],
        ));
        meta.put(Element::with_bytes(
            tags::FILE_META_INFORMATION_VERSION,
            VR::OB,
            vec![0, 1],
        ));
        meta.put_str(
            tags::MEDIA_STORAGE_SOP_CLASS_UID,
            VR::UI,
            self.media_storage_sop_class_uid.as_deref().unwrap_or(""),
        );
        meta.put_str(
            tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
            VR::UI,
            self.media_storage_sop_instance_uid.as_deref().unwrap_or(""),
        );
        meta.put_str(
            tags::TRANSFER_SYNTAX_UID,
            VR::UI,
            self.transfer_syntax
                .as_deref()
                .unwrap_or_else(|| TransferSyntax::ExplicitVRLittleEndian.uid()),
        );
        meta.put_str(
            tags::IMPLEMENTATION_CLASS_UID,
            VR::UI,
            uids::IMPLEMENTATION_CLASS_UID,
        );
        meta.put_str(
            tags::IMPLEMENTATION_VERSION_NAME,
            VR::SH,
            uids::IMPLEMENTATION_VERSION_NAME,
        );
        meta
    }
}

/// Validate or synthesize the meta information for writing the given
/// payload with the given transfer syntax.
pub fn validate_meta(
    existing: Option<&Dataset>,
    dataset: &Dataset,
    ts: TransferSyntax,
) -> Dataset {
    let mut builder = FileMetaBuilder::new();
    if let Some(meta) = existing {
        builder = builder.seed_from(meta);
    }
    builder.derive_from(dataset).transfer_syntax(ts).build()
}
