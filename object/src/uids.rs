//! Unique identifier generation and the identifiers of this implementation.

use uuid::Uuid;

/// The registered root under which this site issues unique identifiers.
pub const SITE_UID_ROOT: &str = "1.2.826.0.1.3680043.10.1451";
/// Root for generated Study Instance UIDs.
pub const SITE_STUDY_UID_ROOT: &str = "1.2.826.0.1.3680043.10.1451.2";
/// Root for generated Series Instance UIDs.
pub const SITE_SERIES_UID_ROOT: &str = "1.2.826.0.1.3680043.10.1451.3";
/// Root for generated SOP Instance UIDs.
pub const SITE_INSTANCE_UID_ROOT: &str = "1.2.826.0.1.3680043.10.1451.4";

/// The Implementation Class UID written into file meta headers.
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.10.1451.0.1";
/// The Implementation Version Name written into file meta headers.
pub const IMPLEMENTATION_VERSION_NAME: &str = "DCMIO_01";

/// The DICOM resource levels for which identifiers can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLevel {
    /// Patient: identified by Patient ID (0010,0020)
    Patient,
    /// Study: identified by Study Instance UID (0020,000D)
    Study,
    /// Series: identified by Series Instance UID (0020,000E)
    Series,
    /// Instance: identified by SOP Instance UID (0008,0018)
    Instance,
}

/// Generate a fresh identifier for the given resource level.
///
/// The Patient ID attribute is of type LO (64 bytes maximum); a UUID is
/// 36 characters long, so its string form is used directly. The three
/// instance levels produce proper UIDs under the site roots, never
/// exceeding the 64-character bound of the UI representation.
pub fn generate_unique_identifier(level: ResourceLevel) -> String {
    match level {
        ResourceLevel::Patient => Uuid::new_v4().to_string(),
        ResourceLevel::Study => generate_uid(SITE_STUDY_UID_ROOT),
        ResourceLevel::Series => generate_uid(SITE_SERIES_UID_ROOT),
        ResourceLevel::Instance => generate_uid(SITE_INSTANCE_UID_ROOT),
    }
}

fn generate_uid(root: &str) -> String {
    let mut suffix = Uuid::new_v4().as_u128().to_string();
    suffix.truncate(64 - root.len() - 1);
    format!("{}.{}", root, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_identifiers_are_uuids() {
        let id = generate_unique_identifier(ResourceLevel::Patient);
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }

    #[test]
    fn generated_uids_use_the_site_roots() {
        let study = generate_unique_identifier(ResourceLevel::Study);
        let series = generate_unique_identifier(ResourceLevel::Series);
        let instance = generate_unique_identifier(ResourceLevel::Instance);
        assert!(study.starts_with(SITE_STUDY_UID_ROOT));
        assert!(series.starts_with(SITE_SERIES_UID_ROOT));
        assert!(instance.starts_with(SITE_INSTANCE_UID_ROOT));
        for uid in [study, series, instance] {
            assert!(uid.len() <= 64);
            assert!(uid.bytes().all(|b| b.is_ascii_digit() || b == b'.'));
        }
    }

    #[test]
    fn generated_uids_are_unique() {
        let a = generate_unique_identifier(ResourceLevel::Instance);
        let b = generate_unique_identifier(ResourceLevel::Instance);
        assert_ne!(a, b);
    }
}
