//! The process-wide data element dictionary.
//!
//! The dictionary drives value representation resolution for implicit
//! transfer syntaxes, symbolic name lookup, and private tag handling.
//! It is a singleton guarded by a reader-writer lock: lookups take the
//! shared lock, [`initialize`] and [`register_tag`] take the exclusive
//! lock. The lock is never exposed and every lookup hands out an owned
//! copy of the entry.
//!
//! [`initialize`] must run once before any dataset is parsed. Additional
//! entries may be registered afterwards, but existing names are never
//! replaced.

use crate::error::{
    AlreadyExistingTagSnafu, InternalSnafu, InvalidTagSnafu, MissingFileSnafu,
    ParameterOutOfRangeSnafu, Result, UnknownDicomTagSnafu,
};
use crate::tag::Tag;
use crate::tags;
use crate::vr::VR;
use lazy_static::lazy_static;
use snafu::ensure;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{env, fs};
use tracing::{info, warn};

/// Name of the environment variable holding the list of dictionary files
/// to load instead of the embedded resources
/// (separated by `:` on POSIX systems and by `;` on Windows).
pub const DICTIONARY_PATH_VARIABLE: &str = "DCMDICTPATH";

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

/// Compile-time default directory holding `dicom.dic` and `private.dic`.
const DEFAULT_DICTIONARY_DIR: Option<&str> = option_env!("DCMIO_DICTIONARY_DIR");

const EMBEDDED_DICOM_DICTIONARY: &str = include_str!("../data/dicom.dic");
const EMBEDDED_PRIVATE_DICTIONARY: &str = include_str!("../data/private.dic");

lazy_static! {
    static ref REGISTRY: RwLock<Registry> = RwLock::new(Registry::default());
}

/// The multiplicity range of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplicity {
    /// minimum number of components (at least 1)
    pub min: u32,
    /// maximum number of components; `None` when unbounded
    pub max: Option<u32>,
}

impl Multiplicity {
    /// A fixed multiplicity of exactly `n` components.
    pub fn fixed(n: u32) -> Self {
        Multiplicity {
            min: n,
            max: Some(n),
        }
    }

    /// A multiplicity of one component.
    pub fn single() -> Self {
        Multiplicity::fixed(1)
    }

    fn parse(text: &str) -> Option<Multiplicity> {
        match text.split_once('-') {
            None => {
                if text == "n" {
                    Some(Multiplicity { min: 1, max: None })
                } else {
                    let n: u32 = text.parse().ok()?;
                    Some(Multiplicity::fixed(n))
                }
            }
            Some((min, max)) => {
                let min: u32 = min.parse().ok()?;
                let max = if max.ends_with('n') {
                    None
                } else {
                    Some(max.parse().ok()?)
                };
                Some(Multiplicity { min, max })
            }
        }
    }
}

/// A dictionary entry, describing one attribute.
///
/// Lookup functions return owned copies of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    /// the attribute tag
    pub tag: Tag,
    /// the typical value representation of the attribute
    pub vr: VR,
    /// the symbolic name, globally unique, usually in UpperCamelCase
    pub name: String,
    /// the admissible number of components
    pub multiplicity: Multiplicity,
    /// the private creator scoping this entry, for private attributes
    pub private_creator: Option<String>,
}

#[derive(Debug, Default)]
struct Registry {
    /// exact tag -> entries (several when private blocks overlap)
    by_tag: HashMap<Tag, Vec<DictionaryEntry>>,
    /// private block entries keyed by (group, element low byte)
    private_blocks: HashMap<(u16, u8), Vec<DictionaryEntry>>,
    /// symbolic name -> entry
    by_name: HashMap<String, DictionaryEntry>,
    /// repeating groups of the form (GGxx,EEEE), with the `xx` part zeroed
    repeating_ggxx: HashSet<Tag>,
}

impl Registry {
    fn clear(&mut self) {
        self.by_tag.clear();
        self.private_blocks.clear();
        self.by_name.clear();
        self.repeating_ggxx.clear();
    }

    fn index(&mut self, spec: TagSpec, entry: DictionaryEntry) {
        if self.by_name.contains_key(&entry.name) {
            warn!("dictionary entry \"{}\" already defined, keeping the first definition", entry.name);
            return;
        }
        self.by_name.insert(entry.name.clone(), entry.clone());
        match spec {
            TagSpec::Single(tag) => {
                self.by_tag.entry(tag).or_default().push(entry);
            }
            TagSpec::GroupRange(tag) => {
                self.repeating_ggxx.insert(tag);
                self.by_tag.entry(tag).or_default().push(entry);
            }
            TagSpec::PrivateBlock { group, element } => {
                self.private_blocks
                    .entry((group, element))
                    .or_default()
                    .push(entry);
            }
        }
    }

    fn find(&self, tag: Tag, private_creator: Option<&str>) -> Option<&DictionaryEntry> {
        let creator_matches = |e: &&DictionaryEntry| e.private_creator.as_deref() == private_creator;

        if let Some(entries) = self.by_tag.get(&tag) {
            if let Some(entry) = entries.iter().rev().find(creator_matches) {
                return Some(entry);
            }
        }
        if tag.is_private() {
            if let Some(creator) = private_creator {
                let key = (tag.group(), (tag.element() & 0x00FF) as u8);
                if let Some(entries) = self.private_blocks.get(&key) {
                    if let Some(entry) = entries
                        .iter()
                        .rev()
                        .find(|e| e.private_creator.as_deref() == Some(creator))
                    {
                        return Some(entry);
                    }
                }
            }
        }
        let group_trimmed = Tag(tag.group() & 0xFF00, tag.element());
        if self.repeating_ggxx.contains(&group_trimmed) {
            if let Some(entries) = self.by_tag.get(&group_trimmed) {
                return entries.iter().rev().find(creator_matches);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagSpec {
    /// a fully specified tag
    Single(Tag),
    /// a repeating group `(GGxx,EEEE)`, with the `xx` part zeroed
    GroupRange(Tag),
    /// a private block entry `(gggg,"CREATOR",ee)`; the element is the
    /// offset inside the reserved block
    PrivateBlock { group: u16, element: u8 },
}

fn read_lock() -> RwLockReadGuard<'static, Registry> {
    match REGISTRY.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock() -> RwLockWriteGuard<'static, Registry> {
    match REGISTRY.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Initialise the dictionary.
///
/// The store is cleared, then filled from the first available source:
/// the files listed in [`DICTIONARY_PATH_VARIABLE`], the compiled-in
/// dictionary directory, or the embedded resources. The private tag
/// dictionary is only loaded when `load_private_dictionary` is set.
///
/// On completion the store is probed with a well-known attribute;
/// failure of this sanity check is fatal.
pub fn initialize(load_private_dictionary: bool) -> Result<()> {
    {
        let mut registry = write_lock();
        registry.clear();

        if let Ok(list) = env::var(DICTIONARY_PATH_VARIABLE) {
            for path in list.split(PATH_LIST_SEPARATOR).filter(|p| !p.is_empty()) {
                warn!("loading external DICOM dictionary: \"{}\"", path);
                load_dictionary_file(&mut registry, path)?;
            }
        } else if let Some(dir) = DEFAULT_DICTIONARY_DIR {
            for name in ["dicom.dic", "private.dic"] {
                let path = format!("{}/{}", dir, name);
                warn!("loading external DICOM dictionary: \"{}\"", path);
                load_dictionary_file(&mut registry, &path)?;
            }
        } else {
            info!("loading the embedded dictionaries");
            load_dictionary_text(&mut registry, EMBEDDED_DICOM_DICTIONARY);
            if load_private_dictionary {
                info!("loading the embedded dictionary of private tags");
                load_dictionary_text(&mut registry, EMBEDDED_PRIVATE_DICTIONARY);
            } else {
                info!("the dictionary of private tags has not been loaded");
            }
        }
    }

    // probe a well-known attribute to make sure the store was filled
    let probe = lookup_by_tag(tags::PATIENT_WEIGHT, None);
    ensure!(
        probe.map(|e| e.vr) == Some(VR::DS),
        InternalSnafu {
            message: "the DICOM dictionary has not been correctly read",
        }
    );
    Ok(())
}

fn load_dictionary_file(registry: &mut Registry, path: &str) -> Result<()> {
    let content = fs::read_to_string(path)
        .ok()
        .ok_or_else(|| MissingFileSnafu { path }.build())?;
    load_dictionary_text(registry, &content);
    Ok(())
}

/// Parse dictionary entries from text following the DICOM dictionary file
/// convention: one entry per line, tab-separated fields
/// `tag VR Name VM [version]`. Unparsable lines are skipped with a warning.
fn load_dictionary_text(registry: &mut Registry, text: &str) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_dictionary_line(line) {
            Some((spec, entry)) => registry.index(spec, entry),
            None => warn!("skipping malformed dictionary line: {}", line),
        }
    }
}

fn parse_dictionary_line(line: &str) -> Option<(TagSpec, DictionaryEntry)> {
    let mut fields = line.split('\t').filter(|f| !f.is_empty());
    let tag_field = fields.next()?;
    let vr_field = fields.next()?;
    let name = fields.next()?;
    let vm_field = fields.next()?;

    let (spec, private_creator) = parse_tag_field(tag_field)?;
    let vr = parse_vr_field(vr_field)?;
    let multiplicity = Multiplicity::parse(vm_field)?;
    let tag = match spec {
        TagSpec::Single(tag) | TagSpec::GroupRange(tag) => tag,
        TagSpec::PrivateBlock { group, element } => Tag(group, element as u16),
    };

    Some((
        spec,
        DictionaryEntry {
            tag,
            vr,
            name: name.to_string(),
            multiplicity,
            private_creator,
        },
    ))
}

fn parse_tag_field(text: &str) -> Option<(TagSpec, Option<String>)> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.splitn(3, ',');
    let group_part = parts.next()?;
    let second = parts.next()?;

    if let Some(creator) = second.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        // private block: (gggg,"CREATOR",ee)
        let element_part = parts.next()?;
        let group = u16::from_str_radix(group_part, 16).ok()?;
        let element = u8::from_str_radix(element_part, 16).ok()?;
        return Some((
            TagSpec::PrivateBlock { group, element },
            Some(creator.to_string()),
        ));
    }

    if parts.next().is_some() {
        return None;
    }
    let element = u16::from_str_radix(second, 16).ok()?;
    if let Some(group_prefix) = group_part.strip_suffix("xx") {
        let group = u16::from_str_radix(group_prefix, 16).ok()? << 8;
        Some((TagSpec::GroupRange(Tag(group, element)), None))
    } else {
        let group = u16::from_str_radix(group_part, 16).ok()?;
        Some((TagSpec::Single(Tag(group, element)), None))
    }
}

/// Interpret the VR field of a dictionary file. Besides the standard
/// two-letter codes, the upstream table convention uses a few context
/// dependent markers which are folded into their closest representation.
fn parse_vr_field(text: &str) -> Option<VR> {
    match text {
        "px" | "ox" => Some(VR::OB),
        "xs" => Some(VR::US),
        "lt" => Some(VR::OW),
        "up" => Some(VR::UL),
        "na" => None,
        other => VR::from_str(other).ok(),
    }
}

/// Register a single attribute in the dictionary.
///
/// `min_multiplicity` must be at least 1; a `max_multiplicity` of 0 means
/// unbounded, any other value must not be below the minimum.
///
/// When a private creator is given, the tag must follow the private
/// attribute rules (odd group of at least 0x0009 and outside the reserved
/// set). Without a creator, an odd group is accepted with a warning.
///
/// Registering a second entry under an existing symbolic name fails.
pub fn register_tag(
    tag: Tag,
    vr: VR,
    name: &str,
    min_multiplicity: u32,
    max_multiplicity: u32,
    private_creator: Option<&str>,
) -> Result<()> {
    ensure!(
        min_multiplicity >= 1,
        ParameterOutOfRangeSnafu {
            message: format!(
                "tag {} must have a minimum multiplicity of at least 1",
                tag
            ),
        }
    );
    let multiplicity = if max_multiplicity == 0 {
        Multiplicity {
            min: min_multiplicity,
            max: None,
        }
    } else {
        ensure!(
            max_multiplicity >= min_multiplicity,
            ParameterOutOfRangeSnafu {
                message: format!(
                    "tag {} has an inverted multiplicity range {}-{}",
                    tag, min_multiplicity, max_multiplicity
                ),
            }
        );
        Multiplicity {
            min: min_multiplicity,
            max: Some(max_multiplicity),
        }
    };

    match private_creator {
        None => {
            if tag.group() % 2 == 1 {
                warn!(
                    "registering private tag {}, but no private creator was associated with it",
                    tag
                );
            }
        }
        Some(_) => {
            // "Private Data Elements have an odd Group Number that is not
            // (0001,eeee), (0003,eeee), (0005,eeee), (0007,eeee), or
            // (FFFF,eeee)."
            ensure!(
                tag.group() % 2 == 1
                    && !matches!(tag.group(), 0x0001 | 0x0003 | 0x0005 | 0x0007 | 0xFFFF),
                ParameterOutOfRangeSnafu {
                    message: format!(
                        "trying to register private tag {}, but it must have an odd group >= 0x0009",
                        tag
                    ),
                }
            );
        }
    }

    info!(
        "registering tag in dictionary: {} {} {} (multiplicity: {}-{})",
        tag,
        vr,
        name,
        multiplicity.min,
        multiplicity
            .max
            .map(|m| m.to_string())
            .unwrap_or_else(|| "n".to_string()),
    );

    let mut registry = write_lock();
    ensure!(
        !registry.by_name.contains_key(name),
        AlreadyExistingTagSnafu { name }
    );
    let entry = DictionaryEntry {
        tag,
        vr,
        name: name.to_string(),
        multiplicity,
        private_creator: private_creator.map(str::to_string),
    };
    registry.by_name.insert(name.to_string(), entry.clone());
    registry.by_tag.entry(tag).or_default().push(entry);
    Ok(())
}

/// Fetch the entry registered for a tag,
/// optionally qualified by a private creator.
pub fn lookup_by_tag(tag: Tag, private_creator: Option<&str>) -> Option<DictionaryEntry> {
    read_lock().find(tag, private_creator).cloned()
}

/// Fetch an entry by its symbolic name.
pub fn lookup_by_name(name: &str) -> Option<DictionaryEntry> {
    read_lock().by_name.get(name).cloned()
}

/// The value representation registered for a tag,
/// or [`VR::Unknown`] when the tag has no entry.
pub fn lookup_vr(tag: Tag) -> VR {
    lookup_by_tag(tag, None).map(|e| e.vr).unwrap_or(VR::Unknown)
}

/// Whether the tag has no registered value representation.
pub fn is_unknown_vr(tag: Tag) -> bool {
    lookup_by_tag(tag, None).is_none()
}

/// The symbolic name registered for a tag, if any.
pub fn tag_name(tag: Tag, private_creator: Option<&str>) -> Option<String> {
    read_lock().find(tag, private_creator).map(|e| e.name.clone())
}

/// Interpret a tag from either one of its hexadecimal textual forms or a
/// symbolic attribute name.
///
/// Fails with `InvalidTag` when a hexadecimal form is malformed, and with
/// `UnknownDicomTag` when the name does not resolve.
pub fn parse_tag(text: &str) -> Result<Tag> {
    if let Ok(tag) = text.parse::<Tag>() {
        return Ok(tag);
    }
    if text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !text.is_empty()
    {
        match lookup_by_name(text) {
            Some(entry) => Ok(entry.tag),
            None => {
                info!("unknown DICOM tag: \"{}\"", text);
                UnknownDicomTagSnafu { name: text }.fail()
            }
        }
    } else {
        InvalidTagSnafu { text }.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init() {
        INIT.call_once(|| {
            initialize(true).expect("dictionary initialisation failed");
        });
    }

    #[test]
    fn embedded_dictionary_probe() {
        init();
        let entry = lookup_by_tag(tags::PATIENT_WEIGHT, None).unwrap();
        assert_eq!(entry.vr, VR::DS);
        assert_eq!(entry.name, "PatientWeight");

        let entry = lookup_by_name("PatientName").unwrap();
        assert_eq!(entry.tag, tags::PATIENT_NAME);
        assert_eq!(entry.vr, VR::PN);

        // repeating overlay group
        let entry = lookup_by_tag(Tag(0x60EE, 0x3000), None).unwrap();
        assert_eq!(entry.name, "OverlayData");
    }

    #[test]
    fn registration_round_trip() {
        init();
        register_tag(
            Tag(0x0011, 0x1001),
            VR::LO,
            "AcmePrivate",
            1,
            1,
            Some("ACME"),
        )
        .unwrap();
        let entry = lookup_by_name("AcmePrivate").unwrap();
        assert_eq!(entry.tag, Tag(0x0011, 0x1001));
        assert_eq!(entry.private_creator.as_deref(), Some("ACME"));

        let entry = lookup_by_tag(Tag(0x0011, 0x1001), Some("ACME")).unwrap();
        assert_eq!(entry.name, "AcmePrivate");

        // same name again, even under a different tag
        let err = register_tag(
            Tag(0x0011, 0x1002),
            VR::LO,
            "AcmePrivate",
            1,
            1,
            Some("ACME"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExistingTag { .. }));
    }

    #[test]
    fn registration_multiplicity_rules() {
        init();
        let err =
            register_tag(Tag(0x0013, 0x1001), VR::LO, "VmZeroMin", 0, 1, Some("ACME")).unwrap_err();
        assert!(matches!(err, Error::ParameterOutOfRange { .. }));

        let err =
            register_tag(Tag(0x0013, 0x1002), VR::LO, "VmInverted", 3, 2, Some("ACME")).unwrap_err();
        assert!(matches!(err, Error::ParameterOutOfRange { .. }));

        // max of zero means unbounded
        register_tag(Tag(0x0013, 0x1003), VR::LO, "VmUnbounded", 2, 0, Some("ACME")).unwrap();
        let entry = lookup_by_name("VmUnbounded").unwrap();
        assert_eq!(entry.multiplicity, Multiplicity { min: 2, max: None });
    }

    #[test]
    fn registration_private_group_rules() {
        init();
        for group in [0x0010, 0x0001, 0x0003, 0x0005, 0x0007, 0xFFFF] {
            let err = register_tag(
                Tag(group, 0x1001),
                VR::LO,
                "BadPrivateGroup",
                1,
                1,
                Some("ACME"),
            )
            .unwrap_err();
            assert!(matches!(err, Error::ParameterOutOfRange { .. }));
        }
        // without a creator, an odd group only warns
        register_tag(Tag(0x0015, 0x1001), VR::LO, "LoosePrivate", 1, 1, None).unwrap();
    }

    #[test]
    fn parse_tag_forms() {
        init();
        assert_eq!(parse_tag("00100010").unwrap(), tags::PATIENT_NAME);
        assert_eq!(parse_tag("PatientName").unwrap(), tags::PATIENT_NAME);
        assert!(matches!(
            parse_tag("NoSuchAttribute"),
            Err(Error::UnknownDicomTag { .. })
        ));
        assert!(matches!(
            parse_tag("0010,0010,0010"),
            Err(Error::InvalidTag { .. })
        ));
    }

    #[test]
    fn private_block_lookup() {
        init();
        let entry = lookup_by_tag(Tag(0x0029, 0x1108), Some("SIEMENS CSA HEADER"));
        let entry = entry.unwrap();
        assert_eq!(entry.name, "CSAImageHeaderType");
        assert!(lookup_by_tag(Tag(0x0029, 0x1108), None).is_none());
    }

    #[test]
    fn multiplicity_field_forms() {
        assert_eq!(Multiplicity::parse("1"), Some(Multiplicity::fixed(1)));
        assert_eq!(
            Multiplicity::parse("1-n"),
            Some(Multiplicity { min: 1, max: None })
        );
        assert_eq!(
            Multiplicity::parse("2-2n"),
            Some(Multiplicity { min: 2, max: None })
        );
        assert_eq!(
            Multiplicity::parse("1-3"),
            Some(Multiplicity {
                min: 1,
                max: Some(3)
            })
        );
        assert_eq!(Multiplicity::parse("x"), None);
    }
}
