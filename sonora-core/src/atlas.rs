//! # Atlas Model
//!
//! In-memory representation of the single document the runtime consumes:
//! packages mapped to an ordered list of items.

use indexmap::IndexMap;
use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Result, SonoraError};

/// The no-language sentinel: "applies to all languages".
pub const NO_LANGUAGE: &str = "_";

/// One `(source_name, file_name, sample_count, language_tag)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasItem {
    pub source_name: String,
    pub file_name: String,
    pub sample_count: u64,
    pub language_tag: String,
}

impl AtlasItem {
    pub fn new(
        source_name: impl Into<String>,
        file_name: impl Into<String>,
        sample_count: u64,
        language_tag: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            file_name: file_name.into(),
            sample_count,
            language_tag: language_tag.into(),
        }
    }

    /// Does this item apply to `language`? True for the `"_"` sentinel or
    /// an exact tag match.
    pub fn matches_language(&self, language: &str) -> bool {
        self.language_tag == NO_LANGUAGE || self.language_tag == language
    }
}

// The wire format is a 4-element JSON array, not an object. The 4th element
// (language tag) is serialized unconditionally, but deserialize tolerates a
// missing one as the "_" sentinel: older atlases or hand-edited fixtures may
// predate localization, and the format is meant to be read tolerantly.
impl Serialize for AtlasItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(4)?;
        tup.serialize_element(&self.source_name)?;
        tup.serialize_element(&self.file_name)?;
        tup.serialize_element(&self.sample_count)?;
        tup.serialize_element(&self.language_tag)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for AtlasItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = AtlasItem;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a [source_name, file_name, sample_count, language_tag?] tuple")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
                let source_name: String = seq
                    .next_element()?
                    .ok_or_else(|| DeError::invalid_length(0, &self))?;
                let file_name: String = seq
                    .next_element()?
                    .ok_or_else(|| DeError::invalid_length(1, &self))?;
                let sample_count: u64 = seq
                    .next_element()?
                    .ok_or_else(|| DeError::invalid_length(2, &self))?;
                let language_tag: String = seq
                    .next_element()?
                    .unwrap_or_else(|| NO_LANGUAGE.to_string());
                Ok(AtlasItem {
                    source_name,
                    file_name,
                    sample_count,
                    language_tag,
                })
            }
        }

        deserializer.deserialize_seq(ItemVisitor)
    }
}

/// The mapping from package name to its ordered item list. Insertion order
/// of packages is preserved (significant for cross-package fallback) and so
/// is insertion order of items within a package (significant for
/// first-match-wins resolution).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Atlas {
    packages: IndexMap<String, Vec<AtlasItem>>,
}

impl Atlas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an atlas document from its JSON wire form. Malformed tuples
    /// (wrong arity, wrong element types) fail with `AtlasMalformed`; this
    /// does not touch the network, see `SoundManager::load_atlas` for the
    /// fetch step.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SonoraError::AtlasMalformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(SonoraError::from)
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Packages in atlas insertion order — the order the resolver's
    /// cross-package fallback walks.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &[AtlasItem])> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn package(&self, name: &str) -> Option<&[AtlasItem]> {
        self.packages.get(name).map(Vec::as_slice)
    }

    pub fn contains_package(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Unique language tags appearing in `package`, `"_"` included if
    /// present. Preserves first-seen order.
    pub fn languages(&self, package: &str) -> Vec<String> {
        let mut seen = Vec::new();
        if let Some(items) = self.packages.get(package) {
            for item in items {
                if !seen.contains(&item.language_tag) {
                    seen.push(item.language_tag.clone());
                }
            }
        }
        seen
    }

    /// Replace (or insert) a package's item list wholesale, preserving its
    /// existing position in insertion order if it already existed.
    pub fn set_package(&mut self, name: impl Into<String>, items: Vec<AtlasItem>) {
        self.packages.insert(name.into(), items);
    }

    pub fn push_item(&mut self, package: impl Into<String>, item: AtlasItem) {
        self.packages.entry(package.into()).or_default().push(item);
    }
}
