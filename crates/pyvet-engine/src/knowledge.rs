//! The static knowledge base: version universe, stdlib availability table,
//! and the syntax-feature catalogue.
//!
//! The tables ship embedded in the crate and load once into a process-wide
//! instance; nothing mutates them after load. The stdlib file is authored
//! per-version (which version ships which top-level modules) and reversed
//! at load into the module -> versions mapping the resolver intersects
//! with. Alternative tables can be injected for tests via [`KnowledgeBase::from_tables`].

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use thiserror::Error;

use crate::version::VersionTag;

const STDLIB_TABLE: &str = include_str!("../data/stdlib_versions.json");
const FEATURE_TABLE: &str = include_str!("../data/syntax_features.json");

/// Modules that belong to the packaging toolchain rather than to either
/// the stdlib or the analyzed project.
const PACKAGING_MODULES: &[&str] = &[
    "setuptools",
    "distutils",
    "pkg_resources",
    "pip",
    "wheel",
    "__future__",
];

/// A knowledge-base load failure. Only possible for injected tables; the
/// embedded tables are validated by the test suite.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("malformed knowledge table: {0}")]
    Table(#[from] serde_json::Error),
    #[error("invalid feature pattern {name:?}: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    regex: String,
    versions: Vec<VersionTag>,
}

/// One detectable syntax feature: an anchored line pattern plus the
/// version set that supports the feature.
#[derive(Debug)]
pub struct FeatureSignature {
    pub name: String,
    pub pattern: Regex,
    pub versions: FxHashSet<VersionTag>,
}

/// Process-wide, read-only analysis knowledge.
#[derive(Debug)]
pub struct KnowledgeBase {
    versions: Vec<VersionTag>,
    stdlib: FxHashMap<String, FxHashSet<VersionTag>>,
    features: Vec<FeatureSignature>,
    packaging: FxHashSet<String>,
}

static BUILTIN: Lazy<KnowledgeBase> = Lazy::new(|| {
    KnowledgeBase::from_tables(STDLIB_TABLE, FEATURE_TABLE)
        .expect("embedded knowledge tables are valid")
});

impl KnowledgeBase {
    /// The embedded knowledge base, loaded on first use.
    pub fn builtin() -> &'static KnowledgeBase {
        &BUILTIN
    }

    /// Build a knowledge base from explicit JSON tables.
    pub fn from_tables(stdlib_json: &str, features_json: &str) -> Result<Self, KnowledgeError> {
        // Authored as {version: [module, ...]}; reversed here.
        let per_version: BTreeMap<String, Vec<String>> = serde_json::from_str(stdlib_json)?;
        let mut versions: Vec<VersionTag> = per_version.keys().map(|v| VersionTag::from(v.as_str())).collect();
        crate::version::sort_ascending(&mut versions);

        let mut stdlib: FxHashMap<String, FxHashSet<VersionTag>> = FxHashMap::default();
        for (version, modules) in &per_version {
            let tag = VersionTag::from(version.as_str());
            for module in modules {
                stdlib
                    .entry(module.clone())
                    .or_default()
                    .insert(tag.clone());
            }
        }

        let records: BTreeMap<String, FeatureRecord> = serde_json::from_str(features_json)?;
        let mut features = Vec::with_capacity(records.len());
        for (name, record) in records {
            let pattern = Regex::new(&record.regex).map_err(|source| KnowledgeError::Pattern {
                name: name.clone(),
                source,
            })?;
            features.push(FeatureSignature {
                name,
                pattern,
                versions: record.versions.into_iter().collect(),
            });
        }

        Ok(KnowledgeBase {
            versions,
            stdlib,
            features,
            packaging: PACKAGING_MODULES
                .iter()
                .map(|module| module.to_string())
                .collect(),
        })
    }

    /// The known version universe, ascending.
    pub fn versions(&self) -> &[VersionTag] {
        &self.versions
    }

    /// The universe as a set, for difference/intersection work.
    pub fn universe(&self) -> FxHashSet<VersionTag> {
        self.versions.iter().cloned().collect()
    }

    /// Versions shipping the given top-level stdlib module, if it is a
    /// stdlib module at all.
    pub fn stdlib_support(&self, module: &str) -> Option<&FxHashSet<VersionTag>> {
        self.stdlib.get(module)
    }

    /// Top-level stdlib modules of one version, or of any known version.
    pub fn stdlib_modules(&self, version: Option<&VersionTag>) -> FxHashSet<&str> {
        self.stdlib
            .iter()
            .filter(|(_, supported)| match version {
                Some(version) => supported.contains(version),
                None => true,
            })
            .map(|(module, _)| module.as_str())
            .collect()
    }

    pub fn features(&self) -> &[FeatureSignature] {
        &self.features
    }

    pub fn packaging_modules(&self) -> &FxHashSet<String> {
        &self.packaging
    }

    /// The oldest legacy-line version in the universe, if one is known.
    pub fn oldest_legacy(&self) -> Option<&VersionTag> {
        self.versions
            .iter()
            .find(|tag| matches!(crate::version::compare(tag.as_str(), "3"), Some(std::cmp::Ordering::Less)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_tables_load() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.versions().len(), 7);
        assert_eq!(kb.versions()[0].as_str(), "2.7");
        assert_eq!(kb.versions()[6].as_str(), "3.10");
        assert!(!kb.features().is_empty());
    }

    #[test]
    fn stdlib_table_is_reversed_per_module() {
        let kb = KnowledgeBase::builtin();
        let os_support = kb.stdlib_support("os").expect("os is stdlib everywhere");
        assert_eq!(os_support.len(), 7);
        let pathlib = kb.stdlib_support("pathlib").expect("pathlib is stdlib");
        assert!(!pathlib.contains(&VersionTag::from("2.7")));
        assert!(pathlib.contains(&VersionTag::from("3.5")));
        let legacy_only = kb.stdlib_support("urllib2").expect("urllib2 is legacy stdlib");
        assert_eq!(legacy_only.len(), 1);
        assert!(kb.stdlib_support("requests").is_none());
    }

    #[test]
    fn version_gated_modules() {
        let kb = KnowledgeBase::builtin();
        let dataclasses = kb.stdlib_support("dataclasses").unwrap();
        assert!(!dataclasses.contains(&VersionTag::from("3.6")));
        assert!(dataclasses.contains(&VersionTag::from("3.7")));
        let zoneinfo = kb.stdlib_support("zoneinfo").unwrap();
        assert_eq!(zoneinfo.len(), 2);
    }

    #[test]
    fn oldest_legacy_version() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.oldest_legacy().map(VersionTag::as_str), Some("2.7"));
    }

    #[test]
    fn packaging_modules_present() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.packaging_modules().contains("setuptools"));
        assert!(kb.packaging_modules().contains("__future__"));
    }
}
