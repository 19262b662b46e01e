//! Collaborator interfaces for registry metadata and source retrieval.
//!
//! The engine never performs I/O beyond the local filesystem; anything
//! touching a package registry arrives through these traits. `None`
//! always means "lookup miss": the algorithms treat absent knowledge as
//! "assume compatible" rather than as an error.

use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::version::VersionTag;

/// Declared metadata of one published package release.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageMetadata {
    /// Declared dependency expressions (one per requirement line).
    pub dependency_exprs: Vec<String>,
    /// Declared interpreter-compatibility expression; empty when the
    /// release declares none (vacuously satisfied).
    pub compatibility_expr: String,
}

/// Registry metadata lookups.
pub trait Registry {
    /// Declared metadata of `name@version`, or `None` when unavailable.
    fn metadata(&self, name: &str, version: &str) -> Option<PackageMetadata>;

    /// The ascending published release list of `name`, or `None` when
    /// unavailable.
    fn release_list(&self, name: &str) -> Option<Vec<VersionTag>>;
}

/// Source and binary artifact lookups.
pub trait SourceProvider {
    /// Language versions covered by binary (wheel) artifacts of
    /// `name@version`, judged from artifact tags.
    fn wheel_versions(&self, name: &str, version: &str) -> Option<FxHashSet<VersionTag>>;

    /// A local directory containing the extracted source release of
    /// `name@version`, or `None` when no source form exists.
    fn fetch_source(&self, name: &str, version: &str) -> Option<PathBuf>;
}
