//! # pyvet-engine
//!
//! The compatibility resolution engine: determines whether a package's
//! declared interpreter-compatibility range is actually honored, by
//! static analysis of its source and its transitive dependency graph.
//!
//! The engine is synchronous and single-threaded; the only I/O it performs
//! itself is reading local files. Registry knowledge arrives through the
//! [`registry::Registry`] / [`registry::SourceProvider`] collaborator
//! traits, where a `None` always means "unknown, assume compatible".
//! Nothing in here is fatal: unparseable files, malformed expressions and
//! lookup misses all degrade to "insufficient evidence, report no
//! problem".
//!
//! ## Layout
//!
//! - [`version`] - version tags and the numeric comparator
//! - [`constraint`] - constraint expressions and dependency splitting
//! - [`knowledge`] - embedded stdlib/feature tables
//! - [`extract`] - import extraction over syntax trees
//! - [`walker`] - breadth-first local module traversal
//! - [`features`] - feature/stdlib compatibility resolution
//! - [`guard`] - runtime version-guard detection
//! - [`descriptor`] - build-descriptor (packaging call) analysis
//! - [`resource`] - transitive dependency availability resolution
//! - [`registry`] - external collaborator interfaces
//! - [`check`] - the two top-level audits and their findings

pub mod check;
pub mod constraint;
pub mod descriptor;
pub mod extract;
pub mod features;
pub mod guard;
pub mod knowledge;
pub mod registry;
pub mod resource;
pub mod version;
pub mod walker;

#[cfg(test)]
mod tests;

pub use check::{check_package, check_project, Findings, DESCRIPTOR_FILE};
pub use knowledge::{KnowledgeBase, KnowledgeError};
pub use registry::{PackageMetadata, Registry, SourceProvider};
pub use resource::ResolveContext;
pub use version::VersionTag;
pub use walker::{ModuleWalker, WalkerConfig};
