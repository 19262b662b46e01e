//! Check orchestration: wires the walker, resolvers and detectors into the
//! two top-level audits (published package, local project) and their three
//! boolean findings.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use walkdir::WalkDir;

use crate::constraint::ConstraintExpr;
use crate::descriptor::declares_compatibility_range;
use crate::features::{has_undeclared_third_party, uses_incompatible_feature};
use crate::guard::uses_runtime_version_guard;
use crate::knowledge::KnowledgeBase;
use crate::registry::{Registry, SourceProvider};
use crate::resource::ResolveContext;
use crate::version::VersionTag;
use crate::walker::{project_modules, ModuleWalker};

/// The build-descriptor file every audit starts from.
pub const DESCRIPTOR_FILE: &str = "setup.py";

const REQUIREMENTS_FILES: [&str; 2] = ["requirements.txt", "requires.txt"];

/// The three audit findings. `true` means the problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Findings {
    /// A reachable local file cannot run under every claimed version.
    pub incompatible_feature: bool,
    /// Runtime version-guarding without a declared compatibility range.
    pub local_mismatch: bool,
    /// A transitive dependency fails a claimed compatibility bound.
    pub unavailable_resource: bool,
}

impl Findings {
    pub fn any(&self) -> bool {
        self.incompatible_feature || self.local_mismatch || self.unavailable_resource
    }
}

/// Audit a published `name@version` release.
///
/// The resource finding is computed for every release; the source-level
/// findings only cover claimed versions with no binary artifact, and are
/// skipped entirely when every claimed version ships a wheel or no source
/// release exists.
pub fn check_package(
    name: &str,
    version: &str,
    registry: &dyn Registry,
    sources: &dyn SourceProvider,
    kb: &KnowledgeBase,
) -> Findings {
    let mut findings = Findings::default();
    let Some(metadata) = registry.metadata(name, version) else {
        tracing::warn!(package = name, version, "release not found");
        return findings;
    };

    findings.unavailable_resource =
        ResolveContext::new(registry, kb).package_lacks_resources(name, version);

    let claimed: FxHashSet<VersionTag> = ConstraintExpr::parse(&metadata.compatibility_expr)
        .satisfying(kb.versions())
        .into_iter()
        .collect();
    let wheel_covered = sources.wheel_versions(name, version).unwrap_or_default();
    let source_only: FxHashSet<VersionTag> =
        claimed.difference(&wheel_covered).cloned().collect();
    if source_only.is_empty() {
        return findings;
    }

    let Some(root) = sources.fetch_source(name, version) else {
        tracing::info!(
            package = name,
            version,
            "no source release; skipping feature and local checks"
        );
        return findings;
    };
    check_source_tree(&root, &source_only, kb, &mut findings);
    findings
}

/// Audit a local project rooted at `root` against a declared
/// compatibility expression.
pub fn check_project(
    root: &Path,
    compatibility_expr: &str,
    registry: &dyn Registry,
    kb: &KnowledgeBase,
) -> Findings {
    let mut findings = Findings::default();
    match find_requirements_file(root) {
        Some(requirements) => {
            let dependencies = dependency_lines(&requirements);
            findings.unavailable_resource = ResolveContext::new(registry, kb)
                .expression_lacks_resources(compatibility_expr, &dependencies);
        }
        None => {
            tracing::info!(root = %root.display(), "requirements file not found; skipping resource check");
        }
    }

    let claimed: FxHashSet<VersionTag> = ConstraintExpr::parse(compatibility_expr)
        .satisfying(kb.versions())
        .into_iter()
        .collect();
    check_source_tree(root, &claimed, kb, &mut findings);
    findings
}

/// Source-level checks shared by both audits.
fn check_source_tree(
    root: &Path,
    claimed: &FxHashSet<VersionTag>,
    kb: &KnowledgeBase,
    findings: &mut Findings,
) {
    let descriptor = root.join(DESCRIPTOR_FILE);
    if !descriptor.is_file() {
        tracing::info!(
            root = %root.display(),
            "build descriptor not found; skipping feature and local checks"
        );
        return;
    }

    findings.local_mismatch = local_compatibility_mismatch(&descriptor);

    let owned = project_modules(root);
    if owned.is_empty() {
        tracing::info!(root = %root.display(), "no local modules found; skipping feature check");
        return;
    }
    findings.incompatible_feature = detect_incompatible_feature(&descriptor, claimed, &owned, kb);
}

/// Does any reachable local file use a feature or stdlib module outside a
/// claimed version?
pub fn detect_incompatible_feature(
    entry: &Path,
    claimed: &FxHashSet<VersionTag>,
    owned_modules: &FxHashSet<String>,
    kb: &KnowledgeBase,
) -> bool {
    ModuleWalker::default().search(entry, |path, _| {
        uses_incompatible_feature(path, claimed, owned_modules, kb)
    })
}

/// Does the project guard interpreter versions at runtime while its build
/// descriptor declares no compatibility range?
pub fn local_compatibility_mismatch(descriptor: &Path) -> bool {
    let declared = fs::read_to_string(descriptor)
        .ok()
        .and_then(|source| pyvet_syntax::parse(&source))
        .map(|tree| declares_compatibility_range(&tree))
        .unwrap_or(false);
    let guarded = ModuleWalker::default().search(descriptor, |path, _| {
        fs::read_to_string(path)
            .ok()
            .and_then(|source| pyvet_syntax::parse(&source))
            .map(|tree| uses_runtime_version_guard(&tree))
            .unwrap_or(false)
    });
    guarded && !declared
}

/// Does any reachable local file import an undeclared third-party module?
pub fn detect_undeclared_third_party(
    entry: &Path,
    owned_modules: &FxHashSet<String>,
    version: Option<&VersionTag>,
    kb: &KnowledgeBase,
) -> bool {
    ModuleWalker::default().search(entry, |path, is_entry| {
        has_undeclared_third_party(path, owned_modules, version, is_entry, kb)
    })
}

/// First requirements-style file anywhere under the project root.
fn find_requirements_file(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .find(|entry| {
            entry.file_type().is_file()
                && REQUIREMENTS_FILES
                    .iter()
                    .any(|name| entry.file_name() == *name)
        })
        .map(|entry| entry.into_path())
}

fn dependency_lines(path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
