//! Cross-module tests: the availability resolver against a mock registry,
//! and the two audits over synthetic project trees.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::check::{check_package, check_project, local_compatibility_mismatch};
use crate::knowledge::KnowledgeBase;
use crate::registry::{PackageMetadata, Registry, SourceProvider};
use crate::resource::ResolveContext;
use crate::version::VersionTag;

#[derive(Default)]
struct MockRegistry {
    releases: FxHashMap<String, Vec<VersionTag>>,
    metadata: FxHashMap<String, PackageMetadata>,
}

impl MockRegistry {
    fn with_release_list(mut self, name: &str, versions: &[&str]) -> Self {
        self.releases.insert(
            name.to_string(),
            versions.iter().copied().map(VersionTag::from).collect(),
        );
        self
    }

    fn with_package(
        mut self,
        name: &str,
        version: &str,
        compatibility: &str,
        dependencies: &[&str],
    ) -> Self {
        self.metadata.insert(
            format!("{name}#{version}"),
            PackageMetadata {
                dependency_exprs: dependencies.iter().map(|d| d.to_string()).collect(),
                compatibility_expr: compatibility.to_string(),
            },
        );
        self
    }
}

impl Registry for MockRegistry {
    fn metadata(&self, name: &str, version: &str) -> Option<PackageMetadata> {
        self.metadata.get(&format!("{name}#{version}")).cloned()
    }

    fn release_list(&self, name: &str) -> Option<Vec<VersionTag>> {
        self.releases.get(name).cloned()
    }
}

/// Source provider for package audits over a prepared local tree.
struct FixedSources {
    wheels: Option<FxHashSet<VersionTag>>,
    source_root: Option<PathBuf>,
}

impl SourceProvider for FixedSources {
    fn wheel_versions(&self, _name: &str, _version: &str) -> Option<FxHashSet<VersionTag>> {
        self.wheels.clone()
    }

    fn fetch_source(&self, _name: &str, _version: &str) -> Option<PathBuf> {
        self.source_root.clone()
    }
}

fn kb() -> &'static KnowledgeBase {
    KnowledgeBase::builtin()
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn compatible_chain_reports_no_problem() {
    let registry = MockRegistry::default()
        .with_release_list("foo", &["0.9", "1.0", "1.5", "2.0"])
        .with_package("app", "1.0", ">=2.7", &["foo>=1.0,<2.0"])
        .with_package("foo", "1.0", ">=2.7", &[])
        .with_package("foo", "1.5", ">=2.7", &[]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn dependency_floor_above_parent_floor_is_a_problem() {
    // app claims 2.7 support but foo's oldest in-range release needs 3.5.
    let registry = MockRegistry::default()
        .with_release_list("foo", &["1.0", "1.5"])
        .with_package("app", "1.0", ">=2.7", &["foo>=1.0"])
        .with_package("foo", "1.0", ">=3.5", &[])
        .with_package("foo", "1.5", ">=3.5", &[]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn dependency_ceiling_below_parent_ceiling_is_a_problem() {
    // app claims support through 3.10 but foo's newest release stops at 3.6.
    let registry = MockRegistry::default()
        .with_release_list("foo", &["1.0"])
        .with_package("app", "1.0", ">=3.5", &["foo>=1.0"])
        .with_package("foo", "1.0", ">=3.5,<=3.6", &[]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn transitive_failure_is_detected() {
    let registry = MockRegistry::default()
        .with_release_list("direct", &["1.0"])
        .with_release_list("deep", &["1.0"])
        .with_package("app", "1.0", ">=2.7", &["direct==1.0"])
        .with_package("direct", "1.0", ">=2.7", &["deep==1.0"])
        .with_package("deep", "1.0", ">=3.6", &[]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn cycles_terminate_and_count_as_compatible() {
    let registry = MockRegistry::default()
        .with_release_list("a", &["1.0"])
        .with_release_list("b", &["1.0"])
        .with_package("app", "1.0", ">=2.7", &["a==1.0"])
        .with_package("a", "1.0", ">=2.7", &["b==1.0"])
        .with_package("b", "1.0", ">=2.7", &["a==1.0"]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn longer_cycle_terminates() {
    let registry = MockRegistry::default()
        .with_release_list("a", &["1.0"])
        .with_release_list("b", &["1.0"])
        .with_release_list("c", &["1.0"])
        .with_package("app", "1.0", ">=3.5", &["a==1.0"])
        .with_package("a", "1.0", ">=3.5", &["b==1.0"])
        .with_package("b", "1.0", ">=3.5", &["c==1.0"])
        .with_package("c", "1.0", ">=3.5", &["a==1.0"]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn missing_metadata_is_assumed_compatible() {
    let registry = MockRegistry::default()
        .with_release_list("ghost", &["1.0"])
        .with_package("app", "1.0", ">=2.7", &["ghost==1.0"]);
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn malformed_dependency_expressions_are_skipped() {
    let registry = MockRegistry::default()
        .with_package(
            "app",
            "1.0",
            ">=2.7",
            &["pywin32; sys_platform == 'win32'", "???", ""],
        );
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("app", "1.0"));
}

#[test]
fn unknown_package_is_no_problem() {
    let registry = MockRegistry::default();
    let mut ctx = ResolveContext::new(&registry, kb());
    assert!(!ctx.package_lacks_resources("nope", "1.0"));
}

#[test]
fn local_mismatch_needs_guard_without_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("setup.py"),
        "from setuptools import setup\nimport app\nsetup(name=\"demo\")\n",
    );
    write(
        &root.join("app.py"),
        "import sys\nif sys.version_info < (3,):\n    sys.exit(\"unsupported\")\n",
    );
    assert!(local_compatibility_mismatch(&root.join("setup.py")));

    // Declaring the range resolves the mismatch.
    write(
        &root.join("setup.py"),
        "from setuptools import setup\nimport app\nsetup(name=\"demo\", python_requires=\">=3.5\")\n",
    );
    assert!(!local_compatibility_mismatch(&root.join("setup.py")));
}

#[test]
fn project_audit_reports_all_three_findings() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("setup.py"),
        "from setuptools import setup\nimport app\nsetup(name=\"demo\")\n",
    );
    write(
        &root.join("app.py"),
        "import urllib2\nimport sys\nif sys.version_info >= (3,):\n    raise RuntimeError(\"legacy only\")\n",
    );
    write(&root.join("requirements.txt"), "foo>=1.0\n");

    let registry = MockRegistry::default()
        .with_release_list("foo", &["1.0"])
        .with_package("foo", "1.0", ">=3.8", &[]);

    let findings = check_project(root, ">=3.6", &registry, kb());
    // urllib2 only exists on the legacy line, so 3.6+ claims fail.
    assert!(findings.incompatible_feature);
    // version_info guard with no python_requires in the descriptor.
    assert!(findings.local_mismatch);
    // foo's floor (3.8) is above the claimed floor (3.6).
    assert!(findings.unavailable_resource);
}

#[test]
fn clean_project_audit_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("setup.py"),
        "from setuptools import setup\nsetup(name=\"demo\", python_requires=\">=3.6\")\n",
    );
    write(&root.join("app.py"), "import os\nimport json\n");
    write(&root.join("requirements.txt"), "foo>=1.0\n");

    let registry = MockRegistry::default()
        .with_release_list("foo", &["1.0"])
        .with_package("foo", "1.0", ">=3.5", &[]);

    let findings = check_project(root, ">=3.6", &registry, kb());
    assert!(!findings.any());
}

#[test]
fn package_audit_skips_source_checks_under_full_wheel_coverage() {
    let registry = MockRegistry::default().with_package("demo", "1.0", ">=3.6", &[]);
    let all_claimed: FxHashSet<VersionTag> = ["3.6", "3.7", "3.8", "3.9", "3.10"]
        .into_iter()
        .map(VersionTag::from)
        .collect();
    let sources = FixedSources {
        wheels: Some(all_claimed),
        // Would flag findings if it were ever consulted.
        source_root: Some(PathBuf::from("/nonexistent")),
    };
    let findings = check_package("demo", "1.0", &registry, &sources, kb());
    assert!(!findings.any());
}

#[test]
fn package_audit_checks_source_only_versions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("setup.py"),
        "from setuptools import setup\nimport demo\nsetup(name=\"demo\")\n",
    );
    write(&root.join("demo.py"), "import pathlib\n");

    // Claims 2.7 through 3.10, but wheels only cover the modern line; the
    // legacy claim is served by source that imports a modern-only module.
    let registry = MockRegistry::default().with_package("demo", "1.0", ">=2.7", &[]);
    let wheels: FxHashSet<VersionTag> = ["3.5", "3.6", "3.7", "3.8", "3.9", "3.10"]
        .into_iter()
        .map(VersionTag::from)
        .collect();
    let sources = FixedSources {
        wheels: Some(wheels),
        source_root: Some(root.to_path_buf()),
    };
    let findings = check_package("demo", "1.0", &registry, &sources, kb());
    assert!(findings.incompatible_feature);
    assert!(!findings.local_mismatch);
}

#[test]
fn package_audit_without_source_release_degrades() {
    let registry = MockRegistry::default().with_package("demo", "1.0", ">=2.7", &[]);
    let sources = FixedSources {
        wheels: None,
        source_root: None,
    };
    let findings = check_package("demo", "1.0", &registry, &sources, kb());
    assert!(!findings.any());
}
