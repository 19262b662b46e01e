//! Feature and stdlib compatibility resolution.
//!
//! Two independent extraction passes feed the version intersection: the
//! syntax-feature scan works on raw source lines (comment lines skipped,
//! at most one new feature per line), the module scan works on the parsed
//! tree's absolute imports. Starting from the full version universe, every
//! known stdlib module and matched feature narrows the set; modules the
//! stdlib table does not know (third-party or locally owned) impose no
//! constraint.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;

use pyvet_syntax::{Expr, Keyword, Stmt, SyntaxTree};

use crate::extract::{find_call_keywords, first_segment, module_references, top_level_modules};
use crate::knowledge::{FeatureSignature, KnowledgeBase};
use crate::version::VersionTag;

/// Scan raw source lines against the feature catalogue. Lines starting a
/// comment contribute nothing; each line records at most one new feature.
pub fn extract_features<'kb>(
    source: &str,
    kb: &'kb KnowledgeBase,
) -> Vec<&'kb FeatureSignature> {
    let mut matched: Vec<&FeatureSignature> = Vec::new();
    for line in source.lines() {
        if line.starts_with('#') {
            continue;
        }
        let line = line.trim();
        for feature in kb.features() {
            if matched.iter().any(|seen| seen.name == feature.name) {
                continue;
            }
            if feature.pattern.is_match(line) {
                matched.push(feature);
                break;
            }
        }
    }
    matched
}

/// The set of language versions one file can run under.
///
/// `excluded_modules` carries the project's own top-level modules so a
/// local module shadowing a stdlib name imposes no constraint.
pub fn compatible_versions(
    source: &str,
    excluded_modules: &FxHashSet<String>,
    kb: &KnowledgeBase,
) -> FxHashSet<VersionTag> {
    let tree = pyvet_syntax::parse(source);
    let mut modules = tree
        .as_ref()
        .map(top_level_modules)
        .unwrap_or_default();
    for owned in excluded_modules {
        modules.remove(owned);
    }

    let mut compatible = kb.universe();
    for module in &modules {
        if let Some(support) = kb.stdlib_support(module) {
            compatible.retain(|version| support.contains(version));
        }
    }
    for feature in extract_features(source, kb) {
        compatible.retain(|version| feature.versions.contains(version));
    }

    if let Some(tree) = &tree {
        if uses_open_encoding_kwarg(tree) {
            if let Some(oldest) = kb.oldest_legacy() {
                compatible.remove(oldest);
            }
        }
    }
    compatible
}

/// Walker predicate: does this file's compatible set fail to cover every
/// claimed version?
pub fn uses_incompatible_feature(
    path: &Path,
    claimed: &FxHashSet<VersionTag>,
    excluded_modules: &FxHashSet<String>,
    kb: &KnowledgeBase,
) -> bool {
    let Ok(source) = fs::read_to_string(path) else {
        return false;
    };
    let compatible = compatible_versions(&source, excluded_modules, kb);
    claimed.iter().any(|version| !compatible.contains(version))
}

/// Walker predicate: does this file import a third-party module that is
/// neither stdlib (for `version`, or any version when `None`), packaging
/// toolchain, nor locally owned?
pub fn has_undeclared_third_party(
    path: &Path,
    owned_modules: &FxHashSet<String>,
    version: Option<&VersionTag>,
    is_entry: bool,
    kb: &KnowledgeBase,
) -> bool {
    let Ok(source) = fs::read_to_string(path) else {
        return false;
    };
    let Some(tree) = pyvet_syntax::parse(&source) else {
        return false;
    };
    let known = kb.stdlib_modules(version);
    for reference in module_references(&tree, is_entry) {
        if reference.level != 0 {
            continue;
        }
        let top = first_segment(&reference.name);
        if known.contains(top)
            || kb.packaging_modules().contains(top)
            || owned_modules.contains(top)
        {
            continue;
        }
        return true;
    }
    false
}

/// Detect a call to the built-in resource-open primitive carrying a named
/// `encoding` argument, unless `open` was rebound to an encoding-safe
/// alternative (`io.open` / `codecs.open`) first.
pub fn uses_open_encoding_kwarg(tree: &SyntaxTree) -> bool {
    let candidates = open_candidates(&tree.body);
    if candidates.iter().any(|candidate| candidate == "open") {
        // `open` itself points at io.open or codecs.open.
        return false;
    }
    let Some(keywords) = find_call_keywords(&tree.body, &|expr| match expr {
        Expr::Call { func, .. } if is_open_call(func, &candidates) => {
            innermost_open_keywords(expr)
        }
        _ => None,
    }) else {
        return false;
    };
    keywords
        .iter()
        .any(|keyword| keyword.arg.as_deref() == Some("encoding"))
}

/// Names that an encoding-safe open is reachable under: `io`/`codecs`
/// imports (under any alias) yield `alias.open`, `from io import open`
/// (under any alias) yields the bare binding.
fn open_candidates(body: &[Stmt]) -> Vec<String> {
    let mut candidates = Vec::new();
    for stmt in body {
        match stmt {
            Stmt::Import { names } => {
                for alias in names {
                    if alias.name == "io" || alias.name == "codecs" {
                        let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                        candidates.push(format!("{bound}.open"));
                    }
                }
            }
            Stmt::ImportFrom { module, names, .. } => {
                if matches!(module.as_deref(), Some("io") | Some("codecs")) {
                    for alias in names {
                        if alias.name == "open" {
                            let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                            candidates.push(bound.to_string());
                        }
                    }
                }
            }
            Stmt::If { body, orelse, .. } => {
                candidates.extend(open_candidates(body));
                candidates.extend(open_candidates(orelse));
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                ..
            } => {
                candidates.extend(open_candidates(body));
                candidates.extend(open_candidates(orelse));
                for handler in handlers {
                    candidates.extend(open_candidates(&handler.body));
                }
            }
            _ => {}
        }
    }
    candidates
}

/// A call target counts as the bare open primitive when its dotted name
/// contains an `open` segment and is not one of the safe candidates.
fn is_open_call(func: &Expr, candidates: &[String]) -> bool {
    let Some(name) = func.dotted_name() else {
        return false;
    };
    if candidates
        .iter()
        .any(|candidate| name.contains(candidate.as_str()))
    {
        return false;
    }
    name.split('.').any(|segment| segment == "open")
}

/// Dig through trailing attribute/call chains to the keywords of the
/// `open(...)` call itself: `open(path, encoding="x").read()` yields the
/// open call's keywords, not `.read()`'s.
fn innermost_open_keywords(expr: &Expr) -> Option<&[Keyword]> {
    match expr {
        Expr::Call { func, keywords, .. } => match func.as_ref() {
            Expr::Attribute { attr, .. } if attr == "open" => Some(keywords),
            Expr::Name { id } if id == "open" => Some(keywords),
            _ => innermost_open_keywords(func),
        },
        Expr::Attribute { value, .. } => innermost_open_keywords(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> &'static KnowledgeBase {
        KnowledgeBase::builtin()
    }

    fn versions(set: &FxHashSet<VersionTag>) -> Vec<&str> {
        let mut out: Vec<&str> = set.iter().map(VersionTag::as_str).collect();
        out.sort_by(|a, b| {
            crate::version::compare(a, b).unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    #[test]
    fn universal_stdlib_yields_full_universe() {
        let compatible = compatible_versions("import os\n", &FxHashSet::default(), kb());
        assert_eq!(compatible.len(), kb().versions().len());
    }

    #[test]
    fn legacy_only_module_restricts_to_legacy() {
        let compatible = compatible_versions("import urllib2\n", &FxHashSet::default(), kb());
        assert_eq!(versions(&compatible), vec!["2.7"]);
    }

    #[test]
    fn modern_module_excludes_legacy() {
        let compatible = compatible_versions("import pathlib\n", &FxHashSet::default(), kb());
        assert!(!compatible.contains(&VersionTag::from("2.7")));
    }

    #[test]
    fn third_party_modules_impose_no_constraint() {
        let compatible = compatible_versions("import requests\n", &FxHashSet::default(), kb());
        assert_eq!(compatible.len(), kb().versions().len());
    }

    #[test]
    fn locally_owned_modules_impose_no_constraint() {
        let mut owned = FxHashSet::default();
        owned.insert("urllib2".to_string());
        let compatible = compatible_versions("import urllib2\n", &owned, kb());
        assert_eq!(compatible.len(), kb().versions().len());
    }

    #[test]
    fn fstring_feature_restricts_versions() {
        let compatible =
            compatible_versions("name = f\"{user}\"\n", &FxHashSet::default(), kb());
        assert_eq!(versions(&compatible), vec!["3.6", "3.7", "3.8", "3.9", "3.10"]);
    }

    #[test]
    fn conflicting_evidence_empties_the_set() {
        let source = "import urllib2\nname = f\"{user}\"\n";
        let compatible = compatible_versions(source, &FxHashSet::default(), kb());
        assert!(compatible.is_empty());
    }

    #[test]
    fn comment_lines_are_not_scanned() {
        let source = "# async def looks_like_a_feature():\nimport os\n";
        assert!(extract_features(source, kb()).is_empty());
    }

    #[test]
    fn one_feature_per_line() {
        let features = extract_features("async def run(): await task()\n", kb());
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn features_recorded_once_per_file() {
        let source = "x = f\"a\"\ny = f\"b\"\n";
        let features = extract_features(source, kb());
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "fstring_literal");
    }

    #[test]
    fn open_with_encoding_drops_oldest_legacy() {
        let source = "data = open(path, encoding=\"utf-8\")\n";
        let compatible = compatible_versions(source, &FxHashSet::default(), kb());
        assert!(!compatible.contains(&VersionTag::from("2.7")));
        assert!(compatible.contains(&VersionTag::from("3.5")));
    }

    #[test]
    fn rebound_open_is_encoding_safe() {
        let source = "from io import open\ndata = open(path, encoding=\"utf-8\")\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(!uses_open_encoding_kwarg(&tree));

        let source = "import io\ndata = io.open(path, encoding=\"utf-8\")\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(!uses_open_encoding_kwarg(&tree));

        let source = "import codecs as c\ndata = c.open(path, encoding=\"utf-8\")\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(!uses_open_encoding_kwarg(&tree));
    }

    #[test]
    fn open_keywords_found_through_method_chains() {
        let source = "with open(path, encoding=\"utf-8\") as f:\n    data = f.read()\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(uses_open_encoding_kwarg(&tree));

        let source = "data = open(path, encoding=\"utf-8\").read()\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(uses_open_encoding_kwarg(&tree));
    }

    #[test]
    fn open_without_encoding_is_fine() {
        let source = "data = open(path).read()\n";
        let tree = pyvet_syntax::parse(source).unwrap();
        assert!(!uses_open_encoding_kwarg(&tree));
    }

    #[test]
    fn third_party_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        std::fs::write(&path, "import requests\nimport os\n").unwrap();
        assert!(has_undeclared_third_party(
            &path,
            &FxHashSet::default(),
            None,
            false,
            kb()
        ));

        std::fs::write(&path, "import os\nimport setuptools\n").unwrap();
        assert!(!has_undeclared_third_party(
            &path,
            &FxHashSet::default(),
            None,
            false,
            kb()
        ));

        let mut owned = FxHashSet::default();
        owned.insert("requests".to_string());
        std::fs::write(&path, "import requests\n").unwrap();
        assert!(!has_undeclared_third_party(&path, &owned, None, false, kb()));
    }
}
