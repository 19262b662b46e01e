//! Breadth-first traversal over a project's locally-resolvable module graph.
//!
//! `search` is an existence check: starting from the entry file (the build
//! descriptor), it applies a caller-supplied predicate to every reachable
//! local module and short-circuits on the first hit. Unreadable and
//! unparseable files contribute no imports; imports that cannot be mapped
//! to a local file are silently excluded from the frontier.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use rustc_hash::FxHashSet;

use crate::extract::{first_segment, module_references, ModuleReference};
use crate::version::{self, VersionTag};

/// Source file suffixes that can own a local top-level module.
const MODULE_SUFFIXES: [&str; 2] = [".py", ".so"];

/// Ancestor package directories are auto-visited from this language
/// version on (implicit parent-package imports).
const NAMESPACE_THRESHOLD: &str = "3.3";

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// The language version whose import semantics the walk mirrors.
    pub language_version: VersionTag,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        WalkerConfig {
            language_version: VersionTag::from("3.9"),
        }
    }
}

/// The traversal framework. Cheap to construct; holds no per-run state.
#[derive(Debug, Default)]
pub struct ModuleWalker {
    config: WalkerConfig,
}

impl ModuleWalker {
    pub fn new(config: WalkerConfig) -> Self {
        ModuleWalker { config }
    }

    /// Breadth-first existence search from `entry`. The predicate receives
    /// each reachable file and whether it is the entry node; the first
    /// `true` wins. Extra predicate state travels in its closure.
    pub fn search<F>(&self, entry: &Path, mut predicate: F) -> bool
    where
        F: FnMut(&Path, bool) -> bool,
    {
        let entry = entry.to_path_buf().clean();
        let root = match entry.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let local_tops = local_top_level_modules(&root, &entry);

        let mut visited: FxHashSet<PathBuf> = FxHashSet::default();
        visited.insert(entry.clone());
        let mut queue = VecDeque::from([entry]);
        let mut is_entry = true;
        while let Some(path) = queue.pop_front() {
            if predicate(&path, is_entry) {
                return true;
            }
            for next in self.local_imports(&path, &root, &local_tops, is_entry) {
                if visited.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
            is_entry = false;
        }
        false
    }

    /// Paths of the locally-resolvable modules one file imports.
    fn local_imports(
        &self,
        path: &Path,
        root: &Path,
        local_tops: &FxHashSet<String>,
        is_entry: bool,
    ) -> Vec<PathBuf> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "skipping unreadable file");
                return Vec::new();
            }
        };
        let Some(tree) = pyvet_syntax::parse(&source) else {
            tracing::debug!(path = %path.display(), "skipping unparseable file");
            return Vec::new();
        };

        let mut out = Vec::new();
        for reference in module_references(&tree, is_entry) {
            let Some(resolved) = resolve_relative(&reference, path, root) else {
                continue;
            };
            if !local_tops.contains(first_segment(&resolved)) {
                continue;
            }
            out.extend(self.candidate_paths(&resolved, root));
        }
        // Import sets are unordered; keep the frontier deterministic.
        out.sort();
        out.dedup();
        out
    }

    /// Map a dotted module name to candidate files, most specific first:
    /// a directory with an initializer, or a same-named source file. From
    /// the namespace threshold on, ancestor packages are visited too.
    fn candidate_paths(&self, module: &str, root: &Path) -> Vec<PathBuf> {
        let visit_ancestors = version::compare(
            self.config.language_version.as_str(),
            NAMESPACE_THRESHOLD,
        ) != Some(std::cmp::Ordering::Less);

        let mut current = root.to_path_buf();
        for segment in module.split('.').filter(|segment| !segment.is_empty()) {
            current.push(segment);
        }

        let mut out = Vec::new();
        while current != root {
            if current.is_dir() {
                let init = current.join("__init__.py");
                if init.is_file() {
                    out.push(init);
                }
            } else {
                let file = current.with_extension("py");
                if file.is_file() {
                    out.push(file);
                }
            }
            if !visit_ancestors {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        out
    }
}

/// Resolve a relative import by walking up from the importing file `level`
/// directories and prefixing the path back down from the project root.
/// `None` when the walk escapes the project.
fn resolve_relative(
    reference: &ModuleReference,
    importing: &Path,
    root: &Path,
) -> Option<String> {
    if reference.level == 0 {
        return Some(reference.name.clone());
    }
    let mut dir = importing.parent()?;
    for _ in 1..reference.level {
        dir = dir.parent()?;
    }
    let prefix: Vec<&str> = dir
        .strip_prefix(root)
        .ok()?
        .components()
        .filter_map(|component| component.as_os_str().to_str())
        .collect();
    if prefix.is_empty() {
        Some(reference.name.clone())
    } else {
        Some(format!("{}.{}", prefix.join("."), reference.name))
    }
}

/// The project's local top-level modules: directories carrying an
/// initializer file, plus standalone source/extension files. The entry
/// descriptor and dunder files are not modules.
pub fn local_top_level_modules(root: &Path, entry: &Path) -> FxHashSet<String> {
    let mut modules = FxHashSet::default();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(root = %root.display(), %error, "cannot list project root");
            return modules;
        }
    };
    for entry_result in entries.flatten() {
        let path = entry_result.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if path.is_dir() {
            if path.join("__init__.py").is_file() {
                modules.insert(name.to_string());
            }
        } else if MODULE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            if path.as_path() == entry || name.starts_with("__") {
                continue;
            }
            modules.insert(first_segment(name).to_string());
        }
    }
    modules
}

/// The project's owned module set, preferring installed metadata: a single
/// `*-info` directory with a `top_level.txt` wins over directory scanning.
pub fn project_modules(root: &Path) -> FxHashSet<String> {
    let fallback_entry = root.join("setup.py");
    let Ok(entries) = fs::read_dir(root) else {
        return FxHashSet::default();
    };
    let info_dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with("-info"))
        })
        .collect();
    if let [info_dir] = info_dirs.as_slice() {
        let top_level = info_dir.join("top_level.txt");
        if let Ok(content) = fs::read_to_string(&top_level) {
            return content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    local_top_level_modules(root, &fallback_entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn local_modules_are_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "from setuptools import setup\n");
        write(&root.join("app.py"), "import os\n");
        write(&root.join("__main__.py"), "");
        write(&root.join("pkg/__init__.py"), "");
        write(&root.join("notes.txt"), "");
        fs::create_dir_all(root.join("plain_dir")).unwrap();

        let tops = local_top_level_modules(root, &root.join("setup.py"));
        assert!(tops.contains("app"));
        assert!(tops.contains("pkg"));
        assert!(!tops.contains("setup"));
        assert!(!tops.contains("__main__"));
        assert!(!tops.contains("plain_dir"));
        assert!(!tops.contains("notes"));
    }

    #[test]
    fn installed_metadata_wins_over_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("demo-1.0.dist-info/top_level.txt"), "demo\n_demo_ext\n");
        write(&root.join("other.py"), "");
        let modules = project_modules(root);
        assert!(modules.contains("demo"));
        assert!(modules.contains("_demo_ext"));
        assert!(!modules.contains("other"));
    }

    #[test]
    fn search_short_circuits_on_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import app\n");
        write(&root.join("app.py"), "import helper\n");
        write(&root.join("helper.py"), "x = 1\n");

        let walker = ModuleWalker::default();
        let mut seen = Vec::new();
        let found = walker.search(&root.join("setup.py"), |path, _| {
            seen.push(path.file_name().unwrap().to_str().unwrap().to_string());
            false
        });
        assert!(!found);
        assert_eq!(seen, vec!["setup.py", "app.py", "helper.py"]);

        let mut count = 0;
        let found = walker.search(&root.join("setup.py"), |path, _| {
            count += 1;
            path.file_name().unwrap() == "app.py"
        });
        assert!(found);
        assert_eq!(count, 2);
    }

    #[test]
    fn entry_flag_is_true_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import app\n");
        write(&root.join("app.py"), "x = 1\n");

        let mut flags = Vec::new();
        ModuleWalker::default().search(&root.join("setup.py"), |_, is_entry| {
            flags.push(is_entry);
            false
        });
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn imports_inside_descriptor_helpers_are_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("setup.py"),
            "def read_version():\n    import app\n    return app.VERSION\n",
        );
        write(&root.join("app.py"), "VERSION = \"1.0\"\n");
        write(
            &root.join("other.py"),
            "def helper():\n    import app\n",
        );

        let walker = ModuleWalker::default();
        let mut seen = Vec::new();
        walker.search(&root.join("setup.py"), |path, _| {
            seen.push(path.file_name().unwrap().to_str().unwrap().to_string());
            false
        });
        assert_eq!(seen, vec!["setup.py", "app.py"]);
    }

    #[test]
    fn relative_imports_resolve_within_packages() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import pkg\n");
        write(&root.join("pkg/__init__.py"), "from . import inner\n");
        write(&root.join("pkg/inner.py"), "y = 2\n");

        let mut seen = Vec::new();
        ModuleWalker::default().search(&root.join("setup.py"), |path, _| {
            seen.push(path.file_name().unwrap().to_str().unwrap().to_string());
            false
        });
        assert!(seen.contains(&"inner.py".to_string()));
    }

    #[test]
    fn cycles_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import a\n");
        write(&root.join("a.py"), "import b\n");
        write(&root.join("b.py"), "import a\n");

        let mut count = 0;
        let found = ModuleWalker::default().search(&root.join("setup.py"), |_, _| {
            count += 1;
            false
        });
        assert!(!found);
        assert_eq!(count, 3);
    }

    #[test]
    fn unreadable_and_unparseable_files_contribute_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import broken\nimport ghost\n");
        write(&root.join("broken.py"), "def def def\n");

        let mut count = 0;
        ModuleWalker::default().search(&root.join("setup.py"), |_, _| {
            count += 1;
            false
        });
        // setup.py and broken.py; "ghost" resolves to no file at all.
        assert_eq!(count, 2);
    }

    #[test]
    fn ancestor_packages_visited_only_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("setup.py"), "import pkg.sub.mod\n");
        write(&root.join("pkg/__init__.py"), "");
        write(&root.join("pkg/sub/__init__.py"), "");
        write(&root.join("pkg/sub/mod.py"), "z = 3\n");

        let modern = ModuleWalker::default();
        let mut seen = Vec::new();
        modern.search(&root.join("setup.py"), |path, _| {
            seen.push(path.to_path_buf());
            false
        });
        assert_eq!(seen.len(), 4);

        let old = ModuleWalker::new(WalkerConfig {
            language_version: VersionTag::from("2.7"),
        });
        let mut seen = Vec::new();
        old.search(&root.join("setup.py"), |path, _| {
            seen.push(path.to_path_buf());
            false
        });
        // Only the most specific match below the namespace threshold.
        assert_eq!(seen.len(), 2);
        assert!(seen[1].ends_with("pkg/sub/mod.py"));
    }
}
