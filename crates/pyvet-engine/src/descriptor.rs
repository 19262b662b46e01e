//! Build-descriptor analysis.
//!
//! The engine recognizes a single declarative packaging convention: a call
//! whose target was imported from the packaging toolkit, under any alias,
//! directly or through an intermediate rebinding. The interesting question
//! is whether that call declares a compatibility range via the
//! `python_requires` keyword.

use pyvet_syntax::{Expr, Keyword, Stmt, SyntaxTree};

use crate::extract::find_call_keywords;

const TOOLKIT: &str = "setuptools";
const ENTRY_FUNCTION: &str = "setup";
const COMPATIBILITY_KEYWORD: &str = "python_requires";

/// Whether the descriptor's packaging call declares a compatibility range.
pub fn declares_compatibility_range(tree: &SyntaxTree) -> bool {
    let Some(keywords) = entry_call_keywords(tree) else {
        return false;
    };
    keywords
        .iter()
        .any(|keyword| keyword.arg.as_deref() == Some(COMPATIBILITY_KEYWORD))
}

/// The keyword arguments of the packaging entry call, if the descriptor
/// makes one.
pub fn entry_call_keywords(tree: &SyntaxTree) -> Option<&[Keyword]> {
    let candidates = entry_call_candidates(tree);
    if candidates.is_empty() {
        // The packaging toolkit is not even imported.
        return None;
    }
    find_call_keywords(&tree.body, &|expr| match expr {
        Expr::Call { func, keywords, .. }
            if func
                .dotted_name()
                .is_some_and(|name| candidates.contains(&name)) =>
        {
            Some(keywords)
        }
        _ => None,
    })
}

/// Names the packaging entry function is callable under: aliased imports
/// of the toolkit or of the function itself, plus one level of rebinding
/// (`alternative = setup`).
fn entry_call_candidates(tree: &SyntaxTree) -> Vec<String> {
    let mut candidates = Vec::new();
    collect_import_candidates(&tree.body, &mut candidates);
    collect_rebindings(&tree.body, &mut candidates);
    candidates
}

fn collect_import_candidates(body: &[Stmt], candidates: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Import { names } => {
                for alias in names {
                    if alias.name == TOOLKIT {
                        let bound = alias.asname.as_deref().unwrap_or(TOOLKIT);
                        candidates.push(format!("{bound}.{ENTRY_FUNCTION}"));
                    }
                }
            }
            Stmt::ImportFrom { module, names, .. } => {
                if module.as_deref() == Some(TOOLKIT) {
                    for alias in names {
                        if alias.name == ENTRY_FUNCTION {
                            let bound = alias.asname.as_deref().unwrap_or(ENTRY_FUNCTION);
                            candidates.push(bound.to_string());
                        }
                    }
                }
            }
            Stmt::If { body, orelse, .. } => {
                collect_import_candidates(body, candidates);
                collect_import_candidates(orelse, candidates);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                ..
            } => {
                collect_import_candidates(body, candidates);
                collect_import_candidates(orelse, candidates);
                for handler in handlers {
                    collect_import_candidates(&handler.body, candidates);
                }
            }
            Stmt::FunctionDef { body, .. } => collect_import_candidates(body, candidates),
            _ => {}
        }
    }
}

/// `alternative = setup` style rebindings of an existing candidate.
fn collect_rebindings(body: &[Stmt], candidates: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Assign { targets, value } => {
                let Some(source) = value.dotted_name() else {
                    continue;
                };
                if !candidates.contains(&source) {
                    continue;
                }
                for target in targets {
                    if let Expr::Name { id } = target {
                        if !candidates.contains(id) {
                            candidates.push(id.clone());
                        }
                    }
                }
            }
            Stmt::If { body, orelse, .. } => {
                collect_rebindings(body, candidates);
                collect_rebindings(orelse, candidates);
            }
            Stmt::Try { body, orelse, .. } => {
                collect_rebindings(body, candidates);
                collect_rebindings(orelse, candidates);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(source: &str) -> SyntaxTree {
        pyvet_syntax::parse(source).expect("test source parses")
    }

    #[test]
    fn direct_import_form() {
        let source = "from setuptools import setup\nsetup(name=\"demo\", python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn module_import_form() {
        let source = "import setuptools\nsetuptools.setup(name=\"demo\", python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn aliased_module_import() {
        let source = "import setuptools as st\nst.setup(name=\"demo\", python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn aliased_function_import() {
        let source = "from setuptools import setup as configure\nconfigure(python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn intermediate_rebinding() {
        let source = "from setuptools import setup\ndo_setup = setup\ndo_setup(python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn missing_keyword_is_not_declared() {
        let source = "from setuptools import setup\nsetup(name=\"demo\")\n";
        assert!(!declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn toolkit_not_imported_means_no_declaration() {
        let source = "def setup(**kwargs):\n    return kwargs\nsetup(python_requires=\">=3.6\")\n";
        assert!(!declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn call_inside_main_guard() {
        let source = "from setuptools import setup\nif __name__ == \"__main__\":\n    setup(python_requires=\">=3.6\")\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn call_inside_helper_function() {
        let source = "from setuptools import setup\ndef main():\n    setup(python_requires=\">=3.6\")\nmain()\n";
        assert!(declares_compatibility_range(&parsed(source)));
    }

    #[test]
    fn unrelated_setup_call_is_ignored() {
        let source = "import setuptools\nimport another\nanother.setup(python_requires=\">=3.6\")\n";
        assert!(!declares_compatibility_range(&parsed(source)));
    }
}
