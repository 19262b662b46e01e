//! Import extraction over the uniform syntax tree.
//!
//! Two flavors feed different analyses:
//!
//! - [`module_references`] records every imported module with its
//!   relative-import level, descending through compound statements. Only
//!   the entry file (the build descriptor) gets its function and class
//!   bodies inspected; ordinary modules are expected to import at module
//!   scope.
//! - [`top_level_modules`] records just the first dotted segment of
//!   absolute imports, for matching against the stdlib table.
//!
//! Also hosts the shared call-site search used by the descriptor and
//! open-primitive analyses.

use rustc_hash::FxHashSet;

use pyvet_syntax::{Expr, Keyword, Stmt, SyntaxTree};

/// One imported module: its qualified name and relative-import level
/// (0 = absolute).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleReference {
    pub name: String,
    pub level: u32,
}

/// Collect every module reference in the tree.
///
/// `include_defs` turns on descent into function/class bodies; callers set
/// it for the build descriptor only, where imports routinely hide inside
/// helper functions. The flag never propagates into nested scopes.
pub fn module_references(tree: &SyntaxTree, include_defs: bool) -> FxHashSet<ModuleReference> {
    let mut out = FxHashSet::default();
    collect_references(&tree.body, include_defs, &mut out);
    out
}

fn collect_references(body: &[Stmt], include_defs: bool, out: &mut FxHashSet<ModuleReference>) {
    for stmt in body {
        match stmt {
            Stmt::Import { names } => {
                for alias in names {
                    out.insert(ModuleReference {
                        name: alias.name.clone(),
                        level: 0,
                    });
                }
            }
            Stmt::ImportFrom {
                module,
                names,
                level,
            } => {
                for alias in names {
                    let name = match module {
                        Some(module) => format!("{module}.{}", alias.name),
                        None => alias.name.clone(),
                    };
                    out.insert(ModuleReference {
                        name,
                        level: *level,
                    });
                }
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } | Stmt::With { body, .. } => {
                collect_references(body, false, out);
            }
            Stmt::FunctionDef { body, .. } | Stmt::ClassDef { body, .. } if include_defs => {
                collect_references(body, false, out);
            }
            Stmt::If { body, orelse, .. } => {
                collect_references(body, false, out);
                collect_references(orelse, false, out);
            }
            Stmt::Try { body, handlers, .. } => {
                collect_references(body, false, out);
                for handler in handlers {
                    collect_references(&handler.body, false, out);
                }
            }
            _ => {}
        }
    }
}

/// Collect the first dotted segment of every absolute import, descending
/// through compound statement bodies (and both arms of `if`). Relative
/// imports contribute nothing.
pub fn top_level_modules(tree: &SyntaxTree) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    collect_top_levels(&tree.body, &mut out);
    out
}

fn collect_top_levels(body: &[Stmt], out: &mut FxHashSet<String>) {
    for stmt in body {
        match stmt {
            Stmt::Import { names } => {
                for alias in names {
                    out.insert(first_segment(&alias.name).to_string());
                }
            }
            Stmt::ImportFrom { module, level, .. } => {
                if *level == 0 {
                    if let Some(module) = module {
                        out.insert(first_segment(module).to_string());
                    }
                }
            }
            _ => {}
        }
        match stmt {
            Stmt::If { body, orelse, .. } => {
                collect_top_levels(body, out);
                collect_top_levels(orelse, out);
            }
            Stmt::For { body, .. }
            | Stmt::While { body, .. }
            | Stmt::FunctionDef { body, .. }
            | Stmt::ClassDef { body, .. }
            | Stmt::Try { body, .. } => collect_top_levels(body, out),
            _ => {}
        }
    }
}

/// The first dotted segment of a qualified module name.
pub fn first_segment(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Search statement bodies for a call the extractor recognizes, in the
/// order the original toolchain established: `if` arms, expression
/// statements, function bodies, assignment and return values, `try`
/// bodies and else-arms, `with` context expressions then bodies. First
/// match wins.
pub(crate) fn find_call_keywords<'a>(
    body: &'a [Stmt],
    extract: &dyn Fn(&'a Expr) -> Option<&'a [Keyword]>,
) -> Option<&'a [Keyword]> {
    for stmt in body {
        let found = match stmt {
            Stmt::If { body, orelse, .. } => find_call_keywords(body, extract)
                .or_else(|| find_call_keywords(orelse, extract)),
            Stmt::Expr { value } => extract(value),
            Stmt::FunctionDef { body, .. } => find_call_keywords(body, extract),
            Stmt::Assign { value, .. } => extract(value),
            Stmt::Return { value } => value.as_ref().and_then(extract),
            Stmt::Try { body, orelse, .. } => find_call_keywords(body, extract)
                .or_else(|| find_call_keywords(orelse, extract)),
            Stmt::With { items, body } => items
                .iter()
                .find_map(|item| extract(&item.context_expr))
                .or_else(|| find_call_keywords(body, extract)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(source: &str) -> SyntaxTree {
        pyvet_syntax::parse(source).expect("test source parses")
    }

    #[test]
    fn references_record_levels() {
        let tree = parsed("import os.path\nfrom . import util\nfrom ..shared import base\n");
        let refs = module_references(&tree, false);
        assert!(refs.contains(&ModuleReference {
            name: "os.path".into(),
            level: 0
        }));
        assert!(refs.contains(&ModuleReference {
            name: "util".into(),
            level: 1
        }));
        assert!(refs.contains(&ModuleReference {
            name: "shared.base".into(),
            level: 2
        }));
    }

    #[test]
    fn function_bodies_only_for_the_entry_file() {
        let source = "def helper():\n    import json\n";
        let tree = parsed(source);
        assert!(module_references(&tree, false).is_empty());
        let refs = module_references(&tree, true);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn descent_does_not_propagate_into_nested_functions() {
        let source = "if True:\n    def helper():\n        import json\n";
        let tree = parsed(source);
        assert!(module_references(&tree, true).is_empty());
    }

    #[test]
    fn compound_bodies_are_searched() {
        let source = "try:\n    import fast_json\nexcept ImportError:\n    import json\nfor _ in range(2):\n    import csv\n";
        let tree = parsed(source);
        let refs = module_references(&tree, false);
        let names: FxHashSet<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains("fast_json"));
        assert!(names.contains("json"));
        assert!(names.contains("csv"));
    }

    #[test]
    fn top_levels_keep_first_segment_only() {
        let tree = parsed("import os.path\nfrom xml.etree import ElementTree\nfrom . import local\n");
        let tops = top_level_modules(&tree);
        assert!(tops.contains("os"));
        assert!(tops.contains("xml"));
        assert!(!tops.contains("local"));
        assert_eq!(tops.len(), 2);
    }

    #[test]
    fn extraction_is_idempotent_across_parses() {
        let source = "import os\nif True:\n    import sys\nelse:\n    import json\n";
        let first = module_references(&parsed(source), true);
        let second = module_references(&parsed(source), true);
        assert_eq!(first, second);
        assert_eq!(
            top_level_modules(&parsed(source)),
            top_level_modules(&parsed(source))
        );
    }
}
