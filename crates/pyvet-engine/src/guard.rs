//! Runtime version-guard detection.
//!
//! Flags files that import the language's version-identifier facility and
//! then branch on a comparison involving it, where at least one arm of the
//! conditional terminates (raise, return, or an `*exit*` call). The check
//! is deliberately permissive: similarly named unrelated identifiers can
//! produce false positives, and that is an accepted limitation.

use pyvet_syntax::{Expr, Stmt, SyntaxTree};

/// Whether the tree manually special-cases interpreter versions at runtime.
pub fn uses_runtime_version_guard(tree: &SyntaxTree) -> bool {
    let mut guard_ids: Vec<&str> = Vec::new();
    for stmt in &tree.body {
        match stmt {
            Stmt::Import { names } => {
                if names.iter().any(|alias| alias.name == "sys") {
                    guard_ids.push("sys.version_info");
                }
            }
            Stmt::ImportFrom { module, names, .. } => {
                if module.as_deref() == Some("sys")
                    && names.iter().any(|alias| alias.name == "version_info")
                {
                    guard_ids.push("version_info");
                }
            }
            _ => {}
        }
    }
    if guard_ids.is_empty() {
        return false;
    }
    body_mentions_guard(&tree.body, &guard_ids)
}

fn body_mentions_guard(body: &[Stmt], guard_ids: &[&str]) -> bool {
    body.iter().any(|stmt| stmt_mentions_guard(stmt, guard_ids))
}

fn stmt_mentions_guard(stmt: &Stmt, guard_ids: &[&str]) -> bool {
    match stmt {
        Stmt::Assign { value, .. } => expr_compares_guard(value, guard_ids),
        Stmt::Expr { value } => expr_compares_guard(value, guard_ids),
        Stmt::If { test, body, orelse } => {
            if expr_compares_guard(test, guard_ids) && branch_terminates(body, orelse) {
                return true;
            }
            body_mentions_guard(body, guard_ids) || body_mentions_guard(orelse, guard_ids)
        }
        _ => false,
    }
}

/// A comparison mentioning a guard id on either side, possibly inside a
/// boolean combination of comparisons.
fn expr_compares_guard(expr: &Expr, guard_ids: &[&str]) -> bool {
    match expr {
        Expr::Compare { left, comparators } => {
            if identifier_of(left).is_some_and(|id| guard_ids.contains(&id.as_str())) {
                return true;
            }
            comparators
                .iter()
                .any(|item| identifier_of(item).is_some_and(|id| guard_ids.contains(&id.as_str())))
        }
        Expr::BoolOp { values } => values
            .iter()
            .any(|value| expr_compares_guard(value, guard_ids)),
        _ => false,
    }
}

/// The dotted identifier an expression reads, seen through subscripts:
/// `sys.version_info[0]` reads `sys.version_info`.
fn identifier_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Constant(_) => None,
        Expr::Subscript { value } => identifier_of(value),
        Expr::Attribute { value, attr } => {
            let base = identifier_of(value)?;
            Some(format!("{base}.{attr}"))
        }
        Expr::Name { id } => Some(id.clone()),
        _ => None,
    }
}

fn branch_terminates(body: &[Stmt], orelse: &[Stmt]) -> bool {
    body.iter().chain(orelse).any(is_terminating_stmt)
}

/// raise, return, or a call whose name contains "exit".
fn is_terminating_stmt(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Raise { .. } | Stmt::Return { .. } => true,
        Stmt::Expr {
            value: Expr::Call { func, .. },
        } => match func.as_ref() {
            Expr::Name { id } => id.contains("exit"),
            Expr::Attribute { attr, .. } => attr.contains("exit"),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(source: &str) -> SyntaxTree {
        pyvet_syntax::parse(source).expect("test source parses")
    }

    #[test]
    fn raise_guard_is_flagged() {
        let source = "import sys\nif sys.version_info >= (3,):\n    raise RuntimeError(\"unsupported\")\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn exit_call_guard_is_flagged() {
        let source = "import sys\nif sys.version_info[0] < 3:\n    sys.exit(1)\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn bare_import_guard_via_from_form() {
        let source = "from sys import version_info\nif version_info < (3, 5):\n    raise ImportError(\"too old\")\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn boolean_combinations_are_seen() {
        let source = "import sys\nif flag and sys.version_info >= (3, 8):\n    raise SystemExit\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn comparison_on_the_right_counts() {
        let source = "import sys\nif (3, 0) <= sys.version_info:\n    raise RuntimeError(\"no\")\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn guard_without_terminating_branch_is_not_flagged() {
        let source = "import sys\nif sys.version_info >= (3,):\n    text_type = str\nelse:\n    text_type = unicode\n";
        assert!(!uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn no_version_import_means_no_guard() {
        let source = "if version_info >= (3,):\n    raise RuntimeError(\"no\")\n";
        assert!(!uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn plain_import_does_not_register_bare_name() {
        let source = "import sys\nif version_info >= (3,):\n    raise RuntimeError(\"no\")\n";
        assert!(!uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn terminating_else_arm_counts() {
        let source = "import sys\nif sys.version_info >= (3,):\n    pass\nelse:\n    sys.exit(\"legacy interpreter\")\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }

    #[test]
    fn nested_guard_inside_if_is_found() {
        let source = "import sys\nif debug:\n    if sys.version_info < (3,):\n        raise RuntimeError(\"no\")\n";
        assert!(uses_runtime_version_guard(&parsed(source)));
    }
}
