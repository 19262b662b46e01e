//! Version-constraint expressions and dependency-expression splitting.
//!
//! A constraint expression is a comma-separated conjunction of
//! `<operator><literal>` conditions. Evaluation never raises: a condition
//! without a recognizable operator is vacuously satisfied, a condition with
//! a malformed literal is silently unsatisfied (no ordering relation), and
//! the empty expression admits every candidate.
//!
//! `~=` (compatible release) is approximated as `>=`; the implied upper
//! bound is not modeled. This is a documented simplification, not a bug.

use std::cmp::Ordering;

use crate::version::{self, VersionTag};

/// Comparison operators, in the detection priority order that keeps
/// multi-character operators from being mis-split by their single-character
/// prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
    Compatible,
}

const SYMBOLS: [(&str, CmpOp); 7] = [
    (">=", CmpOp::Ge),
    ("<=", CmpOp::Le),
    (">", CmpOp::Gt),
    ("<", CmpOp::Lt),
    ("==", CmpOp::Eq),
    ("!=", CmpOp::Ne),
    ("~=", CmpOp::Compatible),
];

impl CmpOp {
    fn admits(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            // Mapped to `>=` before evaluation.
            CmpOp::Compatible => ordering != Ordering::Less,
        }
    }
}

/// One `<operator><literal>` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub op: CmpOp,
    pub literal: String,
}

impl Condition {
    fn holds_for(&self, version: &str) -> bool {
        let op = if self.op == CmpOp::Compatible {
            CmpOp::Ge
        } else {
            self.op
        };
        if let Some(star) = self.literal.find('*') {
            let prefix = &self.literal[..star];
            return match op {
                CmpOp::Eq => format!("{version}.").starts_with(prefix),
                CmpOp::Ne => !format!("{version}.").starts_with(prefix),
                CmpOp::Gt | CmpOp::Ge => {
                    match version::compare(version, prefix.trim_end_matches('.')) {
                        Some(ordering) => op.admits(ordering),
                        None => false,
                    }
                }
                // Wildcards under the remaining operators are treated as
                // satisfied rather than rejected.
                _ => true,
            };
        }
        match version::compare(version, &self.literal) {
            Some(ordering) => op.admits(ordering),
            None => false,
        }
    }
}

/// A parsed conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstraintExpr {
    conditions: Vec<Condition>,
}

impl ConstraintExpr {
    /// Parse a raw expression. Chunks without a recognizable operator are
    /// vacuous and dropped; parsing itself never fails.
    pub fn parse(raw: &str) -> Self {
        let conditions = raw
            .split(',')
            .filter_map(|chunk| {
                let chunk = chunk.trim();
                let (op, rest) = find_operator(chunk)?;
                let literal = rest.trim().replace(['\'', '"'], "");
                Some(Condition { op, literal })
            })
            .collect();
        ConstraintExpr { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether a single version satisfies every condition.
    pub fn satisfied_by(&self, version: &VersionTag) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.holds_for(version.as_str()))
    }

    /// The ascending-sorted subset of candidates satisfying the expression.
    pub fn satisfying(&self, candidates: &[VersionTag]) -> Vec<VersionTag> {
        let mut satisfied: Vec<VersionTag> = candidates
            .iter()
            .filter(|candidate| self.satisfied_by(candidate))
            .cloned()
            .collect();
        version::sort_ascending(&mut satisfied);
        satisfied
    }
}

/// Extract the operator of one condition chunk: the symbol is searched in
/// priority order and the remainder (symbol removed) is the literal.
fn find_operator(chunk: &str) -> Option<(CmpOp, String)> {
    for (symbol, op) in SYMBOLS {
        if chunk.contains(symbol) {
            return Some((op, chunk.replacen(symbol, "", 1)));
        }
    }
    None
}

/// A dependency resolved against its published release list: the earliest
/// and latest claimed-compatible releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub name: String,
    pub lower: VersionTag,
    pub upper: VersionTag,
}

/// Split one declared dependency expression into `(name, constraint)`.
///
/// Returns `None` for entries this engine does not model: conditional
/// dependencies carrying a post-`;` environment marker. Bracketed extras
/// are stripped from the name; the constraint is either a parenthesized
/// block or the tail starting at the earliest comparison operator.
pub fn split_dependency(expr: &str) -> Option<(String, String)> {
    if expr.contains(';') {
        return None;
    }
    let (head, parenthesized) = match (expr.find('('), expr.find(')')) {
        (Some(start), Some(end)) if start < end => (&expr[..start], expr[start + 1..end].trim()),
        _ => (expr, ""),
    };
    let mut name = head.trim();
    if let Some(bracket) = name.find('[') {
        name = name[..bracket].trim_end();
    }
    let mut condition = parenthesized.to_string();

    // Earliest operator occurrence wins; at equal positions the priority
    // order keeps `>=` from being read as `>`.
    let mut split_at: Option<usize> = None;
    for (symbol, _) in SYMBOLS {
        if let Some(index) = name.find(symbol) {
            if split_at.map_or(true, |best| index < best) {
                split_at = Some(index);
            }
        }
    }
    if let Some(index) = split_at {
        condition = name[index..].trim().to_string();
        name = name[..index].trim_end();
    }

    Some((name.to_string(), condition))
}

/// Resolve a dependency expression against the dependency's release list,
/// producing its claimed lower and upper bounds.
pub fn resolve_dependency(expr: &str, releases: &[VersionTag]) -> Option<DependencyEdge> {
    let (name, condition) = split_dependency(expr)?;
    if name.is_empty() {
        return None;
    }
    let satisfied = ConstraintExpr::parse(&condition).satisfying(releases);
    let lower = satisfied.first()?.clone();
    let upper = satisfied.last()?.clone();
    Some(DependencyEdge { name, lower, upper })
}
