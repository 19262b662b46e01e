//! Transitive dependency availability resolution.
//!
//! For every declared dependency, the resolver checks both claimed bounds:
//! the dependency's earliest claimed-compatible release must support the
//! parent's compatibility floor (recursively through its own
//! dependencies), and symmetrically the latest release must support the
//! ceiling. The whole computation is an existence check for a single
//! failure, with optimistic defaults: metadata the registry cannot produce
//! is assumed compatible.
//!
//! The context object owns the two path-scoped visited sets; construct a
//! fresh context per top-level resolution.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use crate::constraint::{resolve_dependency, ConstraintExpr, DependencyEdge};
use crate::knowledge::KnowledgeBase;
use crate::registry::Registry;
use crate::version::VersionTag;

/// One resolution call tree: the registry handle plus the visited sets
/// guarding the lower- and upper-bound recursions against cycles.
pub struct ResolveContext<'a> {
    registry: &'a dyn Registry,
    kb: &'a KnowledgeBase,
    visited_lower: FxHashSet<String>,
    visited_upper: FxHashSet<String>,
}

fn visit_key(name: &str, version: &VersionTag) -> String {
    format!("{name}#{version}")
}

impl<'a> ResolveContext<'a> {
    pub fn new(registry: &'a dyn Registry, kb: &'a KnowledgeBase) -> Self {
        ResolveContext {
            registry,
            kb,
            visited_lower: FxHashSet::default(),
            visited_upper: FxHashSet::default(),
        }
    }

    /// Whether a published package's dependency chain fails to honor its
    /// own compatibility claim at either bound.
    pub fn package_lacks_resources(&mut self, name: &str, version: &str) -> bool {
        let Some(metadata) = self.registry.metadata(name, version) else {
            return false;
        };
        let key = format!("{name}#{version}");
        self.visited_lower.insert(key.clone());
        self.visited_upper.insert(key);
        self.expression_lacks_resources(&metadata.compatibility_expr, &metadata.dependency_exprs)
    }

    /// Whether any declared dependency fails the lower- or upper-bound
    /// check for the claimed compatibility expression. Returns on the
    /// first failing dependency.
    pub fn expression_lacks_resources(
        &mut self,
        compatibility_expr: &str,
        dependency_exprs: &[String],
    ) -> bool {
        let claimed =
            ConstraintExpr::parse(compatibility_expr).satisfying(self.kb.versions());
        let (Some(floor), Some(ceiling)) = (claimed.first(), claimed.last()) else {
            tracing::debug!(
                expr = compatibility_expr,
                "claim admits no known version; no evidence to check"
            );
            return false;
        };
        let floor = floor.clone();
        let ceiling = ceiling.clone();
        for expr in dependency_exprs {
            let Some(edge) = self.resolve_edge(expr) else {
                continue;
            };
            if !self.lower_compatible(&edge.name, &edge.lower, &floor) {
                tracing::debug!(dependency = %edge.name, bound = %edge.lower, "lower-bound check failed");
                return true;
            }
            if !self.upper_compatible(&edge.name, &edge.upper, &ceiling) {
                tracing::debug!(dependency = %edge.name, bound = %edge.upper, "upper-bound check failed");
                return true;
            }
        }
        false
    }

    /// Split one dependency expression and resolve its bounds against the
    /// dependency's published releases. `None` skips the entry (malformed,
    /// conditional, unknown package, or nothing satisfies).
    fn resolve_edge(&self, expr: &str) -> Option<DependencyEdge> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }
        let (name, _) = crate::constraint::split_dependency(expr)?;
        let releases = self.registry.release_list(&name)?;
        resolve_dependency(expr, &releases)
    }

    /// Can the dependency's lowest claimed release run at `floor`, and can
    /// its own dependencies, recursively?
    fn lower_compatible(&mut self, name: &str, version: &VersionTag, floor: &VersionTag) -> bool {
        let Some(metadata) = self.registry.metadata(name, version.as_str()) else {
            return true;
        };
        let claimed =
            ConstraintExpr::parse(&metadata.compatibility_expr).satisfying(self.kb.versions());
        let Some(minimum) = claimed.first() else {
            return true;
        };
        if floor.numeric_cmp(minimum) == Some(Ordering::Less) {
            return false;
        }
        self.visited_lower.insert(visit_key(name, version));
        for expr in &metadata.dependency_exprs {
            let Some(edge) = self.resolve_edge(expr) else {
                continue;
            };
            if self.visited_lower.contains(&visit_key(&edge.name, &edge.lower)) {
                continue;
            }
            if !self.lower_compatible(&edge.name, &edge.lower, floor) {
                return false;
            }
        }
        true
    }

    /// Symmetric ceiling check against the dependency's highest claimed
    /// release.
    fn upper_compatible(&mut self, name: &str, version: &VersionTag, ceiling: &VersionTag) -> bool {
        let Some(metadata) = self.registry.metadata(name, version.as_str()) else {
            return true;
        };
        let claimed =
            ConstraintExpr::parse(&metadata.compatibility_expr).satisfying(self.kb.versions());
        let Some(maximum) = claimed.last() else {
            return true;
        };
        if ceiling.numeric_cmp(maximum) == Some(Ordering::Greater) {
            return false;
        }
        self.visited_upper.insert(visit_key(name, version));
        for expr in &metadata.dependency_exprs {
            let Some(edge) = self.resolve_edge(expr) else {
                continue;
            };
            if self.visited_upper.contains(&visit_key(&edge.name, &edge.upper)) {
                continue;
            }
            if !self.upper_compatible(&edge.name, &edge.upper, ceiling) {
                return false;
            }
        }
        true
    }
}
