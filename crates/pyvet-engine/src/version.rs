//! Version tags and the three-part numeric comparator.
//!
//! Tags are opaque identifiers drawn from an externally configured universe;
//! ordering is always numeric over up to three dot-separated components,
//! never lexical ("3.10" sorts after "3.5"). A malformed tag has no ordering
//! relation, which callers treat as "condition not satisfied" rather than an
//! error.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One release line of the analyzed language (or of a dependency package).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        VersionTag(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric comparison against another tag; `None` when either side is
    /// not a numeric version.
    pub fn numeric_cmp(&self, other: &VersionTag) -> Option<Ordering> {
        compare(&self.0, &other.0)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(tag: &str) -> Self {
        VersionTag(tag.to_string())
    }
}

/// Compare two version literals numerically over their first three
/// components; missing components count as zero, extra components are
/// ignored. Returns `None` for non-numeric input.
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    Some(components(a)?.cmp(&components(b)?))
}

fn components(version: &str) -> Option<[u64; 3]> {
    let version = version.trim();
    if version.is_empty() {
        return None;
    }
    let mut parts = [0u64; 3];
    for (index, piece) in version.split('.').enumerate() {
        if index >= 3 {
            break;
        }
        parts[index] = piece.parse().ok()?;
    }
    Some(parts)
}

/// Sort tags ascending by the numeric comparator; tags without an ordering
/// relation keep their relative position.
pub fn sort_ascending(tags: &mut [VersionTag]) {
    tags.sort_by(|a, b| a.numeric_cmp(b).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexical() {
        assert_eq!(compare("3.10", "3.5"), Some(Ordering::Greater));
        assert_eq!(compare("2.7", "3.5"), Some(Ordering::Less));
        assert_eq!(compare("3.6", "3.6"), Some(Ordering::Equal));
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare("3", "3.0.0"), Some(Ordering::Equal));
        assert_eq!(compare("1.0", "1.0.1"), Some(Ordering::Less));
    }

    #[test]
    fn extra_components_are_ignored() {
        assert_eq!(compare("1.2.3.4", "1.2.3"), Some(Ordering::Equal));
    }

    #[test]
    fn malformed_versions_have_no_ordering() {
        assert_eq!(compare("1.0a1", "1.0"), None);
        assert_eq!(compare("", "1.0"), None);
        assert_eq!(compare("1.0", "banana"), None);
    }

    #[test]
    fn sorting_uses_the_comparator() {
        let mut tags: Vec<VersionTag> = ["3.10", "2.7", "3.5", "3.9"]
            .into_iter()
            .map(VersionTag::from)
            .collect();
        sort_ascending(&mut tags);
        let sorted: Vec<&str> = tags.iter().map(VersionTag::as_str).collect();
        assert_eq!(sorted, vec!["2.7", "3.5", "3.9", "3.10"]);
    }
}
