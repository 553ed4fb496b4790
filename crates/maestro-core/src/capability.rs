use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Domain tag used for subtasks that require no particular capability.
pub const GENERAL_DOMAIN: &str = "general";

/// A set of capability tags, compared by subset inclusion.
///
/// Tags are kept sorted so that derived values (like the knowledge domain)
/// are stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    tags: BTreeSet<String>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn revoke(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    pub fn has(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// `true` when every tag in `required` is also in `self`.
    pub fn satisfies(&self, required: &CapabilitySet) -> bool {
        required.tags.is_subset(&self.tags)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Knowledge domain tag derived from the capability tags: sorted tags
    /// joined by `+`, or [`GENERAL_DOMAIN`] for an empty set.
    pub fn domain(&self) -> String {
        if self.tags.is_empty() {
            GENERAL_DOMAIN.to_string()
        } else {
            self.iter().collect::<Vec<_>>().join("+")
        }
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.iter().collect::<Vec<_>>().join(","))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set_grant_revoke() {
        let mut caps = CapabilitySet::new();
        assert!(caps.is_empty());

        caps.grant("x");
        caps.grant("y");
        assert!(caps.has("x"));
        assert_eq!(caps.len(), 2);

        caps.revoke("x");
        assert!(!caps.has("x"));
    }

    #[test]
    fn test_superset_check() {
        let executor: CapabilitySet = ["x", "y"].into_iter().collect();
        let only_x: CapabilitySet = ["x"].into_iter().collect();
        let needs_z: CapabilitySet = ["z"].into_iter().collect();

        assert!(executor.satisfies(&only_x));
        assert!(executor.satisfies(&executor));
        assert!(executor.satisfies(&CapabilitySet::new()));
        assert!(!only_x.satisfies(&executor));
        assert!(!executor.satisfies(&needs_z));
    }

    #[test]
    fn test_domain_is_sorted_and_stable() {
        let a: CapabilitySet = ["y", "x"].into_iter().collect();
        let b: CapabilitySet = ["x", "y"].into_iter().collect();
        assert_eq!(a.domain(), "x+y");
        assert_eq!(a.domain(), b.domain());
        assert_eq!(CapabilitySet::new().domain(), GENERAL_DOMAIN);
    }

    #[test]
    fn test_serializes_as_list() {
        let caps: CapabilitySet = ["b", "a"].into_iter().collect();
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let parsed: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, caps);
    }
}
