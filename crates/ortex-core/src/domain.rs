//! Operator domains and opset version ranges.
//!
//! A [`Domain`] is part of an operator's identity, never a decoration:
//! `com.microsoft::FastGelu` and `com.my_virtual_npu::FastGelu` are two
//! unrelated operators that merely share a type name.

use ortex_graph::canonical_domain;
use std::fmt;
use std::sync::Arc;

/// Namespace an operator type name lives in.
///
/// The empty string is the runtime's built-in domain. `ai.onnx` is accepted
/// as its synonym and normalised on construction; every other string is
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Domain(Arc<str>);

impl Domain {
    /// The vendor contrib domain.
    pub const MICROSOFT: &'static str = "com.microsoft";

    pub fn new(name: &str) -> Self {
        Self(Arc::from(canonical_domain(name)))
    }

    /// The built-in domain (`""`).
    pub fn builtin() -> Self {
        Self(Arc::from(""))
    }

    pub fn is_builtin(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Domain {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_builtin() {
            f.write_str("ai.onnx")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Inclusive range of opset versions an operator definition covers.
///
/// `until == None` leaves the range open towards newer opsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub since: u32,
    pub until: Option<u32>,
}

impl VersionRange {
    /// Versions `since..=until`. Empty when `until < since`; the registry
    /// refuses such ranges.
    pub fn new(since: u32, until: u32) -> Self {
        Self {
            since,
            until: Some(until),
        }
    }

    /// Exactly one version.
    pub fn single(version: u32) -> Self {
        Self::new(version, version)
    }

    /// Every version from `since` onwards.
    pub fn since(since: u32) -> Self {
        Self { since, until: None }
    }

    pub fn is_empty(&self) -> bool {
        self.until.is_some_and(|until| until < self.since)
    }

    pub fn contains(&self, version: u32) -> bool {
        version >= self.since && self.until.is_none_or(|until| version <= until)
    }

    pub fn overlaps(&self, other: &VersionRange) -> bool {
        let starts_before_other_ends = other.until.is_none_or(|until| self.since <= until);
        let other_starts_before_end = self.until.is_none_or(|until| other.since <= until);
        starts_before_other_ends && other_starts_before_end
    }

    /// Smallest range covering both `self` and `other`.
    pub fn span(&self, other: &VersionRange) -> VersionRange {
        let until = match (self.until, other.until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        VersionRange {
            since: self.since.min(other.since),
            until,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.until {
            Some(until) if until == self.since => write!(f, "{}", self.since),
            Some(until) => write!(f, "{}..={until}", self.since),
            None => write!(f, "{}+", self.since),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_alias_is_builtin() {
        assert_eq!(Domain::new("ai.onnx"), Domain::builtin());
        assert!(Domain::new("").is_builtin());
        assert_ne!(Domain::new(Domain::MICROSOFT), Domain::builtin());
        assert_ne!(
            Domain::new(Domain::MICROSOFT),
            Domain::new("com.my_virtual_npu")
        );
    }

    #[test]
    fn test_range_contains() {
        let range = VersionRange::new(7, 12);
        assert!(!range.contains(6));
        assert!(range.contains(7));
        assert!(range.contains(12));
        assert!(!range.contains(13));

        let open = VersionRange::since(13);
        assert!(open.contains(13));
        assert!(open.contains(u32::MAX));
        assert!(!open.contains(12));
    }

    #[test]
    fn test_range_overlap() {
        let a = VersionRange::new(7, 12);
        assert!(a.overlaps(&VersionRange::new(12, 20)));
        assert!(!a.overlaps(&VersionRange::new(13, 20)));
        assert!(!a.overlaps(&VersionRange::since(13)));
        assert!(a.overlaps(&VersionRange::since(1)));
        assert!(VersionRange::since(1).overlaps(&VersionRange::since(50)));
        assert!(VersionRange::single(1).overlaps(&VersionRange::single(1)));
    }

    #[test]
    fn test_range_span_and_display() {
        let span = VersionRange::new(7, 12).span(&VersionRange::new(13, 21));
        assert_eq!(span, VersionRange::new(7, 21));
        assert_eq!(span.to_string(), "7..=21");
        assert_eq!(VersionRange::single(1).to_string(), "1");
        assert_eq!(VersionRange::since(20).to_string(), "20+");
        assert_eq!(
            VersionRange::single(1).span(&VersionRange::since(5)),
            VersionRange::since(1)
        );
    }
}
