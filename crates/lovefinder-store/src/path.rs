//! Hierarchical addresses into the document store.
//!
//! A path alternates collection and document segments:
//! `users` is a collection, `users/abc` a document, `users/abc/matches`
//! a sub-collection. The two kinds are separate types so a collection can
//! never be passed where a document is expected.

use std::fmt;

use crate::error::{Result, StoreError};

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
        return Err(StoreError::InvalidPath(format!("bad segment {segment:?}")));
    }
    Ok(())
}

fn split(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path.trim_matches('/').split('/').map(str::to_string).collect();
    for s in &segments {
        check_segment(s)?;
    }
    Ok(segments)
}

/// Path of a collection (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(Vec<String>);

/// Path of a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(Vec<String>);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Result<Self> {
        check_segment(name)?;
        Ok(Self(vec![name.to_string()]))
    }

    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!("{path} is not a collection")));
        }
        Ok(Self(segments))
    }

    /// The document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        check_segment(id)?;
        let mut segments = self.0.clone();
        segments.push(id.to_string());
        Ok(DocumentPath(segments))
    }

    /// Last segment, e.g. `matches` for `users/abc/matches`.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The document this collection hangs off, `None` at top level.
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.0.len() < 3 {
            return None;
        }
        Some(DocumentPath(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Key prefix shared by every direct child document.
    pub(crate) fn child_prefix(&self) -> String {
        format!("{self}/")
    }
}

impl DocumentPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(format!("{path} is not a document")));
        }
        Ok(Self(segments))
    }

    /// The document id (last segment).
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The collection holding this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len() - 1].to_vec())
    }

    /// A sub-collection of this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        check_segment(name)?;
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Ok(CollectionPath(segments))
    }

    /// Whether this document lives anywhere below `prefix` (string form).
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_string().starts_with(prefix)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        let users = CollectionPath::root("users").unwrap();
        let alice = users.doc("alice").unwrap();
        let matches = alice.collection("matches").unwrap();
        let bob = matches.doc("bob").unwrap();

        assert_eq!(bob.to_string(), "users/alice/matches/bob");
        assert_eq!(bob.id(), "bob");
        assert_eq!(bob.parent(), matches);
        assert_eq!(matches.parent(), Some(alice));
        assert_eq!(users.parent(), None);
        assert_eq!(matches.name(), "matches");
    }

    #[test]
    fn parse_checks_kind() {
        assert!(DocumentPath::parse("users/alice").is_ok());
        assert!(DocumentPath::parse("users").is_err());
        assert!(CollectionPath::parse("users/alice/likesGiven").is_ok());
        assert!(CollectionPath::parse("users/alice").is_err());
    }

    #[test]
    fn rejects_bad_segments() {
        let users = CollectionPath::root("users").unwrap();
        assert!(users.doc("").is_err());
        assert!(users.doc("a/b").is_err());
        assert!(users.doc("..").is_err());
        assert!(DocumentPath::parse("users//x").is_err());
    }
}
