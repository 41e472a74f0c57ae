use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One step of a property path: a mapping key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Index(usize),
    Key(String),
}

impl PathKey {
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }

    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }

    fn from_token(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = token.parse::<usize>() {
                return Self::Index(index);
            }
        }
        Self::Key(token.to_owned())
    }
}

impl From<&str> for PathKey {
    fn from(value: &str) -> Self {
        Self::Key(value.to_owned())
    }
}

impl From<String> for PathKey {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for PathKey {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

fn bracket_suffix_re() -> &'static Regex {
    static BRACKET_SUFFIX: OnceLock<Regex> = OnceLock::new();
    BRACKET_SUFFIX.get_or_init(|| {
        Regex::new(r"^(.*)\[(\d+)\]$").expect("bracket suffix pattern is valid")
    })
}

/// Ordered key/index sequence addressing a value inside a property tree.
///
/// Parsed from the dotted/bracketed notation used on the wire:
/// `"marker.color[2]"` becomes `("marker", "color", 2)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyPath {
    keys: SmallVec<[PathKey; 4]>,
}

impl PropertyPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a dotted/bracketed path string.
    ///
    /// Every dot-separated segment may carry one or more trailing `[n]`
    /// suffixes; any token made only of digits becomes an index.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut keys = SmallVec::new();
        if path.is_empty() {
            return Self { keys };
        }
        for segment in path.split('.') {
            let mut indices = SmallVec::<[usize; 2]>::new();
            let mut head = segment;
            while let Some(captures) = bracket_suffix_re().captures(head) {
                let (Some(prefix), Some(digits)) = (captures.get(1), captures.get(2)) else {
                    break;
                };
                let Ok(index) = digits.as_str().parse::<usize>() else {
                    break;
                };
                indices.push(index);
                head = prefix.as_str();
            }
            if !head.is_empty() || indices.is_empty() {
                keys.push(PathKey::from_token(head));
            }
            keys.extend(indices.into_iter().rev().map(PathKey::Index));
        }
        Self { keys }
    }

    #[must_use]
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PathKey>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&PathKey> {
        self.keys.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    #[must_use]
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Self { keys }
    }

    pub fn push(&mut self, key: impl Into<PathKey>) {
        self.keys.push(key.into());
    }

    pub fn pop(&mut self) -> Option<PathKey> {
        self.keys.pop()
    }

    /// Path with `prefix` keys prepended.
    #[must_use]
    pub fn prefixed(&self, prefix: &[PathKey]) -> Self {
        let mut keys: SmallVec<[PathKey; 4]> = prefix.iter().cloned().collect();
        keys.extend(self.keys.iter().cloned());
        Self { keys }
    }

    /// Sub-path starting at `start`.
    #[must_use]
    pub fn suffix(&self, start: usize) -> Self {
        Self {
            keys: self.keys.iter().skip(start).cloned().collect(),
        }
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.keys.len() >= prefix.keys.len() && self.keys[..prefix.keys.len()] == prefix.keys[..]
    }

    /// True when one path is a prefix of the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, key) in self.keys.iter().enumerate() {
            match key {
                PathKey::Index(index) if position > 0 => write!(f, "[{index}]")?,
                PathKey::Index(index) => write!(f, "{index}")?,
                PathKey::Key(key) if position > 0 => write!(f, ".{key}")?,
                PathKey::Key(key) => f.write_str(key)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for PropertyPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for PropertyPath {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl<'a> FromIterator<&'a PathKey> for PropertyPath {
    fn from_iter<T: IntoIterator<Item = &'a PathKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PathKey, PropertyPath};

    #[test]
    fn splits_trailing_index_suffix() {
        let path = PropertyPath::parse("marker.color[2]");
        assert_eq!(
            path.keys(),
            &[
                PathKey::Key("marker".into()),
                PathKey::Key("color".into()),
                PathKey::Index(2)
            ]
        );
    }

    #[test]
    fn bare_digit_segments_become_indices() {
        let path = PropertyPath::parse("shapes.1.line");
        assert_eq!(path.keys()[1], PathKey::Index(1));
        assert_eq!(path.to_string(), "shapes[1].line");
    }

    #[test]
    fn repeated_brackets_are_all_split() {
        let path = PropertyPath::parse("z[3][4]");
        assert_eq!(
            path.keys(),
            &[PathKey::Key("z".into()), PathKey::Index(3), PathKey::Index(4)]
        );
        assert_eq!(path.to_string(), "z[3][4]");
    }

    #[test]
    fn empty_string_is_root_path() {
        assert!(PropertyPath::parse("").is_empty());
    }
}
