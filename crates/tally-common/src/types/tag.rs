//! Tags - key/value dimensions attached to meters
//!
//! A [`Tags`] set keeps at most one value per key and is stored sorted by key,
//! so two sets built from the same pairs in a different order compare and hash
//! identically.

use serde::{Deserialize, Serialize};

/// A single key/value dimension
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Dimension name
    pub key: String,
    /// Dimension value
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Unique-key tag set, ordered by key
///
/// Serialized as a plain list of tags. Deserializing goes through
/// [`FromIterator`], so unsorted input is sorted and the last value of a
/// repeated key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Tag>", into = "Vec<Tag>")]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    /// Create an empty tag set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tag set from key/value pairs
    ///
    /// # Example
    /// ```
    /// use tally_common::Tags;
    ///
    /// let a = Tags::of([("method", "GET"), ("status", "200")]);
    /// let b = Tags::of([("status", "200"), ("method", "GET")]);
    /// assert_eq!(a, b);
    /// ```
    pub fn of<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .fold(Self::empty(), |tags, (k, v)| tags.and(k, v))
    }

    /// Add a tag, replacing the value of an existing key
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(Tag::new(key, value));
        self
    }

    /// Merge another set into this one; `other` wins on key collisions
    pub fn and_tags(mut self, other: &Tags) -> Self {
        for tag in other.iter() {
            self.insert(tag.clone());
        }
        self
    }

    /// Value for a key, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .ok()
            .map(|idx| self.tags[idx].value.as_str())
    }

    /// Remove a key and return its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        match self.position(key) {
            Ok(idx) => Some(self.tags.remove(idx).value),
            Err(_) => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn insert(&mut self, tag: Tag) {
        match self.position(&tag.key) {
            Ok(idx) => self.tags[idx] = tag,
            Err(idx) => self.tags.insert(idx, tag),
        }
    }

    fn position(&self, key: &str) -> std::result::Result<usize, usize> {
        self.tags.binary_search_by(|t| t.key.as_str().cmp(key))
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags = Self::empty();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Tags> for Vec<Tag> {
    fn from(tags: Tags) -> Self {
        tags.tags
    }
}

impl std::fmt::Display for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", tag)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(tags: &Tags) -> u64 {
        let mut hasher = DefaultHasher::new();
        tags.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_order_independent_equality() {
        let a = Tags::of([("a", "1"), ("b", "2"), ("c", "3")]);
        let b = Tags::of([("c", "3"), ("a", "1"), ("b", "2")]);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_duplicate_key_replaces_value() {
        let tags = Tags::of([("method", "GET"), ("method", "POST")]);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("method"), Some("POST"));
    }

    #[test]
    fn test_and_tags_merge() {
        let base = Tags::of([("region", "eu"), ("host", "a")]);
        let merged = base.and_tags(&Tags::of([("host", "b")]));

        assert_eq!(merged.get("region"), Some("eu"));
        assert_eq!(merged.get("host"), Some("b"));
    }

    #[test]
    fn test_iteration_sorted_by_key() {
        let tags = Tags::of([("z", "1"), ("a", "2"), ("m", "3")]);
        let keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();

        assert_eq!(keys, vec!["a", "m", "z"]);
        assert_eq!(tags.to_string(), "[a=2, m=3, z=1]");
    }

    #[test]
    fn test_deserialize_sorts_and_dedups() {
        let json = r#"[
            {"key": "b", "value": "2"},
            {"key": "a", "value": "1"},
            {"key": "a", "value": "9"}
        ]"#;
        let tags: Tags = serde_json::from_str(json).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags, Tags::of([("a", "9"), ("b", "2")]));
        assert_eq!(tags.get("a"), Some("9"));
    }

    #[test]
    fn test_serializes_as_tag_list() {
        let tags = Tags::of([("b", "2"), ("a", "1")]);
        let json = serde_json::to_value(&tags).unwrap();

        assert_eq!(json[0]["key"], "a");
        assert_eq!(serde_json::from_value::<Tags>(json).unwrap(), tags);
    }

    #[test]
    fn test_remove() {
        let mut tags = Tags::of([("a", "1"), ("b", "2")]);

        assert_eq!(tags.remove("a"), Some("1".to_string()));
        assert_eq!(tags.remove("a"), None);
        assert_eq!(tags.len(), 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(
            pairs in prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..12)
        ) {
            let pairs: Vec<(String, String)> = pairs.into_iter().collect();
            let forward = Tags::of(pairs.iter().cloned());
            let backward = Tags::of(pairs.iter().rev().cloned());

            prop_assert_eq!(&forward, &backward);
            prop_assert_eq!(forward.len(), pairs.len());
        }
    }
}
