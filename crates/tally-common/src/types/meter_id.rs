//! MeterId - canonical identity of a meter
//!
//! Two ids are equal iff their name, tag set and kind are equal. Base unit and
//! description are carried along for exporters but take no part in identity.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::tag::{Tag, Tags};

/// Meter kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    Counter,
    Gauge,
    Timer,
    DistributionSummary,
    LongTaskTimer,
    Other,
}

impl std::fmt::Display for MeterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeterKind::Counter => write!(f, "counter"),
            MeterKind::Gauge => write!(f, "gauge"),
            MeterKind::Timer => write!(f, "timer"),
            MeterKind::DistributionSummary => write!(f, "distribution_summary"),
            MeterKind::LongTaskTimer => write!(f, "long_task_timer"),
            MeterKind::Other => write!(f, "other"),
        }
    }
}

/// Meter identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterId {
    /// Dot-separated meter name, e.g. `http.server.requests`
    pub name: String,

    /// Dimensions
    pub tags: Tags,

    /// Meter kind
    pub kind: MeterKind,

    /// Base unit of the measured values (e.g. "bytes")
    pub base_unit: Option<String>,

    /// Human readable description
    pub description: Option<String>,
}

impl MeterId {
    pub fn new(name: impl Into<String>, tags: Tags, kind: MeterKind) -> Self {
        Self {
            name: name.into(),
            tags,
            kind,
            base_unit: None,
            description: None,
        }
    }

    pub fn with_base_unit(mut self, unit: impl Into<String>) -> Self {
        self.base_unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Copy of this id with one more tag
    pub fn with_tag(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut id = self.clone();
        id.tags = id.tags.and(key, value);
        id
    }

    /// Copy of this id with the given tags merged in
    pub fn with_tags(&self, tags: &Tags) -> Self {
        let mut id = self.clone();
        id.tags = id.tags.and_tags(tags);
        id
    }

    /// Copy of this id with a different name
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut id = self.clone();
        id.name = name.into();
        id
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key)
    }

    pub fn tag_list(&self) -> Vec<Tag> {
        self.tags.iter().cloned().collect()
    }
}

impl PartialEq for MeterId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.tags == other.tags
    }
}

impl Eq for MeterId {}

impl Hash for MeterId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.tags.hash(state);
        self.kind.hash(state);
    }
}

impl std::fmt::Display for MeterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}){}", self.name, self.kind, self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_unit_and_description() {
        let a = MeterId::new("requests", Tags::of([("method", "GET")]), MeterKind::Counter)
            .with_base_unit("requests");
        let b = MeterId::new("requests", Tags::of([("method", "GET")]), MeterKind::Counter)
            .with_description("inbound requests");

        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_includes_kind() {
        let counter = MeterId::new("jobs", Tags::empty(), MeterKind::Counter);
        let timer = MeterId::new("jobs", Tags::empty(), MeterKind::Timer);

        assert_ne!(counter, timer);
    }

    #[test]
    fn test_with_tag_does_not_mutate_original() {
        let id = MeterId::new("cache.gets", Tags::empty(), MeterKind::Counter);
        let hit = id.with_tag("result", "hit");

        assert!(id.tags.is_empty());
        assert_eq!(hit.tag("result"), Some("hit"));
        assert_eq!(hit.to_string(), "cache.gets(counter)[result=hit]");
    }
}
