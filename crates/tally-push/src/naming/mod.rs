//! Naming conventions
//!
//! Meter names are written dot-separated (`http.server.requests`). Each
//! backend maps names, tag keys and tag values onto its own wire rules:
//! casing, allowed characters, maximum lengths. Conventions are pure
//! functions of their input, so one instance can be shared by every meter of
//! a registry.

pub mod cloudwatch;
pub mod influx;
pub mod standard;

pub use cloudwatch::CloudWatchNamingConvention;
pub use influx::InfluxNamingConvention;
pub use standard::{StandardConvention, Truncating};

use tally_common::{MeterId, MeterKind, Tag};

/// Backend-specific name and tag rules
pub trait NamingConvention: Send + Sync {
    fn name(&self, name: &str, kind: MeterKind, base_unit: Option<&str>) -> String;

    fn tag_key(&self, key: &str) -> String {
        key.to_string()
    }

    fn tag_value(&self, value: &str) -> String {
        value.to_string()
    }
}

/// Name of `id` under `convention`
pub fn convention_name(id: &MeterId, convention: &dyn NamingConvention) -> String {
    convention.name(&id.name, id.kind, id.base_unit.as_deref())
}

/// Tags of `id` under `convention`, in key order
pub fn convention_tags(id: &MeterId, convention: &dyn NamingConvention) -> Vec<Tag> {
    id.tags
        .iter()
        .map(|tag| Tag::new(convention.tag_key(&tag.key), convention.tag_value(&tag.value)))
        .collect()
}

/// First `max` characters of `value`
pub fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::Tags;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_convention_applies_to_id() {
        let id = MeterId::new(
            "http.server.requests",
            Tags::of([("http.method", "GET")]),
            MeterKind::Timer,
        );
        let convention = StandardConvention::SnakeCase;

        assert_eq!(convention_name(&id, &convention), "http_server_requests");
        assert_eq!(
            convention_tags(&id, &convention),
            vec![Tag::new("http_method", "GET")]
        );
    }
}
