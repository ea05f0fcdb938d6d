//! Meter filters
//!
//! Filters are applied in registration order to every id before it reaches
//! the meter map. They can rewrite an id (common tags, tag renames, ignored
//! tags) or deny it outright.

use tally_common::{MeterId, Tags};

/// Outcome of running an id through one filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReply {
    Accept,
    Deny,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterFilter {
    /// Add tags to every meter. Tags set on the meter itself win.
    CommonTags(Tags),
    /// Deny meters whose name starts with the prefix
    DenyNamePrefix(String),
    /// Accept meters whose name starts with the prefix, short-circuiting
    /// any deny filter registered after it
    AcceptNamePrefix(String),
    /// Rename a tag key on meters whose name starts with `name_prefix`
    RenameTag {
        name_prefix: String,
        from: String,
        to: String,
    },
    /// Drop the given tag keys from every meter
    IgnoreTags(Vec<String>),
}

impl MeterFilter {
    pub fn common_tags<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        MeterFilter::CommonTags(Tags::of(pairs))
    }

    pub fn deny_name_prefix(prefix: impl Into<String>) -> Self {
        MeterFilter::DenyNamePrefix(prefix.into())
    }

    pub fn accept_name_prefix(prefix: impl Into<String>) -> Self {
        MeterFilter::AcceptNamePrefix(prefix.into())
    }

    pub fn rename_tag(
        name_prefix: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        MeterFilter::RenameTag {
            name_prefix: name_prefix.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn ignore_tags<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MeterFilter::IgnoreTags(keys.into_iter().map(Into::into).collect())
    }

    /// Rewrite an id
    pub fn map(&self, id: MeterId) -> MeterId {
        match self {
            MeterFilter::CommonTags(common) => {
                let mut mapped = id;
                mapped.tags = common.clone().and_tags(&mapped.tags);
                mapped
            }
            MeterFilter::RenameTag {
                name_prefix,
                from,
                to,
            } => {
                if !id.name.starts_with(name_prefix.as_str()) {
                    return id;
                }
                let mut mapped = id;
                if let Some(value) = mapped.tags.remove(from) {
                    mapped.tags = mapped.tags.and(to.clone(), value);
                }
                mapped
            }
            MeterFilter::IgnoreTags(keys) => {
                let mut mapped = id;
                mapped.tags = mapped
                    .tags
                    .iter()
                    .filter(|tag| !keys.contains(&tag.key))
                    .cloned()
                    .collect::<Tags>();
                mapped
            }
            MeterFilter::DenyNamePrefix(_) | MeterFilter::AcceptNamePrefix(_) => id,
        }
    }

    pub fn accept(&self, id: &MeterId) -> FilterReply {
        match self {
            MeterFilter::DenyNamePrefix(prefix) if id.name.starts_with(prefix.as_str()) => {
                FilterReply::Deny
            }
            MeterFilter::AcceptNamePrefix(prefix) if id.name.starts_with(prefix.as_str()) => {
                FilterReply::Accept
            }
            _ => FilterReply::Neutral,
        }
    }
}

/// Map an id through every filter, in order
pub(crate) fn map_id(filters: &[MeterFilter], id: MeterId) -> MeterId {
    filters.iter().fold(id, |id, filter| filter.map(id))
}

/// First non-neutral reply wins; no opinion means accept
pub(crate) fn is_accepted(filters: &[MeterFilter], id: &MeterId) -> bool {
    for filter in filters {
        match filter.accept(id) {
            FilterReply::Accept => return true,
            FilterReply::Deny => return false,
            FilterReply::Neutral => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::MeterKind;

    fn id(name: &str, tags: Tags) -> MeterId {
        MeterId::new(name, tags, MeterKind::Counter)
    }

    #[test]
    fn test_common_tags_do_not_override_meter_tags() {
        let filter = MeterFilter::common_tags([("region", "eu"), ("app", "billing")]);
        let mapped = filter.map(id("jobs", Tags::of([("region", "us")])));

        assert_eq!(mapped.tag("region"), Some("us"));
        assert_eq!(mapped.tag("app"), Some("billing"));
    }

    #[test]
    fn test_rename_tag_respects_prefix() {
        let filter = MeterFilter::rename_tag("http", "uri", "path");

        let http = filter.map(id("http.requests", Tags::of([("uri", "/a")])));
        assert_eq!(http.tag("path"), Some("/a"));
        assert_eq!(http.tag("uri"), None);

        let db = filter.map(id("db.calls", Tags::of([("uri", "/a")])));
        assert_eq!(db.tag("uri"), Some("/a"));
    }

    #[test]
    fn test_ignore_tags() {
        let filter = MeterFilter::ignore_tags(["instance"]);
        let mapped = filter.map(id("jobs", Tags::of([("instance", "i-1"), ("queue", "q")])));

        assert_eq!(mapped.tags.len(), 1);
        assert_eq!(mapped.tag("queue"), Some("q"));
    }

    #[test]
    fn test_first_opinion_wins() {
        let filters = vec![
            MeterFilter::accept_name_prefix("jvm.gc"),
            MeterFilter::deny_name_prefix("jvm"),
        ];

        assert!(is_accepted(&filters, &id("jvm.gc.pause", Tags::empty())));
        assert!(!is_accepted(&filters, &id("jvm.memory", Tags::empty())));
        assert!(is_accepted(&filters, &id("http", Tags::empty())));
    }
}
