//! General purpose conventions

use serde::{Deserialize, Serialize};
use tally_common::MeterKind;

use super::{truncate, NamingConvention};

/// Casing rules for dot-separated names. Tag keys get the same treatment as
/// names; tag values are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardConvention {
    /// `http.server.requests`
    #[default]
    Dot,
    /// `http_server_requests`
    SnakeCase,
    /// `httpServerRequests`
    CamelCase,
    /// `HttpServerRequests`
    UpperCamelCase,
    /// `http/server/requests`
    Slashes,
}

impl StandardConvention {
    fn convert(&self, name: &str) -> String {
        match self {
            StandardConvention::Dot => name.to_string(),
            StandardConvention::SnakeCase => name.replace('.', "_"),
            StandardConvention::Slashes => name.replace('.', "/"),
            StandardConvention::CamelCase => {
                let mut parts = name.split('.').filter(|p| !p.is_empty());
                let mut out = parts.next().unwrap_or_default().to_string();
                for part in parts {
                    out.push_str(&capitalize(part));
                }
                out
            }
            StandardConvention::UpperCamelCase => name
                .split('.')
                .filter(|p| !p.is_empty())
                .map(capitalize)
                .collect(),
        }
    }
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl NamingConvention for StandardConvention {
    fn name(&self, name: &str, _kind: MeterKind, _base_unit: Option<&str>) -> String {
        self.convert(name)
    }

    fn tag_key(&self, key: &str) -> String {
        self.convert(key)
    }
}

/// Wraps a convention with length limits and an optional character
/// allow-list. Disallowed characters become `_`.
#[derive(Debug, Clone)]
pub struct Truncating<C> {
    inner: C,
    max_name: usize,
    max_tag_key: usize,
    max_tag_value: usize,
    allowed: Option<fn(char) -> bool>,
}

impl<C: NamingConvention> Truncating<C> {
    pub fn new(inner: C, max_len: usize) -> Self {
        Self {
            inner,
            max_name: max_len,
            max_tag_key: max_len,
            max_tag_value: max_len,
            allowed: None,
        }
    }

    pub fn with_limits(mut self, max_name: usize, max_tag_key: usize, max_tag_value: usize) -> Self {
        self.max_name = max_name;
        self.max_tag_key = max_tag_key;
        self.max_tag_value = max_tag_value;
        self
    }

    pub fn with_allowed_chars(mut self, allowed: fn(char) -> bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    fn sanitize(&self, value: String, max: usize) -> String {
        let value = match self.allowed {
            Some(allowed) => value
                .chars()
                .map(|c| if allowed(c) { c } else { '_' })
                .collect(),
            None => value,
        };
        truncate(&value, max)
    }
}

impl<C: NamingConvention> NamingConvention for Truncating<C> {
    fn name(&self, name: &str, kind: MeterKind, base_unit: Option<&str>) -> String {
        self.sanitize(self.inner.name(name, kind, base_unit), self.max_name)
    }

    fn tag_key(&self, key: &str) -> String {
        self.sanitize(self.inner.tag_key(key), self.max_tag_key)
    }

    fn tag_value(&self, value: &str) -> String {
        self.sanitize(self.inner.tag_value(value), self.max_tag_value)
    }
}
