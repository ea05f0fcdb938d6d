//! InfluxDB line protocol naming
//!
//! Names and tag keys are snake cased. Commas, spaces and `=` are escaped
//! with a backslash, newlines in tag values become spaces, and the tag key
//! `time` (reserved by InfluxQL) is written as `_time`.

use tally_common::MeterKind;

use super::{NamingConvention, StandardConvention};

#[derive(Debug, Clone, Copy)]
pub struct InfluxNamingConvention {
    delegate: StandardConvention,
}

impl InfluxNamingConvention {
    pub fn new(delegate: StandardConvention) -> Self {
        Self { delegate }
    }
}

impl Default for InfluxNamingConvention {
    fn default() -> Self {
        Self::new(StandardConvention::SnakeCase)
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl NamingConvention for InfluxNamingConvention {
    fn name(&self, name: &str, kind: MeterKind, base_unit: Option<&str>) -> String {
        escape(&self.delegate.name(&name.replace('=', "_"), kind, base_unit))
    }

    fn tag_key(&self, key: &str) -> String {
        if key == "time" {
            return "_time".to_string();
        }
        escape(&self.delegate.tag_key(key))
    }

    fn tag_value(&self, value: &str) -> String {
        escape(&self.delegate.tag_value(value).replace('\n', " "))
    }
}
