//! CloudWatch naming: metric names, dimension names and dimension values are
//! each capped at 255 characters.

use tally_common::MeterKind;

use super::{NamingConvention, StandardConvention, Truncating};

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_TAG_KEY_LENGTH: usize = 255;
pub const MAX_TAG_VALUE_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct CloudWatchNamingConvention {
    inner: Truncating<StandardConvention>,
}

impl CloudWatchNamingConvention {
    pub fn new(delegate: StandardConvention) -> Self {
        Self {
            inner: Truncating::new(delegate, MAX_NAME_LENGTH).with_limits(
                MAX_NAME_LENGTH,
                MAX_TAG_KEY_LENGTH,
                MAX_TAG_VALUE_LENGTH,
            ),
        }
    }
}

impl Default for CloudWatchNamingConvention {
    fn default() -> Self {
        Self::new(StandardConvention::Dot)
    }
}

impl NamingConvention for CloudWatchNamingConvention {
    fn name(&self, name: &str, kind: MeterKind, base_unit: Option<&str>) -> String {
        self.inner.name(name, kind, base_unit)
    }

    fn tag_key(&self, key: &str) -> String {
        self.inner.tag_key(key)
    }

    fn tag_value(&self, value: &str) -> String {
        self.inner.tag_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_tag_value_is_truncated() {
        let convention = CloudWatchNamingConvention::default();
        let value = "v".repeat(300);

        assert_eq!(convention.tag_value(&value).chars().count(), 255);
        assert_eq!(convention.tag_value("short"), "short");
    }

    #[test]
    fn test_long_name_is_truncated() {
        let convention = CloudWatchNamingConvention::default();
        let name = format!("{}.count", "a".repeat(260));

        assert_eq!(
            convention.name(&name, MeterKind::Counter, None).chars().count(),
            MAX_NAME_LENGTH
        );
    }
}
