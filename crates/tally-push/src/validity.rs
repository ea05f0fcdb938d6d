//! Numeric validity policies
//!
//! Backends disagree on what they accept: line protocols reject non-finite
//! numbers, CloudWatch rejects magnitudes outside roughly 1e-108..1e108. A
//! [`NumericPolicy`] decides per value whether to pass it through (possibly
//! clamped) or omit it. Applying a policy never fails and never logs; bad
//! clamp bounds are caught by [`NumericPolicy::validate`] when a backend is
//! configured.

use serde::{Deserialize, Serialize};
use tally_common::{Result, TallyError};

/// How a backend treats values it cannot represent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NumericPolicy {
    /// Omit NaN and infinite values; pass every finite value
    #[default]
    Drop,
    /// Omit NaN; map everything else into `[min_magnitude, max_magnitude]`
    /// keeping the sign. Zero stays zero.
    Clamp {
        min_magnitude: f64,
        max_magnitude: f64,
    },
}

impl NumericPolicy {
    /// Limits accepted by the CloudWatch `PutMetricData` API
    pub const CLOUDWATCH: NumericPolicy = NumericPolicy::Clamp {
        min_magnitude: 8.515920e-109,
        max_magnitude: 1.174271e+108,
    };

    /// Value to write, or `None` to omit the field
    pub fn apply(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        // -0.0 == 0.0, so this also normalizes the sign of zero
        if value == 0.0 {
            return Some(0.0);
        }

        match *self {
            NumericPolicy::Drop => value.is_finite().then_some(value),
            NumericPolicy::Clamp {
                min_magnitude,
                max_magnitude,
            } => {
                // not f64::clamp, which panics on inverted or NaN bounds
                let magnitude = value.abs().max(min_magnitude).min(max_magnitude);
                Some(magnitude.copysign(value))
            }
        }
    }

    /// Clamp bounds must be finite with `0 < min_magnitude <= max_magnitude`
    pub fn validate(&self) -> Result<()> {
        match *self {
            NumericPolicy::Drop => Ok(()),
            NumericPolicy::Clamp {
                min_magnitude,
                max_magnitude,
            } => {
                let ordered = min_magnitude.is_finite()
                    && max_magnitude.is_finite()
                    && min_magnitude > 0.0
                    && min_magnitude <= max_magnitude;
                if ordered {
                    Ok(())
                } else {
                    Err(TallyError::InvalidConfiguration(format!(
                        "clamp bounds must be finite with 0 < min <= max, got [{}, {}]",
                        min_magnitude, max_magnitude
                    )))
                }
            }
        }
    }
}

/// Whether one omitted field drops its siblings too
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Each field stands alone
    #[default]
    Independent,
    /// The wire format needs every field; one omission drops the record
    AllOrNothing,
}

impl FieldPolicy {
    /// Apply `numeric` to every field and combine the results under this
    /// field policy. Omitted fields are removed; under `AllOrNothing` any
    /// omission empties the result.
    pub fn filter<K>(&self, numeric: &NumericPolicy, fields: Vec<(K, f64)>) -> Vec<(K, f64)> {
        let total = fields.len();
        let kept: Vec<(K, f64)> = fields
            .into_iter()
            .filter_map(|(key, value)| numeric.apply(value).map(|v| (key, v)))
            .collect();

        match self {
            FieldPolicy::AllOrNothing if kept.len() != total => Vec::new(),
            _ => kept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: f64 = 8.515920e-109;
    const MAX: f64 = 1.174271e+108;

    #[test]
    fn test_drop_policy() {
        let policy = NumericPolicy::Drop;

        assert_eq!(policy.apply(3.5), Some(3.5));
        assert_eq!(policy.apply(f64::NAN), None);
        assert_eq!(policy.apply(f64::INFINITY), None);
        assert_eq!(policy.apply(f64::NEG_INFINITY), None);
        assert_eq!(policy.apply(1e300), Some(1e300));
    }

    #[test]
    fn test_negative_zero_normalizes() {
        for policy in [NumericPolicy::Drop, NumericPolicy::CLOUDWATCH] {
            let out = policy.apply(-0.0).unwrap();
            assert_eq!(out, 0.0);
            assert!(out.is_sign_positive());
        }
    }

    #[test]
    fn test_clamp_policy_keeps_sign() {
        let policy = NumericPolicy::CLOUDWATCH;

        assert_eq!(policy.apply(f64::INFINITY), Some(MAX));
        assert_eq!(policy.apply(f64::NEG_INFINITY), Some(-MAX));
        assert_eq!(policy.apply(1e200), Some(MAX));
        assert_eq!(policy.apply(1e-200), Some(MIN));
        assert_eq!(policy.apply(-1e-200), Some(-MIN));
        assert_eq!(policy.apply(42.0), Some(42.0));
        assert_eq!(policy.apply(f64::NAN), None);
    }

    #[test]
    fn test_inverted_clamp_bounds_do_not_panic() {
        let inverted = NumericPolicy::Clamp {
            min_magnitude: 1.0,
            max_magnitude: 0.5,
        };
        assert_eq!(inverted.apply(3.0), Some(0.5));
        assert!(matches!(
            inverted.validate(),
            Err(TallyError::InvalidConfiguration(_))
        ));

        let nan_bound = NumericPolicy::Clamp {
            min_magnitude: f64::NAN,
            max_magnitude: 10.0,
        };
        assert_eq!(nan_bound.apply(-20.0), Some(-10.0));
        assert!(nan_bound.validate().is_err());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(NumericPolicy::Drop.validate().is_ok());
        assert!(NumericPolicy::CLOUDWATCH.validate().is_ok());

        let zero_min = NumericPolicy::Clamp {
            min_magnitude: 0.0,
            max_magnitude: 1.0,
        };
        assert!(zero_min.validate().is_err());

        let infinite_max = NumericPolicy::Clamp {
            min_magnitude: 1.0,
            max_magnitude: f64::INFINITY,
        };
        assert!(infinite_max.validate().is_err());
    }

    #[test]
    fn test_field_policies() {
        let fields = vec![("sum", 10.0), ("mean", f64::NAN), ("count", 2.0)];

        let independent = FieldPolicy::Independent.filter(&NumericPolicy::Drop, fields.clone());
        assert_eq!(independent, vec![("sum", 10.0), ("count", 2.0)]);

        let strict = FieldPolicy::AllOrNothing.filter(&NumericPolicy::Drop, fields);
        assert!(strict.is_empty());
    }

    fn any_f64() -> impl Strategy<Value = f64> {
        prop_oneof![
            any::<f64>(),
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
            Just(-0.0),
            Just(0.0),
            Just(f64::MIN_POSITIVE),
            Just(f64::MAX),
        ]
    }

    fn any_bound() -> impl Strategy<Value = f64> {
        prop_oneof![any::<f64>(), Just(f64::NAN), Just(0.0), Just(f64::INFINITY)]
    }

    proptest! {
        #[test]
        fn apply_never_panics(x in any_f64(), min in any_bound(), max in any_bound()) {
            let policy = NumericPolicy::Clamp {
                min_magnitude: min,
                max_magnitude: max,
            };
            let _ = policy.apply(x);
        }

        #[test]
        fn filtering_is_idempotent(x in any_f64()) {
            for policy in [NumericPolicy::Drop, NumericPolicy::CLOUDWATCH] {
                let once = policy.apply(x);
                let twice = once.and_then(|v| policy.apply(v));
                prop_assert_eq!(once.map(f64::to_bits), twice.map(f64::to_bits));
            }
        }

        #[test]
        fn nan_is_always_omitted(bits in any::<u64>()) {
            let x = f64::from_bits(bits);
            if x.is_nan() {
                prop_assert!(NumericPolicy::Drop.apply(x).is_none());
                prop_assert!(NumericPolicy::CLOUDWATCH.apply(x).is_none());
            }
        }

        #[test]
        fn clamped_values_are_in_range(x in any_f64()) {
            if let Some(v) = NumericPolicy::CLOUDWATCH.apply(x) {
                prop_assert!(v == 0.0 || (v.abs() >= MIN && v.abs() <= MAX));
            }
        }
    }
}
