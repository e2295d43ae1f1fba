// src/zkp/signals.rs
//! Public signal normalization and interpretation.
//!
//! Proof payloads arrive as untyped JSON. Every signal is first normalized to
//! a [`FieldElement`]; business rules only ever see normalized values.
//! Unrecognized literal forms are a typed error, never a silent `false`.

use crate::error::{EngineError, SignalCheck};
use crate::models::field::FieldElement;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Positional layout of the public signals for an age predicate.
///
/// The convention is declared by the caller and never inferred from the
/// number of signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalConvention {
    /// `v1`: `[isAdult]`
    #[serde(rename = "v1")]
    AdultFlag,
    /// `v2`: `[minimumAge, credentialHash, isOfAgeFlag]`
    #[serde(rename = "v2")]
    AgeBinding,
}

impl SignalConvention {
    /// Number of public signals the convention expects.
    pub fn signal_count(&self) -> usize {
        match self {
            SignalConvention::AdultFlag => 1,
            SignalConvention::AgeBinding => 3,
        }
    }
}

impl FromStr for SignalConvention {
    type Err = EngineError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "v1" => Ok(SignalConvention::AdultFlag),
            "v2" => Ok(SignalConvention::AgeBinding),
            other => Err(EngineError::Validation(format!(
                "unknown signal convention `{}` (expected v1 or v2)",
                other
            ))),
        }
    }
}

/// Normalizes one JSON signal.
///
/// Recognized forms: decimal or `0x` hex strings, non-negative JSON
/// integers, `true`/`false` and their string forms.
pub fn normalize_signal(value: &Value) -> Result<FieldElement, EngineError> {
    match value {
        Value::String(text) => match text.as_str() {
            "true" => Ok(FieldElement::from(1u64)),
            "false" => Ok(FieldElement::from(0u64)),
            _ => text.parse().map_err(|_| {
                EngineError::MalformedPayload(format!("unrecognized signal `{}`", text))
            }),
        },
        Value::Number(number) => number.as_u64().map(FieldElement::from).ok_or_else(|| {
            EngineError::MalformedPayload(format!("unrecognized signal `{}`", number))
        }),
        Value::Bool(flag) => Ok(FieldElement::from(u64::from(*flag))),
        other => Err(EngineError::MalformedPayload(format!(
            "unrecognized signal `{}`",
            other
        ))),
    }
}

/// Parses a JSON array of public signals.
pub fn parse_public_signals(json: &str) -> Result<Vec<FieldElement>, EngineError> {
    let values: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| EngineError::MalformedPayload(format!("public signals: {}", e)))?;
    values.iter().map(normalize_signal).collect()
}

/// Reads a normalized signal as a boolean flag.
///
/// # Errors
/// `EngineError::SignalMismatch` naming `check` if the value is neither 0 nor 1
pub fn as_flag(value: &FieldElement, check: SignalCheck) -> Result<bool, EngineError> {
    if *value == FieldElement::from(1u64) {
        Ok(true)
    } else if *value == FieldElement::zero() {
        Ok(false)
    } else {
        Err(EngineError::SignalMismatch {
            check,
            detail: format!("flag must be 0 or 1, got {}", value),
        })
    }
}

/// An age claim whose signals passed every business rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeClaim {
    pub is_of_age: bool,
    /// Root the proof is bound to
    pub bound_root: FieldElement,
}

/// Interprets age-predicate signals under the declared convention.
///
/// # Arguments
/// * `convention` - Declared signal layout
/// * `signals` - Normalized public signals
/// * `minimum_age` - Threshold requested by the caller
/// * `caller_root` - Root asserted by the caller, if any
///
/// # Errors
/// - `EngineError::SignalMismatch` naming the failed sub-check
/// - `EngineError::MalformedPayload` if `v1` is used without a caller root
pub fn interpret_age_signals(
    convention: SignalConvention,
    signals: &[FieldElement],
    minimum_age: u64,
    caller_root: Option<FieldElement>,
) -> Result<AgeClaim, EngineError> {
    if signals.len() != convention.signal_count() {
        return Err(EngineError::SignalMismatch {
            check: SignalCheck::SignalCount,
            detail: format!(
                "convention expects {} signals, got {}",
                convention.signal_count(),
                signals.len()
            ),
        });
    }

    match convention {
        SignalConvention::AdultFlag => {
            if !as_flag(&signals[0], SignalCheck::AdultFlag)? {
                return Err(EngineError::SignalMismatch {
                    check: SignalCheck::AdultFlag,
                    detail: "isAdult signal is 0".into(),
                });
            }
            let bound_root = caller_root.ok_or_else(|| {
                EngineError::MalformedPayload("v1 signals require a caller-supplied rootHash".into())
            })?;
            Ok(AgeClaim {
                is_of_age: true,
                bound_root,
            })
        }
        SignalConvention::AgeBinding => {
            let threshold = FieldElement::from(minimum_age);
            if signals[0] != threshold {
                return Err(EngineError::SignalMismatch {
                    check: SignalCheck::MinimumAge,
                    detail: format!("expected {}, proof states {}", minimum_age, signals[0]),
                });
            }
            if !as_flag(&signals[2], SignalCheck::OfAgeFlag)? {
                return Err(EngineError::SignalMismatch {
                    check: SignalCheck::OfAgeFlag,
                    detail: "isOfAge signal is 0".into(),
                });
            }
            let bound_root = signals[1];
            if let Some(root) = caller_root {
                if root != bound_root {
                    return Err(EngineError::SignalMismatch {
                        check: SignalCheck::RootConsistency,
                        detail: "caller rootHash differs from the proof's credentialHash".into(),
                    });
                }
            }
            Ok(AgeClaim {
                is_of_age: true,
                bound_root,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fe(n: u64) -> FieldElement {
        FieldElement::from(n)
    }

    #[test]
    fn test_normalizes_recognized_forms() {
        assert_eq!(normalize_signal(&json!("1")).unwrap(), fe(1));
        assert_eq!(normalize_signal(&json!(1)).unwrap(), fe(1));
        assert_eq!(normalize_signal(&json!(true)).unwrap(), fe(1));
        assert_eq!(normalize_signal(&json!("true")).unwrap(), fe(1));
        assert_eq!(normalize_signal(&json!("false")).unwrap(), fe(0));
        assert_eq!(normalize_signal(&json!("0x12")).unwrap(), fe(18));
    }

    #[test]
    fn test_unrecognized_forms_are_typed_errors() {
        for value in [json!("yes"), json!(null), json!(-1), json!([1]), json!(" 1")] {
            let err = normalize_signal(&value).unwrap_err();
            assert!(matches!(err, EngineError::MalformedPayload(_)), "{}", value);
        }
    }

    #[test]
    fn test_parse_public_signals() {
        let signals = parse_public_signals(r#"["18", 42, true]"#).unwrap();
        assert_eq!(signals, vec![fe(18), fe(42), fe(1)]);
        assert!(parse_public_signals("not json").is_err());
    }

    #[test]
    fn test_flag_outside_zero_one() {
        let err = as_flag(&fe(2), SignalCheck::OfAgeFlag).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SignalMismatch { check: SignalCheck::OfAgeFlag, .. }
        ));
    }

    #[test]
    fn test_v1_accepts_adult_flag() {
        let claim =
            interpret_age_signals(SignalConvention::AdultFlag, &[fe(1)], 18, Some(fe(77))).unwrap();
        assert!(claim.is_of_age);
        assert_eq!(claim.bound_root, fe(77));
    }

    #[test]
    fn test_v1_rejects_zero_flag() {
        let err = interpret_age_signals(SignalConvention::AdultFlag, &[fe(0)], 18, Some(fe(77)))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SignalMismatch { check: SignalCheck::AdultFlag, .. }
        ));
    }

    #[test]
    fn test_v1_requires_caller_root() {
        let err = interpret_age_signals(SignalConvention::AdultFlag, &[fe(1)], 18, None).unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));
    }

    #[test]
    fn test_v2_binds_signal_root() {
        let signals = [fe(18), fe(555), fe(1)];
        let claim = interpret_age_signals(SignalConvention::AgeBinding, &signals, 18, None).unwrap();
        assert_eq!(claim.bound_root, fe(555));
    }

    #[test]
    fn test_v2_threshold_mismatch() {
        let signals = [fe(21), fe(555), fe(1)];
        let err =
            interpret_age_signals(SignalConvention::AgeBinding, &signals, 18, None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SignalMismatch { check: SignalCheck::MinimumAge, .. }
        ));
    }

    #[test]
    fn test_v2_caller_root_must_agree() {
        let signals = [fe(18), fe(555), fe(1)];
        let err = interpret_age_signals(SignalConvention::AgeBinding, &signals, 18, Some(fe(556)))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SignalMismatch { check: SignalCheck::RootConsistency, .. }
        ));
    }

    #[test]
    fn test_count_never_selects_convention() {
        let err = interpret_age_signals(SignalConvention::AgeBinding, &[fe(1)], 18, Some(fe(5)))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SignalMismatch { check: SignalCheck::SignalCount, .. }
        ));
        assert!("v3".parse::<SignalConvention>().is_err());
    }
}
