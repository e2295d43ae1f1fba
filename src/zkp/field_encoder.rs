// src/zkp/field_encoder.rs
//! Attribute value to field element encoding.
//!
//! Encoding is a pure function of the value's UTF-8 bytes: no randomness, no
//! locale, no platform-dependent formatting. Two replicas always derive the
//! same leaf for the same credential.

use crate::error::EngineError;
use crate::models::field::FieldElement;
use num_bigint::BigUint;
use serde_json::Value;

/// Maximum number of text bytes packed into one field element.
///
/// 31 bytes (248 bits) always stays below the 254-bit BN254 modulus.
pub const MAX_TEXT_BYTES: usize = 31;

/// Encodes a string attribute value.
///
/// # Rules
/// - A non-empty string of ASCII digits is parsed as a non-negative decimal
///   integer; it must be below the field modulus.
/// - Any other string is read as UTF-8 bytes, most-significant byte first,
///   truncated to [`MAX_TEXT_BYTES`], as one big-endian integer.
///
/// # Errors
/// `EngineError::Encoding` if a numeric string does not fit the field
pub fn encode_str(value: &str) -> Result<FieldElement, EngineError> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let number = BigUint::parse_bytes(value.as_bytes(), 10)
            .ok_or_else(|| EngineError::Encoding(format!("`{}` is not a number", value)))?;
        return FieldElement::from_biguint(&number).ok_or_else(|| {
            EngineError::Encoding("numeric attribute exceeds the field modulus".into())
        });
    }

    let bytes = value.as_bytes();
    let take = bytes.len().min(MAX_TEXT_BYTES);
    let number = BigUint::from_bytes_be(&bytes[..take]);
    FieldElement::from_biguint(&number)
        .ok_or_else(|| EngineError::Encoding("text attribute exceeds the field modulus".into()))
}

/// Encodes a JSON attribute value.
///
/// Strings follow [`encode_str`], non-negative integers encode as
/// themselves, booleans as `0`/`1`. Values without a byte representation
/// (`null`, arrays, objects, negative or fractional numbers) are rejected.
pub fn encode_value(value: &Value) -> Result<FieldElement, EngineError> {
    match value {
        Value::String(text) => encode_str(text),
        Value::Number(number) => match number.as_u64() {
            Some(n) => Ok(FieldElement::from(n)),
            None => Err(EngineError::Encoding(format!(
                "number `{}` is not a non-negative integer",
                number
            ))),
        },
        Value::Bool(flag) => Ok(FieldElement::from(u64::from(*flag))),
        Value::Null => Err(EngineError::Encoding("null has no byte representation".into())),
        Value::Array(_) | Value::Object(_) => Err(EngineError::Encoding(
            "composite values have no byte representation".into(),
        )),
    }
}
