// src/models/field.rs
//! Field element data model.
//!
//! Wraps a BN254 scalar field element so that every value entering the engine
//! (leaf hashes, roots, public signals) has a single canonical form. On the
//! wire and in the ledger a field element is its decimal string.

use crate::error::EngineError;
use ark_bn254::Fr as Bn254Fr;
use ark_ff::{PrimeField, Zero};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A BN254 scalar field element.
///
/// # Parsing
/// Accepts a decimal string (`"255"`) or a `0x`-prefixed hex string
/// (`"0xff"`). Values at or above the field modulus are rejected instead of
/// being reduced, so two strings parse to the same element only if they
/// denote the same integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(Bn254Fr);

impl FieldElement {
    /// Wraps a raw field element.
    pub fn new(inner: Bn254Fr) -> Self {
        FieldElement(inner)
    }

    /// Returns the underlying field element.
    pub fn inner(&self) -> Bn254Fr {
        self.0
    }

    /// The additive identity.
    ///
    /// # Returns
    /// The element `0`, which is also what an absent flag normalizes to
    pub fn zero() -> Self {
        FieldElement(Bn254Fr::zero())
    }

    /// Interprets an arbitrary-precision integer as a field element.
    ///
    /// # Returns
    /// `None` if `value` is not strictly below the modulus
    pub fn from_biguint(value: &BigUint) -> Option<Self> {
        if value >= &modulus() {
            return None;
        }
        Some(FieldElement(Bn254Fr::from(value.clone())))
    }

    /// Canonical arbitrary-precision integer for this element.
    pub fn to_biguint(&self) -> BigUint {
        self.0.into_bigint().into()
    }

    /// Canonical decimal rendering, `"0"` for zero.
    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_str_radix(10)
    }
}

/// The BN254 scalar field modulus.
pub fn modulus() -> BigUint {
    Bn254Fr::MODULUS.into()
}

/// Parses a decimal or `0x`-hex integer string into an unbounded integer.
///
/// Only ASCII digits (or hex digits after the prefix) are accepted; signs,
/// whitespace and digit separators are rejected.
pub fn parse_integer(text: &str) -> Option<BigUint> {
    let (digits, radix) = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if digits.is_empty() {
        return None;
    }
    let well_formed = if radix == 16 {
        digits.bytes().all(|b| b.is_ascii_hexdigit())
    } else {
        digits.bytes().all(|b| b.is_ascii_digit())
    };
    if !well_formed {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), radix)
}

impl FromStr for FieldElement {
    type Err = EngineError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let value = parse_integer(text)
            .ok_or_else(|| EngineError::Validation(format!("`{}` is not an integer", text)))?;
        FieldElement::from_biguint(&value).ok_or_else(|| {
            EngineError::Validation(format!("`{}` is not below the field modulus", text))
        })
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        FieldElement(Bn254Fr::from(value))
    }
}

impl From<Bn254Fr> for FieldElement {
    fn from(value: Bn254Fr) -> Self {
        FieldElement(value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
