// src/zkp/proof_verification.rs
//! # Zero-Knowledge Proof Verification
//!
//! Adapter around the Groth16 verifier for BN254. Proofs and verification
//! keys use the snarkjs JSON layout (`pi_a`/`pi_b`/`pi_c`, `vk_alpha_1`,
//! `IC`, ...), with coordinates as decimal strings.
//!
//! ## Cryptographic Components
//! - **Groth16**: zk-SNARK proving system (`ark-groth16`)
//! - **BN254**: pairing-friendly curve, `bn128` in snarkjs naming
//!
//! ## Security Considerations
//! - The verification key is loaded and prepared once, before traffic
//! - Every curve point is checked to be on the curve and in the prime-order
//!   subgroup before it reaches the pairing
//! - The number of public signals must match the key

use crate::error::EngineError;
use crate::models::field::{parse_integer, FieldElement};
use ark_bn254::{Bn254, Fq, Fq2, Fr as Bn254Fr, G1Affine, G2Affine};
use ark_ff::PrimeField;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_snark::SNARK;
use log::{info, warn};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// External zero-knowledge verifier.
///
/// Implementations must be deterministic: the same proof and signals always
/// produce the same answer on every replica.
pub trait ZkVerifier: Send + Sync {
    /// Verifies `proof` against `public_signals` with the bundled key.
    ///
    /// # Returns
    /// - `Ok(true)` if the proof is valid
    /// - `Ok(false)` if the pairing check fails
    /// - `Err(KeyUnavailable)` if no key is loaded
    /// - `Err(ProofInvalid)` if the proof cannot be evaluated at all
    fn verify(&self, proof: &Groth16Proof, public_signals: &[FieldElement])
        -> Result<bool, EngineError>;
}

/// Groth16 proof in snarkjs JSON layout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    pub protocol: String,
    pub curve: String,
}

impl Groth16Proof {
    /// Parses and shape-checks a proof payload.
    ///
    /// # Errors
    /// `EngineError::MalformedPayload` on invalid JSON, a protocol other than
    /// `groth16`, a curve other than `bn128`, or wrong coordinate counts
    pub fn parse(json: &str) -> Result<Self, EngineError> {
        let proof: Groth16Proof = serde_json::from_str(json)
            .map_err(|e| EngineError::MalformedPayload(format!("proof: {}", e)))?;
        if proof.protocol != "groth16" {
            return Err(EngineError::MalformedPayload(format!(
                "unsupported proof protocol `{}`",
                proof.protocol
            )));
        }
        if proof.curve != "bn128" {
            return Err(EngineError::MalformedPayload(format!(
                "unsupported curve `{}`",
                proof.curve
            )));
        }
        let g2_shape = proof.pi_b.len() == 3 && proof.pi_b.iter().all(|pair| pair.len() == 2);
        if proof.pi_a.len() != 3 || proof.pi_c.len() != 3 || !g2_shape {
            return Err(EngineError::MalformedPayload(
                "proof points have the wrong number of coordinates".into(),
            ));
        }
        Ok(proof)
    }

    /// Renders an arkworks proof in snarkjs layout.
    pub fn from_ark(proof: &Proof<Bn254>) -> Self {
        Groth16Proof {
            pi_a: g1_to_coords(&proof.a),
            pi_b: g2_to_coords(&proof.b),
            pi_c: g1_to_coords(&proof.c),
            protocol: "groth16".into(),
            curve: "bn128".into(),
        }
    }

    fn to_ark(&self) -> Result<Proof<Bn254>, String> {
        Ok(Proof {
            a: parse_g1(&self.pi_a)?,
            b: parse_g2(&self.pi_b)?,
            c: parse_g1(&self.pi_c)?,
        })
    }
}

/// Groth16 verification key in snarkjs JSON layout.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerificationKeyJson {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

impl VerificationKeyJson {
    /// Renders an arkworks verifying key in snarkjs layout.
    pub fn from_ark(vk: &VerifyingKey<Bn254>) -> Self {
        VerificationKeyJson {
            protocol: "groth16".into(),
            curve: "bn128".into(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_to_coords(&vk.alpha_g1),
            vk_beta_2: g2_to_coords(&vk.beta_g2),
            vk_gamma_2: g2_to_coords(&vk.gamma_g2),
            vk_delta_2: g2_to_coords(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_to_coords).collect(),
        }
    }

    fn to_ark(&self) -> Result<VerifyingKey<Bn254>, String> {
        if self.protocol != "groth16" || self.curve != "bn128" {
            return Err(format!("unsupported key {}/{}", self.protocol, self.curve));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(format!(
                "IC has {} points for {} public inputs",
                self.ic.len(),
                self.n_public
            ));
        }
        Ok(VerifyingKey {
            alpha_g1: parse_g1(&self.vk_alpha_1)?,
            beta_g2: parse_g2(&self.vk_beta_2)?,
            gamma_g2: parse_g2(&self.vk_gamma_2)?,
            delta_g2: parse_g2(&self.vk_delta_2)?,
            gamma_abc_g1: self
                .ic
                .iter()
                .map(|point| parse_g1(point))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

enum KeyState {
    Ready {
        pvk: PreparedVerifyingKey<Bn254>,
        n_public: usize,
    },
    Unavailable(String),
}

/// Groth16 verifier with a bundled, pre-processed verification key.
///
/// Construct once at startup and share behind an `Arc`. If the key cannot be
/// loaded the verifier stays usable but every call fails with
/// `EngineError::KeyUnavailable`.
pub struct Groth16Verifier {
    state: KeyState,
}

impl Groth16Verifier {
    /// Builds a verifier from an arkworks key.
    pub fn from_verifying_key(vk: VerifyingKey<Bn254>) -> Result<Self, EngineError> {
        let n_public = vk.gamma_abc_g1.len().saturating_sub(1);
        let pvk = Groth16::<Bn254>::process_vk(&vk)
            .map_err(|e| EngineError::KeyUnavailable(format!("key preparation failed: {}", e)))?;
        Ok(Groth16Verifier {
            state: KeyState::Ready { pvk, n_public },
        })
    }

    /// Builds a verifier from snarkjs verification key JSON.
    ///
    /// # Errors
    /// `EngineError::KeyUnavailable` if the JSON or any key point is invalid
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let parsed: VerificationKeyJson = serde_json::from_str(json)
            .map_err(|e| EngineError::KeyUnavailable(format!("verification key: {}", e)))?;
        let vk = parsed.to_ark().map_err(EngineError::KeyUnavailable)?;
        Self::from_verifying_key(vk)
    }

    /// Loads the verification key file at `path`.
    ///
    /// Never fails: a missing or invalid file yields an unavailable verifier
    /// so that credential issuance and queries keep working.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let loaded = fs::read_to_string(path)
            .map_err(|e| EngineError::KeyUnavailable(format!("{}: {}", path.display(), e)))
            .and_then(|json| Self::from_json(&json));

        match loaded {
            Ok(verifier) => {
                info!("Loaded Groth16 verification key from {}", path.display());
                verifier
            }
            Err(e) => {
                warn!("Verification disabled: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// A verifier without a key.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Groth16Verifier {
            state: KeyState::Unavailable(reason.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, KeyState::Ready { .. })
    }
}

impl ZkVerifier for Groth16Verifier {
    fn verify(
        &self,
        proof: &Groth16Proof,
        public_signals: &[FieldElement],
    ) -> Result<bool, EngineError> {
        let (pvk, n_public) = match &self.state {
            KeyState::Ready { pvk, n_public } => (pvk, *n_public),
            KeyState::Unavailable(reason) => {
                return Err(EngineError::KeyUnavailable(reason.clone()))
            }
        };

        if public_signals.len() != n_public {
            return Err(EngineError::ProofInvalid(format!(
                "key expects {} public signals, got {}",
                n_public,
                public_signals.len()
            )));
        }

        let proof = proof.to_ark().map_err(EngineError::ProofInvalid)?;
        let inputs: Vec<Bn254Fr> = public_signals.iter().map(FieldElement::inner).collect();

        Groth16::<Bn254>::verify_with_processed_vk(pvk, &inputs, &proof)
            .map_err(|e| EngineError::ProofInvalid(format!("pairing check failed: {}", e)))
    }
}

fn parse_base(text: &str) -> Result<Fq, String> {
    let value = parse_integer(text).ok_or_else(|| format!("`{}` is not an integer", text))?;
    let modulus: BigUint = Fq::MODULUS.into();
    if value >= modulus {
        return Err(format!("coordinate `{}` exceeds the base field", text));
    }
    Ok(Fq::from(value))
}

fn base_to_string(value: &Fq) -> String {
    let integer: BigUint = value.into_bigint().into();
    integer.to_str_radix(10)
}

fn parse_g1(coords: &[String]) -> Result<G1Affine, String> {
    if coords.len() != 3 || coords[2] != "1" {
        return Err("G1 point must be affine [x, y, \"1\"]".into());
    }
    let point = G1Affine::new_unchecked(parse_base(&coords[0])?, parse_base(&coords[1])?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G1 point is not on the curve".into());
    }
    Ok(point)
}

fn parse_g2(coords: &[Vec<String>]) -> Result<G2Affine, String> {
    let shaped = coords.len() == 3 && coords.iter().all(|pair| pair.len() == 2);
    if !shaped || coords[2][0] != "1" || coords[2][1] != "0" {
        return Err("G2 point must be affine [[x0, x1], [y0, y1], [\"1\", \"0\"]]".into());
    }
    let x = Fq2::new(parse_base(&coords[0][0])?, parse_base(&coords[0][1])?);
    let y = Fq2::new(parse_base(&coords[1][0])?, parse_base(&coords[1][1])?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G2 point is not on the curve".into());
    }
    Ok(point)
}

fn g1_to_coords(point: &G1Affine) -> Vec<String> {
    vec![base_to_string(&point.x), base_to_string(&point.y), "1".into()]
}

fn g2_to_coords(point: &G2Affine) -> Vec<Vec<String>> {
    vec![
        vec![base_to_string(&point.x.c0), base_to_string(&point.x.c1)],
        vec![base_to_string(&point.y.c0), base_to_string(&point.y.c1)],
        vec!["1".into(), "0".into()],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
    use ark_snark::CircuitSpecificSetupSNARK;

    /// Exposes three public signals and proves knowledge of a witness equal
    /// to the credential hash, with a boolean of-age flag.
    #[derive(Clone)]
    struct AgeClaimCircuit {
        minimum_age: Bn254Fr,
        credential_hash: Bn254Fr,
        is_of_age: Bn254Fr,
    }

    impl ConstraintSynthesizer<Bn254Fr> for AgeClaimCircuit {
        fn generate_constraints(
            self,
            cs: ConstraintSystemRef<Bn254Fr>,
        ) -> Result<(), SynthesisError> {
            let _min = FpVar::new_input(cs.clone(), || Ok(self.minimum_age))?;
            let hash = FpVar::new_input(cs.clone(), || Ok(self.credential_hash))?;
            let flag = FpVar::new_input(cs.clone(), || Ok(self.is_of_age))?;

            let secret = FpVar::new_witness(cs.clone(), || Ok(self.credential_hash))?;
            secret.enforce_equal(&hash)?;
            (&flag * &flag).enforce_equal(&flag)?;
            Ok(())
        }
    }

    fn fixture() -> (Groth16Verifier, Groth16Proof, Vec<FieldElement>) {
        let mut rng = <ark_std::rand::rngs::StdRng as ark_std::rand::SeedableRng>::seed_from_u64(0);
        let circuit = AgeClaimCircuit {
            minimum_age: Bn254Fr::from(18u64),
            credential_hash: Bn254Fr::from(987654321u64),
            is_of_age: Bn254Fr::from(1u64),
        };
        let (pk, vk) = Groth16::<Bn254>::setup(circuit.clone(), &mut rng).unwrap();
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).unwrap();

        let key_json = serde_json::to_string(&VerificationKeyJson::from_ark(&vk)).unwrap();
        let verifier = Groth16Verifier::from_json(&key_json).unwrap();
        let signals = vec![
            FieldElement::from(18u64),
            FieldElement::from(987654321u64),
            FieldElement::from(1u64),
        ];
        (verifier, Groth16Proof::from_ark(&proof), signals)
    }

    #[test]
    fn test_real_proof_verifies_through_json() {
        let (verifier, proof, signals) = fixture();
        let reparsed = Groth16Proof::parse(&serde_json::to_string(&proof).unwrap()).unwrap();
        assert!(verifier.verify(&reparsed, &signals).unwrap());
    }

    #[test]
    fn test_wrong_signal_fails_pairing() {
        let (verifier, proof, mut signals) = fixture();
        signals[1] = FieldElement::from(1u64);
        assert!(!verifier.verify(&proof, &signals).unwrap());
    }

    #[test]
    fn test_signal_count_mismatch_is_invalid() {
        let (verifier, proof, signals) = fixture();
        let err = verifier.verify(&proof, &signals[..1]).unwrap_err();
        assert!(matches!(err, EngineError::ProofInvalid(_)));
    }

    #[test]
    fn test_off_curve_point_is_invalid() {
        let (verifier, mut proof, signals) = fixture();
        proof.pi_a[1] = "5".into();
        let err = verifier.verify(&proof, &signals).unwrap_err();
        assert!(matches!(err, EngineError::ProofInvalid(_)));
    }

    #[test]
    fn test_unavailable_key() {
        let (_, proof, signals) = fixture();
        let verifier = Groth16Verifier::load("/nonexistent/verification_key.json");
        assert!(!verifier.is_available());
        let err = verifier.verify(&proof, &signals).unwrap_err();
        assert!(matches!(err, EngineError::KeyUnavailable(_)));
    }

    #[test]
    fn test_payload_shape_checks() {
        let (_, proof, _) = fixture();
        let mut wrong_curve = proof.clone();
        wrong_curve.curve = "bls12381".into();
        let err = Groth16Proof::parse(&serde_json::to_string(&wrong_curve).unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));

        let mut short = proof;
        short.pi_c.pop();
        assert!(Groth16Proof::parse(&serde_json::to_string(&short).unwrap()).is_err());
        assert!(Groth16Proof::parse("{}").is_err());
    }

    #[test]
    fn test_invalid_key_json() {
        let err = Groth16Verifier::from_json("{\"protocol\":\"groth16\"}").err().unwrap();
        assert!(matches!(err, EngineError::KeyUnavailable(_)));
    }
}
