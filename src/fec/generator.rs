//! Coding-vector generation.
//!
//! Dense vectors are drawn from the generator's own RNG and travel
//! explicitly on the wire. Seeded vectors are a pure function of the
//! wire-visible parameters, so the decoder rebuilds them bit-for-bit.

use super::gf_tables::{Field, FiniteField};
use crate::error::{Result, RlncError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Coefficients of one linear combination, one unpacked element per symbol.
pub type CodingVector = Vec<u8>;

/// How the coding vector of a coded payload is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodingVectorFormat {
    /// The vector is packed into the header.
    FullVector,
    /// A dense uniform vector regenerated from a 32-bit seed.
    Seed,
    /// A sparse vector regenerated from a 32-bit seed and a density.
    SparseSeed,
}

impl CodingVectorFormat {
    pub fn tag(self) -> u8 {
        match self {
            CodingVectorFormat::FullVector => 1,
            CodingVectorFormat::Seed => 2,
            CodingVectorFormat::SparseSeed => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(CodingVectorFormat::FullVector),
            2 => Some(CodingVectorFormat::Seed),
            3 => Some(CodingVectorFormat::SparseSeed),
            _ => None,
        }
    }
}

impl std::str::FromStr for CodingVectorFormat {
    type Err = RlncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full_vector" | "dense" => Ok(CodingVectorFormat::FullVector),
            "seed" => Ok(CodingVectorFormat::Seed),
            "sparse_seed" | "sparse" => Ok(CodingVectorFormat::SparseSeed),
            other => Err(RlncError::Configuration(format!(
                "unknown coding vector format: {}",
                other
            ))),
        }
    }
}

// --- Density quantization ---

const DENSITY_SCALE: f64 = u16::MAX as f64;

/// Default density for sparse vectors.
pub const DEFAULT_DENSITY: f64 = 0.5;

pub fn validate_density(density: f64) -> Result<()> {
    if !density.is_finite() || !(0.0..=1.0).contains(&density) {
        return Err(RlncError::Configuration(format!(
            "density {} outside [0, 1]",
            density
        )));
    }
    Ok(())
}

/// Maps a density in [0, 1] to its 16-bit wire code.
///
/// Code 0 is never produced: an all-zero expansion could then never be
/// re-derived into a usable vector.
pub fn quantize_density(density: f64) -> u16 {
    let clamped = density.clamp(0.0, 1.0);
    ((clamped * DENSITY_SCALE).round() as u16).max(1)
}

pub fn dequantize_density(code: u16) -> f64 {
    code as f64 / DENSITY_SCALE
}

// --- Generator ---

/// Produces coding vectors for one encoder instance.
pub struct CoefficientGenerator {
    field: FiniteField,
    rng: StdRng,
}

impl CoefficientGenerator {
    /// Creates a generator seeded from OS entropy.
    pub fn new(field: Field) -> Self {
        Self {
            field: FiniteField::new(field),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(field: Field, seed: u64) -> Self {
        Self {
            field: FiniteField::new(field),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draws the seed carried by the next seeded payload.
    pub fn next_seed(&mut self) -> u32 {
        self.rng.gen()
    }

    /// Draws a uniformly random vector that is not all-zero.
    ///
    /// A `count` of zero yields an empty vector.
    pub fn generate_dense(&mut self, count: usize) -> CodingVector {
        let max = self.field.field().max_value();
        let mut vector = vec![0u8; count];
        if count == 0 {
            return vector;
        }
        loop {
            for c in vector.iter_mut() {
                *c = self.rng.gen_range(0..=max);
            }
            if vector.iter().any(|&c| c != 0) {
                return vector;
            }
        }
    }

    /// Expands `seed` into a dense uniform vector.
    ///
    /// Degenerate expansions are re-derived from `seed + 1`. A `count` of
    /// zero yields an empty vector.
    pub fn generate_seeded(field: Field, seed: u32, count: usize) -> CodingVector {
        let mut vector = vec![0u8; count];
        if count == 0 {
            return vector;
        }
        let mut seed = seed;
        while !expand_dense(field, seed, &mut vector) {
            seed = seed.wrapping_add(1);
        }
        vector
    }

    /// Expands `(seed, density)` into a sparse vector in which each entry
    /// is nonzero with probability `density` after quantization.
    pub fn generate_sparse(field: Field, seed: u32, density: f64, count: usize) -> CodingVector {
        Self::generate_sparse_quantized(field, seed, quantize_density(density), count)
    }

    /// Same as [`CoefficientGenerator::generate_sparse`] with the density
    /// already in wire form. A `count` of zero yields an empty vector.
    pub fn generate_sparse_quantized(
        field: Field,
        seed: u32,
        density_code: u16,
        count: usize,
    ) -> CodingVector {
        let mut vector = vec![0u8; count];
        if count == 0 {
            return vector;
        }
        let probability = dequantize_density(density_code.max(1));
        let mut seed = seed;
        while !expand_sparse(field, seed, probability, &mut vector) {
            seed = seed.wrapping_add(1);
        }
        vector
    }
}

/// One expansion pass; returns false when the result is all-zero.
fn expand_dense(field: Field, seed: u32, vector: &mut [u8]) -> bool {
    let max = field.max_value();
    let mut rng = StdRng::seed_from_u64(seed as u64);
    for c in vector.iter_mut() {
        *c = rng.gen_range(0..=max);
    }
    vector.iter().any(|&c| c != 0)
}

fn expand_sparse(field: Field, seed: u32, probability: f64, vector: &mut [u8]) -> bool {
    let max = field.max_value();
    let mut rng = StdRng::seed_from_u64(seed as u64);
    for c in vector.iter_mut() {
        *c = if rng.gen_bool(probability) {
            rng.gen_range(1..=max)
        } else {
            0
        };
    }
    vector.iter().any(|&c| c != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_is_deterministic() {
        for field in [Field::Binary, Field::Binary4, Field::Binary8] {
            let a = CoefficientGenerator::generate_sparse(field, 1234, 0.3, 64);
            let b = CoefficientGenerator::generate_sparse(field, 1234, 0.3, 64);
            assert_eq!(a, b);
            let c = CoefficientGenerator::generate_sparse(field, 1235, 0.3, 64);
            assert_ne!(a, c);
        }
    }

    #[test]
    fn seeded_is_deterministic() {
        let a = CoefficientGenerator::generate_seeded(Field::Binary8, 99, 32);
        let b = CoefficientGenerator::generate_seeded(Field::Binary8, 99, 32);
        assert_eq!(a, b);
        assert_ne!(a, CoefficientGenerator::generate_seeded(Field::Binary8, 100, 32));
    }

    #[test]
    fn entries_stay_in_field() {
        for field in [Field::Binary, Field::Binary4, Field::Binary8] {
            let mut generator = CoefficientGenerator::with_seed(field, 7);
            for _ in 0..50 {
                let v = generator.generate_dense(20);
                assert!(v.iter().all(|&c| c <= field.max_value()));
                assert!(v.iter().any(|&c| c != 0));
            }
            let s = CoefficientGenerator::generate_sparse(field, 5, 0.9, 100);
            assert!(s.iter().all(|&c| c <= field.max_value()));
        }
    }

    #[test]
    fn full_density_binary_is_all_ones() {
        let v = CoefficientGenerator::generate_sparse(Field::Binary, 42, 1.0, 16);
        assert_eq!(v, vec![1u8; 16]);
    }

    #[test]
    fn minimal_density_never_degenerate() {
        for seed in 0..3u32 {
            let v = CoefficientGenerator::generate_sparse(Field::Binary8, seed, 0.0, 1);
            assert_ne!(v[0], 0);
        }
    }

    #[test]
    fn degenerate_sparse_seed_uses_next_seed() {
        let code = quantize_density(0.5);
        let probability = dequantize_density(code);
        let mut raw = vec![0u8; 2];
        let mut next = vec![0u8; 2];
        let seed = (0..1000u32)
            .find(|&s| {
                !expand_sparse(Field::Binary4, s, probability, &mut raw)
                    && expand_sparse(Field::Binary4, s + 1, probability, &mut next)
            })
            .expect("a seed with an all-zero expansion");
        let v = CoefficientGenerator::generate_sparse_quantized(Field::Binary4, seed, code, 2);
        assert_eq!(v, next);
    }

    #[test]
    fn degenerate_dense_seed_uses_next_seed() {
        let mut raw = vec![0u8; 1];
        let mut next = vec![0u8; 1];
        let seed = (0..1000u32)
            .find(|&s| {
                !expand_dense(Field::Binary, s, &mut raw)
                    && expand_dense(Field::Binary, s + 1, &mut next)
            })
            .expect("a seed with an all-zero expansion");
        assert_eq!(CoefficientGenerator::generate_seeded(Field::Binary, seed, 1), next);
    }

    #[test]
    fn empty_count_yields_empty_vector() {
        for field in [Field::Binary, Field::Binary4, Field::Binary8] {
            assert!(CoefficientGenerator::generate_sparse(field, 1, 0.5, 0).is_empty());
            assert!(CoefficientGenerator::generate_seeded(field, 1, 0).is_empty());
            assert!(CoefficientGenerator::with_seed(field, 1)
                .generate_dense(0)
                .is_empty());
        }
    }

    #[test]
    fn sparse_density_roughly_respected() {
        let count = 4000;
        let v = CoefficientGenerator::generate_sparse(Field::Binary8, 3, 0.25, count);
        let nonzero = v.iter().filter(|&&c| c != 0).count() as f64 / count as f64;
        assert!((nonzero - 0.25).abs() < 0.05, "observed density {}", nonzero);
    }

    #[test]
    fn density_quantization() {
        assert_eq!(quantize_density(1.0), u16::MAX);
        assert_eq!(quantize_density(0.0), 1);
        let mut prev = 0;
        for i in 1..=100 {
            let code = quantize_density(i as f64 / 100.0);
            assert!(code > prev);
            prev = code;
            assert_eq!(quantize_density(dequantize_density(code)), code);
        }
        assert!(validate_density(1.5).is_err());
        assert!(validate_density(-0.1).is_err());
        assert!(validate_density(f64::NAN).is_err());
        assert!(validate_density(0.0).is_ok());
    }

    #[test]
    fn dense_is_reproducible_with_seed() {
        let mut a = CoefficientGenerator::with_seed(Field::Binary4, 11);
        let mut b = CoefficientGenerator::with_seed(Field::Binary4, 11);
        assert_eq!(a.generate_dense(10), b.generate_dense(10));
        assert_eq!(a.next_seed(), b.next_seed());
    }
}
