use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Hasher of one table: a learned linear basis followed by sign
/// quantization. The basis rows are the projection directions produced by
/// the trainer (principal components composed with an orthonormal rotation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItqProjections {
    /// One projection direction per row, shape `(n_bits, dim)`.
    basis: Array2<f32>,
}

impl ItqProjections {
    pub fn new(basis: Array2<f32>) -> Self {
        ItqProjections { basis }
    }

    pub fn n_bits(&self) -> usize {
        self.basis.nrows()
    }

    pub fn dim(&self) -> usize {
        self.basis.ncols()
    }

    pub fn basis(&self) -> &Array2<f32> {
        &self.basis
    }

    /// Real-valued projection scores of `v`. `v` must have `dim()` entries
    /// and hold finite scalars.
    pub fn project(&self, v: &[f32]) -> Array1<f32> {
        self.basis.dot(&aview1(v))
    }

    /// The quantized code of `v`.
    pub fn hash_vec(&self, v: &[f32]) -> Vec<u8> {
        quantize(&self.project(v))
    }

    /// The packed bucket identifier of `v`; a refinement of
    /// `pack_bits(quantize(project(v)))`.
    pub fn bucket_id(&self, v: &[f32]) -> u64 {
        pack_bits(&self.hash_vec(v))
    }
}

/// Sign quantization: non-negative scores map to 1, negative scores to 0.
/// Total over all finite inputs; a zero score counts as positive.
pub fn quantize(f: &Array1<f32>) -> Vec<u8> {
    f.mapv(|fi| if fi >= 0.0 { 1u8 } else { 0 }).to_vec()
}

/// Pack up to 64 bits into a bucket identifier, big-endian: bit 0 lands in
/// the most significant position of the `n`-bit id. This ordering is part of
/// the persisted format and must not be flipped.
pub fn pack_bits(bits: &[u8]) -> u64 {
    debug_assert!(!bits.is_empty() && bits.len() <= 64);
    let n = bits.len();
    bits.iter()
        .enumerate()
        .fold(0u64, |id, (i, &b)| id | (u64::from(b) << (n - 1 - i)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quantize_sign_semantics() {
        let f = arr1(&[1.5, -0.2, 0.0, -0.0, 7.0]);
        assert_eq!(quantize(&f), vec![1, 0, 1, 1, 1]);
        // all-zero projections quantize to all ones
        assert_eq!(quantize(&Array1::zeros(4)), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_pack_bits_big_endian() {
        assert_eq!(pack_bits(&[1, 0, 0]), 0b100);
        assert_eq!(pack_bits(&[0, 0, 1]), 0b001);
        assert_eq!(pack_bits(&[1]), 1);
        assert_eq!(pack_bits(&[1; 64]), u64::MAX);
    }

    #[test]
    fn test_bucket_id_refines_project_and_quantize() {
        let basis = arr2(&[[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]);
        let hasher = ItqProjections::new(basis);
        let v = &[0.5, 0.5, -2.0];
        assert_eq!(
            hasher.bucket_id(v),
            pack_bits(&quantize(&hasher.project(v)))
        );
        // bit 0 is most significant: projections (0.5, -0.5, -2.0) -> 100
        assert_eq!(hasher.bucket_id(v), 0b100);
    }

    #[test]
    fn test_bucket_id_fits_code_width() {
        let basis = arr2(&[[0.3, -0.7], [0.1, 0.9]]);
        let hasher = ItqProjections::new(basis);
        for v in &[[1.0, 2.0], [-4.0, 0.5], [0.0, 0.0]] {
            assert!(hasher.bucket_id(v) < 4);
        }
    }
}
