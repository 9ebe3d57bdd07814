//! Projection statistics split by sign, consumed by probing policies.
use crate::data::Dataset;
use crate::hash::ItqProjections;
use serde::{Deserialize, Serialize};

/// Per-dimension conditional statistics of the projection scores: mean and
/// standard deviation over the non-negative (`pos`) and the negative (`neg`)
/// scores. All four vectors have one entry per code bit.
///
/// The standard deviation divides by the conditional count, not `count - 1`,
/// so it is the population estimator. A dimension that never saw a positive
/// (resp. negative) score reports 0 for that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignStats {
    pub mean_pos: Vec<f32>,
    pub mean_neg: Vec<f32>,
    pub std_pos: Vec<f32>,
    pub std_neg: Vec<f32>,
}

/// Compute [SignStats] of `hasher` over the whole dataset in two passes.
/// The dataset dimension must match `hasher.dim()`.
pub fn mean_and_std<D: Dataset>(hasher: &ItqProjections, data: &D) -> SignStats {
    let n_bits = hasher.n_bits();
    let mut sum_pos = vec![0.0f32; n_bits];
    let mut sum_neg = vec![0.0f32; n_bits];
    let mut cnt_pos = vec![0u32; n_bits];
    let mut cnt_neg = vec![0u32; n_bits];

    for r in 0..data.len() {
        let f = hasher.project(data.row(r));
        for (i, &fi) in f.iter().enumerate() {
            if fi >= 0.0 {
                sum_pos[i] += fi;
                cnt_pos[i] += 1;
            } else {
                sum_neg[i] += fi;
                cnt_neg[i] += 1;
            }
        }
    }

    let mean = |sum: &[f32], cnt: &[u32]| -> Vec<f32> {
        sum.iter()
            .zip(cnt)
            .map(|(&s, &c)| if c == 0 { 0.0 } else { s / c as f32 })
            .collect()
    };
    let mean_pos = mean(&sum_pos, &cnt_pos);
    let mean_neg = mean(&sum_neg, &cnt_neg);

    let mut sq_pos = vec![0.0f32; n_bits];
    let mut sq_neg = vec![0.0f32; n_bits];
    for r in 0..data.len() {
        let f = hasher.project(data.row(r));
        for (i, &fi) in f.iter().enumerate() {
            if fi >= 0.0 {
                let d = fi - mean_pos[i];
                sq_pos[i] += d * d;
            } else {
                let d = fi - mean_neg[i];
                sq_neg[i] += d * d;
            }
        }
    }

    let std = |sq: &[f32], cnt: &[u32]| -> Vec<f32> {
        sq.iter()
            .zip(cnt)
            .map(|(&s, &c)| if c == 0 { 0.0 } else { (s / c as f32).sqrt() })
            .collect()
    };
    let std_pos = std(&sq_pos, &cnt_pos);
    let std_neg = std(&sq_neg, &cnt_neg);

    SignStats {
        mean_pos,
        mean_neg,
        std_pos,
        std_neg,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::InMemoryDataset;
    use ndarray::arr2;

    #[test]
    fn test_identity_basis_stats() {
        // identity projections make the statistics directly readable from
        // the input columns
        let hasher = ItqProjections::new(arr2(&[[1.0, 0.0], [0.0, 1.0]]));
        let data = InMemoryDataset::from_rows(&[
            vec![1.0, -2.0],
            vec![3.0, -4.0],
            vec![-5.0, 6.0],
        ])
        .unwrap();
        let stats = mean_and_std(&hasher, &data);

        // dim 0: positives {1, 3}, negatives {-5}
        assert!((stats.mean_pos[0] - 2.0).abs() < 1e-6);
        assert!((stats.mean_neg[0] + 5.0).abs() < 1e-6);
        assert!((stats.std_pos[0] - 1.0).abs() < 1e-6);
        assert!(stats.std_neg[0].abs() < 1e-6);

        // dim 1: positives {6}, negatives {-2, -4}
        assert!((stats.mean_pos[1] - 6.0).abs() < 1e-6);
        assert!((stats.mean_neg[1] + 3.0).abs() < 1e-6);
        assert!(stats.std_pos[1].abs() < 1e-6);
        assert!((stats.std_neg[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_one_sided_dimension_reports_zero() {
        let hasher = ItqProjections::new(arr2(&[[1.0]]));
        let data = InMemoryDataset::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let stats = mean_and_std(&hasher, &data);
        assert_eq!(stats.mean_neg[0], 0.0);
        assert_eq!(stats.std_neg[0], 0.0);
        assert!((stats.mean_pos[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_matches_brute_force() {
        let hasher = ItqProjections::new(arr2(&[[0.6, -0.8], [0.8, 0.6]]));
        let rows: Vec<Vec<f32>> = (0..64)
            .map(|i| {
                let x = (i as f32 * 0.37).sin() * 2.0;
                let y = (i as f32 * 0.71).cos() * 3.0 - 0.5;
                vec![x, y]
            })
            .collect();
        let data = InMemoryDataset::from_rows(&rows).unwrap();
        let stats = mean_and_std(&hasher, &data);

        for bit in 0..2 {
            let scores: Vec<f64> = rows
                .iter()
                .map(|r| hasher.project(r)[bit] as f64)
                .collect();
            let pos: Vec<f64> = scores.iter().copied().filter(|&s| s >= 0.0).collect();
            let neg: Vec<f64> = scores.iter().copied().filter(|&s| s < 0.0).collect();

            let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
            let pop_std = |xs: &[f64], mu: f64| {
                (xs.iter().map(|x| (x - mu) * (x - mu)).sum::<f64>() / xs.len() as f64).sqrt()
            };

            let mu_pos = mean(&pos);
            let mu_neg = mean(&neg);
            assert!((stats.mean_pos[bit] as f64 - mu_pos).abs() < 1e-5);
            assert!((stats.mean_neg[bit] as f64 - mu_neg).abs() < 1e-5);
            assert!((stats.std_pos[bit] as f64 - pop_std(&pos, mu_pos)).abs() < 1e-5);
            assert!((stats.std_neg[bit] as f64 - pop_std(&neg, mu_neg)).abs() < 1e-5);
        }
    }
}
