//! Per-table projection training and the batched driver running it across
//! all tables.
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::params::Parameter;
use crate::sample::select;
use crate::utils::create_rng;
use itertools::Itertools;
use log::info;
use nalgebra::{DMatrix, SymmetricEigen, SVD};
use ndarray::{Array, Array2};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use rayon::prelude::*;

/// Everything one training worker produces for its table.
pub(crate) struct TrainedTable {
    /// Projection basis, shape `(n_bits, dim)`.
    pub basis: Array2<f32>,
    /// Serialized-format companion array, never folded into the hash.
    pub rnd: Vec<u32>,
}

fn no_convergence(what: &str) -> Error {
    Error::Training(format!("{} did not converge", what))
}

/// Train the basis of a single table.
///
/// Samples `s` rows, takes the `n_bits` leading principal components of
/// their centered covariance and composes them with an orthonormal rotation
/// refined by `i` alternating quantization steps. With `i = 0` the rotation
/// stays the random orthonormal seed.
fn train_table<D: Dataset>(data: &D, param: &Parameter, seed: u64) -> Result<TrainedTable> {
    let rows = data.len();
    let dim = data.dim();
    let n_bits = param.n_bits;
    if param.s > rows {
        return Err(Error::InvalidParameter(format!(
            "sample size {} exceeds the dataset cardinality {}",
            param.s, rows
        )));
    }
    if n_bits > dim {
        return Err(Error::InvalidParameter(format!(
            "n_bits ({}) cannot exceed the dataset dimension ({})",
            n_bits, dim
        )));
    }
    let mut rng = create_rng(seed);

    // gather the sampled rows into an S x D matrix
    let mask = select(&mut rng, rows, param.s)?;
    let picked: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect();
    let x = DMatrix::<f32>::from_fn(param.s, dim, |r, c| data.row(picked[r])[c]);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Dataset(
            "non-finite scalar in the training sample".to_string(),
        ));
    }

    // center and form the sample covariance
    let mean = x.row_mean();
    let xc = DMatrix::from_fn(param.s, dim, |r, c| x[(r, c)] - mean[c]);
    let cov = xc.tr_mul(&xc) / (param.s as f32 - 1.0);

    let eig = SymmetricEigen::try_new(cov, f32::EPSILON, 0)
        .ok_or_else(|| no_convergence("eigendecomposition"))?;

    // the n_bits leading eigenvectors, kept in ascending eigenvalue order
    let order = eig
        .eigenvalues
        .iter()
        .enumerate()
        .sorted_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .collect_vec();
    let top = &order[dim - n_bits..];
    let p = DMatrix::from_fn(dim, n_bits, |r, c| eig.eigenvectors[(r, top[c])]);

    // centered projections of the sample
    let c_mat = &xc * &p;

    // orthonormal seed rotation from a Gaussian draw
    let gauss: Array2<f32> = Array::random_using((n_bits, n_bits), StandardNormal, &mut rng);
    let gauss = DMatrix::from_fn(n_bits, n_bits, |r, c| gauss[(r, c)]);
    let svd = SVD::try_new(gauss, true, false, f32::EPSILON, 0)
        .ok_or_else(|| no_convergence("singular value decomposition"))?;
    let mut rot = svd.u.ok_or_else(|| no_convergence("singular value decomposition"))?;

    // alternating quantization refinement: fix the codes, re-solve the
    // orthogonal Procrustes problem for the rotation
    for _ in 0..param.i {
        let codes = (&c_mat * &rot).map(|z| if z >= 0.0 { 1.0f32 } else { -1.0 });
        let svd = SVD::try_new(codes.tr_mul(&c_mat), true, true, f32::EPSILON, 0)
            .ok_or_else(|| no_convergence("singular value decomposition"))?;
        let u = svd.u.ok_or_else(|| no_convergence("singular value decomposition"))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| no_convergence("singular value decomposition"))?;
        rot = v_t.transpose() * u.transpose();
    }

    // stored basis: row i is column i of P * R
    let pr = p * rot;
    let mut flat = Vec::with_capacity(n_bits * dim);
    for i in 0..n_bits {
        for j in 0..dim {
            flat.push(pr[(j, i)]);
        }
    }
    let basis =
        Array2::from_shape_vec((n_bits, dim), flat).map_err(|e| Error::Training(e.to_string()))?;

    let rnd = (0..n_bits).map(|_| rng.gen_range(0..param.m as u32)).collect();

    Ok(TrainedTable { basis, rnd })
}

/// Train all `l` tables in sequential batches of concurrent workers.
///
/// Per-table seeds are drawn upfront from one master RNG, so the result does
/// not depend on `batch_size`. Every worker of a batch is joined before its
/// results are inspected; the first failure is surfaced and no partial
/// output escapes.
pub(crate) fn train_all<D: Dataset>(
    data: &D,
    param: &Parameter,
    batch_size: usize,
    seed: u64,
) -> Result<Vec<TrainedTable>> {
    let batch_size = batch_size.max(1);
    let mut rng = create_rng(seed);
    let seeds: Vec<u64> = (0..param.l).map(|_| rng.gen()).collect();

    let mut tables = Vec::with_capacity(param.l);
    for chunk in seeds.chunks(batch_size) {
        info!(
            "training tables {}..{} of {}",
            tables.len(),
            tables.len() + chunk.len(),
            param.l
        );
        let batch: Vec<Result<TrainedTable>> = chunk
            .par_iter()
            .map(|&s| train_table(data, param, s))
            .collect();
        for res in batch {
            tables.push(res?);
        }
    }
    Ok(tables)
}
