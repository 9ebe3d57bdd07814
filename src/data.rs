//! The dataset capability consumed by training, hashing and statistics.
use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Read-only, row-major matrix of single precision scalars.
///
/// Training workers share the dataset read-only, hence the `Sync` bound.
/// Implementers only need to expose the shape and contiguous row slices;
/// the core is not coupled to any particular storage beyond that.
pub trait Dataset: Sync {
    /// Number of rows.
    fn len(&self) -> usize;
    /// Dimension of every row.
    fn dim(&self) -> usize;
    /// Contiguous slice of row `i`. `i` must be below `len()`.
    fn row(&self, i: usize) -> &[f32];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned row-major dataset backed by a single contiguous buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryDataset {
    data: Vec<f32>,
    dim: usize,
}

impl InMemoryDataset {
    /// # Arguments
    /// * `data` - Row-major scalars, `dim` consecutive values per row.
    /// * `dim` - Dimension of every row.
    pub fn new(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Dataset("row dimension must be at least 1".to_string()));
        }
        if data.len() % dim != 0 {
            return Err(Error::Dataset(format!(
                "buffer of {} scalars is not a multiple of the row dimension {}",
                data.len(),
                dim
            )));
        }
        Ok(InMemoryDataset { data, dim })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dim = match rows.first() {
            None => return Err(Error::Dataset("no rows given".to_string())),
            Some(r) => r.len(),
        };
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(Error::Dataset(format!(
                    "row of dimension {} in a dataset of dimension {}",
                    row.len(),
                    dim
                )));
            }
            data.extend_from_slice(row);
        }
        InMemoryDataset::new(data, dim)
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }
}

impl From<Array2<f32>> for InMemoryDataset {
    fn from(a: Array2<f32>) -> Self {
        let dim = a.ncols();
        let data = a.as_standard_layout().into_owned().into_raw_vec();
        InMemoryDataset { data, dim }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_in_memory_rows() {
        let d = InMemoryDataset::new(vec![1., 2., 3., 4., 5., 6.], 3).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.dim(), 3);
        assert_eq!(d.row(1), &[4., 5., 6.]);
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        assert!(InMemoryDataset::new(vec![1., 2., 3.], 2).is_err());
        assert!(InMemoryDataset::from_rows(&[vec![1., 2.], vec![3.]]).is_err());
    }

    #[test]
    fn test_from_array() {
        let d: InMemoryDataset = array![[1.0f32, 2.], [3., 4.]].into();
        assert_eq!(d.len(), 2);
        assert_eq!(d.row(0), &[1., 2.]);
        assert_eq!(d.row(1), &[3., 4.]);
    }
}
