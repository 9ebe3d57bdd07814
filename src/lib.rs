//! Approximate nearest neighbor search over dense `f32` vectors with
//! learned binary projections.
//!
//! An index owns `l` independent hash tables. Each table is trained on a
//! sample of the data: the leading principal components of the sample
//! covariance are composed with an orthonormal rotation refined by
//! alternating quantization, and the signs of the resulting projections
//! form a compact binary code that doubles as the bucket identifier.
//! Queries enumerate candidate buckets through a caller-supplied
//! [Prober](probe::Prober) policy.
//!
//! # Example
//!
//! ```
//! use itq_lsh::prelude::*;
//!
//! let rows: Vec<Vec<f32>> = (0..16)
//!     .map(|r| {
//!         (0..4)
//!             .map(|c| ((r * 4 + c) as f32 * 0.37).sin() * (c + 1) as f32)
//!             .collect()
//!     })
//!     .collect();
//! let data = InMemoryDataset::from_rows(&rows).unwrap();
//!
//! let mut lsh = ItqLsh::new();
//! lsh.seed(1);
//! lsh.reset(Parameter { m: 97, l: 2, d: 4, n_bits: 3, s: 8, i: 5 }).unwrap();
//! lsh.train_all(&data, 2).unwrap();
//! lsh.hash(&data).unwrap();
//!
//! let ids = lsh.bucket_ids(&rows[0]).unwrap();
//! assert_eq!(ids.len(), 2);
//! assert!(ids.iter().all(|&id| id < 8));
//! ```
pub mod data;
mod error;
pub mod hash;
pub mod index;
mod params;
pub mod prelude;
pub mod probe;
pub mod sample;
pub mod stats;
mod train;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::index::{ItqLsh, State};
pub use crate::params::Parameter;
