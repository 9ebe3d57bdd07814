//! Re-export of the public api of itq-lsh.
pub use crate::{
    data::{Dataset, InMemoryDataset},
    error::{Error, Result},
    hash::ItqProjections,
    index::{ItqLsh, State},
    params::Parameter,
    probe::{Prober, Progress},
    stats::SignStats,
};
