use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Immutable configuration of one index.
///
/// The field names follow the conventional single letters of the LSH
/// literature. `m` is a table-size hint consumed by collaborators and the
/// serialized header; the bucket lookup itself never folds it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// Hash-table modulus / size hint (`M`).
    pub m: usize,
    /// Number of independent hash tables (`L`).
    pub l: usize,
    /// Input vector dimension (`D`).
    pub d: usize,
    /// Number of output bits per code (`N`), at most 64.
    pub n_bits: usize,
    /// Training sample size (`S`).
    pub s: usize,
    /// Rotation refinement iteration budget (`I`). May be 0.
    pub i: usize,
}

impl Parameter {
    pub fn validate(&self) -> Result<()> {
        if self.l == 0 {
            return Err(Error::InvalidParameter("l must be at least 1".to_string()));
        }
        if self.d == 0 {
            return Err(Error::InvalidParameter("d must be at least 1".to_string()));
        }
        if self.n_bits == 0 || self.n_bits > 64 {
            return Err(Error::InvalidParameter(format!(
                "n_bits must be in 1..=64, got {}",
                self.n_bits
            )));
        }
        if self.n_bits > self.d {
            return Err(Error::InvalidParameter(format!(
                "n_bits ({}) cannot exceed the input dimension ({})",
                self.n_bits, self.d
            )));
        }
        if self.s < 2 {
            return Err(Error::InvalidParameter(
                "s must be at least 2 for the sample covariance".to_string(),
            ));
        }
        if self.m == 0 {
            return Err(Error::InvalidParameter("m must be at least 1".to_string()));
        }
        // every header field is persisted as a 32 bit unsigned int
        for &(name, v) in &[
            ("m", self.m),
            ("l", self.l),
            ("d", self.d),
            ("s", self.s),
        ] {
            if v > u32::MAX as usize {
                return Err(Error::InvalidParameter(format!(
                    "{} does not fit in the serialized header: {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn base() -> Parameter {
        Parameter {
            m: 97,
            l: 2,
            d: 4,
            n_bits: 3,
            s: 8,
            i: 5,
        }
    }

    #[test]
    fn test_validate_accepts_sane_params() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let mut p = base();
        p.l = 0;
        assert!(p.validate().is_err());

        let mut p = base();
        p.n_bits = 0;
        assert!(p.validate().is_err());

        let mut p = base();
        p.n_bits = 65;
        assert!(p.validate().is_err());

        let mut p = base();
        p.n_bits = 5;
        assert!(p.validate().is_err(), "n_bits > d must be rejected");

        let mut p = base();
        p.s = 1;
        assert!(p.validate().is_err());
    }
}
