//! Row subsampling for the projection trainer.
use crate::error::{Error, Result};
use rand::Rng;

/// Select exactly `k` out of `n` indices without replacement.
///
/// Returns a mask of length `n` with `k` entries set. Two phases: a single
/// sweep that accepts index `i` when a uniform draw in `[0, n)` falls below
/// `k`, then uniform redraws until the count is exact. The distribution is
/// only approximately uniform over k-subsets, but every index has non-zero
/// selection probability.
pub fn select<R: Rng>(rng: &mut R, n: usize, k: usize) -> Result<Vec<bool>> {
    if k > n {
        return Err(Error::InvalidParameter(format!(
            "cannot sample {} rows out of {}",
            k, n
        )));
    }
    let mut mask = vec![false; n];
    let mut picked = 0;
    for flag in mask.iter_mut() {
        if picked == k {
            break;
        }
        if rng.gen_range(0..n) < k {
            *flag = true;
            picked += 1;
        }
    }
    while picked < k {
        let i = rng.gen_range(0..n);
        if !mask[i] {
            mask[i] = true;
            picked += 1;
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::create_rng;

    #[test]
    fn test_exact_count() {
        let mut rng = create_rng(1);
        for &(n, k) in &[(10, 3), (100, 100), (57, 1), (8, 0), (1, 1)] {
            let mask = select(&mut rng, n, k).unwrap();
            assert_eq!(mask.len(), n);
            assert_eq!(mask.iter().filter(|&&m| m).count(), k);
        }
    }

    #[test]
    fn test_oversized_request_fails() {
        let mut rng = create_rng(1);
        assert!(select(&mut rng, 4, 5).is_err());
    }

    #[test]
    fn test_tail_reachable() {
        // The first sweep may stop early; phase two must still be able to
        // reach indices anywhere in the range.
        let mut rng = create_rng(7);
        let mut tail_hits = 0;
        for _ in 0..200 {
            let mask = select(&mut rng, 16, 8).unwrap();
            if mask[15] {
                tail_hits += 1;
            }
        }
        assert!(tail_hits > 0);
    }
}
