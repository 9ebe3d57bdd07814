use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// # Arguments
/// * `seed` - Seed for the RNG. If 0, the RNG is seeded from the wall clock
/// mixed with a hash of the current thread id, so concurrent callers diverge.
pub fn create_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        let mut hasher = DefaultHasher::new();
        thread::current().id().hash(&mut hasher);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        SmallRng::seed_from_u64(now ^ hasher.finish())
    } else {
        SmallRng::seed_from_u64(seed)
    }
}
