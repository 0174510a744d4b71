//! Uniform sampling of row positions with replacement.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use common_error::{ensure, ChromaResult};

/// Generator behind every draw: seeded when a seed is given, from OS entropy
/// otherwise.
pub fn sample_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Draw `n` positions in `[0, count)` independently and uniformly, with
/// replacement, then shuffle them.
///
/// The same `(count, n, seed)` always yields the same sequence.
pub fn select_indices(count: u64, n: usize, seed: Option<u64>) -> ChromaResult<Vec<u64>> {
    ensure!(count > 0, PreconditionError: "cannot sample {} rows from an empty population", n);

    let mut rng = sample_rng(seed);
    let mut indices: Vec<u64> = (0..n).map(|_| rng.gen_range(0..count)).collect();
    indices.shuffle(&mut rng);
    Ok(indices)
}
