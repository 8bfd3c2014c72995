//! Record traversal order
//!
//! Exploration permutes the whole index range with a seeded RNG and then
//! drops processed indices, so a resumed run with the same seed continues
//! the original permutation. Exhaustive keeps input order.

use crate::models::SamplingMode;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashSet, VecDeque};

/// Indices still to visit, in visiting order
pub fn traversal_order(
    mode: SamplingMode,
    total: usize,
    seed: u64,
    processed: &[usize],
) -> VecDeque<usize> {
    let done: HashSet<usize> = processed.iter().copied().collect();
    let mut order: Vec<usize> = (0..total).collect();

    if mode == SamplingMode::Exploration {
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }

    order.into_iter().filter(|i| !done.contains(i)).collect()
}

/// Seed for a fresh exploration run
pub fn fresh_seed() -> u64 {
    rand::random()
}
