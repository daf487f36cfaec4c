//! Epoch sampling: fixed train-ratio subset plus per-epoch draw order.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// How each epoch's draw is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawStrategy {
    /// Uniform permutation without replacement
    Shuffle,
    /// Weighted draw; `weights` is aligned with the full training split
    Weighted { weights: Vec<f64>, replacement: bool },
}

/// Deterministic sampler over a fixed subset of the training split.
///
/// The subset is chosen once from the seed; every epoch draws exactly
/// `pool().len()` indices from it.
#[derive(Debug, Clone)]
pub struct EpochSampler {
    pool: Vec<usize>,
    strategy: DrawStrategy,
    seed: u64,
}

/// Indices kept when training on `ratio` of `len` examples, in ascending order.
pub fn fixed_subset(len: usize, ratio: f32, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    if ratio >= 1.0 || len == 0 {
        return indices;
    }
    let keep = ((len as f64 * f64::from(ratio)).ceil() as usize).clamp(1, len);
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices.truncate(keep);
    indices.sort_unstable();
    indices
}

fn epoch_seed(seed: u64, epoch: usize) -> u64 {
    // splitmix64 step so neighbouring epochs get unrelated streams
    let mut z = seed.wrapping_add((epoch as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl EpochSampler {
    /// Create a sampler over `len` training examples.
    pub fn new(len: usize, train_ratio: f32, seed: u64, strategy: DrawStrategy) -> Self {
        let pool = fixed_subset(len, train_ratio, seed);
        Self { pool, strategy, seed }
    }

    /// Training indices eligible for every epoch.
    pub fn pool(&self) -> &[usize] {
        &self.pool
    }

    /// Number of draws per epoch.
    pub fn draws_per_epoch(&self) -> usize {
        self.pool.len()
    }

    /// Whether the draw is weighted.
    pub fn is_weighted(&self) -> bool {
        matches!(self.strategy, DrawStrategy::Weighted { .. })
    }

    /// Draw order for `epoch`; identical for identical (seed, epoch).
    pub fn epoch_order(&self, epoch: usize) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(epoch_seed(self.seed, epoch));
        match &self.strategy {
            DrawStrategy::Shuffle => {
                let mut order = self.pool.clone();
                order.shuffle(&mut rng);
                order
            }
            DrawStrategy::Weighted { weights, replacement: true } => {
                let pool_weights: Vec<f64> = self.pool.iter().map(|&i| weights[i]).collect();
                match WeightedIndex::new(&pool_weights) {
                    Ok(dist) => (0..self.pool.len()).map(|_| self.pool[dist.sample(&mut rng)]).collect(),
                    Err(err) => {
                        tracing::warn!(error = %err, "invalid sampling weights, falling back to shuffling");
                        let mut order = self.pool.clone();
                        order.shuffle(&mut rng);
                        order
                    }
                }
            }
            DrawStrategy::Weighted { weights, replacement: false } => {
                // Weighted permutation: sort by u^(1/w), largest first.
                let mut keyed: Vec<(f64, usize)> = self
                    .pool
                    .iter()
                    .map(|&i| {
                        let u: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
                        (u.powf(1.0 / weights[i]), i)
                    })
                    .collect();
                keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
                keyed.into_iter().map(|(_, i)| i).collect()
            }
        }
    }
}
