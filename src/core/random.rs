//! The seeded random number generator carried by `Connections`.
//!
//! Every random choice in the Spatial Pooler and Temporal Memory is drawn from one `Random`
//! so that runs are reproducible from the seed alone. The generator counts the 32-bit words it
//! has produced, which lets it be persisted as `(seed, words)` and restored to the exact same
//! position by replaying the stream.

use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A seedable, serializable pseudo-random number generator.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
    seed: u64,
    words: u64,
}

impl Random {
    /// Creates a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            words: 0,
        }
    }

    /// The seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of 32-bit words drawn so far.
    pub fn words(&self) -> u64 {
        self.words
    }

    fn replay(seed: u64, words: u64) -> Self {
        let mut random = Self::new(seed);
        for _ in 0..words {
            random.next_u32();
        }
        random
    }
}

impl RngCore for Random {
    fn next_u32(&mut self) -> u32 {
        self.words += 1;
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.words += 2;
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.words += dst.len().div_ceil(4) as u64;
        self.rng.fill_bytes(dst)
    }
}

impl PartialEq for Random {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.words == other.words
    }
}

#[derive(Serialize, Deserialize)]
struct RandomState {
    seed: u64,
    words: u64,
}

impl Serialize for Random {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RandomState {
            seed: self.seed,
            words: self.words,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Random {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = RandomState::deserialize(deserializer)?;
        Ok(Self::replay(state.seed, state.words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Random::new(7);
        let mut b = Random::new(7);
        for _ in 0..100 {
            assert_eq!(a.random_range(0..1000), b.random_range(0..1000));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Random::new(1);
        let mut b = Random::new(2);
        let xs: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..16).map(|_| b.next_u32()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn replay_restores_position() {
        let mut original = Random::new(42);
        for _ in 0..37 {
            original.random::<f64>();
            original.random_range(0..17usize);
        }

        let mut restored = Random::replay(original.seed(), original.words());
        assert_eq!(restored, original);
        for _ in 0..20 {
            assert_eq!(restored.next_u64(), original.next_u64());
        }
    }
}
