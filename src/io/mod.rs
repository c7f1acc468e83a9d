//! I/O Abstractions
//!
//! Randomness is the only ambient resource the sorted-set layer consumes
//! directly (fault injection and simulation workloads). Everything else goes
//! through the `DocumentStore` trait in `crate::store`.
//!
//! Two implementations of [`Rng`]:
//! - [`production::ProductionRng`]: OS-seeded, non-deterministic
//! - [`simulation::SimulatedRng`]: seeded ChaCha8 for reproducible DST runs

pub mod simulation;

pub use simulation::SimulatedRng;

/// Source of randomness used by fault injection and simulation harnesses
pub trait Rng: Send + 'static {
    /// Next raw 64-bit value
    fn next_u64(&mut self) -> u64;

    /// True with the given probability (clamped to [0, 1])
    fn gen_bool(&mut self, probability: f64) -> bool;

    /// Uniform value in `[min, max)`. Returns `min` when the range is empty.
    fn gen_range(&mut self, min: u64, max: u64) -> u64;
}

pub mod production {
    use super::Rng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Non-deterministic RNG for production paths
    pub struct ProductionRng {
        inner: StdRng,
    }

    impl ProductionRng {
        pub fn new() -> Self {
            ProductionRng {
                inner: StdRng::from_entropy(),
            }
        }
    }

    impl Default for ProductionRng {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Rng for ProductionRng {
        fn next_u64(&mut self) -> u64 {
            use rand::RngCore;
            self.inner.next_u64()
        }

        fn gen_bool(&mut self, probability: f64) -> bool {
            use rand::Rng as _;
            self.inner.gen_bool(probability.clamp(0.0, 1.0))
        }

        fn gen_range(&mut self, min: u64, max: u64) -> u64 {
            use rand::Rng as _;
            if min >= max {
                return min;
            }
            self.inner.gen_range(min..max)
        }
    }
}
