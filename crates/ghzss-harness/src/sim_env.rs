//! Seeded simulation environment.
//!
//! Time comes from the tokio clock, which is virtual both under a paused
//! runtime and inside turmoil. Randomness comes from a `ChaCha8Rng` seeded
//! explicitly, so a session replays bit-for-bit from its seed.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use ghzss_core::{Environment, derive_seed};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Simulation environment with a seeded RNG stream.
///
/// Clones share the same stream. Use [`SimEnv::fork`] for an independent one.
#[derive(Clone)]
pub struct SimEnv {
    seed: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }

    /// Seed of this stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent stream named `label`, derived from this stream's seed.
    ///
    /// Forking does not consume randomness, so the result depends only on the
    /// seed and the label, never on how much of this stream was used.
    #[must_use]
    pub fn fork(&self, label: &str) -> Self {
        Self::new(derive_seed(self.seed, label))
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A panic while holding the lock cannot leave a ChaCha state half
        // written, so a poisoned stream is still usable.
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
