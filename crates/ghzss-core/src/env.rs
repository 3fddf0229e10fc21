//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system resources
//! (time, randomness). Every random choice a party makes, its basis in
//! particular, is drawn through this trait so a simulation can be replayed
//! bit-for-bit from a seed.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

use ghzss_proto::Basis;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. RNG quality: `random_bytes()` uses OS entropy in production
/// 3. Reproducibility: simulation implementations are seeded and the seed is
///    logged
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps; the round state machine never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Uniform float in `[0, 1)` built from the top 53 bits of a `u64`.
    #[allow(clippy::cast_precision_loss)]
    fn random_unit(&self) -> f64 {
        (self.random_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniformly random measurement basis.
    fn random_basis(&self) -> Basis {
        if self.random_u64() & 1 == 0 { Basis::X } else { Basis::Y }
    }
}

/// Derive an independent seed for a named stream from a session seed.
///
/// FNV-1a over the label, folded into the base and finished with SplitMix64
/// so nearby bases and similar labels give unrelated streams.
pub fn derive_seed(base: u64, label: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in label.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    let mut z = base ^ hash;
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
