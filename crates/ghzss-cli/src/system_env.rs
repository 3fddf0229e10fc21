//! Production environment using system time and OS randomness.

use std::time::{Duration, Instant};

use ghzss_core::Environment;

/// Environment backed by the system clock and `getrandom`.
///
/// Only used to pick a session seed when none is given; everything inside a
/// session runs on the seeded simulation environment.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Should never happen on supported platforms. A zero seed is
            // still a valid, reproducible session.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }

    #[tokio::test]
    async fn sleep_waits() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;

        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
