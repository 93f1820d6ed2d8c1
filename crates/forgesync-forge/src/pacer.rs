//! Fixed-delay gate between mutating forge calls.

use std::time::Duration;

/// Delay applied after every mutating call in live mode.
pub const PACE_DELAY: Duration = Duration::from_millis(100);

/// Stateless post-mutation pacer.
///
/// The adapter calls [`Pacer::pace`] after each mutating request,
/// successful or not, so consecutive mutations never hit the forge
/// faster than the delay allows. Dry runs never reach the adapter and
/// are therefore never paced.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Pacer { delay: PACE_DELAY }
    }
}

impl Pacer {
    /// Pacer with a custom delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Pacer { delay }
    }

    /// Sleep for the configured delay.
    pub async fn pace(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_is_100ms() {
        assert_eq!(Pacer::default().delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn pace_sleeps_for_the_configured_delay() {
        let pacer = Pacer::new(Duration::from_millis(20));
        let before = std::time::Instant::now();
        pacer.pace().await;
        assert!(before.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn zero_delay_does_not_sleep() {
        let pacer = Pacer::new(Duration::ZERO);
        pacer.pace().await;
    }
}
