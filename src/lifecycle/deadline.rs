//! Deadline-bounded context handed to shutdown procedures and hooks.

use std::time::Duration;
use tokio::time::Instant;

/// A point in time by which a shutdown step must complete.
///
/// Every shutdown procedure and hook receives one. The orchestrator enforces
/// it regardless of whether the unit honors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn after(budget: Duration) -> Self {
        Self::at(Instant::now() + budget)
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Resolves when the deadline is reached.
    pub async fn elapsed(&self) {
        tokio::time::sleep_until(self.at).await
    }

    /// This deadline, or `now + grace` if less than `grace` is left.
    ///
    /// Used to give cleanup at least one attempt after the global budget ran out.
    pub fn or_grace(&self, grace: Duration) -> Self {
        let floor = Instant::now() + grace;
        Self::at(self.at.max(floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(2));
        assert_eq!(deadline.remaining(), Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(deadline.remaining(), Duration::from_millis(500));
        assert!(!deadline.is_expired());

        deadline.elapsed().await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_extends_expired_deadline() {
        let deadline = Deadline::after(Duration::from_millis(10));
        tokio::time::advance(Duration::from_secs(1)).await;

        let extended = deadline.or_grace(Duration::from_millis(100));
        assert_eq!(extended.remaining(), Duration::from_millis(100));

        let fresh = Deadline::after(Duration::from_secs(5));
        assert_eq!(fresh.or_grace(Duration::from_millis(100)), fresh);
    }
}
