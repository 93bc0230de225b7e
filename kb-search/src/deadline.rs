//! Per-query time budget shared by every pipeline stage.

use std::time::Duration;

use tokio::time::Instant;

/// The point in time by which a query must finish.
///
/// A budget too large to represent as an [`Instant`] never expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self { expires_at: Instant::now().checked_add(budget) }
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let Some(expires_at) = self.expires_at else {
            return Some(Duration::MAX);
        };
        let left = expires_at.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// The time a stage may spend: its own timeout capped by what is left.
    pub fn budget(&self, stage_timeout: Duration) -> Option<Duration> {
        self.remaining().map(|left| left.min(stage_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn budget_is_capped_by_remaining_time() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert_eq!(deadline.budget(Duration::from_secs(2)), Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(deadline.budget(Duration::from_secs(2)), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.budget(Duration::from_secs(2)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_budget_never_expires() {
        let deadline = Deadline::after(Duration::from_secs(u64::MAX));
        assert!(!deadline.is_expired());
        assert_eq!(deadline.budget(Duration::from_secs(3)), Some(Duration::from_secs(3)));

        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert_eq!(deadline.remaining(), Some(Duration::MAX));
    }
}
