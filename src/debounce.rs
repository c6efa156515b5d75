//! Reusable debounce primitive.
//!
//! Both the auto-save controller and the selection emitter delay work until a
//! quiet period elapses after the last triggering signal; [`Debouncer`] is
//! that shared mechanism. It holds at most one pending value (last write
//! wins) and exposes the expiry as an awaitable suitable for `tokio::select!`
//! loops.

use std::future::pending;
use tokio::time::{Duration, Instant, sleep_until};

/// Holds the latest pushed value until a quiet window elapses.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    slot: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: None,
            deadline: None,
        }
    }

    /// (Re)start the window with a new value. Only the most recent value
    /// survives until the window expires.
    pub fn push(&mut self, value: T) {
        self.slot = Some(value);
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Take the pending value and cancel the timer.
    pub fn take(&mut self) -> Option<T> {
        self.deadline = None;
        self.slot.take()
    }

    /// Whether a value is waiting for its window to expire.
    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    /// Resolves when the current window expires. Pending forever while the
    /// debouncer is idle, so it is safe as an always-enabled select branch.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn fires_after_quiet_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(20));
        debouncer.push("a");

        debouncer.expired().await;
        assert_eq!(debouncer.take(), Some("a"));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn push_keeps_only_latest_value() {
        let mut debouncer = Debouncer::new(Duration::from_millis(20));
        debouncer.push(1);
        debouncer.push(2);
        debouncer.push(3);

        debouncer.expired().await;
        assert_eq!(debouncer.take(), Some(3));
    }

    #[tokio::test]
    async fn push_restarts_the_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(60));
        debouncer.push("a");
        tokio::time::sleep(Duration::from_millis(30)).await;
        debouncer.push("b");

        // Shortly after the original deadline the restarted window must not
        // have expired yet.
        let raced = tokio::time::timeout(Duration::from_millis(10), debouncer.expired()).await;
        assert!(raced.is_err(), "window should have been restarted");

        debouncer.expired().await;
        assert_eq!(debouncer.take(), Some("b"));
    }

    #[tokio::test]
    async fn idle_debouncer_never_expires() {
        let debouncer: Debouncer<()> = Debouncer::new(Duration::from_millis(5));
        let raced = tokio::time::timeout(Duration::from_millis(30), debouncer.expired()).await;
        assert!(raced.is_err(), "idle debouncer must not expire");
    }

    #[tokio::test]
    async fn take_cancels_the_timer() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.push("a");
        assert_eq!(debouncer.take(), Some("a"));

        let raced = tokio::time::timeout(Duration::from_millis(40), debouncer.expired()).await;
        assert!(raced.is_err(), "taken debouncer must not expire");
    }
}
