use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Time budget shared by every lookup made for one request.
///
/// Built on `tokio::time::Instant` so paused-clock tests drive it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    expires_at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            expires_at: started_at + budget,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Run `future` unless the deadline passes first; `None` on expiry.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        if self.is_expired() {
            return None;
        }
        tokio::time::timeout_at(self.expires_at, future).await.ok()
    }
}
