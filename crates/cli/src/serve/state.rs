//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use hoi_workflow::AuthMode;
use tokio::sync::Mutex;

use crate::desk::Desk;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory fixed-window per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    pub(crate) max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Returns Err(retry_after_secs) if the IP is over its budget.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;

        // Drop stale windows so the map does not grow without bound.
        if tracker.len() > 10_000 {
            let window = self.window;
            tracker.retain(|_, (_, start)| now.duration_since(*start) < window);
        }

        let entry = tracker.entry(ip).or_insert((0, now));
        let elapsed = now.duration_since(entry.1);
        if elapsed >= self.window {
            *entry = (0, now);
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.1));
            Err(retry_after.as_secs().max(1))
        } else {
            Ok(())
        }
    }
}

/// Shared across request handlers.
pub(crate) struct AppState {
    pub(crate) desk: Desk,
    pub(crate) auth_mode: AuthMode,
    pub(crate) forms_dir: PathBuf,
    pub(crate) secure_cookies: bool,
    /// Guards code requests and login attempts.
    pub(crate) rate_limiter: RateLimiter,
}
