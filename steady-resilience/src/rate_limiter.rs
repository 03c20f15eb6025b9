//! Dual sliding-window rate limiter
//!
//! Admissions are recorded as timestamps in two windows, one covering the
//! last minute and one the last hour. Windows are pruned lazily whenever
//! they are read.

use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use steady_config::RateLimitConfig;

/// Which sliding window a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Minute,
    Hour,
}

impl Window {
    /// Length of time an admission stays in this window
    pub fn span(&self) -> Duration {
        match self {
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(3600),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Window::Minute => write!(f, "minute"),
            Window::Hour => write!(f, "hour"),
        }
    }
}

/// A window is full; admission is possible after `retry_after`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit of {limit} requests per {window} reached, retry in {retry_after:?}")]
pub struct RateLimited {
    pub window: Window,
    pub limit: u32,
    pub retry_after: Duration,
}

/// Current usage of both windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitUsage {
    pub requests_last_minute: u32,
    pub requests_last_hour: u32,
    pub minute_limit: u32,
    pub hour_limit: u32,
}

#[derive(Debug, Default)]
struct Windows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl Windows {
    fn entries(&mut self, window: Window) -> &mut VecDeque<Instant> {
        match window {
            Window::Minute => &mut self.minute,
            Window::Hour => &mut self.hour,
        }
    }

    fn prune(&mut self, now: Instant) {
        for window in [Window::Minute, Window::Hour] {
            let entries = self.entries(window);
            while let Some(&oldest) = entries.front() {
                if now.saturating_duration_since(oldest) < window.span() {
                    break;
                }
                entries.pop_front();
            }
        }
    }

    /// Prune, then check both ceilings; the minute window is checked first
    fn check(&mut self, now: Instant, limits: &Limits) -> Result<(), RateLimited> {
        self.prune(now);

        for (window, limit) in [
            (Window::Minute, limits.per_minute),
            (Window::Hour, limits.per_hour),
        ] {
            let entries = self.entries(window);
            if entries.len() >= limit as usize {
                // Time until the oldest entry leaves the window, plus the buffer
                let age = entries
                    .front()
                    .map(|&oldest| now.saturating_duration_since(oldest))
                    .unwrap_or_else(|| window.span());
                return Err(RateLimited {
                    window,
                    limit,
                    retry_after: window.span().saturating_sub(age) + limits.buffer,
                });
            }
        }

        Ok(())
    }

    fn record(&mut self, now: Instant) {
        self.minute.push_back(now);
        self.hour.push_back(now);
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    per_minute: u32,
    per_hour: u32,
    buffer: Duration,
}

/// Sliding-window admission gate for one quota domain
///
/// Suspended callers queue on a fair async mutex, so admissions are handed
/// out one at a time in arrival order and concurrent callers cannot
/// overshoot the quota. The window state itself sits behind a short
/// synchronous lock that is never held across a suspension, so `usage()`
/// and `reset()` never wait on a sleeping caller. Cloning yields another
/// handle to the same windows.
#[derive(Clone)]
pub struct RateLimiter {
    limits: Limits,
    windows: Arc<Mutex<Windows>>,
    admission: Arc<tokio::sync::Mutex<()>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// Ceilings of zero are raised to one so that admission always
    /// terminates.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limits: Limits {
                per_minute: config.requests_per_minute.max(1),
                per_hour: config.requests_per_hour.max(1),
                buffer: config.wait_buffer,
            },
            windows: Arc::new(Mutex::new(Windows::default())),
            admission: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Wait until a request may proceed, then record it
    ///
    /// After each wait the windows are pruned and checked again rather than
    /// assuming the wait was long enough.
    pub async fn admit(&self) {
        let _turn = self.admission.lock().await;

        loop {
            let limited = {
                let mut windows = self.windows.lock();
                let now = Instant::now();
                match windows.check(now, &self.limits) {
                    Ok(()) => {
                        windows.record(now);
                        debug!(
                            "Request admitted ({} in last minute, {} in last hour)",
                            windows.minute.len(),
                            windows.hour.len()
                        );
                        return;
                    }
                    Err(limited) => limited,
                }
            };

            info!(
                "Rate limit reached ({} requests per {}), waiting {:?}",
                limited.limit, limited.window, limited.retry_after
            );
            sleep(limited.retry_after).await;
        }
    }

    /// Admit a request now or report which window is full
    ///
    /// Never suspends. Does not queue behind callers already waiting in
    /// [`admit`](Self::admit).
    pub fn try_admit(&self) -> Result<(), RateLimited> {
        let mut windows = self.windows.lock();
        let now = Instant::now();
        windows.check(now, &self.limits)?;
        windows.record(now);
        Ok(())
    }

    /// Admit, then run the operation
    pub async fn run<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.admit().await;
        operation().await
    }

    /// Requests recorded in each window and the configured ceilings
    pub fn usage(&self) -> RateLimitUsage {
        let mut windows = self.windows.lock();
        windows.prune(Instant::now());

        RateLimitUsage {
            requests_last_minute: windows.minute.len() as u32,
            requests_last_hour: windows.hour.len() as u32,
            minute_limit: self.limits.per_minute,
            hour_limit: self.limits.per_hour,
        }
    }

    /// Forget every recorded admission
    pub fn reset(&self) {
        let mut windows = self.windows.lock();
        windows.minute.clear();
        windows.hour.clear();
        debug!("Rate limiter windows cleared");
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits)
            .field("usage", &self.usage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, per_hour: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            wait_buffer: Duration::from_millis(100),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_without_waiting() {
        let limiter = limiter(5, 100);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.admit().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        let usage = limiter.usage();
        assert_eq!(usage.requests_last_minute, 5);
        assert_eq!(usage.requests_last_hour, 5);
        assert_eq!(usage.minute_limit, 5);
        assert_eq!(usage.hour_limit, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_to_leave_minute_window() {
        let limiter = limiter(2, 100);
        let start = Instant::now();

        limiter.admit().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.admit().await;

        limiter.admit().await;
        // Oldest admitted at t=0, so the third waits until t=60s plus buffer
        assert_eq!(start.elapsed(), Duration::from_millis(60_100));
        assert_eq!(limiter.usage().requests_last_minute, 2);
        assert_eq!(limiter.usage().requests_last_hour, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hour_window_limits_independently() {
        let limiter = limiter(10, 3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.admit().await;
        }
        let err = limiter.try_admit().unwrap_err();
        assert_eq!(err.window, Window::Hour);
        assert_eq!(err.limit, 3);
        assert_eq!(err.retry_after, Duration::from_millis(3_600_100));

        limiter.admit().await;
        assert_eq!(start.elapsed(), Duration::from_millis(3_600_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_admit_reports_minute_window() {
        let limiter = limiter(1, 10);
        assert!(limiter.try_admit().is_ok());

        tokio::time::advance(Duration::from_secs(15)).await;
        let err = limiter.try_admit().unwrap_err();
        assert_eq!(err.window, Window::Minute);
        assert_eq!(err.retry_after, Duration::from_millis(45_100));
        assert_eq!(limiter.usage().requests_last_minute, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_prune_lazily() {
        let limiter = limiter(5, 100);
        limiter.admit().await;
        limiter.admit().await;

        tokio::time::advance(Duration::from_secs(61)).await;
        let usage = limiter.usage();
        assert_eq!(usage.requests_last_minute, 0);
        assert_eq!(usage.requests_last_hour, 2);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(limiter.usage().requests_last_hour, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_windows() {
        let limiter = limiter(1, 1);
        limiter.admit().await;
        assert!(limiter.try_admit().is_err());

        limiter.reset();
        assert_eq!(limiter.usage().requests_last_minute, 0);
        assert!(limiter.try_admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_admits_before_operation() {
        let limiter = limiter(3, 10);
        let value = limiter.run(|| async { 42 }).await;
        assert_eq!(value, 42);
        assert_eq!(limiter.usage().requests_last_minute, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_do_not_overshoot() {
        let limiter = limiter(3, 100);
        let start = Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.admit().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        let immediate = admitted.iter().filter(|t| **t == start).count();
        assert_eq!(immediate, 3);
        for t in &admitted[3..] {
            assert!(t.duration_since(start) >= Window::Minute.span());
        }
        assert_eq!(limiter.usage().requests_last_minute, 3);
    }

    #[test]
    fn test_zero_limits_are_raised_to_one() {
        let limiter = limiter(0, 0);
        let usage = limiter.usage();
        assert_eq!(usage.minute_limit, 1);
        assert_eq!(usage.hour_limit, 1);
    }
}
