//! Slow-request notice for sign-in and sign-up forms.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::DEFAULT_SLOW_REQUEST_THRESHOLD;

pub const SLOW_REQUEST_MESSAGE: &str = "Request is taking too long. Please try again.";

/// Races a form submission against a threshold.
///
/// When the threshold passes first the `on_slow` callback fires once with
/// [`SLOW_REQUEST_MESSAGE`] and the submission keeps running to completion.
#[derive(Debug, Clone, Copy)]
pub struct AuthFormGuard {
    threshold: Duration,
}

impl Default for AuthFormGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_REQUEST_THRESHOLD)
    }
}

impl AuthFormGuard {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub async fn run<F, T>(&self, submission: F, on_slow: impl FnOnce(&'static str)) -> T
    where
        F: Future<Output = T>,
    {
        tokio::pin!(submission);

        tokio::select! {
            output = &mut submission => return output,
            _ = tokio::time::sleep(self.threshold) => {
                warn!(threshold_ms = self.threshold.as_millis() as u64, "Auth request is slow");
                on_slow(SLOW_REQUEST_MESSAGE);
            }
        }

        submission.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fast_submission_is_silent() {
        let notices = AtomicUsize::new(0);
        let guard = AuthFormGuard::default();

        let value = guard
            .run(async { 7 }, |_| {
                notices.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(value, 7);
        assert_eq!(notices.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_submission_notifies_then_completes() {
        let mut notice = None;
        let guard = AuthFormGuard::new(Duration::from_secs(15));

        let value = guard
            .run(
                async {
                    tokio::time::sleep(Duration::from_secs(20)).await;
                    "done"
                },
                |message| notice = Some(message),
            )
            .await;
        assert_eq!(value, "done");
        assert_eq!(notice, Some(SLOW_REQUEST_MESSAGE));
    }
}
