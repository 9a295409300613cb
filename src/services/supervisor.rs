use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::errors::TaskError;

/// Backoff tuning for one supervised restart loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// A run that survives at least this long counts as healthy: the next
    /// failure starts over from the base delay.
    pub reset_after: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, reset_after: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            reset_after,
        }
    }

    /// Binary exponential backoff capped at max_delay, reset to base after a
    /// sustained healthy run.
    pub fn next_delay(&self, previous: Duration, run_elapsed: Duration) -> Duration {
        if run_elapsed >= self.reset_after {
            self.base_delay
        } else if previous.is_zero() {
            self.base_delay
        } else {
            (previous * 2).min(self.max_delay)
        }
    }
}

/// Run a restartable unit of work forever. Failures restart the unit after
/// the policy's backoff; clean completions restart immediately with the
/// delay reset; cancellation is the one signal that propagates out instead
/// of being retried.
pub async fn run_with_retry<F, Fut>(name: &str, policy: RetryPolicy, mut task: F) -> TaskError
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), TaskError>>,
{
    let mut delay = Duration::ZERO;

    loop {
        let started = Instant::now();
        match task().await {
            Ok(()) => {
                delay = Duration::ZERO;
                tracing::warn!(task = name, "Supervised task completed - restarting");
            }
            Err(TaskError::Cancelled) => {
                tracing::info!(task = name, "Supervised task cancelled - stopping");
                return TaskError::Cancelled;
            }
            Err(TaskError::Failed(e)) => {
                delay = policy.next_delay(delay, started.elapsed());
                tracing::error!(
                    task = name,
                    error = %e,
                    delay_secs = delay.as_secs_f64(),
                    "Supervised task failed - restarting after backoff"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_next_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(secs(1), secs(4), secs(10));

        // Fresh loop: zero previous delay starts at base
        assert_eq!(policy.next_delay(Duration::ZERO, secs(0)), secs(1));
        assert_eq!(policy.next_delay(secs(1), secs(0)), secs(2));
        assert_eq!(policy.next_delay(secs(2), secs(0)), secs(4));
        // Capped at max
        assert_eq!(policy.next_delay(secs(4), secs(0)), secs(4));
    }

    #[test]
    fn test_next_delay_resets_after_healthy_run() {
        let policy = RetryPolicy::new(secs(1), secs(4), secs(5));
        assert_eq!(policy.next_delay(secs(4), secs(6)), secs(1));
        // Exactly at the threshold also resets
        assert_eq!(policy.next_delay(secs(4), secs(5)), secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sequence_on_fast_failures() {
        let policy = RetryPolicy::new(secs(1), secs(4), secs(10));
        let attempts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());

        let outcome = run_with_retry("test-task", policy, || {
            let n = {
                let mut a = attempts.lock().unwrap();
                a.push(Instant::now());
                a.len()
            };
            async move {
                if n <= 3 {
                    Err(TaskError::Failed(anyhow::anyhow!("boom")))
                } else {
                    Err(TaskError::Cancelled)
                }
            }
        })
        .await;

        assert!(matches!(outcome, TaskError::Cancelled));

        // Each failing run is instant, so the gap between attempts is the
        // chosen backoff delay: 1, 2, 4.
        let starts = attempts.into_inner().unwrap();
        let gaps: Vec<u64> = starts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_after_long_run() {
        let policy = RetryPolicy::new(secs(1), secs(4), secs(5));
        let attempts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());

        let outcome = run_with_retry("test-task", policy, || {
            let n = {
                let mut a = attempts.lock().unwrap();
                a.push(Instant::now());
                a.len()
            };
            async move {
                match n {
                    1 | 2 => Err(TaskError::Failed(anyhow::anyhow!("fast fail"))),
                    3 => {
                        // Survive past the reset threshold, then fail
                        sleep(secs(6)).await;
                        Err(TaskError::Failed(anyhow::anyhow!("late fail")))
                    }
                    _ => Err(TaskError::Cancelled),
                }
            }
        })
        .await;

        assert!(matches!(outcome, TaskError::Cancelled));

        let starts = attempts.into_inner().unwrap();
        let gaps: Vec<u64> = starts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        // Delays are 1, 2, then back to 1; the third gap includes the 6s the
        // run itself lasted.
        assert_eq!(gaps, vec![1, 2, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_completion_resets_delay() {
        let policy = RetryPolicy::new(secs(1), secs(4), secs(10));
        let attempts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());

        run_with_retry("test-task", policy, || {
            let n = {
                let mut a = attempts.lock().unwrap();
                a.push(Instant::now());
                a.len()
            };
            async move {
                match n {
                    1 | 2 => Err(TaskError::Failed(anyhow::anyhow!("fail"))),
                    3 => Ok(()),
                    4 => Err(TaskError::Failed(anyhow::anyhow!("fail again"))),
                    _ => Err(TaskError::Cancelled),
                }
            }
        })
        .await;

        let starts = attempts.into_inner().unwrap();
        let gaps: Vec<u64> = starts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        // 1, 2 while failing; clean completion restarts immediately; the
        // following failure backs off from base again.
        assert_eq!(gaps, vec![1, 2, 0, 1]);
    }
}
