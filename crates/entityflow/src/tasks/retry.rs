use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use entityflow_core::pipeline::DependencyError;

use super::Job;

/// Retry schedule for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// A single attempt with no waiting.
    pub fn once(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            attempt_timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs a job until it succeeds or the policy gives up.
pub async fn run_with_retry(job: &dyn Job, policy: &RetryPolicy) -> Result<(), DependencyError> {
    let ctx = job.context();
    let max_attempts = policy.max_attempts.max(1);
    let mut last_cause = String::new();

    for attempt in 1..=max_attempts {
        match tokio::time::timeout(policy.attempt_timeout, job.run()).await {
            Ok(Ok(())) => {
                if attempt > 1 {
                    tracing::debug!(
                        step = %ctx.step,
                        entity_type = %ctx.entity_type,
                        entity_id = %ctx.entity_id,
                        attempt,
                        "Post-commit step succeeded after retry"
                    );
                }
                return Ok(());
            }
            Ok(Err(cause)) => last_cause = cause,
            Err(_) => {
                last_cause = format!(
                    "attempt timed out after {}ms",
                    policy.attempt_timeout.as_millis()
                );
            }
        }

        if attempt < max_attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                step = %ctx.step,
                entity_type = %ctx.entity_type,
                entity_id = %ctx.entity_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_cause,
                "Post-commit step failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    tracing::error!(
        step = %ctx.step,
        entity_type = %ctx.entity_type,
        entity_id = %ctx.entity_id,
        attempts = max_attempts,
        error = %last_cause,
        "Post-commit step exhausted its retries"
    );
    Err(ctx.failure(last_cause))
}

/// How post-commit work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostCommitMode {
    /// Handed to the task queue; the command returns without waiting.
    #[default]
    Background,
    /// Awaited in place with the same retry policy.
    Inline,
}

impl fmt::Display for PostCommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => f.write_str("background"),
            Self::Inline => f.write_str("inline"),
        }
    }
}

impl FromStr for PostCommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "inline" => Ok(Self::Inline),
            other => Err(format!("invalid post-commit mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use entityflow_core::pipeline::{Step, Verb};
    use entityflow_core::record::{EntityId, EntityType};

    use super::*;
    use crate::tasks::JobContext;

    struct FlakyJob {
        ctx: JobContext,
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyJob {
        fn new(failures: u32) -> Self {
            Self {
                ctx: JobContext::new(
                    Step::Reindex,
                    EntityType::new("store"),
                    EntityId::new("s1"),
                    Verb::Update,
                ),
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Job for FlakyJob {
        fn context(&self) -> &JobContext {
            &self.ctx
        }

        async fn run(&self) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(format!("failure {call}"))
            } else {
                Ok(())
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(64), Duration::from_millis(500));
    }

    #[test]
    fn test_post_commit_mode_parse() {
        assert_eq!("Inline".parse::<PostCommitMode>().unwrap(), PostCommitMode::Inline);
        assert_eq!(PostCommitMode::Background.to_string(), "background");
        assert!("later".parse::<PostCommitMode>().is_err());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let job = FlakyJob::new(2);
        assert!(run_with_retry(&job, &fast_policy(3)).await.is_ok());
        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_cause() {
        let job = FlakyJob::new(5);
        let err = run_with_retry(&job, &fast_policy(2)).await.unwrap_err();
        assert_eq!(job.calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.step, Step::Reindex);
        assert_eq!(err.entity_id, EntityId::new("s1"));
        assert_eq!(err.cause, "failure 2");
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let job = FlakyJob::new(0);
        assert!(run_with_retry(&job, &fast_policy(0)).await.is_ok());
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
    }

    struct StuckJob(JobContext);

    #[async_trait]
    impl Job for StuckJob {
        fn context(&self) -> &JobContext {
            &self.0
        }

        async fn run(&self) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let job = StuckJob(JobContext::new(
            Step::PublishEvent,
            EntityType::new("store"),
            EntityId::new("s1"),
            Verb::Create,
        ));
        let policy = RetryPolicy::once(Duration::from_millis(10));
        let err = run_with_retry(&job, &policy).await.unwrap_err();
        assert_eq!(err.cause, "attempt timed out after 10ms");
    }
}
