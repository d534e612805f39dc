//! Async-job completion.
//!
//! Mutating commands return a job id immediately and finish on the server
//! later. [`AsyncJobPoller`] queries the job until it succeeds, fails, or the
//! caller's wait budget runs out. The pause between queries grows by one
//! interval unit per pending observation and stays at 15 units after that.
//! The budget is only checked after a status response, never mid-sleep.

use crate::error::{KcpsError, Result};
use crate::types::{AsyncJob, JobResultKind, JobStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Largest pause between two status queries, in interval units.
pub const MAX_BACKOFF_STEPS: u32 = 15;

/// Anything that can report the current state of a job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<AsyncJob>;
}

/// Linear pause schedule: 1, 2, ..., 15, 15, ... units.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    unit: Duration,
    steps: u32,
}

impl PollBackoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit, steps: 0 }
    }

    /// Pause to take after another pending observation.
    pub fn next_delay(&mut self) -> Duration {
        if self.steps < MAX_BACKOFF_STEPS {
            self.steps += 1;
        }
        self.unit * self.steps
    }
}

/// Drives a job to a terminal state.
#[derive(Debug, Clone)]
pub struct AsyncJobPoller {
    interval: Duration,
}

impl Default for AsyncJobPoller {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl AsyncJobPoller {
    /// `interval` is the backoff unit; production cadence uses one second.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job_id` until it finishes or `timeout` has elapsed.
    ///
    /// On success the raw `jobresult` is returned, still wrapped in its
    /// envelope. On timeout the job is left running and
    /// [`KcpsError::AsyncTimeout`] is returned with an empty `initial`.
    pub async fn wait<S>(&self, source: &S, job_id: &str, timeout: Duration) -> Result<Value>
    where
        S: JobStatusSource + ?Sized,
    {
        let started = Instant::now();
        let mut backoff = PollBackoff::new(self.interval);
        let mut polls: u32 = 0;

        loop {
            let job = source.job_status(job_id).await?;
            polls += 1;

            match job.status {
                JobStatus::Success => {
                    info!(job_id, polls, "async job finished");
                    return Ok(job.result);
                }
                JobStatus::Failed => {
                    info!(job_id, polls, "async job failed");
                    return Err(job_failure(job));
                }
                JobStatus::Pending => {}
            }

            if started.elapsed() > timeout {
                debug!(job_id, polls, "gave up waiting for async job");
                return Err(KcpsError::AsyncTimeout {
                    job_id: job_id.to_string(),
                    initial: Box::new(Value::Null),
                });
            }

            let delay = backoff.next_delay();
            debug!(job_id, polls, delay_ms = delay.as_millis() as u64, "async job pending");
            tokio::time::sleep(delay).await;
        }
    }
}

fn job_failure(job: AsyncJob) -> KcpsError {
    match (job.result_kind, job.result) {
        (JobResultKind::Text, Value::String(text)) => KcpsError::AsyncJobFailed(text),
        (JobResultKind::Text, other) => KcpsError::AsyncJobFailed(other.to_string()),
        (_, other) => KcpsError::AsyncJobUndefined(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed list of jobs; the last one repeats forever.
    struct Scripted {
        jobs: Mutex<VecDeque<AsyncJob>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(jobs: Vec<AsyncJob>) -> Self {
            Self {
                jobs: Mutex::new(jobs.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobStatusSource for Scripted {
        async fn job_status(&self, _job_id: &str) -> Result<AsyncJob> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.len() > 1 {
                Ok(jobs.pop_front().unwrap())
            } else {
                Ok(jobs.front().cloned().unwrap())
            }
        }
    }

    fn job(status: i64, kind: &str, result: Value) -> AsyncJob {
        serde_json::from_value(json!({
            "jobid": "job-1",
            "jobstatus": status,
            "jobresulttype": kind,
            "jobresult": result
        }))
        .unwrap()
    }

    fn pending() -> AsyncJob {
        job(0, "object", Value::Null)
    }

    fn fast_poller() -> AsyncJobPoller {
        AsyncJobPoller::new(Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_ramps_then_caps() {
        let mut backoff = PollBackoff::new(Duration::from_secs(1));
        let delays: Vec<u64> = (0..18).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(
            delays,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 15, 15, 15]
        );
    }

    #[tokio::test]
    async fn test_success_after_pending() {
        let result = json!({"virtualmachine": {"id": "vm-1"}});
        let source = Scripted::new(vec![
            pending(),
            pending(),
            pending(),
            job(1, "object", result.clone()),
        ]);

        let out = fast_poller()
            .wait(&source, "job-1", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(out, result);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failed_with_text() {
        let source = Scripted::new(vec![pending(), job(2, "text", json!("disk offering not found"))]);

        let err = fast_poller()
            .wait(&source, "job-1", Duration::from_secs(30))
            .await
            .unwrap_err();

        match err {
            KcpsError::AsyncJobFailed(text) => assert_eq!(text, "disk offering not found"),
            other => panic!("expected AsyncJobFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_with_object_is_undefined_error() {
        let source = Scripted::new(vec![job(
            2,
            "object",
            json!({"errorcode": 530, "errortext": "failed"}),
        )]);

        let err = fast_poller()
            .wait(&source, "job-1", Duration::from_secs(30))
            .await
            .unwrap_err();

        assert!(matches!(err, KcpsError::AsyncJobUndefined(_)));
        assert!(err.to_string().starts_with("Undefined error: "));
        assert!(err.to_string().contains("530"));
    }

    #[tokio::test]
    async fn test_never_finishing_job_times_out() {
        let source = Scripted::new(vec![pending()]);

        let err = fast_poller()
            .wait(&source, "job-1", Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(err.is_async_timeout());
        assert_eq!(err.pending_job_id(), Some("job-1"));
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_terminal_status_wins_over_expired_budget() {
        let source = Scripted::new(vec![job(1, "object", json!({"success": true}))]);

        let out = fast_poller()
            .wait(&source, "job-1", Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(out, json!({"success": true}));
    }
}
