//! Async-job queries.
//!
//! Access via `client.async_jobs()`.

use crate::client::{decode, Client};
use crate::error::Result;
use crate::params::ParameterSet;
use crate::poller::JobStatusSource;
use crate::types::AsyncJob;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Which job-status command to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobQuery {
    /// `queryAsyncJobResult`
    #[default]
    Standard,
    /// `queryExAsyncJobResult`, the provider's extended variant.
    Extended,
}

impl JobQuery {
    pub fn command(self) -> &'static str {
        match self {
            JobQuery::Standard => "queryAsyncJobResult",
            JobQuery::Extended => "queryExAsyncJobResult",
        }
    }
}

/// Client for async-job operations.
pub struct AsyncJobsClient {
    client: Client,
    query: JobQuery,
}

impl AsyncJobsClient {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            query: JobQuery::Standard,
        }
    }

    /// Poll with `queryExAsyncJobResult` instead.
    pub fn extended(mut self) -> Self {
        self.query = JobQuery::Extended;
        self
    }

    pub fn query(&self) -> JobQuery {
        self.query
    }

    /// Fetch the current status of a job once.
    pub async fn query_async_job_result(&self, job_id: &str) -> Result<AsyncJob> {
        self.fetch(JobQuery::Standard, job_id).await
    }

    /// Fetch the current status of a job once via the extended command.
    pub async fn query_ex_async_job_result(&self, job_id: &str) -> Result<AsyncJob> {
        self.fetch(JobQuery::Extended, job_id).await
    }

    /// Wait for a job to finish and return its raw `jobresult`.
    ///
    /// Useful for resuming a job after [`crate::KcpsError::AsyncTimeout`].
    /// The result is neither unwrapped nor normalized; see
    /// [`AsyncJobsClient::wait_for`] for that.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kcps::{Client, KcpsError};
    /// use std::time::Duration;
    ///
    /// # async fn resume(client: Client, err: KcpsError) -> kcps::Result<()> {
    /// if let Some(job_id) = err.pending_job_id() {
    ///     let result = client
    ///         .async_jobs()
    ///         .wait(job_id, Duration::from_secs(600))
    ///         .await?;
    ///     println!("job finished: {result}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait(&self, job_id: &str, timeout: Duration) -> Result<Value> {
        self.client.poller.wait(self, job_id, timeout).await
    }

    /// Wait for a job started by `command` and return its result the way a
    /// waiting client would: unwrapped from its entity key (when
    /// `unwrap_result` is set) and normalized with `command`'s fixups.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kcps::Client;
    /// use std::time::Duration;
    ///
    /// # async fn resume(client: Client, job_id: &str) -> kcps::Result<()> {
    /// let rule = client
    ///     .async_jobs()
    ///     .wait_for("createFirewallRule", job_id, Duration::from_secs(600), true)
    ///     .await?;
    /// println!("start port: {}", rule["startport"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for(
        &self,
        command: &str,
        job_id: &str,
        timeout: Duration,
        unwrap_result: bool,
    ) -> Result<Value> {
        let result = self.wait(job_id, timeout).await?;
        self.client.job_result(command, result, unwrap_result)
    }

    async fn fetch(&self, query: JobQuery, job_id: &str) -> Result<AsyncJob> {
        let mut params = ParameterSet::new();
        params.set("jobid", job_id);
        let payload = self.client.call_raw(query.command(), &params).await?;
        decode(payload)
    }
}

#[async_trait]
impl JobStatusSource for AsyncJobsClient {
    async fn job_status(&self, job_id: &str) -> Result<AsyncJob> {
        self.fetch(self.query, job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_commands() {
        assert_eq!(JobQuery::Standard.command(), "queryAsyncJobResult");
        assert_eq!(JobQuery::Extended.command(), "queryExAsyncJobResult");
    }

    #[test]
    fn test_extended_switch() {
        let client = Client::new("https://portal.example.com/client/api", "k", "s", true).unwrap();
        assert_eq!(client.async_jobs().query(), JobQuery::Standard);
        assert_eq!(client.async_jobs().extended().query(), JobQuery::Extended);
    }
}
