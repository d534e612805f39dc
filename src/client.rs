//! KCPS API client.
//!
//! The main entry point: signs, sends, retries and normalizes every
//! command, and waits for async jobs when configured to.

use crate::envelope;
use crate::error::{KcpsError, Result};
use crate::jobs::AsyncJobsClient;
use crate::normalize::Normalizer;
use crate::params::ParameterSet;
use crate::poller::AsyncJobPoller;
use crate::retry::RetryPolicy;
use crate::signer::Credentials;
use crate::transport::Transport;
use crate::types::JobAccepted;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ASYNC_TIMEOUT_SECS: u64 = 300;

/// A remote command as seen by the client.
///
/// Parameter builders implement this so [`Client::call`] can sign, send and
/// decode them without knowing anything else about the command.
///
/// # Example
///
/// ```rust
/// use kcps::{Command, ParameterSet};
/// use serde::Deserialize;
///
/// struct ListZones {
///     keyword: Option<String>,
/// }
///
/// #[derive(Deserialize)]
/// struct ListZonesResponse {
///     #[serde(default)]
///     count: u32,
/// }
///
/// impl Command for ListZones {
///     const NAME: &'static str = "listZones";
///     type Response = ListZonesResponse;
///
///     fn params(&self) -> ParameterSet {
///         let mut p = ParameterSet::new();
///         if let Some(k) = &self.keyword {
///             p.set("keyword", k.as_str());
///         }
///         p
///     }
/// }
/// ```
pub trait Command {
    /// Command name sent as the `command` parameter.
    const NAME: &'static str;
    /// Whether the server answers with a job id instead of the result.
    const IS_ASYNC: bool = false;
    /// Whether the finished job's result is wrapped in an entity key
    /// (`{"volume": {...}}`) that must be removed before decoding.
    const UNWRAP_JOB_RESULT: bool = true;

    type Response: DeserializeOwned;

    fn params(&self) -> ParameterSet;
}

/// KCPS API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the
/// immutable credentials.
///
/// # Example
///
/// ```rust,no_run
/// use kcps::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new_async(
///         "https://portal.example.com/client/api",
///         "api-key",
///         "secret-key",
///         true,
///     )?;
///
///     let mut params = kcps::ParameterSet::new();
///     params.set("available", "true");
///     let zones = client.call_raw("listZones", &params).await?;
///     println!("{zones}");
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) transport: Transport,
    pub(crate) retry: RetryPolicy,
    pub(crate) normalizer: Arc<Normalizer>,
    pub(crate) poller: AsyncJobPoller,
    async_wait: bool,
    async_timeout: Duration,
}

/// Configuration options for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overall per-request timeout (default: 60 seconds).
    pub timeout: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Verify the server's TLS certificate (default: true).
    pub verify_ssl: bool,
    /// Wait for async jobs to finish before returning (default: false).
    pub async_wait: bool,
    /// How long to wait for an async job (default: 300 seconds).
    pub async_timeout: Option<Duration>,
    /// Never use POST, even for commands that normally need it.
    pub http_get_only: bool,
    /// Retry policy for transient transport failures.
    pub retry: RetryPolicy,
    /// Backoff unit of the async-job poller (default: 1 second).
    pub poll_interval: Option<Duration>,
    /// Response fixup table.
    pub normalizer: Normalizer,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: None,
            verify_ssl: true,
            async_wait: false,
            async_timeout: None,
            http_get_only: false,
            retry: RetryPolicy::default(),
            poll_interval: None,
            normalizer: Normalizer::default(),
        }
    }
}

impl Client {
    /// Create a client that returns job ids for async commands instead of
    /// waiting for them.
    ///
    /// Set `verify_ssl` to false for endpoints with self-signed
    /// certificates.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl AsRef<[u8]>,
        verify_ssl: bool,
    ) -> Result<Self> {
        Self::with_config(
            base_url,
            Credentials::new(api_key, secret),
            ClientConfig {
                verify_ssl,
                ..Default::default()
            },
        )
    }

    /// Create a client that waits for async commands to finish.
    ///
    /// When the wait budget runs out the call fails with
    /// [`KcpsError::AsyncTimeout`], which still carries the job id.
    pub fn new_async(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl AsRef<[u8]>,
        verify_ssl: bool,
    ) -> Result<Self> {
        Self::with_config(
            base_url,
            Credentials::new(api_key, secret),
            ClientConfig {
                verify_ssl,
                async_wait: true,
                ..Default::default()
            },
        )
    }

    /// Create a client with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kcps::{Client, ClientConfig, Credentials};
    /// use std::time::Duration;
    ///
    /// let client = Client::with_config(
    ///     "https://portal.example.com/client/api",
    ///     Credentials::new("api-key", "secret-key"),
    ///     ClientConfig {
    ///         async_wait: true,
    ///         async_timeout: Some(Duration::from_secs(600)),
    ///         ..Default::default()
    ///     },
    /// ).unwrap();
    /// ```
    pub fn with_config(
        base_url: impl Into<String>,
        credentials: Credentials,
        config: ClientConfig,
    ) -> Result<Self> {
        let timeout = config
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let user_agent = config
            .user_agent
            .unwrap_or_else(|| format!("kcps-rust/{}", env!("CARGO_PKG_VERSION")));

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| KcpsError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            transport: Transport::new(http, base_url, credentials, config.http_get_only),
            retry: config.retry,
            normalizer: Arc::new(config.normalizer),
            poller: AsyncJobPoller::new(config.poll_interval.unwrap_or(Duration::from_secs(1))),
            async_wait: config.async_wait,
            async_timeout: config
                .async_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_ASYNC_TIMEOUT_SECS)),
        })
    }

    /// A copy of this client with a different async-job wait budget.
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Get the base URL for the API.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Get the API key this client signs with.
    pub fn api_key(&self) -> &str {
        self.transport.credentials().api_key()
    }

    /// Whether async commands are waited for.
    pub fn is_async(&self) -> bool {
        self.async_wait
    }

    /// Get the wait budget for async jobs.
    pub fn async_timeout(&self) -> Duration {
        self.async_timeout
    }

    /// Get the client for async-job queries.
    pub fn async_jobs(&self) -> AsyncJobsClient {
        AsyncJobsClient::new(self.clone())
    }

    /// Send `command` and return its normalized payload.
    ///
    /// Transient connection resets are retried; nothing else is.
    pub async fn call_raw(&self, command: &str, params: &ParameterSet) -> Result<Value> {
        let payload = self
            .retry
            .run(|| self.transport.send(command, params))
            .await?;
        self.normalizer.normalize(command, payload)
    }

    /// Send an async command and, on a waiting client, wait for its job.
    ///
    /// A non-waiting client returns the job acknowledgement as is.
    pub async fn call_async_raw(
        &self,
        command: &str,
        params: &ParameterSet,
        unwrap_result: bool,
    ) -> Result<Value> {
        let initial = self.call_raw(command, params).await?;
        if !self.async_wait {
            return Ok(initial);
        }
        self.finish_job(command, initial, unwrap_result).await
    }

    /// Run a typed command.
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Response> {
        let params = command.params();
        let payload = if C::IS_ASYNC {
            self.call_async_raw(C::NAME, &params, C::UNWRAP_JOB_RESULT)
                .await?
        } else {
            self.call_raw(C::NAME, &params).await?
        };
        decode(payload)
    }

    /// Wait for the job started by `command` and merge its result over the
    /// acknowledgement.
    async fn finish_job(&self, command: &str, initial: Value, unwrap_result: bool) -> Result<Value> {
        let accepted: JobAccepted = serde_json::from_value(initial.clone()).map_err(|e| {
            KcpsError::Decode(format!("{command}: response carries no job id: {e}"))
        })?;
        debug!(command, job_id = %accepted.jobid, "waiting for async job");

        let result = match self
            .poller
            .wait(&self.async_jobs(), &accepted.jobid, self.async_timeout)
            .await
        {
            Ok(result) => result,
            Err(KcpsError::AsyncTimeout { job_id, .. }) => {
                return Err(KcpsError::AsyncTimeout {
                    job_id,
                    initial: Box::new(initial),
                });
            }
            Err(e) => return Err(e),
        };

        let result = self.job_result(command, result, unwrap_result)?;
        Ok(merge(initial, result))
    }

    /// Unwrap (optionally) and normalize a finished job's `jobresult`.
    pub(crate) fn job_result(
        &self,
        command: &str,
        result: Value,
        unwrap_result: bool,
    ) -> Result<Value> {
        let result = if unwrap_result {
            envelope::unwrap(result)?
        } else {
            result
        };
        self.normalizer.normalize(command, result)
    }
}

/// Overlay `result` on `initial`, keeping fields (such as `jobid`) only the
/// acknowledgement has.
fn merge(initial: Value, result: Value) -> Value {
    match (initial, result) {
        (Value::Object(base), Value::Object(mut over)) => {
            for (k, v) in base {
                over.entry(k).or_insert(v);
            }
            Value::Object(over)
        }
        (_, result) => result,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(KcpsError::decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://portal.example.com/client/api";

    #[test]
    fn test_client_new() {
        let client = Client::new(URL, "key", "secret", true).unwrap();
        assert_eq!(client.base_url(), URL);
        assert_eq!(client.api_key(), "key");
        assert!(!client.is_async());
        assert_eq!(client.async_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_client_new_async() {
        let client = Client::new_async(URL, "key", "secret", false).unwrap();
        assert!(client.is_async());
    }

    #[test]
    fn test_with_async_timeout() {
        let client = Client::new_async(URL, "key", "secret", true)
            .unwrap()
            .with_async_timeout(Duration::from_secs(30));
        assert_eq!(client.async_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.verify_ssl);
        assert!(!config.async_wait);
        assert!(!config.http_get_only);
        assert!(config.timeout.is_none());
        assert_eq!(config.retry.max_retries(), 5);
    }

    #[test]
    fn test_merge_keeps_job_id() {
        let merged = merge(
            json!({"jobid": "j1", "id": "v1"}),
            json!({"id": "v1", "name": "data-1"}),
        );
        assert_eq!(merged, json!({"jobid": "j1", "id": "v1", "name": "data-1"}));
    }

    #[test]
    fn test_merge_non_object_result() {
        assert_eq!(merge(json!({"jobid": "j1"}), json!(true)), json!(true));
    }
}
