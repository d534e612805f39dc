//! Retry of transient transport failures.
//!
//! Idle pooled connections are sometimes reset by the control plane's load
//! balancer. Those failures are retried after a random pause; every other
//! failure, API rejections included, is returned immediately.

use crate::error::KcpsError;
use rand::Rng;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default upper bound (exclusive) of the random pause between attempts.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(10);

/// Decides whether an error is worth another attempt.
pub type TransientClassifier = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// Errors that may carry a transport-level cause.
///
/// Only that cause is shown to the classifier, so server rejections can
/// never be retried.
pub trait TransportFailure {
    fn transport_cause(&self) -> Option<&(dyn StdError + 'static)>;
}

impl TransportFailure for KcpsError {
    fn transport_cause(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            KcpsError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl TransportFailure for io::Error {
    fn transport_cause(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self)
    }
}

/// Bounded retry with jittered delay.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    max_jitter: Duration,
    classifier: TransientClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_jitter: DEFAULT_MAX_JITTER,
            classifier: Arc::new(is_connection_reset),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("max_jitter", &self.max_jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Replace the transient-error classifier.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_transient(&self, err: &(dyn StdError + 'static)) -> bool {
        (self.classifier)(err)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent. The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        E: TransportFailure + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err)
                    if retries < self.max_retries
                        && err.transport_cause().is_some_and(|e| self.is_transient(e)) =>
                {
                    retries += 1;
                    let delay = self.jitter();
                    warn!(
                        error = %err,
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let nanos = u64::try_from(self.max_jitter.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
    }
}

/// Default classifier: a reset or aborted connection anywhere in the
/// error's source chain.
pub fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) {
                return true;
            }
        }
        let message = e.to_string().to_lowercase();
        if message.contains("connection reset") || message.contains("connection aborted") {
            return true;
        }
        current = e.source();
    }
    false
}
