//! # Retrying Query Executor
//!
//! Capped exponential backoff around read-only calls, with an early exit for
//! failures the classifier marks permanent.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::classifier::ErrorClassifier;
use crate::config::AgentConfig;
use crate::domain::{AgentError, TransportFailure};

/// Retry ceiling and base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy from agent configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_retries: config.max_query_retries,
            base_delay: config.retry_base_delay(),
        }
    }

    /// `base_delay * 2^retry`, saturating.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs read-only calls with classification and backoff.
#[derive(Clone)]
pub struct RetryingQueryExecutor {
    policy: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryingQueryExecutor {
    /// New executor.
    pub fn new(policy: RetryPolicy, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { policy, classifier }
    }

    /// Active policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Invoke `call`, map the success with `mapper`, retrying retryable errors.
    ///
    /// Transport failures are classified first. Errors returned by `mapper`
    /// are already classified and follow the same retry rule. `args` is only
    /// used for logging.
    pub async fn query<T, R, F, Fut, M>(
        &self,
        args: &(dyn fmt::Display + Sync),
        mut call: F,
        mapper: M,
    ) -> Result<R, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportFailure>>,
        M: Fn(T) -> Result<R, AgentError>,
    {
        let mut retry: u32 = 0;
        loop {
            let error = match call().await {
                Ok(response) => match mapper(response) {
                    Ok(mapped) => return Ok(mapped),
                    Err(e) => e,
                },
                Err(failure) => self.classifier.classify(&failure),
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if retry >= self.policy.max_retries {
                warn!(
                    attempts = retry + 1,
                    error = %error,
                    "[oc-01] Query retries exhausted"
                );
                return Err(error);
            }

            let delay = self.policy.delay_for(retry);
            debug!(
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                args = %args,
                error = %error,
                "[oc-01] Retrying query"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
