//! # Canister Agent Service
//!
//! Remote call client. Queries run through the retrying executor; update
//! calls are submitted once and resolved from a certificate, either the one
//! returned synchronously or one obtained by polling.
//!
//! ```text
//! Submitted ──► AnsweredSync ──┬──► Replied
//!     │                        ├──► Rejected
//!     │                        └──► (pending) ─┐
//!     └──► Accepted ──► Polling ◄──────────────┘
//!                         │ ├──► Replied | Rejected
//!                         │ └──► TimedOut
//!                         └─ self-loop with growing delay
//! ```
//!
//! Both update paths end in the same decode step.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

use crate::algorithms::{
    ErrorClassifier, MessagePatternClassifier, PollStrategy, RetryPolicy, RetryingQueryExecutor,
};
use crate::codec::{CallSchema, Codec, Value};
use crate::config::AgentConfig;
use crate::domain::{
    lookup_request_status, wire_method_name, AgentError, CallError, CanisterId, RejectCode,
    RejectDetails, Rejection, RequestId, RequestStatus,
};
use crate::ports::{AgentTransport, CallResponse, CertificateVerifier, QueryResponse};

/// Remote call client shared by all canister facades.
pub struct CanisterAgent {
    /// Configuration.
    config: AgentConfig,
    /// Platform transport.
    transport: Arc<dyn AgentTransport>,
    /// Certificate verifier.
    verifier: Arc<dyn CertificateVerifier>,
    /// Failure classifier.
    classifier: Arc<dyn ErrorClassifier>,
    /// Query retry loop.
    executor: RetryingQueryExecutor,
    /// Wire codec.
    codec: Codec,
    /// Root-of-trust key, fetched at most once.
    root_key: OnceCell<Vec<u8>>,
}

impl CanisterAgent {
    /// Agent using the message-pattern classifier.
    pub fn new(
        config: AgentConfig,
        transport: Arc<dyn AgentTransport>,
        verifier: Arc<dyn CertificateVerifier>,
    ) -> Self {
        Self::with_classifier(
            config,
            transport,
            verifier,
            Arc::new(MessagePatternClassifier::new()),
        )
    }

    /// Agent with a custom classifier.
    pub fn with_classifier(
        config: AgentConfig,
        transport: Arc<dyn AgentTransport>,
        verifier: Arc<dyn CertificateVerifier>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        let executor =
            RetryingQueryExecutor::new(RetryPolicy::from_config(&config), Arc::clone(&classifier));
        let root_key = match &config.root_key {
            Some(key) => OnceCell::new_with(Some(key.clone())),
            None => OnceCell::new(),
        };
        Self {
            codec: Codec::new(config.record_encoding),
            config,
            transport,
            verifier,
            classifier,
            executor,
            root_key,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Read-only call.
    ///
    /// Encodes `args`, runs the query with retry, checks the reply status,
    /// decodes against `response` and applies `mapper`.
    pub async fn query<R, M>(
        &self,
        target: &CanisterId,
        method: &str,
        args: &Value,
        request: &CallSchema,
        response: &CallSchema,
        mapper: M,
    ) -> Result<R, CallError>
    where
        M: Fn(Value) -> Result<R, AgentError>,
    {
        let result = async {
            let arg = self.codec.encode(args, request)?;
            let wire_method = wire_method_name(method);
            self.executor
                .query(
                    args,
                    || self.transport.query(target, &wire_method, &arg),
                    |answer| match answer {
                        QueryResponse::Replied { reply } => mapper(self.codec.decode(&reply, response)?),
                        QueryResponse::Rejected(rejection) => {
                            let raw = format!("{:?}", QueryResponse::Rejected(rejection.clone()));
                            Err(rejected(target, method, None, rejection, raw))
                        }
                    },
                )
                .await
        }
        .await;

        result.map_err(|e| self.call_error(target, method, args, e))
    }

    /// State-changing call.
    ///
    /// Submitted once; the outcome is read from a verified certificate.
    /// Failures are classified and never retried here.
    pub async fn update<R, M>(
        &self,
        target: &CanisterId,
        method: &str,
        args: &Value,
        request: &CallSchema,
        response: &CallSchema,
        mapper: M,
    ) -> Result<R, CallError>
    where
        M: Fn(Value) -> Result<R, AgentError>,
    {
        let result = async {
            let arg = self.codec.encode(args, request)?;
            let reply = self.submit_and_await(target, method, &arg).await?;
            mapper(self.codec.decode(&reply, response)?)
        }
        .await;

        result.map_err(|e| self.call_error(target, method, args, e))
    }

    async fn submit_and_await(
        &self,
        target: &CanisterId,
        method: &str,
        arg: &[u8],
    ) -> Result<Vec<u8>, AgentError> {
        let submitted_at = Instant::now();
        let submitted = self
            .transport
            .call(target, &wire_method_name(method), arg)
            .await
            .map_err(|f| self.classifier.classify(&f))?;
        let request_id = submitted.request_id;

        match submitted.response {
            CallResponse::Certified { certificate } => {
                let status = self.certified_status(target, &request_id, &certificate).await?;
                if status.is_terminal() {
                    return resolve(target, method, &request_id, status);
                }
                debug!(
                    request_id = %request_id,
                    method,
                    "[oc-01] Synchronous certificate still pending, polling"
                );
            }
            CallResponse::Accepted => {
                debug!(request_id = %request_id, method, "[oc-01] Update accepted, polling");
            }
            CallResponse::Unexpected { status } => {
                let rejection = Rejection {
                    reject_code: RejectCode::CanisterReject,
                    reject_message: String::new(),
                    error_code: None,
                };
                let raw = format!("unexpected call response status {status}");
                return Err(rejected(target, method, Some(request_id), rejection, raw));
            }
        }

        self.poll(target, method, &request_id, submitted_at).await
    }

    /// Poll the request status until it is terminal or the deadline passes.
    ///
    /// The deadline is `submitted_at + timeout`. Status reads that are still
    /// in flight at the deadline are abandoned.
    async fn poll(
        &self,
        target: &CanisterId,
        method: &str,
        request_id: &RequestId,
        submitted_at: Instant,
    ) -> Result<Vec<u8>, AgentError> {
        let mut strategy = PollStrategy::new(&self.config.poll, submitted_at);
        let deadline = strategy.deadline();

        while let Some(delay) = strategy.next_delay(Instant::now()) {
            tokio::time::sleep(delay).await;

            let status = match timeout_at(deadline, self.read_status(target, request_id)).await {
                Ok(Ok(Some(status))) => status,
                Ok(Ok(None)) => continue,
                Ok(Err(error)) => return Err(error),
                Err(_) => {
                    debug!(request_id = %request_id, "[oc-01] Status read outlived the poll deadline");
                    break;
                }
            };

            if status.is_terminal() {
                debug!(
                    request_id = %request_id,
                    elapsed_ms = strategy.elapsed(Instant::now()).as_millis() as u64,
                    "[oc-01] Update reached terminal status"
                );
                return resolve(target, method, request_id, status);
            }
        }

        Err(AgentError::TimedOut {
            request_id: *request_id,
            elapsed_ms: strategy.elapsed(Instant::now()).as_millis() as u64,
        })
    }

    /// One status read. `None` when the read failed in a way worth retrying.
    async fn read_status(
        &self,
        target: &CanisterId,
        request_id: &RequestId,
    ) -> Result<Option<RequestStatus>, AgentError> {
        let certificate = match self.transport.read_state(target, request_id).await {
            Ok(certificate) => certificate,
            Err(failure) => {
                let error = self.classifier.classify(&failure);
                if !error.is_retryable() {
                    return Err(error);
                }
                debug!(request_id = %request_id, error = %error, "[oc-01] Status read failed, still polling");
                return Ok(None);
            }
        };

        self.certified_status(target, request_id, &certificate)
            .await
            .map(Some)
    }

    /// Verify a certificate and read the request status from it.
    async fn certified_status(
        &self,
        target: &CanisterId,
        request_id: &RequestId,
        certificate: &[u8],
    ) -> Result<RequestStatus, AgentError> {
        let root_key = self.root_key().await?;
        let tree = self
            .verifier
            .verify(certificate, root_key, target)
            .map_err(|f| self.classifier.classify(&f))?;
        lookup_request_status(&tree, request_id)
    }

    async fn root_key(&self) -> Result<&[u8], AgentError> {
        self.root_key
            .get_or_try_init(|| async {
                debug!("[oc-01] Fetching root key");
                self.transport
                    .fetch_root_key()
                    .await
                    .map_err(|f| self.classifier.classify(&f))
            })
            .await
            .map(Vec::as_slice)
    }

    fn call_error(
        &self,
        target: &CanisterId,
        method: &str,
        args: &Value,
        error: AgentError,
    ) -> CallError {
        let args = args.to_string();
        error!(
            canister = %target,
            method,
            args = %args,
            kind = ?error.kind(),
            error = %error,
            "[oc-01] Canister call failed"
        );
        CallError {
            target: target.clone(),
            method: method.to_string(),
            args,
            error,
        }
    }
}

fn rejected(
    target: &CanisterId,
    method: &str,
    request_id: Option<RequestId>,
    rejection: Rejection,
    raw_response: String,
) -> AgentError {
    AgentError::RemoteRejected(Box::new(RejectDetails {
        target: target.clone(),
        method: method.to_string(),
        request_id,
        reject_code: rejection.reject_code,
        reject_message: rejection.reject_message,
        error_code: rejection.error_code,
        raw_response,
    }))
}

fn resolve(
    target: &CanisterId,
    method: &str,
    request_id: &RequestId,
    status: RequestStatus,
) -> Result<Vec<u8>, AgentError> {
    match status {
        RequestStatus::Replied(reply) => Ok(reply),
        RequestStatus::Rejected(rejection) => {
            let raw = format!("{rejection:?}");
            Err(rejected(target, method, Some(*request_id), rejection, raw))
        }
        RequestStatus::Done => Err(AgentError::transient(format!(
            "request {request_id} is done and its reply is no longer available"
        ))),
        pending => Err(AgentError::transient(format!(
            "request {request_id} is not terminal: {pending:?}"
        ))),
    }
}
