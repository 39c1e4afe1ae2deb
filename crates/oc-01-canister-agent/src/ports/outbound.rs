//! # Outbound Ports
//!
//! The platform transport (HTTP agent) and the certificate verifier. Both are
//! external collaborators; in-memory mocks are provided for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::domain::{
    write_leb128, CanisterId, HashTree, Rejection, RequestId, TransportFailure,
};

/// Answer to a query call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    /// Reply bytes.
    Replied {
        /// Encoded reply.
        reply: Vec<u8>,
    },
    /// Query rejected.
    Rejected(Rejection),
}

/// Immediate answer to an update submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResponse {
    /// Answered synchronously with a certificate.
    Certified {
        /// Undecoded certificate.
        certificate: Vec<u8>,
    },
    /// Accepted for processing; the outcome must be polled.
    Accepted,
    /// Neither of the above.
    Unexpected {
        /// HTTP status of the answer.
        status: u16,
    },
}

/// Result of submitting an update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCall {
    /// Correlation id for status lookups.
    pub request_id: RequestId,
    /// Immediate answer.
    pub response: CallResponse,
}

/// Platform transport - outbound port.
///
/// Method names passed here are wire names (`foo_msgpack`).
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Read-only call answered without consensus.
    async fn query(
        &self,
        target: &CanisterId,
        method: &str,
        arg: &[u8],
    ) -> Result<QueryResponse, TransportFailure>;

    /// Submit a state-changing call.
    async fn call(
        &self,
        target: &CanisterId,
        method: &str,
        arg: &[u8],
    ) -> Result<SubmittedCall, TransportFailure>;

    /// Fetch a certificate covering the status of `request_id`.
    async fn read_state(
        &self,
        target: &CanisterId,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, TransportFailure>;

    /// Fetch the platform root-of-trust key.
    async fn fetch_root_key(&self) -> Result<Vec<u8>, TransportFailure>;
}

/// Certificate verification - outbound port.
///
/// Checks the certificate's signature chain against `root_key` and that it
/// is valid for `target`, returning the certified tree.
pub trait CertificateVerifier: Send + Sync {
    /// Verify and open a certificate.
    fn verify(
        &self,
        certificate: &[u8],
        root_key: &[u8],
        target: &CanisterId,
    ) -> Result<HashTree, TransportFailure>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Kind of request seen by [`MockTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRequestKind {
    /// `query`.
    Query,
    /// `call`.
    Call,
    /// `read_state` for an earlier call.
    ReadState,
}

/// Request recorded by [`MockTransport`].
///
/// For `ReadState`, `method` and `arg` are those of the original call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    /// Request kind.
    pub kind: MockRequestKind,
    /// Target canister.
    pub target: CanisterId,
    /// Wire method name.
    pub method: String,
    /// Encoded argument.
    pub arg: Vec<u8>,
    /// Correlation id (calls and status reads).
    pub request_id: Option<RequestId>,
}

/// Scripted answer produced by a [`MockTransport`] handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Reply with bytes (certified `replied` for calls and status reads).
    Reply(Vec<u8>),
    /// Reject (certified `rejected` for calls and status reads).
    Reject(Rejection),
    /// Calls: accepted without certificate. Status reads: `processing`.
    Pending,
    /// Calls: synchronous certificate still reporting `processing`.
    CertifiedPending,
    /// Calls: immediate answer with an unexpected HTTP status.
    Unexpected(u16),
    /// Transport failure.
    Fail(TransportFailure),
}

type Handler = dyn Fn(&MockRequest) -> MockResponse + Send + Sync;

#[derive(Default)]
struct MockState {
    requests: Vec<MockRequest>,
    calls: HashMap<RequestId, (String, Vec<u8>)>,
    certificates: HashMap<Vec<u8>, HashTree>,
    next_id: u64,
    root_key_fetches: usize,
}

/// Scriptable in-memory transport.
///
/// Certificates it issues are opaque tokens that only the paired
/// [`MockVerifier`] can open.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Root key served by the mock.
    pub const ROOT_KEY: &'static [u8] = b"mock-root-key";

    /// Transport answering every request with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Verifier for certificates issued by this transport.
    pub fn verifier(&self) -> MockVerifier {
        MockVerifier {
            state: Arc::clone(&self.state),
        }
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests of `kind`.
    pub fn count(&self, kind: MockRequestKind) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Number of root key fetches.
    pub fn root_key_fetches(&self) -> usize {
        self.state.lock().root_key_fetches
    }

    fn record(&self, request: MockRequest) -> MockResponse {
        self.state.lock().requests.push(request.clone());
        (self.handler)(&request)
    }

    fn issue_certificate(&self, request_id: &RequestId, fields: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let children = fields
            .into_iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), HashTree::leaf(v)))
            .collect();
        let tree = HashTree::labeled(
            "request_status",
            HashTree::labeled(request_id.as_bytes().to_vec(), HashTree::from_children(children)),
        );

        let mut state = self.state.lock();
        state.next_id += 1;
        let token = format!("mock-certificate-{}", state.next_id).into_bytes();
        state.certificates.insert(token.clone(), tree);
        token
    }

    fn status_certificate(&self, request_id: &RequestId, response: MockResponse) -> Option<Vec<u8>> {
        let fields = match response {
            MockResponse::Reply(reply) => vec![("status", b"replied".to_vec()), ("reply", reply)],
            MockResponse::Reject(rejection) => {
                let mut fields = vec![
                    ("status", b"rejected".to_vec()),
                    ("reject_code", write_leb128(rejection.reject_code.code())),
                    ("reject_message", rejection.reject_message.into_bytes()),
                ];
                if let Some(code) = rejection.error_code {
                    fields.push(("error_code", code.into_bytes()));
                }
                fields
            }
            MockResponse::Pending | MockResponse::CertifiedPending => {
                vec![("status", b"processing".to_vec())]
            }
            MockResponse::Unexpected(_) | MockResponse::Fail(_) => return None,
        };
        Some(self.issue_certificate(request_id, fields))
    }

    fn next_request_id(&self) -> RequestId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let digest = Sha256::digest(state.next_id.to_be_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        RequestId::new(bytes)
    }
}

#[async_trait]
impl AgentTransport for MockTransport {
    async fn query(
        &self,
        target: &CanisterId,
        method: &str,
        arg: &[u8],
    ) -> Result<QueryResponse, TransportFailure> {
        let response = self.record(MockRequest {
            kind: MockRequestKind::Query,
            target: target.clone(),
            method: method.to_string(),
            arg: arg.to_vec(),
            request_id: None,
        });
        match response {
            MockResponse::Reply(reply) => Ok(QueryResponse::Replied { reply }),
            MockResponse::Reject(rejection) => Ok(QueryResponse::Rejected(rejection)),
            MockResponse::Fail(failure) => Err(failure),
            other => Err(TransportFailure::new(format!(
                "mock transport cannot answer a query with {other:?}"
            ))),
        }
    }

    async fn call(
        &self,
        target: &CanisterId,
        method: &str,
        arg: &[u8],
    ) -> Result<SubmittedCall, TransportFailure> {
        let request_id = self.next_request_id();
        self.state
            .lock()
            .calls
            .insert(request_id, (method.to_string(), arg.to_vec()));

        let response = self.record(MockRequest {
            kind: MockRequestKind::Call,
            target: target.clone(),
            method: method.to_string(),
            arg: arg.to_vec(),
            request_id: Some(request_id),
        });
        let response = match response {
            MockResponse::Fail(failure) => return Err(failure),
            MockResponse::Pending => CallResponse::Accepted,
            MockResponse::Unexpected(status) => CallResponse::Unexpected { status },
            certified => match self.status_certificate(&request_id, certified) {
                Some(certificate) => CallResponse::Certified { certificate },
                None => CallResponse::Accepted,
            },
        };
        Ok(SubmittedCall {
            request_id,
            response,
        })
    }

    async fn read_state(
        &self,
        target: &CanisterId,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, TransportFailure> {
        let original = self.state.lock().calls.get(request_id).cloned();
        let (method, arg) = original.unwrap_or_default();
        let response = self.record(MockRequest {
            kind: MockRequestKind::ReadState,
            target: target.clone(),
            method,
            arg,
            request_id: Some(*request_id),
        });
        match response {
            MockResponse::Fail(failure) => Err(failure),
            other => self
                .status_certificate(request_id, other)
                .ok_or_else(|| TransportFailure::new("mock transport has no certificate to serve")),
        }
    }

    async fn fetch_root_key(&self) -> Result<Vec<u8>, TransportFailure> {
        self.state.lock().root_key_fetches += 1;
        Ok(Self::ROOT_KEY.to_vec())
    }
}

/// Opens certificates issued by a [`MockTransport`].
#[derive(Clone)]
pub struct MockVerifier {
    state: Arc<Mutex<MockState>>,
}

impl CertificateVerifier for MockVerifier {
    fn verify(
        &self,
        certificate: &[u8],
        root_key: &[u8],
        _target: &CanisterId,
    ) -> Result<HashTree, TransportFailure> {
        if root_key != MockTransport::ROOT_KEY {
            return Err(TransportFailure::new("Certificate verification failed: root key mismatch"));
        }
        self.state
            .lock()
            .certificates
            .get(certificate)
            .cloned()
            .ok_or_else(|| TransportFailure::new("Certificate verification failed: unknown certificate"))
    }
}
