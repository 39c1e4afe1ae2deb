//! Remote call client bound to one canister.

use std::sync::Arc;

use super::service::CanisterAgent;
use crate::codec::{CallSchema, Value};
use crate::domain::{AgentError, CallError, CanisterId};

/// [`CanisterAgent`] bound to a fixed target.
///
/// Canister facades hold one of these per remote process.
#[derive(Clone)]
pub struct CanisterClient {
    agent: Arc<CanisterAgent>,
    target: CanisterId,
}

impl CanisterClient {
    /// Bind `agent` to `target`.
    pub fn new(agent: Arc<CanisterAgent>, target: CanisterId) -> Self {
        Self { agent, target }
    }

    /// Target canister.
    pub fn target(&self) -> &CanisterId {
        &self.target
    }

    /// Shared agent.
    pub fn agent(&self) -> &Arc<CanisterAgent> {
        &self.agent
    }

    /// Read-only call against the target.
    pub async fn query<R, M>(
        &self,
        method: &str,
        args: &Value,
        request: &CallSchema,
        response: &CallSchema,
        mapper: M,
    ) -> Result<R, CallError>
    where
        M: Fn(Value) -> Result<R, AgentError>,
    {
        self.agent
            .query(&self.target, method, args, request, response, mapper)
            .await
    }

    /// State-changing call against the target.
    pub async fn update<R, M>(
        &self,
        method: &str,
        args: &Value,
        request: &CallSchema,
        response: &CallSchema,
        mapper: M,
    ) -> Result<R, CallError>
    where
        M: Fn(Value) -> Result<R, AgentError>,
    {
        self.agent
            .update(&self.target, method, args, request, response, mapper)
            .await
    }
}
