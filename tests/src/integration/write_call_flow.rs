//! # Remote Call Flow
//!
//! oc-01 query and update paths through a [`CanisterClient`], checking what
//! reaches the wire and what surfaces to callers.
//!
//! ## Flow Tested:
//!
//! 1. **Encoding**: positional vs named record layout on the wire
//! 2. **Queries**: lagging replicas retried, response violations surfaced once
//! 3. **Updates**: unexpected immediate answers, poll timeout
//! 4. **Logging**: telemetry setup alongside the agent

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use oc_01_canister_agent::{
        AgentConfig, AgentError, CallSchema, CanisterAgent, CanisterClient, CanisterId, Codec,
        ErrorKind, MockRequestKind, MockResponse, MockTransport, NatWidth, RecordEncoding,
        TransportFailure, Value,
    };
    use oc_telemetry::{init_logging, TelemetryConfig};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn chat() -> CanisterId {
        CanisterId::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai").unwrap()
    }

    fn client(transport: &MockTransport, config: AgentConfig) -> CanisterClient {
        let agent = CanisterAgent::new(
            config,
            Arc::new(transport.clone()),
            Arc::new(transport.verifier()),
        );
        CanisterClient::new(Arc::new(agent), chat())
    }

    /// `{ thread: opt nat32, text: text }`
    fn send_args_schema() -> CallSchema {
        CallSchema::record([
            ("thread", CallSchema::optional(CallSchema::Nat(NatWidth::U32))),
            ("text", CallSchema::Text),
        ])
    }

    fn send_args() -> Value {
        Value::record([("text", Value::from("gm"))])
    }

    /// `Success { message_index: nat32 } | ChatFrozen`
    fn send_response_schema() -> CallSchema {
        CallSchema::variant([
            (
                "Success",
                Some(CallSchema::record([(
                    "message_index",
                    CallSchema::Nat(NatWidth::U32),
                )])),
            ),
            ("ChatFrozen", None),
        ])
    }

    fn sent(index: u32) -> Vec<u8> {
        Codec::default()
            .encode(
                &Value::variant(
                    "Success",
                    Some(Value::record([("message_index", Value::from(index))])),
                ),
                &send_response_schema(),
            )
            .unwrap()
    }

    fn message_index(value: Value) -> Result<u32, AgentError> {
        match value.as_variant() {
            Some(("Success", Some(payload))) => payload
                .get("message_index")
                .and_then(Value::as_nat)
                .map(|n| n as u32)
                .ok_or_else(|| AgentError::response_mismatch("$::Success.message_index", "nat32", "absent")),
            Some((tag, _)) => Err(AgentError::response_mismatch("$", "Success", tag)),
            None => Err(AgentError::response_mismatch("$", "variant", "non-variant")),
        }
    }

    // =============================================================================
    // INTEGRATION TESTS: ENCODING
    // =============================================================================

    /// Default configuration writes records positionally.
    #[tokio::test]
    async fn test_positional_arguments_on_wire() {
        let transport = MockTransport::new(|_| MockResponse::Reply(sent(3)));
        let client = client(&transport, AgentConfig::for_testing());

        let index = client
            .update("send_message", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap();
        assert_eq!(index, 3);

        let request = &transport.requests()[0];
        assert_eq!(request.method, "send_message_msgpack");
        let positional = Codec::new(RecordEncoding::Positional)
            .encode(&send_args(), &send_args_schema())
            .unwrap();
        let named = Codec::new(RecordEncoding::Named)
            .encode(&send_args(), &send_args_schema())
            .unwrap();
        assert_eq!(request.arg, positional);
        assert_ne!(request.arg, named);
    }

    /// Named layout is a configuration choice; the reply decodes either way.
    #[tokio::test]
    async fn test_named_arguments_on_wire() {
        let transport = MockTransport::new(|_| MockResponse::Reply(sent(4)));
        let config = AgentConfig {
            record_encoding: RecordEncoding::Named,
            ..AgentConfig::for_testing()
        };
        let client = client(&transport, config);

        let index = client
            .query("send_message", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap();
        assert_eq!(index, 4);

        let named = Codec::new(RecordEncoding::Named)
            .encode(&send_args(), &send_args_schema())
            .unwrap();
        assert_eq!(transport.requests()[0].arg, named);
    }

    // =============================================================================
    // INTEGRATION TESTS: QUERIES
    // =============================================================================

    /// A lagging replica is retried until it catches up.
    #[tokio::test(start_paused = true)]
    async fn test_lagging_replica_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport = MockTransport::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                MockResponse::Fail(TransportFailure::new(
                    "Certificate is stale: replica is not up to date",
                ))
            } else {
                MockResponse::Reply(sent(8))
            }
        });
        let client = client(&transport, AgentConfig::for_testing());

        let index = client
            .query("summary", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap();

        assert_eq!(index, 8);
        assert_eq!(transport.count(MockRequestKind::Query), 2);
    }

    /// A reply outside the response schema fails once, with context.
    #[tokio::test(start_paused = true)]
    async fn test_response_violation_surfaces_with_context() {
        let transport = MockTransport::new(|_| {
            MockResponse::Reply(
                Codec::default()
                    .encode(&Value::from("not a variant we know"), &CallSchema::Text)
                    .unwrap(),
            )
        });
        let client = client(&transport, AgentConfig::for_testing());

        let err = client
            .query("summary", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.target, chat());
        assert_eq!(err.method, "summary");
        assert!(err.args.contains("gm"));
        assert_eq!(transport.count(MockRequestKind::Query), 1);
    }

    /// Mapper-level rejection of a valid reply is not retried.
    #[tokio::test]
    async fn test_domain_variant_reaches_mapper() {
        let transport = MockTransport::new(|_| {
            MockResponse::Reply(
                Codec::default()
                    .encode(&Value::variant("ChatFrozen", None), &send_response_schema())
                    .unwrap(),
            )
        });
        let client = client(&transport, AgentConfig::for_testing());

        let err = client
            .query("send_message", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(transport.count(MockRequestKind::Query), 1);
    }

    // =============================================================================
    // INTEGRATION TESTS: UPDATES
    // =============================================================================

    /// Neither certified nor accepted is surfaced as a rejection.
    #[tokio::test]
    async fn test_unexpected_update_answer() {
        let transport = MockTransport::new(|_| MockResponse::Unexpected(500));
        let client = client(&transport, AgentConfig::for_testing());

        let err = client
            .update("send_message", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert_eq!(transport.count(MockRequestKind::Call), 1);
        assert_eq!(transport.count(MockRequestKind::ReadState), 0);
    }

    /// An update that never turns terminal times out after polling.
    #[tokio::test(start_paused = true)]
    async fn test_update_poll_timeout() {
        let transport = MockTransport::new(|_| MockResponse::Pending);
        let client = client(&transport, AgentConfig::for_testing());
        let start = tokio::time::Instant::now();

        let err = client
            .update("send_message", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert_eq!(transport.count(MockRequestKind::Call), 1);
        assert!(transport.count(MockRequestKind::ReadState) > 1);
        assert!(start.elapsed() >= std::time::Duration::from_millis(5_000));
    }

    // =============================================================================
    // INTEGRATION TESTS: LOGGING
    // =============================================================================

    /// Logging can be installed before the agent runs, any number of times.
    #[tokio::test]
    async fn test_agent_runs_under_installed_logging() {
        let config = TelemetryConfig {
            log_level: "oc_01_canister_agent=debug".to_string(),
            ..TelemetryConfig::default()
        };
        init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());

        let transport = MockTransport::new(|_| MockResponse::Reply(sent(1)));
        let client = client(&transport, AgentConfig::for_testing());
        assert!(client
            .query("summary", &send_args(), &send_args_schema(), &send_response_schema(), message_index)
            .await
            .is_ok());
    }
}
