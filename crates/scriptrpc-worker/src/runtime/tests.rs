#[cfg(test)]
mod tests {
    use crate::runtime::Worker;
    use crate::WorkerConfig;
    use scriptrpc_common::{BridgeError, CallContext, ServiceDescription, ServiceRef};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value as JsonValue};
    use std::sync::Arc;
    use std::time::Duration;

    struct Calculator {
        offset: i64,
    }

    #[derive(Deserialize)]
    struct Operands {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct Sum {
        sum: i64,
    }

    #[derive(Serialize)]
    struct Quotient {
        quotient: i64,
    }

    async fn crash() -> scriptrpc_common::Result<JsonValue> {
        panic!("handler crashed")
    }

    fn calculator() -> ServiceRef {
        let description = ServiceDescription::<Calculator>::new("math.Calculator")
            .method("Add", |calc: Arc<Calculator>, _ctx: CallContext, req: Operands| async move {
                Ok::<_, BridgeError>(Sum {
                    sum: req.a + req.b + calc.offset,
                })
            })
            .method("Divide", |_calc: Arc<Calculator>, _ctx: CallContext, req: Operands| async move {
                if req.b == 0 {
                    return Err(BridgeError::handler("division by zero"));
                }
                Ok(Quotient {
                    quotient: req.a / req.b,
                })
            })
            .method("Slow", |_calc: Arc<Calculator>, _ctx: CallContext, req: JsonValue| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BridgeError>(req)
            })
            .method("Scalar", |_calc: Arc<Calculator>, _ctx: CallContext, _req: JsonValue| async move {
                Ok::<_, BridgeError>(5)
            })
            .method("Hang", |_calc: Arc<Calculator>, _ctx: CallContext, _req: JsonValue| async move {
                futures::future::pending::<()>().await;
                Ok::<_, BridgeError>(json!({}))
            })
            .raw_method("Crash", |_calc, _ctx, _decoder| Box::pin(crash()));

        ServiceRef::new(description, Arc::new(Calculator { offset: 0 }))
    }

    fn worker() -> Worker {
        Worker::new(vec![calculator()]).unwrap()
    }

    #[tokio::test]
    async fn test_sync_value() {
        let mut worker = worker();
        let value = worker.run_to_completion("40 + 2", "main.js").await.unwrap();
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[tokio::test]
    async fn test_sync_throw() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("throw 'boom'", "main.js")
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Script("boom".into()));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("this is not valid javascript ))", "main.js")
            .await
            .unwrap_err();
        match err {
            BridgeError::Script(text) => assert!(text.contains("SyntaxError"), "{text}"),
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_value() {
        let mut worker = worker();
        let value = worker
            .run_to_completion("(async () => { await null; return { ok: true }; })()", "main.js")
            .await
            .unwrap();
        assert_eq!(worker.stringify(&value).unwrap(), r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_top_level_rejection() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("Promise.reject(new Error('nope'))", "main.js")
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Script("Error: nope".into()));
    }

    #[tokio::test]
    async fn test_handler_result() {
        let mut worker = worker();
        let value = worker
            .run_to_completion("calculator.add({ a: 2, b: 3 })", "main.js")
            .await
            .unwrap();
        assert_eq!(worker.to_json(&value).unwrap(), json!({"sum": 5}));
    }

    #[tokio::test]
    async fn test_client_is_passed_to_handler() {
        let description = ServiceDescription::<Calculator>::new("math.Calculator").method(
            "Add",
            |calc: Arc<Calculator>, _ctx: CallContext, req: Operands| async move {
                Ok::<_, BridgeError>(Sum {
                    sum: req.a + req.b + calc.offset,
                })
            },
        );
        let service = ServiceRef::new(description, Arc::new(Calculator { offset: 100 }));
        let mut worker = Worker::new(vec![service]).unwrap();

        let value = worker
            .run_to_completion("calculator.add({ a: 1, b: 1 })", "main.js")
            .await
            .unwrap();
        assert_eq!(worker.to_json(&value).unwrap(), json!({"sum": 102}));
    }

    #[tokio::test]
    async fn test_string_argument_is_raw_json() {
        let mut worker = worker();
        let value = worker
            .run_to_completion(r#"calculator.add('{"a": 4, "b": 4}')"#, "main.js")
            .await
            .unwrap();
        assert_eq!(worker.to_json(&value).unwrap(), json!({"sum": 8}));
    }

    #[tokio::test]
    async fn test_handler_error_rejects_call() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.divide({ a: 1, b: 0 })", "main.js")
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Script("division by zero".into()));
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_script_can_catch_call_failure() {
        let mut worker = worker();
        let value = worker
            .run_to_completion(
                "calculator.divide({ a: 1, b: 0 }).catch(e => ({ caught: e }))",
                "main.js",
            )
            .await
            .unwrap();
        assert_eq!(
            worker.to_json(&value).unwrap(),
            json!({"caught": "division by zero"})
        );
    }

    #[tokio::test]
    async fn test_decode_error_rejects_call() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.add({ a: 'two', b: 1 })", "main.js")
            .await
            .unwrap_err();
        match err {
            BridgeError::Script(text) => assert!(text.starts_with("Decode error"), "{text}"),
            other => panic!("expected script error, got {other:?}"),
        }
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_string_rejects_call() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.add('{not json')", "main.js")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Script(ref text) if text.starts_with("Decode error")));
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_non_structured_reply_rejects_call() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.scalar({})", "main.js")
            .await
            .unwrap_err();
        match err {
            BridgeError::Script(text) => {
                assert!(text.contains("output is not a structured message"), "{text}")
            }
            other => panic!("expected script error, got {other:?}"),
        }
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_handler_rejects_call() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.crash({})", "main.js")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Script("handler terminated without producing a response".into())
        );
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unattachable_promise_fails_run() {
        let mut worker = worker();
        let err = worker
            .run_to_completion(
                "(() => { const p = calculator.slow({ a: 1 }); p.constructor = 5; return p; })()",
                "main.js",
            )
            .await
            .unwrap_err();
        match err {
            BridgeError::Script(text) => assert!(text.starts_with("TypeError"), "{text}"),
            other => panic!("expected script error, got {other:?}"),
        }

        // The call itself still settles and is released.
        worker.run_until_idle().await.unwrap();
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_date_argument_reaches_handler_as_json() {
        let mut worker = worker();
        let value = worker
            .run_to_completion("calculator.slow({ at: new Date(0), n: new Number(2) })", "main.js")
            .await
            .unwrap();
        assert_eq!(
            worker.to_json(&value).unwrap(),
            json!({"at": "1970-01-01T00:00:00.000Z", "n": 2})
        );
    }

    #[tokio::test]
    async fn test_stringify_matches_script_json() {
        let mut worker = worker();
        let cases = [
            ("new Date(0)", r#""1970-01-01T00:00:00.000Z""#),
            ("Object.defineProperty({ a: 1 }, 'hidden', { value: 2, enumerable: false })", r#"{"a":1}"#),
            ("new Error('x')", "{}"),
            ("({ toJSON() { return 'custom' } })", r#""custom""#),
            ("new String('ab')", r#""ab""#),
            ("undefined", "null"),
        ];
        for (source, expected) in cases {
            let value = worker.run_to_completion(source, "main.js").await.unwrap();
            assert_eq!(worker.stringify(&value).unwrap(), expected, "{source}");
        }
    }

    #[tokio::test]
    async fn test_missing_argument_throws() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("calculator.add()", "main.js")
            .await
            .unwrap_err();
        match err {
            BridgeError::Script(text) => assert!(text.starts_with("TypeError"), "{text}"),
            other => panic!("expected script error, got {other:?}"),
        }
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_never_settling_run_stalls() {
        let mut worker = worker();
        let err = worker
            .run_to_completion("new Promise(() => {})", "main.js")
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Stalled);
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let config = WorkerConfig::new().with_wait_timeout(Duration::from_millis(50));
        let mut worker = Worker::with_config(vec![calculator()], config).unwrap();
        let err = worker
            .run_to_completion("calculator.hang({})", "main.js")
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Timeout(50));
        assert_eq!(worker.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_calls_in_one_script_run_concurrently() {
        let mut worker = worker();
        let value = worker
            .run_to_completion(
                "Promise.all([1, 2, 3, 4, 5].map(n => calculator.add({ a: n, b: n })))",
                "main.js",
            )
            .await
            .unwrap();
        assert_eq!(
            worker.to_json(&value).unwrap(),
            json!([{"sum": 2}, {"sum": 4}, {"sum": 6}, {"sum": 8}, {"sum": 10}])
        );
    }

    #[tokio::test]
    async fn test_runs_waited_out_of_order() {
        let mut worker = worker();
        let first = worker.run("calculator.slow({ n: 1 })", "first.js");
        let second = worker.run("calculator.slow({ n: 2 })", "second.js");
        assert_eq!(worker.in_flight(), 2);

        let second = worker.wait(second).await.unwrap();
        let first = worker.wait(first).await.unwrap();
        assert_eq!(worker.to_json(&first).unwrap(), json!({"n": 1}));
        assert_eq!(worker.to_json(&second).unwrap(), json!({"n": 2}));
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_globals_persist_across_runs() {
        let mut worker = worker();
        worker
            .run_to_completion("globalThis.counter = 41", "setup.js")
            .await
            .unwrap();
        let value = worker.run_to_completion("counter + 1", "main.js").await.unwrap();
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[tokio::test]
    async fn test_advance_pending_work_does_not_block() {
        let mut worker = worker();
        let handle = worker.run("calculator.slow({})", "main.js");
        assert_eq!(worker.in_flight(), 1);
        worker.advance_pending_work();

        worker.run_until_idle().await.unwrap();
        assert_eq!(worker.in_flight(), 0);
        let value = worker.wait(handle).await.unwrap();
        assert_eq!(worker.stringify(&value).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let mut worker = worker();
        worker
            .run_to_completion("calculator.add({ a: 1, b: 2 })", "main.js")
            .await
            .unwrap();
        let _ = worker
            .run_to_completion("calculator.divide({ a: 1, b: 0 })", "main.js")
            .await;

        let stats = worker.stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.methods["math.Calculator.Add"].successes, 1);
        assert_eq!(stats.methods["math.Calculator.Divide"].failures, 1);
    }

    #[tokio::test]
    async fn test_reserved_identifier_rejected() {
        let description = ServiceDescription::<()>::new("builtin.Eval").method(
            "Run",
            |_client: Arc<()>, _ctx: CallContext, req: JsonValue| async move {
                Ok::<_, BridgeError>(req)
            },
        );
        let err = Worker::new(vec![ServiceRef::new(description, Arc::new(()))])
            .err()
            .unwrap();
        assert_eq!(err, BridgeError::ReservedIdentifier("eval".into()));
    }

    #[tokio::test]
    async fn test_namespace_introspection() {
        let worker = worker();
        let namespace = worker.namespace();
        assert!(namespace.contains("calculator", "add"));
        assert!(namespace.contains("calculator", "crash"));
        assert_eq!(namespace.method_count(), 6);
    }

    #[test]
    fn test_worker_requires_runtime() {
        let err = Worker::new(vec![calculator()]).err().unwrap();
        assert!(matches!(err, BridgeError::Runtime(_)));
    }
}
