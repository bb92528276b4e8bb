//! Server pipeline: recovery, interceptors and error mapping together.

use std::sync::Arc;
use std::time::Duration;

use rpc_dispatch::middleware::{unary_fn, RecoveryOptions, UnaryNext};
use rpc_dispatch::status::{Code, Identity};
use rpc_dispatch::{BoxCallStream, CallInfo, Context, ContextError, ErrorMapper, ServerPipeline, Status, StreamDesc};
use thiserror::Error;
use tower::BoxError;

mod common;
use common::MockStream;

#[derive(Debug, Clone, PartialEq, Error)]
enum AccountError {
    #[error("account not found")]
    NotFound,
    #[error("account frozen")]
    Frozen,
}

#[derive(Debug, Error)]
#[error("loading account failed")]
struct LoadFailed(#[source] AccountError);

fn mapper() -> Arc<ErrorMapper> {
    let mapper = ErrorMapper::base(Code::Internal);
    mapper
        .with(Code::NotFound, [AccountError::NotFound])
        .with(Code::FailedPrecondition, [AccountError::Frozen]);
    Arc::new(mapper)
}

fn pipeline() -> ServerPipeline<String, String, String> {
    ServerPipeline::new(mapper())
}

async fn call(pipeline: &ServerPipeline<String, String, String>, req: &str) -> Result<String, Status> {
    let endpoint = pipeline.unary(|_ctx: Context, req: String| async move {
        match req.as_str() {
            "missing" => Err(BoxError::from(AccountError::NotFound)),
            "frozen" => Err(LoadFailed(AccountError::Frozen).into()),
            "late" => Err(ContextError::DeadlineExceeded.into()),
            "panic" => panic!("ledger corrupted"),
            _ => Ok(format!("balance of {req}")),
        }
    });

    endpoint
        .call(Context::new(), req.to_string(), CallInfo::new("/bank.Accounts/Balance"))
        .await
}

#[tokio::test]
async fn test_success_passes_through() {
    assert_eq!(call(&pipeline(), "alice").await, Ok("balance of alice".to_string()));
}

#[tokio::test]
async fn test_domain_errors_are_mapped() {
    let pipeline = pipeline();

    let err = call(&pipeline, "missing").await.unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.message(), "account not found");

    // matched through the source chain, message of the outer error kept
    let err = call(&pipeline, "frozen").await.unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    assert_eq!(err.message(), "loading account failed");

    let err = call(&pipeline, "late").await.unwrap_err();
    assert_eq!(err.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_panic_becomes_internal() {
    let err = call(&pipeline(), "panic").await.unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert_eq!(err.message(), "ledger corrupted");
}

#[tokio::test]
async fn test_custom_recovery_handler() {
    let pipeline = pipeline().with_recovery(RecoveryOptions::new().with_handler(|_ctx, payload| {
        let detail = rpc_dispatch::middleware::recovery::panic_message(payload.as_ref());
        Status::new(Code::Unavailable, format!("try again later ({detail})"))
    }));

    let err = call(&pipeline, "panic").await.unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
    assert_eq!(err.message(), "try again later (ledger corrupted)");
}

#[tokio::test]
async fn test_panicking_interceptor_is_recovered() {
    let pipeline = pipeline().with_unary_interceptors([unary_fn(
        |ctx: Context, req: String, _info, next: UnaryNext<String, String>| {
            if req == "bob" {
                panic!("audit log unavailable");
            }
            next.run(ctx, req)
        },
    )]);

    let err = call(&pipeline, "bob").await.unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert_eq!(err.message(), "audit log unavailable");

    assert_eq!(call(&pipeline, "carol").await, Ok("balance of carol".to_string()));
}

#[tokio::test]
async fn test_interceptor_sees_mapped_status() {
    let pipeline = pipeline().with_unary_interceptors([unary_fn(
        |ctx: Context, req: String, _info, next: UnaryNext<String, String>| async move {
            next.run(ctx, req).await.map_err(|st| {
                Status::new(st.code(), format!("[{}] {}", st.code(), st.message()))
            })
        },
    )]);

    let err = call(&pipeline, "missing").await.unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
    assert!(err.message().ends_with("account not found"));
}

#[tokio::test]
async fn test_stream_endpoint() {
    let pipeline = pipeline();
    let endpoint = pipeline.stream(|mut stream: BoxCallStream<String>| async move {
        while let Some(msg) = stream.recv().await? {
            if msg == "boom" {
                panic!("stream exploded");
            }
            if msg == "unknown" {
                return Err(BoxError::from(AccountError::NotFound));
            }
            stream.send(format!("ack {msg}")).await?;
        }
        Ok(())
    });

    let (stream, outbox) = MockStream::new(Context::new(), ["a", "b"]);
    endpoint.call(stream, StreamDesc::bidi("/bank.Accounts/Watch")).await.unwrap();
    assert_eq!(*outbox.lock().unwrap(), vec!["ack a", "ack b"]);

    let (stream, _) = MockStream::new(Context::new(), ["a", "unknown"]);
    let err = endpoint
        .call(stream, StreamDesc::bidi("/bank.Accounts/Watch"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let (stream, _) = MockStream::new(Context::new(), ["boom"]);
    let err = endpoint
        .call(stream, StreamDesc::bidi("/bank.Accounts/Watch"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert_eq!(err.message(), "stream exploded");
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_timeout_maps_to_deadline_exceeded() {
    let endpoint = pipeline().unary(|_ctx: Context, _req: String| async move {
        tokio::time::timeout(Duration::from_millis(10), std::future::pending::<()>()).await?;
        Ok::<String, BoxError>("unreachable".to_string())
    });

    let err = endpoint
        .call(Context::new(), "x".to_string(), CallInfo::new("/bank.Accounts/Slow"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::DeadlineExceeded);
}

#[test]
fn test_identity_values_are_distinct() {
    let mapper = ErrorMapper::new(Code::Unknown);
    mapper.with(Code::NotFound, [Identity::value(AccountError::NotFound)]);

    assert_eq!(mapper.map_err(&AccountError::NotFound).code(), Code::NotFound);
    assert_eq!(mapper.map_err(&AccountError::Frozen).code(), Code::Unknown);
}
