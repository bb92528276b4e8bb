//! Interceptor subsystem.
//!
//! # Data Flow
//! ```text
//! Client call:
//!     → chain.rs (user interceptors, left to right)
//!     → headers.rs (configured outgoing headers)
//!     → pool / connection
//!
//! Server call:
//!     → recovery.rs (panic → Status)
//!     → chain.rs (user interceptors)
//!     → domain handler
//! ```
//!
//! # Design Decisions
//! - Context is passed explicitly from stage to stage, never shared
//! - A continuation is consumed when run, so it runs at most once
//! - Chains are immutable once built and cheap to clone

pub mod chain;
pub mod headers;
pub mod recovery;

pub use chain::{
    chain_stream, chain_unary, stream_fn, stream_handler_fn, unary_fn, unary_handler_fn,
    StreamChain, StreamHandler, StreamInterceptor, StreamNext, StreamOpenInterceptor, UnaryChain, UnaryHandler,
    UnaryInterceptor, UnaryNext,
};
pub use recovery::{PanicPayload, RecoveryHandler, RecoveryOptions};
