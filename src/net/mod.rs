//! Connection and stream abstractions.
//!
//! # Data Flow
//! ```text
//! External dialer produces a ClientConn
//!     → connection.rs (unary invoke / stream open / close)
//!     → stream.rs (bidirectional message channel for streaming calls)
//!     → Owned by the pool or a client channel
//! ```
//!
//! # Design Decisions
//! - No transport lives here: implementations come from outside the crate
//! - Futures are boxed so connections and streams stay object-safe

pub mod connection;
pub mod stream;

pub use connection::{CallInfo, ClientConn, ConnectionId, StreamDesc};
pub use stream::{with_context, BoxCallStream, CallStream};
