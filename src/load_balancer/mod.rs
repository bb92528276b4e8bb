//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Call issued against the pool
//!     → pool.rs (owns the dialed connections)
//!     → round_robin.rs (pick the next connection)
//!     → connection carries the call
//!     → result returned verbatim
//! ```
//!
//! # Design Decisions
//! - Pool membership is fixed at construction
//! - Selection is lock-free: one atomic increment per call
//! - No failover: a failed call is the caller's concern

pub mod pool;
pub mod round_robin;

pub use pool::{ConnPool, PooledConn};
pub use round_robin::Balancer;
