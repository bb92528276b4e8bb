//! Status taxonomy and error mapping.
//!
//! # Data Flow
//! ```text
//! Domain handler returns Err(e)
//!     → mapper.rs (walk e's source chain against registered rules)
//!     → Status { code, message: e.to_string() }
//!     → returned to the transport
//! ```

pub mod code;
pub mod mapper;

pub use code::{Code, Status};
pub use mapper::{ErrorMapper, Identity};
