//! Logging and trace propagation
//!
//! - `subscriber`: console output through `tracing-subscriber`
//! - `propagation`: W3C `traceparent` on every outgoing API call

pub mod propagation;
pub mod subscriber;

pub use propagation::TraceContext;
pub use subscriber::{init_subscriber, TelemetryError};
