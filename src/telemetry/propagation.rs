//! W3C Trace Context propagation
//!
//! Every harness run owns one trace id. Each outgoing request carries a
//! `traceparent` header with that trace id and a fresh span id, so the calls
//! a run made can be found again in the services' logs.
//!
//! Format: `traceparent: 00-{trace-id}-{span-id}-{trace-flags}`
//!
//! When the harness is launched with `TRACEPARENT` (and optionally
//! `TRACESTATE`) in its environment, the run joins that trace instead of
//! starting a new one, and forwards the tracestate unchanged.
//!
//! ```
//! use cloudroast::telemetry::propagation::TraceContext;
//!
//! let run = TraceContext::generate();
//! let request = run.child();
//! assert_eq!(request.trace_id, run.trace_id);
//! assert_ne!(request.span_id, run.span_id);
//! assert!(request.to_traceparent().starts_with("00-"));
//! ```

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};

/// Header carrying the trace id, span id and flags
pub const TRACEPARENT: &str = "traceparent";

/// Optional vendor-specific trace data
pub const TRACESTATE: &str = "tracestate";

/// Environment variable carrying a parent `traceparent`
pub const TRACEPARENT_ENV: &str = "TRACEPARENT";

/// Environment variable carrying the parent's `tracestate`
pub const TRACESTATE_ENV: &str = "TRACESTATE";

/// W3C Trace Context
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    /// Trace ID (32 hex characters)
    pub trace_id: String,
    /// Span ID (16 hex characters)
    pub span_id: String,
    /// Trace flags (8-bit field)
    pub trace_flags: u8,
    /// Optional tracestate header value
    pub tracestate: Option<String>,
}

impl TraceContext {
    /// Start a new sampled trace
    pub fn generate() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
            trace_flags: 0x01,
            tracestate: None,
        }
    }

    /// Continue the trace exported by the launching process, if any
    pub fn from_env() -> Option<Self> {
        let traceparent = std::env::var(TRACEPARENT_ENV).ok();
        let tracestate = std::env::var(TRACESTATE_ENV).ok();
        Self::join(traceparent.as_deref(), tracestate.as_deref())
    }

    /// Child of a parent given as raw header values
    fn join(traceparent: Option<&str>, tracestate: Option<&str>) -> Option<Self> {
        Self::parse(traceparent?, tracestate).map(|parent| parent.child())
    }

    /// Same trace, new span
    pub fn child(&self) -> Self {
        Self {
            span_id: new_span_id(),
            ..self.clone()
        }
    }

    /// Check if the trace is sampled
    pub fn is_sampled(&self) -> bool {
        (self.trace_flags & 0x01) != 0
    }

    /// Format as traceparent header value
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id, self.span_id, self.trace_flags
        )
    }

    /// Parse `traceparent` and `tracestate` header values
    ///
    /// Returns `None` unless the traceparent is version `00` with a 32 hex
    /// character trace id, a 16 hex character span id and a two digit flags
    /// field. A blank tracestate is dropped.
    pub fn parse(traceparent: &str, tracestate: Option<&str>) -> Option<Self> {
        let parts: Vec<&str> = traceparent.trim().split('-').collect();
        if parts.len() != 4 || parts[0] != "00" {
            return None;
        }

        let is_hex = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex(parts[1], 32) || !is_hex(parts[2], 16) || parts[3].len() != 2 {
            return None;
        }

        let trace_flags = u8::from_str_radix(parts[3], 16).ok()?;

        Some(Self {
            trace_id: parts[1].to_ascii_lowercase(),
            span_id: parts[2].to_ascii_lowercase(),
            trace_flags,
            tracestate: tracestate
                .map(str::trim)
                .filter(|state| !state.is_empty())
                .map(String::from),
        })
    }

    /// Inject as `traceparent` (and `tracestate` when present) request headers
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.to_traceparent()) {
            headers.insert(TRACEPARENT, value);
        }

        if let Some(ref tracestate) = self.tracestate {
            if let Ok(value) = HeaderValue::from_str(tracestate) {
                headers.insert(TRACESTATE, value);
            }
        }
    }
}

fn new_span_id() -> String {
    let id: u64 = rand::rng().random_range(1..=u64::MAX);
    format!("{:016x}", id)
}
