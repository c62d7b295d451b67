//! Docdrop Infrastructure Library
//!
//! Shared host-side components:
//! - Telemetry initialization (tracing subscriber)
//! - Session credentials read from the forwarded cookie
//! - An event sink that renders coordinator notifications as log events

pub mod credentials;
pub mod events;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub use credentials::{cookie_value, CookieCredentials, StaticCredentials, XSRF_COOKIE};
pub use events::TracingEventSink;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};
