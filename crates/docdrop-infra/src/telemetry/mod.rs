//! Tracing initialization
//!
//! Installs a `tracing_subscriber` registry with an `EnvFilter` taken from
//! `RUST_LOG` and a plain or JSON fmt layer.

mod init_basic;

pub use init_basic::{init_telemetry, LogFormat};
