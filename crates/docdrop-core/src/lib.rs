//! docdrop core library
//!
//! Domain models, error types, configuration and the traits through which the
//! upload/commit coordinator talks to the remote PLM services. Every other
//! docdrop crate depends on this one.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{ClientConfig, CommitConfig, Config};
pub use error::{LogLevel, PartialError, PlmError, PlmResult};
pub use hooks::{EventSink, NoOpEventSink};
pub use services::{CommitBackend, DocumentService, SessionCredentials, UploadTransport};
