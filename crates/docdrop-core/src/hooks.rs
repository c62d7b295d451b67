//! Notification hooks
//!
//! The coordinator announces upload progress and data changes through
//! `EventSink` so a host (UI, CLI, logs) can react without the coordinator
//! depending on it.

use crate::models::ModelObject;

pub trait EventSink: Send + Sync {
    /// An upload request to `endpoint` was issued.
    fn progress_start(&self, endpoint: &str);

    /// An upload request to `endpoint` finished (successfully or not).
    fn progress_end(&self, endpoint: &str);

    /// The related data of `objects` changed on the server.
    fn related_modified(&self, objects: &[ModelObject]);
}

/// No-op implementation for hosts that do not observe events
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn progress_start(&self, _endpoint: &str) {}

    fn progress_end(&self, _endpoint: &str) {}

    fn related_modified(&self, _objects: &[ModelObject]) {}
}
