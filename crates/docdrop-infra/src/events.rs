//! Event sink that turns coordinator notifications into log events.

use docdrop_core::models::ModelObject;
use docdrop_core::EventSink;

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn progress_start(&self, endpoint: &str) {
        tracing::debug!(endpoint, "Upload started");
    }

    fn progress_end(&self, endpoint: &str) {
        tracing::debug!(endpoint, "Upload ended");
    }

    fn related_modified(&self, objects: &[ModelObject]) {
        let uids: Vec<&str> = objects.iter().map(|o| o.uid.as_str()).collect();
        tracing::info!(objects = ?uids, "Related data modified");
    }
}
