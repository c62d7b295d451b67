//! Upload/commit bookkeeping as an explicit state machine.
//!
//! [`CoordinatorState::step`] is the only way state changes. It never does
//! I/O; it returns [`Action`]s for the driver to carry out and is fed the
//! results back as further [`Event`]s.
//!
//! Resolution has a single entry point, `settle`, reached from the upload
//! failure branch and from a drain that finds the commit queue empty. It only
//! proceeds from `Phase::Uploading` with nothing pending, queued or in flight,
//! so it can succeed at most once.

use chrono::Utc;
use docdrop_core::models::{
    CommitOutcome, CommitReport, ModelObject, OutcomeContext, PendingCommitEntry, PendingRemoval,
    RejectedAttachment, UploadResponse, UploadTask,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Uploads may be outstanding; no commit call is in flight.
    Uploading,
    /// Exactly one commit call is in flight.
    Committing,
    /// Removal calls for failed attachments are in flight.
    CleaningUp,
    /// The outcome has been produced.
    Done,
}

#[derive(Debug)]
pub enum Event {
    /// `count` uploads were started. `rejected` attachments have nothing to
    /// upload and fail right away.
    BatchRegistered {
        count: usize,
        rejected: Vec<RejectedAttachment>,
    },
    UploadFinished {
        task: UploadTask,
        response: UploadResponse,
    },
    /// The commit debounce timer fired.
    CommitDue,
    /// The in-flight commit call finished. `Err` holds the final error text
    /// after retries were exhausted.
    CommitFinished {
        result: Result<CommitReport, String>,
    },
    CleanupFinished,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::BatchRegistered { .. } => "batch_registered",
            Event::UploadFinished { .. } => "upload_finished",
            Event::CommitDue => "commit_due",
            Event::CommitFinished { .. } => "commit_finished",
            Event::CleanupFinished => "cleanup_finished",
        }
    }
}

#[derive(Debug)]
pub enum Action {
    PingDebounce,
    CancelDebounce,
    Commit(Vec<PendingCommitEntry>),
    Remove(Vec<PendingRemoval>),
    Resolve(CommitOutcome),
}

#[derive(Debug, Clone)]
struct QueuedCommit {
    entry: PendingCommitEntry,
    container: ModelObject,
}

#[derive(Debug)]
pub struct CoordinatorState {
    phase: Phase,
    pending_upload_count: usize,
    total_upload_count: usize,
    source_objects: Vec<ModelObject>,
    failure_messages: Vec<String>,
    commit_queue: Vec<QueuedCommit>,
    in_flight: Vec<QueuedCommit>,
    pending_removals: Vec<PendingRemoval>,
    context: OutcomeContext,
}

/// Failure message shown to the user for one file.
pub fn failure_message(status: impl std::fmt::Display, status_text: &str, file_name: &str) -> String {
    format!("({}) {} : {}", status, status_text, file_name)
}

impl CoordinatorState {
    pub fn new(context: OutcomeContext) -> Self {
        Self {
            phase: Phase::Uploading,
            pending_upload_count: 0,
            total_upload_count: 0,
            source_objects: Vec::new(),
            failure_messages: Vec::new(),
            commit_queue: Vec::new(),
            in_flight: Vec::new(),
            pending_removals: Vec::new(),
            context,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending_upload_count(&self) -> usize {
        self.pending_upload_count
    }

    pub fn total_upload_count(&self) -> usize {
        self.total_upload_count
    }

    pub fn queued_commits(&self) -> usize {
        self.commit_queue.len()
    }

    pub fn commit_in_flight(&self) -> bool {
        self.phase == Phase::Committing
    }

    pub fn pending_removals(&self) -> &[PendingRemoval] {
        &self.pending_removals
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Apply one event and return the side effects it requires.
    pub fn step(&mut self, event: Event) -> Vec<Action> {
        if self.phase == Phase::Done {
            tracing::warn!(event = event.kind(), "Event received after outcome was resolved, ignoring");
            return Vec::new();
        }

        match event {
            Event::BatchRegistered { count, rejected } => self.on_batch_registered(count, rejected),
            Event::UploadFinished { task, response } => self.on_upload_finished(task, response),
            Event::CommitDue => self.drain_pending_commits(),
            Event::CommitFinished { result } => self.on_commit_finished(result),
            Event::CleanupFinished => self.on_cleanup_finished(),
        }
    }

    fn on_batch_registered(
        &mut self,
        count: usize,
        rejected: Vec<RejectedAttachment>,
    ) -> Vec<Action> {
        self.pending_upload_count += count;
        self.total_upload_count += count + rejected.len();
        tracing::debug!(
            count,
            rejected = rejected.len(),
            pending = self.pending_upload_count,
            total = self.total_upload_count,
            "Upload batch registered"
        );

        for attachment in rejected {
            tracing::warn!(
                file_name = %attachment.file_name,
                reason = %attachment.reason,
                container = %attachment.container.uid,
                "Attachment has nothing to upload, queued for removal"
            );
            self.failure_messages.push(failure_message(
                "attach",
                &attachment.reason,
                &attachment.file_name,
            ));
            PendingRemoval::add_to_group(
                &mut self.pending_removals,
                &attachment.container,
                attachment.attachment.to_reference(),
            );
        }

        // Nothing will ever complete for an empty batch.
        if count == 0 {
            return self.settle();
        }
        Vec::new()
    }

    fn on_upload_finished(&mut self, task: UploadTask, response: UploadResponse) -> Vec<Action> {
        self.pending_upload_count = self.pending_upload_count.saturating_sub(1);

        if response.is_success() {
            tracing::debug!(
                file_name = %task.file_info.file_name,
                pending = self.pending_upload_count,
                "Upload succeeded, queueing commit"
            );
            self.commit_queue.push(QueuedCommit {
                entry: PendingCommitEntry::for_upload(&task),
                container: task.container.clone(),
            });
            self.source_objects.push(task.attachment.to_reference());
            return vec![Action::PingDebounce];
        }

        let message = failure_message(
            response.status,
            &response.status_text,
            &task.file_info.file_name,
        );
        tracing::warn!(
            file_name = %task.file_info.file_name,
            status = response.status,
            status_text = %response.status_text,
            container = %task.container.uid,
            "Upload failed, attachment queued for removal"
        );
        self.failure_messages.push(message);
        PendingRemoval::add_to_group(
            &mut self.pending_removals,
            &task.container,
            task.attachment.to_reference(),
        );

        if self.pending_upload_count == 0 && self.commit_queue.is_empty() {
            return self.settle();
        }
        Vec::new()
    }

    /// Dispatch everything queued as one commit call, unless one is in flight.
    fn drain_pending_commits(&mut self) -> Vec<Action> {
        if !self.commit_queue.is_empty() {
            if self.phase == Phase::Committing {
                tracing::debug!(
                    queued = self.commit_queue.len(),
                    "Commit already in flight, deferring"
                );
                return Vec::new();
            }

            self.in_flight = std::mem::take(&mut self.commit_queue);
            self.phase = Phase::Committing;
            let batch: Vec<PendingCommitEntry> =
                self.in_flight.iter().map(|q| q.entry.clone()).collect();
            tracing::debug!(batch_size = batch.len(), "Dispatching commit batch");
            return vec![Action::Commit(batch)];
        }

        if self.pending_upload_count == 0 {
            return self.settle();
        }
        Vec::new()
    }

    fn on_commit_finished(&mut self, result: Result<CommitReport, String>) -> Vec<Action> {
        if self.phase != Phase::Committing {
            tracing::warn!(phase = ?self.phase, "Commit completion without a commit in flight");
            return Vec::new();
        }
        self.phase = Phase::Uploading;
        let batch = std::mem::take(&mut self.in_flight);

        match result {
            Ok(report) => {
                for queued in batch {
                    if let Some(reason) = report.rejection(&queued.entry.dataset.uid) {
                        self.fail_committed(queued, reason);
                    }
                }
            }
            Err(error) => {
                tracing::error!(
                    batch_size = batch.len(),
                    error = %error,
                    "Commit batch failed, marking its files as failed"
                );
                for queued in batch {
                    self.fail_committed(queued, &error);
                }
            }
        }

        self.drain_pending_commits()
    }

    /// Move an uploaded file from the successes to the failures.
    fn fail_committed(&mut self, queued: QueuedCommit, reason: &str) {
        let message = failure_message("commit", reason, queued.entry.file_name());
        let dataset = queued.entry.dataset;
        self.source_objects.retain(|obj| obj != &dataset);
        self.failure_messages.push(message);
        PendingRemoval::add_to_group(&mut self.pending_removals, &queued.container, dataset);
    }

    fn on_cleanup_finished(&mut self) -> Vec<Action> {
        if self.phase != Phase::CleaningUp {
            tracing::warn!(phase = ?self.phase, "Cleanup completion outside of cleanup");
            return Vec::new();
        }
        self.phase = Phase::Done;
        vec![Action::Resolve(self.outcome())]
    }

    fn settle(&mut self) -> Vec<Action> {
        if self.phase != Phase::Uploading
            || self.pending_upload_count != 0
            || !self.commit_queue.is_empty()
        {
            return Vec::new();
        }

        if self.pending_removals.is_empty() {
            self.phase = Phase::Done;
            return vec![Action::CancelDebounce, Action::Resolve(self.outcome())];
        }

        self.phase = Phase::CleaningUp;
        vec![
            Action::CancelDebounce,
            Action::Remove(self.pending_removals.clone()),
        ]
    }

    fn outcome(&self) -> CommitOutcome {
        CommitOutcome {
            total_count: self.total_upload_count,
            source_objects: self.source_objects.clone(),
            failure_messages: self.failure_messages.clone(),
            doc_created: self.context.doc_created,
            doc_name: self.context.doc_name.clone(),
            unattached_files: Vec::new(),
            completed_at: Utc::now(),
        }
    }
}
