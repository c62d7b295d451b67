//! Upload/commit coordinator: drives N concurrent uploads, batches their
//! commits and resolves one aggregate outcome.
//!
//! A single actor task owns the [`CoordinatorState`] and the commit
//! [`Debounce`]. Uploads, commits and removals run as spawned tasks that
//! report back over one channel, so state is only ever touched by the actor,
//! one event at a time.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};

use docdrop_core::models::{
    CommitOutcome, CommitReport, ModelObject, OutcomeContext, PendingCommitEntry, PendingRemoval,
    RejectedAttachment, UploadResponse, UploadTask,
};
use docdrop_core::{CommitBackend, CommitConfig, EventSink, UploadTransport};

use crate::debounce::Debounce;
use crate::error::{log_plm_error, DropError};
use crate::state::{Action, CoordinatorState, Event, Phase};

/// Upper bound for the delay between two commit attempts.
pub const MAX_COMMIT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based): exponential with cap.
#[inline]
pub(crate) fn commit_retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_COMMIT_RETRY_BACKOFF)
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub quiet_period: Duration,
    pub max_wait: Duration,
    pub commit_max_attempts: u32,
    pub commit_retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&CommitConfig::default())
    }
}

impl From<&CommitConfig> for CoordinatorConfig {
    fn from(config: &CommitConfig) -> Self {
        Self {
            quiet_period: config.quiet_period(),
            max_wait: config.max_wait(),
            commit_max_attempts: config.max_attempts.max(1),
            commit_retry_backoff: config.retry_backoff(),
        }
    }
}

#[derive(Clone)]
pub struct UploadCommitCoordinator {
    backend: Arc<dyn CommitBackend>,
    transport: Arc<dyn UploadTransport>,
    events: Arc<dyn EventSink>,
    config: CoordinatorConfig,
}

impl UploadCommitCoordinator {
    pub fn new(
        backend: Arc<dyn CommitBackend>,
        transport: Arc<dyn UploadTransport>,
        events: Arc<dyn EventSink>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            backend,
            transport,
            events,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Start a session. Uploads are added with [`CommitSession::submit`].
    ///
    /// The session ends once the outcome is resolved, or when the session
    /// handle and every upload it started are gone without one.
    pub fn start(&self, context: OutcomeContext) -> CommitSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let driver = Driver {
            state: CoordinatorState::new(context),
            debounce: Debounce::new(self.config.quiet_period, self.config.max_wait),
            backend: self.backend.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
            work_tx,
            outcome_tx: Some(outcome_tx),
        };

        tokio::spawn(async move {
            driver.run(rx, work_rx).await;
        });

        CommitSession {
            tx,
            transport: self.transport.clone(),
            events: self.events.clone(),
            outcome_rx,
        }
    }

    /// Upload and commit `tasks` as one session and wait for the outcome.
    pub async fn run(
        &self,
        tasks: Vec<UploadTask>,
        context: OutcomeContext,
    ) -> Result<CommitOutcome, DropError> {
        self.run_with_rejected(tasks, Vec::new(), context).await
    }

    /// Like [`run`](Self::run), with attachments that have nothing to upload
    /// reported as failures and removed.
    #[tracing::instrument(
        skip(self, tasks, rejected, context),
        fields(files = tasks.len(), rejected = rejected.len())
    )]
    pub async fn run_with_rejected(
        &self,
        tasks: Vec<UploadTask>,
        rejected: Vec<RejectedAttachment>,
        context: OutcomeContext,
    ) -> Result<CommitOutcome, DropError> {
        let session = self.start(context);
        session.submit_batch(tasks, rejected);
        session.finish().await
    }
}

/// Handle on a running coordinator session.
pub struct CommitSession {
    tx: mpsc::UnboundedSender<Event>,
    transport: Arc<dyn UploadTransport>,
    events: Arc<dyn EventSink>,
    outcome_rx: oneshot::Receiver<CommitOutcome>,
}

impl CommitSession {
    /// Register a batch and start one upload per task. Counts accumulate
    /// across batches of the same session.
    pub fn submit(&self, tasks: Vec<UploadTask>) {
        self.submit_batch(tasks, Vec::new());
    }

    /// [`submit`](Self::submit) plus attachments that fail without an upload.
    pub fn submit_batch(&self, tasks: Vec<UploadTask>, rejected: Vec<RejectedAttachment>) {
        let registered = Event::BatchRegistered {
            count: tasks.len(),
            rejected,
        };
        if self.tx.send(registered).is_err() {
            tracing::warn!("Coordinator already finished, batch dropped");
            return;
        }

        for task in tasks {
            let tx = self.tx.clone();
            let transport = self.transport.clone();
            let events = self.events.clone();

            tokio::spawn(async move {
                let endpoint = transport.endpoint().to_string();
                events.progress_start(&endpoint);

                let response = match transport.upload(&task.source, &task.ticket).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(
                            file_name = %task.file_info.file_name,
                            error = %e,
                            "Upload request did not complete"
                        );
                        UploadResponse::transport_failure(e.to_string())
                    }
                };

                events.progress_end(&endpoint);
                if let Err(mpsc::error::SendError(event)) =
                    tx.send(Event::UploadFinished { task, response })
                {
                    tracing::debug!(event = event.kind(), "Coordinator gone, upload result dropped");
                }
            });
        }
    }

    /// Wait for the aggregate outcome.
    pub async fn finish(self) -> Result<CommitOutcome, DropError> {
        let CommitSession { tx, outcome_rx, .. } = self;
        // Only running uploads keep the session alive from here on.
        drop(tx);
        outcome_rx.await.map_err(|_| DropError::CoordinatorGone)
    }
}

struct Driver {
    state: CoordinatorState,
    debounce: Debounce,
    backend: Arc<dyn CommitBackend>,
    events: Arc<dyn EventSink>,
    config: CoordinatorConfig,
    /// Completions of the commit and removal tasks the driver spawns.
    work_tx: mpsc::UnboundedSender<Event>,
    outcome_tx: Option<oneshot::Sender<CommitOutcome>>,
}

impl Driver {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Event>,
        mut work_rx: mpsc::UnboundedReceiver<Event>,
    ) {
        tracing::debug!("Upload/commit coordinator started");
        let mut producers_open = true;

        loop {
            let deadline = self.debounce.deadline();
            let event = tokio::select! {
                maybe = rx.recv(), if producers_open => match maybe {
                    Some(event) => event,
                    None => {
                        producers_open = false;
                        if self.owns_pending_work() {
                            continue;
                        }
                        break;
                    }
                },
                Some(event) = work_rx.recv() => event,
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if !self.debounce.fire(Instant::now()) {
                        continue;
                    }
                    Event::CommitDue
                }
            };

            for action in self.state.step(event) {
                self.apply(action);
            }

            if self.state.is_done() {
                break;
            }
            if !producers_open && !self.owns_pending_work() {
                break;
            }
        }

        if !self.state.is_done() {
            tracing::warn!(
                pending = self.state.pending_upload_count(),
                "Session abandoned before all uploads reported back"
            );
        }
        tracing::debug!("Upload/commit coordinator stopped");
    }

    /// Work whose completion the driver itself will deliver.
    fn owns_pending_work(&self) -> bool {
        matches!(self.state.phase(), Phase::Committing | Phase::CleaningUp)
            || self.debounce.deadline().is_some()
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::PingDebounce => self.debounce.ping(Instant::now()),
            Action::CancelDebounce => self.debounce.cancel(),
            Action::Commit(batch) => {
                let backend = self.backend.clone();
                let tx = self.work_tx.clone();
                let max_attempts = self.config.commit_max_attempts;
                let backoff = self.config.commit_retry_backoff;
                tokio::spawn(async move {
                    let result = commit_with_retry(backend.as_ref(), &batch, max_attempts, backoff).await;
                    if tx.send(Event::CommitFinished { result }).is_err() {
                        tracing::debug!("Coordinator gone, commit result dropped");
                    }
                });
            }
            Action::Remove(groups) => {
                let backend = self.backend.clone();
                let events = self.events.clone();
                let tx = self.work_tx.clone();
                tokio::spawn(async move {
                    remove_failed_attachments(backend.as_ref(), events.as_ref(), &groups).await;
                    if tx.send(Event::CleanupFinished).is_err() {
                        tracing::debug!("Coordinator gone, cleanup completion dropped");
                    }
                });
            }
            Action::Resolve(outcome) => {
                tracing::info!(
                    total = outcome.total_count,
                    succeeded = outcome.success_count(),
                    failed = outcome.failure_count(),
                    "Upload/commit session resolved"
                );
                if let Some(outcome_tx) = self.outcome_tx.take() {
                    if outcome_tx.send(outcome).is_err() {
                        tracing::debug!("Outcome receiver dropped");
                    }
                }
            }
        }
    }
}

async fn commit_with_retry(
    backend: &dyn CommitBackend,
    batch: &[PendingCommitEntry],
    max_attempts: u32,
    backoff: Duration,
) -> Result<CommitReport, String> {
    let mut attempt = 1;
    loop {
        match backend.commit_dataset_files(batch).await {
            Ok(report) => {
                tracing::debug!(
                    batch_size = batch.len(),
                    rejected = report.rejected.len(),
                    attempt,
                    "Commit batch answered"
                );
                return Ok(report);
            }
            Err(e) if e.is_recoverable() && attempt < max_attempts => {
                let delay = commit_retry_delay(backoff, attempt);
                tracing::warn!(
                    batch_size = batch.len(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Commit batch failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                log_plm_error(
                    &e,
                    &format!(
                        "Commit batch of {} file(s) failed after {} attempt(s)",
                        batch.len(),
                        attempt
                    ),
                );
                return Err(e.to_string());
            }
        }
    }
}

async fn remove_failed_attachments(
    backend: &dyn CommitBackend,
    events: &dyn EventSink,
    groups: &[PendingRemoval],
) {
    let results = join_all(groups.iter().map(|group| backend.remove_children(group))).await;

    for (group, result) in groups.iter().zip(results) {
        match result {
            Ok(()) => tracing::info!(
                container = %group.parent_obj.uid,
                removed = group.children_obj.len(),
                "Removed attachments of failed uploads"
            ),
            Err(e) => tracing::error!(
                container = %group.parent_obj.uid,
                children = group.children_obj.len(),
                error = %e,
                "Failed to remove attachments of failed uploads"
            ),
        }
    }

    let containers: Vec<ModelObject> = groups.iter().map(|g| g.parent_obj.clone()).collect();
    events.related_modified(&containers);
}
