//! In-memory collaborators for coordinator and drop-flow tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use docdrop_core::models::{
    CommitReport, CreateAttachInput, CreateAttachResponse, DatasetFileInfo, ModelObject,
    PendingCommitEntry,
    PendingRemoval, RenderRequest, SourceFile, Ticket, UploadResponse, UploadTask,
};
use docdrop_core::{CommitBackend, DocumentService, EventSink, PlmError, PlmResult, UploadTransport};
use docdrop_upload::{CoordinatorConfig, UploadCommitCoordinator};

pub const FMS_ENDPOINT: &str = "http://plm.test/fms/fmsupload/";

pub fn folder(uid: &str) -> ModelObject {
    ModelObject::new(uid, "Folder")
}

pub fn task(name: &str, container: &ModelObject) -> UploadTask {
    UploadTask {
        attachment: ModelObject::new(format!("ds-{}", name), "Text"),
        container: container.clone(),
        file_info: DatasetFileInfo {
            file_name: name.to_string(),
            is_text: true,
            named_reference_name: "Text".to_string(),
        },
        ticket: Ticket::new(format!("ticket-{}", name)),
        source: SourceFile::new(name, format!("content of {}", name).into_bytes()),
    }
}

pub fn tasks(names: &[&str], container: &ModelObject) -> Vec<UploadTask> {
    names.iter().map(|n| task(n, container)).collect()
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        quiet_period: Duration::from_millis(1000),
        max_wait: Duration::from_millis(10_000),
        commit_max_attempts: 3,
        commit_retry_backoff: Duration::from_millis(500),
    }
}

/// Upload endpoint answering per file name. Unknown files get 200 OK
/// after `default_delay`.
#[derive(Default)]
pub struct FakeTransport {
    statuses: Mutex<HashMap<String, (u16, String)>>,
    delays: Mutex<HashMap<String, Duration>>,
    unreachable: Mutex<Vec<String>>,
    panics: Mutex<Vec<String>>,
    pub default_delay: Duration,
    pub uploaded: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            default_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    pub fn respond(self, file_name: &str, status: u16, status_text: &str) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(file_name.to_string(), (status, status_text.to_string()));
        self
    }

    pub fn delay(self, file_name: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(file_name.to_string(), delay);
        self
    }

    pub fn unreachable(self, file_name: &str) -> Self {
        self.unreachable.lock().unwrap().push(file_name.to_string());
        self
    }

    /// The upload of `file_name` panics instead of answering.
    pub fn panic_on(self, file_name: &str) -> Self {
        self.panics.lock().unwrap().push(file_name.to_string());
        self
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    fn endpoint(&self) -> &str {
        FMS_ENDPOINT
    }

    async fn upload(&self, file: &SourceFile, ticket: &Ticket) -> PlmResult<UploadResponse> {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&file.name)
            .copied()
            .unwrap_or(self.default_delay);
        sleep(delay).await;

        if self.panics.lock().unwrap().contains(&file.name) {
            panic!("upload of {} crashed", file.name);
        }

        self.uploaded
            .lock()
            .unwrap()
            .push((file.name.clone(), ticket.as_str().to_string()));

        if self.unreachable.lock().unwrap().contains(&file.name) {
            return Err(PlmError::Transport("connection refused".to_string()));
        }

        let status = self.statuses.lock().unwrap().get(&file.name).cloned();
        Ok(match status {
            Some((status, text)) => UploadResponse::new(status, text),
            None => UploadResponse::ok(),
        })
    }
}

/// Commit/remove backend recording every call.
#[derive(Default)]
pub struct FakeBackend {
    pub commit_delay: Duration,
    commit_failures: Mutex<VecDeque<PlmError>>,
    commit_rejections: Mutex<HashMap<String, String>>,
    pub commits: Mutex<Vec<(Instant, Vec<String>)>>,
    pub removals: Mutex<Vec<PendingRemoval>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fail_removals: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    pub fn with_failing_removals(mut self) -> Self {
        self.fail_removals = true;
        self
    }

    /// Fail the next commit calls with these errors, in order.
    pub fn fail_commits(self, errors: Vec<PlmError>) -> Self {
        self.commit_failures.lock().unwrap().extend(errors);
        self
    }

    /// Refuse attachment `uid` in every commit that contains it.
    pub fn reject_on_commit(self, uid: &str, reason: &str) -> Self {
        self.commit_rejections
            .lock()
            .unwrap()
            .insert(uid.to_string(), reason.to_string());
        self
    }

    pub fn commit_batches(&self) -> Vec<Vec<String>> {
        self.commits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, files)| files.clone())
            .collect()
    }

    pub fn commit_times(&self) -> Vec<Instant> {
        self.commits.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn removal_groups(&self) -> Vec<PendingRemoval> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommitBackend for FakeBackend {
    async fn commit_dataset_files(
        &self,
        entries: &[PendingCommitEntry],
    ) -> PlmResult<CommitReport> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.commits.lock().unwrap().push((
            Instant::now(),
            entries.iter().map(|e| e.file_name().to_string()).collect(),
        ));

        sleep(self.commit_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.commit_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let rejections = self.commit_rejections.lock().unwrap();
        Ok(entries
            .iter()
            .filter_map(|e| rejections.get(&e.dataset.uid).map(|r| (&e.dataset.uid, r)))
            .fold(CommitReport::all_committed(), |report, (uid, reason)| {
                report.reject(uid.as_str(), reason.as_str())
            }))
    }

    async fn remove_children(&self, removal: &PendingRemoval) -> PlmResult<()> {
        self.removals.lock().unwrap().push(removal.clone());
        if self.fail_removals {
            return Err(PlmError::Http {
                operation: "removeChildren".to_string(),
                status: 500,
                body: String::new(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub started: AtomicUsize,
    pub ended: AtomicUsize,
    pub related_modified: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn modified_uids(&self) -> Vec<String> {
        self.related_modified.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn progress_start(&self, endpoint: &str) {
        assert_eq!(endpoint, FMS_ENDPOINT);
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn progress_end(&self, endpoint: &str) {
        assert_eq!(endpoint, FMS_ENDPOINT);
        self.ended.fetch_add(1, Ordering::SeqCst);
    }

    fn related_modified(&self, objects: &[ModelObject]) {
        self.related_modified
            .lock()
            .unwrap()
            .extend(objects.iter().map(|o| o.uid.clone()));
    }
}

/// Document service replaying canned responses.
pub struct FakeDocuments {
    pub preference: Option<String>,
    pub create_response: Mutex<Option<PlmResult<CreateAttachResponse>>>,
    pub paste_error: Mutex<Option<PlmError>>,
    pub render_error: Mutex<Option<PlmError>>,
    pub create_inputs: Mutex<Vec<CreateAttachInput>>,
    pub pasted: Mutex<Vec<(String, Vec<String>, String)>>,
    pub rendered: Mutex<Vec<RenderRequest>>,
}

impl FakeDocuments {
    pub fn new(preference: Option<&str>) -> Self {
        Self {
            preference: preference.map(str::to_string),
            create_response: Mutex::new(None),
            paste_error: Mutex::new(None),
            render_error: Mutex::new(None),
            create_inputs: Mutex::new(Vec::new()),
            pasted: Mutex::new(Vec::new()),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn with_create_response(self, response: PlmResult<CreateAttachResponse>) -> Self {
        *self.create_response.lock().unwrap() = Some(response);
        self
    }
}

#[async_trait]
impl DocumentService for FakeDocuments {
    async fn string_preference(&self, _name: &str) -> PlmResult<Option<String>> {
        Ok(self.preference.clone())
    }

    async fn create_attach_and_submit(
        &self,
        inputs: &[CreateAttachInput],
    ) -> PlmResult<CreateAttachResponse> {
        self.create_inputs.lock().unwrap().extend(inputs.iter().cloned());
        self.create_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(PlmError::Internal("no canned create response".to_string())))
    }

    async fn paste_objects(
        &self,
        target: &ModelObject,
        objects: &[ModelObject],
        relation_type: &str,
    ) -> PlmResult<()> {
        if let Some(err) = self.paste_error.lock().unwrap().take() {
            return Err(err);
        }
        self.pasted.lock().unwrap().push((
            target.uid.clone(),
            objects.iter().map(|o| o.uid.clone()).collect(),
            relation_type.to_string(),
        ));
        Ok(())
    }

    async fn submit_render(&self, requests: &[RenderRequest]) -> PlmResult<()> {
        self.rendered.lock().unwrap().extend(requests.iter().cloned());
        match self.render_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub transport: Arc<FakeTransport>,
    pub events: Arc<RecordingEvents>,
    pub coordinator: UploadCommitCoordinator,
}

pub fn harness(backend: FakeBackend, transport: FakeTransport, config: CoordinatorConfig) -> Harness {
    let backend = Arc::new(backend);
    let transport = Arc::new(transport);
    let events = Arc::new(RecordingEvents::default());
    let coordinator = UploadCommitCoordinator::new(
        backend.clone(),
        transport.clone(),
        events.clone(),
        config,
    );
    Harness {
        backend,
        transport,
        events,
        coordinator,
    }
}
