use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use crate::api::{ActionResponse, ActionTransport, TaskReader};
use crate::editors::{self, EditorContext, EditorKind, EditorLaunch, RemoteControl};
use crate::error::Result;
use crate::model::{Project, ProjectId, TaskArea, TaskHistoryEntry, TaskId};
use crate::workflow::PendingAction;

/// Completion notices from background network calls.
#[derive(Debug)]
pub enum WorkerEvent {
    ActionFinished {
        pending: PendingAction,
        result: Result<ActionResponse>,
    },
    HistoryLoaded {
        task_id: TaskId,
        result: Result<Vec<TaskHistoryEntry>>,
    },
    UsersFound {
        prefix: String,
        result: Result<Vec<String>>,
    },
    EditorLaunched {
        result: Result<EditorLaunch>,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, ev: WorkerEvent);
}

pub struct ChannelSink {
    tx: mpsc::Sender<WorkerEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<WorkerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, ev: WorkerEvent) {
        // Receiver gone means the UI already exited.
        let _ = self.tx.send(ev);
    }
}

pub fn spawn_action(
    transport: Arc<dyn ActionTransport>,
    pending: PendingAction,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = transport.post_action(&pending.request);
        sink.emit(WorkerEvent::ActionFinished { pending, result });
    })
}

pub fn spawn_history(
    reader: Arc<dyn TaskReader>,
    project_id: ProjectId,
    task_id: TaskId,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = reader
            .task_detail(project_id, task_id)
            .map(|detail| detail.task_history);
        sink.emit(WorkerEvent::HistoryLoaded { task_id, result });
    })
}

pub fn spawn_user_search(
    reader: Arc<dyn TaskReader>,
    prefix: String,
    project_id: ProjectId,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = reader.search_users(&prefix, project_id);
        sink.emit(WorkerEvent::UsersFound { prefix, result });
    })
}

pub struct EditorJob {
    pub editor: EditorKind,
    pub project: Project,
    pub area: Option<TaskArea>,
    pub josm_remote_control: String,
}

pub fn spawn_editor_launch(
    job: EditorJob,
    remote: Option<Arc<dyn RemoteControl + Send + Sync>>,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let ctx = EditorContext {
            project: &job.project,
            area: job.area,
            josm_remote_control: &job.josm_remote_control,
            remote: remote.as_deref().map(|r| r as &dyn RemoteControl),
        };
        let result = editors::open_editor(job.editor, &ctx);
        sink.emit(WorkerEvent::EditorLaunched { result });
    })
}
