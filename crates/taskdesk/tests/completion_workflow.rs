use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use serde_json::json;

use taskdesk::api::{ActionResponse, ActionTransport};
use taskdesk::countdown::unlock_deadline;
use taskdesk::editors::{EditorKind, EditorLaunch};
use taskdesk::messages::Messages;
use taskdesk::model::{ActiveTask, Project, TaskDetail, WorkflowPhase};
use taskdesk::panel::{PanelOptions, StatusChoice, Submission, TaskPanel};
use taskdesk::workflow::{ActionKind, ActionRequest, ConfirmAction, MappingStatus, ValidationStatus};
use taskdesk::{Error, Result};

/// Records every request; answers from a scripted queue, 200 once empty.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<ActionRequest>>,
    failures: Mutex<Vec<Error>>,
}

impl RecordingTransport {
    fn failing(err: Error) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(vec![err]),
        }
    }

    fn sent(&self) -> Vec<ActionRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl ActionTransport for RecordingTransport {
    fn post_action(&self, req: &ActionRequest) -> Result<ActionResponse> {
        self.sent.lock().unwrap().push(req.clone());
        if let Some(err) = self.failures.lock().unwrap().pop() {
            return Err(err);
        }
        Ok(ActionResponse {
            status: 200,
            body: Some(json!({"taskId": 1})),
        })
    }
}

fn project() -> Project {
    serde_json::from_value(json!({
        "projectId": 42,
        "projectInfo": {"name": "Flood response", "instructions": "Trace buildings"},
        "changesetComment": "#hotosm-project-42",
        "mappingEditors": ["ID", "JOSM", "POTLATCH_2"],
        "validationEditors": ["JOSM"]
    }))
    .unwrap()
}

fn locked(ids: &[u64]) -> Vec<ActiveTask> {
    ids.iter()
        .map(|&task_id| ActiveTask {
            task_id,
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            auto_unlock_seconds: 7200,
        })
        .collect()
}

fn panel(phase: WorkflowPhase, ids: &[u64]) -> TaskPanel {
    TaskPanel::new(project(), phase, locked(ids), PanelOptions::default()).unwrap()
}

fn drive(
    panel: &mut TaskPanel,
    transport: &RecordingTransport,
    act: fn(&mut TaskPanel) -> Result<Option<taskdesk::workflow::PendingAction>>,
) {
    if let Some(pending) = act(panel).unwrap() {
        panel.run_blocking(transport, pending);
    }
}

#[test]
fn submit_without_status_is_a_no_op() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    assert!(!p.can_submit());
    drive(&mut p, &transport, TaskPanel::submit);
    assert!(transport.sent().is_empty());
    assert!(p.navigation().is_none());
}

#[test]
fn mapped_submit_unlocks_after_mapping() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    p.select_status(StatusChoice::Mapping(MappingStatus::Mapped)).unwrap();
    p.set_comment("all buildings traced");
    drive(&mut p, &transport, TaskPanel::submit);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, ActionKind::UnlockAfterMapping);
    assert_eq!(sent[0].path, "projects/42/tasks/actions/unlock-after-mapping/7/");
    assert_eq!(
        sent[0].body,
        Some(json!({"comment": "all buildings traced", "status": "MAPPED"}))
    );
    assert_eq!(p.navigation_path().as_deref(), Some("/projects/42/tasks/"));
}

#[test]
fn bad_imagery_uses_the_wire_name() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    p.select_status(StatusChoice::Mapping(MappingStatus::BadImagery)).unwrap();
    drive(&mut p, &transport, TaskPanel::submit);
    assert_eq!(transport.sent()[0].body.as_ref().unwrap()["status"], json!("BADIMAGERY"));
}

#[test]
fn disabled_split_and_stop_open_modal_without_network() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    p.set_disabled(true);

    drive(&mut p, &transport, TaskPanel::split);
    assert_eq!(p.modal(), Some(ConfirmAction::Split));
    p.close_modal();
    assert_eq!(p.modal(), None);

    drive(&mut p, &transport, TaskPanel::stop);
    assert_eq!(p.modal(), Some(ConfirmAction::Unlock));

    // The modal disappears once the editor stops blocking.
    p.set_disabled(false);
    assert_eq!(p.modal(), None);
    assert!(transport.sent().is_empty());
}

#[test]
fn split_and_stop_mapping_target_the_primary_task() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    drive(&mut p, &transport, TaskPanel::split);

    let mut q = panel(WorkflowPhase::Mapping, &[7]);
    q.set_comment("out of time");
    drive(&mut q, &transport, TaskPanel::stop);

    let sent = transport.sent();
    assert_eq!(sent[0].path, "projects/42/tasks/actions/split/7/");
    assert_eq!(sent[0].body, None);
    assert_eq!(sent[1].path, "projects/42/tasks/actions/stop-mapping/7/");
    assert_eq!(sent[1].body, Some(json!({"comment": "out of time"})));
}

#[test]
fn validation_submit_covers_every_locked_task() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Validation, &[3, 4]);
    p.select_status(StatusChoice::Validation(ValidationStatus::Invalidated)).unwrap();
    p.set_comment("missing roads");
    drive(&mut p, &transport, TaskPanel::submit);

    let sent = transport.sent();
    assert_eq!(sent[0].path, "projects/42/tasks/actions/unlock-after-validation/");
    assert_eq!(
        sent[0].body,
        Some(json!({"validatedTasks": [
            {"taskId": 3, "comment": "missing roads", "status": "INVALIDATED"},
            {"taskId": 4, "comment": "missing roads", "status": "INVALIDATED"}
        ]}))
    );
}

#[test]
fn stop_validation_resets_every_locked_task() {
    let transport = RecordingTransport::default();
    let mut p = panel(WorkflowPhase::Validation, &[3, 4]);
    drive(&mut p, &transport, TaskPanel::stop);
    assert_eq!(
        transport.sent()[0].body,
        Some(json!({"resetTasks": [
            {"taskId": 3, "comment": ""},
            {"taskId": 4, "comment": ""}
        ]}))
    );
}

#[test]
fn submit_label_is_plural_only_for_several_tasks() {
    let m = Messages::default();
    assert_eq!(panel(WorkflowPhase::Validation, &[3]).submit_label(&m), "Submit task");
    assert_eq!(panel(WorkflowPhase::Validation, &[3, 4]).submit_label(&m), "Submit tasks");
}

#[test]
fn failed_submission_stays_until_retried() {
    let transport = RecordingTransport::failing(Error::status(503, "service unavailable"));
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    p.select_status(StatusChoice::Mapping(MappingStatus::Ready)).unwrap();
    drive(&mut p, &transport, TaskPanel::submit);
    assert!(matches!(p.submission(), Submission::Failed { .. }));
    assert!(p.navigation().is_none());

    let pending = p.retry().unwrap();
    p.run_blocking(&transport, pending);
    assert_eq!(p.navigation_path().as_deref(), Some("/projects/42/tasks/"));
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn rejected_submission_cannot_be_retried() {
    let transport = RecordingTransport::failing(Error::status(403, "task not locked by user"));
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    p.select_status(StatusChoice::Mapping(MappingStatus::Mapped)).unwrap();
    drive(&mut p, &transport, TaskPanel::submit);

    assert!(!p.can_retry());
    assert!(p.retry().is_none());
    assert!(matches!(p.submission(), Submission::Failed { .. }));
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn retry_waits_for_the_editor_to_save() {
    let transport = RecordingTransport::failing(Error::network("connection reset"));
    let mut p = panel(WorkflowPhase::Mapping, &[7]);
    drive(&mut p, &transport, TaskPanel::split);
    assert!(p.can_retry());

    p.set_disabled(true);
    assert!(p.retry().is_none());
    assert_eq!(p.modal(), Some(ConfirmAction::Split));
    assert_eq!(transport.sent().len(), 1);

    p.close_modal();
    p.set_disabled(false);
    let pending = p.retry().unwrap();
    p.run_blocking(&transport, pending);
    assert_eq!(p.navigation_path().as_deref(), Some("/projects/42/tasks/"));
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn optimistic_navigation_leaves_even_on_failure() {
    let transport = RecordingTransport::failing(Error::network("connection refused"));
    let opts = PanelOptions {
        optimistic_navigation: true,
        ..Default::default()
    };
    let mut p = TaskPanel::new(project(), WorkflowPhase::Mapping, locked(&[7]), opts).unwrap();
    drive(&mut p, &transport, TaskPanel::split);
    assert_eq!(p.navigation_path().as_deref(), Some("/projects/42/tasks/"));
}

#[test]
fn editor_options_follow_the_phase_and_fallback_navigation() {
    let mapping = panel(WorkflowPhase::Mapping, &[7]);
    let values: Vec<EditorKind> = mapping.editor_options().iter().map(|o| o.value).collect();
    assert_eq!(values, vec![EditorKind::Id, EditorKind::Josm, EditorKind::Potlatch2]);

    let mut validation = panel(WorkflowPhase::Validation, &[7]);
    assert_eq!(validation.dropdown_editor(), Some(EditorKind::Josm));
    let path = validation.editor_launched(&EditorLaunch {
        editor: EditorKind::Josm,
        url: None,
    });
    assert_eq!(path, "./?editor=JOSM");
    assert_eq!(validation.active_editor(), Some(EditorKind::Josm));
}

#[test]
fn countdown_deadline_adds_auto_unlock_seconds() {
    let task = &locked(&[7])[0];
    assert_eq!(
        unlock_deadline(task),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap())
    );
    let p = panel(WorkflowPhase::Mapping, &[7]);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 13, 15, 0).unwrap();
    assert_eq!(p.countdown(now).unwrap().label(), "45m left");
    let later = Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap();
    assert_eq!(p.countdown(later).unwrap().label(), "expired");
}

#[test]
fn absurd_auto_unlock_seconds_show_an_unknown_countdown() {
    let detail: TaskDetail = serde_json::from_value(json!({
        "taskId": 7,
        "lastUpdated": "2024-05-01T12:00:00.000000",
        "autoUnlockSeconds": 9_000_000_000_000_000_i64
    }))
    .unwrap();
    let active = detail.active().unwrap();
    assert_eq!(unlock_deadline(&active), None);

    let p = TaskPanel::new(project(), WorkflowPhase::Mapping, vec![active], PanelOptions::default())
        .unwrap();
    assert_eq!(p.countdown(Utc::now()).unwrap().label(), "unknown");
}
