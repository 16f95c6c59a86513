use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{ProjectId, TaskSelection};
use crate::workflow::{ActionKind, ActionRequest, CommentBody, ConfirmAction, FormOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MappingStatus {
    Mapped,
    /// Incomplete: the task goes back to the pool unchanged.
    Ready,
    #[serde(rename = "BADIMAGERY")]
    BadImagery,
}

impl MappingStatus {
    pub const ALL: [MappingStatus; 3] = [
        MappingStatus::Mapped,
        MappingStatus::Ready,
        MappingStatus::BadImagery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MappingStatus::Mapped => "MAPPED",
            MappingStatus::Ready => "READY",
            MappingStatus::BadImagery => "BADIMAGERY",
        }
    }

    pub fn message_key(self) -> &'static str {
        match self {
            MappingStatus::Mapped => "completelyMapped",
            MappingStatus::Ready => "incomplete",
            MappingStatus::BadImagery => "badImagery",
        }
    }

    fn request(
        self,
        project_id: ProjectId,
        tasks: &TaskSelection,
        comment: &str,
    ) -> Result<ActionRequest> {
        let task_id = tasks.primary();
        match self {
            MappingStatus::Ready => ActionRequest::with_body(
                ActionKind::StopMapping,
                ActionKind::StopMapping.path(project_id, task_id),
                &CommentBody { comment },
            ),
            MappingStatus::Mapped | MappingStatus::BadImagery => ActionRequest::with_body(
                ActionKind::UnlockAfterMapping,
                ActionKind::UnlockAfterMapping.path(project_id, task_id),
                &UnlockAfterMappingBody {
                    comment,
                    status: self,
                },
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct UnlockAfterMappingBody<'a> {
    comment: &'a str,
    status: MappingStatus,
}

/// Sidebar form for finishing a mapping lock.
#[derive(Debug, Clone)]
pub struct MappingForm {
    project_id: ProjectId,
    tasks: TaskSelection,
    status: Option<MappingStatus>,
    comment: String,
    show_help: bool,
    modal: Option<ConfirmAction>,
}

impl MappingForm {
    pub fn new(project_id: ProjectId, tasks: TaskSelection) -> Self {
        Self {
            project_id,
            tasks,
            status: None,
            comment: String::new(),
            show_help: false,
            modal: None,
        }
    }

    pub fn status(&self) -> Option<MappingStatus> {
        self.status
    }

    pub fn select_status(&mut self, status: MappingStatus) {
        self.status = Some(status);
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment<S: Into<String>>(&mut self, comment: S) {
        self.comment = comment.into();
    }

    pub fn comment_mut(&mut self) -> &mut String {
        &mut self.comment
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn can_submit(&self, disabled: bool) -> bool {
        !disabled && self.status.is_some()
    }

    pub fn submit(&mut self, disabled: bool) -> Result<FormOutcome> {
        let Some(status) = self.status.filter(|_| !disabled) else {
            return Ok(FormOutcome::Ignored);
        };
        let req = status.request(self.project_id, &self.tasks, &self.comment)?;
        Ok(FormOutcome::dispatch(req))
    }

    pub fn split(&mut self, disabled: bool) -> Result<FormOutcome> {
        if disabled {
            return Ok(self.defer(ConfirmAction::Split));
        }
        let path = ActionKind::Split.path(self.project_id, self.tasks.primary());
        Ok(FormOutcome::dispatch(ActionRequest::new(
            ActionKind::Split,
            path,
            None,
        )))
    }

    pub fn stop(&mut self, disabled: bool) -> Result<FormOutcome> {
        if disabled {
            return Ok(self.defer(ConfirmAction::Unlock));
        }
        let req = ActionRequest::with_body(
            ActionKind::StopMapping,
            ActionKind::StopMapping.path(self.project_id, self.tasks.primary()),
            &CommentBody {
                comment: &self.comment,
            },
        )?;
        Ok(FormOutcome::dispatch(req))
    }

    pub(crate) fn defer(&mut self, action: ConfirmAction) -> FormOutcome {
        tracing::info!(action = action.tag(), "editor has unsaved changes, deferring");
        self.modal = Some(action);
        FormOutcome::Confirm(action)
    }

    /// Modal to render; only while the editor is still blocking.
    pub fn modal(&self, disabled: bool) -> Option<ConfirmAction> {
        self.modal.filter(|_| disabled)
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }
}
