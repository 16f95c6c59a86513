use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{ProjectId, TaskId, TaskSelection};
use crate::workflow::{ActionKind, ActionRequest, ConfirmAction, FormOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Validated,
    Invalidated,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 2] =
        [ValidationStatus::Validated, ValidationStatus::Invalidated];

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Validated => "VALIDATED",
            ValidationStatus::Invalidated => "INVALIDATED",
        }
    }

    pub fn message_key(self) -> &'static str {
        match self {
            ValidationStatus::Validated => "markAsValid",
            ValidationStatus::Invalidated => "markAsInvalid",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatedTask<'a> {
    task_id: TaskId,
    comment: &'a str,
    status: ValidationStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockAfterValidationBody<'a> {
    validated_tasks: Vec<ValidatedTask<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetTask<'a> {
    task_id: TaskId,
    comment: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopValidationBody<'a> {
    reset_tasks: Vec<ResetTask<'a>>,
}

/// Sidebar form for finishing a validation lock over one or more tasks.
#[derive(Debug, Clone)]
pub struct ValidationForm {
    project_id: ProjectId,
    tasks: TaskSelection,
    status: Option<ValidationStatus>,
    comment: String,
    modal: Option<ConfirmAction>,
}

impl ValidationForm {
    pub fn new(project_id: ProjectId, tasks: TaskSelection) -> Self {
        Self {
            project_id,
            tasks,
            status: None,
            comment: String::new(),
            modal: None,
        }
    }

    pub fn status(&self) -> Option<ValidationStatus> {
        self.status
    }

    pub fn select_status(&mut self, status: ValidationStatus) {
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

    pub fn can_submit(&self, disabled: bool) -> bool {
        !disabled && self.status.is_some()
    }

    /// `submitTasks` when more than one task is locked.
    pub fn submit_label_key(&self) -> &'static str {
        if self.tasks.is_multiple() {
            "submitTasks"
        } else {
            "submitTask"
        }
    }

    pub fn submit(&mut self, disabled: bool) -> Result<FormOutcome> {
        let Some(status) = self.status.filter(|_| !disabled) else {
            return Ok(FormOutcome::Ignored);
        };
        let body = UnlockAfterValidationBody {
            validated_tasks: self
                .tasks
                .ids()
                .iter()
                .map(|&task_id| ValidatedTask {
                    task_id,
                    comment: &self.comment,
                    status,
                })
                .collect(),
        };
        let req = ActionRequest::with_body(
            ActionKind::UnlockAfterValidation,
            ActionKind::UnlockAfterValidation.path(self.project_id, self.tasks.primary()),
            &body,
        )?;
        Ok(FormOutcome::dispatch(req))
    }

    pub fn stop(&mut self, disabled: bool) -> Result<FormOutcome> {
        if disabled {
            return Ok(self.defer(ConfirmAction::Unlock));
        }
        let body = StopValidationBody {
            reset_tasks: self
                .tasks
                .ids()
                .iter()
                .map(|&task_id| ResetTask {
                    task_id,
                    comment: &self.comment,
                })
                .collect(),
        };
        let req = ActionRequest::with_body(
            ActionKind::StopValidation,
            ActionKind::StopValidation.path(self.project_id, self.tasks.primary()),
            &body,
        )?;
        Ok(FormOutcome::dispatch(req))
    }

    pub(crate) fn defer(&mut self, action: ConfirmAction) -> FormOutcome {
        tracing::info!(action = action.tag(), "editor has unsaved changes, deferring");
        self.modal = Some(action);
        FormOutcome::Confirm(action)
    }

    pub fn modal(&self, disabled: bool) -> Option<ConfirmAction> {
        self.modal.filter(|_| disabled)
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }
}
