use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::model::{ProjectId, TaskId};

pub mod mapping;
pub mod validation;

pub use mapping::{MappingForm, MappingStatus};
pub use validation::{ValidationForm, ValidationStatus};

/// Backend task-action endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Split,
    StopMapping,
    UnlockAfterMapping,
    StopValidation,
    UnlockAfterValidation,
}

impl ActionKind {
    pub fn slug(self) -> &'static str {
        match self {
            ActionKind::Split => "split",
            ActionKind::StopMapping => "stop-mapping",
            ActionKind::UnlockAfterMapping => "unlock-after-mapping",
            ActionKind::StopValidation => "stop-validation",
            ActionKind::UnlockAfterValidation => "unlock-after-validation",
        }
    }

    fn is_per_task(self) -> bool {
        matches!(
            self,
            ActionKind::Split | ActionKind::StopMapping | ActionKind::UnlockAfterMapping
        )
    }

    /// Modal shown when this action is attempted while the editor blocks.
    /// Everything but a split releases the lock.
    pub fn confirm_action(self) -> ConfirmAction {
        match self {
            ActionKind::Split => ConfirmAction::Split,
            _ => ConfirmAction::Unlock,
        }
    }

    /// Path relative to the API base, always with a trailing slash.
    pub fn path(self, project_id: ProjectId, task_id: TaskId) -> String {
        if self.is_per_task() {
            format!(
                "projects/{project_id}/tasks/actions/{}/{task_id}/",
                self.slug()
            )
        } else {
            format!("projects/{project_id}/tasks/actions/{}/", self.slug())
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A fully built POST against the task-action namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub path: String,
    pub body: Option<Value>,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, path: String, body: Option<Value>) -> Self {
        Self { kind, path, body }
    }

    pub fn with_body<B: Serialize>(kind: ActionKind, path: String, body: &B) -> Result<Self> {
        Ok(Self::new(kind, path, Some(serde_json::to_value(body)?)))
    }
}

/// Where the user goes once an action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    TaskList,
    /// Relative to the current task-action view, e.g. `?editor=ID`.
    Relative(String),
}

impl Navigation {
    pub fn to_path(&self, project_id: ProjectId) -> String {
        match self {
            Navigation::TaskList => format!("/projects/{project_id}/tasks/"),
            Navigation::Relative(rel) => format!("./{rel}"),
        }
    }
}

/// Reason a destructive action was held back while the editor is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Split,
    Unlock,
}

impl ConfirmAction {
    pub fn tag(self) -> &'static str {
        match self {
            ConfirmAction::Split => "split",
            ConfirmAction::Unlock => "unlock",
        }
    }

    pub fn message_key(self) -> &'static str {
        match self {
            ConfirmAction::Split => "unsavedChangesToSplit",
            ConfirmAction::Unlock => "unsavedChangesToUnlock",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub request: ActionRequest,
    pub then: Navigation,
}

/// Result of a user event on a completion form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    /// Nothing to do: missing status, or the editor blocks submission.
    Ignored,
    /// Show the unsaved-changes modal instead of calling the backend.
    Confirm(ConfirmAction),
    Dispatch(PendingAction),
}

impl FormOutcome {
    pub fn dispatch(request: ActionRequest) -> Self {
        FormOutcome::Dispatch(PendingAction {
            request,
            then: Navigation::TaskList,
        })
    }

    pub fn request(&self) -> Option<&ActionRequest> {
        match self {
            FormOutcome::Dispatch(p) => Some(&p.request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub comment: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_task_paths_carry_the_task_id() {
        assert_eq!(
            ActionKind::Split.path(3, 17),
            "projects/3/tasks/actions/split/17/"
        );
        assert_eq!(
            ActionKind::UnlockAfterMapping.path(3, 17),
            "projects/3/tasks/actions/unlock-after-mapping/17/"
        );
        assert_eq!(
            ActionKind::StopValidation.path(3, 17),
            "projects/3/tasks/actions/stop-validation/"
        );
    }

    #[test]
    fn navigation_paths() {
        assert_eq!(Navigation::TaskList.to_path(9), "/projects/9/tasks/");
        assert_eq!(
            Navigation::Relative("?editor=JOSM".into()).to_path(9),
            "./?editor=JOSM"
        );
    }
}
