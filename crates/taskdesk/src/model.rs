use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::{deserialize_api_timestamp, deserialize_optional_api_timestamp};
use crate::editors::{CustomEditor, EditorKind};
use crate::error::{Error, Result};

pub type ProjectId = u64;
pub type TaskId = u64;

/// Which phase the locked tasks are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowPhase {
    Mapping,
    Validation,
}

impl WorkflowPhase {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MAPPING" => Ok(WorkflowPhase::Mapping),
            "VALIDATION" => Ok(WorkflowPhase::Validation),
            other => Err(Error::validation(format!(
                "unknown workflow phase '{other}' (expected MAPPING or VALIDATION)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowPhase::Mapping => "MAPPING",
            WorkflowPhase::Validation => "VALIDATION",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInfo {
    pub name: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub project_id: ProjectId,
    pub author: String,
    pub project_info: Option<ProjectInfo>,
    pub changeset_comment: String,
    pub mapping_editors: Vec<EditorKind>,
    pub validation_editors: Vec<EditorKind>,
    pub custom_editor: Option<CustomEditor>,
}

impl Project {
    pub fn name(&self) -> &str {
        self.project_info
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or_default()
    }

    pub fn instructions(&self) -> &str {
        self.project_info
            .as_ref()
            .map(|i| i.instructions.as_str())
            .unwrap_or_default()
    }

    pub fn editors_for(&self, phase: WorkflowPhase) -> &[EditorKind] {
        match phase {
            WorkflowPhase::Mapping => &self.mapping_editors,
            WorkflowPhase::Validation => &self.validation_editors,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.project_id > 0
    }
}

/// A task the current user holds a lock on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTask {
    pub task_id: TaskId,
    #[serde(deserialize_with = "deserialize_api_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub auto_unlock_seconds: i64,
}

/// Ordered, non-empty list of locked task ids. The first id is the
/// "primary" task for single-task endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelection {
    ids: Vec<TaskId>,
}

impl TaskSelection {
    pub fn new(ids: Vec<TaskId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(Error::validation("task selection must contain at least one task id"));
        }
        Ok(Self { ids })
    }

    pub fn from_active(tasks: &[ActiveTask]) -> Result<Self> {
        Self::new(tasks.iter().map(|t| t.task_id).collect())
    }

    pub fn primary(&self) -> TaskId {
        self.ids[0]
    }

    pub fn ids(&self) -> &[TaskId] {
        &self.ids
    }

    pub fn is_multiple(&self) -> bool {
        self.ids.len() > 1
    }

    /// `#12 #13` style label used in headers and the collapsed sidebar.
    pub fn hash_labels(&self) -> Vec<String> {
        self.ids.iter().map(|id| format!("#{id}")).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryEntry {
    #[serde(default)]
    pub history_id: Option<u64>,
    pub action: String,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(deserialize_with = "deserialize_api_timestamp")]
    pub action_date: DateTime<Utc>,
    pub action_by: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task_id: TaskId,
    #[serde(default)]
    pub task_history: Vec<TaskHistoryEntry>,
    #[serde(default, deserialize_with = "deserialize_optional_api_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_unlock_seconds: i64,
}

impl TaskDetail {
    /// Lock view of this task; fails when the backend reports no lock time.
    pub fn active(&self) -> Result<ActiveTask> {
        let last_updated = self.last_updated.ok_or_else(|| {
            Error::validation(format!("task {} carries no lock timestamp", self.task_id))
        })?;
        Ok(ActiveTask {
            task_id: self.task_id,
            last_updated,
            auto_unlock_seconds: self.auto_unlock_seconds,
        })
    }
}

/// Geographic extent of the selected tasks, `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskArea {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TaskArea {
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::validation(format!("invalid bbox '{raw}': {e}")))?;
        let [west, south, east, north] = parts[..] else {
            return Err(Error::validation(format!(
                "invalid bbox '{raw}': expected west,south,east,north"
            )));
        };
        if west > east || south > north {
            return Err(Error::validation(format!(
                "invalid bbox '{raw}': min corner exceeds max corner"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Web-map zoom level at which the whole area fits a typical viewport.
    pub fn zoom(&self) -> u8 {
        let span = (self.east - self.west).max(self.north - self.south);
        if span <= 0.0 {
            return 18;
        }
        let z = (360.0 / span).log2().floor();
        z.clamp(1.0, 18.0) as u8
    }
}
