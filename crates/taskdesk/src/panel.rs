use chrono::{DateTime, Utc};

use crate::api::{ActionResponse, ActionTransport};
use crate::comment;
use crate::countdown::{Countdown, unlock_deadline};
use crate::editors::{self, EditorKind, EditorLaunch, EditorOption};
use crate::error::{Error, Result};
use crate::messages::Messages;
use crate::model::{ActiveTask, Project, TaskArea, TaskHistoryEntry, TaskSelection, WorkflowPhase};
use crate::workflow::{
    ConfirmAction, FormOutcome, MappingForm, MappingStatus, Navigation, PendingAction,
    ValidationForm, ValidationStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Completion,
    Instructions,
    History,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Completion, Section::Instructions, Section::History];

    pub fn message_key(self) -> &'static str {
        match self {
            Section::Completion => "completion",
            Section::Instructions => "instructions",
            Section::History => "history",
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompletionTab {
    Mapping(MappingForm),
    Validation(ValidationForm),
}

/// One status radio in the completion form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChoice {
    Mapping(MappingStatus),
    Validation(ValidationStatus),
}

impl StatusChoice {
    /// Case-insensitive wire name, e.g. `mapped` or `INVALIDATED`.
    pub fn parse(phase: WorkflowPhase, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let found = match phase {
            WorkflowPhase::Mapping => MappingStatus::ALL
                .into_iter()
                .find(|s| s.as_str().eq_ignore_ascii_case(raw))
                .map(StatusChoice::Mapping),
            WorkflowPhase::Validation => ValidationStatus::ALL
                .into_iter()
                .find(|s| s.as_str().eq_ignore_ascii_case(raw))
                .map(StatusChoice::Validation),
        };
        found.ok_or_else(|| Error::validation(format!("unknown {phase} status '{raw}'")))
    }

    pub fn message_key(self) -> &'static str {
        match self {
            StatusChoice::Mapping(s) => s.message_key(),
            StatusChoice::Validation(s) => s.message_key(),
        }
    }
}

#[derive(Debug)]
pub enum Submission {
    Idle,
    InFlight(PendingAction),
    Failed {
        pending: PendingAction,
        error: Error,
    },
    Done(Navigation),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryState {
    NotLoaded,
    Loading,
    Loaded(Vec<TaskHistoryEntry>),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct PanelOptions {
    pub optimistic_navigation: bool,
    pub default_editor: Option<EditorKind>,
    pub editor: Option<EditorKind>,
    pub area: Option<TaskArea>,
}

/// Sidebar + editor container for a set of locked tasks.
#[derive(Debug)]
pub struct TaskPanel {
    project: Project,
    phase: WorkflowPhase,
    active: Vec<ActiveTask>,
    tasks: TaskSelection,
    opts: PanelOptions,
    section: Section,
    show_sidebar: bool,
    show_task_map: bool,
    active_editor: Option<EditorKind>,
    disabled: bool,
    form: CompletionTab,
    submission: Submission,
    history: HistoryState,
    mention_candidates: Vec<String>,
}

impl TaskPanel {
    pub fn new(
        project: Project,
        phase: WorkflowPhase,
        active: Vec<ActiveTask>,
        opts: PanelOptions,
    ) -> Result<Self> {
        let tasks = TaskSelection::from_active(&active)?;
        let form = match phase {
            WorkflowPhase::Mapping => {
                CompletionTab::Mapping(MappingForm::new(project.project_id, tasks.clone()))
            }
            WorkflowPhase::Validation => {
                CompletionTab::Validation(ValidationForm::new(project.project_id, tasks.clone()))
            }
        };
        Ok(Self {
            active_editor: opts.editor,
            project,
            phase,
            active,
            tasks,
            opts,
            section: Section::Completion,
            show_sidebar: true,
            show_task_map: false,
            disabled: false,
            form,
            submission: Submission::Idle,
            history: HistoryState::NotLoaded,
            mention_candidates: Vec::new(),
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn tasks(&self) -> &TaskSelection {
        &self.tasks
    }

    pub fn area(&self) -> Option<TaskArea> {
        self.opts.area
    }

    pub fn form(&self) -> &CompletionTab {
        &self.form
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn select_section(&mut self, section: Section) {
        self.section = section;
    }

    pub fn next_section(&mut self) {
        let idx = Section::ALL.iter().position(|s| *s == self.section).unwrap_or(0);
        self.section = Section::ALL[(idx + 1) % Section::ALL.len()];
    }

    pub fn show_sidebar(&self) -> bool {
        self.show_sidebar
    }

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
    }

    /// The task-map popup only exists next to the embedded editor.
    pub fn task_map_available(&self) -> bool {
        self.active_editor == Some(EditorKind::Id)
    }

    pub fn show_task_map(&self) -> bool {
        self.show_task_map && self.task_map_available()
    }

    pub fn toggle_task_map(&mut self) {
        self.show_task_map = !self.show_task_map;
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Reported by the editor integration while it holds unsaved edits.
    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled != disabled {
            tracing::debug!(disabled, "editor blocking state changed");
        }
        self.disabled = disabled;
    }

    pub fn status_choices(&self) -> Vec<StatusChoice> {
        match self.phase {
            WorkflowPhase::Mapping => MappingStatus::ALL.into_iter().map(StatusChoice::Mapping).collect(),
            WorkflowPhase::Validation => ValidationStatus::ALL
                .into_iter()
                .map(StatusChoice::Validation)
                .collect(),
        }
    }

    pub fn selected_status(&self) -> Option<StatusChoice> {
        match &self.form {
            CompletionTab::Mapping(f) => f.status().map(StatusChoice::Mapping),
            CompletionTab::Validation(f) => f.status().map(StatusChoice::Validation),
        }
    }

    pub fn select_status(&mut self, choice: StatusChoice) -> Result<()> {
        match (&mut self.form, choice) {
            (CompletionTab::Mapping(f), StatusChoice::Mapping(s)) => f.select_status(s),
            (CompletionTab::Validation(f), StatusChoice::Validation(s)) => f.select_status(s),
            (_, other) => {
                return Err(Error::validation(format!(
                    "status {other:?} does not apply to {} tasks",
                    self.phase
                )));
            }
        }
        Ok(())
    }

    pub fn comment(&self) -> &str {
        match &self.form {
            CompletionTab::Mapping(f) => f.comment(),
            CompletionTab::Validation(f) => f.comment(),
        }
    }

    pub fn comment_mut(&mut self) -> &mut String {
        match &mut self.form {
            CompletionTab::Mapping(f) => f.comment_mut(),
            CompletionTab::Validation(f) => f.comment_mut(),
        }
    }

    pub fn set_comment<S: Into<String>>(&mut self, comment: S) {
        *self.comment_mut() = comment.into();
    }

    pub fn can_submit(&self) -> bool {
        let ready = match &self.form {
            CompletionTab::Mapping(f) => f.can_submit(self.disabled),
            CompletionTab::Validation(f) => f.can_submit(self.disabled),
        };
        ready && !self.is_busy()
    }

    pub fn submit_label_key(&self) -> &'static str {
        match &self.form {
            CompletionTab::Mapping(_) => "submitTask",
            CompletionTab::Validation(f) => f.submit_label_key(),
        }
    }

    pub fn submit_label<'a>(&self, messages: &'a Messages) -> &'a str {
        messages.get(self.submit_label_key())
    }

    /// Help panel exists only on the mapping form.
    pub fn toggle_help(&mut self) {
        if let CompletionTab::Mapping(f) = &mut self.form {
            f.toggle_help();
        }
    }

    pub fn help_visible(&self) -> bool {
        matches!(&self.form, CompletionTab::Mapping(f) if f.show_help())
    }

    pub fn submit(&mut self) -> Result<Option<PendingAction>> {
        let disabled = self.disabled;
        let outcome = match &mut self.form {
            CompletionTab::Mapping(f) => f.submit(disabled)?,
            CompletionTab::Validation(f) => f.submit(disabled)?,
        };
        Ok(self.begin(outcome))
    }

    /// Mapping only; validation has no split.
    pub fn split(&mut self) -> Result<Option<PendingAction>> {
        let disabled = self.disabled;
        let outcome = match &mut self.form {
            CompletionTab::Mapping(f) => f.split(disabled)?,
            CompletionTab::Validation(_) => {
                return Err(Error::validation("tasks under validation cannot be split"));
            }
        };
        Ok(self.begin(outcome))
    }

    /// Stop mapping / stop validation, returning the tasks.
    pub fn stop(&mut self) -> Result<Option<PendingAction>> {
        let disabled = self.disabled;
        let outcome = match &mut self.form {
            CompletionTab::Mapping(f) => f.stop(disabled)?,
            CompletionTab::Validation(f) => f.stop(disabled)?,
        };
        Ok(self.begin(outcome))
    }

    pub fn stop_label_key(&self) -> &'static str {
        match self.phase {
            WorkflowPhase::Mapping => "selectAnotherTask",
            WorkflowPhase::Validation => "stopValidation",
        }
    }

    fn begin(&mut self, outcome: FormOutcome) -> Option<PendingAction> {
        match outcome {
            FormOutcome::Ignored | FormOutcome::Confirm(_) => None,
            FormOutcome::Dispatch(pending) => {
                if self.is_busy() {
                    tracing::debug!(action = %pending.request.kind, "action already in flight");
                    return None;
                }
                self.submission = Submission::InFlight(pending.clone());
                Some(pending)
            }
        }
    }

    pub fn modal(&self) -> Option<ConfirmAction> {
        match &self.form {
            CompletionTab::Mapping(f) => f.modal(self.disabled),
            CompletionTab::Validation(f) => f.modal(self.disabled),
        }
    }

    pub fn close_modal(&mut self) {
        match &mut self.form {
            CompletionTab::Mapping(f) => f.close_modal(),
            CompletionTab::Validation(f) => f.close_modal(),
        }
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.submission, Submission::InFlight(_))
    }

    /// Feeds back the outcome of a dispatched action.
    pub fn complete(&mut self, pending: PendingAction, result: Result<ActionResponse>) {
        match result {
            Ok(res) => {
                tracing::info!(action = %pending.request.kind, status = res.status, "action done");
                self.submission = Submission::Done(pending.then);
            }
            Err(error) if self.opts.optimistic_navigation => {
                tracing::warn!(
                    action = %pending.request.kind,
                    error = %error,
                    "action failed, navigating anyway"
                );
                self.submission = Submission::Done(pending.then);
            }
            Err(error) => {
                tracing::warn!(action = %pending.request.kind, error = %error, "action failed");
                self.submission = Submission::Failed { pending, error };
            }
        }
    }

    /// Whether the current failure may be sent again.
    pub fn can_retry(&self) -> bool {
        matches!(&self.submission, Submission::Failed { error, .. } if error.is_retryable())
    }

    /// Re-dispatches a failed action. Rejections the backend would repeat
    /// are not resent, and a blocking editor gets the same modal as the
    /// original action; in both cases the failure stays on screen.
    pub fn retry(&mut self) -> Option<PendingAction> {
        let Submission::Failed { pending, error } = &self.submission else {
            return None;
        };
        if !error.is_retryable() {
            tracing::debug!(action = %pending.request.kind, error = %error, "failure is not retryable");
            return None;
        }
        if self.disabled {
            let action = pending.request.kind.confirm_action();
            match &mut self.form {
                CompletionTab::Mapping(f) => f.defer(action),
                CompletionTab::Validation(f) => f.defer(action),
            };
            return None;
        }
        let pending = pending.clone();
        self.submission = Submission::InFlight(pending.clone());
        Some(pending)
    }

    pub fn cancel_failure(&mut self) {
        if matches!(self.submission, Submission::Failed { .. }) {
            self.submission = Submission::Idle;
        }
    }

    /// Runs `pending` to completion on the calling thread.
    pub fn run_blocking(&mut self, transport: &dyn ActionTransport, pending: PendingAction) {
        let result = transport.post_action(&pending.request);
        self.complete(pending, result);
    }

    pub fn navigation(&self) -> Option<&Navigation> {
        match &self.submission {
            Submission::Done(nav) => Some(nav),
            _ => None,
        }
    }

    pub fn navigation_path(&self) -> Option<String> {
        self.navigation()
            .map(|nav| nav.to_path(self.project.project_id))
    }

    pub fn active_editor(&self) -> Option<EditorKind> {
        self.active_editor
    }

    pub fn editor_options(&self) -> Vec<EditorOption> {
        editors::editor_options(&self.project, self.phase)
    }

    pub fn dropdown_editor(&self) -> Option<EditorKind> {
        editors::selected_option(&self.editor_options(), self.active_editor)
    }

    /// Editor to auto-launch on open, when none was chosen yet.
    pub fn pending_auto_launch(&self) -> Option<EditorKind> {
        if self.active_editor.is_some() || !self.project.is_ready() {
            return None;
        }
        editors::initial_editor(&self.project, self.phase, self.opts.default_editor)
    }

    /// Marks `editor` active before its hand-off is attempted.
    pub fn choose_editor(&mut self, editor: EditorKind) -> Result<()> {
        if !self.editor_options().iter().any(|o| o.value == editor) {
            return Err(Error::validation(format!(
                "editor {editor} is not enabled for {} on project {}",
                self.phase, self.project.project_id
            )));
        }
        self.active_editor = Some(editor);
        Ok(())
    }

    pub fn editor_launched(&mut self, launch: &EditorLaunch) -> String {
        self.active_editor = Some(launch.editor);
        launch.navigation().to_path(self.project.project_id)
    }

    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    /// History is fetched once, on first visit to the tab.
    pub fn needs_history(&self) -> bool {
        self.section == Section::History && self.history == HistoryState::NotLoaded
    }

    pub fn history_requested(&mut self) {
        self.history = HistoryState::Loading;
    }

    pub fn history_loaded(&mut self, result: Result<Vec<TaskHistoryEntry>>) {
        self.history = match result {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.action_date.cmp(&a.action_date));
                HistoryState::Loaded(entries)
            }
            Err(e) => HistoryState::Failed(e.to_string()),
        };
    }

    pub fn changeset_hashtags(&self) -> Vec<String> {
        comment::changeset_hashtags(&self.project.changeset_comment)
    }

    pub fn mention_prefix(&self) -> Option<String> {
        comment::mention_prefix(self.comment()).map(str::to_string)
    }

    pub fn mention_candidates(&self) -> &[String] {
        &self.mention_candidates
    }

    /// Ignores answers for a prefix the user already typed past.
    pub fn users_found(&mut self, prefix: &str, usernames: Vec<String>) {
        if self.mention_prefix().as_deref() == Some(prefix) {
            self.mention_candidates = usernames;
        }
    }

    pub fn complete_mention(&mut self, username: &str) {
        let completed = comment::complete_mention(self.comment(), username);
        self.set_comment(completed);
        self.mention_candidates.clear();
    }

    pub fn clear_mentions(&mut self) {
        self.mention_candidates.clear();
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Option<Countdown> {
        self.active
            .first()
            .map(|t| Countdown::at(unlock_deadline(t), now))
    }

    /// `Project name · #1 #2`.
    pub fn title(&self) -> String {
        let ids = self.tasks.hash_labels().join(" ");
        if self.project.name().is_empty() {
            format!("#{} · {ids}", self.project.project_id)
        } else {
            format!("{} · {ids}", self.project.name())
        }
    }
}
