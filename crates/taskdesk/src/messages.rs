use std::collections::BTreeMap;

const DEFAULTS: &[(&str, &str)] = &[
    ("completion", "Completion"),
    ("instructions", "Instructions"),
    ("history", "History"),
    ("editStatus", "Edit status"),
    ("completelyMapped", "Yes, I completely mapped this task"),
    ("incomplete", "No, the task still needs more mapping"),
    ("badImagery", "The imagery is bad"),
    ("markAsValid", "Yes, this task is valid"),
    ("markAsInvalid", "No, this task needs more mapping"),
    ("comment", "Comment"),
    ("submitTask", "Submit task"),
    ("submitTasks", "Submit tasks"),
    ("splitTask", "Split task"),
    ("selectAnotherTask", "Select another task"),
    ("stopValidation", "Stop validation"),
    ("reloadEditor", "Reload editor"),
    ("tasksMap", "Tasks map"),
    ("hideSidebar", "Hide sidebar"),
    ("showSidebar", "Show sidebar"),
    ("finishMappingTitle", "How to finish a task"),
    ("instructionsSelect", "Select one of the options above to set the task status"),
    ("instructionsComment", "Add a comment describing what you did or what is missing"),
    ("instructionsSubmit", "Submit the task to unlock it and return to the task list"),
    ("unsavedChanges", "You have unsaved changes"),
    (
        "unsavedChangesToSplit",
        "Save your edits in the editor or discard them before splitting this task.",
    ),
    (
        "unsavedChangesToUnlock",
        "Save your edits in the editor or discard them before selecting another task.",
    ),
    ("closeModal", "Close"),
    ("submissionFailed", "The task could not be updated"),
    ("retry", "Retry"),
    ("cancel", "Cancel"),
    ("noHistory", "No history for this task yet"),
    ("changesetComment", "Changeset comment"),
];

/// Localized text lookup. Unknown keys render as the key itself.
#[derive(Debug, Clone, Default)]
pub struct Messages {
    overrides: BTreeMap<String, String>,
}

impl Messages {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        if let Some(v) = self.overrides.get(key) {
            return v;
        }
        DEFAULTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(key)
    }
}
