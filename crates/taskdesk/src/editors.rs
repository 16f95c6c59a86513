use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Project, TaskArea, WorkflowPhase};
use crate::workflow::Navigation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditorKind {
    #[serde(rename = "ID")]
    Id,
    #[serde(rename = "JOSM")]
    Josm,
    #[serde(rename = "POTLATCH_2")]
    Potlatch2,
    FieldPapers,
    Custom,
}

const KNOWN_EDITORS: [EditorKind; 4] = [
    EditorKind::Id,
    EditorKind::Josm,
    EditorKind::Potlatch2,
    EditorKind::FieldPapers,
];

impl EditorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EditorKind::Id => "ID",
            EditorKind::Josm => "JOSM",
            EditorKind::Potlatch2 => "POTLATCH_2",
            EditorKind::FieldPapers => "FIELD_PAPERS",
            EditorKind::Custom => "CUSTOM",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EditorKind::Id => "iD Editor",
            EditorKind::Josm => "JOSM",
            EditorKind::Potlatch2 => "Potlatch 2",
            EditorKind::FieldPapers => "Field Papers",
            EditorKind::Custom => "Custom editor",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ID" => Ok(EditorKind::Id),
            "JOSM" => Ok(EditorKind::Josm),
            "POTLATCH_2" | "POTLATCH2" => Ok(EditorKind::Potlatch2),
            "FIELD_PAPERS" | "FIELDPAPERS" => Ok(EditorKind::FieldPapers),
            "CUSTOM" => Ok(EditorKind::Custom),
            other => Err(Error::validation(format!("unknown editor '{other}'"))),
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomEditor {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOption {
    pub label: String,
    pub value: EditorKind,
}

/// Editors a user may pick for `phase`, in a stable order, with the
/// project's custom editor appended when it has one.
pub fn editor_options(project: &Project, phase: WorkflowPhase) -> Vec<EditorOption> {
    let allowed = project.editors_for(phase);
    let mut out: Vec<EditorOption> = KNOWN_EDITORS
        .iter()
        .copied()
        .filter(|e| allowed.contains(e))
        .map(|e| EditorOption {
            label: e.label().to_string(),
            value: e,
        })
        .collect();
    if let Some(custom) = project.custom_editor.as_ref().filter(|c| !c.url.is_empty()) {
        let label = if custom.name.trim().is_empty() {
            EditorKind::Custom.label().to_string()
        } else {
            custom.name.clone()
        };
        out.push(EditorOption {
            label,
            value: EditorKind::Custom,
        });
    }
    out
}

/// Value shown by the reselection dropdown.
pub fn selected_option(options: &[EditorOption], active: Option<EditorKind>) -> Option<EditorKind> {
    match active {
        Some(a) if options.iter().any(|o| o.value == a) => Some(a),
        _ => options.first().map(|o| o.value),
    }
}

/// Editor to launch when the panel opens with none chosen.
pub fn initial_editor(
    project: &Project,
    phase: WorkflowPhase,
    user_default: Option<EditorKind>,
) -> Option<EditorKind> {
    let allowed = project.editors_for(phase);
    match user_default {
        Some(d) if allowed.contains(&d) => Some(d),
        Some(_) => allowed.first().copied(),
        None => None,
    }
}

/// Fires remote-control requests at a locally running desktop editor.
pub trait RemoteControl {
    fn remote_get(&self, url: &Url) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorLaunch {
    pub editor: EditorKind,
    /// External hand-off URL; `None` means the fallback query navigation.
    pub url: Option<String>,
}

impl EditorLaunch {
    pub fn navigation(&self) -> Navigation {
        match self.url.as_deref() {
            Some(url) => Navigation::Relative(url.to_string()),
            None => Navigation::Relative(format!("?editor={}", self.editor.as_str())),
        }
    }
}

pub struct EditorContext<'a> {
    pub project: &'a Project,
    pub area: Option<TaskArea>,
    pub josm_remote_control: &'a str,
    pub remote: Option<&'a dyn RemoteControl>,
}

pub fn open_editor(editor: EditorKind, ctx: &EditorContext<'_>) -> Result<EditorLaunch> {
    let url = match editor {
        EditorKind::Id => None,
        EditorKind::Josm => {
            if let (Some(area), Some(remote)) = (ctx.area, ctx.remote) {
                let url = josm_load_and_zoom_url(ctx.josm_remote_control, &area, ctx.project)?;
                tracing::debug!(%url, "josm remote control");
                remote.remote_get(&url)?;
            }
            None
        }
        EditorKind::Potlatch2 => ctx.area.map(|a| {
            let (lat, lon) = a.center();
            format!(
                "https://www.openstreetmap.org/edit?editor=potlatch2#map={}/{lat:.5}/{lon:.5}",
                a.zoom()
            )
        }),
        EditorKind::FieldPapers => ctx.area.map(|a| {
            let (lat, lon) = a.center();
            format!("https://fieldpapers.org/compose#{}/{lat:.5}/{lon:.5}", a.zoom())
        }),
        EditorKind::Custom => {
            let custom = ctx
                .project
                .custom_editor
                .as_ref()
                .filter(|c| !c.url.is_empty())
                .ok_or_else(|| Error::validation("project has no custom editor configured"))?;
            ctx.area.map(|a| {
                let (lat, lon) = a.center();
                format!("{}#map={}/{lat:.5}/{lon:.5}", custom.url, a.zoom())
            })
        }
    };
    tracing::info!(editor = %editor, handoff = url.is_some(), "editor launched");
    Ok(EditorLaunch { editor, url })
}

fn josm_load_and_zoom_url(base: &str, area: &TaskArea, project: &Project) -> Result<Url> {
    let endpoint = format!("{}/load_and_zoom", base.trim_end_matches('/'));
    Url::parse_with_params(
        &endpoint,
        &[
            ("left", area.west.to_string()),
            ("right", area.east.to_string()),
            ("top", area.north.to_string()),
            ("bottom", area.south.to_string()),
            ("new_layer", "true".to_string()),
            ("changeset_comment", project.changeset_comment.clone()),
        ],
    )
    .map_err(|e| Error::config(format!("invalid JOSM remote control URL '{base}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn project() -> Project {
        Project {
            project_id: 5,
            mapping_editors: vec![EditorKind::Josm, EditorKind::Id],
            validation_editors: vec![EditorKind::Josm],
            changeset_comment: "#proj-5".into(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<String>>);

    impl RemoteControl for Recorder {
        fn remote_get(&self, url: &Url) -> Result<()> {
            self.0.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn options_follow_phase_and_custom_editor() {
        let mut p = project();
        let mapping: Vec<_> = editor_options(&p, WorkflowPhase::Mapping)
            .into_iter()
            .map(|o| o.value)
            .collect();
        assert_eq!(mapping, vec![EditorKind::Id, EditorKind::Josm]);

        p.custom_editor = Some(CustomEditor {
            name: "RapiD".into(),
            description: None,
            url: "https://rapid.example/edit".into(),
        });
        let validation = editor_options(&p, WorkflowPhase::Validation);
        assert_eq!(validation.len(), 2);
        assert_eq!(validation[1].label, "RapiD");
        assert_eq!(validation[1].value, EditorKind::Custom);
    }

    #[test]
    fn dropdown_falls_back_to_first_option() {
        let opts = editor_options(&project(), WorkflowPhase::Validation);
        assert_eq!(selected_option(&opts, Some(EditorKind::Id)), Some(EditorKind::Josm));
        assert_eq!(selected_option(&opts, Some(EditorKind::Josm)), Some(EditorKind::Josm));
        assert_eq!(selected_option(&[], None), None);
    }

    #[test]
    fn default_editor_must_be_allowed_for_phase() {
        let p = project();
        assert_eq!(
            initial_editor(&p, WorkflowPhase::Mapping, Some(EditorKind::Id)),
            Some(EditorKind::Id)
        );
        assert_eq!(
            initial_editor(&p, WorkflowPhase::Validation, Some(EditorKind::Id)),
            Some(EditorKind::Josm)
        );
        assert_eq!(initial_editor(&p, WorkflowPhase::Mapping, None), None);
    }

    #[test]
    fn embedded_editor_falls_back_to_query_navigation() {
        let p = project();
        let ctx = EditorContext {
            project: &p,
            area: None,
            josm_remote_control: "http://127.0.0.1:8111",
            remote: None,
        };
        let launch = open_editor(EditorKind::Id, &ctx).unwrap();
        assert_eq!(launch.navigation().to_path(5), "./?editor=ID");
    }

    #[test]
    fn josm_uses_remote_control_and_falls_back() {
        let p = project();
        let rec = Recorder::default();
        let ctx = EditorContext {
            project: &p,
            area: Some(TaskArea::parse("1,2,3,4").unwrap()),
            josm_remote_control: "http://127.0.0.1:8111/",
            remote: Some(&rec),
        };
        let launch = open_editor(EditorKind::Josm, &ctx).unwrap();
        assert_eq!(launch.url, None);
        assert_eq!(launch.navigation().to_path(5), "./?editor=JOSM");
        let calls = rec.0.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("http://127.0.0.1:8111/load_and_zoom?left=1&right=3&top=4&bottom=2"));
        assert!(calls[0].contains("changeset_comment=%23proj-5"));
    }

    #[test]
    fn url_editors_hand_off_with_map_hash() {
        let p = project();
        let ctx = EditorContext {
            project: &p,
            area: Some(TaskArea::parse("10,20,10.5,20.25").unwrap()),
            josm_remote_control: "",
            remote: None,
        };
        let launch = open_editor(EditorKind::Potlatch2, &ctx).unwrap();
        assert_eq!(
            launch.url.as_deref(),
            Some("https://www.openstreetmap.org/edit?editor=potlatch2#map=9/20.12500/10.25000")
        );
        assert!(open_editor(EditorKind::Custom, &ctx).is_err());
    }
}
