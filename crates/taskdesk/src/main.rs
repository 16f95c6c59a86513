use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use taskdesk::api::{HttpClient, TaskReader};
use taskdesk::config::{LogConfig, Settings};
use taskdesk::editors::{self, EditorContext, EditorKind};
use taskdesk::messages::Messages;
use taskdesk::model::{ProjectId, TaskArea, TaskId, WorkflowPhase};
use taskdesk::panel::{PanelOptions, StatusChoice, Submission, TaskPanel};
use taskdesk::text_sanitize::sanitize_line;
use taskdesk::workflow::PendingAction;
use taskdesk::{Error, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to a taskdesk TOML config (default: ./taskdesk.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Terminal panel for finishing locked tasks
    Tui {
        project: ProjectId,
        /// Locked task ids; the first one is the primary task
        #[arg(required = true)]
        tasks: Vec<TaskId>,
        /// MAPPING or VALIDATION
        #[arg(long, default_value = "MAPPING")]
        phase: String,
        /// Task area as west,south,east,north
        #[arg(long)]
        bbox: Option<String>,
        /// Editor already running (skips the automatic launch)
        #[arg(long)]
        editor: Option<String>,
    },
    /// Finish, split or release a mapping lock
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },
    /// Finish or release a validation lock
    Validation {
        #[command(subcommand)]
        action: ValidationAction,
    },
    /// Print the history of a task
    History { project: ProjectId, task: TaskId },
    /// List the editors a project allows, optionally launching one
    Editors {
        project: ProjectId,
        #[arg(long, default_value = "MAPPING")]
        phase: String,
        #[arg(long)]
        launch: Option<String>,
        #[arg(long)]
        bbox: Option<String>,
    },
    /// Load config and print the fully-resolved TOML (after imports/extends)
    Resolve,
}

#[derive(Debug, Subcommand)]
enum MappingAction {
    /// Submit MAPPED, READY or BADIMAGERY
    Submit {
        project: ProjectId,
        task: TaskId,
        #[arg(long)]
        status: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Split { project: ProjectId, task: TaskId },
    /// Stop mapping and return the task
    Stop {
        project: ProjectId,
        task: TaskId,
        #[arg(long, default_value = "")]
        comment: String,
    },
}

#[derive(Debug, Subcommand)]
enum ValidationAction {
    /// Submit VALIDATED or INVALIDATED for every task
    Submit {
        project: ProjectId,
        #[arg(required = true)]
        tasks: Vec<TaskId>,
        #[arg(long)]
        status: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Stop validation and reset every task
    Stop {
        project: ProjectId,
        #[arg(required = true)]
        tasks: Vec<TaskId>,
        #[arg(long, default_value = "")]
        comment: String,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let doc = taskdesk::config::load_or_default(args.config.as_deref())?;
    if let Command::Resolve = args.cmd {
        // Best-effort pretty print of resolved config.
        let s = toml::to_string_pretty(&doc.value).unwrap_or_else(|_| format!("{:?}", doc.value));
        print!("{s}");
        return Ok(());
    }

    let settings = doc.settings()?;
    init_logging(&settings.log, matches!(args.cmd, Command::Tui { .. }))?;
    tracing::debug!(config = %doc.path.display(), "configuration loaded");

    match args.cmd {
        Command::Tui {
            project,
            tasks,
            phase,
            bbox,
            editor,
        } => cmd_tui(&settings, project, &tasks, &phase, bbox.as_deref(), editor.as_deref()),
        Command::Mapping { action } => cmd_mapping(&settings, action),
        Command::Validation { action } => cmd_validation(&settings, action),
        Command::History { project, task } => cmd_history(&settings, project, task),
        Command::Editors {
            project,
            phase,
            launch,
            bbox,
        } => cmd_editors(&settings, project, &phase, launch.as_deref(), bbox.as_deref()),
        Command::Resolve => Ok(()),
    }
}

fn init_logging(cfg: &LogConfig, to_file: bool) -> Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.filter))
    };
    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| Error::msg(format!("failed to install logger: {e}")))?;
        return Ok(());
    }

    // The terminal belongs to the TUI; logs go to a file.
    if let Some(parent) = cfg.file.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::config(format!(
                "failed to create log directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.file)
        .map_err(|e| {
            Error::config(format!(
                "failed to open log file '{}': {e}",
                cfg.file.display()
            ))
        })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));
    let installed = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::msg(format!("failed to install logger: {e}")))
}

fn client(settings: &Settings) -> Result<HttpClient> {
    Ok(HttpClient::from_config(&settings.api)?.with_locale(&settings.user.locale))
}

fn parse_area(bbox: Option<&str>) -> Result<Option<TaskArea>> {
    bbox.map(TaskArea::parse).transpose()
}

fn parse_editor(raw: Option<&str>) -> Result<Option<EditorKind>> {
    raw.map(EditorKind::parse).transpose()
}

/// Fetches project and lock state and builds the panel the commands drive.
fn load_panel(
    settings: &Settings,
    client: &HttpClient,
    project_id: ProjectId,
    tasks: &[TaskId],
    phase: WorkflowPhase,
    opts: PanelOptions,
) -> Result<TaskPanel> {
    let project = client.project(project_id)?;
    let active = tasks
        .iter()
        .map(|&t| client.task_detail(project_id, t)?.active())
        .collect::<Result<Vec<_>>>()?;
    TaskPanel::new(
        project,
        phase,
        active,
        PanelOptions {
            optimistic_navigation: settings.workflow.optimistic_navigation,
            default_editor: settings.user.default_editor,
            ..opts
        },
    )
}

fn cmd_tui(
    settings: &Settings,
    project: ProjectId,
    tasks: &[TaskId],
    phase: &str,
    bbox: Option<&str>,
    editor: Option<&str>,
) -> Result<()> {
    let phase = WorkflowPhase::parse(phase)?;
    let client = Arc::new(client(settings)?);
    let opts = PanelOptions {
        editor: parse_editor(editor)?,
        area: parse_area(bbox)?,
        ..Default::default()
    };
    let panel = load_panel(settings, &client, project, tasks, phase, opts)?;
    let session = taskdesk::ui::Session {
        panel,
        messages: Messages::new(settings.messages.clone()),
        editors: settings.editors.clone(),
        transport: client.clone(),
        reader: client.clone(),
        remote: Some(client),
    };
    if let Some(path) = taskdesk::ui::run_tui(session)? {
        println!("{path}");
    }
    Ok(())
}

fn finish(
    client: &HttpClient,
    panel: &mut TaskPanel,
    pending: Option<PendingAction>,
) -> Result<()> {
    let Some(pending) = pending else {
        return Err(Error::validation("nothing to send: no status selected"));
    };
    panel.run_blocking(client, pending);
    if let Submission::Failed { error, .. } = panel.submission() {
        return Err(Error::with_kind(error.kind(), error.message()));
    }
    if let Some(path) = panel.navigation_path() {
        println!("{path}");
    }
    Ok(())
}

fn cmd_mapping(settings: &Settings, action: MappingAction) -> Result<()> {
    let client = client(settings)?;
    let (project, task) = match &action {
        MappingAction::Submit { project, task, .. }
        | MappingAction::Split { project, task }
        | MappingAction::Stop { project, task, .. } => (*project, *task),
    };
    let mut panel = load_panel(
        settings,
        &client,
        project,
        &[task],
        WorkflowPhase::Mapping,
        PanelOptions::default(),
    )?;
    let pending = match action {
        MappingAction::Submit {
            status, comment, ..
        } => {
            panel.select_status(StatusChoice::parse(WorkflowPhase::Mapping, &status)?)?;
            panel.set_comment(comment);
            panel.submit()?
        }
        MappingAction::Split { .. } => panel.split()?,
        MappingAction::Stop { comment, .. } => {
            panel.set_comment(comment);
            panel.stop()?
        }
    };
    finish(&client, &mut panel, pending)
}

fn cmd_validation(settings: &Settings, action: ValidationAction) -> Result<()> {
    let client = client(settings)?;
    let (project, tasks) = match &action {
        ValidationAction::Submit { project, tasks, .. }
        | ValidationAction::Stop { project, tasks, .. } => (*project, tasks.clone()),
    };
    let mut panel = load_panel(
        settings,
        &client,
        project,
        &tasks,
        WorkflowPhase::Validation,
        PanelOptions::default(),
    )?;
    let pending = match action {
        ValidationAction::Submit {
            status, comment, ..
        } => {
            panel.select_status(StatusChoice::parse(WorkflowPhase::Validation, &status)?)?;
            panel.set_comment(comment);
            panel.submit()?
        }
        ValidationAction::Stop { comment, .. } => {
            panel.set_comment(comment);
            panel.stop()?
        }
    };
    finish(&client, &mut panel, pending)
}

fn cmd_history(settings: &Settings, project: ProjectId, task: TaskId) -> Result<()> {
    let client = client(settings)?;
    let detail = client.task_detail(project, task)?;
    if detail.task_history.is_empty() {
        println!("{}", Messages::new(settings.messages.clone()).get("noHistory"));
        return Ok(());
    }
    for h in &detail.task_history {
        println!(
            "{}  {:<20}  {}",
            h.action_date.format("%Y-%m-%d %H:%M"),
            sanitize_line(&h.action_by),
            sanitize_line(h.action_text.as_deref().unwrap_or(h.action.as_str()))
        );
    }
    Ok(())
}

fn cmd_editors(
    settings: &Settings,
    project_id: ProjectId,
    phase: &str,
    launch: Option<&str>,
    bbox: Option<&str>,
) -> Result<()> {
    let phase = WorkflowPhase::parse(phase)?;
    let client = client(settings)?;
    let project = client.project(project_id)?;
    let options = editors::editor_options(&project, phase);
    let Some(editor) = parse_editor(launch)? else {
        for o in &options {
            println!("{:<12} {}", o.value.as_str(), sanitize_line(&o.label));
        }
        return Ok(());
    };
    if !options.iter().any(|o| o.value == editor) {
        return Err(Error::validation(format!(
            "editor {editor} is not enabled for {phase} on project {project_id}"
        )));
    }
    let ctx = EditorContext {
        project: &project,
        area: parse_area(bbox)?,
        josm_remote_control: &settings.editors.josm_remote_control,
        remote: Some(&client),
    };
    let launched = editors::open_editor(editor, &ctx)?;
    if let Some(url) = launched.url.as_deref()
        && settings.editors.open_in_browser
    {
        taskdesk::ui::open_url_in_browser(url)?;
    }
    println!("{}", launched.navigation().to_path(project_id));
    Ok(())
}
