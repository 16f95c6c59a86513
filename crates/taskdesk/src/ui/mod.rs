use std::io::{self, Stdout};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::{Command, Stdio};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use chrono::Utc;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Widget, Wrap,
};

use crate::api::{ActionTransport, TaskReader};
use crate::config::EditorsConfig;
use crate::countdown::Countdown;
use crate::editors::{EditorKind, EditorLaunch, RemoteControl};
use crate::error::{Error, Result};
use crate::messages::Messages;
use crate::panel::{CompletionTab, HistoryState, Section, StatusChoice, Submission, TaskPanel};
use crate::text_sanitize::{sanitize_block, sanitize_line};
use crate::worker::{self, ChannelSink, EditorJob, EventSink, WorkerEvent};
use crate::workflow::PendingAction;

/// Everything the terminal panel needs, built by the caller.
pub struct Session {
    pub panel: TaskPanel,
    pub messages: Messages,
    pub editors: EditorsConfig,
    pub transport: Arc<dyn ActionTransport>,
    pub reader: Arc<dyn TaskReader>,
    pub remote: Option<Arc<dyn RemoteControl + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    EditComment,
    PickEditor,
}

struct App {
    panel: TaskPanel,
    messages: Messages,
    editors: EditorsConfig,

    transport: Arc<dyn ActionTransport>,
    reader: Arc<dyn TaskReader>,
    remote: Option<Arc<dyn RemoteControl + Send + Sync>>,
    sink: Arc<dyn EventSink>,
    rx: mpsc::Receiver<WorkerEvent>,

    input: InputMode,
    status_list: ListState,
    editor_list: ListState,
    mention_query: Option<String>,
    instructions_scroll: u16,
    notice: Option<String>,
    exit_to: Option<String>,
    quit: bool,
}

impl App {
    fn new(session: Session) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut status_list = ListState::default();
        status_list.select(Some(0));
        let mut app = Self {
            panel: session.panel,
            messages: session.messages,
            editors: session.editors,
            transport: session.transport,
            reader: session.reader,
            remote: session.remote,
            sink: Arc::new(ChannelSink::new(tx)),
            rx,
            input: InputMode::Normal,
            status_list,
            editor_list: ListState::default(),
            mention_query: None,
            instructions_scroll: 0,
            notice: None,
            exit_to: None,
            quit: false,
        };
        if let Some(editor) = app.panel.pending_auto_launch() {
            app.launch_editor(editor);
        }
        app
    }

    fn msg<'a>(&'a self, key: &'a str) -> &'a str {
        self.messages.get(key)
    }

    fn dispatch(&mut self, pending: Option<PendingAction>) {
        if let Some(pending) = pending {
            self.notice = Some(format!("sending {}...", pending.request.kind));
            worker::spawn_action(self.transport.clone(), pending, self.sink.clone());
        }
    }

    fn run_action(&mut self, f: fn(&mut TaskPanel) -> Result<Option<PendingAction>>) {
        match f(&mut self.panel) {
            Ok(pending) => self.dispatch(pending),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn launch_editor(&mut self, editor: EditorKind) {
        if let Err(e) = self.panel.choose_editor(editor) {
            self.notice = Some(e.to_string());
            return;
        }
        let job = EditorJob {
            editor,
            project: self.panel.project().clone(),
            area: self.panel.area(),
            josm_remote_control: self.editors.josm_remote_control.clone(),
        };
        self.notice = Some(format!("launching {}...", editor.label()));
        worker::spawn_editor_launch(job, self.remote.clone(), self.sink.clone());
    }

    fn editor_launched(&mut self, launch: EditorLaunch) {
        let path = self.panel.editor_launched(&launch);
        if let Some(url) = launch.url.as_deref()
            && self.editors.open_in_browser
            && let Err(e) = open_url_in_browser(url)
        {
            tracing::warn!(%url, error = %e, "failed to open editor in browser");
        }
        self.notice = Some(format!("{} ready: {path}", launch.editor.label()));
    }

    fn refresh_mentions(&mut self) {
        let prefix = self.panel.mention_prefix();
        if prefix == self.mention_query {
            return;
        }
        self.mention_query = prefix.clone();
        match prefix {
            Some(prefix) => {
                worker::spawn_user_search(
                    self.reader.clone(),
                    prefix,
                    self.panel.project().project_id,
                    self.sink.clone(),
                );
            }
            None => self.panel.clear_mentions(),
        }
    }

    fn tick(&mut self) {
        if self.panel.needs_history() {
            self.panel.history_requested();
            worker::spawn_history(
                self.reader.clone(),
                self.panel.project().project_id,
                self.panel.tasks().primary(),
                self.sink.clone(),
            );
        }
    }

    fn drain_worker_events(&mut self) {
        let events: Vec<WorkerEvent> = self.rx.try_iter().collect();
        for ev in events {
            match ev {
                WorkerEvent::ActionFinished { pending, result } => {
                    self.panel.complete(pending, result);
                    if let Some(path) = self.panel.navigation_path() {
                        self.exit_to = Some(path);
                        self.quit = true;
                    } else {
                        self.notice = None;
                    }
                }
                WorkerEvent::HistoryLoaded { task_id, result } => {
                    tracing::debug!(task_id, ok = result.is_ok(), "history loaded");
                    self.panel.history_loaded(result);
                }
                WorkerEvent::UsersFound { prefix, result } => match result {
                    Ok(names) => self.panel.users_found(&prefix, names),
                    Err(e) => tracing::debug!(%prefix, error = %e, "user lookup failed"),
                },
                WorkerEvent::EditorLaunched { result } => match result {
                    Ok(launch) => self.editor_launched(launch),
                    Err(e) => self.notice = Some(format!("editor: {e}")),
                },
            }
        }
    }

    fn selected_choice(&self) -> Option<StatusChoice> {
        let choices = self.panel.status_choices();
        self.status_list.selected().and_then(|i| choices.get(i).copied())
    }

    fn move_status(&mut self, delta: isize) {
        let len = self.panel.status_choices().len();
        if len == 0 {
            return;
        }
        let cur = self.status_list.selected().unwrap_or(0) as isize;
        let next = (cur + delta).rem_euclid(len as isize) as usize;
        self.status_list.select(Some(next));
    }

    fn move_editor(&mut self, delta: isize) {
        let len = self.panel.editor_options().len();
        if len == 0 {
            return;
        }
        let cur = self.editor_list.selected().unwrap_or(0) as isize;
        let next = (cur + delta).rem_euclid(len as isize) as usize;
        self.editor_list.select(Some(next));
    }

    fn open_editor_picker(&mut self) {
        let options = self.panel.editor_options();
        if options.is_empty() {
            self.notice = Some("no editors enabled for this project".into());
            return;
        }
        let current = self.panel.dropdown_editor();
        let idx = options.iter().position(|o| Some(o.value) == current).unwrap_or(0);
        self.editor_list.select(Some(idx));
        self.input = InputMode::PickEditor;
    }

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Result<bool> {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return Ok(true);
        }

        // Modals take every key while shown.
        if self.panel.modal().is_some() {
            if matches!(code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.panel.close_modal();
            }
            return Ok(false);
        }
        if matches!(self.panel.submission(), Submission::Failed { .. }) {
            match code {
                KeyCode::Char('r') if self.panel.can_retry() => {
                    let pending = self.panel.retry();
                    self.dispatch(pending);
                }
                KeyCode::Esc => {
                    self.panel.cancel_failure();
                    self.notice = None;
                }
                _ => {}
            }
            return Ok(false);
        }

        match self.input {
            InputMode::EditComment => {
                match code {
                    KeyCode::Esc | KeyCode::Enter => {
                        self.input = InputMode::Normal;
                        self.panel.clear_mentions();
                        self.mention_query = None;
                        return Ok(false);
                    }
                    KeyCode::Tab => {
                        if let Some(name) = self.panel.mention_candidates().first().cloned() {
                            self.panel.complete_mention(&name);
                        }
                    }
                    KeyCode::Backspace => {
                        self.panel.comment_mut().pop();
                    }
                    KeyCode::Char(c) => {
                        if c != '\n' && c != '\r' {
                            self.panel.comment_mut().push(c);
                        }
                    }
                    _ => return Ok(false),
                }
                self.refresh_mentions();
                return Ok(false);
            }
            InputMode::PickEditor => {
                match code {
                    KeyCode::Esc | KeyCode::Char('q') => self.input = InputMode::Normal,
                    KeyCode::Down | KeyCode::Char('j') => self.move_editor(1),
                    KeyCode::Up | KeyCode::Char('k') => self.move_editor(-1),
                    KeyCode::Enter => {
                        self.input = InputMode::Normal;
                        let options = self.panel.editor_options();
                        if let Some(opt) = self.editor_list.selected().and_then(|i| options.get(i)) {
                            self.launch_editor(opt.value);
                        }
                    }
                    _ => {}
                }
                return Ok(false);
            }
            InputMode::Normal => {}
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => self.panel.next_section(),
            KeyCode::Char('1') => self.panel.select_section(Section::Completion),
            KeyCode::Char('2') => self.panel.select_section(Section::Instructions),
            KeyCode::Char('3') => self.panel.select_section(Section::History),
            KeyCode::Char('b') => self.panel.toggle_sidebar(),
            KeyCode::Char('m') => {
                if self.panel.task_map_available() {
                    self.panel.toggle_task_map();
                }
            }
            KeyCode::Char('e') => self.open_editor_picker(),
            KeyCode::Char('d') => {
                let next = !self.panel.disabled();
                self.panel.set_disabled(next);
            }
            KeyCode::Char('x') => self.run_action(TaskPanel::split),
            KeyCode::Char('u') => self.run_action(TaskPanel::stop),
            _ => match self.panel.section() {
                Section::Completion => self.handle_completion_key(code),
                Section::Instructions => match code {
                    KeyCode::Down | KeyCode::Char('j') => {
                        self.instructions_scroll = self.instructions_scroll.saturating_add(1)
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        self.instructions_scroll = self.instructions_scroll.saturating_sub(1)
                    }
                    _ => {}
                },
                Section::History => {}
            },
        }
        Ok(false)
    }

    fn handle_completion_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Down | KeyCode::Char('j') => self.move_status(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_status(-1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(choice) = self.selected_choice()
                    && let Err(e) = self.panel.select_status(choice)
                {
                    self.notice = Some(e.to_string());
                }
            }
            KeyCode::Char('c') | KeyCode::Char('i') => self.input = InputMode::EditComment,
            KeyCode::Char('s') => self.run_action(TaskPanel::submit),
            KeyCode::Char('?') => self.panel.toggle_help(),
            _ => {}
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame) {
        let size = f.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(size);

        self.draw_header(f, chunks[0]);
        self.draw_main(f, chunks[1]);
        self.draw_footer(f, chunks[2]);

        self.draw_modal(f);
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let countdown = match self.panel.countdown(Utc::now()) {
            Some(c @ Countdown::Expired) => Span::styled(c.label(), Style::default().fg(Color::Red)),
            Some(c @ Countdown::Unknown) => Span::styled(c.label(), Style::default().fg(Color::Gray)),
            Some(c) => Span::styled(c.label(), Style::default().fg(Color::Yellow)),
            None => Span::raw(""),
        };
        let editor = self
            .panel
            .active_editor()
            .map(|e| e.label().to_string())
            .unwrap_or_else(|| "<no editor>".into());
        let mut spans = vec![
            Span::styled(
                sanitize_line(&self.panel.title()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled(
                self.panel.phase().as_str().to_lowercase(),
                Style::default().fg(Color::LightBlue),
            ),
            Span::raw("  "),
            Span::styled(editor, Style::default().fg(Color::Gray)),
            Span::raw("  "),
            countdown,
        ];
        if self.panel.disabled() {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                self.msg("unsavedChanges"),
                Style::default().fg(Color::Red),
            ));
        }
        let p = Paragraph::new(Text::from(Line::from(spans))).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_type(BorderType::Plain),
        );
        f.render_widget(p, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect) {
        let hint = match self.input {
            InputMode::EditComment => "[type] Comment  [Tab] Complete @mention  [Enter/Esc] Done",
            InputMode::PickEditor => "[j/k] Move  [Enter] Launch  [Esc] Back",
            InputMode::Normal => match self.panel.section() {
                Section::Completion => {
                    "[Tab/1-3] Section  [j/k] Move  [Space] Select  [c] Comment  [s] Submit  [x] Split  [u] Unlock  [e] Editor  [?] Help  [b] Sidebar  [d] Editor dirty  [q] Quit"
                }
                _ => "[Tab/1-3] Section  [j/k] Scroll  [x] Split  [u] Unlock  [e] Editor  [b] Sidebar  [q] Quit",
            },
        };
        let line = match self.notice.as_deref() {
            Some(n) => Line::from(vec![
                Span::styled(sanitize_line(n), Style::default().fg(Color::Yellow)),
                Span::raw("  "),
                Span::raw(hint),
            ]),
            None => Line::from(hint),
        };
        let p = Paragraph::new(line)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(p, area);
    }

    fn draw_main(&mut self, f: &mut ratatui::Frame, area: Rect) {
        if !self.panel.show_sidebar() {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(14), Constraint::Min(0)])
                .split(area);
            let text: Vec<Line> = self
                .panel
                .tasks()
                .hash_labels()
                .into_iter()
                .map(Line::from)
                .collect();
            let p = Paragraph::new(Text::from(text)).block(
                Block::default()
                    .title(self.msg("showSidebar").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
            f.render_widget(p, cols[0]);
            self.draw_editor_area(f, cols[1]);
            return;
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Min(0)])
            .split(area);
        self.draw_sidebar(f, cols[0]);
        self.draw_editor_area(f, cols[1]);
    }

    fn draw_editor_area(&self, f: &mut ratatui::Frame, area: Rect) {
        let mut text = Vec::new();
        match self.panel.active_editor() {
            Some(editor) => {
                text.push(Line::from(vec![
                    Span::styled("Editor: ", Style::default().fg(Color::Yellow)),
                    Span::raw(editor.label()),
                ]));
                if self.panel.task_map_available() {
                    text.push(Line::from(format!(
                        "[m] {}: {}",
                        self.msg("tasksMap"),
                        if self.panel.show_task_map() { "shown" } else { "hidden" }
                    )));
                }
            }
            None => text.push(Line::from("No editor running. Press [e] to pick one.")),
        }
        if let Some(a) = self.panel.area() {
            let (lat, lon) = a.center();
            text.push(Line::from(format!(
                "area center {lat:.5},{lon:.5}  zoom {}",
                a.zoom()
            )));
        }
        let tags = self.panel.changeset_hashtags();
        if !tags.is_empty() {
            text.push(Line::from(""));
            text.push(Line::from(vec![
                Span::styled(
                    format!("{}: ", self.msg("changesetComment")),
                    Style::default().fg(Color::Gray),
                ),
                Span::raw(sanitize_line(&tags.join(" "))),
            ]));
        }
        let p = Paragraph::new(Text::from(text))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(self.msg("reloadEditor").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
        f.render_widget(p, area);
    }

    fn draw_sidebar(&mut self, f: &mut ratatui::Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let titles: Vec<Line> = Section::ALL
            .iter()
            .map(|s| Line::from(self.msg(s.message_key()).to_string()))
            .collect();
        let selected = Section::ALL
            .iter()
            .position(|s| *s == self.panel.section())
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(selected)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        f.render_widget(tabs, rows[0]);

        match self.panel.section() {
            Section::Completion => self.draw_completion(f, rows[1]),
            Section::Instructions => self.draw_instructions(f, rows[1]),
            Section::History => self.draw_history(f, rows[1]),
        }
    }

    fn draw_completion(&mut self, f: &mut ratatui::Frame, area: Rect) {
        let help_height = if self.panel.help_visible() { 6 } else { 0 };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.panel.status_choices().len() as u16 + 2),
                Constraint::Min(3),
                Constraint::Length(help_height),
                Constraint::Length(3),
            ])
            .split(area);

        let selected = self.panel.selected_status();
        let items: Vec<ListItem> = self
            .panel
            .status_choices()
            .into_iter()
            .map(|c| {
                let mark = if Some(c) == selected { "(x)" } else { "( )" };
                ListItem::new(format!("{mark} {}", self.msg(c.message_key())))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .title(self.msg("editStatus").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, rows[0], &mut self.status_list);

        let editing = self.input == InputMode::EditComment;
        let mut comment = vec![Line::from(self.panel.comment().to_string())];
        if editing && !self.panel.mention_candidates().is_empty() {
            comment.push(Line::from(Span::styled(
                self.panel
                    .mention_candidates()
                    .iter()
                    .take(5)
                    .map(|u| format!("@{}", sanitize_line(u)))
                    .collect::<Vec<_>>()
                    .join("  "),
                Style::default().fg(Color::Gray),
            )));
        }
        let border = if editing { Color::Yellow } else { Color::Reset };
        let p = Paragraph::new(Text::from(comment))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(self.msg("comment").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(border)),
            );
        f.render_widget(p, rows[1]);

        if self.panel.help_visible() {
            let text = vec![
                Line::from(format!("1. {}", self.msg("instructionsSelect"))),
                Line::from(format!("2. {}", self.msg("instructionsComment"))),
                Line::from(format!("3. {}", self.msg("instructionsSubmit"))),
            ];
            let p = Paragraph::new(Text::from(text))
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .title(self.msg("finishMappingTitle").to_string())
                        .borders(Borders::ALL),
                );
            f.render_widget(p, rows[2]);
        }

        let submit_style = if self.panel.can_submit() {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut actions = vec![Span::styled(
            format!("[s] {}", self.panel.submit_label(&self.messages)),
            submit_style,
        )];
        if matches!(self.panel.form(), CompletionTab::Mapping(_)) {
            actions.push(Span::raw("  "));
            actions.push(Span::raw(format!("[x] {}", self.msg("splitTask"))));
        }
        actions.push(Span::raw("  "));
        actions.push(Span::raw(format!(
            "[u] {}",
            self.msg(self.panel.stop_label_key())
        )));
        let p = Paragraph::new(Line::from(actions)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(p, rows[3]);
    }

    fn draw_instructions(&self, f: &mut ratatui::Frame, area: Rect) {
        let body = sanitize_block(self.panel.project().instructions());
        let p = Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .scroll((self.instructions_scroll, 0))
            .block(
                Block::default()
                    .title(self.msg("instructions").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
        f.render_widget(p, area);
    }

    fn draw_history(&self, f: &mut ratatui::Frame, area: Rect) {
        let lines: Vec<Line> = match self.panel.history() {
            HistoryState::NotLoaded | HistoryState::Loading => vec![Line::from("loading...")],
            HistoryState::Failed(e) => vec![Line::from(Span::styled(
                sanitize_line(e),
                Style::default().fg(Color::Red),
            ))],
            HistoryState::Loaded(entries) if entries.is_empty() => {
                vec![Line::from(self.msg("noHistory").to_string())]
            }
            HistoryState::Loaded(entries) => entries
                .iter()
                .map(|h| {
                    Line::from(vec![
                        Span::styled(
                            h.action_date.format("%Y-%m-%d %H:%M").to_string(),
                            Style::default().fg(Color::Gray),
                        ),
                        Span::raw("  "),
                        Span::styled(sanitize_line(&h.action_by), Style::default().fg(Color::Cyan)),
                        Span::raw("  "),
                        Span::raw(sanitize_line(
                            h.action_text.as_deref().unwrap_or(h.action.as_str()),
                        )),
                    ])
                })
                .collect(),
        };
        let p = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(self.msg("history").to_string())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
        f.render_widget(p, area);
    }

    fn draw_modal(&mut self, f: &mut ratatui::Frame) {
        if let Some(action) = self.panel.modal() {
            let text = vec![
                Line::from(self.msg(action.message_key()).to_string()),
                Line::from(""),
                Line::from(format!("[Enter/Esc] {}", self.msg("closeModal"))),
            ];
            popup(f, 60, 25, self.msg("unsavedChanges"), Text::from(text), Color::DarkGray);
            return;
        }
        if let Submission::Failed { pending, error } = self.panel.submission() {
            let text = vec![
                Line::from(vec![
                    Span::styled("action: ", Style::default().fg(Color::Yellow)),
                    Span::raw(pending.request.kind.to_string()),
                ]),
                Line::from(Span::styled(
                    sanitize_line(&error.to_string()),
                    Style::default().fg(Color::Red),
                )),
                Line::from(""),
                Line::from(if self.panel.can_retry() {
                    format!("[r] {}  [Esc] {}", self.msg("retry"), self.msg("cancel"))
                } else {
                    format!("[Esc] {}", self.msg("cancel"))
                }),
            ];
            popup(f, 70, 30, self.msg("submissionFailed"), Text::from(text), Color::DarkGray);
            return;
        }
        if self.input == InputMode::PickEditor {
            let area = centered_rect(40, 40, f.area());
            let shadow = shadow_rect(area, f.area());
            f.render_widget(
                Fill {
                    style: Style::default()
                        .bg(Color::Black)
                        .add_modifier(Modifier::DIM),
                },
                shadow,
            );
            f.render_widget(Clear, area);
            let items: Vec<ListItem> = self
                .panel
                .editor_options()
                .into_iter()
                .map(|o| ListItem::new(sanitize_line(&o.label)))
                .collect();
            let list = List::new(items)
                .style(Style::default().fg(Color::White).bg(Color::DarkGray))
                .block(
                    Block::default()
                        .title("Editor")
                        .borders(Borders::ALL)
                        .border_type(BorderType::Double),
                )
                .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
                .highlight_symbol("> ");
            f.render_stateful_widget(list, area, &mut self.editor_list);
        }
    }
}

fn popup(f: &mut ratatui::Frame, pct_x: u16, pct_y: u16, title: &str, text: Text, bg: Color) {
    let area = centered_rect(pct_x, pct_y, f.area());
    let shadow = shadow_rect(area, f.area());
    f.render_widget(
        Fill {
            style: Style::default()
                .bg(Color::Black)
                .add_modifier(Modifier::DIM),
        },
        shadow,
    );
    f.render_widget(Clear, area);
    let p = Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(bg))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_type(BorderType::Double),
        );
    f.render_widget(p, area);
}

/// Runs the panel until the user quits or an action navigates away.
/// Returns the navigation target, if any.
pub fn run_tui(session: Session) -> Result<Option<String>> {
    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| Error::msg(e.to_string()))?;
    execute!(stdout, EnterAlternateScreen, Hide).map_err(|e| Error::msg(e.to_string()))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| Error::msg(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::msg(format!("tui clear failed: {e}")))?;

    let result = run_loop(&mut terminal, App::new(session));

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
) -> Result<Option<String>> {
    let tick = Duration::from_millis(100);
    loop {
        app.drain_worker_events();
        if app.quit {
            break;
        }
        app.tick();

        let mut draw_panicked = false;
        let draw_result = terminal.draw(|f| {
            if catch_unwind(AssertUnwindSafe(|| app.draw(f))).is_err() {
                draw_panicked = true;
            }
        });
        // Keys are still read after a failed frame so the user can quit.
        if draw_panicked {
            tracing::error!("panel draw panicked");
            let _ = terminal.clear();
        } else if let Err(e) = draw_result {
            tracing::error!(error = %e, "panel draw failed");
            let _ = terminal.clear();
        }

        if event::poll(tick).map_err(|e| Error::msg(e.to_string()))? {
            if let Event::Key(k) = event::read().map_err(|e| Error::msg(e.to_string()))? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_key(k.code, k.modifiers)? {
                    break;
                }
            }
        }
    }
    Ok(app.exit_to)
}

pub fn open_url_in_browser(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::validation("empty URL"));
    }

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    };

    #[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
    let mut command = {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let vertical = popup_layout[1];
    let popup_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical);
    popup_layout[1]
}

fn shadow_rect(inner: Rect, bounds: Rect) -> Rect {
    let max_x = bounds.x.saturating_add(bounds.width);
    let max_y = bounds.y.saturating_add(bounds.height);
    let x = inner.x.saturating_add(1).min(max_x.saturating_sub(1));
    let y = inner.y.saturating_add(1).min(max_y.saturating_sub(1));
    let w = inner.width.min(max_x.saturating_sub(x));
    let h = inner.height.min(max_y.saturating_sub(y));
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

struct Fill {
    style: Style,
}

impl Widget for Fill {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)].set_char(' ').set_style(self.style);
            }
        }
    }
}
