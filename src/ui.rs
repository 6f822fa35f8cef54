use crate::client::AppSnapshot;
use color_eyre::eyre::Result;
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use points_ledger::{
    Mode,
    PendingTransaction,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

pub enum UserEvent {
    Quit,
    Redraw,
    Login {
        password: String,
        identity: Option<String>,
    },
    Open {
        username: String,
        mode: Mode,
    },
    Submit(PendingTransaction),
    Reload,
}

#[derive(Debug, Default)]
pub struct UiState {
    screen: Screen,
    overlay: Overlay,
    selected: usize,
    usernames: Vec<String>,
    identities: Vec<String>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Screen {
    #[default]
    Login,
    Dashboard,
}

#[derive(Clone, Debug, Default)]
enum Overlay {
    #[default]
    None,
    Login(LoginState),
    Form(FormState),
}

#[derive(Clone, Debug, Default)]
struct LoginState {
    password: String,
    identity_idx: Option<usize>,
    error: Option<String>,
    loading: bool,
}

#[derive(Clone, Debug)]
struct FormState {
    pending: PendingTransaction,
    focus: FormField,
    submitting: bool,
    error: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FormField {
    #[default]
    Local,
    Global,
    Reason,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Local => FormField::Global,
            FormField::Global => FormField::Reason,
            FormField::Reason => FormField::Local,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Local => FormField::Reason,
            FormField::Global => FormField::Local,
            FormField::Reason => FormField::Global,
        }
    }
}

impl FormState {
    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Local => &mut self.pending.local_delta,
            FormField::Global => &mut self.pending.global_delta,
            FormField::Reason => &mut self.pending.reason,
        }
    }
}

impl UiState {
    /// `identities` is empty unless the operator has to pick who they are.
    pub fn new(identities: Vec<String>) -> Self {
        UiState {
            overlay: Overlay::Login(LoginState::default()),
            identities,
            ..UiState::default()
        }
    }

    pub fn on_dashboard(&self) -> bool {
        self.screen == Screen::Dashboard
    }

    pub fn form_open(&self) -> bool {
        matches!(self.overlay, Overlay::Form(_))
    }

    pub fn selected_username(&self) -> Option<&str> {
        self.usernames.get(self.selected).map(String::as_str)
    }
}

pub fn login_started(state: &mut UiState) {
    if let Overlay::Login(ls) = &mut state.overlay {
        ls.loading = true;
        ls.error = None;
    }
}

pub fn login_failed(state: &mut UiState, message: impl Into<String>) {
    if let Overlay::Login(ls) = &mut state.overlay {
        ls.loading = false;
        ls.error = Some(message.into());
    }
}

pub fn enter_dashboard(state: &mut UiState) {
    state.screen = Screen::Dashboard;
    state.overlay = Overlay::None;
    state.selected = 0;
}

pub fn open_form(state: &mut UiState, pending: PendingTransaction) {
    state.overlay = Overlay::Form(FormState {
        pending,
        focus: FormField::default(),
        submitting: false,
        error: None,
    });
}

pub fn close_form(state: &mut UiState) {
    if state.form_open() {
        state.overlay = Overlay::None;
    }
}

/// Keeps the form open with its inputs so the operator can retry.
pub fn form_failed(state: &mut UiState, message: impl Into<String>) {
    if let Overlay::Form(fs) = &mut state.overlay {
        fs.submitting = false;
        fs.error = Some(message.into());
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // keep usernames around so key handling can resolve the selected card
    state.usernames = snap.users.iter().map(|u| u.username.clone()).collect();
    if state.selected >= state.usernames.len() {
        state.selected = state.usernames.len().saturating_sub(1);
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_event(state: &mut UiState) -> Result<UserEvent> {
    loop {
        if let Event::Key(k) = event::read()? {
            if let Some(ev) = interpret_key(state, k) {
                return Ok(ev);
            }
        }
    }
}

pub fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    if k.kind != KeyEventKind::Press {
        return None;
    }
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    let identity_count = state.identities.len();
    match &mut state.overlay {
        Overlay::Login(ls) => {
            if ls.loading {
                return None;
            }
            match k.code {
                KeyCode::Esc => Some(UserEvent::Quit),
                KeyCode::Enter => {
                    let identity = ls
                        .identity_idx
                        .and_then(|idx| state.identities.get(idx))
                        .cloned();
                    Some(UserEvent::Login {
                        password: ls.password.clone(),
                        identity,
                    })
                }
                KeyCode::Backspace => {
                    ls.password.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Right | KeyCode::Tab if identity_count > 0 => {
                    ls.identity_idx =
                        Some(ls.identity_idx.map_or(0, |idx| (idx + 1) % identity_count));
                    Some(UserEvent::Redraw)
                }
                KeyCode::Left | KeyCode::BackTab if identity_count > 0 => {
                    ls.identity_idx = Some(ls.identity_idx.map_or(identity_count - 1, |idx| {
                        (idx + identity_count - 1) % identity_count
                    }));
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) => {
                    ls.password.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            }
        }
        Overlay::Form(fs) => {
            if fs.submitting {
                return None;
            }
            match k.code {
                KeyCode::Esc => {
                    state.overlay = Overlay::None;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    fs.submitting = true;
                    fs.error = None;
                    Some(UserEvent::Submit(fs.pending.clone()))
                }
                KeyCode::Tab | KeyCode::Down => {
                    fs.focus = fs.focus.next();
                    Some(UserEvent::Redraw)
                }
                KeyCode::BackTab | KeyCode::Up => {
                    fs.focus = fs.focus.prev();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Backspace => {
                    fs.field_mut().pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) => {
                    let focus = fs.focus;
                    let field = fs.field_mut();
                    // a fresh "0" amount is replaced rather than appended to
                    if focus != FormField::Reason && field.as_str() == "0" {
                        field.clear();
                    }
                    field.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            }
        }
        Overlay::None => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Down | KeyCode::Char('j') => {
                if state.selected + 1 < state.usernames.len() {
                    state.selected += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.selected = state.selected.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('a') => state.selected_username().map(|u| UserEvent::Open {
                username: u.to_string(),
                mode: Mode::Add,
            }),
            KeyCode::Char('r') => state.selected_username().map(|u| UserEvent::Open {
                username: u.to_string(),
                mode: Mode::Redeem,
            }),
            KeyCode::Char('g') => Some(UserEvent::Reload),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    match state.screen {
        Screen::Login => draw_login(f, state),
        Screen::Dashboard => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3), // identity + source
                    Constraint::Min(8),    // cards + activity
                    Constraint::Length(6), // status/errors + help
                ])
                .split(f.area());
            draw_header(f, chunks[0], snap);
            draw_body(f, state, chunks[1], snap);
            draw_bottom(f, chunks[2], snap);
            draw_form(f, state);
        }
    }
}

fn draw_login(f: &mut Frame, state: &UiState) {
    let Overlay::Login(ls) = &state.overlay else {
        return;
    };
    let area = centered_rect(50, 40, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Reward Points");
    let mut lines = vec![
        Line::from(format!("Password: {}", "*".repeat(ls.password.chars().count()))),
        Line::from(""),
    ];
    if !state.identities.is_empty() {
        let who = ls
            .identity_idx
            .and_then(|idx| state.identities.get(idx))
            .map(String::as_str)
            .unwrap_or("(choose)");
        lines.push(Line::from(format!("I am: < {who} >")));
        lines.push(Line::from(""));
    }
    if ls.loading {
        lines.push(Line::from("Loading..."));
    } else if let Some(err) = &ls.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(""));
    let help = if state.identities.is_empty() {
        "Enter=unlock Esc=quit"
    } else {
        "Enter=unlock <-/->=choose identity Esc=quit"
    };
    lines.push(Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = format!(
        "Signed in as {} | Source: {}",
        snap.identity.as_deref().unwrap_or("-"),
        snap.source
    );
    let p = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(p, area);
}

fn draw_body(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    draw_cards(f, state, cols[0], snap);
    draw_activity(f, cols[1], snap);
}

fn draw_cards(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let header = Row::new(vec!["User", "Local", "Global", "Total", "Icon"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = snap.users.iter().map(|user| {
        Row::new(vec![
            user.username.clone(),
            user.local_points().to_string(),
            user.global_points().to_string(),
            user.total_points().to_string(),
            user.icon_file(),
        ])
    });
    let widths = [
        Constraint::Percentage(30),
        Constraint::Percentage(15),
        Constraint::Percentage(15),
        Constraint::Percentage(15),
        Constraint::Percentage(25),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Users"))
        .row_highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    let mut table_state = TableState::default().with_selected(Some(state.selected));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_activity(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines: Vec<Line> = if snap.activity.is_empty() {
        vec![Line::from(Span::styled(
            "No changes yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        snap.activity.iter().map(|a| Line::from(a.clone())).collect()
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Recent changes"));
    f.render_widget(p, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::from(format!("Status: {}", snap.status))];
    if let Some(err) = snap.errors.last() {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Up/Down=select a=add r=redeem g=reload q=quit",
        Style::default().fg(Color::DarkGray),
    )));
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_form(f: &mut Frame, state: &UiState) {
    let Overlay::Form(fs) = &state.overlay else {
        return;
    };
    let area = centered_rect(50, 50, f.area());
    let title = format!("{} Points for {}", fs.pending.mode, fs.pending.target);
    let block = Block::default().borders(Borders::ALL).title(title);
    let field_line = |field: FormField, label: &str, value: &str| {
        let cur = if fs.focus == field { ">" } else { " " };
        let style = if fs.focus == field {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(Span::styled(format!("{cur} {label}: {value}"), style))
    };
    let mut lines = vec![
        Line::from(format!(
            "Current points - Local: {}, Global: {}",
            fs.pending.snapshot.local, fs.pending.snapshot.global
        )),
        Line::from(""),
        field_line(FormField::Local, "Local points", &fs.pending.local_delta),
        field_line(FormField::Global, "Global points", &fs.pending.global_delta),
        field_line(FormField::Reason, "Reason", &fs.pending.reason),
        Line::from(""),
    ];
    if fs.submitting {
        lines.push(Line::from("Processing..."));
    } else if let Some(err) = &fs.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("Enter={} Tab=next field Esc=cancel", fs.pending.mode),
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        block.inner(area),
    );
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
