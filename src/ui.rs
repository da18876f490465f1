// 🖥️ Terminal UI - login gate, then Dashboard / Students / Uniforms / Finances / Report
//
// Key handling lives on App (no terminal needed) so the navigation and login flow can be
// driven directly from tests. Rendering only reads App.

use anyhow::Result;
use chrono::{Datelike, Local, Months, NaiveDate};
use costa_school::{
    format_amount, format_signed_amount, AppConfig, AuditEvent, DashboardMetrics, ExpenseRecord, IncomeRecord,
    LedgerAggregator, LedgerSummary, MonthlyTotals, RecordStore, ReportRenderer, Session,
    StudentWithClass, UniformItem,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Students,
    Uniforms,
    Finances,
    Report,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Dashboard,
        Page::Students,
        Page::Uniforms,
        Page::Finances,
        Page::Report,
    ];

    pub fn next(&self) -> Self {
        match self {
            Page::Dashboard => Page::Students,
            Page::Students => Page::Uniforms,
            Page::Uniforms => Page::Finances,
            Page::Finances => Page::Report,
            Page::Report => Page::Dashboard,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Dashboard => Page::Report,
            Page::Students => Page::Dashboard,
            Page::Uniforms => Page::Students,
            Page::Finances => Page::Uniforms,
            Page::Report => Page::Finances,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Students => "Students",
            Page::Uniforms => "Uniforms",
            Page::Finances => "Finances",
            Page::Report => "Financial Report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub focus: LoginField,
    pub error: Option<String>,
}

impl LoginForm {
    fn new() -> Self {
        LoginForm {
            username: String::new(),
            password: String::new(),
            focus: LoginField::Username,
            error: None,
        }
    }

    fn active_field(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

pub struct App<'a> {
    store: &'a mut RecordStore,
    session: Session,
    renderer: ReportRenderer,
    currency: String,
    pub export_dir: PathBuf,
    pub login: LoginForm,
    pub current_page: Page,
    pub state: TableState,
    pub dashboard: Option<DashboardMetrics>,
    pub students: Vec<StudentWithClass>,
    pub uniforms: Vec<UniformItem>,
    pub incomes: Vec<IncomeRecord>,
    pub expenses: Vec<ExpenseRecord>,
    pub monthly: Vec<MonthlyTotals>,
    /// First day of the month shown on the report page
    pub report_month: NaiveDate,
    pub report: LedgerSummary,
    pub status: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(
        store: &'a mut RecordStore,
        session: Session,
        renderer: ReportRenderer,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            session,
            renderer,
            currency: config.currency_label.clone(),
            export_dir: PathBuf::from("."),
            login: LoginForm::new(),
            current_page: Page::Dashboard,
            state: TableState::default(),
            dashboard: None,
            students: Vec::new(),
            uniforms: Vec::new(),
            incomes: Vec::new(),
            expenses: Vec::new(),
            monthly: Vec::new(),
            report_month: first_of_month(Local::now().date_naive()),
            report: LedgerSummary::empty(),
            status: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if self.is_logged_in() {
            self.handle_main_key(key)
        } else {
            self.handle_login_key(key)
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.toggle_focus()
            }
            KeyCode::Enter => match self.login.focus {
                LoginField::Username => self.login.focus = LoginField::Password,
                LoginField::Password => self.submit_login(),
            },
            KeyCode::Backspace => {
                self.login.active_field().pop();
            }
            KeyCode::Char(c) => self.login.active_field().push(c),
            _ => {}
        }
        false
    }

    pub fn submit_login(&mut self) {
        let username = self.login.username.clone();
        let password = std::mem::take(&mut self.login.password);

        match self.session.login(&username, &password) {
            Ok(operator) => {
                let actor = operator.username.clone();
                self.store.set_actor(&actor);
                self.note_event("login", serde_json::json!({ "via": "tui" }));
                self.login = LoginForm::new();
                self.current_page = Page::Dashboard;
                self.status = Some(format!("Logged in as {}", actor));
                self.refresh();
            }
            Err(e) => {
                self.login.error = Some(e.to_string());
                self.login.focus = LoginField::Password;
            }
        }
    }

    pub fn logout(&mut self) {
        self.note_event("logout", serde_json::json!({ "via": "tui" }));
        self.session.logout();
        self.login = LoginForm::new();
        self.dashboard = None;
        self.students.clear();
        self.uniforms.clear();
        self.incomes.clear();
        self.expenses.clear();
        self.monthly.clear();
        self.report = LedgerSummary::empty();
        self.status = None;
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page();
                } else {
                    self.next_page();
                }
            }
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('L') => self.logout(),
            KeyCode::Char('r') => {
                self.refresh();
                self.status = Some("Refreshed".to_string());
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Left | KeyCode::Char('[') if self.current_page == Page::Report => {
                self.step_month(false)
            }
            KeyCode::Right | KeyCode::Char(']') if self.current_page == Page::Report => {
                self.step_month(true)
            }
            KeyCode::Char('e') if self.current_page == Page::Report => self.export_report(),
            _ => {}
        }
        false
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        let first = if self.row_count() > 0 { Some(0) } else { None };
        self.state.select(first);
    }

    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Students => self.students.len(),
            Page::Uniforms => self.uniforms.len(),
            _ => 0,
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Reload every page's data from the store.
    pub fn refresh(&mut self) {
        if let Err(e) = self.try_refresh() {
            error!(error = %e, "failed to load data");
            self.status = Some(format!("Error: {}", e));
        }
        self.reset_selection();
    }

    fn try_refresh(&mut self) -> Result<()> {
        let store: &RecordStore = &*self.store;
        let aggregator = LedgerAggregator::new(store);

        self.dashboard = Some(aggregator.dashboard()?);
        self.students = store.list_students_with_class_names()?;
        self.uniforms = store.list_uniform_items()?;
        self.incomes = store.list_incomes()?;
        self.expenses = store.list_expenses()?;
        self.monthly = aggregator.monthly_summary(6)?;

        let (start, end) = month_bounds(self.report_month);
        self.report = aggregator.compute_ledger_summary(start, end)?;
        Ok(())
    }

    pub fn report_period(&self) -> (NaiveDate, NaiveDate) {
        month_bounds(self.report_month)
    }

    pub fn step_month(&mut self, forward: bool) {
        let stepped = if forward {
            self.report_month.checked_add_months(Months::new(1))
        } else {
            self.report_month.checked_sub_months(Months::new(1))
        };
        if let Some(month) = stepped {
            self.report_month = month;
            self.refresh();
        }
    }

    pub fn export_report(&mut self) {
        let (start, end) = self.report_period();
        match self.renderer.render(start, end, &self.report) {
            Ok(doc) => {
                let path = self.export_dir.join(&doc.filename);
                match std::fs::write(&path, &doc.bytes) {
                    Ok(()) => {
                        info!(path = %path.display(), "report exported");
                        self.note_event(
                            "export_report",
                            serde_json::json!({ "start": start, "end": end, "file": doc.filename }),
                        );
                        self.status = Some(format!("Saved {}", path.display()));
                    }
                    Err(e) => self.status = Some(format!("Could not write {}: {}", path.display(), e)),
                }
            }
            Err(e) => self.status = Some(format!("Report failed: {}", e)),
        }
    }

    /// Session-level audit entry; failures are logged, not surfaced.
    fn note_event(&self, action: &str, details: serde_json::Value) {
        let event = AuditEvent::new(action, "session", None, details, self.store.actor());
        if let Err(e) = self.store.record_event(&event) {
            warn!(action, error = %e, "failed to write audit event");
        }
    }

    fn money(&self, value: Decimal) -> String {
        format!("{} {}", self.currency, format_amount(value))
    }

    fn signed_money(&self, value: Decimal) -> String {
        format!("{} {}", self.currency, format_signed_amount(value))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// [first, last] day of the month starting at `first`
fn month_bounds(first: NaiveDate) -> (NaiveDate, NaiveDate) {
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    if !app.is_logged_in() {
        render_login(f, app);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Dashboard => render_dashboard(f, chunks[1], app),
        Page::Students => render_students(f, chunks[1], app),
        Page::Uniforms => render_uniforms(f, chunks[1], app),
        Page::Finances => render_finances(f, chunks[1], app),
        Page::Report => render_report(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_login(f: &mut Frame, app: &App) {
    let area = centered(f.size(), 50, 10);

    let field_style = |field: LoginField| {
        if app.login.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Username: ", field_style(LoginField::Username)),
            Span::raw(app.login.username.clone()),
        ]),
        Line::from(vec![
            Span::styled("  Password: ", field_style(LoginField::Password)),
            Span::raw("*".repeat(app.login.password.chars().count())),
        ]),
        Line::from(""),
    ];

    if let Some(err) = &app.login.error {
        lines.push(Line::from(Span::styled(
            format!("  {}", err),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "  Enter: next/login  Tab: switch field  Esc: quit",
        Style::default().fg(Color::DarkGray),
    )));

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" COSTA School - Login "),
    );

    f.render_widget(Clear, area);
    f.render_widget(form, area);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(op) = app.session.operator() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("👤 {}", op.username),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn panel(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(format!(" {} ", title))
}

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let Some(metrics) = &app.dashboard else {
        f.render_widget(Paragraph::new("  No data loaded").block(panel("Dashboard")), area);
        return;
    };

    let balance_color = if metrics.balance.is_sign_negative() && !metrics.balance.is_zero() {
        Color::Red
    } else {
        Color::Green
    };

    let figures = vec![
        Line::from(""),
        Line::from(format!("  Students enrolled:   {}", metrics.student_count)),
        Line::from(format!("  Uniforms in stock:   {}", metrics.uniform_stock)),
        Line::from(vec![
            Span::raw("  Total income:        "),
            Span::styled(app.money(metrics.total_income), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::raw("  Total expenses:      "),
            Span::styled(app.money(metrics.total_expense), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::raw("  Balance:             "),
            Span::styled(
                app.signed_money(metrics.balance),
                Style::default().fg(balance_color).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(figures).block(panel("Overview")), chunks[0]);

    let recent = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    render_income_table(f, recent[0], app, &metrics.recent_incomes, "Recent Income");
    render_expense_table(f, recent[1], app, &metrics.recent_expenses, "Recent Expenses");
}

fn render_income_table(f: &mut Frame, area: Rect, app: &App, rows: &[IncomeRecord], title: &str) {
    let rows = rows.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.date.to_string()),
            Cell::from(truncate(&r.source, 24)),
            Cell::from(app.money(r.amount)).style(Style::default().fg(Color::Green)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(12), Constraint::Length(26), Constraint::Min(14)],
    )
    .header(header_row(&["Date", "Source", "Amount"]))
    .block(panel(title));

    f.render_widget(table, area);
}

fn render_expense_table(f: &mut Frame, area: Rect, app: &App, rows: &[ExpenseRecord], title: &str) {
    let rows = rows.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.date.to_string()),
            Cell::from(truncate(&r.category, 24)),
            Cell::from(app.money(r.amount)).style(Style::default().fg(Color::Red)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(12), Constraint::Length(26), Constraint::Min(14)],
    )
    .header(header_row(&["Date", "Category", "Amount"]))
    .block(panel(title));

    f.render_widget(table, area);
}

fn render_students(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .students
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.student.id.to_string()),
                Cell::from(truncate(&s.student.name, 30)),
                Cell::from(s.student.age.to_string()),
                Cell::from(s.student.enrollment_date.to_string()),
                Cell::from(s.class_name.clone().unwrap_or_else(|| "-".to_string())),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(32),
            Constraint::Length(5),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["ID", "Name", "Age", "Enrolled", "Class"]))
    .block(panel(&format!("Students ({})", app.students.len())))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_uniforms(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .uniforms
        .iter()
        .map(|u| {
            Row::new(vec![
                Cell::from(u.id.to_string()),
                Cell::from(truncate(&u.item_type, 24)),
                Cell::from(u.size.clone()),
                Cell::from(u.stock.to_string()),
                Cell::from(app.money(u.unit_cost)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(26),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Min(14),
        ],
    )
    .header(header_row(&["ID", "Type", "Size", "Stock", "Unit Cost"]))
    .block(panel("Uniform Inventory"))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_finances(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let ledgers = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    render_income_table(f, ledgers[0], app, &app.incomes, "Income");
    render_expense_table(f, ledgers[1], app, &app.expenses, "Expenses");

    let rows = app.monthly.iter().map(|m| {
        let net_color = if m.net.is_sign_negative() && !m.net.is_zero() {
            Color::Red
        } else {
            Color::Green
        };
        Row::new(vec![
            Cell::from(m.month.clone()),
            Cell::from(app.money(m.income)),
            Cell::from(app.money(m.expense)),
            Cell::from(app.signed_money(m.net)).style(Style::default().fg(net_color)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&["Month", "Income", "Expenses", "Net"]))
    .block(panel("Monthly Summary"));

    f.render_widget(table, chunks[1]);
}

fn render_report(f: &mut Frame, area: Rect, app: &App) {
    let (start, end) = app.report_period();
    let summary = &app.report;

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", app.renderer.title),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("  Period: {} to {}", start, end)),
        Line::from(""),
        Line::from(format!("  Total Income:    {}", app.money(summary.total_income))),
        Line::from(format!("  Total Expenses:  {}", app.money(summary.total_expense))),
        Line::from(Span::styled(
            format!("  Balance:         {}", app.signed_money(summary.balance)),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!(
            "  {} income and {} expense records in period",
            summary.income_records.len(),
            summary.expense_records.len()
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  ←/→ change month   e export PDF",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    f.render_widget(Paragraph::new(content).block(panel("Financial Report")), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(msg) = &app.status {
        status_spans.push(Span::styled(format!(" {} ", msg), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Refresh | "));
    status_spans.push(Span::styled("L", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Logout | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costa_school::FixedCredentialPolicy;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn session() -> Session {
        Session::new(Box::new(FixedCredentialPolicy::new("admin", "costa2026").unwrap()))
    }

    fn login(app: &mut App) {
        type_text(app, "admin");
        app.handle_key(key(KeyCode::Enter));
        type_text(app, "costa2026");
        app.handle_key(key(KeyCode::Enter));
    }

    #[test]
    fn test_login_gate() {
        let mut store = RecordStore::open_in_memory().unwrap();
        let config = AppConfig::default();
        let mut app = App::new(&mut store, session(), ReportRenderer::default(), &config);

        type_text(&mut app, "admin");
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "wrong");
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.is_logged_in());
        assert!(app.login.error.is_some());
        assert!(app.login.password.is_empty());

        type_text(&mut app, "costa2026");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.is_logged_in());
        assert!(app.dashboard.is_some());

        // Logout returns to the login screen
        app.handle_key(key(KeyCode::Char('L')));
        assert!(!app.is_logged_in());
        assert!(app.dashboard.is_none());
    }

    #[test]
    fn test_login_sets_audit_actor() {
        let mut store = RecordStore::open_in_memory().unwrap();
        let config = AppConfig::default();
        {
            let mut app = App::new(&mut store, session(), ReportRenderer::default(), &config);
            login(&mut app);
        }
        assert_eq!(store.actor(), "admin");

        let events = store.list_audit_log(5).unwrap();
        assert_eq!(events[0].action, "login");
        assert_eq!(events[0].actor, "admin");
    }

    #[test]
    fn test_overflowing_ledger_shows_error_instead_of_crashing() {
        let mut store = RecordStore::open_in_memory().unwrap();
        for _ in 0..2 {
            store
                .connection()
                .execute(
                    "INSERT INTO incomes (date, amount, source) VALUES ('2024-02-01', '50000000000000000000000000000', 'Imported')",
                    [],
                )
                .unwrap();
        }
        let config = AppConfig::default();
        let mut app = App::new(&mut store, session(), ReportRenderer::default(), &config);

        login(&mut app);

        assert!(app.is_logged_in());
        assert!(app.dashboard.is_none());
        assert!(app.status.as_deref().unwrap_or_default().starts_with("Error"));
    }

    #[test]
    fn test_page_navigation_cycles() {
        let mut store = RecordStore::open_in_memory().unwrap();
        let config = AppConfig::default();
        let mut app = App::new(&mut store, session(), ReportRenderer::default(), &config);
        login(&mut app);

        for expected in [Page::Students, Page::Uniforms, Page::Finances, Page::Report, Page::Dashboard] {
            app.handle_key(key(KeyCode::Tab));
            assert_eq!(app.current_page, expected);
        }
        app.handle_key(key(KeyCode::BackTab));
        assert_eq!(app.current_page, Page::Report);
    }

    #[test]
    fn test_report_month_stepping_and_export() {
        let mut store = RecordStore::open_in_memory().unwrap();
        store
            .create_income(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Decimal::from(500_000), "Tuition Fees")
            .unwrap();
        store
            .create_expense(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(), Decimal::from(120_000), "Utilities")
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let mut app = App::new(&mut store, session(), ReportRenderer::default(), &config);
        app.export_dir = dir.path().to_path_buf();
        app.report_month = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        login(&mut app);

        while app.current_page != Page::Report {
            app.handle_key(key(KeyCode::Tab));
        }
        assert!(app.report.is_empty());

        app.handle_key(key(KeyCode::Right));
        assert_eq!(
            app.report_period(),
            (
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
            )
        );
        assert_eq!(app.report.balance, Decimal::from(380_000));

        app.handle_key(key(KeyCode::Char('e')));
        assert!(dir
            .path()
            .join("costa_report_2024-02-01_to_2024-02-29.pdf")
            .exists());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Nakato", 10), "Nakato");
        assert_eq!(truncate("Boys Main Shorts Extra", 10), "Boys Ma...");
    }
}
