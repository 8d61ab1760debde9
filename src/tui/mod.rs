//! Ratatui-based terminal UI.
//!
//! The TUI drives one [`Session`]: a model picker adds components, the
//! parameter table edits values, vary flags, bounds and expressions, and fits
//! run on a worker thread so the screen stays live (Esc cancels).

use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
};
use tracing::warn;

use crate::binding::{ControlEvent, ControlGroup};
use crate::cli::SessionArgs;
use crate::error::{AppError, SessionError};
use crate::io::{FitSnapshot, write_fit_json, write_parameters_csv};
use crate::models::ModelKind;
use crate::plot::{PlotFrame, Renderer};
use crate::registry;
use crate::report::fmt_g;
use crate::session::Session;

mod plotters_chart;

use plotters_chart::CurveChart;

const PARAMS_EXPORT: &str = "cfit-params.csv";
const FIT_EXPORT: &str = "cfit-fit.json";

/// Start the TUI.
pub fn run(args: SessionArgs) -> Result<(), AppError> {
    // Load data before taking over the terminal so errors print normally.
    let session = crate::app::pipeline::open_session(&args)?;
    let mut app = App::new(session);

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Renderer that keeps the latest frame for the next draw.
#[derive(Clone, Default)]
struct SharedFrame(Rc<RefCell<PlotFrame>>);

impl Renderer for SharedFrame {
    fn render(&mut self, frame: &PlotFrame) {
        *self.0.borrow_mut() = frame.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Models,
    Params,
}

/// Editable columns of the parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Value,
    Vary,
    Min,
    Max,
    Expr,
}

impl Column {
    const ALL: [Column; 5] = [Column::Value, Column::Vary, Column::Min, Column::Max, Column::Expr];

    fn index(self) -> usize {
        Column::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }

    fn step(self, delta: isize) -> Column {
        let n = Column::ALL.len() as isize;
        let i = (self.index() as isize + delta).rem_euclid(n);
        Column::ALL[i as usize]
    }

    fn label(self) -> &'static str {
        match self {
            Column::Value => "value",
            Column::Vary => "vary",
            Column::Min => "min",
            Column::Max => "max",
            Column::Expr => "expr",
        }
    }
}

/// In-progress text entry for one cell.
struct Editor {
    name: String,
    column: Column,
    buffer: String,
}

struct App {
    session: Session,
    frame: SharedFrame,
    models: Vec<(&'static str, ModelKind)>,
    model_cursor: usize,
    param_cursor: usize,
    column: Column,
    focus: Focus,
    editor: Option<Editor>,
    show_report: bool,
    status: String,
}

impl App {
    fn new(session: Session) -> Self {
        let frame = SharedFrame::default();
        let mut session = session.with_renderer(Box::new(frame.clone()));
        session.refresh();
        Self {
            session,
            frame,
            models: registry::list_available().into_iter().collect(),
            model_cursor: 0,
            param_cursor: 0,
            column: Column::Value,
            focus: Focus::Models,
            editor: None,
            show_report: false,
            status: "Pick a model and press Enter to add it.".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if self.collect_fit() {
                needs_redraw = true;
            }
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply a finished background fit; `true` when something changed.
    fn collect_fit(&mut self) -> bool {
        if !self.session.is_busy() {
            return false;
        }
        match self.session.poll_fit() {
            Ok(None) => false,
            Ok(Some(fit)) => {
                let stats = fit.stats();
                self.status = format!(
                    "{} chi-square {} after {} evaluations.",
                    stats.message,
                    fmt_g(stats.chisqr),
                    stats.nfev
                );
                true
            }
            Err(err) => {
                self.status = format!("Fit failed: {err}");
                true
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.editor.is_some() {
            self.handle_edit_key(code);
            return false;
        }
        if self.show_report {
            if matches!(code, KeyCode::Esc | KeyCode::Char('r') | KeyCode::Enter) {
                self.show_report = false;
            }
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Models => Focus::Params,
                    Focus::Params => Focus::Models,
                };
            }
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Left if self.focus == Focus::Params => self.column = self.column.step(-1),
            KeyCode::Right if self.focus == Focus::Params => self.column = self.column.step(1),
            KeyCode::Enter => match self.focus {
                Focus::Models => self.add_selected_model(),
                Focus::Params => self.activate_cell(),
            },
            KeyCode::Char('a') => self.add_selected_model(),
            KeyCode::Char('c') => {
                let result = self.session.clear_all();
                self.param_cursor = 0;
                self.finish(result, "Cleared all components.");
            }
            KeyCode::Char('v') => self.toggle(Column::Vary),
            KeyCode::Char('n') => self.toggle(Column::Min),
            KeyCode::Char('x') => self.toggle(Column::Max),
            KeyCode::Char('=') => self.start_edit(Column::Expr),
            KeyCode::Char('g') => {
                let result = self.session.guess_parameters();
                self.finish(result, "Applied the model's initial guess.");
            }
            KeyCode::Char('f') => {
                let result = self.session.begin_fit();
                self.finish(result, "Fitting... (Esc cancels)");
            }
            KeyCode::Esc => {
                if self.session.cancel_fit() {
                    self.status = "Cancelling fit...".to_string();
                }
            }
            KeyCode::Char('r') => match self.session.fit_report() {
                Ok(_) => self.show_report = true,
                Err(err) => self.status = err.to_string(),
            },
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
        false
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.editor = None;
                self.status = "Edit cancelled.".to_string();
            }
            KeyCode::Enter => {
                if let Some(editor) = self.editor.take() {
                    self.commit_edit(editor);
                }
            }
            KeyCode::Backspace => {
                editor.buffer.pop();
            }
            KeyCode::Char(c) => editor.buffer.push(c),
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.focus {
            Focus::Models => (&mut self.model_cursor, self.models.len()),
            Focus::Params => (&mut self.param_cursor, self.session.binding().len()),
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        *cursor = (*cursor as isize + delta).clamp(0, len as isize - 1) as usize;
    }

    fn selected_group(&self) -> Option<&ControlGroup> {
        self.session.binding().groups().get(self.param_cursor)
    }

    fn add_selected_model(&mut self) {
        let Some(&(display, kind)) = self.models.get(self.model_cursor) else {
            return;
        };
        match self.session.add_component(kind) {
            Ok(prefix) => self.status = format!("Added {display} as '{prefix}'."),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn activate_cell(&mut self) {
        match self.column {
            Column::Vary => self.toggle(Column::Vary),
            column => self.start_edit(column),
        }
    }

    /// Flip the vary flag or a bound's enable toggle on the selected row.
    fn toggle(&mut self, column: Column) {
        let Some(group) = self.selected_group() else {
            return;
        };
        let name = group.name().to_string();
        let event = match column {
            Column::Vary => ControlEvent::Vary(!group.vary()),
            Column::Min => ControlEvent::MinEnabled(!group.min_enabled()),
            Column::Max => ControlEvent::MaxEnabled(!group.max_enabled()),
            Column::Value | Column::Expr => return,
        };
        let result = self.session.edit(&name, event).map(|_| ());
        self.finish(result, format!("{name}: {} toggled.", column.label()));
    }

    fn start_edit(&mut self, column: Column) {
        let Some(group) = self.selected_group() else {
            return;
        };
        let name = group.name().to_string();
        let buffer = match column {
            Column::Value => fmt_g(group.value()),
            Column::Min => fmt_g(group.min_field().value()),
            Column::Max => fmt_g(group.max_field().value()),
            Column::Expr => self
                .session
                .params()
                .get(&name)
                .and_then(|p| p.expr.clone())
                .unwrap_or_default(),
            Column::Vary => return,
        };
        self.status = format!("Editing {name} {}. Enter applies, Esc cancels.", column.label());
        self.editor = Some(Editor { name, column, buffer });
    }

    fn commit_edit(&mut self, editor: Editor) {
        let text = editor.buffer.trim();
        let result = match editor.column {
            Column::Expr => self
                .session
                .set_expr(&editor.name, (!text.is_empty()).then_some(text)),
            column => match parse_field(column, text) {
                Some(event) => self.session.edit(&editor.name, event).map(|_| ()),
                None => {
                    self.status = format!("Invalid {} '{text}'.", column.label());
                    return;
                }
            },
        };
        self.finish(result, format!("{} updated.", editor.name));
    }

    fn export(&mut self) {
        let written = self.session.parameter_table().map_err(AppError::from).and_then(|table| {
            write_parameters_csv(Path::new(PARAMS_EXPORT), &table)?;
            let snapshot = FitSnapshot::from_session(&self.session)?;
            write_fit_json(Path::new(FIT_EXPORT), &snapshot)
        });
        match written {
            Ok(()) => self.status = format!("Wrote {PARAMS_EXPORT} and {FIT_EXPORT}."),
            Err(err) => {
                warn!(error = %err, "export failed");
                self.status = format!("Export failed: {err}");
            }
        }
    }

    fn finish(&mut self, result: Result<(), SessionError>, ok: impl Into<String>) {
        self.status = match result {
            Ok(()) => ok.into(),
            Err(err) => err.to_string(),
        };
        let len = self.session.binding().len();
        self.param_cursor = self.param_cursor.min(len.saturating_sub(1));
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        if self.show_report {
            self.draw_report(frame, size);
        }
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("cfit", Style::default().fg(Color::Cyan)),
            Span::raw(" | composite curve fitting"),
        ]));

        let state = if self.session.is_busy() {
            Span::styled("fitting...", Style::default().fg(Color::Yellow))
        } else {
            Span::raw(self.session.state().to_string())
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!(
                    "model: {} | n={} | state: ",
                    self.session.model().name(),
                    self.session.x().len()
                ),
                Style::default().fg(Color::Gray),
            ),
            state,
        ]));

        if let Some(fit) = self.session.fit_result() {
            let s = fit.stats();
            lines.push(Line::from(Span::styled(
                format!(
                    "chi-square={} | reduced={} | aic={} | bic={} | nfev={}",
                    fmt_g(s.chisqr),
                    fmt_g(s.redchi),
                    fmt_g(s.aic),
                    fmt_g(s.bic),
                    s.nfev
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(12)])
            .split(area);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(20), Constraint::Min(0)])
            .split(rows[1]);

        self.draw_chart(frame, rows[0]);
        self.draw_models(frame, bottom[0]);
        self.draw_params(frame, bottom[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Data and model").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let plot = self.frame.0.borrow();
        let Some(series) = chart_series(&plot) else {
            let msg = Paragraph::new("Nothing to plot.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = CurveChart {
            points: &series.points,
            model: &series.model,
            components: &series.components,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            fitted: plot.fitted,
        };
        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series.x_bounds, series.y_bounds);
        }
    }

    fn draw_models(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .models
            .iter()
            .map(|(display, _)| ListItem::new(*display))
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Models").borders(Borders::ALL).border_style(focus_style(self.focus == Focus::Models)))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.model_cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_params(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let header = Row::new(["name", "value", "vary", "min", "max", "expr", "stderr"])
            .style(Style::default().add_modifier(Modifier::BOLD));

        let active = self.focus == Focus::Params;
        let rows: Vec<Row> = self
            .session
            .binding()
            .groups()
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let param = self.session.params().get(group.name());
                let editing = self.editor.as_ref().filter(|e| e.name == group.name());
                let cell = |column: Column, text: String, dim: bool| {
                    let text = match editing {
                        Some(e) if e.column == column => format!("{}_", e.buffer),
                        _ => text,
                    };
                    let mut style = Style::default();
                    if dim {
                        style = style.fg(Color::DarkGray);
                    }
                    if active && i == self.param_cursor && column == self.column {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    Cell::from(text).style(style)
                };
                Row::new(vec![
                    Cell::from(group.name().to_string()),
                    cell(Column::Value, fmt_g(group.value()), false),
                    cell(Column::Vary, if group.vary() { "[x]" } else { "[ ]" }.to_string(), false),
                    cell(Column::Min, fmt_g(group.min_field().value()), group.min_field().is_disabled()),
                    cell(Column::Max, fmt_g(group.max_field().value()), group.max_field().is_disabled()),
                    cell(Column::Expr, param.and_then(|p| p.expr.clone()).unwrap_or_default(), false),
                    Cell::from(param.and_then(|p| p.stderr).map(fmt_g).unwrap_or_default()),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(22),
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Min(16),
            Constraint::Length(11),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().title("Parameters").borders(Borders::ALL).border_style(focus_style(active)))
            .row_highlight_style(Style::default().fg(Color::White).bg(Color::DarkGray));

        let mut state = TableState::default();
        if !self.session.binding().is_empty() {
            state.select(Some(self.param_cursor));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_report(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut text = self.session.fit_report().unwrap_or_else(|e| e.to_string());
        if let Ok(table) = self.session.parameter_table() {
            text.push('\n');
            text.push_str(&table.to_text());
        }
        let rect = centered(area, 90, 85);
        frame.render_widget(Clear, rect);
        let p = Paragraph::new(text).block(
            Block::default()
                .title("Fit report (Esc closes)")
                .borders(Borders::ALL),
        );
        frame.render_widget(p, rect);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = if self.editor.is_some() {
            "type value  Enter apply  Esc cancel"
        } else if self.session.is_busy() {
            "Esc cancel fit  q quit"
        } else {
            "Tab focus  ↑/↓ select  ←/→ column  Enter add/edit  v vary  n/x min/max  = expr  g guess  f fit  r report  e export  c clear  q quit"
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Parse a numeric cell. Values must be finite; bounds accept `inf`/`-inf`.
fn parse_field(column: Column, text: &str) -> Option<ControlEvent> {
    let v: f64 = text.trim().parse().ok()?;
    if v.is_nan() {
        return None;
    }
    match column {
        Column::Value if v.is_finite() => Some(ControlEvent::Value(v)),
        Column::Min => Some(ControlEvent::Min(v)),
        Column::Max => Some(ControlEvent::Max(v)),
        _ => None,
    }
}

fn centered(area: Rect, pct_x: u16, pct_y: u16) -> Rect {
    let width = area.width * pct_x / 100;
    let height = area.height * pct_y / 100;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

struct ChartSeries {
    points: Vec<(f64, f64)>,
    model: Vec<(f64, f64)>,
    components: Vec<Vec<(f64, f64)>>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Pair up the frame's series and pad the y range by 5%.
fn chart_series(frame: &PlotFrame) -> Option<ChartSeries> {
    let (x0, x1) = frame.x_bounds()?;
    let (y0, y1) = frame.y_bounds()?;

    let pair = |ys: &[f64]| -> Vec<(f64, f64)> {
        frame
            .grid
            .iter()
            .copied()
            .zip(ys.iter().copied())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect()
    };
    let points = frame
        .x
        .iter()
        .copied()
        .zip(frame.data.iter().copied())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let model = frame.model.as_deref().map(pair).unwrap_or_default();
    let components = frame.components.iter().map(|c| pair(&c.y)).collect();

    let pad = ((y1 - y0) * 0.05).max(1e-12);
    Some(ChartSeries {
        points,
        model,
        components,
        x_bounds: [x0, x1],
        y_bounds: [y0 - pad, y1 + pad],
    })
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };
    (rect, Some(insets))
}

/// Tick labels outside the Plotters area; its own text is unreadable at cell resolution.
fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let bottom = chart.y + chart.height;

    if bottom < inner.y + inner.height - 1 {
        for i in 0..ticks {
            let u = i as f64 / (ticks as f64 - 1.0);
            let label = fmt_tick(x_bounds[0] + u * (x_bounds[1] - x_bounds[0]));
            let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
            let start = x.saturating_sub(label.len() as u16 / 2);
            let width = label.len() as u16;
            frame.render_widget(
                Paragraph::new(label).style(style),
                Rect { x: start, y: bottom, width, height: 1 },
            );
        }
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = fmt_tick(y_bounds[0] + u * (y_bounds[1] - y_bounds[0]));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let right = inner.x + insets.left.saturating_sub(1);
        let start = right.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect { x: start, y, width, height: 1 },
        );
    }

    let x_rect = Rect {
        x: chart.x,
        y: bottom + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        let x_label = Paragraph::new("x").alignment(Alignment::Center).style(style);
        frame.render_widget(x_label, x_rect);
    }
}

fn fmt_tick(v: f64) -> String {
    let s = fmt_g(v);
    if s.len() <= 8 { s } else { format!("{v:.2e}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataSeries, SessionConfig};
    use crate::plot::ComponentCurve;

    fn app() -> App {
        let series = DataSeries {
            x: vec![0.0, 1.0, 2.0, 3.0],
            y: vec![1.0, 2.0, 3.0, 4.0],
        };
        App::new(Session::new(series, SessionConfig::default()).unwrap())
    }

    #[test]
    fn numeric_cells_parse_per_column() {
        assert_eq!(parse_field(Column::Value, " 2.5 "), Some(ControlEvent::Value(2.5)));
        assert_eq!(parse_field(Column::Value, "inf"), None);
        assert_eq!(parse_field(Column::Min, "-inf"), Some(ControlEvent::Min(f64::NEG_INFINITY)));
        assert_eq!(parse_field(Column::Max, "nan"), None);
        assert_eq!(parse_field(Column::Max, "abc"), None);
        assert_eq!(parse_field(Column::Vary, "1"), None);
    }

    #[test]
    fn columns_wrap_around() {
        assert_eq!(Column::Value.step(-1), Column::Expr);
        assert_eq!(Column::Expr.step(1), Column::Value);
        assert_eq!(Column::Vary.step(2), Column::Max);
    }

    #[test]
    fn chart_series_pairs_grid_with_curves() {
        let mut frame = PlotFrame::observed(&[0.0, 1.0], &[0.0, 10.0]);
        assert!(chart_series(&PlotFrame::default()).is_none());

        frame.grid = vec![0.0, 0.5, 1.0];
        frame.model = Some(vec![0.0, f64::NAN, 10.0]);
        frame.components.push(ComponentCurve {
            prefix: "linear0_".into(),
            y: vec![0.0, 5.0, 10.0],
        });
        let s = chart_series(&frame).unwrap();
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.model, vec![(0.0, 0.0), (1.0, 10.0)]);
        assert_eq!(s.components[0].len(), 3);
        assert_eq!(s.x_bounds, [0.0, 1.0]);
        assert!((s.y_bounds[0] + 0.5).abs() < 1e-12);
        assert!((s.y_bounds[1] - 10.5).abs() < 1e-12);
    }

    #[test]
    fn keys_drive_the_session() {
        let mut app = app();
        let linear = app.models.iter().position(|(_, k)| *k == ModelKind::Linear).unwrap();
        app.model_cursor = linear;
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.session.model().len(), 1);
        assert!(app.frame.0.borrow().model.is_some());

        // Edit linear0_intercept through the table.
        app.handle_key(KeyCode::Tab);
        let row = app
            .session
            .binding()
            .groups()
            .iter()
            .position(|g| g.name() == "linear0_intercept")
            .unwrap();
        app.param_cursor = row;
        app.handle_key(KeyCode::Enter);
        app.editor.as_mut().unwrap().buffer = "3".to_string();
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.session.params().value("linear0_intercept"), Some(3.0));

        app.handle_key(KeyCode::Char('v'));
        assert!(!app.session.params().get("linear0_intercept").unwrap().vary);

        app.handle_key(KeyCode::Char('c'));
        assert!(app.session.model().is_empty());
        assert_eq!(app.param_cursor, 0);
        assert!(!app.handle_key(KeyCode::Esc));
        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn report_requires_a_fit() {
        let mut app = app();
        app.handle_key(KeyCode::Char('r'));
        assert!(!app.show_report);
        assert!(app.status.contains("no completed fit"));
    }
}
