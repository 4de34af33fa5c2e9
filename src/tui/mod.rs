mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::client::{HttpQueryClient, QueryBackend};
use crate::config::Settings;
use crate::model::{LifecycleEvent, Notification, ProgressStage};
use crate::orchestrator::{self, LifecycleController, UiCommand};
use crate::presenter::{CitationCard, CitationsView, ResultView, TableView, ViewBody, NO_DETAIL_PLACEHOLDER};
use crate::text_summary::disclosure_lines;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap},
    Terminal,
};
use state::{apply_event, notice_line, UiState, TAB_ANSWER, TAB_HELP, TAB_HISTORY};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, settings: Settings) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<LifecycleEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let backend: Arc<dyn QueryBackend> = Arc::new(HttpQueryClient::new(&settings)?);
    let controller = LifecycleController::new(settings.tick_interval, event_tx);

    if let Some(q) = args.question.as_deref() {
        let _ = cmd_tx.send(UiCommand::Submit(q.to_string()));
    }

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(settings, event_rx, cmd_tx));

    let res = orchestrator::run_controller(backend, controller, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    settings: Settings,
    mut event_rx: UnboundedReceiver<LifecycleEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    state.info(format!("Connected to {}", settings.base_url));

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 3;
                        if state.tab == TAB_HISTORY {
                            state.history_selected = 0;
                        }
                    }
                    (_, KeyCode::F(1)) => state.tab = TAB_HELP,
                    (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
                        state.disclosure_open = !state.disclosure_open;
                    }
                    (KeyModifiers::CONTROL, KeyCode::Char('y')) => {
                        match state.current_statement().map(str::to_owned) {
                            Some(sql) => match export::copy_to_clipboard(&sql) {
                                Ok(()) => state.info("SQL copied to clipboard"),
                                Err(e) => state.notify(Notification::error(format!(
                                    "Clipboard unavailable: {e:#}"
                                ))),
                            },
                            None => state.info("No SQL to copy"),
                        }
                    }
                    (KeyModifiers::CONTROL, KeyCode::Char('e')) if state.tab == TAB_HISTORY => {
                        match state.selected_entry().map(export::export_entry_json) {
                            Some(Ok(path)) => {
                                state.info(format!("Exported JSON: {}", path.display()))
                            }
                            Some(Err(e)) => state.notify(Notification::error(format!(
                                "JSON export failed: {e:#}"
                            ))),
                            None => {}
                        }
                    }
                    (_, KeyCode::Up) if state.tab == TAB_HISTORY => state.select_up(),
                    (_, KeyCode::Down) if state.tab == TAB_HISTORY => state.select_down(),
                    (_, KeyCode::Enter) if state.tab == TAB_HISTORY => {
                        if !state.submitting && state.selected_entry().is_some() {
                            let _ = cmd_tx.send(UiCommand::SelectHistory(state.history_selected));
                        }
                    }
                    (_, KeyCode::Enter) if state.tab == TAB_ANSWER => {
                        // Blank input and in-flight queries are both inert.
                        if !state.submitting && !state.input.trim().is_empty() {
                            let question = std::mem::take(&mut state.input);
                            let _ = cmd_tx.send(UiCommand::Submit(question));
                        }
                    }
                    (_, KeyCode::Backspace) if state.tab == TAB_ANSWER => {
                        state.input.pop();
                    }
                    (m, KeyCode::Char(c))
                        if state.tab == TAB_ANSWER && !m.contains(KeyModifiers::CONTROL) =>
                    {
                        state.input.push(c);
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Answer"),
        Line::from(format!("History ({})", state.history.len())),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("querio"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_ANSWER => draw_answer(chunks[1], f, state),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }

    let status = match state.notice.as_ref() {
        Some(n) => notice_line(n),
        None => Line::from(""),
    };
    f.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::ALL).title("Status")),
        chunks[2],
    );
}

fn draw_answer(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input_style = if state.submitting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let input_title = if state.submitting {
        "Question (waiting for answer)"
    } else {
        "Question (Enter to ask)"
    };
    let input = Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::styled(state.input.clone(), input_style),
    ]))
    .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, rows[0]);

    f.render_widget(progress_timeline(state.stage), rows[1]);

    let title = match state.asked.as_deref() {
        Some(q) => format!("Answer: {q}"),
        None => "Answer".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    match state.view.as_ref() {
        Some(view) => draw_view(area_inside(rows[2], block, f), f, view, state.disclosure_open),
        None => {
            let msg = if state.submitting {
                "Working on it..."
            } else {
                "Ask about your data or your documents."
            };
            f.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(Color::DarkGray)))
                    .block(block),
                rows[2],
            );
        }
    }
}

/// Render `block` and return the area inside its borders.
fn area_inside(area: Rect, block: Block, f: &mut ratatui::Frame) -> Rect {
    let inner = block.inner(area);
    f.render_widget(block, area);
    inner
}

fn progress_timeline(stage: ProgressStage) -> Paragraph<'static> {
    let mut spans = Vec::new();
    for (i, step) in ProgressStage::STEPS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
        }
        let style = if *step == stage {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if step.index() < stage.index() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{}. {}", step.index(), step.label()), style));
    }
    Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Progress"))
}

fn draw_view(area: Rect, f: &mut ratatui::Frame, view: &ResultView, disclosure_open: bool) {
    let mut constraints = vec![Constraint::Length(1)];
    if view.summary.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(3));
    if disclosure_open {
        constraints.push(Constraint::Percentage(40));
    } else {
        constraints.push(Constraint::Length(1));
    }
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut idx = 0;
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw("Route: "),
            Span::styled(
                view.route_label.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ])),
        parts[idx],
    );
    idx += 1;

    if let Some(summary) = view.summary.as_deref() {
        f.render_widget(
            Paragraph::new(summary.to_string())
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::TOP).title("Executive Summary")),
            parts[idx],
        );
        idx += 1;
    }

    let body = parts[idx];
    match &view.body {
        ViewBody::Table(table) => f.render_widget(table_widget(table), body),
        ViewBody::Citations(citations) => f.render_widget(citations_widget(citations), body),
        ViewBody::Fused {
            narrative,
            table,
            citations,
        } => {
            let fused = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Percentage(50),
                    Constraint::Min(3),
                ])
                .split(body);
            f.render_widget(
                Paragraph::new(narrative.clone())
                    .wrap(Wrap { trim: false })
                    .block(
                        Block::default()
                            .borders(Borders::TOP)
                            .title("Executive Intelligence Summary"),
                    ),
                fused[0],
            );
            f.render_widget(table_widget(table), fused[1]);
            f.render_widget(citations_widget(citations), fused[2]);
        }
        ViewBody::Placeholder => f.render_widget(
            Paragraph::new(Span::styled(
                NO_DETAIL_PLACEHOLDER,
                Style::default().fg(Color::DarkGray),
            )),
            body,
        ),
    }
    idx += 1;

    let details = parts[idx];
    if disclosure_open {
        let lines: Vec<Line> = disclosure_lines(&view.disclosure)
            .into_iter()
            .map(Line::from)
            .collect();
        f.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: false }).block(
                Block::default()
                    .borders(Borders::TOP)
                    .title("AI Engine Details (Ctrl-D to hide)"),
            ),
            details,
        );
    } else {
        f.render_widget(
            Paragraph::new(Span::styled(
                "AI Engine Details hidden (Ctrl-D to show)",
                Style::default().fg(Color::DarkGray),
            )),
            details,
        );
    }
}

fn table_widget(table: &TableView) -> Table<'static> {
    let header = Row::new(
        table
            .columns
            .iter()
            .map(|c| Cell::from(c.clone()).style(Style::default().add_modifier(Modifier::BOLD))),
    );
    let rows = table
        .rows
        .iter()
        .map(|r| Row::new(r.iter().map(|c| Cell::from(c.clone()))));
    let widths = vec![Constraint::Fill(1); table.columns.len().max(1)];
    Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::TOP)
            .title(format!("SQL Result ({} rows)", table.row_count)),
    )
}

fn card_lines(n: usize, card: &CitationCard) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::raw(format!("{n}. ")),
        Span::styled(card.filename.clone(), Style::default().fg(Color::Cyan)),
        Span::raw(format!("  Relevance: {}  Chunk {}", card.score, card.chunk_index)),
    ])];
    if !card.preview.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("   {}", card.preview),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn citations_widget(citations: &CitationsView) -> Paragraph<'static> {
    let mut lines = Vec::new();
    if !citations.narrative.is_empty() {
        lines.push(Line::from(citations.narrative.clone()));
        lines.push(Line::from(""));
    }
    for (i, card) in citations.cards.iter().enumerate() {
        lines.extend(card_lines(i + 1, card));
    }
    Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::TOP)
            .title(format!("Document Insights ({} sources)", citations.cards.len())),
    )
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line> = vec![Line::from(vec![
        Span::raw(format!(
            "History ({}/{}) - ",
            if state.history.is_empty() {
                0
            } else {
                state.history_selected + 1
            },
            state.history.len()
        )),
        Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(": show, "),
        Span::styled("Ctrl-E", Style::default().fg(Color::Magenta)),
        Span::raw(": export JSON"),
    ])];
    lines.push(Line::from(""));

    if state.history.is_empty() {
        lines.push(Line::from(Span::styled(
            "No queries yet",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, entry) in state.history.iter().enumerate() {
        let selected = i == state.history_selected;
        let marker = if selected { "> " } else { "  " };
        let style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(marker, style),
            Span::styled(format!("[{}] ", entry.answered_at), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{:<8}", entry.result.route.label()),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(entry.question.clone(), style),
        ]));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(p, area);
}
