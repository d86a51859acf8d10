mod help;
mod state;

use crate::cli::Cli;
use crate::orchestrator::{self, NotificationKind, ReviewEvent, ReviewView, Status, Step, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{ordered_ids, KeyAction, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = crate::cli::build_config(&args)?;
    let (planner, telemetry) = crate::cli::build_services(&cfg)?;

    // Unbounded channels keep the controller from ever waiting on the UI thread.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ReviewEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let title = args.title.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(title, event_rx, cmd_tx));

    let reason = orchestrator::run_controller(&cfg, planner, telemetry, event_tx, cmd_rx).await;
    tracing::info!(?reason, "review closed");

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    title: String,
    mut event_rx: UnboundedReceiver<ReviewEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; it only ever renders the last view it received.
    let mut state = UiState::new(title);
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        loop {
            match event_rx.try_recv() {
                Ok(ReviewEvent::Updated(view)) => {
                    state.apply_view(*view);
                    dirty = true;
                }
                Ok(ReviewEvent::Closed(reason)) => {
                    state.closed = Some(reason);
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    state.closed.get_or_insert(orchestrator::CloseReason::Disconnected);
                    break;
                }
            }
        }
        if state.closed.is_some() {
            break Ok(());
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match state.action_for(k.modifiers, k.code) {
                    KeyAction::Up => state.move_cursor(false),
                    KeyAction::Down => state.move_cursor(true),
                    KeyAction::ToggleHelp => state.show_help = !state.show_help,
                    KeyAction::Command(cmd) => {
                        // Closing waits for the controller; it may refuse while applying.
                        if cmd_tx.send(cmd).is_err() {
                            break Ok(());
                        }
                    }
                    KeyAction::None => continue,
                }
                dirty = true;
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
        .constraints(
            [
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let Some(view) = state.view.as_ref() else {
        let p = Paragraph::new("Starting…")
            .block(Block::default().borders(Borders::ALL).title(state.title.as_str()));
        f.render_widget(p, area);
        return;
    };

    draw_header(chunks[0], f, state, view);
    draw_body(chunks[1], f, state, view);
    draw_notification(chunks[2], f, view);
    draw_footer(chunks[3], f, view);

    if state.show_help {
        help::draw_help(centered(chunks[1], 60, 12), f);
    }
}

fn draw_header(area: Rect, f: &mut ratatui::Frame, state: &UiState, view: &ReviewView) {
    let mut steps: Vec<Span> = Vec::new();
    for (i, step) in Step::ALL.iter().enumerate() {
        if i > 0 {
            steps.push(Span::styled(" ── ", Style::default().fg(Color::DarkGray)));
        }
        let (mark, style) = if view.step_completed(*step) {
            ("✓", Style::default().fg(Color::Green))
        } else if *step == view.step() {
            ("●", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        } else {
            ("○", Style::default().fg(Color::Gray))
        };
        steps.push(Span::styled(format!("{mark} {}", step.label()), style));
    }
    if view.busy {
        steps.push(Span::styled("   working…", Style::default().fg(Color::Yellow)));
    }

    let p = Paragraph::new(vec![
        Line::from(Span::styled(
            view.context_summary.clone(),
            Style::default().fg(Color::Gray),
        )),
        Line::from(steps),
    ])
    .block(Block::default().borders(Borders::ALL).title(state.title.as_str()));
    f.render_widget(p, area);
}

fn draw_body(area: Rect, f: &mut ratatui::Frame, state: &UiState, view: &ReviewView) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut cursor_line = 0usize;

    match view.status {
        Status::Loading => {
            lines.push(Line::from(Span::styled(
                "Analyzing schedule and capacity…",
                Style::default().fg(Color::Yellow),
            )));
        }
        Status::Failed => {
            lines.push(Line::from(Span::styled(
                view.failure_title(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(view.error.clone().unwrap_or_else(|| {
                "Something went wrong while running the planner. Please try again.".to_string()
            })));
            lines.push(Line::from(""));
            let hint = if view.apply_failed() {
                "Your selection is kept. Press enter or r to apply again."
            } else {
                "Press r to retry."
            };
            lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Gray))));
            lines.push(Line::from(""));
        }
        Status::Empty => {
            lines.push(Line::from(Span::styled(
                "Everything's already balanced.",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(view.empty_message().to_string()));
            for s in &view.suggestions {
                lines.push(Line::from(format!("  • {s}")));
            }
        }
        Status::HasChanges | Status::Applying | Status::Applied => {}
    }

    if view.status == Status::Applied || (!view.applied_ids.is_empty() && view.show_review_list()) {
        let summary = view.applied_summary();
        lines.push(Line::from(Span::styled(
            summary.title,
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        for label in summary.preview {
            lines.push(Line::from(format!("  ✓ {label}")));
        }
        if summary.remaining > 0 {
            lines.push(Line::from(format!("  and {} more…", summary.remaining)));
        }
        lines.push(Line::from(""));
    }

    if view.show_review_list() {
        let cursor_id = state.cursor_id();
        for section in view.sections() {
            lines.push(Line::from(Span::styled(
                format!("{} ({})", section.title, section.changes.len()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for change in section.changes {
                let (mark, color) = if view.is_applied(&change.id) {
                    ("[✓]", Color::Green)
                } else if view.is_selected(&change.id) {
                    ("[x]", Color::Magenta)
                } else {
                    ("[ ]", Color::Gray)
                };
                let mut style = Style::default();
                if cursor_id.as_deref() == Some(change.id.as_str()) {
                    style = style.add_modifier(Modifier::REVERSED);
                    cursor_line = lines.len();
                }
                lines.push(Line::from(vec![
                    Span::styled(format!(" {mark} "), Style::default().fg(color)),
                    Span::styled(change.label.clone(), style),
                ]));
                let meta = change.meta_line();
                if !meta.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("      {meta}"),
                        Style::default().fg(Color::Gray),
                    )));
                }
                if let Some(span) = change.span_line() {
                    lines.push(Line::from(Span::styled(
                        format!("      {span}"),
                        Style::default().fg(Color::Gray),
                    )));
                }
            }
        }
        if ordered_ids(view).is_empty() && view.applied_ids.is_empty() {
            lines.push(Line::from("No changes proposed."));
        }
    }

    // Keep the cursor row on screen.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = cursor_line.saturating_sub(visible.saturating_sub(3));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll.min(u16::MAX as usize) as u16, 0))
        .block(Block::default().borders(Borders::ALL).title(view.status.label()));
    f.render_widget(p, area);
}

fn draw_notification(area: Rect, f: &mut ratatui::Frame, view: &ReviewView) {
    let Some(n) = view.notification.as_ref() else {
        return;
    };
    let color = match n.kind {
        NotificationKind::Info => Color::Cyan,
        NotificationKind::Success => Color::Green,
        NotificationKind::Error => Color::Red,
    };
    let p = Paragraph::new(Line::from(Span::styled(
        format!(" {}", n.message),
        Style::default().fg(color),
    )));
    f.render_widget(p, area);
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame, view: &ReviewView) {
    let apply_style = if view.busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    };
    let p = Paragraph::new(Line::from(vec![
        Span::raw(view.footer_hint()),
        Span::raw("   "),
        Span::styled(format!("[enter] {}", view.apply_label()), apply_style),
        Span::styled("   [q] close  [?] help", Style::default().fg(Color::Gray)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
