use std::{sync::Arc, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fadewatch_monitor::{DashboardView, MonitorState, MonitoringLoop, ThresholdKnob};
use fadewatch_ops::write_export;
use fadewatch_sampler::ConfiguredSampler;
use fadewatch_types::{
    analysis::{AnalysisTrigger, DispatchStatus},
    fading::FadingCategory,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Sparkline, Wrap},
    Frame, Terminal,
};
use tokio::runtime::Handle;

const CHART_SAMPLES: usize = 50;
const LISTED_EVENTS: usize = 10;
const INTERVAL_STEP: Duration = Duration::from_millis(100);
const THRESHOLD_STEP_DB: f64 = 1.0;

struct Dashboard {
    handle: Handle,
    monitor: Arc<MonitoringLoop<ConfiguredSampler>>,
    export_dir: String,
    selected: usize,
    status: String,
}

pub fn run(
    handle: Handle,
    monitor: Arc<MonitoringLoop<ConfiguredSampler>>,
    export_dir: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let mut dashboard = Dashboard {
        handle,
        monitor,
        export_dir,
        selected: 0,
        status: String::from("Press s to start sampling"),
    };
    let res = run_loop(&mut terminal, &mut dashboard);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    res
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    dashboard: &mut Dashboard,
) -> Result<()> {
    loop {
        let view = dashboard
            .handle
            .block_on(dashboard.monitor.session().dashboard(CHART_SAMPLES, LISTED_EVENTS));
        if dashboard.selected >= view.history.events.len() {
            dashboard.selected = view.history.events.len().saturating_sub(1);
        }

        terminal.draw(|f| draw(f, &view, dashboard))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('s') => dashboard.toggle(),
                    KeyCode::Char('r') => dashboard.reset(),
                    KeyCode::Char('e') => dashboard.export(),
                    KeyCode::Char('[') => dashboard.adjust_interval(&view, false),
                    KeyCode::Char(']') => dashboard.adjust_interval(&view, true),
                    KeyCode::Char('-') => dashboard.step_threshold(ThresholdKnob::Fast, false),
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        dashboard.step_threshold(ThresholdKnob::Fast, true)
                    }
                    KeyCode::Char('<') => dashboard.step_threshold(ThresholdKnob::Slow, false),
                    KeyCode::Char('>') => dashboard.step_threshold(ThresholdKnob::Slow, true),
                    KeyCode::Char('m') => dashboard.step_threshold(ThresholdKnob::Moderate, false),
                    KeyCode::Char('M') => dashboard.step_threshold(ThresholdKnob::Moderate, true),
                    KeyCode::Up => dashboard.selected = dashboard.selected.saturating_sub(1),
                    KeyCode::Down => dashboard.selected += 1,
                    KeyCode::Char('a') | KeyCode::Enter => dashboard.analyze_selected(&view),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

impl Dashboard {
    fn toggle(&mut self) {
        let state = self.handle.block_on(self.monitor.toggle());
        self.status = format!("Monitoring {state}");
    }

    fn reset(&mut self) {
        self.handle.block_on(self.monitor.session().reset());
        self.selected = 0;
        self.status = "Session history cleared".into();
    }

    fn export(&mut self) {
        let rows = self
            .handle
            .block_on(self.monitor.session().history().export_rows());
        self.status = match write_export(&self.export_dir, &rows) {
            Ok(path) => format!("Exported {} samples to {}", rows.len(), path.display()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn adjust_interval(&mut self, view: &DashboardView, longer: bool) {
        let current = view.settings.interval;
        let next = if longer {
            current + INTERVAL_STEP
        } else {
            current.saturating_sub(INTERVAL_STEP).max(INTERVAL_STEP)
        };
        self.status = match self
            .handle
            .block_on(self.monitor.session().set_interval(next))
        {
            Ok(()) => format!("Interval set to {} ms", next.as_millis()),
            Err(err) => format!("Interval rejected: {err}"),
        };
    }

    fn step_threshold(&mut self, knob: ThresholdKnob, raise: bool) {
        let step = if raise {
            THRESHOLD_STEP_DB
        } else {
            -THRESHOLD_STEP_DB
        };
        self.status = match self
            .handle
            .block_on(self.monitor.session().step_threshold(knob, step))
        {
            Ok(thresholds) => {
                let shadowed = if thresholds.moderate_is_shadowed() {
                    " (moderate shadowed by fast)"
                } else {
                    ""
                };
                format!("{} threshold updated{shadowed}", knob.label())
            }
            Err(err) => format!("Threshold rejected: {err}"),
        };
    }

    /// Events are listed newest first, so the selection counts from the end.
    fn selected_event(&self, view: &DashboardView) -> Option<usize> {
        let events = &view.history.events;
        events
            .len()
            .checked_sub(self.selected + 1)
            .and_then(|pos| events.get(pos))
            .map(|(index, _)| *index)
    }

    fn analyze_selected(&mut self, view: &DashboardView) {
        let Some(index) = self.selected_event(view) else {
            self.status = "No fading event selected".into();
            return;
        };
        self.status = match self
            .handle
            .block_on(self.monitor.session().analyze_event(index))
        {
            Ok(DispatchStatus::Started) => format!("Analyzing event #{index}"),
            Ok(DispatchStatus::Queued { .. }) => {
                format!("Event #{index} queued behind the running analysis")
            }
            Err(err) => format!("Analysis not possible: {err}"),
        };
    }
}

fn draw(f: &mut Frame, view: &DashboardView, dashboard: &Dashboard) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4),
                Constraint::Length(10),
                Constraint::Min(6),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.size());

    f.render_widget(header(view), rows[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)].as_ref())
        .split(rows[1]);
    let levels: Vec<u64> = view
        .history
        .recent
        .iter()
        .map(|entry| (entry.rssi() + 100.0).clamp(0.0, 100.0) as u64)
        .collect();
    let chart = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("RSSI, last 50 samples (-100..0 dBm)"),
        )
        .data(&levels)
        .max(100)
        .style(Style::default().fg(Color::Green));
    f.render_widget(chart, middle[0]);

    let counts: Vec<ListItem> = FadingCategory::ALL
        .iter()
        .map(|category| {
            let count = view.history.counts.get(category).copied().unwrap_or(0);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{count:>5} "), Style::default().fg(Color::Yellow)),
                Span::raw(category.label()),
            ]))
        })
        .collect();
    f.render_widget(
        List::new(counts).block(Block::default().borders(Borders::ALL).title("Events by type")),
        middle[1],
    );

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(rows[2]);
    let events: Vec<ListItem> = view
        .history
        .events
        .iter()
        .rev()
        .map(|(index, entry)| {
            let category = entry.category.map(|c| c.label()).unwrap_or("-");
            ListItem::new(format!(
                "#{index:<5} {}  {:>7.1} dBm  {:>+6.1} dB  {category}",
                entry.sample.timestamp.format("%H:%M:%S"),
                entry.rssi(),
                entry.delta
            ))
        })
        .collect();
    let mut list_state = ListState::default();
    if !events.is_empty() {
        list_state.select(Some(dashboard.selected));
    }
    let event_list = List::new(events)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Recent fading events"),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(event_list, bottom[0], &mut list_state);

    f.render_widget(report(view), bottom[1]);

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(dashboard.status.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(
                "  | s start/stop  r reset  a analyze  [ ] interval  -/+ fast  </> slow  m/M moderate  e export  q quit",
            ),
        ])),
        rows[3],
    );
}

fn header(view: &DashboardView) -> Paragraph<'static> {
    let state_style = match view.state {
        MonitorState::Running => Style::default().fg(Color::Green),
        MonitorState::Stopped => Style::default().fg(Color::Red),
    };
    let (rssi, delta) = view
        .history
        .recent
        .last()
        .map(|entry| (format!("{:.1} dBm", entry.rssi()), format!("{:+.1} dB", entry.delta)))
        .unwrap_or_else(|| ("-".into(), "-".into()));

    let thresholds = &view.settings.thresholds;
    let status = Line::from(vec![
        Span::styled(
            "fadewatch",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(view.state.to_string(), state_style.add_modifier(Modifier::BOLD)),
        Span::raw(format!("  RSSI {rssi} ({delta})")),
        Span::raw(format!(
            "  samples {}  events {}  ticks {}  missed {}  interval {} ms",
            view.history.total_samples,
            view.history.event_count,
            view.ticks.ticks,
            view.ticks.misses,
            view.settings.interval.as_millis()
        )),
    ]);
    let sensitivity = Line::from(Span::styled(
        format!(
            "thresholds: fast {:.0} dB  slow {:.0} dB  multipath {}x{:.0} dB  moderate {:.0} dB",
            thresholds.fast_threshold_db,
            thresholds.slow_threshold_db,
            thresholds.oscillation_count,
            thresholds.oscillation_threshold_db,
            thresholds.moderate_threshold_db
        ),
        Style::default().fg(Color::Yellow),
    ));

    Paragraph::new(vec![status, sensitivity])
        .block(Block::default().borders(Borders::ALL).title("Status"))
}

fn report(view: &DashboardView) -> Paragraph<'static> {
    let stats = view.analysis;
    let title = format!(
        "Analysis{}  done {}  failed {}  superseded {}  cancelled {}",
        if view.analysis_busy { " (running...)" } else { "" },
        stats.completed,
        stats.failed,
        stats.superseded,
        stats.cancelled
    );
    let lines = match &view.latest_report {
        Some(report) => {
            let source = match report.trigger {
                AnalysisTrigger::Periodic => "live event".to_string(),
                AnalysisTrigger::OnDemand { event_index } => format!("event #{event_index}"),
            };
            let style = if report.is_failure() {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            vec![
                Line::from(Span::styled(
                    format!("{} - {source}", report.completed_at.format("%H:%M:%S")),
                    Style::default().fg(Color::Magenta),
                )),
                Line::from(Span::styled(report.text().to_string(), style)),
            ]
        }
        None => vec![Line::from("No analysis yet.")],
    };
    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title))
}
