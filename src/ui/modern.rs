//! Modern TUI mode: a full-screen progress gauge with an eta label.
//!
//! The event loop uses `tokio::select!` to handle:
//! - Page snapshots from the watcher
//! - User keyboard input (q/ESC/Ctrl-C to quit)

use crate::sse::ReadyState;
use crate::state::{Update, WatchState};
use crate::ui::styles::ProgressStyles;
use crate::watcher::ProgressWatcher;
use crossterm::{
    event::{Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Layout},
    text::{Line, Span},
    widgets::{Block, Gauge, Paragraph},
};
use std::io::{self};
use std::thread;
use tokio::sync::mpsc;

/// UI state for the modern TUI mode
pub struct ModernUIState {
    pub last_update: Option<Update>,
    pub should_exit: bool,
    /// Set once the watcher has dropped its end of the update channel.
    pub watcher_finished: bool,
    pub exit_on_done: bool,
}

impl ModernUIState {
    pub fn new(exit_on_done: bool) -> Self {
        Self {
            last_update: None,
            should_exit: false,
            watcher_finished: false,
            exit_on_done,
        }
    }
}

/// Display progress in modern TUI mode (gauge, eta, status line)
pub async fn display_progress_modern(config: crate::Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (tx, mut rx) = mpsc::channel(32);
    let handle = ProgressWatcher::start(
        &config.stream_url()?,
        config.source_options(),
        config.page(),
        &config.bar_id,
        &config.eta_id,
        tx,
    )?;
    enable_raw_mode().map_err(to_boxed_err)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(to_boxed_err)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(to_boxed_err)?;
    let styles = ProgressStyles::default();
    let mut state = ModernUIState::new(config.exit_on_done);

    // Blocking crossterm reads live on their own OS thread and are forwarded
    // into the runtime; the thread exits once the receiver is gone.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            match crossterm::event::poll(std::time::Duration::from_millis(100)) {
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => {
                        if event_tx.try_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => {}
                },
                Ok(false) => {
                    if event_tx.is_closed() {
                        break;
                    }
                }
                Err(_) => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
        }
    });

    let result = run_loop(&mut terminal, &mut state, &styles, &mut rx, &mut event_rx).await;

    handle.stop();
    disable_raw_mode().map_err(to_boxed_err)?;
    execute!(io::stdout(), LeaveAlternateScreen).map_err(to_boxed_err)?;
    result?;
    handle.wait().await?;
    Ok(())
}

async fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut ModernUIState,
    styles: &ProgressStyles,
    rx: &mut mpsc::Receiver<Update>,
    event_rx: &mut mpsc::Receiver<Event>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    redraw(terminal, state, styles)?;
    while !state.should_exit {
        tokio::select! {
            biased;

            update = rx.recv(), if !state.watcher_finished => {
                process_update(update, state);
                redraw(terminal, state, styles)?;
            }

            maybe_event = event_rx.recv() => {
                if let Some(event) = maybe_event {
                    process_event(event, state);
                    redraw(terminal, state, styles)?;
                } else {
                    state.should_exit = true;
                }
            }
        }
    }
    Ok(())
}

fn redraw<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &ModernUIState,
    styles: &ProgressStyles,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    terminal
        .draw(|f| draw_progress(f, state.last_update.as_ref(), styles))
        .map_err(to_boxed_err)?;
    Ok(())
}

/// Gauge in the middle of the screen, eta under it, status and last error
/// below that.
pub fn draw_progress(f: &mut Frame, update: Option<&Update>, styles: &ProgressStyles) {
    let [_, gauge_area, eta_area, status_area, err_area, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(2),
        Constraint::Fill(1),
    ])
    .areas(f.area());

    let Some(update) = update else {
        let waiting = Paragraph::new("Waiting for progress...").alignment(Alignment::Center);
        f.render_widget(waiting, gauge_area);
        return;
    };

    let bar_style = if update.state == WatchState::Done {
        styles.bar_done
    } else {
        styles.bar
    };
    let gauge = Gauge::default()
        .block(Block::bordered())
        .gauge_style(bar_style)
        .ratio(crate::ui::width_ratio(update.bar.width.as_deref()))
        .label(update.bar.text.clone());
    f.render_widget(gauge, gauge_area);

    let eta = Paragraph::new(Line::from(Span::styled(update.eta.text.clone(), styles.eta)))
        .alignment(Alignment::Center);
    f.render_widget(eta, eta_area);

    let status = Paragraph::new(Line::from(Span::styled(status_text(update), styles.status)))
        .alignment(Alignment::Center);
    f.render_widget(status, status_area);

    if let Some(err) = &update.err {
        let lines: Vec<Line> = error_lines(err, err_area.width as usize)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, styles.error)))
            .collect();
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), err_area);
    }
}

/// Word-wrapped error text; a zero width still yields the text unbroken.
fn error_lines(err: &str, width: usize) -> Vec<String> {
    textwrap::wrap(err, width.max(1))
        .into_iter()
        .map(|l| l.into_owned())
        .collect()
}

fn status_text(update: &Update) -> String {
    match (update.state, update.connection) {
        (WatchState::Done, _) => "done (q to quit)".to_string(),
        (WatchState::Watching, ReadyState::Connecting) => "connecting...".to_string(),
        (WatchState::Watching, ReadyState::Open) => "watching".to_string(),
        (WatchState::Watching, ReadyState::Closed) => "stream closed (q to quit)".to_string(),
    }
}

fn process_update(update: Option<Update>, state: &mut ModernUIState) {
    let Some(update) = update else {
        // Watcher ended; keep the last frame on screen.
        state.watcher_finished = true;
        return;
    };
    if update.state == WatchState::Done && state.exit_on_done {
        state.should_exit = true;
    }
    state.last_update = Some(update);
}

fn process_event(event: Event, state: &mut ModernUIState) {
    if let Event::Key(key) = event {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.should_exit = true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.should_exit = true;
            }
            _ => {}
        }
    }
}

fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}
