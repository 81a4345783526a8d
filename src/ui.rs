mod app;
mod content;
mod render;
mod widgets;

use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event as CEvent, KeyEvent, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, info};

use crate::report;
use crate::storage::{StorageError, Store};

use app::{App, Command, ReportData, ReportRequest};

const TICK: StdDuration = StdDuration::from_millis(500);

/// Runs the interactive tracker until the user quits.
pub fn run(store: &Store) -> io::Result<()> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, store: &Store) -> io::Result<()> {
	let mut app = App::new(store, Utc::now());
	let size = terminal.size()?;
	app.resize(size.width, size.height);
	info!(projects = app.projects.len(), "interactive session started");

	loop {
		app.set_now(Utc::now());
		terminal.draw(|frame| render::draw(frame, &app))?;

		if !event::poll(TICK)? {
			app.blink();
			continue;
		}

		match event::read()? {
			CEvent::Key(key) => {
				if key.kind != KeyEventKind::Press {
					continue;
				}
				if dispatch(&mut app, store, key) {
					break;
				}
			}
			CEvent::Resize(width, height) => app.resize(width, height),
			_ => {}
		}
	}

	info!("interactive session finished");
	Ok(())
}

/// Feeds one key press through the app and runs the command it asks for.
/// Returns `true` when the app should exit.
pub(crate) fn dispatch(app: &mut App, store: &Store, key: KeyEvent) -> bool {
	match app.handle_key(key, store) {
		Command::None => false,
		Command::Quit => true,
		Command::Blink => {
			app.restart_blink();
			false
		}
		Command::Aggregate(request) => {
			debug!(?request, "running aggregate");
			let outcome = run_report(store, request, app.now());
			app.receive_report(outcome);
			false
		}
	}
}

fn run_report(store: &Store, request: ReportRequest, now: DateTime<Utc>) -> Result<ReportData, StorageError> {
	match request {
		ReportRequest::Monthly { year, month } => {
			report::monthly_report(store, year, month, now).map(ReportData::Monthly)
		}
		ReportRequest::Weekly => report::weekly_overview(store, now).map(ReportData::Weekly),
	}
}
