use std::fmt::Display;

use chrono::{DateTime, Datelike, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;
use tracing::warn;

use crate::clock::{self, hm, parse_duration, shift_month};
use crate::domain::{Entry, Project, Timer};
use crate::report::{self, MonthlyReport, WeeklyOverview, bar_width_for};
use crate::storage::{StorageError, Store};

use super::content;
use super::widgets::{EntryList, QuickSelect, SelectOption, SelectState, TextInput, Viewport};

const NAME_LIMIT: usize = 120;
const MESSAGE_LIMIT: usize = 500;
const DURATION_LIMIT: usize = 16;
const CHROME_ROWS: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
	ProjectList,
	ProjectMenu,
	StoppingTimer,
	ManualEntry,
	ShowLogs,
	EntryList,
	EntryDetail,
	EditEntry,
	Confirm,
	MoveEntryTarget,
	RenameProject,
	NewProject,
	ReportView,
	Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRequest {
	Monthly { year: i32, month: u32 },
	Weekly,
}

/// Side effect requested by a key press, run by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	None,
	Quit,
	Blink,
	Aggregate(ReportRequest),
}

#[derive(Debug, Clone)]
pub enum ReportData {
	Monthly(MonthlyReport),
	Weekly(WeeklyOverview),
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
	pub project: Project,
	pub timer: Option<Timer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopField {
	Message,
	Billable,
}

#[derive(Debug, Clone)]
pub struct StopForm {
	pub message: TextInput,
	pub billable: bool,
	pub field: StopField,
}

impl StopForm {
	fn new() -> Self {
		Self {
			message: TextInput::new("What did you work on?", MESSAGE_LIMIT),
			billable: true,
			field: StopField::Message,
		}
	}

	fn reset(&mut self) {
		self.message.clear();
		self.billable = true;
		self.field = StopField::Message;
		self.message.focus();
	}

	fn toggle_field(&mut self) {
		self.field = match self.field {
			StopField::Message => StopField::Billable,
			StopField::Billable => StopField::Message,
		};
		if self.field == StopField::Message {
			self.message.focus();
		} else {
			self.message.blur();
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualField {
	Duration,
	Message,
	Billable,
}

#[derive(Debug, Clone)]
pub struct ManualForm {
	pub duration: TextInput,
	pub message: TextInput,
	pub billable: bool,
	pub field: ManualField,
}

impl ManualForm {
	fn new() -> Self {
		Self {
			duration: TextInput::new("e.g. 1h30m", DURATION_LIMIT),
			message: TextInput::new("What did you work on?", MESSAGE_LIMIT),
			billable: true,
			field: ManualField::Duration,
		}
	}

	fn reset(&mut self) {
		self.duration.clear();
		self.message.clear();
		self.billable = true;
		self.focus(ManualField::Duration);
	}

	fn cycle(&mut self, forward: bool) {
		let next = match (self.field, forward) {
			(ManualField::Duration, true) | (ManualField::Billable, false) => ManualField::Message,
			(ManualField::Message, true) | (ManualField::Duration, false) => ManualField::Billable,
			(ManualField::Billable, true) | (ManualField::Message, false) => ManualField::Duration,
		};
		self.focus(next);
	}

	fn focus(&mut self, field: ManualField) {
		self.field = field;
		self.duration.blur();
		self.message.blur();
		match field {
			ManualField::Duration => self.duration.focus(),
			ManualField::Message => self.message.focus(),
			ManualField::Billable => {}
		}
	}

	fn focused_input(&mut self) -> Option<&mut TextInput> {
		match self.field {
			ManualField::Duration => Some(&mut self.duration),
			ManualField::Message => Some(&mut self.message),
			ManualField::Billable => None,
		}
	}
}

#[derive(Debug, Clone)]
pub enum ConfirmAction {
	DeleteEntry(Entry),
	DeleteProject(Project),
}

#[derive(Debug, Clone)]
pub struct ConfirmState {
	pub action: ConfirmAction,
	pub prompt: String,
	pub return_to: View,
}

#[derive(Debug, Clone)]
pub struct MoveState {
	pub entry: Entry,
	pub select: SelectState<Project>,
	pub return_to: View,
}

#[derive(Debug, Clone)]
pub struct App {
	pub(super) view: View,
	pub(super) previous: View,
	pub(super) projects: Vec<ProjectRow>,
	pub(super) project_index: usize,
	pub(super) quick_select: QuickSelect,
	pub(super) stop_form: StopForm,
	pub(super) manual_form: ManualForm,
	pub(super) entries: EntryList,
	pub(super) detail: Option<Entry>,
	pub(super) detail_owner: String,
	pub(super) content_input: TextInput,
	pub(super) confirm: Option<ConfirmState>,
	pub(super) move_target: Option<MoveState>,
	pub(super) name_input: TextInput,
	pub(super) log_viewport: Viewport,
	pub(super) log_show_all: bool,
	pub(super) report_viewport: Viewport,
	pub(super) report_year: i32,
	pub(super) report_month: u32,
	pub(super) dashboard_viewport: Viewport,
	pub(super) status: Option<String>,
	pub(super) width: u16,
	pub(super) now: DateTime<Utc>,
}

impl App {
	pub fn new(store: &Store, now: DateTime<Utc>) -> Self {
		let today = now.with_timezone(&Local).date_naive();
		let mut app = Self {
			view: View::ProjectList,
			previous: View::ProjectList,
			projects: Vec::new(),
			project_index: 0,
			quick_select: QuickSelect::default(),
			stop_form: StopForm::new(),
			manual_form: ManualForm::new(),
			entries: EntryList::default(),
			detail: None,
			detail_owner: String::new(),
			content_input: TextInput::new("What did you work on?", MESSAGE_LIMIT),
			confirm: None,
			move_target: None,
			name_input: TextInput::new("Project name", NAME_LIMIT),
			log_viewport: Viewport::default(),
			log_show_all: false,
			report_viewport: Viewport::default(),
			report_year: today.year(),
			report_month: today.month(),
			dashboard_viewport: Viewport::default(),
			status: None,
			width: 80,
			now,
		};

		app.refresh_projects(store);
		if let Some(index) = app.projects.iter().position(|row| row.timer.is_some()) {
			app.project_index = index;
		}
		if !app.projects.is_empty() {
			app.view = View::ProjectMenu;
		}
		app
	}

	pub fn view(&self) -> View {
		self.view
	}

	pub fn status(&self) -> Option<&str> {
		self.status.as_deref()
	}

	pub fn set_now(&mut self, now: DateTime<Utc>) {
		self.now = now;
	}

	pub fn now(&self) -> DateTime<Utc> {
		self.now
	}

	pub fn resize(&mut self, width: u16, height: u16) {
		self.width = width;
		let rows = height.saturating_sub(CHROME_ROWS) as usize;
		self.log_viewport.set_height(rows);
		self.report_viewport.set_height(rows);
		self.dashboard_viewport.set_height(rows);
	}

	/// Toggles the cursor of whichever input has focus.
	pub fn blink(&mut self) {
		for input in self.inputs_mut() {
			input.blink();
		}
	}

	pub fn restart_blink(&mut self) {
		for input in self.inputs_mut() {
			input.show_cursor();
		}
	}

	fn inputs_mut(&mut self) -> [&mut TextInput; 6] {
		[
			&mut self.stop_form.message,
			&mut self.manual_form.duration,
			&mut self.manual_form.message,
			&mut self.name_input,
			&mut self.content_input,
			self.entries.filter_mut(),
		]
	}

	pub fn current_project(&self) -> Option<&ProjectRow> {
		self.projects.get(self.project_index)
	}

	pub fn handle_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		if self.view != View::ShowLogs {
			self.status = None;
		}

		if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
			return Command::Quit;
		}

		match self.view {
			View::ProjectList | View::ProjectMenu => self.handle_project_key(key, store),
			View::StoppingTimer => self.handle_stop_key(key, store),
			View::ManualEntry => self.handle_manual_key(key, store),
			View::ShowLogs => self.handle_logs_key(key, store),
			View::EntryList => self.handle_entry_list_key(key, store),
			View::EntryDetail => self.handle_entry_detail_key(key),
			View::EditEntry => self.handle_edit_entry_key(key, store),
			View::Confirm => self.handle_confirm_key(key, store),
			View::MoveEntryTarget => self.handle_move_key(key, store),
			View::RenameProject | View::NewProject => self.handle_name_key(key, store),
			View::ReportView => self.handle_report_key(key),
			View::Dashboard => self.handle_dashboard_key(key),
		}
	}

	/// Installs the outcome of an `Aggregate` command.
	pub fn receive_report(&mut self, outcome: Result<ReportData, StorageError>) {
		match outcome {
			Ok(ReportData::Monthly(report)) => {
				self.report_year = report.year;
				self.report_month = report.month;
				self.report_viewport.set_content(content::monthly_lines(&report));
				self.report_viewport.goto_top();
				self.view = View::ReportView;
			}
			Ok(ReportData::Weekly(overview)) => {
				let highlight = self.current_project().map(|row| row.project.id);
				self.dashboard_viewport.set_content(content::overview_lines(
					&overview,
					bar_width_for(self.width),
					highlight,
				));
				self.view = View::Dashboard;
			}
			Err(err) => self.fail(err),
		}
	}

	fn handle_project_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		if let KeyCode::Char(value) = key.code {
			if let Some(digit) = value.to_digit(10) {
				if let Some(index) = self.quick_select.press(digit, self.projects.len()) {
					self.project_index = index;
					self.view = View::ProjectMenu;
				}
				return Command::None;
			}
		}
		self.quick_select.reset();

		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => self.view = View::ProjectList,
			KeyCode::Up | KeyCode::Char('k') => self.move_project(-1),
			KeyCode::Down | KeyCode::Char('j') => self.move_project(1),
			KeyCode::Enter => {
				if self.current_project().is_some() {
					self.view = View::ProjectMenu;
				}
			}
			KeyCode::Char('n') => {
				self.previous = self.view;
				self.name_input.clear();
				self.name_input.focus();
				self.view = View::NewProject;
				return Command::Blink;
			}
			KeyCode::Char('r') => return self.open_report(),
			KeyCode::Char('o') => {
				self.previous = self.view;
				return Command::Aggregate(ReportRequest::Weekly);
			}
			KeyCode::Char('s') => self.start_timer(store),
			KeyCode::Char('p') => return self.begin_stop(),
			KeyCode::Char('x') => self.cancel_timer(store),
			KeyCode::Char('e') => return self.begin_manual_entry(),
			KeyCode::Char('l') => self.open_logs(store),
			KeyCode::Char('v') => self.open_entries(store),
			KeyCode::Char('D') => self.confirm_delete_project(),
			KeyCode::Char('R') => return self.begin_rename(),
			_ => {}
		}
		Command::None
	}

	fn move_project(&mut self, delta: i32) {
		if self.projects.is_empty() {
			self.project_index = 0;
			return;
		}

		if delta > 0 {
			self.project_index = (self.project_index + delta as usize).min(self.projects.len() - 1);
		} else {
			self.project_index = self.project_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_project(&mut self) -> Option<ProjectRow> {
		let row = self.current_project().cloned();
		if row.is_none() {
			self.status = Some("Create a project first (press n)".to_string());
		}
		row
	}

	fn start_timer(&mut self, store: &Store) {
		let Some(row) = self.selected_project() else {
			return;
		};
		if row.timer.is_some() {
			self.status = Some(format!("Timer already running for '{}'", row.project.name));
			return;
		}

		match row.project.start_timer(store, Utc::now()) {
			Ok(_) => {
				self.status = Some(format!("Timer started for '{}'", row.project.name));
				self.view = View::ProjectMenu;
				self.refresh_projects(store);
			}
			Err(err) => self.fail(err),
		}
	}

	fn cancel_timer(&mut self, store: &Store) {
		let Some(row) = self.selected_project() else {
			return;
		};
		if row.timer.is_none() {
			self.status = Some(format!("No running timer for '{}'", row.project.name));
			return;
		}

		match row.project.cancel_timer(store) {
			Ok(()) => {
				self.status = Some(format!("Timer cancelled for '{}'", row.project.name));
				self.refresh_projects(store);
			}
			Err(err) => self.fail(err),
		}
	}

	fn begin_stop(&mut self) -> Command {
		let Some(row) = self.selected_project() else {
			return Command::None;
		};
		if row.timer.is_none() {
			self.status = Some(format!("No running timer for '{}'", row.project.name));
			return Command::None;
		}

		self.stop_form.reset();
		self.view = View::StoppingTimer;
		Command::Blink
	}

	fn begin_manual_entry(&mut self) -> Command {
		if self.selected_project().is_none() {
			return Command::None;
		}
		self.manual_form.reset();
		self.view = View::ManualEntry;
		Command::Blink
	}

	fn begin_rename(&mut self) -> Command {
		let Some(row) = self.selected_project() else {
			return Command::None;
		};
		self.previous = self.view;
		self.name_input.set_value(&row.project.name);
		self.name_input.focus();
		self.view = View::RenameProject;
		Command::Blink
	}

	fn confirm_delete_project(&mut self) {
		let Some(row) = self.selected_project() else {
			return;
		};
		self.confirm = Some(ConfirmState {
			prompt: format!("Delete project '{}' with all its entries?", row.project.name),
			action: ConfirmAction::DeleteProject(row.project),
			return_to: self.view,
		});
		self.view = View::Confirm;
	}

	fn open_report(&mut self) -> Command {
		if self.view != View::ReportView {
			self.previous = self.view;
		}
		let today = self.now.with_timezone(&Local).date_naive();
		Command::Aggregate(ReportRequest::Monthly {
			year: today.year(),
			month: today.month(),
		})
	}

	fn open_logs(&mut self, store: &Store) {
		if self.selected_project().is_none() {
			return;
		}
		self.log_viewport.goto_top();
		self.load_logs(store);
		self.view = View::ShowLogs;
	}

	fn load_logs(&mut self, store: &Store) {
		let Some(row) = self.current_project().cloned() else {
			return;
		};
		match row.project.entries(store) {
			Ok(entries) => {
				let log = report::project_log(&entries, clock::local_day(self.now), self.log_show_all);
				self.log_viewport.set_content(content::log_lines(&log));
			}
			Err(err) => self.fail(err),
		}
	}

	fn open_entries(&mut self, store: &Store) {
		if self.selected_project().is_none() {
			return;
		}
		self.entries.clear_filter();
		self.refresh_entries(store);
		self.detail = None;
		self.view = View::EntryList;
	}

	fn refresh_entries(&mut self, store: &Store) {
		let Some(row) = self.current_project().cloned() else {
			self.entries.set_entries(Vec::new());
			return;
		};
		match row.project.entries(store) {
			Ok(entries) => self.entries.set_entries(entries),
			Err(err) => self.fail(err),
		}
	}

	/// Reloads projects and timers, keeping the selection on the same project.
	fn refresh_projects(&mut self, store: &Store) {
		let selected_id = self.current_project().map(|row| row.project.id);
		let projects = match Project::list(store) {
			Ok(projects) => projects,
			Err(err) => {
				self.fail(err);
				return;
			}
		};

		self.projects = projects
			.into_iter()
			.map(|project| {
				let (_, timer) = project.on_clock(store);
				ProjectRow { project, timer }
			})
			.collect();

		let index = selected_id
			.and_then(|id| self.projects.iter().position(|row| row.project.id == id))
			.unwrap_or(self.project_index);
		self.project_index = index.min(self.projects.len().saturating_sub(1));
		if self.projects.is_empty() && self.view == View::ProjectMenu {
			self.view = View::ProjectList;
		}
	}

	fn select_project_id(&mut self, id: i64) {
		if let Some(index) = self.projects.iter().position(|row| row.project.id == id) {
			self.project_index = index;
		}
	}

	fn handle_stop_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		match key.code {
			KeyCode::Esc => {
				self.stop_form.message.blur();
				self.view = View::ProjectMenu;
			}
			KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
				self.stop_form.toggle_field();
				return Command::Blink;
			}
			KeyCode::Enter => match self.stop_form.field {
				StopField::Message => self.submit_stop(store),
				StopField::Billable => self.stop_form.billable = !self.stop_form.billable,
			},
			KeyCode::Char(' ') if self.stop_form.field == StopField::Billable => {
				self.stop_form.billable = !self.stop_form.billable;
			}
			_ => {
				self.stop_form.message.handle_key(key);
			}
		}
		Command::None
	}

	fn submit_stop(&mut self, store: &Store) {
		let Some(row) = self.current_project().cloned() else {
			return;
		};
		let message = self.stop_form.message.value().to_string();
		match row.project.stop_timer(store, &message, self.stop_form.billable, Utc::now()) {
			Ok(entry) => {
				self.status = Some(format!(
					"Logged {} to '{}'",
					entry.hours_mins(),
					row.project.name
				));
				self.stop_form.message.blur();
				self.view = View::ProjectMenu;
				self.refresh_projects(store);
			}
			Err(err) => self.fail(err),
		}
	}

	fn handle_manual_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		match key.code {
			KeyCode::Esc => {
				self.manual_form.focus(ManualField::Billable);
				self.view = View::ProjectMenu;
			}
			KeyCode::Tab | KeyCode::Down => {
				self.manual_form.cycle(true);
				return Command::Blink;
			}
			KeyCode::BackTab | KeyCode::Up => {
				self.manual_form.cycle(false);
				return Command::Blink;
			}
			KeyCode::Enter => match self.manual_form.field {
				ManualField::Duration => {
					self.manual_form.focus(ManualField::Message);
					return Command::Blink;
				}
				ManualField::Message => return self.submit_manual_entry(store),
				ManualField::Billable => self.manual_form.billable = !self.manual_form.billable,
			},
			KeyCode::Char(' ') if self.manual_form.field == ManualField::Billable => {
				self.manual_form.billable = !self.manual_form.billable;
			}
			_ => {
				if let Some(input) = self.manual_form.focused_input() {
					input.handle_key(key);
				}
			}
		}
		Command::None
	}

	fn submit_manual_entry(&mut self, store: &Store) -> Command {
		let Some(row) = self.current_project().cloned() else {
			return Command::None;
		};

		let raw = self.manual_form.duration.value().trim().to_string();
		if raw.is_empty() {
			self.status = Some("Duration cannot be empty".to_string());
			self.manual_form.focus(ManualField::Duration);
			return Command::Blink;
		}
		let duration = match parse_duration(&raw) {
			Ok(duration) => duration,
			Err(err) => {
				self.status = Some(format!("error: {err}"));
				self.manual_form.focus(ManualField::Duration);
				return Command::Blink;
			}
		};

		let message = self.manual_form.message.value().trim().to_string();
		if message.is_empty() {
			self.status = Some("Message cannot be empty".to_string());
			return Command::None;
		}

		match row
			.project
			.create_entry_with_duration(store, &message, duration, self.manual_form.billable, Utc::now())
		{
			Ok(_) => {
				self.status = Some(format!("Logged {} to '{}'", hm(duration), row.project.name));
				self.manual_form.focus(ManualField::Billable);
				self.view = View::ProjectMenu;
				self.refresh_projects(store);
			}
			Err(err) => self.fail(err),
		}
		Command::None
	}

	fn handle_logs_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => {
				self.status = None;
				self.view = View::ProjectMenu;
			}
			KeyCode::Char('a') => {
				self.log_show_all = !self.log_show_all;
				if !self.log_show_all {
					self.log_viewport.goto_top();
				}
				self.load_logs(store);
			}
			_ => {
				self.log_viewport.handle_key(key);
			}
		}
		Command::None
	}

	fn handle_entry_list_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		if self.entries.is_filtering() {
			match key.code {
				KeyCode::Esc => self.entries.clear_filter(),
				KeyCode::Enter => self.entries.finish_filter(),
				KeyCode::Up => self.entries.move_selection(-1),
				KeyCode::Down => self.entries.move_selection(1),
				_ => {
					self.entries.handle_filter_key(key);
				}
			}
			return Command::None;
		}

		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => {
				if self.entries.has_filter() {
					self.entries.clear_filter();
				} else {
					self.view = View::ProjectMenu;
				}
			}
			KeyCode::Char('/') => {
				self.entries.start_filter();
				return Command::Blink;
			}
			KeyCode::Up | KeyCode::Char('k') => self.entries.move_selection(-1),
			KeyCode::Down | KeyCode::Char('j') => self.entries.move_selection(1),
			KeyCode::PageUp => self.entries.move_selection(-10),
			KeyCode::PageDown => self.entries.move_selection(10),
			KeyCode::Enter => {
				if let Some(entry) = self.entries.selected_entry().cloned() {
					self.open_detail(entry, store);
				}
			}
			KeyCode::Char('m') => self.begin_move(store),
			KeyCode::Char('d') => self.confirm_delete_entry(),
			_ => {}
		}
		Command::None
	}

	fn handle_entry_detail_key(&mut self, key: KeyEvent) -> Command {
		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => {
				self.detail = None;
				self.view = View::EntryList;
			}
			KeyCode::Char('e') => {
				if let Some(entry) = &self.detail {
					self.content_input.set_value(&entry.content);
					self.content_input.focus();
					self.view = View::EditEntry;
					return Command::Blink;
				}
			}
			KeyCode::Char('m') => self.begin_move_entry(),
			KeyCode::Char('d') => self.confirm_delete_entry(),
			_ => {}
		}
		Command::None
	}

	fn open_detail(&mut self, entry: Entry, store: &Store) {
		self.detail_owner = match entry.project(store) {
			Ok(Some(project)) => project.name,
			Ok(None) => "(missing project)".to_string(),
			Err(err) => {
				self.fail(err);
				return;
			}
		};
		self.detail = Some(entry);
		self.view = View::EntryDetail;
	}

	fn handle_edit_entry_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		match key.code {
			KeyCode::Esc => {
				self.content_input.blur();
				self.view = View::EntryDetail;
			}
			KeyCode::Enter => self.submit_edit(store),
			_ => {
				self.content_input.handle_key(key);
			}
		}
		Command::None
	}

	fn submit_edit(&mut self, store: &Store) {
		let Some(mut entry) = self.detail.clone() else {
			self.view = View::EntryList;
			return;
		};

		entry.set_content(self.content_input.value());
		match entry
			.update(store)
			.and_then(|()| store.get_entry(&entry.id).map_err(Into::into))
		{
			Ok(reloaded) => {
				self.detail = Some(reloaded.unwrap_or(entry));
				self.status = Some("Entry updated".to_string());
				self.content_input.blur();
				self.refresh_entries(store);
				self.view = View::EntryDetail;
			}
			Err(err) => self.fail(err),
		}
	}

	fn focused_entry(&self) -> Option<&Entry> {
		if self.view == View::EntryDetail {
			self.detail.as_ref()
		} else {
			self.entries.selected_entry()
		}
	}

	fn begin_move(&mut self, store: &Store) {
		self.refresh_projects(store);
		self.begin_move_entry();
	}

	fn begin_move_entry(&mut self) {
		let Some(entry) = self.focused_entry().cloned() else {
			self.status = Some("No entry selected".to_string());
			return;
		};

		let options = self
			.projects
			.iter()
			.filter(|row| row.project.id != entry.project_id)
			.map(|row| SelectOption::new(row.project.name.clone(), row.project.clone(), Style::default()))
			.collect::<Vec<_>>();
		if options.is_empty() {
			self.status = Some("No other projects available to move this entry.".to_string());
			return;
		}

		self.move_target = Some(MoveState {
			entry,
			select: SelectState::new("Move entry to", options),
			return_to: self.view,
		});
		self.view = View::MoveEntryTarget;
	}

	fn handle_move_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		let Some(state) = self.move_target.as_mut() else {
			self.view = View::EntryList;
			return Command::None;
		};

		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => {
				self.view = state.return_to;
				self.move_target = None;
			}
			KeyCode::Up | KeyCode::Char('k') => state.select.move_selection(-1),
			KeyCode::Down | KeyCode::Char('j') => state.select.move_selection(1),
			KeyCode::Enter => {
				let Some(target) = state.select.selected_option().map(|option| option.value.clone()) else {
					return Command::None;
				};
				let mut entry = state.entry.clone();
				match entry.move_to(store, &target) {
					Ok(()) => {
						self.status = Some(format!("Entry moved to '{}'", target.name));
						self.move_target = None;
						self.detail = None;
						self.refresh_entries(store);
						self.refresh_projects(store);
						self.view = if self.entries.is_empty() {
							View::ProjectMenu
						} else {
							View::EntryList
						};
					}
					Err(err) => self.fail(err),
				}
			}
			_ => {}
		}
		Command::None
	}

	fn confirm_delete_entry(&mut self) {
		let Some(entry) = self.focused_entry().cloned() else {
			self.status = Some("No entry selected".to_string());
			return;
		};
		self.confirm = Some(ConfirmState {
			prompt: format!("Delete entry '{}'?", content::truncate(entry.summary(), 40)),
			action: ConfirmAction::DeleteEntry(entry),
			return_to: self.view,
		});
		self.view = View::Confirm;
	}

	fn handle_confirm_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		let Some(confirm) = self.confirm.clone() else {
			self.view = View::ProjectList;
			return Command::None;
		};

		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
				self.confirm = None;
				self.run_confirmed(confirm, store);
			}
			KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
				self.confirm = None;
				self.view = confirm.return_to;
			}
			_ => {}
		}
		Command::None
	}

	fn run_confirmed(&mut self, confirm: ConfirmState, store: &Store) {
		match confirm.action {
			ConfirmAction::DeleteEntry(entry) => match entry.delete(store) {
				Ok(()) => {
					self.status = Some("Entry deleted".to_string());
					self.detail = None;
					self.refresh_entries(store);
					self.refresh_projects(store);
					self.view = if self.entries.is_empty() {
						View::ProjectMenu
					} else {
						View::EntryList
					};
				}
				Err(err) => {
					self.fail(err);
					self.view = confirm.return_to;
				}
			},
			ConfirmAction::DeleteProject(project) => match project.delete(store) {
				Ok(()) => {
					self.status = Some(format!("Project '{}' deleted", project.name));
					self.refresh_projects(store);
					self.view = View::ProjectList;
				}
				Err(err) => {
					self.fail(err);
					self.view = confirm.return_to;
				}
			},
		}
	}

	fn handle_name_key(&mut self, key: KeyEvent, store: &Store) -> Command {
		match key.code {
			KeyCode::Esc => {
				self.name_input.blur();
				self.view = if self.projects.is_empty() {
					View::ProjectList
				} else {
					self.previous
				};
			}
			KeyCode::Enter => {
				if self.view == View::RenameProject {
					self.submit_rename(store);
				} else {
					self.submit_new_project(store);
				}
			}
			_ => {
				self.name_input.handle_key(key);
			}
		}
		Command::None
	}

	fn submit_rename(&mut self, store: &Store) {
		let Some(mut row) = self.current_project().cloned() else {
			return;
		};
		let old_name = row.project.name.clone();
		match row.project.rename(store, self.name_input.value()) {
			Ok(changed) => {
				if changed {
					self.status = Some(format!("Renamed '{}' to '{}'", old_name, row.project.name));
				}
				self.name_input.blur();
				self.view = View::ProjectMenu;
				self.refresh_projects(store);
			}
			Err(err) => self.fail(err),
		}
	}

	fn submit_new_project(&mut self, store: &Store) {
		match Project::create(store, self.name_input.value()) {
			Ok(project) => {
				self.status = Some(format!("Created project '{}'", project.name));
				self.name_input.blur();
				self.refresh_projects(store);
				self.select_project_id(project.id);
				self.view = View::ProjectMenu;
			}
			Err(err) => self.fail(err),
		}
	}

	fn handle_report_key(&mut self, key: KeyEvent) -> Command {
		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => self.view = self.previous,
			KeyCode::Char('h') | KeyCode::Left => return self.shift_report_month(-1),
			KeyCode::Char('l') | KeyCode::Right => return self.shift_report_month(1),
			KeyCode::Char('r') => return self.open_report(),
			_ => {
				self.report_viewport.handle_key(key);
			}
		}
		Command::None
	}

	fn shift_report_month(&mut self, delta: i32) -> Command {
		let today = self.now.with_timezone(&Local).date_naive();
		let (year, month) = shift_month(self.report_year, self.report_month, delta);
		let (year, month) = if (year, month) > (today.year(), today.month()) {
			(today.year(), today.month())
		} else {
			(year, month)
		};
		Command::Aggregate(ReportRequest::Monthly { year, month })
	}

	fn handle_dashboard_key(&mut self, key: KeyEvent) -> Command {
		match key.code {
			KeyCode::Char('q') => return Command::Quit,
			KeyCode::Esc => self.view = self.previous,
			KeyCode::Char('r') => return Command::Aggregate(ReportRequest::Weekly),
			_ => {
				self.dashboard_viewport.handle_key(key);
			}
		}
		Command::None
	}

	fn fail(&mut self, err: impl Display) {
		warn!(error = %err, view = ?self.view, "operation failed");
		self.status = Some(format!("error: {err}"));
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Datelike, Duration, Local, Utc};
	use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

	use crate::domain::Project;
	use crate::storage::Store;
	use crate::ui::dispatch;

	use super::{App, Command, ReportRequest, View};

	fn key(code: KeyCode) -> KeyEvent {
		KeyEvent::new(code, KeyModifiers::NONE)
	}

	fn press(app: &mut App, store: &Store, code: KeyCode) -> bool {
		dispatch(app, store, key(code))
	}

	fn type_text(app: &mut App, store: &Store, text: &str) {
		for value in text.chars() {
			press(app, store, KeyCode::Char(value));
		}
	}

	fn store_with(names: &[&str]) -> Store {
		let store = Store::open_in_memory().expect("in-memory store should open");
		for name in names {
			Project::create(&store, name).expect("create project");
		}
		store
	}

	fn numbered(count: usize) -> Vec<String> {
		(1..=count).map(|index| format!("p{index:02}")).collect()
	}

	#[test]
	fn numeric_selection_with_few_projects() {
		let store = store_with(&["a", "b", "c"]);
		let mut app = App::new(&store, Utc::now());

		press(&mut app, &store, KeyCode::Char('3'));
		assert_eq!(app.project_index, 2);
		assert_eq!(app.view(), View::ProjectMenu);
		press(&mut app, &store, KeyCode::Char('2'));
		assert_eq!(app.project_index, 1);
	}

	#[test]
	fn numeric_selection_with_many_projects() {
		let names = numbered(15);
		let store = store_with(&names.iter().map(String::as_str).collect::<Vec<_>>());
		let mut app = App::new(&store, Utc::now());

		press(&mut app, &store, KeyCode::Char('1'));
		press(&mut app, &store, KeyCode::Char('2'));
		assert_eq!(app.project_index, 11);
		press(&mut app, &store, KeyCode::Char('3'));
		assert_eq!(app.project_index, 2);
	}

	#[test]
	fn starts_and_stops_a_timer_through_the_form() {
		let store = store_with(&["Alpha"]);
		let mut app = App::new(&store, Utc::now());
		assert_eq!(app.view(), View::ProjectMenu);

		press(&mut app, &store, KeyCode::Char('s'));
		assert!(app.current_project().expect("project").timer.is_some());

		press(&mut app, &store, KeyCode::Char('p'));
		assert_eq!(app.view(), View::StoppingTimer);
		type_text(&mut app, &store, "quiet work #deep");
		assert!(!press(&mut app, &store, KeyCode::Char('q')));
		press(&mut app, &store, KeyCode::Tab);
		press(&mut app, &store, KeyCode::Char(' '));
		press(&mut app, &store, KeyCode::Tab);
		press(&mut app, &store, KeyCode::Enter);

		assert_eq!(app.view(), View::ProjectMenu);
		assert!(app.current_project().expect("project").timer.is_none());
		let entries = store.list_entries(app.current_project().expect("project").project.id).expect("entries");
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].content, "quiet work #deepq");
		assert!(!entries[0].billable);
		assert_eq!(entries[0].tags, vec!["deepq".to_string()]);
	}

	#[test]
	fn stop_without_timer_stays_put() {
		let store = store_with(&["Idle"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('p'));
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.status(), Some("No running timer for 'Idle'"));

		press(&mut app, &store, KeyCode::Down);
		assert_eq!(app.status(), None);
	}

	#[test]
	fn manual_entry_validates_duration() {
		let store = store_with(&["Manual"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('e'));
		assert_eq!(app.view(), View::ManualEntry);

		type_text(&mut app, &store, "soon");
		press(&mut app, &store, KeyCode::Enter);
		type_text(&mut app, &store, "standup");
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::ManualEntry);
		assert!(app.status().is_some_and(|status| status.starts_with("error:")));

		app.manual_form.duration.clear();
		type_text(&mut app, &store, "45m");
		press(&mut app, &store, KeyCode::Enter);
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.status(), Some("Logged 0:45 to 'Manual'"));

		let entries = store.list_entries(app.current_project().expect("project").project.id).expect("entries");
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].content, "standup");
		assert_eq!(entries[0].duration_ms, 45 * 60 * 1000);
		assert!(entries[0].billable);
	}

	#[test]
	fn creates_and_renames_projects() {
		let store = store_with(&[]);
		let mut app = App::new(&store, Utc::now());
		assert_eq!(app.view(), View::ProjectList);

		press(&mut app, &store, KeyCode::Char('n'));
		assert_eq!(app.view(), View::NewProject);
		type_text(&mut app, &store, "Client work");
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.current_project().expect("project").project.name, "Client work");

		press(&mut app, &store, KeyCode::Char('n'));
		type_text(&mut app, &store, "client WORK");
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::NewProject);
		assert!(app.status().is_some_and(|status| status.contains("already exists")));
		press(&mut app, &store, KeyCode::Esc);

		press(&mut app, &store, KeyCode::Char('R'));
		assert_eq!(app.view(), View::RenameProject);
		press(&mut app, &store, KeyCode::End);
		type_text(&mut app, &store, " 2");
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.current_project().expect("project").project.name, "Client work 2");
	}

	#[test]
	fn deleting_a_project_requires_confirmation() {
		let store = store_with(&["Keep", "Drop"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('1'));
		assert_eq!(app.current_project().expect("project").project.name, "Drop");

		press(&mut app, &store, KeyCode::Char('D'));
		assert_eq!(app.view(), View::Confirm);
		press(&mut app, &store, KeyCode::Char('n'));
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.projects.len(), 2);

		press(&mut app, &store, KeyCode::Char('D'));
		press(&mut app, &store, KeyCode::Char('y'));
		assert_eq!(app.view(), View::ProjectList);
		assert_eq!(app.projects.len(), 1);
		assert_eq!(app.projects[0].project.name, "Keep");
	}

	#[test]
	fn moves_and_deletes_entries_from_the_list() {
		let store = store_with(&["Source", "Target"]);
		let source = Project::find(&store, "Source").expect("find").expect("source exists");
		for content in ["first", "second"] {
			source
				.create_entry_with_duration(&store, content, Duration::minutes(5), true, Utc::now())
				.expect("create entry");
		}

		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('1'));
		press(&mut app, &store, KeyCode::Char('v'));
		assert_eq!(app.view(), View::EntryList);
		assert_eq!(app.entries.len(), 2);

		press(&mut app, &store, KeyCode::Char('m'));
		assert_eq!(app.view(), View::MoveEntryTarget);
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::EntryList);
		assert_eq!(app.entries.len(), 1);
		assert_eq!(app.status(), Some("Entry moved to 'Target'"));

		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::EntryDetail);
		press(&mut app, &store, KeyCode::Char('d'));
		assert_eq!(app.view(), View::Confirm);
		press(&mut app, &store, KeyCode::Enter);
		assert_eq!(app.view(), View::ProjectMenu);
		assert!(source.entries(&store).expect("entries").is_empty());
	}

	#[test]
	fn filter_narrows_entries_and_escape_clears_it() {
		let store = store_with(&["Filter"]);
		let project = Project::find(&store, "Filter").expect("find").expect("project exists");
		for content in ["Write docs", "review docs", "deploy"] {
			project
				.create_entry_with_duration(&store, content, Duration::minutes(1), true, Utc::now())
				.expect("create entry");
		}

		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('v'));
		press(&mut app, &store, KeyCode::Char('/'));
		type_text(&mut app, &store, "DOCS");
		assert_eq!(app.entries.len(), 2);
		press(&mut app, &store, KeyCode::Enter);
		assert!(!app.entries.is_filtering());
		assert_eq!(app.entries.len(), 2);

		press(&mut app, &store, KeyCode::Esc);
		assert_eq!(app.entries.len(), 3);
		assert_eq!(app.view(), View::EntryList);
		press(&mut app, &store, KeyCode::Esc);
		assert_eq!(app.view(), View::ProjectMenu);
	}

	#[test]
	fn report_navigation_is_clamped_to_the_current_month() {
		let store = store_with(&["Report"]);
		let now = Utc::now();
		let today = now.with_timezone(&Local).date_naive();
		let mut app = App::new(&store, now);

		press(&mut app, &store, KeyCode::Char('r'));
		assert_eq!(app.view(), View::ReportView);
		assert_eq!((app.report_year, app.report_month), (today.year(), today.month()));

		assert_eq!(
			app.handle_key(key(KeyCode::Right), &store),
			Command::Aggregate(ReportRequest::Monthly {
				year: today.year(),
				month: today.month()
			})
		);

		press(&mut app, &store, KeyCode::Left);
		let expected = crate::clock::shift_month(today.year(), today.month(), -1);
		assert_eq!((app.report_year, app.report_month), expected);

		press(&mut app, &store, KeyCode::Char('r'));
		assert_eq!((app.report_year, app.report_month), (today.year(), today.month()));
		press(&mut app, &store, KeyCode::Esc);
		assert_eq!(app.view(), View::ProjectMenu);
	}

	#[test]
	fn logs_keep_errors_visible_while_scrolling() {
		let store = store_with(&["Logs"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('l'));
		assert_eq!(app.view(), View::ShowLogs);

		app.status = Some("error: disk full".to_string());
		press(&mut app, &store, KeyCode::Down);
		assert_eq!(app.status(), Some("error: disk full"));
		press(&mut app, &store, KeyCode::Char('a'));
		assert!(app.log_show_all);
		press(&mut app, &store, KeyCode::Esc);
		assert_eq!(app.view(), View::ProjectMenu);
		assert_eq!(app.status(), None);
	}

	#[test]
	fn dashboard_opens_and_returns() {
		let store = store_with(&["Dash"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('o'));
		assert_eq!(app.view(), View::Dashboard);
		assert!(!app.dashboard_viewport.lines().is_empty());
		press(&mut app, &store, KeyCode::Esc);
		assert_eq!(app.view(), View::ProjectMenu);
	}

	#[test]
	fn cancelling_a_timer_discards_it() {
		let store = store_with(&["Cancel"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('x'));
		assert_eq!(app.status(), Some("No running timer for 'Cancel'"));

		press(&mut app, &store, KeyCode::Char('s'));
		press(&mut app, &store, KeyCode::Char('x'));
		assert_eq!(app.status(), Some("Timer cancelled for 'Cancel'"));
		assert!(app.current_project().expect("project").timer.is_none());
		assert!(store.list_entries(app.current_project().expect("project").project.id).expect("entries").is_empty());
	}

	#[test]
	fn editing_an_entry_rederives_its_tags() {
		let store = store_with(&["Edit"]);
		let project = Project::find(&store, "Edit").expect("find").expect("project exists");
		project
			.create_entry_with_duration(&store, "draft", Duration::minutes(3), true, Utc::now())
			.expect("create entry");

		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('v'));
		press(&mut app, &store, KeyCode::Enter);
		press(&mut app, &store, KeyCode::Char('e'));
		assert_eq!(app.view(), View::EditEntry);
		type_text(&mut app, &store, " #final");
		press(&mut app, &store, KeyCode::Enter);

		assert_eq!(app.view(), View::EntryDetail);
		let detail = app.detail.clone().expect("detail shown");
		assert_eq!(detail.content, "draft #final");
		assert_eq!(detail.tags, vec!["final".to_string()]);
		assert_eq!(app.entries.selected_entry().map(|entry| entry.content.as_str()), Some("draft #final"));
	}

	#[test]
	fn quits_on_q_and_ctrl_c() {
		let store = store_with(&["Quit"]);
		let mut app = App::new(&store, Utc::now());
		assert!(dispatch(&mut app, &store, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
		assert!(press(&mut app, &store, KeyCode::Char('q')));
	}

	#[test]
	fn blink_toggles_only_the_focused_input() {
		let store = store_with(&["Blink"]);
		let mut app = App::new(&store, Utc::now());
		press(&mut app, &store, KeyCode::Char('n'));
		let before = app.name_input.spans();
		app.blink();
		assert_ne!(app.name_input.spans(), before);
		app.restart_blink();
		assert_eq!(app.name_input.spans(), before);
	}
}
