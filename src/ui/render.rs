use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use super::app::{App, ManualField, StopField, View};
use super::content;
use super::widgets::{SelectState, TextInput, Viewport};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn draw(frame: &mut Frame, app: &App) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(8), Constraint::Length(1), Constraint::Length(3)])
		.split(frame.area());

	draw_view(frame, layout[0], app, app.view);
	render_status(frame, layout[1], app);
	render_footer(frame, layout[2], app);
}

fn draw_view(frame: &mut Frame, area: Rect, app: &App, view: View) {
	match view {
		View::ProjectList | View::ProjectMenu => render_projects(frame, area, app),
		View::StoppingTimer => {
			render_projects(frame, area, app);
			render_stop_form(frame, app);
		}
		View::ManualEntry => {
			render_projects(frame, area, app);
			render_manual_form(frame, app);
		}
		View::ShowLogs => {
			let title = format!("Log: {}", current_name(app));
			render_viewport(frame, area, &app.log_viewport, title);
		}
		View::EntryList => render_entry_list(frame, area, app),
		View::EntryDetail => render_entry_detail(frame, area, app),
		View::EditEntry => {
			render_entry_detail(frame, area, app);
			render_input_popup(frame, "Edit entry".to_string(), &app.content_input);
		}
		View::Confirm => {
			if let Some(confirm) = &app.confirm {
				draw_view(frame, area, app, confirm.return_to);
				render_confirm(frame, &confirm.prompt);
			}
		}
		View::MoveEntryTarget => {
			if let Some(state) = &app.move_target {
				draw_view(frame, area, app, state.return_to);
				render_select_popup(frame, &state.select);
			}
		}
		View::RenameProject => {
			render_projects(frame, area, app);
			render_input_popup(frame, format!("Rename '{}'", current_name(app)), &app.name_input);
		}
		View::NewProject => {
			render_projects(frame, area, app);
			render_input_popup(frame, "New project".to_string(), &app.name_input);
		}
		View::ReportView => render_viewport(frame, area, &app.report_viewport, "Monthly report".to_string()),
		View::Dashboard => render_viewport(frame, area, &app.dashboard_viewport, "Overview".to_string()),
	}
}

fn current_name(app: &App) -> String {
	app.current_project()
		.map(|row| row.project.name.clone())
		.unwrap_or_default()
}

fn render_projects(frame: &mut Frame, area: Rect, app: &App) {
	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
		.split(area);

	let items = app
		.projects
		.iter()
		.enumerate()
		.map(|(index, row)| {
			let mut spans = vec![
				Span::styled(format!("{:>2}. ", index + 1), Style::default().fg(Color::DarkGray)),
				Span::raw(row.project.name.clone()),
			];
			if let Some(timer) = &row.timer {
				spans.push(Span::styled(
					format!("  ● {}", timer.hours_mins(app.now)),
					Style::default().fg(Color::Green),
				));
			}
			ListItem::new(Line::from(spans))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !app.projects.is_empty() {
		state.select(Some(app.project_index.min(app.projects.len() - 1)));
	}

	let title = match app.quick_select.pending() {
		Some(prefix) => format!("Projects ({}) [{prefix}_]", app.projects.len()),
		None => format!("Projects ({})", app.projects.len()),
	};
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no projects yet, press n to create one)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.view == View::ProjectList)),
	)
	.highlight_symbol(">> ")
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
	frame.render_stateful_widget(list, body[0], &mut state);

	let mut lines = Vec::new();
	match app.current_project() {
		Some(row) => {
			lines.push(Line::from(Span::styled(
				row.project.name.clone(),
				Style::default().add_modifier(Modifier::BOLD),
			)));
			lines.push(match &row.timer {
				Some(timer) => Line::from(Span::styled(
					format!(
						"On the clock since {} ({})",
						timer.started_at.with_timezone(&Local).format("%H:%M"),
						timer.hours_mins(app.now)
					),
					Style::default().fg(Color::Green),
				)),
				None => Line::from(Span::styled("Not on the clock", Style::default().fg(Color::DarkGray))),
			});
			lines.push(Line::from(""));
			let mut actions = if row.timer.is_some() {
				vec![("p", "stop timer"), ("x", "cancel timer")]
			} else {
				vec![("s", "start timer")]
			};
			actions.extend([
				("e", "log time manually"),
				("l", "show log"),
				("v", "browse entries"),
				("R", "rename project"),
				("D", "delete project"),
				("r", "monthly report"),
				("o", "weekly overview"),
			]);
			for (key, label) in actions {
				lines.push(Line::from(vec![
					Span::styled(format!("{key:>2}  "), Style::default().fg(Color::Yellow)),
					Span::raw(label),
				]));
			}
		}
		None => lines.push(Line::from("Press n to create your first project.")),
	}

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Actions")
			.border_style(border_style(app.view == View::ProjectMenu)),
	);
	frame.render_widget(panel, body[1]);
}

fn input_line(label: &str, input: &TextInput, focused: bool) -> Line<'static> {
	let mut spans = vec![Span::styled(format!("{label:<10}"), label_style(focused))];
	spans.extend(input.spans());
	Line::from(spans)
}

fn checkbox_line(checked: bool, focused: bool) -> Line<'static> {
	Line::from(vec![
		Span::styled(format!("{:<10}", "Billable"), label_style(focused)),
		Span::raw(if checked { "[x]" } else { "[ ]" }),
	])
}

fn label_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(Color::DarkGray)
	}
}

fn render_stop_form(frame: &mut Frame, app: &App) {
	let form = &app.stop_form;
	let elapsed = app
		.current_project()
		.and_then(|row| row.timer.as_ref())
		.map(|timer| timer.hours_mins(app.now).to_string())
		.unwrap_or_default();
	let lines = vec![
		Line::from(format!("Elapsed   {elapsed}")),
		Line::from(""),
		input_line("Message", &form.message, form.field == StopField::Message),
		checkbox_line(form.billable, form.field == StopField::Billable),
	];
	render_form(frame, format!("Stop timer: {}", current_name(app)), lines);
}

fn render_manual_form(frame: &mut Frame, app: &App) {
	let form = &app.manual_form;
	let lines = vec![
		input_line("Duration", &form.duration, form.field == ManualField::Duration),
		input_line("Message", &form.message, form.field == ManualField::Message),
		checkbox_line(form.billable, form.field == ManualField::Billable),
	];
	render_form(frame, format!("Log time: {}", current_name(app)), lines);
}

fn render_form(frame: &mut Frame, title: String, lines: Vec<Line<'static>>) {
	let area = centered_rect(70, 40, frame.area());
	frame.render_widget(Clear, area);
	let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(true)),
	);
	frame.render_widget(panel, area);
}

fn render_input_popup(frame: &mut Frame, title: String, input: &TextInput) {
	let area = centered_rect(60, 20, frame.area());
	frame.render_widget(Clear, area);
	let panel = Paragraph::new(Line::from(input.spans())).block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(input.is_focused())),
	);
	frame.render_widget(panel, area);
}

fn render_confirm(frame: &mut Frame, prompt: &str) {
	let area = centered_rect(60, 20, frame.area());
	frame.render_widget(Clear, area);
	let panel = Paragraph::new(vec![
		Line::from(prompt.to_string()),
		Line::from(""),
		Line::from(Span::styled("y confirm | n cancel", Style::default().fg(Color::DarkGray))),
	])
	.wrap(Wrap { trim: true })
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title("Confirm")
			.border_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
	);
	frame.render_widget(panel, area);
}

fn render_viewport(frame: &mut Frame, area: Rect, viewport: &Viewport, title: String) {
	let panel = Paragraph::new(viewport.lines().to_vec())
		.scroll((viewport.offset().min(u16::MAX as usize) as u16, 0))
		.block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(panel, area);
}

fn render_entry_list(frame: &mut Frame, area: Rect, app: &App) {
	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
		.split(area);
	let left = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(4), Constraint::Length(3)])
		.split(body[0]);

	let items = app
		.entries
		.visible()
		.map(|entry| {
			let day = entry
				.logged_at()
				.map(|at| at.with_timezone(&Local).format("%m/%d").to_string())
				.unwrap_or_else(|| "--/--".to_string());
			ListItem::new(Line::from(vec![
				Span::styled(format!("{day} "), Style::default().fg(Color::DarkGray)),
				Span::raw(format!("{:>6}  ", entry.hours_mins())),
				Span::raw(content::truncate(entry.summary(), 48)),
			]))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if app.entries.selected_entry().is_some() {
		state.select(Some(app.entries.selected()));
	}

	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no entries)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(format!("Entries: {} ({})", current_name(app), app.entries.len()))
			.border_style(border_style(!app.entries.is_filtering())),
	)
	.highlight_symbol(">> ")
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
	frame.render_stateful_widget(list, left[0], &mut state);

	let filter = Paragraph::new(Line::from(app.entries.filter().spans())).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Filter (/)")
			.border_style(border_style(app.entries.is_filtering())),
	);
	frame.render_widget(filter, left[1]);

	let preview = match app.entries.selected_entry() {
		Some(entry) => content::detail_lines(entry, &current_name(app)),
		None => vec![Line::from("")],
	};
	let panel = Paragraph::new(preview)
		.wrap(Wrap { trim: false })
		.block(Block::default().borders(Borders::ALL).title("Preview"));
	frame.render_widget(panel, body[1]);
}

fn render_entry_detail(frame: &mut Frame, area: Rect, app: &App) {
	let lines = match &app.detail {
		Some(entry) => content::detail_lines(entry, &app.detail_owner),
		None => vec![Line::from("(no entry selected)")],
	};
	let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Entry")
			.border_style(border_style(true)),
	);
	frame.render_widget(panel, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
	let Some(status) = app.status() else {
		return;
	};
	let style = if status.starts_with("error") {
		Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(Color::Green)
	};
	frame.render_widget(Paragraph::new(Span::styled(format!(" {status}"), style)), area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let hint = match app.view {
		View::ProjectList => "1-9 pick | j/k move | Enter open | n new | r report | o overview | q quit",
		View::ProjectMenu => "s start | p stop | x cancel | e log | l log view | v entries | R rename | D delete | Esc back | q quit",
		View::StoppingTimer => "Enter save | Tab switch field | Space toggle billable | Esc cancel",
		View::ManualEntry => "Enter next/save | Tab switch field | Space toggle billable | Esc cancel",
		View::ShowLogs => "j/k scroll | a toggle all | Esc back | q quit",
		View::EntryList if app.entries.is_filtering() => "type to filter | Enter apply | Esc clear",
		View::EntryList => "Enter open | / filter | m move | d delete | Esc back | q quit",
		View::EntryDetail => "e edit | m move | d delete | Esc back | q quit",
		View::EditEntry => "Enter save | Esc cancel",
		View::Confirm => "y/Enter confirm | n/Esc cancel",
		View::MoveEntryTarget => "j/k or arrows move | Enter choose | Esc cancel",
		View::RenameProject | View::NewProject => "Enter save | Esc cancel",
		View::ReportView => "h/l month | r current month | j/k scroll | Esc back | q quit",
		View::Dashboard => "r refresh | j/k scroll | Esc back | q quit",
	};

	let footer = Paragraph::new(Line::from(hint)).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup<T>(frame: &mut Frame, select: &SelectState<T>) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}
