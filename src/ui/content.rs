use chrono::{DateTime, Duration, Local, Utc};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::clock::{hm, month_name};
use crate::domain::Entry;
use crate::report::{LogLine, MonthlyReport, ProjectLog, WeeklyOverview};

const NAME_WIDTH: usize = 24;

fn heading(text: impl Into<String>) -> Line<'static> {
	Line::from(Span::styled(
		text.into(),
		Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
	))
}

fn dim(text: impl Into<String>) -> Line<'static> {
	Line::from(Span::styled(text.into(), Style::default().fg(Color::DarkGray)))
}

pub fn truncate(text: &str, width: usize) -> String {
	if text.chars().count() <= width {
		return text.to_string();
	}
	let mut out = text.chars().take(width.saturating_sub(1)).collect::<String>();
	out.push('…');
	out
}

fn clock_span(clock: Option<Duration>) -> Span<'static> {
	match clock {
		Some(elapsed) => Span::styled(
			format!("  ● on clock {}", hm(elapsed)),
			Style::default().fg(Color::Green),
		),
		None => Span::raw(""),
	}
}

pub fn monthly_lines(report: &MonthlyReport) -> Vec<Line<'static>> {
	let last_day = report.end - Duration::seconds(1);
	let mut lines = vec![
		heading(format!("{} {}", month_name(report.month), report.year)),
		dim(format!(
			"Report period: {} to {}",
			report.start.with_timezone(&Local).format("%Y-%m-%d"),
			last_day.with_timezone(&Local).format("%Y-%m-%d"),
		)),
		Line::from(""),
	];

	if report.rows.is_empty() {
		lines.push(Line::from("No time logged this month."));
		return lines;
	}

	lines.push(Line::from(Span::styled(
		format!("{:<NAME_WIDTH$} {:>8} {:>9} {:>8}", "Project", "Total", "Billable", "Entries"),
		Style::default().add_modifier(Modifier::BOLD),
	)));
	for row in &report.rows {
		lines.push(Line::from(vec![
			Span::raw(format!(
				"{:<NAME_WIDTH$} {:>8} {:>9} {:>8}",
				truncate(&row.project.name, NAME_WIDTH),
				hm(row.total),
				hm(row.billable),
				row.entries
			)),
			clock_span(row.clock),
		]));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled(
		format!("{:<NAME_WIDTH$} {:>8} {:>9}", "Total", hm(report.total), hm(report.billable)),
		Style::default().add_modifier(Modifier::BOLD),
	)));
	lines
}

pub fn overview_lines(overview: &WeeklyOverview, bar_width: usize, highlight: Option<i64>) -> Vec<Line<'static>> {
	let mut lines = vec![
		heading("Last 7 days"),
		dim(format!(
			"Since {}",
			overview.since.with_timezone(&Local).format("%a %m/%d %H:%M")
		)),
		Line::from(""),
	];

	if overview.rows.is_empty() {
		lines.push(Line::from("No projects yet."));
		return lines;
	}

	lines.push(Line::from(Span::styled(
		format!("{:<NAME_WIDTH$} {:>7} {:>7} {:>8}  ", "Project", "Week", "Month", "Billable"),
		Style::default().add_modifier(Modifier::BOLD),
	)));
	for row in &overview.rows {
		let style = if Some(row.project.id) == highlight {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		};
		lines.push(Line::from(vec![
			Span::styled(
				format!(
					"{:<NAME_WIDTH$} {:>7} {:>7} {:>8}  ",
					truncate(&row.project.name, NAME_WIDTH),
					hm(row.week),
					hm(row.month),
					hm(row.billable)
				),
				style,
			),
			Span::styled(overview.bar(row, bar_width), Style::default().fg(Color::Blue)),
			clock_span(row.clock),
		]));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled(
		format!(
			"{:<NAME_WIDTH$} {:>7} {:>7} {:>8}",
			"Total",
			hm(overview.week_total),
			hm(overview.month_total),
			hm(overview.billable_total)
		),
		Style::default().add_modifier(Modifier::BOLD),
	)));
	lines
}

pub fn log_lines(log: &ProjectLog) -> Vec<Line<'static>> {
	if log.lines.is_empty() {
		return vec![dim("No entries yet.")];
	}

	let mut lines = Vec::with_capacity(log.lines.len() + 2);
	for line in &log.lines {
		lines.push(match line {
			LogLine::Header(text) => Line::from(Span::styled(
				text.clone(),
				Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
			)),
			LogLine::Entry {
				ordinal,
				duration,
				content,
			} => Line::from(vec![
				Span::styled(format!("{ordinal:>4}. "), Style::default().fg(Color::DarkGray)),
				Span::raw(format!("{:>6}  {content}", hm(*duration))),
			]),
			LogLine::Subtotal(total) => dim(format!("{:>12}  day total", hm(*total))),
		});
	}

	if log.truncated() {
		lines.push(Line::from(""));
		lines.push(dim(format!(
			"Showing {} of {} entries. Press a to show all.",
			log.shown, log.total
		)));
	}
	lines
}

fn stamp(timestamp: Option<DateTime<Utc>>) -> String {
	timestamp
		.map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
		.unwrap_or_else(|| "-".to_string())
}

pub fn detail_lines(entry: &Entry, project_name: &str) -> Vec<Line<'static>> {
	let label = Style::default().fg(Color::DarkGray);
	let field = |name: &str, value: String| {
		Line::from(vec![Span::styled(format!("{name:<10}"), label), Span::raw(value)])
	};

	let tags = if entry.tags.is_empty() {
		"(none)".to_string()
	} else {
		entry.tags.iter().map(|tag| format!("#{tag}")).collect::<Vec<_>>().join(" ")
	};

	let mut lines = vec![
		field("Project", project_name.to_string()),
		field("Duration", entry.hours_mins().to_string()),
		field("Started", stamp(entry.started_at)),
		field("Ended", stamp(entry.ended_at)),
		field("Billable", if entry.billable { "yes" } else { "no" }.to_string()),
		field("Type", entry.entry_type.to_string()),
		field("Tags", tags),
		Line::from(""),
	];
	if entry.content.is_empty() {
		lines.push(dim("(no description)"));
	} else {
		lines.extend(entry.content.lines().map(|line| Line::from(line.to_string())));
	}
	lines
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, NaiveDate};

	use crate::domain::Entry;
	use crate::report::project_log;

	use super::{detail_lines, log_lines, truncate};

	#[test]
	fn truncates_long_names() {
		assert_eq!(truncate("short", 10), "short");
		assert_eq!(truncate("a very long project name", 8), "a very …");
	}

	#[test]
	fn log_lines_mention_hidden_entries() {
		let today = NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date");
		let entries = (0..35)
			.map(|index| {
				let mut entry = Entry::new(1, &format!("entry {index}"), true);
				entry.duration_ms = 60_000;
				entry
			})
			.collect::<Vec<_>>();
		let lines = log_lines(&project_log(&entries, today, false));
		let last = lines.last().map(|line| line.to_string()).unwrap_or_default();
		assert_eq!(last, "Showing 30 of 35 entries. Press a to show all.");
	}

	#[test]
	fn detail_lists_tags_and_content() {
		let mut entry = Entry::new(1, "ship it #release\nsecond line", false);
		entry.duration_ms = Duration::minutes(75).num_milliseconds();
		let text = detail_lines(&entry, "Alpha")
			.iter()
			.map(|line| line.to_string())
			.collect::<Vec<_>>();
		assert!(text.contains(&"Project   Alpha".to_string()));
		assert!(text.contains(&"Duration  1:15".to_string()));
		assert!(text.contains(&"Tags      #release".to_string()));
		assert!(text.contains(&"Billable  no".to_string()));
		assert_eq!(text.last().map(String::as_str), Some("second line"));
	}
}
