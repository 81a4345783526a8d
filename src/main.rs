mod clock;
mod config;
mod domain;
mod ids;
mod logging;
mod report;
mod storage;
mod ui;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::clock::{hm, month_name, parse_duration};
use crate::domain::{Entry, Project};
use crate::report::{DEFAULT_BAR_WIDTH, LogLine, MonthlyReport, WeeklyOverview};
use crate::storage::Store;

#[derive(Debug, Parser)]
#[command(name = "timebook", version, about = "Terminal-first project time tracker")]
struct Cli {
	/// Database file to use instead of the configured one.
	#[arg(long, global = true)]
	database: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// List projects.
	Projects,
	/// Create a project.
	Add { name: String },
	/// Start the timer of a project, creating the project if needed.
	Start { project: String },
	/// Show running timers.
	Status,
	/// Stop the running timer and log the elapsed time.
	Stop {
		project: String,
		#[arg(short, long, default_value = "")]
		message: String,
		#[arg(long)]
		non_billable: bool,
	},
	/// Discard the running timer without logging it.
	Cancel { project: String },
	/// Record a note without a duration.
	Note {
		project: String,
		message: String,
		#[arg(long)]
		non_billable: bool,
	},
	/// Log a fixed amount of time, e.g. `-d 1h30m`.
	Entry {
		project: String,
		#[arg(short, long)]
		duration: String,
		#[arg(short, long, default_value = "")]
		message: String,
		#[arg(long)]
		non_billable: bool,
	},
	/// Monthly totals per project.
	Report {
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
		month: Option<u32>,
	},
	/// Last seven days per project, with this month's totals.
	Overview,
	/// Entries of a project grouped by day.
	Log {
		project: String,
		#[arg(long)]
		all: bool,
	},
	Rename { project: String, new_name: String },
	/// Move all entries into another project (created if needed) and delete the source.
	Mv { project: String, target: String },
	/// Show a project, or one of its entries by the number `log` prints.
	Show { project: String, ordinal: Option<usize> },
	/// Delete one entry by the number `log` prints.
	Rm { project: String, ordinal: usize },
	/// Delete a project with all its entries.
	Remove {
		project: String,
		#[arg(long)]
		yes: bool,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}

fn run() -> Result<()> {
	let cli = Cli::parse();
	let _guard = logging::init(&config::log_dir());

	let database = config::resolve_database_path(cli.database)?;
	let store = Store::open(&database)
		.with_context(|| format!("failed to open database {}", database.display()))?;
	info!(database = %database.display(), "opened database");

	match cli.command {
		None => ui::run(&store).context("terminal UI failed")?,
		Some(Command::Projects) => print_projects(&store)?,
		Some(Command::Add { name }) => {
			let project = Project::create(&store, &name)?;
			println!("created project '{}'", project.name);
		}
		Some(Command::Start { project }) => {
			let project = match Project::find(&store, &project)? {
				Some(project) => project,
				None => {
					let created = Project::create(&store, &project)?;
					println!("created project '{}'", created.name);
					created
				}
			};
			project.start_timer(&store, Utc::now())?;
			println!("started timer for '{}'", project.name);
		}
		Some(Command::Status) => print_status(&store)?,
		Some(Command::Stop {
			project,
			message,
			non_billable,
		}) => {
			let project = require_project(&store, &project)?;
			let entry = project.stop_timer(&store, &message, !non_billable, Utc::now())?;
			println!(
				"logged {} minutes to '{}'",
				entry.duration().num_minutes(),
				project.name
			);
		}
		Some(Command::Cancel { project }) => {
			let project = require_project(&store, &project)?;
			if !project.on_clock(&store).0 {
				bail!("no running timer for project '{}'", project.name);
			}
			project.cancel_timer(&store)?;
			println!("cancelled timer for '{}'", project.name);
		}
		Some(Command::Note {
			project,
			message,
			non_billable,
		}) => {
			let project = require_project(&store, &project)?;
			project.create_entry(&store, &message, !non_billable, Utc::now())?;
			println!("noted on '{}'", project.name);
		}
		Some(Command::Entry {
			project,
			duration,
			message,
			non_billable,
		}) => {
			let project = require_project(&store, &project)?;
			let duration = parse_duration(&duration)?;
			project.create_entry_with_duration(&store, &message, duration, !non_billable, Utc::now())?;
			println!("logged {} to '{}'", hm(duration), project.name);
		}
		Some(Command::Report { month }) => {
			let (year, month) = match month {
				Some(month) => (report::report_year(month, report::today()), month),
				None => clock::current_year_month(),
			};
			let monthly = report::monthly_report(&store, year, month, Utc::now())?;
			print_report(&monthly);
		}
		Some(Command::Overview) => {
			let overview = report::weekly_overview(&store, Utc::now())?;
			print_overview(&overview);
		}
		Some(Command::Log { project, all }) => {
			let project = require_project(&store, &project)?;
			let entries = project.entries(&store)?;
			print_log(&report::project_log(&entries, report::today(), all));
		}
		Some(Command::Rename { project, new_name }) => {
			let mut project = require_project(&store, &project)?;
			let old_name = project.name.clone();
			if project.rename(&store, &new_name)? {
				println!("renamed '{}' to '{}'", old_name, project.name);
			} else {
				println!("'{}' already has that name", project.name);
			}
		}
		Some(Command::Mv { project, target }) => {
			let source = require_project(&store, &project)?;
			let target = match Project::find(&store, &target)? {
				Some(target) => target,
				None => {
					let created = Project::create(&store, &target)?;
					println!("created project '{}'", created.name);
					created
				}
			};
			let moved = source.merge_into(&store, &target)?;
			println!("moved {moved} entries from '{}' to '{}'", source.name, target.name);
		}
		Some(Command::Show { project, ordinal }) => {
			let project = require_project(&store, &project)?;
			let entries = project.entries(&store)?;
			match ordinal {
				None => print_project(&project, entries.len(), &database),
				Some(ordinal) => print_entry(nth_logged(&entries, ordinal)?),
			}
		}
		Some(Command::Rm { project, ordinal }) => {
			let project = require_project(&store, &project)?;
			let entries = project.entries(&store)?;
			let entry = nth_logged(&entries, ordinal)?;
			entry.delete(&store)?;
			println!("deleted entry {ordinal} ({}) from '{}'", entry.summary(), project.name);
		}
		Some(Command::Remove { project, yes }) => {
			let project = require_project(&store, &project)?;
			let prompt = format!("Delete project '{}' with all its entries? Type yes to confirm: ", project.name);
			if !yes && !confirm(&prompt, &mut io::stdin().lock(), &mut io::stdout())? {
				println!("cancelled");
				return Ok(());
			}
			project.delete(&store)?;
			println!("deleted project '{}'", project.name);
		}
	}

	store.close()?;
	Ok(())
}

fn require_project(store: &Store, name: &str) -> Result<Project> {
	match Project::find(store, name)? {
		Some(project) => Ok(project),
		None => bail!("no project named '{}'", name.trim()),
	}
}

/// The entry `log` numbers as `ordinal`, counting from 1.
fn nth_logged(entries: &[Entry], ordinal: usize) -> Result<&Entry> {
	let ordered = report::log_order(entries);
	match ordinal.checked_sub(1).and_then(|index| ordered.get(index)) {
		Some(entry) => Ok(*entry),
		None => bail!("no entry {ordinal}, the project has {} entries", entries.len()),
	}
}

fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<bool> {
	write!(output, "{prompt}")?;
	output.flush()?;

	let mut answer = String::new();
	input.read_line(&mut answer).context("failed to read confirmation")?;
	Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn print_projects(store: &Store) -> Result<()> {
	let projects = Project::list(store)?;
	if projects.is_empty() {
		println!("no projects yet");
		return Ok(());
	}

	let now = Utc::now();
	for (index, project) in projects.iter().enumerate() {
		let key = project.key();
		let clock = match project.on_clock(store) {
			(true, Some(timer)) => format!("  ● {}", timer.hours_mins(now)),
			_ => String::new(),
		};
		println!("{:>2}. {} {}{}", index + 1, &key[..8], project.name, clock);
	}

	Ok(())
}

fn print_project(project: &Project, entries: usize, database: &Path) {
	println!("      key : {}", project.key());
	println!("     name : {}", project.name);
	println!("  entries : {entries}");
	println!(" location : {}", database.display());
}

fn print_entry(entry: &Entry) {
	let local = |at: Option<DateTime<Utc>>| {
		at.map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
			.unwrap_or_else(|| "-".to_string())
	};
	println!("       id : {}", entry.id);
	println!(" contents : {}", entry.content);
	println!(" duration : {}", entry.hours_mins());
	println!("  started : {}", local(entry.started_at));
	println!("    ended : {}", local(entry.ended_at));
	println!("     tags : {}", entry.tags.join(", "));
	println!(" billable : {}", entry.billable);
}

fn print_status(store: &Store) -> Result<()> {
	let now = Utc::now();
	let mut running = 0;
	for timer in store.list_timers()? {
		let Some(project) = store.get_project(timer.project_id)? else {
			continue;
		};
		// get_timer drops timers left behind by an interrupted stop
		let (on_clock, Some(timer)) = project.on_clock(store) else {
			continue;
		};
		if on_clock {
			running += 1;
			println!(
				"{} | since {} | {}",
				timer.hours_mins(now),
				timer.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
				project.name
			);
		}
	}

	if running == 0 {
		println!("no running timers");
	}
	Ok(())
}

fn print_report(monthly: &MonthlyReport) {
	println!("{} {}", month_name(monthly.month), monthly.year);
	if monthly.rows.is_empty() {
		println!("no time logged this month");
		return;
	}

	for row in &monthly.rows {
		println!(
			"{:>8} | {:>8} billable | {:>3} entries | {}{}",
			hm(row.total),
			hm(row.billable),
			row.entries,
			row.project.name,
			if row.on_clock() { " (on clock)" } else { "" }
		);
	}
	println!("{:>8} | {:>8} billable | total", hm(monthly.total), hm(monthly.billable));
}

fn print_overview(overview: &WeeklyOverview) {
	println!("last 7 days since {}", overview.since.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
	if overview.rows.is_empty() {
		println!("no projects yet");
		return;
	}

	for row in &overview.rows {
		println!(
			"{} {:>8} week | {:>8} month | {:>8} billable | {}{}",
			overview.bar(row, DEFAULT_BAR_WIDTH),
			hm(row.week),
			hm(row.month),
			hm(row.billable),
			row.project.name,
			if row.clock.is_some() { " (on clock)" } else { "" }
		);
	}
	println!(
		"{} {:>8} week | {:>8} month | {:>8} billable | total",
		" ".repeat(DEFAULT_BAR_WIDTH),
		hm(overview.week_total),
		hm(overview.month_total),
		hm(overview.billable_total)
	);
}

fn print_log(log: &report::ProjectLog) {
	if log.lines.is_empty() {
		println!("no entries yet");
		return;
	}

	for line in &log.lines {
		match line {
			LogLine::Header(day) => println!("\n{day}"),
			LogLine::Entry {
				ordinal,
				duration,
				content,
			} => println!("{ordinal:>4}. {:>6}  {content}", hm(*duration)),
			LogLine::Subtotal(total) => println!("{:>12}  day total", hm(*total)),
		}
	}

	if log.truncated() {
		println!("\nshowing {} of {} entries, pass --all to see everything", log.shown, log.total);
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use chrono::{Duration, Utc};
	use clap::Parser;

	use crate::domain::Entry;

	use super::{Cli, Command, confirm, nth_logged};

	#[test]
	fn parses_entry_flags() {
		let cli = Cli::try_parse_from([
			"timebook",
			"--database",
			"/tmp/t.db",
			"entry",
			"Alpha",
			"-d",
			"1h30m",
			"-m",
			"pairing",
			"--non-billable",
		])
		.expect("valid arguments");
		assert_eq!(cli.database.as_deref(), Some(std::path::Path::new("/tmp/t.db")));
		match cli.command {
			Some(Command::Entry {
				project,
				duration,
				message,
				non_billable,
			}) => {
				assert_eq!(project, "Alpha");
				assert_eq!(duration, "1h30m");
				assert_eq!(message, "pairing");
				assert!(non_billable);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn rejects_out_of_range_months() {
		assert!(Cli::try_parse_from(["timebook", "report", "--month", "13"]).is_err());
		assert!(Cli::try_parse_from(["timebook", "report", "--month", "0"]).is_err());
		assert!(Cli::try_parse_from(["timebook", "report", "--month", "12"]).is_ok());
	}

	#[test]
	fn no_command_means_interactive() {
		let cli = Cli::try_parse_from(["timebook"]).expect("valid arguments");
		assert!(cli.command.is_none());
		assert!(cli.database.is_none());
	}

	#[test]
	fn confirmation_requires_yes() {
		let mut output = Vec::new();
		assert!(confirm("sure? ", &mut Cursor::new("yes\n"), &mut output).expect("read answer"));
		assert!(!confirm("sure? ", &mut Cursor::new("y\n"), &mut output).expect("read answer"));
		assert!(!confirm("sure? ", &mut Cursor::new(""), &mut output).expect("read answer"));
		assert_eq!(String::from_utf8(output).expect("utf8"), "sure? sure? sure? ");
	}

	#[test]
	fn parses_entry_and_move_commands() {
		let cli = Cli::try_parse_from(["timebook", "show", "Alpha"]).expect("valid arguments");
		assert!(matches!(cli.command, Some(Command::Show { ordinal: None, .. })));

		let cli = Cli::try_parse_from(["timebook", "rm", "Alpha", "3"]).expect("valid arguments");
		assert!(matches!(cli.command, Some(Command::Rm { ordinal: 3, .. })));
		assert!(Cli::try_parse_from(["timebook", "rm", "Alpha"]).is_err());

		let cli = Cli::try_parse_from(["timebook", "mv", "Old", "New"]).expect("valid arguments");
		match cli.command {
			Some(Command::Mv { project, target }) => {
				assert_eq!(project, "Old");
				assert_eq!(target, "New");
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn entry_numbers_follow_the_log() {
		let now = Utc::now();
		let mut stopped = Entry::new(1, "stopped", true);
		stopped.started_at = Some(now - Duration::hours(2));
		stopped.ended_at = Some(now - Duration::hours(1));
		let mut note = Entry::new(1, "note", true);
		note.started_at = Some(now);
		let entries = vec![stopped, note];

		assert_eq!(nth_logged(&entries, 1).expect("first entry").content, "note");
		assert_eq!(nth_logged(&entries, 2).expect("second entry").content, "stopped");
		assert!(nth_logged(&entries, 0).is_err());
		assert!(nth_logged(&entries, 3).is_err());
	}
}
