use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::clock::{local_day, month_bounds};
use crate::domain::{Entry, Project, Timer};
use crate::storage::{StorageError, Store};

pub const DEFAULT_LOG_LIMIT: usize = 30;
pub const DEFAULT_BAR_WIDTH: usize = 24;
const MAX_WORKERS: usize = 8;
const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '·';

/// Per-project totals for a reporting window.
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub project: Project,
    pub total: Duration,
    pub billable: Duration,
    pub entries: usize,
    pub clock: Option<Duration>,
}

impl ProjectStatus {
    pub fn on_clock(&self) -> bool {
        self.clock.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rows: Vec<ProjectStatus>,
    pub total: Duration,
    pub billable: Duration,
}

#[derive(Debug, Clone)]
pub struct OverviewRow {
    pub project: Project,
    pub week: Duration,
    pub month: Duration,
    pub billable: Duration,
    pub clock: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct WeeklyOverview {
    pub since: DateTime<Utc>,
    pub rows: Vec<OverviewRow>,
    pub week_total: Duration,
    pub month_total: Duration,
    pub billable_total: Duration,
}

impl WeeklyOverview {
    pub fn max_week(&self) -> Duration {
        self.rows.iter().map(|row| row.week).max().unwrap_or_else(Duration::zero)
    }

    pub fn bar(&self, row: &OverviewRow, width: usize) -> String {
        let filled = bar_length(row.week, self.max_week(), width);
        let mut bar = String::with_capacity(width * 3);
        bar.extend(std::iter::repeat_n(BAR_FILLED, filled));
        bar.extend(std::iter::repeat_n(BAR_EMPTY, width - filled));
        bar
    }
}

/// Number of filled cells for `value` relative to `max`, rounded.
pub fn bar_length(value: Duration, max: Duration, width: usize) -> usize {
    let max_ms = max.num_milliseconds();
    if max_ms <= 0 {
        return 0;
    }
    let ratio = value.num_milliseconds().max(0) as f64 / max_ms as f64;
    ((ratio * width as f64).round() as usize).min(width)
}

/// Bar width used for a terminal of `columns` columns.
pub fn bar_width_for(columns: u16) -> usize {
    (columns as usize / 3).max(10)
}

/// Year a requested month refers to: months still ahead of `today` mean last year.
pub fn report_year(month: u32, today: NaiveDate) -> i32 {
    if month > today.month() {
        today.year() - 1
    } else {
        today.year()
    }
}

/// Runs `work` for every project on at most eight scoped worker threads.
///
/// Results arrive in completion order. A project whose work fails is logged
/// and left out.
pub fn fan_out<T, F>(projects: &[Project], work: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Project) -> Result<T, StorageError> + Sync,
{
    let total = projects.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = total.min(MAX_WORKERS);
    let next = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel();
    let mut results = Vec::with_capacity(total);

    thread::scope(|scope| {
        for _ in 0..workers {
            let sender = sender.clone();
            let next = &next;
            let work = &work;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(project) = projects.get(index) else {
                        break;
                    };
                    if sender.send((index, work(project))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(sender);

        for _ in 0..total {
            let Ok((index, outcome)) = receiver.recv() else {
                break;
            };
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => warn!(project = %projects[index].name, error = %err, "skipping project"),
            }
        }
    });

    debug!(projects = total, workers, collected = results.len(), "fan-out finished");
    results
}

/// Totals of `entries` ended in `[start, end)`, plus the running timer.
pub fn summarize(
    project: &Project,
    entries: &[Entry],
    timer: Option<&Timer>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ProjectStatus {
    let mut status = ProjectStatus {
        project: project.clone(),
        total: Duration::zero(),
        billable: Duration::zero(),
        entries: 0,
        clock: timer.map(|timer| timer.elapsed(now)),
    };

    for entry in entries {
        let Some(ended_at) = entry.ended_at else {
            continue;
        };
        if ended_at < start || ended_at >= end {
            continue;
        }
        status.entries += 1;
        status.total += entry.duration();
        if entry.billable {
            status.billable += entry.duration();
        }
    }

    status
}

pub fn monthly_report(
    store: &Store,
    year: i32,
    month: u32,
    now: DateTime<Utc>,
) -> Result<MonthlyReport, StorageError> {
    let (start, end) = month_bounds(year, month);
    let projects = store.list_projects()?;

    let mut rows = fan_out(&projects, |project| {
        let entries = store.list_entries(project.id)?;
        let timer = store.get_timer(project.id)?;
        Ok(summarize(project, &entries, timer.as_ref(), start, end, now))
    })
    .into_iter()
    .filter(|row| row.entries > 0 || !row.total.is_zero())
    .collect::<Vec<_>>();
    rows.sort_by(|a, b| by_duration_then_name(a.total, &a.project, b.total, &b.project));

    let total = rows.iter().map(|row| row.total).fold(Duration::zero(), |sum, value| sum + value);
    let billable = rows.iter().map(|row| row.billable).fold(Duration::zero(), |sum, value| sum + value);

    Ok(MonthlyReport {
        year,
        month,
        start,
        end,
        rows,
        total,
        billable,
    })
}

pub fn weekly_overview(store: &Store, now: DateTime<Utc>) -> Result<WeeklyOverview, StorageError> {
    let since = now - Duration::days(7);
    let today = local_day(now);
    let (month_start, month_end) = month_bounds(today.year(), today.month());
    let projects = store.list_projects()?;

    let mut rows = fan_out(&projects, |project| {
        let entries = store.list_entries(project.id)?;
        let timer = store.get_timer(project.id)?;
        let week = summarize(project, &entries, timer.as_ref(), since, now + Duration::milliseconds(1), now);
        let month = summarize(project, &entries, None, month_start, month_end, now);
        Ok(OverviewRow {
            project: project.clone(),
            week: week.total,
            month: month.total,
            billable: week.billable,
            clock: week.clock,
        })
    });
    rows.sort_by(|a, b| by_duration_then_name(a.week, &a.project, b.week, &b.project));

    let sum = |pick: fn(&OverviewRow) -> Duration| rows.iter().map(pick).fold(Duration::zero(), |acc, value| acc + value);
    let week_total = sum(|row| row.week);
    let month_total = sum(|row| row.month);
    let billable_total = sum(|row| row.billable);

    Ok(WeeklyOverview {
        since,
        rows,
        week_total,
        month_total,
        billable_total,
    })
}

fn by_duration_then_name(a: Duration, a_project: &Project, b: Duration, b_project: &Project) -> CmpOrdering {
    b.cmp(&a)
        .then_with(|| a_project.name.to_lowercase().cmp(&b_project.name.to_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Header(String),
    Entry {
        ordinal: usize,
        duration: Duration,
        content: String,
    },
    Subtotal(Duration),
}

#[derive(Debug, Clone, Default)]
pub struct ProjectLog {
    pub lines: Vec<LogLine>,
    pub shown: usize,
    pub total: usize,
}

impl ProjectLog {
    pub fn truncated(&self) -> bool {
        self.shown < self.total
    }
}

/// Entries newest first by the time they are filed under, so quick notes sit
/// among the stopped entries of the same day. The sort is stable.
pub fn log_order(entries: &[Entry]) -> Vec<&Entry> {
    let mut ordered = entries.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| b.logged_at().cmp(&a.logged_at()));
    ordered
}

/// Groups `entries` by local day, newest first, with a subtotal after each
/// day. Ordinals follow [`log_order`].
pub fn project_log(entries: &[Entry], today: NaiveDate, show_all: bool) -> ProjectLog {
    let limit = if show_all { entries.len() } else { DEFAULT_LOG_LIMIT };
    let mut log = ProjectLog {
        total: entries.len(),
        ..ProjectLog::default()
    };

    let mut current_day: Option<NaiveDate> = None;
    let mut subtotal = Duration::zero();
    for (index, entry) in log_order(entries).into_iter().take(limit).enumerate() {
        if let Some(day) = entry.logged_at().map(local_day) {
            if current_day != Some(day) {
                if current_day.is_some() {
                    log.lines.push(LogLine::Subtotal(subtotal));
                }
                log.lines.push(LogLine::Header(day_header(day, today)));
                current_day = Some(day);
                subtotal = Duration::zero();
            }
        }

        subtotal += entry.duration();
        log.lines.push(LogLine::Entry {
            ordinal: index + 1,
            duration: entry.duration(),
            content: entry.summary().to_string(),
        });
        log.shown += 1;
    }

    if log.shown > 0 {
        log.lines.push(LogLine::Subtotal(subtotal));
    }
    log
}

pub fn day_header(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if day.year() == today.year() {
        day.format("%m/%d").to_string()
    } else {
        day.format("%Y/%m/%d").to_string()
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
