use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TIMEBOOK_LOG";
const LOG_FILE: &str = "timebook.log";
const DEFAULT_FILTER: &str = "info";

/// Sends tracing output to a daily-rolling file so it never draws over the TUI.
///
/// The returned guard flushes the background writer when dropped and must be
/// kept alive until the process exits.
pub fn init(log_dir: &Path) -> WorkerGuard {
	if let Err(err) = fs::create_dir_all(log_dir) {
		eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
	}
	let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
	let (writer, guard) = tracing_appender::non_blocking(file_appender);

	let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

	if let Err(err) = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_ansi(false)
		.with_writer(writer)
		.try_init()
	{
		eprintln!("failed to install logger: {err}");
	}

	guard
}
