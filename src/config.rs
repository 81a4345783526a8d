use std::env;
use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

const APP_DIR: &str = "timebook";
const CONFIG_FILE: &str = "config.json";
const LOG_DIR: &str = "logs";
const DEFAULT_DATABASE_FILE: &str = "Timebook.db";
const DATA_DIR_DATABASE_FILE: &str = "timebook.db";

pub const DATA_DIR_ENV: &str = "TIMEBOOK_DATA_DIR";
pub const CONFIG_DIR_ENV: &str = "TIMEBOOK_CONFIG_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub database_path: Option<PathBuf>,
}

/// Reads and writes `config.json` inside a config directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
	path: PathBuf,
}

impl ConfigStore {
	pub fn from_dir(dir: impl AsRef<Path>) -> Self {
		Self {
			path: dir.as_ref().join(CONFIG_FILE),
		}
	}

	pub fn from_default_location() -> Self {
		Self::from_dir(config_dir())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Missing file means an empty config.
	pub fn load(&self) -> Result<AppConfig> {
		let raw = match fs::read_to_string(&self.path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(AppConfig::default()),
			Err(err) => {
				return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
			}
		};

		if raw.trim().is_empty() {
			return Ok(AppConfig::default());
		}

		serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", self.path.display()))
	}

	pub fn save(&self, config: &AppConfig) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)
				.with_context(|| format!("failed to create config dir {}", parent.display()))?;
		}

		let payload = serde_json::to_string_pretty(config)?;
		fs::write(&self.path, payload).with_context(|| format!("failed to write {}", self.path.display()))
	}
}

/// Picks the database file: flag, then data-dir env var, then the saved
/// config, then a one-time prompt on the terminal.
pub fn resolve_database_path(cli_path: Option<PathBuf>) -> Result<PathBuf> {
	if let Some(path) = cli_path {
		return Ok(absolutize(expand_path(&path.to_string_lossy())?));
	}

	if let Some(dir) = env::var_os(DATA_DIR_ENV) {
		let dir = PathBuf::from(dir);
		if !dir.as_os_str().is_empty() {
			return Ok(absolutize(dir).join(DATA_DIR_DATABASE_FILE));
		}
	}

	let store = ConfigStore::from_default_location();
	let default = default_database_path()?;
	let stdin = io::stdin();
	let mut stdout = io::stdout();
	resolve_from_config(&store, &default, &mut stdin.lock(), &mut stdout)
}

pub fn resolve_from_config<R: BufRead, W: Write>(
	store: &ConfigStore,
	default: &Path,
	input: &mut R,
	output: &mut W,
) -> Result<PathBuf> {
	let config = store.load()?;
	if let Some(path) = config.database_path.filter(|path| !path.as_os_str().is_empty()) {
		return Ok(absolutize(expand_path(&path.to_string_lossy())?));
	}

	let chosen = prompt_for_path(input, output, default)?;
	if let Some(parent) = chosen.parent() {
		fs::create_dir_all(parent)
			.with_context(|| format!("failed to create database dir {}", parent.display()))?;
	}

	store.save(&AppConfig {
		database_path: Some(chosen.clone()),
	})?;
	info!(path = %chosen.display(), config = %store.path().display(), "saved database location");
	Ok(chosen)
}

fn prompt_for_path<R: BufRead, W: Write>(input: &mut R, output: &mut W, default: &Path) -> Result<PathBuf> {
	write!(
		output,
		"Where should timebook store its database? [{}]: ",
		default.display()
	)?;
	output.flush()?;

	let mut answer = String::new();
	input.read_line(&mut answer).context("failed to read database location")?;
	let answer = answer.trim();
	if answer.is_empty() {
		return Ok(default.to_path_buf());
	}

	Ok(absolutize(expand_path(answer)?))
}

/// Expands a leading `~` to the home directory. `~user` forms are rejected.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
	let raw = raw.trim();
	let Some(rest) = raw.strip_prefix('~') else {
		return Ok(PathBuf::from(raw));
	};

	if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with(std::path::MAIN_SEPARATOR)) {
		bail!("cannot expand '{raw}': only '~' and '~/...' are supported");
	}

	let home = dirs::home_dir().context("could not determine the home directory")?;
	let rest = rest.trim_start_matches(['/', std::path::MAIN_SEPARATOR]);
	if rest.is_empty() {
		Ok(home)
	} else {
		Ok(home.join(rest))
	}
}

pub fn default_database_path() -> Result<PathBuf> {
	let home = dirs::home_dir().context("could not determine the home directory")?;
	Ok(home.join("Documents").join(DEFAULT_DATABASE_FILE))
}

pub fn config_dir() -> PathBuf {
	if let Some(path) = env::var_os(CONFIG_DIR_ENV) {
		if !path.is_empty() {
			return PathBuf::from(path);
		}
	}

	if let Some(path) = dirs::config_dir() {
		return path.join(APP_DIR);
	}

	if let Some(path) = dirs::home_dir() {
		return path.join(format!(".{APP_DIR}"));
	}

	PathBuf::from(format!(".{APP_DIR}"))
}

pub fn log_dir() -> PathBuf {
	config_dir().join(LOG_DIR)
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
