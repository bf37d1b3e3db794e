//! Config file and resolved settings.
//!
//! The optional config file is JSON:
//!
//! ```json
//! {
//!   "endpoint": "http://127.0.0.1:8080",
//!   "framing": "socketio",
//!   "consoleUrl": "http://127.0.0.1:8080/",
//!   "launcher": ["firefox", "--new-window", "{url}"],
//!   "identities": "/var/lib/sshui/identities.json",
//!   "settleDelayMs": 300,
//!   "resizeDebounceMs": 50
//! }
//! ```
//!
//! Command-line flags override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sshui::SessionConfig;
use sshui_runtime::Framing;
use url::Url;

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::handoff::Launcher;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

const CONFIG_DIR: &str = "sshui";
const CONFIG_FILE: &str = "config.json";

/// On-disk config; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CliConfig {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub framing: Option<Framing>,
	#[serde(default)]
	pub auth_token: Option<String>,
	#[serde(default)]
	pub console_url: Option<String>,
	/// Argv for opening handoff windows; `{url}` is replaced by the target.
	#[serde(default)]
	pub launcher: Option<Vec<String>>,
	#[serde(default)]
	pub identities: Option<PathBuf>,
	#[serde(default)]
	pub settle_delay_ms: Option<u64>,
	#[serde(default)]
	pub resize_debounce_ms: Option<u64>,
}

impl CliConfig {
	/// Loads `explicit`, or the default config file when it exists.
	///
	/// An explicit path must exist; a missing default file yields defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		match explicit {
			Some(path) => Self::read(path),
			None => match default_config_path() {
				Some(path) if path.is_file() => Self::read(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	fn read(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).map_err(|source| CliError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::from_str(&content).map_err(|source| CliError::Config {
			path: path.to_path_buf(),
			source,
		})
	}
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Effective settings after merging flags over the config file.
#[derive(Debug, Clone)]
pub struct Settings {
	pub endpoint: String,
	pub framing: Framing,
	pub auth_token: Option<String>,
	pub console_url: String,
	pub launcher: Launcher,
	pub identities: Option<PathBuf>,
	pub session: SessionConfig,
}

impl Settings {
	pub fn resolve(cli: &Cli, file: CliConfig) -> Self {
		let endpoint = cli
			.endpoint
			.clone()
			.or(file.endpoint)
			.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
		let console_url = cli.console_url.clone().or(file.console_url).unwrap_or_else(|| endpoint.clone());
		let launcher = file.launcher.map(Launcher::new).unwrap_or_else(Launcher::platform_default);

		let mut session = SessionConfig::new(endpoint.clone());
		if let Some(ms) = file.settle_delay_ms {
			session = session.with_settle_delay(Duration::from_millis(ms));
		}
		if let Some(ms) = file.resize_debounce_ms {
			session = session.with_resize_debounce(Duration::from_millis(ms));
		}

		Self {
			framing: cli.framing.or(file.framing).unwrap_or_default(),
			auth_token: cli.auth_token.clone().or(file.auth_token),
			identities: cli.identities.clone().or(file.identities),
			endpoint,
			console_url,
			launcher,
			session,
		}
	}
}

/// Whether `endpoint` points at this machine.
///
/// The console exposes key material, so anything else deserves a warning.
pub fn is_local_endpoint(endpoint: &str) -> bool {
	Url::parse(endpoint)
		.ok()
		.and_then(|url| url.host_str().map(|host| matches!(host, "localhost" | "127.0.0.1")))
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use clap::Parser;

	use super::*;

	fn cli(args: &[&str]) -> Cli {
		let mut argv = vec!["sshui"];
		argv.extend_from_slice(args);
		argv.extend_from_slice(&["handoff-url", "connect", "bob", "h1"]);
		Cli::try_parse_from(argv).unwrap()
	}

	#[test]
	fn defaults_without_file_or_flags() {
		let settings = Settings::resolve(&cli(&[]), CliConfig::default());
		assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
		assert_eq!(settings.console_url, DEFAULT_ENDPOINT);
		assert_eq!(settings.framing, Framing::SocketIo);
		assert_eq!(settings.session.endpoint, DEFAULT_ENDPOINT);
		assert_eq!(settings.session.settle_delay, Duration::from_millis(300));
		assert!(settings.auth_token.is_none());
	}

	#[test]
	fn flags_override_file() {
		let file = CliConfig {
			endpoint: Some("http://10.0.0.5:8080".into()),
			framing: Some(Framing::Json),
			console_url: Some("http://10.0.0.5:8080/ui".into()),
			resize_debounce_ms: Some(0),
			..CliConfig::default()
		};
		let settings = Settings::resolve(&cli(&["--endpoint", "http://localhost:9000"]), file);
		assert_eq!(settings.endpoint, "http://localhost:9000");
		assert_eq!(settings.framing, Framing::Json);
		assert_eq!(settings.console_url, "http://10.0.0.5:8080/ui");
		assert!(settings.session.resize_debounce.is_zero());
	}

	#[test]
	fn loads_camel_case_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"endpoint": "https://console.example", "launcher": ["echo", "{{url}}"], "settleDelayMs": 10}}"#
		)
		.unwrap();

		let config = CliConfig::load(Some(file.path())).unwrap();
		assert_eq!(config.endpoint.as_deref(), Some("https://console.example"));
		assert_eq!(config.launcher, Some(vec!["echo".to_string(), "{url}".to_string()]));
		assert_eq!(config.settle_delay_ms, Some(10));
	}

	#[test]
	fn bad_or_missing_explicit_file_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"endpoint": 5}}"#).unwrap();
		assert!(matches!(CliConfig::load(Some(file.path())), Err(CliError::Config { .. })));

		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			CliConfig::load(Some(&dir.path().join("missing.json"))),
			Err(CliError::Read { .. })
		));
	}

	#[test]
	fn local_endpoints() {
		assert!(is_local_endpoint("http://127.0.0.1:8080"));
		assert!(is_local_endpoint("http://localhost"));
		assert!(!is_local_endpoint("http://10.0.0.5:8080"));
		assert!(!is_local_endpoint("https://console.example"));
		assert!(!is_local_endpoint("not a url"));
	}
}
