use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SERVICE_TYPE: &str = "_browsey._tcp.local.";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Longest wait for the connection or the next chunk of a response.
	pub request_timeout: Duration,
	/// Deadline for a whole request including the body.
	pub resource_timeout: Duration,
	pub probe_timeout: Duration,
	/// Deadline for the transient connection opened while resolving a service.
	pub resolve_timeout: Duration,
	pub max_concurrent_probes: usize,
	pub service_type: String,
	pub data_dir: PathBuf,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(10),
			resource_timeout: Duration::from_secs(30),
			probe_timeout: Duration::from_secs(5),
			resolve_timeout: Duration::from_secs(5),
			max_concurrent_probes: 32,
			service_type: DEFAULT_SERVICE_TYPE.to_string(),
			data_dir: default_data_dir(),
		}
	}
}

impl ClientConfig {
	/// Defaults overridden by `BROWSEY_*` environment variables.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Some(secs) = env_value::<u64>("BROWSEY_REQUEST_TIMEOUT_SECS") {
			config.request_timeout = Duration::from_secs(secs);
		}
		if let Some(secs) = env_value::<u64>("BROWSEY_RESOURCE_TIMEOUT_SECS") {
			config.resource_timeout = Duration::from_secs(secs);
		}
		if let Some(secs) = env_value::<u64>("BROWSEY_PROBE_TIMEOUT_SECS") {
			config.probe_timeout = Duration::from_secs(secs);
		}
		if let Some(secs) = env_value::<u64>("BROWSEY_RESOLVE_TIMEOUT_SECS") {
			config.resolve_timeout = Duration::from_secs(secs);
		}
		if let Some(max) = env_value::<usize>("BROWSEY_MAX_PROBES") {
			config.max_concurrent_probes = max.max(1);
		}
		if let Ok(service_type) = env::var("BROWSEY_SERVICE_TYPE") {
			config.service_type = service_type;
		}
		if let Ok(dir) = env::var("BROWSEY_DATA_DIR") {
			config.data_dir = PathBuf::from(dir);
		}
		config
	}
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
	let raw = env::var(name).ok()?;
	match raw.trim().parse() {
		Ok(value) => Some(value),
		Err(_) => {
			log::warn!("ignoring invalid value {raw:?} for {name}");
			None
		}
	}
}

fn default_data_dir() -> PathBuf {
	match homedir::my_home() {
		Ok(Some(home)) => home.join(".browsey"),
		_ => {
			log::warn!("home directory unavailable, storing data in working directory");
			PathBuf::from(".browsey")
		}
	}
}
