use crate::config::DEFAULT_PORT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A remote file server, either saved by the user or found on the local network.
///
/// `(host, port)` identifies the server for deduplication, `id` identifies the
/// record for storage and removal and never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
	id: Uuid,
	#[serde(default)]
	pub name: String,
	pub host: String,
	pub port: u16,
	#[serde(
		default,
		rename = "lastConnected",
		with = "chrono::serde::ts_milliseconds_option"
	)]
	pub last_connected_at: Option<DateTime<Utc>>,
	#[serde(default, rename = "isDiscovered")]
	pub discovered: bool,
}

impl ServerDescriptor {
	pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
		Self {
			id: Uuid::new_v4(),
			name: name.into(),
			host: host.into(),
			port,
			last_connected_at: None,
			discovered: false,
		}
	}

	pub fn discovered(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
		let mut server = Self::new(name, host, port);
		server.discovered = true;
		server
	}

	/// Parses manual or QR code input such as `192.168.1.4:8080`,
	/// `http://nas.local` or `[fe80::1]:9000`. Missing ports default to 8080.
	pub fn parse_url(input: &str) -> Option<Self> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			return None;
		}
		let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
			trimmed.to_string()
		} else {
			format!("http://{trimmed}")
		};
		let url = Url::parse(&normalized).ok()?;
		let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
		if host.is_empty() {
			return None;
		}
		let port = url.port().unwrap_or(DEFAULT_PORT);
		if port == 0 {
			return None;
		}
		Some(Self::new("", host, port))
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn display_name(&self) -> String {
		if self.name.is_empty() {
			format!("{}:{}", self.host, self.port)
		} else {
			self.name.clone()
		}
	}

	/// `http://host:port`, bracketing IPv6 literals.
	pub fn base_url(&self) -> String {
		if self.host.contains(':') && !self.host.starts_with('[') {
			format!("http://[{}]:{}", self.host, self.port)
		} else {
			format!("http://{}:{}", self.host, self.port)
		}
	}

	pub fn same_endpoint(&self, other: &ServerDescriptor) -> bool {
		self.host == other.host && self.port == other.port
	}
}

/// Appends `server` unless an entry with the same endpoint is already present.
pub fn push_unique(servers: &mut Vec<ServerDescriptor>, server: ServerDescriptor) -> bool {
	if servers.iter().any(|existing| existing.same_endpoint(&server)) {
		return false;
	}
	servers.push(server);
	true
}

/// Union of several server lists, keeping the first occurrence of each id.
pub fn merge_by_id<'a>(lists: impl IntoIterator<Item = &'a [ServerDescriptor]>) -> Vec<ServerDescriptor> {
	let mut merged: Vec<ServerDescriptor> = Vec::new();
	for list in lists {
		for server in list {
			if !merged.iter().any(|existing| existing.id == server.id) {
				merged.push(server.clone());
			}
		}
	}
	merged
}
