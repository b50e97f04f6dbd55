//! Per-server directory browsing.
//!
//! Every navigation bumps a request number stored alongside the state. A load
//! applies its result only if that number is still the latest, so responses
//! that arrive out of order never overwrite fresher content.

use crate::api::RemoteFs;
use crate::error::ApiError;
use crate::paths;
use crate::server::ServerDescriptor;
use crate::types::DirectoryEntry;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
	Idle,
	Loading,
	Loaded,
	Failed(ApiError),
}

impl LoadState {
	pub fn is_loading(&self) -> bool {
		matches!(self, LoadState::Loading)
	}

	pub fn error(&self) -> Option<&ApiError> {
		match self {
			LoadState::Failed(err) => Some(err),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct NavigationSnapshot {
	pub current_path: String,
	/// Entries of the last completed load of `current_path`, in server order.
	pub entries: Vec<DirectoryEntry>,
	pub state: LoadState,
	request: u64,
}

impl NavigationSnapshot {
	pub fn can_go_up(&self) -> bool {
		paths::can_go_up(&self.current_path)
	}

	pub fn parent_path(&self) -> String {
		paths::parent(&self.current_path)
	}

	/// Entries for display: directories first, then case-insensitive by name.
	pub fn sorted_entries(&self) -> Vec<DirectoryEntry> {
		sort_entries(&self.entries)
	}
}

pub fn sort_entries(entries: &[DirectoryEntry]) -> Vec<DirectoryEntry> {
	let mut sorted = entries.to_vec();
	sorted.sort_by(compare_entries);
	sorted
}

fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
	b.is_directory()
		.cmp(&a.is_directory())
		.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
		.then_with(|| a.name.cmp(&b.name))
}

pub struct NavigationSession {
	server: ServerDescriptor,
	client: Arc<dyn RemoteFs>,
	state: Arc<watch::Sender<NavigationSnapshot>>,
	in_flight: Mutex<Option<AbortHandle>>,
}

impl NavigationSession {
	/// Session positioned at `/`. Nothing is loaded until the first navigation.
	pub fn new(server: ServerDescriptor, client: Arc<dyn RemoteFs>) -> Self {
		Self::at_path(server, client, paths::ROOT)
	}

	pub fn at_path(server: ServerDescriptor, client: Arc<dyn RemoteFs>, path: &str) -> Self {
		let (state, _) = watch::channel(NavigationSnapshot {
			current_path: paths::rooted(path),
			entries: Vec::new(),
			state: LoadState::Idle,
			request: 0,
		});
		Self {
			server,
			client,
			state: Arc::new(state),
			in_flight: Mutex::new(None),
		}
	}

	pub fn server(&self) -> &ServerDescriptor {
		&self.server
	}

	pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
		self.state.subscribe()
	}

	pub fn snapshot(&self) -> NavigationSnapshot {
		self.state.borrow().clone()
	}

	pub fn current_path(&self) -> String {
		self.state.borrow().current_path.clone()
	}

	pub fn can_go_up(&self) -> bool {
		self.state.borrow().can_go_up()
	}

	/// Server name at the root, otherwise the last path segment.
	pub fn current_directory_name(&self) -> String {
		let snap = self.state.borrow();
		match paths::last_component(&snap.current_path) {
			Some(name) => name.to_string(),
			None => self.server.display_name(),
		}
	}

	pub fn sorted_entries(&self) -> Vec<DirectoryEntry> {
		self.state.borrow().sorted_entries()
	}

	/// Switches to `path` immediately and loads it. Supersedes any load in flight.
	pub fn navigate_to(&self, path: &str) -> JoinHandle<()> {
		let path = paths::rooted(path);
		self.issue_load(Some(path))
	}

	/// Reloads the current path. Also the retry action after a failure.
	pub fn refresh(&self) -> JoinHandle<()> {
		self.issue_load(None)
	}

	pub fn go_up(&self) -> JoinHandle<()> {
		let parent = self.state.borrow().parent_path();
		self.navigate_to(&parent)
	}

	/// Enters `entry` if it is a directory. Files belong to a viewer session.
	pub fn open(&self, entry: &DirectoryEntry) -> Option<JoinHandle<()>> {
		if entry.is_directory() {
			Some(self.navigate_to(&entry.absolute_path))
		} else {
			None
		}
	}

	/// The `in_flight` lock is held from the request bump to the handle swap, so
	/// the task left running is always the one carrying the newest request.
	fn issue_load(&self, path: Option<String>) -> JoinHandle<()> {
		let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
		let mut request = 0;
		let mut target = String::new();
		self.state.send_modify(|snap| {
			if let Some(path) = path {
				if path != snap.current_path {
					snap.entries.clear();
				}
				snap.current_path = path;
			}
			snap.request += 1;
			request = snap.request;
			target = snap.current_path.clone();
			snap.state = LoadState::Loading;
		});

		let client = self.client.clone();
		let server = self.server.clone();
		let state = self.state.clone();
		let task = tokio::spawn(async move {
			let result = client.list_directory(&server, &target).await;
			apply(&state, request, &target, result);
		});

		if let Some(previous) = in_flight.replace(task.abort_handle()) {
			previous.abort();
		}
		task
	}
}

impl Drop for NavigationSession {
	fn drop(&mut self) {
		let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(task) = in_flight.take() {
			task.abort();
		}
	}
}

fn apply(
	state: &watch::Sender<NavigationSnapshot>,
	request: u64,
	path: &str,
	result: Result<Vec<DirectoryEntry>, ApiError>,
) {
	state.send_if_modified(|snap| {
		if snap.request != request {
			log::debug!("discarding superseded listing of {path}");
			return false;
		}
		match result {
			Ok(entries) => {
				log::debug!("loaded {} entries in {path}", entries.len());
				snap.entries = entries;
				snap.state = LoadState::Loaded;
			}
			Err(err) => {
				log::warn!("failed to list {path}: {err}");
				snap.entries.clear();
				snap.state = LoadState::Failed(err);
			}
		}
		true
	});
}
