use crate::api::RemoteFs;
use crate::server::ServerDescriptor;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ConnectivitySnapshot {
	/// True while a batch is outstanding.
	pub checking: bool,
	/// Result of the last completed batch.
	pub statuses: HashMap<Uuid, bool>,
	latest_batch: u64,
}

impl ConnectivitySnapshot {
	/// `None` until a batch containing the server has completed.
	pub fn is_online(&self, id: Uuid) -> Option<bool> {
		self.statuses.get(&id).copied()
	}
}

/// Probes many servers at once and publishes the outcome as one update per batch.
pub struct ConnectivityMonitor {
	client: Arc<dyn RemoteFs>,
	max_concurrent: usize,
	state: watch::Sender<ConnectivitySnapshot>,
}

impl ConnectivityMonitor {
	pub fn new(client: Arc<dyn RemoteFs>, max_concurrent: usize) -> Self {
		let (state, _) = watch::channel(ConnectivitySnapshot::default());
		Self {
			client,
			max_concurrent: max_concurrent.max(1),
			state,
		}
	}

	pub fn subscribe(&self) -> watch::Receiver<ConnectivitySnapshot> {
		self.state.subscribe()
	}

	pub fn snapshot(&self) -> ConnectivitySnapshot {
		self.state.borrow().clone()
	}

	/// Probes every server and replaces the published statuses once all probes
	/// have finished. Servers sharing an id are probed once. When batches
	/// overlap only the most recently started one is published. Dropping the
	/// future abandons the batch and clears `checking` if it was the latest.
	pub async fn check_all(&self, servers: &[ServerDescriptor]) -> HashMap<Uuid, bool> {
		let mut batch = 0;
		self.state.send_modify(|snap| {
			snap.latest_batch += 1;
			batch = snap.latest_batch;
			snap.checking = true;
		});
		let _guard = BatchGuard {
			state: &self.state,
			batch,
		};

		let mut targets: Vec<ServerDescriptor> = Vec::with_capacity(servers.len());
		for server in servers {
			if !targets.iter().any(|target| target.id() == server.id()) {
				targets.push(server.clone());
			}
		}

		let statuses: HashMap<Uuid, bool> = stream::iter(targets)
			.map(|server| {
				let client = self.client.clone();
				async move { (server.id(), client.probe(&server).await) }
			})
			.buffer_unordered(self.max_concurrent)
			.collect()
			.await;

		let online = statuses.values().filter(|online| **online).count();
		log::info!("connectivity check finished: {online}/{} online", statuses.len());

		let published = statuses.clone();
		self.state.send_if_modified(move |snap| {
			if snap.latest_batch != batch {
				return false;
			}
			snap.statuses = published;
			snap.checking = false;
			true
		});
		statuses
	}
}

/// Clears `checking` when a batch ends without publishing.
struct BatchGuard<'a> {
	state: &'a watch::Sender<ConnectivitySnapshot>,
	batch: u64,
}

impl Drop for BatchGuard<'_> {
	fn drop(&mut self) {
		let batch = self.batch;
		self.state.send_if_modified(|snap| {
			if snap.latest_batch != batch || !snap.checking {
				return false;
			}
			log::debug!("connectivity check {batch} abandoned");
			snap.checking = false;
			true
		});
	}
}
