//! Local network discovery of file servers.
//!
//! A [`ServiceBrowser`] reports advertised services. The [`DiscoveryEngine`]
//! resolves each advertisement by opening a short-lived TCP connection to it
//! and recording the endpoint the connection actually reached. Resolutions
//! run concurrently and complete in any order; the only deduplication point
//! is when a resolved server is appended to the result list.

use crate::error::DiscoveryError;
use crate::server::{ServerDescriptor, push_unique};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

/// An advertised service instance before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
	pub name: String,
	pub addresses: Vec<IpAddr>,
	pub port: u16,
}

/// Source of service advertisements for one service type.
pub trait ServiceBrowser: Send + Sync {
	fn browse(
		&self,
		service_type: &str,
	) -> Result<mpsc::UnboundedReceiver<Advertisement>, DiscoveryError>;

	fn stop_browse(&self, service_type: &str);
}

/// Multicast DNS browser.
pub struct MdnsBrowser {
	daemon: ServiceDaemon,
}

impl MdnsBrowser {
	pub fn new() -> Result<Self, DiscoveryError> {
		Ok(Self {
			daemon: ServiceDaemon::new()?,
		})
	}
}

impl ServiceBrowser for MdnsBrowser {
	fn browse(
		&self,
		service_type: &str,
	) -> Result<mpsc::UnboundedReceiver<Advertisement>, DiscoveryError> {
		let events = self.daemon.browse(service_type)?;
		let (tx, rx) = mpsc::unbounded_channel();
		let service_type = service_type.to_string();
		tokio::spawn(async move {
			while let Ok(event) = events.recv_async().await {
				match event {
					ServiceEvent::ServiceResolved(info) => {
						let advertisement = Advertisement {
							name: instance_name(info.get_fullname(), &service_type),
							addresses: info.get_addresses().iter().copied().collect(),
							port: info.get_port(),
						};
						if tx.send(advertisement).is_err() {
							break;
						}
					}
					ServiceEvent::SearchStopped(_) => break,
					other => log::trace!("mdns event {:?}", other),
				}
			}
		});
		Ok(rx)
	}

	fn stop_browse(&self, service_type: &str) {
		if let Err(err) = self.daemon.stop_browse(service_type) {
			log::debug!("failed to stop mdns browse: {err}");
		}
	}
}

impl Drop for MdnsBrowser {
	fn drop(&mut self) {
		if let Err(err) = self.daemon.shutdown() {
			log::debug!("failed to shut down mdns daemon: {err}");
		}
	}
}

/// Instance label of a full service name, `Office NAS._browsey._tcp.local.` -> `Office NAS`.
fn instance_name(fullname: &str, service_type: &str) -> String {
	fullname
		.strip_suffix(service_type)
		.map(|name| name.trim_end_matches('.'))
		.unwrap_or(fullname)
		.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
	Idle,
	Searching,
	/// The browse ended on its own. Results found so far are kept.
	Stopped,
}

#[derive(Debug, Clone)]
pub struct DiscoverySnapshot {
	pub state: DiscoveryState,
	pub servers: Vec<ServerDescriptor>,
	session: u64,
}

impl DiscoverySnapshot {
	pub fn is_searching(&self) -> bool {
		self.state == DiscoveryState::Searching
	}
}

pub struct DiscoveryEngine {
	browser: Arc<dyn ServiceBrowser>,
	service_type: String,
	resolve_timeout: Duration,
	state: Arc<watch::Sender<DiscoverySnapshot>>,
	browse_task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryEngine {
	pub fn new(
		browser: Arc<dyn ServiceBrowser>,
		service_type: impl Into<String>,
		resolve_timeout: Duration,
	) -> Self {
		let (state, _) = watch::channel(DiscoverySnapshot {
			state: DiscoveryState::Idle,
			servers: Vec::new(),
			session: 0,
		});
		Self {
			browser,
			service_type: service_type.into(),
			resolve_timeout,
			state: Arc::new(state),
			browse_task: Mutex::new(None),
		}
	}

	pub fn subscribe(&self) -> watch::Receiver<DiscoverySnapshot> {
		self.state.subscribe()
	}

	pub fn snapshot(&self) -> DiscoverySnapshot {
		self.state.borrow().clone()
	}

	pub fn servers(&self) -> Vec<ServerDescriptor> {
		self.state.borrow().servers.clone()
	}

	/// Starts a clean search. No-op while already searching.
	pub fn start(&self) -> Result<(), DiscoveryError> {
		let mut browse_task = self.browse_task.lock().unwrap_or_else(PoisonError::into_inner);
		if self.state.borrow().is_searching() {
			log::debug!("discovery already running");
			return Ok(());
		}
		if let Some(task) = browse_task.take() {
			task.abort();
		}
		let advertisements = self.browser.browse(&self.service_type)?;
		let mut session = 0;
		self.state.send_modify(|snap| {
			snap.session += 1;
			session = snap.session;
			snap.state = DiscoveryState::Searching;
			snap.servers.clear();
		});
		log::info!("searching for {}", self.service_type);
		*browse_task = Some(tokio::spawn(run_search(
			advertisements,
			self.state.clone(),
			session,
			self.resolve_timeout,
		)));
		Ok(())
	}

	/// Cancels the browse and every pending resolution and discards results.
	pub fn stop(&self) {
		let mut browse_task = self.browse_task.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(task) = browse_task.take() {
			task.abort();
			self.browser.stop_browse(&self.service_type);
			log::info!("stopped searching for {}", self.service_type);
		}
		self.state.send_modify(|snap| {
			snap.session += 1;
			snap.state = DiscoveryState::Idle;
			snap.servers.clear();
		});
	}
}

impl Drop for DiscoveryEngine {
	fn drop(&mut self) {
		if let Ok(mut browse_task) = self.browse_task.lock() {
			if let Some(task) = browse_task.take() {
				task.abort();
				self.browser.stop_browse(&self.service_type);
			}
		}
	}
}

/// Drives one search session. Resolutions live in a `JoinSet`, so aborting
/// this task aborts all of them.
async fn run_search(
	mut advertisements: mpsc::UnboundedReceiver<Advertisement>,
	state: Arc<watch::Sender<DiscoverySnapshot>>,
	session: u64,
	resolve_timeout: Duration,
) {
	let mut resolutions = JoinSet::new();
	let mut browsing = true;
	while browsing || !resolutions.is_empty() {
		tokio::select! {
			advertisement = advertisements.recv(), if browsing => match advertisement {
				Some(advertisement) => {
					let state = state.clone();
					resolutions.spawn(async move {
						match resolve(&advertisement, resolve_timeout).await {
							Ok(addr) => record(&state, session, &advertisement.name, addr),
							Err(err) => log::debug!("dropping advertisement: {err}"),
						}
					});
				}
				None => {
					log::warn!("service browse ended");
					browsing = false;
				}
			},
			Some(_) = resolutions.join_next(), if !resolutions.is_empty() => {}
		}
	}
	state.send_if_modified(|snap| {
		if snap.session != session || snap.state != DiscoveryState::Searching {
			return false;
		}
		snap.state = DiscoveryState::Stopped;
		true
	});
}

/// Connects to each advertised address in turn, IPv4 first, and returns the
/// remote endpoint of the first connection that succeeds. The connection is
/// closed right away. Link-local IPv6 addresses are skipped: a URL cannot
/// carry their scope id, so the server would be unreachable later.
pub async fn resolve(
	advertisement: &Advertisement,
	timeout: Duration,
) -> Result<SocketAddr, DiscoveryError> {
	let mut addresses: Vec<IpAddr> = advertisement
		.addresses
		.iter()
		.copied()
		.filter(is_addressable)
		.collect();
	addresses.sort_by_key(|addr| addr.is_ipv6());
	for ip in addresses {
		let target = SocketAddr::new(ip, advertisement.port);
		match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
			Ok(Ok(stream)) => {
				let remote = stream.peer_addr().unwrap_or(target);
				drop(stream);
				return Ok(remote);
			}
			Ok(Err(err)) => log::debug!("resolving {} via {target} failed: {err}", advertisement.name),
			Err(_) => log::debug!("resolving {} via {target} timed out", advertisement.name),
		}
	}
	Err(DiscoveryError::Unresolved(advertisement.name.clone()))
}

fn is_addressable(ip: &IpAddr) -> bool {
	match ip {
		IpAddr::V4(_) => true,
		IpAddr::V6(v6) => !v6.is_unicast_link_local(),
	}
}

fn record(state: &watch::Sender<DiscoverySnapshot>, session: u64, name: &str, addr: SocketAddr) {
	let server = ServerDescriptor::discovered(name, addr.ip().to_string(), addr.port());
	state.send_if_modified(|snap| {
		if snap.session != session {
			return false;
		}
		let added = push_unique(&mut snap.servers, server);
		if added {
			log::debug!("discovered {name} at {addr}");
		}
		added
	});
}
