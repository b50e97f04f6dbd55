use crate::server::ServerDescriptor;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, RwLock};
use uuid::Uuid;

pub const SERVERS_KEY: &str = "savedServers";

/// Externally owned keyed storage for serialized values.
pub trait KeyValueStore: Send + Sync {
	fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
	fn save(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// One JSON file per key under a directory.
pub struct JsonFileStore {
	dir: PathBuf,
}

impl JsonFileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn path(&self, key: &str) -> PathBuf {
		self.dir.join(format!("{key}.json"))
	}
}

impl KeyValueStore for JsonFileStore {
	fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let path = self.path(key);
		if !path.exists() {
			return Ok(None);
		}
		let data = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
		Ok(Some(data))
	}

	fn save(&self, key: &str, value: &[u8]) -> Result<()> {
		std::fs::create_dir_all(&self.dir)
			.with_context(|| format!("failed to create {}", self.dir.display()))?;
		let path = self.path(key);
		let tmp = path.with_extension("json.tmp");
		std::fs::write(&tmp, value).with_context(|| format!("failed to write {}", tmp.display()))?;
		std::fs::rename(&tmp, &path).with_context(|| format!("failed to replace {}", path.display()))?;
		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryStore {
	values: Mutex<HashMap<String, Vec<u8>>>,
}

impl KeyValueStore for MemoryStore {
	fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
		Ok(values.get(key).cloned())
	}

	fn save(&self, key: &str, value: &[u8]) -> Result<()> {
		let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
		values.insert(key.to_string(), value.to_vec());
		Ok(())
	}
}

/// Saved servers, persisted as a JSON array under [`SERVERS_KEY`].
///
/// Never holds two servers with the same `(host, port)`. Persistence failures
/// are logged; the in-memory list stays authoritative.
pub struct ServerStore {
	backend: Box<dyn KeyValueStore>,
	servers: RwLock<Vec<ServerDescriptor>>,
}

impl ServerStore {
	pub fn open(backend: Box<dyn KeyValueStore>) -> Self {
		let servers = match load_servers(backend.as_ref()) {
			Ok(servers) => servers,
			Err(err) => {
				log::error!("failed to load saved servers: {err:#}");
				Vec::new()
			}
		};
		log::debug!("loaded {} saved servers", servers.len());
		Self {
			backend,
			servers: RwLock::new(servers),
		}
	}

	pub fn in_memory() -> Self {
		Self::open(Box::new(MemoryStore::default()))
	}

	pub fn servers(&self) -> Vec<ServerDescriptor> {
		self.servers.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub fn get(&self, id: Uuid) -> Option<ServerDescriptor> {
		let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
		servers.iter().find(|server| server.id() == id).cloned()
	}

	/// Inserts or replaces `server`, stamping it as just connected.
	///
	/// An entry with the same id or the same endpoint is replaced in place, so
	/// a manually added server and a discovered one never coexist.
	pub fn upsert(&self, server: ServerDescriptor) -> ServerDescriptor {
		let mut server = server;
		server.last_connected_at = Some(Utc::now());
		let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
		let position = servers
			.iter()
			.position(|existing| existing.id() == server.id() || existing.same_endpoint(&server));
		servers.retain(|existing| existing.id() != server.id() && !existing.same_endpoint(&server));
		match position {
			Some(idx) => {
				let at = idx.min(servers.len());
				servers.insert(at, server.clone());
			}
			None => servers.push(server.clone()),
		}
		self.persist(&servers);
		server
	}

	pub fn remove(&self, id: Uuid) -> bool {
		let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
		let before = servers.len();
		servers.retain(|server| server.id() != id);
		let removed = servers.len() != before;
		if removed {
			self.persist(&servers);
		}
		removed
	}

	/// Records a selection of the server with `id`.
	pub fn touch(&self, id: Uuid) -> Option<ServerDescriptor> {
		let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
		let server = servers.iter_mut().find(|server| server.id() == id)?;
		server.last_connected_at = Some(Utc::now());
		let touched = server.clone();
		self.persist(&servers);
		Some(touched)
	}

	fn persist(&self, servers: &[ServerDescriptor]) {
		let result = serde_json::to_vec(servers)
			.context("failed to serialize servers")
			.and_then(|data| self.backend.save(SERVERS_KEY, &data));
		if let Err(err) = result {
			log::error!("failed to save servers: {err:#}");
		}
	}
}

fn load_servers(backend: &dyn KeyValueStore) -> Result<Vec<ServerDescriptor>> {
	let Some(data) = backend.load(SERVERS_KEY)? else {
		return Ok(Vec::new());
	};
	let servers: Vec<ServerDescriptor> =
		serde_json::from_slice(&data).context("failed to parse saved servers")?;
	let mut unique = Vec::with_capacity(servers.len());
	for server in servers {
		if !crate::server::push_unique(&mut unique, server) {
			log::warn!("dropping duplicate saved server entry");
		}
	}
	Ok(unique)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	struct FailingStore;

	impl KeyValueStore for FailingStore {
		fn load(&self, _key: &str) -> Result<Option<Vec<u8>>> {
			anyhow::bail!("disk on fire")
		}

		fn save(&self, _key: &str, _value: &[u8]) -> Result<()> {
			anyhow::bail!("disk on fire")
		}
	}

	struct SharedStore(Arc<MemoryStore>);

	impl KeyValueStore for SharedStore {
		fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
			self.0.load(key)
		}

		fn save(&self, key: &str, value: &[u8]) -> Result<()> {
			self.0.save(key, value)
		}
	}

	#[test]
	fn upsert_replaces_same_endpoint() {
		let store = ServerStore::in_memory();
		let manual = store.upsert(ServerDescriptor::new("manual", "10.0.0.2", 8080));
		let found = store.upsert(ServerDescriptor::discovered("found", "10.0.0.2", 8080));
		let servers = store.servers();
		assert_eq!(servers.len(), 1);
		assert_eq!(servers[0].id(), found.id());
		assert_ne!(manual.id(), found.id());
		assert!(servers[0].last_connected_at.is_some());
	}

	#[test]
	fn upsert_by_id_moves_endpoint_without_duplicates() {
		let store = ServerStore::in_memory();
		let a = store.upsert(ServerDescriptor::new("a", "10.0.0.2", 8080));
		store.upsert(ServerDescriptor::new("b", "10.0.0.3", 8080));
		let mut moved = a.clone();
		moved.host = "10.0.0.3".into();
		store.upsert(moved);
		let servers = store.servers();
		assert_eq!(servers.len(), 1);
		assert_eq!(servers[0].id(), a.id());
		assert_eq!(servers[0].host, "10.0.0.3");
	}

	#[test]
	fn upsert_keeps_position_of_replaced_entry() {
		let store = ServerStore::in_memory();
		store.upsert(ServerDescriptor::new("a", "10.0.0.2", 8080));
		store.upsert(ServerDescriptor::new("b", "10.0.0.3", 8080));
		store.upsert(ServerDescriptor::new("c", "10.0.0.4", 8080));
		let renamed = store.upsert(ServerDescriptor::discovered("b2", "10.0.0.3", 8080));
		let names: Vec<_> = store.servers().into_iter().map(|s| s.name).collect();
		assert_eq!(names, ["a", "b2", "c"]);
		assert_eq!(store.servers()[1].id(), renamed.id());

		// the last entry replaced by id lands at the end again
		let mut moved = store.servers()[2].clone();
		moved.port = 9000;
		store.upsert(moved);
		let servers = store.servers();
		assert_eq!(servers.len(), 3);
		assert_eq!(servers[2].port, 9000);
	}

	#[test]
	fn remove_and_touch_by_id() {
		let store = ServerStore::in_memory();
		let a = store.upsert(ServerDescriptor::new("a", "10.0.0.2", 8080));
		let b = store.upsert(ServerDescriptor::new("b", "10.0.0.3", 8080));
		assert!(store.touch(a.id()).is_some());
		assert!(store.remove(b.id()));
		assert!(!store.remove(b.id()));
		assert!(store.touch(b.id()).is_none());
		assert_eq!(store.servers().len(), 1);
	}

	#[test]
	fn persists_across_reopen() {
		let backend = Arc::new(MemoryStore::default());
		let store = ServerStore::open(Box::new(SharedStore(backend.clone())));
		let saved = store.upsert(ServerDescriptor::new("nas", "10.0.0.9", 9000));
		drop(store);

		let reopened = ServerStore::open(Box::new(SharedStore(backend)));
		assert_eq!(reopened.get(saved.id()).map(|s| s.name), Some("nas".to_string()));
	}

	#[test]
	fn backend_failures_degrade_to_empty() {
		let store = ServerStore::open(Box::new(FailingStore));
		assert!(store.servers().is_empty());
		store.upsert(ServerDescriptor::new("a", "10.0.0.2", 8080));
		assert_eq!(store.servers().len(), 1);
	}

	#[test]
	fn corrupt_data_degrades_to_empty() {
		let backend = MemoryStore::default();
		backend.save(SERVERS_KEY, b"[{\"broken\"").unwrap();
		let store = ServerStore::open(Box::new(backend));
		assert!(store.servers().is_empty());
	}

	#[test]
	fn json_file_store_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("nested"));
		assert!(store.load(SERVERS_KEY).unwrap().is_none());
		store.save(SERVERS_KEY, b"[]").unwrap();
		assert_eq!(store.load(SERVERS_KEY).unwrap(), Some(b"[]".to_vec()));
	}
}
