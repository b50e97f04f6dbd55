use crate::api::{self, RemoteFs};
use crate::error::ApiError;
use crate::navigation::LoadState;
use crate::server::ServerDescriptor;
use crate::types::{DirectoryEntry, FileContent, FileMetadata};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

#[derive(Debug, Clone)]
pub struct ViewerSnapshot {
	pub content: Option<FileContent>,
	/// Supplementary; absent when the stat call failed.
	pub metadata: Option<FileMetadata>,
	pub state: LoadState,
}

/// Loads one file for viewing. Content failures fail the session; metadata and
/// download failures do not.
pub struct FileViewerSession {
	server: ServerDescriptor,
	entry: DirectoryEntry,
	client: Arc<dyn RemoteFs>,
	state: watch::Sender<ViewerSnapshot>,
}

impl FileViewerSession {
	pub fn new(server: ServerDescriptor, entry: DirectoryEntry, client: Arc<dyn RemoteFs>) -> Self {
		let (state, _) = watch::channel(ViewerSnapshot {
			content: None,
			metadata: None,
			state: LoadState::Idle,
		});
		Self {
			server,
			entry,
			client,
			state,
		}
	}

	pub fn entry(&self) -> &DirectoryEntry {
		&self.entry
	}

	pub fn subscribe(&self) -> watch::Receiver<ViewerSnapshot> {
		self.state.subscribe()
	}

	pub fn snapshot(&self) -> ViewerSnapshot {
		self.state.borrow().clone()
	}

	/// URL a renderer can stream the raw file from.
	pub fn file_url(&self) -> Result<Url, ApiError> {
		api::file_url(&self.server, &self.entry.absolute_path)
	}

	/// Fetches content and metadata concurrently.
	pub async fn load(&self) {
		self.state.send_modify(|snap| snap.state = LoadState::Loading);
		let path = self.entry.absolute_path.as_str();
		let (content, metadata) = tokio::join!(
			self.client.view_file(&self.server, path),
			self.client.stat_file(&self.server, path),
		);
		let metadata = match metadata {
			Ok(metadata) => Some(metadata),
			Err(err) => {
				log::warn!("failed to load file info for {path}: {err}");
				None
			}
		};
		self.state.send_modify(|snap| {
			snap.metadata = metadata;
			match content {
				Ok(content) => {
					snap.content = Some(content);
					snap.state = LoadState::Loaded;
				}
				Err(err) => {
					log::warn!("failed to load {path}: {err}");
					snap.content = None;
					snap.state = LoadState::Failed(err);
				}
			}
		});
	}

	/// Fetches metadata alone, e.g. for an info panel opened later.
	pub async fn load_metadata(&self) {
		let path = self.entry.absolute_path.as_str();
		match self.client.stat_file(&self.server, path).await {
			Ok(metadata) => self.state.send_modify(|snap| snap.metadata = Some(metadata)),
			Err(err) => log::warn!("failed to load file info for {path}: {err}"),
		}
	}

	/// Raw file bytes. Errors go to the caller only; session state is untouched.
	pub async fn download(&self) -> Result<Vec<u8>, ApiError> {
		self.client.download_file(&self.server, &self.entry.absolute_path).await
	}

	/// Downloads into `dir` under the entry's name and returns the written path.
	pub async fn download_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
		let data = self.download().await?;
		let name = Path::new(&self.entry.name)
			.file_name()
			.context("entry has no usable file name")?;
		let target = dir.join(name);
		tokio::fs::write(&target, &data)
			.await
			.with_context(|| format!("failed to write {}", target.display()))?;
		log::info!("saved {} bytes to {}", data.len(), target.display());
		Ok(target)
	}
}
