use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::server::ServerDescriptor;
use crate::types::{DirectoryEntry, DirectoryListing, FileContent, FileMetadata};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const LIST_ENDPOINT: &str = "/api/list";
pub const VIEW_ENDPOINT: &str = "/api/view";
pub const STAT_ENDPOINT: &str = "/api/stat";
pub const FILE_ENDPOINT: &str = "/api/file";

/// Read access to a server's filesystem API.
///
/// Every call is a single attempt. Retrying is left to the caller.
#[async_trait]
pub trait RemoteFs: Send + Sync {
	/// Entries in server order; callers sort for display.
	async fn list_directory(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<Vec<DirectoryEntry>, ApiError>;

	async fn view_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<FileContent, ApiError>;

	async fn stat_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<FileMetadata, ApiError>;

	async fn download_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<Vec<u8>, ApiError>;

	/// Reachability check. Never fails; any error reads as `false`.
	async fn probe(&self, server: &ServerDescriptor) -> bool;
}

/// `http://{host}:{port}{endpoint}?path={path}`.
pub fn endpoint_url(server: &ServerDescriptor, endpoint: &str, path: &str) -> Result<Url, ApiError> {
	let mut url = Url::parse(&server.base_url())?;
	url.set_path(endpoint);
	url.query_pairs_mut().append_pair("path", path);
	Ok(url)
}

/// Direct download URL for streaming display, e.g. images. Never fetched here.
pub fn file_url(server: &ServerDescriptor, path: &str) -> Result<Url, ApiError> {
	endpoint_url(server, FILE_ENDPOINT, path)
}

/// `RemoteFs` over plain HTTP. Holds only configuration and a pooled
/// `reqwest::Client`, so clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
	http: Client,
	probe_timeout: Duration,
}

impl ApiClient {
	pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
		let http = Client::builder()
			.connect_timeout(config.request_timeout)
			.read_timeout(config.request_timeout)
			.timeout(config.resource_timeout)
			.user_agent(concat!("browsey/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self {
			http,
			probe_timeout: config.probe_timeout,
		})
	}

	async fn send(
		&self,
		server: &ServerDescriptor,
		endpoint: &str,
		path: &str,
	) -> Result<Response, ApiError> {
		let url = endpoint_url(server, endpoint, path)?;
		log::debug!("GET {url}");
		let res = self.http.get(url).send().await?;
		let status = res.status();
		if !status.is_success() {
			return Err(ApiError::Status(status.as_u16()));
		}
		Ok(res)
	}

	async fn get_json<T: DeserializeOwned>(
		&self,
		server: &ServerDescriptor,
		endpoint: &str,
		path: &str,
	) -> Result<T, ApiError> {
		let res = self.send(server, endpoint, path).await?;
		let body = res.bytes().await?;
		Ok(serde_json::from_slice(&body)?)
	}
}

#[async_trait]
impl RemoteFs for ApiClient {
	async fn list_directory(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<Vec<DirectoryEntry>, ApiError> {
		let listing: DirectoryListing = self.get_json(server, LIST_ENDPOINT, path).await?;
		Ok(listing.items)
	}

	async fn view_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<FileContent, ApiError> {
		self.get_json(server, VIEW_ENDPOINT, path).await
	}

	async fn stat_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<FileMetadata, ApiError> {
		self.get_json(server, STAT_ENDPOINT, path).await
	}

	async fn download_file(
		&self,
		server: &ServerDescriptor,
		path: &str,
	) -> Result<Vec<u8>, ApiError> {
		let res = self.send(server, FILE_ENDPOINT, path).await?;
		Ok(res.bytes().await?.to_vec())
	}

	async fn probe(&self, server: &ServerDescriptor) -> bool {
		let url = match endpoint_url(server, LIST_ENDPOINT, "/") {
			Ok(url) => url,
			Err(err) => {
				log::debug!("probe of {} skipped: {err}", server.display_name());
				return false;
			}
		};
		let res = self
			.http
			.request(Method::HEAD, url)
			.timeout(self.probe_timeout)
			.send()
			.await;
		match res {
			Ok(res) => res.status().is_success(),
			Err(err) => {
				log::debug!("probe of {} failed: {err}", server.display_name());
				false
			}
		}
	}
}
