//! Client core for browsing file servers on the local network.
//!
//! - [`discovery`] finds servers advertised over multicast DNS.
//! - [`api`] talks to a server's `/api/*` endpoints.
//! - [`monitor`] probes many servers and reports which are online.
//! - [`navigation`] and [`viewer`] hold the state of one browsing or viewing flow.
//! - [`store`] keeps the user's saved servers.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod monitor;
pub mod navigation;
pub mod paths;
pub mod server;
pub mod store;
pub mod types;
pub mod viewer;

pub use api::{ApiClient, RemoteFs};
pub use config::ClientConfig;
pub use discovery::{DiscoveryEngine, DiscoveryState, MdnsBrowser, ServiceBrowser};
pub use error::{ApiError, DiscoveryError};
pub use monitor::ConnectivityMonitor;
pub use navigation::{LoadState, NavigationSession};
pub use server::ServerDescriptor;
pub use store::{JsonFileStore, ServerStore};
pub use types::{DirectoryEntry, EntryKind, FileContent, FileMetadata};
pub use viewer::FileViewerSession;
