use anyhow::{Context, Result, anyhow, bail};
use args::Command;
use browsey_core::api;
use browsey_core::monitor::ConnectivityMonitor;
use browsey_core::paths;
use browsey_core::server::merge_by_id;
use browsey_core::{
	ApiClient, ClientConfig, DirectoryEntry, DiscoveryEngine, FileContent, FileViewerSession,
	JsonFileStore, LoadState, MdnsBrowser, NavigationSession, RemoteFs, ServerDescriptor,
	ServerStore,
};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod args;

#[tokio::main]
async fn main() {
	let args = args::Args::parse();
	let level = if args.verbose {
		log::Level::Debug
	} else {
		log::Level::Info
	};
	if let Err(err) = simple_logger::init_with_level(level) {
		eprintln!("failed to initialize logger: {err}");
	}

	let config = ClientConfig::from_env();
	if let Err(err) = run(args.command, &config).await {
		log::error!("{err:#}");
		std::process::exit(1);
	}
}

async fn run(command: Command, config: &ClientConfig) -> Result<()> {
	let store = ServerStore::open(Box::new(JsonFileStore::new(&config.data_dir)));
	let client: Arc<dyn RemoteFs> = Arc::new(ApiClient::new(config)?);

	match command {
		Command::Discover { seconds, save } => {
			let servers = discover(config, seconds).await?;
			if servers.is_empty() {
				log::info!("no servers found");
			}
			for server in servers {
				println!("{}\t{}:{}", server.display_name(), server.host, server.port);
				if save {
					store.upsert(server);
				}
			}
		}
		Command::Servers => {
			for server in store.servers() {
				let last = server
					.last_connected_at
					.map(format_time)
					.unwrap_or_else(|| "never".to_string());
				println!(
					"{}\t{}\t{}:{}\tlast connected {}",
					server.id(),
					server.display_name(),
					server.host,
					server.port,
					last
				);
			}
		}
		Command::Add { url, name } => {
			let mut server = ServerDescriptor::parse_url(&url)
				.ok_or_else(|| anyhow!("invalid server address {url}"))?;
			if let Some(name) = name {
				server.name = name;
			}
			let server = store.upsert(server);
			println!("saved {} as {}", server.display_name(), server.id());
		}
		Command::Remove { id } => {
			let id = id.parse().context("invalid server id")?;
			if !store.remove(id) {
				bail!("no saved server with id {id}");
			}
		}
		Command::Check { discover: with_discovery, seconds } => {
			let saved = store.servers();
			let found = if with_discovery {
				discover(config, seconds).await?
			} else {
				Vec::new()
			};
			let servers = merge_by_id([saved.as_slice(), found.as_slice()]);
			let monitor = ConnectivityMonitor::new(client, config.max_concurrent_probes);
			let statuses = monitor.check_all(&servers).await;
			for server in &servers {
				let status = match statuses.get(&server.id()) {
					Some(true) => "online",
					_ => "offline",
				};
				println!("{}\t{}", status, server.display_name());
			}
		}
		Command::Ls { server, path } => {
			let server = select_server(&store, &server)?;
			let session = NavigationSession::at_path(server, client, &path);
			session.refresh().await?;
			let snap = session.snapshot();
			if let LoadState::Failed(err) = &snap.state {
				bail!("failed to list {}: {err}", snap.current_path);
			}
			println!("{}", session.current_directory_name());
			for entry in snap.sorted_entries() {
				print_entry(&entry);
			}
		}
		Command::View { server, path } => {
			let server = select_server(&store, &server)?;
			let entry = find_entry(&server, &client, &path).await?;
			if !entry.is_viewable() {
				log::warn!("{} may not be viewable", entry.name);
			}
			let viewer = FileViewerSession::new(server, entry, client);
			viewer.load().await;
			let snap = viewer.snapshot();
			if let LoadState::Failed(err) = snap.state {
				bail!("failed to view {path}: {err}");
			}
			match snap.content {
				Some(FileContent::Text { content, .. }) | Some(FileContent::Markdown { content }) => {
					println!("{content}");
				}
				Some(FileContent::Image { mime_type, dimensions }) => {
					let size = dimensions
						.map(|d| format!("{}x{}", d.width, d.height))
						.unwrap_or_else(|| "unknown size".to_string());
					println!("{mime_type} image, {size}");
					println!("{}", viewer.file_url()?);
				}
				Some(FileContent::Binary { mime_type }) => {
					println!(
						"binary file ({})",
						mime_type.as_deref().unwrap_or("unknown type")
					);
				}
				None => {}
			}
		}
		Command::Stat { server, path } => {
			let server = select_server(&store, &server)?;
			let meta = client.stat_file(&server, &paths::rooted(&path)).await?;
			println!("name:     {}", meta.name);
			println!("type:     {}", meta.type_label);
			println!("size:     {}", format_size(meta.size_bytes));
			println!("modified: {}", format_time(meta.modified_at));
			if let Some(created) = meta.created_at {
				println!("created:  {}", format_time(created));
			}
			println!("path:     {}", meta.absolute_path);
		}
		Command::Get { server, path, out } => {
			let server = select_server(&store, &server)?;
			let entry = find_entry(&server, &client, &path).await?;
			let viewer = FileViewerSession::new(server, entry, client);
			let saved = viewer.download_to(Path::new(&out)).await?;
			println!("{}", saved.display());
		}
		Command::Url { server, path } => {
			let server = select_server(&store, &server)?;
			println!("{}", api::file_url(&server, &paths::rooted(&path))?);
		}
	}
	Ok(())
}

async fn discover(config: &ClientConfig, seconds: u64) -> Result<Vec<ServerDescriptor>> {
	let browser = MdnsBrowser::new()?;
	let engine = DiscoveryEngine::new(
		Arc::new(browser),
		config.service_type.clone(),
		config.resolve_timeout,
	);
	engine.start()?;
	tokio::time::sleep(Duration::from_secs(seconds)).await;
	let servers = engine.servers();
	engine.stop();
	Ok(servers)
}

/// Saved server by name, `host:port` or id, otherwise a new one parsed from `arg`.
fn select_server(store: &ServerStore, arg: &str) -> Result<ServerDescriptor> {
	let saved = store.servers().into_iter().find(|server| {
		server.name.eq_ignore_ascii_case(arg)
			|| format!("{}:{}", server.host, server.port) == arg
			|| server.id().to_string() == arg
	});
	if let Some(server) = saved {
		return Ok(store.touch(server.id()).unwrap_or(server));
	}
	ServerDescriptor::parse_url(arg).ok_or_else(|| anyhow!("unknown server {arg}"))
}

/// Looks `path` up in its parent directory listing.
async fn find_entry(
	server: &ServerDescriptor,
	client: &Arc<dyn RemoteFs>,
	path: &str,
) -> Result<DirectoryEntry> {
	let path = paths::rooted(path);
	let session = NavigationSession::at_path(server.clone(), client.clone(), &paths::parent(&path));
	session.refresh().await?;
	let snap = session.snapshot();
	if let LoadState::Failed(err) = snap.state {
		bail!("failed to list {}: {err}", snap.current_path);
	}
	snap.entries
		.into_iter()
		.find(|entry| entry.absolute_path == path)
		.ok_or_else(|| anyhow!("{path} not found"))
}

fn print_entry(entry: &DirectoryEntry) {
	let name = if entry.is_directory() {
		format!("{}/", entry.name)
	} else {
		entry.name.clone()
	};
	let size = if entry.is_directory() {
		"-".to_string()
	} else {
		format_size(entry.size_bytes)
	};
	println!("{:>10}  {}  {}", size, format_time(entry.modified_at), name);
}

fn format_size(bytes: i64) -> String {
	const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
	if bytes <= 0 {
		return "0 B".to_string();
	}
	let mut size = bytes as f64;
	let mut unit = 0;
	while size >= 1024.0 && unit < UNITS.len() - 1 {
		size /= 1024.0;
		unit += 1;
	}
	if unit == 0 {
		format!("{bytes} B")
	} else {
		format!("{:.1} {}", size, UNITS[unit])
	}
}

fn format_time(time: DateTime<Utc>) -> String {
	time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
