use clap::Parser;
#[derive(Debug, Parser)]
#[clap(name = "browsey", about = "Browse file servers on the local network")]
pub struct Args {
	/// Log debug output
	#[clap(long, short)]
	pub verbose: bool,
	#[clap(subcommand)]
	pub command: Command,
}

#[derive(Debug, Parser)]
pub enum Command {
	/// Search the local network for servers
	Discover {
		#[clap(long, default_value_t = 5)]
		seconds: u64,
		/// Save every server found
		#[clap(long)]
		save: bool,
	},
	/// List saved servers
	Servers,
	/// Save a server from a URL or host:port
	Add {
		url: String,
		#[clap(long)]
		name: Option<String>,
	},
	/// Remove a saved server by id
	Remove {
		id: String,
	},
	/// Probe saved servers and report which are online
	Check {
		/// Also probe servers found on the local network
		#[clap(long)]
		discover: bool,
		#[clap(long, default_value_t = 3)]
		seconds: u64,
	},
	/// List a directory
	Ls {
		server: String,
		#[clap(default_value = "/")]
		path: String,
	},
	/// Print a file as rendered by the server
	View {
		server: String,
		path: String,
	},
	/// Print file metadata
	Stat {
		server: String,
		path: String,
	},
	/// Download a file
	Get {
		server: String,
		path: String,
		#[clap(long, short, value_name = "DIR", default_value = ".")]
		out: String,
	},
	/// Print the direct download URL of a file
	Url {
		server: String,
		path: String,
	},
}
