//! # Foglink CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Register instances
//! foglink add 127.0.0.1:8081 --name bench
//! foglink add http://192.168.0.208:8081 --validate
//!
//! # Discover, as seen from a browser-hosted add-in
//! foglink --platform OfficeOnline discover
//!
//! # Fetch statistics from the best reachable instance (outputs raw JSON)
//! foglink get /foglamp/statistics | jq '.[0]'
//! ```

use anyhow::Result;
use argh::FromArgs;
use foglink_cli::commands;
use foglink_cli::settings::{Overrides, Settings};
use foglink_discovery::HostSignals;

#[derive(FromArgs)]
/// foglink - FogLAMP connectivity discovery
struct Cli {
    /// directory holding the instance registry
    ///
    /// Falls back to FOGLINK_STATE_DIR, then to the platform config
    /// directory.
    #[argh(option, long = "state-dir")]
    state_dir: Option<String>,

    /// base URL of the local relay
    ///
    /// Falls back to FOGLINK_RELAY_URL, then to http://127.0.0.1:3001.
    #[argh(option, long = "relay")]
    relay: Option<String>,

    /// timeout for instance probes in milliseconds (default 3000)
    #[argh(option, long = "probe-timeout")]
    probe_timeout_ms: Option<u64>,

    /// timeout for relay requests in milliseconds (default 2000)
    #[argh(option, long = "proxy-timeout")]
    proxy_timeout_ms: Option<u64>,

    /// host platform identifier, e.g. PC or OfficeOnline
    #[argh(option)]
    platform: Option<String>,

    /// network origin of the hosting page
    #[argh(option)]
    origin: Option<String>,

    /// the page is rendered inside a third-party frame
    #[argh(switch)]
    framed: bool,

    /// the page is loaded over a secure transport
    #[argh(switch)]
    secure: bool,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Add(AddArgs),
    Remove(RemoveArgs),
    List(ListArgs),
    Use(UseArgs),
    Rename(RenameArgs),
    Probe(ProbeArgs),
    Discover(DiscoverArgs),
    Status(StatusArgs),
    ProxyConfig(ProxyConfigArgs),
    Get(GetArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "add")]
/// register a FogLAMP instance
struct AddArgs {
    /// instance URL; http:// is assumed when no scheme is given
    #[argh(positional)]
    url: String,

    /// display name
    #[argh(option, short = 'n')]
    name: Option<String>,

    /// probe the instance first and refuse to register it if unreachable
    #[argh(switch)]
    validate: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "remove")]
/// unregister an instance
struct RemoveArgs {
    /// instance URL
    #[argh(positional)]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
/// list registered instances and their last status
struct ListArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "use")]
/// mark an instance as active
struct UseArgs {
    /// instance URL
    #[argh(positional)]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "rename")]
/// set an instance's display name (empty clears it)
struct RenameArgs {
    /// instance URL
    #[argh(positional)]
    url: String,

    /// new display name
    #[argh(positional)]
    name: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "probe")]
/// probe one instance and reconcile its status
struct ProbeArgs {
    /// instance URL
    #[argh(positional)]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "discover")]
/// probe all instances and print the ranked reachable endpoints
struct DiscoverArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
/// summarize reachability and suggest a remedy
struct StatusArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "proxy-config")]
/// print the relay mapping for the registered instances
struct ProxyConfigArgs {
    /// push the mapping to the relay and print what it acknowledged
    #[argh(switch)]
    push: bool,
}

// Output is the raw response body with no logging, so it can be piped.
#[derive(FromArgs)]
#[argh(subcommand, name = "get")]
/// fetch a path from the best reachable instance
struct GetArgs {
    /// request path, e.g. /foglamp/statistics
    #[argh(positional)]
    path: String,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            state_dir: self.state_dir.clone(),
            relay_url: self.relay.clone(),
            probe_timeout_ms: self.probe_timeout_ms,
            proxy_timeout_ms: self.proxy_timeout_ms,
            host: HostSignals {
                platform: self.platform.clone(),
                origin: self.origin.clone(),
                framed: self.framed,
                secure: self.secure,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // keep stdout clean for piping
    if !matches!(cli.command, Commands::Get(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let settings = Settings::resolve(cli.overrides(), |key| std::env::var(key).ok())?;
    tracing::debug!("Using state directory {}", settings.state_dir.display());
    let session = settings.session();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Add(args) => commands::add(&session, &args.url, args.name, args.validate, &mut out).await,
        Commands::Remove(args) => commands::remove(&session, &args.url, &mut out).await,
        Commands::List(_) => commands::list(&session, &mut out).await,
        Commands::Use(args) => commands::use_instance(&session, &args.url, &mut out).await,
        Commands::Rename(args) => commands::rename(&session, &args.url, &args.name, &mut out).await,
        Commands::Probe(args) => commands::probe(&session, &args.url, &mut out).await,
        Commands::Discover(_) => commands::discover(&session, &mut out).await,
        Commands::Status(_) => commands::status(&session, &mut out).await,
        Commands::ProxyConfig(args) => commands::proxy_config(&session, args.push, &mut out).await,
        Commands::Get(args) => commands::get(&session, &args.path, &mut out).await,
    }
}
