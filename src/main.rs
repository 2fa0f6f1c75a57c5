//! WolfRepl - Replication Session Manager
//!
//! Command line front end: inspect replication sessions, request state or
//! role changes, or serve the same operations over HTTP.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wolfrepl::api::HttpServer;
use wolfrepl::config::{LoggingConfig, WolfReplConfig};
use wolfrepl::control::HttpControlPlane;
use wolfrepl::manager::{SessionManager, SessionRequest};
use wolfrepl::session::{MetroPreference, ResourceKind, ResourceRef, SessionTarget, TargetState};

/// WolfRepl - Replication Session Manager
#[derive(Parser)]
#[command(name = "wolfrepl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfrepl.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfrepl.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show a replication session
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Move a session to a state and/or change its Metro preference
    Modify {
        #[command(flatten)]
        target: TargetArgs,

        /// Requested state (synchronizing, paused, failed_over)
        #[arg(long)]
        state: Option<TargetState>,

        /// Requested Metro role (Metro_Preferred, Metro_Non_Preferred)
        #[arg(long)]
        role: Option<MetroPreference>,
    },

    /// Serve the HTTP API
    Serve,
}

/// Which session to operate on
#[derive(Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["session_id", "volume", "volume_group", "filesystem", "nas_server"])
))]
struct TargetArgs {
    /// Replication session id
    #[arg(long)]
    session_id: Option<String>,

    /// Volume name or id
    #[arg(long)]
    volume: Option<String>,

    /// Volume group name or id
    #[arg(long)]
    volume_group: Option<String>,

    /// File system name or id
    #[arg(long)]
    filesystem: Option<String>,

    /// NAS server name or id; with --filesystem, the NAS server owning it
    #[arg(long)]
    nas_server: Option<String>,

    /// Remote system id, when the resource replicates to several systems
    #[arg(long)]
    remote_system: Option<String>,
}

impl TargetArgs {
    fn target(&self) -> anyhow::Result<SessionTarget> {
        let selected = [
            self.session_id.is_some(),
            self.volume.is_some(),
            self.volume_group.is_some(),
            self.filesystem.is_some(),
            self.nas_server.is_some(),
        ]
        .iter()
        .filter(|s| **s)
        .count();
        let scoped_filesystem = self.filesystem.is_some() && self.nas_server.is_some();
        if selected > 1 && !(selected == 2 && scoped_filesystem) {
            bail!("pass exactly one of --session-id, --volume, --volume-group, --filesystem or --nas-server (--nas-server may scope --filesystem)");
        }

        let resource = |kind, handle: &String| {
            SessionTarget::Resource(ResourceRef::new(kind, handle.clone()))
        };

        let target = if let Some(id) = &self.session_id {
            SessionTarget::SessionId(id.clone())
        } else if let Some(v) = &self.volume {
            resource(ResourceKind::Volume, v)
        } else if let Some(vg) = &self.volume_group {
            resource(ResourceKind::VolumeGroup, vg)
        } else if let Some(fs) = &self.filesystem {
            let mut fs_ref = ResourceRef::new(ResourceKind::FileSystem, fs.clone());
            fs_ref.nas_server = self.nas_server.clone();
            SessionTarget::Resource(fs_ref)
        } else if let Some(nas) = &self.nas_server {
            resource(ResourceKind::NasServer, nas)
        } else {
            bail!("one of --session-id, --volume, --volume-group, --filesystem or --nas-server is required");
        };

        Ok(target)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { output, force } = &cli.command {
        init_logging(&LoggingConfig::default(), cli.log_level.as_deref())?;
        return run_init(output, *force);
    }

    let config = WolfReplConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    init_logging(&config.logging, cli.log_level.as_deref())?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Validate => run_validate(&config),
        Commands::Show { target } => run_show(&config, &target).await,
        Commands::Modify { target, state, role } => run_modify(&config, &target, state, role).await,
        Commands::Serve => run_serve(&config).await,
    }
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let level = level_override.unwrap_or(&logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    let json = logging.format.eq_ignore_ascii_case("json");
    let registry = tracing_subscriber::registry().with(env_filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let writer = std::sync::Mutex::new(file);
            if json {
                registry.with(fmt::layer().json().with_writer(writer)).init();
            } else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        }
        None if json => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        None => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

fn manager(config: &WolfReplConfig) -> anyhow::Result<SessionManager> {
    let control = HttpControlPlane::new(&config.array)?;
    Ok(SessionManager::new(Arc::new(control)))
}

/// Write a sample configuration file
fn run_init(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    std::fs::write(output, WolfReplConfig::sample())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Configuration written to {}", output.display());
    Ok(())
}

fn run_validate(config: &WolfReplConfig) -> anyhow::Result<()> {
    println!("Configuration is valid");
    println!("  Array:    {}", config.array.endpoint);
    println!("  User:     {}", config.array.user);
    println!("  TLS:      {}", if config.array.verify_tls { "verified" } else { "not verified" });
    println!(
        "  API:      {}",
        if config.api.enabled { config.api.bind_address.as_str() } else { "disabled" }
    );
    Ok(())
}

async fn run_show(config: &WolfReplConfig, target: &TargetArgs) -> anyhow::Result<()> {
    let session = manager(config)?
        .show(&target.target()?, target.remote_system.as_deref())
        .await?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

async fn run_modify(
    config: &WolfReplConfig,
    target: &TargetArgs,
    state: Option<TargetState>,
    role: Option<MetroPreference>,
) -> anyhow::Result<()> {
    if state.is_none() && role.is_none() {
        bail!("nothing to do: pass --state and/or --role");
    }

    let request = SessionRequest {
        target: target.target()?,
        remote_system: target.remote_system.clone(),
        state,
        role,
    };

    let outcome = manager(config)?.apply(&request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_serve(config: &WolfReplConfig) -> anyhow::Result<()> {
    if !config.api.enabled {
        tracing::warn!("api.enabled is false in the configuration, nothing to serve");
        return Ok(());
    }

    tracing::info!("Serving replication sessions of {}", config.array.endpoint);
    HttpServer::new(config.api.clone(), manager(config)?)
        .start()
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_of(args: &[&str]) -> anyhow::Result<SessionTarget> {
        let mut argv = vec!["wolfrepl", "show"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv)?.command {
            Commands::Show { target } => target.target(),
            _ => bail!("expected show"),
        }
    }

    #[test]
    fn test_nas_server_scopes_filesystem() {
        match target_of(&["--filesystem", "home", "--nas-server", "nas01"]).unwrap() {
            SessionTarget::Resource(r) => {
                assert_eq!(r.kind, ResourceKind::FileSystem);
                assert_eq!(r.name_or_id, "home");
                assert_eq!(r.nas_server.as_deref(), Some("nas01"));
            }
            other => panic!("unexpected target: {:?}", other),
        }
    }

    #[test]
    fn test_nas_server_alone_targets_nas_server() {
        match target_of(&["--nas-server", "nas01"]).unwrap() {
            SessionTarget::Resource(r) => {
                assert_eq!(r.kind, ResourceKind::NasServer);
                assert!(r.nas_server.is_none());
            }
            other => panic!("unexpected target: {:?}", other),
        }
    }

    #[test]
    fn test_conflicting_selectors_rejected() {
        assert!(target_of(&["--volume", "db01", "--session-id", "rs-1"]).is_err());
        assert!(target_of(&["--volume", "db01", "--nas-server", "nas01"]).is_err());
        assert!(target_of(&[]).is_err());
    }
}
