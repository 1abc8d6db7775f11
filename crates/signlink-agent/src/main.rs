//! # signlink-agent
//!
//! Client binary: loads settings, connects to the coordinator, and keeps the
//! session alive until ctrl-c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use signlink_client::{ClientConfig, Session, Supervisor, policy_for};
use signlink_core::logging::{LogFormat, init_subscriber};
use signlink_core::{Dispatcher, PlaceholderSigner, SchemaProfile};
use signlink_settings::{SignlinkSettings, load_settings_from_path, settings_path, validate};
use tokio_util::sync::CancellationToken;

/// signlink coordinator client.
#[derive(Parser, Debug)]
#[command(name = "signlink-agent", about = "signlink coordinator client")]
struct Cli {
    /// Settings file (defaults to `~/.signlink/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Coordinator WebSocket URL.
    #[arg(long)]
    url: Option<String>,

    /// Client id sent as `cliId` and used as reply `sourceId`.
    #[arg(long)]
    client_id: Option<String>,

    /// Client type sent as `type`.
    #[arg(long)]
    client_type: Option<String>,

    /// Signing schema profile (`partialSig`, `signing`, `signingNotice`).
    #[arg(long)]
    profile: Option<SchemaProfile>,

    /// Log filter directive (`RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Overlay flags onto loaded settings.
    fn apply(&self, settings: &mut SignlinkSettings) {
        if let Some(ref url) = self.url {
            settings.endpoint.url.clone_from(url);
        }
        if let Some(ref client_id) = self.client_id {
            settings.endpoint.client_id.clone_from(client_id);
        }
        if let Some(ref client_type) = self.client_type {
            settings.endpoint.client_type.clone_from(client_type);
        }
        if let Some(profile) = self.profile {
            settings.schema.profile = profile;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

fn load(cli: &Cli, path: &Path) -> Result<SignlinkSettings> {
    let mut settings = load_settings_from_path(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    validate(&settings).context("Invalid settings after command-line overrides")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let settings = load(&cli, &path)?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let config = ClientConfig::from_settings(&settings).context("Invalid client configuration")?;
    tracing::info!(
        url = %config.url,
        client_id = %config.client_id,
        profile = %settings.schema.profile,
        insecure_tls = config.tls.is_insecure(),
        "starting signlink agent"
    );

    let dispatcher = Dispatcher::new(
        config.client_id.clone(),
        settings.schema.profile,
        Arc::new(PlaceholderSigner),
    );
    let policy = policy_for(config.reconnect);
    let session = Session::new(Arc::new(config), Arc::new(dispatcher));

    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(Supervisor::new(session, policy).run(cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    cancel.cancel();
    supervisor.await.context("Supervisor task failed")?;

    tracing::info!("signlink agent stopped");
    Ok(())
}
