// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod mirror;
pub mod store;
pub mod sync;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::config::{default_config_path, load_from_path, load_or_default};
use crate::fs::RealFileSystem;
use crate::mirror::SkillMirror;
use crate::store::NacosClient;
use crate::sync::{discover_skills, SkillSyncer};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - store client and login
/// - skill discovery (`--all`)
/// - local mirror
/// - seeding and the long-poll watch loop
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    let client = Arc::new(NacosClient::new(cfg.server_settings())?);
    if let Err(e) = client.session().login().await {
        warn!(error = %e, "login failed; continuing anonymously");
    }

    let names = if args.all {
        let found = discover_skills(&client).await?;
        if found.is_empty() {
            info!("no skills found");
            return Ok(());
        }
        info!(count = found.len(), "discovered skills");
        found
    } else {
        args.skills.clone()
    };

    let output_dir = cfg.output_dir();
    info!(
        server = %cfg.server_addr(),
        namespace = %client.namespace(),
        output_dir = %output_dir.display(),
        "starting skill sync"
    );

    let mirror = SkillMirror::new(
        Arc::clone(&client),
        RealFileSystem,
        output_dir,
        client.namespace(),
    )
    .with_retry(cfg.retry_policy());

    let syncer = SkillSyncer::new(
        Arc::clone(&client),
        Arc::new(mirror),
        client.namespace(),
    );

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone())?;

    let transport = client.listener(cfg.long_poll_timeout(), cfg.request_timeout());
    syncer
        .run(&names, transport, cfg.watch_options(), cancel)
        .await?;

    info!("stopped");
    Ok(())
}

/// Cancel `cancel` on SIGINT, or on SIGTERM where the platform has it.
///
/// Handlers are registered before this returns, so a signal that arrives
/// right afterwards is not lost.
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT; shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM; shutting down"),
            }
            cancel.cancel();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("received Ctrl+C; shutting down");
            cancel.cancel();
        }))
    }
}

/// Load the config file (explicit path or optional default), apply CLI
/// overrides, then validate.
pub fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None => load_or_default(default_config_path())?,
    };
    args.apply_overrides(&mut raw);
    Ok(ConfigFile::try_from(raw)?)
}
