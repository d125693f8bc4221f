pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod focus;
pub mod gateway;
pub mod interchange;
pub mod notify;
pub mod recurrence;
pub mod remote;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::Backend;
use crate::gateway::PersistenceGateway;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);
    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting miyabi CLI"
    );

    let cfg = config::Config::load(cli.config.as_deref())?;
    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let gateway = open_gateway(&cfg, &data_dir)?;

    let focus_path = data_dir.join(commands::FOCUS_FILE);
    let focus = focus::FocusTracker::load(&focus_path).unwrap_or_else(|err| {
        warn!(error = %err, "could not restore focus session; starting fresh");
        focus::FocusTracker::default()
    });

    let mut store = store::TaskStore::open(gateway, focus).with_context(|| {
        format!("failed to open task store at {}", data_dir.display())
    })?;
    let mut renderer = render::Renderer::new(cfg.color);

    commands::dispatch(&mut store, &cfg, &data_dir, &mut renderer, cli.command)?;

    info!("done");
    Ok(())
}

/// Pick the persistence gateway from config. A remote backend needs an
/// embedder-supplied document store; the CLI has none, so remote selection
/// warns and falls back to local storage rather than failing.
fn open_gateway(
    cfg: &config::Config,
    data_dir: &std::path::Path,
) -> anyhow::Result<Box<dyn PersistenceGateway>> {
    if cfg.storage.backend == Backend::Remote {
        warn!("remote backend configured but no document store is wired in; using local storage");
    }

    let local = datastore::LocalStore::open(data_dir)
        .with_context(|| format!("failed to open local store at {}", data_dir.display()))?;
    Ok(Box::new(local))
}
