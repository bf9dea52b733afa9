pub mod cli;
pub mod commands;
pub mod config;
pub mod course;
pub mod datastore;
pub mod datetime;
pub mod render;
pub mod schedule;
pub mod task;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting kursplan CLI");

    let site_dir = cli.site.clone().unwrap_or_else(|| PathBuf::from("."));
    let cfg = config::Config::load(&site_dir, cli.config.as_deref())
        .context("failed to load configuration")?;
    debug!(?cfg, "effective configuration");

    // The reference instant for the whole invocation is captured exactly
    // once; every command sees the same "now".
    let now = Utc::now();

    let data = datastore::SiteData::load(&site_dir).with_context(|| {
        format!("failed to load site data from {}", site_dir.display())
    })?;

    let mut renderer = render::Renderer::new(&cfg);
    let command = cli.command.unwrap_or_default();

    commands::dispatch(&data, &cfg, &mut renderer, command, now)?;

    info!("done");
    Ok(())
}
