//! `typhon run` command

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use typhon_core::plugins::Event;
use typhon_core::{CacheStore, PluginManager, PluginRegistry, Runner, RunnerOptions, VendorStore};

/// Run a packaged `.typh` archive.
pub async fn run(file: &Path, project_dir: &Path, performance: bool) -> Result<()> {
    let mut plugins = PluginManager::new();
    plugins
        .register_plugins(project_dir, &PluginRegistry::new())
        .context("Failed to register plugins")?;

    let event = Event::Run { file: file.to_path_buf(), performance };
    if plugins.process_event(&event)? {
        println!("{}", "Run cancelled by plugin".yellow());
        return Ok(());
    }

    let cache = CacheStore::open();
    let vendor = VendorStore::open();
    let mut runner = Runner::new(&cache, vendor, RunnerOptions::default());

    let report = runner.run(file).await?;

    println!();
    println!("{} {} finished", "✓".green().bold(), report.manifest.name.bold());

    if performance {
        println!(
            "  prepare (extract + install): {}",
            super::format_duration(report.prepare_duration.as_secs_f64()).yellow()
        );
        println!(
            "  execute:                     {}",
            super::format_duration(report.exec_duration.as_secs_f64()).yellow()
        );
    }

    Ok(())
}
