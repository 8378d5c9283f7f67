//! Build command implementation for the Typhon CLI.
//!
//! Packages a project into a `.typh` archive after giving registered
//! plugins a chance to cancel.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use typhon_core::plugins::Event;
use typhon_core::{CacheStore, PackageOptions, Packager, PluginManager, PluginRegistry, ProjectConfig};

/// Builds a `.typh` archive from the project at `project_dir`.
pub async fn build(
    project_dir: &Path,
    dist: Option<PathBuf>,
    ignore: Vec<String>,
    include_tests: bool,
) -> Result<()> {
    let start_time = Instant::now();

    let config = ProjectConfig::load(project_dir)
        .with_context(|| format!("Failed to load project at {}", project_dir.display()))?;

    println!(
        "{} Packaging {} {}",
        "[1/3]".bold().blue(),
        config.buildinfo.name.green(),
        config.buildinfo.version.cyan()
    );

    let mut options = PackageOptions {
        exclude_tests: !include_tests,
        ignore: ignore.into_iter().collect(),
        ..Default::default()
    };
    if let Some(dist) = dist {
        options.dist_directory = dist;
    }

    let cache = CacheStore::open();
    let packager = Packager::new(&cache, project_dir.to_path_buf(), options);

    println!("{} Notifying plugins", "[2/3]".bold().blue());
    let mut plugins = PluginManager::new();
    plugins
        .register_plugins(project_dir, &PluginRegistry::new())
        .context("Failed to register plugins")?;

    let event = Event::Build {
        project: config.buildinfo.name.clone(),
        version: config.buildinfo.version.clone(),
        archive: packager.archive_path(&config),
    };
    if plugins.process_event(&event)? {
        println!("{}", "Build cancelled by plugin".yellow());
        return Ok(());
    }

    println!("{} Writing archive", "[3/3]".bold().blue());
    let output = packager.package(&config)?;

    let duration = super::format_duration(start_time.elapsed().as_secs_f64());
    let size_kb = output.total_bytes as f64 / 1024.0;

    println!();
    println!("{}", "Build completed successfully!".green().bold());
    println!();
    println!("  Archive:   {}", output.archive_path.display().to_string().yellow());
    println!("  Files:     {}", output.file_count);
    println!("  Size:      {:.1} KB", size_kb);
    println!("  Duration:  {}", duration.yellow());

    Ok(())
}
