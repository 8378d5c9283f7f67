//! `typhon plugin` commands

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use typhon_core::plugins::{self, PluginManager, PluginRegistry};

/// Test every plugin the project declares.
///
/// Each plugin is constructed, loaded, and sent a synthetic `test` event;
/// failures are reported, never propagated mid-run, so one broken plugin
/// cannot hide the results of the others.
pub fn test(project_dir: &Path) -> Result<()> {
    let registry = PluginRegistry::new();
    let ids = plugins::declared_plugins(project_dir)?;

    if ids.is_empty() {
        println!("No plugins declared in {}", project_dir.display());
        return Ok(());
    }

    let mut failures = 0usize;
    for id in &ids {
        let Some(mut plugin) = registry.construct(id) else {
            println!("{} {} (unknown plugin identifier)", "✗".red().bold(), id);
            failures += 1;
            continue;
        };

        let report = PluginManager::test_plugin(plugin.as_mut());
        if report.passed {
            println!("{} {}", "✓".green().bold(), report.plugin);
        } else {
            println!(
                "{} {}: {}",
                "✗".red().bold(),
                report.plugin,
                report.error.unwrap_or_else(|| "unknown error".to_string())
            );
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} plugin(s) failed", failures, ids.len());
    }

    println!();
    println!("{}", "All plugins passed".green().bold());
    Ok(())
}
