//! Archive execution for Typhon.
//!
//! The runner turns a `.typh` archive back into a running process: read the
//! manifest, extract into the package's cache directory while installing the
//! declared dependencies into the shared vendor directory, then execute the
//! entry file with the vendor modules on the child's resolution path.

use crate::cache::CacheStore;
use crate::error::{Result, TyphonError};
use crate::manifest::{self, PackageManifest, PackageManager, ARCHIVE_EXTENSION, MANIFEST_ENTRY_NAME};
use crate::vendor::VendorStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, instrument};
use zip::result::ZipError;
use zip::ZipArchive;

/// Environment variable pointing the executed program at the vendor modules.
pub const MODULE_PATH_ENV: &str = "NODE_PATH";

/// Options for running an archive.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Runtime binary used to execute the entry file.
    pub runtime: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { runtime: "node".to_string() }
    }
}

/// Report of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub manifest: PackageManifest,
    pub cache_dir: PathBuf,
    /// Concurrent extract + install phase.
    pub prepare_duration: Duration,
    /// Entry-file execution phase.
    pub exec_duration: Duration,
}

/// Executes `.typh` archives.
pub struct Runner<'a> {
    cache: &'a CacheStore,
    vendor: VendorStore,
    options: RunnerOptions,
}

impl<'a> Runner<'a> {
    pub fn new(cache: &'a CacheStore, vendor: VendorStore, options: RunnerOptions) -> Self {
        Self { cache, vendor, options }
    }

    /// Run an archive end to end.
    ///
    /// Extraction and dependency installation run concurrently; both must
    /// succeed before execution. A failed run leaves the cache directory in
    /// whatever state it reached; the next run re-extracts over it.
    #[instrument(skip(self), fields(archive = %archive.display()))]
    pub async fn run(&mut self, archive: &Path) -> Result<RunReport> {
        let manifest = self.read_manifest(archive)?;

        let cache_dir =
            self.cache.ensure_cache_directory(&format!("{}-cached", manifest.name))?;

        info!(name = %manifest.name, version = %manifest.version, "preparing package");

        let prepare_start = Instant::now();
        tokio::try_join!(
            Self::extract_archive(archive.to_path_buf(), cache_dir.clone()),
            self.install_dependencies(&manifest),
        )?;
        let prepare_duration = prepare_start.elapsed();

        let main_file = cache_dir.join(&manifest.main);
        if !main_file.is_file() {
            return Err(TyphonError::InvalidConfig {
                reason: format!(
                    "Entry file {} not found in package {}",
                    manifest.main, manifest.name
                ),
            });
        }

        let exec_start = Instant::now();
        self.execute(&main_file).await?;
        let exec_duration = exec_start.elapsed();

        info!(
            name = %manifest.name,
            prepare_ms = prepare_duration.as_millis() as u64,
            exec_ms = exec_duration.as_millis() as u64,
            "run complete"
        );

        Ok(RunReport { manifest, cache_dir, prepare_duration, exec_duration })
    }

    /// Read the manifest entry from an archive.
    ///
    /// The archive path must carry the `.typh` extension; this is checked
    /// before the file is opened. A missing manifest entry is a
    /// configuration error, not an archive error.
    pub fn read_manifest(&self, archive: &Path) -> Result<PackageManifest> {
        if archive.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXTENSION) {
            return Err(TyphonError::InvalidConfig {
                reason: format!(
                    "{} is not a .{} package",
                    archive.display(),
                    ARCHIVE_EXTENSION
                ),
            });
        }

        let file = fs::File::open(archive).map_err(|e| TyphonError::io(archive, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| TyphonError::Archive {
            reason: format!("Failed to open {}: {}", archive.display(), e),
        })?;

        let entry = match zip.by_name(MANIFEST_ENTRY_NAME) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(TyphonError::InvalidConfig {
                    reason: format!(
                        "{} has no {} entry",
                        archive.display(),
                        MANIFEST_ENTRY_NAME
                    ),
                });
            }
            Err(e) => {
                return Err(TyphonError::Archive {
                    reason: format!("Failed to read {}: {}", archive.display(), e),
                });
            }
        };

        PackageManifest::from_reader(entry)
    }

    /// Extract every archive entry into the cache directory, overwriting any
    /// existing contents.
    async fn extract_archive(archive: PathBuf, dest: PathBuf) -> Result<()> {
        tokio::task::spawn_blocking(move || -> Result<()> {
            debug!(archive = %archive.display(), dest = %dest.display(), "extracting");

            let file = fs::File::open(&archive).map_err(|e| TyphonError::io(&archive, e))?;
            let mut zip = ZipArchive::new(file).map_err(|e| TyphonError::ExtractionFailed {
                archive: archive.clone(),
                reason: e.to_string(),
            })?;
            zip.extract(&dest).map_err(|e| TyphonError::ExtractionFailed {
                archive: archive.clone(),
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| TyphonError::Other(anyhow::anyhow!("Extraction task failed: {}", e)))?
    }

    /// Install the manifest's dependencies into the shared vendor directory
    /// using the manifest's package manager.
    async fn install_dependencies(&mut self, manifest: &PackageManifest) -> Result<()> {
        self.vendor.ensure()?;

        if manifest.deps.is_empty() {
            debug!(name = %manifest.name, "no dependencies declared");
            return Ok(());
        }

        self.vendor.record_dependencies(&manifest.deps)?;

        let (program, args) = install_command(manifest.pm, self.vendor.dir(), &manifest.deps);
        debug!(pm = %manifest.pm, ?args, "installing dependencies");

        let output = Command::new(&program).args(&args).output().await.map_err(|e| {
            TyphonError::InstallFailed {
                pm: manifest.pm.to_string(),
                reason: format!("Failed to spawn {}: {}", program, e),
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TyphonError::InstallFailed {
                pm: manifest.pm.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        info!(pm = %manifest.pm, count = manifest.deps.len(), "dependencies installed");
        Ok(())
    }

    /// Execute the extracted entry file with the vendor modules visible.
    async fn execute(&self, main_file: &Path) -> Result<()> {
        debug!(runtime = %self.options.runtime, file = %main_file.display(), "executing");

        let status = Command::new(&self.options.runtime)
            .arg(main_file)
            .env(MODULE_PATH_ENV, self.vendor.node_modules_path())
            .status()
            .await
            .map_err(|e| TyphonError::io(main_file, e))?;

        if !status.success() {
            return Err(TyphonError::ExecutionFailed {
                file: main_file.to_path_buf(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// The install command for a package manager, vendor directory and
/// dependency set.
///
/// A pure mapping: npm and pnpm install with `--prefix`, yarn with
/// `--modules-folder`. Version ranges are normalized to bare
/// `name@version` specifiers.
pub fn install_command(
    pm: PackageManager,
    vendor_dir: &Path,
    deps: &BTreeMap<String, String>,
) -> (String, Vec<String>) {
    let specs = deps.iter().map(|(name, range)| manifest::install_spec(name, range));

    let (program, mut args) = match pm {
        PackageManager::Npm | PackageManager::Pnpm => (
            pm.as_str(),
            vec!["install".to_string(), "--prefix".to_string(), vendor_dir.display().to_string()],
        ),
        PackageManager::Yarn => (
            pm.as_str(),
            vec![
                "add".to_string(),
                "--modules-folder".to_string(),
                vendor_dir.join("node_modules").display().to_string(),
            ],
        ),
    };

    args.extend(specs);
    (program.to_string(), args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_install_command_npm() {
        let (program, args) =
            install_command(PackageManager::Npm, Path::new("/vendor"), &deps(&[]));
        assert_eq!(program, "npm");
        assert_eq!(args, vec!["install", "--prefix", "/vendor"]);
    }

    #[test]
    fn test_install_command_pnpm() {
        let (program, args) =
            install_command(PackageManager::Pnpm, Path::new("/vendor"), &deps(&[]));
        assert_eq!(program, "pnpm");
        assert_eq!(args, vec!["install", "--prefix", "/vendor"]);
    }

    #[test]
    fn test_install_command_yarn() {
        let (program, args) =
            install_command(PackageManager::Yarn, Path::new("/vendor"), &deps(&[]));
        assert_eq!(program, "yarn");
        assert_eq!(args, vec!["add", "--modules-folder", "/vendor/node_modules"]);
    }

    #[test]
    fn test_install_command_strips_range_operators() {
        let (_, args) = install_command(
            PackageManager::Npm,
            Path::new("/vendor"),
            &deps(&[("left-pad", "^1.3.0"), ("lodash", "~4.17.21")]),
        );

        assert!(args.contains(&"left-pad@1.3.0".to_string()));
        assert!(args.contains(&"lodash@4.17.21".to_string()));
        assert!(!args.iter().any(|a| a.contains('^') || a.contains('~')));
    }
}
