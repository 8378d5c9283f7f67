//! Archive packaging for Typhon projects.
//!
//! The packager walks a project's code and resource roots, applies the
//! ignore/test filters, and writes a single `.typh` archive containing every
//! surviving file at its root-relative path plus the package manifest under
//! its fixed entry name.

use crate::cache::CacheStore;
use crate::error::{Result, TyphonError};
use crate::manifest::{self, PackageManifest, PackageManager, MANIFEST_ENTRY_NAME};
use crate::project::ProjectConfig;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Code root relative to the project directory.
pub const CODE_ROOT: &str = "src/main/javascript";

/// Resource root relative to the project directory.
pub const RESOURCE_ROOT: &str = "src/main/resources";

/// Options for packaging a project.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Output directory for the archive, relative to the project root.
    pub dist_directory: PathBuf,

    /// Archive file name (default: `<name>.typh`).
    pub packaging_name: Option<String>,

    /// Exclude files under `test`/`tests` directories.
    pub exclude_tests: bool,

    /// Path fragments to exclude; matched against the normalized
    /// root-relative path of each file.
    pub ignore: BTreeSet<String>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            dist_directory: PathBuf::from("target"),
            packaging_name: None,
            exclude_tests: true,
            ignore: BTreeSet::new(),
        }
    }
}

/// Result of a successful packaging run.
#[derive(Debug)]
pub struct PackageOutput {
    /// Where the archive was written.
    pub archive_path: PathBuf,

    /// The manifest embedded in the archive.
    pub manifest: PackageManifest,

    /// Number of payload files (manifest entry not counted).
    pub file_count: usize,

    /// Total payload bytes before compression.
    pub total_bytes: u64,

    /// Per-file sizes, in enumeration order (entry name, bytes).
    pub files: Vec<(String, u64)>,
}

/// Produces a deterministic, filterable archive from a project tree.
pub struct Packager<'a> {
    cache: &'a CacheStore,
    project_dir: PathBuf,
    options: PackageOptions,
}

impl<'a> Packager<'a> {
    pub fn new(cache: &'a CacheStore, project_dir: PathBuf, options: PackageOptions) -> Self {
        Self { cache, project_dir, options }
    }

    /// Where `package` will write the archive for this configuration.
    pub fn archive_path(&self, config: &ProjectConfig) -> PathBuf {
        let name = self
            .options
            .packaging_name
            .clone()
            .unwrap_or_else(|| format!("{}.typh", config.buildinfo.name));
        self.project_dir.join(&self.options.dist_directory).join(name)
    }

    /// Package the project into `<dist_directory>/<packaging_name>`.
    ///
    /// Plugin projects are refused: plugins are published through a package
    /// manager, not archived. Partial archives are not cleaned up on failure.
    pub fn package(&self, config: &ProjectConfig) -> Result<PackageOutput> {
        if config.buildinfo.plugin {
            return Err(TyphonError::InvalidConfig {
                reason: format!(
                    "{} is a plugin project; plugins are published through a package manager, not packaged",
                    config.buildinfo.name
                ),
            });
        }

        self.cache.ensure_root()?;

        let manifest = self.build_manifest(config)?;
        let files = self.collect_files()?;

        let archive_path = self.archive_path(config);
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TyphonError::io(parent, e))?;
        }

        info!(
            name = %manifest.name,
            files = files.len(),
            archive = %archive_path.display(),
            "packaging project"
        );

        let file = fs::File::create(&archive_path).map_err(|e| TyphonError::io(&archive_path, e))?;
        let mut writer = ZipWriter::new(file);
        let entry_options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut total_bytes = 0u64;
        let mut sizes = Vec::with_capacity(files.len());
        for (source, entry_name) in &files {
            let data = fs::read(source).map_err(|e| TyphonError::io(source, e))?;
            total_bytes += data.len() as u64;
            sizes.push((entry_name.clone(), data.len() as u64));

            writer.start_file(entry_name.as_str(), entry_options).map_err(|e| {
                TyphonError::Archive { reason: format!("Failed to add {}: {}", entry_name, e) }
            })?;
            writer.write_all(&data).map_err(|e| TyphonError::io(&archive_path, e))?;

            debug!(entry = %entry_name, bytes = data.len(), "added file");
        }

        let manifest_json = manifest.to_json()?;
        writer.start_file(MANIFEST_ENTRY_NAME, entry_options).map_err(|e| {
            TyphonError::Archive { reason: format!("Failed to add manifest entry: {}", e) }
        })?;
        writer
            .write_all(&manifest_json)
            .map_err(|e| TyphonError::io(&archive_path, e))?;

        writer.finish().map_err(|e| TyphonError::Archive {
            reason: format!("Failed to finish {}: {}", archive_path.display(), e),
        })?;

        info!(
            archive = %archive_path.display(),
            files = files.len(),
            bytes = total_bytes,
            "archive written"
        );

        Ok(PackageOutput {
            archive_path,
            manifest,
            file_count: files.len(),
            total_bytes,
            files: sizes,
        })
    }

    /// Build the manifest from the project configuration.
    ///
    /// A missing `packageManager` defaults to npm; an unsupported one is a
    /// configuration error.
    fn build_manifest(&self, config: &ProjectConfig) -> Result<PackageManifest> {
        let pm = match config.buildinfo.package_manager.as_deref() {
            None => PackageManager::Npm,
            Some(value) => PackageManager::parse(value).ok_or_else(|| {
                TyphonError::InvalidConfig {
                    reason: format!("Unsupported package manager: {}", value),
                }
            })?,
        };

        let main = manifest::main_file_path(&config.build.main);

        Ok(PackageManifest {
            name: config.buildinfo.name.clone(),
            version: config.buildinfo.version.clone(),
            main: main.to_string_lossy().into_owned(),
            pm,
            deps: config.dependencies.clone(),
        })
    }

    /// Enumerate all files under both source roots, filtered and paired with
    /// their archive entry names (root-relative, `/`-separated).
    fn collect_files(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut files = Vec::new();

        for root in [CODE_ROOT, RESOURCE_ROOT] {
            let root_dir = self.project_dir.join(root);
            if !root_dir.is_dir() {
                // Missing roots are treated as empty.
                continue;
            }

            for entry in WalkDir::new(&root_dir).sort_by_file_name() {
                let entry = entry
                    .map_err(|e| TyphonError::io(&root_dir, e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let Ok(relative) = entry.path().strip_prefix(&root_dir) else {
                    continue;
                };
                let entry_name = normalize(relative);

                if self.is_excluded(&entry_name) {
                    debug!(entry = %entry_name, "excluded");
                    continue;
                }

                files.push((entry.path().to_path_buf(), entry_name));
            }
        }

        Ok(files)
    }

    /// A file is excluded when its normalized path contains any configured
    /// ignore fragment or, with `exclude_tests`, a test-directory segment.
    fn is_excluded(&self, entry_name: &str) -> bool {
        if self.options.exclude_tests
            && entry_name.split('/').any(|segment| segment == "test" || segment == "tests")
        {
            return true;
        }

        self.options.ignore.iter().any(|fragment| entry_name.contains(fragment.as_str()))
    }
}

/// Normalize a relative path to the `/`-separated form used for archive
/// entries and filter matching.
fn normalize(path: &Path) -> String {
    path.iter().map(|c| c.to_string_lossy()).collect::<Vec<_>>().join("/")
}
