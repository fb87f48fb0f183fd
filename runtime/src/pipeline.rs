//! Package pipeline: pins every annotated reference under a directory.
//!
//! Files are visited in path order and resources one after another, so at
//! most one registry request is in flight. A failing resource is reported
//! and skipped; the rest of the package is still processed.

use std::path::{Path, PathBuf};

use imagepin_core::audit::AuditRecord;
use imagepin_core::config::PinConfig;
use imagepin_core::error::{PinError, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::document::{ResourceMeta, YamlFile};
use crate::oci::RegistryResolver;
use crate::pin::{
    is_candidate, should_skip, AnnotatedSite, CachingResolver, DigestResolver, ScalarRewriter,
    TreeWalker,
};

/// A rewrite applied to one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileUpdate {
    /// Path relative to the package root
    pub file: PathBuf,
    #[serde(flatten)]
    pub record: AuditRecord,
}

/// A file or resource that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceFailure {
    pub file: PathBuf,
    /// Index of the resource within the file; `None` when the whole file failed
    pub resource: Option<usize>,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Tree path of the failing scalar, when known
    pub path: Option<String>,
    pub error: String,
}

/// Outcome of [`PackagePipeline::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_changed: usize,
    pub updates: Vec<FileUpdate>,
    pub failures: Vec<ResourceFailure>,
}

impl PipelineReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// An annotated scalar found by [`PackagePipeline::scan`].
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub file: PathBuf,
    pub resource: usize,
    #[serde(flatten)]
    pub site: AnnotatedSite,
}

/// Outcome of [`PackagePipeline::scan`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub entries: Vec<ScanEntry>,
    pub failures: Vec<ResourceFailure>,
}

/// Build the production resolver for `config`: registry lookups, memoised
/// per run unless `cache_digests` is off.
pub fn registry_resolver(config: &PinConfig) -> Box<dyn DigestResolver> {
    let resolver = RegistryResolver::new(&config.registry);
    if config.cache_digests {
        Box::new(CachingResolver::new(resolver))
    } else {
        Box::new(resolver)
    }
}

/// Walks a package directory and pins annotated references in place.
pub struct PackagePipeline<R> {
    config: PinConfig,
    walker: TreeWalker<R>,
}

impl<R: DigestResolver> PackagePipeline<R> {
    pub fn new(config: PinConfig, resolver: R) -> Result<Self> {
        config.validate()?;
        let walker = TreeWalker::new(ScalarRewriter::new(config.marker.clone(), resolver));
        Ok(Self { config, walker })
    }

    pub fn config(&self) -> &PinConfig {
        &self.config
    }

    /// Candidate files under the package root, sorted by path. Hidden
    /// directories are not entered.
    pub fn candidate_files(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.directory;
        if !root.is_dir() {
            return Err(PinError::ConfigError(format!(
                "Package directory {} does not exist or is not a directory",
                root.display()
            )));
        }

        let mut files = Vec::new();
        let walk = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
        for entry in walk {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_candidate(entry.path(), &self.config.extensions)
            {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Pin every annotated reference in the package.
    pub async fn run(&self) -> Result<PipelineReport> {
        let files = self.candidate_files()?;
        tracing::info!(
            directory = %self.config.directory.display(),
            files = files.len(),
            dry_run = self.config.dry_run,
            "Pinning image references"
        );

        let mut report = PipelineReport::default();
        for path in &files {
            report.files_scanned += 1;
            self.process_file(path, &mut report).await?;
        }

        tracing::info!(
            scanned = report.files_scanned,
            skipped = report.files_skipped,
            changed = report.files_changed,
            updates = report.updates.len(),
            failures = report.failures.len(),
            "Pinning finished"
        );
        Ok(report)
    }

    /// Process one file. Only write errors are returned; everything else is
    /// recorded in `report`.
    async fn process_file(&self, path: &Path, report: &mut PipelineReport) -> Result<()> {
        let relative = self.relative(path);

        let mut file = match self.load(path, &relative) {
            Ok(Some(file)) => file,
            Ok(None) => {
                report.files_skipped += 1;
                return Ok(());
            }
            Err(failure) => {
                report.failures.push(failure);
                return Ok(());
            }
        };

        for index in 0..file.len() {
            // Metadata only labels diagnostics; the resource is walked regardless
            let meta = file.meta(index).unwrap_or_else(|e| {
                tracing::warn!(
                    file = %relative.display(),
                    resource = index,
                    error = %e,
                    "Unreadable resource metadata"
                );
                ResourceMeta::default()
            });

            let resource = &mut file.resources_mut()[index];
            let line = resource.first_line();
            let root = resource.root_mut();
            let (records, failure) = match self.walker.walk(root).await {
                Ok(records) => (records, None),
                Err(e) => (e.records, Some((e.path, e.error))),
            };
            report.updates.extend(records.into_iter().map(|record| FileUpdate {
                file: relative.clone(),
                record,
            }));

            if let Some((scalar_path, error)) = failure {
                tracing::error!(
                    file = %relative.display(),
                    line,
                    kind = %meta.kind,
                    name = %meta.name,
                    path = %scalar_path,
                    error = %error,
                    "Error processing resource"
                );
                report.failures.push(ResourceFailure {
                    file: relative.clone(),
                    resource: Some(index),
                    kind: meta.kind,
                    name: meta.name,
                    namespace: meta.namespace,
                    path: Some(scalar_path),
                    error: error.to_string(),
                });
            }
        }

        if !file.is_modified() {
            return Ok(());
        }
        let rendered = file.render();
        if rendered == file.source() {
            return Ok(());
        }
        report.files_changed += 1;

        if self.config.dry_run {
            tracing::info!(file = %relative.display(), "Dry run, not writing changes");
            return Ok(());
        }
        write_atomic(path, &rendered)?;
        tracing::info!(file = %relative.display(), "Wrote pinned references");
        Ok(())
    }

    /// Read and parse a file. Returns `None` when the prefilter rules the
    /// file out.
    fn load(
        &self,
        path: &Path,
        relative: &Path,
    ) -> std::result::Result<Option<YamlFile>, ResourceFailure> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            tracing::warn!(file = %relative.display(), error = %e, "Failed to read file");
            file_failure(relative, &PinError::IoError(e))
        })?;

        if !self.config.skip_prefilter && should_skip(&source, &self.config.marker) {
            tracing::debug!(file = %relative.display(), "No marker, skipping");
            return Ok(None);
        }

        YamlFile::parse(&source).map(Some).map_err(|e| {
            tracing::error!(file = %relative.display(), error = %e, "Failed to parse file");
            file_failure(relative, &e)
        })
    }

    /// List annotated scalars without resolving or writing anything.
    pub fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        for path in self.candidate_files()? {
            report.files_scanned += 1;
            let relative = self.relative(&path);
            let file = match self.load(&path, &relative) {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(failure) => {
                    report.failures.push(failure);
                    continue;
                }
            };
            for (index, resource) in file.resources().iter().enumerate() {
                for site in self.walker.collect_annotated(resource.root()) {
                    report.entries.push(ScanEntry {
                        file: relative.clone(),
                        resource: index,
                        site,
                    });
                }
            }
        }
        Ok(report)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.config.directory)
            .unwrap_or(path)
            .to_path_buf()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn file_failure(file: &Path, error: &PinError) -> ResourceFailure {
    ResourceFailure {
        file: file.to_path_buf(),
        resource: None,
        kind: String::new(),
        name: String::new(),
        namespace: None,
        path: None,
        error: error.to_string(),
    }
}

/// Replace `path` with `contents` via a sibling temp file and rename.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PinError::Other(format!("Invalid file path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
