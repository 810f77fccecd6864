//! Project scaffolding pipeline.
//!
//! A run goes through a fixed sequence:
//! - precheck: the project path must not exist (the catalog is not touched
//!   when it does)
//! - catalog session: resolve the language token, then plan its folders,
//!   plain files and templates; the connection is released afterwards
//! - execution: root folder, subfolders, empty files, template copies, in
//!   that order, stopping at the first failure
//!
//! A failed run leaves behind whatever it already created unless cleanup was
//! requested; cleanup is an extra pass and never changes the reported error.
//! Cleanup first waits for any operation that overran its timeout, and is
//! skipped with a warning if one is still running.
//!
//! Catalog paths always stay under their base: destinations under the project
//! root, template sources under the configuration directory.

use crate::core::broker::CatalogBroker;
use crate::core::config::{ScaffoldConfig, Timeouts};
use crate::core::error::{FolderStage, OpError, ScaffoldError};
use crate::core::fs_ops::{Filesystem, LocalFilesystem, Stragglers, join_under, run_with_timeout};
use crate::core::plan::{self, ScaffoldPlan};
use crate::core::resolver;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single request to scaffold one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldRequest {
    project_name: String,
    language_token: String,
}

impl ScaffoldRequest {
    pub fn new(
        project_name: impl Into<String>,
        language_token: impl Into<String>,
    ) -> Result<Self, ScaffoldError> {
        let project_name = project_name.into();
        let language_token = language_token.into();
        if project_name.trim().is_empty() {
            return Err(ScaffoldError::ValidationError(
                "project name must not be empty".into(),
            ));
        }
        if language_token.is_empty() {
            return Err(ScaffoldError::ValidationError(
                "language must not be empty".into(),
            ));
        }
        Ok(Self {
            project_name,
            language_token,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn language_token(&self) -> &str {
        &self.language_token
    }

    /// The project root, relative to the working directory unless the name
    /// is itself an absolute path.
    pub fn project_root(&self) -> PathBuf {
        PathBuf::from(&self.project_name)
    }
}

/// Per-run switches layered on top of `ScaffoldConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaffoldOptions {
    /// Resolve and plan only; nothing is written.
    pub dry_run: bool,
    /// Remove the project root if the run fails after creating it.
    pub cleanup_on_failure: bool,
    /// Print a line per phase to stdout.
    pub progress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldReport {
    pub project_root: PathBuf,
    pub language: String,
    pub language_id: i64,
    pub dry_run: bool,
    pub plan: ScaffoldPlan,
}

/// Resolve `language_token` and plan its operations inside one catalog session.
pub fn load_plan(
    broker: &CatalogBroker,
    catalog_path: &Path,
    language_token: &str,
) -> Result<(i64, ScaffoldPlan), ScaffoldError> {
    broker.with_catalog(catalog_path, "scaffold.plan", |catalog| {
        let language_id = resolver::resolve(catalog, language_token)?;
        let plan = plan::plan(catalog, language_id)?;
        Ok((language_id, plan))
    })
}

pub struct Scaffolder<'a> {
    config: &'a ScaffoldConfig,
    broker: &'a CatalogBroker,
    fs: Arc<dyn Filesystem>,
}

impl<'a> Scaffolder<'a> {
    pub fn new(config: &'a ScaffoldConfig, broker: &'a CatalogBroker) -> Self {
        Self {
            config,
            broker,
            fs: Arc::new(LocalFilesystem),
        }
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn run(
        &self,
        request: &ScaffoldRequest,
        opts: &ScaffoldOptions,
    ) -> Result<ScaffoldReport, ScaffoldError> {
        let project_root = request.project_root();
        if self.fs.exists(&project_root) {
            return Err(ScaffoldError::DirectoryExists(project_root));
        }

        let (language_id, plan) =
            load_plan(self.broker, &self.config.catalog_path, request.language_token())?;

        let report = ScaffoldReport {
            project_root: project_root.clone(),
            language: request.language_token().to_string(),
            language_id,
            dry_run: opts.dry_run,
            plan,
        };
        if opts.dry_run {
            return Ok(report);
        }

        let mut executor = ScaffoldExecutor::new(self.config, Arc::clone(&self.fs));
        executor.progress = opts.progress;

        match executor.execute(&project_root, &report.plan) {
            Ok(()) => Ok(report),
            Err(e) => {
                if opts.cleanup_on_failure || self.config.cleanup_on_failure {
                    executor.cleanup(&project_root);
                }
                Err(e)
            }
        }
    }
}

/// Applies a plan to the filesystem.
pub struct ScaffoldExecutor {
    fs: Arc<dyn Filesystem>,
    config_dir: PathBuf,
    timeouts: Timeouts,
    progress: bool,
    stragglers: Stragglers,
}

impl ScaffoldExecutor {
    pub fn new(config: &ScaffoldConfig, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            config_dir: config.config_dir.clone(),
            timeouts: config.timeouts,
            progress: false,
            stragglers: Stragglers::default(),
        }
    }

    pub fn execute(&self, project_root: &Path, plan: &ScaffoldPlan) -> Result<(), ScaffoldError> {
        self.step("Creating project folder...");
        self.create_dir(project_root)
            .map_err(|source| ScaffoldError::FolderCreationFailed {
                stage: FolderStage::Root,
                path: project_root.to_path_buf(),
                source,
            })?;

        self.step("Creating subfolders...");
        for folder in &plan.folders {
            let path = join_under(project_root, folder);
            self.create_dir(&path)
                .map_err(|source| ScaffoldError::FolderCreationFailed {
                    stage: FolderStage::Subfolder,
                    path: path.clone(),
                    source,
                })?;
        }

        self.step("Creating files...");
        for file in &plan.plain_files {
            let path = join_under(project_root, file);
            self.touch(&path)
                .map_err(|source| ScaffoldError::FileCreationFailed {
                    path: path.clone(),
                    source,
                })?;
        }

        self.step("Copying templates...");
        for template in &plan.templates {
            let src = join_under(&self.config_dir, &template.src);
            let dest = join_under(project_root, &template.dest);
            self.copy(&src, &dest)
                .map_err(|source| ScaffoldError::TemplateCopyFailed {
                    src: src.clone(),
                    dest: dest.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Best-effort removal of a partially scaffolded project root.
    pub fn cleanup(&self, project_root: &Path) {
        let bound = self.timeouts.create.max(self.timeouts.copy);
        if !self.stragglers.settle(bound) {
            eprintln!(
                "{} skipping cleanup of {}: {} timed-out operation(s) still running",
                "warning:".bright_yellow(),
                project_root.display(),
                self.stragglers.len()
            );
            return;
        }
        if !self.fs.exists(project_root) {
            return;
        }
        match self.fs.remove_dir_all(project_root) {
            Ok(()) => self.step(&format!(
                "Cleaned up partial project at {}",
                project_root.display()
            )),
            Err(e) => eprintln!(
                "{} could not clean up {}: {}",
                "warning:".bright_yellow(),
                project_root.display(),
                e
            ),
        }
    }

    fn step(&self, msg: &str) {
        if self.progress {
            println!("{} {}", "▸".bright_cyan(), msg);
        }
    }

    fn create_dir(&self, path: &Path) -> Result<(), OpError> {
        let fs = Arc::clone(&self.fs);
        let path = path.to_path_buf();
        run_with_timeout("create directory", self.timeouts.create, &self.stragglers, move || {
            fs.create_dir_all(&path)
        })
    }

    fn touch(&self, path: &Path) -> Result<(), OpError> {
        let fs = Arc::clone(&self.fs);
        let path = path.to_path_buf();
        run_with_timeout("create file", self.timeouts.create, &self.stragglers, move || {
            fs.create_empty_file(&path)
        })
    }

    fn copy(&self, src: &Path, dest: &Path) -> Result<(), OpError> {
        let fs = Arc::clone(&self.fs);
        let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
        run_with_timeout("copy template", self.timeouts.copy, &self.stragglers, move || {
            fs.copy_file(&src, &dest)
        })
    }
}
