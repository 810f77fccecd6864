use std::env;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single filesystem operation issued by the executor.
#[derive(Error, Debug)]
pub enum OpError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{op} timed out after {after:?}")]
    TimedOut { op: &'static str, after: Duration },
}

/// Which folder step failed. Both stages report as `FolderCreationFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStage {
    Root,
    Subfolder,
}

impl fmt::Display for FolderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderStage::Root => f.write_str("project folder"),
            FolderStage::Subfolder => f.write_str("subfolder"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("Directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),
    #[error("Could not connect to catalog at {}: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Could not query catalog: {0}")]
    CursorUnavailable(#[source] rusqlite::Error),
    #[error("Unsupported language '{token}'")]
    LanguageUnsupported { token: String, supported: Vec<String> },
    #[error("Couldn't create {stage} {}: {source}", .path.display())]
    FolderCreationFailed {
        stage: FolderStage,
        path: PathBuf,
        #[source]
        source: OpError,
    },
    #[error("Couldn't create file {}: {source}", .path.display())]
    FileCreationFailed {
        path: PathBuf,
        #[source]
        source: OpError,
    },
    #[error("Couldn't copy template {} to {}: {source}", .src.display(), .dest.display())]
    TemplateCopyFailed {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: OpError,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// The discrete outcome of one scaffold run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    DirectoryExists,
    StoreUnavailable,
    CursorUnavailable,
    LanguageUnsupported,
    FolderCreationFailed,
    FileCreationFailed,
    TemplateCopyFailed,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Success => "success",
            ResultKind::DirectoryExists => "directory_exists",
            ResultKind::StoreUnavailable => "store_unavailable",
            ResultKind::CursorUnavailable => "cursor_unavailable",
            ResultKind::LanguageUnsupported => "language_unsupported",
            ResultKind::FolderCreationFailed => "folder_creation_failed",
            ResultKind::FileCreationFailed => "file_creation_failed",
            ResultKind::TemplateCopyFailed => "template_copy_failed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ResultKind::Success => 0,
            ResultKind::DirectoryExists => 1,
            ResultKind::StoreUnavailable => 2,
            ResultKind::CursorUnavailable => 3,
            ResultKind::LanguageUnsupported => 4,
            ResultKind::FolderCreationFailed => 5,
            ResultKind::FileCreationFailed => 6,
            ResultKind::TemplateCopyFailed => 7,
        }
    }
}

/// Exit code for failures outside the scaffold taxonomy (config, usage, I/O).
pub const EXIT_USAGE: i32 = 64;

impl ScaffoldError {
    /// Maps the error onto its run outcome, or `None` for ambient failures.
    pub fn kind(&self) -> Option<ResultKind> {
        match self {
            ScaffoldError::DirectoryExists(_) => Some(ResultKind::DirectoryExists),
            ScaffoldError::StoreUnavailable { .. } => Some(ResultKind::StoreUnavailable),
            ScaffoldError::CursorUnavailable(_) => Some(ResultKind::CursorUnavailable),
            ScaffoldError::LanguageUnsupported { .. } => Some(ResultKind::LanguageUnsupported),
            ScaffoldError::FolderCreationFailed { .. } => Some(ResultKind::FolderCreationFailed),
            ScaffoldError::FileCreationFailed { .. } => Some(ResultKind::FileCreationFailed),
            ScaffoldError::TemplateCopyFailed { .. } => Some(ResultKind::TemplateCopyFailed),
            ScaffoldError::ConfigError(_)
            | ScaffoldError::IoError(_)
            | ScaffoldError::EnvVarError(_)
            | ScaffoldError::ValidationError(_) => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().map(|k| k.exit_code()).unwrap_or(EXIT_USAGE)
    }
}

impl From<rusqlite::Error> for ScaffoldError {
    fn from(err: rusqlite::Error) -> Self {
        ScaffoldError::CursorUnavailable(err)
    }
}
