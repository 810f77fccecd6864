//! Turns a resolved language into the ordered filesystem operations of a run.

use crate::core::catalog::CatalogStore;
use crate::core::error::ScaffoldError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateCopy {
    /// Destination relative to the project root.
    pub dest: String,
    /// Source relative to the configuration directory.
    pub src: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScaffoldPlan {
    pub folders: Vec<String>,
    pub plain_files: Vec<String>,
    pub templates: Vec<TemplateCopy>,
}

impl ScaffoldPlan {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.plain_files.is_empty() && self.templates.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.folders.len() + self.plain_files.len() + self.templates.len()
    }
}

/// Fetch folders, plain files and templates for `language_id`, preserving
/// store order. Paths are not validated here.
pub fn plan(store: &dyn CatalogStore, language_id: i64) -> Result<ScaffoldPlan, ScaffoldError> {
    let folders = store
        .folders(language_id)?
        .into_iter()
        .map(|f| f.relative_path)
        .collect();

    let plain_files = store
        .files(language_id, false)?
        .into_iter()
        .map(|f| f.relative_path)
        .collect();

    // A template row without a source keeps an empty src; the copy phase
    // then fails on it instead of the run silently skipping the file.
    let templates = store
        .files(language_id, true)?
        .into_iter()
        .map(|f| TemplateCopy {
            dest: f.relative_path,
            src: f.source_path.unwrap_or_default(),
        })
        .collect();

    Ok(ScaffoldPlan {
        folders,
        plain_files,
        templates,
    })
}
