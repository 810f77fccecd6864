//! Read-only view of the language catalog.
//!
//! The scaffold pipeline only ever asks three questions of the catalog: which
//! languages exist, which folders a language wants, and which files (plain or
//! template) a language wants. `CatalogStore` is that seam; `SqliteCatalog`
//! answers it from a borrowed connection.

use crate::core::error::ScaffoldError;
use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageEntry {
    pub language_id: i64,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSpec {
    pub language_id: i64,
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSpec {
    pub language_id: i64,
    pub relative_path: String,
    pub is_template: bool,
    /// Template source, relative to the configuration directory.
    pub source_path: Option<String>,
}

pub trait CatalogStore {
    /// All `(language_id, short_name)` pairs in store order.
    fn languages(&self) -> Result<Vec<LanguageEntry>, ScaffoldError>;

    /// Short names only, used to explain an unsupported language.
    fn short_names(&self) -> Result<Vec<String>, ScaffoldError> {
        Ok(self
            .languages()?
            .into_iter()
            .map(|entry| entry.short_name)
            .collect())
    }

    fn folders(&self, language_id: i64) -> Result<Vec<FolderSpec>, ScaffoldError>;

    fn files(&self, language_id: i64, is_template: bool) -> Result<Vec<FileSpec>, ScaffoldError>;
}

pub struct SqliteCatalog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Long language names, for listings. Languages without a `languages` row
    /// fall back to their short name.
    pub fn language_names(&self) -> Result<Vec<(String, String)>, ScaffoldError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name_short, COALESCE(l.name, s.name_short)
             FROM languages_short s
             LEFT JOIN languages l ON l.language_id = s.language_id
             ORDER BY s.rowid",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

impl CatalogStore for SqliteCatalog<'_> {
    fn languages(&self) -> Result<Vec<LanguageEntry>, ScaffoldError> {
        let mut stmt = self
            .conn
            .prepare("SELECT language_id, name_short FROM languages_short ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(LanguageEntry {
                language_id: row.get(0)?,
                short_name: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn short_names(&self) -> Result<Vec<String>, ScaffoldError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name_short FROM languages_short ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn folders(&self, language_id: i64) -> Result<Vec<FolderSpec>, ScaffoldError> {
        let mut stmt = self.conn.prepare(
            "SELECT relative_dest_path FROM folders WHERE language_id = ?1 ORDER BY folder_id",
        )?;
        let rows = stmt.query_map(params![language_id], |row| {
            Ok(FolderSpec {
                language_id,
                relative_path: row.get(0)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn files(&self, language_id: i64, is_template: bool) -> Result<Vec<FileSpec>, ScaffoldError> {
        let mut stmt = self.conn.prepare(
            "SELECT relative_dest_path, absolute_orig_path
             FROM files
             WHERE language_id = ?1 AND is_template = ?2
             ORDER BY file_id",
        )?;
        let rows = stmt.query_map(params![language_id, is_template], |row| {
            let source: Option<String> = row.get(1)?;
            Ok(FileSpec {
                language_id,
                relative_path: row.get(0)?,
                is_template,
                source_path: if is_template { source } else { None },
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
