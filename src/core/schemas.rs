//! Catalog database schema.
//!
//! The catalog is a single SQLite file living under the configuration
//! directory. Scaffold runs only read from it; `mkproj catalog init` is the
//! one surface that creates the tables.

/// Default catalog location relative to the configuration directory.
pub const CATALOG_DB_REL_PATH: &str = "db/catalog.sqlite";

pub const CATALOG_SCHEMA_LANGUAGES: &str = "
    CREATE TABLE IF NOT EXISTS languages (
        language_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
";

pub const CATALOG_SCHEMA_LANGUAGES_SHORT: &str = "
    CREATE TABLE IF NOT EXISTS languages_short (
        language_id INTEGER NOT NULL,
        name_short TEXT NOT NULL UNIQUE,
        FOREIGN KEY(language_id) REFERENCES languages(language_id)
    )
";

pub const CATALOG_SCHEMA_FOLDERS: &str = "
    CREATE TABLE IF NOT EXISTS folders (
        folder_id INTEGER PRIMARY KEY,
        language_id INTEGER NOT NULL,
        relative_dest_path TEXT NOT NULL,
        FOREIGN KEY(language_id) REFERENCES languages(language_id)
    )
";

pub const CATALOG_SCHEMA_FILES: &str = "
    CREATE TABLE IF NOT EXISTS files (
        file_id INTEGER PRIMARY KEY,
        language_id INTEGER NOT NULL,
        relative_dest_path TEXT NOT NULL,
        absolute_orig_path TEXT,
        is_template INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(language_id) REFERENCES languages(language_id)
    )
";

pub const CATALOG_SCHEMA_FOLDERS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_folders_language ON folders(language_id)";
pub const CATALOG_SCHEMA_FILES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_files_language ON files(language_id, is_template)";

/// Every statement `catalog init` applies, in dependency order.
pub fn catalog_schema() -> [&'static str; 6] {
    [
        CATALOG_SCHEMA_LANGUAGES,
        CATALOG_SCHEMA_LANGUAGES_SHORT,
        CATALOG_SCHEMA_FOLDERS,
        CATALOG_SCHEMA_FILES,
        CATALOG_SCHEMA_FOLDERS_INDEX,
        CATALOG_SCHEMA_FILES_INDEX,
    ]
}
