use mkproj::core::broker::{self, CatalogBroker};
use mkproj::core::catalog::{CatalogStore, FileSpec, FolderSpec, LanguageEntry, SqliteCatalog};
use mkproj::core::config::{ScaffoldConfig, Timeouts};
use mkproj::core::db;
use mkproj::core::error::{FolderStage, OpError, ResultKind, ScaffoldError};
use mkproj::core::fs_ops::{Filesystem, LocalFilesystem};
use mkproj::core::plan;
use mkproj::core::resolver;
use mkproj::core::scaffold::{self, ScaffoldOptions, ScaffoldRequest, Scaffolder};
use rusqlite::Connection;
use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

const TEMPLATE_BODY: &str = "name: demo\nversion: 1\n";

/// Config dir with a catalog holding `py` (folders, files, one template),
/// `rs` (a single folder) and `none` (no specs at all).
fn seeded_config() -> (TempDir, ScaffoldConfig) {
    let tmp = tempdir().expect("tempdir");
    let config = ScaffoldConfig::new(tmp.path().join("config"));
    db::initialize_catalog(&config.catalog_path).expect("init catalog");

    let conn = Connection::open(&config.catalog_path).expect("open catalog");
    conn.execute_batch(
        "INSERT INTO languages(language_id, name) VALUES (1, 'Python'), (2, 'Rust'), (3, 'Bare');
         INSERT INTO languages_short(language_id, name_short) VALUES (1, 'py'), (2, 'rs'), (3, 'none');
         INSERT INTO folders(language_id, relative_dest_path) VALUES
             (1, 'src'), (1, 'src/lib'), (1, 'tests'), (2, 'src');
         INSERT INTO files(language_id, relative_dest_path, absolute_orig_path, is_template) VALUES
             (1, 'README.md', NULL, 0),
             (1, 'src/__init__.py', NULL, 0),
             (1, 'config.yaml', 'templates/lang/config.yaml', 1);",
    )
    .expect("seed catalog");

    let template_dir = config.config_dir.join("templates/lang");
    fs::create_dir_all(&template_dir).expect("template dir");
    fs::write(template_dir.join("config.yaml"), TEMPLATE_BODY).expect("write template");

    (tmp, config)
}

fn request_for(root: &Path, language: &str) -> ScaffoldRequest {
    ScaffoldRequest::new(root.to_string_lossy().to_string(), language).expect("request")
}

fn add_language(config: &ScaffoldConfig, id: i64, short: &str, folders: &[&str], files: &[&str]) {
    let conn = Connection::open(&config.catalog_path).expect("open catalog");
    conn.execute(
        "INSERT INTO languages_short(language_id, name_short) VALUES (?1, ?2)",
        rusqlite::params![id, short],
    )
    .expect("insert language");
    for folder in folders {
        conn.execute(
            "INSERT INTO folders(language_id, relative_dest_path) VALUES (?1, ?2)",
            rusqlite::params![id, folder],
        )
        .expect("insert folder");
    }
    for file in files {
        conn.execute(
            "INSERT INTO files(language_id, relative_dest_path, is_template) VALUES (?1, ?2, 0)",
            rusqlite::params![id, file],
        )
        .expect("insert file");
    }
}

/// Local filesystem that refuses to create one specific directory.
struct RefuseDir(PathBuf);

impl Filesystem for RefuseDir {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if path.ends_with(&self.0) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected"));
        }
        LocalFilesystem.create_dir_all(path)
    }
    fn create_empty_file(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.create_empty_file(path)
    }
    fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        LocalFilesystem.copy_file(src, dest)
    }
    fn exists(&self, path: &Path) -> bool {
        LocalFilesystem.exists(path)
    }
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.remove_dir_all(path)
    }
}

/// Local filesystem whose copies hang well past any test timeout.
struct SlowCopy;

impl Filesystem for SlowCopy {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.create_dir_all(path)
    }
    fn create_empty_file(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.create_empty_file(path)
    }
    fn copy_file(&self, _src: &Path, _dest: &Path) -> io::Result<()> {
        std::thread::sleep(Duration::from_millis(1_500));
        Ok(())
    }
    fn exists(&self, path: &Path) -> bool {
        LocalFilesystem.exists(path)
    }
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.remove_dir_all(path)
    }
}

/// Local filesystem whose mkdir of `src` finishes well after the create timeout.
struct SlowMkdir;

impl Filesystem for SlowMkdir {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if path.ends_with("src") {
            std::thread::sleep(Duration::from_millis(300));
        }
        LocalFilesystem.create_dir_all(path)
    }
    fn create_empty_file(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.create_empty_file(path)
    }
    fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        LocalFilesystem.copy_file(src, dest)
    }
    fn exists(&self, path: &Path) -> bool {
        LocalFilesystem.exists(path)
    }
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalFilesystem.remove_dir_all(path)
    }
}

/// In-memory catalog that counts how often each query is issued.
#[derive(Default)]
struct CountingStore {
    entries: Vec<LanguageEntry>,
    language_scans: Cell<usize>,
    name_fetches: Cell<usize>,
}

impl CountingStore {
    fn with(names: &[&str]) -> Self {
        Self {
            entries: names
                .iter()
                .enumerate()
                .map(|(i, n)| LanguageEntry {
                    language_id: i as i64 + 1,
                    short_name: n.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

impl CatalogStore for CountingStore {
    fn languages(&self) -> Result<Vec<LanguageEntry>, ScaffoldError> {
        self.language_scans.set(self.language_scans.get() + 1);
        Ok(self.entries.clone())
    }
    fn short_names(&self) -> Result<Vec<String>, ScaffoldError> {
        self.name_fetches.set(self.name_fetches.get() + 1);
        Ok(self.entries.iter().map(|e| e.short_name.clone()).collect())
    }
    fn folders(&self, _language_id: i64) -> Result<Vec<FolderSpec>, ScaffoldError> {
        Ok(Vec::new())
    }
    fn files(&self, _language_id: i64, _is_template: bool) -> Result<Vec<FileSpec>, ScaffoldError> {
        Ok(Vec::new())
    }
}

#[test]
fn resolver_fetches_supported_names_only_on_failure() {
    let store = CountingStore::with(&["py", "rs", "go"]);

    assert_eq!(resolver::resolve(&store, "rs").expect("resolve rs"), 2);
    assert_eq!(store.language_scans.get(), 1);
    assert_eq!(store.name_fetches.get(), 0);

    let err = resolver::resolve(&store, "zig").expect_err("zig is unsupported");
    match err {
        ScaffoldError::LanguageUnsupported { token, supported } => {
            assert_eq!(token, "zig");
            assert_eq!(supported, vec!["py", "rs", "go"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.name_fetches.get(), 1);
}

#[test]
fn resolver_returns_first_exact_match() {
    let store = CountingStore {
        entries: vec![
            LanguageEntry {
                language_id: 7,
                short_name: "py".into(),
            },
            LanguageEntry {
                language_id: 9,
                short_name: "py".into(),
            },
        ],
        ..Default::default()
    };
    assert_eq!(resolver::resolve(&store, "py").expect("resolve"), 7);
}

#[test]
fn resolution_is_case_sensitive() {
    let (_tmp, config) = seeded_config();
    let broker = CatalogBroker::unaudited();

    for token in ["Py", "PY", "pY"] {
        let err = scaffold::load_plan(&broker, &config.catalog_path, token)
            .expect_err("case variants must not resolve");
        assert_eq!(err.kind(), Some(ResultKind::LanguageUnsupported), "{token}");
    }
    let (id, _) = scaffold::load_plan(&broker, &config.catalog_path, "py").expect("py resolves");
    assert_eq!(id, 1);
}

#[test]
fn unsupported_language_lists_every_catalog_name() {
    let (_tmp, config) = seeded_config();
    let broker = CatalogBroker::unaudited();

    let err = scaffold::load_plan(&broker, &config.catalog_path, "cobol").expect_err("unsupported");
    match err {
        ScaffoldError::LanguageUnsupported { supported, .. } => {
            assert_eq!(supported, vec!["py", "rs", "none"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_catalog_supports_nothing() {
    let tmp = tempdir().expect("tempdir");
    let config = ScaffoldConfig::new(tmp.path());
    db::initialize_catalog(&config.catalog_path).expect("init catalog");

    let err = scaffold::load_plan(&CatalogBroker::unaudited(), &config.catalog_path, "py")
        .expect_err("nothing is supported");
    match err {
        ScaffoldError::LanguageUnsupported { supported, .. } => assert!(supported.is_empty()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn planner_splits_plain_files_and_templates_in_store_order() {
    let (_tmp, config) = seeded_config();
    let conn = Connection::open(&config.catalog_path).expect("open");
    let catalog = SqliteCatalog::new(&conn);

    let plan = plan::plan(&catalog, 1).expect("plan");
    assert_eq!(plan.folders, vec!["src", "src/lib", "tests"]);
    assert_eq!(plan.plain_files, vec!["README.md", "src/__init__.py"]);
    assert_eq!(plan.templates.len(), 1);
    assert_eq!(plan.templates[0].dest, "config.yaml");
    assert_eq!(plan.templates[0].src, "templates/lang/config.yaml");
    assert_eq!(plan.operation_count(), 6);

    let bare = plan::plan(&catalog, 3).expect("plan bare");
    assert!(bare.is_empty());
}

#[test]
fn existing_directory_short_circuits_before_catalog() {
    let tmp = tempdir().expect("tempdir");
    // Catalog path deliberately points nowhere: touching it would surface
    // StoreUnavailable instead.
    let mut config = ScaffoldConfig::new(tmp.path().join("config"));
    config.catalog_path = tmp.path().join("missing.sqlite");
    let audit = tmp.path().join("audit.jsonl");
    let broker = CatalogBroker::new(&audit);

    let dir = tmp.path().join("taken-dir");
    fs::create_dir(&dir).expect("mkdir");
    let file = tmp.path().join("taken-file");
    fs::write(&file, "x").expect("write");

    for existing in [&dir, &file] {
        let err = Scaffolder::new(&config, &broker)
            .run(&request_for(existing, "py"), &ScaffoldOptions::default())
            .expect_err("existing path must be rejected");
        assert!(matches!(err, ScaffoldError::DirectoryExists(_)), "{err:?}");
        assert_eq!(err.exit_code(), 1);
    }

    assert!(!config.catalog_path.exists(), "catalog must not be created");
    assert!(
        broker::read_events(&audit).expect("read audit").is_empty(),
        "no catalog session may be opened"
    );
}

#[test]
fn missing_catalog_is_store_unavailable() {
    let tmp = tempdir().expect("tempdir");
    let mut config = ScaffoldConfig::new(tmp.path());
    config.catalog_path = tmp.path().join("nope").join("catalog.sqlite");
    let broker = CatalogBroker::unaudited();

    let err = Scaffolder::new(&config, &broker)
        .run(&request_for(&tmp.path().join("demo"), "py"), &ScaffoldOptions::default())
        .expect_err("no catalog");
    assert_eq!(err.kind(), Some(ResultKind::StoreUnavailable));
    assert_eq!(err.exit_code(), 2);
    assert!(!config.catalog_path.exists(), "read-only open must not create the file");
    assert!(!tmp.path().join("demo").exists());
}

#[test]
fn catalog_without_tables_is_cursor_unavailable() {
    let tmp = tempdir().expect("tempdir");
    let mut config = ScaffoldConfig::new(tmp.path());
    config.catalog_path = tmp.path().join("blank.sqlite");
    Connection::open(&config.catalog_path)
        .expect("create blank db")
        .execute_batch("PRAGMA user_version = 1;")
        .expect("write header");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&tmp.path().join("demo"), "py"), &ScaffoldOptions::default())
        .expect_err("no tables");
    assert_eq!(err.kind(), Some(ResultKind::CursorUnavailable));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn language_without_specs_creates_only_the_root() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("bare");

    let report = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "none"), &ScaffoldOptions::default())
        .expect("scaffold");
    assert!(report.plan.is_empty());
    assert!(root.is_dir());
    assert_eq!(fs::read_dir(&root).expect("read root").count(), 0);
}

#[test]
fn full_scaffold_creates_folders_files_and_templates() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("demo");

    let report = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect("scaffold");
    assert_eq!(report.language_id, 1);
    assert!(!report.dry_run);

    assert!(root.join("src").is_dir());
    assert!(root.join("src/lib").is_dir());
    assert!(root.join("tests").is_dir());

    let readme = fs::metadata(root.join("README.md")).expect("readme");
    assert!(readme.is_file());
    assert_eq!(readme.len(), 0);
    assert!(root.join("src/__init__.py").is_file());

    let copied = fs::read_to_string(root.join("config.yaml")).expect("template copy");
    assert_eq!(copied, TEMPLATE_BODY);
}

#[test]
fn subfolder_failure_stops_before_files_and_keeps_earlier_folders() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("demo");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .with_filesystem(Arc::new(RefuseDir(PathBuf::from("src/lib"))))
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect_err("second folder fails");

    assert!(
        matches!(
            err,
            ScaffoldError::FolderCreationFailed {
                stage: FolderStage::Subfolder,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(err.kind(), Some(ResultKind::FolderCreationFailed));
    assert!(root.join("src").is_dir(), "first folder stays (no rollback)");
    assert!(!root.join("tests").exists(), "third folder never attempted");
    assert!(!root.join("README.md").exists());
    assert!(!root.join("config.yaml").exists());
}

#[test]
fn root_failure_reports_folder_creation_failed() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("demo");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .with_filesystem(Arc::new(RefuseDir(PathBuf::from("demo"))))
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect_err("root fails");
    assert!(
        matches!(
            err,
            ScaffoldError::FolderCreationFailed {
                stage: FolderStage::Root,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn cleanup_on_failure_removes_partial_root() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("demo");
    let opts = ScaffoldOptions {
        cleanup_on_failure: true,
        ..Default::default()
    };

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .with_filesystem(Arc::new(RefuseDir(PathBuf::from("src/lib"))))
        .run(&request_for(&root, "py"), &opts)
        .expect_err("second folder fails");
    assert_eq!(err.kind(), Some(ResultKind::FolderCreationFailed));
    assert!(!root.exists(), "cleanup should remove the partial tree");
}

#[test]
fn cleanup_waits_for_timed_out_mkdir_before_removing_root() {
    let (tmp, mut config) = seeded_config();
    config.timeouts = Timeouts {
        create: Duration::from_millis(50),
        copy: Duration::from_secs(2),
    };
    config.cleanup_on_failure = true;
    let root = tmp.path().join("demo");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .with_filesystem(Arc::new(SlowMkdir))
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect_err("mkdir times out");
    match &err {
        ScaffoldError::FolderCreationFailed {
            stage: FolderStage::Subfolder,
            source: OpError::TimedOut { .. },
            ..
        } => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("after 50ms"), "{err}");
    assert!(!root.exists(), "root removed after the run");

    std::thread::sleep(Duration::from_millis(600));
    assert!(!root.exists(), "late worker must not recreate the root");
}

#[test]
fn absolute_catalog_paths_stay_under_their_base() {
    let (tmp, config) = seeded_config();
    add_language(&config, 11, "abs", &["/abs", "/abs/nested"], &["/abs/notes.txt"]);
    let conn = Connection::open(&config.catalog_path).expect("open catalog");
    conn.execute(
        "INSERT INTO files(language_id, relative_dest_path, absolute_orig_path, is_template)
         VALUES (11, '/abs/config.yaml', '/templates/lang/config.yaml', 1)",
        [],
    )
    .expect("insert template");
    drop(conn);
    let root = tmp.path().join("proj");

    Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "abs"), &ScaffoldOptions::default())
        .expect("scaffold with absolute specs");

    assert!(root.join("abs/nested").is_dir());
    assert!(root.join("abs/notes.txt").is_file());
    assert_eq!(
        fs::read_to_string(root.join("abs/config.yaml")).expect("template"),
        TEMPLATE_BODY
    );
    assert!(!Path::new("/abs").exists(), "nothing written at the filesystem root");
}

#[test]
fn plain_file_with_missing_parent_fails_file_phase() {
    let (tmp, config) = seeded_config();
    add_language(&config, 10, "orphan", &["src"], &["missing/dir/notes.txt"]);
    let root = tmp.path().join("orphan");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "orphan"), &ScaffoldOptions::default())
        .expect_err("parent is missing");
    assert_eq!(err.kind(), Some(ResultKind::FileCreationFailed));
    assert_eq!(err.exit_code(), 6);
    assert!(root.join("src").is_dir());
}

#[test]
fn missing_template_source_fails_copy_phase() {
    let (tmp, config) = seeded_config();
    fs::remove_file(config.config_dir.join("templates/lang/config.yaml")).expect("rm template");
    let root = tmp.path().join("demo");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect_err("template missing");
    assert_eq!(err.kind(), Some(ResultKind::TemplateCopyFailed));
    assert_eq!(err.exit_code(), 7);
    assert!(root.join("README.md").is_file(), "earlier phases completed");
}

#[test]
fn template_copy_overrunning_timeout_fails() {
    let (tmp, mut config) = seeded_config();
    config.timeouts = Timeouts {
        create: Duration::from_secs(10),
        copy: Duration::from_millis(50),
    };
    let root = tmp.path().join("demo");

    let err = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .with_filesystem(Arc::new(SlowCopy))
        .run(&request_for(&root, "py"), &ScaffoldOptions::default())
        .expect_err("copy times out");
    match err {
        ScaffoldError::TemplateCopyFailed {
            source: OpError::TimedOut { op, .. },
            ..
        } => assert_eq!(op, "copy template"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn dry_run_plans_without_touching_disk() {
    let (tmp, config) = seeded_config();
    let root = tmp.path().join("demo");
    let opts = ScaffoldOptions {
        dry_run: true,
        ..Default::default()
    };

    let report = Scaffolder::new(&config, &CatalogBroker::unaudited())
        .run(&request_for(&root, "py"), &opts)
        .expect("dry run");
    assert!(report.dry_run);
    assert_eq!(report.plan.folders.len(), 3);
    assert!(!root.exists());
}

#[test]
fn broker_audits_each_catalog_session() {
    let (tmp, config) = seeded_config();
    let audit = tmp.path().join("events.jsonl");
    let broker = CatalogBroker::new(&audit);

    Scaffolder::new(&config, &broker)
        .run(&request_for(&tmp.path().join("demo"), "py"), &ScaffoldOptions::default())
        .expect("scaffold");
    let _ = scaffold::load_plan(&broker, &config.catalog_path, "nope");
    broker
        .record_run("demo", "py", Some(ResultKind::Success))
        .expect("record run");

    let events = broker::read_events(&audit).expect("read events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].op, "scaffold.plan");
    assert_eq!(events[0].status, "success");
    assert_eq!(events[0].db_id, "catalog.sqlite");
    assert_eq!(events[1].status, "error");
    assert_eq!(events[2].op, "scaffold.run");
    assert_eq!(events[2].result.as_deref(), Some("success"));
}

#[test]
fn catalog_init_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("nested/db/catalog.sqlite");
    db::initialize_catalog(&path).expect("first init");
    db::initialize_catalog(&path).expect("second init");

    let conn = db::catalog_connect(&path).expect("read-only connect");
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('languages', 'languages_short', 'folders', 'files')",
            [],
            |row| row.get(0),
        )
        .expect("count tables");
    assert_eq!(tables, 4);
}

#[test]
fn request_rejects_empty_inputs() {
    assert!(ScaffoldRequest::new("", "py").is_err());
    assert!(ScaffoldRequest::new("demo", "").is_err());
    let req = ScaffoldRequest::new("demo", "py").expect("valid");
    assert_eq!(req.project_root(), PathBuf::from("demo"));
}

#[test]
fn result_kinds_have_distinct_exit_codes() {
    let kinds = [
        ResultKind::Success,
        ResultKind::DirectoryExists,
        ResultKind::StoreUnavailable,
        ResultKind::CursorUnavailable,
        ResultKind::LanguageUnsupported,
        ResultKind::FolderCreationFailed,
        ResultKind::FileCreationFailed,
        ResultKind::TemplateCopyFailed,
    ];
    let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), kinds.len());
    assert_eq!(ResultKind::Success.exit_code(), 0);
}
