use crate::core::catalog::SqliteCatalog;
use crate::core::db;
use crate::core::error::{ResultKind, ScaffoldError};
use crate::core::output::now_epoch_z;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// The catalog broker is the only place a catalog connection is opened.
///
/// A connection lives exactly as long as one `with_catalog` call: it is opened
/// on entry, lent to the closure, and dropped before the call returns, on the
/// error path too. Each session leaves one line in the audit log.
pub struct CatalogBroker {
    audit_log_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl BrokerEvent {
    fn new(op: &str, db_id: &str, status: &str) -> Self {
        Self {
            ts: now_epoch_z(),
            event_id: Ulid::new().to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
            project: None,
            language: None,
            result: None,
        }
    }
}

impl CatalogBroker {
    pub fn new(audit_log_path: impl Into<PathBuf>) -> Self {
        Self {
            audit_log_path: Some(audit_log_path.into()),
        }
    }

    /// Broker that keeps no audit trail.
    pub fn unaudited() -> Self {
        Self {
            audit_log_path: None,
        }
    }

    /// Execute a closure against a freshly opened catalog.
    pub fn with_catalog<F, R>(&self, db_path: &Path, op_name: &str, f: F) -> Result<R, ScaffoldError>
    where
        F: FnOnce(&SqliteCatalog<'_>) -> Result<R, ScaffoldError>,
    {
        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let conn = match db::catalog_connect(db_path) {
            Ok(conn) => conn,
            Err(e) => {
                self.log_quietly(BrokerEvent::new(op_name, &db_id, "unavailable"));
                return Err(e);
            }
        };

        let result = f(&SqliteCatalog::new(&conn));
        drop(conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_quietly(BrokerEvent::new(op_name, &db_id, status));

        result
    }

    /// Append the final outcome of a scaffold run.
    pub fn record_run(
        &self,
        project: &str,
        language: &str,
        kind: Option<ResultKind>,
    ) -> Result<(), ScaffoldError> {
        let status = if kind == Some(ResultKind::Success) {
            "success"
        } else {
            "error"
        };
        let mut ev = BrokerEvent::new("scaffold.run", "", status);
        ev.project = Some(project.to_string());
        ev.language = Some(language.to_string());
        ev.result = Some(kind.map(|k| k.as_str()).unwrap_or("internal_error").to_string());
        self.log_event(&ev)
    }

    fn log_quietly(&self, ev: BrokerEvent) {
        if let Err(e) = self.log_event(&ev) {
            eprintln!("warning: could not write audit event {}: {}", ev.op, e);
        }
    }

    fn log_event(&self, ev: &BrokerEvent) -> Result<(), ScaffoldError> {
        let Some(path) = &self.audit_log_path else {
            return Ok(());
        };

        let line = serde_json::to_string(ev)
            .map_err(|e| ScaffoldError::ValidationError(format!("audit event encoding: {e}")))?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(ScaffoldError::IoError)?;

        writeln!(f, "{}", line).map_err(ScaffoldError::IoError)?;
        Ok(())
    }
}

/// Read back every event in an audit log, skipping lines that do not parse.
pub fn read_events(audit_log_path: &Path) -> Result<Vec<BrokerEvent>, ScaffoldError> {
    if !audit_log_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(audit_log_path).map_err(ScaffoldError::IoError)?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
