//! Output rendering helpers for CLI surfaces.
//!
//! Text output is for people; `--format json` wraps every command result in
//! the same envelope so scripts can branch on `status` and `result`.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Unix-epoch seconds with a `Z` suffix, e.g. `1771220592Z`.
pub fn now_epoch_z() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub envelope_version: &'static str,
    pub ts: String,
    pub event_id: String,
    pub cmd: &'a str,
    pub status: &'a str,
    #[serde(flatten)]
    pub body: JsonValue,
}

impl<'a> Envelope<'a> {
    /// `body` must be a JSON object; its keys are lifted to the top level.
    pub fn new(cmd: &'a str, status: &'a str, body: JsonValue) -> Self {
        Self {
            envelope_version: ENVELOPE_VERSION,
            ts: now_epoch_z(),
            event_id: Ulid::new().to_string(),
            cmd,
            status,
            body,
        }
    }

    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!("{{\"status\":\"error\",\"error\":\"envelope serialization failed: {e}\"}}")
        })
    }
}

/// Render the supported-language list for an unsupported-language message.
pub fn supported_languages_line(names: &[String]) -> String {
    if names.is_empty() {
        return "(none: the catalog has no languages)".to_string();
    }
    names.join(", ")
}
