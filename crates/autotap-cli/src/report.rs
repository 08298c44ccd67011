//! JSON error reports and failure dumps.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use autotap_core::{Error, ErrorCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Error as printed on stderr.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    /// Build a report, using the core error's code and hint when there is one.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let core = err.downcast_ref::<Error>();
        Self {
            code: core.map(Error::code).unwrap_or(ErrorCode::InvalidInput),
            message: format!("{:#}", err),
            suggestion: core.and_then(Error::suggestion),
            timestamp: Utc::now(),
        }
    }

    /// Process exit status for this report.
    pub fn exit_code(&self) -> i32 {
        match self.code {
            ErrorCode::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Save the frame carried by `err` into `dir`, if it carries one.
pub fn dump_failure(dir: &Path, err: &Error) -> anyhow::Result<Option<PathBuf>> {
    let Some(frame) = err.frame() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let name = format!(
        "{}-{}.png",
        Utc::now().format("%Y%m%d-%H%M%S%.3f"),
        err.code().to_string().to_ascii_lowercase()
    );
    let path = dir.join(name);
    frame.save(&path)?;
    info!(path = %path.display(), "saved failure frame");
    Ok(Some(path))
}
