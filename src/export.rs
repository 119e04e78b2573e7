//! Copy, download, and print of the report on screen.
//!
//! Exports always carry the raw JSON exactly as the service returned it. The
//! host-side actions are best effort: they report failure to the caller but
//! never touch the request lifecycle.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::entities::report::AnalysisReport;
use crate::error::PharmaGuardError;

const FILE_PREFIX: &str = "pharmaguard";
const FILE_EXTENSION: &str = "json";

/// Clipboard helpers tried in order; the first one that runs wins.
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("pbcopy", &[]),
    ("clip", &[]),
];

const PRINT_TOOLS: &[(&str, &[&str])] = &[("lp", &[]), ("lpr", &[])];

/// Pretty-printed JSON of the received value, key order preserved.
pub fn serialize(report: &AnalysisReport) -> Result<String, PharmaGuardError> {
    Ok(serde_json::to_string_pretty(report.raw())?)
}

/// `pharmaguard_{patient}_{unix millis}.json`
pub fn suggested_filename(report: &AnalysisReport, at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!(
        "{FILE_PREFIX}_{}_{millis}.{FILE_EXTENSION}",
        filename_safe(report.patient_id())
    )
}

fn filename_safe(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

pub struct ExportService {
    export_dir: PathBuf,
}

impl ExportService {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Writes the artifact into the export directory and returns its path.
    pub async fn trigger_download(
        &self,
        report: &AnalysisReport,
    ) -> Result<PathBuf, PharmaGuardError> {
        let body = serialize(report)?;
        tokio::fs::create_dir_all(&self.export_dir).await?;
        let path = self
            .export_dir
            .join(suggested_filename(report, OffsetDateTime::now_utc()));
        tokio::fs::write(&path, body).await?;
        info!(path = %path.display(), "report downloaded");
        Ok(path)
    }

    /// Places the artifact on the host clipboard. Returns the tool used.
    pub async fn copy_to_clipboard(
        &self,
        report: &AnalysisReport,
    ) -> Result<&'static str, PharmaGuardError> {
        let body = serialize(report)?;
        pipe_to_first(CLIPBOARD_TOOLS, "clipboard", body.as_bytes()).await
    }

    /// Sends the rendered (uncolored) report to the host print spooler.
    pub async fn trigger_print(&self, rendered: &str) -> Result<&'static str, PharmaGuardError> {
        pipe_to_first(PRINT_TOOLS, "printer", rendered.as_bytes()).await
    }
}

async fn pipe_to_first(
    tools: &[(&'static str, &[&str])],
    purpose: &str,
    payload: &[u8],
) -> Result<&'static str, PharmaGuardError> {
    let mut failures = Vec::new();
    for &(program, args) in tools {
        match pipe_to(program, args, payload).await {
            Ok(()) => {
                debug!(tool = program, purpose, "host tool accepted payload");
                return Ok(program);
            }
            Err(err) => failures.push(format!("{program}: {err}")),
        }
    }
    warn!(purpose, "no host tool accepted the payload");
    Err(PharmaGuardError::Host {
        tool: purpose.to_string(),
        message: failures.join("; "),
    })
}

async fn pipe_to(program: &str, args: &[&str], payload: &[u8]) -> Result<(), std::io::Error> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(payload).await?;
        stdin.shutdown().await?;
    }
    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("exited with {status}")))
    }
}
