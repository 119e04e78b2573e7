use std::path::Path;
use std::time::Instant;

use crate::error::PharmaGuardError;
use crate::sources::analysis::AnalysisClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub check: String,
    pub status: String,
    pub latency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affects: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let show_affects = self.rows.iter().any(|row| row.affects.is_some());
        out.push_str("# PharmaGuard Health Check\n\n");
        if show_affects {
            out.push_str("| Check | Status | Latency | Affects |\n");
            out.push_str("|-------|--------|---------|---------|\n");
            for row in &self.rows {
                let affects = row.affects.as_deref().unwrap_or("-");
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    row.check, row.status, row.latency, affects
                ));
            }
        } else {
            out.push_str("| Check | Status | Latency |\n");
            out.push_str("|-------|--------|---------|\n");
            for row in &self.rows {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    row.check, row.status, row.latency
                ));
            }
        }
        out.push_str(&format!(
            "\nStatus: {}/{} checks healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

async fn check_service(client: &AnalysisClient) -> HealthRow {
    let start = Instant::now();
    let check = format!("Analysis service ({})", client.base());
    let affects = Some("analyze, shell submissions, drugs".to_string());

    match client.ping().await {
        Ok(()) => HealthRow {
            check,
            status: "ok".into(),
            latency: format!("{}ms", start.elapsed().as_millis()),
            affects: None,
        },
        Err(PharmaGuardError::Service { status, .. }) => HealthRow {
            check,
            status: "error".into(),
            latency: format!("{}ms (HTTP {status})", start.elapsed().as_millis()),
            affects,
        },
        Err(_) => HealthRow {
            check,
            status: "error".into(),
            latency: "connect".into(),
            affects,
        },
    }
}

async fn check_export_dir(dir: &Path) -> HealthRow {
    let start = Instant::now();
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let probe = dir.join(format!(".pharmaguard-healthcheck-{suffix}.tmp"));

    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&probe, b"ok").await?;
        match tokio::fs::remove_file(&probe).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
    .await;

    match result {
        Ok(()) => HealthRow {
            check: format!("Export dir ({})", dir.display()),
            status: "ok".into(),
            latency: format!("{}ms", start.elapsed().as_millis()),
            affects: None,
        },
        Err(err) => HealthRow {
            check: format!("Export dir ({})", dir.display()),
            status: "error".into(),
            latency: format!("{:?}", err.kind()),
            affects: Some("report downloads".into()),
        },
    }
}

/// Checks the analysis service and, unless `api_only`, the export directory.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check(
    client: &AnalysisClient,
    export_dir: &Path,
    api_only: bool,
) -> Result<HealthReport, PharmaGuardError> {
    let mut rows = vec![check_service(client).await];
    if !api_only {
        rows.push(check_export_dir(export_dir).await);
    }
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}
