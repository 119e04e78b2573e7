use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::entities::request::AnalysisRequest;
use crate::error::PharmaGuardError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "PHARMAGUARD_API_URL";
const ANALYSIS_API: &str = "analysis service";
const GENERIC_FAILURE: &str = "Analysis failed";

/// The remote analysis call. One invocation is one outbound request.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Returns the parsed success body.
    ///
    /// # Errors
    ///
    /// [`PharmaGuardError::Service`] for a non-success status,
    /// [`PharmaGuardError::Transport`] when no response arrived and
    /// [`PharmaGuardError::InvalidResponse`] for a success body that is not JSON.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, PharmaGuardError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportedDrugs {
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub genes: Vec<String>,
}

#[derive(Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
}

impl AnalysisClient {
    pub fn new() -> Result<Self, PharmaGuardError> {
        Self::with_base(crate::sources::env_base(DEFAULT_API_URL, API_URL_ENV))
    }

    pub fn with_base(base: impl Into<Cow<'static, str>>) -> Result<Self, PharmaGuardError> {
        let base = base.into();
        validate_base(&base)?;
        Ok(Self {
            client: crate::sources::shared_client()?,
            base,
        })
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `GET /health`; any 2xx counts as reachable.
    pub async fn ping(&self) -> Result<(), PharmaGuardError> {
        let url = self.endpoint("health");
        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| PharmaGuardError::Transport(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PharmaGuardError::Service {
                status: status.as_u16(),
                message: format!("HTTP {status}"),
            });
        }
        Ok(())
    }

    pub async fn supported_drugs(&self) -> Result<SupportedDrugs, PharmaGuardError> {
        let url = self.endpoint("supported-drugs");
        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| PharmaGuardError::Transport(err.to_string()))?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, ANALYSIS_API).await?;
        if !status.is_success() {
            return Err(PharmaGuardError::Service {
                status: status.as_u16(),
                message: error_detail(&bytes).unwrap_or_else(|| {
                    format!("HTTP {status}: {}", crate::sources::body_excerpt(&bytes))
                }),
            });
        }
        serde_json::from_slice(&bytes).map_err(|source| {
            PharmaGuardError::InvalidResponse(format!(
                "{} ({source})",
                crate::sources::body_excerpt(&bytes)
            ))
        })
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, PharmaGuardError> {
        let url = self.endpoint("analyze");
        let drugs = request.drugs.joined();
        let file = Part::bytes(request.genome_file.bytes().to_vec())
            .file_name(request.genome_file.name().to_string())
            .mime_str("text/plain")
            .map_err(|err| PharmaGuardError::InvalidArgument(format!("Invalid upload: {err}")))?;
        let form = Form::new().part("vcf_file", file).text("drugs", drugs.clone());

        info!(
            url = %url,
            file = request.genome_file.name(),
            bytes = request.genome_file.len(),
            drugs = %drugs,
            "submitting analysis"
        );
        let resp = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|err| PharmaGuardError::Transport(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            // An unreadable error body still carries the status.
            let detail = match crate::sources::read_limited_body(resp, ANALYSIS_API).await {
                Ok(bytes) => {
                    debug!(
                        status = status.as_u16(),
                        body = %crate::sources::body_excerpt(&bytes),
                        "analysis rejected"
                    );
                    error_detail(&bytes)
                }
                Err(err) => {
                    debug!(status = status.as_u16(), "analysis rejected, body unreadable: {err}");
                    None
                }
            };
            return Err(PharmaGuardError::Service {
                status: status.as_u16(),
                message: detail.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            });
        }
        let bytes = crate::sources::read_limited_body(resp, ANALYSIS_API).await?;

        serde_json::from_slice(&bytes).map_err(|source| {
            PharmaGuardError::InvalidResponse(format!(
                "{} ({source})",
                crate::sources::body_excerpt(&bytes)
            ))
        })
    }
}

fn validate_base(base: &str) -> Result<(), PharmaGuardError> {
    let url = reqwest::Url::parse(base.trim()).map_err(|err| {
        PharmaGuardError::InvalidArgument(format!("API URL \"{base}\" is invalid: {err}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PharmaGuardError::InvalidArgument(format!(
            "API URL \"{base}\" must use http or https"
        )));
    }
    Ok(())
}

/// Pulls the `detail` message out of an error body.
///
/// Plain strings are used as-is; validation error lists contribute their
/// `msg` entries. Missing, empty, or unparsable details yield `None`.
fn error_detail(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let detail = value.get("detail")?;
    let text = match detail {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                other => other
                    .get("msg")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null | Value::Bool(false) => String::new(),
        other => other.to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}
