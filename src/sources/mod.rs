//! HTTP plumbing shared by service clients.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::PharmaGuardError;

pub mod analysis;

/// Upper bound for any response body we are willing to buffer.
pub(crate) const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const BODY_EXCERPT_CHARS: usize = 240;

/// Returns the override from `env` when set and non-blank, else `default`.
pub fn env_base(default: &'static str, env: &str) -> Cow<'static, str> {
    match std::env::var(env) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value.trim().to_string()),
        _ => Cow::Borrowed(default),
    }
}

/// Shared client for service calls.
///
/// Only the connect phase is bounded; an accepted analysis request runs to
/// completion however long the service takes.
pub(crate) fn shared_client() -> Result<reqwest::Client, PharmaGuardError> {
    static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("pharmaguard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(PharmaGuardError::HttpClientInit)?;

    // A concurrent initializer may have won; either client is equivalent.
    let _ = HTTP_CLIENT.set(client.clone());
    Ok(HTTP_CLIENT.get().cloned().unwrap_or(client))
}

/// Reads a response body, refusing anything larger than [`MAX_BODY_BYTES`].
pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, PharmaGuardError> {
    if let Some(len) = resp.content_length()
        && len as usize > MAX_BODY_BYTES
    {
        return Err(PharmaGuardError::Transport(format!(
            "{api} response too large ({len} bytes)"
        )));
    }

    let mut out = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|err| PharmaGuardError::Transport(format!("{api} response interrupted: {err}")))?
    {
        if out.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(PharmaGuardError::Transport(format!(
                "{api} response exceeded {MAX_BODY_BYTES} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Single-line, length-capped view of a body for logs and messages.
pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return "<empty body>".to_string();
    }
    if flat.chars().count() <= BODY_EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(BODY_EXCERPT_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_base_falls_back_when_unset() {
        let base = env_base("http://localhost:8000", "PHARMAGUARD_TEST_UNSET_BASE");
        assert_eq!(base, "http://localhost:8000");
    }

    #[test]
    fn body_excerpt_flattens_and_truncates() {
        assert_eq!(body_excerpt(b"  {\n \"a\": 1 }\n"), "{ \"a\": 1 }");
        assert_eq!(body_excerpt(b""), "<empty body>");

        let long = "x".repeat(BODY_EXCERPT_CHARS + 10);
        let excerpt = body_excerpt(long.as_bytes());
        assert!(excerpt.ends_with('…'));
        assert_eq!(excerpt.chars().count(), BODY_EXCERPT_CHARS + 1);
    }
}
