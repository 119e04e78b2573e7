use crate::session::orchestrator::Phase;

#[derive(Debug, thiserror::Error)]
pub enum PharmaGuardError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Client-side precondition failure; never reaches the network.
    #[error("{0}")]
    Validation(String),

    #[error("Cannot {action} while the analysis is {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    /// Non-success response from the analysis service. Displays the server's
    /// `detail` text unchanged.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The request produced no response.
    #[error("{0}")]
    Transport(String),

    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),

    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    #[error("{tool} unavailable: {message}")]
    Host { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}
