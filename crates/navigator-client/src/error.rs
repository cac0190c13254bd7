use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigatorClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("SSE stream error: {0}")]
    Stream(String),

    #[error("Authentication failed: session expired or CSRF token rejected")]
    Unauthorized,
}

pub type Result<T> = std::result::Result<T, NavigatorClientError>;

impl NavigatorClientError {
    /// True when the error represents a user-initiated cancellation. The
    /// backend reports an aborted request as an in-band `error` event whose
    /// text contains "cancelled"; the partial transcript is kept.
    pub fn is_cancellation(&self) -> bool {
        match self {
            NavigatorClientError::Stream(msg) | NavigatorClientError::Server { message: msg, .. } => {
                msg.contains("cancelled")
            }
            _ => false,
        }
    }

    /// The fixed user-facing message for this error, in the product's
    /// language. HTTP statuses map through [`status_message`]; everything
    /// else collapses to a generic connectivity message.
    pub fn user_message(&self) -> String {
        match self {
            NavigatorClientError::Server { status, message } => status_message(*status, message),
            NavigatorClientError::Unauthorized => status_message(401, ""),
            _ => "Verbindung zum Server fehlgeschlagen. Bitte versuche es erneut.".to_string(),
        }
    }
}

/// Maps an HTTP status to the fixed user-facing error text shown in the chat
/// view. The table is part of the product contract; only the default arm
/// carries the raw detail.
pub fn status_message(status: u16, detail: &str) -> String {
    match status {
        400 => {
            "Die Anfrage konnte nicht verarbeitet werden. M\u{f6}glicherweise ist der Chat-Verlauf zu lang."
                .to_string()
        }
        401 | 403 => "Nicht autorisiert. Bitte melde dich erneut an.".to_string(),
        500 => "Server-Fehler beim KI-Modell. Bitte versuche es erneut.".to_string(),
        502 | 503 | 504 => {
            "Der KI-Server ist gerade nicht erreichbar. Bitte warte einen Moment.".to_string()
        }
        _ => {
            if detail.is_empty() {
                format!("Unerwarteter Fehler ({status}). Bitte versuche es erneut.")
            } else {
                format!("Unerwarteter Fehler ({status}): {detail}")
            }
        }
    }
}
