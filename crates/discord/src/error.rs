use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed or unexpected gateway traffic. Logged and ignored at the
    /// frame level; only handshake violations terminate a connection.
    #[error("gateway protocol error: {message}")]
    Protocol { message: String },

    /// The delivery channel rejected a send (non-2xx response).
    #[error("delivery failed with status {status}: {message}")]
    Delivery { status: u16, message: String },

    /// A required configuration value is missing.
    #[error("not configured: {what}")]
    NotConfigured { what: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn delivery(status: u16, message: impl Into<String>) -> Self {
        Self::Delivery {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_configured(what: impl Into<String>) -> Self {
        Self::NotConfigured { what: what.into() }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
