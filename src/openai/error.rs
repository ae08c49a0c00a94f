use thiserror::Error;

/// Errors returned by the audio clients.
#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be reached or the connection broke while reading the body.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A JSON body or a streamed data line could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request was rejected locally before anything was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Maps a read failure coming out of a wrapped response body back onto
    /// the transport error it carries, if any. Lines that are not UTF-8 are
    /// malformed events and count as parse errors.
    pub(crate) fn from_body_read(err: std::io::Error) -> Self {
        if !err.get_ref().is_some_and(|e| e.is::<reqwest::Error>()) {
            if err.kind() == std::io::ErrorKind::InvalidData {
                return Self::Parse(serde::de::Error::custom(format!(
                    "malformed stream line: {err}"
                )));
            }
            return Self::Io(err);
        }
        match err.into_inner().map(|e| e.downcast::<reqwest::Error>()) {
            Some(Ok(transport)) => Self::Transport(*transport),
            _ => Self::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "failed to read response body",
            )),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
