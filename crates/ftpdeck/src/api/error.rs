use serde::Deserialize;

/// Broad failure category reported by the backend.
///
/// Taken from the `kind` (or `code`) field of an error body when present,
/// otherwise derived from the HTTP status. A bare 500 still carries the FTP
/// layer's own wording in `error`, which [`ErrorKind::from_message`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Authentication,
    Permission,
    NotFound,
    Validation,
    Other,
}

impl ErrorKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "connection" => ErrorKind::Connection,
            "authentication" => ErrorKind::Authentication,
            "permission" => ErrorKind::Permission,
            "not_found" => ErrorKind::NotFound,
            "validation" => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Permission,
            404 => ErrorKind::NotFound,
            502..=504 => ErrorKind::Connection,
            _ => ErrorKind::Other,
        }
    }

    /// Classify a server message that came without a structured kind
    pub fn from_message(message: &str) -> Self {
        MESSAGE_MARKERS
            .iter()
            .find(|(marker, _)| message.contains(marker))
            .map_or(ErrorKind::Other, |(_, kind)| *kind)
    }
}

/// Phrases the backend embeds in browse and test failures
const MESSAGE_MARKERS: [(&str, ErrorKind); 3] = [
    ("连接失败", ErrorKind::Connection),
    ("Authentication failed", ErrorKind::Authentication),
    ("Permission denied", ErrorKind::Permission),
];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    kind: Option<String>,
    code: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Server {
        status: u16,
        kind: ErrorKind,
        message: String,
    },

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Build an error from a non-2xx response body
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();

        let (message, kind) = match parsed {
            Some(body) => (
                body.error.unwrap_or_else(|| format!("HTTP {}", status)),
                body.kind
                    .or_else(|| body.code.and_then(|c| c.as_str().map(str::to_string)))
                    .map(|k| ErrorKind::parse(&k)),
            ),
            None => (format!("HTTP {}", status), None),
        };

        let kind = kind.unwrap_or_else(|| match ErrorKind::from_status(status) {
            ErrorKind::Other => ErrorKind::from_message(&message),
            known => known,
        });

        ApiError::Server {
            status,
            kind,
            message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) => ErrorKind::Connection,
            ApiError::Server { kind, .. } => *kind,
            ApiError::Decode(_) | ApiError::Url(_) => ErrorKind::Other,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
