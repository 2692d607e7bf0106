use chrono::{DateTime, Utc};
use harbor_core::{AppError, VariantKind};
use harbor_storage::ByteStream;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What a serving route asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServeKind {
    Thumbnail,
    Medium,
    Original,
}

impl ServeKind {
    pub fn variant_kind(&self) -> Option<VariantKind> {
        match self {
            ServeKind::Thumbnail => Some(VariantKind::Thumbnail),
            ServeKind::Medium => Some(VariantKind::Medium),
            ServeKind::Original => None,
        }
    }

    /// Candidates in serving order, best first.
    pub fn fallback_chain(&self) -> &'static [ServeKind] {
        match self {
            ServeKind::Thumbnail => &[ServeKind::Thumbnail, ServeKind::Medium, ServeKind::Original],
            ServeKind::Medium => &[ServeKind::Medium, ServeKind::Original],
            ServeKind::Original => &[ServeKind::Original],
        }
    }
}

impl From<VariantKind> for ServeKind {
    fn from(kind: VariantKind) -> Self {
        match kind {
            VariantKind::Thumbnail => ServeKind::Thumbnail,
            VariantKind::Medium => ServeKind::Medium,
        }
    }
}

impl fmt::Display for ServeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_kind() {
            Some(kind) => kind.fmt(f),
            None => write!(f, "original"),
        }
    }
}

impl FromStr for ServeKind {
    type Err = ServingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("original") {
            return Ok(ServeKind::Original);
        }
        s.parse::<VariantKind>()
            .map(ServeKind::from)
            .map_err(|_| ServingError::InvalidKind(s.to_string()))
    }
}

/// How the client gets the bytes.
pub enum ServingTarget {
    /// Time-limited URL the client is redirected to.
    Redirect {
        url: String,
        expires_at: DateTime<Utc>,
    },
    /// Bytes streamed through the application.
    Stream {
        body: ByteStream,
        content_type: String,
        content_length: u64,
    },
}

impl fmt::Debug for ServingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingTarget::Redirect { url, expires_at } => f
                .debug_struct("Redirect")
                .field("url", url)
                .field("expires_at", expires_at)
                .finish(),
            ServingTarget::Stream {
                content_type,
                content_length,
                ..
            } => f
                .debug_struct("Stream")
                .field("content_type", content_type)
                .field("content_length", content_length)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub struct ServedFile {
    pub target: ServingTarget,
    /// What was actually served.
    pub served: ServeKind,
    /// True when `served` is not what was requested.
    pub degraded: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ServingError {
    #[error("File not found: {0}")]
    FileNotFound(Uuid),

    #[error("Invalid serve kind: {0}")]
    InvalidKind(String),

    #[error("No servable object for file {file_id}: {reason}")]
    Unavailable { file_id: Uuid, reason: String },

    #[error(transparent)]
    Lookup(#[from] AppError),
}

impl From<ServingError> for AppError {
    fn from(err: ServingError) -> Self {
        match err {
            ServingError::FileNotFound(id) => AppError::NotFound(format!("File {}", id)),
            ServingError::InvalidKind(kind) => {
                AppError::InvalidInput(format!("Invalid serve kind: {}", kind))
            }
            ServingError::Unavailable { reason, .. } => AppError::StorageUnavailable(reason),
            ServingError::Lookup(e) => e,
        }
    }
}
