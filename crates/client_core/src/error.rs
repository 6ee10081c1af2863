use reqwest::StatusCode;
use shared::domain::ExtensionName;
use thiserror::Error;

/// Failure talking to the remote extension store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("extension store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("extension store returned {status}")]
    Status { status: StatusCode },
    #[error("extension store returned a malformed body: {0}")]
    Decode(String),
    #[error("invalid extension store url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Reasons an add request is refused before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("extension must be alphanumeric")]
    NotAlphanumeric,
    #[error("\"{0}\" is already a fixed extension")]
    AlreadyFixed(ExtensionName),
    #[error("\"{0}\" is already registered")]
    AlreadyRegistered(ExtensionName),
    #[error("maximum {max} custom extensions reached")]
    CapacityReached { max: usize },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{action} failed: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("failed to load extension snapshot: {0}")]
    InitialLoad(#[source] StoreError),
    #[error("\"{0}\" is not a fixed extension")]
    UnknownFixedExtension(String),
    #[error("\"{0}\" is not a registered custom extension")]
    NotRegistered(String),
    #[error("'{extension}' files cannot be uploaded")]
    Blocked { extension: String },
}

impl ControllerError {
    pub(crate) fn remote(action: &'static str, source: StoreError) -> Self {
        Self::Remote { action, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
