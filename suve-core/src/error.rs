//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Encryption layer error type
///
/// Wrong passphrases and tampered ciphertext are deliberately reported as the
/// same `DecryptionFailed` variant.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CryptoError {
    /// Data handed to `decrypt` does not carry the format marker
    #[error("data is not encrypted")]
    NotEncrypted,

    /// Unsupported format version byte or truncated blob
    #[error("invalid encrypted data format: {0}")]
    InvalidFormat(String),

    /// Wrong passphrase or corrupted ciphertext
    #[error("decryption failed: invalid passphrase or corrupted data")]
    DecryptionFailed,

    /// Cipher construction or encryption failure
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Argon2 parameter or derivation failure
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Encryption / decryption error
    #[error("{0}")]
    Crypto(#[from] CryptoError),

    /// Storage layer error (filesystem, agent memory)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Source of a push/pop/persist/drain held nothing
    #[error("nothing to transfer")]
    NothingToTransfer,

    /// The agent holds no staged changes
    #[error("nothing staged")]
    NothingStaged,

    /// The user cancelled an interactive choice
    #[error("operation cancelled")]
    Cancelled,

    /// Starting or reaching the staging agent failed
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    /// Remote item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote item already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Error reported by the remote service
    #[error("Remote error: {service} - {message}")]
    Remote { service: String, message: String },

    /// Service name outside the known set
    #[error("Unknown service: {0}")]
    UnknownService(String),
}

impl CoreError {
    /// Whether it is expected behavior (user input, empty staging area, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::NothingToTransfer
            | Self::NothingStaged
            | Self::Cancelled
            | Self::ValidationError(_)
            | Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::UnknownService(_) => true,
            Self::Crypto(e) => matches!(
                e,
                CryptoError::NotEncrypted | CryptoError::DecryptionFailed
            ),
            Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::AgentUnavailable(_)
            | Self::Remote { .. } => false,
        }
    }
}

/// A failure that happened after the durable half of a transfer succeeded
///
/// Callers render this as a warning and still report success.
#[derive(Error, Debug, Serialize)]
#[error("durable write already succeeded, but cleanup failed: {error}")]
pub struct NonFatalError {
    /// Underlying failure
    pub error: CoreError,
    /// Whether the destination write had already completed
    pub durable_write_succeeded: bool,
}

impl NonFatalError {
    /// Wrap a cleanup failure that followed a successful destination write
    #[must_use]
    pub fn after_write(error: CoreError) -> Self {
        Self {
            error,
            durable_write_succeeded: true,
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
