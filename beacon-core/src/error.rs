//! Error types for Beacon
//!
//! Three families live here:
//! - [`TrackingError`] for startup and storage operations the host may inspect
//! - [`SdkError`] for failures reported by the vendor tracking SDK
//! - [`AuthError`] for the hosted-auth boundary, the only errors shown to users

use thiserror::Error;

/// Result type for tracking operations
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Result type for SDK calls
pub type SdkResult<T> = Result<T, SdkError>;

/// Result type for hosted-auth calls
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while bootstrapping or persisting tracking state
#[derive(Error, Debug)]
pub enum TrackingError {
    /// The tracking script never became available
    #[error("Tracking SDK never became available after {attempts} attempts")]
    SdkUnavailable { attempts: u32 },

    /// The SDK was found but its initialization failed
    #[error("Tracking SDK initialization failed: {0}")]
    InitFailed(#[source] SdkError),

    /// Consent storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the vendor SDK
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The SDK refused the call
    #[error("SDK rejected call: {0}")]
    Rejected(String),

    /// Network or transport failure inside the SDK
    #[error("SDK transport error: {0}")]
    Transport(String),
}

/// Errors returned by the hosted-auth provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email or password
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Email already has an account
    #[error("User already registered: {0}")]
    AlreadyRegistered(String),

    /// Form input rejected before reaching the provider
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Any other provider-side failure
    #[error("Auth provider error: {0}")]
    Provider(String),
}
