//! Wardscan errors that can occur at any point during the cache/fetch cycle,
//! from request parsing through storage and validation.

use thiserror::Error;

/// Wrapped result type useful for marshalling between library and dependency errors.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur within the scanner pipeline, including mapped errors
/// from reqwest, rusqlite, and jsonschema.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Represents a malformed request URL that could not be parsed into a [`crate::request::Request`].
    #[error("url `{0}` does not match a recognized Blizzard API request")]
    InvalidRequestUrl(String),
    /// Represents any reqwest failure, propagating the error context.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Represents a stable 404 from the API. Never retried.
    #[error("resource not found")]
    NotFound,
    /// Represents a non-2xx, non-404 HTTP status returned by the API.
    #[error("unexpected status code {0}")]
    Http(u16),
    /// Represents a failure to decode a response body into the expected type.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Represents a validation failure with no remaining repair to apply.
    #[error("response failed validation: {0}")]
    Validation(String),
    /// Represents a failure applying a repair or filter to a decoded value.
    #[error("repair or filter failed: {0}")]
    Repair(String),
    /// Represents a storage backend failure (disk full, corrupt file, etc).
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Represents a stored row whose contents can't be reconstructed, e.g.
    /// a `stored_at_epoch` that doesn't fall within a representable timestamp.
    #[error("corrupt stored response: {0}")]
    CorruptStoredResponse(String),
    /// Represents a failure to obtain or parse an access token from the OAuth endpoint.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Represents a call made before any access token has been obtained.
    #[error("no access token has been retrieved yet")]
    AccessTokenNotFound,
    /// Represents a schema compilation failure when constructing a [`crate::validate::schema::SchemaValidator`].
    #[error("invalid json schema: {0}")]
    InvalidSchema(String),
}

impl PartialEq for ScanError {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (ScanError::NotFound, ScanError::NotFound)
                | (ScanError::AccessTokenNotFound, ScanError::AccessTokenNotFound)
        )
    }
}
