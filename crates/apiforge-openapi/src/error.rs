//! Error types for request resolution and dispatch.

use thiserror::Error;

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Broad classification of a [`ProviderError`].
///
/// Every kind is fatal to the call it was raised in; none of them are retried
/// by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The API description or the operator configuration is inconsistent
    Configuration,
    /// The refresh token exchange did not produce an access token
    UpstreamAuth,
    /// The verb is unknown or not declared for the resource
    UnsupportedMethod,
    /// The underlying HTTP call failed
    Transport,
    /// A description or configuration document could not be decoded
    Decode,
}

/// Errors that can occur while resolving and dispatching a resource request.
///
/// Messages carry resource, scheme and URL context but never header or
/// credential values.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// An operation requires a security scheme the credentials do not define
    #[error(
        "security scheme '{scheme}' required by '{url}' is not defined, make sure the provider credentials contain an entry named '{scheme}'"
    )]
    MissingSecurityDefinition { scheme: String, url: String },

    /// A credential was supplied for a scheme the description does not declare
    #[error("credential '{0}' does not match any security scheme declared in the API description")]
    UnknownSecurityScheme(String),

    /// The operator selected a region the backend does not serve
    #[error("region '{region}' is not supported, expected one of [{}]", .supported.join(", "))]
    UnknownRegion {
        region: String,
        supported: Vec<String>,
    },

    /// Path ids do not satisfy the resource path template
    #[error(
        "resource '{resource}' path '{template}' expects {expected} parent id(s) but {given} were provided"
    )]
    MissingPathIds {
        resource: String,
        template: String,
        expected: usize,
        given: usize,
    },

    /// An instance level call was made without an instance id
    #[error("instance id is required to build the URL of resource '{0}'")]
    MissingInstanceId(String),

    /// Generic configuration inconsistency
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The refresh token endpoint answered with an unexpected status
    #[error(
        "refresh token POST '{url}' returned status code '{status}', expected one of [200, 204]"
    )]
    RefreshTokenStatus { url: String, status: u16 },

    /// The refresh token endpoint did not return an access token
    #[error("refresh token POST '{url}' response is missing the '{header}' header")]
    MissingAccessToken { url: String, header: String },

    /// The verb is not one of GET, POST, PUT, DELETE or the resource lacks it
    #[error("method '{method}' is not supported for resource '{resource}'")]
    UnsupportedMethod { method: String, resource: String },

    /// HTTP request error
    #[error("HTTP request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Invalid OpenAPI description
    #[error("Invalid API description: {0}")]
    InvalidDescription(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProviderError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::MissingSecurityDefinition { .. }
            | ProviderError::UnknownSecurityScheme(_)
            | ProviderError::UnknownRegion { .. }
            | ProviderError::MissingPathIds { .. }
            | ProviderError::MissingInstanceId(_)
            | ProviderError::Configuration(_)
            | ProviderError::InvalidDescription(_) => ErrorKind::Configuration,
            ProviderError::RefreshTokenStatus { .. } | ProviderError::MissingAccessToken { .. } => {
                ErrorKind::UpstreamAuth
            }
            ProviderError::UnsupportedMethod { .. } => ErrorKind::UnsupportedMethod,
            ProviderError::Transport { .. } => ErrorKind::Transport,
            ProviderError::UrlError(_)
            | ProviderError::JsonError(_)
            | ProviderError::YamlError(_)
            | ProviderError::IoError(_) => ErrorKind::Decode,
        }
    }

    /// Helper for creating configuration errors
    pub fn config(msg: impl Into<String>) -> Self {
        ProviderError::Configuration(msg.into())
    }
}
