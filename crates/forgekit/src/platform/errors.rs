use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when talking to a git hosting provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The referenced resource does not exist server-side.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The server returned an object missing a required field.
    #[error("Validation failed: {kind} is missing required field `{field}`")]
    ValidationFailed {
        kind: &'static str,
        field: &'static str,
    },

    /// A desired state that cannot be expressed for this resource.
    #[error("Invalid desired state: {message}")]
    InvalidInfo { message: String },

    /// Network or connection failure.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication required or failed.
    #[error("Authentication required")]
    AuthRequired,

    /// Rate limit exceeded.
    #[error("Rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// The provider cannot perform this operation.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    /// The caller's cancel token fired or its deadline passed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Another error with added context. The kind of `source` is preserved.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ProviderError>,
    },
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(". Resets at {at}"),
        None => String::new(),
    }
}

impl ProviderError {
    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid desired state error.
    #[inline]
    pub fn invalid_info(message: impl Into<String>) -> Self {
        Self::InvalidInfo {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    #[inline]
    pub fn unsupported(provider: &'static str, operation: &'static str) -> Self {
        Self::Unsupported {
            provider,
            operation,
        }
    }

    /// Wrap this error with context.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any context wrappers.
    pub fn root(&self) -> &ProviderError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error means the resource is absent.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Check if this error is a rate limit error (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), Self::RateLimited { .. })
    }

    /// Check if the provider cannot perform the operation at all.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self.root(), Self::Unsupported { .. })
    }

    /// Check if this error is a transport failure.
    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self.root(), Self::Transport { .. })
    }

    /// Check if this error is a malformed server response.
    #[inline]
    pub fn is_validation_failed(&self) -> bool {
        matches!(self.root(), Self::ValidationFailed { .. })
    }

    /// Check if the operation was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// Extension for attaching context to provider results.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with a context message.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], building the message lazily.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;

    /// Name `resource` in a NotFound error instead of the request path.
    fn for_resource(self, resource: &dyn std::fmt::Display) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }

    fn for_resource(self, resource: &dyn std::fmt::Display) -> Result<T> {
        self.map_err(|e| match e {
            ProviderError::NotFound { .. } => ProviderError::not_found(resource.to_string()),
            other => other,
        })
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps table output and
/// log lines compact when a server returns a multi-line body.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
