//! # Error Handling for Collection Endpoints
//!
//! Every failure a collection request can run into is an [`ApiError`]:
//! - Client mistakes (bad `limit`, unknown filter, wrong operator arity) become a single
//!   aggregated 422 response listing every violation found
//! - Setup mistakes (duplicate filter names, unknown default sort) are configuration errors
//! - Backend failures and unsupported operators are server errors whose details are
//!   logged but never sent to the client
//!
//! ## Logging
//!
//! Internal details are logged through `tracing` when the error is turned into a response.
//! Nothing is printed unless the application installs a subscriber:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_target(false)
//!     .compact()
//!     .init();
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

use crate::validation::{ValidationError, ValidationErrors};

/// Error type for everything that can go wrong while assembling a collection
#[derive(Debug)]
pub enum ApiError {
    /// 500 Internal Server Error - The collection was set up incorrectly
    Configuration {
        /// Description of the setup problem (logged, not sent to user)
        message: String,
    },

    /// 422 Unprocessable Entity - Query parameters failed validation
    ValidationFailed {
        /// Every violation found, in the order they were detected
        errors: Vec<ValidationError>,
    },

    /// 500 Internal Server Error - The backend cannot express an operator
    UnsupportedOperator {
        /// Operator name as given in the query string
        operator: String,
        /// Short name of the backend that refused it
        backend: &'static str,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 502 Bad Gateway - A remote query backend failed
    Backend {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a configuration error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::configuration("duplicate filter type 'created'"));
    /// ```
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a 422 Validation Failed error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::validation_failed(vec![
    ///     ValidationError::new("limit", "The limit must be an integer."),
    /// ]));
    /// ```
    pub fn validation_failed(errors: Vec<ValidationError>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Create an error for an operator the backend has no translation for
    pub fn unsupported_operator(operator: impl Into<String>, backend: &'static str) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
            backend,
        }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    ///
    /// # Example
    /// ```rust,ignore
    /// let total = query.count(db).await.map_err(ApiError::database)?;
    /// ```
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Wrap a failure of a remote query backend
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend {
            message: "The upstream service failed to answer".to_string(),
            internal: err.into(),
        }
    }

    /// Create a 500 Internal Server Error with optional details
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::internal("Failed to render item", Some(err.to_string())));
    /// ```
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Validation errors carried by this error, if it is a validation failure
    #[must_use]
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            Self::ValidationFailed { errors } => Some(errors),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. }
            | Self::UnsupportedOperator { .. }
            | Self::Database { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::Configuration { .. } | Self::UnsupportedOperator { .. } => {
                "The collection is not configured correctly".to_string()
            }
            Self::ValidationFailed { errors } => {
                if errors.len() == 1 {
                    errors[0].message.clone()
                } else {
                    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                    format!("Validation failed: {}", messages.join(", "))
                }
            }
            Self::Database { message, .. }
            | Self::Backend { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Configuration { message } => {
                tracing::error!(details = %message, "Collection configuration error");
            }
            Self::UnsupportedOperator { operator, backend } => {
                tracing::error!(
                    operator = %operator,
                    backend = backend,
                    "Filter operator not supported by backend"
                );
            }
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Backend { internal, .. } => {
                tracing::error!(error = %internal, "Remote backend error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { message } => write!(f, "configuration error: {message}"),
            Self::UnsupportedOperator { operator, backend } => {
                write!(f, "operator '{operator}' is not supported by the {backend} backend")
            }
            _ => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed {
            errors: errors.into_errors(),
        }
    }
}
