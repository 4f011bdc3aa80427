//! Unified error handling with Sentry integration.
//!
//! Every fallible operation in this crate returns [`ClientError`]. The
//! variants follow one rule each:
//!
//! - [`ClientError::Auth`] - a 401 on an authenticated call has already
//!   cleared the session by the time the caller sees it.
//! - [`ClientError::Validation`] - raised before any network call; always
//!   recoverable by fixing the input.
//! - [`ClientError::Conflict`] / [`ClientError::Network`] - returned to the
//!   immediate caller; the local state held before the call is retained.
//! - [`ClientError::DataIntegrity`] - persisted session data could not be
//!   read or written; the affected data is treated as absent.
//! - [`ClientError::Pending`] - the operation is guarded against re-entry and
//!   a previous call has not finished yet.

use mercado_core::EmailError;
use thiserror::Error;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Authentication failed or the session is gone.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Input failed a client-side check.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The backend refused the request for a domain reason.
    #[error("Rejected: {message}")]
    Conflict {
        /// HTTP status code returned by the backend, if the refusal came
        /// from the network rather than an advisory local check.
        status: Option<u16>,
        /// Message extracted from the response body.
        message: String,
    },

    /// The request did not produce a usable response.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Persisted session data is corrupt or could not be written.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// A guarded operation is already running.
    #[error("{0} already in progress")]
    Pending(&'static str),
}

/// Authentication failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login or registration was refused by the backend.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The backend rejected the stored credential (expired or revoked).
    #[error("session expired")]
    SessionExpired,

    /// An authenticated operation was attempted without a session.
    #[error("not signed in")]
    NotAuthenticated,
}

/// Client-side validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are blank.
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields {
        /// Names of the blank fields, in form order.
        fields: Vec<&'static str>,
    },

    /// Cart quantities start at 1.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Checkout needs a non-empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A checkout transition was requested from a step that does not allow it.
    #[error("cannot {action} from the {step} step")]
    WrongStep {
        /// The transition that was attempted.
        action: &'static str,
        /// The step the checkout was on.
        step: &'static str,
    },
}

/// Transport-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The fixed client-side timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a 5xx status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.into())
    }
}

impl ClientError {
    /// Whether this error means the user is (now) signed out.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Whether this error points at the backend or the client rather than
    /// at user input. These are reported to Sentry.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::Network(NetworkError::Server { .. } | NetworkError::Malformed(_))
                | Self::DataIntegrity(_)
        )
    }

    /// Message suitable for showing to the user.
    ///
    /// Internal details (status codes, parser output) are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials(msg) if !msg.trim().is_empty() => msg.clone(),
                AuthError::InvalidCredentials(_) => "Invalid email or password".to_string(),
                AuthError::SessionExpired => {
                    "Your session has expired, please sign in again".to_string()
                }
                AuthError::NotAuthenticated => "Please sign in to continue".to_string(),
            },
            Self::Validation(err) => match err {
                ValidationError::MissingFields { fields } => {
                    format!("Please fill in: {}", fields.join(", "))
                }
                ValidationError::InvalidQuantity => "Quantity must be at least 1".to_string(),
                ValidationError::InvalidEmail(_) => "Please enter a valid email address".to_string(),
                ValidationError::EmptyCart => "Your cart is empty".to_string(),
                ValidationError::WrongStep { .. } => {
                    "This checkout step is not available right now".to_string()
                }
            },
            Self::Conflict { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Conflict { .. } => "The request could not be completed".to_string(),
            Self::Network(NetworkError::Timeout) => {
                "The server took too long to respond, please try again".to_string()
            }
            Self::Network(_) => "Connection error, please try again".to_string(),
            Self::DataIntegrity(_) => "Saved session data was unreadable, please sign in again".to_string(),
            Self::Pending(what) => format!("Please wait, {what} is still in progress"),
        }
    }

    /// Log the error and, for faults, capture it to Sentry.
    pub(crate) fn report(&self, operation: &str) {
        if self.is_fault() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                operation,
                sentry_event_id = %event_id,
                "Storefront client error"
            );
        } else {
            tracing::debug!(error = %self, operation, "Storefront client operation failed");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from the signed-in identity.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout and on session expiry.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart,
/// checkout and order actions leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
