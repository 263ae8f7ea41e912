//! Unified error types for `ExpenseBuddy`.
//!
//! Every fallible operation in the crate returns [`Result`]. Business rejections
//! (expired invite codes, recurring expenses that are not due yet, role checks)
//! are distinct variants so callers can branch on them; storage failures are
//! wrapped and classified as internal.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entities::Role;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure (config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Integer conversion failure
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Password hashing or verification failed for reasons other than a mismatch
    #[error("Password hashing error: {message}")]
    PasswordHash {
        /// Description from the hasher
        message: String,
    },

    /// No session, unknown or inactive user
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the caller could not be authenticated
        reason: String,
    },

    /// The caller's role is below the one the operation needs
    #[error("Forbidden: requires {required:?}, caller has {actual:?}")]
    Forbidden {
        /// Minimum role for the operation
        required: Role,
        /// Role of the caller
        actual: Role,
    },

    /// Entity absent, or not owned by the caller's organization
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"budget"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed input
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Amount is zero, negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Unique value already taken (email, business name, ...)
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the clash
        message: String,
    },

    /// Invite code is past its expiry date
    #[error("Invite code {code} has expired")]
    InviteExpired {
        /// The code that was presented
        code: String,
    },

    /// Invite code has been used `max_uses` times
    #[error("Invite code {code} has reached its maximum number of uses")]
    MaxUsesReached {
        /// The code that was presented
        code: String,
    },

    /// Code matched neither an invite code nor a legacy organization code
    #[error("Invalid invite code: {code}")]
    InvalidInviteCode {
        /// The code that was presented
        code: String,
    },

    /// Recurring expense cannot be generated before its next due date
    #[error("Recurring expense {id} is not due until {next_due_date}")]
    NotDue {
        /// Recurring expense id
        id: i64,
        /// When generation becomes possible
        next_due_date: DateTime<Utc>,
    },

    /// Recurring expense is past its end date
    #[error("Recurring expense {id} ended on {end_date}")]
    RecurringExpired {
        /// Recurring expense id
        id: i64,
        /// The end date that has passed
        end_date: DateTime<Utc>,
    },
}

/// Coarse classification used by transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 400
    Validation,
    /// 409
    Conflict,
    /// 500
    Internal,
}

impl Error {
    /// Classifies the error into the transport-level taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } | Self::InvalidAmount { .. } | Self::InvalidInviteCode { .. } => {
                ErrorKind::Validation
            }
            Self::Conflict { .. }
            | Self::InviteExpired { .. }
            | Self::MaxUsesReached { .. }
            | Self::NotDue { .. }
            | Self::RecurringExpired { .. } => ErrorKind::Conflict,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::TryFromInt(_)
            | Self::PasswordHash { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Message safe to show to a caller. Internal failures are logged and
    /// replaced by a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.kind() == ErrorKind::Internal {
            tracing::error!("Internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
