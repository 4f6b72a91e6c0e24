//! Error taxonomy for lifecycle operations.

use crate::environment::{DeliveryError, StoreError, UploadError};
use std::fmt;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// External capability that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// Binary image storage
    ImageStore,
    /// OTP delivery transport
    Notifier,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageStore => f.write_str("image store"),
            Self::Notifier => f.write_str("notifier"),
        }
    }
}

/// How a dependency failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyFailure {
    /// The service is not configured; an operator must fix settings
    Misconfigured,
    /// The service refused the request (credentials, signature)
    Rejected,
    /// The service could not be reached or timed out
    Unavailable,
}

/// Every way a lifecycle operation can fail.
///
/// All variants except [`LifecycleError::Internal`] are anticipated control
/// flow and carry a message safe to show to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    /// Request input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// No event with this identifier.
    #[error("Event not found")]
    NotFound,

    /// The event was soft-deleted and deleted events were not requested.
    #[error("Event has been deleted")]
    Gone,

    /// The caller does not own the event.
    #[error("Not authorized to access this event")]
    Forbidden,

    /// Transition attempted out of order.
    #[error("{0}")]
    PreconditionFailed(String),

    /// The OTP validity window has passed; a new code must be requested.
    #[error("OTP has expired, please request a new code")]
    OtpExpired,

    /// The supplied OTP does not match the last issued code.
    #[error("Invalid OTP")]
    OtpMismatch,

    /// An external capability failed before any state was changed.
    #[error("{dependency} failed: {message}")]
    Dependency {
        /// Which capability failed
        dependency: Dependency,
        /// Failure category
        failure: DependencyFailure,
        /// Caller-facing description
        message: String,
        /// What an operator can do about it
        remediation: Option<String>,
    },

    /// Anything unanticipated.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable error kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`LifecycleError::Validation`]
    Validation,
    /// See [`LifecycleError::NotFound`]
    NotFound,
    /// See [`LifecycleError::Gone`]
    Gone,
    /// See [`LifecycleError::Forbidden`]
    Forbidden,
    /// See [`LifecycleError::PreconditionFailed`]
    PreconditionFailed,
    /// See [`LifecycleError::OtpExpired`]
    OtpExpired,
    /// See [`LifecycleError::OtpMismatch`]
    OtpMismatch,
    /// See [`LifecycleError::Dependency`]
    Dependency,
    /// See [`LifecycleError::Internal`]
    Internal,
}

impl ErrorKind {
    /// Stable code string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Gone => "GONE",
            Self::Forbidden => "FORBIDDEN",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::OtpMismatch => "OTP_INVALID",
            Self::Dependency => "DEPENDENCY_FAILED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl LifecycleError {
    /// The stable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound => ErrorKind::NotFound,
            Self::Gone => ErrorKind::Gone,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::OtpExpired => ErrorKind::OtpExpired,
            Self::OtpMismatch => ErrorKind::OtpMismatch,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` only for failures nobody planned for.
    ///
    /// # Examples
    ///
    /// ```
    /// # use eventday_core::LifecycleError;
    /// assert!(LifecycleError::Internal("boom".into()).is_unexpected());
    /// assert!(!LifecycleError::OtpMismatch.is_unexpected());
    /// ```
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Operator hint for dependency failures.
    #[must_use]
    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::Dependency { remediation, .. } => remediation.as_deref(),
            _ => None,
        }
    }
}

impl From<UploadError> for LifecycleError {
    fn from(err: UploadError) -> Self {
        let (failure, remediation) = match &err {
            UploadError::Misconfigured { remediation, .. } => {
                (DependencyFailure::Misconfigured, Some(remediation.clone()))
            },
            UploadError::Rejected { remediation, .. } => {
                (DependencyFailure::Rejected, remediation.clone())
            },
            UploadError::Transient(_) => (DependencyFailure::Unavailable, None),
        };
        Self::Dependency {
            dependency: Dependency::ImageStore,
            failure,
            message: format!("Image upload failed: {err}"),
            remediation,
        }
    }
}

impl From<DeliveryError> for LifecycleError {
    fn from(err: DeliveryError) -> Self {
        let (failure, remediation) = match &err {
            DeliveryError::Misconfigured { remediation, .. } => {
                (DependencyFailure::Misconfigured, Some(remediation.clone()))
            },
            DeliveryError::Transient(_) => (DependencyFailure::Unavailable, None),
        };
        Self::Dependency {
            dependency: Dependency::Notifier,
            failure,
            message: format!("OTP delivery failed: {err}"),
            remediation,
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_codes() {
        assert_eq!(LifecycleError::OtpMismatch.kind().as_str(), "OTP_INVALID");
        assert_eq!(LifecycleError::Gone.kind().as_str(), "GONE");
        assert_eq!(
            LifecycleError::PreconditionFailed("x".into()).kind(),
            ErrorKind::PreconditionFailed
        );
    }

    #[test]
    fn misconfigured_upload_keeps_remediation() {
        let err: LifecycleError = UploadError::Misconfigured {
            message: "no credentials".into(),
            remediation: "set CLOUDINARY_API_KEY".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.remediation(), Some("set CLOUDINARY_API_KEY"));
        assert!(matches!(
            err,
            LifecycleError::Dependency {
                dependency: Dependency::ImageStore,
                failure: DependencyFailure::Misconfigured,
                ..
            }
        ));
    }

    #[test]
    fn transient_delivery_is_unavailable() {
        let err: LifecycleError = DeliveryError::Transient("timeout".into()).into();
        assert!(matches!(
            err,
            LifecycleError::Dependency {
                dependency: Dependency::Notifier,
                failure: DependencyFailure::Unavailable,
                remediation: None,
                ..
            }
        ));
    }

    #[test]
    fn store_errors_are_internal() {
        let err: LifecycleError = StoreError::Backend("connection reset".into()).into();
        assert!(err.is_unexpected());
    }
}
