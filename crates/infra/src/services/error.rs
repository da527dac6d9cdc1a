use thiserror::Error;

use stockroom_core::{DetailId, DomainError, OrderId};

use crate::error::StoreError;

/// Every failure an order, catalog or stock operation can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Bad input shape (missing code, non-positive quantity, negative price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Header, line or item absent.
    #[error("{0} not found")]
    NotFound(String),

    /// The order is frozen.
    #[error("{0} is already confirmed")]
    AlreadyConfirmed(String),

    /// Malformed identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Corrupt or exhausted code series.
    #[error("sequence failure: {0}")]
    Sequence(String),

    /// A stock adjustment failed while confirming; nothing was applied and
    /// the order is still a draft.
    #[error("confirmation of order {header_id} aborted with {} line(s) pending: {reason}", .pending.len())]
    PartialConfirmation {
        header_id: OrderId,
        pending: Vec<DetailId>,
        reason: String,
    },

    /// Uniqueness or invariant conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying persistence failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Failures the caller cannot fix by changing the request.
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            ServiceError::Sequence(_)
                | ServiceError::PartialConfirmation { .. }
                | ServiceError::Storage(_)
        )
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Conflict(msg),
            DomainError::InvalidId(msg) => ServiceError::InvalidIdentifier(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::AlreadyConfirmed(what) => ServiceError::AlreadyConfirmed(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Storage(msg) => ServiceError::Storage(msg),
            StoreError::Sequence(err) => ServiceError::Sequence(err.to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::NotFound(what) => ServiceError::NotFound(what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_orders::SequenceError;

    #[test]
    fn domain_errors_map_one_to_one() {
        assert_eq!(
            ServiceError::from(DomainError::invalid_id("nope")),
            ServiceError::InvalidIdentifier("nope".to_string())
        );
        assert_eq!(
            ServiceError::from(DomainError::already_confirmed("purchase 0000000001")),
            ServiceError::AlreadyConfirmed("purchase 0000000001".to_string())
        );
    }

    #[test]
    fn store_errors_keep_their_class() {
        let err = ServiceError::from(StoreError::Sequence(SequenceError::NonNumeric("A1".into())));
        assert!(matches!(err, ServiceError::Sequence(_)));
        assert!(err.is_server_side());

        let err = ServiceError::from(StoreError::NotFound("item 1".into()));
        assert_eq!(err.to_string(), "item 1 not found");
        assert!(!err.is_server_side());
    }
}
