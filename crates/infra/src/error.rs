//! Infrastructure error model.
//!
//! Business rejections stay [`DomainError`]s end to end; storage faults and
//! exhausted concurrency retries are added on top.

use thiserror::Error;

use stockledger_core::{DomainError, ErrorKind};

/// Store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stored version moved since the caller loaded it.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The location serial index already maps this serial to another aggregate.
    #[error("serial number '{0}' already exists at this location")]
    DuplicateSerial(String),

    /// Backend failure (lock poisoning for in-memory stores).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error surfaced by [`crate::StockLedger`] and [`crate::DocumentLifecycle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    #[error("gave up on {aggregate} after {attempts} conflicting writes")]
    RetriesExhausted { aggregate: String, attempts: u32 },
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateSerial(serial) => {
                ServiceError::Domain(DomainError::DuplicateSerial(serial))
            }
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(err) => err.code(),
            ServiceError::Store(StoreError::Concurrency(_)) => "CONFLICT",
            ServiceError::Store(StoreError::DuplicateSerial(_)) => "DUPLICATE_SERIAL",
            ServiceError::Store(StoreError::Unavailable(_)) => "STORE_UNAVAILABLE",
            ServiceError::RetriesExhausted { .. } => "CONFLICT",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(err) => err.kind(),
            ServiceError::Store(StoreError::DuplicateSerial(_)) => ErrorKind::Resource,
            ServiceError::Store(StoreError::Concurrency(_))
            | ServiceError::RetriesExhausted { .. } => ErrorKind::Conflict,
            ServiceError::Store(StoreError::Unavailable(_)) => ErrorKind::Internal,
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_index_violation_surfaces_as_domain_duplicate() {
        let err: ServiceError = StoreError::DuplicateSerial("SN1".into()).into();
        assert_eq!(err, ServiceError::Domain(DomainError::DuplicateSerial("SN1".into())));
        assert_eq!(err.code(), "DUPLICATE_SERIAL");
    }

    #[test]
    fn codes_pass_through() {
        let err = ServiceError::from(DomainError::insufficient(1, 2));
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(err.kind(), ErrorKind::Resource);

        let err = ServiceError::from(StoreError::Unavailable("lock poisoned".into()));
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err = ServiceError::RetriesExhausted {
            aggregate: "x".into(),
            attempts: 5,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
