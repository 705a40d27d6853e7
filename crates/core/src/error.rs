use crate::models::PaymentStatus;

/// Every failure a lifecycle operation can report.
///
/// Domain variants describe a rule the request broke and are never worth retrying.
/// Storage variants describe an infrastructure fault; see [`CoreError::is_retryable`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid value: {0}")]
    InvalidValue(#[from] carebook_types::ValueError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("payment {payment_id} is not eligible for refund (status: {status})")]
    IneligibleRefund {
        payment_id: i64,
        status: PaymentStatus,
    },
    #[error("time slot overlaps appointment {existing_id}")]
    SlotConflict { existing_id: i64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("failed to create data directory: {0}")]
    DataDir(std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl CoreError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True for infrastructure faults that may succeed on a later attempt.
    ///
    /// A busy or locked database file means another process holds the write lock
    /// for longer than the configured busy timeout.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::LockPoisoned => true,
            _ => false,
        }
    }

    /// True when the error reports a broken business rule rather than a fault.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::DataDir(_) | Self::Database(_) | Self::LockPoisoned
        )
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
