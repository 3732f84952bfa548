use marquee_shared::SeatLabel;

/// Per-request failure taxonomy. Everything here is recoverable and reported
/// to the caller; only startup failures abort the process.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input, rejected synchronously and never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested seats were not all free at hold time. The caller picks
    /// different seats; this is not an internal fault.
    #[error("seats unavailable: [{}]", .0.iter().map(SeatLabel::as_str).collect::<Vec<_>>().join(", "))]
    Conflict(Vec<SeatLabel>),

    /// Payment settled after the hold lapsed. The caller owes the customer a
    /// refund through the gateway.
    #[error("hold expired before payment completed")]
    Expired,

    /// The target reservation already reached a terminal state.
    #[error("reservation is already in a terminal state")]
    Stale,

    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying store transaction failed. Reads may be retried; writes must
    /// re-check state first.
    #[error("store unavailable: {0}")]
    Store(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
