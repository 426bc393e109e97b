use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;

#[derive(Debug, Error)]
pub enum BookingError {
    /// Entity lookup miss. The first field names the entity kind
    /// ("room", "booking", "hotel").
    #[error("{0} not found: {1}")]
    NotFound(&'static str, Ulid),

    #[error("promotion code not found: {0}")]
    PromotionNotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Inventory unavailable or a concurrent claim won the race.
    #[error("{0}")]
    Conflict(String),

    #[error("cannot transition booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Coupon rejected: inactive, outside its window, wrong hotel, or
    /// at its usage limit. Carries the user-facing reason.
    #[error("{0}")]
    PromotionInvalid(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("journal error: {0}")]
    Journal(String),
}

impl BookingError {
    /// True for the errors a caller may retry after re-reading state
    /// (a lost confirm/sweep race or a lost inventory claim).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Conflict(_) | BookingError::InvalidTransition { .. }
        )
    }
}
