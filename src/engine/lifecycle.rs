//! The booking state machine. Pure logic over a `Booking` row: which status
//! transitions are legal, and which timestamp each one stamps.

use chrono::{DateTime, Utc};

use crate::model::{Booking, BookingStatus};

use super::BookingError;

/// Whether `from → to` is a legal transition.
///
/// Re-applying an already-applied transition is rejected rather than
/// silently repeated, so callers retrying into a terminal-adjacent state
/// must treat `InvalidTransition` as "already done".
pub fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    match from {
        Pending => matches!(to, Confirmed | Cancelled),
        Confirmed => matches!(to, CheckedIn | Cancelled),
        CheckedIn => matches!(to, Completed | Cancelled),
        Completed | Cancelled => false,
    }
}

/// Validate `from → to`, returning the structured error on an illegal move.
pub fn ensure_transition(from: BookingStatus, to: BookingStatus) -> Result<(), BookingError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(BookingError::InvalidTransition { from, to })
    }
}

/// Apply a validated transition, stamping the timestamp the target state
/// produces (checked_in_at / checked_out_at / cancelled_at, in UTC).
pub fn transition(
    booking: &mut Booking,
    to: BookingStatus,
    at: DateTime<Utc>,
) -> Result<(), BookingError> {
    ensure_transition(booking.status, to)?;
    booking.status = to;
    match to {
        BookingStatus::CheckedIn => booking.checked_in_at = Some(at),
        BookingStatus::Completed => booking.checked_out_at = Some(at),
        BookingStatus::Cancelled => booking.cancelled_at = Some(at),
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }
    Ok(())
}

/// A booking can be cancelled from any non-terminal state.
pub fn can_be_cancelled(status: BookingStatus) -> bool {
    !status.is_terminal()
}

pub fn can_check_in(status: BookingStatus) -> bool {
    status == BookingStatus::Confirmed
}

pub fn can_check_out(status: BookingStatus) -> bool {
    status == BookingStatus::CheckedIn
}
