//! Refund rules for guest cancellations. The refundable share depends only
//! on the booking's policy and how many whole days remain before check-in
//! on the day of cancellation.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{CancellationPolicy, Money};

/// Refund owed for cancelling a booking of `total` on `cancelled_on`.
///
/// Flexible: full refund up to 1 day before check-in.
/// Moderate: full refund 14+ days out, half 5+ days out.
/// Strict: half refund 7+ days out, nothing later.
pub fn refund_amount(
    total: Money,
    policy: CancellationPolicy,
    check_in: NaiveDate,
    cancelled_on: NaiveDate,
) -> Money {
    let days_before = (check_in - cancelled_on).num_days();
    let percent: u32 = match policy {
        CancellationPolicy::Flexible if days_before >= 1 => 100,
        CancellationPolicy::Moderate if days_before >= 14 => 100,
        CancellationPolicy::Moderate if days_before >= 5 => 50,
        CancellationPolicy::Strict if days_before >= 7 => 50,
        _ => 0,
    };
    (total * Decimal::from(percent) / Decimal::from(100))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The non-refundable remainder the guest forfeits.
pub fn cancellation_fee(total: Money, refund: Money) -> Money {
    (total - refund).max(Decimal::ZERO)
}

/// Guest-facing summary of a policy's terms.
pub fn policy_description(policy: CancellationPolicy) -> &'static str {
    match policy {
        CancellationPolicy::Flexible => {
            "Full refund for cancellations made at least 1 day before check-in"
        }
        CancellationPolicy::Moderate => {
            "Full refund at least 14 days before check-in, 50% refund at least 5 days before"
        }
        CancellationPolicy::Strict => {
            "50% refund for cancellations made at least 7 days before check-in, no refund after"
        }
    }
}
