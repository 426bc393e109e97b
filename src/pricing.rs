//! Stay pricing: nightly rate times nights, minus an optional promotion.
//!
//! All money math is `Decimal`; the discount is rounded half-up to two
//! decimal places before it is applied, so the journalled total is exactly
//! what the guest was quoted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::engine::BookingError;
use crate::model::{Promotion, Quote, Room};

/// Promotion window boundaries are shown to guests in this format.
const WINDOW_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Price a stay, applying `promotion` if it is valid for the room's hotel
/// at `now`.
pub fn quote(
    room: &Room,
    promotion: Option<&Promotion>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: u32,
    now: DateTime<Utc>,
) -> Result<Quote, BookingError> {
    if check_in < now.date_naive() {
        return Err(BookingError::Validation(
            "check-in date cannot be in the past".into(),
        ));
    }
    if check_out <= check_in {
        return Err(BookingError::Validation(
            "check-out date must be after check-in date".into(),
        ));
    }
    if guests == 0 {
        return Err(BookingError::Validation(
            "at least one guest is required".into(),
        ));
    }
    if guests > room.capacity {
        return Err(BookingError::Validation(format!(
            "number of guests ({guests}) exceeds room capacity ({})",
            room.capacity
        )));
    }

    let nights = Decimal::from((check_out - check_in).num_days().max(1));
    let original_price = room.base_price * nights;

    let (discount_amount, applied_coupon) = match promotion {
        Some(promo) => {
            validate_promotion(promo, room, now)?;
            (discount(original_price, promo), Some(promo.code.clone()))
        }
        None => (Decimal::ZERO, None),
    };

    let final_price = (original_price - discount_amount).max(Decimal::ZERO);
    Ok(Quote {
        original_price,
        discount_amount,
        final_price,
        applied_coupon,
    })
}

fn validate_promotion(
    promo: &Promotion,
    room: &Room,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    if !promo.active {
        return Err(BookingError::PromotionInvalid(format!(
            "promotion code {} is not active",
            promo.code
        )));
    }
    if now < promo.starts_at {
        return Err(BookingError::PromotionInvalid(format!(
            "promotion code {} is not valid until {}",
            promo.code,
            promo.starts_at.format(WINDOW_FORMAT)
        )));
    }
    if now > promo.ends_at {
        return Err(BookingError::PromotionInvalid(format!(
            "promotion code {} expired on {}",
            promo.code,
            promo.ends_at.format(WINDOW_FORMAT)
        )));
    }
    if promo.hotel_id.is_some_and(|h| h != room.hotel_id) {
        return Err(BookingError::PromotionInvalid(format!(
            "promotion code {} is not valid for this hotel",
            promo.code
        )));
    }
    if promo.max_usage.is_some_and(|max| promo.current_usage >= max) {
        return Err(BookingError::PromotionInvalid(format!(
            "promotion code {} has reached its usage limit",
            promo.code
        )));
    }
    Ok(())
}

/// Percentage discount rounded half-up to cents, then clamped to the
/// promotion's absolute cap.
fn discount(original_price: Decimal, promo: &Promotion) -> Decimal {
    let raw = original_price * Decimal::from(promo.discount_percent) / Decimal::from(100);
    let rounded = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    match promo.max_discount_amount {
        Some(cap) => rounded.min(cap),
        None => rounded,
    }
}
