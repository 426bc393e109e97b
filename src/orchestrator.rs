//! The booking front door. Guests and hosts call these methods; the
//! orchestrator resolves rooms and promotions, prices the stay, enforces
//! ownership, and drives the engine. Side channels (promotion usage,
//! guest notifications) are best-effort and never fail the operation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use ulid::Ulid;

use crate::catalog::{Notifier, PromotionCatalog, RoomCatalog};
use crate::engine::{BookingError, Engine, lifecycle};
use crate::model::{
    Booking, BookingFilter, BookingRequest, BookingStatus, CancelActor, CancellationResult,
    Promotion, Quote, Slot,
};
use crate::sweeper::EXPIRED_REASON;
use crate::{pricing, refund};

pub struct BookingOrchestrator {
    engine: Arc<Engine>,
    rooms: Arc<dyn RoomCatalog>,
    promotions: Arc<dyn PromotionCatalog>,
    notifier: Arc<dyn Notifier>,
    hold_duration: Duration,
}

impl BookingOrchestrator {
    pub fn new(
        engine: Arc<Engine>,
        rooms: Arc<dyn RoomCatalog>,
        promotions: Arc<dyn PromotionCatalog>,
        notifier: Arc<dyn Notifier>,
        hold_duration: Duration,
    ) -> Self {
        Self {
            engine,
            rooms,
            promotions,
            notifier,
            hold_duration,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    async fn resolve_promotion(
        &self,
        coupon_code: Option<&str>,
    ) -> Result<Option<Promotion>, BookingError> {
        match coupon_code {
            Some(code) => Ok(Some(self.promotions.find_by_code(code).await?)),
            None => Ok(None),
        }
    }

    /// Price a prospective stay without reserving anything.
    pub async fn quote(&self, request: &BookingRequest) -> Result<Quote, BookingError> {
        let room = self.rooms.room(request.room_id).await?;
        let promotion = self.resolve_promotion(request.coupon_code.as_deref()).await?;
        pricing::quote(
            &room,
            promotion.as_ref(),
            request.check_in,
            request.check_out,
            request.guests,
            Utc::now(),
        )
    }

    /// Place a hold: price the stay and create a PENDING booking whose
    /// dates are locked until the payment deadline. Expired holds on the
    /// room are reclaimed first, so a guest is never refused dates that
    /// are only nominally taken.
    pub async fn create(
        &self,
        user_id: Ulid,
        request: BookingRequest,
    ) -> Result<Booking, BookingError> {
        let room = self.rooms.room(request.room_id).await?;
        let now = Utc::now();
        self.engine
            .reclaim_expired_for_room(room.id, now, EXPIRED_REASON)
            .await?;

        let promotion = self.resolve_promotion(request.coupon_code.as_deref()).await?;
        let quote = pricing::quote(
            &room,
            promotion.as_ref(),
            request.check_in,
            request.check_out,
            request.guests,
            now,
        )?;

        let booking = Booking {
            id: Ulid::new(),
            room_id: room.id,
            user_id,
            check_in: request.check_in,
            check_out: request.check_out,
            guests: request.guests,
            total_price: quote.final_price,
            status: BookingStatus::Pending,
            coupon_code: quote.applied_coupon,
            locked_until: Some(now + self.hold_duration),
            cancellation_policy: request.cancellation_policy.unwrap_or_default(),
            refund_amount: None,
            cancellation_fee: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            checked_in_at: None,
            checked_out_at: None,
            cancelled_at: None,
        };
        self.engine.create_booking(booking.clone()).await?;
        Ok(booking)
    }

    /// Payment completed: confirm the hold. Promotion usage and the guest
    /// notification are best-effort follow-ups.
    pub async fn confirm(&self, user_id: Ulid, booking_id: Ulid) -> Result<Booking, BookingError> {
        let booking = self.engine.get_booking(booking_id).await?;
        self.ensure_owner(&booking, user_id)?;

        let confirmed = self.engine.confirm_booking(booking_id).await?;

        if let Some(code) = &confirmed.coupon_code
            && let Err(e) = self.promotions.increment_usage(code).await
        {
            warn!(booking = %booking_id, "failed to record promotion usage for {code}: {e}");
        }

        let notifier = self.notifier.clone();
        let snapshot = confirmed.clone();
        tokio::spawn(async move {
            notifier.booking_confirmed(&snapshot).await;
        });

        Ok(confirmed)
    }

    /// Guest cancellation: compute the refund under the booking's policy,
    /// cancel, and release the dates.
    pub async fn cancel(
        &self,
        user_id: Ulid,
        booking_id: Ulid,
        reason: Option<String>,
    ) -> Result<CancellationResult, BookingError> {
        let booking = self.engine.get_booking(booking_id).await?;
        self.ensure_owner(&booking, user_id)?;
        if !lifecycle::can_be_cancelled(booking.status) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        let today = Utc::now().date_naive();
        let refund_amount = refund::refund_amount(
            booking.total_price,
            booking.cancellation_policy,
            booking.check_in,
            today,
        );
        let fee = refund::cancellation_fee(booking.total_price, refund_amount);

        let cancelled = self
            .engine
            .cancel_booking(
                booking_id,
                CancelActor::Guest,
                reason,
                Some(refund_amount),
                Some(fee),
            )
            .await?;

        let notifier = self.notifier.clone();
        let snapshot = cancelled.clone();
        tokio::spawn(async move {
            notifier.booking_cancelled(&snapshot).await;
        });

        let message = if refund_amount > Decimal::ZERO {
            format!(
                "Booking cancelled. You will be refunded {refund_amount} within 5-7 business days."
            )
        } else {
            "Booking cancelled. No refund available based on cancellation policy.".to_string()
        };

        Ok(CancellationResult {
            booking_id,
            status: cancelled.status,
            total_price: cancelled.total_price,
            refund_amount,
            cancellation_fee: fee,
            policy: cancelled.cancellation_policy,
            policy_description: refund::policy_description(cancelled.cancellation_policy),
            cancelled_at: cancelled.cancelled_at.unwrap_or_else(Utc::now),
            message,
        })
    }

    /// Front-desk arrival. The booking must belong to one of the hotel's
    /// rooms.
    pub async fn check_in(&self, hotel_id: Ulid, booking_id: Ulid) -> Result<Booking, BookingError> {
        self.ensure_hotel(hotel_id, booking_id).await?;
        self.engine.check_in(booking_id).await
    }

    /// Front-desk departure.
    pub async fn check_out(
        &self,
        hotel_id: Ulid,
        booking_id: Ulid,
    ) -> Result<Booking, BookingError> {
        self.ensure_hotel(hotel_id, booking_id).await?;
        self.engine.check_out(booking_id).await
    }

    pub async fn get(&self, user_id: Ulid, booking_id: Ulid) -> Result<Booking, BookingError> {
        let booking = self.engine.get_booking(booking_id).await?;
        self.ensure_owner(&booking, user_id)?;
        Ok(booking)
    }

    pub async fn list_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        self.engine.bookings_for_user(user_id).await
    }

    /// Host listing across all of a hotel's rooms.
    pub async fn list_for_hotel(
        &self,
        hotel_id: Ulid,
        filter: &BookingFilter,
    ) -> Result<Vec<Booking>, BookingError> {
        let rooms = self.rooms.rooms_for_hotel(hotel_id).await?;
        let room_ids: HashSet<Ulid> = rooms.iter().map(|r| r.id).collect();
        Ok(self.engine.bookings_matching(filter, Some(&room_ids)).await)
    }

    /// Host pre-block of a free date on one of the hotel's rooms.
    pub async fn block_date(
        &self,
        hotel_id: Ulid,
        room_id: Ulid,
        date: NaiveDate,
        reason: String,
    ) -> Result<(), BookingError> {
        self.ensure_room_in_hotel(hotel_id, room_id).await?;
        self.engine.block_date(room_id, date, reason).await
    }

    pub async fn unblock_date(
        &self,
        hotel_id: Ulid,
        room_id: Ulid,
        date: NaiveDate,
    ) -> Result<(), BookingError> {
        self.ensure_room_in_hotel(hotel_id, room_id).await?;
        self.engine.unblock_date(room_id, date).await
    }

    /// Host calendar view of one room.
    pub async fn occupancy(
        &self,
        hotel_id: Ulid,
        room_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Slot)>, BookingError> {
        self.ensure_room_in_hotel(hotel_id, room_id).await?;
        Ok(self.engine.occupancy(room_id, from, to).await)
    }

    fn ensure_owner(&self, booking: &Booking, user_id: Ulid) -> Result<(), BookingError> {
        if booking.user_id != user_id {
            return Err(BookingError::Unauthorized(format!(
                "booking {} does not belong to user {user_id}",
                booking.id
            )));
        }
        Ok(())
    }

    async fn ensure_hotel(&self, hotel_id: Ulid, booking_id: Ulid) -> Result<(), BookingError> {
        let booking = self.engine.get_booking(booking_id).await?;
        self.ensure_room_in_hotel(hotel_id, booking.room_id).await
    }

    async fn ensure_room_in_hotel(
        &self,
        hotel_id: Ulid,
        room_id: Ulid,
    ) -> Result<(), BookingError> {
        let room = self.rooms.room(room_id).await?;
        if room.hotel_id != hotel_id {
            return Err(BookingError::Unauthorized(format!(
                "room {room_id} does not belong to hotel {hotel_id}"
            )));
        }
        Ok(())
    }
}
