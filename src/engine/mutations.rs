use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{RwLock, oneshot};
use tracing::debug;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, CancelActor, Event, Money};
use crate::observability;

use super::calendar::RoomCalendar;
use super::{BookingError, Engine, JournalCommand, SharedBooking, SharedCalendar, lifecycle};

/// Apply a journalled lifecycle event to a booking and its room calendar.
/// Caller holds write locks on both; used by runtime mutations and replay.
pub(super) fn apply_transition(
    booking: &mut Booking,
    cal: &mut RoomCalendar,
    event: &Event,
) -> Result<(), BookingError> {
    match event {
        Event::BookingConfirmed { at, .. } => {
            lifecycle::transition(booking, BookingStatus::Confirmed, *at)?;
            booking.locked_until = None;
            cal.upgrade(booking.id);
        }
        Event::BookingCancelled {
            by,
            reason,
            refund,
            fee,
            at,
            ..
        } => {
            lifecycle::transition(booking, BookingStatus::Cancelled, *at)?;
            booking.cancelled_by = Some(*by);
            booking.cancellation_reason = reason.clone();
            booking.refund_amount = *refund;
            booking.cancellation_fee = *fee;
            booking.locked_until = None;
            let freed = cal.release(booking.id);
            debug!(booking = %booking.id, freed, "released inventory on cancel");
        }
        Event::CheckedIn { at, .. } => {
            lifecycle::transition(booking, BookingStatus::CheckedIn, *at)?;
        }
        Event::CheckedOut { at, .. } => {
            lifecycle::transition(booking, BookingStatus::Completed, *at)?;
        }
        Event::BookingCreated { .. } | Event::DateBlocked { .. } | Event::DateUnblocked { .. } => {}
    }
    Ok(())
}

impl Engine {
    /// Insert a new pending (or pre-confirmed) booking, claiming every night
    /// of its stay on the room calendar. All-or-nothing: either every date
    /// is claimable and the booking lands journalled, or nothing changes.
    pub async fn create_booking(&self, booking: Booking) -> Result<(), BookingError> {
        if self.bookings.contains_key(&booking.id) {
            return Err(BookingError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }

        let now = Utc::now();
        let cal = self.calendar(booking.room_id);
        let mut cal = cal.write().await;
        cal.ensure_claimable(&booking.claimed_dates(), now)
            .inspect_err(|_| {
                metrics::counter!(observability::HOLD_CONFLICTS_TOTAL).increment(1);
            })?;

        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.journal_append(&event).await?;
        cal.claim(&booking, now);
        self.by_user
            .entry(booking.user_id)
            .or_default()
            .push(booking.id);
        let user_id = booking.user_id;
        self.bookings
            .insert(booking.id, Arc::new(RwLock::new(booking)));
        self.notify.send(user_id, &event);
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(())
    }

    /// Confirm a pending booking (payment completed), upgrading its holds to
    /// booked slots. Exactly one of a racing confirm and sweep-cancel wins
    /// the booking's write lock first; the loser gets `InvalidTransition`.
    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let arc = self
            .booking(&id)
            .ok_or(BookingError::NotFound("booking", id))?;
        let mut booking = arc.write().await;
        lifecycle::ensure_transition(booking.status, BookingStatus::Confirmed)?;

        let cal = self.calendar(booking.room_id);
        let mut cal = cal.write().await;
        // If the hold expired and another booking reclaimed the dates, the
        // slots are no longer ours and the confirm must fail.
        cal.ensure_held_by(id, &booking.claimed_dates())?;

        let event = Event::BookingConfirmed { id, at: Utc::now() };
        self.journal_append(&event).await?;
        apply_transition(&mut booking, &mut cal, &event)?;
        self.notify.send(booking.user_id, &event);
        metrics::counter!(observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(booking.clone())
    }

    /// Cancel a booking from any non-terminal state, releasing whatever
    /// inventory it still owns. Refund and fee are computed by the caller.
    pub async fn cancel_booking(
        &self,
        id: Ulid,
        by: CancelActor,
        reason: Option<String>,
        refund: Option<Money>,
        fee: Option<Money>,
    ) -> Result<Booking, BookingError> {
        let arc = self
            .booking(&id)
            .ok_or(BookingError::NotFound("booking", id))?;
        let mut booking = arc.write().await;
        lifecycle::ensure_transition(booking.status, BookingStatus::Cancelled)?;

        let cal = self.calendar(booking.room_id);
        let mut cal = cal.write().await;

        let event = Event::BookingCancelled {
            id,
            by,
            reason,
            refund,
            fee,
            at: Utc::now(),
        };
        self.journal_append(&event).await?;
        apply_transition(&mut booking, &mut cal, &event)?;
        self.notify.send(booking.user_id, &event);
        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL, "by" => by.to_string())
            .increment(1);
        Ok(booking.clone())
    }

    /// Guest arrival: Confirmed → CheckedIn. Inventory is untouched.
    pub async fn check_in(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.lifecycle_event(id, |at| Event::CheckedIn { id, at }, BookingStatus::CheckedIn)
            .await
    }

    /// Guest departure: CheckedIn → Completed. Slots stay booked for the
    /// historical record until compaction drops terminal churn.
    pub async fn check_out(&self, id: Ulid) -> Result<Booking, BookingError> {
        self.lifecycle_event(id, |at| Event::CheckedOut { id, at }, BookingStatus::Completed)
            .await
    }

    async fn lifecycle_event(
        &self,
        id: Ulid,
        make_event: impl FnOnce(DateTime<Utc>) -> Event,
        to: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let arc = self
            .booking(&id)
            .ok_or(BookingError::NotFound("booking", id))?;
        let mut booking = arc.write().await;
        lifecycle::ensure_transition(booking.status, to)?;

        let cal = self.calendar(booking.room_id);
        let mut cal = cal.write().await;

        let event = make_event(Utc::now());
        self.journal_append(&event).await?;
        apply_transition(&mut booking, &mut cal, &event)?;
        self.notify.send(booking.user_id, &event);
        Ok(booking.clone())
    }

    /// Host pre-block: mark a free date unavailable (maintenance, personal
    /// use). Fails if anything already claims the date.
    pub async fn block_date(
        &self,
        room_id: Ulid,
        date: NaiveDate,
        reason: String,
    ) -> Result<(), BookingError> {
        let cal = self.calendar(room_id);
        let mut cal = cal.write().await;
        if cal.slot(date).is_some() {
            return Err(BookingError::Conflict(format!("room unavailable on {date}")));
        }

        let event = Event::DateBlocked {
            room_id,
            date,
            reason: reason.clone(),
        };
        self.journal_append(&event).await?;
        cal.block(date, reason)
    }

    /// Remove a host block.
    pub async fn unblock_date(&self, room_id: Ulid, date: NaiveDate) -> Result<(), BookingError> {
        let cal = self.calendar(room_id);
        let mut cal = cal.write().await;
        if !matches!(cal.slot(date), Some(crate::model::Slot::Blocked { .. })) {
            return Err(BookingError::Validation(format!(
                "no host block on {date} for room {room_id}"
            )));
        }

        let event = Event::DateUnblocked { room_id, date };
        self.journal_append(&event).await?;
        cal.unblock(date);
        Ok(())
    }

    /// Pending bookings whose payment deadline has passed as of `now`.
    /// Lock-free scan; a booking under contention is picked up next sweep.
    pub fn collect_expired(&self, now: DateTime<Utc>) -> Vec<Ulid> {
        let mut expired = Vec::new();
        for entry in self.bookings.iter() {
            let arc = entry.value().clone();
            if let Ok(guard) = arc.try_read()
                && guard.status == BookingStatus::Pending
                && guard.locked_until.is_some_and(|t| t < now)
            {
                expired.push(guard.id);
            }
        }
        expired
    }

    /// Cancel every expired pending booking on one room, freeing its dates
    /// before a fresh availability check. A booking that loses the race to
    /// a concurrent confirm is skipped.
    pub async fn reclaim_expired_for_room(
        &self,
        room_id: Ulid,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), BookingError> {
        for id in self.collect_expired(now) {
            let on_room = match self.booking(&id) {
                Some(arc) => arc.read().await.room_id == room_id,
                None => false,
            };
            if !on_room {
                continue;
            }
            match self
                .cancel_booking(id, CancelActor::System, Some(reason.to_string()), None, None)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    debug!("reclaim skip {id}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Rewrite the journal as one snapshot per live booking plus the host
    /// blocks, dropping all lifecycle churn. Terminal bookings whose stay
    /// has already passed are dropped from the record entirely, so the map
    /// and the compacted file stay bounded by live and recent bookings.
    pub async fn compact_journal(&self) -> Result<(), BookingError> {
        let today = Utc::now().date_naive();

        // Snapshot under awaited read locks, one entry at a time. A request
        // handler holding a write lock just delays its snapshot; the map
        // guard is dropped before any await.
        let booking_arcs: Vec<SharedBooking> =
            self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut snapshots = Vec::with_capacity(booking_arcs.len());
        for arc in booking_arcs {
            snapshots.push(arc.read().await.clone());
        }
        // Snapshots replay in creation order, so a reclaimed stale hold is
        // claimed before the booking that took its dates, as it was live.
        snapshots.sort_by_key(|b| (b.created_at, b.id));

        let mut events = Vec::new();
        for booking in snapshots {
            if booking.status.is_terminal() && booking.check_out < today {
                self.bookings.remove(&booking.id);
                if let Some(mut ids) = self.by_user.get_mut(&booking.user_id) {
                    ids.retain(|id| *id != booking.id);
                }
                continue;
            }
            events.push(Event::BookingCreated { booking });
        }

        let calendar_arcs: Vec<SharedCalendar> =
            self.calendars.iter().map(|e| e.value().clone()).collect();
        for arc in calendar_arcs {
            let cal = arc.read().await;
            let far_past = NaiveDate::MIN;
            let far_future = NaiveDate::MAX;
            for (date, slot) in cal.occupancy(far_past, far_future) {
                if let crate::model::Slot::Blocked { reason } = slot {
                    events.push(Event::DateBlocked {
                        room_id: cal.room_id,
                        date,
                        reason,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Journal("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Journal(e.to_string()))
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
