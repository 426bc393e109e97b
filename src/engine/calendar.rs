//! Per-room availability ledger: one `Slot` per calendar date, absent
//! entries meaning the date is free. This is the single source of truth
//! for "is this room free on this date".

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Slot};

use super::BookingError;

#[derive(Debug, Clone)]
pub struct RoomCalendar {
    pub room_id: Ulid,
    /// At most one slot per date, ordered for range scans.
    days: BTreeMap<NaiveDate, Slot>,
}

impl RoomCalendar {
    pub fn new(room_id: Ulid) -> Self {
        Self {
            room_id,
            days: BTreeMap::new(),
        }
    }

    pub fn slot(&self, date: NaiveDate) -> Option<&Slot> {
        self.days.get(&date)
    }

    /// Validate that every date in `dates` can be claimed at `now`.
    ///
    /// Free dates and expired holds are claimable; a live hold, a booked
    /// slot, or a host block conflicts. Because slots move in lockstep with
    /// their owning booking, a hold whose booking is no longer PENDING has
    /// already become Booked or Free — the deadline check covers the rest.
    pub fn ensure_claimable(
        &self,
        dates: &[NaiveDate],
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        for date in dates {
            match self.days.get(date) {
                None => {}
                Some(Slot::Held { locked_until, .. }) if *locked_until < now => {}
                Some(Slot::Held { .. }) | Some(Slot::Booked { .. }) | Some(Slot::Blocked { .. }) => {
                    return Err(BookingError::Conflict(format!(
                        "room unavailable on {date}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Claim every date of `booking` according to its status. Only free
    /// dates and holds expired as of `now` are taken; a booked slot, a
    /// block, or a live foreign hold keeps its owner. Callers wanting an
    /// all-or-nothing claim run `ensure_claimable` first under the same
    /// write lock (then nothing is skipped); replay relies on the
    /// precedence directly, with `now` = the claimant's creation time.
    pub fn claim(&mut self, booking: &Booking, now: DateTime<Utc>) {
        let slot = match booking.status {
            BookingStatus::Pending => {
                // A pending booking always carries its deadline.
                let locked_until = booking.locked_until.unwrap_or(booking.created_at);
                Slot::Held {
                    booking_id: booking.id,
                    locked_until,
                }
            }
            s if s.occupies_inventory() => Slot::Booked {
                booking_id: booking.id,
            },
            _ => return, // cancelled bookings claim nothing
        };
        for date in booking.claimed_dates() {
            match self.days.get(&date) {
                None => {}
                Some(Slot::Held { locked_until, .. }) if *locked_until < now => {}
                Some(_) => continue,
            }
            self.days.insert(date, slot.clone());
        }
    }

    /// Validate that every date in `dates` is Held by `booking_id`.
    /// Defensive: cannot fail if the hold invariants held, but a missing or
    /// foreign-owned slot must abort the upgrade rather than corrupt it.
    pub fn ensure_held_by(
        &self,
        booking_id: Ulid,
        dates: &[NaiveDate],
    ) -> Result<(), BookingError> {
        for date in dates {
            match self.days.get(date) {
                Some(Slot::Held { booking_id: owner, .. }) if *owner == booking_id => {}
                other => {
                    return Err(BookingError::Conflict(format!(
                        "hold missing on {date}: expected hold by booking {booking_id}, found {other:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Upgrade every Held slot owned by `booking_id` to Booked.
    pub fn upgrade(&mut self, booking_id: Ulid) {
        for slot in self.days.values_mut() {
            if let Slot::Held { booking_id: owner, .. } = slot
                && *owner == booking_id
            {
                *slot = Slot::Booked { booking_id };
            }
        }
    }

    /// Free every slot (Held or Booked) owned by `booking_id`, regardless of
    /// the booking's status. Returns the number of dates freed; releasing a
    /// booking with no slots is a no-op, not an error.
    pub fn release(&mut self, booking_id: Ulid) -> usize {
        let owned: Vec<NaiveDate> = self
            .days
            .iter()
            .filter(|(_, slot)| slot.owner() == Some(booking_id))
            .map(|(date, _)| *date)
            .collect();
        for date in &owned {
            self.days.remove(date);
        }
        owned.len()
    }

    /// Host pre-block: only a free date can be blocked.
    pub fn block(&mut self, date: NaiveDate, reason: String) -> Result<(), BookingError> {
        if self.days.contains_key(&date) {
            return Err(BookingError::Conflict(format!(
                "room unavailable on {date}"
            )));
        }
        self.days.insert(date, Slot::Blocked { reason });
        Ok(())
    }

    /// Remove a host block. Returns whether a block was present.
    pub fn unblock(&mut self, date: NaiveDate) -> bool {
        if matches!(self.days.get(&date), Some(Slot::Blocked { .. })) {
            self.days.remove(&date);
            true
        } else {
            false
        }
    }

    /// Dates currently owned by `booking_id`, in order.
    pub fn dates_owned_by(&self, booking_id: Ulid) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, slot)| slot.owner() == Some(booking_id))
            .map(|(date, _)| *date)
            .collect()
    }

    /// Non-free slots in `[from, to]`, for host calendar views.
    pub fn occupancy(&self, from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, Slot)> {
        self.days
            .range(from..=to)
            .map(|(date, slot)| (*date, slot.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use crate::model::CancellationPolicy;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn pending(room_id: Ulid, check_in: NaiveDate, check_out: NaiveDate) -> Booking {
        let now = Utc::now();
        Booking {
            id: Ulid::new(),
            room_id,
            user_id: Ulid::new(),
            check_in,
            check_out,
            guests: 2,
            total_price: dec!(1_000_000),
            status: BookingStatus::Pending,
            coupon_code: None,
            locked_until: Some(now + Duration::minutes(20)),
            cancellation_policy: CancellationPolicy::Moderate,
            refund_amount: None,
            cancellation_fee: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            checked_in_at: None,
            checked_out_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn claim_and_release_roundtrip() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let b = pending(room, date(10), date(12));

        cal.ensure_claimable(&b.claimed_dates(), Utc::now()).unwrap();
        cal.claim(&b, Utc::now());
        assert_eq!(cal.dates_owned_by(b.id).len(), 3);

        let freed = cal.release(b.id);
        assert_eq!(freed, 3);
        assert!(cal.slot(date(10)).is_none());
        assert!(cal.slot(date(11)).is_none());
        assert!(cal.slot(date(12)).is_none());
    }

    #[test]
    fn live_hold_conflicts() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let a = pending(room, date(10), date(12));
        cal.claim(&a, Utc::now());

        let b = pending(room, date(11), date(14));
        let err = cal
            .ensure_claimable(&b.claimed_dates(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
        assert!(err.to_string().contains("2026-01-11"));
    }

    #[test]
    fn expired_hold_is_claimable() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let mut stale = pending(room, date(10), date(12));
        stale.locked_until = Some(Utc::now() - Duration::minutes(5));
        cal.claim(&stale, Utc::now());

        let fresh = pending(room, date(10), date(12));
        cal.ensure_claimable(&fresh.claimed_dates(), Utc::now())
            .unwrap();
        cal.claim(&fresh, Utc::now());

        // The slot changed owner; releasing the stale booking frees nothing.
        assert_eq!(cal.dates_owned_by(fresh.id).len(), 3);
        assert_eq!(cal.release(stale.id), 0);
        assert_eq!(cal.dates_owned_by(fresh.id).len(), 3);
    }

    #[test]
    fn booked_slot_never_reclaimable() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let mut confirmed = pending(room, date(10), date(12));
        confirmed.status = BookingStatus::Confirmed;
        confirmed.locked_until = None;
        cal.claim(&confirmed, Utc::now());

        let b = pending(room, date(12), date(14));
        assert!(cal
            .ensure_claimable(&b.claimed_dates(), Utc::now())
            .is_err());
    }

    #[test]
    fn claim_never_steals_a_live_slot() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let mut confirmed = pending(room, date(10), date(12));
        confirmed.status = BookingStatus::Confirmed;
        confirmed.locked_until = None;
        cal.claim(&confirmed, Utc::now());

        // A stale hold claimed out of order (as compaction replay can do)
        // takes nothing from the booked dates.
        let mut stale = pending(room, date(10), date(12));
        stale.locked_until = Some(Utc::now() - Duration::minutes(5));
        cal.claim(&stale, stale.created_at);
        assert_eq!(cal.dates_owned_by(stale.id).len(), 0);
        assert_eq!(cal.dates_owned_by(confirmed.id).len(), 3);

        // Same for a live hold.
        let held = pending(room, date(20), date(21));
        cal.claim(&held, Utc::now());
        let rival = pending(room, date(20), date(21));
        cal.claim(&rival, Utc::now());
        assert_eq!(cal.dates_owned_by(held.id).len(), 2);
        assert_eq!(cal.dates_owned_by(rival.id).len(), 0);
    }

    #[test]
    fn upgrade_converts_only_own_holds() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let a = pending(room, date(10), date(11));
        let b = pending(room, date(13), date(14));
        cal.claim(&a, Utc::now());
        cal.claim(&b, Utc::now());

        cal.ensure_held_by(a.id, &a.claimed_dates()).unwrap();
        cal.upgrade(a.id);

        assert!(matches!(cal.slot(date(10)), Some(Slot::Booked { booking_id }) if *booking_id == a.id));
        assert!(matches!(cal.slot(date(13)), Some(Slot::Held { booking_id, .. }) if *booking_id == b.id));
    }

    #[test]
    fn ensure_held_by_rejects_foreign_owner() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let a = pending(room, date(10), date(11));
        cal.claim(&a, Utc::now());

        let stranger = Ulid::new();
        assert!(cal.ensure_held_by(stranger, &a.claimed_dates()).is_err());
        // Missing slot also rejected.
        assert!(cal.ensure_held_by(a.id, &[date(20)]).is_err());
    }

    #[test]
    fn host_block_conflicts_and_unblocks() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        cal.block(date(10), "renovation".into()).unwrap();

        let b = pending(room, date(9), date(11));
        assert!(cal
            .ensure_claimable(&b.claimed_dates(), Utc::now())
            .is_err());

        // Cannot double-block, cannot block over a claim.
        assert!(cal.block(date(10), "again".into()).is_err());

        assert!(cal.unblock(date(10)));
        assert!(!cal.unblock(date(10)));
        cal.ensure_claimable(&b.claimed_dates(), Utc::now()).unwrap();
    }

    #[test]
    fn release_with_no_slots_is_noop() {
        let mut cal = RoomCalendar::new(Ulid::new());
        assert_eq!(cal.release(Ulid::new()), 0);
    }

    #[test]
    fn occupancy_range_scan() {
        let room = Ulid::new();
        let mut cal = RoomCalendar::new(room);
        let b = pending(room, date(10), date(12));
        cal.claim(&b, Utc::now());
        cal.block(date(20), "deep clean".into()).unwrap();

        let occ = cal.occupancy(date(1), date(31));
        assert_eq!(occ.len(), 4);
        assert_eq!(occ[0].0, date(10));
        assert_eq!(occ[3].0, date(20));

        let narrow = cal.occupancy(date(11), date(12));
        assert_eq!(narrow.len(), 2);
    }
}
