use std::collections::HashSet;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Booking, BookingFilter, Slot};

use super::{BookingError, Engine};

impl Engine {
    /// Snapshot of one booking.
    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let arc = self
            .booking(&id)
            .ok_or(BookingError::NotFound("booking", id))?;
        let guard = arc.read().await;
        Ok(guard.clone())
    }

    /// A guest's bookings, newest last.
    pub async fn bookings_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(arc) = self.booking(&id) {
                out.push(arc.read().await.clone());
            }
        }
        out
    }

    /// Bookings matching `filter`, optionally restricted to a room set
    /// (host listings pass the hotel's rooms). Sorted by check-in date.
    pub async fn bookings_matching(
        &self,
        filter: &BookingFilter,
        rooms: Option<&HashSet<Ulid>>,
    ) -> Vec<Booking> {
        let ids: Vec<Ulid> = self.bookings.iter().map(|e| *e.key()).collect();
        let mut out = Vec::new();
        for id in ids {
            let Some(arc) = self.booking(&id) else { continue };
            let booking = arc.read().await;
            if rooms.is_some_and(|set| !set.contains(&booking.room_id)) {
                continue;
            }
            if filter.matches(&booking) {
                out.push(booking.clone());
            }
        }
        out.sort_by_key(|b| (b.check_in, b.id));
        out
    }

    /// Non-free slots on a room in `[from, to]`, for host calendar views.
    /// A room with no calendar yet is simply all-free.
    pub async fn occupancy(
        &self,
        room_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<(NaiveDate, Slot)> {
        let Some(entry) = self.calendars.get(&room_id) else {
            return Vec::new();
        };
        let arc = entry.value().clone();
        drop(entry);
        let cal = arc.read().await;
        cal.occupancy(from, to)
    }
}
