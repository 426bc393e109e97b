//! Seams to the systems the engine does not own: the room/hotel catalog,
//! the promotion store, and the outbound notification gateway. Production
//! wires real backends here; the in-memory implementations back tests and
//! single-node deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;
use ulid::Ulid;

use crate::engine::BookingError;
use crate::model::{Booking, Promotion, Room};

#[async_trait]
pub trait RoomCatalog: Send + Sync {
    async fn room(&self, id: Ulid) -> Result<Room, BookingError>;

    /// Batch lookup; missing ids are simply absent from the result.
    async fn rooms(&self, ids: &[Ulid]) -> Result<Vec<Room>, BookingError>;

    async fn rooms_for_hotel(&self, hotel_id: Ulid) -> Result<Vec<Room>, BookingError>;
}

#[async_trait]
pub trait PromotionCatalog: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Promotion, BookingError>;

    /// Bump a promotion's usage count after a confirmed booking.
    async fn increment_usage(&self, code: &str) -> Result<(), BookingError>;
}

/// Outbound guest messaging. Failures here never fail a booking; callers
/// fire and forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking);
    async fn booking_cancelled(&self, booking: &Booking);
}

// ── In-memory implementations ───────────────────────────────────

#[derive(Default)]
pub struct InMemoryRoomCatalog {
    rooms: DashMap<Ulid, Room>,
}

impl InMemoryRoomCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }
}

#[async_trait]
impl RoomCatalog for InMemoryRoomCatalog {
    async fn room(&self, id: Ulid) -> Result<Room, BookingError> {
        self.rooms
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound("room", id))
    }

    async fn rooms(&self, ids: &[Ulid]) -> Result<Vec<Room>, BookingError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.rooms.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn rooms_for_hotel(&self, hotel_id: Ulid) -> Result<Vec<Room>, BookingError> {
        Ok(self
            .rooms
            .iter()
            .filter(|e| e.value().hotel_id == hotel_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPromotionCatalog {
    promotions: DashMap<String, Promotion>,
}

impl InMemoryPromotionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, promotion: Promotion) {
        self.promotions.insert(promotion.code.clone(), promotion);
    }
}

#[async_trait]
impl PromotionCatalog for InMemoryPromotionCatalog {
    async fn find_by_code(&self, code: &str) -> Result<Promotion, BookingError> {
        self.promotions
            .get(code)
            .map(|e| e.value().clone())
            .ok_or_else(|| BookingError::PromotionNotFound(code.to_string()))
    }

    async fn increment_usage(&self, code: &str) -> Result<(), BookingError> {
        let mut entry = self
            .promotions
            .get_mut(code)
            .ok_or_else(|| BookingError::PromotionNotFound(code.to_string()))?;
        entry.current_usage += 1;
        Ok(())
    }
}

/// Notifier that just logs. The default until a mail/push gateway is wired.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking) {
        info!(booking = %booking.id, guest = %booking.user_id, "booking confirmed notification");
    }

    async fn booking_cancelled(&self, booking: &Booking) {
        info!(booking = %booking.id, guest = %booking.user_id, "booking cancelled notification");
    }
}
