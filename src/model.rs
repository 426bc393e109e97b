use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Monetary amount in the property's currency, natural units (not cents).
pub type Money = Decimal;

/// Lifecycle status of a booking. PENDING is the initial state; COMPLETED
/// and CANCELLED are terminal. Valid transitions live in `engine::lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// True for statuses whose ledger slots are permanent (Booked, not Held).
    pub fn occupies_inventory(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::CheckedIn | BookingStatus::Completed
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Who triggered a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelActor {
    Guest,
    Host,
    System,
}

impl std::fmt::Display for CancelActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelActor::Guest => "GUEST",
            CancelActor::Host => "HOST",
            CancelActor::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

/// Refund schedule applied when a booking is cancelled. Parsing fails loudly
/// on unrecognized values; the Moderate default applies only when the field
/// is genuinely absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CancellationPolicy {
    Flexible,
    #[default]
    Moderate,
    Strict,
}

impl std::str::FromStr for CancellationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FLEXIBLE" => Ok(CancellationPolicy::Flexible),
            "MODERATE" => Ok(CancellationPolicy::Moderate),
            "STRICT" => Ok(CancellationPolicy::Strict),
            other => Err(format!("unknown cancellation policy: {other}")),
        }
    }
}

/// A booking row. Owned by the engine; status is mutated only through
/// `engine::lifecycle` transitions under the booking's write lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub user_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: Money,
    pub status: BookingStatus,
    pub coupon_code: Option<String>,
    /// Deadline for payment while PENDING; None once confirmed or closed.
    pub locked_until: Option<DateTime<Utc>>,
    pub cancellation_policy: CancellationPolicy,
    pub refund_amount: Option<Money>,
    pub cancellation_fee: Option<Money>,
    pub cancelled_by: Option<CancelActor>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Nights billed: days between check-in and check-out, at least 1.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(1)
    }

    /// Every calendar date this booking claims in the ledger.
    ///
    /// The range is inclusive of the check-out date: house policy is no
    /// same-day turnover, so the departure date is blocked as well.
    pub fn claimed_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.check_in;
        while d <= self.check_out {
            dates.push(d);
            d = d + Days::new(1);
        }
        dates
    }
}

/// One room-date slot in the availability ledger. A missing entry means the
/// date is free. A Held slot carries its own deadline so expiry is decidable
/// from the ledger alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    /// Blocked by the host; no owning booking.
    Blocked { reason: String },
    /// Temporary claim tied to a PENDING booking.
    Held {
        booking_id: Ulid,
        locked_until: DateTime<Utc>,
    },
    /// Permanent claim tied to a confirmed (or later) booking.
    Booked { booking_id: Ulid },
}

impl Slot {
    pub fn owner(&self) -> Option<Ulid> {
        match self {
            Slot::Blocked { .. } => None,
            Slot::Held { booking_id, .. } | Slot::Booked { booking_id } => Some(*booking_id),
        }
    }
}

/// External room record, fetched through the `RoomCatalog` seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub base_price: Money,
    pub capacity: u32,
}

/// Promotion code record, fetched through the `PromotionCatalog` seam.
/// Usage increments exactly once per successful confirm and is never
/// decremented on cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub code: String,
    pub discount_percent: u32,
    pub max_discount_amount: Option<Money>,
    pub active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_usage: Option<u32>,
    pub current_usage: u32,
    /// When set, the code only applies to rooms of this hotel.
    pub hotel_id: Option<Ulid>,
}

/// Price quote for a date range, before any booking exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
    pub applied_coupon: Option<String>,
}

/// Incoming request for quoting or creating a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub coupon_code: Option<String>,
    pub cancellation_policy: Option<CancellationPolicy>,
}

/// Outcome of a guest-initiated cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    pub booking_id: Ulid,
    pub status: BookingStatus,
    pub total_price: Money,
    pub refund_amount: Money,
    pub cancellation_fee: Money,
    pub policy: CancellationPolicy,
    pub policy_description: &'static str,
    pub cancelled_at: DateTime<Utc>,
    pub message: String,
}

/// Optional filters for host-side booking listings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub check_in_from: Option<NaiveDate>,
    pub check_in_to: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.is_none_or(|s| booking.status == s)
            && self.check_in_from.is_none_or(|d| booking.check_in >= d)
            && self.check_in_to.is_none_or(|d| booking.check_in <= d)
    }
}

/// Journal record format. Each event is an atomic unit: applying it updates
/// the booking row and its ledger slots together, so replay can never
/// produce a PENDING booking without held inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Full booking snapshot. The slots claimed on apply follow the
    /// snapshot's status (Held while PENDING, Booked once confirmed,
    /// nothing when cancelled), which also makes journal compaction a
    /// matter of re-emitting one snapshot per booking.
    BookingCreated { booking: Booking },
    BookingConfirmed {
        id: Ulid,
        at: DateTime<Utc>,
    },
    BookingCancelled {
        id: Ulid,
        by: CancelActor,
        reason: Option<String>,
        refund: Option<Money>,
        fee: Option<Money>,
        at: DateTime<Utc>,
    },
    CheckedIn {
        id: Ulid,
        at: DateTime<Utc>,
    },
    CheckedOut {
        id: Ulid,
        at: DateTime<Utc>,
    },
    DateBlocked {
        room_id: Ulid,
        date: NaiveDate,
        reason: String,
    },
    DateUnblocked {
        room_id: Ulid,
        date: NaiveDate,
    },
}

impl Event {
    /// Booking id the event concerns, when it concerns one.
    pub fn booking_id(&self) -> Option<Ulid> {
        match self {
            Event::BookingCreated { booking } => Some(booking.id),
            Event::BookingConfirmed { id, .. }
            | Event::BookingCancelled { id, .. }
            | Event::CheckedIn { id, .. }
            | Event::CheckedOut { id, .. } => Some(*id),
            Event::DateBlocked { .. } | Event::DateUnblocked { .. } => None,
        }
    }
}
