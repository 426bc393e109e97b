//! roomledger — hotel booking lifecycle and room-inventory reservation
//! engine.
//!
//! Bookings move through a fixed state machine (PENDING → CONFIRMED →
//! CHECKED_IN → COMPLETED, cancellable until terminal) while a per-room
//! calendar ledger guarantees no two live bookings ever claim the same
//! night. A pending booking holds its dates only until a payment deadline;
//! the [`sweeper`] reclaims expired holds. Every state change is written
//! to an append-only journal before it is applied, so a restart rebuilds
//! the full ledger by replay.
//!
//! [`orchestrator::BookingOrchestrator`] is the front door; the
//! [`engine::Engine`] underneath owns all shared state.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod journal;
pub mod model;
pub mod notify;
pub mod observability;
pub mod orchestrator;
pub mod pricing;
pub mod refund;
pub mod sweeper;

pub use catalog::{InMemoryPromotionCatalog, InMemoryRoomCatalog, LogNotifier};
pub use config::Config;
pub use engine::{BookingError, Engine};
pub use model::{Booking, BookingRequest, BookingStatus, CancellationPolicy, Quote};
pub use orchestrator::BookingOrchestrator;
pub use sweeper::Sweeper;
