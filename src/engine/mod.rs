//! The reservation engine: an in-memory booking book plus one availability
//! calendar per room, both rebuilt from the journal on startup.
//!
//! Locking discipline: a booking's `RwLock` is acquired before its room's
//! calendar lock, never the other way around. DashMap guards are dropped
//! before any `.await`.

pub mod calendar;
mod error;
pub mod lifecycle;
mod mutations;
mod queries;

pub use calendar::RoomCalendar;
pub use error::BookingError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::warn;
use ulid::Ulid;

use crate::journal::Journal;
use crate::model::{Booking, Event};
use crate::notify::NotifyHub;

pub type SharedBooking = Arc<RwLock<Booking>>;
pub type SharedCalendar = Arc<RwLock<RoomCalendar>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the journal and batches appends for group
/// commit: buffer the first append, drain whatever else is already queued,
/// fsync once, then answer every caller in the batch.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            JournalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut journal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;

        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, response }) => {
                    batch.push((event, response));
                }
                Ok(other) => {
                    // Commit the batch before any compaction touches the file.
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        flush_and_respond(&mut journal, batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut journal, cmd);
        }
    }
}

fn flush_and_respond(journal: &mut Journal, batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut append_err: Option<io::Error> = None;
    for (event, _) in &batch {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even on append error so partially buffered bytes don't leak
    // into the next batch (every caller here is told this batch failed).
    let flush_err = journal.flush_sync().err();
    let result = match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    };

    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_compact_file(journal.path(), &events)
                .and_then(|()| journal.swap_compact_file());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub(super) bookings: DashMap<Ulid, SharedBooking>,
    pub(super) calendars: DashMap<Ulid, SharedCalendar>,
    /// Guest → booking ids, in creation order.
    pub(super) by_user: DashMap<Ulid, Vec<Ulid>>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Open the journal at `journal_path`, replay it into memory, and spawn
    /// the group-commit writer task.
    pub fn open(journal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Journal::replay(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            bookings: DashMap::new(),
            calendars: DashMap::new(),
            by_user: DashMap::new(),
            journal_tx,
            notify,
        };

        // We are the sole owner of every Arc during replay, so try_write
        // always succeeds instantly. Never block here — open() may run
        // inside an async context.
        for event in &events {
            engine.replay_event(event);
        }

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::BookingCreated { booking } => {
                let cal = self.calendar(booking.room_id);
                cal.try_write()
                    .expect("replay: uncontended write")
                    .claim(booking, booking.created_at);
                self.by_user
                    .entry(booking.user_id)
                    .or_default()
                    .push(booking.id);
                self.bookings
                    .insert(booking.id, Arc::new(RwLock::new(booking.clone())));
            }
            Event::DateBlocked {
                room_id,
                date,
                reason,
            } => {
                let cal = self.calendar(*room_id);
                let mut guard = cal.try_write().expect("replay: uncontended write");
                if let Err(e) = guard.block(*date, reason.clone()) {
                    warn!("replay: skipping block of {date}: {e}");
                }
            }
            Event::DateUnblocked { room_id, date } => {
                let cal = self.calendar(*room_id);
                cal.try_write()
                    .expect("replay: uncontended write")
                    .unblock(*date);
            }
            other => {
                let Some(id) = other.booking_id() else { return };
                let Some(entry) = self.bookings.get(&id) else {
                    warn!("replay: event for unknown booking {id}");
                    return;
                };
                let arc = entry.value().clone();
                drop(entry);
                let mut booking = arc.try_write().expect("replay: uncontended write");
                let cal = self.calendar(booking.room_id);
                let mut cal = cal.try_write().expect("replay: uncontended write");
                if let Err(e) = mutations::apply_transition(&mut booking, &mut cal, other) {
                    warn!("replay: skipping event for booking {id}: {e}");
                }
            }
        }
    }

    /// Write an event through the background group-commit writer and wait
    /// for it to be durable.
    pub(super) async fn journal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Journal("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Journal(e.to_string()))
    }

    pub fn booking(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// The calendar for `room_id`, created empty on first touch.
    pub fn calendar(&self, room_id: Ulid) -> SharedCalendar {
        self.calendars
            .entry(room_id)
            .or_insert_with(|| Arc::new(RwLock::new(RoomCalendar::new(room_id))))
            .value()
            .clone()
    }
}
