//! Append-only booking journal.
//!
//! Every state change is journalled before it is applied in memory, so a
//! restart rebuilds the full booking book and every room calendar by
//! replaying the file. Frame format per entry:
//!
//! `[u32 le: payload len][bincode: Event][u32 le: crc32 of payload]`
//!
//! A crash mid-write leaves at worst one truncated or corrupt trailing
//! frame, which replay detects and discards.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

fn write_frame(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Journal {
    /// Open (or create) the journal file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append one event and fsync immediately. Test convenience; production
    /// writes go through `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event without flushing. The batch becomes durable only
    /// after `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_frame(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush buffered frames and fsync the file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Phase one of compaction: write the minimal event set to a sibling
    /// temp file and fsync it. Slow I/O, run it outside the journal lock.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp = path.with_extension("journal.tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for event in events {
            write_frame(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Phase two: atomically rename the temp file over the journal and
    /// reopen the writer. Fast, run it while holding the journal lock.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp = self.path.with_extension("journal.tmp");
        fs::rename(&tmp, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Both compaction phases back to back. Test convenience.
    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Read every valid frame from disk. A missing file replays to empty;
    /// a truncated or CRC-failing tail ends the replay silently.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break;
            }
            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use ulid::Ulid;

    use crate::model::{Booking, BookingStatus, CancelActor, CancellationPolicy};

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roomledger_test_journal");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn sample_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Ulid::new(),
            room_id: Ulid::new(),
            user_id: Ulid::new(),
            check_in: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            guests: 2,
            total_price: dec!(1_500_000),
            status: BookingStatus::Pending,
            coupon_code: Some("SUMMER10".into()),
            locked_until: Some(now),
            cancellation_policy: CancellationPolicy::Flexible,
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
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.journal");
        let _ = fs::remove_file(&path);

        let booking = sample_booking();
        let events = vec![
            Event::BookingCreated {
                booking: booking.clone(),
            },
            Event::BookingConfirmed {
                id: booking.id,
                at: Utc::now(),
            },
        ];

        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append(e).unwrap();
            }
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, events);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_truncated_tail() {
        let path = tmp_path("truncated.journal");
        let _ = fs::remove_file(&path);

        let event = Event::BookingCreated {
            booking: sample_booking(),
        };
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&event).unwrap();
        }
        // Simulate a crash mid-write of a second frame.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_corrupt_crc() {
        let path = tmp_path("corrupt_crc.journal");
        let _ = fs::remove_file(&path);

        let event = Event::BookingCancelled {
            id: Ulid::new(),
            by: CancelActor::Guest,
            reason: Some("change of plans".into()),
            refund: Some(dec!(500_000)),
            fee: Some(dec!(500_000)),
            at: Utc::now(),
        };
        {
            let payload = bincode::serialize(&event).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }

        assert!(Journal::replay(&path).unwrap().is_empty());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file_is_empty() {
        let path = tmp_path("nonexistent.journal");
        let _ = fs::remove_file(&path);
        assert!(Journal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn compact_shrinks_and_preserves_state() {
        let path = tmp_path("compact.journal");
        let _ = fs::remove_file(&path);

        let mut booking = sample_booking();
        {
            let mut journal = Journal::open(&path).unwrap();
            journal
                .append(&Event::BookingCreated {
                    booking: booking.clone(),
                })
                .unwrap();
            journal
                .append(&Event::BookingConfirmed {
                    id: booking.id,
                    at: Utc::now(),
                })
                .unwrap();
            // Churn: holds that came and went.
            for _ in 0..10 {
                let churn = sample_booking();
                journal
                    .append(&Event::BookingCreated {
                        booking: churn.clone(),
                    })
                    .unwrap();
                journal
                    .append(&Event::BookingCancelled {
                        id: churn.id,
                        by: CancelActor::System,
                        reason: None,
                        refund: None,
                        fee: None,
                        at: Utc::now(),
                    })
                    .unwrap();
            }
        }
        let before = fs::metadata(&path).unwrap().len();

        booking.status = BookingStatus::Confirmed;
        booking.locked_until = None;
        let compacted = vec![Event::BookingCreated {
            booking: booking.clone(),
        }];
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.compact(&compacted).unwrap();
        }

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "expected {after} < {before}");
        assert_eq!(Journal::replay(&path).unwrap(), compacted);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_after_compact() {
        let path = tmp_path("compact_append.journal");
        let _ = fs::remove_file(&path);

        let booking = sample_booking();
        let snapshot = Event::BookingCreated {
            booking: booking.clone(),
        };
        let follow_up = Event::BookingConfirmed {
            id: booking.id,
            at: Utc::now(),
        };

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&snapshot).unwrap();
            journal.compact(std::slice::from_ref(&snapshot)).unwrap();
            assert_eq!(journal.appends_since_compact(), 0);
            journal.append(&follow_up).unwrap();
            assert_eq!(journal.appends_since_compact(), 1);
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![snapshot, follow_up]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_flush_together() {
        let path = tmp_path("buffered.journal");
        let _ = fs::remove_file(&path);

        let events: Vec<Event> = (0..5)
            .map(|_| Event::BookingCreated {
                booking: sample_booking(),
            })
            .collect();

        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append_buffered(e).unwrap();
            }
            assert_eq!(journal.appends_since_compact(), 5);
            journal.flush_sync().unwrap();
        }

        assert_eq!(Journal::replay(&path).unwrap(), events);

        let _ = fs::remove_file(&path);
    }
}
