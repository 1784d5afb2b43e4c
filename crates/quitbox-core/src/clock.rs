//! Time sources.
//!
//! The controller reads two clocks: monotonic uptime, which always exists,
//! and wall-clock time, which only exists once the box has synchronised
//! with a time server. Schedule logic is skipped while the wall clock is
//! missing.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Local wall-clock time, or `None` before time sync.
    fn wall_clock(&self) -> Option<DateTime<FixedOffset>>;
}

/// Host clock: process uptime plus the system clock shifted by a fixed offset.
pub struct SystemClock {
    boot: Instant,
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        Self {
            boot: Instant::now(),
            offset,
        }
    }
}

impl Clock for SystemClock {
    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn wall_clock(&self) -> Option<DateTime<FixedOffset>> {
        Some(Utc::now().with_timezone(&self.offset))
    }
}

/// Hand-driven clock for tests and simulation.
///
/// Clones share state, so a test can keep a handle while the controller
/// owns another.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<ManualClockState>,
}

struct ManualClockState {
    uptime_ms: AtomicU64,
    wall_epoch_ms: AtomicI64,
    wall_synced: AtomicBool,
    offset_secs: i32,
}

impl ManualClock {
    /// A clock at uptime zero with no wall-clock sync.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    pub fn with_offset(offset_secs: i32) -> Self {
        Self {
            inner: Arc::new(ManualClockState {
                uptime_ms: AtomicU64::new(0),
                wall_epoch_ms: AtomicI64::new(0),
                wall_synced: AtomicBool::new(false),
                offset_secs,
            }),
        }
    }

    /// Move both clocks forward.
    pub fn advance_ms(&self, ms: u64) {
        self.inner.uptime_ms.fetch_add(ms, Ordering::SeqCst);
        self.inner
            .wall_epoch_ms
            .fetch_add(ms as i64, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    pub fn set_uptime_ms(&self, ms: u64) {
        self.inner.uptime_ms.store(ms, Ordering::SeqCst);
    }

    /// Sync the wall clock to the given instant.
    pub fn set_wall_clock<Tz: TimeZone>(&self, at: DateTime<Tz>) {
        self.inner
            .wall_epoch_ms
            .store(at.timestamp_millis(), Ordering::SeqCst);
        self.inner.wall_synced.store(true, Ordering::SeqCst);
    }

    /// Drop wall-clock sync, as if time sync was lost.
    pub fn clear_wall_clock(&self) {
        self.inner.wall_synced.store(false, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn uptime_ms(&self) -> u64 {
        self.inner.uptime_ms.load(Ordering::SeqCst)
    }

    fn wall_clock(&self) -> Option<DateTime<FixedOffset>> {
        if !self.inner.wall_synced.load(Ordering::SeqCst) {
            return None;
        }
        let offset = FixedOffset::east_opt(self.inner.offset_secs)?;
        let ms = self.inner.wall_epoch_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(|t| t.with_timezone(&offset))
    }
}
