use std::cell::Cell;
use std::time::Instant;

/// Delay between session creation and song time zero.
pub const PRE_ROLL_SECONDS: f64 = 0.5;

/// Abstraction over wall-clock time, in seconds from an arbitrary epoch.
pub trait TimeSource {
    fn now(&self) -> f64;
}

/// Monotonic wall clock backed by `Instant`.
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests and offline simulation.
#[derive(Default)]
pub struct ManualTimeSource {
    current: Cell<f64>,
}

impl ManualTimeSource {
    pub fn new(start: f64) -> Self {
        Self { current: Cell::new(start) }
    }

    pub fn set(&self, seconds: f64) {
        self.current.set(seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.current.set(self.current.get() + delta);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> f64 {
        self.current.get()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Maps wall time to song time for one session.
///
/// Paused spans are excluded by accumulating their length, so song time is
/// frozen while paused and resumes from the same value.
#[derive(Clone, Debug)]
pub struct SongClock {
    start_time: f64,
    paused_at: Option<f64>,
    paused_total: f64,
}

impl SongClock {
    /// Song time zero lands `PRE_ROLL_SECONDS` after `created_at`.
    pub fn starting_at(created_at: f64) -> Self {
        Self {
            start_time: created_at + PRE_ROLL_SECONDS,
            paused_at: None,
            paused_total: 0.0,
        }
    }

    #[inline(always)]
    pub fn song_time(&self, now: f64) -> f64 {
        let effective_now = self.paused_at.unwrap_or(now);
        effective_now - self.start_time - self.paused_total
    }

    #[inline(always)]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self, now: f64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: f64) {
        if let Some(at) = self.paused_at.take() {
            // A clock that stepped backwards must not rewind song time.
            self.paused_total += (now - at).max(0.0);
        }
    }

    /// Wall time at which a running clock reads `song_time`.
    #[inline(always)]
    pub fn wall_time(&self, song_time: f64) -> f64 {
        song_time + self.start_time + self.paused_total
    }

    pub const fn paused_total(&self) -> f64 {
        self.paused_total
    }
}
