use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Tick rate of the memory-mapped time counter.
pub const TICKS_PER_SECOND: f64 = 1_000_000.0;

// Word offsets within the device window.
pub const TIMECMP_LO: u32 = 0x4000;
pub const TIMECMP_HI: u32 = 0x4004;
pub const TIME_LO: u32 = 0xBFF8;
pub const TIME_HI: u32 = 0xBFFC;

/// CSR-mapped timer: a monotonic 64-bit `time` advanced from wall-clock
/// deltas, and a guest-writable `timecmp`. Shared by the bus (memory-mapped
/// window) and each hart (TIME/TIMEH CSR reads, external tick).
pub struct TimerDevice {
    time: AtomicU64,
    timecmp: AtomicU64,
}

impl Default for TimerDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDevice {
    pub fn new() -> Self {
        Self {
            time: AtomicU64::new(0),
            timecmp: AtomicU64::new(u64::MAX),
        }
    }

    /// Seed `time` from the wall clock, as the hart constructor does.
    pub fn seed_from_wall_clock(&self) {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.time
            .store((secs * TICKS_PER_SECOND) as u64, Ordering::Relaxed);
    }

    pub fn time(&self) -> u64 {
        self.time.load(Ordering::Relaxed)
    }

    pub fn timecmp(&self) -> u64 {
        self.timecmp.load(Ordering::Relaxed)
    }

    /// Advance `time` by `delta` seconds of wall clock; returns the new value.
    pub fn advance(&self, delta: f64) -> u64 {
        let ticks = (delta * TICKS_PER_SECOND) as u64;
        self.time.fetch_add(ticks, Ordering::Relaxed).wrapping_add(ticks)
    }

    /// Word read within the device window; offsets outside the register set
    /// read as zero.
    pub fn read_word(&self, offset: u32) -> u32 {
        match offset {
            TIMECMP_LO => self.timecmp() as u32,
            TIMECMP_HI => (self.timecmp() >> 32) as u32,
            TIME_LO => self.time() as u32,
            TIME_HI => (self.time() >> 32) as u32,
            _ => 0,
        }
    }

    /// Word write within the device window. `time` is read-only; `timecmp`
    /// is written one half at a time.
    pub fn write_word(&self, offset: u32, val: u32) {
        match offset {
            TIMECMP_LO => {
                let old = self.timecmp();
                self.timecmp.store(
                    (old & 0xFFFF_FFFF_0000_0000) | val as u64,
                    Ordering::Relaxed,
                );
            }
            TIMECMP_HI => {
                let old = self.timecmp();
                self.timecmp.store(
                    (old & 0xFFFF_FFFF) | ((val as u64) << 32),
                    Ordering::Relaxed,
                );
            }
            _ => {}
        }
    }
}
