//! Tick period helpers.

pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Tick period in microseconds for `hz`, clamping `hz` to at least 1 and the
/// result to at least 1 µs.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Number of ticks that fit in `ms` milliseconds at `hz`, at least 1.
#[inline]
pub fn ticks_in_ms(ms: u64, hz: u32) -> u64 {
    (ms.saturating_mul(u64::from(hz.max(1))) / 1_000).max(1)
}
