// Shared timing window definitions to keep judgment and visuals in sync.

// All windows are absolute offsets in seconds; each bound is exclusive.
pub const PERFECT_WINDOW_S: f64 = 0.07;
pub const GREAT_WINDOW_S: f64 = 0.15;
pub const GOOD_WINDOW_S: f64 = 0.25;

// A press at or beyond this distance from every note in the lane is a miss.
pub const MISS_WINDOW_S: f64 = GOOD_WINDOW_S;

#[inline(always)]
pub const fn windows_s() -> [f64; 3] {
    [PERFECT_WINDOW_S, GREAT_WINDOW_S, GOOD_WINDOW_S]
}

#[inline(always)]
pub fn windows_ms() -> [f64; 3] {
    let s = windows_s();
    [s[0] * 1000.0, s[1] * 1000.0, s[2] * 1000.0]
}
