//! Timing derivations shared by every client.
//!
//! All of these are pure functions of shared-store timestamps and the local
//! clock, so independently-joining clients converge on the same countdowns,
//! send grids and safe-zone radius without any extra coordination writes.

/// Milliseconds until the next send slot on the global grid
/// `start + k·interval`. Joining mid-interval yields the remainder of the
/// current slot; joining exactly on a slot yields a full interval.
pub fn next_send_in_ms(start_ms: u64, now_ms: u64, interval_ms: u64) -> u64 {
    let elapsed = now_ms.saturating_sub(start_ms);
    interval_ms - (elapsed % interval_ms)
}

/// Absolute timestamp of the next send slot on the global grid.
pub fn next_send_at_ms(start_ms: u64, now_ms: u64, interval_ms: u64) -> u64 {
    now_ms + next_send_in_ms(start_ms, now_ms, interval_ms)
}

/// Remaining whole seconds of the pre-game countdown, anchored to the shared
/// `countdownStart`. Observing the transition late shortens the remainder;
/// it never extrapolates below zero.
pub fn countdown_remaining_secs(countdown_start_ms: u64, now_ms: u64, countdown_ms: u64) -> u64 {
    let deadline = countdown_start_ms.saturating_add(countdown_ms);
    deadline.saturating_sub(now_ms).div_ceil(1000)
}

/// Remaining game time, clamped at zero once `endTime` passes.
pub fn remaining_ms(end_ms: u64, now_ms: u64) -> u64 {
    end_ms.saturating_sub(now_ms)
}

/// When the safe-zone shrink begins, derived from shared timestamps alone.
pub fn shrink_trigger_at_ms(end_ms: u64, trigger_remaining_ms: u64) -> u64 {
    end_ms.saturating_sub(trigger_remaining_ms)
}

/// Safe-zone radius at `now_ms`: the initial radius before the trigger, then
/// shrinking linearly at `rate_m_per_s`, never below `floor_m`.
pub fn shrink_radius_m(
    initial_m: f64,
    rate_m_per_s: f64,
    floor_m: f64,
    trigger_at_ms: u64,
    now_ms: u64,
) -> f64 {
    if now_ms <= trigger_at_ms {
        return initial_m;
    }
    let elapsed_s = (now_ms - trigger_at_ms) as f64 / 1000.0;
    (initial_m - rate_m_per_s * elapsed_s).max(floor_m)
}
