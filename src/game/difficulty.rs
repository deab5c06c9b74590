//! Per-level difficulty model.
//!
//! Both curves are pure in the level index. Played levels start at base + 1,
//! so the first quotas seen in a run from base 0 are 30, 30, 30, 35, 40, 45
//! and the first time budgets 30000, 25000, 20000, then the floor.

/// Taps required to clear the level.
pub fn tap_quota(level: u32) -> u32 {
    (15 + 5 * level).max(30)
}

/// Advisory time budget for the level, milliseconds. Reported in the level
/// summary for tuning, never enforced as a cutoff.
pub fn time_limit_ms(level: u32) -> u64 {
    (35_000i64 - 5_000 * level as i64).max(20_000) as u64
}
