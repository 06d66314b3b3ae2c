//! XP thresholds.

/// Max health gained per level.
pub const LEVEL_UP_HEALTH: i32 = 5;

/// Total XP needed to reach `level`: 0, 100, 300, 600, ...
pub fn xp_for_level(level: u32) -> u32 {
    let level = level.max(1);
    50u32.saturating_mul(level - 1).saturating_mul(level)
}

/// Highest level whose threshold `xp` meets.
pub fn level_for_xp(xp: u32) -> u32 {
    let mut level = 1;
    while xp_for_level(level + 1) <= xp && xp_for_level(level + 1) > xp_for_level(level) {
        level += 1;
    }
    level
}
