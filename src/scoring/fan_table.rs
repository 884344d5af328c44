/// Highest fan a hand can score (the maximum limit hand).
pub const MAX_FAN: u8 = 13;

/// Base points per fan count. Even values for every fan >= 1 keep the
/// self-draw half-split integral; a chicken hand (fan 0) pays nothing, which
/// also keeps the zero-sum invariant trivially satisfied for that case.
const FAN_BASE_POINTS: [i32; 14] = [
    0, 2, 4, 8, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384,
];

/// Looks up the base point value for a fan count.
///
/// Out-of-range input maps to 0; callers validate fan counts before a round
/// is ever stored, so this only happens for garbage data.
pub fn points_for_fan(fan: u8) -> i32 {
    FAN_BASE_POINTS
        .get(fan as usize)
        .copied()
        .unwrap_or_default()
}
