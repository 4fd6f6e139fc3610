// Wrap-aware arithmetic over a fixed-modulus angle space
//
// Encoder counts live in [0, N) where N is the counts-per-revolution of the
// active sensor (4096 for the AS5600, 16384 for the MT6701). Two samples are
// never compared by plain subtraction.

/// Center `raw` into `[-modulus/2, modulus/2)`.
///
/// Exactly half a revolution maps to `-modulus/2`, so
/// `angle_diff(a, b) == -angle_diff(b, a)` holds everywhere except when `a`
/// and `b` are half a revolution apart, where both directions report `-modulus/2`.
pub fn wrap_signed(raw: i32, modulus: u16) -> i32 {
    let m = i32::from(modulus);
    let half = m / 2;
    (raw.rem_euclid(m) + half) % m - half
}

/// Shortest signed rotation from `b` to `a`
pub fn angle_diff(a: u16, b: u16, modulus: u16) -> i32 {
    wrap_signed(i32::from(a) - i32::from(b), modulus)
}

/// Fold any count (including negative offsets) back into `[0, modulus)`
pub fn normalize(raw: i32, modulus: u16) -> u16 {
    raw.rem_euclid(i32::from(modulus)) as u16
}

pub fn counts_to_degrees(counts: u16, modulus: u16) -> f32 {
    f32::from(counts) * 360.0 / f32::from(modulus)
}
