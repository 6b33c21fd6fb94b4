//! Bearing to compass-point conversion.

pub const DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const SECTOR: f64 = 360.0 / 16.0;

/// Map a bearing in degrees to one of the 16 compass labels.
///
/// Each sector is 22.5° wide and centered on its label, so 0° ± 11.25° is "N".
/// Bearings outside `[0, 360)` wrap around. Returns `None` for NaN or infinities.
pub fn degrees_to_direction(deg: f64) -> Option<&'static str> {
    if !deg.is_finite() {
        return None;
    }

    let normalized = deg.rem_euclid(360.0);
    let idx = ((normalized + SECTOR / 2.0) / SECTOR) as usize % DIRECTIONS.len();
    Some(DIRECTIONS[idx])
}

/// Position of a compass label in [`DIRECTIONS`] (case-insensitive).
pub fn direction_index(label: &str) -> Option<usize> {
    let label = label.trim();
    DIRECTIONS.iter().position(|d| d.eq_ignore_ascii_case(label))
}

/// Number of sectors between two labels going the short way round.
pub fn sectors_apart(a: &str, b: &str) -> Option<usize> {
    let (a, b) = (direction_index(a)?, direction_index(b)?);
    let diff = a.abs_diff(b);
    Some(diff.min(DIRECTIONS.len() - diff))
}
