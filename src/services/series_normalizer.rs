//! Base-100 rescaling for "how much did each series grow" comparisons.
//!
//! Each series is normalized against its own first value. Aligning the
//! results onto a shared date axis is left to whoever draws them.

use crate::models::Series;

pub const BASE: f64 = 100.0;

/// Rescale one series so its first value becomes 100.
///
/// A first value that is zero, null or not finite leaves the series as is.
pub fn normalize(series: &Series) -> Series {
    let pivot = match series.first_value() {
        Some(p) if p != 0.0 && p.is_finite() => p,
        _ => return series.clone(),
    };

    let factor = BASE / pivot;
    let mut out = series.clone();
    for point in &mut out.data {
        point.valor = point.valor.map(|v| v * factor);
    }
    out
}

pub fn normalize_all(series: &[Series]) -> Vec<Series> {
    series.iter().map(normalize).collect()
}
