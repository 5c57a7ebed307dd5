//! Decimal rounding for presentation values.

/// Round half away from zero to `decimals` digits after the point.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
