//! Conversions from raw 16-bit sensor codes to physical units.
//!
//! The curves are the fits published with Parrot's own Flower Power
//! tooling. Constants are kept exactly as published so that results match
//! reference files produced by other implementations bit for bit.

use crate::error::CalibrationError;

/// Lower saturation bound of the temperature sensor, in °C.
pub const TEMPERATURE_MIN: f64 = -10.0;

/// Upper saturation bound of the temperature sensor, in °C.
pub const TEMPERATURE_MAX: f64 = 55.0;

/// Convert a raw temperature code to °C.
///
/// Used for both air and soil temperature. The result is clamped to
/// [`TEMPERATURE_MIN`]..=[`TEMPERATURE_MAX`].
#[must_use]
pub fn temperature(raw: u16) -> f64 {
    let r = f64::from(raw);
    let value = 0.000_000_030_44 * r.powf(3.0) - 0.000_080_38 * r.powf(2.0) + 0.1149 * r
        - 30.449_999_999_999_999;
    value.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX)
}

/// Convert a raw volumetric water content code to a moisture percentage.
///
/// Two-stage fit, unclamped.
#[must_use]
pub fn soil_moisture(raw: u16) -> f64 {
    let r = f64::from(raw);
    let s = 0.000_000_001_069_8 * r.powf(4.0) - 0.000_001_525_38 * r.powf(3.0)
        + 0.000_866_976 * r.powf(2.0)
        - 0.169_422 * r
        + 11.4293;

    100.0 * (0.000_004_5 * s.powf(3.0) - 0.000_55 * s.powf(2.0) + 0.0292 * s - 0.053)
}

/// Convert a raw light code to sunlight (mol·m⁻²·d⁻¹ equivalent).
///
/// # Errors
///
/// Returns [`CalibrationError::SunlightZero`] for a raw code of 0, where the
/// power law diverges.
pub fn sunlight(raw: u16) -> Result<f64, CalibrationError> {
    if raw == 0 {
        return Err(CalibrationError::SunlightZero);
    }
    Ok(0.086_400_000_000_000_01 * (192_773.170_000_000_01 * f64::from(raw).powf(-1.060_661_9)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_clamps_low() {
        assert_eq!(temperature(0), TEMPERATURE_MIN);
    }

    #[test]
    fn test_temperature_clamps_high() {
        assert_eq!(temperature(u16::MAX), TEMPERATURE_MAX);
    }

    #[test]
    fn test_temperature_mid_range() {
        // 3.044e-8*1e9 - 8.038e-5*1e6 + 114.9 - 30.45 = 30.44 - 80.38 + 114.9 - 30.45
        let t = temperature(1000);
        assert!((t - 34.51).abs() < 1e-9, "got {t}");
    }

    #[test]
    fn test_soil_moisture_at_zero() {
        // Stage 1 yields the constant term alone.
        let s: f64 = 11.4293;
        let expected =
            100.0 * (0.0000045 * s.powf(3.0) - 0.00055 * s.powf(2.0) + 0.0292 * s - 0.053);
        assert!((soil_moisture(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_soil_moisture_is_finite_everywhere() {
        for raw in (0..=u16::MAX).step_by(97) {
            assert!(soil_moisture(raw).is_finite());
        }
    }

    #[test]
    fn test_sunlight_zero_is_domain_error() {
        assert_eq!(sunlight(0), Err(CalibrationError::SunlightZero));
    }

    #[test]
    fn test_sunlight_at_one() {
        let value = sunlight(1).unwrap();
        assert!((value - 0.0864 * 192773.17).abs() < 1e-6);
    }

    #[test]
    fn test_sunlight_decreases_with_raw() {
        assert!(sunlight(100).unwrap() > sunlight(1000).unwrap());
    }
}
