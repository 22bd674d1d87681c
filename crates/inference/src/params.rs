//! Parameter clamping
//!
//! Out-of-range values are clamped rather than rejected.

use crate::constants::limits;

/// Clamp a sampling temperature to `[0, 2]`
pub fn clamp_temperature(temperature: f64) -> f64 {
    clamp_f64(temperature, limits::TEMPERATURE_MIN, limits::TEMPERATURE_MAX)
}

/// Clamp a sampling temperature for multi-image requests to `[0, 1]`
pub fn clamp_multi_image_temperature(temperature: f64) -> f64 {
    clamp_f64(
        temperature,
        limits::TEMPERATURE_MIN,
        limits::MULTI_IMAGE_TEMPERATURE_MAX,
    )
}

/// Clamp a token limit to `[1, 8192]`
pub fn clamp_max_tokens(max_tokens: i64) -> u32 {
    let clamped = max_tokens.clamp(limits::TOKENS_MIN, limits::TOKENS_MAX);
    u32::try_from(clamped).unwrap_or(u32::MAX)
}

/// Clamp a timeout to `[5, 300]` seconds
pub fn clamp_timeout(timeout_secs: i64) -> u64 {
    let clamped = timeout_secs.clamp(limits::TIMEOUT_MIN_SECS, limits::TIMEOUT_MAX_SECS);
    u64::try_from(clamped).unwrap_or(u64::MAX)
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        log::warn!("NaN parameter replaced with {}", min);
        return min;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::debug!("Clamped parameter {} to {}", value, clamped);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_clamped_not_rejected() {
        assert_eq!(clamp_temperature(-1.0), 0.0);
        assert_eq!(clamp_temperature(0.7), 0.7);
        assert_eq!(clamp_temperature(5.0), 2.0);
        assert_eq!(clamp_temperature(f64::NAN), 0.0);
    }

    #[test]
    fn test_multi_image_temperature() {
        assert_eq!(clamp_multi_image_temperature(1.5), 1.0);
        assert_eq!(clamp_multi_image_temperature(0.3), 0.3);
    }

    #[test]
    fn test_max_tokens_clamped() {
        assert_eq!(clamp_max_tokens(0), 1);
        assert_eq!(clamp_max_tokens(-20), 1);
        assert_eq!(clamp_max_tokens(4096), 4096);
        assert_eq!(clamp_max_tokens(32768), 8192);
        assert_eq!(clamp_max_tokens(i64::MAX), 8192);
        assert_eq!(clamp_max_tokens(i64::MIN), 1);
    }

    #[test]
    fn test_timeout_clamped() {
        assert_eq!(clamp_timeout(1), 5);
        assert_eq!(clamp_timeout(30), 30);
        assert_eq!(clamp_timeout(10_000), 300);
        assert_eq!(clamp_timeout(i64::MIN), 5);
    }
}
