//! Sensor Reading Definition

use serde::{Deserialize, Serialize};

/// Lowest temperature accepted by the text protocol (°C)
pub const TEXT_TEMP_MIN: i16 = -50;
/// Highest temperature accepted by either protocol (°C)
pub const TEMP_MAX: i16 = 500;
/// Highest fan speed (%)
pub const FAN_MAX: u8 = 100;

/// One decoded burner status record.
///
/// Produced only by the parser, immutable afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorReading {
    /// Flame sensor state
    pub flame_detected: bool,
    /// Fan speed (0-100%)
    pub fan_speed: u8,
    /// Temperature (°C, -50 to 500)
    pub temperature: i16,
    /// Burner error code (0-127)
    pub error_code: u8,
    /// Set only on a successful decode
    pub valid: bool,
}

impl SensorReading {
    /// The safe-default record returned for every failed decode
    pub const fn invalid() -> Self {
        Self {
            flame_detected: false,
            fan_speed: 0,
            temperature: 0,
            error_code: 0,
            valid: false,
        }
    }

    /// Reading used to clear attributes once the burner goes silent
    pub const fn cleared() -> Self {
        Self {
            valid: true,
            ..Self::invalid()
        }
    }

    /// Whether the burner reports a fault
    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_matches_default() {
        assert_eq!(SensorReading::invalid(), SensorReading::default());
        assert!(!SensorReading::invalid().valid);
    }

    #[test]
    fn test_cleared_is_valid_and_zeroed() {
        let cleared = SensorReading::cleared();
        assert!(cleared.valid);
        assert!(!cleared.flame_detected);
        assert_eq!(cleared.fan_speed, 0);
        assert_eq!(cleared.temperature, 0);
        assert!(!cleared.has_error());
    }
}
