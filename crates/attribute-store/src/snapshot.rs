//! Attribute Snapshot

use serde::Serialize;
use viking_protocol::SensorReading;

/// Upper bound of the LevelControl attribute
pub const FAN_PCT_MAX: u8 = 100;
/// Upper bound of the temperature attribute, °C
pub const TEMP_C_MAX: u16 = 500;

/// Current burner attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttributeSnapshot {
    pub flame_state: bool,
    pub fan_speed_pct: u8,
    pub temperature_c: u16,
    /// Monotonic milliseconds of the last apply
    pub last_update_time_ms: u64,
    /// Bumped whenever an attribute value changes
    pub data_version: u32,
}

impl AttributeSnapshot {
    /// Promote a reading to attribute values.
    ///
    /// The text protocol allows negative sentinel temperatures; those
    /// become 0 here.
    pub(crate) fn promote(reading: &SensorReading, now_ms: u64, data_version: u32) -> Self {
        Self {
            flame_state: reading.flame_detected,
            fan_speed_pct: reading.fan_speed.min(FAN_PCT_MAX),
            temperature_c: reading.temperature.clamp(0, TEMP_C_MAX as i16) as u16,
            last_update_time_ms: now_ms,
            data_version,
        }
    }

    /// Temperature in hundredths of a degree, as reported
    pub fn temperature_centidegrees(&self) -> i32 {
        i32::from(self.temperature_c) * 100
    }

    /// Which attribute values differ from `previous`
    pub fn changes_since(&self, previous: &Self) -> AttributeChanges {
        AttributeChanges {
            flame: self.flame_state != previous.flame_state,
            fan_speed: self.fan_speed_pct != previous.fan_speed_pct,
            temperature: self.temperature_c != previous.temperature_c,
        }
    }
}

/// Set of attributes that changed value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttributeChanges {
    pub flame: bool,
    pub fan_speed: bool,
    pub temperature: bool,
}

impl AttributeChanges {
    pub const NONE: Self = Self {
        flame: false,
        fan_speed: false,
        temperature: false,
    };

    pub const ALL: Self = Self {
        flame: true,
        fan_speed: true,
        temperature: true,
    };

    pub fn is_empty(&self) -> bool {
        !(self.flame || self.fan_speed || self.temperature)
    }

    pub fn count(&self) -> usize {
        usize::from(self.flame) + usize::from(self.fan_speed) + usize::from(self.temperature)
    }

    /// Union of both sets
    pub fn merge(self, other: Self) -> Self {
        Self {
            flame: self.flame || other.flame,
            fan_speed: self.fan_speed || other.fan_speed,
            temperature: self.temperature || other.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(flame: bool, fan: u8, temp: i16) -> SensorReading {
        SensorReading {
            flame_detected: flame,
            fan_speed: fan,
            temperature: temp,
            error_code: 0,
            valid: true,
        }
    }

    #[test]
    fn test_negative_sentinel_clamped() {
        let snap = AttributeSnapshot::promote(&reading(false, 30, -10), 5, 0);
        assert_eq!(snap.temperature_c, 0);
        assert_eq!(snap.fan_speed_pct, 30);
        assert_eq!(snap.last_update_time_ms, 5);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let snap = AttributeSnapshot::promote(&reading(true, 180, 900), 0, 0);
        assert_eq!(snap.fan_speed_pct, FAN_PCT_MAX);
        assert_eq!(snap.temperature_c, TEMP_C_MAX);
    }

    #[test]
    fn test_changes_ignore_timestamp() {
        let a = AttributeSnapshot::promote(&reading(true, 50, 75), 10, 0);
        let b = AttributeSnapshot::promote(&reading(true, 50, 75), 20, 0);
        assert!(b.changes_since(&a).is_empty());

        let c = AttributeSnapshot::promote(&reading(false, 50, 80), 30, 0);
        let changes = c.changes_since(&b);
        assert!(changes.flame && changes.temperature && !changes.fan_speed);
        assert_eq!(changes.count(), 2);
    }

    #[test]
    fn test_centidegrees() {
        let snap = AttributeSnapshot::promote(&reading(false, 0, 500), 0, 0);
        assert_eq!(snap.temperature_centidegrees(), 50_000);
    }

    proptest! {
        #[test]
        fn prop_promotion_stays_in_range(
            flame in any::<bool>(),
            fan in any::<u8>(),
            temp in any::<i16>(),
        ) {
            let snap = AttributeSnapshot::promote(&reading(flame, fan, temp), 0, 0);
            prop_assert!(snap.fan_speed_pct <= FAN_PCT_MAX);
            prop_assert!(snap.temperature_c <= TEMP_C_MAX);
            prop_assert_eq!(snap.flame_state, flame);
            if (0..=500).contains(&temp) {
                prop_assert_eq!(i32::from(snap.temperature_c), i32::from(temp));
            }
        }
    }
}
