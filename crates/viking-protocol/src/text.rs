//! Text Line Format
//!
//! `F:<0|1>,S:<0-100>,T:<-50..500>\n`, one reading per line. The burner
//! uses negative temperatures as sentinel values, so this format accepts a
//! wider range than the binary frame.

use crate::error::ParseError;
use crate::reading::{SensorReading, FAN_MAX, TEMP_MAX, TEXT_TEMP_MIN};
use crate::Decoded;

/// Inputs at or above this length are rejected before any parsing
pub const MAX_TEXT_LEN: usize = 256;

const LINE_START: &[u8] = b"F:";

/// Find and decode the first text line in `buffer`.
pub(crate) fn scan(buffer: &[u8]) -> Result<Decoded, ParseError> {
    if buffer.len() >= MAX_TEXT_LEN {
        return Err(ParseError::LineTooLong(buffer.len()));
    }

    let start = buffer
        .windows(LINE_START.len())
        .position(|w| w == LINE_START)
        .ok_or(ParseError::NotText)?;

    let end = buffer[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|pos| start + pos)
        .ok_or(ParseError::MalformedLine("missing line terminator"))?;

    let mut line = &buffer[start..end];
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }

    let reading = parse_line(line)?;
    Ok(Decoded {
        reading,
        consumed: end + 1,
    })
}

fn parse_line(line: &[u8]) -> Result<SensorReading, ParseError> {
    let line = core::str::from_utf8(line).map_err(|_| ParseError::MalformedLine("not ASCII"))?;

    let mut fields = line.split(',');
    let flame = field(fields.next(), "F:")?;
    let speed = field(fields.next(), "S:")?;
    let temp = field(fields.next(), "T:")?;
    if fields.next().is_some() {
        return Err(ParseError::MalformedLine("trailing fields"));
    }

    let flame_detected = match flame {
        0 => false,
        1 => true,
        other => {
            return Err(ParseError::OutOfRange {
                field: "flame",
                value: other,
                min: 0,
                max: 1,
            })
        }
    };
    check_range("fan_speed", speed, 0, i32::from(FAN_MAX))?;
    check_range(
        "temperature",
        temp,
        i32::from(TEXT_TEMP_MIN),
        i32::from(TEMP_MAX),
    )?;

    Ok(SensorReading {
        flame_detected,
        fan_speed: speed as u8,
        temperature: temp as i16,
        error_code: 0,
        valid: true,
    })
}

fn field(part: Option<&str>, prefix: &'static str) -> Result<i32, ParseError> {
    let part = part.ok_or(ParseError::MalformedLine("missing field"))?;
    let digits = part
        .strip_prefix(prefix)
        .ok_or(ParseError::MalformedLine("unexpected field name"))?;
    digits
        .trim()
        .parse::<i32>()
        .map_err(|_| ParseError::MalformedLine("field is not a number"))
}

fn check_range(field: &'static str, value: i32, min: i32, max: i32) -> Result<(), ParseError> {
    if value < min || value > max {
        Err(ParseError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

/// Parse only the text format
pub fn parse_text(buffer: &[u8]) -> Result<SensorReading, ParseError> {
    scan(buffer).map(|d| d.reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_line() {
        let reading = parse_text(b"F:1,S:50,T:75\n").unwrap();
        assert!(reading.flame_detected);
        assert_eq!(reading.fan_speed, 50);
        assert_eq!(reading.temperature, 75);
        assert_eq!(reading.error_code, 0);
    }

    #[test]
    fn test_crlf_tolerated() {
        let decoded = scan(b"F:0,S:0,T:20\r\n").unwrap();
        assert_eq!(decoded.reading.temperature, 20);
        assert_eq!(decoded.consumed, 14);
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(parse_text(b"F:0,S:0,T:-50\n").is_ok());
        assert!(parse_text(b"F:0,S:0,T:500\n").is_ok());
        assert!(matches!(
            parse_text(b"F:0,S:0,T:-51\n"),
            Err(ParseError::OutOfRange { field: "temperature", .. })
        ));
        assert!(matches!(
            parse_text(b"F:0,S:0,T:501\n"),
            Err(ParseError::OutOfRange { field: "temperature", .. })
        ));
    }

    #[test]
    fn test_fan_out_of_range() {
        assert!(matches!(
            parse_text(b"F:1,S:101,T:70\n"),
            Err(ParseError::OutOfRange { field: "fan_speed", value: 101, .. })
        ));
    }

    #[test]
    fn test_flame_must_be_binary() {
        assert!(matches!(
            parse_text(b"F:2,S:10,T:70\n"),
            Err(ParseError::OutOfRange { field: "flame", .. })
        ));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            parse_text(b"F:1,S:abc,T:70\n"),
            Err(ParseError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_text(b"F:1,T:70,S:10\n"),
            Err(ParseError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_text(b"F:1,S:10,T:70,X:1\n"),
            Err(ParseError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_text(b"F:1,S:10,T:70"),
            Err(ParseError::MalformedLine("missing line terminator"))
        ));
    }

    #[test]
    fn test_length_bound_checked_first() {
        let mut long = vec![b' '; MAX_TEXT_LEN - 14];
        long.extend_from_slice(b"F:1,S:10,T:70\n");
        assert_eq!(long.len(), MAX_TEXT_LEN);
        assert_eq!(parse_text(&long), Err(ParseError::LineTooLong(MAX_TEXT_LEN)));

        long.remove(0);
        assert!(parse_text(&long).is_ok());
    }

    #[test]
    fn test_not_text() {
        assert_eq!(parse_text(&[0x00, 0x01, 0x02]), Err(ParseError::NotText));
    }
}
