//! Telemetry parsing.
//!
//! The sensor firmware prints one sample per line, e.g.
//! `angle: +1.57; x: +0.00; y: +1.00; z: +0.00`. Each of the four fields is
//! located by its own [`FieldPattern`], independently of the others, so field
//! order and any surrounding decoration do not matter. The angle is in radians.

use std::io::{self, BufRead};
use std::string::FromUtf8Error;

use thiserror::Error;

/// One orientation sample: a rotation by `angle` radians around `(x, y, z)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Orientation {
    pub angle: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            angle: 0.0,
            x: 1.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl Orientation {
    /// Map the sensor's axes onto the display's: `(x, y, z) -> (x, z, -y)`.
    pub fn to_display(self) -> Self {
        Self {
            angle: self.angle,
            x: self.x,
            y: self.z,
            z: -self.y,
        }
    }
}

/// Matches `<name>[:]<spaces>[+-]<digits>.<digits>` anywhere in a line. The
/// decimal point is mandatory, fractional digits are not.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldPattern {
    pub name: &'static str,
}

impl FieldPattern {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Value of the first occurrence of the field in `line`.
    pub fn find(&self, line: &str) -> Option<f32> {
        line.match_indices(self.name)
            .find_map(|(start, _)| number_after(&line[start + self.name.len()..]))
    }
}

fn number_after(rest: &str) -> Option<f32> {
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let rest = rest.trim_start();
    let bytes = rest.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == int_start || bytes.get(end) != Some(&b'.') {
        return None;
    }
    end += 1;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    rest[..end].parse().ok()
}

pub const ANGLE: FieldPattern = FieldPattern::new("angle");
pub const AXIS_X: FieldPattern = FieldPattern::new("x");
pub const AXIS_Y: FieldPattern = FieldPattern::new("y");
pub const AXIS_Z: FieldPattern = FieldPattern::new("z");

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no `{field}` field in line {line:?}")]
    MissingField { field: &'static str, line: String },
}

/// Parse a telemetry line. All four fields must be present.
pub fn parse_line(line: &str) -> Result<Orientation, ParseError> {
    let field = |pattern: FieldPattern| {
        pattern.find(line).ok_or_else(|| ParseError::MissingField {
            field: pattern.name,
            line: line.to_string(),
        })
    };
    Ok(Orientation {
        angle: field(ANGLE)?,
        x: field(AXIS_X)?,
        y: field(AXIS_Y)?,
        z: field(AXIS_Z)?,
    })
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid raw line {raw:?}: {source}")]
    Decode {
        raw: Vec<u8>,
        #[source]
        source: FromUtf8Error,
    },
    #[error("failed to parse line: {0}")]
    Parse(#[from] ParseError),
    #[error("telemetry stream failed: {0}")]
    Io(#[from] io::Error),
}

impl TelemetryError {
    /// Whether the stream can keep being read after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TelemetryError::Io(_))
    }
}

/// A parsed line together with its text.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub line: String,
    pub orientation: Orientation,
}

/// Splits a byte stream into lines and parses each one.
///
/// Yields one item per line until the stream ends. Orientations are returned
/// in the sensor's axis convention; see [`Orientation::to_display`].
pub struct TelemetryReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> TelemetryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(128),
        }
    }

    fn next_reading(&mut self) -> Option<Result<Reading, TelemetryError>> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => return None,
            Ok(_) => (),
            Err(e) => return Some(Err(e.into())),
        }
        let raw = std::mem::take(&mut self.buf);
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(source) => {
                return Some(Err(TelemetryError::Decode {
                    raw: source.as_bytes().to_vec(),
                    source,
                }));
            }
        };
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        Some(
            parse_line(&line)
                .map(|orientation| Reading { line, orientation })
                .map_err(TelemetryError::from),
        )
    }
}

impl<R: BufRead> Iterator for TelemetryReader<R> {
    type Item = Result<Reading, TelemetryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_reading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_fields() {
        let o = parse_line("angle:10.0 x:1.0 y:0.0 z:-1.0").unwrap();
        assert_eq!(
            o,
            Orientation {
                angle: 10.0,
                x: 1.0,
                y: 0.0,
                z: -1.0
            }
        );
    }

    #[test]
    fn parses_firmware_output() {
        let o = parse_line("angle:  +1.57; x:  -0.25; y:  +0.50; z:  +0.75").unwrap();
        assert_eq!(o.angle, 1.57);
        assert_eq!(o.x, -0.25);
        assert_eq!(o.y, 0.5);
        assert_eq!(o.z, 0.75);
    }

    #[test]
    fn field_order_and_decoration_do_not_matter() {
        let o = parse_line("[imu] z 3.0 | y:2.0 | x: 1.0 | angle -0.5 <eol>").unwrap();
        assert_eq!((o.angle, o.x, o.y, o.z), (-0.5, 1.0, 2.0, 3.0));
    }

    #[test]
    fn trailing_decimal_point_is_enough() {
        let o = parse_line("angle:1. x:1. y:0. z:0.").unwrap();
        assert_eq!(o.angle, 1.0);
    }

    #[test]
    fn integer_angle_is_rejected() {
        assert_eq!(
            parse_line("angle:10 x:1.0 y:0.0 z:0.0"),
            Err(ParseError::MissingField {
                field: "angle",
                line: "angle:10 x:1.0 y:0.0 z:0.0".to_string()
            })
        );
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!(matches!(
            parse_line("angle:1.0 x:1.0 y:0.0"),
            Err(ParseError::MissingField { field: "z", .. })
        ));
    }

    #[test]
    fn later_occurrence_is_used_when_first_has_no_number() {
        assert_eq!(AXIS_X.find("max x: 2.5"), Some(2.5));
    }

    #[test]
    fn number_needs_digits_before_the_point() {
        assert_eq!(AXIS_X.find("x: .5"), None);
        assert_eq!(AXIS_X.find("x: -.5"), None);
    }

    #[test]
    fn display_remap() {
        let o = Orientation {
            angle: 1.0,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        }
        .to_display();
        assert_eq!((o.x, o.y, o.z), (1.0, 3.0, -2.0));
        assert_eq!(o.angle, 1.0);
    }

    #[test]
    fn reader_skips_bad_lines_and_strips_terminators() {
        let input: &[u8] = b"angle:1.0 x:1.0 y:0.0 z:0.0\r\nnoise\n\xff\xfe\nangle:2.0 x:0.0 y:1.0 z:0.0";
        let items: Vec<_> = TelemetryReader::new(input).collect();
        assert_eq!(items.len(), 4);
        match &items[0] {
            Ok(reading) => {
                assert_eq!(reading.line, "angle:1.0 x:1.0 y:0.0 z:0.0");
                assert_eq!(reading.orientation.angle, 1.0);
            }
            Err(e) => panic!("unexpected error {e}"),
        }
        assert!(matches!(items[1], Err(TelemetryError::Parse(_))));
        assert!(matches!(
            &items[2],
            Err(TelemetryError::Decode { raw, .. }) if raw == b"\xff\xfe\n"
        ));
        assert!(matches!(&items[3], Ok(r) if r.orientation.angle == 2.0));
        assert!(items.iter().all(|item| match item {
            Ok(_) => true,
            Err(e) => e.is_recoverable(),
        }));
    }
}
