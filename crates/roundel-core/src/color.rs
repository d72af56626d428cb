//! Background fill colors parsed from CSS-style hex strings.

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("empty color specification")]
    Empty,
    #[error("color {input:?} must have 3 or 6 hex digits, got {len}")]
    InvalidLength { input: String, len: usize },
    #[error("color {input:?} contains non-hex character {found:?}")]
    InvalidDigit { input: String, found: char },
}

/// Opaque RGB fill color. Alpha is always 255 when painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb`, or the same without the leading `#`.
    pub fn from_hex(input: &str) -> Result<Self, ColorError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ColorError::Empty);
        }
        if let Some(found) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit {
                input: input.to_string(),
                found,
            });
        }

        // Every char is an ASCII hex digit past this point, so byte indexing is safe.
        let nibble = |i: usize| hex_value(digits.as_bytes()[i]);
        match digits.len() {
            3 => Ok(Self::rgb(nibble(0) * 17, nibble(1) * 17, nibble(2) * 17)),
            6 => Ok(Self::rgb(
                (nibble(0) << 4) | nibble(1),
                (nibble(2) << 4) | nibble(3),
                (nibble(4) << 4) | nibble(5),
            )),
            len => Err(ColorError::InvalidLength {
                input: input.to_string(),
                len,
            }),
        }
    }

    /// Fully opaque pixel value for painting.
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_digit_hex() {
        let c = Color::from_hex("#F6F6F6").unwrap();
        assert_eq!(c, Color::rgb(246, 246, 246));
        assert_eq!(c.to_rgba(), Rgba([246, 246, 246, 255]));
    }

    #[test]
    fn test_three_digit_hex_doubles_nibbles() {
        assert_eq!(Color::from_hex("#abc").unwrap(), Color::rgb(0xAA, 0xBB, 0xCC));
        assert_eq!(Color::from_hex("fff").unwrap(), Color::rgb(255, 255, 255));
    }

    #[test]
    fn test_mixed_case_and_whitespace() {
        assert_eq!(Color::from_hex("  #1a2B3c ").unwrap(), Color::rgb(0x1A, 0x2B, 0x3C));
    }

    #[test]
    fn test_invalid_length() {
        let err = Color::from_hex("#abcd").unwrap_err();
        assert!(matches!(err, ColorError::InvalidLength { len: 4, .. }), "got {err:?}");
    }

    #[test]
    fn test_invalid_digit() {
        let err = Color::from_hex("#12345g").unwrap_err();
        assert!(matches!(err, ColorError::InvalidDigit { found: 'g', .. }), "got {err:?}");
        // from_str_radix would accept a sign; this parser must not.
        assert!(Color::from_hex("+ff").is_err());
    }

    #[test]
    fn test_empty() {
        assert_eq!(Color::from_hex("#"), Err(ColorError::Empty));
        assert_eq!(Color::from_hex(""), Err(ColorError::Empty));
    }

    #[test]
    fn test_display_roundtrip() {
        let c = Color::rgb(1, 171, 255);
        assert_eq!(c.to_string(), "#01ABFF");
        assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            color: Color,
        }
        let w: Wrapper = toml::from_str("color = \"#0f0\"").unwrap();
        assert_eq!(w.color, Color::rgb(0, 255, 0));
        assert!(toml::from_str::<Wrapper>("color = \"green\"").is_err());
    }
}
