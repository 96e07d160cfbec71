//! Hex color parsing for stored student colors
//!
//! Supports `#RGB`, `#RGBA`, `#RRGGBB`, and `#RRGGBBAA`. Customization colors
//! arrive from storage as hex strings; nothing else is accepted.

use image::Rgba;
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Input string was empty
    #[error("empty color string")]
    Empty,
    /// Input string doesn't start with '#'
    #[error("color must start with '#'")]
    MissingHash,
    /// Invalid length (must be 3, 4, 6, or 8 hex chars after #)
    #[error("invalid color length {0}, expected 3, 4, 6, or 8")]
    InvalidLength(usize),
    /// Contains non-hex characters
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
}

/// Parse a hex color string into an RGBA color.
///
/// 3- and 4-digit forms double each digit (`#F00` → `#FF0000`); the alpha
/// channel defaults to 255 when absent.
pub fn parse_color(input: &str) -> Result<Rgba<u8>, ColorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ColorError::Empty);
    }

    let hex = input.strip_prefix('#').ok_or(ColorError::MissingHash)?;

    for c in hex.chars() {
        if !c.is_ascii_hexdigit() {
            return Err(ColorError::InvalidHex(c));
        }
    }

    let digit = |c: char| -> u8 { c.to_digit(16).unwrap_or(0) as u8 };
    let chars: Vec<char> = hex.chars().collect();

    match chars.len() {
        3 | 4 => {
            // Each digit is doubled: F -> FF
            let mut channels = [255u8; 4];
            for (i, &c) in chars.iter().enumerate() {
                let d = digit(c);
                channels[i] = d << 4 | d;
            }
            Ok(Rgba(channels))
        }
        6 | 8 => {
            let mut channels = [255u8; 4];
            for (i, pair) in chars.chunks(2).enumerate() {
                channels[i] = digit(pair[0]) << 4 | digit(pair[1]);
            }
            Ok(Rgba(channels))
        }
        n => Err(ColorError::InvalidLength(n)),
    }
}
