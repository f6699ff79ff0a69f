//! Color parsing helpers.
//!
//! Single-letter color codes follow the classic plotting convention and
//! feed the line/marker style-string parser.

use glam::Vec4;

/// Map a single-letter color code to RGBA. Returns None for non-color
/// characters so the style parser can fall through to dash/marker codes.
pub fn parse_color_char(c: char) -> Option<Vec4> {
    let rgb = match c {
        'r' => (1.0, 0.0, 0.0),
        'g' => (0.0, 1.0, 0.0),
        'b' => (0.0, 0.0, 1.0),
        'c' => (0.0, 1.0, 1.0),
        'm' => (1.0, 0.0, 1.0),
        'y' => (1.0, 1.0, 0.0),
        'k' => (0.0, 0.0, 0.0),
        'w' => (1.0, 1.0, 1.0),
        _ => return None,
    };
    Some(Vec4::new(rgb.0, rgb.1, rgb.2, 1.0))
}

/// Parse `#rrggbb` or `#rrggbbaa` into RGBA.
pub fn parse_hex_color(s: &str) -> Option<Vec4> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let r = byte(0)? as f32 / 255.0;
    let g = byte(2)? as f32 / 255.0;
    let b = byte(4)? as f32 / 255.0;
    let a = if hex.len() == 8 {
        byte(6)? as f32 / 255.0
    } else {
        1.0
    };
    Some(Vec4::new(r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_codes() {
        assert_eq!(parse_color_char('r').unwrap(), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(parse_color_char('k').unwrap(), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(parse_color_char('-').is_none());
    }

    #[test]
    fn hex_codes() {
        let c = parse_hex_color("#ff8000").unwrap();
        assert!((c.x - 1.0).abs() < 1e-6);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.w, 1.0);
        assert!(parse_hex_color("#ff80").is_none());
    }
}
