//! Text placed in world coordinates.

use glam::{Vec3, Vec4};

use crate::error::Result;
use crate::text::markup::{parse_markup, StyledGlyph};

/// Shared text styling used by world-space text and screen-space labels.
#[derive(Debug, Clone)]
pub struct TextContent {
    text: String,
    runs: Vec<StyledGlyph>,
    pub font_size: f32,
    pub color: Vec4,
    /// -1 left, 0 center, 1 right.
    pub halign: i8,
    /// -1 top, 0 middle, 1 bottom.
    pub valign: i8,
    /// Rotation around the anchor, degrees counter-clockwise.
    pub angle: f32,
}

impl TextContent {
    pub fn new(text: &str) -> Result<Self> {
        let runs = parse_markup(text)?;
        Ok(TextContent {
            text: text.to_string(),
            runs,
            font_size: 14.0,
            color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            halign: -1,
            valign: 0,
            angle: 0.0,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Re-parse the markup; invalid markup leaves the content unchanged.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        let runs = parse_markup(text)?;
        self.text = text.to_string();
        self.runs = runs;
        Ok(())
    }

    pub fn runs(&self) -> &[StyledGlyph] {
        &self.runs
    }
}

/// A text wobject anchored at a world position.
#[derive(Debug, Clone)]
pub struct Text {
    pub content: TextContent,
    pub position: Vec3,
}

impl Text {
    pub fn new(text: &str, position: Vec3) -> Result<Self> {
        Ok(Text {
            content: TextContent::new(text)?,
            position,
        })
    }

    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        Some((self.position, self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_markup_keeps_previous_text() {
        let mut t = Text::new("ok", Vec3::ZERO).unwrap();
        assert!(t.content.set_text(r"\b{broken").is_err());
        assert_eq!(t.content.text(), "ok");
        assert_eq!(t.content.runs().len(), 2);
    }
}
