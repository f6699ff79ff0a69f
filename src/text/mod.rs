//! Text rendering: inline markup, glyph atlases and layout.

pub mod atlas;
pub mod markup;

pub use atlas::{AtlasCache, FontAtlas, GlyphInfo, PlacedGlyph, TextLayout};
pub use markup::{parse_markup, Script, StyledGlyph};
