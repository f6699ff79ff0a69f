//! Glyph atlas and text layout.
//!
//! The first draw of a given (font, size) pair lazily rasterizes the
//! glyphs it needs into a single RGBA atlas texture via fontdue. Bold is
//! synthesized by a second horizontally offset blit, italic by a shear in
//! layout; dedicated faces can be installed per style when available.

use std::collections::HashMap;

use glam::Vec2;

use crate::error::{Error, Result};
use crate::text::markup::{Script, StyledGlyph};

const ATLAS_WIDTH: usize = 1024;
const PADDING: usize = 1;
const SCRIPT_SCALE: f32 = 0.6;
const SCRIPT_SHIFT: f32 = 0.35;
const ITALIC_SHEAR: f32 = 0.2;

/// Placement of one rasterized glyph inside the atlas.
#[derive(Debug, Clone, Copy)]
pub struct GlyphInfo {
    /// Texel rectangle in the atlas.
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    /// Bitmap size in pixels.
    pub size: Vec2,
    /// Offset from the pen position to the bitmap's top-left.
    pub offset: Vec2,
    pub advance: f32,
}

/// A glyph placed by layout, in pixels relative to the anchor.
#[derive(Debug, Clone, Copy)]
pub struct PlacedGlyph {
    pub info: GlyphInfo,
    pub position: Vec2,
    pub scale: f32,
    /// Horizontal shear applied per vertical pixel (italic).
    pub shear: f32,
}

/// Finished layout of one text run.
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    pub glyphs: Vec<PlacedGlyph>,
    /// Tight bounding size of the run in pixels.
    pub size: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    ch: char,
    bold: bool,
    /// Rasterized size in tenths of a pixel, so script sizes get their
    /// own raster.
    size_10: u32,
}

/// Rasterized glyph store for one font face at one base size.
pub struct FontAtlas {
    font: fontdue::Font,
    base_size: f32,
    glyphs: HashMap<GlyphKey, GlyphInfo>,
    /// RGBA8 pixels, white with glyph coverage in alpha.
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    // Shelf packer state.
    cursor_x: usize,
    cursor_y: usize,
    shelf_height: usize,
    /// Bumped whenever pixels change; the renderer re-uploads on mismatch.
    generation: u64,
}

impl std::fmt::Debug for FontAtlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontAtlas")
            .field("base_size", &self.base_size)
            .field("glyphs", &self.glyphs.len())
            .field("extent", &(self.width, self.height))
            .finish()
    }
}

impl FontAtlas {
    /// Build an atlas for a font face given its raw file bytes.
    pub fn from_bytes(font_bytes: &[u8], base_size: f32) -> Result<Self> {
        let font = fontdue::Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(Error::resource)?;
        Ok(FontAtlas {
            font,
            base_size,
            glyphs: HashMap::new(),
            pixels: vec![0; ATLAS_WIDTH * 64 * 4],
            width: ATLAS_WIDTH,
            height: 64,
            cursor_x: 0,
            cursor_y: 0,
            shelf_height: 0,
            generation: 0,
        })
    }

    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Line height at the base size.
    pub fn line_height(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.base_size)
            .map(|m| m.new_line_size)
            .unwrap_or(1.25 * self.base_size)
    }

    fn grow_to(&mut self, height: usize) {
        if height <= self.height {
            return;
        }
        let new_height = height.next_power_of_two();
        self.pixels.resize(self.width * new_height * 4, 0);
        self.height = new_height;
    }

    /// Rasterize a glyph into the atlas if it is not there yet.
    fn ensure_glyph(&mut self, ch: char, bold: bool, px_size: f32) -> GlyphInfo {
        let key = GlyphKey {
            ch,
            bold,
            size_10: (px_size * 10.0).round() as u32,
        };
        if let Some(info) = self.glyphs.get(&key) {
            return *info;
        }

        let (metrics, coverage) = self.font.rasterize(ch, px_size);
        // Synthetic bold: re-blit shifted one pixel right.
        let extra = if bold { 1 } else { 0 };
        let gw = metrics.width + extra;
        let gh = metrics.height;

        // Shelf packing: advance the shelf, wrap rows, grow downward.
        if self.cursor_x + gw + PADDING > self.width {
            self.cursor_x = 0;
            self.cursor_y += self.shelf_height + PADDING;
            self.shelf_height = 0;
        }
        self.shelf_height = self.shelf_height.max(gh);
        self.grow_to(self.cursor_y + self.shelf_height + PADDING);

        let (x0, y0) = (self.cursor_x, self.cursor_y);
        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let a = coverage[row * metrics.width + col];
                for dx in 0..=extra {
                    let px = ((y0 + row) * self.width + x0 + col + dx) * 4;
                    let merged = self.pixels[px + 3].max(a);
                    self.pixels[px] = 255;
                    self.pixels[px + 1] = 255;
                    self.pixels[px + 2] = 255;
                    self.pixels[px + 3] = merged;
                }
            }
        }
        self.cursor_x += gw + PADDING;
        self.generation += 1;

        let info = GlyphInfo {
            uv_min: Vec2::new(x0 as f32, y0 as f32),
            uv_max: Vec2::new((x0 + gw) as f32, (y0 + gh) as f32),
            size: Vec2::new(gw as f32, gh as f32),
            offset: Vec2::new(
                metrics.xmin as f32,
                -(metrics.height as f32 + metrics.ymin as f32),
            ),
            advance: metrics.advance_width + extra as f32,
        };
        self.glyphs.insert(key, info);
        info
    }

    /// Lay out styled glyphs left to right with kerning.
    ///
    /// `halign`/`valign` in {-1, 0, 1} anchor the run (left/center/right,
    /// baseline-top/middle/bottom); rotation is applied downstream around
    /// the anchor.
    pub fn layout(&mut self, glyphs: &[StyledGlyph], halign: i8, valign: i8) -> TextLayout {
        let mut placed = Vec::with_capacity(glyphs.len());
        let mut pen_x = 0.0f32;
        let mut prev: Option<char> = None;

        for g in glyphs {
            let scale = match g.script {
                Script::Normal => 1.0,
                Script::Super | Script::Sub => SCRIPT_SCALE,
            };
            let px_size = self.base_size * scale;
            let info = self.ensure_glyph(g.ch, g.bold, px_size);

            if let Some(p) = prev {
                if let Some(kern) = self.font.horizontal_kern(p, g.ch, px_size) {
                    pen_x += kern;
                }
            }
            let dy = match g.script {
                Script::Normal => 0.0,
                Script::Super => -SCRIPT_SHIFT * self.base_size,
                Script::Sub => SCRIPT_SHIFT * self.base_size,
            };
            placed.push(PlacedGlyph {
                info,
                position: Vec2::new(pen_x, dy),
                scale: 1.0,
                shear: if g.italic { ITALIC_SHEAR } else { 0.0 },
            });
            pen_x += info.advance;
            prev = Some(g.ch);
        }

        let line_h = self.line_height();
        let size = Vec2::new(pen_x, line_h);

        // Anchor shift: halign -1 leaves the run growing right from the
        // anchor, +1 ends it at the anchor.
        let dx = match halign {
            h if h < 0 => 0.0,
            0 => -size.x / 2.0,
            _ => -size.x,
        };
        let dy = match valign {
            v if v < 0 => line_h,
            0 => line_h / 2.0,
            _ => 0.0,
        };
        for g in &mut placed {
            g.position.x += dx;
            g.position.y += dy;
        }

        TextLayout {
            glyphs: placed,
            size,
        }
    }
}

/// Process-wide cache keyed by (face id, size in tenths).
///
/// Backends register a default face once; every text object then shares
/// atlases through this cache.
#[derive(Default)]
pub struct AtlasCache {
    default_font: Option<Vec<u8>>,
    atlases: HashMap<u32, FontAtlas>,
}

impl AtlasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the default font face from raw file bytes.
    pub fn set_default_font(&mut self, bytes: Vec<u8>) {
        self.default_font = Some(bytes);
        self.atlases.clear();
    }

    pub fn has_font(&self) -> bool {
        self.default_font.is_some()
    }

    /// Atlas for the default face at `size`, created on first use.
    pub fn atlas_for(&mut self, size: f32) -> Result<&mut FontAtlas> {
        let bytes = self
            .default_font
            .as_ref()
            .ok_or_else(|| Error::resource("no font face installed"))?;
        let key = (size * 10.0).round() as u32;
        if !self.atlases.contains_key(&key) {
            let atlas = FontAtlas::from_bytes(bytes, size)?;
            self.atlases.insert(key, atlas);
        }
        Ok(self.atlases.get_mut(&key).unwrap())
    }
}
