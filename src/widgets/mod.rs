//! Screen-space scene objects (wibjects): labels, legends, colorbars and
//! the minimal in-scene controls.
//!
//! Wibjects are positioned in normalized parent coordinates and drawn in
//! the Screen pass, after the 3-D scene.

use glam::{Vec2, Vec4};

use crate::error::Result;
use crate::math::Range;
use crate::objects::line::{LineStyle, MarkerStyle};
use crate::objects::text::TextContent;
use crate::styling::ColormapSpec;

/// Position of a wibject relative to its parent, components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RelRect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        RelRect { x, y, w, h }
    }

    /// Resolve against the parent's pixel rectangle.
    pub fn to_pixels(&self, parent_origin: Vec2, parent_size: Vec2) -> (Vec2, Vec2) {
        (
            parent_origin + Vec2::new(self.x, self.y) * parent_size,
            Vec2::new(self.w, self.h) * parent_size,
        )
    }
}

impl Default for RelRect {
    fn default() -> Self {
        RelRect::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// A screen-space text label.
#[derive(Debug, Clone)]
pub struct Label {
    pub content: TextContent,
    pub background: Option<Vec4>,
    pub rect: RelRect,
}

impl Label {
    pub fn new(text: &str) -> Result<Self> {
        Ok(Label {
            content: TextContent::new(text)?,
            background: None,
            rect: RelRect::new(0.0, 0.0, 1.0, 0.1),
        })
    }
}

/// One legend row: a line/marker sample next to its label.
#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub label: TextContent,
    pub line_color: Vec4,
    pub line_style: LineStyle,
    pub marker_style: MarkerStyle,
}

/// Legend: a vertical stack of (sample, text) rows bounded to the axes
/// area. Rows are rebuilt from the axes' child lines whenever labels
/// change.
#[derive(Debug, Clone, Default)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
    pub row_height_px: f32,
    pub sample_width_px: f32,
    pub rect: RelRect,
}

impl Legend {
    pub fn new() -> Self {
        Legend {
            entries: Vec::new(),
            row_height_px: 18.0,
            sample_width_px: 28.0,
            rect: RelRect::new(0.68, 0.04, 0.28, 0.25),
        }
    }

    /// Assign labels to line styles, truncating to the shorter list.
    pub fn set_entries(&mut self, entries: Vec<LegendEntry>) {
        self.entries = entries;
    }

    /// Pixel size of the legend box for the current entries.
    pub fn size_px(&self, max_label_width_px: f32) -> Vec2 {
        Vec2::new(
            self.sample_width_px + 8.0 + max_label_width_px + 8.0,
            self.entries.len() as f32 * self.row_height_px + 8.0,
        )
    }
}

/// Colorbar orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorbarOrientation {
    Horizontal,
    #[default]
    Vertical,
}

/// A colorbar wibject showing a colormap against its clim.
#[derive(Debug, Clone)]
pub struct Colorbar {
    pub colormap: ColormapSpec,
    pub clim: Range,
    pub orientation: ColorbarOrientation,
    pub rect: RelRect,
}

impl Colorbar {
    pub fn new(colormap: ColormapSpec, clim: Range) -> Self {
        Colorbar {
            colormap,
            clim,
            orientation: ColorbarOrientation::Vertical,
            rect: RelRect::new(0.92, 0.1, 0.04, 0.8),
        }
    }
}

/// Minimal push button; fires its mouse events through the scene's
/// regular picking dispatch.
#[derive(Debug, Clone)]
pub struct PushButton {
    pub label: TextContent,
    pub pressed: bool,
    pub face_color: Vec4,
    pub rect: RelRect,
}

impl PushButton {
    pub fn new(text: &str) -> Result<Self> {
        Ok(PushButton {
            label: TextContent::new(text)?,
            pressed: false,
            face_color: Vec4::new(0.85, 0.85, 0.85, 1.0),
            rect: RelRect::new(0.02, 0.02, 0.2, 0.08),
        })
    }
}

/// Minimal range slider over a value interval.
#[derive(Debug, Clone)]
pub struct RangeSlider {
    pub full_range: Range,
    pub value: f64,
    pub dragging: bool,
    pub rect: RelRect,
}

impl RangeSlider {
    pub fn new(full_range: Range) -> Self {
        let value = full_range.center();
        RangeSlider {
            full_range,
            value,
            dragging: false,
            rect: RelRect::new(0.02, 0.9, 0.5, 0.06),
        }
    }

    /// Move the handle to the fraction `t` of the track, clamped.
    pub fn set_fraction(&mut self, t: f64) {
        let t = t.clamp(0.0, 1.0);
        self.value = self.full_range.min + t * self.full_range.range();
    }

    pub fn fraction(&self) -> f64 {
        if self.full_range.range() <= 0.0 {
            0.0
        } else {
            (self.value - self.full_range.min) / self.full_range.range()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_rect_resolves_against_parent() {
        let r = RelRect::new(0.25, 0.5, 0.5, 0.25);
        let (origin, size) = r.to_pixels(Vec2::new(100.0, 100.0), Vec2::new(400.0, 200.0));
        assert_eq!(origin, Vec2::new(200.0, 200.0));
        assert_eq!(size, Vec2::new(200.0, 50.0));
    }

    #[test]
    fn legend_size_grows_with_entries() {
        let mut legend = Legend::new();
        assert_eq!(legend.entries.len(), 0);
        legend.set_entries(vec![
            LegendEntry {
                label: TextContent::new("a").unwrap(),
                line_color: Vec4::ONE,
                line_style: LineStyle::Solid,
                marker_style: MarkerStyle::None,
            },
            LegendEntry {
                label: TextContent::new("b").unwrap(),
                line_color: Vec4::ONE,
                line_style: LineStyle::Dashed,
                marker_style: MarkerStyle::Circle,
            },
        ]);
        let one_row = legend.row_height_px;
        let size = legend.size_px(60.0);
        assert!((size.y - (2.0 * one_row + 8.0)).abs() < 1e-6);
    }

    #[test]
    fn slider_fraction_roundtrip() {
        let mut s = RangeSlider::new(Range::new(10.0, 20.0));
        s.set_fraction(0.25);
        assert!((s.value - 12.5).abs() < 1e-9);
        assert!((s.fraction() - 0.25).abs() < 1e-9);
        s.set_fraction(2.0);
        assert_eq!(s.value, 20.0);
    }
}
