//! Polylines with markers.
//!
//! A `Line` owns a 2-D or 3-D point set plus line and marker styling.
//! Dashing is realized on the CPU by replicating the strip into short
//! on/off pieces; markers become point sprites resolved against the
//! marker glyph atlas at draw time.

use glam::{Vec3, Vec4};

use crate::error::{Error, Result};
use crate::math::{parse_color_char, Point, PointSet};

/// Dash pattern selector, matching the classic `-`, `--`, `:`, `-.`
/// style strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    DashDot,
    /// Draw markers only.
    None,
}

/// Marker glyph selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerStyle {
    #[default]
    None,
    Plus,
    Cross,
    Point,
    Circle,
    Square,
    Diamond,
    TriangleUp,
    TriangleDown,
    TriangleLeft,
    TriangleRight,
    Pentagram,
    Hexagram,
    Star,
}

impl MarkerStyle {
    pub fn from_char(c: char) -> Option<MarkerStyle> {
        Some(match c {
            '+' => MarkerStyle::Plus,
            'x' => MarkerStyle::Cross,
            '.' => MarkerStyle::Point,
            'o' => MarkerStyle::Circle,
            's' => MarkerStyle::Square,
            'd' => MarkerStyle::Diamond,
            '^' => MarkerStyle::TriangleUp,
            'v' => MarkerStyle::TriangleDown,
            '<' => MarkerStyle::TriangleLeft,
            '>' => MarkerStyle::TriangleRight,
            'p' => MarkerStyle::Pentagram,
            'h' => MarkerStyle::Hexagram,
            '*' => MarkerStyle::Star,
            _ => return None,
        })
    }
}

/// Typed result of parsing a style string like `'r--+'`.
///
/// Parsing happens once at construction; the draw path never inspects
/// strings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineSpec {
    pub color: Option<Vec4>,
    pub style: Option<LineStyle>,
    pub marker: Option<MarkerStyle>,
}

impl LineSpec {
    pub fn parse(s: &str) -> Result<LineSpec> {
        let mut spec = LineSpec::default();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            // Two-character dash codes take precedence over '-'.
            if c == '-' && i + 1 < chars.len() && chars[i + 1] == '-' {
                spec.style = Some(LineStyle::Dashed);
                i += 2;
                continue;
            }
            if c == '-' && i + 1 < chars.len() && chars[i + 1] == '.' {
                spec.style = Some(LineStyle::DashDot);
                i += 2;
                continue;
            }
            if c == '-' {
                spec.style = Some(LineStyle::Solid);
            } else if c == ':' {
                spec.style = Some(LineStyle::Dotted);
            } else if let Some(color) = parse_color_char(c) {
                spec.color = Some(color);
            } else if let Some(marker) = MarkerStyle::from_char(c) {
                spec.marker = Some(marker);
            } else {
                return Err(Error::validation(format!(
                    "unknown style character {c:?} in {s:?}"
                )));
            }
            i += 1;
        }
        Ok(spec)
    }
}

/// A batched 2-D/3-D polyline with optional markers.
#[derive(Debug)]
pub struct Line {
    points: PointSet,

    pub line_width: f32,
    pub line_color: Vec4,
    pub line_style: LineStyle,
    pub marker_width: f32,
    pub marker_color: Vec4,
    pub marker_style: MarkerStyle,
    pub marker_edge_width: f32,
    pub marker_edge_color: Vec4,
    pub alpha: f32,

    segments: Option<Vec<[Vec3; 2]>>,
    dirty: bool,
}

impl Line {
    /// Create a line over a 2-D or 3-D point set. Mixed dimensionality is
    /// impossible by construction of [`PointSet`]; 4-D sets are rejected.
    pub fn new(points: PointSet) -> Result<Self> {
        if points.ndim() > 3 {
            return Err(Error::validation(
                "lines take 2-D or 3-D point sets, not 4-D",
            ));
        }
        Ok(Line {
            points,
            line_width: 1.0,
            line_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            line_style: LineStyle::Solid,
            marker_width: 7.0,
            marker_color: Vec4::new(0.0, 0.0, 1.0, 1.0),
            marker_style: MarkerStyle::None,
            marker_edge_width: 1.0,
            marker_edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            alpha: 1.0,
            segments: None,
            dirty: true,
        })
    }

    /// Construct from y-values at x = 0, 1, 2, ...
    pub fn from_y(y: &[f64]) -> Result<Self> {
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        Line::new(PointSet::from_xy(&x, y)?)
    }

    /// Apply a parsed style string.
    pub fn apply_spec(&mut self, spec: &LineSpec) {
        if let Some(c) = spec.color {
            self.line_color = c;
            self.marker_color = c;
        }
        if let Some(s) = spec.style {
            self.line_style = s;
        } else if spec.marker.is_some() {
            // A marker-only spec such as '+' suppresses the line.
            self.line_style = LineStyle::None;
        }
        if let Some(m) = spec.marker {
            self.marker_style = m;
        }
        self.dirty = true;
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn set_points(&mut self, points: PointSet) -> Result<()> {
        if points.ndim() > 3 {
            return Err(Error::validation(
                "lines take 2-D or 3-D point sets, not 4-D",
            ));
        }
        self.points = points;
        self.dirty = true;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// World-space bounds, None when empty.
    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = self.points.bounds()?;
        Some((min.as_vec3(), max.as_vec3()))
    }

    /// Dash pattern as (on, off) piece counts over the subdivided strip.
    fn dash_pattern(style: LineStyle) -> Option<(u32, u32)> {
        match style {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some((3, 3)),
            LineStyle::Dotted => Some((1, 2)),
            LineStyle::DashDot => Some((4, 3)),
            LineStyle::None => Some((0, 1)),
        }
    }

    /// Line-strip segments after dashing, ready for the GPU line list.
    /// Regenerated lazily after a data or style change.
    pub fn segments(&mut self) -> &[[Vec3; 2]] {
        if self.dirty || self.segments.is_none() {
            self.segments = Some(self.build_segments());
            self.dirty = false;
        }
        self.segments.as_ref().unwrap()
    }

    fn build_segments(&self) -> Vec<[Vec3; 2]> {
        let pts: Vec<Vec3> = self.points.iter().map(|p| p.as_vec3()).collect();
        if pts.len() < 2 || self.line_style == LineStyle::None {
            return Vec::new();
        }
        let Some((on, off)) = Self::dash_pattern(self.line_style) else {
            return pts.windows(2).map(|w| [w[0], w[1]]).collect();
        };

        // Subdivide by arc length into pieces; alternate on/off runs.
        let total: f32 = pts.windows(2).map(|w| (w[1] - w[0]).length()).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let piece_len = total / 120.0;
        let cycle = (on + off).max(1);
        let mut out = Vec::new();
        let mut dist = 0.0f32;
        for w in pts.windows(2) {
            let seg = w[1] - w[0];
            let len = seg.length();
            if len <= 0.0 {
                continue;
            }
            let dir = seg / len;
            let mut s = 0.0f32;
            while s < len {
                let e = (s + piece_len).min(len);
                let piece_index = ((dist + s) / piece_len) as u32 % cycle;
                if piece_index < on {
                    out.push([w[0] + dir * s, w[0] + dir * e]);
                }
                s = e;
            }
            dist += len;
        }
        out
    }

    /// Marker sprite positions (one per data point).
    pub fn marker_positions(&self) -> Vec<Vec3> {
        if self.marker_style == MarkerStyle::None {
            return Vec::new();
        }
        self.points.iter().map(|p| p.as_vec3()).collect()
    }
}

/// A line over (theta, r) pairs, mapped to cartesian coordinates while
/// honoring the axes' angular reference position and direction.
#[derive(Debug)]
pub struct PolarLine {
    /// (theta_deg, r) pairs.
    pub data: Vec<(f64, f64)>,
    pub inner: Line,
}

impl PolarLine {
    pub fn new(theta_deg: &[f64], r: &[f64]) -> Result<Self> {
        if theta_deg.len() != r.len() {
            return Err(Error::validation("theta and r must have equal length"));
        }
        let data: Vec<(f64, f64)> = theta_deg.iter().cloned().zip(r.iter().cloned()).collect();
        // Placeholder cartesian points; regenerated against the axes'
        // polar configuration before each draw.
        let inner = Line::new(PointSet::from_xy(theta_deg, r)?)?;
        Ok(PolarLine { data, inner })
    }

    /// Recompute cartesian points for the given polar configuration.
    pub fn update_cartesian(&mut self, angular_ref_pos_deg: f32, is_cw: bool) -> Result<()> {
        let sign = if is_cw { -1.0 } else { 1.0 };
        let mut set = PointSet::new(2)?;
        for &(theta, r) in &self.data {
            let a = (angular_ref_pos_deg as f64 + sign * theta).to_radians();
            set.push(Point::new2((r * a.cos()) as f32, (r * a.sin()) as f32))?;
        }
        self.inner.set_points(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_spec() {
        let spec = LineSpec::parse("r--+").unwrap();
        assert_eq!(spec.color, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(spec.style, Some(LineStyle::Dashed));
        assert_eq!(spec.marker, Some(MarkerStyle::Plus));
    }

    #[test]
    fn parse_dashdot_and_dotted() {
        assert_eq!(
            LineSpec::parse("-.").unwrap().style,
            Some(LineStyle::DashDot)
        );
        assert_eq!(LineSpec::parse(":").unwrap().style, Some(LineStyle::Dotted));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(LineSpec::parse("r--q").is_err());
    }

    #[test]
    fn marker_only_spec_suppresses_line() {
        let spec = LineSpec::parse("o").unwrap();
        let mut line = Line::from_y(&[0.0, 1.0]).unwrap();
        line.apply_spec(&spec);
        assert_eq!(line.line_style, LineStyle::None);
        assert_eq!(line.marker_style, MarkerStyle::Circle);
    }

    #[test]
    fn from_y_indexes_x() {
        let line = Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap();
        assert_eq!(line.len(), 5);
        let (min, max) = line.limits().unwrap();
        assert_eq!(min.x, 0.0);
        assert_eq!(max.x, 4.0);
        assert_eq!(min.y, 1.0);
        assert_eq!(max.y, 4.0);
    }

    #[test]
    fn solid_line_has_one_segment_per_interval() {
        let mut line = Line::from_y(&[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(line.segments().len(), 2);
    }

    #[test]
    fn dashed_line_has_gaps() {
        let mut solid = Line::from_y(&[0.0, 0.0]).unwrap();
        let solid_len: f32 = solid
            .segments()
            .iter()
            .map(|s| (s[1] - s[0]).length())
            .sum();

        let mut dashed = Line::from_y(&[0.0, 0.0]).unwrap();
        dashed.line_style = LineStyle::Dashed;
        let dashed_len: f32 = dashed
            .segments()
            .iter()
            .map(|s| (s[1] - s[0]).length())
            .sum();
        assert!(dashed_len < solid_len * 0.75);
        assert!(dashed_len > 0.0);
    }

    #[test]
    fn four_dimensional_points_rejected() {
        let set = PointSet::new(4).unwrap();
        assert!(Line::new(set).is_err());
    }

    #[test]
    fn polar_line_maps_reference_position() {
        let mut pl = PolarLine::new(&[0.0, 90.0], &[1.0, 1.0]).unwrap();
        pl.update_cartesian(0.0, false).unwrap();
        let p0 = pl.inner.points().get(0).unwrap();
        assert!((p0.x() - 1.0).abs() < 1e-6);
        assert!(p0.y().abs() < 1e-6);

        // Clockwise with the reference at +y: theta = 90 lands on +x.
        pl.update_cartesian(90.0, true).unwrap();
        let p1 = pl.inner.points().get(1).unwrap();
        assert!((p1.x() - 1.0).abs() < 1e-5);
        assert!(p1.y().abs() < 1e-5);
    }
}
