//! Tick, grid and frame generation for an axes.
//!
//! Tick locations target roughly one tick per 60 pixels, snapped to the
//! 1/2/5 decade family. Labels switch to engineering notation (exponent a
//! multiple of three) outside [1e-3, 1e4).

use glam::Vec3;

use crate::cameras::SceneLimits;
use crate::math::Range;

/// Axis display configuration owned by an [`crate::scene::axes::Axes`].
#[derive(Debug, Clone)]
pub struct AxisProps {
    pub visible: bool,
    pub show_grid: bool,
    pub show_box: bool,
    pub x_label: String,
    pub y_label: String,
    pub z_label: String,
    /// Polar mode: angular position of theta = 0 in degrees from +x.
    pub angular_ref_pos: f32,
    /// Polar mode: clockwise angles when true.
    pub is_cw: bool,
    pub tick_len_px: f32,
}

impl Default for AxisProps {
    fn default() -> Self {
        AxisProps {
            visible: true,
            show_grid: false,
            show_box: true,
            x_label: String::new(),
            y_label: String::new(),
            z_label: String::new(),
            angular_ref_pos: 0.0,
            is_cw: false,
            tick_len_px: 4.0,
        }
    }
}

/// Tick positions plus their rendered labels for one axis direction.
#[derive(Debug, Clone, Default)]
pub struct TickSet {
    pub positions: Vec<f64>,
    pub labels: Vec<String>,
}

impl TickSet {
    pub fn compute(range: Range, extent_px: f32) -> TickSet {
        let positions = compute_ticks(range, extent_px);
        let labels = positions.iter().map(|&v| tick_label(v)).collect();
        TickSet { positions, labels }
    }
}

/// Snap a raw step to the 1/2/5 decade family, rounding up.
pub fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let decade = 10f64.powf(raw.log10().floor());
    for m in [1.0, 2.0, 5.0, 10.0] {
        let step = m * decade;
        if step >= raw - decade * 1e-9 {
            return step;
        }
    }
    10.0 * decade
}

/// Tick locations for `range` drawn over `extent_px` pixels.
pub fn compute_ticks(range: Range, extent_px: f32) -> Vec<f64> {
    let span = range.range();
    if !span.is_finite() || span <= 0.0 {
        return vec![range.min];
    }
    let target = (extent_px as f64 / 60.0).max(1.0);
    let step = nice_step(span / target);
    let first = (range.min / step).ceil() * step;
    let mut out = Vec::new();
    let mut k = 0u32;
    loop {
        let v = first + step * k as f64;
        if v > range.max + step * 1e-9 || k > 1000 {
            break;
        }
        // Round to the step grid so labels do not pick up float noise.
        out.push((v / step).round() * step);
        k += 1;
    }
    out
}

/// Label for a tick value; engineering notation outside [1e-3, 1e4).
pub fn tick_label(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let a = v.abs();
    if a >= 1e4 || a < 1e-3 {
        let exp = (a.log10().floor() as i32).div_euclid(3) * 3;
        let mant = v / 10f64.powi(exp);
        format!("{}e{}", format_trimmed(mant), exp)
    } else {
        format_trimmed(v)
    }
}

fn format_trimmed(v: f64) -> String {
    let s = format!("{v:.4}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Rectangle border of a 2-D axes frame at z = 0.
pub fn border_2d(limits: &SceneLimits) -> Vec<[Vec3; 2]> {
    let (x0, x1) = (limits.x.min as f32, limits.x.max as f32);
    let (y0, y1) = (limits.y.min as f32, limits.y.max as f32);
    vec![
        [Vec3::new(x0, y0, 0.0), Vec3::new(x1, y0, 0.0)],
        [Vec3::new(x1, y0, 0.0), Vec3::new(x1, y1, 0.0)],
        [Vec3::new(x1, y1, 0.0), Vec3::new(x0, y1, 0.0)],
        [Vec3::new(x0, y1, 0.0), Vec3::new(x0, y0, 0.0)],
    ]
}

/// Grid lines across a 2-D axes at tick positions.
pub fn grid_lines_2d(
    x_ticks: &[f64],
    y_ticks: &[f64],
    limits: &SceneLimits,
) -> Vec<[Vec3; 2]> {
    let mut lines = Vec::with_capacity(x_ticks.len() + y_ticks.len());
    for &x in x_ticks {
        lines.push([
            Vec3::new(x as f32, limits.y.min as f32, 0.0),
            Vec3::new(x as f32, limits.y.max as f32, 0.0),
        ]);
    }
    for &y in y_ticks {
        lines.push([
            Vec3::new(limits.x.min as f32, y as f32, 0.0),
            Vec3::new(limits.x.max as f32, y as f32, 0.0),
        ]);
    }
    lines
}

const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn cube_corners(limits: &SceneLimits) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    for (i, c) in corners.iter_mut().enumerate() {
        *c = Vec3::new(
            if i & 1 == 0 { limits.x.min } else { limits.x.max } as f32,
            if i & 2 == 0 { limits.y.min } else { limits.y.max } as f32,
            if i & 4 == 0 { limits.z.min } else { limits.z.max } as f32,
        );
    }
    corners
}

/// Edges of the 3-D axes cube, omitting the three edges that meet at the
/// corner nearest the camera so the data stays unobstructed.
pub fn cornered_cube_edges(
    limits: &SceneLimits,
    azimuth_deg: f32,
    elevation_deg: f32,
) -> Vec<[Vec3; 2]> {
    let corners = cube_corners(limits);
    // Direction from scene center toward the camera.
    let az = azimuth_deg.to_radians();
    let el = elevation_deg.to_radians();
    let view_dir = Vec3::new(az.sin() * el.cos(), -az.cos() * el.cos(), el.sin());

    let center = limits.center();
    let nearest = (0..8)
        .max_by(|&a, &b| {
            let da = (corners[a] - center).dot(view_dir);
            let db = (corners[b] - center).dot(view_dir);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);

    CUBE_EDGES
        .iter()
        .filter(|(a, b)| *a != nearest && *b != nearest)
        .map(|&(a, b)| [corners[a], corners[b]])
        .collect()
}

/// Polar grid: concentric circles at radial tick positions plus radial
/// rays, honoring the angular reference position and direction.
pub fn polar_grid(
    radial_ticks: &[f64],
    angular_ref_pos_deg: f32,
    is_cw: bool,
    ray_step_deg: f32,
) -> (Vec<Vec<Vec3>>, Vec<[Vec3; 2]>) {
    const CIRCLE_SEGMENTS: usize = 64;
    let mut circles = Vec::new();
    let r_max = radial_ticks
        .iter()
        .cloned()
        .fold(0.0f64, f64::max) as f32;

    for &r in radial_ticks {
        if r <= 0.0 {
            continue;
        }
        let mut ring = Vec::with_capacity(CIRCLE_SEGMENTS + 1);
        for s in 0..=CIRCLE_SEGMENTS {
            let t = s as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
            ring.push(Vec3::new(r as f32 * t.cos(), r as f32 * t.sin(), 0.0));
        }
        circles.push(ring);
    }

    let mut rays = Vec::new();
    if ray_step_deg > 0.0 {
        let n = (360.0 / ray_step_deg).round() as usize;
        let sign = if is_cw { -1.0 } else { 1.0 };
        for k in 0..n {
            let theta =
                (angular_ref_pos_deg + sign * ray_step_deg * k as f32).to_radians();
            rays.push([
                Vec3::ZERO,
                Vec3::new(r_max * theta.cos(), r_max * theta.sin(), 0.0),
            ]);
        }
    }
    (circles, rays)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_snap_to_125_family() {
        assert_eq!(nice_step(0.7), 1.0);
        assert_eq!(nice_step(1.2), 2.0);
        assert_eq!(nice_step(3.0), 5.0);
        assert_eq!(nice_step(6.0), 10.0);
        assert_eq!(nice_step(0.03), 0.05);
    }

    #[test]
    fn tick_density_tracks_pixel_extent() {
        let r = Range::new(0.0, 10.0);
        let ticks = compute_ticks(r, 600.0);
        // ~10 intervals requested, step snaps to 1.
        assert_eq!(ticks.len(), 11);
        assert_eq!(ticks[0], 0.0);
        assert_eq!(*ticks.last().unwrap(), 10.0);

        let coarse = compute_ticks(r, 120.0);
        assert!(coarse.len() < ticks.len());
        for t in &coarse {
            assert!(r.contains(*t));
        }
    }

    #[test]
    fn labels_use_engineering_notation_out_of_range() {
        assert_eq!(tick_label(0.0), "0");
        assert_eq!(tick_label(2.5), "2.5");
        assert_eq!(tick_label(9999.0), "9999");
        assert_eq!(tick_label(25000.0), "25e3");
        assert_eq!(tick_label(0.0005), "500e-6");
        assert_eq!(tick_label(-12000.0), "-12e3");
    }

    #[test]
    fn cornered_cube_drops_three_edges() {
        let limits = SceneLimits {
            x: Range::new(0.0, 1.0),
            y: Range::new(0.0, 1.0),
            z: Range::new(0.0, 1.0),
        };
        let edges = cornered_cube_edges(&limits, 30.0, 30.0);
        assert_eq!(edges.len(), 9);
    }

    #[test]
    fn polar_grid_ray_count_and_circle_radius() {
        let (circles, rays) = polar_grid(&[0.0, 1.0, 2.0], 90.0, false, 30.0);
        assert_eq!(circles.len(), 2); // r = 0 yields no circle
        assert_eq!(rays.len(), 12);
        // First ray points along theta = angular_ref_pos (90 deg -> +y).
        let end = rays[0][1];
        assert!(end.x.abs() < 1e-4);
        assert!((end.y - 2.0).abs() < 1e-4);
    }
}
