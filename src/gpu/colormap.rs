//! Colormap LUT expansion.
//!
//! Every colormap form (stop list or channel map) expands into one
//! 256-entry RGBA table uploaded as a 1-D texture and sampled by the
//! texture, volume and mesh shaders.

use crate::error::Result;
use crate::styling::ColormapSpec;

pub const LUT_SIZE: usize = 256;

/// Expand a colormap into the 256-entry RGBA LUT by linear interpolation.
pub fn build_lut(spec: &ColormapSpec) -> Result<Vec<[f32; 4]>> {
    spec.validate()?;
    let mut lut = Vec::with_capacity(LUT_SIZE);
    match spec {
        ColormapSpec::Stops(stops) => {
            if stops.len() == 1 {
                let s = stops[0];
                lut.resize(LUT_SIZE, [s.x, s.y, s.z, s.w]);
                return Ok(lut);
            }
            for i in 0..LUT_SIZE {
                let t = i as f32 / (LUT_SIZE - 1) as f32;
                // Uniformly spaced stops.
                let pos = t * (stops.len() - 1) as f32;
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(stops.len() - 1);
                let frac = pos - lo as f32;
                let c = stops[lo].lerp(stops[hi], frac);
                lut.push([c.x, c.y, c.z, c.w]);
            }
        }
        ColormapSpec::Channels {
            red,
            green,
            blue,
            alpha,
        } => {
            for i in 0..LUT_SIZE {
                let t = i as f32 / (LUT_SIZE - 1) as f32;
                lut.push([
                    sample_channel(red, t),
                    sample_channel(green, t),
                    sample_channel(blue, t),
                    sample_channel(alpha, t),
                ]);
            }
        }
    }
    Ok(lut)
}

/// Piecewise-linear sample of a (position, value) stop list; positions
/// outside the stop range clamp to the end values.
fn sample_channel(stops: &[(f32, f32)], t: f32) -> f32 {
    match stops {
        [] => 0.0,
        [(_, v)] => *v,
        _ => {
            if t <= stops[0].0 {
                return stops[0].1;
            }
            if t >= stops[stops.len() - 1].0 {
                return stops[stops.len() - 1].1;
            }
            for w in stops.windows(2) {
                let (p0, v0) = w[0];
                let (p1, v1) = w[1];
                if t >= p0 && t <= p1 {
                    let span = (p1 - p0).max(1e-12);
                    return v0 + (v1 - v0) * (t - p0) / span;
                }
            }
            stops[stops.len() - 1].1
        }
    }
}

/// Pack the LUT for an Rgba8 texture upload.
pub fn lut_to_rgba8(lut: &[[f32; 4]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(lut.len() * 4);
    for c in lut {
        for ch in c {
            out.push((ch.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn gray_ramp_is_linear() {
        let lut = build_lut(&crate::styling::gray()).unwrap();
        assert_eq!(lut.len(), LUT_SIZE);
        for (i, c) in lut.iter().enumerate() {
            let expected = i as f32 / 255.0;
            for ch in 0..3 {
                assert!(
                    (c[ch] - expected).abs() < 1e-5,
                    "entry {i} channel {ch}: {} vs {expected}",
                    c[ch]
                );
            }
            assert_eq!(c[3], 1.0);
        }
    }

    #[test]
    fn lut_is_monotone_for_monotone_stops() {
        let spec = ColormapSpec::Stops(vec![
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(0.3, 0.2, 0.1, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
        ]);
        let lut = build_lut(&spec).unwrap();
        for ch in 0..3 {
            for w in lut.windows(2) {
                assert!(w[1][ch] >= w[0][ch] - 1e-6);
            }
        }
    }

    #[test]
    fn channel_map_clamps_outside_stop_range() {
        let spec = ColormapSpec::Channels {
            red: vec![(0.25, 0.5), (0.75, 1.0)],
            green: vec![(0.0, 0.0), (1.0, 1.0)],
            blue: vec![(0.0, 0.0), (1.0, 0.0)],
            alpha: vec![(0.0, 1.0), (1.0, 1.0)],
        };
        let lut = build_lut(&spec).unwrap();
        assert!((lut[0][0] - 0.5).abs() < 1e-6);
        assert!((lut[255][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn single_stop_fills_lut() {
        let spec = ColormapSpec::Stops(vec![Vec4::new(0.2, 0.4, 0.6, 1.0)]);
        let lut = build_lut(&spec).unwrap();
        assert_eq!(lut.len(), LUT_SIZE);
        assert_eq!(lut[0], lut[255]);
    }

    #[test]
    fn rgba8_packing() {
        let lut = vec![[0.0, 0.5, 1.0, 1.0]];
        let bytes = lut_to_rgba8(&lut);
        assert_eq!(bytes, vec![0, 128, 255, 255]);
    }
}
