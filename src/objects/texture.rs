//! 1-D and 2-D textures with colormap, clim and anti-aliasing.
//!
//! Data lives in a [`ScalarField`]; upload to the GPU happens lazily in
//! the first draw after a data change. World-space quad corners come from
//! sampling * shape + origin, so pixel centers sit on integer
//! coordinates.

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};
use crate::math::Range;
use crate::styling::ColormapSpec;

/// A typed N-D sample array (1-, 2- or 3-D) with per-axis anisotropic
/// sampling and origin.
///
/// Shape convention is row-major, slowest axis first: 1-D data is
/// `[1, 1, n]`, 2-D images are `[1, ny, nx]`, volumes are `[nz, ny, nx]`.
/// `channels` is 1 for scalar data, 3/4 for color data.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    shape: [usize; 3],
    channels: usize,
    data: Vec<f32>,
    /// World units per sample along (x, y, z).
    pub sampling: Vec3,
    /// World position of sample (0, 0, 0).
    pub origin: Vec3,
}

impl ScalarField {
    pub fn new(shape: [usize; 3], channels: usize, data: Vec<f32>) -> Result<Self> {
        if shape.iter().any(|&d| d == 0) {
            return Err(Error::validation("field shape axes must be non-zero"));
        }
        if !(channels == 1 || channels == 3 || channels == 4) {
            return Err(Error::validation(format!(
                "field must have 1, 3 or 4 channels, got {channels}"
            )));
        }
        let expected = shape[0] * shape[1] * shape[2] * channels;
        if data.len() != expected {
            return Err(Error::validation(format!(
                "field data has {} values, shape {:?} x {} channels needs {}",
                data.len(),
                shape,
                channels,
                expected
            )));
        }
        Ok(ScalarField {
            shape,
            channels,
            data,
            sampling: Vec3::ONE,
            origin: Vec3::ZERO,
        })
    }

    /// 1-D data of length n.
    pub fn from_1d(data: Vec<f32>) -> Result<Self> {
        let n = data.len();
        Self::new([1, 1, n], 1, data)
    }

    /// 2-D grayscale image of ny rows by nx columns, row-major.
    pub fn from_2d(data: Vec<f32>, ny: usize, nx: usize) -> Result<Self> {
        Self::new([1, ny, nx], 1, data)
    }

    /// 3-D scalar volume, z-major.
    pub fn from_3d(data: Vec<f32>, nz: usize, ny: usize, nx: usize) -> Result<Self> {
        Self::new([nz, ny, nx], 1, data)
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        if self.shape[0] > 1 {
            3
        } else if self.shape[1] > 1 {
            2
        } else {
            1
        }
    }

    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First channel of the sample at (x, y, z).
    pub fn sample(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let [nz, ny, nx] = self.shape;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        Some(self.data[((z * ny + y) * nx + x) * self.channels])
    }

    /// Finite-only value range over the first channel; a constant field
    /// widens to a half-unit interval.
    pub fn value_range(&self) -> Range {
        Range::from_data_f32(self.data.iter().step_by(self.channels))
    }

    /// Copy with non-finite samples replaced by zero, as uploaded to the
    /// GPU: NaN/Inf contribute nothing to accumulation.
    pub fn sanitized_data(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|&v| if v.is_finite() { v } else { 0.0 })
            .collect()
    }

    pub fn estimated_memory_usage(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Texture interpolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Gaussian anti-aliasing weights for level `aa` in 0..=3: 2*aa+1 taps
/// per axis, normalized to sum 1.
pub fn gaussian_taps(aa: u8) -> Vec<f32> {
    let aa = aa.min(3);
    if aa == 0 {
        return vec![1.0];
    }
    let sigma = 0.6 * aa as f32;
    let mut weights: Vec<f32> = (-(aa as i32)..=aa as i32)
        .map(|k| (-(k * k) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// A 1-D or 2-D texture wobject drawn as a textured quad.
#[derive(Debug)]
pub struct Texture2D {
    field: ScalarField,
    pub clim: Range,
    /// Re-derive clim from the data on change while true.
    pub clim_auto: bool,
    pub colormap: ColormapSpec,
    /// Anti-aliasing level 0..=3, gaussian neighborhood of 2*aa+1 taps.
    pub aa: u8,
    pub interpolation: Interpolation,
    /// Stacking depth within the axes; assigned at insertion so later
    /// textures paint on top.
    pub z_offset: f32,
    dirty: bool,
}

impl Texture2D {
    pub fn new(field: ScalarField) -> Result<Self> {
        if field.ndim() > 2 {
            return Err(Error::validation(
                "Texture2D takes 1-D or 2-D data; use Texture3D for volumes",
            ));
        }
        let clim = field.value_range();
        Ok(Texture2D {
            field,
            clim,
            clim_auto: true,
            colormap: ColormapSpec::default(),
            aa: 0,
            interpolation: Interpolation::Linear,
            z_offset: 0.0,
            dirty: true,
        })
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    pub fn set_field(&mut self, field: ScalarField) -> Result<()> {
        if field.ndim() > 2 {
            return Err(Error::validation("Texture2D takes 1-D or 2-D data"));
        }
        if self.clim_auto {
            self.clim = field.value_range();
        }
        self.field = field;
        self.dirty = true;
        Ok(())
    }

    pub fn set_clim(&mut self, clim: Range) {
        self.clim = clim;
        self.clim_auto = false;
        self.dirty = true;
    }

    pub fn set_aa(&mut self, aa: u8) -> Result<()> {
        if aa > 3 {
            return Err(Error::validation(format!("aa must be 0..=3, got {aa}")));
        }
        self.aa = aa;
        self.dirty = true;
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// World-space quad corners (min, max): pixel centers on integers, so
    /// the quad extends half a sample beyond the outermost centers.
    pub fn quad(&self) -> (Vec2, Vec2) {
        let [_, ny, nx] = self.field.shape();
        let s = self.field.sampling;
        let o = self.field.origin;
        let min = Vec2::new(o.x - 0.5 * s.x, o.y - 0.5 * s.y);
        let max = Vec2::new(
            o.x + (nx as f32 - 0.5) * s.x,
            o.y + (ny as f32 - 0.5) * s.y,
        );
        (min, max)
    }

    /// World-space bounds including the stacking depth.
    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = self.quad();
        Some((
            Vec3::new(min.x, min.y, self.z_offset),
            Vec3::new(max.x, max.y, self.z_offset),
        ))
    }

    pub fn estimated_memory_usage(&self) -> usize {
        self.field.estimated_memory_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_data_mismatch_rejected() {
        assert!(ScalarField::new([1, 2, 2], 1, vec![0.0; 3]).is_err());
        assert!(ScalarField::new([1, 2, 2], 4, vec![0.0; 16]).is_ok());
    }

    #[test]
    fn sample_indexing_is_row_major() {
        let field = ScalarField::from_2d(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2, 3).unwrap();
        assert_eq!(field.sample(0, 0, 0), Some(0.0));
        assert_eq!(field.sample(2, 0, 0), Some(2.0));
        assert_eq!(field.sample(0, 1, 0), Some(3.0));
        assert_eq!(field.sample(3, 0, 0), None);
    }

    #[test]
    fn auto_clim_skips_non_finite() {
        let field =
            ScalarField::from_2d(vec![1.0, f32::NAN, 3.0, f32::INFINITY], 2, 2).unwrap();
        let tex = Texture2D::new(field).unwrap();
        assert_eq!(tex.clim.min, 1.0);
        assert_eq!(tex.clim.max, 3.0);
    }

    #[test]
    fn constant_field_widens_clim() {
        let field = ScalarField::from_2d(vec![2.0; 4], 2, 2).unwrap();
        let tex = Texture2D::new(field).unwrap();
        assert_eq!(tex.clim.min, 1.5);
        assert_eq!(tex.clim.max, 2.5);
    }

    #[test]
    fn quad_puts_pixel_centers_on_integers() {
        let field = ScalarField::from_2d(vec![0.0; 512 * 512], 512, 512).unwrap();
        let tex = Texture2D::new(field).unwrap();
        let (min, max) = tex.quad();
        assert_eq!(min, Vec2::new(-0.5, -0.5));
        assert_eq!(max, Vec2::new(511.5, 511.5));
    }

    #[test]
    fn anisotropic_sampling_scales_quad() {
        let mut field = ScalarField::from_2d(vec![0.0; 4], 2, 2).unwrap();
        field.sampling = Vec3::new(2.0, 3.0, 1.0);
        field.origin = Vec3::new(10.0, 20.0, 0.0);
        let tex = Texture2D::new(field).unwrap();
        let (min, max) = tex.quad();
        assert_eq!(min, Vec2::new(9.0, 18.5));
        assert_eq!(max, Vec2::new(13.0, 24.5));
    }

    #[test]
    fn gaussian_taps_normalized_and_sized() {
        for aa in 0..=3u8 {
            let w = gaussian_taps(aa);
            assert_eq!(w.len(), 2 * aa as usize + 1);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        // Center tap dominates.
        let w = gaussian_taps(2);
        assert!(w[2] > w[1] && w[1] > w[0]);
    }

    #[test]
    fn volume_data_rejected() {
        let field = ScalarField::from_3d(vec![0.0; 8], 2, 2, 2).unwrap();
        assert!(Texture2D::new(field).is_err());
    }

    #[test]
    fn sanitized_data_zeroes_non_finite() {
        let field = ScalarField::from_1d(vec![1.0, f32::NAN, f32::NEG_INFINITY]).unwrap();
        assert_eq!(field.sanitized_data(), vec![1.0, 0.0, 0.0]);
    }
}
