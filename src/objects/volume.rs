//! Volume rendering wobject.
//!
//! The volume is ray-cast in a fragment shader: the geometry pass draws
//! the bounding box, each fragment computes ray entry/exit in texture
//! space and marches with a fixed step count. The accumulation rule per
//! render style lives in the WGSL sources under
//! [`crate::gpu::shaders::volume`].

use glam::Vec3;

use crate::error::{Error, Result};
use crate::math::Range;
use crate::objects::texture::ScalarField;
use crate::styling::ColormapSpec;

/// Accumulation rule along each ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderStyle {
    /// Maximum intensity projection.
    #[default]
    Mip,
    /// Stop at the first sample above the iso threshold, shade from the
    /// local gradient.
    Iso,
    /// Front-to-back alpha compositing with opacity from the colormap
    /// alpha channel.
    Ray,
    /// Ray, modulated by gradient magnitude per sample.
    EdgeRay,
    /// Ray with per-sample diffuse and specular lighting from the axes
    /// lights.
    LitRay,
}

impl RenderStyle {
    pub fn parse(s: &str) -> Result<RenderStyle> {
        Ok(match s {
            "mip" => RenderStyle::Mip,
            "iso" => RenderStyle::Iso,
            "ray" => RenderStyle::Ray,
            "edgeray" => RenderStyle::EdgeRay,
            "litray" => RenderStyle::LitRay,
            _ => return Err(Error::validation(format!("unknown render style {s:?}"))),
        })
    }
}

/// A 3-D texture rendered by ray casting.
#[derive(Debug)]
pub struct Texture3D {
    field: ScalarField,
    pub clim: Range,
    pub clim_auto: bool,
    pub colormap: ColormapSpec,
    render_style: RenderStyle,
    pub iso_threshold: f32,
    /// Fixed number of steps each ray takes through the volume.
    pub step_count: u32,
    dirty: bool,
}

impl Texture3D {
    pub fn new(field: ScalarField) -> Result<Self> {
        if field.ndim() != 3 {
            return Err(Error::validation("Texture3D takes 3-D data"));
        }
        let clim = field.value_range();
        Ok(Texture3D {
            field,
            clim,
            clim_auto: true,
            colormap: ColormapSpec::default(),
            render_style: RenderStyle::Mip,
            iso_threshold: 0.5,
            step_count: 256,
            dirty: true,
        })
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    pub fn is_color_volume(&self) -> bool {
        self.field.channels() > 1
    }

    pub fn render_style(&self) -> RenderStyle {
        self.render_style
    }

    /// Color volumes (N x N x N x 3/4) support only mip and iso.
    pub fn set_render_style(&mut self, style: RenderStyle) -> Result<()> {
        if self.is_color_volume()
            && !matches!(style, RenderStyle::Mip | RenderStyle::Iso)
        {
            return Err(Error::validation(
                "color volumes support only the mip and iso render styles",
            ));
        }
        self.render_style = style;
        self.dirty = true;
        Ok(())
    }

    pub fn set_field(&mut self, field: ScalarField) -> Result<()> {
        if field.ndim() != 3 {
            return Err(Error::validation("Texture3D takes 3-D data"));
        }
        if field.channels() > 1
            && !matches!(self.render_style, RenderStyle::Mip | RenderStyle::Iso)
        {
            self.render_style = RenderStyle::Mip;
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

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// World-space bounding box of the volume.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let [nz, ny, nx] = self.field.shape();
        let s = self.field.sampling;
        let o = self.field.origin;
        let max = Vec3::new(
            o.x + (nx.max(1) - 1) as f32 * s.x,
            o.y + (ny.max(1) - 1) as f32 * s.y,
            o.z + (nz.max(1) - 1) as f32 * s.z,
        );
        (o, max)
    }

    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        Some(self.bounds())
    }

    /// The eight bounding-box corners for the ray-entry geometry pass.
    pub fn bbox_corners(&self) -> [Vec3; 8] {
        let (min, max) = self.bounds();
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ]
    }

    /// Triangle indices over [`Texture3D::bbox_corners`]; winding faces
    /// outward so the renderer can cull front faces and rasterize the
    /// back of the box.
    pub fn bbox_indices() -> [u32; 36] {
        [
            0, 2, 1, 0, 3, 2, // z = min
            4, 5, 6, 4, 6, 7, // z = max
            0, 1, 5, 0, 5, 4, // y = min
            3, 6, 2, 3, 7, 6, // y = max
            0, 4, 7, 0, 7, 3, // x = min
            1, 2, 6, 1, 6, 5, // x = max
        ]
    }

    /// CPU maximum-intensity projection along z, used as a reference for
    /// the GPU path.
    pub fn mip_reference_z(&self) -> Vec<f32> {
        let [nz, ny, nx] = self.field.shape();
        let mut out = vec![f32::NEG_INFINITY; ny * nx];
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let v = self.field.sample(x, y, z).unwrap_or(0.0);
                    let v = if v.is_finite() { v } else { 0.0 };
                    let o = &mut out[y * nx + x];
                    if v > *o {
                        *o = v;
                    }
                }
            }
        }
        out
    }

    /// Volume statistics for diagnostics.
    pub fn statistics(&self) -> VolumeStatistics {
        VolumeStatistics {
            voxel_count: self.field.len(),
            memory_usage: self.field.estimated_memory_usage(),
            data_range: self.field.value_range(),
            shape: self.field.shape(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeStatistics {
    pub voxel_count: usize,
    pub memory_usage: usize,
    pub data_range: Range,
    pub shape: [usize; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_voxel_volume() -> Texture3D {
        let mut data = vec![0.0f32; 64 * 64 * 64];
        // voxel at (x, y, z) = (10, 20, 30)
        data[(30 * 64 + 20) * 64 + 10] = 1.0;
        Texture3D::new(ScalarField::from_3d(data, 64, 64, 64).unwrap()).unwrap()
    }

    #[test]
    fn style_parsing() {
        assert_eq!(RenderStyle::parse("mip").unwrap(), RenderStyle::Mip);
        assert_eq!(RenderStyle::parse("litray").unwrap(), RenderStyle::LitRay);
        assert!(RenderStyle::parse("xray").is_err());
    }

    #[test]
    fn color_volume_rejects_ray_styles() {
        let field = ScalarField::new([2, 2, 2], 4, vec![0.0; 32]).unwrap();
        let mut vol = Texture3D::new(field).unwrap();
        assert!(vol.set_render_style(RenderStyle::Mip).is_ok());
        assert!(vol.set_render_style(RenderStyle::Iso).is_ok());
        assert!(vol.set_render_style(RenderStyle::Ray).is_err());
        assert!(vol.set_render_style(RenderStyle::EdgeRay).is_err());
        assert!(vol.set_render_style(RenderStyle::LitRay).is_err());
    }

    #[test]
    fn scalar_volume_accepts_all_styles() {
        let mut vol = single_voxel_volume();
        for style in [
            RenderStyle::Mip,
            RenderStyle::Iso,
            RenderStyle::Ray,
            RenderStyle::EdgeRay,
            RenderStyle::LitRay,
        ] {
            vol.set_render_style(style).unwrap();
        }
    }

    #[test]
    fn mip_reference_finds_the_single_voxel() {
        let vol = single_voxel_volume();
        let proj = vol.mip_reference_z();
        let hot: Vec<usize> = proj
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hot, vec![20 * 64 + 10]);
    }

    #[test]
    fn bounds_follow_sampling_and_origin() {
        let mut field = ScalarField::from_3d(vec![0.0; 8], 2, 2, 2).unwrap();
        field.sampling = Vec3::new(2.0, 2.0, 2.0);
        field.origin = Vec3::new(1.0, 1.0, 1.0);
        let vol = Texture3D::new(field).unwrap();
        let (min, max) = vol.bounds();
        assert_eq!(min, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(max, Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn two_d_field_rejected() {
        let field = ScalarField::from_2d(vec![0.0; 4], 2, 2).unwrap();
        assert!(Texture3D::new(field).is_err());
    }
}
