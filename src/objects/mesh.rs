//! Triangle/quad meshes.
//!
//! Geometry is a vertex array plus optional normals, face indices and
//! per-vertex values. Missing normals are computed from the faces;
//! flat shading duplicates vertices per face while smooth shading keeps
//! shared vertices with accumulated normals.

use glam::{Vec2, Vec3, Vec4};

use crate::error::{Error, Result};
use crate::math::{PointSet, Range};
use crate::styling::ColormapSpec;

/// Per-vertex value payload; the variant determines the color source.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshValues {
    /// Scalar per vertex, mapped through the mesh colormap.
    Scalar(Vec<f32>),
    /// Texture coordinates per vertex; a texture is sampled.
    TexCoords(Vec<Vec2>),
    /// Direct RGB per vertex.
    Rgb(Vec<Vec3>),
    /// Direct RGBA per vertex.
    Rgba(Vec<Vec4>),
}

impl MeshValues {
    pub fn len(&self) -> usize {
        match self {
            MeshValues::Scalar(v) => v.len(),
            MeshValues::TexCoords(v) => v.len(),
            MeshValues::Rgb(v) => v.len(),
            MeshValues::Rgba(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How faces (and edges) are shaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shading {
    /// Unlit, solid color.
    Plain,
    /// One normal per face.
    Flat,
    /// Interpolated vertex normals.
    #[default]
    Smooth,
    /// Diffuse quantized to three bands.
    Toon,
    /// Not drawn.
    None,
}

/// Where fragment color comes from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    VertexColors,
    Colormap,
    Texture,
    SolidColor,
}

/// A triangle or quad mesh wobject.
#[derive(Debug)]
pub struct Mesh {
    vertices: PointSet,
    normals: Option<Vec<Vec3>>,
    faces: Option<Vec<u32>>,
    verts_per_face: u8,
    values: Option<MeshValues>,

    pub face_shading: Shading,
    pub edge_shading: Shading,
    pub face_color: Vec4,
    pub edge_color: Vec4,
    pub colormap: ColormapSpec,
    pub clim: Range,
    /// Phong exponent for the specular term.
    pub shininess: f32,

    dirty: bool,
}

impl Mesh {
    /// Create a mesh; `faces` of length M*verts_per_face, or None to take
    /// consecutive vertices as faces.
    pub fn new(
        vertices: PointSet,
        faces: Option<Vec<u32>>,
        verts_per_face: u8,
    ) -> Result<Self> {
        if vertices.ndim() != 3 {
            return Err(Error::validation("mesh vertices must be 3-D points"));
        }
        if verts_per_face != 3 && verts_per_face != 4 {
            return Err(Error::validation(format!(
                "verts_per_face must be 3 or 4, got {verts_per_face}"
            )));
        }
        let n = vertices.len() as u32;
        if let Some(ref f) = faces {
            if f.len() % verts_per_face as usize != 0 {
                return Err(Error::validation(format!(
                    "face index count {} is not a multiple of {verts_per_face}",
                    f.len()
                )));
            }
            if let Some(&bad) = f.iter().find(|&&i| i >= n) {
                return Err(Error::validation(format!(
                    "face index {bad} out of range for {n} vertices"
                )));
            }
        } else if vertices.len() % verts_per_face as usize != 0 {
            return Err(Error::validation(
                "vertex count is not a multiple of verts_per_face and no face indices given",
            ));
        }
        Ok(Mesh {
            vertices,
            normals: None,
            faces,
            verts_per_face,
            values: None,
            face_shading: Shading::Smooth,
            edge_shading: Shading::None,
            face_color: Vec4::new(0.7, 0.7, 0.8, 1.0),
            edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            colormap: ColormapSpec::default(),
            clim: Range::default(),
            shininess: 50.0,
            dirty: true,
        })
    }

    pub fn vertices(&self) -> &PointSet {
        &self.vertices
    }

    pub fn verts_per_face(&self) -> u8 {
        self.verts_per_face
    }

    pub fn faces(&self) -> Option<&[u32]> {
        self.faces.as_deref()
    }

    pub fn values(&self) -> Option<&MeshValues> {
        self.values.as_ref()
    }

    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    pub fn set_normals(&mut self, normals: Option<Vec<Vec3>>) -> Result<()> {
        if let Some(ref n) = normals {
            if n.len() != self.vertices.len() {
                return Err(Error::validation(format!(
                    "{} normals for {} vertices",
                    n.len(),
                    self.vertices.len()
                )));
            }
        }
        self.normals = normals;
        self.dirty = true;
        Ok(())
    }

    pub fn set_values(&mut self, values: Option<MeshValues>) -> Result<()> {
        if let Some(ref v) = values {
            if v.len() != self.vertices.len() {
                return Err(Error::validation(format!(
                    "{} values for {} vertices",
                    v.len(),
                    self.vertices.len()
                )));
            }
            if let MeshValues::Scalar(s) = v {
                self.clim = Range::from_data_f32(s.iter());
            }
        }
        self.values = values;
        self.dirty = true;
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Color source priority: explicit RGB(A) per vertex, then colormap
    /// from scalar values, then texture from texcoords, then solid color.
    pub fn color_source(&self) -> ColorSource {
        match &self.values {
            Some(MeshValues::Rgb(_)) | Some(MeshValues::Rgba(_)) => ColorSource::VertexColors,
            Some(MeshValues::Scalar(_)) => ColorSource::Colormap,
            Some(MeshValues::TexCoords(_)) => ColorSource::Texture,
            None => ColorSource::SolidColor,
        }
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        match &self.faces {
            Some(f) => f.len() / self.verts_per_face as usize,
            None => self.vertices.len() / self.verts_per_face as usize,
        }
    }

    /// Vertex indices of face `f`.
    pub fn face_indices(&self, f: usize) -> Vec<u32> {
        let vpf = self.verts_per_face as usize;
        match &self.faces {
            Some(idx) => idx[f * vpf..(f + 1) * vpf].to_vec(),
            None => ((f * vpf) as u32..((f + 1) * vpf) as u32).collect(),
        }
    }

    fn vertex(&self, i: u32) -> Vec3 {
        self.vertices.get(i as usize).map(|p| p.as_vec3()).unwrap_or(Vec3::ZERO)
    }

    /// Normal of one face; degenerate faces yield (0, 0, 1).
    fn face_normal(&self, f: usize) -> Vec3 {
        let idx = self.face_indices(f);
        let n = if self.verts_per_face == 3 {
            let (v1, v2, v3) = (self.vertex(idx[0]), self.vertex(idx[1]), self.vertex(idx[2]));
            (v2 - v1).cross(v2 - v3)
        } else {
            // Quads: average the normals of the four 3-sub-selections.
            let v: Vec<Vec3> = idx.iter().map(|&i| self.vertex(i)).collect();
            let mut acc = Vec3::ZERO;
            for k in 0..4 {
                let (a, b, c) = (v[k], v[(k + 1) % 4], v[(k + 2) % 4]);
                acc += (b - a).cross(b - c);
            }
            acc / 4.0
        };
        if n.length_squared() < 1e-12 {
            Vec3::Z
        } else {
            n.normalize()
        }
    }

    /// Compute per-vertex normals from the faces.
    ///
    /// Per-face normals are accumulated onto their vertices and
    /// renormalized. The sign is chosen outward: a face normal pointing
    /// toward the mesh centroid is flipped.
    pub fn calculate_normals(&mut self) {
        let nv = self.vertices.len();
        if nv == 0 {
            self.normals = Some(Vec::new());
            return;
        }
        let centroid: Vec3 =
            self.vertices.iter().map(|p| p.as_vec3()).sum::<Vec3>() / nv as f32;

        let mut acc = vec![Vec3::ZERO; nv];
        for f in 0..self.face_count() {
            let idx = self.face_indices(f);
            let mut n = self.face_normal(f);
            let face_center: Vec3 =
                idx.iter().map(|&i| self.vertex(i)).sum::<Vec3>() / idx.len() as f32;
            let outward = face_center - centroid;
            if outward.length_squared() > 1e-12 && n.dot(outward) < 0.0 {
                n = -n;
            }
            for &i in &idx {
                acc[i as usize] += n;
            }
        }
        let normals = acc
            .into_iter()
            .map(|n| {
                if n.length_squared() < 1e-12 {
                    Vec3::Z
                } else {
                    n.normalize()
                }
            })
            .collect();
        self.normals = Some(normals);
        self.dirty = true;
    }

    /// Flat-shaded copy: vertices duplicated per face, each carrying the
    /// face normal. Values are duplicated alongside.
    pub fn flattened(&self) -> Result<(PointSet, Vec<Vec3>, Option<MeshValues>)> {
        let vpf = self.verts_per_face as usize;
        let mut verts = PointSet::new(3)?;
        let mut normals = Vec::new();
        let mut scalar = Vec::new();
        let mut texco = Vec::new();
        let mut rgb = Vec::new();
        let mut rgba = Vec::new();

        for f in 0..self.face_count() {
            let n = self.face_normal(f);
            for i in self.face_indices(f) {
                verts.push(self.vertices.get(i as usize).ok_or_else(|| {
                    Error::validation(format!("face index {i} out of range"))
                })?)?;
                normals.push(n);
                match &self.values {
                    Some(MeshValues::Scalar(v)) => scalar.push(v[i as usize]),
                    Some(MeshValues::TexCoords(v)) => texco.push(v[i as usize]),
                    Some(MeshValues::Rgb(v)) => rgb.push(v[i as usize]),
                    Some(MeshValues::Rgba(v)) => rgba.push(v[i as usize]),
                    None => {}
                }
            }
        }
        debug_assert_eq!(verts.len(), self.face_count() * vpf);
        let values = match &self.values {
            Some(MeshValues::Scalar(_)) => Some(MeshValues::Scalar(scalar)),
            Some(MeshValues::TexCoords(_)) => Some(MeshValues::TexCoords(texco)),
            Some(MeshValues::Rgb(_)) => Some(MeshValues::Rgb(rgb)),
            Some(MeshValues::Rgba(_)) => Some(MeshValues::Rgba(rgba)),
            None => None,
        };
        Ok((verts, normals, values))
    }

    /// Triangle index list for the GPU (quads split into two triangles).
    pub fn triangulated_indices(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for f in 0..self.face_count() {
            let idx = self.face_indices(f);
            if self.verts_per_face == 3 {
                out.extend_from_slice(&idx);
            } else {
                out.extend_from_slice(&[idx[0], idx[1], idx[2]]);
                out.extend_from_slice(&[idx[0], idx[2], idx[3]]);
            }
        }
        out
    }

    /// Unique face-boundary edges as segment endpoints, for edge
    /// shading.
    pub fn edge_segments(&self) -> Vec<[Vec3; 2]> {
        let vpf = self.verts_per_face as usize;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for f in 0..self.face_count() {
            let idx = self.face_indices(f);
            for k in 0..vpf {
                let a = idx[k];
                let b = idx[(k + 1) % vpf];
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    out.push([self.vertex(a), self.vertex(b)]);
                }
            }
        }
        out
    }

    /// World-space bounds, None when empty.
    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = self.vertices.bounds()?;
        Some((min.as_vec3(), max.as_vec3()))
    }

    pub fn estimated_memory_usage(&self) -> usize {
        let verts = self.vertices.len() * 3 * std::mem::size_of::<f32>();
        let normals = self
            .normals
            .as_ref()
            .map_or(0, |n| n.len() * std::mem::size_of::<Vec3>());
        let faces = self
            .faces
            .as_ref()
            .map_or(0, |f| f.len() * std::mem::size_of::<u32>());
        verts + normals + faces
    }
}

/// A unit tetrahedron, used by tests and as a starter solid.
pub fn tetrahedron() -> Mesh {
    let vertices = PointSet::from_flat(
        vec![
            1.0, 1.0, 1.0, //
            1.0, -1.0, -1.0, //
            -1.0, 1.0, -1.0, //
            -1.0, -1.0, 1.0,
        ],
        3,
    )
    .unwrap();
    let faces = vec![0, 1, 2, 0, 3, 1, 0, 2, 3, 1, 3, 2];
    Mesh::new(vertices, Some(faces), 3).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_indices_out_of_range_rejected() {
        let verts = PointSet::from_flat(vec![0.0; 9], 3).unwrap();
        assert!(Mesh::new(verts, Some(vec![0, 1, 3]), 3).is_err());
    }

    #[test]
    fn consecutive_vertices_form_faces() {
        let verts = PointSet::from_flat(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            3,
        )
        .unwrap();
        let mesh = Mesh::new(verts, None, 3).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.face_indices(0), vec![0, 1, 2]);
    }

    #[test]
    fn calculated_normals_are_unit_length_and_outward() {
        let mut mesh = tetrahedron();
        mesh.calculate_normals();
        let centroid = Vec3::ZERO;
        for (i, n) in mesh.normals().unwrap().iter().enumerate() {
            assert!((n.length() - 1.0).abs() < 1e-5, "normal {i} not unit");
            let v = mesh.vertices().get(i).unwrap().as_vec3();
            assert!(n.dot(v - centroid) > 0.0, "normal {i} points inward");
        }
    }

    #[test]
    fn degenerate_face_gets_default_normal() {
        // Three coincident vertices: the face has no area.
        let verts = PointSet::from_flat(vec![0.0; 9], 3).unwrap();
        let mut mesh = Mesh::new(verts, None, 3).unwrap();
        mesh.calculate_normals();
        for n in mesh.normals().unwrap() {
            assert_eq!(*n, Vec3::Z);
        }
    }

    #[test]
    fn flatten_duplicates_vertices_per_face() {
        let mesh = tetrahedron();
        let (verts, normals, _) = mesh.flattened().unwrap();
        assert_eq!(verts.len(), 12);
        assert_eq!(normals.len(), 12);
        // Within one face all three normals agree.
        assert_eq!(normals[0], normals[1]);
        assert_eq!(normals[1], normals[2]);
    }

    #[test]
    fn edge_segments_are_unique() {
        let mesh = tetrahedron();
        // A tetrahedron has 6 distinct edges, each shared by 2 faces.
        assert_eq!(mesh.edge_segments().len(), 6);
    }

    #[test]
    fn quads_triangulate_to_two_triangles() {
        let verts = PointSet::from_flat(
            vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ],
            3,
        )
        .unwrap();
        let mesh = Mesh::new(verts, None, 4).unwrap();
        assert_eq!(mesh.triangulated_indices(), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn color_source_priority() {
        let mut mesh = tetrahedron();
        assert_eq!(mesh.color_source(), ColorSource::SolidColor);
        mesh.set_values(Some(MeshValues::Scalar(vec![0.0; 4]))).unwrap();
        assert_eq!(mesh.color_source(), ColorSource::Colormap);
        mesh.set_values(Some(MeshValues::TexCoords(vec![Vec2::ZERO; 4])))
            .unwrap();
        assert_eq!(mesh.color_source(), ColorSource::Texture);
        mesh.set_values(Some(MeshValues::Rgb(vec![Vec3::ONE; 4]))).unwrap();
        assert_eq!(mesh.color_source(), ColorSource::VertexColors);
    }

    #[test]
    fn scalar_values_update_clim() {
        let mut mesh = tetrahedron();
        mesh.set_values(Some(MeshValues::Scalar(vec![1.0, 2.0, 3.0, 4.0])))
            .unwrap();
        assert_eq!(mesh.clim.min, 1.0);
        assert_eq!(mesh.clim.max, 4.0);
    }

    #[test]
    fn mismatched_value_length_rejected() {
        let mut mesh = tetrahedron();
        assert!(mesh
            .set_values(Some(MeshValues::Scalar(vec![0.0; 3])))
            .is_err());
    }
}
