//! STL mesh I/O, binary and ASCII.

use std::io::{BufRead, BufReader, Read, Write};

use glam::Vec3;

use crate::error::{Error, Result};
use crate::math::{Point, PointSet};
use crate::objects::Mesh;

/// Write a mesh as binary STL. Quads are written as two triangles.
pub fn write_binary<W: Write>(mut w: W, mesh: &Mesh) -> Result<()> {
    let indices = mesh.triangulated_indices();
    let tri_count = (indices.len() / 3) as u32;

    let mut header = [0u8; 80];
    let tag = b"binary stl";
    header[..tag.len()].copy_from_slice(tag);
    w.write_all(&header)?;
    w.write_all(&tri_count.to_le_bytes())?;

    for tri in indices.chunks(3) {
        let v: Vec<Vec3> = tri
            .iter()
            .map(|&i| {
                mesh.vertices()
                    .get(i as usize)
                    .map(|p| p.as_vec3())
                    .unwrap_or(Vec3::ZERO)
            })
            .collect();
        let n = triangle_normal(v[0], v[1], v[2]);
        for f in [n.x, n.y, n.z] {
            w.write_all(&f.to_le_bytes())?;
        }
        for vert in &v {
            for f in [vert.x, vert.y, vert.z] {
                w.write_all(&f.to_le_bytes())?;
            }
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Write a mesh as ASCII STL.
pub fn write_ascii<W: Write>(mut w: W, mesh: &Mesh, name: &str) -> Result<()> {
    writeln!(w, "solid {name}")?;
    let indices = mesh.triangulated_indices();
    for tri in indices.chunks(3) {
        let v: Vec<Vec3> = tri
            .iter()
            .map(|&i| {
                mesh.vertices()
                    .get(i as usize)
                    .map(|p| p.as_vec3())
                    .unwrap_or(Vec3::ZERO)
            })
            .collect();
        let n = triangle_normal(v[0], v[1], v[2]);
        writeln!(w, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(w, "    outer loop")?;
        for vert in &v {
            writeln!(w, "      vertex {:e} {:e} {:e}", vert.x, vert.y, vert.z)?;
        }
        writeln!(w, "    endloop")?;
        writeln!(w, "  endfacet")?;
    }
    writeln!(w, "endsolid {name}")?;
    Ok(())
}

fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let n = (b - a).cross(c - a);
    if n.length_squared() < 1e-12 {
        Vec3::Z
    } else {
        n.normalize()
    }
}

/// Read an STL file, sniffing binary versus ASCII.
pub fn read<R: Read>(mut r: R) -> Result<Mesh> {
    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    // ASCII files start with "solid" AND parse as text; binary files may
    // also start with "solid", so verify the triangle count.
    if data.starts_with(b"solid") && !looks_binary(&data) {
        read_ascii(BufReader::new(&data[..]))
    } else {
        read_binary(&data)
    }
}

fn looks_binary(data: &[u8]) -> bool {
    if data.len() < 84 {
        return false;
    }
    let count = u32::from_le_bytes(data[80..84].try_into().unwrap()) as usize;
    data.len() == 84 + count * 50
}

fn read_binary(data: &[u8]) -> Result<Mesh> {
    if data.len() < 84 {
        return Err(Error::format("binary stl shorter than its header"));
    }
    let count = u32::from_le_bytes(data[80..84].try_into().unwrap()) as usize;
    if data.len() < 84 + count * 50 {
        return Err(Error::format(format!(
            "binary stl truncated: {count} triangles declared"
        )));
    }
    let mut vertices = PointSet::new(3)?;
    let mut faces = Vec::with_capacity(count * 3);
    let mut pos = 84;
    for _ in 0..count {
        // Skip the stored normal; it is recomputed on demand.
        pos += 12;
        for _ in 0..3 {
            let x = f32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            let y = f32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap());
            let z = f32::from_le_bytes(data[pos + 8..pos + 12].try_into().unwrap());
            faces.push(vertices.len() as u32);
            vertices.push(Point::new3(x, y, z))?;
            pos += 12;
        }
        pos += 2;
    }
    Mesh::new(vertices, Some(faces), 3)
}

fn read_ascii<R: BufRead>(r: R) -> Result<Mesh> {
    let mut vertices = PointSet::new(3)?;
    let mut faces = Vec::new();
    for line in r.lines() {
        let line = line?;
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("vertex") {
            let coords: Vec<f32> = rest
                .split_whitespace()
                .map(|t| t.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::format(format!("bad stl vertex: {e}")))?;
            if coords.len() != 3 {
                return Err(Error::format("stl vertex needs three coordinates"));
            }
            faces.push(vertices.len() as u32);
            vertices.push(Point::new3(coords[0], coords[1], coords[2]))?;
        }
    }
    if vertices.len() % 3 != 0 {
        return Err(Error::format("ascii stl vertex count not a multiple of 3"));
    }
    Mesh::new(vertices, Some(faces), 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::mesh::tetrahedron;
    use std::collections::BTreeSet;

    fn vertex_set(mesh: &Mesh) -> BTreeSet<[i64; 3]> {
        // Quantized so binary round trips compare exactly.
        mesh.vertices()
            .iter()
            .map(|p| {
                [
                    (p.x() * 1e6) as i64,
                    (p.y() * 1e6) as i64,
                    (p.z() * 1e6) as i64,
                ]
            })
            .collect()
    }

    #[test]
    fn binary_roundtrip_preserves_geometry() {
        let mesh = tetrahedron();
        let mut buf = Vec::new();
        write_binary(&mut buf, &mesh).unwrap();
        let back = read(&buf[..]).unwrap();
        assert_eq!(back.face_count(), 4);
        assert_eq!(vertex_set(&mesh), vertex_set(&back));
    }

    #[test]
    fn ascii_roundtrip_within_tolerance() {
        let mesh = tetrahedron();
        let mut buf = Vec::new();
        write_ascii(&mut buf, &mesh, "tetra").unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("solid tetra"));
        let back = read(&buf[..]).unwrap();
        assert_eq!(back.face_count(), 4);
        for (a, b) in mesh
            .triangulated_indices()
            .iter()
            .zip(back.triangulated_indices().iter())
        {
            let va = mesh.vertices().get(*a as usize).unwrap();
            let vb = back.vertices().get(*b as usize).unwrap();
            assert!(va.distance(&vb).unwrap() < 1e-4);
        }
    }

    #[test]
    fn truncated_binary_rejected() {
        let mesh = tetrahedron();
        let mut buf = Vec::new();
        write_binary(&mut buf, &mesh).unwrap();
        buf.truncate(buf.len() - 10);
        assert!(read(&buf[..]).is_err());
    }
}
