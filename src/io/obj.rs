//! Wavefront OBJ mesh I/O.
//!
//! Supports v/vt/vn/f records with triangle or quad faces; materials and
//! free-form geometry are out of scope.

use std::io::{BufRead, BufReader, Read, Write};

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};
use crate::math::{Point, PointSet};
use crate::objects::{Mesh, MeshValues};

/// Write a mesh as OBJ. Normals and texture coordinates are emitted when
/// present; faces are 1-based.
pub fn write<W: Write>(mut w: W, mesh: &Mesh) -> Result<()> {
    for p in mesh.vertices().iter() {
        writeln!(w, "v {} {} {}", p.x(), p.y(), p.z())?;
    }
    let has_texcoords = matches!(mesh.values(), Some(MeshValues::TexCoords(_)));
    if let Some(MeshValues::TexCoords(tc)) = mesh.values() {
        for t in tc {
            writeln!(w, "vt {} {}", t.x, t.y)?;
        }
    }
    let has_normals = mesh.normals().is_some();
    if let Some(normals) = mesh.normals() {
        for n in normals {
            writeln!(w, "vn {} {} {}", n.x, n.y, n.z)?;
        }
    }
    for f in 0..mesh.face_count() {
        let mut line = String::from("f");
        for i in mesh.face_indices(f) {
            let k = i + 1;
            match (has_texcoords, has_normals) {
                (false, false) => line.push_str(&format!(" {k}")),
                (true, false) => line.push_str(&format!(" {k}/{k}")),
                (false, true) => line.push_str(&format!(" {k}//{k}")),
                (true, true) => line.push_str(&format!(" {k}/{k}/{k}")),
            }
        }
        writeln!(w, "{line}")?;
    }
    Ok(())
}

/// Read an OBJ file into a mesh.
///
/// All faces must share one arity (3 or 4). Vertex/texcoord/normal
/// indices are resolved per-corner; when they disagree the corner is
/// duplicated so each final vertex carries one normal and one texcoord.
pub fn read<R: Read>(r: R) -> Result<Mesh> {
    let reader = BufReader::new(r);
    let mut positions: Vec<Vec3> = Vec::new();
    let mut texcoords: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    // Corner tuples (v, vt, vn) with output index, so shared corners
    // stay shared.
    let mut corner_map: std::collections::HashMap<(u32, u32, u32), u32> =
        std::collections::HashMap::new();
    let mut out_positions = PointSet::new(3)?;
    let mut out_texcoords: Vec<Vec2> = Vec::new();
    let mut out_normals: Vec<Vec3> = Vec::new();
    let mut faces: Vec<u32> = Vec::new();
    let mut verts_per_face: Option<u8> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };
        let err = |msg: &str| Error::format(format!("obj line {}: {msg}", lineno + 1));
        match tag {
            "v" => {
                let c: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| err("bad vertex"))?;
                if c.len() < 3 {
                    return Err(err("vertex needs x y z"));
                }
                positions.push(Vec3::new(c[0], c[1], c[2]));
            }
            "vt" => {
                let c: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| err("bad texcoord"))?;
                if c.len() < 2 {
                    return Err(err("texcoord needs u v"));
                }
                texcoords.push(Vec2::new(c[0], c[1]));
            }
            "vn" => {
                let c: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| err("bad normal"))?;
                if c.len() < 3 {
                    return Err(err("normal needs x y z"));
                }
                normals.push(Vec3::new(c[0], c[1], c[2]));
            }
            "f" => {
                let corners: Vec<&str> = tokens.collect();
                if corners.len() != 3 && corners.len() != 4 {
                    return Err(err("faces must have 3 or 4 corners"));
                }
                let arity = corners.len() as u8;
                match verts_per_face {
                    None => verts_per_face = Some(arity),
                    Some(a) if a != arity => {
                        return Err(err("mixed triangle/quad faces"));
                    }
                    _ => {}
                }
                for corner in corners {
                    let mut parts = corner.split('/');
                    let v = resolve_index(parts.next(), positions.len())
                        .ok_or_else(|| err("bad face vertex index"))?;
                    let vt = match parts.next() {
                        Some("") | None => 0,
                        Some(t) => resolve_index(Some(t), texcoords.len())
                            .ok_or_else(|| err("bad face texcoord index"))?
                            + 1,
                    };
                    let vn = match parts.next() {
                        Some("") | None => 0,
                        Some(t) => resolve_index(Some(t), normals.len())
                            .ok_or_else(|| err("bad face normal index"))?
                            + 1,
                    };
                    let key = (v, vt, vn);
                    let index = match corner_map.get(&key) {
                        Some(&i) => i,
                        None => {
                            let p = positions[v as usize];
                            let i = out_positions.len() as u32;
                            out_positions.push(Point::new3(p.x, p.y, p.z))?;
                            out_texcoords.push(if vt > 0 {
                                texcoords[(vt - 1) as usize]
                            } else {
                                Vec2::ZERO
                            });
                            out_normals.push(if vn > 0 {
                                normals[(vn - 1) as usize]
                            } else {
                                Vec3::ZERO
                            });
                            corner_map.insert(key, i);
                            i
                        }
                    };
                    faces.push(index);
                }
            }
            // Groups, objects, smoothing and materials are ignored.
            "g" | "o" | "s" | "usemtl" | "mtllib" => {}
            _ => {}
        }
    }

    let vpf = verts_per_face.unwrap_or(3);
    let mut mesh = Mesh::new(out_positions, Some(faces), vpf)?;
    if !normals.is_empty() {
        mesh.set_normals(Some(out_normals))?;
    }
    if !texcoords.is_empty() {
        mesh.set_values(Some(MeshValues::TexCoords(out_texcoords)))?;
    }
    Ok(mesh)
}

/// 1-based (possibly negative, counting from the end) OBJ index to
/// 0-based.
fn resolve_index(token: Option<&str>, len: usize) -> Option<u32> {
    let t = token?.trim();
    let i = t.parse::<i64>().ok()?;
    let resolved = if i > 0 {
        i - 1
    } else if i < 0 {
        len as i64 + i
    } else {
        return None;
    };
    if resolved < 0 || resolved >= len as i64 {
        return None;
    }
    Some(resolved as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::mesh::tetrahedron;

    #[test]
    fn roundtrip_tetrahedron() {
        let mesh = tetrahedron();
        let mut buf = Vec::new();
        write(&mut buf, &mesh).unwrap();
        let back = read(&buf[..]).unwrap();
        assert_eq!(back.face_count(), 4);
        assert_eq!(back.vertices().len(), 4);
        assert_eq!(back.triangulated_indices(), mesh.triangulated_indices());
    }

    #[test]
    fn quads_and_negative_indices() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f -4 -3 -2 -1
";
        let mesh = read(src.as_bytes()).unwrap();
        assert_eq!(mesh.verts_per_face(), 4);
        assert_eq!(mesh.face_indices(0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn corner_splitting_on_disagreeing_normals() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vn 0 0 -1
f 1//1 2//1 3//2
";
        let mesh = read(src.as_bytes()).unwrap();
        assert_eq!(mesh.vertices().len(), 3);
        let normals = mesh.normals().unwrap();
        assert_eq!(normals[0], Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(normals[2], Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn mixed_arity_rejected() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
f 1 2 3
f 1 2 3 4
";
        assert!(read(src.as_bytes()).is_err());
    }
}
