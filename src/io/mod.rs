//! Mesh and resource I/O: SSDF, STL and Wavefront OBJ.

pub mod obj;
pub mod ssdf;
pub mod stl;

use glam::Vec3;

use crate::error::{Error, Result};
use crate::math::PointSet;
use crate::objects::Mesh;
use ssdf::Value;

/// Encode a mesh as an SSDF struct node.
pub fn mesh_to_ssdf(mesh: &Mesh) -> Value {
    let mut fields = vec![
        (
            "verts_per_face".to_string(),
            Value::Int(mesh.verts_per_face() as i64),
        ),
        (
            "vertices".to_string(),
            Value::Array {
                shape: vec![mesh.vertices().len(), 3],
                data: mesh
                    .vertices()
                    .as_flat()
                    .iter()
                    .map(|&v| v as f64)
                    .collect(),
            },
        ),
    ];
    if let Some(faces) = mesh.faces() {
        fields.push((
            "faces".to_string(),
            Value::Array {
                shape: vec![
                    faces.len() / mesh.verts_per_face() as usize,
                    mesh.verts_per_face() as usize,
                ],
                data: faces.iter().map(|&i| i as f64).collect(),
            },
        ));
    }
    if let Some(normals) = mesh.normals() {
        fields.push((
            "normals".to_string(),
            Value::Array {
                shape: vec![normals.len(), 3],
                data: normals
                    .iter()
                    .flat_map(|n| [n.x as f64, n.y as f64, n.z as f64])
                    .collect(),
            },
        ));
    }
    Value::Struct(fields)
}

/// Decode a mesh from an SSDF struct node.
pub fn mesh_from_ssdf(value: &Value) -> Result<Mesh> {
    let vpf = match value.struct_get("verts_per_face") {
        Some(Value::Int(v)) => *v as u8,
        _ => return Err(Error::format("ssdf mesh: missing verts_per_face")),
    };
    let vertices = match value.struct_get("vertices") {
        Some(Value::Array { shape, data }) if shape.len() == 2 && shape[1] == 3 => {
            PointSet::from_flat(data.iter().map(|&v| v as f32).collect(), 3)?
        }
        _ => return Err(Error::format("ssdf mesh: missing Nx3 vertices array")),
    };
    let faces = match value.struct_get("faces") {
        Some(Value::Array { data, .. }) => {
            Some(data.iter().map(|&v| v as u32).collect::<Vec<u32>>())
        }
        None => None,
        _ => return Err(Error::format("ssdf mesh: faces must be an array")),
    };
    let mut mesh = Mesh::new(vertices, faces, vpf)?;
    if let Some(Value::Array { shape, data }) = value.struct_get("normals") {
        if shape.len() == 2 && shape[1] == 3 {
            let normals: Vec<Vec3> = data
                .chunks(3)
                .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
                .collect();
            mesh.set_normals(Some(normals))?;
        }
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::mesh::tetrahedron;

    #[test]
    fn ssdf_mesh_roundtrip() {
        let mut mesh = tetrahedron();
        mesh.calculate_normals();
        let node = mesh_to_ssdf(&mesh);
        // Through the binary form, as bundled resources are stored.
        let root = Value::Struct(vec![("mesh".into(), node)]);
        let bytes = ssdf::to_bytes(&root).unwrap();
        let parsed = ssdf::from_bytes(&bytes).unwrap();
        let back = mesh_from_ssdf(parsed.struct_get("mesh").unwrap()).unwrap();
        assert_eq!(back.vertices(), mesh.vertices());
        assert_eq!(back.faces(), mesh.faces());
        assert_eq!(back.normals().unwrap().len(), 4);
    }

    #[test]
    fn ssdf_mesh_missing_fields_rejected() {
        let empty = Value::Struct(vec![]);
        assert!(mesh_from_ssdf(&empty).is_err());
    }
}
