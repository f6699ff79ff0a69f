//! Per-object transform stacks.
//!
//! Each scene object owns an ordered sequence of transforms applied in
//! order during the draw pass (first entry applied closest to the
//! object's own geometry).

use glam::{Mat4, Vec3};

/// One element of an object's transform stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Translate { dx: f32, dy: f32, dz: f32 },
    Scale { sx: f32, sy: f32, sz: f32 },
    /// Angle in degrees around the (ax, ay, az) axis.
    Rotate { angle: f32, ax: f32, ay: f32, az: f32 },
}

impl Transform {
    pub fn translate(dx: f32, dy: f32, dz: f32) -> Self {
        Transform::Translate { dx, dy, dz }
    }

    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Transform::Scale { sx, sy, sz }
    }

    pub fn rotate(angle: f32, ax: f32, ay: f32, az: f32) -> Self {
        Transform::Rotate { angle, ax, ay, az }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Transform::Translate { dx, dy, dz } => Mat4::from_translation(Vec3::new(dx, dy, dz)),
            Transform::Scale { sx, sy, sz } => Mat4::from_scale(Vec3::new(sx, sy, sz)),
            Transform::Rotate { angle, ax, ay, az } => {
                let axis = Vec3::new(ax, ay, az);
                if axis.length_squared() < 1e-12 {
                    Mat4::IDENTITY
                } else {
                    Mat4::from_axis_angle(axis.normalize(), angle.to_radians())
                }
            }
        }
    }
}

/// Compose a transform stack into a single model matrix.
///
/// The sequence is applied in order, so `compose(&[a, b])` yields the
/// matrix of "a then b" acting on an object-space vertex.
pub fn compose(stack: &[Transform]) -> Mat4 {
    let mut m = Mat4::IDENTITY;
    for t in stack {
        m = t.matrix() * m;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn translate_then_scale_order() {
        // Scale applied after translation scales the translated position.
        let stack = [Transform::translate(1.0, 0.0, 0.0), Transform::scale(2.0, 2.0, 2.0)];
        let m = compose(&stack);
        let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rotate_90_about_z() {
        let m = Transform::rotate(90.0, 0.0, 0.0, 1.0).matrix();
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_axis_rotation_is_identity() {
        let m = Transform::rotate(45.0, 0.0, 0.0, 0.0).matrix();
        assert_eq!(m, Mat4::IDENTITY);
    }
}
