//! Light set owned by an axes.
//!
//! A fixed set of at most eight lights. Light 0 is attached to the
//! camera (its direction follows the view); the others are positional in
//! world coordinates.

use glam::Vec4;

pub const MAX_LIGHTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// Position when w = 1, direction when w = 0.
    pub position: Vec4,
    pub is_on: bool,
    /// Follows the camera instead of staying fixed in world space.
    pub is_camera_light: bool,
}

impl Light {
    /// The default headlight installed as light 0.
    pub fn camera_light() -> Self {
        Light {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec4::new(1.0, 1.0, 1.0, 1.0),
            position: Vec4::new(0.0, 0.0, 1.0, 0.0),
            is_on: true,
            is_camera_light: true,
        }
    }

    pub fn off() -> Self {
        Light {
            ambient: Vec4::ZERO,
            diffuse: Vec4::ZERO,
            specular: Vec4::ZERO,
            position: Vec4::new(0.0, 0.0, 1.0, 0.0),
            is_on: false,
            is_camera_light: false,
        }
    }
}

/// The per-axes light set.
#[derive(Debug, Clone)]
pub struct LightSet {
    lights: [Light; MAX_LIGHTS],
}

impl Default for LightSet {
    fn default() -> Self {
        let mut lights = [Light::off(); MAX_LIGHTS];
        lights[0] = Light::camera_light();
        LightSet { lights }
    }
}

impl LightSet {
    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn iter_on(&self) -> impl Iterator<Item = (usize, &Light)> {
        self.lights.iter().enumerate().filter(|(_, l)| l.is_on)
    }

    pub fn all(&self) -> &[Light; MAX_LIGHTS] {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_single_camera_light() {
        let set = LightSet::default();
        let on: Vec<_> = set.iter_on().collect();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].0, 0);
        assert!(on[0].1.is_camera_light);
    }

    #[test]
    fn lights_beyond_eight_are_absent() {
        let mut set = LightSet::default();
        assert!(set.get_mut(7).is_some());
        assert!(set.get_mut(8).is_none());
    }
}
