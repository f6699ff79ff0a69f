//! The axes: camera set, lights, axis properties and data aspect.
//!
//! An axes owns one camera per type, selectable by name or the classic
//! shortcut integers (2 and 3). Cameras are held behind `Rc<RefCell<..>>`
//! so one instance can be shared between several axes, propagating drag
//! events across linked views. The core is single-threaded cooperative,
//! which makes the shared-cell pattern safe.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec4;

use crate::cameras::{
    Camera, FlyCamera, PolarCamera, SceneLimits, ThreeDCamera, TwoDCamera,
};
use crate::error::{Error, Result};
use crate::scene::axis::AxisProps;
use crate::scene::lights::LightSet;
use crate::widgets::RelRect;

pub type SharedCamera = Rc<RefCell<Camera>>;

#[derive(Debug)]
pub struct Axes {
    cameras: Vec<(String, SharedCamera)>,
    current: usize,
    pub lights: LightSet,
    /// Per-axis display scale; negative entries flip that axis.
    pub daspect: [f64; 3],
    pub daspect_auto: bool,
    pub background: Vec4,
    /// Position within the axes container, normalized.
    pub position: RelRect,
    pub axis: AxisProps,
}

impl Default for Axes {
    fn default() -> Self {
        Self::new()
    }
}

impl Axes {
    pub fn new() -> Self {
        let cameras: Vec<(String, SharedCamera)> = vec![
            (
                "2d".to_string(),
                Rc::new(RefCell::new(Camera::TwoD(TwoDCamera::new()))),
            ),
            (
                "3d".to_string(),
                Rc::new(RefCell::new(Camera::ThreeD(ThreeDCamera::new()))),
            ),
            (
                "fly".to_string(),
                Rc::new(RefCell::new(Camera::Fly(FlyCamera::new()))),
            ),
            (
                "polar".to_string(),
                Rc::new(RefCell::new(Camera::Polar(PolarCamera::new()))),
            ),
        ];
        Axes {
            cameras,
            current: 0,
            lights: LightSet::default(),
            daspect: [1.0, 1.0, 1.0],
            daspect_auto: true,
            background: Vec4::new(1.0, 1.0, 1.0, 1.0),
            position: RelRect::default(),
            axis: AxisProps::default(),
        }
    }

    /// The active camera.
    pub fn camera(&self) -> SharedCamera {
        self.cameras[self.current].1.clone()
    }

    pub fn camera_type(&self) -> &str {
        &self.cameras[self.current].0
    }

    /// Select by name ("2d", "3d", "fly", "polar").
    pub fn set_camera_type(&mut self, name: &str) -> Result<()> {
        match self.cameras.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.current = i;
                Ok(())
            }
            None => Err(Error::validation(format!("unknown camera type {name:?}"))),
        }
    }

    /// Select by the classic shortcut integer: 2 and 3.
    pub fn set_camera_shortcut(&mut self, shortcut: u8) -> Result<()> {
        match shortcut {
            2 => self.set_camera_type("2d"),
            3 => self.set_camera_type("3d"),
            _ => Err(Error::validation(format!(
                "unknown camera shortcut {shortcut}"
            ))),
        }
    }

    /// Install a shared camera under the given type name, replacing the
    /// axes-local instance. Drags through any axes sharing the instance
    /// move them all.
    pub fn share_camera(&mut self, name: &str, camera: SharedCamera) -> Result<()> {
        match self.cameras.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = camera;
                Ok(())
            }
            None => Err(Error::validation(format!("unknown camera type {name:?}"))),
        }
    }

    /// Reset every camera of this axes to the given limits (the caller
    /// clamps requested limits to the data range first).
    pub fn reset_cameras(&mut self, limits: &SceneLimits) {
        for (_, cam) in &self.cameras {
            cam.borrow_mut().reset(limits);
        }
    }

    /// Flip the y axis (image convention) or restore it.
    pub fn set_y_flipped(&mut self, flipped: bool) {
        self.daspect[1] = if flipped {
            -self.daspect[1].abs()
        } else {
            self.daspect[1].abs()
        };
    }

    pub fn y_flipped(&self) -> bool {
        self.daspect[1] < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_2d() {
        let axes = Axes::new();
        assert_eq!(axes.camera_type(), "2d");
    }

    #[test]
    fn shortcut_selection() {
        let mut axes = Axes::new();
        axes.set_camera_shortcut(3).unwrap();
        assert_eq!(axes.camera_type(), "3d");
        axes.set_camera_shortcut(2).unwrap();
        assert_eq!(axes.camera_type(), "2d");
        assert!(axes.set_camera_shortcut(5).is_err());
    }

    #[test]
    fn shared_camera_propagates_between_axes() {
        let mut a = Axes::new();
        let mut b = Axes::new();
        let shared = a.camera();
        b.share_camera("2d", shared.clone()).unwrap();

        // Mutating through axes a is visible through axes b.
        if let Camera::TwoD(cam) = &mut *shared.borrow_mut() {
            cam.bounds_x = crate::math::Range::new(-5.0, 5.0);
        }
        let through_b = b.camera();
        let cam = through_b.borrow();
        if let Camera::TwoD(c) = &*cam {
            assert_eq!(c.bounds_x.min, -5.0);
        } else {
            panic!("expected 2d camera");
        }
    }

    #[test]
    fn y_flip_toggles_daspect_sign() {
        let mut axes = Axes::new();
        axes.set_y_flipped(true);
        assert!(axes.y_flipped());
        assert_eq!(axes.daspect[1], -1.0);
        axes.set_y_flipped(false);
        assert_eq!(axes.daspect[1], 1.0);
    }
}
