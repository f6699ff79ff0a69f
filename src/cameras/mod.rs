//! Camera subsystem.
//!
//! Five camera variants share one contract: produce view/projection
//! matrices for an axes (`set_view`), map between screen and world
//! coordinates, reset to given scene limits, and consume mouse drags.
//! They are modeled as a closed enum rather than a trait object so the
//! axes can store them uniformly and dispatch without indirection.
//!
//! Composition rule: rotation is applied before translation when building
//! the view; `reset` clamps requested limits to the axes' data range.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::events::{Modifiers, MouseButton};
use crate::math::Range;

/// World-space extents of the data in an axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLimits {
    pub x: Range,
    pub y: Range,
    pub z: Range,
}

impl SceneLimits {
    pub fn unit() -> Self {
        SceneLimits {
            x: Range::new(0.0, 1.0),
            y: Range::new(0.0, 1.0),
            z: Range::new(0.0, 1.0),
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            self.x.center() as f32,
            self.y.center() as f32,
            self.z.center() as f32,
        )
    }

    /// Radius of the bounding sphere.
    pub fn radius(&self) -> f32 {
        let dx = self.x.range() as f32;
        let dy = self.y.range() as f32;
        let dz = self.z.range() as f32;
        (0.5 * (dx * dx + dy * dy + dz * dz).sqrt()).max(1e-6)
    }

    /// Clamp another set of limits to this data range.
    pub fn clamp(&self, other: &SceneLimits) -> SceneLimits {
        SceneLimits {
            x: Range::new(self.x.clamp(other.x.min), self.x.clamp(other.x.max)),
            y: Range::new(self.y.clamp(other.y.min), self.y.clamp(other.y.max)),
            z: Range::new(self.z.clamp(other.z.min), self.z.clamp(other.z.max)),
        }
    }
}

/// Parameters an axes hands to its camera each frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewParams {
    /// Viewport size in physical pixels.
    pub viewport_px: (u32, u32),
    /// Per-axis display scale; negative entries flip that axis.
    pub daspect: [f64; 3],
}

impl ViewParams {
    pub fn aspect(&self) -> f32 {
        self.viewport_px.0.max(1) as f32 / self.viewport_px.1.max(1) as f32
    }
}

/// View/projection pair produced by `set_view`, cached for coordinate
/// mapping until the next call.
#[derive(Debug, Clone, Copy)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub proj: Mat4,
    pub viewport_px: (u32, u32),
}

impl CameraMatrices {
    pub fn identity() -> Self {
        CameraMatrices {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            viewport_px: (1, 1),
        }
    }

    /// World position to screen pixels (origin top-left) plus NDC depth.
    pub fn world_to_screen(&self, world: Vec3) -> Vec3 {
        let clip = self.proj * self.view * world.extend(1.0);
        let w = if clip.w.abs() < 1e-12 { 1.0 } else { clip.w };
        let ndc = clip / w;
        let (vw, vh) = (
            self.viewport_px.0.max(1) as f32,
            self.viewport_px.1.max(1) as f32,
        );
        Vec3::new(
            (ndc.x + 1.0) * 0.5 * vw,
            (1.0 - ndc.y) * 0.5 * vh,
            ndc.z,
        )
    }

    /// Screen pixels + NDC depth back to world coordinates.
    pub fn screen_to_world(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        let (vw, vh) = (
            self.viewport_px.0.max(1) as f32,
            self.viewport_px.1.max(1) as f32,
        );
        let ndc = Vec4::new(
            2.0 * x / vw - 1.0,
            1.0 - 2.0 * y / vh,
            depth,
            1.0,
        );
        let inv = (self.proj * self.view).inverse();
        let world = inv * ndc;
        if world.w.abs() > 1e-12 {
            world.truncate() / world.w
        } else {
            world.truncate()
        }
    }
}

/// Orthographic camera for 2-D plots and images.
///
/// Pans and zooms by mutating its world-space bounds directly; the view
/// matrix stays a plain look-down transform. Looks from the negative-z
/// side so textures stacked at decreasing z paint over one another in
/// insertion order.
#[derive(Debug, Clone)]
pub struct TwoDCamera {
    pub bounds_x: Range,
    pub bounds_y: Range,
    zoom_sensitivity: f64,
    matrices: CameraMatrices,
}

impl Default for TwoDCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoDCamera {
    pub fn new() -> Self {
        TwoDCamera {
            bounds_x: Range::new(0.0, 1.0),
            bounds_y: Range::new(0.0, 1.0),
            zoom_sensitivity: 0.1,
            matrices: CameraMatrices::identity(),
        }
    }

    pub fn set_view(&mut self, params: &ViewParams) -> CameraMatrices {
        let flip_y = params.daspect[1] < 0.0;
        let (bottom, top) = if flip_y {
            // Flipped y axis: y grows downward on screen (image convention).
            (self.bounds_y.max as f32, self.bounds_y.min as f32)
        } else {
            (self.bounds_y.min as f32, self.bounds_y.max as f32)
        };
        let proj = Mat4::orthographic_rh(
            self.bounds_x.min as f32,
            self.bounds_x.max as f32,
            bottom,
            top,
            -1000.0,
            1000.0,
        );
        // Eye on the -z side looking toward +z: more negative z is closer
        // to the viewer, matching the texture stacking rule.
        let view = Mat4::look_at_rh(
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::Y,
        ) * Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        self.matrices = CameraMatrices {
            view,
            proj,
            viewport_px: params.viewport_px,
        };
        self.matrices
    }

    pub fn reset(&mut self, limits: &SceneLimits) {
        self.bounds_x = limits.x;
        self.bounds_y = limits.y;
    }

    /// Pixel-space drag: left pans, right (or shift+left) zooms
    /// non-uniformly in x/y.
    pub fn on_mouse_drag(
        &mut self,
        button: MouseButton,
        delta_px: Vec2,
        viewport_px: (u32, u32),
        modifiers: Modifiers,
    ) {
        let (vw, vh) = (viewport_px.0.max(1) as f64, viewport_px.1.max(1) as f64);
        let want_zoom =
            button == MouseButton::Right || (button == MouseButton::Left && modifiers.shift);
        if want_zoom {
            // Exponential per-axis zoom about the view center.
            let fx = (-(delta_px.x as f64) / vw * 2.0).exp();
            let fy = ((delta_px.y as f64) / vh * 2.0).exp();
            self.scale_about(self.bounds_x.center(), self.bounds_y.center(), fx, fy);
        } else {
            let dx = -(delta_px.x as f64) * self.bounds_x.range() / vw;
            let dy = (delta_px.y as f64) * self.bounds_y.range() / vh;
            self.bounds_x = Range::new(self.bounds_x.min + dx, self.bounds_x.max + dx);
            self.bounds_y = Range::new(self.bounds_y.min + dy, self.bounds_y.max + dy);
        }
    }

    /// Wheel zoom, uniform, anchored at the cursor.
    pub fn on_wheel(&mut self, delta_y: f32, position_px: Vec2, viewport_px: (u32, u32)) {
        let mut factor = 1.0 - delta_y as f64 * self.zoom_sensitivity;
        if factor.abs() < 1e-3 {
            return;
        }
        factor = factor.clamp(0.2, 5.0);
        let (vw, vh) = (viewport_px.0.max(1) as f64, viewport_px.1.max(1) as f64);
        let tx = (position_px.x as f64 / vw).clamp(0.0, 1.0);
        let ty = (position_px.y as f64 / vh).clamp(0.0, 1.0);
        let pivot_x = self.bounds_x.min + tx * self.bounds_x.range();
        let pivot_y = self.bounds_y.max - ty * self.bounds_y.range();
        self.scale_about(pivot_x, pivot_y, factor, factor);
    }

    fn scale_about(&mut self, px: f64, py: f64, fx: f64, fy: f64) {
        self.bounds_x = Range::new(
            px - (px - self.bounds_x.min) * fx,
            px + (self.bounds_x.max - px) * fx,
        );
        self.bounds_y = Range::new(
            py - (py - self.bounds_y.min) * fy,
            py + (self.bounds_y.max - py) * fy,
        );
    }

    pub fn matrices(&self) -> CameraMatrices {
        self.matrices
    }
}

/// Default 3-D camera: orbiting, perspective or orthographic depending on
/// `fov` (0 degrees selects orthographic).
#[derive(Debug, Clone)]
pub struct ThreeDCamera {
    /// Look-at target in world space.
    pub loc: Vec3,
    /// Field of view in degrees; 0 switches to orthographic.
    pub fov: f32,
    pub zoom: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub roll: f32,
    /// Scene radius captured at the last reset; scales dolly distance.
    radius: f32,
    matrices: CameraMatrices,
}

impl Default for ThreeDCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreeDCamera {
    pub fn new() -> Self {
        ThreeDCamera {
            loc: Vec3::ZERO,
            fov: 0.0,
            zoom: 1.0,
            azimuth: 30.0,
            elevation: 30.0,
            roll: 0.0,
            radius: 1.0,
            matrices: CameraMatrices::identity(),
        }
    }

    /// Camera distance from the target for the current zoom.
    pub fn distance(&self) -> f32 {
        // Keep the whole bounding sphere comfortably inside the frustum.
        4.0 * self.radius / self.zoom.max(1e-4)
    }

    pub fn set_view(&mut self, params: &ViewParams) -> CameraMatrices {
        // Rotation first, then translation (view = T * R * T_loc).
        let rot = Mat4::from_rotation_z(self.roll.to_radians())
            * Mat4::from_rotation_x((self.elevation - 90.0).to_radians())
            * Mat4::from_rotation_z(-self.azimuth.to_radians());
        let daspect = Mat4::from_scale(Vec3::new(
            params.daspect[0] as f32,
            params.daspect[1] as f32,
            params.daspect[2] as f32,
        ));
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance()))
            * rot
            * daspect
            * Mat4::from_translation(-self.loc);

        let aspect = params.aspect();
        let proj = if self.fov <= 0.0 {
            let half_h = 2.0 * self.radius / self.zoom.max(1e-4);
            let half_w = half_h * aspect;
            Mat4::orthographic_rh(
                -half_w,
                half_w,
                -half_h,
                half_h,
                0.01,
                100.0 * self.radius.max(1.0),
            )
        } else {
            Mat4::perspective_rh(
                self.fov.to_radians(),
                aspect,
                (0.01 * self.radius).max(1e-4),
                100.0 * self.radius.max(1.0),
            )
        };
        self.matrices = CameraMatrices {
            view,
            proj,
            viewport_px: params.viewport_px,
        };
        self.matrices
    }

    pub fn reset(&mut self, limits: &SceneLimits) {
        self.loc = limits.center();
        self.radius = limits.radius();
        self.zoom = 1.0;
        self.azimuth = 30.0;
        self.elevation = 30.0;
        self.roll = 0.0;
    }

    pub fn on_mouse_drag(
        &mut self,
        button: MouseButton,
        delta_px: Vec2,
        viewport_px: (u32, u32),
        modifiers: Modifiers,
    ) {
        let (vw, vh) = (viewport_px.0.max(1) as f32, viewport_px.1.max(1) as f32);
        match button {
            MouseButton::Left if modifiers.shift => {
                // Pan in the view plane, scaled so a full-viewport drag
                // moves the target across the visible extent.
                let extent = 4.0 * self.radius / self.zoom.max(1e-4);
                let view = self.matrices.view;
                let right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
                let up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);
                self.loc -= right * (delta_px.x / vw) * extent;
                self.loc += up * (delta_px.y / vh) * extent;
            }
            MouseButton::Left if modifiers.ctrl => {
                self.roll = (self.roll + delta_px.x * 0.5) % 360.0;
            }
            MouseButton::Left => {
                self.azimuth = (self.azimuth - delta_px.x * 0.5) % 360.0;
                self.elevation = (self.elevation + delta_px.y * 0.5).clamp(-90.0, 90.0);
            }
            MouseButton::Right | MouseButton::Middle => {
                let factor = (delta_px.y / vh * 2.0).exp();
                self.zoom = (self.zoom * factor).clamp(1e-3, 1e4);
            }
        }
    }

    pub fn on_wheel(&mut self, delta_y: f32) {
        let factor = (delta_y * 0.1).exp();
        self.zoom = (self.zoom * factor).clamp(1e-3, 1e4);
    }

    pub fn matrices(&self) -> CameraMatrices {
        self.matrices
    }
}

/// First-person camera: WASD + mouse-look, advancing by a fixed time step
/// each frame while keys are held.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub speed: f32,
    keys_down: u8,
    radius: f32,
    matrices: CameraMatrices,
}

/// Key bits for [`FlyCamera`] movement.
pub mod fly_keys {
    pub const FORWARD: u8 = 1;
    pub const BACK: u8 = 2;
    pub const LEFT: u8 = 4;
    pub const RIGHT: u8 = 8;
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FlyCamera {
    pub fn new() -> Self {
        FlyCamera {
            position: Vec3::new(0.0, -3.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            fov: 50.0,
            speed: 1.0,
            keys_down: 0,
            radius: 1.0,
            matrices: CameraMatrices::identity(),
        }
    }

    pub fn press(&mut self, key: u8) {
        self.keys_down |= key;
    }

    pub fn release(&mut self, key: u8) {
        self.keys_down &= !key;
    }

    fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        Vec3::new(sy * cp, cy * cp, sp)
    }

    /// Advance held-key movement by a fixed time step (seconds).
    pub fn tick(&mut self, dt: f32) {
        let fwd = self.forward();
        let right = fwd.cross(Vec3::Z).normalize_or_zero();
        let step = self.speed * self.radius * dt;
        if self.keys_down & fly_keys::FORWARD != 0 {
            self.position += fwd * step;
        }
        if self.keys_down & fly_keys::BACK != 0 {
            self.position -= fwd * step;
        }
        if self.keys_down & fly_keys::LEFT != 0 {
            self.position -= right * step;
        }
        if self.keys_down & fly_keys::RIGHT != 0 {
            self.position += right * step;
        }
    }

    pub fn set_view(&mut self, params: &ViewParams) -> CameraMatrices {
        let view = Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Z);
        let proj = Mat4::perspective_rh(
            self.fov.to_radians(),
            params.aspect(),
            (0.01 * self.radius).max(1e-4),
            100.0 * self.radius.max(1.0),
        );
        self.matrices = CameraMatrices {
            view,
            proj,
            viewport_px: params.viewport_px,
        };
        self.matrices
    }

    pub fn reset(&mut self, limits: &SceneLimits) {
        self.radius = limits.radius();
        let c = limits.center();
        self.position = c - Vec3::new(0.0, 3.0 * self.radius, 0.0);
        self.yaw = 0.0;
        self.pitch = 0.0;
    }

    /// Mouse-look.
    pub fn on_mouse_drag(&mut self, _button: MouseButton, delta_px: Vec2) {
        self.yaw = (self.yaw + delta_px.x * 0.3) % 360.0;
        self.pitch = (self.pitch - delta_px.y * 0.3).clamp(-89.0, 89.0);
    }

    pub fn matrices(&self) -> CameraMatrices {
        self.matrices
    }
}

/// 2-D camera variant for polar axes: drags act on (theta, r) rather
/// than (x, y).
#[derive(Debug, Clone)]
pub struct PolarCamera {
    pub inner: TwoDCamera,
    /// Angular position of theta = 0, in degrees from +x.
    pub angular_ref_pos: f32,
    /// Clockwise angular direction when true.
    pub is_cw: bool,
}

impl Default for PolarCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarCamera {
    pub fn new() -> Self {
        PolarCamera {
            inner: TwoDCamera::new(),
            angular_ref_pos: 0.0,
            is_cw: false,
        }
    }

    pub fn set_view(&mut self, params: &ViewParams) -> CameraMatrices {
        self.inner.set_view(params)
    }

    pub fn reset(&mut self, limits: &SceneLimits) {
        // Polar scenes are radially symmetric about the origin; frame the
        // largest radius in both directions.
        let r = limits
            .x
            .max
            .abs()
            .max(limits.x.min.abs())
            .max(limits.y.max.abs())
            .max(limits.y.min.abs())
            .max(1e-6);
        self.inner.bounds_x = Range::new(-r, r);
        self.inner.bounds_y = Range::new(-r, r);
    }

    /// Horizontal drags rotate the angular reference, vertical drags zoom
    /// radially.
    pub fn on_mouse_drag(
        &mut self,
        button: MouseButton,
        delta_px: Vec2,
        viewport_px: (u32, u32),
        modifiers: Modifiers,
    ) {
        let want_zoom =
            button == MouseButton::Right || (button == MouseButton::Left && modifiers.shift);
        if want_zoom {
            let vh = viewport_px.1.max(1) as f64;
            let f = ((delta_px.y as f64) / vh * 2.0).exp();
            self.inner.scale_about(0.0, 0.0, f, f);
        } else {
            let sign = if self.is_cw { -1.0 } else { 1.0 };
            self.angular_ref_pos =
                (self.angular_ref_pos + sign * delta_px.x * 0.5) % 360.0;
        }
    }

    pub fn matrices(&self) -> CameraMatrices {
        self.inner.matrices()
    }
}

/// Closed set of camera variants sharing the camera contract.
#[derive(Debug, Clone)]
pub enum Camera {
    TwoD(TwoDCamera),
    ThreeD(ThreeDCamera),
    Fly(FlyCamera),
    Polar(PolarCamera),
}

impl Camera {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Camera::TwoD(_) => "2d",
            Camera::ThreeD(_) => "3d",
            Camera::Fly(_) => "fly",
            Camera::Polar(_) => "polar",
        }
    }

    pub fn set_view(&mut self, params: &ViewParams) -> CameraMatrices {
        match self {
            Camera::TwoD(c) => c.set_view(params),
            Camera::ThreeD(c) => c.set_view(params),
            Camera::Fly(c) => c.set_view(params),
            Camera::Polar(c) => c.set_view(params),
        }
    }

    pub fn matrices(&self) -> CameraMatrices {
        match self {
            Camera::TwoD(c) => c.matrices(),
            Camera::ThreeD(c) => c.matrices(),
            Camera::Fly(c) => c.matrices(),
            Camera::Polar(c) => c.matrices(),
        }
    }

    /// Reset view state to frame `limits` (already clamped by the axes).
    pub fn reset(&mut self, limits: &SceneLimits) {
        match self {
            Camera::TwoD(c) => c.reset(limits),
            Camera::ThreeD(c) => c.reset(limits),
            Camera::Fly(c) => c.reset(limits),
            Camera::Polar(c) => c.reset(limits),
        }
    }

    pub fn on_mouse_drag(
        &mut self,
        button: MouseButton,
        delta_px: Vec2,
        viewport_px: (u32, u32),
        modifiers: Modifiers,
    ) {
        match self {
            Camera::TwoD(c) => c.on_mouse_drag(button, delta_px, viewport_px, modifiers),
            Camera::ThreeD(c) => c.on_mouse_drag(button, delta_px, viewport_px, modifiers),
            Camera::Fly(c) => c.on_mouse_drag(button, delta_px),
            Camera::Polar(c) => c.on_mouse_drag(button, delta_px, viewport_px, modifiers),
        }
    }

    pub fn on_wheel(&mut self, delta_y: f32, position_px: Vec2, viewport_px: (u32, u32)) {
        match self {
            Camera::TwoD(c) => c.on_wheel(delta_y, position_px, viewport_px),
            Camera::ThreeD(c) => c.on_wheel(delta_y),
            Camera::Fly(c) => {
                c.speed = (c.speed * (delta_y * 0.1).exp()).clamp(0.01, 100.0);
            }
            Camera::Polar(c) => c.inner.on_wheel(delta_y, position_px, viewport_px),
        }
    }

    pub fn screen_to_world(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        self.matrices().screen_to_world(x, y, depth)
    }

    pub fn world_to_screen(&self, world: Vec3) -> Vec3 {
        self.matrices().world_to_screen(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ViewParams {
        ViewParams {
            viewport_px: (800, 600),
            daspect: [1.0, 1.0, 1.0],
        }
    }

    fn limits() -> SceneLimits {
        SceneLimits {
            x: Range::new(0.0, 4.0),
            y: Range::new(1.0, 4.0),
            z: Range::new(0.0, 0.0),
        }
    }

    #[test]
    fn twod_reset_centers_limits_in_viewport() {
        let mut cam = TwoDCamera::new();
        cam.reset(&limits());
        let m = cam.set_view(&params());
        let center = limits().center();
        let screen = m.world_to_screen(center);
        assert!((screen.x - 400.0).abs() < 1.0, "x = {}", screen.x);
        assert!((screen.y - 300.0).abs() < 1.0, "y = {}", screen.y);
    }

    #[test]
    fn twod_screen_world_roundtrip() {
        let mut cam = TwoDCamera::new();
        cam.reset(&limits());
        let m = cam.set_view(&params());
        let w = m.screen_to_world(200.0, 150.0, 0.5);
        let s = m.world_to_screen(w);
        assert!((s.x - 200.0).abs() < 1e-2);
        assert!((s.y - 150.0).abs() < 1e-2);
    }

    #[test]
    fn twod_flipped_daspect_flips_y() {
        let mut cam = TwoDCamera::new();
        cam.reset(&limits());
        let mut p = params();
        p.daspect = [1.0, -1.0, 1.0];
        let m = cam.set_view(&p);
        // With y flipped, y = min maps near the top of the viewport.
        let top = m.world_to_screen(Vec3::new(2.0, 1.0, 0.0));
        let bottom = m.world_to_screen(Vec3::new(2.0, 4.0, 0.0));
        assert!(top.y < bottom.y);
    }

    #[test]
    fn threed_reset_centers_limits_in_viewport() {
        let mut cam = ThreeDCamera::new();
        cam.reset(&limits());
        let m = cam.set_view(&params());
        let screen = m.world_to_screen(limits().center());
        assert!((screen.x - 400.0).abs() < 1.0);
        assert!((screen.y - 300.0).abs() < 1.0);
    }

    #[test]
    fn threed_zero_fov_is_orthographic() {
        let mut cam = ThreeDCamera::new();
        cam.fov = 0.0;
        cam.reset(&limits());
        let m = cam.set_view(&params());
        // Orthographic projections have no w-dependence: last row is
        // (0, 0, 0, 1).
        let row = m.proj.row(3);
        assert_eq!(row, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn threed_drag_rotates_azimuth_and_elevation() {
        let mut cam = ThreeDCamera::new();
        cam.reset(&limits());
        let az0 = cam.azimuth;
        cam.on_mouse_drag(
            MouseButton::Left,
            Vec2::new(20.0, 10.0),
            (800, 600),
            Modifiers::NONE,
        );
        assert!(cam.azimuth != az0);
        assert!(cam.elevation > 30.0);
    }

    #[test]
    fn wheel_zoom_anchors_cursor_point() {
        let mut cam = TwoDCamera::new();
        cam.reset(&limits());
        cam.set_view(&params());
        // Zoom in around the viewport center; the center point must stay.
        let before = cam.matrices().screen_to_world(400.0, 300.0, 0.5);
        cam.on_wheel(1.0, Vec2::new(400.0, 300.0), (800, 600));
        cam.set_view(&params());
        let after = cam.matrices().screen_to_world(400.0, 300.0, 0.5);
        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn fly_camera_advances_while_key_held() {
        let mut cam = FlyCamera::new();
        cam.reset(&limits());
        let p0 = cam.position;
        cam.press(fly_keys::FORWARD);
        cam.tick(0.1);
        cam.tick(0.1);
        assert!((cam.position - p0).length() > 0.0);
        cam.release(fly_keys::FORWARD);
        let p1 = cam.position;
        cam.tick(0.1);
        assert_eq!(cam.position, p1);
    }
}
