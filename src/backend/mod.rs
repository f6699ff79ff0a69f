//! The GUI backend contract.
//!
//! Backend bridges (one per GUI toolkit) live outside this crate; they
//! provide a window with a wgpu-capable surface and forward input. The
//! core only requires the small trait below plus a periodic call into
//! [`process_events`] (roughly every 10 ms) to drive timers and pending
//! repaints.

use crate::events::{Modifiers, MouseButton};
use crate::scene::figure::{flush_pending_draws, FigureHandle};

/// Window-side services a bridge must provide for one figure.
pub trait WindowBackend {
    /// Make the figure's GL/wgpu surface current for rendering.
    fn make_current(&mut self);
    /// Present the rendered frame.
    fn swap_buffers(&mut self);
    fn set_title(&mut self, title: &str);
    fn set_position(&mut self, x: i32, y: i32);
    fn get_position(&self) -> (i32, i32);
    /// Request a repaint from the toolkit's paint coalescing.
    fn request_repaint(&mut self);
}

/// Input events a bridge forwards into the core, already translated to
/// core conventions (pixel coordinates, [`crate::events::key`] codes).
#[derive(Debug, Clone)]
pub enum InputEvent {
    MouseDown { x: f32, y: f32, button: MouseButton },
    MouseUp { x: f32, y: f32, button: MouseButton },
    DoubleClick { x: f32, y: f32, button: MouseButton },
    Motion { x: f32, y: f32 },
    Wheel { x: f32, y: f32, delta_y: f32 },
    KeyDown { key: u32, text: String },
    KeyUp { key: u32, text: String },
    Resize { width: u32, height: u32, device_pixel_ratio: f32 },
    CloseRequested,
}

/// Route one backend event into a figure.
pub fn dispatch_event(figure: &FigureHandle, event: InputEvent, modifiers: Modifiers) {
    let mut fig = figure.borrow_mut();
    match event {
        InputEvent::MouseDown { x, y, button } => fig.process_mouse_down(x, y, button, modifiers),
        InputEvent::MouseUp { x, y, button } => fig.process_mouse_up(x, y, button, modifiers),
        InputEvent::DoubleClick { x, y, button } => {
            fig.process_double_click(x, y, button, modifiers)
        }
        InputEvent::Motion { x, y } => fig.process_motion(x, y, modifiers),
        InputEvent::Wheel { x, y, delta_y } => fig.process_wheel(x, y, delta_y),
        InputEvent::KeyDown { key, text } => fig.process_key_down(key, &text, modifiers),
        InputEvent::KeyUp { key, text } => fig.process_key_up(key, &text, modifiers),
        InputEvent::Resize {
            width,
            height,
            device_pixel_ratio,
        } => {
            fig.set_device_pixel_ratio(device_pixel_ratio);
            fig.set_logical_size(width, height);
        }
        InputEvent::CloseRequested => fig.on_close(),
    }
}

/// The application facade every bridge implements.
pub trait Application {
    /// Initialize the toolkit (idempotent).
    fn create(&mut self);
    /// Drain the toolkit's event queue once, without blocking.
    fn process_events_once(&mut self);
    /// Enter the toolkit main loop until the last figure closes.
    fn run(&mut self);
}

/// Explicit cooperative yield: drains backend events (via the provided
/// application), fires due timers and flushes pending repaints. Callers
/// embed this inside long-running scripts to keep the UI alive.
pub fn process_events<A: Application>(app: &mut A) {
    app.process_events_once();
    crate::events::timer::sweep();
    flush_pending_draws();
}

/// Timer-and-repaint tick for headless use (no toolkit).
pub fn process_events_headless() {
    crate::events::timer::sweep();
    flush_pending_draws();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::figure::FigureRegistry;

    #[test]
    fn resize_event_updates_figure_size() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        dispatch_event(
            &fig,
            InputEvent::Resize {
                width: 300,
                height: 200,
                device_pixel_ratio: 2.0,
            },
            Modifiers::NONE,
        );
        let f = fig.borrow();
        assert_eq!(f.logical_size(), (300, 200));
        assert_eq!(f.framebuffer_size(), (600, 400));
    }

    #[test]
    fn close_event_destroys_figure() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        dispatch_event(&fig, InputEvent::CloseRequested, Modifiers::NONE);
        assert!(fig.borrow().is_destroyed());
    }
}
