//! The scene graph: objects, axes, figures and the draw traversal.

pub mod axes;
pub mod axis;
pub mod figure;
pub mod frame;
pub mod lights;
pub mod object;
pub mod overlay;

pub use axes::{Axes, SharedCamera};
pub use axis::{AxisProps, TickSet};
pub use figure::{
    close_figure, current_figure, figure, flush_pending_draws, shutdown_figures, Figure,
    FigureHandle, FigureRegistry, Frame,
};
pub use frame::{build_frame, AxesFrame, AxesViewInfo, DrawItem, FrameGeometry, ItemKind};
pub use lights::{Light, LightSet, MAX_LIGHTS};
pub use object::{DrawPass, Node, ObjId, ObjectKind, Scene};
pub use overlay::{build_overlay, GlyphQuad, Overlay};
