//! sciviz: a scene-graph scientific visualization core.
//!
//! A tree of visual objects (the scene graph) rendered each frame by
//! traversal over a wgpu backend: 2-D/3-D plots, images, ray-cast
//! volumes and meshes, with interchangeable cameras, tick/grid axes,
//! color-ID picking and a single-threaded event/timer core. GUI toolkit
//! bridges live outside this crate and implement the small contract in
//! [`backend`].
//!
//! The typical flow:
//!
//! ```no_run
//! use sciviz::prelude::*;
//!
//! let fig = sciviz::scene::figure(None);
//! let mut f = fig.borrow_mut();
//! let line = Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap();
//! f.add_wobject(ObjectKind::Line(line)).unwrap();
//! f.draw_now().unwrap();
//! ```

pub mod backend;
pub mod cameras;
pub mod error;
pub mod events;
pub mod gpu;
pub mod io;
pub mod math;
pub mod objects;
pub mod scene;
pub mod styling;
pub mod text;
pub mod widgets;

pub use error::{Error, Result};

/// The most commonly used types in one import.
pub mod prelude {
    pub use crate::cameras::{Camera, SceneLimits};
    pub use crate::error::{Error, Result};
    pub use crate::events::{key, EventArgs, Modifiers, MouseButton, Timer};
    pub use crate::math::{Point, PointSet, Range, Transform};
    pub use crate::objects::{
        Line, LineSpec, Mesh, MeshValues, PolarLine, RenderStyle, ScalarField, Shading,
        Text, Texture2D, Texture3D,
    };
    pub use crate::scene::{
        close_figure, current_figure, figure, DrawPass, Figure, ObjId, ObjectKind, Scene,
    };
    pub use crate::styling::ColormapSpec;
    pub use crate::widgets::{Colorbar, Label, Legend, PushButton, RangeSlider};
}
