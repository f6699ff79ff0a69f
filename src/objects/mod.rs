//! World-space scene objects (wobjects): lines, meshes, textures,
//! volumes and text.

pub mod line;
pub mod mesh;
pub mod text;
pub mod texture;
pub mod volume;

pub use line::{Line, LineSpec, LineStyle, MarkerStyle, PolarLine};
pub use mesh::{ColorSource, Mesh, MeshValues, Shading};
pub use text::{Text, TextContent};
pub use texture::{gaussian_taps, Interpolation, ScalarField, Texture2D};
pub use volume::{RenderStyle, Texture3D, VolumeStatistics};
