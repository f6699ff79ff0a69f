//! GPU layer: renderer, shaders, colormap LUT expansion and picking.

pub mod colormap;
pub mod picking;
pub mod renderer;
pub mod shaders;

pub use colormap::{build_lut, lut_to_rgba8, LUT_SIZE};
pub use picking::{PickBuffer, PickMap};
pub use renderer::{
    vertex_utils, GpuResident, LightGpu, MarkerParams, MeshParams, PickParams,
    PipelineKind, TexParams, Uniforms, Vertex, VolumeParams, WgpuRenderer,
};
