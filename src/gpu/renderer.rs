//! WGPU rendering backend.
//!
//! One renderer per figure. Pipelines are built lazily on first use and
//! rebuilt when the MSAA setting changes; per-object GPU residency
//! (buffers, textures, bind groups) is keyed by scene handle and
//! released synchronously when the object is destroyed.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::gpu::shaders;
use crate::objects::volume::RenderStyle;
use crate::scene::object::ObjId;

/// Vertex layout shared by every pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
            normal: [0.0, 0.0, 1.0],
            tex_coords: [0.0, 0.0],
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 7]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 10]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Camera + model matrices, shared by every shader as group 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            normal_matrix: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}

impl Uniforms {
    pub fn update(&mut self, view_proj: Mat4, model: Mat4) {
        self.view_proj = view_proj.to_cols_array_2d();
        self.model = model.to_cols_array_2d();
        self.normal_matrix = model.inverse().transpose().to_cols_array_2d();
    }
}

/// One light as the shaders consume it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightGpu {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub position: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MeshParams {
    pub face_color: [f32; 4],
    pub camera_pos: [f32; 4],
    pub clim: [f32; 2],
    pub shininess: f32,
    pub shading: u32,
    pub color_source: u32,
    pub light_count: u32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TexParams {
    pub clim: [f32; 2],
    pub texel: [f32; 2],
    pub weights: [f32; 4],
    pub aa: u32,
    pub channels: u32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct VolumeParams {
    pub box_min: [f32; 4],
    pub box_inv_size: [f32; 4],
    pub camera_pos: [f32; 4],
    pub clim: [f32; 2],
    pub iso_threshold: f32,
    pub step_count: u32,
    pub light_count: u32,
    pub _pad0: u32,
    pub _pad1: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MarkerParams {
    pub face_color: [f32; 4],
    pub edge_color: [f32; 4],
    pub viewport: [f32; 2],
    pub edge_width_px: f32,
    pub shape: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PickParams {
    pub id_color: [f32; 4],
}

/// Pipeline classes; volume pipelines are keyed separately by style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Lines,
    /// Flat-colored triangle lists (overlay shapes, degraded fills);
    /// drawn without depth so overlays stay on top.
    Triangles,
    /// Depth-tested flat triangles: the degraded fallback for items
    /// whose residency upload failed.
    TrianglesDepth,
    /// Line lists for the depth-free overlay pass.
    OverlayLines,
    Markers,
    Mesh,
    Texture2D,
    Text,
    PickLines,
    PickTriangles,
}

/// Per-object GPU residency, released on destroy.
pub struct GpuResident {
    pub vertex_buffer: Option<wgpu::Buffer>,
    pub vertex_count: u32,
    pub index_buffer: Option<wgpu::Buffer>,
    pub index_count: u32,
    pub bind_group: Option<wgpu::BindGroup>,
    /// Second parameter group for pipelines with three groups (mesh).
    pub bind_group2: Option<wgpu::BindGroup>,
    pub textures: Vec<wgpu::Texture>,
    /// Object generation the buffers were uploaded for.
    pub uploaded_generation: u64,
}

/// The figure's renderer.
pub struct WgpuRenderer {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Color format of the presentation target.
    pub format: wgpu::TextureFormat,
    pub msaa_sample_count: u32,

    pipelines: HashMap<PipelineKind, wgpu::RenderPipeline>,
    volume_pipelines: HashMap<RenderStyle, wgpu::RenderPipeline>,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    uniforms: Uniforms,

    mesh_bind_group_layout: wgpu::BindGroupLayout,
    mesh_texture_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    volume_bind_group_layout: wgpu::BindGroupLayout,
    marker_bind_group_layout: wgpu::BindGroupLayout,
    pick_bind_group_layout: wgpu::BindGroupLayout,
    text_bind_group_layout: wgpu::BindGroupLayout,

    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,

    residents: HashMap<ObjId, GpuResident>,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32, dim: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: dim,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

impl WgpuRenderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let uniforms = Uniforms::default();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform_bind_group_layout"),
                entries: &[uniform_entry(0)],
            });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mesh_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mesh_bind_group_layout"),
                entries: &[uniform_entry(0), storage_entry(1)],
            });
        let mesh_texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mesh_texture_bind_group_layout"),
                entries: &[
                    sampler_entry(0),
                    texture_entry(1, wgpu::TextureViewDimension::D2),
                ],
            });
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("texture_bind_group_layout"),
                entries: &[
                    uniform_entry(0),
                    sampler_entry(1),
                    texture_entry(2, wgpu::TextureViewDimension::D2),
                    sampler_entry(3),
                    texture_entry(4, wgpu::TextureViewDimension::D2),
                ],
            });
        let volume_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("volume_bind_group_layout"),
                entries: &[
                    uniform_entry(0),
                    sampler_entry(1),
                    texture_entry(2, wgpu::TextureViewDimension::D3),
                    sampler_entry(3),
                    texture_entry(4, wgpu::TextureViewDimension::D2),
                    storage_entry(5),
                ],
            });
        let marker_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("marker_bind_group_layout"),
                entries: &[uniform_entry(0)],
            });
        let pick_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("pick_bind_group_layout"),
                entries: &[uniform_entry(0)],
            });
        let text_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("text_bind_group_layout"),
                entries: &[
                    sampler_entry(0),
                    texture_entry(1, wgpu::TextureViewDimension::D2),
                ],
            });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            format,
            msaa_sample_count: 1,
            pipelines: HashMap::new(),
            volume_pipelines: HashMap::new(),
            uniform_buffer,
            uniform_bind_group,
            uniform_bind_group_layout,
            uniforms,
            mesh_bind_group_layout,
            mesh_texture_bind_group_layout,
            texture_bind_group_layout,
            volume_bind_group_layout,
            marker_bind_group_layout,
            pick_bind_group_layout,
            text_bind_group_layout,
            linear_sampler,
            nearest_sampler,
            residents: HashMap::new(),
        }
    }

    /// Clamp the requested MSAA count to portable values; pipelines are
    /// rebuilt on change.
    pub fn ensure_msaa(&mut self, requested: u32) {
        let clamped = match requested {
            0 | 1 => 1,
            2 => 2,
            4 => 4,
            _ => 4,
        };
        if self.msaa_sample_count != clamped {
            self.msaa_sample_count = clamped;
            self.pipelines.clear();
            self.volume_pipelines.clear();
        }
    }

    pub fn update_uniforms(&mut self, view_proj: Mat4, model: Mat4) {
        self.uniforms.update(view_proj, model);
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[self.uniforms]),
        );
    }

    pub fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    /// Per-draw matrix bind group; draws within one pass each carry
    /// their own buffer so matrices cannot alias.
    pub fn create_matrix_bind_group(
        &self,
        view_proj: Mat4,
        model: Mat4,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let mut uniforms = Uniforms::default();
        uniforms.update(view_proj, model);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Matrix Uniform Buffer"),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Matrix Bind Group"),
            layout: &self.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    pub fn sampler(&self, linear: bool) -> &wgpu::Sampler {
        if linear {
            &self.linear_sampler
        } else {
            &self.nearest_sampler
        }
    }

    pub fn create_vertex_buffer(&self, vertices: &[Vertex]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    pub fn create_index_buffer(&self, indices: &[u32]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
    }

    /// Upload a float image as an Rgba32Float texture (scalar data lands
    /// in the red channel).
    pub fn create_data_texture_2d(
        &self,
        width: u32,
        height: u32,
        rgba_f32: &[f32],
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Data Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(rgba_f32),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Upload a 3-D scalar volume as R32Float.
    pub fn create_volume_texture(
        &self,
        extent: (u32, u32, u32),
        data: &[f32],
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let (nx, ny, nz) = extent;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume Texture"),
            size: wgpu::Extent3d {
                width: nx,
                height: ny,
                depth_or_array_layers: nz,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * nx),
                rows_per_image: Some(ny),
            },
            wgpu::Extent3d {
                width: nx,
                height: ny,
                depth_or_array_layers: nz,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Upload a 256-entry LUT as a 256x1 Rgba8 texture.
    pub fn create_lut_texture(&self, lut_rgba8: &[u8]) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Colormap LUT"),
            size: wgpu::Extent3d {
                width: 256,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            lut_rgba8,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * 256),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 256,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Off-screen pick target plus its readback buffer; rows are padded
    /// to the copy alignment.
    pub fn create_pick_target(
        &self,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView, wgpu::Buffer, u32) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Pick Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bytes_per_row =
            (4 * width + wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1)
                / wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
                * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick Readback Buffer"),
            size: (bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        (texture, view, buffer, bytes_per_row)
    }

    /// Map the pick readback buffer and return its bytes.
    pub async fn read_pick_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
        let slice = buffer.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.await
            .map_err(|_| Error::resource("pick readback channel dropped"))?
            .map_err(|e| Error::resource(format!("pick readback map failed: {e:?}")))?;
        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(data)
    }

    pub fn resident(&self, id: ObjId) -> Option<&GpuResident> {
        self.residents.get(&id)
    }

    pub fn resident_mut(&mut self, id: ObjId) -> Option<&mut GpuResident> {
        self.residents.get_mut(&id)
    }

    pub fn install_resident(&mut self, id: ObjId, resident: GpuResident) {
        self.residents.insert(id, resident);
    }

    /// Release GPU resources for destroyed objects. Dropping the handles
    /// destroys the underlying buffers and textures.
    pub fn release(&mut self, ids: &[ObjId]) {
        for id in ids {
            if self.residents.remove(id).is_some() {
                log::trace!(target: "sciviz", "released gpu resources for node {}", id.index());
            }
        }
    }

    fn shader(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    fn build_pipeline(
        &self,
        label: &str,
        shader: &wgpu::ShaderModule,
        extra_layouts: &[&wgpu::BindGroupLayout],
        topology: wgpu::PrimitiveTopology,
        blend: Option<wgpu::BlendState>,
        depth: bool,
        cull: Option<wgpu::Face>,
        samples: u32,
    ) -> wgpu::RenderPipeline {
        let mut layouts: Vec<&wgpu::BindGroupLayout> = vec![&self.uniform_bind_group_layout];
        layouts.extend_from_slice(extra_layouts);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: "vs_main",
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: cull,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: if depth {
                    Some(wgpu::DepthStencilState {
                        format: wgpu::TextureFormat::Depth32Float,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    })
                } else {
                    None
                },
                multisample: wgpu::MultisampleState {
                    count: samples,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
    }

    /// Pipeline for a kind, built on first use.
    pub fn ensure_pipeline(&mut self, kind: PipelineKind) {
        if self.pipelines.contains_key(&kind) {
            return;
        }
        let samples = self.msaa_sample_count;
        let pipeline = match kind {
            PipelineKind::Lines => {
                let shader = self.shader("Line Shader", shaders::line::LINE);
                self.build_pipeline(
                    "Line Pipeline",
                    &shader,
                    &[],
                    wgpu::PrimitiveTopology::LineList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    true,
                    None,
                    samples,
                )
            }
            PipelineKind::Triangles => {
                let shader = self.shader("Overlay Shader", shaders::line::LINE);
                self.build_pipeline(
                    "Triangle Pipeline",
                    &shader,
                    &[],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    false,
                    None,
                    samples,
                )
            }
            PipelineKind::TrianglesDepth => {
                let shader = self.shader("Fallback Triangle Shader", shaders::line::LINE);
                self.build_pipeline(
                    "Fallback Triangle Pipeline",
                    &shader,
                    &[],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    true,
                    None,
                    samples,
                )
            }
            PipelineKind::OverlayLines => {
                let shader = self.shader("Overlay Line Shader", shaders::line::LINE);
                self.build_pipeline(
                    "Overlay Line Pipeline",
                    &shader,
                    &[],
                    wgpu::PrimitiveTopology::LineList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    false,
                    None,
                    samples,
                )
            }
            PipelineKind::Markers => {
                let shader = self.shader("Marker Shader", shaders::marker::MARKER);
                self.build_pipeline(
                    "Marker Pipeline",
                    &shader,
                    &[&self.marker_bind_group_layout],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    true,
                    None,
                    samples,
                )
            }
            PipelineKind::Mesh => {
                let shader = self.shader("Mesh Shader", shaders::mesh::MESH);
                self.build_pipeline(
                    "Mesh Pipeline",
                    &shader,
                    &[
                        &self.mesh_bind_group_layout,
                        &self.mesh_texture_bind_group_layout,
                    ],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    true,
                    None,
                    samples,
                )
            }
            PipelineKind::Texture2D => {
                let shader = self.shader("Texture Shader", shaders::texture::TEXTURE2D);
                self.build_pipeline(
                    "Texture Pipeline",
                    &shader,
                    &[&self.texture_bind_group_layout],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    true,
                    None,
                    samples,
                )
            }
            PipelineKind::Text => {
                let shader = self.shader("Text Shader", shaders::text::TEXT);
                self.build_pipeline(
                    "Text Pipeline",
                    &shader,
                    &[&self.text_bind_group_layout],
                    wgpu::PrimitiveTopology::TriangleList,
                    Some(wgpu::BlendState::ALPHA_BLENDING),
                    false,
                    None,
                    samples,
                )
            }
            // Pick passes: single-sampled, no blending, depth on, so the
            // front-most primitive wins exactly as on screen.
            PipelineKind::PickLines => {
                let shader = self.shader("Pick Shader", shaders::pick::PICK);
                self.build_pipeline(
                    "Pick Line Pipeline",
                    &shader,
                    &[&self.pick_bind_group_layout],
                    wgpu::PrimitiveTopology::LineList,
                    None,
                    true,
                    None,
                    1,
                )
            }
            PipelineKind::PickTriangles => {
                let shader = self.shader("Pick Shader", shaders::pick::PICK);
                self.build_pipeline(
                    "Pick Triangle Pipeline",
                    &shader,
                    &[&self.pick_bind_group_layout],
                    wgpu::PrimitiveTopology::TriangleList,
                    None,
                    true,
                    None,
                    1,
                )
            }
        };
        self.pipelines.insert(kind, pipeline);
    }

    pub fn pipeline(&self, kind: PipelineKind) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&kind)
    }

    /// Volume pipeline for one render style; front faces are culled so
    /// the back of the bounding box starts each ray.
    pub fn ensure_volume_pipeline(&mut self, style: RenderStyle) {
        if self.volume_pipelines.contains_key(&style) {
            return;
        }
        let source = shaders::volume::source_for(style);
        let shader = self.shader("Volume Shader", &source);
        let pipeline = self.build_pipeline(
            "Volume Pipeline",
            &shader,
            &[&self.volume_bind_group_layout],
            wgpu::PrimitiveTopology::TriangleList,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            true,
            Some(wgpu::Face::Front),
            self.msaa_sample_count,
        );
        self.volume_pipelines.insert(style, pipeline);
    }

    pub fn volume_pipeline(&self, style: RenderStyle) -> Option<&wgpu::RenderPipeline> {
        self.volume_pipelines.get(&style)
    }

    pub fn mesh_layouts(&self) -> (&wgpu::BindGroupLayout, &wgpu::BindGroupLayout) {
        (
            &self.mesh_bind_group_layout,
            &self.mesh_texture_bind_group_layout,
        )
    }

    pub fn texture_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_bind_group_layout
    }

    pub fn volume_layout(&self) -> &wgpu::BindGroupLayout {
        &self.volume_bind_group_layout
    }

    pub fn marker_layout(&self) -> &wgpu::BindGroupLayout {
        &self.marker_bind_group_layout
    }

    pub fn pick_layout(&self) -> &wgpu::BindGroupLayout {
        &self.pick_bind_group_layout
    }

    pub fn text_layout(&self) -> &wgpu::BindGroupLayout {
        &self.text_bind_group_layout
    }
}

/// Vertex packing helpers shared by the draw pass.
pub mod vertex_utils {
    use super::Vertex;
    use glam::{Vec3, Vec4};

    /// Pack dashed/solid segments into a line list.
    pub fn pack_segments(segments: &[[Vec3; 2]], color: Vec4) -> Vec<Vertex> {
        let mut out = Vec::with_capacity(segments.len() * 2);
        for seg in segments {
            out.push(Vertex::new(seg[0], color));
            out.push(Vertex::new(seg[1], color));
        }
        out
    }

    /// Expand marker centers into screen-aligned quads; the corner goes
    /// into tex_coords and the pixel size into normal.z.
    pub fn pack_marker_quads(centers: &[Vec3], color: Vec4, size_px: f32) -> Vec<Vertex> {
        const CORNERS: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];
        let mut out = Vec::with_capacity(centers.len() * 6);
        for &c in centers {
            for corner in CORNERS {
                let mut v = Vertex::new(c, color);
                v.tex_coords = corner;
                v.normal = [0.0, 0.0, size_px];
                out.push(v);
            }
        }
        out
    }

    /// Two triangles covering a world-space rectangle at depth `z`.
    pub fn pack_quad(min: glam::Vec2, max: glam::Vec2, z: f32, color: Vec4) -> Vec<Vertex> {
        let corners = [
            ([min.x, min.y], [0.0, 0.0]),
            ([max.x, min.y], [1.0, 0.0]),
            ([max.x, max.y], [1.0, 1.0]),
            ([min.x, min.y], [0.0, 0.0]),
            ([max.x, max.y], [1.0, 1.0]),
            ([min.x, max.y], [0.0, 1.0]),
        ];
        corners
            .iter()
            .map(|&(p, uv)| {
                let mut v = Vertex::new(Vec3::new(p[0], p[1], z), color);
                v.tex_coords = uv;
                v
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 12 * 4);
        assert_eq!(std::mem::size_of::<Uniforms>(), 3 * 64);
        assert_eq!(std::mem::size_of::<MeshParams>(), 64);
        assert_eq!(std::mem::size_of::<TexParams>(), 48);
        assert_eq!(std::mem::size_of::<VolumeParams>(), 80);
    }

    #[test]
    fn normal_matrix_tracks_model() {
        let mut u = Uniforms::default();
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        u.update(Mat4::IDENTITY, model);
        // Inverse-transpose of a pure scale halves the scaled axis.
        assert!((u.normal_matrix[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn marker_quads_carry_size_and_corner() {
        let verts =
            vertex_utils::pack_marker_quads(&[Vec3::ZERO], Vec4::ONE, 9.0);
        assert_eq!(verts.len(), 6);
        assert_eq!(verts[0].normal[2], 9.0);
        assert_eq!(verts[0].tex_coords, [-1.0, -1.0]);
    }

    #[test]
    fn quad_covers_rect() {
        let verts = vertex_utils::pack_quad(
            Vec2::new(-0.5, -0.5),
            Vec2::new(1.5, 2.5),
            -0.1,
            Vec4::ONE,
        );
        assert_eq!(verts.len(), 6);
        assert!(verts.iter().all(|v| v.position[2] == -0.1));
        assert!(verts.iter().any(|v| v.position[0] == -0.5));
        assert!(verts.iter().any(|v| v.position[1] == 2.5));
    }
}
