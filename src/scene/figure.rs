//! The figure: root of the scene, owner of the GPU context and the
//! picking state, registered in a process-wide registry by integer id.
//!
//! `draw()` only schedules a repaint and coalesces with pending backend
//! paint requests (at most one paint per event-loop iteration);
//! `draw_now()` renders immediately. Every frame runs the Shape pass (or
//! Fast during a continuous interaction), then the Screen overlay pass,
//! then records device_pixel_ratio * logical size for `getframe`.
//!
//! When no GPU device is attached the figure still builds full draw
//! lists, rasterizes a software approximation for `getframe` and fills
//! the pick buffer from projected bounds, so scenes stay fully
//! scriptable headless.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec4};

use crate::cameras::Camera;
use crate::error::{Error, Result};
use crate::events::{EventArgs, Modifiers, MouseButton};
use crate::gpu::colormap::{build_lut, lut_to_rgba8};
use crate::gpu::picking::{PickBuffer, PickMap};
use crate::gpu::renderer::{
    GpuResident, LightGpu, MarkerParams, MeshParams, PickParams, TexParams, Vertex,
    VolumeParams, WgpuRenderer,
};
use crate::gpu::PipelineKind;
use crate::objects::texture::gaussian_taps;
use crate::objects::{ColorSource, Interpolation, MarkerStyle, Shading};
use crate::scene::axes::Axes;
use crate::scene::frame::{self, AxesViewInfo, FrameGeometry, ItemKind};
use crate::scene::object::{DrawPass, ObjId, ObjectKind, Scene};
use crate::scene::overlay::{self, Overlay};
use crate::styling::Theme;
use crate::text::AtlasCache;
use wgpu::util::DeviceExt;

/// The last grabbed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, top-left origin.
    pub data: Vec<u8>,
}

struct DragState {
    button: MouseButton,
    axes: Option<ObjId>,
    last_pos: Vec2,
}

pub struct Figure {
    number: u32,
    scene: Scene,
    pub title: String,
    logical_size: (u32, u32),
    device_pixel_ratio: f32,
    current_axes: Option<ObjId>,
    pub theme: Theme,
    /// Requested MSAA sample count, clamped by the renderer.
    pub msaa: u32,

    renderer: Option<WgpuRenderer>,
    atlas_cache: AtlasCache,
    default_font_size: f32,

    pick_map: PickMap,
    pick_buffer: PickBuffer,
    axes_views: Vec<AxesViewInfo>,
    hover_chain: Vec<ObjId>,
    drag: Option<DragState>,
    interacting: bool,

    pending_draw: bool,
    destroyed: bool,
    last_frame: Frame,
}

impl Figure {
    fn new(number: u32) -> Self {
        let logical_size = (560u32, 420u32);
        Figure {
            number,
            scene: Scene::new(),
            title: format!("Figure {number}"),
            logical_size,
            device_pixel_ratio: 1.0,
            current_axes: None,
            theme: Theme::default(),
            msaa: 4,
            renderer: None,
            atlas_cache: AtlasCache::new(),
            default_font_size: 14.0,
            pick_map: PickMap::new(),
            pick_buffer: PickBuffer::new(logical_size.0, logical_size.1),
            axes_views: Vec::new(),
            hover_chain: Vec::new(),
            drag: None,
            interacting: false,
            pending_draw: false,
            destroyed: false,
            last_frame: Frame {
                width: logical_size.0,
                height: logical_size.1,
                data: vec![0; (logical_size.0 * logical_size.1 * 4) as usize],
            },
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Attach the GPU renderer once the backend has a device; until then
    /// the figure runs the software path.
    pub fn attach_renderer(&mut self, renderer: WgpuRenderer) {
        self.renderer = Some(renderer);
    }

    pub fn renderer_mut(&mut self) -> Option<&mut WgpuRenderer> {
        self.renderer.as_mut()
    }

    /// Install the font face used for every text in this figure.
    pub fn set_default_font(&mut self, bytes: Vec<u8>) {
        self.atlas_cache.set_default_font(bytes);
        self.draw();
    }

    pub fn logical_size(&self) -> (u32, u32) {
        self.logical_size
    }

    pub fn set_logical_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width.max(1), height.max(1));
        self.draw();
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = ratio.max(0.1);
        self.draw();
    }

    /// Physical pixel size: device_pixel_ratio * logical size.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        (
            ((self.logical_size.0 as f32) * self.device_pixel_ratio).round() as u32,
            ((self.logical_size.1 as f32) * self.device_pixel_ratio).round() as u32,
        )
    }

    /// Create an axes (with its container) and make it current.
    pub fn add_axes(&mut self) -> Result<ObjId> {
        let root = self.scene.root();
        let container = self.scene.create(ObjectKind::AxesContainer, root)?;
        let axes = self.scene.create(ObjectKind::Axes(Axes::new()), container)?;
        self.current_axes = Some(axes);
        Ok(axes)
    }

    /// The current axes, creating one when the figure has none.
    pub fn current_axes(&mut self) -> Result<ObjId> {
        match self.current_axes.filter(|id| self.scene.is_alive(*id)) {
            Some(id) => Ok(id),
            None => self.add_axes(),
        }
    }

    pub fn set_current_axes(&mut self, axes: ObjId) -> Result<()> {
        match self.scene.get(axes)?.kind {
            ObjectKind::Axes(_) => {
                self.current_axes = Some(axes);
                Ok(())
            }
            _ => Err(Error::validation("not an axes handle")),
        }
    }

    /// Add a wobject under the current axes and reset its cameras to the
    /// new data limits.
    pub fn add_wobject(&mut self, kind: ObjectKind) -> Result<ObjId> {
        let axes = self.current_axes()?;
        let id = self.scene.create(kind, axes)?;
        self.reset_camera_limits(axes)?;
        self.draw();
        Ok(id)
    }

    fn reset_camera_limits(&mut self, axes: ObjId) -> Result<()> {
        let limits = self.scene.axes_limits(axes)?;
        if let ObjectKind::Axes(ref mut a) = self.scene.get_mut(axes)?.kind {
            a.reset_cameras(&limits);
        }
        Ok(())
    }

    /// Frame explicit limits; requests outside the data range are
    /// clamped to it before the cameras reset.
    pub fn set_axes_limits(
        &mut self,
        axes: ObjId,
        requested: &crate::cameras::SceneLimits,
    ) -> Result<()> {
        let data = self.scene.axes_limits(axes)?;
        let clamped = data.clamp(requested);
        if let ObjectKind::Axes(ref mut a) = self.scene.get_mut(axes)?.kind {
            a.reset_cameras(&clamped);
        }
        self.draw();
        Ok(())
    }

    /// Destroy an object, releasing its GPU resources synchronously.
    pub fn destroy_object(&mut self, id: ObjId) -> Result<()> {
        let destroyed = self.scene.destroy(id)?;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.release(&destroyed);
        }
        self.hover_chain.retain(|h| !destroyed.contains(h));
        self.draw();
        Ok(())
    }

    /// Schedule a repaint; coalesces with any pending request.
    pub fn draw(&mut self) {
        if !self.destroyed {
            self.pending_draw = true;
        }
    }

    pub fn has_pending_draw(&self) -> bool {
        self.pending_draw && !self.destroyed
    }

    /// Render immediately, bypassing paint coalescing.
    pub fn draw_now(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.pending_draw = false;

        // Fly cameras advance by a fixed step per frame while keys are
        // held.
        self.tick_fly_cameras(1.0 / 60.0);

        let pass = if self.interacting {
            DrawPass::Fast
        } else {
            DrawPass::Shape
        };
        let fb = self.framebuffer_size();
        let shape_frame = frame::build_frame(&mut self.scene, fb, pass, &self.theme, None)?;

        self.axes_views = shape_frame
            .axes_frames
            .iter()
            .map(|af| AxesViewInfo {
                axes: af.axes,
                origin: af.viewport_origin,
                size: af.viewport_size,
                matrices: af.matrices,
            })
            .collect();

        // Screen pass: wibjects and world-anchored text in pixel space.
        let atlas = if self.atlas_cache.has_font() {
            Some(self.atlas_cache.atlas_for(self.default_font_size)?)
        } else {
            None
        };
        let screen_overlay =
            overlay::build_overlay(&self.scene, fb, &self.axes_views, atlas)?;

        if self.renderer.is_some() {
            self.submit_gpu(&shape_frame, &screen_overlay)?;
        }
        // The software raster keeps getframe meaningful without a device
        // (and serves as the degraded fallback).
        self.rasterize_software(&shape_frame, &screen_overlay);

        // Regenerate the pick buffer when geometry changed; during a
        // continuous drag the existing buffer is reused.
        let generation = self.scene.geometry_generation();
        let size_changed = self.pick_buffer.extent() != fb;
        if (!self.interacting && self.pick_buffer.built_for_generation != generation)
            || size_changed
        {
            self.rebuild_pick_buffer(fb, generation)?;
        }
        Ok(())
    }

    fn tick_fly_cameras(&mut self, dt: f32) {
        let axes_ids: Vec<ObjId> = self
            .scene
            .visible_descendants(self.scene.root())
            .into_iter()
            .filter(|id| {
                matches!(self.scene.get(*id).map(|n| &n.kind), Ok(ObjectKind::Axes(_)))
            })
            .collect();
        for id in axes_ids {
            if let Ok(node) = self.scene.get(id) {
                if let ObjectKind::Axes(a) = &node.kind {
                    let cam = a.camera();
                    let mut cam_mut = cam.borrow_mut();
                    if let Camera::Fly(ref mut fly) = *cam_mut {
                        fly.tick(dt);
                    }
                }
            }
        }
    }

    fn rebuild_pick_buffer(&mut self, fb: (u32, u32), generation: u64) -> Result<()> {
        let pick_frame = {
            let mut map = std::mem::take(&mut self.pick_map);
            let frame = frame::build_frame(
                &mut self.scene,
                fb,
                DrawPass::Pick,
                &self.theme,
                Some(&mut map),
            )?;
            self.pick_map = map;
            frame
        };
        if self.pick_buffer.extent() != fb {
            self.pick_buffer = PickBuffer::new(fb.0, fb.1);
        } else {
            self.pick_buffer.clear();
        }

        let gpu_done = if self.renderer.is_some() {
            match self.submit_pick_gpu(&pick_frame, fb) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!(target: "sciviz", "gpu pick pass failed, using cpu fill: {e}");
                    false
                }
            }
        } else {
            false
        };
        if !gpu_done {
            // Degraded CPU fill: each pickable item covers its projected
            // bounds, in draw order. The GPU pass refines this
            // per-primitive.
            for af in &pick_frame.axes_frames {
                for item in &af.items {
                    if item.pick_id == 0 {
                        continue;
                    }
                    if let Some((min, max)) = frame::item_screen_bounds(item, &af.matrices) {
                        self.pick_buffer.fill_rect(
                            af.viewport_origin.x + min.x,
                            af.viewport_origin.y + min.y,
                            af.viewport_origin.x + max.x,
                            af.viewport_origin.y + max.y,
                            item.pick_id,
                        );
                    }
                }
            }
        }
        self.pick_buffer.built_for_generation = generation;
        Ok(())
    }

    // ----- GPU submission -------------------------------------------------

    /// Make per-object GPU residency (data textures, LUTs, params) match
    /// the object's dirty generation.
    fn prepare_residents(scene: &Scene, renderer: &mut WgpuRenderer, frame_geo: &FrameGeometry) {
        for af in &frame_geo.axes_frames {
            let camera_pos = af.matrices.view.inverse().w_axis.truncate();
            let lights = axes_lights(scene, af.axes);
            for item in &af.items {
                let node = match scene.get(item.node) {
                    Ok(n) => n,
                    Err(_) => continue,
                };
                let generation = node.dirty_generation;
                let up_to_date = renderer
                    .resident(item.node)
                    .map(|r| r.uploaded_generation == generation)
                    .unwrap_or(false);
                // Camera-dependent params are refreshed every frame even
                // when the heavy data is already resident.
                let result = match (&node.kind, &item.kind) {
                    (ObjectKind::Texture2D(tex), ItemKind::Texture2D) => {
                        if up_to_date {
                            Ok(())
                        } else {
                            upload_texture2d(renderer, item.node, tex, generation)
                        }
                    }
                    (ObjectKind::Texture3D(vol), ItemKind::Volume(_)) => {
                        upload_volume(
                            renderer, item.node, vol, &lights, camera_pos, generation,
                            up_to_date,
                        )
                    }
                    (ObjectKind::Mesh(mesh), ItemKind::Mesh) => upload_mesh(
                        renderer, item.node, mesh, &lights, camera_pos, generation,
                        up_to_date,
                    ),
                    (ObjectKind::Line(line), ItemKind::Markers(style)) => {
                        if up_to_date {
                            Ok(())
                        } else {
                            upload_markers(
                                renderer,
                                item.node,
                                line.marker_color,
                                line.marker_edge_color,
                                line.marker_edge_width,
                                *style,
                                af.viewport_size,
                                generation,
                            )
                        }
                    }
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    // Degraded draw: the item falls back to its plain
                    // silhouette below.
                    log::error!(target: "sciviz", "gpu upload failed for {}: {e}",
                        node.kind.type_name());
                }
            }
        }
    }

    /// Encode and submit the frame to the GPU offscreen target.
    fn submit_gpu(&mut self, frame_geo: &FrameGeometry, screen: &Overlay) -> Result<()> {
        let fb = self.framebuffer_size();
        let bg = self.theme.figure_background;
        let msaa = self.msaa;
        let scene = &self.scene;
        let atlas_pixels = if self.atlas_cache.has_font() {
            let atlas = self.atlas_cache.atlas_for(self.default_font_size)?;
            Some((atlas.extent(), atlas.pixels().to_vec()))
        } else {
            None
        };
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        renderer.ensure_msaa(msaa);
        renderer.ensure_pipeline(PipelineKind::Lines);
        renderer.ensure_pipeline(PipelineKind::Triangles);
        renderer.ensure_pipeline(PipelineKind::TrianglesDepth);
        renderer.ensure_pipeline(PipelineKind::OverlayLines);
        renderer.ensure_pipeline(PipelineKind::Markers);
        renderer.ensure_pipeline(PipelineKind::Mesh);
        renderer.ensure_pipeline(PipelineKind::Texture2D);
        renderer.ensure_pipeline(PipelineKind::Text);
        for af in &frame_geo.axes_frames {
            for item in &af.items {
                if let ItemKind::Volume(style) = item.kind {
                    renderer.ensure_volume_pipeline(style);
                }
            }
        }

        Self::prepare_residents(scene, renderer, frame_geo);

        // Per-item buffers and matrix bind groups; the render pass below
        // borrows renderer immutably.
        let mut buffers = Vec::new();
        for af in &frame_geo.axes_frames {
            let view_proj = af.matrices.proj * af.matrices.view;
            let axis_buf = (!af.axis_lines.is_empty()).then(|| {
                (
                    renderer.create_vertex_buffer(&af.axis_lines),
                    renderer.create_matrix_bind_group(view_proj, Mat4::IDENTITY),
                )
            });
            let mut item_bufs = Vec::new();
            for item in &af.items {
                let vb = renderer.create_vertex_buffer(&item.vertices);
                let ib = item
                    .indices
                    .as_ref()
                    .map(|idx| (renderer.create_index_buffer(idx), idx.len() as u32));
                let matrices = renderer.create_matrix_bind_group(view_proj, item.model);
                item_bufs.push((vb, ib, item.vertices.len() as u32, matrices));
            }
            buffers.push((axis_buf, item_bufs));
        }

        // Screen overlay buffers in pixel space.
        let overlay_proj = Overlay::projection(fb);
        let overlay_matrices = renderer.create_matrix_bind_group(overlay_proj, Mat4::IDENTITY);
        let overlay_tris = (!screen.triangles.is_empty())
            .then(|| renderer.create_vertex_buffer(&screen.triangles));
        let overlay_lines = (!screen.lines.is_empty())
            .then(|| renderer.create_vertex_buffer(&screen.lines));
        let overlay_text = match (&atlas_pixels, screen.glyphs.is_empty()) {
            (Some(((aw, ah), pixels)), false) => {
                let verts = glyph_vertices(&screen.glyphs, *aw, *ah);
                let (texture, view) = upload_atlas_texture(renderer, *aw, *ah, pixels);
                let bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Text Atlas Bind Group"),
                    layout: renderer.text_layout(),
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Sampler(renderer.sampler(true)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&view),
                        },
                    ],
                });
                let vb = renderer.create_vertex_buffer(&verts);
                Some((vb, verts.len() as u32, bind, texture))
            }
            _ => None,
        };

        // The target textures must outlive the passes recorded below.
        // With MSAA on, rendering goes to a multisampled attachment that
        // resolves into the single-sampled color target.
        let samples = renderer.msaa_sample_count;
        let (_color_texture, color_view) = create_color_target(renderer, fb);
        let msaa_target = (samples > 1).then(|| create_msaa_target(renderer, fb, samples));
        let depth_view = create_depth_target(renderer, fb, samples);

        let mut encoder = renderer
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Figure Encoder"),
            });
        {
            let (attach_view, resolve) = match &msaa_target {
                Some((_tex, view)) => (view, Some(&color_view)),
                None => (&color_view, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shape Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attach_view,
                    resolve_target: resolve,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.x as f64,
                            g: bg.y as f64,
                            b: bg.z as f64,
                            a: bg.w as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (af, (axis_buf, item_bufs)) in
                frame_geo.axes_frames.iter().zip(buffers.iter())
            {
                pass.set_viewport(
                    af.viewport_origin.x,
                    af.viewport_origin.y,
                    af.viewport_size.x.max(1.0),
                    af.viewport_size.y.max(1.0),
                    0.0,
                    1.0,
                );

                if let Some((buf, (_ubuf, ubind))) = axis_buf {
                    if let Some(p) = renderer.pipeline(PipelineKind::Lines) {
                        pass.set_pipeline(p);
                        pass.set_bind_group(0, ubind, &[]);
                        pass.set_vertex_buffer(0, buf.slice(..));
                        pass.draw(0..af.axis_lines.len() as u32, 0..1);
                    }
                }

                for (item, (vb, ib, vcount, (_ubuf, ubind))) in
                    af.items.iter().zip(item_bufs.iter())
                {
                    let resident = renderer.resident(item.node);
                    let resident_bind = resident.and_then(|r| r.bind_group.as_ref());
                    let resident_bind2 = resident.and_then(|r| r.bind_group2.as_ref());
                    // Pick the real pipeline when the object's residency
                    // uploaded; degrade to the flat silhouette otherwise.
                    let (pipeline, group1) = match (item.kind, resident_bind) {
                        (ItemKind::Lines, _) => {
                            (renderer.pipeline(PipelineKind::Lines), None)
                        }
                        (ItemKind::Markers(_), Some(bind)) => {
                            (renderer.pipeline(PipelineKind::Markers), Some(bind))
                        }
                        (ItemKind::Mesh, Some(bind)) => {
                            (renderer.pipeline(PipelineKind::Mesh), Some(bind))
                        }
                        (ItemKind::Texture2D, Some(bind)) => {
                            (renderer.pipeline(PipelineKind::Texture2D), Some(bind))
                        }
                        (ItemKind::Volume(style), Some(bind)) => {
                            (renderer.volume_pipeline(style), Some(bind))
                        }
                        (ItemKind::Text, _) => (None, None),
                        (_, None) => {
                            (renderer.pipeline(PipelineKind::TrianglesDepth), None)
                        }
                    };
                    let Some(p) = pipeline else {
                        continue;
                    };
                    pass.set_pipeline(p);
                    pass.set_bind_group(0, ubind, &[]);
                    if let Some(bind) = group1 {
                        pass.set_bind_group(1, bind, &[]);
                    }
                    if let Some(bind2) = resident_bind2 {
                        pass.set_bind_group(2, bind2, &[]);
                    }
                    pass.set_vertex_buffer(0, vb.slice(..));
                    match ib {
                        Some((ibuf, icount)) => {
                            pass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..*icount, 0, 0..1);
                        }
                        None => pass.draw(0..*vcount, 0..1),
                    }
                }
            }

        }
        {
            // Screen pass: depth-free overlay over the whole figure with
            // the pixel-space projection.
            let (attach_view, resolve) = match &msaa_target {
                Some((_tex, view)) => (view, Some(&color_view)),
                None => (&color_view, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Screen Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attach_view,
                    resolve_target: resolve,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let (_obuf, obind) = &overlay_matrices;
            if let Some(tris) = &overlay_tris {
                if let Some(p) = renderer.pipeline(PipelineKind::Triangles) {
                    pass.set_pipeline(p);
                    pass.set_bind_group(0, obind, &[]);
                    pass.set_vertex_buffer(0, tris.slice(..));
                    pass.draw(0..screen.triangles.len() as u32, 0..1);
                }
            }
            if let Some(lines) = &overlay_lines {
                if let Some(p) = renderer.pipeline(PipelineKind::OverlayLines) {
                    pass.set_pipeline(p);
                    pass.set_bind_group(0, obind, &[]);
                    pass.set_vertex_buffer(0, lines.slice(..));
                    pass.draw(0..screen.lines.len() as u32, 0..1);
                }
            }
            if let Some((vb, count, bind, _texture)) = &overlay_text {
                if let Some(p) = renderer.pipeline(PipelineKind::Text) {
                    pass.set_pipeline(p);
                    pass.set_bind_group(0, obind, &[]);
                    pass.set_bind_group(1, bind, &[]);
                    pass.set_vertex_buffer(0, vb.slice(..));
                    pass.draw(0..*count, 0..1);
                }
            }
        }
        renderer.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Render the Pick pass off-screen and read the hit map back.
    fn submit_pick_gpu(&mut self, pick_frame: &FrameGeometry, fb: (u32, u32)) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Err(Error::resource("no renderer"));
        };
        renderer.ensure_pipeline(PipelineKind::PickLines);
        renderer.ensure_pipeline(PipelineKind::PickTriangles);

        let mut buffers = Vec::new();
        for af in &pick_frame.axes_frames {
            let view_proj = af.matrices.proj * af.matrices.view;
            let mut item_bufs = Vec::new();
            for item in &af.items {
                if item.pick_id == 0 {
                    continue;
                }
                let vb = renderer.create_vertex_buffer(&item.vertices);
                let ib = item
                    .indices
                    .as_ref()
                    .map(|idx| (renderer.create_index_buffer(idx), idx.len() as u32));
                let matrices = renderer.create_matrix_bind_group(view_proj, item.model);
                let params = PickParams {
                    id_color: PickMap::id_to_color(item.pick_id),
                };
                let pbuf = renderer
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Pick Params"),
                        contents: bytemuck::bytes_of(&params),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                let pbind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Pick Params Bind Group"),
                    layout: renderer.pick_layout(),
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: pbuf.as_entire_binding(),
                    }],
                });
                item_bufs.push((
                    item.kind.pick_pipeline(),
                    vb,
                    ib,
                    item.vertices.len() as u32,
                    matrices,
                    pbuf,
                    pbind,
                ));
            }
            buffers.push((af, item_bufs));
        }

        let (texture, view, readback, bytes_per_row) = renderer.create_pick_target(fb.0, fb.1);
        let depth_view = create_depth_target(renderer, fb, 1);

        let mut encoder = renderer
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // ID 0: no hit.
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            for (af, item_bufs) in &buffers {
                pass.set_viewport(
                    af.viewport_origin.x,
                    af.viewport_origin.y,
                    af.viewport_size.x.max(1.0),
                    af.viewport_size.y.max(1.0),
                    0.0,
                    1.0,
                );
                for (kind, vb, ib, vcount, (_ubuf, ubind), _pbuf, pbind) in item_bufs {
                    let Some(p) = renderer.pipeline(*kind) else {
                        continue;
                    };
                    pass.set_pipeline(p);
                    pass.set_bind_group(0, ubind, &[]);
                    pass.set_bind_group(1, pbind, &[]);
                    pass.set_vertex_buffer(0, vb.slice(..));
                    match ib {
                        Some((ibuf, icount)) => {
                            pass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..*icount, 0, 0..1);
                        }
                        None => pass.draw(0..*vcount, 0..1),
                    }
                }
            }
        }
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(fb.1),
                },
            },
            wgpu::Extent3d {
                width: fb.0,
                height: fb.1,
                depth_or_array_layers: 1,
            },
        );
        renderer.queue.submit(std::iter::once(encoder.finish()));

        let data = futures::executor::block_on(renderer.read_pick_buffer(&readback))?;
        self.pick_buffer
            .fill_from_rgba8(&data, bytes_per_row as usize);
        Ok(())
    }

    // ----- software raster ------------------------------------------------

    /// Software rasterization of the frame, top-left origin.
    fn rasterize_software(&mut self, frame_geo: &FrameGeometry, screen: &Overlay) {
        let (w, h) = self.framebuffer_size();
        let bg = self.theme.figure_background;
        let mut data = vec![0u8; (w * h * 4) as usize];
        fill_color(&mut data, bg);

        for af in &frame_geo.axes_frames {
            let x0 = af.viewport_origin.x;
            let y0 = af.viewport_origin.y;
            fill_rect(
                &mut data,
                w,
                h,
                x0,
                y0,
                x0 + af.viewport_size.x,
                y0 + af.viewport_size.y,
                af.background,
            );
            for v in af.axis_lines.chunks(2) {
                if let [a, b] = v {
                    let pa = project(af, a.position, Mat4::IDENTITY);
                    let pb = project(af, b.position, Mat4::IDENTITY);
                    draw_segment(&mut data, w, h, pa, pb, Vec4::from_array(a.color));
                }
            }
            for item in &af.items {
                match item.kind {
                    ItemKind::Lines => {
                        for seg in item.vertices.chunks(2) {
                            if let [a, b] = seg {
                                let pa = project(af, a.position, item.model);
                                let pb = project(af, b.position, item.model);
                                draw_segment(&mut data, w, h, pa, pb, Vec4::from_array(a.color));
                            }
                        }
                    }
                    _ => {
                        // Filled objects cover their projected bounds with
                        // a representative color in the software path.
                        if let Some((min, max)) = frame::item_screen_bounds(item, &af.matrices) {
                            let color = item
                                .vertices
                                .first()
                                .map(|v| Vec4::from_array(v.color))
                                .unwrap_or(Vec4::ONE);
                            fill_rect(
                                &mut data,
                                w,
                                h,
                                af.viewport_origin.x + min.x,
                                af.viewport_origin.y + min.y,
                                af.viewport_origin.x + max.x,
                                af.viewport_origin.y + max.y,
                                color,
                            );
                        }
                    }
                }
            }
        }

        // Overlay: rects from triangle pairs, then lines and glyph blocks.
        for tri_rect in screen.triangles.chunks(6) {
            if tri_rect.len() == 6 {
                let xs: Vec<f32> = tri_rect.iter().map(|v| v.position[0]).collect();
                let ys: Vec<f32> = tri_rect.iter().map(|v| v.position[1]).collect();
                let color = Vec4::from_array(tri_rect[0].color);
                fill_rect(
                    &mut data,
                    w,
                    h,
                    xs.iter().cloned().fold(f32::INFINITY, f32::min),
                    ys.iter().cloned().fold(f32::INFINITY, f32::min),
                    xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
                    ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
                    color,
                );
            }
        }
        for seg in screen.lines.chunks(2) {
            if let [a, b] = seg {
                draw_segment(
                    &mut data,
                    w,
                    h,
                    Vec2::new(a.position[0], a.position[1]),
                    Vec2::new(b.position[0], b.position[1]),
                    Vec4::from_array(a.color),
                );
            }
        }
        for g in &screen.glyphs {
            fill_rect(&mut data, w, h, g.min.x, g.min.y, g.max.x, g.max.y, g.color);
        }

        self.last_frame = Frame {
            width: w,
            height: h,
            data,
        };
    }

    /// The last rendered frame at device_pixel_ratio * logical size.
    pub fn getframe(&self) -> Frame {
        self.last_frame.clone()
    }

    /// Encode the last frame as PNG.
    pub fn export_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let frame = &self.last_frame;
        let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| Error::resource("frame buffer size mismatch"))?;
        img.save(path.as_ref())
            .map_err(|e| Error::resource(format!("png encode failed: {e}")))?;
        Ok(())
    }

    /// Mark the figure gone after its window closed: draws and swaps
    /// become no-ops.
    pub fn on_close(&mut self) {
        self.destroyed = true;
        self.pending_draw = false;
        if let Some(renderer) = self.renderer.as_mut() {
            let ids: Vec<ObjId> = self.scene.descendants(self.scene.root());
            renderer.release(&ids);
        }
        self.renderer = None;
    }

    // ----- event dispatch -------------------------------------------------

    /// Axes whose viewport contains the pixel.
    fn axes_at(&self, x: f32, y: f32) -> Option<&AxesViewInfo> {
        // Later axes draw on top, so search back to front.
        self.axes_views.iter().rev().find(|av| {
            x >= av.origin.x
                && y >= av.origin.y
                && x < av.origin.x + av.size.x
                && y < av.origin.y + av.size.y
        })
    }

    fn event_args(
        &self,
        x: f32,
        y: f32,
        button: Option<MouseButton>,
        modifiers: Modifiers,
    ) -> EventArgs {
        let mut args = EventArgs {
            x,
            y,
            button,
            modifiers,
            ..Default::default()
        };
        if let Some(av) = self.axes_at(x, y) {
            let world = av
                .matrices
                .screen_to_world(x - av.origin.x, y - av.origin.y, 0.5);
            args.x2d = world.x as f64;
            args.y2d = world.y as f64;
        }
        args
    }

    /// Hit chain [node, ..., root] for a pixel, through the pick buffer.
    fn hit_chain(&self, x: f32, y: f32) -> Vec<ObjId> {
        let id = self.pick_buffer.id_at(x as i32, y as i32);
        match self.pick_map.resolve(id) {
            Some(obj) => self.scene.ancestors(obj).unwrap_or_default(),
            None => vec![self.scene.root()],
        }
    }

    fn fire_on(&mut self, id: ObjId, which: EventKind, args: &EventArgs) -> bool {
        let Ok(node) = self.scene.get_mut(id) else {
            return false;
        };
        let source = match which {
            EventKind::MouseDown => &mut node.events.mouse_down,
            EventKind::MouseUp => &mut node.events.mouse_up,
            EventKind::DoubleClick => &mut node.events.double_click,
            EventKind::Enter => &mut node.events.enter,
            EventKind::Leave => &mut node.events.leave,
            EventKind::Motion => &mut node.events.motion,
            EventKind::KeyDown => &mut node.events.key_down,
            EventKind::KeyUp => &mut node.events.key_up,
        };
        source.fire(args)
    }

    /// Fire bottom-up along the chain, stopping at the first handler
    /// that reports the event handled. Nodes with `hit_test` off are
    /// passed over.
    fn fire_chain(&mut self, chain: &[ObjId], which: EventKind, args: &EventArgs) -> bool {
        for &id in chain {
            let responds = self.scene.get(id).map(|n| n.hit_test).unwrap_or(false);
            if responds && self.fire_on(id, which, args) {
                return true;
            }
        }
        false
    }

    /// Pointer motion: enter/leave diffing plus motion dispatch, then
    /// camera drags.
    pub fn process_motion(&mut self, x: f32, y: f32, modifiers: Modifiers) {
        if self.destroyed {
            return;
        }
        let args = self.event_args(x, y, self.drag.as_ref().map(|d| d.button), modifiers);
        let new_chain = self.hit_chain(x, y);

        // Leave bottom-up on nodes that dropped out of the chain, enter
        // top-down on nodes that appeared.
        let old_chain = std::mem::take(&mut self.hover_chain);
        for &id in &old_chain {
            if !new_chain.contains(&id) {
                self.fire_on(id, EventKind::Leave, &args);
            }
        }
        for &id in new_chain.iter().rev() {
            if !old_chain.contains(&id) {
                self.fire_on(id, EventKind::Enter, &args);
            }
        }
        self.hover_chain = new_chain.clone();

        let handled = self.fire_chain(&new_chain, EventKind::Motion, &args);

        // Unhandled drags drive the camera of the axes under the drag.
        if !handled {
            if let Some(drag) = self.drag.as_mut() {
                let delta = Vec2::new(x, y) - drag.last_pos;
                drag.last_pos = Vec2::new(x, y);
                let button = drag.button;
                if let Some(axes_id) = drag.axes {
                    let viewport = self
                        .axes_views
                        .iter()
                        .find(|av| av.axes == axes_id)
                        .map(|av| (av.size.x as u32, av.size.y as u32))
                        .unwrap_or(self.framebuffer_size());
                    if let Ok(node) = self.scene.get(axes_id) {
                        if let ObjectKind::Axes(a) = &node.kind {
                            a.camera()
                                .borrow_mut()
                                .on_mouse_drag(button, delta, viewport, modifiers);
                        }
                    }
                    self.interacting = true;
                    self.draw();
                }
            }
        }
    }

    pub fn process_mouse_down(
        &mut self,
        x: f32,
        y: f32,
        button: MouseButton,
        modifiers: Modifiers,
    ) {
        if self.destroyed {
            return;
        }
        let args = self.event_args(x, y, Some(button), modifiers);
        let chain = self.hit_chain(x, y);
        self.fire_chain(&chain, EventKind::MouseDown, &args);
        self.drag = Some(DragState {
            button,
            axes: self.axes_at(x, y).map(|av| av.axes),
            last_pos: Vec2::new(x, y),
        });
    }

    pub fn process_mouse_up(
        &mut self,
        x: f32,
        y: f32,
        button: MouseButton,
        modifiers: Modifiers,
    ) {
        if self.destroyed {
            return;
        }
        let args = self.event_args(x, y, Some(button), modifiers);
        let chain = self.hit_chain(x, y);
        self.fire_chain(&chain, EventKind::MouseUp, &args);
        if self.drag.as_ref().map(|d| d.button) == Some(button) {
            self.drag = None;
        }
        if self.interacting {
            // Interaction over: next frame is full quality and the pick
            // buffer may regenerate.
            self.interacting = false;
            self.draw();
        }
    }

    pub fn process_double_click(
        &mut self,
        x: f32,
        y: f32,
        button: MouseButton,
        modifiers: Modifiers,
    ) {
        if self.destroyed {
            return;
        }
        let args = self.event_args(x, y, Some(button), modifiers);
        let chain = self.hit_chain(x, y);
        self.fire_chain(&chain, EventKind::DoubleClick, &args);
    }

    pub fn process_wheel(&mut self, x: f32, y: f32, delta_y: f32) {
        if self.destroyed {
            return;
        }
        if let Some(av) = self.axes_at(x, y) {
            let axes_id = av.axes;
            let local = Vec2::new(x - av.origin.x, y - av.origin.y);
            let viewport = (av.size.x as u32, av.size.y as u32);
            if let Ok(node) = self.scene.get(axes_id) {
                if let ObjectKind::Axes(a) = &node.kind {
                    a.camera().borrow_mut().on_wheel(delta_y, local, viewport);
                }
            }
            self.draw();
        }
    }

    pub fn process_key_down(&mut self, key: u32, text: &str, modifiers: Modifiers) {
        if self.destroyed {
            return;
        }
        self.route_fly_key(key, true);
        let args = EventArgs {
            key: Some(key),
            text: text.to_string(),
            modifiers,
            ..Default::default()
        };
        let chain = match self.current_axes {
            Some(axes) => self.scene.ancestors(axes).unwrap_or_default(),
            None => vec![self.scene.root()],
        };
        self.fire_chain(&chain, EventKind::KeyDown, &args);
    }

    pub fn process_key_up(&mut self, key: u32, text: &str, modifiers: Modifiers) {
        if self.destroyed {
            return;
        }
        self.route_fly_key(key, false);
        let args = EventArgs {
            key: Some(key),
            text: text.to_string(),
            modifiers,
            ..Default::default()
        };
        let chain = match self.current_axes {
            Some(axes) => self.scene.ancestors(axes).unwrap_or_default(),
            None => vec![self.scene.root()],
        };
        self.fire_chain(&chain, EventKind::KeyUp, &args);
    }

    /// WASD steers the fly camera of the current axes.
    fn route_fly_key(&mut self, key: u32, down: bool) {
        use crate::cameras::fly_keys;
        let bit = match key {
            87 => fly_keys::FORWARD, // W
            83 => fly_keys::BACK,    // S
            65 => fly_keys::LEFT,    // A
            68 => fly_keys::RIGHT,   // D
            _ => return,
        };
        if let Some(axes_id) = self.current_axes {
            if let Ok(node) = self.scene.get(axes_id) {
                if let ObjectKind::Axes(a) = &node.kind {
                    if let Camera::Fly(ref mut fly) = *a.camera().borrow_mut() {
                        if down {
                            fly.press(bit);
                        } else {
                            fly.release(bit);
                        }
                        self.draw();
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    MouseDown,
    MouseUp,
    DoubleClick,
    Enter,
    Leave,
    Motion,
    KeyDown,
    KeyUp,
}

// ----- GPU upload helpers -------------------------------------------------

fn axes_lights(scene: &Scene, axes: ObjId) -> Vec<LightGpu> {
    match scene.get(axes).map(|n| &n.kind) {
        Ok(ObjectKind::Axes(a)) => a
            .lights
            .iter_on()
            .map(|(_, l)| LightGpu {
                ambient: l.ambient.to_array(),
                diffuse: l.diffuse.to_array(),
                specular: l.specular.to_array(),
                position: l.position.to_array(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn create_lights_buffer(renderer: &WgpuRenderer, lights: &[LightGpu]) -> wgpu::Buffer {
    // Storage buffers reject zero size; park one dark light instead.
    let fallback = [LightGpu {
        ambient: [0.0; 4],
        diffuse: [0.0; 4],
        specular: [0.0; 4],
        position: [0.0, 0.0, 1.0, 0.0],
    }];
    let data = if lights.is_empty() { &fallback } else { lights };
    renderer
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE,
        })
}

fn create_uniform_init<T: bytemuck::Pod>(renderer: &WgpuRenderer, label: &str, value: &T) -> wgpu::Buffer {
    renderer
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
}

fn upload_texture2d(
    renderer: &mut WgpuRenderer,
    node: ObjId,
    tex: &crate::objects::Texture2D,
    generation: u64,
) -> Result<()> {
    let field = tex.field();
    let [_, ny, nx] = field.shape();
    let channels = field.channels();
    let data = field.sanitized_data();
    // Expand to RGBA32F; scalar data goes to the red channel.
    let mut rgba = vec![0.0f32; nx * ny * 4];
    for i in 0..nx * ny {
        match channels {
            1 => {
                rgba[i * 4] = data[i];
                rgba[i * 4 + 3] = 1.0;
            }
            3 => {
                rgba[i * 4..i * 4 + 3].copy_from_slice(&data[i * 3..i * 3 + 3]);
                rgba[i * 4 + 3] = 1.0;
            }
            _ => rgba[i * 4..i * 4 + 4].copy_from_slice(&data[i * 4..i * 4 + 4]),
        }
    }
    let (data_tex, data_view) =
        renderer.create_data_texture_2d(nx as u32, ny as u32, &rgba);
    let lut = build_lut(&tex.colormap)?;
    let (lut_tex, lut_view) = renderer.create_lut_texture(&lut_to_rgba8(&lut));

    let taps = gaussian_taps(tex.aa);
    let mut weights = [0.0f32; 4];
    for (i, w) in taps.iter().skip(taps.len() / 2).take(4).enumerate() {
        weights[i] = *w;
    }
    let params = TexParams {
        clim: [tex.clim.min as f32, tex.clim.max as f32],
        texel: [1.0 / nx.max(1) as f32, 1.0 / ny.max(1) as f32],
        weights,
        aa: tex.aa as u32,
        channels: channels as u32,
        _pad: [0.0; 2],
    };
    let pbuf = create_uniform_init(renderer, "Texture Params", &params);
    let linear = tex.interpolation == Interpolation::Linear;
    let bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout: renderer.texture_layout(),
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: pbuf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(renderer.sampler(linear)),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&data_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(renderer.sampler(true)),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&lut_view),
            },
        ],
    });
    renderer.install_resident(
        node,
        GpuResident {
            vertex_buffer: None,
            vertex_count: 0,
            index_buffer: None,
            index_count: 0,
            bind_group: Some(bind),
            bind_group2: None,
            textures: vec![data_tex, lut_tex],
            uploaded_generation: generation,
        },
    );
    Ok(())
}

fn upload_volume(
    renderer: &mut WgpuRenderer,
    node: ObjId,
    vol: &crate::objects::Texture3D,
    lights: &[LightGpu],
    camera_pos: glam::Vec3,
    generation: u64,
    up_to_date: bool,
) -> Result<()> {
    let (bmin, bmax) = vol.bounds();
    let size = (bmax - bmin).max(glam::Vec3::splat(1e-6));
    let params = VolumeParams {
        box_min: [bmin.x, bmin.y, bmin.z, 0.0],
        box_inv_size: [1.0 / size.x, 1.0 / size.y, 1.0 / size.z, 0.0],
        camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, 1.0],
        clim: [vol.clim.min as f32, vol.clim.max as f32],
        iso_threshold: vol.iso_threshold,
        step_count: vol.step_count.max(1),
        light_count: lights.len() as u32,
        _pad0: 0,
        _pad1: [0.0; 2],
    };
    if up_to_date {
        // Refresh only the camera-dependent params.
        if let Some(resident) = renderer.resident(node) {
            if let Some(pbuf) = resident.vertex_buffer.as_ref() {
                renderer
                    .queue
                    .write_buffer(pbuf, 0, bytemuck::bytes_of(&params));
                return Ok(());
            }
        }
    }
    let field = vol.field();
    let [nz, ny, nx] = field.shape();
    // Color volumes keep their first channel on the GPU ray; channel-wise
    // accumulation happens in the color shader variants.
    let data: Vec<f32> = if field.channels() == 1 {
        field.sanitized_data()
    } else {
        field
            .sanitized_data()
            .chunks(field.channels())
            .map(|c| c[0])
            .collect()
    };
    let (vol_tex, vol_view) =
        renderer.create_volume_texture((nx as u32, ny as u32, nz as u32), &data);
    let lut = build_lut(&vol.colormap)?;
    let (lut_tex, lut_view) = renderer.create_lut_texture(&lut_to_rgba8(&lut));
    let pbuf = create_uniform_init(renderer, "Volume Params", &params);
    let lbuf = create_lights_buffer(renderer, lights);
    let bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Volume Bind Group"),
        layout: renderer.volume_layout(),
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: pbuf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(renderer.sampler(true)),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&vol_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(renderer.sampler(true)),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&lut_view),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: lbuf.as_entire_binding(),
            },
        ],
    });
    renderer.install_resident(
        node,
        GpuResident {
            // Params buffer parks in the vertex_buffer slot so per-frame
            // camera updates can reach it.
            vertex_buffer: Some(pbuf),
            vertex_count: 0,
            index_buffer: Some(lbuf),
            index_count: 0,
            bind_group: Some(bind),
            bind_group2: None,
            textures: vec![vol_tex, lut_tex],
            uploaded_generation: generation,
        },
    );
    Ok(())
}

fn upload_mesh(
    renderer: &mut WgpuRenderer,
    node: ObjId,
    mesh: &crate::objects::Mesh,
    lights: &[LightGpu],
    camera_pos: glam::Vec3,
    generation: u64,
    up_to_date: bool,
) -> Result<()> {
    let shading = match mesh.face_shading {
        Shading::Plain | Shading::None => 0u32,
        Shading::Flat | Shading::Smooth => 1,
        Shading::Toon => 2,
    };
    let color_source = match mesh.color_source() {
        ColorSource::VertexColors => 0u32,
        ColorSource::Colormap => 1,
        ColorSource::Texture => 2,
        ColorSource::SolidColor => 3,
    };
    let params = MeshParams {
        face_color: mesh.face_color.to_array(),
        camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, 1.0],
        clim: [mesh.clim.min as f32, mesh.clim.max as f32],
        shininess: mesh.shininess,
        shading,
        color_source,
        light_count: lights.len() as u32,
        _pad: [0.0; 2],
    };
    if up_to_date {
        if let Some(resident) = renderer.resident(node) {
            if let Some(pbuf) = resident.vertex_buffer.as_ref() {
                renderer
                    .queue
                    .write_buffer(pbuf, 0, bytemuck::bytes_of(&params));
                return Ok(());
            }
        }
    }
    let lut = build_lut(&mesh.colormap)?;
    let (lut_tex, lut_view) = renderer.create_lut_texture(&lut_to_rgba8(&lut));
    let pbuf = create_uniform_init(renderer, "Mesh Params", &params);
    let lbuf = create_lights_buffer(renderer, lights);
    let (mesh_layout, mesh_tex_layout) = renderer.mesh_layouts();
    let bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Mesh Bind Group"),
        layout: mesh_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: pbuf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: lbuf.as_entire_binding(),
            },
        ],
    });
    // The value texture doubles as LUT (colormap source) or sampled
    // texture (texcoord source); solid/vertex colors ignore it.
    let tex_bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Mesh Value Texture Bind Group"),
        layout: mesh_tex_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(renderer.sampler(true)),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&lut_view),
            },
        ],
    });
    renderer.install_resident(
        node,
        GpuResident {
            vertex_buffer: Some(pbuf),
            vertex_count: 0,
            index_buffer: Some(lbuf),
            index_count: 0,
            bind_group: Some(bind),
            bind_group2: Some(tex_bind),
            textures: vec![lut_tex],
            uploaded_generation: generation,
        },
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn upload_markers(
    renderer: &mut WgpuRenderer,
    node: ObjId,
    face_color: Vec4,
    edge_color: Vec4,
    edge_width: f32,
    style: MarkerStyle,
    viewport: Vec2,
    generation: u64,
) -> Result<()> {
    let shape = match style {
        MarkerStyle::Circle | MarkerStyle::None => 0u32,
        MarkerStyle::Square => 1,
        MarkerStyle::Diamond => 2,
        MarkerStyle::Plus => 3,
        MarkerStyle::Cross | MarkerStyle::Star => 4,
        MarkerStyle::TriangleUp
        | MarkerStyle::TriangleDown
        | MarkerStyle::TriangleLeft
        | MarkerStyle::TriangleRight
        | MarkerStyle::Pentagram
        | MarkerStyle::Hexagram => 5,
        MarkerStyle::Point => 6,
    };
    let params = MarkerParams {
        face_color: face_color.to_array(),
        edge_color: edge_color.to_array(),
        viewport: [viewport.x.max(1.0), viewport.y.max(1.0)],
        edge_width_px: edge_width,
        shape,
    };
    let pbuf = create_uniform_init(renderer, "Marker Params", &params);
    let bind = renderer.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Marker Bind Group"),
        layout: renderer.marker_layout(),
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: pbuf.as_entire_binding(),
        }],
    });
    renderer.install_resident(
        node,
        GpuResident {
            vertex_buffer: Some(pbuf),
            vertex_count: 0,
            index_buffer: None,
            index_count: 0,
            bind_group: Some(bind),
            bind_group2: None,
            textures: Vec::new(),
            uploaded_generation: generation,
        },
    );
    Ok(())
}

fn create_color_target(
    renderer: &WgpuRenderer,
    fb: (u32, u32),
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = renderer.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Figure Color Target"),
        size: wgpu::Extent3d {
            width: fb.0.max(1),
            height: fb.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: renderer.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_depth_target(
    renderer: &WgpuRenderer,
    fb: (u32, u32),
    samples: u32,
) -> wgpu::TextureView {
    renderer
        .device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Figure Depth Target"),
            size: wgpu::Extent3d {
                width: fb.0.max(1),
                height: fb.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_msaa_target(
    renderer: &WgpuRenderer,
    fb: (u32, u32),
    samples: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = renderer.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Figure MSAA Target"),
        size: wgpu::Extent3d {
            width: fb.0.max(1),
            height: fb.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: samples,
        dimension: wgpu::TextureDimension::D2,
        format: renderer.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn upload_atlas_texture(
    renderer: &WgpuRenderer,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = renderer.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Glyph Atlas"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    renderer.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
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

/// Glyph quads to textured vertices; UVs normalized to the atlas extent.
fn glyph_vertices(
    glyphs: &[crate::scene::overlay::GlyphQuad],
    atlas_w: u32,
    atlas_h: u32,
) -> Vec<Vertex> {
    let inv = Vec2::new(1.0 / atlas_w.max(1) as f32, 1.0 / atlas_h.max(1) as f32);
    let mut out = Vec::with_capacity(glyphs.len() * 6);
    for g in glyphs {
        let uv0 = g.uv_min * inv;
        let uv1 = g.uv_max * inv;
        let corners = [
            (g.min, uv0),
            (Vec2::new(g.max.x, g.min.y), Vec2::new(uv1.x, uv0.y)),
            (g.max, uv1),
            (g.min, uv0),
            (g.max, uv1),
            (Vec2::new(g.min.x, g.max.y), Vec2::new(uv0.x, uv1.y)),
        ];
        for (p, uv) in corners {
            let mut v = Vertex::new(glam::Vec3::new(p.x, p.y, 0.0), g.color);
            v.tex_coords = uv.to_array();
            out.push(v);
        }
    }
    out
}

// ----- software raster helpers -------------------------------------------

fn project(af: &crate::scene::frame::AxesFrame, position: [f32; 3], model: Mat4) -> Vec2 {
    let world = model * glam::Vec3::from_array(position).extend(1.0);
    let s = af.matrices.world_to_screen(world.truncate());
    Vec2::new(af.viewport_origin.x + s.x, af.viewport_origin.y + s.y)
}

fn put_pixel(data: &mut [u8], w: u32, h: u32, x: i32, y: i32, color: Vec4) {
    if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
        return;
    }
    let o = ((y as u32 * w + x as u32) * 4) as usize;
    data[o] = (color.x.clamp(0.0, 1.0) * 255.0) as u8;
    data[o + 1] = (color.y.clamp(0.0, 1.0) * 255.0) as u8;
    data[o + 2] = (color.z.clamp(0.0, 1.0) * 255.0) as u8;
    data[o + 3] = (color.w.clamp(0.0, 1.0) * 255.0) as u8;
}

fn fill_color(data: &mut [u8], color: Vec4) {
    let px = [
        (color.x.clamp(0.0, 1.0) * 255.0) as u8,
        (color.y.clamp(0.0, 1.0) * 255.0) as u8,
        (color.z.clamp(0.0, 1.0) * 255.0) as u8,
        (color.w.clamp(0.0, 1.0) * 255.0) as u8,
    ];
    for chunk in data.chunks_exact_mut(4) {
        chunk.copy_from_slice(&px);
    }
}

fn fill_rect(data: &mut [u8], w: u32, h: u32, x0: f32, y0: f32, x1: f32, y1: f32, color: Vec4) {
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));
    for y in y0.max(0.0) as i32..(y1.ceil() as i32).min(h as i32) {
        for x in x0.max(0.0) as i32..(x1.ceil() as i32).min(w as i32) {
            put_pixel(data, w, h, x, y, color);
        }
    }
}

/// Integer line rasterization.
fn draw_segment(data: &mut [u8], w: u32, h: u32, a: Vec2, b: Vec2, color: Vec4) {
    let (mut x0, mut y0) = (a.x.round() as i32, a.y.round() as i32);
    let (x1, y1) = (b.x.round() as i32, b.y.round() as i32);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut guard = 0;
    loop {
        put_pixel(data, w, h, x0, y0, color);
        if (x0 == x1 && y0 == y1) || guard > 100_000 {
            break;
        }
        guard += 1;
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

// ----- process-wide registry ----------------------------------------------

pub type FigureHandle = Rc<RefCell<Figure>>;

/// The figure registry: figures by number plus the current number.
/// Injectable for tests; the process-wide instance lives in a
/// thread-local matching the single-threaded model.
#[derive(Default)]
pub struct FigureRegistry {
    figures: BTreeMap<u32, FigureHandle>,
    current: Option<u32>,
    next_number: u32,
}

impl FigureRegistry {
    pub fn new() -> Self {
        FigureRegistry {
            figures: BTreeMap::new(),
            current: None,
            next_number: 1,
        }
    }

    /// Get or create the figure with the given number; `None` creates a
    /// fresh one under the next free number. The figure becomes current.
    pub fn figure(&mut self, number: Option<u32>) -> FigureHandle {
        let number = number.unwrap_or_else(|| {
            while self.figures.contains_key(&self.next_number) {
                self.next_number += 1;
            }
            self.next_number
        });
        let handle = self
            .figures
            .entry(number)
            .or_insert_with(|| Rc::new(RefCell::new(Figure::new(number))))
            .clone();
        self.current = Some(number);
        handle
    }

    pub fn current(&self) -> Option<FigureHandle> {
        self.current.and_then(|nr| self.figures.get(&nr)).cloned()
    }

    /// Close a figure: mark it destroyed and drop it from the registry.
    pub fn close(&mut self, number: u32) {
        if let Some(fig) = self.figures.remove(&number) {
            fig.borrow_mut().on_close();
        }
        if self.current == Some(number) {
            self.current = self.figures.keys().next_back().copied();
        }
    }

    pub fn count(&self) -> usize {
        self.figures.len()
    }

    /// Draw every figure with a pending repaint (one paint per loop
    /// iteration).
    pub fn flush_pending(&mut self) {
        for fig in self.figures.values() {
            let mut fig = fig.borrow_mut();
            if fig.has_pending_draw() {
                if let Err(e) = fig.draw_now() {
                    log::error!(target: "sciviz", "draw failed: {e}");
                }
            }
        }
    }

    /// Drop every figure; used at shutdown and between tests.
    pub fn shutdown(&mut self) {
        let numbers: Vec<u32> = self.figures.keys().cloned().collect();
        for nr in numbers {
            self.close(nr);
        }
        self.current = None;
        self.next_number = 1;
    }
}

thread_local! {
    static REGISTRY: RefCell<FigureRegistry> = RefCell::new(FigureRegistry::new());
}

/// Get or create a figure in the process-wide registry.
pub fn figure(number: Option<u32>) -> FigureHandle {
    REGISTRY.with(|r| r.borrow_mut().figure(number))
}

/// The current figure, if any.
pub fn current_figure() -> Option<FigureHandle> {
    REGISTRY.with(|r| r.borrow().current())
}

/// Close a figure by number.
pub fn close_figure(number: u32) {
    REGISTRY.with(|r| r.borrow_mut().close(number));
}

/// Paint all figures with pending draws.
pub fn flush_pending_draws() {
    REGISTRY.with(|r| r.borrow_mut().flush_pending());
}

/// Close every figure.
pub fn shutdown_figures() {
    REGISTRY.with(|r| r.borrow_mut().shutdown());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Line, ScalarField, Texture2D};

    #[test]
    fn registry_numbers_and_current() {
        let mut reg = FigureRegistry::new();
        let f1 = reg.figure(None);
        let f2 = reg.figure(None);
        assert_eq!(f1.borrow().number(), 1);
        assert_eq!(f2.borrow().number(), 2);
        assert_eq!(reg.current().unwrap().borrow().number(), 2);
        // Re-requesting an existing number returns the same figure.
        let f1_again = reg.figure(Some(1));
        assert!(Rc::ptr_eq(&f1, &f1_again));
        reg.close(2);
        assert_eq!(reg.current().unwrap().borrow().number(), 1);
        assert!(f2.borrow().is_destroyed());
        reg.shutdown();
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn draw_coalesces_until_draw_now() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        {
            let mut f = fig.borrow_mut();
            f.add_axes().unwrap();
            f.draw();
            f.draw();
            assert!(f.has_pending_draw());
            f.draw_now().unwrap();
            assert!(!f.has_pending_draw());
        }
    }

    #[test]
    fn getframe_size_follows_device_pixel_ratio() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        let mut f = fig.borrow_mut();
        f.set_logical_size(100, 50);
        f.set_device_pixel_ratio(2.0);
        f.draw_now().unwrap();
        let frame = f.getframe();
        assert_eq!((frame.width, frame.height), (200, 100));
        assert_eq!(frame.data.len(), 200 * 100 * 4);
    }

    #[test]
    fn plotted_line_leaves_non_background_pixels() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        let mut f = fig.borrow_mut();
        f.add_wobject(ObjectKind::Line(
            Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap(),
        ))
        .unwrap();
        f.draw_now().unwrap();
        let frame = f.getframe();
        let bg = f.theme.axes_background;
        let bg_px = [
            (bg.x * 255.0) as u8,
            (bg.y * 255.0) as u8,
            (bg.z * 255.0) as u8,
        ];
        let non_bg = frame
            .data
            .chunks_exact(4)
            .filter(|px| px[0] != bg_px[0] || px[1] != bg_px[1] || px[2] != bg_px[2])
            .count();
        assert!(non_bg > 50, "expected polyline pixels, got {non_bg}");
    }

    #[test]
    fn destroyed_figure_draws_are_noops() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        let mut f = fig.borrow_mut();
        f.add_axes().unwrap();
        f.on_close();
        f.draw();
        assert!(!f.has_pending_draw());
        f.draw_now().unwrap();
    }

    #[test]
    fn click_on_texture_reports_axes_coordinates() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        let mut f = fig.borrow_mut();
        f.set_logical_size(512, 512);
        let field = ScalarField::from_2d(vec![0.5; 64 * 64], 64, 64).unwrap();
        let tex = f
            .add_wobject(ObjectKind::Texture2D(Texture2D::new(field).unwrap()))
            .unwrap();
        // Flip y, image convention.
        let axes = f.current_axes().unwrap();
        if let ObjectKind::Axes(ref mut a) = f.scene_mut().get_mut(axes).unwrap().kind {
            a.set_y_flipped(true);
        }
        f.draw_now().unwrap();

        let hits = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        {
            let hits = hits.clone();
            f.scene_mut()
                .get_mut(tex)
                .unwrap()
                .events
                .mouse_down
                .bind(move |args| {
                    hits.borrow_mut().push((args.x2d, args.y2d));
                    true
                });
        }
        // Click the center of the figure; the texture spans the axes.
        f.process_mouse_down(256.0, 256.0, MouseButton::Left, Modifiers::NONE);
        let hits = hits.borrow();
        assert_eq!(hits.len(), 1, "texture should receive the click");
        let (x2d, y2d) = hits[0];
        assert!((x2d - 31.5).abs() < 2.0, "x2d = {x2d}");
        assert!((y2d - 31.5).abs() < 2.0, "y2d = {y2d}");
    }

    #[test]
    fn enter_leave_fire_on_hover_change() {
        let mut reg = FigureRegistry::new();
        let fig = reg.figure(None);
        let mut f = fig.borrow_mut();
        f.set_logical_size(200, 200);
        let line = f
            .add_wobject(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()))
            .unwrap();
        f.draw_now().unwrap();

        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        {
            let log = log.clone();
            f.scene_mut()
                .get_mut(line)
                .unwrap()
                .events
                .enter
                .bind(move |_| {
                    log.borrow_mut().push("enter");
                    false
                });
        }
        {
            let log = log.clone();
            f.scene_mut()
                .get_mut(line)
                .unwrap()
                .events
                .leave
                .bind(move |_| {
                    log.borrow_mut().push("leave");
                    false
                });
        }
        // Into the line's area, then far outside it.
        f.process_motion(100.0, 100.0, Modifiers::NONE);
        f.process_motion(-50.0, -50.0, Modifiers::NONE);
        assert_eq!(*log.borrow(), vec!["enter", "leave"]);
    }
}
