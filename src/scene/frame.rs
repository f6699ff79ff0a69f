//! Frame building: the depth-first draw traversal.
//!
//! Each pass walks the tree pre-order, composes transform stacks into
//! model matrices, asks every visible object for its geometry and emits a
//! flat draw list the GPU submit loop (or the CPU pick rasterizer)
//! consumes. Skipped entirely for invisible subtrees.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::cameras::{CameraMatrices, SceneLimits, ViewParams};
use crate::error::Result;
use crate::gpu::picking::PickMap;
use crate::gpu::renderer::{vertex_utils, Vertex};
use crate::gpu::PipelineKind;
use crate::math::transform;
use crate::objects::volume::RenderStyle;
use crate::objects::MarkerStyle;
use crate::scene::axis;
use crate::scene::object::{DrawPass, ObjId, ObjectKind, Scene};
use crate::styling::Theme;

/// What a draw item is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Lines,
    Markers(MarkerStyle),
    Mesh,
    Texture2D,
    Volume(RenderStyle),
    Text,
}

impl ItemKind {
    /// Pipeline used in the pick pass; volumes pick via their bounding
    /// box, text via its anchor quad.
    pub fn pick_pipeline(&self) -> PipelineKind {
        match self {
            ItemKind::Lines => PipelineKind::PickLines,
            _ => PipelineKind::PickTriangles,
        }
    }
}

/// One batched draw, already in world coordinates.
#[derive(Debug)]
pub struct DrawItem {
    pub node: ObjId,
    pub kind: ItemKind,
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
    pub model: Mat4,
    /// First pick ID of this item's range; 0 when not pickable.
    pub pick_id: u32,
}

/// Lightweight per-axes view info kept between frames for event mapping
/// and the overlay pass.
#[derive(Debug, Clone)]
pub struct AxesViewInfo {
    pub axes: ObjId,
    /// Viewport origin in framebuffer pixels (top-left).
    pub origin: Vec2,
    pub size: Vec2,
    pub matrices: CameraMatrices,
}

/// Per-axes portion of a frame.
#[derive(Debug)]
pub struct AxesFrame {
    pub axes: ObjId,
    /// Viewport in framebuffer pixels: origin (top-left) and size.
    pub viewport_origin: Vec2,
    pub viewport_size: Vec2,
    pub matrices: CameraMatrices,
    pub background: Vec4,
    pub limits: SceneLimits,
    pub items: Vec<DrawItem>,
    /// Axis frame/grid/tick geometry, drawn with the line pipeline.
    pub axis_lines: Vec<Vertex>,
}

/// A complete pass over one figure.
#[derive(Debug)]
pub struct FrameGeometry {
    pub pass: DrawPass,
    pub axes_frames: Vec<AxesFrame>,
    /// Scene geometry generation this frame was built from.
    pub generation: u64,
}

/// Build the draw list for a pass.
///
/// `framebuffer` is the figure's physical pixel size. For the Pick pass,
/// ID ranges are allocated into `pick_map` in draw order.
pub fn build_frame(
    scene: &mut Scene,
    framebuffer: (u32, u32),
    pass: DrawPass,
    theme: &Theme,
    pick_map: Option<&mut PickMap>,
) -> Result<FrameGeometry> {
    let mut frames = Vec::new();
    let mut pick_map = pick_map;
    if let Some(map) = pick_map.as_deref_mut() {
        map.clear();
    }

    let axes_ids: Vec<ObjId> = scene
        .visible_descendants(scene.root())
        .into_iter()
        .filter(|id| {
            matches!(
                scene.get(*id).map(|n| &n.kind),
                Ok(ObjectKind::Axes(_))
            )
        })
        .collect();

    for axes_id in axes_ids {
        let frame = build_axes_frame(
            scene,
            axes_id,
            framebuffer,
            pass,
            theme,
            pick_map.as_deref_mut(),
        )?;
        frames.push(frame);
    }

    Ok(FrameGeometry {
        pass,
        axes_frames: frames,
        generation: scene.geometry_generation(),
    })
}

fn build_axes_frame(
    scene: &mut Scene,
    axes_id: ObjId,
    framebuffer: (u32, u32),
    pass: DrawPass,
    theme: &Theme,
    mut pick_map: Option<&mut PickMap>,
) -> Result<AxesFrame> {
    let limits = scene.axes_limits(axes_id)?;
    let (position, daspect, background, axis_props, camera) = {
        let node = scene.get(axes_id)?;
        match &node.kind {
            ObjectKind::Axes(a) => (
                a.position,
                a.daspect,
                a.background,
                a.axis.clone(),
                a.camera(),
            ),
            _ => unreachable!("filtered to axes above"),
        }
    };

    let fb = Vec2::new(framebuffer.0 as f32, framebuffer.1 as f32);
    let (origin, size) = position.to_pixels(Vec2::ZERO, fb);
    let viewport_px = (size.x.max(1.0) as u32, size.y.max(1.0) as u32);

    let params = ViewParams {
        viewport_px,
        daspect,
    };
    let matrices = camera.borrow_mut().set_view(&params);

    // Axis frame geometry: border/grid in 2-D, the cornered cube in 3-D,
    // circles and rays in polar mode. Skipped in the pick pass (the axis
    // is not pickable) and in Fast passes.
    let mut axis_lines = Vec::new();
    if axis_props.visible && pass == DrawPass::Shape {
        let cam = camera.borrow();
        let (azimuth, elevation, is_polar, is_3d) = match &*cam {
            crate::cameras::Camera::ThreeD(c) => (c.azimuth, c.elevation, false, true),
            crate::cameras::Camera::Polar(_) => (0.0, 0.0, true, false),
            _ => (0.0, 0.0, false, false),
        };
        drop(cam);
        let color = theme.axis_color;
        if is_polar {
            let ticks =
                axis::compute_ticks(crate::math::Range::new(0.0, limits.x.max.abs().max(limits.y.max.abs())), size.x);
            let (circles, rays) =
                axis::polar_grid(&ticks, axis_props.angular_ref_pos, axis_props.is_cw, 30.0);
            for ring in circles {
                for w in ring.windows(2) {
                    axis_lines.push(Vertex::new(w[0], color));
                    axis_lines.push(Vertex::new(w[1], color));
                }
            }
            for ray in rays {
                axis_lines.push(Vertex::new(ray[0], color));
                axis_lines.push(Vertex::new(ray[1], color));
            }
        } else if is_3d {
            if axis_props.show_box {
                for edge in axis::cornered_cube_edges(&limits, azimuth, elevation) {
                    axis_lines.push(Vertex::new(edge[0], color));
                    axis_lines.push(Vertex::new(edge[1], color));
                }
            }
        } else {
            let x_ticks = axis::compute_ticks(limits.x, size.x);
            let y_ticks = axis::compute_ticks(limits.y, size.y);
            if axis_props.show_box {
                for edge in axis::border_2d(&limits) {
                    axis_lines.push(Vertex::new(edge[0], color));
                    axis_lines.push(Vertex::new(edge[1], color));
                }
            }
            if axis_props.show_grid {
                for line in axis::grid_lines_2d(&x_ticks, &y_ticks, &limits) {
                    axis_lines.push(Vertex::new(line[0], theme.grid_color));
                    axis_lines.push(Vertex::new(line[1], theme.grid_color));
                }
            }
        }
    }

    // Pre-order walk of the axes subtree with a model matrix stack.
    let mut items = Vec::new();
    let polar_cfg = (axis_props.angular_ref_pos, axis_props.is_cw);
    walk(
        scene,
        axes_id,
        Mat4::IDENTITY,
        pass,
        polar_cfg,
        &mut pick_map,
        &mut items,
    )?;

    Ok(AxesFrame {
        axes: axes_id,
        viewport_origin: origin,
        viewport_size: size,
        matrices,
        background,
        limits,
        items,
        axis_lines,
    })
}

fn walk(
    scene: &mut Scene,
    id: ObjId,
    parent_model: Mat4,
    pass: DrawPass,
    polar_cfg: (f32, bool),
    pick_map: &mut Option<&mut PickMap>,
    items: &mut Vec<DrawItem>,
) -> Result<()> {
    let children: Vec<ObjId> = scene.get(id)?.children.clone();
    for child in children {
        let (visible, model) = {
            let node = scene.get(child)?;
            (
                node.visible,
                parent_model * transform::compose(&node.transforms),
            )
        };
        if !visible {
            continue;
        }
        emit_items(scene, child, model, pass, polar_cfg, pick_map, items)?;
        walk(scene, child, model, pass, polar_cfg, pick_map, items)?;
    }
    Ok(())
}

fn alloc_pick(
    pick_map: &mut Option<&mut PickMap>,
    node: ObjId,
    pickable: bool,
    primitives: usize,
) -> u32 {
    match pick_map {
        Some(map) if pickable => map.alloc(node, primitives.max(1) as u32),
        _ => 0,
    }
}

fn emit_items(
    scene: &mut Scene,
    id: ObjId,
    model: Mat4,
    pass: DrawPass,
    polar_cfg: (f32, bool),
    pick_map: &mut Option<&mut PickMap>,
    items: &mut Vec<DrawItem>,
) -> Result<()> {
    let pickable = scene.get(id)?.pickable;
    // Regenerate polar cartesian points against the current axis config
    // before reading geometry.
    if let ObjectKind::PolarLine(ref mut pl) = scene.get_mut(id)?.kind {
        pl.update_cartesian(polar_cfg.0, polar_cfg.1)?;
    }

    let node = scene.get_mut(id)?;
    match &mut node.kind {
        ObjectKind::Line(line) => {
            let color = if pass == DrawPass::Pick {
                Vec4::ONE
            } else {
                line.line_color
            };
            let segments = line.segments().to_vec();
            if !segments.is_empty() {
                let pick_id = alloc_pick(pick_map, id, pickable, segments.len());
                items.push(DrawItem {
                    node: id,
                    kind: ItemKind::Lines,
                    vertices: vertex_utils::pack_segments(&segments, color),
                    indices: None,
                    model,
                    pick_id,
                });
            }
            let markers = line.marker_positions();
            if !markers.is_empty() {
                let pick_id = alloc_pick(pick_map, id, pickable, markers.len());
                items.push(DrawItem {
                    node: id,
                    kind: ItemKind::Markers(line.marker_style),
                    vertices: vertex_utils::pack_marker_quads(
                        &markers,
                        line.marker_color,
                        line.marker_width,
                    ),
                    indices: None,
                    model,
                    pick_id,
                });
            }
        }
        ObjectKind::PolarLine(pl) => {
            let line = &mut pl.inner;
            let segments = line.segments().to_vec();
            if !segments.is_empty() {
                let pick_id = alloc_pick(pick_map, id, pickable, segments.len());
                items.push(DrawItem {
                    node: id,
                    kind: ItemKind::Lines,
                    vertices: vertex_utils::pack_segments(&segments, line.line_color),
                    indices: None,
                    model,
                    pick_id,
                });
            }
        }
        ObjectKind::Mesh(mesh) => {
            if mesh.normals().is_none() {
                mesh.calculate_normals();
            }
            let use_flat = matches!(mesh.face_shading, crate::objects::Shading::Flat);
            let (vertices, indices) = if use_flat {
                let (verts, normals, _) = mesh.flattened()?;
                let packed: Vec<Vertex> = verts
                    .iter()
                    .zip(normals.iter())
                    .map(|(p, n)| {
                        let mut v = Vertex::new(p.as_vec3(), mesh.face_color);
                        v.normal = n.to_array();
                        v
                    })
                    .collect();
                (packed, None)
            } else {
                let normals = mesh.normals().unwrap_or(&[]).to_vec();
                let values = mesh.values().cloned();
                let packed: Vec<Vertex> = mesh
                    .vertices()
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let mut v = Vertex::new(p.as_vec3(), mesh.face_color);
                        if let Some(n) = normals.get(i) {
                            v.normal = n.to_array();
                        }
                        match &values {
                            Some(crate::objects::MeshValues::Scalar(s)) => {
                                v.tex_coords = [s[i], 0.0];
                            }
                            Some(crate::objects::MeshValues::TexCoords(t)) => {
                                v.tex_coords = t[i].to_array();
                            }
                            Some(crate::objects::MeshValues::Rgb(c)) => {
                                v.color = [c[i].x, c[i].y, c[i].z, 1.0];
                            }
                            Some(crate::objects::MeshValues::Rgba(c)) => {
                                v.color = c[i].to_array();
                            }
                            None => {}
                        }
                        v
                    })
                    .collect();
                (packed, Some(mesh.triangulated_indices()))
            };
            let primitive_count = indices
                .as_ref()
                .map(|i| i.len() / 3)
                .unwrap_or(vertices.len() / 3);
            if !matches!(mesh.face_shading, crate::objects::Shading::None) {
                let pick_id = alloc_pick(pick_map, id, pickable, primitive_count);
                items.push(DrawItem {
                    node: id,
                    kind: ItemKind::Mesh,
                    vertices,
                    indices,
                    model,
                    pick_id,
                });
            }
            if !matches!(mesh.edge_shading, crate::objects::Shading::None) {
                let edges = mesh.edge_segments();
                if !edges.is_empty() {
                    let pick_id = alloc_pick(pick_map, id, pickable, edges.len());
                    items.push(DrawItem {
                        node: id,
                        kind: ItemKind::Lines,
                        vertices: vertex_utils::pack_segments(&edges, mesh.edge_color),
                        indices: None,
                        model,
                        pick_id,
                    });
                }
            }
        }
        ObjectKind::Texture2D(tex) => {
            let (min, max) = tex.quad();
            let pick_id = alloc_pick(pick_map, id, pickable, 2);
            items.push(DrawItem {
                node: id,
                kind: ItemKind::Texture2D,
                vertices: vertex_utils::pack_quad(min, max, tex.z_offset, Vec4::ONE),
                indices: None,
                model,
                pick_id,
            });
        }
        ObjectKind::Texture3D(vol) => {
            let corners = vol.bbox_corners();
            let vertices: Vec<Vertex> = corners
                .iter()
                .map(|&c| Vertex::new(c, Vec4::ONE))
                .collect();
            let pick_id = alloc_pick(pick_map, id, pickable, 12);
            items.push(DrawItem {
                node: id,
                kind: ItemKind::Volume(vol.render_style()),
                vertices,
                indices: Some(crate::objects::Texture3D::bbox_indices().to_vec()),
                model,
                pick_id,
            });
        }
        ObjectKind::Text(text) => {
            // Glyph quads are resolved against the atlas at submit time;
            // here the anchor position stands in for pick extents.
            let pick_id = alloc_pick(pick_map, id, pickable, 2);
            items.push(DrawItem {
                node: id,
                kind: ItemKind::Text,
                vertices: vec![Vertex::new(text.position, text.content.color)],
                indices: None,
                model,
                pick_id,
            });
        }
        // Wibjects draw in the Screen pass, handled by the overlay
        // builder; containers and axes have no geometry themselves.
        _ => {}
    }
    Ok(())
}

/// Project an item's world-space bounds into a screen-space rectangle.
pub fn item_screen_bounds(
    item: &DrawItem,
    matrices: &CameraMatrices,
) -> Option<(Vec2, Vec2)> {
    if item.vertices.is_empty() {
        return None;
    }
    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    for v in &item.vertices {
        let world = item.model * Vec3::from_array(v.position).extend(1.0);
        let s = matrices.world_to_screen(world.truncate());
        min = min.min(Vec2::new(s.x, s.y));
        max = max.max(Vec2::new(s.x, s.y));
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform;
    use crate::objects::Line;
    use crate::scene::axes::Axes;

    fn scene_with_line() -> (Scene, ObjId, ObjId) {
        let mut scene = Scene::new();
        let container = scene
            .create(ObjectKind::AxesContainer, scene.root())
            .unwrap();
        let axes = scene
            .create(ObjectKind::Axes(Axes::new()), container)
            .unwrap();
        let line = scene
            .create(
                ObjectKind::Line(Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap()),
                axes,
            )
            .unwrap();
        (scene, axes, line)
    }

    #[test]
    fn line_produces_segments_in_draw_order() {
        let (mut scene, _, line) = scene_with_line();
        let theme = Theme::default();
        let frame =
            build_frame(&mut scene, (800, 600), DrawPass::Shape, &theme, None).unwrap();
        assert_eq!(frame.axes_frames.len(), 1);
        let items = &frame.axes_frames[0].items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node, line);
        assert_eq!(items[0].kind, ItemKind::Lines);
        // 4 intervals -> 8 line-list vertices.
        assert_eq!(items[0].vertices.len(), 8);
    }

    #[test]
    fn transforms_compose_into_model_matrix() {
        let (mut scene, _, line) = scene_with_line();
        scene
            .get_mut(line)
            .unwrap()
            .transforms
            .push(Transform::translate(10.0, 0.0, 0.0));
        let theme = Theme::default();
        let frame =
            build_frame(&mut scene, (800, 600), DrawPass::Shape, &theme, None).unwrap();
        let item = &frame.axes_frames[0].items[0];
        let p = item.model * glam::Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert_eq!(p.x, 10.0);
    }

    #[test]
    fn invisible_object_is_skipped() {
        let (mut scene, _, line) = scene_with_line();
        scene.get_mut(line).unwrap().visible = false;
        let theme = Theme::default();
        let frame =
            build_frame(&mut scene, (800, 600), DrawPass::Shape, &theme, None).unwrap();
        assert!(frame.axes_frames[0].items.is_empty());
    }

    #[test]
    fn pick_pass_allocates_ranges_in_draw_order() {
        let (mut scene, axes, line) = scene_with_line();
        let line2 = scene
            .create(
                ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()),
                axes,
            )
            .unwrap();
        let theme = Theme::default();
        let mut map = PickMap::new();
        let frame = build_frame(
            &mut scene,
            (800, 600),
            DrawPass::Pick,
            &theme,
            Some(&mut map),
        )
        .unwrap();
        let items = &frame.axes_frames[0].items;
        assert_eq!(items.len(), 2);
        assert!(items[0].pick_id > 0);
        assert!(items[1].pick_id > items[0].pick_id);
        assert_eq!(map.resolve(items[0].pick_id), Some(line));
        assert_eq!(map.resolve(items[1].pick_id), Some(line2));
    }

    #[test]
    fn mesh_edge_shading_adds_a_line_item() {
        let (mut scene, axes, _) = scene_with_line();
        let mut mesh = crate::objects::mesh::tetrahedron();
        mesh.edge_shading = crate::objects::Shading::Plain;
        let mesh_id = scene.create(ObjectKind::Mesh(mesh), axes).unwrap();
        let theme = Theme::default();
        let frame =
            build_frame(&mut scene, (800, 600), DrawPass::Shape, &theme, None).unwrap();
        let kinds: Vec<ItemKind> = frame.axes_frames[0]
            .items
            .iter()
            .filter(|i| i.node == mesh_id)
            .map(|i| i.kind)
            .collect();
        assert!(kinds.contains(&ItemKind::Mesh));
        assert!(kinds.contains(&ItemKind::Lines));
    }

    #[test]
    fn axis_frame_lines_present_for_2d_axes() {
        let (mut scene, _, _) = scene_with_line();
        let theme = Theme::default();
        let frame =
            build_frame(&mut scene, (800, 600), DrawPass::Shape, &theme, None).unwrap();
        // The 2-D border alone contributes 8 vertices.
        assert!(frame.axes_frames[0].axis_lines.len() >= 8);
    }
}
