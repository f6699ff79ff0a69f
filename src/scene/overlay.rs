//! Screen overlay pass.
//!
//! After the world-space scene, wibjects (labels, legends, colorbars,
//! buttons, sliders) and world-anchored text draw in figure pixel
//! coordinates. The overlay builder emits colored triangles plus glyph
//! quads; both are rendered with a pixel-space orthographic projection.

use glam::{Mat4, Vec2, Vec4};

use crate::error::Result;
use crate::gpu::colormap::build_lut;
use crate::gpu::renderer::Vertex;
use crate::objects::text::TextContent;
use crate::scene::frame::AxesViewInfo;
use crate::scene::object::{ObjId, ObjectKind, Scene};
use crate::text::atlas::FontAtlas;
use crate::text::TextLayout;

/// One glyph quad in pixel space, uv in atlas texels.
#[derive(Debug, Clone, Copy)]
pub struct GlyphQuad {
    pub min: Vec2,
    pub max: Vec2,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    pub color: Vec4,
}

/// The overlay draw list, all coordinates in figure pixels (top-left
/// origin).
#[derive(Debug, Default)]
pub struct Overlay {
    /// Filled shapes as a triangle list.
    pub triangles: Vec<Vertex>,
    /// Line-list accents (legend samples, slider track).
    pub lines: Vec<Vertex>,
    pub glyphs: Vec<GlyphQuad>,
}

impl Overlay {
    /// Pixel-space projection for overlay pipelines.
    pub fn projection(framebuffer: (u32, u32)) -> Mat4 {
        Mat4::orthographic_rh(
            0.0,
            framebuffer.0.max(1) as f32,
            framebuffer.1.max(1) as f32,
            0.0,
            -1.0,
            1.0,
        )
    }

    fn push_rect(&mut self, min: Vec2, max: Vec2, color: Vec4) {
        let corners = [
            [min.x, min.y],
            [max.x, min.y],
            [max.x, max.y],
            [min.x, min.y],
            [max.x, max.y],
            [min.x, max.y],
        ];
        for c in corners {
            self.triangles
                .push(Vertex::new(glam::Vec3::new(c[0], c[1], 0.0), color));
        }
    }

    fn push_line(&mut self, a: Vec2, b: Vec2, color: Vec4) {
        self.lines
            .push(Vertex::new(glam::Vec3::new(a.x, a.y, 0.0), color));
        self.lines
            .push(Vertex::new(glam::Vec3::new(b.x, b.y, 0.0), color));
    }

    fn push_layout(&mut self, layout: &TextLayout, anchor: Vec2, angle_deg: f32, color: Vec4) {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let rotate = |p: Vec2| Vec2::new(p.x * cos + p.y * sin, -p.x * sin + p.y * cos);
        for g in &layout.glyphs {
            let top_left = g.position + g.info.offset;
            let min = anchor + rotate(top_left);
            let max = min + g.info.size;
            self.glyphs.push(GlyphQuad {
                min,
                max,
                uv_min: g.info.uv_min,
                uv_max: g.info.uv_max,
                color,
            });
        }
    }
}

fn layout_content(
    atlas: Option<&mut FontAtlas>,
    content: &TextContent,
) -> Option<TextLayout> {
    let atlas = atlas?;
    Some(atlas.layout(content.runs(), content.halign, content.valign))
}

/// Build the overlay for the Screen pass.
///
/// `axes_views` provides the per-axes viewports and matrices from the
/// preceding Shape pass so world-anchored text can project its anchor.
/// Without a font atlas, text is skipped (a resource-degraded draw);
/// shapes still draw.
pub fn build_overlay(
    scene: &Scene,
    framebuffer: (u32, u32),
    axes_views: &[AxesViewInfo],
    mut atlas: Option<&mut FontAtlas>,
) -> Result<Overlay> {
    let mut overlay = Overlay::default();
    let fb = Vec2::new(framebuffer.0 as f32, framebuffer.1 as f32);

    // Tick labels for visible 2-D axes.
    if let Some(atlas) = atlas.as_deref_mut() {
        for view in axes_views {
            let node = scene.get(view.axes)?;
            if let ObjectKind::Axes(a) = &node.kind {
                if node.visible && a.axis.visible && a.camera_type() == "2d" {
                    let limits = scene.axes_limits(view.axes)?;
                    push_tick_labels(
                        &mut overlay,
                        atlas,
                        view,
                        &limits,
                        Vec4::new(0.0, 0.0, 0.0, 1.0),
                    )?;
                }
            }
        }
    }

    for id in scene.visible_descendants(scene.root()) {
        let node = scene.get(id)?;
        // Resolve the node's pixel rectangle: wibjects under the figure
        // use the whole framebuffer as parent, wibjects under an axes use
        // that axes' viewport.
        let parent_rect = parent_pixel_rect(scene, id, fb, axes_views)?;
        match &node.kind {
            ObjectKind::Label(label) => {
                let (origin, size) = (parent_rect.0, parent_rect.1);
                let anchor = origin + size * 0.5;
                if let Some(bg) = label.background {
                    overlay.push_rect(origin, origin + size, bg);
                }
                if let Some(layout) = layout_content(atlas.as_deref_mut(), &label.content) {
                    overlay.push_layout(&layout, anchor, label.content.angle, label.content.color);
                }
            }
            ObjectKind::Legend(legend) => {
                let (origin, _) = parent_rect;
                let row_h = legend.row_height_px;
                let size = legend.size_px(120.0);
                overlay.push_rect(origin, origin + size, Vec4::new(1.0, 1.0, 1.0, 0.9));
                for (i, entry) in legend.entries.iter().enumerate() {
                    let y = origin.y + 4.0 + row_h * (i as f32 + 0.5);
                    let x0 = origin.x + 6.0;
                    overlay.push_line(
                        Vec2::new(x0, y),
                        Vec2::new(x0 + legend.sample_width_px, y),
                        entry.line_color,
                    );
                    if let Some(layout) =
                        layout_content(atlas.as_deref_mut(), &entry.label)
                    {
                        overlay.push_layout(
                            &layout,
                            Vec2::new(x0 + legend.sample_width_px + 8.0, y),
                            0.0,
                            entry.label.color,
                        );
                    }
                }
            }
            ObjectKind::Colorbar(bar) => {
                let (origin, size) = parent_rect;
                let lut = build_lut(&bar.colormap)?;
                // Banded gradient; 64 bands read as continuous.
                const BANDS: usize = 64;
                for b in 0..BANDS {
                    let t0 = b as f32 / BANDS as f32;
                    let t1 = (b + 1) as f32 / BANDS as f32;
                    let c = lut[(t0 * 255.0) as usize];
                    let color = Vec4::from_array(c);
                    match bar.orientation {
                        crate::widgets::ColorbarOrientation::Vertical => {
                            // Low values at the bottom.
                            let y1 = origin.y + size.y * (1.0 - t0);
                            let y0 = origin.y + size.y * (1.0 - t1);
                            overlay.push_rect(
                                Vec2::new(origin.x, y0),
                                Vec2::new(origin.x + size.x, y1),
                                color,
                            );
                        }
                        crate::widgets::ColorbarOrientation::Horizontal => {
                            let x0 = origin.x + size.x * t0;
                            let x1 = origin.x + size.x * t1;
                            overlay.push_rect(
                                Vec2::new(x0, origin.y),
                                Vec2::new(x1, origin.y + size.y),
                                color,
                            );
                        }
                    }
                }
            }
            ObjectKind::PushButton(button) => {
                let (origin, size) = parent_rect;
                let face = if button.pressed {
                    button.face_color * Vec4::new(0.8, 0.8, 0.8, 1.0)
                } else {
                    button.face_color
                };
                overlay.push_rect(origin, origin + size, face);
                if let Some(layout) = layout_content(atlas.as_deref_mut(), &button.label) {
                    overlay.push_layout(
                        &layout,
                        origin + size * 0.5,
                        0.0,
                        button.label.color,
                    );
                }
            }
            ObjectKind::Slider(slider) => {
                let (origin, size) = parent_rect;
                let mid_y = origin.y + size.y * 0.5;
                overlay.push_line(
                    Vec2::new(origin.x, mid_y),
                    Vec2::new(origin.x + size.x, mid_y),
                    Vec4::new(0.4, 0.4, 0.4, 1.0),
                );
                let hx = origin.x + size.x * slider.fraction() as f32;
                overlay.push_rect(
                    Vec2::new(hx - 4.0, origin.y),
                    Vec2::new(hx + 4.0, origin.y + size.y),
                    Vec4::new(0.3, 0.3, 0.35, 1.0),
                );
            }
            ObjectKind::Text(text) => {
                // World-anchored text: project the anchor through the
                // owning axes' camera.
                let Some(axes_id) = scene.enclosing_axes(id)? else {
                    continue;
                };
                let Some(view) = axes_views.iter().find(|av| av.axes == axes_id) else {
                    continue;
                };
                let s = view.matrices.world_to_screen(text.position);
                let anchor = view.origin + Vec2::new(s.x, s.y);
                if let Some(layout) = layout_content(atlas.as_deref_mut(), &text.content) {
                    overlay.push_layout(&layout, anchor, text.content.angle, text.content.color);
                }
            }
            _ => {}
        }
    }
    Ok(overlay)
}

/// Build legend rows from a label list and the child lines of an axes,
/// in child order, truncated to the shorter of the two.
pub fn legend_entries_from_axes(
    scene: &Scene,
    axes: ObjId,
    labels: &[&str],
) -> Result<Vec<crate::widgets::LegendEntry>> {
    let mut entries = Vec::new();
    let mut label_iter = labels.iter();
    for id in scene.descendants(axes) {
        if let ObjectKind::Line(line) = &scene.get(id)?.kind {
            let Some(label) = label_iter.next() else {
                break;
            };
            entries.push(crate::widgets::LegendEntry {
                label: TextContent::new(label)?,
                line_color: line.line_color,
                line_style: line.line_style,
                marker_style: line.marker_style,
            });
        }
    }
    Ok(entries)
}

/// Tick labels along the bottom and left of a 2-D axes, when a font is
/// available.
fn push_tick_labels(
    overlay: &mut Overlay,
    atlas: &mut FontAtlas,
    view: &AxesViewInfo,
    limits: &crate::cameras::SceneLimits,
    color: Vec4,
) -> Result<()> {
    let x_ticks = crate::scene::axis::TickSet::compute(limits.x, view.size.x);
    let y_ticks = crate::scene::axis::TickSet::compute(limits.y, view.size.y);
    for (pos, label) in x_ticks.positions.iter().zip(x_ticks.labels.iter()) {
        let runs = crate::text::parse_markup(label)?;
        let layout = atlas.layout(&runs, 0, -1);
        let s = view
            .matrices
            .world_to_screen(glam::Vec3::new(*pos as f32, limits.y.min as f32, 0.0));
        let anchor = view.origin + Vec2::new(s.x, s.y + 4.0);
        overlay.push_layout(&layout, anchor, 0.0, color);
    }
    for (pos, label) in y_ticks.positions.iter().zip(y_ticks.labels.iter()) {
        let runs = crate::text::parse_markup(label)?;
        let layout = atlas.layout(&runs, 1, 0);
        let s = view
            .matrices
            .world_to_screen(glam::Vec3::new(limits.x.min as f32, *pos as f32, 0.0));
        let anchor = view.origin + Vec2::new(s.x - 4.0, s.y);
        overlay.push_layout(&layout, anchor, 0.0, color);
    }
    Ok(())
}

/// Pixel rectangle of a wibject's own position within its parent.
fn parent_pixel_rect(
    scene: &Scene,
    id: ObjId,
    fb: Vec2,
    axes_views: &[AxesViewInfo],
) -> Result<(Vec2, Vec2)> {
    let node = scene.get(id)?;
    let rect = match &node.kind {
        ObjectKind::Label(_)
        | ObjectKind::Legend(_)
        | ObjectKind::Colorbar(_)
        | ObjectKind::PushButton(_)
        | ObjectKind::Slider(_) => node_rect(scene, id)?,
        _ => crate::widgets::RelRect::default(),
    };
    // Parent space: the enclosing axes viewport when under an axes,
    // otherwise the full framebuffer.
    let (parent_origin, parent_size) = match scene.enclosing_axes(id)? {
        Some(axes_id) => axes_views
            .iter()
            .find(|av| av.axes == axes_id)
            .map(|av| (av.origin, av.size))
            .unwrap_or((Vec2::ZERO, fb)),
        None => (Vec2::ZERO, fb),
    };
    Ok(rect.to_pixels(parent_origin, parent_size))
}

/// The wibject's own relative rect.
fn node_rect(scene: &Scene, id: ObjId) -> Result<crate::widgets::RelRect> {
    Ok(match &scene.get(id)?.kind {
        ObjectKind::Label(w) => w.rect,
        ObjectKind::Legend(w) => w.rect,
        ObjectKind::Colorbar(w) => w.rect,
        ObjectKind::PushButton(w) => w.rect,
        ObjectKind::Slider(w) => w.rect,
        _ => crate::widgets::RelRect::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Range;
    use crate::scene::axes::Axes;
    use crate::widgets::{Colorbar, Legend, RangeSlider};

    fn base_scene() -> (Scene, ObjId) {
        let mut scene = Scene::new();
        let c = scene
            .create(ObjectKind::AxesContainer, scene.root())
            .unwrap();
        let a = scene.create(ObjectKind::Axes(Axes::new()), c).unwrap();
        (scene, a)
    }

    #[test]
    fn colorbar_emits_bands() {
        let (mut scene, _) = base_scene();
        let bar = Colorbar::new(crate::styling::jet(), Range::new(0.0, 1.0));
        scene
            .create(ObjectKind::Colorbar(bar), scene.root())
            .unwrap();
        let overlay = build_overlay(&scene, (800, 600), &[], None).unwrap();
        // 64 bands x 6 vertices.
        assert_eq!(overlay.triangles.len(), 64 * 6);
        assert!(overlay.glyphs.is_empty());
    }

    #[test]
    fn legend_emits_one_sample_line_per_entry() {
        let (mut scene, _) = base_scene();
        let mut legend = Legend::new();
        legend.set_entries(vec![
            crate::widgets::LegendEntry {
                label: TextContent::new("first").unwrap(),
                line_color: Vec4::ONE,
                line_style: crate::objects::LineStyle::Solid,
                marker_style: crate::objects::MarkerStyle::None,
            };
            3
        ]);
        scene
            .create(ObjectKind::Legend(legend), scene.root())
            .unwrap();
        let overlay = build_overlay(&scene, (800, 600), &[], None).unwrap();
        assert_eq!(overlay.lines.len(), 6);
    }

    #[test]
    fn legend_entries_follow_axes_child_lines() {
        let (mut scene, axes) = base_scene();
        let mut red = crate::objects::Line::from_y(&[0.0, 1.0]).unwrap();
        red.line_color = Vec4::new(1.0, 0.0, 0.0, 1.0);
        scene.create(ObjectKind::Line(red), axes).unwrap();
        let blue = crate::objects::Line::from_y(&[1.0, 0.0]).unwrap();
        scene.create(ObjectKind::Line(blue), axes).unwrap();

        let entries =
            legend_entries_from_axes(&scene, axes, &["first", "second", "extra"]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label.text(), "first");
        assert_eq!(entries[0].line_color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(entries[1].label.text(), "second");
    }

    #[test]
    fn slider_draws_track_and_handle() {
        let (mut scene, _) = base_scene();
        scene
            .create(
                ObjectKind::Slider(RangeSlider::new(Range::new(0.0, 10.0))),
                scene.root(),
            )
            .unwrap();
        let overlay = build_overlay(&scene, (400, 300), &[], None).unwrap();
        assert_eq!(overlay.lines.len(), 2);
        assert_eq!(overlay.triangles.len(), 6);
    }
}
