//! The scene graph: an arena of nodes with generational handles.
//!
//! Parent links are handles rather than references, so destroyed figures
//! are never retained through children; a stale handle is detected by its
//! generation and every operation on it fails with `ObjectDestroyed`.
//! Object behavior is a closed variant over the draw contract instead of
//! an inheritance tree.

use glam::Vec3;

use crate::cameras::SceneLimits;
use crate::error::{Error, Result};
use crate::events::ObjectEvents;
use crate::math::{Range, Transform};
use crate::objects::{Line, Mesh, PolarLine, Text, Texture2D, Texture3D};
use crate::scene::axes::Axes;
use crate::widgets::{Colorbar, Label, Legend, PushButton, RangeSlider};

/// The four traversal passes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPass {
    /// World-space geometry.
    Shape,
    /// Overlays in screen coordinates, after the 3-D scene.
    Screen,
    /// Shape semantics, but quality may degrade during interaction.
    Fast,
    /// Flat-shaded unique color IDs; blending, AA and texturing off.
    Pick,
}

/// Generational handle to a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId {
    index: u32,
    generation: u32,
}

impl ObjId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Closed set of node behaviors.
#[derive(Debug)]
pub enum ObjectKind {
    /// The figure's own node; exactly one per scene, never a child.
    FigureRoot,
    /// Groups the axes of a figure.
    AxesContainer,
    Axes(Axes),
    // Wibjects (screen space).
    Label(Label),
    Legend(Legend),
    Colorbar(Colorbar),
    PushButton(PushButton),
    Slider(RangeSlider),
    // Wobjects (world space).
    Line(Line),
    PolarLine(PolarLine),
    Mesh(Mesh),
    Texture2D(Texture2D),
    Texture3D(Texture3D),
    Text(Text),
}

impl ObjectKind {
    pub fn is_wobject(&self) -> bool {
        matches!(
            self,
            ObjectKind::Line(_)
                | ObjectKind::PolarLine(_)
                | ObjectKind::Mesh(_)
                | ObjectKind::Texture2D(_)
                | ObjectKind::Texture3D(_)
                | ObjectKind::Text(_)
        )
    }

    pub fn is_wibject(&self) -> bool {
        matches!(
            self,
            ObjectKind::Label(_)
                | ObjectKind::Legend(_)
                | ObjectKind::Colorbar(_)
                | ObjectKind::PushButton(_)
                | ObjectKind::Slider(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::FigureRoot => "FigureRoot",
            ObjectKind::AxesContainer => "AxesContainer",
            ObjectKind::Axes(_) => "Axes",
            ObjectKind::Label(_) => "Label",
            ObjectKind::Legend(_) => "Legend",
            ObjectKind::Colorbar(_) => "Colorbar",
            ObjectKind::PushButton(_) => "PushButton",
            ObjectKind::Slider(_) => "Slider",
            ObjectKind::Line(_) => "Line",
            ObjectKind::PolarLine(_) => "PolarLine",
            ObjectKind::Mesh(_) => "Mesh",
            ObjectKind::Texture2D(_) => "Texture2D",
            ObjectKind::Texture3D(_) => "Texture3D",
            ObjectKind::Text(_) => "Text",
        }
    }

    /// World-space bounds contributed to the parent axes' limits.
    pub fn limits(&self) -> Option<(Vec3, Vec3)> {
        match self {
            ObjectKind::Line(l) => l.limits(),
            ObjectKind::PolarLine(l) => l.inner.limits(),
            ObjectKind::Mesh(m) => m.limits(),
            ObjectKind::Texture2D(t) => t.limits(),
            ObjectKind::Texture3D(t) => t.limits(),
            ObjectKind::Text(t) => t.limits(),
            _ => None,
        }
    }
}

/// A scene node: behavior plus the shared tree/base state.
#[derive(Debug)]
pub struct Node {
    pub kind: ObjectKind,
    pub parent: Option<ObjId>,
    pub children: Vec<ObjId>,
    pub visible: bool,
    pub hit_test: bool,
    pub pickable: bool,
    /// Applied in order before drawing this node and its subtree.
    pub transforms: Vec<Transform>,
    pub events: ObjectEvents,
    /// Bumped on every data change; compared against `uploaded_generation`
    /// for lazy GPU upload.
    pub dirty_generation: u64,
    pub uploaded_generation: u64,
}

impl Node {
    fn new(kind: ObjectKind) -> Self {
        // Every node responds to events by default; only leaf visuals
        // reserve pick IDs.
        let pickable = kind.is_wobject() || kind.is_wibject();
        Node {
            kind,
            parent: None,
            children: Vec::new(),
            visible: true,
            hit_test: true,
            pickable,
            transforms: Vec::new(),
            events: ObjectEvents::default(),
            dirty_generation: 1,
            uploaded_generation: 0,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The node arena owned by a figure.
pub struct Scene {
    slots: Vec<Slot>,
    root: ObjId,
    /// Bumped whenever geometry changes; the pick buffer is regenerated
    /// on mismatch.
    geometry_generation: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut scene = Scene {
            slots: Vec::new(),
            root: ObjId {
                index: 0,
                generation: 0,
            },
            geometry_generation: 1,
        };
        let root = scene.insert(Node::new(ObjectKind::FigureRoot));
        scene.root = root;
        scene
    }

    pub fn root(&self) -> ObjId {
        self.root
    }

    pub fn geometry_generation(&self) -> u64 {
        self.geometry_generation
    }

    fn insert(&mut self, node: Node) -> ObjId {
        // Reuse the first free slot; generations make old handles stale.
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.is_none() {
                slot.node = Some(node);
                return ObjId {
                    index: i as u32,
                    generation: slot.generation,
                };
            }
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ObjId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn get(&self, id: ObjId) -> Result<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or(Error::ObjectDestroyed)
    }

    pub fn get_mut(&mut self, id: ObjId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or(Error::ObjectDestroyed)
    }

    pub fn is_alive(&self, id: ObjId) -> bool {
        self.get(id).is_ok()
    }

    fn parent_allowed(child: &ObjectKind, parent: &ObjectKind) -> bool {
        match child {
            ObjectKind::FigureRoot => false,
            ObjectKind::AxesContainer => matches!(parent, ObjectKind::FigureRoot),
            ObjectKind::Axes(_) => matches!(parent, ObjectKind::AxesContainer),
            k if k.is_wibject() => {
                matches!(parent, ObjectKind::FigureRoot | ObjectKind::Axes(_))
                    || parent.is_wibject()
            }
            k if k.is_wobject() => matches!(parent, ObjectKind::Axes(_)) || parent.is_wobject(),
            _ => false,
        }
    }

    /// Create a node under `parent`, enforcing the structural rules:
    /// axes only under an axes container, wobjects ultimately under an
    /// axes, the figure root never a child.
    pub fn create(&mut self, kind: ObjectKind, parent: ObjId) -> Result<ObjId> {
        let parent_node = self.get(parent)?;
        if !Self::parent_allowed(&kind, &parent_node.kind) {
            return Err(Error::validation(format!(
                "a {} cannot be a child of a {}",
                kind.type_name(),
                parent_node.kind.type_name()
            )));
        }

        let is_texture2d = matches!(kind, ObjectKind::Texture2D(_));
        let mut node = Node::new(kind);
        node.parent = Some(parent);
        let id = self.insert(node);
        self.get_mut(parent)?.children.push(id);

        if is_texture2d {
            self.assign_texture_depth(id, parent)?;
        }
        self.geometry_generation += 1;
        Ok(id)
    }

    /// Stack a newly added 2-D texture behind its siblings' lines and on
    /// top of earlier textures: each new texture sits 0.1 deeper, so all
    /// depths stay negative and later textures paint over earlier ones
    /// (the 2-D camera looks from the negative-z side).
    fn assign_texture_depth(&mut self, new_id: ObjId, parent: ObjId) -> Result<()> {
        let axes = self
            .enclosing_axes(parent)?
            .ok_or_else(|| Error::validation("Texture2D must live under an axes"))?;
        let mut min_z = 0.0f32;
        for id in self.descendants(axes) {
            if id == new_id {
                continue;
            }
            if let ObjectKind::Texture2D(ref t) = self.get(id)?.kind {
                min_z = min_z.min(t.z_offset);
            }
        }
        if let ObjectKind::Texture2D(ref mut t) = self.get_mut(new_id)?.kind {
            t.z_offset = min_z - 0.1;
        }
        Ok(())
    }

    /// Nearest ancestor axes of `id` (including `id` itself).
    pub fn enclosing_axes(&self, id: ObjId) -> Result<Option<ObjId>> {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let node = self.get(c)?;
            if matches!(node.kind, ObjectKind::Axes(_)) {
                return Ok(Some(c));
            }
            cursor = node.parent;
        }
        Ok(None)
    }

    /// Ancestor chain [id, parent, ..., root].
    pub fn ancestors(&self, id: ObjId) -> Result<Vec<ObjId>> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            chain.push(c);
            cursor = self.get(c)?.parent;
        }
        Ok(chain)
    }

    fn is_descendant(&self, candidate: ObjId, ancestor: ObjId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.get(c).ok().and_then(|n| n.parent);
        }
        false
    }

    /// Atomically move `id` under `new_parent`: removed from the old
    /// parent's children, appended to the new one's. Cycles (including
    /// self-parenting) are rejected.
    pub fn set_parent(&mut self, id: ObjId, new_parent: ObjId) -> Result<()> {
        if self.is_descendant(new_parent, id) {
            return Err(Error::validation(
                "reparenting would create a cycle in the scene graph",
            ));
        }
        {
            let node = self.get(id)?;
            let parent_node = self.get(new_parent)?;
            if !Self::parent_allowed(&node.kind, &parent_node.kind) {
                return Err(Error::validation(format!(
                    "a {} cannot be a child of a {}",
                    node.kind.type_name(),
                    parent_node.kind.type_name()
                )));
            }
        }
        if let Some(old) = self.get(id)?.parent {
            self.get_mut(old)?.children.retain(|c| *c != id);
        }
        self.get_mut(id)?.parent = Some(new_parent);
        self.get_mut(new_parent)?.children.push(id);
        self.geometry_generation += 1;
        Ok(())
    }

    /// Destroy a node and its whole subtree. Returns every destroyed
    /// handle so the renderer can release the GPU resources before the
    /// nodes are dropped. Subsequent access fails with `ObjectDestroyed`.
    pub fn destroy(&mut self, id: ObjId) -> Result<Vec<ObjId>> {
        self.get(id)?;
        if id == self.root {
            return Err(Error::validation("the figure root cannot be destroyed"));
        }
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(parent)?.children.retain(|c| *c != id);
        }
        let mut destroyed = Vec::new();
        self.destroy_recursive(id, &mut destroyed);
        self.geometry_generation += 1;
        Ok(destroyed)
    }

    fn destroy_recursive(&mut self, id: ObjId, destroyed: &mut Vec<ObjId>) {
        let children = match self.get(id) {
            Ok(n) => n.children.clone(),
            Err(_) => return,
        };
        for child in children {
            self.destroy_recursive(child, destroyed);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        destroyed.push(id);
    }

    /// Pre-order depth-first descendants of `id`, excluding `id` itself,
    /// in child order.
    pub fn descendants(&self, id: ObjId) -> Vec<ObjId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjId> = match self.get(id) {
            Ok(n) => n.children.iter().rev().cloned().collect(),
            Err(_) => return out,
        };
        while let Some(next) = stack.pop() {
            if let Ok(node) = self.get(next) {
                out.push(next);
                for c in node.children.iter().rev() {
                    stack.push(*c);
                }
            }
        }
        out
    }

    /// Like [`Scene::descendants`] but skipping invisible subtrees, as
    /// the draw traversal does.
    pub fn visible_descendants(&self, id: ObjId) -> Vec<ObjId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjId> = match self.get(id) {
            Ok(n) => n.children.iter().rev().cloned().collect(),
            Err(_) => return out,
        };
        while let Some(next) = stack.pop() {
            if let Ok(node) = self.get(next) {
                if !node.visible {
                    continue;
                }
                out.push(next);
                for c in node.children.iter().rev() {
                    stack.push(*c);
                }
            }
        }
        out
    }

    /// Mark an object's data changed: bumps its dirty generation (lazy
    /// GPU re-upload) and invalidates the pick buffer.
    pub fn mark_dirty(&mut self, id: ObjId) -> Result<()> {
        self.get_mut(id)?.dirty_generation += 1;
        self.geometry_generation += 1;
        Ok(())
    }

    /// Union of the world-space limits of every wobject under an axes.
    pub fn axes_limits(&self, axes: ObjId) -> Result<SceneLimits> {
        match self.get(axes)?.kind {
            ObjectKind::Axes(_) => {}
            _ => return Err(Error::validation("axes_limits takes an Axes handle")),
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for id in self.descendants(axes) {
            if let Some((lo, hi)) = self.get(id)?.kind.limits() {
                min = min.min(lo);
                max = max.max(hi);
                any = true;
            }
        }
        if !any {
            return Ok(SceneLimits::unit());
        }
        Ok(SceneLimits {
            x: Range::new(min.x as f64, max.x as f64),
            y: Range::new(min.y as f64, max.y as f64),
            z: Range::new(min.z as f64, max.z as f64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Line, ScalarField, Texture2D};
    use crate::widgets::Label;

    fn scene_with_axes() -> (Scene, ObjId, ObjId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let container = scene.create(ObjectKind::AxesContainer, root).unwrap();
        let axes = scene
            .create(ObjectKind::Axes(Axes::new()), container)
            .unwrap();
        (scene, container, axes)
    }

    fn texture(n: usize) -> ObjectKind {
        ObjectKind::Texture2D(
            Texture2D::new(ScalarField::from_2d(vec![0.0; n * n], n, n).unwrap()).unwrap(),
        )
    }

    #[test]
    fn every_child_is_in_its_parents_children() {
        let (scene, container, axes) = scene_with_axes();
        for id in [container, axes] {
            let parent = scene.get(id).unwrap().parent.unwrap();
            assert!(scene.get(parent).unwrap().children.contains(&id));
        }
    }

    #[test]
    fn structural_rules_enforced() {
        let (mut scene, container, axes) = scene_with_axes();
        let root = scene.root();
        // An axes must sit under a container.
        assert!(scene.create(ObjectKind::Axes(Axes::new()), root).is_err());
        // A wobject cannot sit directly under the figure.
        let line = Line::from_y(&[0.0, 1.0]).unwrap();
        assert!(scene.create(ObjectKind::Line(line), root).is_err());
        // ... but fits under an axes.
        let line = Line::from_y(&[0.0, 1.0]).unwrap();
        assert!(scene.create(ObjectKind::Line(line), axes).is_ok());
        // A wibject is fine under the figure or an axes.
        let label = Label::new("t").unwrap();
        assert!(scene.create(ObjectKind::Label(label), root).is_ok());
        let _ = container;
    }

    #[test]
    fn destroyed_access_fails() {
        let (mut scene, _, axes) = scene_with_axes();
        let line = scene
            .create(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()), axes)
            .unwrap();
        let destroyed = scene.destroy(axes).unwrap();
        assert!(destroyed.contains(&axes));
        assert!(destroyed.contains(&line));
        assert!(matches!(scene.get(line), Err(Error::ObjectDestroyed)));
        assert!(matches!(
            scene.mark_dirty(axes),
            Err(Error::ObjectDestroyed)
        ));
    }

    #[test]
    fn slot_reuse_does_not_resurrect_handles() {
        let (mut scene, _, axes) = scene_with_axes();
        let line = scene
            .create(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()), axes)
            .unwrap();
        scene.destroy(line).unwrap();
        // The slot gets reused for a new node; the old handle stays dead.
        let line2 = scene
            .create(ObjectKind::Line(Line::from_y(&[1.0, 2.0]).unwrap()), axes)
            .unwrap();
        assert_eq!(line.index(), line2.index());
        assert!(scene.get(line).is_err());
        assert!(scene.get(line2).is_ok());
    }

    #[test]
    fn reparent_is_atomic_and_rejects_cycles() {
        let (mut scene, container, axes) = scene_with_axes();
        let axes2 = scene
            .create(ObjectKind::Axes(Axes::new()), container)
            .unwrap();
        let line = scene
            .create(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()), axes)
            .unwrap();
        scene.set_parent(line, axes2).unwrap();
        assert!(!scene.get(axes).unwrap().children.contains(&line));
        assert!(scene.get(axes2).unwrap().children.contains(&line));
        // A node cannot become its own descendant's child (or its own).
        assert!(scene.set_parent(axes, axes).is_err());
    }

    #[test]
    fn textures_stack_with_strictly_decreasing_depth() {
        let (mut scene, _, axes) = scene_with_axes();
        let t1 = scene.create(texture(2), axes).unwrap();
        let t2 = scene.create(texture(2), axes).unwrap();
        let t3 = scene.create(texture(2), axes).unwrap();
        let z = |id: ObjId, scene: &Scene| match &scene.get(id).unwrap().kind {
            ObjectKind::Texture2D(t) => t.z_offset,
            _ => unreachable!(),
        };
        let (z1, z2, z3) = (z(t1, &scene), z(t2, &scene), z(t3, &scene));
        assert!(z1 < 0.0 && z2 < 0.0 && z3 < 0.0);
        assert!(z2 < z1);
        assert!(z3 < z2);
    }

    #[test]
    fn visible_descendants_skip_hidden_subtrees() {
        let (mut scene, _, axes) = scene_with_axes();
        let line = scene
            .create(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()), axes)
            .unwrap();
        scene.get_mut(axes).unwrap().visible = false;
        let visible = scene.visible_descendants(scene.root());
        assert!(!visible.contains(&axes));
        assert!(!visible.contains(&line));
    }

    #[test]
    fn axes_limits_union_children() {
        let (mut scene, _, axes) = scene_with_axes();
        scene
            .create(ObjectKind::Line(Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap()), axes)
            .unwrap();
        let limits = scene.axes_limits(axes).unwrap();
        assert_eq!(limits.x.min, 0.0);
        assert_eq!(limits.x.max, 4.0);
        assert_eq!(limits.y.min, 1.0);
        assert_eq!(limits.y.max, 4.0);
    }
}
