//! Color-ID picking.
//!
//! At the end of a Shape pass (or on demand after a geometry change) the
//! scene is re-rendered into an off-screen color target with every
//! pickable primitive flat-shaded in a unique 24-bit ID; ID 0 means no
//! hit. Objects reserve contiguous ID ranges at draw time, and a pixel
//! read back from the buffer resolves to the owning object through the
//! range table.

use crate::scene::object::ObjId;

/// Allocates contiguous 24-bit ID ranges and resolves IDs to objects.
#[derive(Debug, Default)]
pub struct PickMap {
    /// (first id, owner), ascending by first id.
    ranges: Vec<(u32, ObjId)>,
    next_id: u32,
}

const MAX_ID: u32 = 0x00FF_FFFF;

impl PickMap {
    pub fn new() -> Self {
        PickMap {
            ranges: Vec::new(),
            next_id: 1,
        }
    }

    /// Start a fresh frame of allocations.
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.next_id = 1;
    }

    /// Reserve `count` IDs for an object; returns the first ID. A full
    /// map parks further objects on ID 0 (never picked) rather than
    /// failing the pass.
    pub fn alloc(&mut self, owner: ObjId, count: u32) -> u32 {
        let count = count.max(1);
        if self.next_id.saturating_add(count) > MAX_ID {
            log::warn!(target: "sciviz", "pick id space exhausted; object not pickable this frame");
            return 0;
        }
        let first = self.next_id;
        self.ranges.push((first, owner));
        self.next_id += count;
        first
    }

    /// Object owning `id`, if any.
    pub fn resolve(&self, id: u32) -> Option<ObjId> {
        if id == 0 || id >= self.next_id {
            return None;
        }
        // Last range whose first id is <= id.
        match self.ranges.binary_search_by(|(first, _)| first.cmp(&id)) {
            Ok(i) => Some(self.ranges[i].1),
            Err(0) => None,
            Err(i) => Some(self.ranges[i - 1].1),
        }
    }

    /// Flat color encoding of an ID for the pick shaders.
    pub fn id_to_color(id: u32) -> [f32; 4] {
        [
            ((id >> 16) & 0xFF) as f32 / 255.0,
            ((id >> 8) & 0xFF) as f32 / 255.0,
            (id & 0xFF) as f32 / 255.0,
            1.0,
        ]
    }

    /// Decode an Rgba8 pixel back into an ID.
    pub fn color_to_id(rgba: [u8; 4]) -> u32 {
        ((rgba[0] as u32) << 16) | ((rgba[1] as u32) << 8) | rgba[2] as u32
    }
}

/// The resolved hit map, one 24-bit ID per pixel.
///
/// Filled either by reading back the GPU pick target, or by the CPU
/// fallback rasterizer that covers each pickable object's projected
/// bounds when no device is available (a degraded but functional pick
/// path).
#[derive(Debug, Clone)]
pub struct PickBuffer {
    width: u32,
    height: u32,
    ids: Vec<u32>,
    /// Scene geometry generation this buffer was built against.
    pub built_for_generation: u64,
}

impl PickBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        PickBuffer {
            width: width.max(1),
            height: height.max(1),
            ids: vec![0; (width.max(1) * height.max(1)) as usize],
            built_for_generation: 0,
        }
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.ids.fill(0);
    }

    /// ID under a pixel; 0 outside the buffer.
    pub fn id_at(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0;
        }
        self.ids[(y as u32 * self.width + x as u32) as usize]
    }

    /// Write one pixel (used by the GPU readback copy loop).
    pub fn set(&mut self, x: u32, y: u32, id: u32) {
        if x < self.width && y < self.height {
            self.ids[(y * self.width + x) as usize] = id;
        }
    }

    /// Rasterize an axis-aligned screen rectangle with an ID. Later
    /// fills overwrite earlier ones, matching draw order.
    pub fn fill_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, id: u32) {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        let xs = x0.floor().max(0.0) as u32;
        let ys = y0.floor().max(0.0) as u32;
        let xe = (x1.ceil() as u32).min(self.width);
        let ye = (y1.ceil() as u32).min(self.height);
        for y in ys..ye {
            for x in xs..xe {
                self.ids[(y * self.width + x) as usize] = id;
            }
        }
    }

    /// Decode a full Rgba8 readback row-by-row (rows may be padded to
    /// the GPU's copy alignment).
    pub fn fill_from_rgba8(&mut self, data: &[u8], bytes_per_row: usize) {
        for y in 0..self.height {
            let row = &data[y as usize * bytes_per_row..];
            for x in 0..self.width {
                let o = x as usize * 4;
                let id = PickMap::color_to_id([row[o], row[o + 1], row[o + 2], row[o + 3]]);
                self.ids[(y * self.width + x) as usize] = id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::object::{ObjectKind, Scene};
    use crate::scene::axes::Axes;

    fn some_ids() -> (ObjId, ObjId) {
        let mut scene = Scene::new();
        let c = scene.create(ObjectKind::AxesContainer, scene.root()).unwrap();
        let a = scene.create(ObjectKind::Axes(Axes::new()), c).unwrap();
        (c, a)
    }

    #[test]
    fn ranges_resolve_to_owner() {
        let (a, b) = some_ids();
        let mut map = PickMap::new();
        let first_a = map.alloc(a, 10);
        let first_b = map.alloc(b, 5);
        assert_eq!(first_a, 1);
        assert_eq!(first_b, 11);
        assert_eq!(map.resolve(0), None);
        assert_eq!(map.resolve(1), Some(a));
        assert_eq!(map.resolve(10), Some(a));
        assert_eq!(map.resolve(11), Some(b));
        assert_eq!(map.resolve(15), Some(b));
        assert_eq!(map.resolve(16), None);
    }

    #[test]
    fn color_roundtrip() {
        for id in [1u32, 255, 256, 65_536, 0x00AB_CDEF] {
            let c = PickMap::id_to_color(id);
            let rgba = [
                (c[0] * 255.0).round() as u8,
                (c[1] * 255.0).round() as u8,
                (c[2] * 255.0).round() as u8,
                255,
            ];
            assert_eq!(PickMap::color_to_id(rgba), id);
        }
    }

    #[test]
    fn later_fills_overwrite_earlier() {
        let (a, b) = some_ids();
        let mut map = PickMap::new();
        let ia = map.alloc(a, 1);
        let ib = map.alloc(b, 1);
        let mut buf = PickBuffer::new(100, 100);
        buf.fill_rect(10.0, 10.0, 60.0, 60.0, ia);
        buf.fill_rect(40.0, 40.0, 90.0, 90.0, ib);
        assert_eq!(map.resolve(buf.id_at(20, 20)), Some(a));
        assert_eq!(map.resolve(buf.id_at(50, 50)), Some(b));
        assert_eq!(map.resolve(buf.id_at(95, 95)), None);
    }

    #[test]
    fn out_of_bounds_reads_are_no_hit() {
        let buf = PickBuffer::new(10, 10);
        assert_eq!(buf.id_at(-1, 0), 0);
        assert_eq!(buf.id_at(0, 10), 0);
    }
}
