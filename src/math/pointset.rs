//! Points and point sets.
//!
//! A `PointSet` is an ordered sequence of n-D points (n in {2, 3, 4})
//! stored as one contiguous `Vec<f32>` of shape (N, n). It is the vertex
//! source for lines and meshes, so the layout matches what the GPU vertex
//! packer consumes directly.

use crate::error::{Error, Result};
use glam::{Vec2, Vec3};

/// A single n-D coordinate tuple, n in {2, 3, 4}.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    coords: [f32; 4],
    ndim: usize,
}

impl Point {
    pub fn new2(x: f32, y: f32) -> Self {
        Self {
            coords: [x, y, 0.0, 0.0],
            ndim: 2,
        }
    }

    pub fn new3(x: f32, y: f32, z: f32) -> Self {
        Self {
            coords: [x, y, z, 0.0],
            ndim: 3,
        }
    }

    pub fn new4(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self {
            coords: [x, y, z, w],
            ndim: 4,
        }
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn x(&self) -> f32 {
        self.coords[0]
    }

    pub fn y(&self) -> f32 {
        self.coords[1]
    }

    /// Zero for 2-D points.
    pub fn z(&self) -> f32 {
        self.coords[2]
    }

    pub fn w(&self) -> f32 {
        self.coords[3]
    }

    pub fn coords(&self) -> &[f32] {
        &self.coords[..self.ndim]
    }

    /// Euclidean norm over the point's own dimensionality.
    pub fn norm(&self) -> f32 {
        self.coords()
            .iter()
            .map(|c| c * c)
            .sum::<f32>()
            .sqrt()
    }

    /// Distance to another point of the same dimensionality.
    pub fn distance(&self, other: &Point) -> Result<f32> {
        if self.ndim != other.ndim {
            return Err(Error::validation(format!(
                "cannot take distance between {}-D and {}-D points",
                self.ndim, other.ndim
            )));
        }
        let d: f32 = self
            .coords()
            .iter()
            .zip(other.coords())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(d.sqrt())
    }

    /// Scale to unit length. A zero point stays zero.
    pub fn normalized(&self) -> Point {
        let n = self.norm();
        if n < 1e-12 {
            return *self;
        }
        let mut out = *self;
        for c in out.coords[..self.ndim].iter_mut() {
            *c /= n;
        }
        out
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.coords[0], self.coords[1])
    }

    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.coords[0], self.coords[1], self.coords[2])
    }
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Point::new2(v.x, v.y)
    }
}

impl From<Vec3> for Point {
    fn from(v: Vec3) -> Self {
        Point::new3(v.x, v.y, v.z)
    }
}

/// Ordered sequence of points stored as a contiguous (N, ndim) buffer.
///
/// All points in one set share a dimensionality; mixing 2-D and 3-D
/// points is rejected with a validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    data: Vec<f32>,
    ndim: usize,
}

impl PointSet {
    pub fn new(ndim: usize) -> Result<Self> {
        if !(2..=4).contains(&ndim) {
            return Err(Error::validation(format!(
                "point dimensionality must be 2, 3 or 4, got {ndim}"
            )));
        }
        Ok(Self {
            data: Vec::new(),
            ndim,
        })
    }

    /// Build a set from a flat buffer of shape (N, ndim).
    pub fn from_flat(data: Vec<f32>, ndim: usize) -> Result<Self> {
        let mut set = PointSet::new(ndim)?;
        if data.len() % ndim != 0 {
            return Err(Error::validation(format!(
                "flat buffer length {} is not a multiple of ndim {}",
                data.len(),
                ndim
            )));
        }
        set.data = data;
        Ok(set)
    }

    /// Build a 2-D set from matched x/y slices.
    pub fn from_xy(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::validation(format!(
                "x has {} points, y has {}",
                x.len(),
                y.len()
            )));
        }
        let mut data = Vec::with_capacity(x.len() * 2);
        for i in 0..x.len() {
            data.push(x[i] as f32);
            data.push(y[i] as f32);
        }
        Self::from_flat(data, 2)
    }

    /// Build a 3-D set from matched x/y/z slices.
    pub fn from_xyz(x: &[f64], y: &[f64], z: &[f64]) -> Result<Self> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(Error::validation("x, y and z must have equal length"));
        }
        let mut data = Vec::with_capacity(x.len() * 3);
        for i in 0..x.len() {
            data.push(x[i] as f32);
            data.push(y[i] as f32);
            data.push(z[i] as f32);
        }
        Self::from_flat(data, 3)
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.ndim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    pub fn push(&mut self, p: Point) -> Result<()> {
        if p.ndim() != self.ndim {
            return Err(Error::validation(format!(
                "cannot append a {}-D point to a {}-D set",
                p.ndim(),
                self.ndim
            )));
        }
        self.data.extend_from_slice(p.coords());
        Ok(())
    }

    pub fn extend<I: IntoIterator<Item = Point>>(&mut self, points: I) -> Result<()> {
        for p in points {
            self.push(p)?;
        }
        Ok(())
    }

    pub fn get(&self, i: usize) -> Option<Point> {
        if i >= self.len() {
            return None;
        }
        let start = i * self.ndim;
        let mut coords = [0.0; 4];
        coords[..self.ndim].copy_from_slice(&self.data[start..start + self.ndim]);
        Some(Point {
            coords,
            ndim: self.ndim,
        })
    }

    pub fn set(&mut self, i: usize, p: Point) -> Result<()> {
        if p.ndim() != self.ndim {
            return Err(Error::validation("point dimensionality mismatch"));
        }
        if i >= self.len() {
            return Err(Error::validation(format!(
                "index {i} out of range for {} points",
                self.len()
            )));
        }
        let start = i * self.ndim;
        self.data[start..start + self.ndim].copy_from_slice(p.coords());
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).map(move |i| self.get(i).unwrap())
    }

    /// Normalize every point to unit length in place.
    pub fn normalize(&mut self) {
        let ndim = self.ndim;
        for chunk in self.data.chunks_mut(ndim) {
            let n: f32 = chunk.iter().map(|c| c * c).sum::<f32>().sqrt();
            if n > 1e-12 {
                for c in chunk.iter_mut() {
                    *c /= n;
                }
            }
        }
    }

    /// Index of the point nearest to `p`, with its distance.
    pub fn nearest(&self, p: &Point) -> Result<Option<(usize, f32)>> {
        let mut best: Option<(usize, f32)> = None;
        for (i, q) in self.iter().enumerate() {
            let d = q.distance(p)?;
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        Ok(best)
    }

    /// Per-axis (min, max) over all points. None when empty.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        if self.is_empty() {
            return None;
        }
        let mut min = [f32::INFINITY; 4];
        let mut max = [f32::NEG_INFINITY; 4];
        for p in self.iter() {
            for (d, &c) in p.coords().iter().enumerate() {
                if c.is_finite() {
                    min[d] = min[d].min(c);
                    max[d] = max[d].max(c);
                }
            }
        }
        Some((
            Point {
                coords: min,
                ndim: self.ndim,
            },
            Point {
                coords: max,
                ndim: self.ndim,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get_roundtrip() {
        let mut set = PointSet::new(3).unwrap();
        set.push(Point::new3(1.0, 2.0, 3.0)).unwrap();
        set.push(Point::new3(4.0, 5.0, 6.0)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().coords(), &[4.0, 5.0, 6.0]);
        assert!(set.get(2).is_none());
    }

    #[test]
    fn mixed_dimensionality_rejected() {
        let mut set = PointSet::new(2).unwrap();
        set.push(Point::new2(0.0, 0.0)).unwrap();
        assert!(set.push(Point::new3(1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn normalize_produces_unit_points() {
        let mut set = PointSet::new(2).unwrap();
        set.push(Point::new2(3.0, 4.0)).unwrap();
        set.normalize();
        let p = set.get(0).unwrap();
        assert!((p.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_finds_closest() {
        let set = PointSet::from_xy(&[0.0, 1.0, 5.0], &[0.0, 1.0, 5.0]).unwrap();
        let (i, d) = set
            .nearest(&Point::new2(1.2, 1.2))
            .unwrap()
            .expect("non-empty");
        assert_eq!(i, 1);
        assert!(d < 0.3);
    }

    #[test]
    fn bounds_ignore_non_finite() {
        let set =
            PointSet::from_flat(vec![0.0, 0.0, f32::NAN, 9.0, 2.0, -1.0], 2).unwrap();
        let (min, max) = set.bounds().unwrap();
        assert_eq!(min.x(), 0.0);
        assert_eq!(max.x(), 2.0);
        assert_eq!(min.y(), -1.0);
        assert_eq!(max.y(), 9.0);
    }
}
