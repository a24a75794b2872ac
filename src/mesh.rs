//! Triangle mesh storage and geometric helpers
//!
//! Meshes reconstructed from an archive are repaired (shared vertices
//! merged, degenerate triangles dropped) and get a convex hull before
//! they are handed to the caller.

use crate::transform::{transform_point_f32, Transform3d};
use nalgebra::Point3;

/// An indexed triangle set: shared vertices plus index triples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions
    pub vertices: Vec<Point3<f32>>,
    /// Vertex index triples, each index < `vertices.len()`
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the mesh has no vertices or no triangles
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Merge bitwise-identical vertices and drop broken triangles
    ///
    /// Triangles that reference an out-of-range vertex or use the same
    /// vertex twice after merging are removed.
    pub fn repair(&mut self) {
        use std::collections::HashMap;

        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut unique: HashMap<[u32; 3], u32> = HashMap::new();
        let mut merged = Vec::new();

        for vertex in &self.vertices {
            let key = [vertex.x.to_bits(), vertex.y.to_bits(), vertex.z.to_bits()];
            let idx = *unique.entry(key).or_insert_with(|| {
                merged.push(*vertex);
                (merged.len() - 1) as u32
            });
            remap.push(idx);
        }

        let vertex_count = merged.len() as u32;
        self.vertices = merged;
        self.indices.retain_mut(|tri| {
            for v in tri.iter_mut() {
                match remap.get(*v as usize) {
                    Some(&mapped) => *v = mapped,
                    None => return false,
                }
            }
            tri[0] < vertex_count
                && tri[1] < vertex_count
                && tri[2] < vertex_count
                && tri[0] != tri[1]
                && tri[1] != tri[2]
                && tri[0] != tri[2]
        });
    }

    /// Axis-aligned bounding box, `None` for a vertexless mesh
    pub fn aabb(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let first = self.vertices.first()?;
        let mut min = *first;
        let mut max = *first;
        for v in &self.vertices[1..] {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        Some((min, max))
    }

    /// Bounding box of the mesh under an affine transform
    ///
    /// Transforms the eight corners of the local bounding box and
    /// bounds the result, which is exact for axis-aligned queries and
    /// conservative otherwise.
    pub fn transformed_aabb(
        &self,
        transform: &Transform3d,
    ) -> Option<(Point3<f64>, Point3<f64>)> {
        let (min, max) = self.aabb()?;

        let corners = [
            Point3::new(min.x, min.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, max.y, max.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(max.x, max.y, max.z),
        ];

        let mut out_min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut out_max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in &corners {
            let p = transform.transform_point(&Point3::new(
                f64::from(corner.x),
                f64::from(corner.y),
                f64::from(corner.z),
            ));
            out_min.x = out_min.x.min(p.x);
            out_min.y = out_min.y.min(p.y);
            out_min.z = out_min.z.min(p.z);
            out_max.x = out_max.x.max(p.x);
            out_max.y = out_max.y.max(p.y);
            out_max.z = out_max.z.max(p.z);
        }
        Some((out_min, out_max))
    }

    /// Return a copy of the mesh with every vertex transformed
    pub fn transformed(&self, transform: &Transform3d) -> TriangleMesh {
        TriangleMesh {
            vertices: self
                .vertices
                .iter()
                .map(|v| transform_point_f32(transform, v))
                .collect(),
            indices: self.indices.clone(),
        }
    }

    /// Compute the convex hull of the mesh vertices
    ///
    /// Returns `None` for meshes too degenerate to bound a volume
    /// (fewer than four vertices, or flat along some axis).
    pub fn convex_hull(&self) -> Option<TriangleMesh> {
        if self.vertices.len() < 4 {
            return None;
        }
        let (min, max) = self.aabb()?;
        if min.x == max.x || min.y == max.y || min.z == max.z {
            return None;
        }

        let (vertices, indices) = parry3d::transformation::convex_hull(&self.vertices);
        Some(TriangleMesh { vertices, indices })
    }
}
