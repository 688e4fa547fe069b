//! Indexed triangle meshes for workpiece and tool solids.

use std::collections::HashMap;

use manifold_rs::Manifold;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::transform::Transform;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Center of the box.
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Edge lengths.
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// A triangulated solid: shared vertices plus counter-clockwise
/// (outward-facing) triangles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Build a mesh, checking indices and coordinates.
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if let Some(p) = vertices.iter().find(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(SimError::InvalidMesh(format!("non-finite vertex {p:?}")));
        }
        let count = vertices.len();
        if let Some(tri) = triangles
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= count))
        {
            return Err(SimError::InvalidMesh(format!(
                "triangle {tri:?} references a vertex beyond {count}"
            )));
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// Build a mesh from `N×3` vertex and `M×3` face arrays.
    pub fn from_buffers(vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> Result<Self> {
        Self::new(
            vertices.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect(),
            faces.to_vec(),
        )
    }

    /// A mesh with no geometry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Axis-aligned box spanning `min..max`.
    pub fn cuboid(min: &Point3<f64>, max: &Point3<f64>) -> Result<Self> {
        let size = max - min;
        if size.iter().any(|&s| !(s > 0.0)) {
            return Err(SimError::InvalidMesh(format!("box size {size:?} must be positive")));
        }
        let vertices = (0..8)
            .map(|corner: u32| {
                let x = if corner & 1 == 0 { min.x } else { max.x };
                let y = if corner & 2 == 0 { min.y } else { max.y };
                let z = if corner & 4 == 0 { min.z } else { max.z };
                Point3::new(x, y, z)
            })
            .collect();
        // Corner index bits are (x, y, z); faces wind outward.
        let triangles = vec![
            [0, 3, 1],
            [0, 2, 3],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [1, 3, 7],
            [1, 7, 5],
            [3, 2, 6],
            [3, 6, 7],
            [2, 0, 4],
            [2, 4, 6],
        ];
        Self::new(vertices, triangles)
    }

    /// Cylinder standing on the XY plane, axis along +Z, centered on the Z axis.
    pub fn cylinder(radius: f64, height: f64, segments: u32) -> Result<Self> {
        if !(radius > 0.0 && height > 0.0) || segments < 3 {
            return Err(SimError::InvalidMesh(format!(
                "cylinder r={radius} h={height} with {segments} segments"
            )));
        }
        Ok(Self::from_manifold(&Manifold::cylinder(
            radius, radius, height, segments,
        )))
    }

    pub(crate) fn from_manifold(manifold: &Manifold) -> Self {
        let mesh = manifold.to_mesh();
        let props = (mesh.num_props() as usize).max(3);
        let vertices = mesh
            .vertices()
            .chunks(props)
            .filter(|chunk| chunk.len() >= 3)
            .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect();
        let triangles = mesh
            .indices()
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        Self {
            vertices,
            triangles,
        }
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Triangle vertex indices.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Vertex positions as plain arrays.
    pub fn vertex_buffer(&self) -> Vec<[f64; 3]> {
        self.vertices.iter().map(|p| [p.x, p.y, p.z]).collect()
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner points of one triangle.
    pub fn triangle_points(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Bounding box of the referenced vertices, or `None` when empty.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut points = self.vertices.iter();
        let first = *points.next()?;
        Some(points.fold(Aabb { min: first, max: first }, |acc, p| Aabb {
            min: acc.min.inf(p),
            max: acc.max.sup(p),
        }))
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_points(i);
                (b - a).cross(&(c - a)).norm() / 2.0
            })
            .sum()
    }

    /// Enclosed volume (divergence theorem; meaningful for closed meshes).
    pub fn volume(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_points(i);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    /// Area-weighted mean of the triangle centroids.
    ///
    /// Falls back to the vertex average for meshes without area and to the
    /// origin for empty meshes.
    pub fn centroid(&self) -> Point3<f64> {
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for i in 0..self.triangles.len() {
            let [a, b, c] = self.triangle_points(i);
            let area = (b - a).cross(&(c - a)).norm() / 2.0;
            weighted += (a.coords + b.coords + c.coords) / 3.0 * area;
            total += area;
        }
        if total > 0.0 {
            return Point3::from(weighted / total);
        }
        if self.vertices.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f64> = self.vertices.iter().map(|p| p.coords).sum();
        Point3::from(sum / self.vertices.len() as f64)
    }

    /// Extent of the vertices projected onto `direction` (max − min).
    pub fn span_along(&self, direction: &Vector3<f64>) -> f64 {
        let (lo, hi) = self
            .vertices
            .iter()
            .map(|p| p.coords.dot(direction))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            });
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    /// Apply a transform to every vertex in place.
    pub fn transform(&mut self, t: &Transform) {
        for p in &mut self.vertices {
            *p = t.apply_point(p);
        }
    }

    /// Copy of the mesh with a transform applied.
    pub fn transformed(&self, t: &Transform) -> Self {
        let mut mesh = self.clone();
        mesh.transform(t);
        mesh
    }

    /// Translate every vertex in place.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for p in &mut self.vertices {
            *p += offset;
        }
    }

    /// True if every edge is shared by exactly two triangles with opposite
    /// orientation.
    pub fn is_closed(&self) -> bool {
        if self.triangles.is_empty() {
            return false;
        }
        let mut directed: HashMap<(u32, u32), i32> = HashMap::new();
        for tri in &self.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if a == b {
                    return false;
                }
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }
        directed
            .iter()
            .all(|(&(a, b), &n)| n == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// Merge vertices closer than `tolerance` and drop triangles that
    /// collapse.
    ///
    /// Triangle soups (one vertex triple per face, as read from STL) become
    /// indexed solids.
    pub fn welded(&self, tolerance: f64) -> Self {
        let cell = tolerance.max(f64::EPSILON);
        let key = |p: &Point3<f64>| {
            (
                (p.x / cell).round() as i64,
                (p.y / cell).round() as i64,
                (p.z / cell).round() as i64,
            )
        };

        let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut vertices = Vec::new();
        let remap: Vec<u32> = self
            .vertices
            .iter()
            .map(|p| {
                *lookup.entry(key(p)).or_insert_with(|| {
                    vertices.push(*p);
                    (vertices.len() - 1) as u32
                })
            })
            .collect();

        let triangles = self
            .triangles
            .iter()
            .map(|tri| tri.map(|i| remap[i as usize]))
            .filter(|[a, b, c]| a != b && b != c && c != a)
            .collect();

        Self {
            vertices,
            triangles,
        }
    }

    /// Drop vertices that no triangle references.
    pub fn compacted(&self) -> Self {
        let mut remap: Vec<Option<u32>> = vec![None; self.vertices.len()];
        let mut vertices = Vec::new();
        let triangles = self
            .triangles
            .iter()
            .map(|tri| {
                tri.map(|i| {
                    *remap[i as usize].get_or_insert_with(|| {
                        vertices.push(self.vertices[i as usize]);
                        (vertices.len() - 1) as u32
                    })
                })
            })
            .collect();
        Self {
            vertices,
            triangles,
        }
    }
}
