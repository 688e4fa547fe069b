//! Mesh simplification using quadric error metrics.
//!
//! Edges are collapsed cheapest-first until the face budget is met. A
//! collapse is skipped when it would pinch the surface (more than two
//! shared neighbours) or flip a surrounding face, so closed solids stay
//! closed and remain valid Boolean operands.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

use crate::mesh::TriMesh;

/// Smallest face count a closed mesh can be reduced to.
const MIN_FACES: usize = 4;
/// Faces whose normal turns by more than this (cosine) veto a collapse.
const MIN_NORMAL_COSINE: f64 = 0.2;

/// Simplify `mesh` if it has more than `max_faces` triangles.
///
/// The target is `max_faces · ratio` triangles. Meshes at or below the
/// threshold are returned unchanged.
pub fn simplify(mesh: &TriMesh, max_faces: usize, ratio: f64) -> TriMesh {
    if mesh.face_count() <= max_faces {
        return mesh.clone();
    }
    let target = ((max_faces as f64 * ratio) as usize).max(MIN_FACES);
    let simplified = decimate(mesh, target);
    tracing::debug!(
        "simplified mesh from {} to {} faces",
        mesh.face_count(),
        simplified.face_count()
    );
    simplified
}

#[derive(PartialEq)]
struct EdgeEntry {
    cost: f64,
    v0: u32,
    v1: u32,
    stamp: (u32, u32),
    target: Point3<f64>,
}

impl Eq for EdgeEntry {}

impl Ord for EdgeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; ties resolve by vertex ids.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (other.v0, other.v1).cmp(&(self.v0, self.v1)))
    }
}

impl PartialOrd for EdgeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Collapser {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Matrix4<f64>>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    versions: Vec<u32>,
    live_faces: usize,
}

impl Collapser {
    fn new(mesh: &TriMesh) -> Self {
        let positions = mesh.vertices().to_vec();
        let faces = mesh.triangles().to_vec();
        let mut quadrics = vec![Matrix4::zeros(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];

        for (f, tri) in faces.iter().enumerate() {
            let q = face_quadric(&positions, tri);
            for &v in tri {
                quadrics[v as usize] += q;
                vertex_faces[v as usize].push(f);
            }
        }

        Self {
            versions: vec![0; positions.len()],
            face_alive: vec![true; faces.len()],
            live_faces: faces.len(),
            positions,
            quadrics,
            faces,
            vertex_faces,
        }
    }

    fn neighbours(&self, v: u32) -> BTreeSet<u32> {
        self.vertex_faces[v as usize]
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&u| u != v)
            .collect()
    }

    fn entry(&self, v0: u32, v1: u32) -> EdgeEntry {
        let q = self.quadrics[v0 as usize] + self.quadrics[v1 as usize];
        let p0 = self.positions[v0 as usize];
        let p1 = self.positions[v1 as usize];

        let mut candidates = vec![p0, p1, nalgebra::center(&p0, &p1)];
        if let Some(optimal) = optimal_point(&q) {
            // Stay near the edge; far-away optima come from flat regions.
            if (optimal - p0).norm() <= 2.0 * (p1 - p0).norm() {
                candidates.insert(0, optimal);
            }
        }
        let (target, cost) = candidates
            .into_iter()
            .map(|p| (p, quadric_error(&q, &p)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .unwrap_or((p0, f64::INFINITY));

        EdgeEntry {
            cost,
            v0,
            v1,
            stamp: (self.versions[v0 as usize], self.versions[v1 as usize]),
            target,
        }
    }

    fn is_current(&self, entry: &EdgeEntry) -> bool {
        entry.stamp
            == (
                self.versions[entry.v0 as usize],
                self.versions[entry.v1 as usize],
            )
    }

    fn can_collapse(&self, v0: u32, v1: u32, target: &Point3<f64>) -> bool {
        let shared_faces = self.vertex_faces[v0 as usize]
            .iter()
            .filter(|&&f| self.faces[f].contains(&v1))
            .count();
        if shared_faces != 2 || self.live_faces < MIN_FACES + shared_faces {
            return false;
        }

        let common = self
            .neighbours(v0)
            .intersection(&self.neighbours(v1))
            .count();
        if common != 2 {
            return false;
        }

        for &v in &[v0, v1] {
            for &f in &self.vertex_faces[v as usize] {
                let tri = self.faces[f];
                if tri.contains(&v0) && tri.contains(&v1) {
                    continue;
                }
                let before = triangle_normal(&self.positions, &tri, None);
                let after = triangle_normal(&self.positions, &tri, Some((v, target)));
                match (before, after) {
                    (Some(n0), Some(n1)) if n0.dot(&n1) >= MIN_NORMAL_COSINE => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Merge `v1` into `v0` at `target`.
    fn collapse(&mut self, v0: u32, v1: u32, target: Point3<f64>) {
        let moved = std::mem::take(&mut self.vertex_faces[v1 as usize]);
        for f in moved {
            if self.faces[f].contains(&v0) {
                self.face_alive[f] = false;
                self.live_faces -= 1;
                for u in self.faces[f] {
                    if u != v1 {
                        self.vertex_faces[u as usize].retain(|&g| g != f);
                    }
                }
            } else {
                for v in &mut self.faces[f] {
                    if *v == v1 {
                        *v = v0;
                    }
                }
                self.vertex_faces[v0 as usize].push(f);
            }
        }

        self.positions[v0 as usize] = target;
        let q1 = self.quadrics[v1 as usize];
        self.quadrics[v0 as usize] += q1;
        self.versions[v0 as usize] += 1;
        self.versions[v1 as usize] += 1;
    }

    fn into_mesh(self) -> TriMesh {
        let triangles = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .map(|(tri, _)| *tri)
            .collect();
        // Indices are in range by construction.
        TriMesh::new(self.positions, triangles)
            .map(|mesh| mesh.compacted())
            .unwrap_or_default()
    }
}

/// Collapse edges until at most `target_faces` triangles remain or no
/// further collapse is allowed.
pub fn decimate(mesh: &TriMesh, target_faces: usize) -> TriMesh {
    let mut state = Collapser::new(mesh);

    let mut edges = BTreeSet::new();
    for tri in mesh.triangles() {
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            edges.insert(if a < b { (a, b) } else { (b, a) });
        }
    }
    let mut heap: BinaryHeap<EdgeEntry> =
        edges.into_iter().map(|(a, b)| state.entry(a, b)).collect();

    while state.live_faces > target_faces {
        let Some(entry) = heap.pop() else {
            break;
        };
        if !state.is_current(&entry) || !entry.cost.is_finite() {
            continue;
        }
        if !state.can_collapse(entry.v0, entry.v1, &entry.target) {
            continue;
        }

        state.collapse(entry.v0, entry.v1, entry.target);
        // Links of the surrounding edges changed too.
        for n in state.neighbours(entry.v0) {
            for m in state.neighbours(n) {
                heap.push(state.entry(n.min(m), n.max(m)));
            }
        }
    }

    state.into_mesh()
}

fn face_quadric(positions: &[Point3<f64>], tri: &[u32; 3]) -> Matrix4<f64> {
    let [a, b, c] = (*tri).map(|i| positions[i as usize]);
    let n = (b - a).cross(&(c - a));
    let area = n.norm();
    if area <= f64::EPSILON {
        return Matrix4::zeros();
    }
    let n = n / area;
    let plane = Vector4::new(n.x, n.y, n.z, -n.dot(&a.coords));
    plane * plane.transpose() * area
}

fn quadric_error(q: &Matrix4<f64>, p: &Point3<f64>) -> f64 {
    let v = p.to_homogeneous();
    (v.transpose() * q * v)[(0, 0)].max(0.0)
}

fn optimal_point(q: &Matrix4<f64>) -> Option<Point3<f64>> {
    let a: Matrix3<f64> = q.fixed_view::<3, 3>(0, 0).into_owned();
    let b = Vector3::new(q[(0, 3)], q[(1, 3)], q[(2, 3)]);
    if a.determinant().abs() < 1e-12 {
        return None;
    }
    a.try_inverse().map(|inv| Point3::from(-(inv * b)))
}

fn triangle_normal(
    positions: &[Point3<f64>],
    tri: &[u32; 3],
    replace: Option<(u32, &Point3<f64>)>,
) -> Option<Vector3<f64>> {
    let [a, b, c] = (*tri).map(|i| match replace {
        Some((v, p)) if v == i => *p,
        _ => positions[i as usize],
    });
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    (len > 1e-12).then(|| n / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Closed box whose faces are subdivided into an `n×n` grid each.
    fn tessellated_box(n: u32) -> TriMesh {
        let mut vertices: Vec<[f64; 3]> = Vec::new();
        let mut faces = Vec::new();
        let (lo, hi) = (0.0, 10.0);
        let step = (hi - lo) / n as f64;

        // (fixed axis, value, u axis, v axis, flip)
        let sides = [
            (2, lo, 0, 1, true),
            (2, hi, 0, 1, false),
            (1, lo, 0, 2, false),
            (1, hi, 0, 2, true),
            (0, lo, 1, 2, true),
            (0, hi, 1, 2, false),
        ];
        for (axis, value, u, v, flip) in sides {
            let base = vertices.len() as u32;
            for j in 0..=n {
                for i in 0..=n {
                    let mut p = [0.0; 3];
                    p[axis] = value;
                    p[u] = lo + i as f64 * step;
                    p[v] = lo + j as f64 * step;
                    vertices.push(p);
                }
            }
            let idx = |i: u32, j: u32| base + j * (n + 1) + i;
            for j in 0..n {
                for i in 0..n {
                    let (a, b, c, d) = (idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1));
                    if flip {
                        faces.push([a, c, b]);
                        faces.push([a, d, c]);
                    } else {
                        faces.push([a, b, c]);
                        faces.push([a, c, d]);
                    }
                }
            }
        }
        TriMesh::from_buffers(&vertices, &faces).unwrap().welded(1e-9)
    }

    #[test]
    fn test_tessellated_box_is_closed() {
        let mesh = tessellated_box(6);
        assert!(mesh.is_closed());
        assert_eq!(mesh.face_count(), 6 * 6 * 6 * 2);
        assert_relative_eq!(mesh.volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_decimate_flat_box_keeps_shape() {
        let mesh = tessellated_box(8);
        let reduced = decimate(&mesh, 100);

        assert!(reduced.face_count() <= 100);
        assert!(reduced.is_closed());
        // Planar regions collapse without moving the surface.
        assert_relative_eq!(reduced.volume(), 1000.0, epsilon = 1e-6);
        let b = reduced.bounds().unwrap();
        assert_relative_eq!(b.size().x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_simplify_threshold() {
        let mesh = tessellated_box(4); // 192 faces
        assert_eq!(simplify(&mesh, 200, 0.5), mesh);

        let reduced = simplify(&mesh, 100, 0.5);
        assert!(reduced.face_count() <= 50);
        assert!(reduced.is_closed());
    }

    #[test]
    fn test_never_below_tetrahedron() {
        let mesh = tessellated_box(2);
        let reduced = decimate(&mesh, 0);
        assert!(reduced.face_count() >= MIN_FACES);
        assert!(reduced.is_closed());
    }

    #[test]
    fn test_edge_entry_min_heap() {
        let make = |cost| EdgeEntry {
            cost,
            v0: 0,
            v1: 1,
            stamp: (0, 0),
            target: Point3::origin(),
        };
        let mut heap = BinaryHeap::new();
        heap.push(make(3.0));
        heap.push(make(1.0));
        heap.push(make(2.0));
        assert_eq!(heap.pop().unwrap().cost, 1.0);
    }
}
