//! Mesh Booleans between workpiece and tool.
//!
//! Solids go through manifold in single precision and come back as fresh
//! [`TriMesh`] values; inputs are never modified.

use manifold_rs::{Manifold, Mesh};

use crate::error::{Result, SimError};
use crate::mesh::TriMesh;

/// Volume common to `a` and `b`. Empty when they do not overlap.
pub fn intersection(a: &TriMesh, b: &TriMesh) -> Result<TriMesh> {
    if a.is_empty() || b.is_empty() {
        return Ok(TriMesh::empty());
    }
    let (ma, mb) = (to_manifold(a)?, to_manifold(b)?);
    Ok(TriMesh::from_manifold(&ma.intersection(&mb)))
}

/// `a` with the volume of `b` removed.
pub fn difference(a: &TriMesh, b: &TriMesh) -> Result<TriMesh> {
    if a.is_empty() {
        return Ok(TriMesh::empty());
    }
    if b.is_empty() {
        return Ok(a.clone());
    }
    let (ma, mb) = (to_manifold(a)?, to_manifold(b)?);
    Ok(TriMesh::from_manifold(&ma.difference(&mb)))
}

fn to_manifold(mesh: &TriMesh) -> Result<Manifold> {
    if !mesh.is_closed() {
        return Err(SimError::GeometryOperationFailure(format!(
            "mesh with {} faces is not a closed solid",
            mesh.face_count()
        )));
    }
    let vertices: Vec<f32> = mesh
        .vertices()
        .iter()
        .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let indices: Vec<u32> = mesh.triangles().iter().flatten().copied().collect();

    let manifold = Manifold::from_mesh(Mesh::new(&vertices, &indices));
    // Manifold rejects invalid input by returning an empty solid.
    if manifold.is_empty() {
        return Err(SimError::GeometryOperationFailure(format!(
            "mesh with {} faces was rejected by the Boolean kernel",
            mesh.face_count()
        )));
    }
    Ok(manifold)
}
