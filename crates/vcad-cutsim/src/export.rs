//! Writing final results.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, SimError};
use crate::frame::CuttingTable;
use crate::mesh::TriMesh;

/// Destination for the final workpiece and cutting-parameter table.
pub trait ArtifactSink {
    /// Persist the run's artifacts.
    fn export(&mut self, workpiece: &TriMesh, table: &CuttingTable) -> Result<()>;
}

/// Writes `workpiece.json` and `cutting_parameters.json` into a directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactSink {
    directory: PathBuf,
}

impl JsonArtifactSink {
    /// File name of the exported mesh.
    pub const WORKPIECE_FILE: &'static str = "workpiece.json";
    /// File name of the exported table.
    pub const TABLE_FILE: &'static str = "cutting_parameters.json";

    /// Sink writing into `directory`, created on first export.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ArtifactSink for JsonArtifactSink {
    fn export(&mut self, workpiece: &TriMesh, table: &CuttingTable) -> Result<()> {
        let io = |path: &Path, e: std::io::Error| SimError::Export(format!("{}: {e}", path.display()));

        fs::create_dir_all(&self.directory).map_err(|e| io(&self.directory, e))?;

        let mesh_path = self.directory.join(Self::WORKPIECE_FILE);
        let mesh_json =
            serde_json::to_string(workpiece).map_err(|e| SimError::Export(e.to_string()))?;
        fs::write(&mesh_path, mesh_json).map_err(|e| io(&mesh_path, e))?;

        let table_path = self.directory.join(Self::TABLE_FILE);
        let table_json = table.to_json().map_err(|e| SimError::Export(e.to_string()))?;
        fs::write(&table_path, table_json).map_err(|e| io(&table_path, e))?;

        info!(
            directory = %self.directory.display(),
            rows = table.len(),
            faces = workpiece.face_count(),
            "artifacts exported"
        );
        Ok(())
    }
}
