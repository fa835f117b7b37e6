//! CPU-side triangle geometry and the errors raised while loading it.
//!
//! [`RawGeometry`] is what every loader produces (glTF parts, STL files,
//! extruded text) before it is handed to a renderer for upload.

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};

/// Why an asset could not be loaded.
#[derive(Debug)]
pub enum LoadError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No loader for this file extension.
    UnsupportedFormat(String),
    /// The file was read but its contents are invalid.
    Parse { path: PathBuf, message: String },
    /// The file parsed but contains no triangles.
    EmptyModel(PathBuf),
}

impl LoadError {
    pub fn parse(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        LoadError::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            LoadError::UnsupportedFormat(ext) => write!(f, "unsupported asset format: '{}'", ext),
            LoadError::Parse { path, message } => {
                write!(f, "failed to parse '{}': {}", path.display(), message)
            }
            LoadError::EmptyModel(path) => write!(f, "'{}' contains no meshes", path.display()),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Lower-cased extension of `path`, or an empty string.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Triangle geometry before GPU upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex3d>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned `(min, max)`, or `None` without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Smooth normals: area-weighted average of adjacent face normals.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0; 3];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face = (p1 - p0).cross(p2 - p0);

            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    pub fn upload(&self, gpu: &GpuContext) -> Mesh {
        Mesh::new(gpu, &self.vertices, &self.indices)
    }

    /// Parses binary or ASCII STL. Faces keep their stored normal.
    pub fn from_stl<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        path: &Path,
    ) -> Result<Self, LoadError> {
        let stl = stl_io::read_stl(reader).map_err(|e| LoadError::parse(path, e))?;

        let mut geometry = RawGeometry::default();
        for face in &stl.faces {
            let normal: [f32; 3] = face.normal.into();
            let base = geometry.vertices.len() as u32;
            for &index in &face.vertices {
                let position: [f32; 3] = stl.vertices[index].into();
                geometry
                    .vertices
                    .push(Vertex3d::new(position, normal, [0.0, 0.0]));
            }
            geometry
                .indices
                .extend_from_slice(&[base, base + 1, base + 2]);
        }

        if geometry.is_empty() {
            return Err(LoadError::EmptyModel(path.to_path_buf()));
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> RawGeometry {
        RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn bounds_of_empty_geometry() {
        assert!(RawGeometry::default().bounds().is_none());
    }

    #[test]
    fn bounds_cover_every_vertex() {
        let (min, max) = triangle().bounds().unwrap();
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn recalculated_normals_face_ccw_side() {
        let mut geom = triangle();
        for v in &mut geom.vertices {
            v.normal = [1.0, 0.0, 0.0];
        }
        geom.recalculate_normals();
        assert_eq!(geom.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn garbage_stl_is_a_parse_error() {
        let mut cursor = std::io::Cursor::new(b"not an stl".to_vec());
        let err = RawGeometry::from_stl(&mut cursor, Path::new("bad.stl")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. } | LoadError::EmptyModel(_)));
    }

    #[test]
    fn errors_name_the_file() {
        let err = LoadError::io(
            "poly.glb",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("poly.glb"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
