use crate::material::Material;

/// Handle to a mesh uploaded through a [`SceneRenderer`](crate::SceneRenderer).
///
/// A newtype so a texture index can't be passed where a mesh is expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to a texture uploaded through a [`SceneRenderer`](crate::SceneRenderer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

impl MeshId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Makes a node drawable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderMesh {
    pub mesh: MeshId,
    pub material: Material,
}

impl RenderMesh {
    pub fn new(mesh: MeshId, material: Material) -> Self {
        Self { mesh, material }
    }
}

/// Places a node in another node's space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub hecs::Entity);

/// Human-readable node name, used in logs and lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);
