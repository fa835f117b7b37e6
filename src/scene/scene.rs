use glam::Mat4;

use super::components::{Name, Parent, RenderMesh};
use crate::color::Color;
use crate::light::{AmbientLight, PointLight};
use crate::mesh::Transform;

/// Parent chains deeper than this are treated as broken.
const MAX_DEPTH: usize = 256;

/// Identifies a node in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(hecs::Entity);

impl NodeId {
    pub fn entity(self) -> hecs::Entity {
        self.0
    }
}

/// A mesh node ready to draw, with its resolved world matrix.
#[derive(Clone, Copy, Debug)]
pub struct Drawable {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: RenderMesh,
}

/// Everything the renderer draws, plus how it is lit.
pub struct Scene {
    world: hecs::World,
    background: Color,
    ambient: AmbientLight,
    point_lights: Vec<PointLight>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            background: Color::BLACK,
            ambient: AmbientLight::default(),
            point_lights: Vec::new(),
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }

    pub fn set_ambient(&mut self, light: AmbientLight) {
        self.ambient = light;
    }

    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Adds an empty node. Useful as a root for model parts.
    pub fn add_group(&mut self, name: impl Into<String>, transform: Transform) -> NodeId {
        NodeId(self.world.spawn((Name(name.into()), transform)))
    }

    /// Adds a drawable node.
    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        mesh: RenderMesh,
    ) -> NodeId {
        NodeId(self.world.spawn((Name(name.into()), transform, mesh)))
    }

    /// Parents `child` under `parent`.
    ///
    /// Returns `false` and changes nothing if either node is gone or the link
    /// would form a cycle.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> bool {
        if !self.contains(child) || !self.contains(parent) || self.is_ancestor(child, parent) {
            return false;
        }
        self.world.insert_one(child.0, Parent(parent.0)).is_ok()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.world.contains(node.0)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    /// Removes `node` and everything parented under it.
    ///
    /// Meshes and textures the nodes referenced stay uploaded; their ids
    /// remain valid and can be attached to new nodes.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }

        let doomed: Vec<hecs::Entity> = self
            .world
            .iter()
            .map(|e| e.entity())
            .filter(|&e| self.is_ancestor(node, NodeId(e)))
            .collect();

        for entity in doomed {
            let _ = self.world.despawn(entity);
        }
        true
    }

    pub fn name(&self, node: NodeId) -> Option<String> {
        self.world
            .get::<&Name>(node.0)
            .ok()
            .map(|name| name.0.clone())
    }

    /// First node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.world
            .query::<&Name>()
            .iter()
            .find(|(_, n)| n.0 == name)
            .map(|(e, _)| NodeId(e))
    }

    pub fn transform(&self, node: NodeId) -> Option<Transform> {
        self.world.get::<&Transform>(node.0).ok().map(|t| *t)
    }

    pub fn set_transform(&mut self, node: NodeId, transform: Transform) -> bool {
        match self.world.get::<&mut Transform>(node.0) {
            Ok(mut t) => {
                *t = transform;
                true
            }
            Err(_) => false,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.world
            .get::<&Parent>(node.0)
            .ok()
            .map(|p| NodeId(p.0))
            .filter(|&p| self.contains(p))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.world
            .query::<&Parent>()
            .iter()
            .filter(|(_, p)| p.0 == node.0)
            .map(|(e, _)| NodeId(e))
            .collect()
    }

    /// Local-to-world matrix: the product of the parent chain.
    pub fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        let mut matrix = self.transform(node)?.matrix();
        let mut current = node;

        for _ in 0..MAX_DEPTH {
            match self.parent(current) {
                Some(parent) => {
                    let local = self.transform(parent).unwrap_or_default();
                    matrix = local.matrix() * matrix;
                    current = parent;
                }
                None => return Some(matrix),
            }
        }

        log::warn!("parent chain of {:?} exceeds {} levels", node, MAX_DEPTH);
        Some(matrix)
    }

    /// Every drawable node with its world matrix.
    pub fn drawables(&self) -> Vec<Drawable> {
        let nodes: Vec<(hecs::Entity, RenderMesh)> = self
            .world
            .query::<&RenderMesh>()
            .iter()
            .map(|(e, m)| (e, *m))
            .collect();

        nodes
            .into_iter()
            .filter_map(|(e, mesh)| {
                let node = NodeId(e);
                self.world_matrix(node).map(|world| Drawable { node, world, mesh })
            })
            .collect()
    }

    /// `true` if `ancestor` is `node` or appears in its parent chain.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        for _ in 0..=MAX_DEPTH {
            match current {
                Some(n) if n == ancestor => return true,
                Some(n) => current = self.parent(n),
                None => return false,
            }
        }
        false
    }
}
