//! The scene graph: nodes, meshes, lights and the background.
//!
//! Nodes are `hecs` entities. Every node carries a local
//! [`Transform`](crate::Transform) and a [`Name`]; nodes with a
//! [`RenderMesh`] are drawn, and a [`Parent`] link places a node in its
//! parent's space.
//!
//! # Example
//!
//! ```
//! use diorama::{Color, Material, Scene, Transform, Vec3};
//!
//! let mut scene = Scene::new();
//! scene.set_background(Color::hex(0xbfe3dd));
//!
//! let root = scene.add_group("poly", Transform::new().uniform_scale(100.0));
//! let child = scene.add_group("part", Transform::from_position(Vec3::X));
//! scene.attach(child, root);
//!
//! let world = scene.world_matrix(child).unwrap();
//! assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(100.0, 0.0, 0.0));
//! ```

mod components;
#[allow(clippy::module_inception)]
mod scene;

pub use components::{MeshId, Name, Parent, RenderMesh, TextureId};
pub use scene::{Drawable, NodeId, Scene};
