//! # diorama
//!
//! **A small native scene viewer: models, lights, extruded text and labels
//! pinned to the screen.**
//!
//! A window, a lit scene graph and orbit controls come ready; setup code
//! places the camera and requests assets, and each load finishes with a
//! continuation that gets `&mut AppContext`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use diorama::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     run(AppConfig::from_env().title("diorama"), |ctx| {
//!         ctx.scene.set_background(Color::hex(0xbfe3dd));
//!         ctx.set_camera(PerspectiveCamera::new(45.0, 1.0).at(Vec3::new(0.0, 1.0, 10.0)));
//!         ctx.scene.add_point_light(PointLight::new(Color::WHITE, 20.0, 100.0).at(Vec3::new(50.0, 30.0, 50.0)));
//!
//!         ctx.add_model_file("3dpea.glb", Transform::new());
//!         ctx.load_typeface("helvetiker_regular.typeface.json", |ctx, font| {
//!             if let Ok(font) = font {
//!                 ctx.add_text(
//!                     &font,
//!                     "Hello!",
//!                     &TextGeometryParams::default(),
//!                     Material::standard(Color::hex(0x00ff00)),
//!                     Transform::from_position(Vec3::new(-5.0, 0.0, 0.0)),
//!                 );
//!             }
//!         });
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`Scene`] holds nodes, meshes, lights and the background.
//! - [`ModelData`], [`Typeface`] and [`text_geometry`] turn files into
//!   triangle geometry off the GPU.
//! - [`OverlayElement`] and [`ScreenProjector`] place 2D labels over the scene.
//! - [`SceneRenderer`] is the GPU seam; [`Renderer`] draws with wgpu.

mod app;
mod assets;
mod camera;
mod color;
mod controls;
mod draw2d;
mod geometry;
mod gpu;
mod input;
mod light;
mod loader;
mod material;
mod mesh;
mod mesh_pass;
mod model;
mod overlay;
mod projection;
mod render_loop;
mod renderer;
pub mod scene;
mod shape;
mod text_geometry;
mod texture;
mod typeface;

pub use app::{ASSET_DIR_ENV, AppConfig, AppContext, AppEvent, run};
pub use assets::{FontAtlas, FontAtlasData, FontMetrics, GlyphInfo, Packing, pack_rows};
pub use camera::PerspectiveCamera;
pub use color::Color;
pub use controls::OrbitControls;
pub use draw2d::{Draw2d, GlyphQuad, LabelLayout, LabelStyle, Rect, layout_label};
pub use geometry::{LoadError, RawGeometry};
pub use gpu::{DEPTH_FORMAT, GpuContext, GpuError};
pub use input::Input;
pub use light::{AmbientLight, MAX_POINT_LIGHTS, PointLight};
pub use loader::{
    Asset, AssetKind, AssetLoader, CompletionSink, LoadOutcome, RequestId, load_asset,
};
pub use material::Material;
pub use mesh::{Mesh, Transform, Vertex3d};
pub use model::{ModelData, ModelPart, PartMaterial};
pub use overlay::{OverlayAnchor, OverlayElement};
pub use projection::{
    Ndc, ScreenPoint, ScreenProjector, Viewport, css_transform, ndc_to_pixels, overlay_bias,
    project_to_ndc,
};
pub use render_loop::{LoopHandle, RenderLoop, Tick};
pub use renderer::{Renderer, SceneRenderer};
pub use scene::{MeshId, NodeId, Scene, TextureId};
pub use shape::Shape;
pub use text_geometry::{TextGeometryParams, extrude, text_geometry, text_shapes};
pub use texture::{Texture, Wrap};
pub use typeface::{FontError, Glyph, PathCommand, Typeface};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
