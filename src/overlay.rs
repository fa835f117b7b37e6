//! Screen-space labels anchored to points in the 3D scene.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::projection::{ScreenProjector, Viewport, css_transform};
use crate::scene::{NodeId, Scene};

/// What an overlay element tracks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlayAnchor {
    /// The camera's own world position. This always projects to the (biased)
    /// viewport center.
    CameraPosition,
    /// A fixed world point.
    Point(Vec3),
    /// The world position of a scene node.
    Node(NodeId),
}

/// A 2D element positioned over the scene.
///
/// The position is never nudged incrementally: every call to
/// [`update_position`](Self::update_position) recomputes it from the current
/// camera, viewport and anchor.
#[derive(Clone, Debug)]
pub struct OverlayElement {
    pub id: String,
    pub text: String,
    pub anchor: OverlayAnchor,
    screen_position: Option<Vec2>,
    transform: String,
}

impl OverlayElement {
    pub fn new(id: impl Into<String>, text: impl Into<String>, anchor: OverlayAnchor) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            anchor,
            screen_position: None,
            transform: String::new(),
        }
    }

    /// Pixel position of the element's center, once computed.
    pub fn screen_position(&self) -> Option<Vec2> {
        self.screen_position
    }

    /// The positioning transform, e.g.
    /// `translate(-50%, -50%) translate(440px, 270px)`. Empty until the first
    /// update.
    pub fn transform(&self) -> &str {
        &self.transform
    }

    /// World position the anchor currently resolves to.
    ///
    /// A node anchor whose node was removed falls back to the camera.
    pub fn anchor_point(&self, camera: &PerspectiveCamera, scene: &Scene) -> Vec3 {
        match self.anchor {
            OverlayAnchor::CameraPosition => camera.world_position(),
            OverlayAnchor::Point(p) => p,
            OverlayAnchor::Node(node) => scene
                .world_matrix(node)
                .map(|m| m.w_axis.truncate())
                .unwrap_or_else(|| camera.world_position()),
        }
    }

    /// Re-projects the anchor and refreshes the stored position and transform.
    pub fn update_position(
        &mut self,
        camera: &PerspectiveCamera,
        viewport: Viewport,
        scene: &Scene,
    ) -> Vec2 {
        let point = self.anchor_point(camera, scene);
        let projected = ScreenProjector::new().project(point, camera, viewport);

        self.screen_position = Some(projected.pixel);
        self.transform = css_transform(projected.pixel);
        log::debug!("overlay '{}' -> {}", self.id, self.transform);
        projected.pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Transform;

    #[test]
    fn transform_is_empty_until_positioned() {
        let overlay = OverlayElement::new("text-box", "Hello", OverlayAnchor::CameraPosition);
        assert!(overlay.transform().is_empty());
        assert!(overlay.screen_position().is_none());
    }

    #[test]
    fn camera_anchor_sits_at_biased_center() {
        let scene = Scene::new();
        let vp = Viewport::new(800, 600).unwrap();
        let camera = PerspectiveCamera::new(45.0, vp.aspect()).at(Vec3::new(0.0, 1.0, 10.0));
        let mut overlay = OverlayElement::new("text-box", "Hello", OverlayAnchor::CameraPosition);

        let pixel = overlay.update_position(&camera, vp, &scene);

        assert_eq!(pixel, Vec2::new(440.0, 270.0));
        assert_eq!(
            overlay.transform(),
            "translate(-50%, -50%) translate(440px, 270px)"
        );
    }

    #[test]
    fn node_anchor_follows_node_world_position() {
        let mut scene = Scene::new();
        let node = scene.add_group("text", Transform::from_position(Vec3::new(-5.0, 0.0, 0.0)));
        let vp = Viewport::new(800, 600).unwrap();
        let camera = PerspectiveCamera::new(45.0, vp.aspect())
            .at(Vec3::new(0.0, 0.0, 10.0))
            .looking_at(Vec3::ZERO);

        let mut overlay = OverlayElement::new("label", "Text", OverlayAnchor::Node(node));
        let pixel = overlay.update_position(&camera, vp, &scene);

        // Left of center, but never off the left edge for this setup.
        assert!(pixel.x < 440.0);
        assert!(pixel.x > 0.0);
    }

    #[test]
    fn missing_node_falls_back_to_camera() {
        let mut scene = Scene::new();
        let node = scene.add_group("gone", Transform::new());
        scene.remove(node);

        let camera = PerspectiveCamera::new(45.0, 1.0).at(Vec3::new(1.0, 2.0, 3.0));
        let overlay = OverlayElement::new("label", "Text", OverlayAnchor::Node(node));
        let point = overlay.anchor_point(&camera, &scene);
        assert!((point - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);
    }
}
