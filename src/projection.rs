//! World-to-screen projection for screen-anchored overlays.
//!
//! A world point goes through three steps:
//!
//! 1. [`project_to_ndc`]: view-projection transform and perspective divide,
//!    giving normalized device coordinates in `[-1, 1]` on x and y.
//! 2. [`ndc_to_pixels`]: scale by half the viewport and offset by its center.
//!    Pixel y grows downward, so NDC y is flipped.
//! 3. [`overlay_bias`]: a constant nudge of `(+w/20, -h/20)` so the overlay
//!    does not sit dead-center on its anchor.
//!
//! [`ScreenProjector`] runs all three and [`css_transform`] renders the
//! result as the positioning string the overlay carries.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;

/// Clip-space `w` values below this are treated as zero-distance.
///
/// `w` is the view-space depth of the point, so anything this close to the
/// camera plane is far in front of the near plane and cannot be projected.
const DEGENERATE_W: f32 = 1e-4;

/// The pixel rectangle the scene is rasterized into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    /// Returns `None` for a zero-sized viewport (e.g. a minimized window).
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    /// Like [`new`](Self::new), but zero sides become one pixel.
    pub fn clamped(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn center(&self) -> Vec2 {
        self.size() * 0.5
    }
}

/// A point in normalized device coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ndc {
    pub position: Vec3,
    /// The point was at zero distance from the camera plane. `position` is
    /// then the origin rather than a division by zero.
    pub degenerate: bool,
}

impl Ndc {
    pub fn xy(&self) -> Vec2 {
        self.position.truncate()
    }
}

/// Result of projecting a world point all the way to pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub ndc: Ndc,
    /// Pixel position including the overlay bias.
    pub pixel: Vec2,
}

/// Transforms `point` by the camera's view-projection and divides by `w`.
pub fn project_to_ndc(point: Vec3, camera: &PerspectiveCamera) -> Ndc {
    let clip = camera.to_clip(point);

    if !clip.is_finite() || clip.w.abs() < DEGENERATE_W {
        return Ndc {
            position: Vec3::ZERO,
            degenerate: true,
        };
    }

    Ndc {
        position: clip.truncate() / clip.w,
        degenerate: false,
    }
}

/// Maps NDC x/y into viewport pixels, origin top-left.
pub fn ndc_to_pixels(ndc: Vec2, viewport: Viewport) -> Vec2 {
    let half = viewport.center();
    Vec2::new(ndc.x * half.x + half.x, -(ndc.y * half.y) + half.y)
}

/// Offset applied on top of the projected position: right by a twentieth of
/// the width, up by a twentieth of the height.
pub fn overlay_bias(viewport: Viewport) -> Vec2 {
    let size = viewport.size();
    Vec2::new(size.x / 20.0, -size.y / 20.0)
}

/// Renders a pixel position as the overlay's positioning transform.
///
/// The leading `translate(-50%, -50%)` centers the element on the point.
pub fn css_transform(pixel: Vec2) -> String {
    format!("translate(-50%, -50%) translate({}px, {}px)", pixel.x, pixel.y)
}

/// Projects world points to biased pixel coordinates.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScreenProjector;

impl ScreenProjector {
    pub fn new() -> Self {
        Self
    }

    pub fn project(
        &self,
        point: Vec3,
        camera: &PerspectiveCamera,
        viewport: Viewport,
    ) -> ScreenPoint {
        let ndc = project_to_ndc(point, camera);
        ScreenPoint {
            ndc,
            pixel: self.place(ndc.xy(), viewport),
        }
    }

    /// Pixel position for an already-projected NDC point.
    pub fn place(&self, ndc: Vec2, viewport: Viewport) -> Vec2 {
        ndc_to_pixels(ndc, viewport) + overlay_bias(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(w: u32, h: u32) -> Viewport {
        Viewport::new(w, h).unwrap()
    }

    #[test]
    fn clamped_viewport_is_never_empty() {
        let vp = Viewport::clamped(0, 600);
        assert_eq!((vp.width(), vp.height()), (1, 600));
    }

    #[test]
    fn zero_sized_viewport_is_rejected() {
        assert!(Viewport::new(0, 600).is_none());
        assert!(Viewport::new(800, 0).is_none());
        assert!(Viewport::new(800, 600).is_some());
    }

    #[test]
    fn camera_own_position_projects_to_origin() {
        let vp = viewport(800, 600);
        let camera = PerspectiveCamera::new(50.0, vp.aspect());

        let ndc = project_to_ndc(camera.world_position(), &camera);
        assert!(ndc.degenerate);
        assert_eq!(ndc.xy(), Vec2::ZERO);

        // Also when the camera sits away from the origin.
        let moved = PerspectiveCamera::new(45.0, vp.aspect())
            .at(Vec3::new(0.0, 1.0, 10.0))
            .looking_at(Vec3::ZERO);
        let ndc = project_to_ndc(moved.world_position(), &moved);
        assert!(ndc.degenerate);
        assert!(ndc.position.is_finite());
    }

    #[test]
    fn degenerate_projection_lands_at_biased_center() {
        let vp = viewport(800, 600);
        let camera = PerspectiveCamera::new(45.0, vp.aspect())
            .at(Vec3::new(0.0, 1.0, 10.0))
            .looking_at(Vec3::ZERO);

        let point = ScreenProjector::new().project(camera.world_position(), &camera, vp);
        assert_eq!(point.pixel, Vec2::new(400.0 + 40.0, 300.0 - 30.0));
    }

    #[test]
    fn point_in_front_projects_inside_unit_square() {
        let camera = PerspectiveCamera::new(45.0, 4.0 / 3.0)
            .at(Vec3::new(0.0, 0.0, 10.0))
            .looking_at(Vec3::ZERO);
        let ndc = project_to_ndc(Vec3::new(1.0, 1.0, 0.0), &camera);

        assert!(!ndc.degenerate);
        assert!(ndc.position.x > 0.0 && ndc.position.x < 1.0);
        assert!(ndc.position.y > 0.0 && ndc.position.y < 1.0);
        assert!(ndc.position.z > 0.0 && ndc.position.z < 1.0);
    }

    #[test]
    fn ndc_corners_map_to_viewport_corners() {
        let vp = viewport(800, 600);
        assert_eq!(ndc_to_pixels(Vec2::new(-1.0, 1.0), vp), Vec2::new(0.0, 0.0));
        assert_eq!(ndc_to_pixels(Vec2::new(1.0, -1.0), vp), Vec2::new(800.0, 600.0));
        assert_eq!(ndc_to_pixels(Vec2::ZERO, vp), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn doubling_width_doubles_pixel_x() {
        let projector = ScreenProjector::new();
        let ndc = Vec2::new(0.3, -0.2);

        let narrow = projector.place(ndc, viewport(800, 600));
        let wide = projector.place(ndc, viewport(1600, 600));

        assert!((wide.x - 2.0 * narrow.x).abs() < 1e-3);
        assert_eq!(wide.y, narrow.y);
    }

    #[test]
    fn bias_moves_right_and_up() {
        let bias = overlay_bias(viewport(1000, 500));
        assert_eq!(bias, Vec2::new(50.0, -25.0));
    }

    #[test]
    fn css_transform_embeds_both_values() {
        assert_eq!(
            css_transform(Vec2::new(440.0, 270.5)),
            "translate(-50%, -50%) translate(440px, 270.5px)"
        );
    }
}
