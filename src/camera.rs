use glam::{Mat4, Vec3, Vec4};

/// A perspective camera: projection parameters plus a pose.
///
/// The pose is a position looking at a target. The projection follows the
/// usual right-handed, depth `0..1` convention that wgpu expects.
///
/// # Example
/// ```
/// use diorama::{PerspectiveCamera, Vec3};
///
/// let camera = PerspectiveCamera::new(45.0, 800.0 / 600.0)
///     .at(Vec3::new(0.0, 1.0, 10.0))
///     .looking_at(Vec3::ZERO);
/// assert_eq!(camera.world_position(), Vec3::new(0.0, 1.0, 10.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new(fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            fov_y: fov_y_degrees,
            aspect,
            ..Default::default()
        }
    }

    /// Moves the camera, keeping its viewing direction.
    pub fn at(mut self, position: Vec3) -> Self {
        let forward = self.forward();
        self.position = position;
        self.target = position + forward;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Updates the aspect ratio. The projection matrix is derived on demand,
    /// so the new aspect applies to every projection made after this call.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Unit vector from the position toward the target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        let up = if self.forward().cross(self.up).length_squared() < 1e-8 {
            // Looking straight along `up`; pick any perpendicular axis.
            Vec3::Z
        } else {
            self.up
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera-to-world transform (the inverse of the view matrix).
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Translation part of the world matrix.
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }

    /// Transforms a world point into homogeneous clip space.
    pub fn to_clip(&self, point: Vec3) -> Vec4 {
        self.view_projection() * point.extend(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn world_position_matches_position() {
        let camera = PerspectiveCamera::new(45.0, 1.5)
            .at(Vec3::new(0.0, 1.0, 10.0))
            .looking_at(Vec3::ZERO);
        assert!(approx(camera.world_position(), Vec3::new(0.0, 1.0, 10.0)));
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = PerspectiveCamera::new(45.0, 1.5)
            .at(Vec3::new(3.0, 2.0, 8.0))
            .looking_at(Vec3::new(1.0, 0.0, 0.0));
        let clip = camera.to_clip(Vec3::new(1.0, 0.0, 0.0));
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
    }

    #[test]
    fn set_aspect_ignores_invalid_values() {
        let mut camera = PerspectiveCamera::new(45.0, 1.5);
        camera.set_aspect(0.0);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect, 1.5);
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn view_matrix_survives_looking_straight_down() {
        let camera = PerspectiveCamera::new(45.0, 1.0)
            .at(Vec3::new(0.0, 10.0, 0.0))
            .looking_at(Vec3::ZERO);
        assert!(camera.view_matrix().is_finite());
    }
}
