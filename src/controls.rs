//! Orbit camera controls: rotate around a target, dolly and pan.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use winit::event::MouseButton;

use crate::camera::PerspectiveCamera;
use crate::input::Input;
use crate::projection::Viewport;

const EPS: f32 = 1e-6;

/// Keeps a camera looking at `target` while the user drags it around.
///
/// Left drag rotates, right drag pans and the wheel dollies. Input is turned
/// into pending deltas; [`update`](Self::update) applies them to the camera
/// once per frame. With damping enabled only a fraction of each delta is
/// applied per update, so motion eases out over several frames.
///
/// # Example
/// ```
/// use diorama::{OrbitControls, PerspectiveCamera, Vec3};
///
/// let mut camera = PerspectiveCamera::new(45.0, 1.5).at(Vec3::new(0.0, 0.0, 10.0));
/// let mut controls = OrbitControls::new(Vec3::ZERO);
/// controls.rotate_left(std::f32::consts::FRAC_PI_2);
/// controls.update(&mut camera);
/// assert!((camera.position.x + 10.0).abs() < 1e-4);
/// ```
#[derive(Clone, Debug)]
pub struct OrbitControls {
    /// Point the camera orbits around and looks at.
    pub target: Vec3,
    pub enable_damping: bool,
    /// Fraction of the pending motion applied per update when damping.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle limits in radians, measured from +Y.
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,

    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Orbits around whatever the camera currently looks at.
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self::new(camera.target)
    }

    pub fn damping(mut self, enabled: bool) -> Self {
        self.enable_damping = enabled;
        self
    }

    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    pub fn polar_limits(mut self, min: f32, max: f32) -> Self {
        self.min_polar_angle = min;
        self.max_polar_angle = max;
        self
    }

    /// Queues a rotation around the vertical axis.
    pub fn rotate_left(&mut self, angle: f32) {
        self.theta_delta -= angle;
    }

    /// Queues a rotation toward the top pole.
    pub fn rotate_up(&mut self, angle: f32) {
        self.phi_delta -= angle;
    }

    /// Scales the camera distance; factors below one move closer.
    pub fn dolly(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
        }
    }

    /// Queues a screen-space pan of `delta` pixels.
    ///
    /// The distance moved keeps the point under the cursor at the target's
    /// depth fixed.
    pub fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera, viewport: Viewport) {
        let distance = (camera.position - self.target).length()
            * (camera.fov_y.to_radians() * 0.5).tan();
        let per_pixel = 2.0 * distance / viewport.height() as f32;

        let forward = camera.forward();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();

        self.pan_offset += (-right * delta.x + up * delta.y) * per_pixel * self.pan_speed;
    }

    /// Turns this frame's drags and wheel movement into pending motion.
    pub fn handle_input(&mut self, input: &Input, camera: &PerspectiveCamera, viewport: Viewport) {
        let height = viewport.height() as f32;

        let rotate = input.drag_delta(MouseButton::Left);
        if rotate != Vec2::ZERO {
            self.rotate_left(TAU * rotate.x / height * self.rotate_speed);
            self.rotate_up(TAU * rotate.y / height * self.rotate_speed);
        }

        let pan = input.drag_delta(MouseButton::Right);
        if pan != Vec2::ZERO {
            self.pan(pan, camera, viewport);
        }

        let wheel = input.scroll().y;
        if wheel != 0.0 {
            self.dolly(0.95f32.powf(self.zoom_speed * wheel));
        }
    }

    /// Applies pending motion to `camera`. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > EPS {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, PI * 0.5)
        };

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        theta += self.theta_delta * step;
        phi += self.phi_delta * step;
        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * step;

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );

        let previous = camera.position;
        camera.position = self.target + new_offset;
        camera.target = self.target;

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > EPS
    }
}
