//! Point and ambient lights, and their packed GPU form.

use glam::Vec3;

use crate::color::Color;

/// Upper bound on point lights the mesh shader evaluates.
pub const MAX_POINT_LIGHTS: usize = 8;

/// An omnidirectional light at a position.
///
/// With `distance > 0` the contribution fades to zero at that range:
/// `pow(saturate(1 - d / distance), decay)`. A distance of zero means
/// unlimited range and no falloff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Color,
    pub intensity: f32,
    pub distance: f32,
    pub decay: f32,
}

impl PointLight {
    pub fn new(color: Color, intensity: f32, distance: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            color,
            intensity,
            distance,
            decay: 2.0,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    /// Distance attenuation at `d` world units from the light.
    pub fn attenuation(&self, d: f32) -> f32 {
        if self.distance > 0.0 {
            (1.0 - d / self.distance).clamp(0.0, 1.0).powf(self.decay)
        } else {
            1.0
        }
    }
}

/// Uniform light applied to every surface regardless of orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn new(color: Color, intensity: f32) -> Self {
        Self { color, intensity }
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::new(Color::WHITE, 0.0)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuPointLight {
    /// xyz = position, w = range (0 = infinite)
    pub position_range: [f32; 4],
    /// rgb = color * intensity, a = decay
    pub color_decay: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LightsUniform {
    pub ambient: [f32; 4],
    pub count: [u32; 4],
    pub points: [GpuPointLight; MAX_POINT_LIGHTS],
}

impl LightsUniform {
    pub fn pack(ambient: &AmbientLight, points: &[PointLight]) -> Self {
        if points.len() > MAX_POINT_LIGHTS {
            log::warn!(
                "{} point lights in scene, only the first {} are shaded",
                points.len(),
                MAX_POINT_LIGHTS
            );
        }

        let mut packed = [GpuPointLight::default(); MAX_POINT_LIGHTS];
        for (slot, light) in packed.iter_mut().zip(points) {
            let c = light.color.scaled(light.intensity);
            *slot = GpuPointLight {
                position_range: light.position.extend(light.distance.max(0.0)).to_array(),
                color_decay: [c.r, c.g, c.b, light.decay],
            };
        }

        let a = ambient.color.scaled(ambient.intensity);
        Self {
            ambient: [a.r, a.g, a.b, 1.0],
            count: [points.len().min(MAX_POINT_LIGHTS) as u32, 0, 0, 0],
            points: packed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_reaches_zero_at_distance() {
        let light = PointLight::new(Color::WHITE, 20.0, 100.0);
        assert_eq!(light.attenuation(0.0), 1.0);
        assert!((light.attenuation(50.0) - 0.25).abs() < 1e-6);
        assert_eq!(light.attenuation(100.0), 0.0);
        assert_eq!(light.attenuation(250.0), 0.0);
    }

    #[test]
    fn zero_distance_means_no_falloff() {
        let light = PointLight::new(Color::WHITE, 1.0, 0.0);
        assert_eq!(light.attenuation(1e6), 1.0);
    }

    #[test]
    fn pack_premultiplies_intensity() {
        let lights = [
            PointLight::new(Color::WHITE, 20.0, 100.0).at(Vec3::new(50.0, 30.0, 50.0)),
            PointLight::new(Color::WHITE, 2.0, 100.0).at(Vec3::new(0.0, 30.0, -5.0)),
        ];
        let packed = LightsUniform::pack(&AmbientLight::new(Color::WHITE, 0.2), &lights);

        assert_eq!(packed.count[0], 2);
        assert_eq!(packed.points[0].position_range, [50.0, 30.0, 50.0, 100.0]);
        assert_eq!(packed.points[0].color_decay, [20.0, 20.0, 20.0, 2.0]);
        assert!((packed.ambient[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn pack_truncates_extra_lights() {
        let lights = vec![PointLight::new(Color::WHITE, 1.0, 10.0); MAX_POINT_LIGHTS + 3];
        let packed = LightsUniform::pack(&AmbientLight::default(), &lights);
        assert_eq!(packed.count[0] as usize, MAX_POINT_LIGHTS);
    }

    #[test]
    fn uniform_size_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightsUniform>() % 16, 0);
    }
}
