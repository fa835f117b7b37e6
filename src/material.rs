use crate::color::Color;
use crate::scene::TextureId;

/// A physically-flavoured surface description for lit meshes.
///
/// Defaults match a plain white standard material: fully rough, not metallic.
///
/// ```
/// use diorama::{Color, Material};
///
/// let text = Material::standard(Color::hex(0x00ff00));
/// assert_eq!(text.roughness, 1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Base color, multiplied with the texture when there is one.
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
    pub texture: Option<TextureId>,
    /// Draw back faces too, lit from the side facing the camera.
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            roughness: 1.0,
            metalness: 0.0,
            texture: None,
            double_sided: false,
        }
    }
}

impl Material {
    pub fn standard(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }

    pub fn texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    /// Blinn-Phong exponent derived from roughness.
    ///
    /// Rough surfaces get a wide, dim lobe; smooth ones a tight highlight.
    pub fn shininess(&self) -> f32 {
        let r = self.roughness.clamp(0.04, 1.0);
        (2.0 / (r * r * r * r) - 2.0).max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roughness_is_clamped() {
        assert_eq!(Material::default().roughness(2.0).roughness, 1.0);
        assert_eq!(Material::default().metalness(-1.0).metalness, 0.0);
    }

    #[test]
    fn smoother_surfaces_are_shinier() {
        let rough = Material::default().roughness(1.0);
        let smooth = Material::default().roughness(0.2);
        assert!(smooth.shininess() > rough.shininess());
        assert!(rough.shininess() >= 1.0);
    }

    #[test]
    fn materials_are_single_sided_unless_asked() {
        assert!(!Material::default().double_sided);
        assert!(Material::standard(Color::WHITE).double_sided(true).double_sided);
    }
}
