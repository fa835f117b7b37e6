//! Model files: glTF 2.0 (`.glb`, `.gltf`) and STL.
//!
//! Loading flattens the file's node hierarchy into a list of [`ModelPart`]s,
//! each holding triangle geometry, a matrix relative to the model root, and a
//! material. Decoded images are converted to RGBA8 so they can be uploaded
//! as textures without further inspection.

use std::path::Path;

use glam::Mat4;
use image::{DynamicImage, ImageBuffer, RgbaImage};

use crate::color::Color;
use crate::geometry::{LoadError, RawGeometry, extension};
use crate::mesh::Vertex3d;

/// Surface properties of a part, before any texture is uploaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartMaterial {
    /// Linear base color factor.
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
    /// Index into [`ModelData::images`].
    pub image: Option<usize>,
    /// Which `TEXCOORD_n` set the image is sampled with.
    pub uv_set: u32,
    pub double_sided: bool,
}

impl Default for PartMaterial {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            roughness: 1.0,
            metalness: 0.0,
            image: None,
            uv_set: 0,
            double_sided: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelPart {
    pub name: String,
    pub geometry: RawGeometry,
    /// Part-to-model-root transform.
    pub matrix: Mat4,
    pub material: PartMaterial,
}

/// A parsed model, ready to be uploaded and attached to a scene.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub name: String,
    pub parts: Vec<ModelPart>,
    pub images: Vec<RgbaImage>,
}

impl ModelData {
    /// Reads and parses a model, picking the loader by file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "glb" | "gltf" => {
                let (document, buffers, images) = gltf::import(path).map_err(|e| match e {
                    gltf::Error::Io(source) => LoadError::io(path, source),
                    other => LoadError::parse(path, other),
                })?;
                Self::from_gltf(path, &document, &buffers, &images)
            }
            "stl" => {
                let file = std::fs::File::open(path).map_err(|e| LoadError::io(path, e))?;
                let mut reader = std::io::BufReader::new(file);
                let geometry = RawGeometry::from_stl(&mut reader, path)?;
                Ok(Self::single(path, geometry))
            }
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parses a self-contained glTF or GLB held in memory.
    pub fn from_gltf_slice(path: impl AsRef<Path>, bytes: &[u8]) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let (document, buffers, images) =
            gltf::import_slice(bytes).map_err(|e| LoadError::parse(path, e))?;
        Self::from_gltf(path, &document, &buffers, &images)
    }

    /// Wraps one geometry as a model with a single default-material part.
    pub fn single(path: &Path, geometry: RawGeometry) -> Self {
        let name = display_name(path);
        Self {
            parts: vec![ModelPart {
                name: name.clone(),
                geometry,
                matrix: Mat4::IDENTITY,
                material: PartMaterial::default(),
            }],
            name,
            images: Vec::new(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.geometry.triangle_count()).sum()
    }

    fn from_gltf(
        path: &Path,
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: &[gltf::image::Data],
    ) -> Result<Self, LoadError> {
        let mut model = ModelData {
            name: display_name(path),
            ..Default::default()
        };

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    collect_node(&node, Mat4::IDENTITY, buffers, &mut model.parts);
                }
            }
            // No scene list: treat every mesh-bearing root node as placed.
            None => {
                for node in document.nodes() {
                    collect_node(&node, Mat4::IDENTITY, buffers, &mut model.parts);
                }
            }
        }

        if model.parts.is_empty() {
            return Err(LoadError::EmptyModel(path.to_path_buf()));
        }

        model.images = images.iter().map(to_rgba8).collect();
        log::debug!(
            "{}: {} parts, {} triangles, {} images",
            model.name,
            model.parts.len(),
            model.triangle_count(),
            model.images.len()
        );
        Ok(model)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("model")
        .to_string()
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    parts: &mut Vec<ModelPart>,
) {
    let matrix = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let base_name = mesh
            .name()
            .or(node.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));

        for (i, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("skipping {:?} primitive in '{}'", primitive.mode(), base_name);
                continue;
            }
            let material = read_material(&primitive.material());
            let Some(geometry) = read_primitive(&primitive, material.uv_set, buffers) else {
                continue;
            };
            parts.push(ModelPart {
                name: format!("{}.{}", base_name, i),
                geometry,
                matrix,
                material,
            });
        }
    }

    for child in node.children() {
        collect_node(&child, matrix, buffers, parts);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    uv_set: u32,
    buffers: &[gltf::buffer::Data],
) -> Option<RawGeometry> {
    let reader = primitive.reader(|b| buffers.get(b.index()).map(|data| data.0.as_slice()));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let uvs: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(uv_set)
        .map(|t| t.into_f32().collect());
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    if positions.is_empty() || indices.len() < 3 {
        return None;
    }

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or([0.0, 0.0, 0.0]);
            let uv = uvs
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .unwrap_or([0.0, 0.0]);
            Vertex3d::new(position, normal, uv)
        })
        .collect();

    let count = positions.len() as u32;
    let indices: Vec<u32> = indices
        .chunks_exact(3)
        .filter(|tri| tri.iter().all(|&i| i < count))
        .flatten()
        .copied()
        .collect();

    let mut geometry = RawGeometry::new(vertices, indices);
    if normals.is_none() {
        geometry.recalculate_normals();
    }
    Some(geometry)
}

fn read_material(material: &gltf::Material) -> PartMaterial {
    let pbr = material.pbr_metallic_roughness();
    let texture = pbr.base_color_texture();
    PartMaterial {
        color: Color::from(pbr.base_color_factor()),
        roughness: pbr.roughness_factor(),
        metalness: pbr.metallic_factor(),
        image: texture.as_ref().map(|info| info.texture().source().index()),
        uv_set: texture.as_ref().map_or(0, |info| info.tex_coord()),
        double_sided: material.double_sided(),
    }
}

/// Converts any glTF pixel layout to 8-bit RGBA.
pub(crate) fn to_rgba8(data: &gltf::image::Data) -> RgbaImage {
    use gltf::image::Format;

    let (w, h) = (data.width, data.height);
    let bytes = data.pixels.clone();
    let words = || -> Vec<u16> {
        data.pixels
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect()
    };
    let floats = || -> Vec<f32> {
        data.pixels
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    };

    let image = match data.format {
        Format::R8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
        Format::R8G8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLumaA8),
        Format::R8G8B8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
        Format::R16 => ImageBuffer::from_raw(w, h, words()).map(DynamicImage::ImageLuma16),
        Format::R16G16 => ImageBuffer::from_raw(w, h, words()).map(DynamicImage::ImageLumaA16),
        Format::R16G16B16 => ImageBuffer::from_raw(w, h, words()).map(DynamicImage::ImageRgb16),
        Format::R16G16B16A16 => {
            ImageBuffer::from_raw(w, h, words()).map(DynamicImage::ImageRgba16)
        }
        Format::R32G32B32FLOAT => {
            ImageBuffer::from_raw(w, h, floats()).map(DynamicImage::ImageRgb32F)
        }
        Format::R32G32B32A32FLOAT => {
            ImageBuffer::from_raw(w, h, floats()).map(DynamicImage::ImageRgba32F)
        }
        #[allow(unreachable_patterns)]
        _ => None,
    };

    match image {
        Some(image) => image.to_rgba8(),
        None => {
            log::warn!("image data does not match its {}x{} size, using white", w, h);
            RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]))
        }
    }
}
