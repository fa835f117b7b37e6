//! Sampled 2D textures: material images and the overlay font atlas.

use image::RgbaImage;

use crate::gpu::GpuContext;

/// How a texture is sampled outside `0..1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    /// glTF's default for material images.
    Repeat,
    /// Atlases, where neighbouring cells must not bleed in.
    Clamp,
}

impl Wrap {
    fn address_mode(self) -> wgpu::AddressMode {
        match self {
            Wrap::Repeat => wgpu::AddressMode::Repeat,
            Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        }
    }
}

#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Uploads tightly packed texels of `format`, linearly filtered.
    ///
    /// `data` must hold `width * height` texels.
    pub fn new(
        gpu: &GpuContext,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        wrap: Wrap,
        data: &[u8],
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texel_size = format.block_copy_size(None).unwrap_or(4);
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * texel_size),
                rows_per_image: Some(height),
            },
            size,
        );

        let address_mode = wrap.address_mode();
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            sampler,
            width,
            height,
        }
    }

    /// A material image, treated as sRGB color.
    pub fn from_image(gpu: &GpuContext, image: &RgbaImage, label: &str) -> Self {
        Self::new(
            gpu,
            label,
            image.dimensions(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Wrap::Repeat,
            image.as_raw(),
        )
    }

    /// Single-channel coverage, as used by glyph atlases.
    pub fn coverage(gpu: &GpuContext, label: &str, size: (u32, u32), data: &[u8]) -> Self {
        Self::new(gpu, label, size, wgpu::TextureFormat::R8Unorm, Wrap::Clamp, data)
    }

    /// 1x1 white, bound for materials without a base color texture.
    pub fn white(gpu: &GpuContext) -> Self {
        Self::new(
            gpu,
            "White Texture",
            (1, 1),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Wrap::Repeat,
            &[255; 4],
        )
    }
}
