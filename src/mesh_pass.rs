//! Lit 3D mesh pass with depth testing and multisampling.
//!
//! Bind groups:
//! - **Group 0**: per-frame camera and light uniforms
//! - **Group 1**: per-draw model uniforms, one slot per draw at a dynamic offset
//! - **Group 2**: base color texture and sampler
//!
//! Four pipelines share one layout and differ only in how triangles are
//! culled: mirrored world matrices swap the front face, and double-sided
//! materials draw both faces.
//!
//! All model uniforms for a frame are written before the pass begins, so
//! every draw reads its own slot.
//!
//! The pass owns its depth buffer and, with MSAA enabled, a multisampled
//! color target that resolves into the surface texture. Both follow the
//! surface size.

use std::num::NonZeroU64;

use glam::{Mat3, Mat4};

use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::gpu::{DEPTH_FORMAT, GpuContext};
use crate::light::LightsUniform;
use crate::material::Material;
use crate::mesh::{Mesh, Vertex3d};
use crate::texture::Texture;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// xyz = world position, w unused.
    pub camera_pos: [f32; 4],
}

impl CameraUniforms {
    pub fn new(camera: &PerspectiveCamera) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_pos: camera.world_position().extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x = roughness, y = metalness, z = Blinn-Phong exponent.
    pub params: [f32; 4],
}

impl ModelUniforms {
    pub fn new(model: Mat4, material: &Material) -> Self {
        let normal_matrix = Mat4::from_mat3(Mat3::from_mat4(model).inverse().transpose());
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            color: material.color.to_array(),
            params: [
                material.roughness,
                material.metalness,
                material.shininess(),
                0.0,
            ],
        }
    }
}

/// Which pipeline a draw needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Facing {
    /// The world matrix has a negative determinant, which reverses winding.
    pub mirrored: bool,
    pub double_sided: bool,
}

impl Facing {
    const ALL: [Facing; 4] = [
        Facing::new(false, false),
        Facing::new(true, false),
        Facing::new(false, true),
        Facing::new(true, true),
    ];

    const fn new(mirrored: bool, double_sided: bool) -> Self {
        Self {
            mirrored,
            double_sided,
        }
    }

    pub fn of(model: &Mat4, material: &Material) -> Self {
        Self::new(model.determinant() < 0.0, material.double_sided)
    }

    fn index(self) -> usize {
        self.mirrored as usize | (self.double_sided as usize) << 1
    }

    fn primitive(self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: if self.double_sided {
                None
            } else {
                Some(wgpu::Face::Back)
            },
            front_face: if self.mirrored {
                wgpu::FrontFace::Cw
            } else {
                wgpu::FrontFace::Ccw
            },
            ..Default::default()
        }
    }
}

/// One mesh to draw this frame.
pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    pub model: Mat4,
    pub material: Material,
    /// Bind group from [`MeshPass::texture_bind_group`]; white when `None`.
    pub texture: Option<&'a wgpu::BindGroup>,
}

impl DrawCall<'_> {
    pub fn facing(&self) -> Facing {
        Facing::of(&self.model, &self.material)
    }
}

/// Rounds `size` up to a multiple of `alignment`.
pub(crate) fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

struct RenderTargets {
    size: (u32, u32),
    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    #[allow(dead_code)]
    msaa_texture: Option<wgpu::Texture>,
    msaa_view: Option<wgpu::TextureView>,
}

pub struct MeshPass {
    /// Indexed by [`Facing::index`].
    pipelines: Vec<wgpu::RenderPipeline>,
    camera_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_bind_group_layout: wgpu::BindGroupLayout,
    model_stride: u64,
    model_capacity: usize,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    default_texture_bind_group: wgpu::BindGroup,
    targets: RenderTargets,
    sample_count: u32,
    model_scratch: Vec<u8>,
}

const INITIAL_MODEL_CAPACITY: usize = 64;

impl MeshPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;
        let sample_count = gpu.sample_count();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let lights_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Uniforms"),
            size: std::mem::size_of::<LightsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding, dynamic| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: None,
            },
            count: None,
        };

        let frame_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Frame Bind Group Layout"),
                entries: &[uniform_entry(0, false), uniform_entry(1, false)],
            });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        let model_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Model Bind Group Layout"),
                entries: &[uniform_entry(0, true)],
            });

        let model_stride = aligned_stride(
            std::mem::size_of::<ModelUniforms>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let (model_buffer, model_bind_group) = create_model_buffer(
            device,
            &model_bind_group_layout,
            model_stride,
            INITIAL_MODEL_CAPACITY,
        );

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Texture Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let default_texture = Texture::white(gpu);
        let default_texture_bind_group =
            bind_texture(device, &texture_bind_group_layout, &default_texture);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                &frame_bind_group_layout,
                &model_bind_group_layout,
                &texture_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipelines = Facing::ALL
            .iter()
            .map(|facing| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Mesh Pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs"),
                        buffers: &[Vertex3d::LAYOUT],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: gpu.format(),
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: facing.primitive(),
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState {
                        count: sample_count,
                        ..Default::default()
                    },
                    multiview: None,
                    cache: None,
                })
            })
            .collect();

        let targets = create_targets(gpu, sample_count);

        Self {
            pipelines,
            camera_buffer,
            lights_buffer,
            frame_bind_group,
            model_buffer,
            model_bind_group,
            model_bind_group_layout,
            model_stride,
            model_capacity: INITIAL_MODEL_CAPACITY,
            texture_bind_group_layout,
            default_texture_bind_group,
            targets,
            sample_count,
            model_scratch: Vec::new(),
        }
    }

    /// Creates the group 2 bind group for a material texture.
    pub fn texture_bind_group(&self, gpu: &GpuContext, texture: &Texture) -> wgpu::BindGroup {
        bind_texture(&gpu.device, &self.texture_bind_group_layout, texture)
    }

    /// Recreates depth and MSAA targets when the surface size changed.
    pub fn ensure_targets(&mut self, gpu: &GpuContext) {
        if self.targets.size != (gpu.width(), gpu.height()) {
            self.targets = create_targets(gpu, self.sample_count);
        }
    }

    fn ensure_model_capacity(&mut self, gpu: &GpuContext, draws: usize) {
        if draws <= self.model_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        log::debug!("growing model uniform buffer to {} slots", capacity);
        let (buffer, bind_group) = create_model_buffer(
            &gpu.device,
            &self.model_bind_group_layout,
            self.model_stride,
            capacity,
        );
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
        self.model_capacity = capacity;
    }

    /// Clears to `background` and draws every call into `surface_view`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        background: Color,
        camera: &CameraUniforms,
        lights: &LightsUniform,
        draws: &[DrawCall],
    ) {
        self.ensure_targets(gpu);
        self.ensure_model_capacity(gpu, draws.len());

        gpu.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
        gpu.queue
            .write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(lights));

        let stride = self.model_stride as usize;
        self.model_scratch.clear();
        self.model_scratch.resize(draws.len() * stride, 0);
        for (i, draw) in draws.iter().enumerate() {
            let uniforms = ModelUniforms::new(draw.model, &draw.material);
            let bytes = bytemuck::bytes_of(&uniforms);
            self.model_scratch[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        if !self.model_scratch.is_empty() {
            gpu.queue
                .write_buffer(&self.model_buffer, 0, &self.model_scratch);
        }

        let (view, resolve_target) = match &self.targets.msaa_view {
            Some(msaa) => (msaa, Some(surface_view)),
            None => (surface_view, None),
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(background.to_wgpu()),
                    store: if resolve_target.is_some() {
                        wgpu::StoreOp::Discard
                    } else {
                        wgpu::StoreOp::Store
                    },
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

        let mut bound = None;
        for (i, draw) in draws.iter().enumerate() {
            let facing = draw.facing();
            if bound != Some(facing) {
                render_pass.set_pipeline(&self.pipelines[facing.index()]);
                bound = Some(facing);
            }
            let offset = (i as u64 * self.model_stride) as u32;
            render_pass.set_bind_group(1, &self.model_bind_group, &[offset]);
            render_pass.set_bind_group(
                2,
                draw.texture.unwrap_or(&self.default_texture_bind_group),
                &[],
            );
            render_pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }
    }
}

fn bind_texture(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}

fn create_model_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Model Uniforms"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ModelUniforms>() as u64),
            }),
        }],
    });

    (buffer, bind_group)
}

fn create_targets(gpu: &GpuContext, sample_count: u32) -> RenderTargets {
    let size = wgpu::Extent3d {
        width: gpu.width(),
        height: gpu.height(),
        depth_or_array_layers: 1,
    };

    let depth_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let msaa_texture = (sample_count > 1).then(|| {
        gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("MSAA Color Texture"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    });
    let msaa_view = msaa_texture
        .as_ref()
        .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

    RenderTargets {
        size: (gpu.width(), gpu.height()),
        depth_texture,
        depth_view,
        msaa_texture,
        msaa_view,
    }
}
