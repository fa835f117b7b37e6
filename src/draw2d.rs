//! Screen-space drawing for overlay labels.
//!
//! Coordinates are in physical pixels with the origin at the top-left, the
//! same space [`crate::projection`] produces. Each frame the app clears the
//! batches, queues rectangles and labels, and the renderer flushes them in a
//! pass after the scene.

use glam::Vec2;

use crate::assets::{FontAtlas, FontMetrics};
use crate::color::Color;
use crate::gpu::GpuContext;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex2d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex2d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4],
    };
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Draw2dUniforms {
    resolution: [f32; 2],
    _padding: [f32; 2],
}

const MAX_VERTICES: usize = 16384;

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }
}

/// One glyph bitmap placed on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub rect: Rect,
    /// Atlas UV rectangle, `[x, y, width, height]`.
    pub uv: [f32; 4],
}

/// A label laid out around its anchor pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelLayout {
    pub background: Rect,
    pub glyphs: Vec<GlyphQuad>,
}

#[derive(Clone, Copy, Debug)]
pub struct LabelStyle {
    pub color: Color,
    pub background: Color,
    /// Space between the text and the background edge.
    pub padding: Vec2,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            background: Color::LABEL_BG,
            padding: Vec2::new(8.0, 4.0),
        }
    }
}

/// Lays out one line of `text` so the padded box is centered on `center`.
///
/// Centering is the `translate(-50%, -50%)` half of an overlay transform.
pub fn layout_label(metrics: &FontMetrics, center: Vec2, text: &str, padding: Vec2) -> LabelLayout {
    let size = Vec2::new(metrics.measure(text), metrics.line_height()) + padding * 2.0;
    let top_left = center - size * 0.5;
    let background = Rect::new(top_left.x, top_left.y, size.x, size.y);

    let baseline = top_left.y + padding.y + metrics.ascent();
    let mut cursor = top_left.x + padding.x;
    let mut glyphs = Vec::new();

    for c in text.chars() {
        if let Some(glyph) = metrics.glyph(c).filter(|g| g.width > 0 && g.height > 0) {
            let (w, h) = (glyph.width as f32, glyph.height as f32);
            glyphs.push(GlyphQuad {
                rect: Rect::new(
                    cursor + glyph.offset_x,
                    baseline - glyph.offset_y - h,
                    w,
                    h,
                ),
                uv: glyph.uv,
            });
        }
        cursor += metrics.advance(c);
    }

    LabelLayout { background, glyphs }
}

fn quad(rect: Rect, uv: [f32; 4], color: Color) -> [Vertex2d; 6] {
    let c = color.to_array();
    let (x0, y0, x1, y1) = (rect.x, rect.y, rect.x + rect.w, rect.y + rect.h);
    let (u0, v0, u1, v1) = (uv[0], uv[1], uv[0] + uv[2], uv[1] + uv[3]);
    let v = |x, y, u, w| Vertex2d {
        position: [x, y],
        uv: [u, w],
        color: c,
    };
    [
        v(x0, y0, u0, v0),
        v(x1, y0, u1, v0),
        v(x0, y1, u0, v1),
        v(x1, y0, u1, v0),
        v(x1, y1, u1, v1),
        v(x0, y1, u0, v1),
    ]
}

/// Batches colored quads and glyph quads, then draws them in one pass.
pub struct Draw2d {
    colored_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,

    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    font: Option<(FontMetrics, wgpu::BindGroup)>,

    colored_vertices: Vec<Vertex2d>,
    text_vertices: Vec<Vertex2d>,
}

impl Draw2d {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Draw2d Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw2d.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Uniforms"),
            size: std::mem::size_of::<Draw2dUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Uniform Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw2d Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw2d Texture Layout"),
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

        let colored_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw2d Colored Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw2d Textured Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let colored_pipeline =
            create_pipeline(gpu, &shader, &colored_layout, "fs_colored", "Draw2d Colored");
        let textured_pipeline =
            create_pipeline(gpu, &shader, &textured_layout, "fs_textured", "Draw2d Textured");

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw2d Vertex Buffer"),
            size: (MAX_VERTICES * std::mem::size_of::<Vertex2d>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            colored_pipeline,
            textured_pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group_layout,
            font: None,
            colored_vertices: Vec::with_capacity(256),
            text_vertices: Vec::with_capacity(1024),
        }
    }

    /// Makes `atlas` the font labels are drawn with.
    pub fn set_font(&mut self, gpu: &GpuContext, atlas: &FontAtlas) {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Font Bind Group"),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas.texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&atlas.texture.sampler),
                },
            ],
        });
        self.font = Some((atlas.metrics().clone(), bind_group));
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn clear(&mut self) {
        self.colored_vertices.clear();
        self.text_vertices.clear();
    }

    pub fn rect(&mut self, rect: Rect, color: Color) {
        self.colored_vertices
            .extend_from_slice(&quad(rect, [0.0; 4], color));
    }

    /// Queues a label centered on `center`. Nothing is queued until a font
    /// is set.
    pub fn label(&mut self, center: Vec2, text: &str, style: &LabelStyle) {
        let Some((metrics, _)) = &self.font else {
            return;
        };
        let layout = layout_label(metrics, center, text, style.padding);

        self.colored_vertices
            .extend_from_slice(&quad(layout.background, [0.0; 4], style.background));
        for glyph in &layout.glyphs {
            self.text_vertices
                .extend_from_slice(&quad(glyph.rect, glyph.uv, style.color));
        }
    }

    pub fn render(&self, gpu: &GpuContext, render_pass: &mut wgpu::RenderPass) {
        let uniforms = Draw2dUniforms {
            resolution: [gpu.width() as f32, gpu.height() as f32],
            _padding: [0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let colored = self.colored_vertices.len().min(MAX_VERTICES);
        let text = self.text_vertices.len().min(MAX_VERTICES - colored);
        if colored + text < self.colored_vertices.len() + self.text_vertices.len() {
            log::warn!("2D vertex budget exceeded, dropping overlay geometry");
        }

        if colored > 0 {
            gpu.queue.write_buffer(
                &self.vertex_buffer,
                0,
                bytemuck::cast_slice(&self.colored_vertices[..colored]),
            );
            render_pass.set_pipeline(&self.colored_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(0..colored as u32, 0..1);
        }

        if let (Some((_, font_bind_group)), true) = (&self.font, text > 0) {
            gpu.queue.write_buffer(
                &self.vertex_buffer,
                (colored * std::mem::size_of::<Vertex2d>()) as u64,
                bytemuck::cast_slice(&self.text_vertices[..text]),
            );
            render_pass.set_pipeline(&self.textured_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, font_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(colored as u32..(colored + text) as u32, 0..1);
        }
    }
}

fn create_pipeline(
    gpu: &GpuContext,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    label: &str,
) -> wgpu::RenderPipeline {
    let blend_state = wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    };

    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs"),
                buffers: &[Vertex2d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.format(),
                    blend: Some(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::assets::GlyphInfo;

    fn metrics() -> FontMetrics {
        let glyph = GlyphInfo {
            uv: [0.0, 0.0, 0.1, 0.1],
            width: 8,
            height: 10,
            offset_x: 1.0,
            offset_y: -2.0,
            advance: 10.0,
        };
        let mut glyphs = HashMap::new();
        glyphs.insert('H', glyph);
        glyphs.insert('i', GlyphInfo { width: 3, ..glyph });
        glyphs.insert(
            ' ',
            GlyphInfo {
                width: 0,
                height: 0,
                advance: 4.0,
                ..glyph
            },
        );
        FontMetrics::new(glyphs, 16.0, 20.0, 15.0)
    }

    #[test]
    fn label_box_is_centered_on_anchor() {
        let center = Vec2::new(400.0, 300.0);
        let layout = layout_label(&metrics(), center, "Hi", Vec2::new(5.0, 2.0));

        assert_eq!(layout.background.w, 30.0);
        assert_eq!(layout.background.h, 24.0);
        assert_eq!(layout.background.center(), center);
        assert_eq!(layout.background.x, 385.0);
    }

    #[test]
    fn glyphs_sit_on_shared_baseline() {
        let layout = layout_label(&metrics(), Vec2::new(100.0, 100.0), "Hi", Vec2::ZERO);
        assert_eq!(layout.glyphs.len(), 2);

        let top = layout.background.y;
        // baseline = top + ascent; bitmap bottom sits offset_y below it
        for glyph in &layout.glyphs {
            assert_eq!(glyph.rect.y + glyph.rect.h, top + 15.0 + 2.0);
        }
        assert_eq!(layout.glyphs[0].rect.x, layout.background.x + 1.0);
        assert_eq!(layout.glyphs[1].rect.x, layout.background.x + 11.0);
    }

    #[test]
    fn blank_glyphs_only_advance() {
        let layout = layout_label(&metrics(), Vec2::ZERO, "H H", Vec2::ZERO);
        assert_eq!(layout.glyphs.len(), 2);
        assert_eq!(layout.glyphs[1].rect.x - layout.glyphs[0].rect.x, 14.0);
    }

    #[test]
    fn quad_spans_rect_with_uvs() {
        let vertices = quad(
            Rect::new(10.0, 20.0, 30.0, 40.0),
            [0.5, 0.25, 0.25, 0.5],
            Color::WHITE,
        );
        assert_eq!(vertices[0].position, [10.0, 20.0]);
        assert_eq!(vertices[4].position, [40.0, 60.0]);
        assert_eq!(vertices[4].uv, [0.75, 0.75]);
        assert!(vertices.iter().all(|v| v.color == [1.0; 4]));
    }
}
