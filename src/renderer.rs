//! The seam between application logic and the GPU.
//!
//! [`SceneRenderer`] is everything the app needs from a renderer: uploads
//! that hand back typed ids, a resize hook and a per-frame draw. [`Renderer`]
//! is the wgpu implementation; tests drive the app through a recording one.

use std::sync::Arc;

use image::RgbaImage;
use winit::window::Window;

use crate::assets::{FontAtlas, FontAtlasData};
use crate::camera::PerspectiveCamera;
use crate::draw2d::{Draw2d, LabelStyle};
use crate::geometry::RawGeometry;
use crate::gpu::{GpuContext, GpuError};
use crate::light::LightsUniform;
use crate::mesh::Mesh;
use crate::mesh_pass::{CameraUniforms, DrawCall, MeshPass};
use crate::overlay::OverlayElement;
use crate::scene::{MeshId, Scene, TextureId};
use crate::texture::Texture;

/// Uploads are append-only: a [`MeshId`] or [`TextureId`] is never reused
/// and stays valid for the renderer's lifetime, even after every node using
/// it has been removed from the scene.
pub trait SceneRenderer {
    fn upload_mesh(&mut self, geometry: &RawGeometry) -> MeshId;

    fn upload_texture(&mut self, image: &RgbaImage, label: &str) -> TextureId;

    /// Font used to draw overlay labels. Labels are skipped until one is set.
    fn set_overlay_font(&mut self, font: &FontAtlasData);

    /// Resizes the output. Zero-sized requests are ignored.
    fn resize(&mut self, width: u32, height: u32);

    /// Output size in pixels.
    fn size(&self) -> (u32, u32);

    /// Draws the scene from `camera`, then the overlays on top.
    fn render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        overlays: &[OverlayElement],
    ) -> Result<(), GpuError>;
}

/// Window-backed wgpu renderer.
///
/// GPU buffers are freed when the renderer is dropped, not per id.
pub struct Renderer {
    gpu: GpuContext,
    mesh_pass: MeshPass,
    draw_2d: Draw2d,
    meshes: Vec<Mesh>,
    textures: Vec<(Texture, wgpu::BindGroup)>,
    overlay_font: Option<FontAtlas>,
    label_style: LabelStyle,
}

impl Renderer {
    pub fn new(window: Arc<Window>, msaa_samples: u32) -> Result<Self, GpuError> {
        let gpu = GpuContext::new(window, msaa_samples)?;
        let mesh_pass = MeshPass::new(&gpu);
        let draw_2d = Draw2d::new(&gpu);

        Ok(Self {
            gpu,
            mesh_pass,
            draw_2d,
            meshes: Vec::new(),
            textures: Vec::new(),
            overlay_font: None,
            label_style: LabelStyle::default(),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// The uploaded overlay font, once one has been set.
    pub fn overlay_font(&self) -> Option<&FontAtlas> {
        self.overlay_font.as_ref()
    }

    pub fn set_label_style(&mut self, style: LabelStyle) {
        self.label_style = style;
    }

    fn acquire_frame(&self) -> Result<Option<wgpu::SurfaceTexture>, GpuError> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.gpu.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out acquiring frame, skipping");
                Ok(None)
            }
            Err(e) => Err(GpuError::Frame(e)),
        }
    }
}

impl SceneRenderer for Renderer {
    fn upload_mesh(&mut self, geometry: &RawGeometry) -> MeshId {
        let id = MeshId(self.meshes.len());
        self.meshes.push(geometry.upload(&self.gpu));
        id
    }

    fn upload_texture(&mut self, image: &RgbaImage, label: &str) -> TextureId {
        let texture = Texture::from_image(&self.gpu, image, label);
        let bind_group = self.mesh_pass.texture_bind_group(&self.gpu, &texture);
        let id = TextureId(self.textures.len());
        self.textures.push((texture, bind_group));
        id
    }

    fn set_overlay_font(&mut self, font: &FontAtlasData) {
        let atlas = FontAtlas::upload(&self.gpu, font);
        self.draw_2d.set_font(&self.gpu, &atlas);
        self.overlay_font = Some(atlas);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        self.mesh_pass.ensure_targets(&self.gpu);
    }

    fn size(&self) -> (u32, u32) {
        (self.gpu.width(), self.gpu.height())
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        overlays: &[OverlayElement],
    ) -> Result<(), GpuError> {
        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let drawables = scene.drawables();
        let draws: Vec<DrawCall> = drawables
            .iter()
            .filter_map(|d| {
                let mesh = self.meshes.get(d.mesh.mesh.index())?;
                let texture = d
                    .mesh
                    .material
                    .texture
                    .and_then(|t| self.textures.get(t.index()))
                    .map(|(_, bind_group)| bind_group);
                Some(DrawCall {
                    mesh,
                    model: d.world,
                    material: d.mesh.material,
                    texture,
                })
            })
            .collect();

        let lights = LightsUniform::pack(scene.ambient(), scene.point_lights());
        let camera_uniforms = CameraUniforms::new(camera);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.mesh_pass.render(
            &self.gpu,
            &mut encoder,
            &view,
            scene.background(),
            &camera_uniforms,
            &lights,
            &draws,
        );

        self.draw_2d.clear();
        if self.draw_2d.has_font() {
            for overlay in overlays {
                if let Some(center) = overlay.screen_position() {
                    self.draw_2d.label(center, &overlay.text, &self.label_style);
                }
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.draw_2d.render(&self.gpu, &mut render_pass);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// What a [`RecordingRenderer`] was asked to do.
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Call {
        UploadMesh { triangles: usize },
        UploadTexture { label: String },
        SetOverlayFont,
        Resize(u32, u32),
        Render { drawables: usize, camera_aspect: f32, overlays: Vec<Option<glam::Vec2>> },
    }

    /// Headless renderer that records calls.
    pub(crate) struct RecordingRenderer {
        pub calls: std::rc::Rc<std::cell::RefCell<Vec<Call>>>,
        size: (u32, u32),
        meshes: usize,
        textures: usize,
    }

    impl RecordingRenderer {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                calls: Default::default(),
                size: (width, height),
                meshes: 0,
                textures: 0,
            }
        }
    }

    impl SceneRenderer for RecordingRenderer {
        fn upload_mesh(&mut self, geometry: &RawGeometry) -> MeshId {
            self.calls.borrow_mut().push(Call::UploadMesh {
                triangles: geometry.triangle_count(),
            });
            self.meshes += 1;
            MeshId(self.meshes - 1)
        }

        fn upload_texture(&mut self, _image: &RgbaImage, label: &str) -> TextureId {
            self.calls.borrow_mut().push(Call::UploadTexture {
                label: label.to_string(),
            });
            self.textures += 1;
            TextureId(self.textures - 1)
        }

        fn set_overlay_font(&mut self, _font: &FontAtlasData) {
            self.calls.borrow_mut().push(Call::SetOverlayFont);
        }

        fn resize(&mut self, width: u32, height: u32) {
            if width > 0 && height > 0 {
                self.size = (width, height);
                self.calls.borrow_mut().push(Call::Resize(width, height));
            }
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn render(
            &mut self,
            scene: &Scene,
            camera: &PerspectiveCamera,
            overlays: &[OverlayElement],
        ) -> Result<(), GpuError> {
            self.calls.borrow_mut().push(Call::Render {
                drawables: scene.drawables().len(),
                camera_aspect: camera.aspect,
                overlays: overlays.iter().map(|o| o.screen_position()).collect(),
            });
            Ok(())
        }
    }
}
