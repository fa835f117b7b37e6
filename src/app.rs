use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;
use crate::geometry::LoadError;
use crate::gpu::GpuError;
use crate::input::Input;
use crate::loader::{Asset, AssetKind, AssetLoader, CompletionSink, LoadOutcome, RequestId};
use crate::material::Material;
use crate::mesh::Transform;
use crate::model::ModelData;
use crate::overlay::OverlayElement;
use crate::projection::Viewport;
use crate::render_loop::{LoopHandle, RenderLoop, Tick};
use crate::renderer::{Renderer, SceneRenderer};
use crate::scene::{NodeId, RenderMesh, Scene, TextureId};
use crate::text_geometry::{TextGeometryParams, text_geometry};
use crate::typeface::Typeface;

/// Environment variable that overrides [`AppConfig::asset_dir`].
pub const ASSET_DIR_ENV: &str = "DIORAMA_ASSET_DIR";

/// Runs once a load finishes, on the event-loop thread.
type Continuation = Box<dyn FnOnce(&mut AppContext, Result<Asset, LoadError>)>;

/// Everything a running diorama owns.
///
/// Setup code and load continuations receive `&mut AppContext`; there is no
/// other shared state. Rendering goes through a [`SceneRenderer`], so the
/// context works the same with a window or headless.
pub struct AppContext {
    pub scene: Scene,
    pub controls: OrbitControls,
    camera: PerspectiveCamera,
    input: Input,
    viewport: Viewport,
    overlays: Vec<OverlayElement>,
    renderer: Box<dyn SceneRenderer>,
    loader: AssetLoader,
    pending: HashMap<RequestId, Continuation>,
    elapsed: f32,
}

impl AppContext {
    pub fn new(renderer: Box<dyn SceneRenderer>, loader: AssetLoader) -> Self {
        let (width, height) = renderer.size();
        let viewport = Viewport::clamped(width, height);
        let camera = PerspectiveCamera {
            aspect: viewport.aspect(),
            ..Default::default()
        };

        Self {
            scene: Scene::new(),
            controls: OrbitControls::new(glam::Vec3::ZERO),
            camera,
            input: Input::new(),
            viewport,
            overlays: Vec::new(),
            renderer,
            loader,
            pending: HashMap::new(),
            elapsed: 0.0,
        }
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    /// Replaces the camera. Its aspect is forced to the viewport's.
    pub fn set_camera(&mut self, camera: PerspectiveCamera) {
        self.camera = camera;
        self.camera.set_aspect(self.viewport.aspect());
        self.update_overlays();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Seconds of frame time accumulated by [`tick`](Self::tick).
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn renderer_mut(&mut self) -> &mut dyn SceneRenderer {
        self.renderer.as_mut()
    }

    /// Adds an overlay and positions it right away.
    pub fn add_overlay(&mut self, mut overlay: OverlayElement) -> &OverlayElement {
        overlay.update_position(&self.camera, self.viewport, &self.scene);
        log::info!("overlay '{}' placed at {}", overlay.id, overlay.transform());
        self.overlays.push(overlay);
        &self.overlays[self.overlays.len() - 1]
    }

    pub fn overlay(&self, id: &str) -> Option<&OverlayElement> {
        self.overlays.iter().find(|o| o.id == id)
    }

    pub fn overlays(&self) -> &[OverlayElement] {
        &self.overlays
    }

    pub fn remove_overlay(&mut self, id: &str) -> Option<OverlayElement> {
        let index = self.overlays.iter().position(|o| o.id == id)?;
        Some(self.overlays.remove(index))
    }

    /// Re-projects every overlay from the current camera and viewport.
    pub fn update_overlays(&mut self) {
        for overlay in &mut self.overlays {
            overlay.update_position(&self.camera, self.viewport, &self.scene);
        }
    }

    /// Applies a new viewport size.
    ///
    /// The camera aspect changes first, then the renderer output, then the
    /// overlays are re-projected with both already updated.
    pub fn resize(&mut self, viewport: Viewport) {
        log::debug!("resize to {}x{}", viewport.width(), viewport.height());
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
        self.renderer.resize(viewport.width(), viewport.height());
        self.update_overlays();
    }

    /// Window-size variant of [`resize`](Self::resize). Zero sizes are ignored.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        match Viewport::new(width, height) {
            Some(viewport) => self.resize(viewport),
            None => log::debug!("ignoring resize to {}x{}", width, height),
        }
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        self.input.handle_event(event);
    }

    /// Requests `path` in the background; `on_done` runs with the result.
    pub fn load<F>(&mut self, path: impl AsRef<Path>, kind: AssetKind, on_done: F) -> RequestId
    where
        F: FnOnce(&mut AppContext, Result<Asset, LoadError>) + 'static,
    {
        let id = self.loader.request(path, kind);
        self.pending.insert(id, Box::new(on_done));
        id
    }

    pub fn load_model<F>(&mut self, path: impl AsRef<Path>, on_done: F) -> RequestId
    where
        F: FnOnce(&mut AppContext, Result<ModelData, LoadError>) + 'static,
    {
        let resolved = self.loader.resolve(&path);
        self.load(path, AssetKind::Model, move |ctx, result| {
            on_done(ctx, expect_asset(&resolved, result, Asset::into_model))
        })
    }

    pub fn load_typeface<F>(&mut self, path: impl AsRef<Path>, on_done: F) -> RequestId
    where
        F: FnOnce(&mut AppContext, Result<Typeface, LoadError>) + 'static,
    {
        let resolved = self.loader.resolve(&path);
        self.load(path, AssetKind::Typeface, move |ctx, result| {
            on_done(ctx, expect_asset(&resolved, result, Asset::into_typeface))
        })
    }

    /// Loads the font overlay labels are drawn with.
    pub fn load_overlay_font(&mut self, path: impl AsRef<Path>, size: f32) -> RequestId {
        let resolved = self.loader.resolve(&path);
        self.load(path, AssetKind::OverlayFont { size }, move |ctx, result| {
            match expect_asset(&resolved, result, Asset::into_overlay_font) {
                Ok(font) => ctx.renderer.set_overlay_font(&font),
                Err(e) => log::warn!("overlay labels will not be drawn: {}", e),
            }
        })
    }

    /// Loads a model and adds it under `transform` once it arrives. Failures
    /// are logged and leave the scene as it is.
    pub fn add_model_file(&mut self, path: impl AsRef<Path>, transform: Transform) -> RequestId {
        self.load_model(path, move |ctx, result| match result {
            Ok(model) => {
                ctx.add_model(&model, transform);
            }
            Err(e) => log::warn!("{}", e),
        })
    }

    /// Number of requests whose continuation has not run yet.
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Runs the continuation for a finished load.
    pub fn complete(&mut self, outcome: LoadOutcome) {
        let Some(continuation) = self.pending.remove(&outcome.id) else {
            log::warn!(
                "dropping result for '{}': no request {:?} pending",
                outcome.path.display(),
                outcome.id
            );
            return;
        };

        match &outcome.result {
            Ok(asset) => log::info!("loaded {} '{}'", asset.kind_name(), outcome.path.display()),
            Err(e) => log::debug!("load {:?} failed: {}", outcome.id, e),
        }
        continuation(self, outcome.result);
    }

    /// Uploads a parsed model and adds it under a new group node.
    ///
    /// Parts keep their matrices relative to the group, so `transform` places
    /// the model as a whole. Empty parts are skipped.
    pub fn add_model(&mut self, model: &ModelData, transform: Transform) -> NodeId {
        let textures: Vec<TextureId> = model
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                self.renderer
                    .upload_texture(image, &format!("{} image {}", model.name, i))
            })
            .collect();

        let root = self.scene.add_group(model.name.clone(), transform);
        for part in &model.parts {
            if part.geometry.is_empty() {
                continue;
            }
            let mesh = self.renderer.upload_mesh(&part.geometry);
            let mut material = Material::standard(part.material.color)
                .roughness(part.material.roughness)
                .metalness(part.material.metalness)
                .double_sided(part.material.double_sided);
            if let Some(&texture) = part.material.image.and_then(|i| textures.get(i)) {
                material = material.texture(texture);
            }

            let node = self.scene.add_mesh(
                part.name.clone(),
                Transform::from_matrix(part.matrix),
                RenderMesh::new(mesh, material),
            );
            self.scene.attach(node, root);
        }

        log::info!(
            "added model '{}': {} parts, {} triangles",
            model.name,
            model.parts.len(),
            model.triangle_count()
        );
        root
    }

    /// Builds extruded text and adds it as a mesh node.
    ///
    /// Returns `None` when the text produces no geometry (e.g. only spaces).
    pub fn add_text(
        &mut self,
        font: &Typeface,
        text: &str,
        params: &TextGeometryParams,
        material: Material,
        transform: Transform,
    ) -> Option<NodeId> {
        let geometry = text_geometry(font, text, params);
        if geometry.is_empty() {
            log::warn!("text {:?} produced no geometry", text);
            return None;
        }
        let mesh = self.renderer.upload_mesh(&geometry);
        Some(
            self.scene
                .add_mesh(text, transform, RenderMesh::new(mesh, material)),
        )
    }

    /// One frame: apply input to the controls, move the camera, draw.
    pub fn tick(&mut self, dt: f32) -> Result<(), GpuError> {
        self.elapsed += dt;
        self.controls
            .handle_input(&self.input, &self.camera, self.viewport);
        self.controls.update(&mut self.camera);

        let result = self
            .renderer
            .render(&self.scene, &self.camera, &self.overlays);
        self.input.end_frame();
        result
    }
}

fn expect_asset<T>(
    path: &Path,
    result: Result<Asset, LoadError>,
    into: fn(Asset) -> Option<T>,
) -> Result<T, LoadError> {
    let asset = result?;
    let kind = asset.kind_name();
    into(asset).ok_or_else(|| LoadError::parse(path, format!("unexpected {} asset", kind)))
}

/// Window and asset settings.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// MSAA sample count; 1 disables antialiasing.
    pub msaa_samples: u32,
    /// Relative asset paths resolve against this directory.
    pub asset_dir: PathBuf,
    /// Font file and pixel size for overlay labels.
    pub overlay_font: Option<(PathBuf, f32)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "diorama".to_string(),
            width: 800,
            height: 600,
            msaa_samples: 4,
            asset_dir: PathBuf::from("assets"),
            overlay_font: Some((PathBuf::from("overlay.ttf"), 16.0)),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the asset directory taken from `DIORAMA_ASSET_DIR`
    /// when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ASSET_DIR_ENV) {
            config.asset_dir = PathBuf::from(dir);
            log::info!("asset dir from {}: '{}'", ASSET_DIR_ENV, config.asset_dir.display());
        }
        config
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn msaa_samples(mut self, samples: u32) -> Self {
        self.msaa_samples = samples.max(1);
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    pub fn overlay_font(mut self, path: impl Into<PathBuf>, size: f32) -> Self {
        self.overlay_font = Some((path.into(), size));
        self
    }

    pub fn no_overlay_font(mut self) -> Self {
        self.overlay_font = None;
        self
    }
}

/// Events delivered to the window's event loop from other threads.
#[derive(Debug)]
pub enum AppEvent {
    Loaded(LoadOutcome),
}

impl CompletionSink for EventLoopProxy<AppEvent> {
    fn deliver(&self, outcome: LoadOutcome) -> bool {
        self.send_event(AppEvent::Loaded(outcome)).is_ok()
    }

    fn clone_sink(&self) -> Box<dyn CompletionSink> {
        Box::new(self.clone())
    }
}

/// Opens a window and runs until it is closed or Escape is pressed.
///
/// `setup` runs once the GPU is ready, typically to set the camera and
/// request assets.
///
/// # Example
/// ```no_run
/// use diorama::{AppConfig, Color, PerspectiveCamera, Vec3};
///
/// diorama::run(AppConfig::from_env(), |ctx| {
///     ctx.scene.set_background(Color::hex(0xbfe3dd));
///     ctx.set_camera(PerspectiveCamera::new(45.0, 1.0).at(Vec3::new(0.0, 1.0, 10.0)));
/// })
/// .unwrap();
/// ```
pub fn run<S>(config: AppConfig, setup: S) -> Result<(), winit::error::EventLoopError>
where
    S: FnOnce(&mut AppContext) + 'static,
{
    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DioramaApp::Pending {
        config,
        proxy: event_loop.create_proxy(),
        setup: Some(Box::new(setup)),
    };
    event_loop.run_app(&mut app)
}

type SetupFn = Box<dyn FnOnce(&mut AppContext)>;

enum DioramaApp {
    Pending {
        config: AppConfig,
        proxy: EventLoopProxy<AppEvent>,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        ctx: AppContext,
        render_loop: RenderLoop,
        stop: LoopHandle,
    },
}

impl ApplicationHandler<AppEvent> for DioramaApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let DioramaApp::Pending {
            config,
            proxy,
            setup,
        } = self
        else {
            return;
        };
        let Some(setup_fn) = setup.take() else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let renderer = match Renderer::new(window.clone(), config.msaa_samples) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
                return;
            }
        };

        let loader = AssetLoader::new(config.asset_dir.clone(), Box::new(proxy.clone()));
        let mut ctx = AppContext::new(Box::new(renderer), loader);
        if let Some((path, size)) = config.overlay_font.clone() {
            ctx.load_overlay_font(path, size);
        }
        setup_fn(&mut ctx);

        let mut render_loop = RenderLoop::new();
        let stop = render_loop.start();
        window.request_redraw();

        *self = DioramaApp::Running {
            window,
            ctx,
            render_loop,
            stop,
        };
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match (self, event) {
            (DioramaApp::Running { ctx, .. }, AppEvent::Loaded(outcome)) => ctx.complete(outcome),
            (DioramaApp::Pending { .. }, AppEvent::Loaded(outcome)) => {
                log::warn!("load of '{}' finished before startup", outcome.path.display());
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let DioramaApp::Running {
            window,
            ctx,
            render_loop,
            stop,
        } = self
        else {
            return;
        };

        ctx.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                stop.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                ctx.handle_resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event: key, .. }
                if key.state == ElementState::Pressed
                    && key.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                stop.stop();
            }
            WindowEvent::RedrawRequested => match render_loop.tick(Instant::now()) {
                Tick::Stopped => event_loop.exit(),
                Tick::Continue { dt, .. } => {
                    if let Err(e) = ctx.tick(dt) {
                        log::error!("{}", e);
                        stop.stop();
                        event_loop.exit();
                        return;
                    }
                    window.request_redraw();
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::time::Duration;

    use glam::{Mat4, Vec2, Vec3};
    use image::RgbaImage;

    use super::*;
    use crate::color::Color;
    use crate::geometry::RawGeometry;
    use crate::mesh::Vertex3d;
    use crate::model::{ModelPart, PartMaterial};
    use crate::overlay::OverlayAnchor;
    use crate::projection::{ScreenProjector, css_transform};
    use crate::renderer::tests::{Call, RecordingRenderer};
    use crate::typeface::tests::TEST_FONT;

    type Calls = Rc<RefCell<Vec<Call>>>;

    fn context(dir: &Path) -> (AppContext, Calls, mpsc::Receiver<LoadOutcome>) {
        let renderer = RecordingRenderer::new(800, 600);
        let calls = Rc::clone(&renderer.calls);
        let (tx, rx) = mpsc::channel();
        let ctx = AppContext::new(Box::new(renderer), AssetLoader::new(dir, Box::new(tx)));
        (ctx, calls, rx)
    }

    fn demo_camera() -> PerspectiveCamera {
        PerspectiveCamera::new(45.0, 1.0).at(Vec3::new(0.0, 1.0, 10.0))
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("diorama-app-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn triangle() -> RawGeometry {
        RawGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    fn wait(rx: &mpsc::Receiver<LoadOutcome>) -> LoadOutcome {
        rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn camera_aspect_follows_viewport() {
        let (mut ctx, _, _rx) = context(Path::new("."));
        ctx.set_camera(demo_camera());
        assert!((ctx.camera().aspect - 800.0 / 600.0).abs() < 1e-6);

        ctx.resize(Viewport::new(1000, 500).unwrap());
        assert_eq!(ctx.camera().aspect, 2.0);
    }

    #[test]
    fn overlay_is_positioned_when_added() {
        let (mut ctx, _, _rx) = context(Path::new("."));
        ctx.set_camera(demo_camera());

        let overlay = ctx.add_overlay(OverlayElement::new(
            "text-box",
            "Hello, Vite App!",
            OverlayAnchor::CameraPosition,
        ));

        assert_eq!(overlay.screen_position(), Some(Vec2::new(440.0, 270.0)));
        assert_eq!(
            overlay.transform(),
            "translate(-50%, -50%) translate(440px, 270px)"
        );
    }

    #[test]
    fn resize_reprojects_with_updated_camera() {
        let (mut ctx, calls, _rx) = context(Path::new("."));
        ctx.set_camera(demo_camera().looking_at(Vec3::ZERO));
        let anchor = Vec3::new(2.0, 1.0, 0.0);
        ctx.add_overlay(OverlayElement::new("label", "x", OverlayAnchor::Point(anchor)));

        let wide = Viewport::new(1600, 600).unwrap();
        ctx.resize(wide);

        let mut expected_camera = *ctx.camera();
        expected_camera.set_aspect(wide.aspect());
        let expected = ScreenProjector::new()
            .project(anchor, &expected_camera, wide)
            .pixel;

        let overlay = ctx.overlay("label").unwrap();
        assert_eq!(overlay.screen_position(), Some(expected));
        assert_eq!(overlay.transform(), css_transform(expected));
        assert!(calls.borrow().contains(&Call::Resize(1600, 600)));
    }

    #[test]
    fn no_stale_transform_after_resize() {
        let (mut ctx, _, _rx) = context(Path::new("."));
        ctx.set_camera(demo_camera());
        ctx.add_overlay(OverlayElement::new(
            "text-box",
            "Hello",
            OverlayAnchor::CameraPosition,
        ));
        let before = ctx.overlay("text-box").unwrap().transform().to_string();

        ctx.handle_resize(1000, 400);

        let overlay = ctx.overlay("text-box").unwrap();
        assert_ne!(overlay.transform(), before);
        let pixel = overlay.screen_position().unwrap();
        assert!((pixel - Vec2::new(550.0, 180.0)).length() < 1e-3);
        assert_eq!(overlay.transform(), css_transform(pixel));
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let (mut ctx, calls, _rx) = context(Path::new("."));
        ctx.handle_resize(0, 600);
        assert_eq!(ctx.viewport(), Viewport::new(800, 600).unwrap());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn typeface_continuation_adds_text_and_overlay() {
        let dir = temp_dir();
        std::fs::write(dir.join("test.typeface.json"), TEST_FONT).unwrap();
        let (mut ctx, calls, rx) = context(&dir);
        ctx.set_camera(demo_camera());

        ctx.load_typeface("test.typeface.json", |ctx, result| {
            let font = result.unwrap();
            let text = ctx.add_text(
                &font,
                "AO",
                &TextGeometryParams::default(),
                Material::standard(Color::hex(0x00ff00)),
                Transform::from_position(Vec3::new(-5.0, 0.0, 0.0)),
            );
            assert!(text.is_some());
            ctx.add_overlay(OverlayElement::new(
                "text-box",
                "Hello, Vite App!",
                OverlayAnchor::CameraPosition,
            ));
        });
        assert_eq!(ctx.pending_loads(), 1);

        let outcome = wait(&rx);
        ctx.complete(outcome);

        assert_eq!(ctx.pending_loads(), 0);
        assert_eq!(ctx.scene.len(), 1);
        assert!(ctx.overlay("text-box").unwrap().screen_position().is_some());
        assert!(matches!(calls.borrow()[0], Call::UploadMesh { triangles } if triangles > 0));
    }

    #[test]
    fn failed_load_runs_failure_arm_and_leaves_scene() {
        let (mut ctx, calls, rx) = context(Path::new("/no/such/dir"));
        let failed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&failed);

        ctx.load_model("3dpea.glb", move |_, result| {
            flag.set(matches!(result, Err(LoadError::Io { .. })));
        });
        ctx.complete(wait(&rx));

        assert!(failed.get());
        assert!(ctx.scene.is_empty());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn wrong_asset_kind_is_an_error() {
        let dir = temp_dir();
        std::fs::write(dir.join("kind.typeface.json"), TEST_FONT).unwrap();
        let (mut ctx, _, rx) = context(&dir);
        let got = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&got);

        // the file parses as a typeface, the continuation expects a model
        let resolved = dir.join("kind.typeface.json");
        let expected_path = resolved.clone();
        ctx.load(&resolved, AssetKind::Typeface, move |_, result| {
            *slot.borrow_mut() = Some(expect_asset(&expected_path, result, Asset::into_model));
        });
        ctx.complete(wait(&rx));

        let result = got.borrow_mut().take().unwrap();
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn unknown_outcome_is_dropped() {
        let (mut ctx, _, rx) = context(Path::new("/no/such/dir"));
        ctx.load_model("a.glb", |_, _| panic!("continuation was cleared"));
        let outcome = wait(&rx);
        let stray = LoadOutcome {
            id: outcome.id,
            path: outcome.path.clone(),
            result: Err(LoadError::UnsupportedFormat("x".into())),
        };

        ctx.pending.clear();
        ctx.complete(stray);
        assert_eq!(ctx.pending_loads(), 0);
    }

    #[test]
    fn model_parts_hang_under_one_group() {
        let (mut ctx, calls, _rx) = context(Path::new("."));
        let model = ModelData {
            name: "poly".to_string(),
            parts: vec![
                ModelPart {
                    name: "body".to_string(),
                    geometry: triangle(),
                    matrix: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                    material: PartMaterial {
                        image: Some(0),
                        ..Default::default()
                    },
                },
                ModelPart {
                    name: "empty".to_string(),
                    geometry: RawGeometry::default(),
                    matrix: Mat4::IDENTITY,
                    material: PartMaterial::default(),
                },
                ModelPart {
                    name: "fin".to_string(),
                    geometry: triangle(),
                    matrix: Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)),
                    material: PartMaterial {
                        double_sided: true,
                        ..Default::default()
                    },
                },
            ],
            images: vec![RgbaImage::new(2, 2)],
        };

        let root = ctx.add_model(
            &model,
            Transform::new()
                .position(Vec3::new(305.0, 0.0, 0.0))
                .uniform_scale(100.0),
        );

        assert_eq!(ctx.scene.children(root).len(), 2);
        let body = ctx.scene.find("body").unwrap();
        let origin = ctx
            .scene
            .world_matrix(body)
            .unwrap()
            .transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(305.0, 100.0, 0.0)).length() < 1e-3);

        let drawables = ctx.scene.drawables();
        let textured = drawables.iter().find(|d| d.node == body).unwrap();
        assert!(textured.mesh.material.texture.is_some());
        assert!(!textured.mesh.material.double_sided);

        let fin = ctx.scene.find("fin").unwrap();
        let fin = drawables.iter().find(|d| d.node == fin).unwrap();
        assert!(fin.mesh.material.double_sided);
        assert!(fin.world.determinant() < 0.0);

        let calls = calls.borrow();
        assert_eq!(
            calls[0],
            Call::UploadTexture {
                label: "poly image 0".to_string()
            }
        );
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::UploadMesh { .. })).count(),
            2
        );
    }

    #[test]
    fn mesh_ids_are_not_reused_after_removal() {
        let (mut ctx, _calls, _rx) = context(Path::new("."));
        let model = ModelData::single(Path::new("pea.stl"), triangle());

        let first = ctx.add_model(&model, Transform::new());
        let first_mesh = ctx.scene.drawables()[0].mesh.mesh;
        assert!(ctx.scene.remove(first));
        assert!(ctx.scene.drawables().is_empty());

        ctx.add_model(&model, Transform::new());
        let second_mesh = ctx.scene.drawables()[0].mesh.mesh;
        assert_ne!(first_mesh, second_mesh);
        assert!(second_mesh.index() > first_mesh.index());
    }

    #[test]
    fn tick_renders_and_clears_frame_input() {
        let (mut ctx, calls, _rx) = context(Path::new("."));
        ctx.set_camera(demo_camera());
        ctx.add_overlay(OverlayElement::new("a", "A", OverlayAnchor::CameraPosition));
        ctx.input.scroll_by(Vec2::new(0.0, 1.0));

        ctx.tick(0.016).unwrap();

        assert_eq!(ctx.input().scroll(), Vec2::ZERO);
        assert!((ctx.elapsed() - 0.016).abs() < 1e-6);
        // wheel zoom was applied toward the origin
        assert!(ctx.camera().position.length() < Vec3::new(0.0, 1.0, 10.0).length());

        let calls = calls.borrow();
        let Some(Call::Render { overlays, .. }) = calls.last() else {
            panic!("expected a render call");
        };
        assert_eq!(overlays, &vec![Some(Vec2::new(440.0, 270.0))]);
    }

    #[test]
    fn config_builder_and_env() {
        let config = AppConfig::new()
            .title("demo")
            .size(1280, 720)
            .msaa_samples(0)
            .asset_dir("/srv/assets");
        assert_eq!(config.msaa_samples, 1);
        assert_eq!(config.asset_dir, PathBuf::from("/srv/assets"));
        assert!(config.clone().no_overlay_font().overlay_font.is_none());

        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var(ASSET_DIR_ENV, "/env/assets") };
        assert_eq!(AppConfig::from_env().asset_dir, PathBuf::from("/env/assets"));
        unsafe { std::env::remove_var(ASSET_DIR_ENV) };
    }
}
