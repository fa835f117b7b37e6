use diorama::{
    AmbientLight, AppConfig, AppContext, Color, Material, OverlayAnchor, OverlayElement,
    PerspectiveCamera, PointLight, TextGeometryParams, Transform, Vec3,
};

fn setup(ctx: &mut AppContext) {
    ctx.scene.set_background(Color::hex(0xbfe3dd));
    ctx.set_camera(PerspectiveCamera::new(45.0, 1.0).at(Vec3::new(0.0, 1.0, 10.0)));

    ctx.add_model_file("3dpea.glb", Transform::new());
    ctx.add_model_file(
        "poly.glb",
        Transform::new()
            .position(Vec3::new(305.0, 0.0, 0.0))
            .uniform_scale(100.0),
    );

    for (intensity, position) in [
        (20.0, Vec3::new(50.0, 30.0, 50.0)),
        (10.0, Vec3::new(-50.0, 30.0, 50.0)),
        (2.0, Vec3::new(0.0, 30.0, -5.0)),
    ] {
        ctx.scene
            .add_point_light(PointLight::new(Color::WHITE, intensity, 100.0).at(position));
    }
    ctx.scene.set_ambient(AmbientLight::new(Color::WHITE, 0.2));

    ctx.load_typeface("helvetiker_regular.typeface.json", |ctx, result| {
        let font = match result {
            Ok(font) => font,
            Err(e) => {
                log::warn!("skipping text: {}", e);
                return;
            }
        };

        ctx.add_text(
            &font,
            "Hello, Three.js!",
            &TextGeometryParams::default(),
            Material::standard(Color::hex(0x00ff00)),
            Transform::from_position(Vec3::new(-5.0, 0.0, 0.0)),
        );
        ctx.add_overlay(OverlayElement::new(
            "text-box",
            "Hello, Vite App!",
            OverlayAnchor::CameraPosition,
        ));
    });
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().title("diorama").size(1280, 720);
    if let Err(e) = diorama::run(config, setup) {
        log::error!("event loop failed: {}", e);
        std::process::exit(1);
    }
}
