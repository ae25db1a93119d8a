//! End-to-end tests: hierarchy → sort order → submission → device commands

use std::f32::consts::FRAC_PI_2;
use xr_engine::config::{Config, ConfigFormat};
use xr_engine::foundation::hash::hash;
use xr_engine::prelude::*;
use xr_engine::render::assets::DeferredAssetLoader;
use xr_engine::render::device::{DeviceCommand, RecordingDevice};
use xr_engine::render::pass::ClearFlags;

fn scene(config: &RenderConfig) -> Scene {
    let mut scene = Scene::new(
        config,
        Box::new(RecordingDevice::new()),
        Box::new(DeferredAssetLoader::new()),
    )
    .unwrap();
    let _camera = scene
        .cameras_mut()
        .create_screen_camera(0.1, 100.0, FRAC_PI_2, Viewport::new(0, 0, 100, 100));
    scene
}

fn def(pass: &str, mesh: &str) -> RenderDef {
    RenderDef {
        pass: pass.into(),
        mesh: Some(mesh.into()),
        shader: Some("shaders/flat".into()),
        ..RenderDef::default()
    }
}

fn spawn(scene: &mut Scene, parent: Option<Entity>, local: Sqt, def: &RenderDef) -> Entity {
    let entity = scene.create_entity(local);
    if let Some(parent) = parent {
        scene.set_parent(entity, parent);
    }
    scene.create_renderable(entity, def);
    entity
}

fn frame(scene: &mut Scene) -> Vec<DeviceCommand> {
    scene.update();
    let (render, _) = scene.render_system_mut();
    render
        .device_as_mut::<RecordingDevice>()
        .unwrap()
        .clear_commands();
    scene.render();
    scene
        .render_system()
        .device_as::<RecordingDevice>()
        .unwrap()
        .commands()
        .to_vec()
}

fn meshes(commands: &[DeviceCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::Draw(draw) => Some(draw.mesh.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_main_pass_follows_hierarchy() {
    let mut scene = scene(&RenderConfig::default());
    let root = spawn(&mut scene, None, Sqt::default(), &def("Main", "root"));
    let first = spawn(&mut scene, Some(root), Sqt::default(), &def("Main", "first"));
    let second = spawn(&mut scene, Some(root), Sqt::default(), &def("Main", "second"));
    let _nested = spawn(&mut scene, Some(first), Sqt::default(), &def("Main", "nested"));

    assert_eq!(meshes(&frame(&mut scene)), ["root", "first", "nested", "second"]);

    scene.move_to_index(second, 0);
    assert_eq!(meshes(&frame(&mut scene)), ["root", "second", "first", "nested"]);

    // Large enough to borrow from the parent's level.
    scene.set_sort_order_offset(first, -15);
    assert_eq!(meshes(&frame(&mut scene)), ["first", "nested", "root", "second"]);
}

#[test]
fn test_hidden_and_disabled_entities_are_skipped() {
    let mut scene = scene(&RenderConfig::default());
    let shown = spawn(&mut scene, None, Sqt::default(), &def("Main", "shown"));
    let hidden = spawn(&mut scene, None, Sqt::default(), &def("Main", "hidden"));
    let parent = spawn(&mut scene, None, Sqt::default(), &def("Main", "parent"));
    let _child = spawn(&mut scene, Some(parent), Sqt::default(), &def("Main", "child"));

    scene.render_system_mut().0.hide(hidden);
    scene.set_enabled(parent, false);
    assert_eq!(meshes(&frame(&mut scene)), ["shown"]);

    scene.render_system_mut().0.hide(shown);
    scene.render_system_mut().0.show(hidden);
    scene.set_enabled(parent, true);
    assert_eq!(meshes(&frame(&mut scene)), ["hidden", "parent", "child"]);
}

#[test]
fn test_opaque_pass_front_to_back_then_blended() {
    let mut scene = scene(&RenderConfig::default());
    let at = |z: f32| Sqt::from_translation(Vec3::new(0.0, 0.0, z));
    spawn(&mut scene, None, at(-10.0), &def("Opaque", "far"));
    spawn(&mut scene, None, at(-2.0), &def("Opaque", "near"));
    let glass = spawn(&mut scene, None, at(-5.0), &def("Opaque", "glass"));
    scene
        .render_system_mut()
        .0
        .set_color(glass, Vec4::new(1.0, 1.0, 1.0, 0.5));

    let commands = frame(&mut scene);
    assert_eq!(meshes(&commands), ["near", "far", "glass"]);

    let last_state = commands
        .iter()
        .take_while(|command| !matches!(command, DeviceCommand::Draw(draw) if draw.mesh == "glass"))
        .filter_map(|command| match command {
            DeviceCommand::SetRenderState(state) => Some(*state),
            _ => None,
        })
        .last()
        .unwrap();
    assert!(last_state.blend.enabled);
    assert!(!last_state.depth.write_enabled);
}

#[test]
fn test_fixed_pipeline_draws_translucent_as_opaque() {
    let config = RenderConfig::default().with_backend(BackendKind::FixedPipeline);
    let mut scene = scene(&config);
    let glass = spawn(&mut scene, None, Sqt::default(), &def("Opaque", "glass"));
    scene
        .render_system_mut()
        .0
        .set_color(glass, Vec4::new(1.0, 1.0, 1.0, 0.5));

    let commands = frame(&mut scene);
    assert_eq!(meshes(&commands), ["glass"]);
    assert!(commands
        .iter()
        .all(|command| !matches!(command, DeviceCommand::SetRenderState(state) if state.blend.enabled)));
}

#[test]
fn test_mirrored_entities_flip_winding() {
    let mut scene = scene(&RenderConfig::default());
    let mirrored = Sqt {
        scale: Vec3::new(-1.0, 1.0, 1.0),
        ..Sqt::default()
    };
    spawn(&mut scene, None, mirrored, &def("Main", "mirror"));

    let faces: Vec<_> = frame(&mut scene)
        .into_iter()
        .filter(|command| matches!(command, DeviceCommand::SetFrontFace(_) | DeviceCommand::Draw(_)))
        .collect();
    assert_eq!(faces.len(), 3);
    assert!(matches!(faces[0], DeviceCommand::SetFrontFace(face) if face != Default::default()));
    assert!(matches!(faces[1], DeviceCommand::Draw(_)));
    assert!(matches!(faces[2], DeviceCommand::SetFrontFace(face) if face == Default::default()));
}

#[test]
fn test_stencil_is_set_and_reset_around_draw() {
    let mut scene = scene(&RenderConfig::default());
    let mask = RenderDef {
        stencil_mode: StencilMode::Write,
        stencil_value: 3,
        ..def("Main", "mask")
    };
    spawn(&mut scene, None, Sqt::default(), &mask);

    let stencils: Vec<_> = frame(&mut scene)
        .into_iter()
        .filter_map(|command| match command {
            DeviceCommand::SetStencil(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(stencils.len(), 2);
    assert_eq!(stencils[0], StencilMode::Write.to_state(3));
    assert!(!stencils[1].enabled);
}

#[test]
fn test_configured_pass_is_drawn_last() {
    let text = r#"
[[passes]]
name = "Hud"
sort_mode = "SortOrderDecreasing"
render_target = "hud"

[passes.clear_params]
flags = "DEPTH"
"#;
    let config = RenderConfig::from_str_with_format(text, ConfigFormat::Toml).unwrap();
    let mut scene = scene(&config);
    spawn(&mut scene, None, Sqt::default(), &def("Main", "world"));
    spawn(&mut scene, None, Sqt::default(), &def("Hud", "label"));
    spawn(&mut scene, None, Sqt::default(), &def("Hud", "icon"));

    let commands = frame(&mut scene);
    assert_eq!(meshes(&commands), ["world", "icon", "label"]);

    let hud_start = commands
        .iter()
        .position(|command| *command == DeviceCommand::SetRenderTarget(Some(hash("hud"))))
        .unwrap();
    assert!(matches!(
        &commands[hud_start + 1],
        DeviceCommand::Clear(params) if params.flags == ClearFlags::DEPTH
    ));
    assert!(commands[hud_start..].contains(&DeviceCommand::SetRenderTarget(None)));
}

#[test]
fn test_assets_gate_first_frame() {
    let mut scene = scene(&RenderConfig::default());
    let entity = scene.create_entity(Sqt::default());
    scene.create_renderable(entity, &def("Main", "late"));

    scene.render();
    let drawn = scene
        .render_system()
        .device_as::<RecordingDevice>()
        .unwrap()
        .draws()
        .count();
    assert_eq!(drawn, 0);

    assert_eq!(meshes(&frame(&mut scene)), ["late"]);
}
