use avatar_blend_core::{BlendState, Config};
use bevy::prelude::*;
use bevy_avatar_blend::{AvatarBlend, AvatarBlendPlugin, AvatarFrame};

#[test]
fn plugin_inserts_controller_resource() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(AvatarBlendPlugin::default());

    assert!(app.world().get_resource::<AvatarBlend>().is_some());
    assert!(app.world().get_resource::<AvatarFrame>().is_some());
}

#[test]
fn plugin_config_reaches_the_controller() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(AvatarBlendPlugin {
            config: Config {
                blend_duration: 0.25,
                ..Config::default()
            },
        });

    let blend = app.world().resource::<AvatarBlend>();
    assert_eq!(blend.0.config().blend_duration, 0.25);
}

/// With no rigs loaded the frame still ticks and reports an idle, unready avatar.
#[test]
fn empty_controller_ticks_without_panicking() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(AvatarBlendPlugin::default());

    for _ in 0..5 {
        app.update();
    }
    let frame = app.world().resource::<AvatarFrame>();
    assert!(!frame.outputs.ready);
    assert!(frame.outputs.rigs.is_empty());
    assert_eq!(frame.outputs.state, BlendState::Resting);
}
