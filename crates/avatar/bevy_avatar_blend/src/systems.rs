use avatar_blend_core::{AvatarEvent, Playback, RigOutput};
use bevy::animation::AnimationPlayer;
use bevy::color::Alpha;
use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;
use log::debug;

use crate::components::{AvatarRigClip, AvatarRigRoot};
use crate::resources::{AvatarBlend, AvatarFrame};
use crate::{AvatarCueCompleted, AvatarNotice, AvatarSignal};

/// Internal: collect `root` and every entity below it.
fn walk(e: Entity, children: &Query<&Children>, out: &mut Vec<Entity>) {
    out.push(e);
    if let Ok(cs) = children.get(e) {
        for &c in cs.iter() {
            walk(c, children, out);
        }
    }
}

/// Feed this frame's signals to the controller in arrival order.
pub fn forward_signals_system(mut signals: EventReader<AvatarSignal>, mut blend: ResMut<AvatarBlend>) {
    for AvatarSignal(cmd) in signals.read() {
        debug!("avatar signal {cmd:?}");
        blend.0.apply(*cmd);
    }
}

/// Advance the controller by the frame delta and stage the outputs.
pub fn tick_system(time: Res<Time>, mut blend: ResMut<AvatarBlend>, mut frame: ResMut<AvatarFrame>) {
    let out = blend.0.tick(time.delta_seconds());
    frame.outputs.clone_from(out);
}

/// Write the normalized root transform and visibility to each rig root.
/// Roots of rigs that are not loaded stay hidden.
pub fn apply_rig_roots_system(
    frame: Res<AvatarFrame>,
    mut roots: Query<(&AvatarRigRoot, &mut Transform, &mut Visibility)>,
) {
    for (root, mut tf, mut vis) in roots.iter_mut() {
        let want = match frame.outputs.rig(root.0) {
            Some(RigOutput { root: placed, visible, .. }) => {
                let translation = Vec3::from_array(placed.position);
                let scale = Vec3::splat(placed.scale);
                if tf.translation != translation || tf.scale != scale {
                    tf.translation = translation;
                    tf.scale = scale;
                }
                if *visible {
                    Visibility::Visible
                } else {
                    Visibility::Hidden
                }
            }
            None => Visibility::Hidden,
        };
        if *vis != want {
            *vis = want;
        }
    }
}

/// Pose every `AnimationPlayer` below a rig root at the controller's clip
/// time. Speed stays 0 so Bevy does not advance the clip a second time;
/// `HoldLast` pauses the clip and `Off` stops it.
pub fn apply_playback_system(
    frame: Res<AvatarFrame>,
    roots: Query<(Entity, &AvatarRigRoot, &AvatarRigClip)>,
    children: Query<&Children>,
    mut players: Query<&mut AnimationPlayer>,
) {
    let mut entities = Vec::new();
    for (entity, root, clip) in roots.iter() {
        let Some(rig) = frame.outputs.rig(root.0) else {
            continue;
        };
        entities.clear();
        walk(entity, &children, &mut entities);
        for e in entities.iter() {
            let Ok(mut player) = players.get_mut(*e) else {
                continue;
            };
            if rig.playback == Playback::Off {
                if player.is_playing_animation(clip.0) {
                    player.stop(clip.0);
                }
                continue;
            }
            let active = player.play(clip.0);
            active.set_speed(0.0).seek_to(rig.time);
            match rig.playback {
                Playback::Playing if active.is_paused() => {
                    active.resume();
                }
                Playback::HoldLast if !active.is_paused() => {
                    active.pause();
                }
                _ => {}
            }
        }
    }
}

/// Skinned meshes animate outside their bind-pose bounds; never cull them.
pub fn disable_culling_system(
    mut commands: Commands,
    roots: Query<Entity, With<AvatarRigRoot>>,
    children: Query<&Children>,
    unculled: Query<(), (With<Handle<Mesh>>, Without<NoFrustumCulling>)>,
) {
    let mut entities = Vec::new();
    for root in roots.iter() {
        walk(root, &children, &mut entities);
    }
    for e in entities {
        if unculled.contains(e) {
            commands.entity(e).insert(NoFrustumCulling);
        }
    }
}

/// Push each rig's blend opacity into the materials below its root. Skipped
/// when the app has no `StandardMaterial` assets (headless).
pub fn apply_materials_system(
    frame: Res<AvatarFrame>,
    roots: Query<(Entity, &AvatarRigRoot)>,
    children: Query<&Children>,
    handles: Query<&Handle<StandardMaterial>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let Some(mut materials) = materials else {
        return;
    };
    let mut entities = Vec::new();
    for (entity, root) in roots.iter() {
        let Some(rig) = frame.outputs.rig(root.0) else {
            continue;
        };
        let alpha_mode = if rig.depth_write {
            AlphaMode::Opaque
        } else {
            AlphaMode::Blend
        };
        entities.clear();
        walk(entity, &children, &mut entities);
        for e in entities.iter() {
            let Ok(handle) = handles.get(*e) else {
                continue;
            };
            let unchanged = materials.get(handle).map_or(true, |m| {
                m.base_color.alpha() == rig.opacity && m.alpha_mode == alpha_mode && m.double_sided
            });
            if unchanged {
                continue;
            }
            if let Some(mat) = materials.get_mut(handle) {
                mat.base_color = mat.base_color.with_alpha(rig.opacity);
                mat.alpha_mode = alpha_mode;
                mat.double_sided = true;
                mat.cull_mode = None;
            }
        }
    }
}

/// Re-emit controller events as Bevy events.
pub fn emit_events_system(
    frame: Res<AvatarFrame>,
    mut completed: EventWriter<AvatarCueCompleted>,
    mut notices: EventWriter<AvatarNotice>,
) {
    for event in frame.outputs.events.iter() {
        if let AvatarEvent::CueCompleted { kind, token } = event {
            completed.send(AvatarCueCompleted {
                kind: *kind,
                token: *token,
            });
        }
        notices.send(AvatarNotice(event.clone()));
    }
}
