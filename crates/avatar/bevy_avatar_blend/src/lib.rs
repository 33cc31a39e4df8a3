use avatar_blend_core::{AvatarCommand, AvatarController, AvatarEvent, Config, CueKind, CueToken};
use bevy::prelude::*;

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{AvatarRigClip, AvatarRigRoot};
pub use resources::{AvatarBlend, AvatarFrame};

/// Inbound speech/cue signal, forwarded to the controller before the tick.
#[derive(Event, Copy, Clone, Debug, PartialEq, Eq)]
pub struct AvatarSignal(pub AvatarCommand);

/// Outbound: a cue played to its end this frame.
#[derive(Event, Copy, Clone, Debug, PartialEq, Eq)]
pub struct AvatarCueCompleted {
    pub kind: CueKind,
    pub token: CueToken,
}

/// Outbound: every controller event of this frame, in order.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct AvatarNotice(pub AvatarEvent);

#[derive(Default)]
pub struct AvatarBlendPlugin {
    pub config: Config,
}

impl Plugin for AvatarBlendPlugin {
    fn build(&self, app: &mut App) {
        // Hosts may insert a pre-loaded controller before adding the plugin.
        if !app.world().contains_resource::<AvatarBlend>() {
            app.insert_resource(AvatarBlend(AvatarController::new(self.config.clone())));
        }
        app.init_resource::<AvatarFrame>()
            .add_event::<AvatarSignal>()
            .add_event::<AvatarCueCompleted>()
            .add_event::<AvatarNotice>()
            .add_systems(
                Update,
                (
                    systems::forward_signals_system,
                    systems::tick_system,
                    systems::apply_rig_roots_system,
                    systems::apply_playback_system,
                    systems::disable_culling_system,
                    systems::apply_materials_system,
                    systems::emit_events_system,
                )
                    .chain(),
            );
    }
}
