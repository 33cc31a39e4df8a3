use avatar_blend_core::{AvatarController, Outputs};
use bevy::prelude::*;

/// The controller, owned by the ECS world.
#[derive(Resource, Debug, Default)]
pub struct AvatarBlend(pub AvatarController);

/// Outputs of this frame's tick, staged for the apply systems
/// (keeps ordering explicit: Tick -> Apply -> Emit).
#[derive(Resource, Debug, Default)]
pub struct AvatarFrame {
    pub outputs: Outputs,
}
