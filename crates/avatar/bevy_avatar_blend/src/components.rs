use avatar_blend_core::RigId;
use bevy::animation::graph::AnimationNodeIndex;
use bevy::prelude::*;

/// Marker for the entity that hosts one rig's scene. The plugin writes the
/// normalized root `Transform` and `Visibility` here and the blend opacity to
/// every `StandardMaterial` below it.
#[derive(Component, Copy, Clone, Debug, PartialEq, Eq)]
pub struct AvatarRigRoot(pub RigId);

/// Animation graph node of the rig's clip, placed on the same entity as
/// [`AvatarRigRoot`]. Every `AnimationPlayer` below the root is seeked to the
/// controller's clip time each frame; the controller owns time, so the player
/// never advances on its own.
#[derive(Component, Copy, Clone, Debug, PartialEq, Eq)]
pub struct AvatarRigClip(pub AnimationNodeIndex);
