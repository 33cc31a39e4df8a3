//! Avatar Blend Core (engine-agnostic)
//!
//! Animation blend controller for a talking avatar assembled from four
//! independently authored rigs (idle, talk, dance, jump). The crate owns the
//! rigs, advances their playback clocks each frame, crossfades Idle↔Talk,
//! hard-cuts into one-shot cues, and normalizes every rig to one shared height
//! and ground plane. Rendering, audio, and asset transport belong to adapters.

pub mod blend;
pub mod config;
pub mod controller;
pub mod cue;
pub mod error;
pub mod ids;
pub mod inputs;
pub mod mixer;
pub mod normalize;
pub mod outputs;
pub mod rig;
pub mod scene;

// Re-exports for consumers (adapters)
pub use blend::{BlendState, Crossfade};
pub use config::Config;
pub use controller::{AvatarController, CueCompletedFn};
pub use cue::{ActiveCue, CueHandler};
pub use error::AvatarError;
pub use ids::{CueKind, CueToken, RigId};
pub use inputs::AvatarCommand;
pub use mixer::{Clip, FrameClock, LoopMode, Mixer, MixerEvent, Playback};
pub use normalize::{AlignReport, ExtentSource};
pub use outputs::{AvatarEvent, CrossfadeView, Outputs, RigOutput};
pub use rig::{AnimationRig, RigAsset, RigRegistry, RigSource, RootTransform};
pub use scene::{Aabb, Material, Mesh, Scene, SceneNode, Skin, Transform};
