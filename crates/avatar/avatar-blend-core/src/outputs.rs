//! Output contracts from the controller.
//!
//! Every tick yields the render-facing view of each loaded rig plus the
//! semantic events raised during that tick. Adapters (Bevy/WASM) apply the rig
//! views to the host scene and transport the events.

use serde::{Deserialize, Serialize};

use crate::blend::BlendState;
use crate::ids::{CueKind, CueToken, RigId};
use crate::mixer::Playback;
use crate::rig::RootTransform;

/// Render-facing state of one rig.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigOutput {
    pub rig: RigId,
    /// Committed blend weight.
    pub alpha: f32,
    /// Opacity written to materials (0 until normalization completes).
    pub opacity: f32,
    pub visible: bool,
    pub depth_write: bool,
    pub playback: Playback,
    /// Local animation time in seconds.
    pub time: f32,
    pub root: RootTransform,
}

/// In-flight Idle/Talk crossfade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossfadeView {
    pub from: RigId,
    pub to: RigId,
    pub progress: f32,
}

/// Discrete signals raised during a tick or an event handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum AvatarEvent {
    /// Normalization finished; rigs are now rendered.
    Ready,
    StateChanged { from: BlendState, to: BlendState },
    CrossfadeFinished { to: RigId },
    CueStarted { kind: CueKind, token: CueToken },
    CueCompleted { kind: CueKind, token: CueToken },
    CueCanceled { kind: CueKind, token: CueToken },
}

/// Outputs returned by `AvatarController::tick()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    pub ready: bool,
    #[serde(default)]
    pub state: BlendState,
    #[serde(default)]
    pub crossfade: Option<CrossfadeView>,
    #[serde(default)]
    pub rigs: Vec<RigOutput>,
    #[serde(default)]
    pub events: Vec<AvatarEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.rigs.clear();
        self.events.clear();
        self.crossfade = None;
    }

    #[inline]
    pub fn push_event(&mut self, event: AvatarEvent) {
        self.events.push(event);
    }

    pub fn rig(&self, id: RigId) -> Option<&RigOutput> {
        self.rigs.iter().find(|r| r.rig == id)
    }
}
