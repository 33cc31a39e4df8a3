//! Blend states and the Idle↔Talk crossfade.

use serde::{Deserialize, Serialize};

use crate::ids::{CueKind, RigId};

/// Controller mode. A crossfade in flight is tracked separately by [`Crossfade`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "cue", rename_all = "snake_case")]
pub enum BlendState {
    /// Idle visible, everything else faded out.
    #[default]
    Resting,
    /// Talk visible, Idle faded out.
    Speaking,
    /// A one-shot cue rig is the only visible rig.
    Cueing(CueKind),
}

impl BlendState {
    /// Looping rig that is fully visible once this state settles.
    #[inline]
    pub fn looping_rig(self) -> Option<RigId> {
        match self {
            BlendState::Resting => Some(RigId::Idle),
            BlendState::Speaking => Some(RigId::Talk),
            BlendState::Cueing(_) => None,
        }
    }
}

/// Linear interpolation of the Idle/Talk alphas toward `{0, 1}` targets.
///
/// Progress is `elapsed / duration` clamped to [0, 1]. Starting values are
/// whatever the alphas were when the fade began, so a fade that preempts
/// another continues from the current weights instead of snapping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crossfade {
    pub from: RigId,
    pub to: RigId,
    start_idle: f32,
    start_talk: f32,
    elapsed: f32,
    duration: f32,
}

impl Crossfade {
    /// Begin a fade toward `to` (Idle or Talk) from the current alphas.
    pub fn new(to: RigId, idle_alpha: f32, talk_alpha: f32, duration: f32) -> Self {
        let from = if to == RigId::Talk {
            RigId::Idle
        } else {
            RigId::Talk
        };
        Self {
            from,
            to,
            start_idle: idle_alpha,
            start_talk: talk_alpha,
            elapsed: 0.0,
            duration,
        }
    }

    #[inline]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Advance by `dt` seconds. Non-positive deltas leave progress unchanged.
    pub fn advance(&mut self, dt: f32) {
        if dt > 0.0 && dt.is_finite() {
            self.elapsed += dt;
        }
    }

    /// Current `(idle, talk)` alphas.
    pub fn alphas(&self) -> (f32, f32) {
        let p = self.progress();
        let (target_idle, target_talk) = if self.to == RigId::Talk {
            (0.0, 1.0)
        } else {
            (1.0, 0.0)
        };
        (
            self.start_idle + (target_idle - self.start_idle) * p,
            self.start_talk + (target_talk - self.start_talk) * p,
        )
    }
}
