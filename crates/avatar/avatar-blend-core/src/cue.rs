//! One-shot cue handling.
//!
//! Each cue invocation is stamped with a fresh [`CueToken`]. A finished
//! notification is honored only when it names the active cue rig and carries
//! the active token; cancellation and teardown bump the generation so late
//! notifications from an older invocation fall through harmlessly.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::AvatarError;
use crate::ids::{CueKind, CueToken, Generation, RigId};
use crate::rig::RigRegistry;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActiveCue {
    pub kind: CueKind,
    pub token: CueToken,
}

#[derive(Debug, Default)]
pub struct CueHandler {
    generation: Generation,
    active: Option<ActiveCue>,
}

impl CueHandler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active(&self) -> Option<ActiveCue> {
        self.active
    }

    /// Whether `kind` can run: its rig must be loaded and carry a clip.
    pub fn can_start(kind: CueKind, rigs: &RigRegistry) -> Result<(), AvatarError> {
        match rigs.get(kind.rig()) {
            None => Err(AvatarError::InvalidTransition {
                reason: format!("cue '{kind}' requested but its rig is not loaded"),
            }),
            Some(rig) if !rig.mixer.has_clip() => Err(AvatarError::InvalidTransition {
                reason: format!("cue '{kind}' requested but its rig has no clip"),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Hard-cut to the cue rig and play it once from time 0.
    ///
    /// Fails without touching any rig when the cue rig is missing or has no
    /// clip (it could never report completion).
    pub fn start(&mut self, kind: CueKind, rigs: &mut RigRegistry) -> Result<ActiveCue, AvatarError> {
        Self::can_start(kind, rigs)?;
        let target = kind.rig();
        let token = self.generation.bump();
        for id in [RigId::Idle, RigId::Talk, kind.other().rig()] {
            if let Some(rig) = rigs.get_mut(id) {
                rig.mixer.stop();
                rig.alpha = 0.0;
            }
        }
        if let Some(rig) = rigs.get_mut(target) {
            rig.mixer.play_from_start(token);
            rig.alpha = 1.0;
        }

        let cue = ActiveCue { kind, token };
        self.active = Some(cue);
        debug!("cue '{kind}' started ({token:?})");
        Ok(cue)
    }

    /// Handle a finished notification from `rig`'s mixer. Returns the completed
    /// cue, or `InvalidTransition` for late or foreign notifications.
    pub fn finished(
        &mut self,
        rig: RigId,
        token: CueToken,
        rigs: &mut RigRegistry,
    ) -> Result<ActiveCue, AvatarError> {
        match self.active {
            Some(cue) if cue.kind.rig() == rig && cue.token == token => {
                self.active = None;
                restore_resting(rigs);
                debug!("cue '{}' finished ({token:?})", cue.kind);
                Ok(cue)
            }
            _ => Err(AvatarError::InvalidTransition {
                reason: format!("stale finished notification from '{rig}' ({token:?})"),
            }),
        }
    }

    /// Abort the active cue, if any, and restore the resting pose. Any
    /// notification still pending for it becomes stale.
    pub fn cancel(&mut self, rigs: &mut RigRegistry) -> Option<ActiveCue> {
        let cue = self.active.take()?;
        self.generation.bump();
        restore_resting(rigs);
        debug!("cue '{}' canceled ({:?})", cue.kind, cue.token);
        Some(cue)
    }

    /// Invalidate every outstanding token without touching rigs.
    pub fn invalidate(&mut self) {
        self.active = None;
        self.generation.bump();
    }
}

/// Cut every non-Idle rig to 0 and replay Idle from time 0 at full alpha.
fn restore_resting(rigs: &mut RigRegistry) {
    for id in [RigId::Talk, RigId::Dance, RigId::Jump] {
        if let Some(rig) = rigs.get_mut(id) {
            rig.mixer.stop();
            rig.alpha = 0.0;
        }
    }
    if let Some(idle) = rigs.get_mut(RigId::Idle) {
        idle.mixer.play_from_start(CueToken::default());
        idle.alpha = 1.0;
    }
}
