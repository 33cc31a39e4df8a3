//! Input contracts for the controller.
//!
//! Hosts either call the controller's entry points directly or forward a batch
//! of [`AvatarCommand`]s (adapters deserialize these from events or JSON).

use serde::{Deserialize, Serialize};

use crate::ids::CueKind;

/// Edge-triggered signal from the surrounding application.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvatarCommand {
    /// Speech playback started.
    SpeechStarted,
    /// Speech playback ended (or failed).
    SpeechEnded,
    RequestCue {
        kind: CueKind,
    },
    CancelCue,
}
