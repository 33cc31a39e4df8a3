//! Error taxonomy for the blend controller.
//!
//! None of these are fatal: the controller logs and degrades at its boundary.
//! Only configuration and asset parsing surface errors to the caller.

use crate::ids::RigId;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AvatarError {
    /// Missing or corrupt rig asset.
    #[error("failed to load rig '{rig}': {reason}")]
    AssetLoad { rig: RigId, reason: String },

    /// Empty or degenerate extents; the rig keeps its authored transform.
    #[error("cannot normalize rig '{rig}': {reason}")]
    Normalization { rig: RigId, reason: String },

    /// Unknown cue kind, or an event that does not match the active cue.
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },

    #[error("config error: {0}")]
    Config(String),
}

impl AvatarError {
    pub(crate) fn asset(rig: RigId, reason: impl Into<String>) -> Self {
        AvatarError::AssetLoad {
            rig,
            reason: reason.into(),
        }
    }

    pub(crate) fn normalization(rig: RigId, reason: impl Into<String>) -> Self {
        AvatarError::Normalization {
            rig,
            reason: reason.into(),
        }
    }
}
