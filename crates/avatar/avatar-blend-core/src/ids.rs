//! Identifiers for rigs, cues, and cue invocations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AvatarError;

/// One of the four rigs the avatar is assembled from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigId {
    Idle,
    Talk,
    Dance,
    Jump,
}

impl RigId {
    /// All rigs in load order.
    pub const ALL: [RigId; 4] = [RigId::Idle, RigId::Talk, RigId::Dance, RigId::Jump];

    /// The resting rig. It is never removed, only faded out.
    pub const RESTING: RigId = RigId::Idle;

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            RigId::Idle => "idle",
            RigId::Talk => "talk",
            RigId::Dance => "dance",
            RigId::Jump => "jump",
        }
    }

    /// Cue kind played by this rig, if it is a cue rig.
    #[inline]
    pub fn cue(self) -> Option<CueKind> {
        match self {
            RigId::Dance => Some(CueKind::Dance),
            RigId::Jump => Some(CueKind::Jump),
            RigId::Idle | RigId::Talk => None,
        }
    }

    /// Looping rigs repeat forever; cue rigs play once and hold the last frame.
    #[inline]
    pub fn is_looping(self) -> bool {
        self.cue().is_none()
    }
}

impl fmt::Display for RigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RigId {
    type Err = AvatarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(RigId::Idle),
            "talk" => Ok(RigId::Talk),
            "dance" => Ok(RigId::Dance),
            "jump" => Ok(RigId::Jump),
            other => Err(AvatarError::InvalidTransition {
                reason: format!("unknown rig '{other}'"),
            }),
        }
    }
}

/// One-shot gesture cue.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Dance,
    Jump,
}

impl CueKind {
    #[inline]
    pub fn rig(self) -> RigId {
        match self {
            CueKind::Dance => RigId::Dance,
            CueKind::Jump => RigId::Jump,
        }
    }

    /// The cue rig that is not this one.
    #[inline]
    pub fn other(self) -> CueKind {
        match self {
            CueKind::Dance => CueKind::Jump,
            CueKind::Jump => CueKind::Dance,
        }
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rig().name())
    }
}

impl FromStr for CueKind {
    type Err = AvatarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dance" => Ok(CueKind::Dance),
            "jump" => Ok(CueKind::Jump),
            other => Err(AvatarError::InvalidTransition {
                reason: format!("unknown cue '{other}'"),
            }),
        }
    }
}

/// Stamp identifying one cue invocation. Finished notifications carrying a stale
/// token are ignored.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CueToken(pub u64);

/// Monotonic allocator for CueToken.
#[derive(Default, Debug)]
pub struct Generation {
    next: u64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token; every token handed out before is now stale.
    #[inline]
    pub fn bump(&mut self) -> CueToken {
        self.next = self.next.wrapping_add(1);
        CueToken(self.next)
    }

    #[inline]
    pub fn current(&self) -> CueToken {
        CueToken(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_monotonic() {
        let mut gen = Generation::new();
        let a = gen.bump();
        let b = gen.bump();
        assert!(b > a);
        assert_eq!(gen.current(), b);
    }

    #[test]
    fn parse_names() {
        assert_eq!("Dance".parse::<CueKind>().unwrap(), CueKind::Dance);
        assert_eq!(" jump ".parse::<CueKind>().unwrap(), CueKind::Jump);
        assert!("idle".parse::<CueKind>().is_err());
        assert_eq!("talk".parse::<RigId>().unwrap(), RigId::Talk);
        assert!("wave".parse::<RigId>().is_err());
    }

    #[test]
    fn cue_rig_mapping() {
        assert_eq!(CueKind::Dance.rig(), RigId::Dance);
        assert_eq!(CueKind::Dance.other(), CueKind::Jump);
        assert_eq!(RigId::Jump.cue(), Some(CueKind::Jump));
        assert!(RigId::Idle.is_looping());
        assert!(!RigId::Dance.is_looping());
    }
}
