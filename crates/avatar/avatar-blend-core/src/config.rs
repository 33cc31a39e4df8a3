//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::error::AvatarError;

/// Tunables for normalization, crossfades, and the frame clock.
/// Every field has a default, so partial JSON objects are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target character height in world units.
    pub desired_height: f32,
    /// Idle/Talk crossfade duration in seconds.
    pub blend_duration: f32,
    /// Time advanced when pre-warming an action so its first visible frame is posed.
    pub prewarm_step: f32,
    /// Relative height error above which the aligner applies a corrective scale.
    pub height_tolerance: f32,
    /// Lower bound for a measured height before dividing by it.
    pub min_extent: f32,
    /// Largest delta a single tick may advance. `None` disables clamping.
    pub max_frame_delta: Option<f32>,
    /// Rigs whose effective alpha is at or below this are hidden.
    pub visibility_threshold: f32,
    /// Depth writes are enabled only at or above this alpha.
    pub depth_write_threshold: f32,
    /// Seconds between `speech_started` and the Idle→Talk transition. Zero is immediate.
    pub speech_onset_delay: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desired_height: 1.4,
            blend_duration: 0.4,
            prewarm_step: 0.016,
            height_tolerance: 0.01,
            min_extent: 1e-6,
            max_frame_delta: Some(1.0 / 15.0),
            visibility_threshold: 0.02,
            depth_write_threshold: 0.99,
            speech_onset_delay: 0.0,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json(s: &str) -> Result<Self, AvatarError> {
        let cfg: Config =
            serde_json::from_str(s).map_err(|e| AvatarError::Config(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AvatarError> {
        fn non_negative(name: &str, v: f32) -> Result<(), AvatarError> {
            if !v.is_finite() || v < 0.0 {
                return Err(AvatarError::Config(format!(
                    "{name} must be finite and >= 0 (got {v})"
                )));
            }
            Ok(())
        }

        if !self.desired_height.is_finite() || self.desired_height <= 0.0 {
            return Err(AvatarError::Config(format!(
                "desired_height must be > 0 (got {})",
                self.desired_height
            )));
        }
        non_negative("blend_duration", self.blend_duration)?;
        non_negative("prewarm_step", self.prewarm_step)?;
        non_negative("height_tolerance", self.height_tolerance)?;
        non_negative("speech_onset_delay", self.speech_onset_delay)?;
        if !self.min_extent.is_finite() || self.min_extent <= 0.0 {
            return Err(AvatarError::Config("min_extent must be > 0".into()));
        }
        if let Some(max) = self.max_frame_delta {
            if !max.is_finite() || max <= 0.0 {
                return Err(AvatarError::Config(format!(
                    "max_frame_delta must be > 0 when set (got {max})"
                )));
            }
        }
        for (name, v) in [
            ("visibility_threshold", self.visibility_threshold),
            ("depth_write_threshold", self.depth_write_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AvatarError::Config(format!("{name} must be in [0,1]")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{ "blend_duration": 0.25 }"#).unwrap();
        assert_eq!(cfg.blend_duration, 0.25);
        assert_eq!(cfg.desired_height, 1.4);
        assert_eq!(cfg.max_frame_delta, Some(1.0 / 15.0));
    }

    #[test]
    fn null_delta_disables_clamp() {
        let cfg = Config::from_json(r#"{ "max_frame_delta": null }"#).unwrap();
        assert_eq!(cfg.max_frame_delta, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_json(r#"{ "desired_height": 0 }"#).is_err());
        assert!(Config::from_json(r#"{ "blend_duration": -1 }"#).is_err());
        assert!(Config::from_json(r#"{ "depth_write_threshold": 2 }"#).is_err());
        assert!(Config::from_json("not json").is_err());
    }
}
