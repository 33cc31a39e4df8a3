//! Per-rig playback cursor and the shared frame clock.
//!
//! A mixer owns one action (clip + loop mode) and its local time. Disabled
//! actions are skipped entirely so a hidden rig never drifts while nobody is
//! looking at it.

use serde::{Deserialize, Serialize};

use crate::ids::CueToken;

/// Single animation clip of a rig.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    /// Duration in seconds.
    pub duration: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Wrap around forever.
    Repeat,
    /// Play through once, then hold the last frame.
    OnceHold,
}

/// Playback state of an action. Replaces independent enabled/paused flags.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
    /// Not advanced, not contributing.
    Off,
    /// Parked on its current frame (a finished once-action).
    HoldLast,
    /// Advanced every tick.
    Playing,
}

/// Notification produced by [`Mixer::update`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MixerEvent {
    /// A once-action reached its end during this update.
    Finished { token: CueToken },
}

/// Playback cursor for one rig.
#[derive(Clone, Debug)]
pub struct Mixer {
    clip: Option<Clip>,
    mode: LoopMode,
    playback: Playback,
    time: f32,
    token: CueToken,
}

impl Mixer {
    pub fn new(clip: Option<Clip>, mode: LoopMode) -> Self {
        Self {
            clip,
            mode,
            playback: Playback::Off,
            time: 0.0,
            token: CueToken::default(),
        }
    }

    #[inline]
    pub fn clip(&self) -> Option<&Clip> {
        self.clip.as_ref()
    }

    #[inline]
    pub fn has_clip(&self) -> bool {
        self.clip.is_some()
    }

    #[inline]
    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    #[inline]
    pub fn playback(&self) -> Playback {
        self.playback
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Token stamped by the last [`Mixer::play_from_start`].
    #[inline]
    pub fn token(&self) -> CueToken {
        self.token
    }

    /// Rewind to time 0 and start playing. A rig without a clip stays Off.
    pub fn play_from_start(&mut self, token: CueToken) {
        self.time = 0.0;
        self.token = token;
        self.playback = if self.clip.is_some() {
            Playback::Playing
        } else {
            Playback::Off
        };
    }

    /// Resume from the current time without rewinding.
    pub fn resume(&mut self) {
        if self.clip.is_some() {
            self.playback = Playback::Playing;
        }
    }

    /// Stop advancing; the committed time is kept.
    pub fn stop(&mut self) {
        self.playback = Playback::Off;
    }

    /// Reset, play, and advance by `step` so the first visible frame is posed.
    pub fn prewarm(&mut self, step: f32, token: CueToken) -> Option<MixerEvent> {
        self.play_from_start(token);
        self.update(step)
    }

    /// Advance local time by `dt`. Non-positive or non-finite deltas are ignored.
    pub fn update(&mut self, dt: f32) -> Option<MixerEvent> {
        if self.playback != Playback::Playing || !(dt > 0.0) || !dt.is_finite() {
            return None;
        }
        let duration = match &self.clip {
            Some(c) if c.duration > 0.0 => c.duration,
            Some(_) => {
                // Zero-length clip: a once-action finishes immediately.
                return self.finish(0.0);
            }
            None => return None,
        };

        let t = self.time + dt;
        match self.mode {
            LoopMode::Repeat => {
                self.time = t % duration;
                None
            }
            LoopMode::OnceHold => {
                if t >= duration {
                    self.finish(duration)
                } else {
                    self.time = t;
                    None
                }
            }
        }
    }

    fn finish(&mut self, at: f32) -> Option<MixerEvent> {
        self.time = at;
        match self.mode {
            LoopMode::Repeat => None,
            LoopMode::OnceHold => {
                self.playback = Playback::HoldLast;
                Some(MixerEvent::Finished { token: self.token })
            }
        }
    }
}

/// Shared frame clock: turns host timestamps into clamped per-frame deltas.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    last: Option<f64>,
    max_delta: Option<f32>,
}

impl FrameClock {
    pub fn new(max_delta: Option<f32>) -> Self {
        Self {
            last: None,
            max_delta,
        }
    }

    /// Delta in seconds since the previous call. The first call returns 0.
    /// Timestamps that go backwards yield 0 rather than a negative delta.
    pub fn delta(&mut self, now_seconds: f64) -> f32 {
        let prev = self.last.replace(now_seconds);
        let raw = match prev {
            Some(p) => (now_seconds - p).max(0.0) as f32,
            None => 0.0,
        };
        self.clamp(raw)
    }

    /// Apply the pathological-delta cap.
    #[inline]
    pub fn clamp(&self, dt: f32) -> f32 {
        match self.max_delta {
            Some(max) if dt > max => max,
            _ => dt,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
