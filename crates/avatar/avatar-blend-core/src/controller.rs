//! AvatarController: owns the rigs and drives every per-frame step.
//!
//! Event handlers (`on_speech_started`, `request_cue`, ...) settle the target
//! state immediately; the host then calls [`AvatarController::tick`] once per
//! rendered frame. The controller never schedules work on its own, so dropping
//! it or calling [`AvatarController::teardown`] leaves nothing behind.
//!
//! Tick order:
//! 1. second normalization pass (once, on the first tick after loading)
//! 2. speech onset countdown
//! 3. crossfade step
//! 4. mixer advance, then finished notifications
//! 5. opacity write-back and output snapshot

use std::fmt;

use log::{debug, warn};

use crate::blend::{BlendState, Crossfade};
use crate::config::Config;
use crate::cue::{ActiveCue, CueHandler};
use crate::error::AvatarError;
use crate::ids::{CueKind, CueToken, RigId};
use crate::inputs::AvatarCommand;
use crate::mixer::{FrameClock, MixerEvent, Playback};
use crate::normalize;
use crate::outputs::{AvatarEvent, CrossfadeView, Outputs, RigOutput};
use crate::rig::{AnimationRig, RigRegistry, RigSource};

/// Completion hook fired once per finished cue.
pub type CueCompletedFn = Box<dyn FnMut(CueKind) + Send + Sync>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    /// Nothing loaded yet.
    Empty,
    /// Shared scale applied; alignment runs on the next tick.
    Scaled,
    Ready,
}

pub struct AvatarController {
    cfg: Config,
    clock: FrameClock,
    rigs: RigRegistry,
    state: BlendState,
    crossfade: Option<Crossfade>,
    cues: CueHandler,
    /// Latest speech signal, tracked even while a cue owns the screen.
    speaking: bool,
    /// Seconds left before a delayed speech onset takes effect.
    onset: Option<f32>,
    phase: Phase,
    pending: Vec<AvatarEvent>,
    on_cue_completed: Option<CueCompletedFn>,
    torn_down: bool,
    outputs: Outputs,
}

impl fmt::Debug for AvatarController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarController")
            .field("state", &self.state)
            .field("crossfade", &self.crossfade)
            .field("active_cue", &self.cues.active())
            .field("speaking", &self.speaking)
            .field("phase", &self.phase)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl Default for AvatarController {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AvatarController {
    pub fn new(cfg: Config) -> Self {
        Self {
            clock: FrameClock::new(cfg.max_frame_delta),
            cfg,
            rigs: RigRegistry::new(),
            state: BlendState::Resting,
            crossfade: None,
            cues: CueHandler::new(),
            speaking: false,
            onset: None,
            phase: Phase::Empty,
            pending: Vec::new(),
            on_cue_completed: None,
            torn_down: false,
            outputs: Outputs::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn state(&self) -> BlendState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    #[inline]
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    #[inline]
    pub fn crossfade(&self) -> Option<&Crossfade> {
        self.crossfade.as_ref()
    }

    #[inline]
    pub fn active_cue(&self) -> Option<ActiveCue> {
        self.cues.active()
    }

    #[inline]
    pub fn rig(&self, id: RigId) -> Option<&AnimationRig> {
        self.rigs.get(id)
    }

    #[inline]
    pub fn registry(&self) -> &RigRegistry {
        &self.rigs
    }

    /// Committed alpha of `id`, 0 when the rig is not loaded.
    #[inline]
    pub fn alpha(&self, id: RigId) -> f32 {
        self.rigs.get(id).map_or(0.0, |r| r.alpha)
    }

    /// Outputs of the most recent tick.
    #[inline]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn set_on_cue_completed(&mut self, f: CueCompletedFn) {
        if !self.torn_down {
            self.on_cue_completed = Some(f);
        }
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Load one rig (cached after the first success), put it into the playback
    /// state the current blend state expects, and redo the scale pass.
    pub fn load_rig(&mut self, id: RigId, source: &mut dyn RigSource) -> Result<(), AvatarError> {
        if self.torn_down {
            return Err(AvatarError::InvalidTransition {
                reason: "controller was torn down".into(),
            });
        }
        if self.rigs.contains(id) {
            return Ok(());
        }
        let prewarm = self.cfg.prewarm_step;
        let depth_write_threshold = self.cfg.depth_write_threshold;
        let visible = self.state.looping_rig() == Some(id) && self.crossfade.is_none();
        let rig = self.rigs.load_rig(id, source)?;
        if visible {
            rig.mixer.prewarm(prewarm, CueToken::default());
            rig.alpha = 1.0;
        } else {
            rig.mixer.stop();
            rig.alpha = 0.0;
        }
        // Hidden until the aligner has placed it.
        rig.apply_opacity(0.0, depth_write_threshold);
        normalize::scale_pass(&mut self.rigs, &self.cfg);
        self.phase = Phase::Scaled;
        Ok(())
    }

    /// Load all four rigs. Failures are logged and the rig is left out;
    /// returns how many rigs are loaded afterwards.
    pub fn load_rigs(&mut self, source: &mut dyn RigSource) -> usize {
        for id in RigId::ALL {
            if let Err(e) = self.load_rig(id, source) {
                warn!("{e}");
            }
        }
        self.rigs.iter().count()
    }

    // ---------------------------------------------------------------------
    // External signals
    // ---------------------------------------------------------------------

    pub fn apply(&mut self, cmd: AvatarCommand) {
        match cmd {
            AvatarCommand::SpeechStarted => self.on_speech_started(),
            AvatarCommand::SpeechEnded => self.on_speech_ended(),
            AvatarCommand::RequestCue { kind } => self.request_cue(kind),
            AvatarCommand::CancelCue => self.cancel_cue(),
        }
    }

    pub fn on_speech_started(&mut self) {
        if self.torn_down || self.speaking || self.onset.is_some() {
            return;
        }
        if self.cfg.speech_onset_delay > 0.0 {
            debug!("speech onset armed ({}s)", self.cfg.speech_onset_delay);
            self.onset = Some(self.cfg.speech_onset_delay);
            return;
        }
        self.begin_speaking();
    }

    pub fn on_speech_ended(&mut self) {
        if self.torn_down {
            return;
        }
        self.onset = None;
        if !self.speaking {
            return;
        }
        self.speaking = false;
        if self.state != BlendState::Speaking {
            // A cue owns the screen; completion returns to Resting anyway.
            return;
        }
        self.warm_up(RigId::Idle);
        if let Some(talk) = self.rigs.get_mut(RigId::Talk) {
            talk.mixer.resume();
        }
        self.start_crossfade(RigId::Idle);
        self.set_state(BlendState::Resting);
    }

    /// Start (or preempt into) a one-shot cue. Requests for a missing rig or
    /// for the cue already playing are ignored.
    pub fn request_cue(&mut self, kind: CueKind) {
        if self.torn_down {
            return;
        }
        if let Some(active) = self.cues.active() {
            if active.kind == kind {
                debug!("cue '{kind}' already playing; request ignored");
                return;
            }
        }
        if let Err(e) = CueHandler::can_start(kind, &self.rigs) {
            warn!("{e}");
            return;
        }

        self.crossfade = None;
        if let Some(prev) = self.cues.cancel(&mut self.rigs) {
            self.pending.push(AvatarEvent::CueCanceled {
                kind: prev.kind,
                token: prev.token,
            });
        }
        match self.cues.start(kind, &mut self.rigs) {
            Ok(cue) => {
                self.set_state(BlendState::Cueing(kind));
                self.pending.push(AvatarEvent::CueStarted {
                    kind,
                    token: cue.token,
                });
            }
            Err(e) => {
                warn!("{e}");
                self.set_state(BlendState::Resting);
                self.resume_after_cue();
            }
        }
    }

    /// Abort the active cue, returning to Resting (or Speaking when speech is
    /// still playing).
    pub fn cancel_cue(&mut self) {
        if self.torn_down {
            return;
        }
        let Some(cue) = self.cues.cancel(&mut self.rigs) else {
            return;
        };
        self.pending.push(AvatarEvent::CueCanceled {
            kind: cue.kind,
            token: cue.token,
        });
        self.set_state(BlendState::Resting);
        self.resume_after_cue();
    }

    /// Release everything and ignore all later calls. Pending finished
    /// notifications and the completion hook are dropped.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cues.invalidate();
        self.crossfade = None;
        self.onset = None;
        self.speaking = false;
        self.on_cue_completed = None;
        self.pending.clear();
        self.rigs.clear();
        self.phase = Phase::Empty;
        self.outputs = Outputs::default();
        debug!("avatar controller torn down");
    }

    // ---------------------------------------------------------------------
    // Frame step
    // ---------------------------------------------------------------------

    /// Advance by `dt` seconds. Zero, negative, or non-finite deltas change no
    /// animation time and no alpha.
    pub fn tick(&mut self, dt: f32) -> &Outputs {
        self.outputs.clear();
        if self.torn_down {
            return &self.outputs;
        }

        if self.phase == Phase::Scaled {
            self.align_all();
        }

        if dt > 0.0 && dt.is_finite() {
            let dt = self.clock.clamp(dt);
            self.step_onset(dt);
            self.step_crossfade(dt);
            self.step_mixers(dt);
        }

        self.snapshot();
        &self.outputs
    }

    fn align_all(&mut self) {
        for id in RigId::ALL {
            if let Some(rig) = self.rigs.get_mut(id) {
                if let Err(e) = normalize::align_rig(rig, &self.cfg) {
                    warn!("{e}; keeping authored transform");
                }
            }
        }
        self.phase = Phase::Ready;
        self.pending.push(AvatarEvent::Ready);
    }

    fn step_onset(&mut self, dt: f32) {
        let Some(remaining) = self.onset else { return };
        let remaining = remaining - dt;
        if remaining > 0.0 {
            self.onset = Some(remaining);
            return;
        }
        self.onset = None;
        self.begin_speaking();
    }

    fn step_crossfade(&mut self, dt: f32) {
        let Some(fade) = self.crossfade.as_mut() else {
            return;
        };
        fade.advance(dt);
        let fade = *fade;
        let (idle, talk) = fade.alphas();
        if let Some(rig) = self.rigs.get_mut(RigId::Idle) {
            rig.alpha = idle;
        }
        if let Some(rig) = self.rigs.get_mut(RigId::Talk) {
            rig.alpha = talk;
        }
        if fade.is_complete() {
            if let Some(rig) = self.rigs.get_mut(fade.from) {
                rig.mixer.stop();
            }
            self.crossfade = None;
            self.pending
                .push(AvatarEvent::CrossfadeFinished { to: fade.to });
        }
    }

    fn step_mixers(&mut self, dt: f32) {
        let mut finished: Vec<(RigId, CueToken)> = Vec::new();
        for id in RigId::ALL {
            if let Some(rig) = self.rigs.get_mut(id) {
                if let Some(MixerEvent::Finished { token }) = rig.mixer.update(dt) {
                    finished.push((id, token));
                }
            }
        }
        for (id, token) in finished {
            match self.cues.finished(id, token, &mut self.rigs) {
                Ok(cue) => self.complete_cue(cue),
                Err(e) => debug!("{e}; ignored"),
            }
        }
    }

    fn complete_cue(&mut self, cue: ActiveCue) {
        self.set_state(BlendState::Resting);
        self.pending.push(AvatarEvent::CueCompleted {
            kind: cue.kind,
            token: cue.token,
        });
        if let Some(hook) = self.on_cue_completed.as_mut() {
            (*hook)(cue.kind);
        }
        self.resume_after_cue();
    }

    fn snapshot(&mut self) {
        let ready = self.is_ready();
        let cfg = &self.cfg;
        self.outputs.ready = ready;
        self.outputs.state = self.state;
        self.outputs.crossfade = self.crossfade.map(|f| CrossfadeView {
            from: f.from,
            to: f.to,
            progress: f.progress(),
        });
        for id in RigId::ALL {
            let Some(rig) = self.rigs.get_mut(id) else {
                continue;
            };
            let opacity = if ready { rig.alpha } else { 0.0 };
            rig.apply_opacity(opacity, cfg.depth_write_threshold);
            self.outputs.rigs.push(RigOutput {
                rig: id,
                alpha: rig.alpha,
                opacity,
                visible: ready && rig.alpha > cfg.visibility_threshold,
                depth_write: opacity >= cfg.depth_write_threshold,
                playback: rig.mixer.playback(),
                time: rig.mixer.time(),
                root: rig.root,
            });
        }
        for event in self.pending.drain(..) {
            self.outputs.push_event(event);
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    fn set_state(&mut self, to: BlendState) {
        if self.state != to {
            debug!("blend state {:?} -> {:?}", self.state, to);
            self.pending.push(AvatarEvent::StateChanged {
                from: self.state,
                to,
            });
            self.state = to;
        }
    }

    /// Speech is (now) playing: enter Speaking unless a cue owns the screen.
    fn begin_speaking(&mut self) {
        self.speaking = true;
        if self.state != BlendState::Resting {
            return;
        }
        if !self.rigs.contains(RigId::Talk) {
            warn!("speech started but the talk rig is not loaded; staying at rest");
            return;
        }
        self.warm_up(RigId::Talk);
        if let Some(idle) = self.rigs.get_mut(RigId::Idle) {
            idle.mixer.resume();
        }
        self.start_crossfade(RigId::Talk);
        self.set_state(BlendState::Speaking);
    }

    /// Pre-warm the rig about to fade in. A rig still playing from a fade
    /// that is being reversed keeps its pose.
    fn warm_up(&mut self, id: RigId) {
        let step = self.cfg.prewarm_step;
        if let Some(rig) = self.rigs.get_mut(id) {
            if rig.mixer.playback() != Playback::Playing {
                rig.mixer.prewarm(step, CueToken::default());
            }
        }
    }

    fn start_crossfade(&mut self, to: RigId) {
        let fade = Crossfade::new(
            to,
            self.alpha(RigId::Idle),
            self.alpha(RigId::Talk),
            self.cfg.blend_duration,
        );
        debug!(
            "crossfade {:?} -> {:?} from alphas ({}, {})",
            fade.from,
            fade.to,
            self.alpha(RigId::Idle),
            self.alpha(RigId::Talk)
        );
        self.crossfade = Some(fade);
    }

    /// After a cue ends the avatar is at rest; fade to Talk if speech is live.
    fn resume_after_cue(&mut self) {
        if self.speaking {
            self.begin_speaking();
        }
    }
}
