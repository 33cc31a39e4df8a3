use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use avatar_blend_core::{
    AvatarController, AvatarError, AvatarEvent, BlendState, Config, CueHandler, CueKind, Playback,
    RigAsset, RigId, RigRegistry,
};
use avatar_test_fixtures::rigs;

const FRAME: f32 = 0.05;

fn fixture(id: RigId) -> Result<RigAsset, AvatarError> {
    rigs::load::<RigAsset>(id.name()).map_err(|e| AvatarError::AssetLoad {
        rig: id,
        reason: e.to_string(),
    })
}

fn ready_with(mut source: impl FnMut(RigId) -> Result<RigAsset, AvatarError>) -> AvatarController {
    let mut ctl = AvatarController::new(Config::default());
    ctl.load_rigs(&mut source);
    ctl.tick(1.0 / 60.0);
    assert!(ctl.is_ready());
    ctl
}

fn ready() -> AvatarController {
    ready_with(fixture)
}

fn counter(ctl: &mut AvatarController) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    ctl.set_on_cue_completed(Box::new(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    }));
    hits
}

fn run(ctl: &mut AvatarController, frames: usize) -> Vec<AvatarEvent> {
    let mut events = Vec::new();
    for _ in 0..frames {
        events.extend(ctl.tick(FRAME).events.iter().cloned());
    }
    events
}

fn completed(events: &[AvatarEvent]) -> Vec<CueKind> {
    events
        .iter()
        .filter_map(|e| match e {
            AvatarEvent::CueCompleted { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

#[test]
fn cue_hard_cuts_and_plays_from_start() {
    let mut ctl = ready();
    run(&mut ctl, 10);
    ctl.request_cue(CueKind::Dance);

    assert_eq!(ctl.state(), BlendState::Cueing(CueKind::Dance));
    assert_eq!(ctl.alpha(RigId::Dance), 1.0);
    for id in [RigId::Idle, RigId::Talk, RigId::Jump] {
        assert_eq!(ctl.alpha(id), 0.0, "{id}");
        assert_eq!(ctl.rig(id).unwrap().mixer.playback(), Playback::Off);
    }
    let dance = ctl.rig(RigId::Dance).unwrap();
    assert_eq!(dance.mixer.playback(), Playback::Playing);
    assert_eq!(dance.mixer.time(), 0.0);

    let out = ctl.tick(FRAME);
    assert!(out.crossfade.is_none());
    assert!(out.rig(RigId::Dance).unwrap().visible);
    assert!(!out.rig(RigId::Idle).unwrap().visible);
    assert!(matches!(
        out.events.as_slice(),
        [
            AvatarEvent::StateChanged { .. },
            AvatarEvent::CueStarted {
                kind: CueKind::Dance,
                ..
            }
        ]
    ));
}

#[test]
fn cue_completes_exactly_once_and_restores_idle() {
    let mut ctl = ready();
    let hits = counter(&mut ctl);
    ctl.request_cue(CueKind::Dance);

    // Dance clip is 3.2 s long.
    let mut done_at = None;
    for frame in 0..200 {
        let out = ctl.tick(FRAME);
        if completed(&out.events) == vec![CueKind::Dance] {
            // The completion frame already shows Idle from its first pose.
            let idle = out.rig(RigId::Idle).unwrap();
            assert_eq!(idle.alpha, 1.0);
            assert_eq!(idle.time, 0.0);
            assert_eq!(idle.playback, Playback::Playing);
            assert_eq!(out.rig(RigId::Dance).unwrap().alpha, 0.0);
            assert_eq!(out.state, BlendState::Resting);
            done_at = Some(frame);
        }
    }
    let frame = done_at.expect("dance should complete");
    assert!((63..=65).contains(&frame), "completed on frame {frame}");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(ctl.state(), BlendState::Resting);
    assert_eq!(ctl.rig(RigId::Dance).unwrap().mixer.playback(), Playback::Off);
}

#[test]
fn second_cue_preempts_the_first() {
    let mut ctl = ready();
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = kinds.clone();
    ctl.set_on_cue_completed(Box::new(move |kind| {
        sink.lock().unwrap().push(kind);
    }));

    ctl.request_cue(CueKind::Dance);
    run(&mut ctl, 10);
    ctl.request_cue(CueKind::Jump);

    assert_eq!(ctl.state(), BlendState::Cueing(CueKind::Jump));
    assert_eq!(ctl.alpha(RigId::Dance), 0.0);
    assert_eq!(ctl.alpha(RigId::Jump), 1.0);
    assert_eq!(ctl.rig(RigId::Jump).unwrap().mixer.time(), 0.0);
    assert_eq!(ctl.rig(RigId::Dance).unwrap().mixer.playback(), Playback::Off);

    let events = run(&mut ctl, 100);
    assert!(events.iter().any(|e| matches!(
        e,
        AvatarEvent::CueCanceled {
            kind: CueKind::Dance,
            ..
        }
    )));
    assert_eq!(completed(&events), vec![CueKind::Jump]);
    assert_eq!(*kinds.lock().unwrap(), vec![CueKind::Jump]);
    assert_eq!(ctl.state(), BlendState::Resting);
}

#[test]
fn same_cue_request_is_ignored() {
    let mut ctl = ready();
    ctl.request_cue(CueKind::Dance);
    let token = ctl.active_cue().unwrap().token;
    run(&mut ctl, 20);
    let t = ctl.rig(RigId::Dance).unwrap().mixer.time();

    ctl.request_cue(CueKind::Dance);
    assert_eq!(ctl.active_cue().unwrap().token, token);
    assert_eq!(ctl.rig(RigId::Dance).unwrap().mixer.time(), t);
}

#[test]
fn missing_cue_rig_is_a_no_op() {
    let mut ctl = ready_with(|id| match id {
        RigId::Dance => Err(AvatarError::AssetLoad {
            rig: id,
            reason: "network error".into(),
        }),
        other => fixture(other),
    });
    assert_eq!(ctl.registry().iter().count(), 3);

    ctl.request_cue(CueKind::Dance);
    assert_eq!(ctl.state(), BlendState::Resting);
    assert_eq!(ctl.alpha(RigId::Idle), 1.0);
    assert!(ctl.tick(FRAME).events.is_empty());

    // Jump still works.
    ctl.request_cue(CueKind::Jump);
    assert_eq!(ctl.state(), BlendState::Cueing(CueKind::Jump));
}

#[test]
fn clipless_cue_rig_is_a_no_op() {
    let mut ctl = ready_with(|id| {
        let mut asset = fixture(id)?;
        if id == RigId::Jump {
            asset.clips.clear();
        }
        Ok(asset)
    });
    ctl.request_cue(CueKind::Jump);
    assert_eq!(ctl.state(), BlendState::Resting);
    assert!(ctl.active_cue().is_none());
}

#[test]
fn cue_during_speech_returns_to_speaking() {
    let mut ctl = ready();
    ctl.on_speech_started();
    run(&mut ctl, 2);
    assert!(ctl.crossfade().is_some());

    ctl.request_cue(CueKind::Jump);
    assert!(ctl.crossfade().is_none());
    assert_eq!(ctl.alpha(RigId::Idle), 0.0);
    assert_eq!(ctl.alpha(RigId::Talk), 0.0);

    // Jump is 1.1 s; speech is still live when it ends.
    let events = run(&mut ctl, 24);
    assert_eq!(completed(&events), vec![CueKind::Jump]);
    assert_eq!(ctl.state(), BlendState::Speaking);
    let fade = ctl.crossfade().expect("fading into talk");
    assert_eq!(fade.to, RigId::Talk);

    run(&mut ctl, 10);
    assert_eq!(ctl.alpha(RigId::Talk), 1.0);
    assert_eq!(ctl.alpha(RigId::Idle), 0.0);
}

#[test]
fn speech_end_during_cue_settles_at_rest() {
    let mut ctl = ready();
    ctl.on_speech_started();
    run(&mut ctl, 10);
    ctl.request_cue(CueKind::Dance);
    ctl.on_speech_ended();
    assert_eq!(ctl.state(), BlendState::Cueing(CueKind::Dance));
    assert!(!ctl.is_speaking());

    run(&mut ctl, 80);
    assert_eq!(ctl.state(), BlendState::Resting);
    assert!(ctl.crossfade().is_none());
    assert_eq!(ctl.alpha(RigId::Idle), 1.0);
    assert_eq!(ctl.alpha(RigId::Talk), 0.0);
}

#[test]
fn cancel_restores_rest_without_completion() {
    let mut ctl = ready();
    let hits = counter(&mut ctl);
    ctl.request_cue(CueKind::Dance);
    run(&mut ctl, 10);

    ctl.cancel_cue();
    assert_eq!(ctl.state(), BlendState::Resting);
    let idle = ctl.rig(RigId::Idle).unwrap();
    assert_eq!(idle.alpha, 1.0);
    assert_eq!(idle.mixer.time(), 0.0);

    let events = run(&mut ctl, 100);
    assert!(completed(&events).is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // Nothing to cancel.
    ctl.cancel_cue();
    assert!(ctl.tick(FRAME).events.is_empty());
}

#[test]
fn stale_finished_notification_is_rejected() {
    let mut registry = RigRegistry::new();
    let mut src = fixture;
    for id in RigId::ALL {
        registry.load_rig(id, &mut src).unwrap();
    }
    let mut cues = CueHandler::new();

    let first = cues.start(CueKind::Dance, &mut registry).unwrap();
    assert!(cues.cancel(&mut registry).is_some());
    assert!(cues.finished(RigId::Dance, first.token, &mut registry).is_err());

    let second = cues.start(CueKind::Dance, &mut registry).unwrap();
    assert!(second.token > first.token);
    assert!(cues.finished(RigId::Dance, first.token, &mut registry).is_err());
    assert!(cues.finished(RigId::Jump, second.token, &mut registry).is_err());
    assert_eq!(cues.active(), Some(second));

    assert_eq!(
        cues.finished(RigId::Dance, second.token, &mut registry),
        Ok(second)
    );
    assert!(cues.active().is_none());
    assert_eq!(registry.get(RigId::Idle).unwrap().alpha, 1.0);
}

#[test]
fn teardown_during_cue_drops_completion() {
    let mut ctl = ready();
    let hits = counter(&mut ctl);
    ctl.request_cue(CueKind::Jump);
    run(&mut ctl, 5);
    ctl.teardown();

    let events = run(&mut ctl, 60);
    assert!(events.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    ctl.request_cue(CueKind::Dance);
    assert!(ctl.active_cue().is_none());
}
