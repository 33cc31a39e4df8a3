use js_sys::{Function, JSON};
use log::warn;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use avatar_blend_core::{
    AvatarController, AvatarError, AvatarEvent, Config, CueKind, FrameClock, Outputs, RigAsset,
    RigId, RigSource,
};

#[wasm_bindgen]
pub struct AvatarBlend {
    core: AvatarController,
    clock: FrameClock,
    on_cue_completed: Option<Function>,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Parse a JS rig asset object through the core JSON parser.
fn asset_from_js(rig: RigId, value: &JsValue) -> Result<RigAsset, AvatarError> {
    if jsvalue_is_undefined_or_null(value) {
        return Err(AvatarError::AssetLoad {
            rig,
            reason: "resolver returned no asset".into(),
        });
    }
    let s = JSON::stringify(value)
        .map_err(|e| AvatarError::AssetLoad {
            rig,
            reason: format!("stringify error: {e:?}"),
        })?
        .as_string()
        .ok_or_else(|| AvatarError::AssetLoad {
            rig,
            reason: "stringify produced non-string".into(),
        })?;
    RigAsset::from_json(rig, &s)
}

/// Rig source backed by `resolver(rigName) -> asset | null`.
struct JsRigSource {
    f: Function,
}

impl RigSource for JsRigSource {
    fn fetch(&mut self, id: RigId) -> Result<RigAsset, AvatarError> {
        let arg = JsValue::from_str(id.name());
        match self.f.call1(&JsValue::UNDEFINED, &arg) {
            Ok(val) => asset_from_js(id, &val),
            Err(e) => Err(AvatarError::AssetLoad {
                rig: id,
                reason: format!("resolver threw: {e:?}"),
            }),
        }
    }
}

#[wasm_bindgen]
impl AvatarBlend {
    /// Create a controller. Pass a (partial) config object or undefined/null for defaults.
    /// Example:
    ///   new AvatarBlend({ desired_height: 1.6, speech_onset_delay: 0.5 })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<AvatarBlend, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        cfg.validate()
            .map_err(|e| JsError::new(&format!("config error: {e}")))?;

        Ok(AvatarBlend {
            clock: FrameClock::new(cfg.max_frame_delta),
            core: AvatarController::new(cfg),
            on_cue_completed: None,
        })
    }

    /// Load all four rigs through `resolver(name)` where name is one of
    /// "idle" | "talk" | "dance" | "jump". The resolver returns a rig asset
    /// object, or null when the rig is unavailable. Returns the number of rigs
    /// loaded; failures are logged and leave that rig out.
    #[wasm_bindgen(js_name = load_rigs)]
    pub fn load_rigs(&mut self, resolver: Function) -> u32 {
        let mut source = JsRigSource { f: resolver };
        self.core.load_rigs(&mut source) as u32
    }

    /// Load a single rig from an asset object.
    #[wasm_bindgen(js_name = load_rig)]
    pub fn load_rig(&mut self, name: &str, asset: JsValue) -> Result<(), JsError> {
        let id: RigId = name.parse().map_err(|e: AvatarError| JsError::new(&e.to_string()))?;
        let mut source = |rig: RigId| asset_from_js(rig, &asset);
        self.core
            .load_rig(id, &mut source)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = speech_started)]
    pub fn speech_started(&mut self) {
        self.core.on_speech_started();
    }

    #[wasm_bindgen(js_name = speech_ended)]
    pub fn speech_ended(&mut self) {
        self.core.on_speech_ended();
    }

    /// Request a one-shot cue ("dance" | "jump"). Unknown names are ignored;
    /// returns whether the name was recognized.
    #[wasm_bindgen(js_name = request_cue)]
    pub fn request_cue(&mut self, kind: &str) -> bool {
        match kind.parse::<CueKind>() {
            Ok(kind) => {
                self.core.request_cue(kind);
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    #[wasm_bindgen(js_name = cancel_cue)]
    pub fn cancel_cue(&mut self) {
        self.core.cancel_cue();
    }

    /// Register `callback(kind)` fired once per completed cue, after the tick
    /// that completed it.
    #[wasm_bindgen(js_name = on_cue_completed)]
    pub fn on_cue_completed(&mut self, callback: Function) {
        if !self.core.is_torn_down() {
            self.on_cue_completed = Some(callback);
        }
    }

    /// Advance by dt (seconds). Returns Outputs JSON.
    #[wasm_bindgen]
    pub fn tick(&mut self, dt: f32) -> Result<JsValue, JsError> {
        let out: &Outputs = self.core.tick(dt);
        let value = swb::to_value(out).map_err(|e| JsError::new(&format!("outputs error: {e}")))?;
        if let Some(cb) = self.on_cue_completed.as_ref() {
            for event in out.events.iter() {
                if let AvatarEvent::CueCompleted { kind, .. } = event {
                    let arg = JsValue::from_str(&kind.to_string());
                    if let Err(e) = cb.call1(&JsValue::UNDEFINED, &arg) {
                        warn!("cue completion callback threw: {e:?}");
                    }
                }
            }
        }
        Ok(value)
    }

    /// Advance using a host timestamp in milliseconds (e.g. the
    /// `requestAnimationFrame` argument). The first call only primes the clock.
    #[wasm_bindgen(js_name = tick_at)]
    pub fn tick_at(&mut self, now_ms: f64) -> Result<JsValue, JsError> {
        let dt = self.clock.delta(now_ms / 1000.0);
        self.tick(dt)
    }

    /// Current blend state as JSON, e.g. `{ state: "cueing", cue: "dance" }`.
    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsError> {
        swb::to_value(&self.core.state()).map_err(|e| JsError::new(&format!("state error: {e}")))
    }

    #[wasm_bindgen(js_name = is_ready)]
    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Release the rigs and callback. Every later call is a no-op.
    #[wasm_bindgen]
    pub fn teardown(&mut self) {
        self.on_cue_completed = None;
        self.clock.reset();
        self.core.teardown();
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
