//! Rig registry and lifecycle.
//!
//! Loads the named rigs through a [`RigSource`], patches materials so opacity
//! fades render correctly, and caches the result so repeated loads are free.

use hashbrown::HashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::AvatarError;
use crate::ids::RigId;
use crate::mixer::{Clip, LoopMode, Mixer};
use crate::scene::Scene;

/// A resolved rig asset: one scene graph and any number of clips (only the
/// first is used).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RigAsset {
    pub scene: Scene,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

impl RigAsset {
    pub fn from_json(rig: RigId, s: &str) -> Result<Self, AvatarError> {
        serde_json::from_str(s).map_err(|e| AvatarError::asset(rig, format!("parse: {e}")))
    }
}

/// Resolves rig ids into assets. Storage and transport are the host's concern.
pub trait RigSource {
    fn fetch(&mut self, id: RigId) -> Result<RigAsset, AvatarError>;
}

impl<F> RigSource for F
where
    F: FnMut(RigId) -> Result<RigAsset, AvatarError>,
{
    fn fetch(&mut self, id: RigId) -> Result<RigAsset, AvatarError> {
        (*self)(id)
    }
}

/// Uniform scale + translation applied on top of the authored scene root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootTransform {
    pub scale: f32,
    pub position: [f32; 3],
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: [0.0; 3],
        }
    }
}

impl RootTransform {
    #[inline]
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        [
            p[0] * self.scale + self.position[0],
            p[1] * self.scale + self.position[1],
            p[2] * self.scale + self.position[2],
        ]
    }
}

/// One loaded skeletal asset with its playback cursor and blend weight.
#[derive(Clone, Debug)]
pub struct AnimationRig {
    pub id: RigId,
    pub scene: Scene,
    pub mixer: Mixer,
    /// Committed blend weight in [0, 1].
    pub alpha: f32,
    pub root: RootTransform,
    applied_opacity: Option<f32>,
}

impl AnimationRig {
    /// Validate the scene, patch its materials, and pick the first clip.
    pub fn from_asset(id: RigId, asset: RigAsset) -> Result<Self, AvatarError> {
        let RigAsset { mut scene, clips } = asset;
        scene.validate().map_err(|e| AvatarError::asset(id, e))?;
        patch_materials(&mut scene);

        let clip = clips.into_iter().next().and_then(|c| {
            if c.duration.is_finite() && c.duration >= 0.0 {
                Some(c)
            } else {
                warn!("rig '{id}': clip '{}' has invalid duration {}", c.name, c.duration);
                None
            }
        });
        if clip.is_none() {
            warn!("rig '{id}' has no usable clip; it will show a static pose");
        }
        let mode = if id.is_looping() {
            LoopMode::Repeat
        } else {
            LoopMode::OnceHold
        };

        Ok(Self {
            id,
            scene,
            mixer: Mixer::new(clip, mode),
            alpha: 0.0,
            root: RootTransform::default(),
            applied_opacity: None,
        })
    }

    /// Scene-space point of node `idx` mapped through the root transform.
    #[inline]
    pub fn world_point(&self, idx: usize, p: [f32; 3]) -> [f32; 3] {
        self.root.apply(self.scene.to_scene_space(idx, p))
    }

    /// Write `opacity` to every material. Skips the walk when nothing changed.
    pub fn apply_opacity(&mut self, opacity: f32, depth_write_threshold: f32) {
        if self.applied_opacity == Some(opacity) {
            return;
        }
        for m in self.scene.materials_mut() {
            m.transparent = true;
            m.opacity = opacity;
            m.depth_write = opacity >= depth_write_threshold;
        }
        self.applied_opacity = Some(opacity);
    }
}

/// Two-sided, transparent, no culling; zero exported opacity is an exporter
/// defect and is forced back to 1.
fn patch_materials(scene: &mut Scene) {
    for node in scene.nodes.iter_mut() {
        node.frustum_culled = false;
        if let Some(mesh) = node.mesh.as_mut() {
            for m in mesh.materials.iter_mut() {
                m.double_sided = true;
                m.transparent = true;
                if m.opacity == 0.0 {
                    m.opacity = 1.0;
                }
            }
        }
    }
}

/// Cache of loaded rigs keyed by id.
#[derive(Debug, Default)]
pub struct RigRegistry {
    rigs: HashMap<RigId, AnimationRig>,
}

impl RigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `id` from `source`, or return the cached rig. Failures are not
    /// cached, so a later call may retry.
    pub fn load_rig(
        &mut self,
        id: RigId,
        source: &mut dyn RigSource,
    ) -> Result<&mut AnimationRig, AvatarError> {
        if !self.rigs.contains_key(&id) {
            let asset = source.fetch(id)?;
            let rig = AnimationRig::from_asset(id, asset)?;
            debug!(
                "loaded rig '{id}' ({} nodes, clip={:?})",
                rig.scene.nodes.len(),
                rig.mixer.clip().map(|c| c.name.as_str())
            );
            self.rigs.insert(id, rig);
        }
        self.rigs
            .get_mut(&id)
            .ok_or_else(|| AvatarError::asset(id, "rig vanished from registry"))
    }

    #[inline]
    pub fn get(&self, id: RigId) -> Option<&AnimationRig> {
        self.rigs.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: RigId) -> Option<&mut AnimationRig> {
        self.rigs.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: RigId) -> bool {
        self.rigs.contains_key(&id)
    }

    /// Loaded rigs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &AnimationRig> {
        RigId::ALL.iter().filter_map(move |id| self.rigs.get(id))
    }

    pub fn clear(&mut self) {
        self.rigs.clear();
    }
}
