//! Height and ground normalization.
//!
//! Independently authored rigs disagree on units, origin, and proportions.
//! Normalization runs in two passes:
//!
//! 1. [`scale_pass`]: measure the reference rig (Idle, else Talk) in its own
//!    scene space and give every rig the same absolute root scale, so the
//!    rigs blend without a size pop.
//! 2. [`align_rig`]: once the scaled transforms are committed, center each
//!    rig on the vertical axis, put its lowest extent on y=0, and apply a
//!    corrective scale when the measured height misses the target by more
//!    than the tolerance.
//!
//! Joint positions of skinned meshes are preferred over geometry bounds:
//! hair and accessories inflate mesh boxes but not skeletons. Rigs without a
//! skin fall back to mesh bounds.
//!
//! Both passes are idempotent: the scale pass sets an absolute scale and the
//! aligner only translates by the measured error.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AvatarError;
use crate::ids::RigId;
use crate::rig::{AnimationRig, RigRegistry};
use crate::scene::Aabb;

/// Where extents were measured from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtentSource {
    Skeleton,
    Geometry,
}

/// Which space to measure in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Space {
    /// Authored scene space, ignoring the root transform.
    Scene,
    /// After the root scale/position.
    World,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extents {
    pub bounds: Aabb,
    pub source: ExtentSource,
}

/// Result of aligning one rig.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignReport {
    pub source: ExtentSource,
    pub scale: f32,
    pub position: [f32; 3],
    /// Whether the corrective height scale was applied.
    pub corrected: bool,
}

fn point(rig: &AnimationRig, space: Space, idx: usize, p: [f32; 3]) -> [f32; 3] {
    match space {
        Space::Scene => rig.scene.to_scene_space(idx, p),
        Space::World => rig.world_point(idx, p),
    }
}

/// Bounds of every joint referenced by a skin. `None` if the rig has no skin.
pub fn skeleton_extents(rig: &AnimationRig, space: Space) -> Option<Aabb> {
    let mut bounds = Aabb::EMPTY;
    let mut count = 0usize;
    for (_, mesh) in rig.scene.meshes() {
        let Some(skin) = mesh.skin.as_ref() else {
            continue;
        };
        for &joint in &skin.joints {
            bounds.expand(point(rig, space, joint, [0.0; 3]));
            count += 1;
        }
    }
    (count > 0).then_some(bounds)
}

/// Union of every mesh's local bounds mapped into `space`.
pub fn geometry_extents(rig: &AnimationRig, space: Space) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for (idx, mesh) in rig.scene.meshes() {
        let Some(local) = mesh.bounds else { continue };
        if local.is_empty() {
            continue;
        }
        for corner in local.corners() {
            bounds.expand(point(rig, space, idx, corner));
        }
    }
    bounds
}

/// Measure a rig, preferring the skeleton.
pub fn measure(rig: &AnimationRig, space: Space) -> Result<Extents, AvatarError> {
    let (bounds, source) = match skeleton_extents(rig, space) {
        Some(b) => (b, ExtentSource::Skeleton),
        None => (geometry_extents(rig, space), ExtentSource::Geometry),
    };
    if bounds.is_empty() {
        return Err(AvatarError::normalization(rig.id, "no joints or mesh bounds"));
    }
    let finite = bounds.min.iter().chain(bounds.max.iter()).all(|v| v.is_finite());
    if !finite {
        return Err(AvatarError::normalization(rig.id, "non-finite extents"));
    }
    Ok(Extents { bounds, source })
}

/// Measured height, or a normalization error when it is below
/// `cfg.min_extent` (a single joint, or every joint at one height).
fn usable_height(rig: &AnimationRig, ext: &Extents, cfg: &Config) -> Result<f32, AvatarError> {
    let height = ext.bounds.height();
    if height < cfg.min_extent {
        return Err(AvatarError::normalization(rig.id, format!("degenerate height {height}")));
    }
    Ok(height)
}

/// Rig whose proportions define the shared scale.
pub fn reference_rig(registry: &RigRegistry) -> Option<&AnimationRig> {
    registry
        .get(RigId::Idle)
        .or_else(|| registry.get(RigId::Talk))
}

/// First pass: compute the shared scale from the reference rig and set it on
/// every loaded rig. Falls back to 1 when the reference cannot be measured.
pub fn scale_pass(registry: &mut RigRegistry, cfg: &Config) -> f32 {
    let scale = match reference_rig(registry) {
        Some(reference) => match measure(reference, Space::Scene)
            .and_then(|ext| usable_height(reference, &ext, cfg))
        {
            Ok(height) => cfg.desired_height / height,
            Err(e) => {
                warn!("{e}; keeping authored scale");
                1.0
            }
        },
        None => {
            warn!("no reference rig loaded; keeping authored scale");
            1.0
        }
    };
    for id in RigId::ALL {
        if let Some(rig) = registry.get_mut(id) {
            rig.root.scale = scale;
        }
    }
    debug!("normalize: shared scale {scale}");
    scale
}

fn recenter(rig: &mut AnimationRig, bounds: &Aabb) {
    let (cx, cz) = bounds.center_xz();
    rig.root.position[0] -= cx;
    rig.root.position[1] -= bounds.min[1];
    rig.root.position[2] -= cz;
}

/// Second pass for one rig: center, ground, and correct the height.
/// On error the rig's transform is left untouched.
pub fn align_rig(rig: &mut AnimationRig, cfg: &Config) -> Result<AlignReport, AvatarError> {
    let ext = measure(rig, Space::World)?;
    let height = usable_height(rig, &ext, cfg)?;
    recenter(rig, &ext.bounds);

    let adjust = cfg.desired_height / height;
    let corrected = (adjust - 1.0).abs() > cfg.height_tolerance;
    if corrected {
        rig.root.scale *= adjust;
        let again = measure(rig, Space::World)?;
        recenter(rig, &again.bounds);
    }

    debug!(
        "normalize: rig '{}' via {:?} scale={} pos={:?} corrected={corrected}",
        rig.id, ext.source, rig.root.scale, rig.root.position
    );
    Ok(AlignReport {
        source: ext.source,
        scale: rig.root.scale,
        position: rig.root.position,
        corrected,
    })
}
