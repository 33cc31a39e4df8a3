//! Renderable scene model for one rig.
//!
//! Nodes live in a flat arena where every parent precedes its children, so
//! world-space queries are a walk up the parent chain. Vectors are `[x, y, z]`
//! and rotations are unit quaternions `[x, y, z, w]`, matching the layout of
//! glTF node transforms.

use serde::{Deserialize, Serialize};

/// Local transform of a node (translation, rotation, scale).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Rotate a vector by a unit quaternion.
fn rotate(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let u = [q[0], q[1], q[2]];
    let w = q[3];
    let c = cross(u, v);
    let t = [2.0 * c[0], 2.0 * c[1], 2.0 * c[2]];
    let ut = cross(u, t);
    [
        v[0] + w * t[0] + ut[0],
        v[1] + w * t[1] + ut[1],
        v[2] + w * t[2] + ut[2],
    ]
}

impl Transform {
    /// Map a point from this node's space into its parent's space.
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        let s = [p[0] * self.scale[0], p[1] * self.scale[1], p[2] * self.scale[2]];
        let r = rotate(self.rotation, s);
        [
            r[0] + self.translation[0],
            r[1] + self.translation[1],
            r[2] + self.translation[2],
        ]
    }
}

/// Axis-aligned bounding box. An inverted box (min > max) is empty.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| !(self.max[i] >= self.min[i]))
    }

    pub fn expand(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn corners(&self) -> [[f32; 3]; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [b[0], a[1], a[2]],
            [a[0], b[1], a[2]],
            [b[0], b[1], a[2]],
            [a[0], a[1], b[2]],
            [b[0], a[1], b[2]],
            [a[0], b[1], b[2]],
            [b[0], b[1], b[2]],
        ]
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    /// Horizontal center `(x, z)`.
    #[inline]
    pub fn center_xz(&self) -> (f32, f32) {
        (
            (self.max[0] + self.min[0]) * 0.5,
            (self.max[2] + self.min[2]) * 0.5,
        )
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

fn default_opacity() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub transparent: bool,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default = "default_true")]
    pub depth_write: bool,
}

/// Skin binding: indices of the joint nodes in the owning scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub joints: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub materials: Vec<Material>,
    /// Geometry bounds in the mesh node's local space.
    #[serde(default)]
    pub bounds: Option<Aabb>,
    #[serde(default)]
    pub skin: Option<Skin>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub mesh: Option<Mesh>,
    #[serde(default = "default_true")]
    pub frustum_culled: bool,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, parent: Option<usize>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            transform,
            mesh: None,
            frustum_culled: true,
        }
    }
}

/// Flat node arena for one rig.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
}

impl Scene {
    /// Check arena ordering and skin joint indices.
    pub fn validate(&self) -> Result<(), String> {
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent >= idx {
                    return Err(format!(
                        "node '{}' ({idx}) has parent {parent} that does not precede it",
                        node.name
                    ));
                }
            }
            if let Some(skin) = node.mesh.as_ref().and_then(|m| m.skin.as_ref()) {
                if let Some(bad) = skin.joints.iter().find(|j| **j >= self.nodes.len()) {
                    return Err(format!(
                        "skin on '{}' references missing joint {bad}",
                        node.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Map a point in node `idx`'s local space into scene space.
    pub fn to_scene_space(&self, idx: usize, p: [f32; 3]) -> [f32; 3] {
        let mut out = p;
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let Some(node) = self.nodes.get(i) else { break };
            out = node.transform.apply(out);
            cursor = node.parent;
        }
        out
    }

    pub fn meshes(&self) -> impl Iterator<Item = (usize, &Mesh)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.mesh.as_ref().map(|m| (i, m)))
    }

    pub fn materials_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.nodes
            .iter_mut()
            .filter_map(|n| n.mesh.as_mut())
            .flat_map(|m| m.materials.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 1e-5)
    }

    #[test]
    fn transform_applies_scale_rotation_translation() {
        // 90 degrees about +Y maps +X to -Z.
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let t = Transform {
            translation: [0.0, 1.0, 0.0],
            rotation: [0.0, h, 0.0, h],
            scale: [2.0, 2.0, 2.0],
        };
        assert!(approx(t.apply([1.0, 0.0, 0.0]), [0.0, 1.0, -2.0]));
    }

    #[test]
    fn scene_space_walks_parent_chain() {
        let scene = Scene {
            nodes: vec![
                SceneNode::new(
                    "root",
                    None,
                    Transform {
                        scale: [0.01; 3],
                        ..Transform::default()
                    },
                ),
                SceneNode::new(
                    "hips",
                    Some(0),
                    Transform {
                        translation: [0.0, 100.0, 0.0],
                        ..Transform::default()
                    },
                ),
            ],
        };
        assert!(approx(scene.to_scene_space(1, [0.0; 3]), [0.0, 1.0, 0.0]));
    }

    #[test]
    fn validate_rejects_forward_parent() {
        let scene = Scene {
            nodes: vec![
                SceneNode::new("a", Some(1), Transform::default()),
                SceneNode::new("b", None, Transform::default()),
            ],
        };
        assert!(scene.validate().is_err());
    }

    #[test]
    fn empty_box_grows_to_a_point() {
        let mut a = Aabb::EMPTY;
        assert!(a.is_empty());
        a.expand([1.0, 2.0, 3.0]);
        assert!(!a.is_empty());
        assert_eq!(a.height(), 0.0);
    }
}
