//! Point-light shadows for the fog.
//!
//! Every light owns six cube faces stored as layers of one 2D array texture
//! (layer = `light * 6 + face`). Each texel holds filterable moments of the
//! normalized light distance `d`: `(d, d², exp(c·d))`, so the same map
//! serves both variance (VSM) and exponential (ESM) shadow tests. After
//! rendering, updated layers get a separable gaussian blur.
//!
//! Re-rendering all faces every frame is wasteful when nothing moves, so
//! [`ShadowScheduler`] tracks which faces are stale and hands out a bounded
//! number per frame.

mod blur_pass;
mod maps;
mod moment_pass;
mod scheduler;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::light::MAX_POINT_LIGHTS;

pub use blur_pass::ShadowBlurNode;
pub use maps::{MOMENTS_FORMAT, PointShadowMaps};
pub use moment_pass::ShadowMomentNode;
pub use scheduler::ShadowScheduler;

pub const FACES_PER_LIGHT: usize = 6;
pub const MAX_SHADOW_LAYERS: usize = MAX_POINT_LIGHTS * FACES_PER_LIGHT;
/// Largest blur radius the blur shader's weight table holds.
pub const MAX_BLUR_RADIUS: u32 = 8;
/// Near plane of every cube face projection.
pub const SHADOW_NEAR: f32 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowTechnique {
    Off,
    #[default]
    Vsm,
    Esm,
}

impl ShadowTechnique {
    /// Value of `technique` in the shader's shadow parameters.
    pub fn shader_index(self) -> u32 {
        match self {
            ShadowTechnique::Off => 0,
            ShadowTechnique::Vsm => 1,
            ShadowTechnique::Esm => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowSettings {
    pub technique: ShadowTechnique,
    /// Edge length of each cube face, a power of two.
    pub resolution: u32,
    pub blur_radius: u32,
    pub esm_exponent: f32,
    pub vsm_min_variance: f32,
    /// Fraction of the Chebyshev bound cut off to hide light bleeding.
    pub light_bleed_reduction: f32,
    /// Upper bound on cube faces re-rendered per frame.
    pub faces_per_frame: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::Vsm,
            resolution: 512,
            blur_radius: 2,
            esm_exponent: 40.0,
            vsm_min_variance: 0.00002,
            light_bleed_reduction: 0.2,
            faces_per_frame: 6,
        }
    }
}

impl ShadowSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.resolution.is_power_of_two() || !(64..=4096).contains(&self.resolution) {
            return Err(format!(
                "shadow resolution {} must be a power of two in [64, 4096]",
                self.resolution
            ));
        }
        if self.blur_radius > MAX_BLUR_RADIUS {
            return Err(format!(
                "shadow blur radius {} exceeds {MAX_BLUR_RADIUS}",
                self.blur_radius
            ));
        }
        // exp(c) must stay finite in f32.
        if !(self.esm_exponent > 0.0 && self.esm_exponent <= 80.0) {
            return Err(format!(
                "ESM exponent {} outside (0, 80]",
                self.esm_exponent
            ));
        }
        if self.vsm_min_variance < 0.0 {
            return Err("VSM minimum variance must be non-negative".to_string());
        }
        if !(0.0..1.0).contains(&self.light_bleed_reduction) {
            return Err(format!(
                "light bleed reduction {} outside [0, 1)",
                self.light_bleed_reduction
            ));
        }
        if self.faces_per_frame == 0 {
            return Err("shadow faces_per_frame must be at least 1".to_string());
        }
        Ok(())
    }
}

/// First two moments of normalized distance `d`.
pub fn vsm_moments(d: f32) -> Vec2 {
    Vec2::new(d, d * d)
}

/// One-tailed Chebyshev bound on the lit fraction, with light-bleed
/// reduction remapping `[bleed, 1]` to `[0, 1]`.
pub fn chebyshev_upper_bound(moments: Vec2, d: f32, min_variance: f32, bleed: f32) -> f32 {
    if d <= moments.x {
        return 1.0;
    }
    let variance = (moments.y - moments.x * moments.x).max(min_variance);
    let delta = d - moments.x;
    let p_max = variance / (variance + delta * delta);
    ((p_max - bleed) / (1.0 - bleed)).clamp(0.0, 1.0)
}

/// Exponential shadow test against a filtered `exp(c·occluder)` moment.
pub fn esm_visibility(exp_moment: f32, d: f32, c: f32) -> f32 {
    (exp_moment * (-c * d).exp()).clamp(0.0, 1.0)
}

/// Normalized gaussian kernel of `2 * radius + 1` taps.
pub fn gaussian_weights(radius: u32) -> Vec<f32> {
    let sigma = (radius as f32 + 1.0) * 0.5;
    let r = radius as i32;
    let raw: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Look direction and up vector of each cube face, in the usual
/// +X, -X, +Y, -Y, +Z, -Z order.
pub const CUBE_FACES: [(Vec3, Vec3); FACES_PER_LIGHT] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

pub fn cube_face_view(light_position: Vec3, face: usize) -> Mat4 {
    let (dir, up) = CUBE_FACES[face % FACES_PER_LIGHT];
    Mat4::look_to_rh(light_position, dir, up)
}

pub fn cube_face_projection(far: f32) -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, SHADOW_NEAR, far.max(SHADOW_NEAR * 2.0))
}

pub fn cube_face_view_proj(light_position: Vec3, face: usize, far: f32) -> Mat4 {
    cube_face_projection(far) * cube_face_view(light_position, face)
}

/// Face whose frustum contains `dir`: the major axis and its sign.
pub fn cube_face_for_direction(dir: Vec3) -> usize {
    let a = dir.abs();
    if a.x >= a.y && a.x >= a.z {
        if dir.x >= 0.0 { 0 } else { 1 }
    } else if a.y >= a.z {
        if dir.y >= 0.0 { 2 } else { 3 }
    } else if dir.z >= 0.0 {
        4
    } else {
        5
    }
}

/// A cube face picked for re-rendering this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShadowFace {
    pub light: usize,
    pub face: usize,
}

impl ShadowFace {
    pub fn layer(&self) -> u32 {
        (self.light * FACES_PER_LIGHT + self.face) as u32
    }
}

/// Per-face data for the moment pass; one 256-byte slot per layer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowFaceUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub far: f32,
    pub esm_exponent: f32,
    pub _pad: [f32; 3],
}

/// Everything the fog needs to look shadows up. Mirrors `ShadowParams`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowSampling {
    pub face_view_proj: [[[f32; 4]; 4]; MAX_SHADOW_LAYERS],
    pub technique: u32,
    pub min_variance: f32,
    pub light_bleed_reduction: f32,
    pub esm_exponent: f32,
    pub resolution: u32,
    pub _pad: [u32; 3],
}

impl ShadowSampling {
    /// `lights` are `(position, shadow far)` pairs in light order.
    pub fn new(settings: &ShadowSettings, lights: &[(Vec3, f32)]) -> Self {
        let mut face_view_proj = [[[0.0; 4]; 4]; MAX_SHADOW_LAYERS];
        for (light, (position, far)) in lights.iter().take(MAX_POINT_LIGHTS).enumerate() {
            for face in 0..FACES_PER_LIGHT {
                face_view_proj[light * FACES_PER_LIGHT + face] =
                    cube_face_view_proj(*position, face, *far).to_cols_array_2d();
            }
        }
        Self {
            face_view_proj,
            technique: settings.technique.shader_index(),
            min_variance: settings.vsm_min_variance,
            light_bleed_reduction: settings.light_bleed_reduction,
            esm_exponent: settings.esm_exponent,
            resolution: settings.resolution,
            _pad: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unoccluded_receivers_are_lit() {
        let m = vsm_moments(0.5);
        assert_eq!(chebyshev_upper_bound(m, 0.4, 0.0, 0.2), 1.0);
        assert_eq!(chebyshev_upper_bound(m, 0.5, 0.0, 0.2), 1.0);
    }

    #[test]
    fn chebyshev_falls_off_behind_occluder() {
        let m = vsm_moments(0.3);
        let near = chebyshev_upper_bound(m, 0.31, 0.0002, 0.0);
        let far = chebyshev_upper_bound(m, 0.6, 0.0002, 0.0);
        assert!(near > far);
        assert!(far < 0.01);
    }

    #[test]
    fn light_bleed_reduction_cuts_low_values() {
        // A blurred edge: half the texels at 0.2, half at 0.8.
        let m = Vec2::new(0.5, 0.5 * (0.04 + 0.64));
        let raw = chebyshev_upper_bound(m, 0.9, 0.0, 0.0);
        let reduced = chebyshev_upper_bound(m, 0.9, 0.0, 0.2);
        assert!(reduced < raw);
        assert!(reduced >= 0.0);
    }

    #[test]
    fn esm_is_one_in_front_and_decays_behind() {
        let c = 40.0;
        let occluder = (c * 0.5f32).exp();
        assert_eq!(esm_visibility(occluder, 0.4, c), 1.0);
        assert_relative_eq!(esm_visibility(occluder, 0.5, c), 1.0, epsilon = 1e-4);
        assert!(esm_visibility(occluder, 0.6, c) < 0.02);
    }

    #[test]
    fn gaussian_is_normalized_and_symmetric() {
        for radius in 0..=MAX_BLUR_RADIUS {
            let w = gaussian_weights(radius);
            assert_eq!(w.len(), 2 * radius as usize + 1);
            assert_relative_eq!(w.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
            for i in 0..w.len() / 2 {
                assert_relative_eq!(w[i], w[w.len() - 1 - i]);
            }
            assert!(w[radius as usize] >= w[0]);
        }
        assert_eq!(gaussian_weights(0), vec![1.0]);
    }

    #[test]
    fn face_selection_follows_major_axis() {
        for (face, (dir, _)) in CUBE_FACES.iter().enumerate() {
            assert_eq!(cube_face_for_direction(*dir), face);
        }
        assert_eq!(cube_face_for_direction(Vec3::new(0.2, -0.9, 0.5)), 3);
        assert_eq!(cube_face_for_direction(Vec3::new(-0.6, 0.1, 0.59)), 1);
    }

    #[test]
    fn selected_face_frustum_contains_direction() {
        let light = Vec3::new(0.0, 3.0, 10.0);
        let dirs = [
            Vec3::new(0.9, 0.3, -0.2),
            Vec3::new(-0.1, 0.95, 0.7),
            Vec3::new(0.3, -0.3, -0.99),
            Vec3::new(-0.7, -0.69, 0.1),
        ];
        for dir in dirs {
            let face = cube_face_for_direction(dir);
            let p = cube_face_view_proj(light, face, 50.0).project_point3(light + dir.normalize() * 5.0);
            assert!(p.x.abs() <= 1.0 + 1e-4 && p.y.abs() <= 1.0 + 1e-4, "face {face}: {p}");
            assert!((0.0..=1.0).contains(&p.z));
        }
    }

    #[test]
    fn layers_are_light_major() {
        assert_eq!(ShadowFace { light: 0, face: 5 }.layer(), 5);
        assert_eq!(ShadowFace { light: 2, face: 1 }.layer(), 13);
    }

    #[test]
    fn settings_validation() {
        assert!(ShadowSettings::default().validate().is_ok());
        for resolution in [32, 300, 8192] {
            let s = ShadowSettings {
                resolution,
                ..Default::default()
            };
            assert!(s.validate().is_err(), "{resolution}");
        }
        let s = ShadowSettings {
            blur_radius: MAX_BLUR_RADIUS + 1,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn uniform_layouts() {
        assert_eq!(std::mem::size_of::<ShadowFaceUniform>(), 96);
        assert_eq!(std::mem::size_of::<ShadowSampling>(), 24 * 64 + 32);
    }
}
