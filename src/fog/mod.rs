//! Froxel volumetric fog.
//!
//! The fog lives in a camera-aligned grid of froxels whose slices are spaced
//! exponentially between the near plane and [`FogSettings::fog_far`]. Each
//! frame runs three passes:
//!
//! 1. [`FogScatterNode`] evaluates density, extinction and in-scattered
//!    light per froxel, blending with last frame's volume reprojected into
//!    the current one. Two volumes ping-pong by frame parity.
//! 2. [`FogAccumulateNode`] walks every froxel column front to back and
//!    integrates in-scattering and transmittance.
//! 3. [`FogCompositeNode`] looks up the integrated volume at each pixel's
//!    linear depth and applies it to the lit scene.
//!
//! [`FogHistory`] is the frame-coherent half: which volume is current, what
//! the previous camera was, and whether the history may be trusted.

mod accumulate;
mod composite;
mod scatter;
mod volume;

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::lut::LutSettings;

pub use accumulate::FogAccumulateNode;
pub use composite::{FogCompositeNode, OutputMode};
pub use scatter::FogScatterNode;
pub use volume::{FroxelVolume, SCATTER_FORMAT};

/// Compute workgroup used by every fog pass.
pub const FOG_WORKGROUP: [u32; 3] = [8, 8, 1];

/// How light reaching a froxel is integrated along the view ray.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightIntegration {
    /// Point-sample lighting at the (jittered) froxel centre.
    #[default]
    FroxelCentre,
    /// Analytic segment integral through the froxel using the Hoobler LUT.
    Hoobler,
}

/// Whether light scattered more than once is approximated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleScattering {
    #[default]
    Single,
    /// Octave sum read from the Kovalovs LUT.
    Kovalovs,
}

/// Participating-medium parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FogSettings {
    /// Scale applied to scattering and absorption.
    pub density: f32,
    /// Henyey-Greenstein asymmetry in `[-1, 1]`.
    pub phase_g: f32,
    pub scattering: Vec3,
    pub absorption: Vec3,
    /// Tint of scattered light.
    pub albedo: Vec3,
    /// Modulate density with 3D value noise.
    pub heterogeneous: bool,
    pub noise_frequency: f32,
    pub noise_offset: Vec3,
    /// Noise offset drift per second.
    pub wind_direction: Vec3,
    /// Weight of the reprojected previous frame, in `[0, 1)`.
    pub history_weight: f32,
    /// Distance covered by the froxel grid.
    pub fog_far: f32,
    pub apply_fog: bool,
    pub light_integration: LightIntegration,
    pub multiple_scattering: MultipleScattering,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            density: 0.05,
            phase_g: 0.0,
            scattering: Vec3::ONE,
            absorption: Vec3::ONE,
            albedo: Vec3::ONE,
            heterogeneous: true,
            noise_frequency: 0.4,
            noise_offset: Vec3::ZERO,
            wind_direction: Vec3::ZERO,
            history_weight: 0.9,
            fog_far: 64.0,
            apply_fog: true,
            light_integration: LightIntegration::FroxelCentre,
            multiple_scattering: MultipleScattering::Single,
        }
    }
}

impl FogSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.density >= 0.0) {
            return Err(format!("fog density {} must be non-negative", self.density));
        }
        if self.scattering.min_element() < 0.0 || self.absorption.min_element() < 0.0 {
            return Err("fog scattering and absorption must be non-negative".to_string());
        }
        if !(-1.0..=1.0).contains(&self.phase_g) {
            return Err(format!("fog phase g {} outside [-1, 1]", self.phase_g));
        }
        if !(0.0..1.0).contains(&self.history_weight) {
            return Err(format!(
                "fog history weight {} outside [0, 1)",
                self.history_weight
            ));
        }
        if !(self.fog_far > 0.0) {
            return Err(format!("fog far {} must be positive", self.fog_far));
        }
        if self.noise_frequency < 0.0 {
            return Err("fog noise frequency must be non-negative".to_string());
        }
        Ok(())
    }

    /// Drifts the noise field with the wind.
    pub fn advance_noise(&mut self, dt: f32) {
        self.noise_offset += self.wind_direction * dt;
    }

    /// True when switching from `self` to `other` makes last frame's volume
    /// meaningless. Wind drift alone does not.
    pub fn requires_history_reset(&self, other: &FogSettings) -> bool {
        let mut other = other.clone();
        other.noise_offset = self.noise_offset;
        *self != other
    }

    /// Extinction coefficient σ_t = (σ_s + σ_a)·density, per channel.
    pub fn extinction(&self) -> Vec3 {
        (self.scattering + self.absorption) * self.density
    }
}

/// Henyey-Greenstein phase function, normalized over the sphere.
pub fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    let denom = (1.0 + g2 - 2.0 * g * cos_theta).max(1e-6);
    (1.0 - g2) / (4.0 * PI * denom * denom.sqrt())
}

/// Radical inverse of `index` in `base`, in `[0, 1)`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut f = 1.0;
    let mut result = 0.0;
    let inv_base = 1.0 / base as f32;
    while index > 0 {
        f *= inv_base;
        result += f * (index % base) as f32;
        index /= base;
    }
    result
}

/// The froxel grid and its exponential depth distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FroxelGrid {
    pub dims: [u32; 3],
    pub near: f32,
    pub far: f32,
}

impl FroxelGrid {
    pub const DEFAULT_DIMS: [u32; 3] = [160, 90, 64];

    pub fn new(near: f32, far: f32) -> Self {
        Self {
            dims: Self::DEFAULT_DIMS,
            near,
            far,
        }
    }

    fn slices(&self) -> f32 {
        self.dims[2] as f32
    }

    /// View depth at the start of slice `s`; `s` may be fractional.
    pub fn slice_to_depth(&self, s: f32) -> f32 {
        self.near * (self.far / self.near).powf(s / self.slices())
    }

    /// Inverse of [`slice_to_depth`](Self::slice_to_depth), clamped to
    /// `[0, slices]`.
    pub fn depth_to_slice(&self, z: f32) -> f32 {
        if z <= self.near {
            return 0.0;
        }
        let s = self.slices() * (z / self.near).ln() / (self.far / self.near).ln();
        s.clamp(0.0, self.slices())
    }

    /// Workgroups covering every froxel.
    pub fn dispatch_size(&self, workgroup: [u32; 3]) -> [u32; 3] {
        [
            self.dims[0].div_ceil(workgroup[0]),
            self.dims[1].div_ceil(workgroup[1]),
            self.dims[2].div_ceil(workgroup[2]),
        ]
    }

    /// Workgroups covering every froxel column, for the accumulation walk.
    pub fn column_dispatch_size(&self, workgroup: [u32; 3]) -> [u32; 3] {
        [
            self.dims[0].div_ceil(workgroup[0]),
            self.dims[1].div_ceil(workgroup[1]),
            1,
        ]
    }

    /// World position of grid coordinate `coord` (x, y in froxels, z in
    /// slices), as the scatter shader computes it.
    pub fn froxel_to_world(&self, coord: Vec3, inv_view_proj: Mat4, position: Vec3, forward: Vec3) -> Vec3 {
        let uv = coord.truncate() / glam::Vec2::new(self.dims[0] as f32, self.dims[1] as f32);
        let ndc = Vec3::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 1.0);
        let ray = (inv_view_proj.project_point3(ndc) - position).normalize();
        let depth = self.slice_to_depth(coord.z);
        position + ray * (depth / ray.dot(forward))
    }

    /// Normalized grid coordinate of `world` as seen through `view_proj`,
    /// as the reprojection in the scatter shader computes it.
    pub fn world_to_uvw(&self, world: Vec3, view_proj: Mat4, position: Vec3, forward: Vec3) -> Vec3 {
        let ndc = view_proj.project_point3(world);
        let depth = (world - position).dot(forward);
        Vec3::new(
            ndc.x * 0.5 + 0.5,
            0.5 - ndc.y * 0.5,
            self.depth_to_slice(depth) / self.slices(),
        )
    }
}

/// Camera state kept from one frame to the next for reprojection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSnapshot {
    pub view_proj: Mat4,
    pub position: Vec3,
    pub forward: Vec3,
}

impl CameraSnapshot {
    pub fn new(camera: &Camera, aspect: f32) -> Self {
        Self {
            view_proj: camera.view_projection(aspect),
            position: camera.position,
            forward: camera.forward,
        }
    }
}

/// Ping-pong parity and temporal history validity.
///
/// A fresh history is invalid, so the first frame ignores the (empty)
/// previous volume. [`invalidate`](Self::invalidate) has the same effect
/// for exactly one frame.
#[derive(Clone, Debug, Default)]
pub struct FogHistory {
    frame: u64,
    valid: bool,
    previous_camera: Option<CameraSnapshot>,
}

impl FogHistory {
    /// Jitter sequence length.
    pub const JITTER_PERIOD: u64 = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Volume written this frame.
    pub fn current(&self) -> usize {
        (self.frame % 2) as usize
    }

    /// Volume written last frame.
    pub fn previous(&self) -> usize {
        1 - self.current()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Flips parity after a frame has been recorded.
    pub fn advance(&mut self) {
        self.frame += 1;
        self.valid = true;
    }

    /// Discards the history for the next frame.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// `requested` when the history is usable, 0 otherwise.
    pub fn history_weight(&self, requested: f32) -> f32 {
        if self.valid { requested } else { 0.0 }
    }

    /// Sub-froxel offset: Halton(2, 3) across the slice, Halton(5) in depth.
    pub fn jitter(&self) -> Vec3 {
        let i = (self.frame % Self::JITTER_PERIOD) as u32 + 1;
        Vec3::new(halton(i, 2), halton(i, 3), halton(i, 5))
    }

    pub fn remember_camera(&mut self, camera: CameraSnapshot) {
        self.previous_camera = Some(camera);
    }

    /// Last frame's camera, or `current` on the first frame.
    pub fn previous_camera_or(&self, current: CameraSnapshot) -> CameraSnapshot {
        self.previous_camera.unwrap_or(current)
    }
}

pub const FLAG_HETEROGENEOUS: u32 = 1;
pub const FLAG_HOOBLER: u32 = 1 << 1;
pub const FLAG_KOVALOVS: u32 = 1 << 2;
pub const FLAG_APPLY_FOG: u32 = 1 << 3;

/// Mirrors `FogParams` in the fog shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FogUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub prev_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub near: f32,
    pub camera_forward: [f32; 3],
    pub fog_far: f32,
    pub prev_camera_position: [f32; 3],
    pub history_weight: f32,
    pub prev_camera_forward: [f32; 3],
    pub density: f32,
    pub scattering: [f32; 3],
    pub phase_g: f32,
    pub absorption: [f32; 3],
    pub noise_frequency: f32,
    pub albedo: [f32; 3],
    pub time: f32,
    pub noise_offset: [f32; 3],
    pub light_count: u32,
    pub jitter: [f32; 3],
    pub flags: u32,
    pub grid: [u32; 3],
    pub output_mode: u32,
    pub hoobler_tau_max: f32,
    pub kovalovs_tau_max: f32,
    pub camera_far: f32,
    pub _pad: u32,
}

/// Everything [`FogUniforms::new`] packs for one frame.
pub struct FogFrame<'a> {
    pub settings: &'a FogSettings,
    pub lut: &'a LutSettings,
    pub grid: &'a FroxelGrid,
    pub camera: &'a Camera,
    pub aspect: f32,
    pub previous: CameraSnapshot,
    pub history_weight: f32,
    pub jitter: Vec3,
    pub time: f32,
    pub light_count: u32,
    pub output_mode: OutputMode,
}

impl FogUniforms {
    pub fn new(frame: &FogFrame) -> Self {
        let s = frame.settings;
        let mut flags = 0;
        if s.heterogeneous {
            flags |= FLAG_HETEROGENEOUS;
        }
        if s.light_integration == LightIntegration::Hoobler {
            flags |= FLAG_HOOBLER;
        }
        if s.multiple_scattering == MultipleScattering::Kovalovs {
            flags |= FLAG_KOVALOVS;
        }
        if s.apply_fog {
            flags |= FLAG_APPLY_FOG;
        }

        Self {
            inv_view_proj: frame
                .camera
                .view_projection(frame.aspect)
                .inverse()
                .to_cols_array_2d(),
            prev_view_proj: frame.previous.view_proj.to_cols_array_2d(),
            camera_position: frame.camera.position.to_array(),
            near: frame.grid.near,
            camera_forward: frame.camera.forward.to_array(),
            fog_far: frame.grid.far,
            prev_camera_position: frame.previous.position.to_array(),
            history_weight: frame.history_weight,
            prev_camera_forward: frame.previous.forward.to_array(),
            density: s.density,
            scattering: s.scattering.to_array(),
            phase_g: s.phase_g,
            absorption: s.absorption.to_array(),
            noise_frequency: s.noise_frequency,
            albedo: s.albedo.to_array(),
            time: frame.time,
            noise_offset: s.noise_offset.to_array(),
            light_count: frame.light_count,
            jitter: frame.jitter.to_array(),
            flags,
            grid: frame.grid.dims,
            output_mode: frame.output_mode as u32,
            hoobler_tau_max: frame.lut.hoobler_max_optical_depth,
            kovalovs_tau_max: frame.lut.kovalovs_max_optical_depth,
            camera_far: frame.camera.far,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn slice_mapping_is_exponential_and_invertible() {
        let grid = FroxelGrid::new(0.1, 64.0);
        assert_relative_eq!(grid.slice_to_depth(0.0), 0.1);
        assert_relative_eq!(grid.slice_to_depth(64.0), 64.0, epsilon = 1e-3);
        for s in [0.5, 7.0, 31.25, 63.0] {
            assert_relative_eq!(grid.depth_to_slice(grid.slice_to_depth(s)), s, epsilon = 1e-3);
        }
        // Slices get thicker with distance.
        let first = grid.slice_to_depth(1.0) - grid.slice_to_depth(0.0);
        let last = grid.slice_to_depth(64.0) - grid.slice_to_depth(63.0);
        assert!(last > first * 10.0);
    }

    #[test]
    fn depth_to_slice_clamps() {
        let grid = FroxelGrid::new(0.1, 64.0);
        assert_eq!(grid.depth_to_slice(0.0), 0.0);
        assert_eq!(grid.depth_to_slice(-3.0), 0.0);
        assert_eq!(grid.depth_to_slice(1000.0), 64.0);
    }

    #[test]
    fn dispatch_rounds_up() {
        let grid = FroxelGrid::new(0.1, 64.0);
        assert_eq!(grid.dispatch_size(FOG_WORKGROUP), [20, 12, 64]);
        assert_eq!(grid.column_dispatch_size(FOG_WORKGROUP), [20, 12, 1]);
    }

    #[test]
    fn froxel_world_mapping_round_trips() {
        let camera = Camera::default();
        let aspect = 16.0 / 9.0;
        let view_proj = camera.view_projection(aspect);
        let grid = FroxelGrid::new(camera.near, 64.0);

        for coord in [
            Vec3::new(80.0, 45.0, 32.0),
            Vec3::new(3.5, 80.25, 10.0),
            Vec3::new(150.0, 2.0, 60.5),
        ] {
            let world =
                grid.froxel_to_world(coord, view_proj.inverse(), camera.position, camera.forward);
            let uvw = grid.world_to_uvw(world, view_proj, camera.position, camera.forward);
            assert_relative_eq!(uvw.x * 160.0, coord.x, epsilon = 1e-2);
            assert_relative_eq!(uvw.y * 90.0, coord.y, epsilon = 1e-2);
            assert_relative_eq!(uvw.z * 64.0, coord.z, epsilon = 1e-2);
        }
    }

    #[test]
    fn centre_froxel_lies_on_forward_axis() {
        let camera = Camera::default();
        let grid = FroxelGrid::new(camera.near, 64.0);
        let inv = camera.view_projection(1.0).inverse();
        let world = grid.froxel_to_world(Vec3::new(80.0, 45.0, 64.0), inv, camera.position, camera.forward);
        assert_relative_eq!(world.x, camera.position.x, epsilon = 1e-3);
        assert_relative_eq!(world.z, camera.position.z - 64.0, epsilon = 1e-2);
    }

    #[test]
    fn history_parity_and_invalidation() {
        let mut history = FogHistory::new();
        assert_eq!(history.current(), 0);
        assert_eq!(history.previous(), 1);
        assert_eq!(history.history_weight(0.9), 0.0, "first frame has no history");

        history.advance();
        assert_eq!(history.current(), 1);
        assert_eq!(history.previous(), 0);
        assert_eq!(history.history_weight(0.9), 0.9);

        history.invalidate();
        assert_eq!(history.history_weight(0.9), 0.0);
        history.advance();
        assert_eq!(history.history_weight(0.9), 0.9, "invalidation lasts one frame");
        assert_eq!(history.frame_index(), 2);
    }

    #[test]
    fn jitter_is_in_unit_cube_and_changes() {
        let mut history = FogHistory::new();
        let mut seen = Vec::new();
        for _ in 0..FogHistory::JITTER_PERIOD {
            let j = history.jitter();
            assert!(j.min_element() >= 0.0 && j.max_element() < 1.0);
            seen.push(j);
            history.advance();
        }
        assert_ne!(seen[0], seen[1]);
        assert_eq!(history.jitter(), seen[0], "sequence repeats");
    }

    #[test]
    fn halton_known_values() {
        assert_relative_eq!(halton(1, 2), 0.5);
        assert_relative_eq!(halton(2, 2), 0.25);
        assert_relative_eq!(halton(3, 2), 0.75);
        assert_relative_eq!(halton(1, 3), 1.0 / 3.0);
        assert_relative_eq!(halton(2, 3), 2.0 / 3.0);
        assert_relative_eq!(halton(4, 3), 1.0 / 9.0 + 1.0 / 3.0);
    }

    #[test]
    fn henyey_greenstein_is_normalized() {
        for g in [-0.7, 0.0, 0.3, 0.9] {
            let n = 20_000;
            let integral: f32 = (0..n)
                .map(|i| {
                    let mu = -1.0 + (i as f32 + 0.5) * 2.0 / n as f32;
                    henyey_greenstein(mu, g) * 2.0 * PI * (2.0 / n as f32)
                })
                .sum();
            assert_relative_eq!(integral, 1.0, epsilon = 1e-2);
        }
        assert_relative_eq!(henyey_greenstein(0.3, 0.0), 1.0 / (4.0 * PI));
    }

    #[test]
    fn forward_scattering_peaks_forward() {
        assert!(henyey_greenstein(1.0, 0.6) > henyey_greenstein(-1.0, 0.6));
    }

    #[test]
    fn wind_moves_noise() {
        let mut settings = FogSettings {
            wind_direction: Vec3::new(1.0, 0.0, -2.0),
            ..Default::default()
        };
        settings.advance_noise(0.5);
        assert_eq!(settings.noise_offset, Vec3::new(0.5, 0.0, -1.0));
    }

    #[test]
    fn only_real_changes_reset_history() {
        let base = FogSettings::default();
        let mut drifted = base.clone();
        drifted.noise_offset = Vec3::splat(3.0);
        assert!(!base.requires_history_reset(&drifted));

        let mut denser = base.clone();
        denser.density = 0.2;
        assert!(base.requires_history_reset(&denser));
    }

    #[test]
    fn validation() {
        assert!(FogSettings::default().validate().is_ok());
        let bad = FogSettings {
            density: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = FogSettings {
            history_weight: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = FogSettings {
            absorption: Vec3::new(0.0, -0.1, 0.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn uniforms_pack_flags_and_layout() {
        assert_eq!(std::mem::size_of::<FogUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<FogUniforms>(), 304);

        let settings = FogSettings {
            heterogeneous: false,
            light_integration: LightIntegration::Hoobler,
            ..Default::default()
        };
        let camera = Camera::default();
        let grid = FroxelGrid::new(camera.near, settings.fog_far);
        let lut = LutSettings::default();
        let u = FogUniforms::new(&FogFrame {
            settings: &settings,
            lut: &lut,
            grid: &grid,
            camera: &camera,
            aspect: 1.0,
            previous: CameraSnapshot::new(&camera, 1.0),
            history_weight: 0.0,
            jitter: Vec3::ZERO,
            time: 0.0,
            light_count: 1,
            output_mode: OutputMode::Colour,
        });
        assert_eq!(u.flags, FLAG_HOOBLER | FLAG_APPLY_FOG);
        assert_eq!(u.grid, [160, 90, 64]);
        assert_eq!(u.fog_far, 64.0);
    }
}
