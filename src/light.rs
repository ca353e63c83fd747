//! Point lights and their GPU layout.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Upper bound on simultaneously shaded and shadowed point lights.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Cap on a light's shadow range, for lights that never fade out.
pub const MAX_SHADOW_FAR: f32 = 500.0;

/// A point light with Phong terms and distance attenuation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
    /// Scales the light's contribution to fog in-scattering.
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, 10.0),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
            intensity: 3.0,
        }
    }
}

impl PointLight {
    /// `1 / (constant + linear·d + quadratic·d²)`.
    pub fn attenuation(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }

    /// Distance at which `intensity · attenuation` drops to `threshold`.
    ///
    /// Returns 0 when the light never reaches the threshold.
    pub fn effective_range(&self, threshold: f32) -> f32 {
        let target = self.intensity / threshold.max(f32::EPSILON);
        let c = self.constant - target;
        if c >= 0.0 {
            return 0.0;
        }

        if self.quadratic > f32::EPSILON {
            let disc = self.linear * self.linear - 4.0 * self.quadratic * c;
            (-self.linear + disc.sqrt()) / (2.0 * self.quadratic)
        } else if self.linear > f32::EPSILON {
            -c / self.linear
        } else {
            f32::INFINITY
        }
    }

    pub fn to_gpu(&self, shadow_far: f32) -> GpuPointLight {
        GpuPointLight {
            position: self.position.to_array(),
            constant: self.constant,
            ambient: self.ambient.to_array(),
            linear: self.linear,
            diffuse: self.diffuse.to_array(),
            quadratic: self.quadratic,
            specular: self.specular.to_array(),
            intensity: self.intensity,
            shadow_far,
            _pad: [0.0; 3],
        }
    }
}

/// Mirrors `PointLight` in `common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub constant: f32,
    pub ambient: [f32; 3],
    pub linear: f32,
    pub diffuse: [f32; 3],
    pub quadratic: f32,
    pub specular: [f32; 3],
    pub intensity: f32,
    pub shadow_far: f32,
    pub _pad: [f32; 3],
}

/// Light array bound at group 0, binding 1 of every lit shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightsUniform {
    pub lights: [GpuPointLight; MAX_POINT_LIGHTS],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl LightsUniform {
    /// Packs up to [`MAX_POINT_LIGHTS`] lights; extra lights are dropped.
    pub fn new(lights: &[PointLight], threshold: f32) -> Self {
        let mut packed = [GpuPointLight::default(); MAX_POINT_LIGHTS];
        let count = lights.len().min(MAX_POINT_LIGHTS);
        for (slot, light) in packed.iter_mut().zip(lights) {
            *slot = light.to_gpu(light.effective_range(threshold).clamp(1.0, MAX_SHADOW_FAR));
        }
        Self {
            lights: packed,
            count: count as u32,
            _pad: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gpu_layout_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 80);
        assert_eq!(std::mem::size_of::<LightsUniform>() % 16, 0);
    }

    #[test]
    fn attenuation_at_zero_is_inverse_constant() {
        let light = PointLight::default();
        assert_relative_eq!(light.attenuation(0.0), 1.0);
        assert!(light.attenuation(10.0) < light.attenuation(5.0));
    }

    #[test]
    fn effective_range_hits_threshold() {
        let light = PointLight::default();
        let range = light.effective_range(0.01);
        assert!(range > 0.0);
        assert_relative_eq!(light.intensity * light.attenuation(range), 0.01, epsilon = 1e-4);
    }

    #[test]
    fn dim_light_has_no_range() {
        let light = PointLight {
            intensity: 0.001,
            ..Default::default()
        };
        assert_eq!(light.effective_range(0.01), 0.0);
    }

    #[test]
    fn uniform_clamps_light_count() {
        let lights = vec![PointLight::default(); MAX_POINT_LIGHTS + 2];
        let uniform = LightsUniform::new(&lights, 0.01);
        assert_eq!(uniform.count as usize, MAX_POINT_LIGHTS);
    }
}
