//! WGSL sources and bind group layout shorthands.
//!
//! Every shader is compiled as `common.wgsl` followed by its own body, so
//! the camera, light and phase-function declarations live in one place.

/// Camera, lights, shared constants and helpers.
pub const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");

/// Group 0 camera and light bindings, for shaders that use them.
pub const SCENE_WGSL: &str = include_str!("shaders/scene.wgsl");

pub const MESH_WGSL: &str = include_str!("shaders/mesh.wgsl");
pub const SHADOW_MOMENTS_WGSL: &str = include_str!("shaders/shadow_moments.wgsl");
pub const SHADOW_BLUR_WGSL: &str = include_str!("shaders/shadow_blur.wgsl");
pub const FOG_COMMON_WGSL: &str = include_str!("shaders/fog_common.wgsl");
pub const FOG_SCATTER_WGSL: &str = include_str!("shaders/fog_scatter.wgsl");
pub const FOG_ACCUMULATE_WGSL: &str = include_str!("shaders/fog_accumulate.wgsl");
pub const FOG_COMPOSITE_WGSL: &str = include_str!("shaders/fog_composite.wgsl");
pub const LUT_HOOBLER_WGSL: &str = include_str!("shaders/lut_hoobler.wgsl");
pub const LUT_KOVALOVS_WGSL: &str = include_str!("shaders/lut_kovalovs.wgsl");

/// Joins `common.wgsl` and `parts` into one module.
pub fn compose(parts: &[&str]) -> String {
    let mut source = String::from(COMMON_WGSL);
    for part in parts {
        source.push('\n');
        source.push_str(part);
    }
    source
}

pub fn create_shader(device: &wgpu::Device, label: &str, parts: &[&str]) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(compose(parts).into()),
    })
}

pub fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub fn storage_texture_entry(
    binding: u32,
    format: wgpu::TextureFormat,
    dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: dimension,
        },
        count: None,
    }
}

pub fn sampler_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Rounds `size` up to the device's dynamic uniform offset alignment.
pub fn aligned_uniform_stride(device: &wgpu::Device, size: usize) -> u64 {
    let align = u64::from(device.limits().min_uniform_buffer_offset_alignment);
    (size as u64).div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_source_starts_with_common() {
        let source = compose(&[SCENE_WGSL, FOG_COMMON_WGSL, FOG_SCATTER_WGSL]);
        assert!(source.starts_with(COMMON_WGSL));
        assert!(source.contains("fn henyey_greenstein"));
        assert!(source.contains("fn slice_to_depth"));
        assert!(source.contains("var<uniform> camera"));
    }

    #[test]
    fn entry_points_exist() {
        assert!(MESH_WGSL.contains("fn vs_main"));
        assert!(MESH_WGSL.contains("fn fs_linear_depth"));
        assert!(MESH_WGSL.contains("fn fs_colour"));
        assert!(FOG_SCATTER_WGSL.contains("fn cs_main"));
        assert!(FOG_ACCUMULATE_WGSL.contains("fn cs_main"));
        assert!(FOG_COMPOSITE_WGSL.contains("fn fs_main"));
        assert!(SHADOW_BLUR_WGSL.contains("fn cs_main"));
        assert!(LUT_HOOBLER_WGSL.contains("fn cs_main"));
        assert!(LUT_KOVALOVS_WGSL.contains("fn cs_main"));
    }
}
