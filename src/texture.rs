use image::{Rgba, RgbaImage};

use crate::gpu::GpuContext;
use crate::mesh::hash3;

/// A sampled 2D texture with its view and sampler.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw sRGB RGBA data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    pub fn from_image(gpu: &GpuContext, image: &RgbaImage, label: &str) -> Self {
        let (width, height) = image.dimensions();
        Self::from_rgba(gpu, image.as_raw(), width, height, label)
    }

    /// Banded planet albedo.
    pub fn planet(gpu: &GpuContext, size: u32, seed: u32) -> Self {
        Self::from_image(gpu, &planet_albedo(size, seed), "Planet Albedo")
    }

    /// Speckled grey rock albedo.
    pub fn rock(gpu: &GpuContext, size: u32, seed: u32) -> Self {
        Self::from_image(gpu, &rock_albedo(size, seed), "Rock Albedo")
    }
}

/// Latitude bands in warm tones, perturbed by per-texel noise.
///
/// The image is twice as wide as it is tall to suit the sphere's UV layout.
pub fn planet_albedo(size: u32, seed: u32) -> RgbaImage {
    let palette: [[f32; 3]; 4] = [
        [196.0, 150.0, 104.0],
        [168.0, 110.0, 72.0],
        [224.0, 196.0, 156.0],
        [140.0, 92.0, 64.0],
    ];
    let height = size.max(1);
    let width = height * 2;

    RgbaImage::from_fn(width, height, |x, y| {
        let wobble = unit_hash(x / 8, y / 4, seed) * 0.35;
        let band = (y as f32 / height as f32 * 9.0 + wobble) as usize % palette.len();
        let grain = unit_hash(x, y, seed ^ 0xa5a5) * 24.0 - 12.0;
        let base = palette[band];
        Rgba([
            (base[0] + grain).clamp(0.0, 255.0) as u8,
            (base[1] + grain).clamp(0.0, 255.0) as u8,
            (base[2] + grain).clamp(0.0, 255.0) as u8,
            255,
        ])
    })
}

/// Grey rock with darker blotches.
pub fn rock_albedo(size: u32, seed: u32) -> RgbaImage {
    let size = size.max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        let blotch = if unit_hash(x / 6, y / 6, seed) > 0.7 { -28.0 } else { 0.0 };
        let grain = unit_hash(x, y, seed.wrapping_add(12_345)) * 30.0 - 15.0;
        let v = (118.0 + blotch + grain).clamp(0.0, 255.0) as u8;
        Rgba([v, v.saturating_sub(4), v.saturating_sub(8), 255])
    })
}

fn unit_hash(x: u32, y: u32, seed: u32) -> f32 {
    hash3(x as i32, y as i32, 0, seed) as f32 / u32::MAX as f32
}

/// Creates a 3D texture, e.g. a froxel volume.
pub fn create_volume_texture(
    device: &wgpu::Device,
    dims: [u32; 3],
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: dims[0],
            height: dims[1],
            depth_or_array_layers: dims[2],
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(&format!("{label} View")),
        dimension: Some(wgpu::TextureViewDimension::D3),
        ..Default::default()
    });
    (texture, view)
}

/// Creates a 2D texture usable as both a storage target and a sampled input.
pub fn create_storage_texture_2d(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planet_albedo_is_opaque_and_wide() {
        let img = planet_albedo(32, 1);
        assert_eq!(img.dimensions(), (64, 32));
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn rock_albedo_is_deterministic() {
        assert_eq!(rock_albedo(16, 3), rock_albedo(16, 3));
        assert_ne!(rock_albedo(16, 3), rock_albedo(16, 4));
    }
}
