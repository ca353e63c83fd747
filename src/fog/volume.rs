use crate::fog::{FogUniforms, FroxelGrid};
use crate::texture::create_volume_texture;

/// Format of both scatter volumes and the integrated volume.
pub const SCATTER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// GPU storage for the froxel grid.
///
/// `scatter[i]` holds σ_s-weighted in-scattered light in rgb and extinction
/// σ_t in alpha. The two alternate by frame parity so the scatter pass can
/// read last frame's volume while writing this frame's. `integrated` holds
/// the front-to-back result: in-scattering in rgb, transmittance in alpha.
/// `params` holds this frame's [`FogUniforms`], shared by all three passes.
pub struct FroxelVolume {
    /// Grid the volumes were allocated for. Only `dims` is fixed; near and
    /// far travel with each frame's uniforms.
    pub grid: FroxelGrid,
    pub params: wgpu::Buffer,
    pub scatter: [wgpu::TextureView; 2],
    pub integrated: wgpu::TextureView,
    /// Trilinear, clamped sampler for history and composite lookups.
    pub sampler: wgpu::Sampler,
    _textures: [wgpu::Texture; 3],
}

impl FroxelVolume {
    pub fn new(device: &wgpu::Device, grid: &FroxelGrid) -> Self {
        let usage = wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING;
        let (a, a_view) =
            create_volume_texture(device, grid.dims, SCATTER_FORMAT, usage, "Fog Scatter Volume 0");
        let (b, b_view) =
            create_volume_texture(device, grid.dims, SCATTER_FORMAT, usage, "Fog Scatter Volume 1");
        let (integrated, integrated_view) =
            create_volume_texture(device, grid.dims, SCATTER_FORMAT, usage, "Fog Integrated Volume");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fog Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fog Params"),
            size: std::mem::size_of::<FogUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            grid: *grid,
            params,
            scatter: [a_view, b_view],
            integrated: integrated_view,
            sampler,
            _textures: [a, b, integrated],
        }
    }
}
