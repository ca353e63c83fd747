use crate::shadow::MAX_SHADOW_LAYERS;

/// Moments `(d, d², exp(c·d), 1)` per texel; 32-bit so `exp(c·d)` fits.
pub const MOMENTS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Layered moment maps for every light's cube faces.
pub struct PointShadowMaps {
    pub resolution: u32,
    /// One single-layer view per cube face, for render attachments.
    pub layer_views: Vec<wgpu::TextureView>,
    /// All layers, for sampling and blur output.
    pub array_view: wgpu::TextureView,
    /// Intermediate of the separable blur.
    pub scratch_view: wgpu::TextureView,
    /// Depth buffer shared by every face render.
    pub depth_view: wgpu::TextureView,
    _moments: wgpu::Texture,
    _scratch: wgpu::Texture,
    _depth: wgpu::Texture,
}

impl PointShadowMaps {
    pub fn new(device: &wgpu::Device, resolution: u32) -> Self {
        let layered = |label: &str, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: resolution,
                    height: resolution,
                    depth_or_array_layers: MAX_SHADOW_LAYERS as u32,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: MOMENTS_FORMAT,
                usage,
                view_formats: &[],
            })
        };

        let moments = layered(
            "Shadow Moments",
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING,
        );
        let scratch = layered(
            "Shadow Blur Scratch",
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
        );

        let array_view_desc = |label: &'static str| wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        };
        let array_view = moments.create_view(&array_view_desc("Shadow Moments Array"));
        let scratch_view = scratch.create_view(&array_view_desc("Shadow Blur Scratch Array"));

        let layer_views = (0..MAX_SHADOW_LAYERS as u32)
            .map(|layer| {
                moments.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("Shadow Moments Layer {layer}")),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Depth"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            resolution,
            layer_views,
            array_view,
            scratch_view,
            depth_view,
            _moments: moments,
            _scratch: scratch,
            _depth: depth,
        }
    }
}
