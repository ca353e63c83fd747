//! Render targets and execution context for the render graph.

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::perf::RangeCommands;

/// Format of the lit scene before fog composition.
pub const COLOUR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// View-space depth along the camera forward axis, in world units.
pub const LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// Hardware depth buffer shared by the depth and colour passes.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// An off-screen render target sized to the surface.
///
/// Render targets can be both rendered to and sampled from, so the
/// composite pass can read what the colour and depth passes wrote.
pub struct RenderTarget {
    /// The underlying GPU texture that stores pixel data.
    pub texture: wgpu::Texture,
    /// A view into the texture, used for render pass attachments and shader sampling.
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Creates a `width`×`height` target with `RENDER_ATTACHMENT` and
    /// `TEXTURE_BINDING` usage.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
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
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Intermediate images shared between the scene passes and the composite.
pub struct SceneTargets {
    /// Lit planet and asteroids.
    pub colour: RenderTarget,
    /// Linear view depth, cleared to the camera far plane.
    pub linear_depth: RenderTarget,
    pub depth: RenderTarget,
}

impl SceneTargets {
    pub fn new(gpu: &GpuContext) -> Self {
        let (w, h) = (gpu.width(), gpu.height());
        Self {
            colour: RenderTarget::new(&gpu.device, w, h, COLOUR_FORMAT, "Scene Colour"),
            linear_depth: RenderTarget::new(&gpu.device, w, h, LINEAR_DEPTH_FORMAT, "Scene Linear Depth"),
            depth: RenderTarget::new(&gpu.device, w, h, DEPTH_FORMAT, "Scene Depth"),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.colour.size()
    }

    /// Recreates every target if the surface size changed. Returns whether
    /// anything was recreated.
    pub fn ensure_size(&mut self, gpu: &GpuContext) -> bool {
        if self.size() == (gpu.width(), gpu.height()) {
            return false;
        }
        *self = Self::new(gpu);
        true
    }
}

/// Execution context passed to each render node during graph traversal.
///
/// The `'a` lifetime ties every reference to the frame being recorded, so
/// nodes cannot hold on to the encoder or the surface view.
pub struct RenderContext<'a> {
    pub gpu: &'a GpuContext,
    /// Command encoder shared by every node of the frame.
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub frame: &'a FrameState,
    pub targets: &'a SceneTargets,
    /// Where named ranges go, e.g. the report generator.
    pub ranges: &'a mut dyn RangeCommands,
    /// Swapchain image the composite writes to.
    pub surface_view: &'a wgpu::TextureView,
}

impl RenderContext<'_> {
    /// Runs `f` inside a debug group and a profiler range called `name`.
    pub fn scope<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.encoder.push_debug_group(name);
        self.ranges.push_range(self.encoder, name);
        let result = f(self);
        self.ranges.pop_range(self.encoder);
        self.encoder.pop_debug_group();
        result
    }
}
