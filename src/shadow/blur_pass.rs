use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, RenderNode};
use crate::shader::{
    self, SHADOW_BLUR_WGSL, aligned_uniform_stride, storage_texture_entry, texture_entry,
    uniform_entry,
};
use crate::shadow::{
    MAX_BLUR_RADIUS, MAX_SHADOW_LAYERS, MOMENTS_FORMAT, PointShadowMaps, ShadowTechnique,
    gaussian_weights,
};

const WORKGROUP: u32 = 8;
const HORIZONTAL: u32 = 0;
const VERTICAL: u32 = 1;

/// Mirrors `BlurParams` in `shadow_blur.wgsl`. Only `.x` of each weight is
/// used; the vec4 stride keeps the array uniform-compatible.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlurParams {
    layer: u32,
    direction: u32,
    radius: u32,
    _pad: u32,
    weights: [[f32; 4]; MAX_BLUR_RADIUS as usize + 1],
}

impl BlurParams {
    fn new(layer: u32, direction: u32, radius: u32) -> Self {
        let kernel = gaussian_weights(radius);
        let mut weights = [[0.0; 4]; MAX_BLUR_RADIUS as usize + 1];
        // One-sided: weights[i] applies to offsets ±i.
        for (i, w) in kernel[radius as usize..].iter().enumerate() {
            weights[i][0] = *w;
        }
        Self {
            layer,
            direction,
            radius,
            _pad: 0,
            weights,
        }
    }
}

/// "Shadow map blur": separable gaussian over every freshly rendered layer,
/// moments → scratch horizontally, then scratch → moments vertically.
pub struct ShadowBlurNode {
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    stride: u64,
    horizontal: wgpu::BindGroup,
    vertical: wgpu::BindGroup,
    maps: Arc<PointShadowMaps>,
    layers: Vec<u32>,
}

impl ShadowBlurNode {
    pub fn new(gpu: &GpuContext, maps: Arc<PointShadowMaps>) -> Self {
        let device = &gpu.device;
        let stride = aligned_uniform_stride(device, std::mem::size_of::<BlurParams>());
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Blur Params"),
            size: stride * MAX_SHADOW_LAYERS as u64 * 2,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Blur Layout"),
            entries: &[
                texture_entry(
                    0,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::TextureViewDimension::D2Array,
                    false,
                ),
                storage_texture_entry(1, MOMENTS_FORMAT, wgpu::TextureViewDimension::D2Array),
                uniform_entry(2, wgpu::ShaderStages::COMPUTE, true),
            ],
        });

        let bind = |label: &str, src: &wgpu::TextureView, dst: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &params_buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(std::mem::size_of::<BlurParams>() as u64),
                        }),
                    },
                ],
            })
        };
        let horizontal = bind("Shadow Blur Horizontal", &maps.array_view, &maps.scratch_view);
        let vertical = bind("Shadow Blur Vertical", &maps.scratch_view, &maps.array_view);

        let module = shader::create_shader(device, "Shadow Blur Shader", &[SHADOW_BLUR_WGSL]);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Blur Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Shadow Blur Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            params_buffer,
            stride,
            horizontal,
            vertical,
            maps,
            layers: Vec::new(),
        }
    }

    fn offset(&self, layer: u32, direction: u32) -> u64 {
        (u64::from(layer) * 2 + u64::from(direction)) * self.stride
    }
}

impl RenderNode for ShadowBlurNode {
    fn name(&self) -> &str {
        "Shadow map blur"
    }

    fn prepare(&mut self, gpu: &GpuContext, frame: &FrameState) {
        self.layers.clear();
        let settings = &frame.shadow_settings;
        if settings.technique == ShadowTechnique::Off || settings.blur_radius == 0 {
            return;
        }
        let radius = settings.blur_radius.min(MAX_BLUR_RADIUS);
        for face in &frame.shadow_faces {
            let layer = face.layer();
            for direction in [HORIZONTAL, VERTICAL] {
                gpu.queue.write_buffer(
                    &self.params_buffer,
                    self.offset(layer, direction),
                    bytemuck::bytes_of(&BlurParams::new(layer, direction, radius)),
                );
            }
            self.layers.push(layer);
        }
    }

    fn execute(&self, ctx: &mut RenderContext) {
        if self.layers.is_empty() {
            return;
        }
        let groups = self.maps.resolution.div_ceil(WORKGROUP);
        let mut pass = ctx.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Shadow Blur"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        for &layer in &self.layers {
            pass.set_bind_group(0, &self.horizontal, &[self.offset(layer, HORIZONTAL) as u32]);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        for &layer in &self.layers {
            pass.set_bind_group(0, &self.vertical, &[self.offset(layer, VERTICAL) as u32]);
            pass.dispatch_workgroups(groups, groups, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn params_fit_a_uniform_slot() {
        assert_eq!(std::mem::size_of::<BlurParams>(), 16 + 16 * 9);
    }

    #[test]
    fn one_sided_weights_cover_the_kernel() {
        let params = BlurParams::new(3, VERTICAL, 2);
        let total = params.weights[0][0] + 2.0 * (params.weights[1][0] + params.weights[2][0]);
        assert_relative_eq!(total, 1.0, epsilon = 1e-5);
        assert_eq!(params.weights[3][0], 0.0);
        assert!(params.weights[0][0] > params.weights[1][0]);
    }
}
