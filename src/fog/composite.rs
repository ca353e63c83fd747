use std::sync::Arc;

use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, RenderNode, SceneTargets};
use crate::shader::{
    self, FOG_COMMON_WGSL, FOG_COMPOSITE_WGSL, sampler_entry, texture_entry, uniform_entry,
};

use super::FroxelVolume;

/// What the composite writes to the swapchain.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Lit scene with fog applied.
    #[default]
    Colour = 0,
    /// Linear depth over the camera far plane.
    Depth = 1,
    /// In-scattered light only.
    Fog = 2,
}

impl OutputMode {
    /// Switches between [`Depth`](Self::Depth) and [`Colour`](Self::Colour).
    pub fn toggle_depth(self) -> Self {
        match self {
            OutputMode::Depth => OutputMode::Colour,
            _ => OutputMode::Depth,
        }
    }
}

/// "Fog composition": a fullscreen triangle combining the scene targets with
/// the integrated fog volume.
pub struct FogCompositeNode {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    volume: Arc<FroxelVolume>,
}

impl FogCompositeNode {
    pub fn new(gpu: &GpuContext, volume: Arc<FroxelVolume>, targets: &SceneTargets) -> Self {
        let device = &gpu.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fog Composite Layout"),
            entries: &[
                uniform_entry(0, fragment, false),
                texture_entry(1, fragment, wgpu::TextureViewDimension::D2, false),
                texture_entry(2, fragment, wgpu::TextureViewDimension::D2, false),
                texture_entry(3, fragment, wgpu::TextureViewDimension::D3, true),
                sampler_entry(4, fragment),
            ],
        });
        let bind_group = Self::bind(device, &layout, &volume, targets);

        let module = shader::create_shader(
            device,
            "Fog Composite Shader",
            &[FOG_COMMON_WGSL, FOG_COMPOSITE_WGSL],
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fog Composite Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Fog Composite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            layout,
            bind_group,
            volume,
        }
    }

    fn bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        volume: &FroxelVolume,
        targets: &SceneTargets,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fog Composite Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: volume.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.colour.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&targets.linear_depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&volume.integrated),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&volume.sampler),
                },
            ],
        })
    }
}

impl RenderNode for FogCompositeNode {
    fn name(&self) -> &str {
        "Fog composition"
    }

    fn execute(&self, ctx: &mut RenderContext) {
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fog Composite"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn resize(&mut self, gpu: &GpuContext, targets: &SceneTargets) {
        self.bind_group = Self::bind(&gpu.device, &self.layout, &self.volume, targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_modes_match_shader_constants() {
        assert_eq!(OutputMode::Colour as u32, 0);
        assert_eq!(OutputMode::Depth as u32, 1);
        assert_eq!(OutputMode::Fog as u32, 2);
    }

    #[test]
    fn depth_toggle_returns_to_colour() {
        assert_eq!(OutputMode::Colour.toggle_depth(), OutputMode::Depth);
        assert_eq!(OutputMode::Depth.toggle_depth(), OutputMode::Colour);
        assert_eq!(OutputMode::Fog.toggle_depth(), OutputMode::Depth);
    }
}
