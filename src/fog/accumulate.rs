use std::sync::Arc;

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, RenderNode};
use crate::shader::{
    self, FOG_ACCUMULATE_WGSL, FOG_COMMON_WGSL, storage_texture_entry, texture_entry,
    uniform_entry,
};

use super::{FOG_WORKGROUP, FroxelVolume, SCATTER_FORMAT};

/// "Fog accumulation": one invocation per froxel column, marching front to
/// back through this frame's scatter volume into the integrated volume.
pub struct FogAccumulateNode {
    pipeline: wgpu::ComputePipeline,
    volume: Arc<FroxelVolume>,
    bind_groups: [wgpu::BindGroup; 2],
    parity: usize,
}

impl FogAccumulateNode {
    pub fn new(gpu: &GpuContext, volume: Arc<FroxelVolume>) -> Self {
        let device = &gpu.device;
        let compute = wgpu::ShaderStages::COMPUTE;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fog Accumulate Layout"),
            entries: &[
                uniform_entry(0, compute, false),
                texture_entry(1, compute, wgpu::TextureViewDimension::D3, false),
                storage_texture_entry(2, SCATTER_FORMAT, wgpu::TextureViewDimension::D3),
            ],
        });

        let bind = |parity: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Fog Accumulate Bind Group {parity}")),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: volume.params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&volume.scatter[parity]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&volume.integrated),
                    },
                ],
            })
        };
        let bind_groups = [bind(0), bind(1)];

        let module = shader::create_shader(
            device,
            "Fog Accumulate Shader",
            &[FOG_COMMON_WGSL, FOG_ACCUMULATE_WGSL],
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fog Accumulate Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fog Accumulate Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            volume,
            bind_groups,
            parity: 0,
        }
    }
}

impl RenderNode for FogAccumulateNode {
    fn name(&self) -> &str {
        "Fog accumulation"
    }

    fn prepare(&mut self, _gpu: &GpuContext, frame: &FrameState) {
        self.parity = frame.fog_parity;
    }

    fn execute(&self, ctx: &mut RenderContext) {
        let [x, y, z] = self.volume.grid.column_dispatch_size(FOG_WORKGROUP);
        let mut pass = ctx.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Fog Accumulate"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[self.parity], &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}
