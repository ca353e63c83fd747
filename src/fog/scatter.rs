use std::sync::Arc;

use crate::frame::{FrameState, SceneUniforms};
use crate::gpu::GpuContext;
use crate::lut::LutCache;
use crate::render_graph::{RenderContext, RenderNode};
use crate::shader::{
    self, FOG_COMMON_WGSL, FOG_SCATTER_WGSL, SCENE_WGSL, sampler_entry, storage_texture_entry,
    texture_entry, uniform_entry,
};
use crate::shadow::{PointShadowMaps, ShadowSampling};

use super::{FOG_WORKGROUP, FroxelVolume, SCATTER_FORMAT};

/// "Fog scattering and absorption evaluation": one invocation per froxel.
///
/// Bind group 1 comes in two flavours, one per parity, each reading the
/// other scatter volume as history.
pub struct FogScatterNode {
    pipeline: wgpu::ComputePipeline,
    scene: SceneUniforms,
    volume: Arc<FroxelVolume>,
    shadow_buffer: wgpu::Buffer,
    bind_groups: [wgpu::BindGroup; 2],
    parity: usize,
}

impl FogScatterNode {
    pub fn new(
        gpu: &GpuContext,
        scene: SceneUniforms,
        volume: Arc<FroxelVolume>,
        maps: &PointShadowMaps,
        luts: &LutCache,
    ) -> Self {
        let device = &gpu.device;
        let compute = wgpu::ShaderStages::COMPUTE;

        let shadow_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fog Shadow Params"),
            size: std::mem::size_of::<ShadowSampling>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fog Scatter Layout"),
            entries: &[
                uniform_entry(0, compute, false),
                uniform_entry(1, compute, false),
                texture_entry(2, compute, wgpu::TextureViewDimension::D2Array, false),
                texture_entry(3, compute, wgpu::TextureViewDimension::D2, true),
                texture_entry(4, compute, wgpu::TextureViewDimension::D2, true),
                sampler_entry(5, compute),
                texture_entry(6, compute, wgpu::TextureViewDimension::D3, true),
                sampler_entry(7, compute),
                storage_texture_entry(8, SCATTER_FORMAT, wgpu::TextureViewDimension::D3),
            ],
        });

        let bind = |parity: usize| {
            let history = &volume.scatter[1 - parity];
            let output = &volume.scatter[parity];
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Fog Scatter Bind Group {parity}")),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: volume.params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: shadow_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&maps.array_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(luts.hoobler_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(luts.kovalovs_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(luts.sampler()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(history),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::Sampler(&volume.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: wgpu::BindingResource::TextureView(output),
                    },
                ],
            })
        };
        let bind_groups = [bind(0), bind(1)];

        let module = shader::create_shader(
            device,
            "Fog Scatter Shader",
            &[SCENE_WGSL, FOG_COMMON_WGSL, FOG_SCATTER_WGSL],
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fog Scatter Pipeline Layout"),
            bind_group_layouts: &[&scene.layout, &layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fog Scatter Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            scene,
            volume,
            shadow_buffer,
            bind_groups,
            parity: 0,
        }
    }
}

impl RenderNode for FogScatterNode {
    fn name(&self) -> &str {
        "Fog scattering and absorption evaluation"
    }

    fn prepare(&mut self, gpu: &GpuContext, frame: &FrameState) {
        gpu.queue
            .write_buffer(&self.volume.params, 0, bytemuck::bytes_of(&frame.fog));
        gpu.queue
            .write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(&frame.shadow));
        self.parity = frame.fog_parity;
    }

    fn execute(&self, ctx: &mut RenderContext) {
        let [x, y, z] = self.volume.grid.dispatch_size(FOG_WORKGROUP);
        let mut pass = ctx.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Fog Scatter"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.scene.bind_group, &[]);
        pass.set_bind_group(1, &self.bind_groups[self.parity], &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}
