use std::sync::Arc;

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::mesh::{InstanceData, Vertex3d};
use crate::mesh_pass::SceneGeometry;
use crate::render_graph::{RenderContext, RenderNode};
use crate::shader::{self, SHADOW_MOMENTS_WGSL, aligned_uniform_stride, uniform_entry};
use crate::shadow::{
    MAX_SHADOW_LAYERS, MOMENTS_FORMAT, PointShadowMaps, ShadowFace, ShadowFaceUniform,
    ShadowTechnique, cube_face_view_proj,
};

/// "Shadow map rendering": draws the scene into each scheduled cube face.
///
/// Face uniforms live in one buffer with a 256-byte aligned slot per layer,
/// selected by dynamic offset.
pub struct ShadowMomentNode {
    pipeline: wgpu::RenderPipeline,
    face_buffer: wgpu::Buffer,
    face_bind_group: wgpu::BindGroup,
    stride: u64,
    maps: Arc<PointShadowMaps>,
    geometry: Arc<SceneGeometry>,
    faces: Vec<ShadowFace>,
    esm_exponent: f32,
    enabled: bool,
}

impl ShadowMomentNode {
    pub fn new(gpu: &GpuContext, maps: Arc<PointShadowMaps>, geometry: Arc<SceneGeometry>) -> Self {
        let device = &gpu.device;
        let stride = aligned_uniform_stride(device, std::mem::size_of::<ShadowFaceUniform>());

        let face_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Face Uniforms"),
            size: stride * MAX_SHADOW_LAYERS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Face Layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                true,
            )],
        });
        let face_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Face Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &face_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ShadowFaceUniform>() as u64),
                }),
            }],
        });

        let module = shader::create_shader(device, "Shadow Moments Shader", &[SHADOW_MOMENTS_WGSL]);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Moments Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Moments Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex3d::LAYOUT, InstanceData::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: MOMENTS_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // No culling: both sides of thin rocks must occlude.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            face_buffer,
            face_bind_group,
            stride,
            maps,
            geometry,
            faces: Vec::new(),
            esm_exponent: 40.0,
            enabled: true,
        }
    }
}

impl RenderNode for ShadowMomentNode {
    fn name(&self) -> &str {
        "Shadow map rendering"
    }

    fn prepare(&mut self, gpu: &GpuContext, frame: &FrameState) {
        self.enabled = frame.shadow_settings.technique != ShadowTechnique::Off;
        self.esm_exponent = frame.shadow_settings.esm_exponent;
        self.faces.clear();
        if !self.enabled {
            return;
        }

        for face in &frame.shadow_faces {
            let Some(light) = frame.lights.lights.get(face.light) else {
                continue;
            };
            let position = glam::Vec3::from_array(light.position);
            let uniform = ShadowFaceUniform {
                view_proj: cube_face_view_proj(position, face.face, light.shadow_far).to_cols_array_2d(),
                light_position: light.position,
                far: light.shadow_far,
                esm_exponent: self.esm_exponent,
                _pad: [0.0; 3],
            };
            gpu.queue.write_buffer(
                &self.face_buffer,
                u64::from(face.layer()) * self.stride,
                bytemuck::bytes_of(&uniform),
            );
            self.faces.push(*face);
        }
    }

    fn execute(&self, ctx: &mut RenderContext) {
        // Cleared to the far plane: d = 1.
        let clear = wgpu::Color {
            r: 1.0,
            g: 1.0,
            b: f64::from(self.esm_exponent).exp(),
            a: 1.0,
        };

        for face in &self.faces {
            let layer = face.layer();
            let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Face Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.maps.layer_views[layer as usize],
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.maps.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            let offset = (u64::from(layer) * self.stride) as u32;
            pass.set_bind_group(0, &self.face_bind_group, &[offset]);
            self.geometry.draw_planet(&mut pass);
            self.geometry.draw_asteroids(&mut pass);
        }
    }
}
