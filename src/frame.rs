//! Per-frame data shared by every render node.

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::camera::{Camera, CameraUniforms};
use crate::fog::{FogUniforms, OutputMode};
use crate::light::LightsUniform;
use crate::shader::uniform_entry;
use crate::shadow::{ShadowFace, ShadowSampling, ShadowSettings};

/// Snapshot of everything a node may read while recording a frame.
pub struct FrameState {
    pub camera: Camera,
    pub camera_uniforms: CameraUniforms,
    pub lights: LightsUniform,
    pub time: f32,
    pub dt: f32,
    pub frame_index: u64,
    pub planet_model: Mat4,
    pub asteroid_count: u32,
    pub fog: FogUniforms,
    /// Fog volume written this frame.
    pub fog_parity: usize,
    /// Cube faces re-rendered this frame.
    pub shadow_faces: Vec<ShadowFace>,
    pub shadow: ShadowSampling,
    pub shadow_settings: ShadowSettings,
    pub output_mode: OutputMode,
    pub wireframe: bool,
    pub clear_colour: wgpu::Color,
}

/// Camera and light buffers bound at group 0 by every scene and fog shader.
#[derive(Clone)]
pub struct SceneUniforms {
    pub camera_buffer: wgpu::Buffer,
    pub lights_buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl SceneUniforms {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniforms"),
            contents: bytemuck::bytes_of(&Camera::default().uniforms(1.0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Uniforms"),
            contents: bytemuck::bytes_of(&LightsUniform::new(&[], 0.01)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let visibility =
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                uniform_entry(0, visibility, false),
                uniform_entry(1, visibility, false),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            camera_buffer,
            lights_buffer,
            layout,
            bind_group,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, frame: &FrameState) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&frame.camera_uniforms));
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(&frame.lights));
    }
}
