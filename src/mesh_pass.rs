//! Scene geometry and the depth and colour passes that draw it.
//!
//! # Architecture
//!
//! Both passes draw the planet and the asteroid ring through the same
//! instanced vertex shader. The planet is simply an instance buffer of one.
//!
//! - **Group 0**: scene uniforms (camera, lights)
//! - **Group 1**: albedo texture and sampler (colour pass only)
//! - **Vertex buffer 0**: [`Vertex3d`]
//! - **Vertex buffer 1**: [`InstanceData`]
//!
//! The depth pass writes linear view depth for the fog composite and fills
//! the depth buffer. The colour pass reuses that depth buffer with an
//! `LessEqual` test and no depth writes, so each pixel is shaded once.
//!
//! Each pass opens "Planet rendering" and "Asteroid instanced rendering"
//! scopes, one render pass each, so reports time the two draws separately.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::frame::SceneUniforms;
use crate::gpu::GpuContext;
use crate::mesh::{InstanceData, Mesh, RawGeometry, Vertex3d};
use crate::render_graph::{
    COLOUR_FORMAT, DEPTH_FORMAT, LINEAR_DEPTH_FORMAT, RenderContext, RenderNode,
};
use crate::scene::Scene;
use crate::shader::{self, MESH_WGSL, SCENE_WGSL, sampler_entry, texture_entry};
use crate::texture::Texture;

pub const PLANET_SCOPE: &str = "Planet rendering";
pub const ASTEROID_SCOPE: &str = "Asteroid instanced rendering";

const PLANET_SEGMENTS: u32 = 64;
const PLANET_RINGS: u32 = 32;
const ROCK_SUBDIVISIONS: u32 = 2;

/// GPU meshes, instance buffers and materials shared by every pass that
/// draws the scene.
pub struct SceneGeometry {
    pub planet: Mesh,
    pub rock: Mesh,
    planet_instance: wgpu::Buffer,
    asteroid_instances: wgpu::Buffer,
    asteroid_count: u32,
    pub material_layout: wgpu::BindGroupLayout,
    pub planet_material: wgpu::BindGroup,
    pub rock_material: wgpu::BindGroup,
}

impl SceneGeometry {
    pub fn new(gpu: &GpuContext, scene: &Scene, seed: u64) -> Self {
        let device = &gpu.device;
        let seed32 = seed as u32;

        let planet = Mesh::from_geometry(
            gpu,
            &RawGeometry::uv_sphere(PLANET_SEGMENTS, PLANET_RINGS, 1.0),
            "Planet",
        );
        let rock = Mesh::from_geometry(gpu, &RawGeometry::rock(ROCK_SUBDIVISIONS, seed32), "Rock");

        let planet_instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Planet Instance"),
            contents: bytemuck::bytes_of(&InstanceData::from_matrix(scene.planet_transform().matrix())),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let instances = scene.instance_matrices();
        let asteroid_count = instances.len() as u32;
        // A zero-sized vertex buffer cannot be bound, keep one dummy instance.
        let contents = if instances.is_empty() {
            vec![InstanceData::from_matrix(glam::Mat4::IDENTITY)]
        } else {
            instances
        };
        let asteroid_instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Asteroid Instances"),
            contents: bytemuck::cast_slice(&contents),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                texture_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureViewDimension::D2,
                    true,
                ),
                sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let material = |texture: &Texture, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ],
            })
        };
        let planet_material = material(&Texture::planet(gpu, 512, seed32), "Planet Material");
        let rock_material = material(&Texture::rock(gpu, 128, seed32), "Rock Material");

        Self {
            planet,
            rock,
            planet_instance,
            asteroid_instances,
            asteroid_count,
            material_layout,
            planet_material,
            rock_material,
        }
    }

    pub fn asteroid_count(&self) -> u32 {
        self.asteroid_count
    }

    pub fn write_planet(&self, queue: &wgpu::Queue, model: glam::Mat4) {
        queue.write_buffer(
            &self.planet_instance,
            0,
            bytemuck::bytes_of(&InstanceData::from_matrix(model)),
        );
    }

    /// Re-uploads asteroid matrices; extra instances beyond the initial
    /// count are ignored.
    pub fn write_asteroids(&self, queue: &wgpu::Queue, instances: &[InstanceData]) {
        let n = instances.len().min(self.asteroid_count as usize);
        if n > 0 {
            queue.write_buffer(&self.asteroid_instances, 0, bytemuck::cast_slice(&instances[..n]));
        }
    }

    pub fn draw_planet(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(1, self.planet_instance.slice(..));
        self.planet.draw_instanced(pass, 0..1);
    }

    pub fn draw_asteroids(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.asteroid_count == 0 {
            return;
        }
        pass.set_vertex_buffer(1, self.asteroid_instances.slice(..));
        self.rock.draw_instanced(pass, 0..self.asteroid_count);
    }
}

/// Filled pipeline plus an optional line-mode twin for wireframe.
struct MeshPipelines {
    filled: wgpu::RenderPipeline,
    wireframe: Option<wgpu::RenderPipeline>,
}

impl MeshPipelines {
    fn get(&self, wireframe: bool) -> &wgpu::RenderPipeline {
        match (&self.wireframe, wireframe) {
            (Some(lines), true) => lines,
            _ => &self.filled,
        }
    }
}

struct MeshPipelineDesc<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    module: &'a wgpu::ShaderModule,
    fragment: &'a str,
    format: wgpu::TextureFormat,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
}

fn create_mesh_pipelines(gpu: &GpuContext, desc: &MeshPipelineDesc) -> MeshPipelines {
    let build = |polygon_mode: wgpu::PolygonMode, suffix: &str| {
        gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{}{suffix}", desc.label)),
            layout: Some(desc.layout),
            vertex: wgpu::VertexState {
                module: desc.module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex3d::LAYOUT, InstanceData::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: desc.module,
                entry_point: Some(desc.fragment),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: desc.depth_write,
                depth_compare: desc.depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    };

    MeshPipelines {
        filled: build(wgpu::PolygonMode::Fill, ""),
        wireframe: gpu
            .supports_wireframe()
            .then(|| build(wgpu::PolygonMode::Line, " (Wireframe)")),
    }
}

/// "Depth pass": linear view depth plus the shared depth buffer.
pub struct DepthPassNode {
    pipelines: MeshPipelines,
    scene: SceneUniforms,
    geometry: Arc<SceneGeometry>,
}

impl DepthPassNode {
    pub fn new(gpu: &GpuContext, scene: SceneUniforms, geometry: Arc<SceneGeometry>) -> Self {
        let module = shader::create_shader(&gpu.device, "Mesh Shader", &[SCENE_WGSL, MESH_WGSL]);
        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Depth Pass Layout"),
                bind_group_layouts: &[&scene.layout],
                push_constant_ranges: &[],
            });
        let pipelines = create_mesh_pipelines(
            gpu,
            &MeshPipelineDesc {
                label: "Depth Pass Pipeline",
                layout: &layout,
                module: &module,
                fragment: "fs_linear_depth",
                format: LINEAR_DEPTH_FORMAT,
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
            },
        );
        Self {
            pipelines,
            scene,
            geometry,
        }
    }

    fn draw(&self, ctx: &mut RenderContext, clear: bool, draw: impl FnOnce(&SceneGeometry, &mut wgpu::RenderPass<'_>)) {
        let far = f64::from(ctx.frame.camera.far);
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Depth Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.targets.linear_depth.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: far,
                            g: 0.0,
                            b: 0.0,
                            a: 1.0,
                        })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(self.pipelines.get(ctx.frame.wireframe));
        pass.set_bind_group(0, &self.scene.bind_group, &[]);
        draw(&self.geometry, &mut pass);
    }
}

impl RenderNode for DepthPassNode {
    fn name(&self) -> &str {
        "Depth pass"
    }

    fn execute(&self, ctx: &mut RenderContext) {
        ctx.scope(PLANET_SCOPE, |ctx| {
            self.draw(ctx, true, |g, pass| g.draw_planet(pass));
        });
        ctx.scope(ASTEROID_SCOPE, |ctx| {
            self.draw(ctx, false, |g, pass| g.draw_asteroids(pass));
        });
    }
}

/// "Colour pass": textured Phong shading of the planet and asteroids.
pub struct ColourPassNode {
    pipelines: MeshPipelines,
    scene: SceneUniforms,
    geometry: Arc<SceneGeometry>,
}

impl ColourPassNode {
    pub fn new(gpu: &GpuContext, scene: SceneUniforms, geometry: Arc<SceneGeometry>) -> Self {
        let module = shader::create_shader(&gpu.device, "Mesh Shader", &[SCENE_WGSL, MESH_WGSL]);
        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Colour Pass Layout"),
                bind_group_layouts: &[&scene.layout, &geometry.material_layout],
                push_constant_ranges: &[],
            });
        let pipelines = create_mesh_pipelines(
            gpu,
            &MeshPipelineDesc {
                label: "Colour Pass Pipeline",
                layout: &layout,
                module: &module,
                fragment: "fs_colour",
                format: COLOUR_FORMAT,
                depth_write: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
            },
        );
        Self {
            pipelines,
            scene,
            geometry,
        }
    }

    fn draw(
        &self,
        ctx: &mut RenderContext,
        clear: bool,
        material: &wgpu::BindGroup,
        draw: impl FnOnce(&SceneGeometry, &mut wgpu::RenderPass<'_>),
    ) {
        let clear_colour = ctx.frame.clear_colour;
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Colour Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.targets.colour.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(clear_colour)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(self.pipelines.get(ctx.frame.wireframe));
        pass.set_bind_group(0, &self.scene.bind_group, &[]);
        pass.set_bind_group(1, material, &[]);
        draw(&self.geometry, &mut pass);
    }
}

impl RenderNode for ColourPassNode {
    fn name(&self) -> &str {
        "Colour pass"
    }

    fn execute(&self, ctx: &mut RenderContext) {
        let geometry = &self.geometry;
        ctx.scope(PLANET_SCOPE, |ctx| {
            self.draw(ctx, true, &geometry.planet_material, |g, pass| g.draw_planet(pass));
        });
        ctx.scope(ASTEROID_SCOPE, |ctx| {
            self.draw(ctx, false, &geometry.rock_material, |g, pass| g.draw_asteroids(pass));
        });
    }
}
