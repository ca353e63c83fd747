//! Frame orchestration: builds the render graph and drives it every frame.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::config::DemoConfig;
use crate::error::{FogError, Result};
use crate::fog::{
    CameraSnapshot, FogAccumulateNode, FogCompositeNode, FogFrame, FogHistory, FogScatterNode,
    FogSettings, FogUniforms, FroxelGrid, FroxelVolume, OutputMode,
};
use crate::frame::{FrameState, SceneUniforms};
use crate::gpu::GpuContext;
use crate::light::{LightsUniform, MAX_POINT_LIGHTS};
use crate::lut::{LutCache, LutSettings};
use crate::mesh_pass::{ColourPassNode, DepthPassNode, SceneGeometry};
use crate::perf::FrameRecorder;
use crate::render_graph::{RenderContext, RenderGraph, SceneTargets};
use crate::scene::Scene;
use crate::shadow::{
    PointShadowMaps, ShadowBlurNode, ShadowMomentNode, ShadowSampling, ShadowScheduler,
    ShadowSettings, ShadowTechnique,
};

/// Range around the per-frame uniform uploads.
pub const UNIFORM_UPDATE_SCOPE: &str = "Shader uniforms update";

/// Light contribution below which a light's range ends.
const LIGHT_CUTOFF: f32 = 0.01;

/// What happened to a [`Renderer::render`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The surface was lost or outdated and has been reconfigured.
    Skipped,
}

/// Owns every GPU resource of the demo and records one frame per call.
pub struct Renderer {
    targets: SceneTargets,
    graph: RenderGraph,
    scene_uniforms: SceneUniforms,
    geometry: Arc<SceneGeometry>,
    volume: Arc<FroxelVolume>,
    maps: Arc<PointShadowMaps>,
    luts: LutCache,
    history: FogHistory,
    scheduler: ShadowScheduler,
    fog: FogSettings,
    shadow: ShadowSettings,
    lut: LutSettings,
    output_mode: OutputMode,
    wireframe: bool,
    clear_colour: wgpu::Color,
    time: f32,
    frame_index: u64,
}

impl Renderer {
    pub fn new(gpu: &GpuContext, scene: &Scene, config: &DemoConfig) -> Self {
        let (fog, shadow, lut) = (&config.fog, &config.shadow, &config.lut);
        let targets = SceneTargets::new(gpu);
        let scene_uniforms = SceneUniforms::new(&gpu.device);
        let geometry = Arc::new(SceneGeometry::new(gpu, scene, config.scene.seed));
        let volume = Arc::new(FroxelVolume::new(
            &gpu.device,
            &FroxelGrid::new(0.1, fog.fog_far),
        ));
        let maps = Arc::new(PointShadowMaps::new(&gpu.device, shadow.resolution));
        let luts = LutCache::new(gpu, fog.phase_g, lut);

        let graph = build_graph(gpu, &targets, &scene_uniforms, &geometry, &volume, &maps, &luts);
        info!(nodes = ?graph.node_names(), "render graph built");

        let [r, g, b] = config.scene.clear_colour.map(f64::from);
        Self {
            targets,
            graph,
            scene_uniforms,
            geometry,
            volume,
            maps,
            luts,
            history: FogHistory::new(),
            scheduler: ShadowScheduler::new(shadow.faces_per_frame),
            fog: fog.clone(),
            shadow: shadow.clone(),
            lut: lut.clone(),
            output_mode: OutputMode::Colour,
            wireframe: false,
            clear_colour: wgpu::Color { r, g, b, a: 1.0 },
            time: 0.0,
            frame_index: 0,
        }
    }

    fn rebuild_graph(&mut self, gpu: &GpuContext) {
        self.graph = build_graph(
            gpu,
            &self.targets,
            &self.scene_uniforms,
            &self.geometry,
            &self.volume,
            &self.maps,
            &self.luts,
        );
        debug!("render graph rebuilt");
    }

    pub fn fog_settings(&self) -> &FogSettings {
        &self.fog
    }

    pub fn shadow_settings(&self) -> &ShadowSettings {
        &self.shadow
    }

    pub fn lut_settings(&self) -> &LutSettings {
        &self.lut
    }

    pub fn history(&self) -> &FogHistory {
        &self.history
    }

    pub fn scheduler(&self) -> &ShadowScheduler {
        &self.scheduler
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// Switches the scene passes to line rendering. Returns false, leaving
    /// the mode unchanged, when the adapter cannot draw lines.
    pub fn set_wireframe(&mut self, gpu: &GpuContext, enabled: bool) -> bool {
        if enabled && !gpu.supports_wireframe() {
            warn!("wireframe requested but line polygon mode is unsupported");
            return false;
        }
        self.wireframe = enabled;
        true
    }

    /// Flips whether the composite applies fog. The volume keeps updating.
    pub fn toggle_fog(&mut self) -> bool {
        self.fog.apply_fog = !self.fog.apply_fog;
        self.fog.apply_fog
    }

    pub fn regenerate_luts(&mut self) {
        self.luts.request_regenerate();
    }

    /// Adopts new settings. The fog history is dropped when the medium,
    /// shadows or tables change; shadows are rescheduled when their settings
    /// change; resources are reallocated when their sizes change.
    pub fn apply_settings(
        &mut self,
        gpu: &GpuContext,
        fog: &FogSettings,
        shadow: &ShadowSettings,
        lut: &LutSettings,
    ) {
        let mut rebuild = false;

        if self.fog.requires_history_reset(fog) {
            self.history.invalidate();
        }
        let noise_offset = self.fog.noise_offset;
        self.fog = fog.clone();
        self.fog.noise_offset = noise_offset;

        if *shadow != self.shadow {
            if shadow.resolution != self.shadow.resolution {
                self.maps = Arc::new(PointShadowMaps::new(&gpu.device, shadow.resolution));
                rebuild = true;
            }
            self.scheduler.set_faces_per_frame(shadow.faces_per_frame);
            self.scheduler.invalidate_all();
            self.history.invalidate();
            self.shadow = shadow.clone();
        }

        if *lut != self.lut {
            self.history.invalidate();
            self.lut = lut.clone();
        }
        if self.luts.sync_settings(gpu, self.fog.phase_g, &self.lut) {
            rebuild = true;
        }

        if rebuild {
            self.rebuild_graph(gpu);
        }
    }

    /// Records, submits and presents one frame.
    pub fn render<R: FrameRecorder>(
        &mut self,
        gpu: &GpuContext,
        scene: &mut Scene,
        camera: &Camera,
        dt: f32,
        ranges: &mut R,
    ) -> Result<FrameOutcome> {
        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated, reconfiguring");
                gpu.reconfigure();
                return Ok(FrameOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface acquire timed out");
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => return Err(FogError::Surface(e)),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if self.targets.ensure_size(gpu) {
            self.graph.resize(gpu, &self.targets);
            self.history.invalidate();
        }

        let frame = self.frame_state(gpu, scene, camera, dt);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        ranges.frame_start(&mut encoder);

        ranges.push_range(&mut encoder, UNIFORM_UPDATE_SCOPE);
        self.scene_uniforms.write(&gpu.queue, &frame);
        self.geometry.write_planet(&gpu.queue, frame.planet_model);
        self.graph.prepare(gpu, &frame);
        ranges.pop_range(&mut encoder);

        {
            let mut ctx = RenderContext {
                gpu,
                encoder: &mut encoder,
                frame: &frame,
                targets: &self.targets,
                ranges: &mut *ranges,
                surface_view: &surface_view,
            };
            self.luts.generate_if_dirty(&mut ctx);
            self.graph.execute(&mut ctx);
        }

        ranges.frame_end(&mut encoder);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.history.advance();
        self.history
            .remember_camera(CameraSnapshot::new(camera, gpu.aspect()));
        self.frame_index += 1;
        Ok(FrameOutcome::Presented)
    }

    fn frame_state(
        &mut self,
        gpu: &GpuContext,
        scene: &mut Scene,
        camera: &Camera,
        dt: f32,
    ) -> FrameState {
        let aspect = gpu.aspect();
        self.time += dt;
        self.fog.advance_noise(dt);

        let lights = scene.lights();
        let lights_uniform = LightsUniform::new(&lights, LIGHT_CUTOFF);
        let light_count = lights.len().min(MAX_POINT_LIGHTS);
        let shadow_lights: Vec<(glam::Vec3, f32)> = lights_uniform.lights[..light_count]
            .iter()
            .map(|l| (glam::Vec3::from_array(l.position), l.shadow_far))
            .collect();

        let scene_dirty = scene.take_geometry_dirty();
        if scene_dirty {
            self.geometry
                .write_asteroids(&gpu.queue, &scene.instance_matrices());
        }
        let shadow_faces = if self.shadow.technique == ShadowTechnique::Off {
            Vec::new()
        } else {
            let positions: Vec<glam::Vec3> = shadow_lights.iter().map(|(p, _)| *p).collect();
            self.scheduler.update(&positions, scene_dirty)
        };

        let grid = FroxelGrid::new(camera.near, self.fog.fog_far.max(camera.near * 2.0));
        let snapshot = CameraSnapshot::new(camera, aspect);
        let fog = FogUniforms::new(&FogFrame {
            settings: &self.fog,
            lut: &self.lut,
            grid: &grid,
            camera,
            aspect,
            previous: self.history.previous_camera_or(snapshot),
            history_weight: self.history.history_weight(self.fog.history_weight),
            jitter: self.history.jitter(),
            time: self.time,
            light_count: light_count as u32,
            output_mode: self.output_mode,
        });

        FrameState {
            camera: *camera,
            camera_uniforms: camera.uniforms(aspect),
            lights: lights_uniform,
            time: self.time,
            dt,
            frame_index: self.frame_index,
            planet_model: scene.planet_transform().matrix(),
            asteroid_count: self.geometry.asteroid_count(),
            fog,
            fog_parity: self.history.current(),
            shadow_faces,
            shadow: ShadowSampling::new(&self.shadow, &shadow_lights),
            shadow_settings: self.shadow.clone(),
            output_mode: self.output_mode,
            wireframe: self.wireframe,
            clear_colour: self.clear_colour,
        }
    }
}

/// Shadow moments → shadow blur → fog scatter → fog accumulate → depth →
/// colour → fog composite.
fn build_graph(
    gpu: &GpuContext,
    targets: &SceneTargets,
    scene_uniforms: &SceneUniforms,
    geometry: &Arc<SceneGeometry>,
    volume: &Arc<FroxelVolume>,
    maps: &Arc<PointShadowMaps>,
    luts: &LutCache,
) -> RenderGraph {
    RenderGraph::builder()
        .node(ShadowMomentNode::new(gpu, maps.clone(), geometry.clone()))
        .node(ShadowBlurNode::new(gpu, maps.clone()))
        .node(FogScatterNode::new(
            gpu,
            scene_uniforms.clone(),
            volume.clone(),
            maps,
            luts,
        ))
        .node(FogAccumulateNode::new(gpu, volume.clone()))
        .node(DepthPassNode::new(gpu, scene_uniforms.clone(), geometry.clone()))
        .node(ColourPassNode::new(gpu, scene_uniforms.clone(), geometry.clone()))
        .node(FogCompositeNode::new(gpu, volume.clone(), targets))
        .build()
}
