//! Precomputed lighting tables sampled by the fog scatter pass.
//!
//! Two tables are generated on the GPU whenever the phase asymmetry or
//! [`LutSettings`] change, or on request:
//!
//! - the Hoobler table F(τ, γ) for analytic in-scattering along a ray
//!   segment ([`hoobler`]);
//! - the Kovalovs table K(cos θ, τ) approximating multiple scattering
//!   ([`kovalovs`]).
//!
//! Both have CPU references, used by the tests and by [`export_png`].

pub mod hoobler;
pub mod kovalovs;

use std::fs;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FogError;
use crate::gpu::GpuContext;
use crate::render_graph::RenderContext;
use crate::shader::{self, LUT_HOOBLER_WGSL, LUT_KOVALOVS_WGSL, storage_texture_entry, uniform_entry};
use crate::texture::create_storage_texture_2d;

pub use hoobler::{MAX_EXPONENT, RaySegment, hoobler_reference, hoobler_segment, hoobler_table};
pub use kovalovs::{kovalovs_reference, kovalovs_table};

/// Format of both tables.
pub const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const WORKGROUP: u32 = 8;
/// Integration intervals per Hoobler texel.
const HOOBLER_STEPS: u32 = 8;

/// Table sizes and octave parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LutSettings {
    /// γ across, τ down.
    pub hoobler_size: [u32; 2],
    pub hoobler_max_optical_depth: f32,
    /// cos θ across, τ down.
    pub kovalovs_size: [u32; 2],
    pub kovalovs_max_optical_depth: f32,
    pub octaves: u32,
    /// Extinction attenuation per octave.
    pub a: f32,
    /// Contribution per octave.
    pub b: f32,
    /// Eccentricity attenuation per octave.
    pub c: f32,
}

impl Default for LutSettings {
    fn default() -> Self {
        Self {
            hoobler_size: [128, 64],
            hoobler_max_optical_depth: 10.0,
            kovalovs_size: [128, 64],
            kovalovs_max_optical_depth: 16.0,
            octaves: 4,
            a: 0.5,
            b: 0.5,
            c: 0.5,
        }
    }
}

impl LutSettings {
    pub fn validate(&self) -> Result<(), String> {
        for (name, [w, h]) in [("Hoobler", self.hoobler_size), ("Kovalovs", self.kovalovs_size)] {
            if w == 0 || h == 0 {
                return Err(format!("{name} LUT size {w}x{h} must be non-zero"));
            }
            if w > 4096 || h > 4096 {
                return Err(format!("{name} LUT size {w}x{h} exceeds 4096"));
            }
        }
        if !(self.hoobler_max_optical_depth > 0.0 && self.kovalovs_max_optical_depth > 0.0) {
            return Err("LUT max optical depths must be positive".to_string());
        }
        if !(1..=16).contains(&self.octaves) {
            return Err(format!("LUT octaves {} outside [1, 16]", self.octaves));
        }
        for (name, v) in [("a", self.a), ("b", self.b), ("c", self.c)] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(format!("LUT octave parameter {name} = {v} outside (0, 1]"));
            }
        }
        Ok(())
    }

    fn same_sizes(&self, other: &LutSettings) -> bool {
        self.hoobler_size == other.hoobler_size && self.kovalovs_size == other.kovalovs_size
    }
}

/// Mirrors `LutParams` in the LUT shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct LutParams {
    size: [u32; 2],
    octaves: u32,
    steps: u32,
    tau_max: f32,
    g: f32,
    a: f32,
    b: f32,
    c: f32,
    _pad: [u32; 3],
}

impl LutParams {
    fn hoobler(g: f32, settings: &LutSettings) -> Self {
        Self {
            size: settings.hoobler_size,
            octaves: 1,
            steps: HOOBLER_STEPS,
            tau_max: settings.hoobler_max_optical_depth,
            g,
            a: 1.0,
            b: 1.0,
            c: 1.0,
            _pad: [0; 3],
        }
    }

    fn kovalovs(g: f32, settings: &LutSettings) -> Self {
        Self {
            size: settings.kovalovs_size,
            octaves: settings.octaves,
            steps: 0,
            tau_max: settings.kovalovs_max_optical_depth,
            g,
            a: settings.a,
            b: settings.b,
            c: settings.c,
            _pad: [0; 3],
        }
    }
}

/// One table: texture, parameters and the bind group that writes it.
struct LutTable {
    view: wgpu::TextureView,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    size: [u32; 2],
    _texture: wgpu::Texture,
}

impl LutTable {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: [u32; 2], label: &str) -> Self {
        let (texture, view) = create_storage_texture_2d(device, size[0], size[1], LUT_FORMAT, label);
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Params")),
            size: std::mem::size_of::<LutParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Bind Group")),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
            ],
        });
        Self {
            view,
            params,
            bind_group,
            size,
            _texture: texture,
        }
    }

    fn dispatch(&self, pass: &mut wgpu::ComputePass, pipeline: &wgpu::ComputePipeline) {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(
            self.size[0].div_ceil(WORKGROUP),
            self.size[1].div_ceil(WORKGROUP),
            1,
        );
    }
}

/// GPU copies of both tables, regenerated lazily.
pub struct LutCache {
    layout: wgpu::BindGroupLayout,
    hoobler_pipeline: wgpu::ComputePipeline,
    kovalovs_pipeline: wgpu::ComputePipeline,
    hoobler: LutTable,
    kovalovs: LutTable,
    sampler: wgpu::Sampler,
    settings: LutSettings,
    g: f32,
    dirty: bool,
}

impl LutCache {
    /// Allocates both tables. They are generated on the first frame.
    pub fn new(gpu: &GpuContext, g: f32, settings: &LutSettings) -> Self {
        let device = &gpu.device;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("LUT Generation Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE, false),
                storage_texture_entry(1, LUT_FORMAT, wgpu::TextureViewDimension::D2),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LUT Generation Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = |label: &str, body: &str| {
            let module = shader::create_shader(device, label, &[body]);
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let hoobler_pipeline = pipeline("Hoobler LUT", LUT_HOOBLER_WGSL);
        let kovalovs_pipeline = pipeline("Kovalovs LUT", LUT_KOVALOVS_WGSL);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LUT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            hoobler: LutTable::new(device, &layout, settings.hoobler_size, "Hoobler LUT"),
            kovalovs: LutTable::new(device, &layout, settings.kovalovs_size, "Kovalovs LUT"),
            layout,
            hoobler_pipeline,
            kovalovs_pipeline,
            sampler,
            settings: settings.clone(),
            g,
            dirty: true,
        }
    }

    pub fn hoobler_view(&self) -> &wgpu::TextureView {
        &self.hoobler.view
    }

    pub fn kovalovs_view(&self) -> &wgpu::TextureView {
        &self.kovalovs.view
    }

    /// Linear, clamp-to-edge.
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn settings(&self) -> &LutSettings {
        &self.settings
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn request_regenerate(&mut self) {
        self.dirty = true;
    }

    /// Marks the tables dirty when `g` or `settings` differ from what they
    /// were generated with. Returns true when the textures were reallocated,
    /// so anything holding their views must rebind.
    pub fn sync_settings(&mut self, gpu: &GpuContext, g: f32, settings: &LutSettings) -> bool {
        if self.g == g && self.settings == *settings {
            return false;
        }
        let resized = !self.settings.same_sizes(settings);
        if resized {
            let device = &gpu.device;
            self.hoobler = LutTable::new(device, &self.layout, settings.hoobler_size, "Hoobler LUT");
            self.kovalovs = LutTable::new(device, &self.layout, settings.kovalovs_size, "Kovalovs LUT");
        }
        self.g = g;
        self.settings = settings.clone();
        self.dirty = true;
        resized
    }

    /// Records both generation dispatches inside a "LUT generation" range
    /// when dirty. Returns whether anything was recorded.
    pub fn generate_if_dirty(&mut self, ctx: &mut RenderContext) -> bool {
        if !self.dirty {
            return false;
        }
        let queue = &ctx.gpu.queue;
        queue.write_buffer(
            &self.hoobler.params,
            0,
            bytemuck::bytes_of(&LutParams::hoobler(self.g, &self.settings)),
        );
        queue.write_buffer(
            &self.kovalovs.params,
            0,
            bytemuck::bytes_of(&LutParams::kovalovs(self.g, &self.settings)),
        );

        ctx.scope("LUT generation", |ctx| {
            let mut pass = ctx.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("LUT Generation"),
                timestamp_writes: None,
            });
            self.hoobler.dispatch(&mut pass, &self.hoobler_pipeline);
            self.kovalovs.dispatch(&mut pass, &self.kovalovs_pipeline);
        });

        self.dirty = false;
        info!(
            g = self.g,
            hoobler = ?self.settings.hoobler_size,
            kovalovs = ?self.settings.kovalovs_size,
            "regenerated scattering LUTs"
        );
        true
    }
}

pub const HOOBLER_PNG: &str = "hoobler_lut.png";
pub const KOVALOVS_PNG: &str = "kovalovs_lut.png";

/// Writes both CPU reference tables to `dir` as 8-bit greyscale PNGs, each
/// normalized to its own maximum. Returns the written paths.
pub fn export_png(
    dir: impl AsRef<Path>,
    settings: &LutSettings,
    g: f32,
) -> crate::error::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| FogError::io(dir, e))?;

    let [hw, hh] = settings.hoobler_size;
    let hoobler = hoobler_table(hw, hh, settings.hoobler_max_optical_depth, g);
    let [kw, kh] = settings.kovalovs_size;
    let kovalovs = kovalovs_table(g, settings);

    let mut written = Vec::with_capacity(2);
    for (name, table, width, height) in [
        (HOOBLER_PNG, hoobler, hw, hh),
        (KOVALOVS_PNG, kovalovs, kw, kh),
    ] {
        let path = dir.join(name);
        to_grey_image(&table, width, height).save(&path)?;
        info!(path = %path.display(), "exported LUT");
        written.push(path);
    }
    Ok(written)
}

fn to_grey_image(table: &[f32], width: u32, height: u32) -> GrayImage {
    let max = table.iter().copied().fold(0.0_f32, f32::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };
    GrayImage::from_fn(width, height, |x, y| {
        let v = table[(y * width + x) as usize];
        Luma([(v * scale).round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = LutSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.hoobler_size, [128, 64]);
        assert_eq!(settings.kovalovs_max_optical_depth, 16.0);
    }

    #[test]
    fn rejects_degenerate_tables() {
        let zero = LutSettings {
            kovalovs_size: [0, 64],
            ..LutSettings::default()
        };
        assert!(zero.validate().is_err());
        let octaves = LutSettings {
            octaves: 0,
            ..LutSettings::default()
        };
        assert!(octaves.validate().is_err());
        let contribution = LutSettings {
            b: 1.5,
            ..LutSettings::default()
        };
        assert!(contribution.validate().is_err());
    }

    #[test]
    fn params_match_shader_layout() {
        assert_eq!(std::mem::size_of::<LutParams>(), 48);
    }

    #[test]
    fn grey_image_spans_full_range() {
        let image = to_grey_image(&[0.0, 0.5, 1.0, 2.0], 2, 2);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(1, 1)[0], 255);
        assert_eq!(image.get_pixel(0, 1)[0], 128);
    }

    #[test]
    fn export_writes_both_tables() {
        let dir = std::env::temp_dir().join(format!("wronski-luts-{}", std::process::id()));
        let settings = LutSettings {
            hoobler_size: [16, 8],
            kovalovs_size: [12, 6],
            ..LutSettings::default()
        };
        let paths = export_png(&dir, &settings, 0.4).unwrap();
        assert_eq!(paths.len(), 2);
        let hoobler = image::open(dir.join(HOOBLER_PNG)).unwrap();
        assert_eq!((hoobler.width(), hoobler.height()), (16, 8));
        let kovalovs = image::open(dir.join(KOVALOVS_PNG)).unwrap();
        assert_eq!((kovalovs.width(), kovalovs.height()), (12, 6));
        let _ = fs::remove_dir_all(&dir);
    }
}
