//! # WronskiFog
//!
//! **Real-time froxel volumetric fog lit by shadowed point lights.**
//!
//! A planet and an instanced asteroid ring sit inside a participating
//! medium. Each frame the medium is evaluated in a camera-aligned froxel
//! grid, integrated front to back and composited over the lit scene.
//! Point lights cast moment shadow maps (VSM or ESM) into the fog, light
//! along a froxel can be integrated analytically with a precomputed table,
//! and multiple scattering is approximated with a second table.
//!
//! Every render node runs inside a named range, so the same labels show up
//! in GPU captures and in the HTML/CSV performance reports written by
//! [`ReportGenerator`]. A [`Sweep`] repeats those reports across every
//! combination of fog and shadow technique.
//!
//! ## Running
//!
//! ```text
//! wronski-fog --config fog.json          # interactive
//! wronski-fog --sweep --report-dir out   # A/B sweep, exits when done
//! wronski-fog --export-luts luts         # write the LUT PNGs only
//! ```
//!
//! | Key | Action |
//! |-----|--------|
//! | W/A/S/D, Q/E, R/F | move |
//! | Shift | fast |
//! | Right mouse | look |
//! | 1 / 2 | wireframe off / on |
//! | F1 | toggle fog |
//! | F2 | toggle depth output |
//! | F5 | collect one report |
//! | F6 | start / abort the sweep |
//! | L | regenerate LUTs |
//! | Esc | quit |

pub mod app;
pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod fly_camera;
pub mod fog;
pub mod frame;
pub mod gpu;
pub mod input;
pub mod light;
pub mod logging;
pub mod lut;
pub mod mesh;
pub mod mesh_pass;
pub mod perf;
pub mod render_graph;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod shadow;
pub mod texture;

pub use app::{AppOptions, WronskiApp, run};
pub use camera::Camera;
pub use cli::Cli;
pub use config::DemoConfig;
pub use error::{FogError, PerfError, Result};
pub use fly_camera::FlyCamera;
pub use fog::{FogSettings, FroxelGrid, OutputMode};
pub use gpu::GpuContext;
pub use input::Input;
pub use light::PointLight;
pub use logging::init_logging;
pub use lut::LutSettings;
pub use perf::{ReportGenerator, Sweep, TimestampProfiler};
pub use renderer::Renderer;
pub use scene::Scene;
pub use shadow::{ShadowSettings, ShadowTechnique};

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec3};
