//! Window shell: event loop, key bindings and per-frame driving of the
//! renderer, report generator and sweep.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::config::DemoConfig;
use crate::error::{FogError, Result};
use crate::fly_camera::FlyCamera;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::perf::{AppendDateTime, ReportGenerator, Sweep, SweepAction, TimestampProfiler};
use crate::renderer::Renderer;
use crate::scene::Scene;

/// How often the window title statistics refresh, in seconds.
pub const TITLE_INTERVAL: f32 = 0.5;

/// Sub-directory of the report root that sweeps write into.
pub const SWEEP_DIR: &str = "sweep";

/// Everything the shell needs before the window exists.
#[derive(Clone, Debug)]
pub struct AppOptions {
    pub config: DemoConfig,
    /// File `config` was loaded from; F4 reloads it.
    pub config_path: Option<PathBuf>,
    pub report_dir: PathBuf,
    /// Start the sweep on the first frame and quit when it finishes.
    pub sweep: bool,
}

/// Averages frame times over [`TITLE_INTERVAL`].
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    frames: u32,
    elapsed: f32,
}

impl FrameStats {
    /// Adds one frame. Returns `(ms per frame, fps)` once the interval has
    /// elapsed, and starts a new interval.
    pub fn tick(&mut self, dt: f32) -> Option<(f32, f32)> {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed < TITLE_INTERVAL {
            return None;
        }
        let ms = self.elapsed * 1000.0 / self.frames as f32;
        let fps = self.frames as f32 / self.elapsed;
        *self = Self::default();
        Some((ms, fps))
    }
}

pub fn format_title(base: &str, ms: f32, fps: f32, position: Vec3) -> String {
    format!(
        "{base} | {ms:.2} ms/frame ({fps:.1} FPS) | camera ({:.1}, {:.1}, {:.1})",
        position.x, position.y, position.z
    )
}

struct RunningApp {
    window: Arc<Window>,
    gpu: GpuContext,
    scene: Scene,
    renderer: Renderer,
    camera: FlyCamera,
    input: Input,
    reports: ReportGenerator<TimestampProfiler>,
    sweep: Sweep,
    /// Settings restored when a sweep ends.
    base: DemoConfig,
    config_path: Option<PathBuf>,
    report_dir: PathBuf,
    exit_after_sweep: bool,
    stats: FrameStats,
    last_frame: Instant,
}

impl RunningApp {
    fn new(event_loop: &ActiveEventLoop, options: AppOptions) -> Result<Self> {
        let config = options.config;
        let attrs = Window::default_attributes()
            .with_title(&config.window.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window.width,
                config.window.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let gpu = GpuContext::new(window.clone(), config.window.vsync)?;

        let scene = Scene::new(&config.scene, &config.lights);
        let renderer = Renderer::new(&gpu, &scene, &config);

        let profiler = TimestampProfiler::new(
            &gpu.device,
            &gpu.queue,
            gpu.supports_timestamps(),
            &gpu.adapter_name,
        );
        let mut reports = ReportGenerator::new(profiler);
        reports.configure(&config.perf);
        if reports.initialize(&gpu.adapter_name).is_err() {
            warn!("performance reports disabled on this adapter");
        }

        let sweep = Sweep::new(options.report_dir.join(SWEEP_DIR), config.perf.warmup_frames);
        info!(adapter = %gpu.adapter_name, "demo started");

        let mut app = Self {
            window,
            gpu,
            scene,
            renderer,
            camera: FlyCamera::from_config(&config.camera),
            input: Input::new(),
            reports,
            sweep,
            base: config,
            config_path: options.config_path,
            report_dir: options.report_dir,
            exit_after_sweep: options.sweep,
            stats: FrameStats::default(),
            last_frame: Instant::now(),
        };
        if options.sweep {
            let action = app.sweep.start();
            app.handle_sweep_action(action, event_loop);
        }
        Ok(app)
    }

    fn handle_keys(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.key_pressed(KeyCode::Escape) {
            event_loop.exit();
            return;
        }
        if self.input.key_pressed(KeyCode::Digit1) {
            self.renderer.set_wireframe(&self.gpu, false);
        }
        if self.input.key_pressed(KeyCode::Digit2) {
            self.renderer.set_wireframe(&self.gpu, true);
        }
        if self.input.key_pressed(KeyCode::F1) {
            let on = self.renderer.toggle_fog();
            info!(apply_fog = on, "fog toggled");
        }
        if self.input.key_pressed(KeyCode::F2) {
            let mode = self.renderer.output_mode().toggle_depth();
            self.renderer.set_output_mode(mode);
            info!(?mode, "output mode");
        }
        if self.input.key_pressed(KeyCode::F4) {
            self.reload_config();
        }
        if self.input.key_pressed(KeyCode::F5) {
            if let Err(e) = self
                .reports
                .start_collection_on_next_frame(&self.report_dir, AppendDateTime::Yes)
            {
                warn!(error = %e, "could not start report collection");
            }
        }
        if self.input.key_pressed(KeyCode::F6) {
            if self.sweep.is_running() {
                self.sweep.abort();
                self.restore_base_settings();
            } else {
                let action = self.sweep.start();
                self.handle_sweep_action(action, event_loop);
            }
        }
        if self.input.key_pressed(KeyCode::KeyL) {
            self.renderer.regenerate_luts();
        }

        if self.input.mouse_pressed(MouseButton::Right) {
            self.grab_cursor(true);
        } else if self.input.mouse_released(MouseButton::Right) {
            self.grab_cursor(false);
        }
    }

    fn grab_cursor(&self, grab: bool) {
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = result {
            debug!(error = %e, "cursor grab unavailable");
        }
        self.window.set_cursor_visible(!grab);
    }

    fn restore_base_settings(&mut self) {
        self.renderer.apply_settings(
            &self.gpu,
            &self.base.fog,
            &self.base.shadow,
            &self.base.lut,
        );
    }

    /// Re-reads the `--config` file and applies its lights, planet position
    /// and fog, shadow and table settings. Window and perf settings keep
    /// their start-up values.
    fn reload_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            info!("no config file to reload");
            return;
        };
        if self.sweep.is_running() {
            warn!("config reload ignored while a sweep is running");
            return;
        }
        let config = match DemoConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config reload failed");
                return;
            }
        };
        let lights_changed = self.scene.reload(&config.scene, &config.lights);
        self.base.scene = config.scene;
        self.base.lights = config.lights;
        self.base.fog = config.fog;
        self.base.shadow = config.shadow;
        self.base.lut = config.lut;
        self.restore_base_settings();
        info!(path = %path.display(), lights_changed, "config reloaded");
    }

    fn handle_sweep_action(&mut self, action: SweepAction, event_loop: &ActiveEventLoop) {
        match action {
            SweepAction::None => {}
            SweepAction::Apply(configuration) => {
                let mut fog = self.renderer.fog_settings().clone();
                let mut shadow = self.renderer.shadow_settings().clone();
                let lut = self.renderer.lut_settings().clone();
                configuration.apply(&mut fog, &mut shadow);
                self.renderer.apply_settings(&self.gpu, &fog, &shadow, &lut);
                info!(configuration = %configuration.name, "sweep configuration applied");
            }
            SweepAction::StartCollection(dir) => {
                if let Err(e) = self
                    .reports
                    .start_collection_on_next_frame(&dir, AppendDateTime::No)
                {
                    warn!(error = %e, dir = %dir.display(), "sweep collection failed to start");
                }
            }
            SweepAction::Finished => {
                self.restore_base_settings();
                if self.exit_after_sweep {
                    event_loop.exit();
                }
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.handle_keys(event_loop);
        self.camera.update(&self.input, dt);
        let camera = self.camera.camera();

        if let Err(e) = self.renderer.render(
            &self.gpu,
            &mut self.scene,
            &camera,
            dt,
            &mut self.reports,
        ) {
            error!(error = %e, "frame failed");
            event_loop.exit();
            return;
        }

        if let Some(dir) = self.reports.take_last_report() {
            debug!(dir = %dir.display(), "report collection complete");
        }
        let action = self.sweep.tick(self.reports.is_collecting_report());
        self.handle_sweep_action(action, event_loop);

        if let Some((ms, fps)) = self.stats.tick(dt) {
            self.window.set_title(&format_title(
                &self.base.window.title,
                ms,
                fps,
                camera.position,
            ));
        }

        self.input.begin_frame();
        self.window.request_redraw();
    }
}

enum AppState {
    Pending(AppOptions),
    Running(Box<RunningApp>),
    Exited,
}

/// The winit application: waits for `resumed` to create the window, GPU
/// and renderer, then drives one frame per redraw.
pub struct WronskiApp {
    state: AppState,
    error: Option<FogError>,
}

impl WronskiApp {
    pub fn new(options: AppOptions) -> Self {
        Self {
            state: AppState::Pending(options),
            error: None,
        }
    }
}

impl ApplicationHandler for WronskiApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending(options) = std::mem::replace(&mut self.state, AppState::Exited) else {
            return;
        };
        match RunningApp::new(event_loop, options) {
            Ok(app) => {
                app.window.request_redraw();
                self.state = AppState::Running(Box::new(app));
            }
            Err(e) => {
                error!(error = %e, "startup failed");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(app) = &mut self.state else {
            return;
        };

        app.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                app.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let AppState::Running(app) = &mut self.state {
            app.input.handle_device_event(&event);
        }
    }
}

/// Opens the window and runs until it is closed, Esc is pressed or a
/// `--sweep` run finishes.
pub fn run(options: AppOptions) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = WronskiApp::new(options);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
