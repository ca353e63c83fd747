//! Automated A/B sweep over fog and shadow configurations.
//!
//! The sweep applies one configuration, lets the frame rate settle for a
//! number of warm-up frames, then asks for a report collection into a
//! sub-directory named after the configuration. The next configuration is
//! applied only once that collection has finished.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::PerfError;
use crate::fog::{FogSettings, LightIntegration, MultipleScattering};
use crate::perf::read_frame_time;
use crate::shadow::{ShadowSettings, ShadowTechnique};

/// Summary file written into the sweep root.
pub const SWEEP_SUMMARY_FILE: &str = "sweep_summary.csv";

/// One point of the sweep's cross product.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepConfiguration {
    /// Filesystem-safe, unique within a sweep.
    pub name: String,
    pub heterogeneous: bool,
    pub light_integration: LightIntegration,
    pub multiple_scattering: MultipleScattering,
    pub shadow: ShadowTechnique,
}

impl SweepConfiguration {
    pub fn new(
        heterogeneous: bool,
        light_integration: LightIntegration,
        multiple_scattering: MultipleScattering,
        shadow: ShadowTechnique,
    ) -> Self {
        let density = if heterogeneous { "hetero" } else { "homo" };
        let integration = match light_integration {
            LightIntegration::FroxelCentre => "centre",
            LightIntegration::Hoobler => "hoobler",
        };
        let scattering = match multiple_scattering {
            MultipleScattering::Single => "single",
            MultipleScattering::Kovalovs => "kovalovs",
        };
        let shadow_name = match shadow {
            ShadowTechnique::Off => "off",
            ShadowTechnique::Vsm => "vsm",
            ShadowTechnique::Esm => "esm",
        };
        Self {
            name: format!("{density}_{integration}_{scattering}_{shadow_name}"),
            heterogeneous,
            light_integration,
            multiple_scattering,
            shadow,
        }
    }

    /// Overrides the fields this configuration controls.
    pub fn apply(&self, fog: &mut FogSettings, shadow: &mut ShadowSettings) {
        fog.heterogeneous = self.heterogeneous;
        fog.light_integration = self.light_integration;
        fog.multiple_scattering = self.multiple_scattering;
        shadow.technique = self.shadow;
    }
}

/// Every combination of density model, light integration, multiple
/// scattering and shadow technique.
pub fn enumerate_configurations() -> Vec<SweepConfiguration> {
    let mut configs = Vec::with_capacity(24);
    for heterogeneous in [true, false] {
        for integration in [LightIntegration::FroxelCentre, LightIntegration::Hoobler] {
            for scattering in [MultipleScattering::Single, MultipleScattering::Kovalovs] {
                for shadow in [ShadowTechnique::Off, ShadowTechnique::Vsm, ShadowTechnique::Esm] {
                    configs.push(SweepConfiguration::new(
                        heterogeneous,
                        integration,
                        scattering,
                        shadow,
                    ));
                }
            }
        }
    }
    configs
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    WarmingUp { index: usize, frames_left: u32 },
    Collecting { index: usize },
    Finished,
}

/// What the caller should do this frame.
#[derive(Clone, Debug, PartialEq)]
pub enum SweepAction {
    None,
    /// Apply these settings, warm-up starts now.
    Apply(SweepConfiguration),
    /// Start a report collection into this directory.
    StartCollection(PathBuf),
    /// Every configuration has been collected.
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SweepResult {
    pub name: String,
    /// Mean GPU frame time, `None` when the report could not be read.
    pub frame_ms: Option<f64>,
}

pub struct Sweep {
    root: PathBuf,
    configs: Vec<SweepConfiguration>,
    warmup_frames: u32,
    state: SweepState,
    results: Vec<SweepResult>,
}

impl Sweep {
    pub fn new(root: impl Into<PathBuf>, warmup_frames: u32) -> Self {
        Self::with_configurations(root, warmup_frames, enumerate_configurations())
    }

    pub fn with_configurations(
        root: impl Into<PathBuf>,
        warmup_frames: u32,
        configs: Vec<SweepConfiguration>,
    ) -> Self {
        Self {
            root: root.into(),
            configs,
            warmup_frames,
            state: SweepState::Idle,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results(&self) -> &[SweepResult] {
        &self.results
    }

    pub fn configurations(&self) -> &[SweepConfiguration] {
        &self.configs
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            SweepState::WarmingUp { .. } | SweepState::Collecting { .. }
        )
    }

    /// Restarts from the first configuration.
    pub fn start(&mut self) -> SweepAction {
        self.results.clear();
        let Some(first) = self.configs.first().cloned() else {
            self.state = SweepState::Finished;
            return SweepAction::Finished;
        };
        info!(
            configurations = self.configs.len(),
            root = %self.root.display(),
            "sweep started"
        );
        self.state = SweepState::WarmingUp {
            index: 0,
            frames_left: self.warmup_frames,
        };
        SweepAction::Apply(first)
    }

    /// Advances by one frame. `is_collecting` is the report generator's
    /// state at the end of the previous frame.
    pub fn tick(&mut self, is_collecting: bool) -> SweepAction {
        match self.state {
            SweepState::Idle | SweepState::Finished => SweepAction::None,
            SweepState::WarmingUp { index, frames_left } => {
                if frames_left > 0 {
                    self.state = SweepState::WarmingUp {
                        index,
                        frames_left: frames_left - 1,
                    };
                    return SweepAction::None;
                }
                self.state = SweepState::Collecting { index };
                SweepAction::StartCollection(self.root.join(&self.configs[index].name))
            }
            SweepState::Collecting { index } => {
                if is_collecting {
                    return SweepAction::None;
                }
                self.record_result(index);
                let next = index + 1;
                match self.configs.get(next).cloned() {
                    Some(config) => {
                        self.state = SweepState::WarmingUp {
                            index: next,
                            frames_left: self.warmup_frames,
                        };
                        SweepAction::Apply(config)
                    }
                    None => {
                        self.state = SweepState::Finished;
                        if let Err(e) = write_sweep_summary(&self.root, &self.results) {
                            warn!("failed to write sweep summary: {e}");
                        }
                        info!(root = %self.root.display(), "sweep finished");
                        SweepAction::Finished
                    }
                }
            }
        }
    }

    /// Stops without writing a summary.
    pub fn abort(&mut self) {
        if self.is_running() {
            info!(completed = self.results.len(), "sweep aborted");
        }
        self.state = SweepState::Idle;
    }

    fn record_result(&mut self, index: usize) {
        let name = self.configs[index].name.clone();
        let frame_ms = read_frame_time(&self.root.join(&name));
        if frame_ms.is_none() {
            warn!(configuration = %name, "no frame time found for configuration");
        }
        self.results.push(SweepResult { name, frame_ms });
    }
}

/// Writes `sweep_summary.csv` comparing each configuration to the fastest.
pub fn write_sweep_summary(root: &Path, results: &[SweepResult]) -> Result<PathBuf, PerfError> {
    let fastest = results
        .iter()
        .filter_map(|r| r.frame_ms)
        .filter(|ms| *ms > 0.0)
        .fold(f64::INFINITY, f64::min);

    let mut out = String::from("configuration,mean_frame_ms,relative_to_fastest\n");
    for result in results {
        match result.frame_ms {
            Some(ms) if fastest.is_finite() => {
                out.push_str(&format!("{},{ms:.4},{:.3}\n", result.name, ms / fastest));
            }
            Some(ms) => out.push_str(&format!("{},{ms:.4},\n", result.name)),
            None => out.push_str(&format!("{},,\n", result.name)),
        }
    }

    let path = root.join(SWEEP_SUMMARY_FILE);
    fs::create_dir_all(root)
        .and_then(|_| fs::write(&path, out))
        .map_err(|source| PerfError::ReportWrite {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wronski-sweep-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn cross_product_has_unique_names() {
        let configs = enumerate_configurations();
        assert_eq!(configs.len(), 24);
        let names: HashSet<_> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 24);
        assert!(configs.iter().all(|c| {
            c.name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }));
        assert_eq!(configs[0].name, "hetero_centre_single_off");
    }

    #[test]
    fn apply_overrides_only_swept_fields() {
        let mut fog = FogSettings::default();
        let mut shadow = ShadowSettings::default();
        let density = fog.density;
        let config = SweepConfiguration::new(
            false,
            LightIntegration::Hoobler,
            MultipleScattering::Kovalovs,
            ShadowTechnique::Esm,
        );
        config.apply(&mut fog, &mut shadow);
        assert!(!fog.heterogeneous);
        assert_eq!(fog.light_integration, LightIntegration::Hoobler);
        assert_eq!(fog.multiple_scattering, MultipleScattering::Kovalovs);
        assert_eq!(shadow.technique, ShadowTechnique::Esm);
        assert_eq!(fog.density, density);
    }

    #[test]
    fn idle_sweep_does_nothing() {
        let mut sweep = Sweep::new(temp_dir("idle"), 2);
        assert_eq!(sweep.tick(false), SweepAction::None);
        assert_eq!(sweep.state(), SweepState::Idle);
    }

    #[test]
    fn warmup_then_collect_then_next() {
        let root = temp_dir("cycle");
        let configs = enumerate_configurations().into_iter().take(2).collect();
        let mut sweep = Sweep::with_configurations(&root, 2, configs);

        let SweepAction::Apply(first) = sweep.start() else {
            panic!("expected first configuration");
        };
        assert_eq!(first.name, "hetero_centre_single_off");

        // Two warm-up frames, then collection starts.
        assert_eq!(sweep.tick(false), SweepAction::None);
        assert_eq!(sweep.tick(false), SweepAction::None);
        assert_eq!(
            sweep.tick(false),
            SweepAction::StartCollection(root.join("hetero_centre_single_off"))
        );
        assert_eq!(sweep.state(), SweepState::Collecting { index: 0 });

        // Still collecting: nothing new is applied.
        assert_eq!(sweep.tick(true), SweepAction::None);
        assert_eq!(sweep.tick(true), SweepAction::None);

        let SweepAction::Apply(second) = sweep.tick(false) else {
            panic!("expected second configuration");
        };
        assert_eq!(second.name, "hetero_centre_single_vsm");
        assert_eq!(
            sweep.state(),
            SweepState::WarmingUp {
                index: 1,
                frames_left: 2
            }
        );
        assert_eq!(sweep.results().len(), 1);
        assert_eq!(sweep.results()[0].frame_ms, None);

        sweep.tick(false);
        sweep.tick(false);
        assert!(matches!(sweep.tick(false), SweepAction::StartCollection(_)));
        assert_eq!(sweep.tick(false), SweepAction::Finished);
        assert_eq!(sweep.state(), SweepState::Finished);
        assert!(root.join(SWEEP_SUMMARY_FILE).exists());
        assert_eq!(sweep.tick(false), SweepAction::None);
    }

    #[test]
    fn zero_warmup_collects_on_first_tick() {
        let root = temp_dir("no-warmup");
        let configs = enumerate_configurations().into_iter().take(1).collect();
        let mut sweep = Sweep::with_configurations(&root, 0, configs);
        sweep.start();
        assert!(matches!(sweep.tick(false), SweepAction::StartCollection(_)));
    }

    #[test]
    fn abort_returns_to_idle() {
        let mut sweep = Sweep::new(temp_dir("abort"), 1);
        sweep.start();
        assert!(sweep.is_running());
        sweep.abort();
        assert_eq!(sweep.state(), SweepState::Idle);
        assert_eq!(sweep.tick(false), SweepAction::None);
    }

    #[test]
    fn empty_sweep_finishes_immediately() {
        let mut sweep = Sweep::with_configurations(temp_dir("empty"), 1, Vec::new());
        assert_eq!(sweep.start(), SweepAction::Finished);
    }

    #[test]
    fn summary_is_relative_to_fastest() {
        let root = temp_dir("summary");
        let results = vec![
            SweepResult {
                name: "a".to_string(),
                frame_ms: Some(4.0),
            },
            SweepResult {
                name: "b".to_string(),
                frame_ms: Some(2.0),
            },
            SweepResult {
                name: "c".to_string(),
                frame_ms: None,
            },
        ];
        let path = write_sweep_summary(&root, &results).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "configuration,mean_frame_ms,relative_to_fastest");
        assert_eq!(lines[1], "a,4.0000,2.000");
        assert_eq!(lines[2], "b,2.0000,1.000");
        assert_eq!(lines[3], "c,,");
    }
}
