//! Demo configuration.
//!
//! Every tunable of the demo, loaded from a JSON file. Every field carries
//! a serde default so a config file only has to name what it overrides.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FogError, Result};
use crate::fog::FogSettings;
use crate::light::{MAX_POINT_LIGHTS, PointLight};
use crate::lut::LutSettings;
use crate::perf::PerfSettings;
use crate::shadow::ShadowSettings;

/// Window creation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            title: "WronskiFog".to_string(),
            vsync: true,
        }
    }
}

/// Camera projection and movement parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub sensitivity: f32,
    pub move_speed: f32,
    pub fast_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 150.0,
            position: Vec3::new(0.0, 1.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            sensitivity: 0.1,
            move_speed: 10.0,
            fast_speed: 20.0,
        }
    }
}

/// Planet, asteroid ring and clear colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneSettings {
    pub asteroid_count: u32,
    pub ring_radius: f32,
    pub ring_offset: f32,
    pub planet_position: Vec3,
    pub planet_scale: f32,
    pub clear_colour: [f32; 3],
    pub seed: u64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            asteroid_count: 10_000,
            ring_radius: 50.0,
            ring_offset: 2.5,
            planet_position: Vec3::new(0.0, -3.0, 0.0),
            planet_scale: 2.0,
            clear_colour: [0.2, 0.3, 0.3],
            seed: 0x5eed,
        }
    }
}

/// Full demo configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub fog: FogSettings,
    pub lights: Vec<PointLight>,
    pub shadow: ShadowSettings,
    pub lut: LutSettings,
    pub scene: SceneSettings,
    pub perf: PerfSettings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            fog: FogSettings::default(),
            lights: vec![PointLight::default()],
            shadow: ShadowSettings::default(),
            lut: LutSettings::default(),
            scene: SceneSettings::default(),
            perf: PerfSettings::default(),
        }
    }
}

impl DemoConfig {
    /// Loads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| FogError::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|source| FogError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Writes the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(|source| FogError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|e| FogError::io(path, e))
    }

    /// Rejects values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FogError::InvalidConfig(msg));

        if self.window.width == 0 || self.window.height == 0 {
            return invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            ));
        }

        let cam = &self.camera;
        if !(cam.near > 0.0 && cam.near < cam.far) {
            return invalid(format!(
                "camera near {} must be positive and below far {}",
                cam.near, cam.far
            ));
        }
        if !(cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0) {
            return invalid(format!("camera fov {} outside (0, 180)", cam.fov_degrees));
        }

        self.fog.validate().map_err(FogError::InvalidConfig)?;
        self.shadow.validate().map_err(FogError::InvalidConfig)?;
        self.lut.validate().map_err(FogError::InvalidConfig)?;
        self.perf.validate().map_err(FogError::InvalidConfig)?;

        if self.lights.len() > MAX_POINT_LIGHTS {
            return invalid(format!(
                "{} point lights configured, at most {MAX_POINT_LIGHTS} supported",
                self.lights.len()
            ));
        }
        if self.scene.asteroid_count > 0 && self.scene.ring_offset <= 0.0 {
            return invalid("asteroid ring offset must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("wronski-config-{}-{name}", std::process::id()))
    }

    #[test]
    fn defaults_describe_the_planet_scene() {
        let config = DemoConfig::default();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
        assert_eq!(config.window.title, "WronskiFog");
        assert_eq!(config.camera.far, 150.0);
        assert_eq!(config.scene.asteroid_count, 10_000);
        assert_eq!(config.lights.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: DemoConfig =
            serde_json::from_str(r#"{ "fog": { "density": 0.2 }, "scene": { "asteroid_count": 12 } }"#)
                .unwrap();
        assert_eq!(config.fog.density, 0.2);
        assert_eq!(config.fog.phase_g, FogSettings::default().phase_g);
        assert_eq!(config.scene.asteroid_count, 12);
        assert_eq!(config.scene.ring_radius, 50.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<DemoConfig, _> =
            serde_json::from_str(r#"{ "fogg": {} }"#);
        assert!(result.is_err());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip.json");
        let mut config = DemoConfig::default();
        config.fog.phase_g = 0.6;
        config.shadow.resolution = 256;
        config.save(&path).unwrap();

        let loaded = DemoConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let path = temp_path("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = DemoConfig::load(&path).unwrap_err();
        assert!(matches!(err, FogError::ConfigParse { .. }));
        assert!(err.to_string().contains("broken.json"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = DemoConfig::default();
        config.camera.near = 200.0;
        assert!(config.validate().is_err());

        let mut config = DemoConfig::default();
        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = DemoConfig::default();
        config.fog.phase_g = 1.5;
        assert!(config.validate().is_err());

        let mut config = DemoConfig::default();
        config.lights = vec![PointLight::default(); MAX_POINT_LIGHTS + 1];
        assert!(config.validate().is_err());

        let mut config = DemoConfig::default();
        config.shadow.resolution = 300;
        assert!(config.validate().is_err());
    }
}
