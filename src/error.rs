//! Error types for the demo and its report generator.

use std::path::PathBuf;

use thiserror::Error;

use crate::perf::InitStatus;

/// Errors raised while setting up or running the demo.
#[derive(Error, Debug)]
pub enum FogError {
    /// The window surface could not be created.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// No adapter matched the surface.
    #[error("No suitable GPU adapter found: {0}")]
    NoSuitableAdapter(#[from] wgpu::RequestAdapterError),

    /// Logical device creation failed.
    #[error("Device creation failed: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    /// The surface reported no usable format.
    #[error("Surface has no supported formats")]
    NoSurfaceFormat,

    /// A swapchain image could not be acquired.
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    /// The window could not be opened.
    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    /// The event loop failed.
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("Invalid configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoding or writing an image failed.
    #[error("Image export failed: {0}")]
    Image(#[from] image::ImageError),

    /// The GPU lacks a feature the caller asked for.
    #[error("Unsupported GPU feature: {0}")]
    UnsupportedFeature(&'static str),

    /// Report generation failed.
    #[error(transparent)]
    Perf(#[from] PerfError),
}

impl FogError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the report generator and its range profilers.
#[derive(Error, Debug)]
pub enum PerfError {
    /// An operation ran before initialization succeeded.
    #[error("report generator skipped: initialization {}", .0.describe())]
    NotInitialized(InitStatus),

    /// A profiler call failed.
    #[error("{operation} failed: {reason}")]
    Profiler {
        operation: &'static str,
        reason: String,
    },

    /// The report directory could not be prepared.
    #[error("failed to create files in {path}: {source}")]
    ReportDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a report file failed.
    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PerfError {
    /// Shorthand for a failed profiler call.
    pub fn profiler(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Profiler {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, FogError>;
