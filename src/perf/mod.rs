//! GPU performance reports.
//!
//! [`ReportGenerator`] drives a [`RangeProfiler`] through a session, one
//! profiling pass per sampled frame and a nested range per render node. Once
//! every pass has been decoded it writes HTML and CSV reports into a
//! directory. [`Sweep`] repeats that collection over every fog and shadow
//! configuration for A/B comparisons.
//!
//! ```text
//! start_collection_on_next_frame ─▶ on_frame_start ─▶ push/pop ranges ─▶ on_frame_end
//!                                   (session, pass)                      (end pass, decode,
//!                                                                          write reports)
//! ```

mod counters;
mod profiler;
mod report;
mod report_generator;
mod sweep;
mod time;
mod timestamp;

use serde::{Deserialize, Serialize};

pub use counters::{Counter, CounterKind};
pub use profiler::{FrameRecorder, RangeCommands, RangeProfiler};
pub use report::{
    RangeStats, html_escape, read_frame_time, readme_html, write_csv, write_per_range_report,
    write_summary_report,
};
pub use report_generator::{OPEN_REPORT_DIR_ENV, ReportGenerator};
pub use sweep::{
    Sweep, SweepAction, SweepConfiguration, SweepResult, SweepState, enumerate_configurations,
    write_sweep_summary,
};
pub use time::format_utc_timestamp;
pub use timestamp::TimestampProfiler;

/// Upper bound on ranges recorded per pass.
pub const MAX_NUM_RANGES: u32 = 512;

/// Report collection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerfSettings {
    /// Frames sampled per report, one profiling pass each.
    pub sample_frames: u32,
    /// Range nesting depth that gets timed. 0 is treated as 1.
    pub num_nesting_levels: u16,
    /// Parent range wrapped around each sampled frame. Empty disables it.
    pub frame_level_range_name: String,
    /// Frames rendered after applying a sweep configuration before sampling.
    pub warmup_frames: u32,
    pub open_report_directory: bool,
}

impl Default for PerfSettings {
    fn default() -> Self {
        Self {
            sample_frames: 30,
            num_nesting_levels: 3,
            frame_level_range_name: "Frame".to_string(),
            warmup_frames: 60,
            open_report_directory: false,
        }
    }
}

impl PerfSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_frames == 0 {
            return Err("perf sample_frames must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Outcome of the most recent [`ReportGenerator::initialize`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStatus {
    NeverCalled,
    Reset,
    Failed,
    Succeeded,
}

impl InitStatus {
    pub fn describe(self) -> &'static str {
        match self {
            InitStatus::NeverCalled => "was never called",
            InitStatus::Reset => "was later reset",
            InitStatus::Failed => "previously failed",
            InitStatus::Succeeded => "previously succeeded",
        }
    }
}

/// Whether a `YYYYMMDD_HHMMSS` sub-directory is appended to the report path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendDateTime {
    No,
    Yes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_num_ranges: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_num_ranges: MAX_NUM_RANGES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionConfig {
    pub num_nesting_levels: u16,
    pub num_passes: u32,
}

/// Timings gathered for one range path across every sampled pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeSamples {
    /// Slash-separated names from the outermost range, e.g. `Frame/Depth pass`.
    pub path: String,
    /// 0 for outermost ranges.
    pub depth: u16,
    pub samples_ms: Vec<f64>,
}

impl RangeSamples {
    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Decoded counter values for a whole collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterData {
    pub device_name: String,
    pub passes: u32,
    pub ranges: Vec<RangeSamples>,
    /// GPU time between the first and last command of each pass.
    pub frame_busy_ms: Vec<f64>,
    /// GPU time between the starts of consecutive passes.
    pub frame_interval_ms: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodeResult {
    pub all_samples_collected: bool,
    pub data: CounterData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_status_descriptions() {
        assert_eq!(InitStatus::NeverCalled.describe(), "was never called");
        assert_eq!(InitStatus::Reset.describe(), "was later reset");
    }

    #[test]
    fn range_name_is_last_component() {
        let r = RangeSamples {
            path: "Frame/Colour pass/Planet rendering".to_string(),
            depth: 2,
            samples_ms: vec![],
        };
        assert_eq!(r.name(), "Planet rendering");
    }

    #[test]
    fn zero_sample_frames_is_invalid() {
        let settings = PerfSettings {
            sample_frames: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(PerfSettings::default().validate().is_ok());
    }
}
