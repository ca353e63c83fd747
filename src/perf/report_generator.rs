//! Frame-aligned report collection state machine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info, warn};

use crate::error::PerfError;
use crate::perf::report::{write_csv, write_per_range_report, write_readme, write_summary_report};
use crate::perf::time::now_unix_seconds;
use crate::perf::{
    AppendDateTime, CollectionConfig, CounterData, FrameRecorder, InitStatus, PerfSettings,
    RangeCommands, RangeProfiler, SessionOptions, format_utc_timestamp,
};

/// Non-zero integer value opens the report directory once a report is written.
pub const OPEN_REPORT_DIR_ENV: &str = "WRONSKI_OPEN_REPORT_DIR_AFTER_COLLECTION";

/// Coordinates a [`RangeProfiler`] with the render loop.
///
/// Call [`on_frame_start`](Self::on_frame_start) before recording a frame and
/// [`on_frame_end`](Self::on_frame_end) after. Between
/// [`start_collection_on_next_frame`](Self::start_collection_on_next_frame)
/// and the moment the reports are on disk, every frame is one profiling pass
/// until the configured number of passes has been submitted; after that the
/// generator only decodes.
///
/// A session begun implicitly by `on_frame_start` ends with its collection.
/// One begun with [`begin_session`](Self::begin_session) stays open until
/// [`end_session`](Self::end_session) or [`reset`](Self::reset).
pub struct ReportGenerator<P: RangeProfiler> {
    profiler: P,
    init_status: InitStatus,
    device_name: String,
    frame_level_range_name: String,
    num_nesting_levels: u16,
    num_passes: u32,
    open_report_directory_after_collection: bool,
    explicit_session: bool,
    set_config_done: bool,
    report_directory: Option<PathBuf>,
    collection_time: Option<u64>,
    last_report: Option<PathBuf>,
}

impl<P: RangeProfiler> ReportGenerator<P> {
    pub fn new(profiler: P) -> Self {
        let open_report_directory_after_collection = std::env::var(OPEN_REPORT_DIR_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .is_some_and(|v| v != 0);

        Self {
            profiler,
            init_status: InitStatus::NeverCalled,
            device_name: String::new(),
            frame_level_range_name: String::new(),
            num_nesting_levels: 1,
            num_passes: 1,
            open_report_directory_after_collection,
            explicit_session: false,
            set_config_done: false,
            report_directory: None,
            collection_time: None,
            last_report: None,
        }
    }

    /// Applies the collection options from `settings`.
    pub fn configure(&mut self, settings: &PerfSettings) {
        self.set_frame_level_range_name(Some(&settings.frame_level_range_name));
        self.set_num_nesting_levels(settings.num_nesting_levels);
        self.set_num_passes(settings.sample_frames);
        if settings.open_report_directory {
            self.open_report_directory_after_collection = true;
        }
    }

    pub fn initialize(&mut self, device_name: &str) -> Result<(), PerfError> {
        if let Err(e) = self.profiler.check_support() {
            self.init_status = InitStatus::Failed;
            warn!(error = %e, "report generator unavailable");
            return Err(e);
        }
        self.device_name = device_name.to_string();
        self.init_status = InitStatus::Succeeded;
        info!(device = device_name, "report generator initialized");
        Ok(())
    }

    /// Ends any session and forgets all options and collection state.
    pub fn reset(&mut self) {
        if self.profiler.is_in_session() {
            if let Err(e) = self.profiler.end_session() {
                error!(error = %e, "end_session failed during reset");
            }
        }
        self.set_config_done = false;
        self.report_directory = None;
        self.collection_time = None;
        self.explicit_session = false;
        self.num_nesting_levels = 1;
        self.num_passes = 1;
        self.frame_level_range_name.clear();
        if self.init_status != InitStatus::NeverCalled {
            self.init_status = InitStatus::Reset;
        }
    }

    pub fn init_status(&self) -> InitStatus {
        self.init_status
    }

    pub fn is_initialized(&self) -> bool {
        self.init_status == InitStatus::Succeeded
    }

    fn require_initialized(&self) -> Result<(), PerfError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(PerfError::NotInitialized(self.init_status))
        }
    }

    fn begin_session_impl(&mut self, options: &SessionOptions) -> Result<(), PerfError> {
        self.profiler.begin_session(options)?;
        self.enqueue_collection()
    }

    fn enqueue_collection(&mut self) -> Result<(), PerfError> {
        if !self.set_config_done {
            self.profiler.enqueue_counter_collection(&CollectionConfig {
                num_nesting_levels: self.num_nesting_levels,
                num_passes: self.num_passes,
            })?;
            self.set_config_done = true;
        }
        Ok(())
    }

    /// Opens a session that outlives individual collections.
    pub fn begin_session(&mut self, options: &SessionOptions) -> Result<(), PerfError> {
        self.require_initialized()?;
        self.begin_session_impl(options)?;
        self.explicit_session = true;
        Ok(())
    }

    pub fn end_session(&mut self) -> Result<(), PerfError> {
        self.profiler.end_session()?;
        self.explicit_session = false;
        self.set_config_done = false;
        Ok(())
    }

    pub fn on_frame_start(&mut self, recorder: &mut P::Recorder) -> Result<(), PerfError> {
        self.require_initialized()?;
        if !self.is_collecting_report() {
            return Ok(());
        }

        if !self.profiler.is_in_session() {
            if let Err(e) = self.begin_session_impl(&SessionOptions::default()) {
                error!(error = %e, "begin_session failed");
                self.reset_collection();
                return Err(e);
            }
        } else if let Err(e) = self.enqueue_collection() {
            self.reset_collection();
            return Err(e);
        }

        if !self.profiler.all_passes_submitted() {
            if let Err(e) = self.profiler.begin_pass(recorder) {
                self.reset_collection();
                return Err(e);
            }
            if !self.frame_level_range_name.is_empty() {
                let name = self.frame_level_range_name.clone();
                if let Err(e) = self.profiler.push_range(recorder, &name) {
                    self.reset_collection();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn on_frame_end(&mut self, recorder: &mut P::Recorder) -> Result<(), PerfError> {
        self.require_initialized()?;
        if !self.is_collecting_report() {
            return Ok(());
        }

        if !self.profiler.all_passes_submitted() && self.profiler.is_in_pass() {
            if !self.frame_level_range_name.is_empty() {
                if let Err(e) = self.profiler.pop_range(recorder) {
                    self.reset_collection();
                    return Err(e);
                }
            }
            if let Err(e) = self.profiler.end_pass(recorder) {
                self.reset_collection();
                return Err(e);
            }
        }

        let decoded = match self.profiler.decode_counters() {
            Ok(decoded) => decoded,
            Err(e) => {
                self.reset_collection();
                return Err(e);
            }
        };

        if decoded.all_samples_collected {
            let mut data = decoded.data;
            if data.device_name.is_empty() {
                data.device_name = self.device_name.clone();
            }
            if let Some(dir) = self.report_directory.take() {
                self.write_reports(&dir, &data);
                self.last_report = Some(dir);
            }
            self.collection_time = None;
            self.set_config_done = false;
            if !self.explicit_session {
                self.profiler.end_session()?;
            }
        }
        Ok(())
    }

    fn write_reports(&self, dir: &Path, data: &CounterData) {
        let written = write_per_range_report(dir, data)
            .and_then(|_| write_summary_report(dir, data))
            .and_then(|_| write_csv(dir, data));
        match written {
            Ok(_) => info!(dir = %dir.display(), ranges = data.ranges.len(), "performance report written"),
            Err(e) => error!(error = %e, "writing report files failed"),
        }

        if self.open_report_directory_after_collection {
            open_directory(dir);
        }
    }

    /// Arms collection for the next frame.
    ///
    /// Does nothing if a collection is already running. On failure the
    /// generator stays idle.
    pub fn start_collection_on_next_frame(
        &mut self,
        directory: impl AsRef<Path>,
        append_date_time: AppendDateTime,
    ) -> Result<(), PerfError> {
        self.require_initialized()?;
        if self.is_collecting_report() {
            return Ok(());
        }

        let mut dir = directory.as_ref().to_path_buf();
        if append_date_time == AppendDateTime::Yes {
            let now = now_unix_seconds();
            self.collection_time = Some(now);
            dir.push(format_utc_timestamp(now));
        }

        fs::create_dir_all(&dir).map_err(|source| PerfError::ReportDirectory {
            path: dir.clone(),
            source,
        })?;
        write_readme(&dir).map_err(|e| match e {
            PerfError::ReportWrite { source, .. } => PerfError::ReportDirectory {
                path: dir.clone(),
                source,
            },
            other => other,
        })?;

        debug!(dir = %dir.display(), "report collection armed");
        self.report_directory = Some(dir);
        Ok(())
    }

    /// Abandons the current collection and any implicit session.
    pub fn reset_collection(&mut self) {
        self.report_directory = None;
        self.collection_time = None;
        if self.profiler.is_in_session() {
            if let Err(e) = self.profiler.end_session() {
                error!(error = %e, "end_session failed while abandoning collection");
            }
        }
        self.set_config_done = false;
        self.explicit_session = false;
    }

    pub fn is_collecting_report(&self) -> bool {
        self.report_directory.is_some()
    }

    pub fn report_directory(&self) -> Option<&Path> {
        self.report_directory.as_deref()
    }

    /// Unix time the current collection was armed, when a date suffix was used.
    pub fn collection_time(&self) -> Option<u64> {
        self.collection_time
    }

    /// Directory of the most recently completed report, cleared on read.
    pub fn take_last_report(&mut self) -> Option<PathBuf> {
        self.last_report.take()
    }

    pub fn set_frame_level_range_name(&mut self, name: Option<&str>) {
        self.frame_level_range_name = name.unwrap_or_default().to_string();
    }

    pub fn frame_level_range_name(&self) -> &str {
        &self.frame_level_range_name
    }

    pub fn set_num_nesting_levels(&mut self, levels: u16) {
        self.num_nesting_levels = levels.max(1);
    }

    pub fn num_nesting_levels(&self) -> u16 {
        self.num_nesting_levels
    }

    pub fn set_num_passes(&mut self, passes: u32) {
        self.num_passes = passes.max(1);
    }

    pub fn set_open_report_directory_after_collection(&mut self, open: bool) {
        self.open_report_directory_after_collection = open;
    }

    pub fn open_report_directory_after_collection(&self) -> bool {
        self.open_report_directory_after_collection
    }

    /// Opens a named range inside the active pass.
    pub fn push_range(&mut self, recorder: &mut P::Recorder, name: &str) -> Result<(), PerfError> {
        if !self.profiler.is_in_pass() {
            return Ok(());
        }
        self.profiler.push_range(recorder, name).inspect_err(|_| self.reset_collection())
    }

    pub fn pop_range(&mut self, recorder: &mut P::Recorder) -> Result<(), PerfError> {
        if !self.profiler.is_in_pass() {
            return Ok(());
        }
        self.profiler.pop_range(recorder).inspect_err(|_| self.reset_collection())
    }

    pub fn profiler(&self) -> &P {
        &self.profiler
    }
}

impl<P> RangeCommands for ReportGenerator<P>
where
    P: RangeProfiler<Recorder = wgpu::CommandEncoder>,
{
    fn push_range(&mut self, encoder: &mut wgpu::CommandEncoder, name: &str) {
        if let Err(e) = ReportGenerator::push_range(self, encoder, name) {
            error!(error = %e, range = name, "push_range failed, collection abandoned");
        }
    }

    fn pop_range(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if let Err(e) = ReportGenerator::pop_range(self, encoder) {
            error!(error = %e, "pop_range failed, collection abandoned");
        }
    }
}

impl<P> FrameRecorder for ReportGenerator<P>
where
    P: RangeProfiler<Recorder = wgpu::CommandEncoder>,
{
    fn frame_start(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if !self.is_initialized() {
            return;
        }
        if let Err(e) = self.on_frame_start(encoder) {
            error!(error = %e, "report frame start failed");
        }
    }

    fn frame_end(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if !self.is_initialized() {
            return;
        }
        if let Err(e) = self.on_frame_end(encoder) {
            error!(error = %e, "report frame end failed");
        }
    }
}

fn open_directory(dir: &Path) {
    let opener = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    if let Err(e) = Command::new(opener).arg(dir).spawn() {
        warn!(error = %e, dir = %dir.display(), "failed to open report directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perf::{DecodeResult, RangeSamples};

    /// Records calls and can be told to fail one operation.
    #[derive(Default)]
    struct MockProfiler {
        unsupported: bool,
        fail_on: Option<&'static str>,
        in_session: bool,
        in_pass: bool,
        config: Option<CollectionConfig>,
        passes_ended: u32,
        submitted_passes: u32,
        decoded_passes: u32,
        depth: u16,
        calls: Vec<String>,
        sessions_begun: u32,
    }

    impl MockProfiler {
        fn check(&mut self, op: &'static str) -> Result<(), PerfError> {
            self.calls.push(op.to_string());
            if self.fail_on == Some(op) {
                Err(PerfError::profiler(op, "injected"))
            } else {
                Ok(())
            }
        }

        fn num_passes(&self) -> u32 {
            self.config.map(|c| c.num_passes).unwrap_or(0)
        }
    }

    impl RangeProfiler for MockProfiler {
        type Recorder = ();

        fn check_support(&self) -> Result<(), PerfError> {
            if self.unsupported {
                Err(PerfError::profiler("check_support", "no timestamps"))
            } else {
                Ok(())
            }
        }

        fn is_in_session(&self) -> bool {
            self.in_session
        }

        fn is_in_pass(&self) -> bool {
            self.in_pass
        }

        fn begin_session(&mut self, _options: &SessionOptions) -> Result<(), PerfError> {
            self.check("begin_session")?;
            self.in_session = true;
            self.sessions_begun += 1;
            self.passes_ended = 0;
            self.submitted_passes = 0;
            self.decoded_passes = 0;
            Ok(())
        }

        fn end_session(&mut self) -> Result<(), PerfError> {
            self.check("end_session")?;
            self.in_session = false;
            self.in_pass = false;
            self.config = None;
            Ok(())
        }

        fn enqueue_counter_collection(&mut self, config: &CollectionConfig) -> Result<(), PerfError> {
            self.check("enqueue")?;
            self.config = Some(*config);
            self.passes_ended = 0;
            self.submitted_passes = 0;
            self.decoded_passes = 0;
            Ok(())
        }

        fn begin_pass(&mut self, _recorder: &mut ()) -> Result<(), PerfError> {
            self.check("begin_pass")?;
            self.in_pass = true;
            Ok(())
        }

        fn end_pass(&mut self, _recorder: &mut ()) -> Result<(), PerfError> {
            self.check("end_pass")?;
            self.in_pass = false;
            self.passes_ended += 1;
            Ok(())
        }

        fn push_range(&mut self, _recorder: &mut (), name: &str) -> Result<(), PerfError> {
            self.check("push_range")?;
            self.calls.push(format!("range:{name}"));
            self.depth += 1;
            Ok(())
        }

        fn pop_range(&mut self, _recorder: &mut ()) -> Result<(), PerfError> {
            self.check("pop_range")?;
            self.depth = self.depth.saturating_sub(1);
            Ok(())
        }

        fn decode_counters(&mut self) -> Result<DecodeResult, PerfError> {
            self.check("decode")?;
            // Passes become readable one frame after they end.
            self.decoded_passes = self.submitted_passes;
            self.submitted_passes = self.passes_ended;
            let all = self.num_passes() > 0 && self.decoded_passes == self.num_passes();
            Ok(DecodeResult {
                all_samples_collected: all,
                data: CounterData {
                    passes: self.decoded_passes,
                    ranges: vec![RangeSamples {
                        path: "Frame".to_string(),
                        depth: 0,
                        samples_ms: vec![1.0; self.decoded_passes as usize],
                    }],
                    frame_busy_ms: vec![1.0; self.decoded_passes as usize],
                    ..Default::default()
                },
            })
        }

        fn all_passes_submitted(&self) -> bool {
            self.passes_ended >= self.num_passes() && self.num_passes() > 0
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wronski-gen-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn generator() -> ReportGenerator<MockProfiler> {
        let mut generator = ReportGenerator::new(MockProfiler::default());
        generator.set_open_report_directory_after_collection(false);
        generator.initialize("Mock GPU").unwrap();
        generator
    }

    fn run_frame(generator: &mut ReportGenerator<MockProfiler>) -> Result<(), PerfError> {
        generator.on_frame_start(&mut ())?;
        generator.push_range(&mut (), "Fog accumulation")?;
        generator.pop_range(&mut ())?;
        generator.on_frame_end(&mut ())
    }

    #[test]
    fn uninitialized_generator_refuses_work() {
        let mut generator = ReportGenerator::new(MockProfiler::default());
        let err = generator
            .start_collection_on_next_frame(temp_dir("uninit"), AppendDateTime::No)
            .unwrap_err();
        assert!(matches!(err, PerfError::NotInitialized(InitStatus::NeverCalled)));
        assert!(err.to_string().contains("was never called"));
    }

    #[test]
    fn failed_initialization_is_recorded() {
        let mut generator = ReportGenerator::new(MockProfiler {
            unsupported: true,
            ..Default::default()
        });
        assert!(generator.initialize("Mock").is_err());
        assert_eq!(generator.init_status(), InitStatus::Failed);
        assert!(generator.on_frame_start(&mut ()).is_err());
    }

    #[test]
    fn reset_keeps_never_called() {
        let mut generator = ReportGenerator::new(MockProfiler::default());
        generator.reset();
        assert_eq!(generator.init_status(), InitStatus::NeverCalled);

        let mut generator = generator_with_levels(4);
        generator.reset();
        assert_eq!(generator.init_status(), InitStatus::Reset);
        assert_eq!(generator.num_nesting_levels(), 1);
        assert_eq!(generator.frame_level_range_name(), "");
    }

    fn generator_with_levels(levels: u16) -> ReportGenerator<MockProfiler> {
        let mut generator = generator();
        generator.set_num_nesting_levels(levels);
        generator.set_frame_level_range_name(Some("Frame"));
        generator
    }

    #[test]
    fn nesting_levels_clamp_to_one() {
        let mut generator = generator();
        generator.set_num_nesting_levels(0);
        assert_eq!(generator.num_nesting_levels(), 1);
        generator.set_num_nesting_levels(5);
        assert_eq!(generator.num_nesting_levels(), 5);
    }

    #[test]
    fn empty_frame_range_name_disables_it() {
        let mut generator = generator();
        generator.set_frame_level_range_name(Some(""));
        assert_eq!(generator.frame_level_range_name(), "");
        generator.set_frame_level_range_name(None);
        assert_eq!(generator.frame_level_range_name(), "");
    }

    #[test]
    fn implicit_session_collects_and_writes_reports() {
        let dir = temp_dir("implicit");
        let mut generator = generator_with_levels(2);
        generator.set_num_passes(2);

        // Idle frames do nothing.
        run_frame(&mut generator).unwrap();
        assert!(generator.profiler().calls.is_empty());

        generator
            .start_collection_on_next_frame(&dir, AppendDateTime::No)
            .unwrap();
        assert!(generator.is_collecting_report());
        assert!(dir.join("readme.html").exists());

        run_frame(&mut generator).unwrap();
        assert!(generator.profiler().in_session);
        assert_eq!(
            generator.profiler().config,
            Some(CollectionConfig {
                num_nesting_levels: 2,
                num_passes: 2
            })
        );
        run_frame(&mut generator).unwrap();
        assert!(generator.profiler().all_passes_submitted());

        // Still collecting until the final pass decodes.
        assert!(generator.is_collecting_report());
        run_frame(&mut generator).unwrap();

        assert!(!generator.is_collecting_report());
        assert!(!generator.profiler().in_session);
        assert!(dir.join("per_range.html").exists());
        assert!(dir.join("summary.html").exists());
        assert!(dir.join("metrics.csv").exists());
        assert_eq!(generator.take_last_report(), Some(dir.clone()));
        assert!(
            generator
                .profiler()
                .calls
                .iter()
                .any(|c| c == "range:Frame")
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn explicit_session_survives_collection() {
        let dir = temp_dir("explicit");
        let mut generator = generator();
        generator.begin_session(&SessionOptions::default()).unwrap();
        assert!(generator.profiler().in_session);

        generator
            .start_collection_on_next_frame(&dir, AppendDateTime::No)
            .unwrap();
        for _ in 0..3 {
            run_frame(&mut generator).unwrap();
        }
        assert!(!generator.is_collecting_report());
        assert!(generator.profiler().in_session);
        assert_eq!(generator.profiler().sessions_begun, 1);

        // A second collection reuses the open session.
        let again = temp_dir("explicit-again");
        generator
            .start_collection_on_next_frame(&again, AppendDateTime::No)
            .unwrap();
        for _ in 0..2 {
            run_frame(&mut generator).unwrap();
        }
        assert!(again.join("metrics.csv").exists());
        assert_eq!(generator.profiler().sessions_begun, 1);

        generator.end_session().unwrap();
        assert!(!generator.profiler().in_session);
        let _ = fs::remove_dir_all(again);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn begin_session_failure_clears_directory() {
        let dir = temp_dir("begin-fail");
        let mut generator = generator();
        generator.profiler.fail_on = Some("begin_session");
        generator
            .start_collection_on_next_frame(&dir, AppendDateTime::No)
            .unwrap();
        assert!(generator.on_frame_start(&mut ()).is_err());
        assert!(!generator.is_collecting_report());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn mid_collection_failures_reset_collection() {
        for op in ["enqueue", "begin_pass", "end_pass", "decode", "push_range", "pop_range"] {
            let dir = temp_dir(op);
            let mut generator = generator_with_levels(2);
            generator.profiler.fail_on = Some(op);
            generator
                .start_collection_on_next_frame(&dir, AppendDateTime::No)
                .unwrap();
            assert!(run_frame(&mut generator).is_err(), "{op} should fail");
            assert!(!generator.is_collecting_report(), "{op} left collection running");
            assert!(!generator.profiler().in_session, "{op} left session open");
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn frame_level_pop_failure_resets_collection() {
        let dir = temp_dir("frame-pop");
        let mut generator = generator_with_levels(2);
        generator
            .start_collection_on_next_frame(&dir, AppendDateTime::No)
            .unwrap();
        generator.on_frame_start(&mut ()).unwrap();
        assert_eq!(generator.profiler().depth, 1);

        generator.profiler.fail_on = Some("pop_range");
        assert!(generator.on_frame_end(&mut ()).is_err());
        assert!(!generator.is_collecting_report());
        assert!(!generator.profiler().in_session);
        assert!(!generator.profiler().calls.iter().any(|c| c == "end_pass"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn enqueue_failure_inside_explicit_session_resets_collection() {
        let first = temp_dir("enqueue-first");
        let second = temp_dir("enqueue-second");
        let mut generator = generator();
        generator.begin_session(&SessionOptions::default()).unwrap();
        generator
            .start_collection_on_next_frame(&first, AppendDateTime::No)
            .unwrap();
        for _ in 0..3 {
            run_frame(&mut generator).unwrap();
        }
        assert!(!generator.is_collecting_report());
        assert!(generator.profiler().in_session);

        generator.profiler.fail_on = Some("enqueue");
        generator
            .start_collection_on_next_frame(&second, AppendDateTime::No)
            .unwrap();
        assert!(generator.on_frame_start(&mut ()).is_err());
        assert!(!generator.is_collecting_report());
        assert!(!generator.profiler().in_session);
        assert!(!generator.profiler().in_pass);
        let _ = fs::remove_dir_all(first);
        let _ = fs::remove_dir_all(second);
    }

    #[test]
    fn second_start_is_ignored_while_collecting() {
        let first = temp_dir("first");
        let second = temp_dir("second");
        let mut generator = generator();
        generator
            .start_collection_on_next_frame(&first, AppendDateTime::No)
            .unwrap();
        generator
            .start_collection_on_next_frame(&second, AppendDateTime::No)
            .unwrap();
        assert_eq!(generator.report_directory(), Some(first.as_path()));
        assert!(!second.exists());
        let _ = fs::remove_dir_all(first);
    }

    #[test]
    fn date_time_suffix_is_appended() {
        let root = temp_dir("dated");
        let mut generator = generator();
        generator
            .start_collection_on_next_frame(&root, AppendDateTime::Yes)
            .unwrap();
        let dir = generator.report_directory().unwrap().to_path_buf();
        assert_eq!(dir.parent(), Some(root.as_path()));

        let suffix = dir.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(suffix.len(), 15);
        assert_eq!(&suffix[8..9], "_");
        assert!(suffix.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
        assert!(generator.collection_time().is_some());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn unwritable_directory_leaves_generator_idle() {
        let blocker = temp_dir("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut generator = generator();
        let err = generator
            .start_collection_on_next_frame(blocker.join("sub"), AppendDateTime::No)
            .unwrap_err();
        assert!(matches!(err, PerfError::ReportDirectory { .. }));
        assert!(!generator.is_collecting_report());
        let _ = fs::remove_file(blocker);
    }

    #[test]
    fn ranges_outside_a_pass_are_dropped() {
        let mut generator = generator();
        generator.push_range(&mut (), "Depth pass").unwrap();
        generator.pop_range(&mut ()).unwrap();
        assert!(generator.profiler().calls.is_empty());
    }
}
