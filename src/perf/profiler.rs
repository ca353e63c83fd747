use crate::error::PerfError;
use crate::perf::{CollectionConfig, DecodeResult, SessionOptions};

/// A backend that times nested ranges across several profiling passes.
///
/// `Recorder` is whatever commands are recorded into: a
/// `wgpu::CommandEncoder` for the GPU backend, `()` for tests.
pub trait RangeProfiler {
    type Recorder;

    /// Fails when the backend cannot profile on this device.
    fn check_support(&self) -> Result<(), PerfError>;

    fn is_in_session(&self) -> bool;
    fn is_in_pass(&self) -> bool;

    fn begin_session(&mut self, options: &SessionOptions) -> Result<(), PerfError>;
    fn end_session(&mut self) -> Result<(), PerfError>;

    /// Sets how many passes to collect and how deep ranges are timed.
    fn enqueue_counter_collection(&mut self, config: &CollectionConfig) -> Result<(), PerfError>;

    fn begin_pass(&mut self, recorder: &mut Self::Recorder) -> Result<(), PerfError>;
    fn end_pass(&mut self, recorder: &mut Self::Recorder) -> Result<(), PerfError>;

    fn push_range(&mut self, recorder: &mut Self::Recorder, name: &str) -> Result<(), PerfError>;
    fn pop_range(&mut self, recorder: &mut Self::Recorder) -> Result<(), PerfError>;

    /// Collects whatever pass results are ready.
    fn decode_counters(&mut self) -> Result<DecodeResult, PerfError>;

    /// True once every enqueued pass has ended.
    fn all_passes_submitted(&self) -> bool;
}

/// Sink for named ranges opened around render work.
pub trait RangeCommands {
    fn push_range(&mut self, encoder: &mut wgpu::CommandEncoder, name: &str);
    fn pop_range(&mut self, encoder: &mut wgpu::CommandEncoder);
}

/// A [`RangeCommands`] sink that also brackets each frame.
pub trait FrameRecorder: RangeCommands {
    fn frame_start(&mut self, encoder: &mut wgpu::CommandEncoder);
    fn frame_end(&mut self, encoder: &mut wgpu::CommandEncoder);
}
