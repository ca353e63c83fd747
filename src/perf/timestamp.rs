//! GPU range timing with timestamp queries.
//!
//! Each profiling pass owns a query set. Query 0 and 1 bracket the whole
//! pass; every timed range takes the next two. When a pass ends its queries
//! are resolved and copied into a readback buffer, which is mapped
//! asynchronously once the frame carrying it has been submitted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, trace};

use crate::error::PerfError;
use crate::perf::{
    CollectionConfig, CounterData, DecodeResult, RangeProfiler, RangeSamples, SessionOptions,
};

const MAP_PENDING: u8 = 0;
const MAP_READY: u8 = 1;
const MAP_FAILED: u8 = 2;

const PASS_BEGIN_QUERY: u32 = 0;
const PASS_END_QUERY: u32 = 1;
const FIRST_RANGE_QUERY: u32 = 2;

struct RecordedRange {
    path: String,
    depth: u16,
    begin: u32,
    end: u32,
}

struct PassSlot {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    ranges: Vec<RecordedRange>,
    queries_used: u32,
    ended: bool,
    /// Ended during the current frame, so not yet submitted.
    awaiting_submit: bool,
    map_state: Option<Arc<AtomicU8>>,
    timestamps: Option<Vec<u64>>,
}

/// An open range: index into the pass's ranges, or `None` when untimed.
struct OpenRange {
    name: String,
    timed: Option<usize>,
}

struct Session {
    max_ranges: u32,
    config: Option<CollectionConfig>,
    slots: Vec<PassSlot>,
    active: Option<usize>,
    stack: Vec<OpenRange>,
}

/// [`RangeProfiler`] backed by wgpu timestamp queries written into the
/// frame's command encoder.
pub struct TimestampProfiler {
    device: wgpu::Device,
    supported: bool,
    period_ns: f32,
    device_name: String,
    session: Option<Session>,
}

impl TimestampProfiler {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, supported: bool, device_name: &str) -> Self {
        Self {
            device: device.clone(),
            supported,
            period_ns: queue.get_timestamp_period(),
            device_name: device_name.to_string(),
            session: None,
        }
    }

    fn session(&mut self, operation: &'static str) -> Result<&mut Session, PerfError> {
        self.session
            .as_mut()
            .ok_or_else(|| PerfError::profiler(operation, "no active session"))
    }

    fn create_slot(device: &wgpu::Device, index: usize, max_ranges: u32) -> PassSlot {
        let count = FIRST_RANGE_QUERY + 2 * max_ranges;
        let size = u64::from(count) * std::mem::size_of::<u64>() as u64;
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some(&format!("Profiler Pass {index} Queries")),
            ty: wgpu::QueryType::Timestamp,
            count,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Profiler Pass {index} Resolve")),
            size,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Profiler Pass {index} Readback")),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        PassSlot {
            query_set,
            resolve,
            readback,
            ranges: Vec::new(),
            queries_used: FIRST_RANGE_QUERY,
            ended: false,
            awaiting_submit: false,
            map_state: None,
            timestamps: None,
        }
    }

    fn ticks_to_ms(&self, ticks: u64) -> f64 {
        ticks as f64 * f64::from(self.period_ns) / 1.0e6
    }

    fn build_counter_data(&self, session: &Session) -> CounterData {
        let mut data = CounterData {
            device_name: self.device_name.clone(),
            passes: session.slots.len() as u32,
            ..Default::default()
        };

        let mut pass_starts = Vec::new();
        for slot in &session.slots {
            let Some(ts) = &slot.timestamps else { continue };
            let at = |q: u32| ts.get(q as usize).copied().unwrap_or(0);

            pass_starts.push(at(PASS_BEGIN_QUERY));
            data.frame_busy_ms
                .push(self.ticks_to_ms(at(PASS_END_QUERY).saturating_sub(at(PASS_BEGIN_QUERY))));

            for range in &slot.ranges {
                let ms = self.ticks_to_ms(at(range.end).saturating_sub(at(range.begin)));
                match data.ranges.iter_mut().find(|r| r.path == range.path) {
                    Some(existing) => existing.samples_ms.push(ms),
                    None => data.ranges.push(RangeSamples {
                        path: range.path.clone(),
                        depth: range.depth,
                        samples_ms: vec![ms],
                    }),
                }
            }
        }

        data.frame_interval_ms = pass_starts
            .windows(2)
            .map(|w| self.ticks_to_ms(w[1].saturating_sub(w[0])))
            .collect();
        data
    }
}

impl RangeProfiler for TimestampProfiler {
    type Recorder = wgpu::CommandEncoder;

    fn check_support(&self) -> Result<(), PerfError> {
        if self.supported {
            Ok(())
        } else {
            Err(PerfError::profiler(
                "initialize",
                "adapter lacks TIMESTAMP_QUERY_INSIDE_ENCODERS",
            ))
        }
    }

    fn is_in_session(&self) -> bool {
        self.session.is_some()
    }

    fn is_in_pass(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.active.is_some())
    }

    fn begin_session(&mut self, options: &SessionOptions) -> Result<(), PerfError> {
        if self.session.is_some() {
            return Err(PerfError::profiler("begin_session", "session already active"));
        }
        if options.max_num_ranges == 0 {
            return Err(PerfError::profiler("begin_session", "max_num_ranges must be non-zero"));
        }
        debug!(max_ranges = options.max_num_ranges, "profiler session begun");
        self.session = Some(Session {
            max_ranges: options.max_num_ranges,
            config: None,
            slots: Vec::new(),
            active: None,
            stack: Vec::new(),
        });
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), PerfError> {
        match self.session.take() {
            Some(_) => {
                debug!("profiler session ended");
                Ok(())
            }
            None => Err(PerfError::profiler("end_session", "no active session")),
        }
    }

    fn enqueue_counter_collection(&mut self, config: &CollectionConfig) -> Result<(), PerfError> {
        let session = self.session("enqueue_counter_collection")?;
        if session.active.is_some() {
            return Err(PerfError::profiler("enqueue_counter_collection", "pass in progress"));
        }
        session.config = Some(*config);
        session.slots.clear();
        Ok(())
    }

    fn begin_pass(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), PerfError> {
        let device = self.device.clone();
        let session = self.session("begin_pass")?;
        let config = session
            .config
            .ok_or_else(|| PerfError::profiler("begin_pass", "no collection enqueued"))?;
        if session.active.is_some() {
            return Err(PerfError::profiler("begin_pass", "pass already active"));
        }
        if session.slots.len() as u32 >= config.num_passes {
            return Err(PerfError::profiler("begin_pass", "all passes already submitted"));
        }

        let index = session.slots.len();
        let slot = Self::create_slot(&device, index, session.max_ranges);
        encoder.write_timestamp(&slot.query_set, PASS_BEGIN_QUERY);
        session.slots.push(slot);
        session.active = Some(index);
        session.stack.clear();
        trace!(pass = index, "profiler pass begun");
        Ok(())
    }

    fn end_pass(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), PerfError> {
        let session = self.session("end_pass")?;
        let index = session
            .active
            .ok_or_else(|| PerfError::profiler("end_pass", "no active pass"))?;
        if !session.stack.is_empty() {
            return Err(PerfError::profiler(
                "end_pass",
                format!("{} ranges still open", session.stack.len()),
            ));
        }

        let slot = &mut session.slots[index];
        encoder.write_timestamp(&slot.query_set, PASS_END_QUERY);
        encoder.resolve_query_set(&slot.query_set, 0..slot.queries_used, &slot.resolve, 0);
        encoder.copy_buffer_to_buffer(
            &slot.resolve,
            0,
            &slot.readback,
            0,
            u64::from(slot.queries_used) * std::mem::size_of::<u64>() as u64,
        );
        slot.ended = true;
        slot.awaiting_submit = true;
        session.active = None;
        trace!(pass = index, "profiler pass ended");
        Ok(())
    }

    fn push_range(&mut self, encoder: &mut wgpu::CommandEncoder, name: &str) -> Result<(), PerfError> {
        let session = self.session("push_range")?;
        let index = session
            .active
            .ok_or_else(|| PerfError::profiler("push_range", "no active pass"))?;
        let levels = session.config.map(|c| c.num_nesting_levels).unwrap_or(1);
        let depth = session.stack.len() as u16;

        let path = session
            .stack
            .iter()
            .map(|r| r.name.as_str())
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join("/");

        let slot = &mut session.slots[index];
        let has_room = (slot.ranges.len() as u32) < session.max_ranges;
        let timed = if depth < levels && has_room {
            let begin = slot.queries_used;
            encoder.write_timestamp(&slot.query_set, begin);
            slot.queries_used += 2;
            slot.ranges.push(RecordedRange {
                path,
                depth,
                begin,
                end: begin + 1,
            });
            Some(slot.ranges.len() - 1)
        } else {
            None
        };

        session.stack.push(OpenRange {
            name: name.to_string(),
            timed,
        });
        Ok(())
    }

    fn pop_range(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), PerfError> {
        let session = self.session("pop_range")?;
        let index = session
            .active
            .ok_or_else(|| PerfError::profiler("pop_range", "no active pass"))?;
        let open = session
            .stack
            .pop()
            .ok_or_else(|| PerfError::profiler("pop_range", "no open range"))?;
        if let Some(range) = open.timed {
            let slot = &session.slots[index];
            encoder.write_timestamp(&slot.query_set, slot.ranges[range].end);
        }
        Ok(())
    }

    fn decode_counters(&mut self) -> Result<DecodeResult, PerfError> {
        let Some(session) = self.session.as_mut() else {
            return Err(PerfError::profiler("decode_counters", "no active session"));
        };

        for slot in session.slots.iter_mut().filter(|s| s.ended && !s.awaiting_submit) {
            if slot.timestamps.is_none() && slot.map_state.is_none() {
                let state = Arc::new(AtomicU8::new(MAP_PENDING));
                let signal = state.clone();
                slot.readback
                    .slice(..)
                    .map_async(wgpu::MapMode::Read, move |result| {
                        let value = if result.is_ok() { MAP_READY } else { MAP_FAILED };
                        signal.store(value, Ordering::Release);
                    });
                slot.map_state = Some(state);
            }
        }

        self.device
            .poll(wgpu::PollType::Poll)
            .map_err(|e| PerfError::profiler("decode_counters", e.to_string()))?;

        for slot in session.slots.iter_mut() {
            let Some(state) = &slot.map_state else { continue };
            match state.load(Ordering::Acquire) {
                MAP_READY => {
                    let used = slot.queries_used as usize;
                    let timestamps = {
                        let view = slot.readback.slice(..).get_mapped_range();
                        view.chunks_exact(8)
                            .take(used)
                            .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                            .collect::<Vec<_>>()
                    };
                    slot.readback.unmap();
                    slot.timestamps = Some(timestamps);
                    slot.map_state = None;
                }
                MAP_FAILED => {
                    return Err(PerfError::profiler("decode_counters", "readback mapping failed"));
                }
                _ => {}
            }
        }

        // Passes ended this frame are submitted after this call returns.
        for slot in session.slots.iter_mut() {
            slot.awaiting_submit = false;
        }

        let num_passes = session.config.map(|c| c.num_passes).unwrap_or(0);
        let decoded = session.slots.iter().filter(|s| s.timestamps.is_some()).count() as u32;
        let all_samples_collected = num_passes > 0 && decoded == num_passes;

        let session = self
            .session
            .as_ref()
            .ok_or_else(|| PerfError::profiler("decode_counters", "no active session"))?;
        let data = if all_samples_collected {
            self.build_counter_data(session)
        } else {
            CounterData::default()
        };
        Ok(DecodeResult {
            all_samples_collected,
            data,
        })
    }

    fn all_passes_submitted(&self) -> bool {
        self.session.as_ref().is_some_and(|s| {
            let ended = s.slots.iter().filter(|slot| slot.ended).count() as u32;
            s.config.is_some_and(|c| ended >= c.num_passes)
        })
    }
}
