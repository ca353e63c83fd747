/// Counters a timestamp backend can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    FrameTime,
    GpuBusy,
    GpuIdle,
    GpuBottleneck,
    Ranges,
}

/// Whether a counter is a single report-wide metric or a per-range statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterKind {
    Metric,
    RangeStatistic,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::FrameTime,
        Counter::GpuBusy,
        Counter::GpuIdle,
        Counter::GpuBottleneck,
        Counter::Ranges,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::FrameTime => "frame time",
            Counter::GpuBusy => "gpu_busy",
            Counter::GpuIdle => "gpu_idle",
            Counter::GpuBottleneck => "GPU Bottleneck",
            Counter::Ranges => "ranges",
        }
    }

    pub fn kind(self) -> CounterKind {
        match self {
            Counter::Ranges => CounterKind::RangeStatistic,
            _ => CounterKind::Metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Counter::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Counter::ALL.len());
    }

    #[test]
    fn only_ranges_is_per_range() {
        let per_range: Vec<_> = Counter::ALL
            .into_iter()
            .filter(|c| c.kind() == CounterKind::RangeStatistic)
            .collect();
        assert_eq!(per_range, vec![Counter::Ranges]);
    }
}
