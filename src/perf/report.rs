//! HTML and CSV report files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PerfError;
use crate::perf::{Counter, CounterData, RangeSamples};

pub const PER_RANGE_FILE: &str = "per_range.html";
pub const SUMMARY_FILE: &str = "summary.html";
pub const CSV_FILE: &str = "metrics.csv";
pub const README_FILE: &str = "readme.html";

/// Summary statistics over one range's samples, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeStats {
    pub samples: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

impl RangeStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            samples: samples.len(),
            mean,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            stddev: variance.sqrt(),
        }
    }
}

/// Escapes text for HTML bodies and attributes.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, PerfError> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|source| PerfError::ReportWrite {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean GPU time per frame, the denominator for "% of frame".
fn frame_busy_mean(data: &CounterData) -> f64 {
    mean(&data.frame_busy_ms)
}

fn percent_of_frame(stats: &RangeStats, frame: f64) -> f64 {
    if frame > 0.0 { stats.mean / frame * 100.0 } else { 0.0 }
}

/// The most expensive range directly below the frame level.
///
/// With a single outermost range (the frame-level range) its children are
/// the candidates; otherwise the outermost ranges are.
pub(crate) fn bottleneck(data: &CounterData) -> Option<&RangeSamples> {
    let roots = data.ranges.iter().filter(|r| r.depth == 0).count();
    let level = if roots == 1 && data.ranges.iter().any(|r| r.depth == 1) { 1 } else { 0 };
    data.ranges
        .iter()
        .filter(|r| r.depth == level)
        .max_by(|a, b| {
            let (a, b) = (mean(&a.samples_ms), mean(&b.samples_ms));
            a.total_cmp(&b)
        })
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
th,td{border:1px solid #999;padding:4px 8px;text-align:right}\
th:first-child,td:first-child{text-align:left}";

fn html_header(title: &str, device: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body>\n<h1>{title}</h1>\n<p>Device: {device}</p>\n",
        title = html_escape(title),
        device = html_escape(device),
    )
}

/// Writes `per_range.html`: one row per range path.
pub fn write_per_range_report(dir: &Path, data: &CounterData) -> Result<PathBuf, PerfError> {
    let frame = frame_busy_mean(data);
    let mut html = html_header("Per-range report", &data.device_name);
    let _ = writeln!(html, "<p>Passes: {}</p>", data.passes);
    html.push_str(
        "<table>\n<tr><th>Range</th><th>Samples</th><th>Mean (ms)</th><th>Min (ms)</th>\
         <th>Max (ms)</th><th>Std dev (ms)</th><th>% of frame</th></tr>\n",
    );

    for range in &data.ranges {
        let stats = RangeStats::from_samples(&range.samples_ms);
        let indent = "&nbsp;&nbsp;".repeat(range.depth as usize);
        let _ = writeln!(
            html,
            "<tr><td title=\"{path}\">{indent}{name}</td><td>{}</td><td>{:.4}</td><td>{:.4}</td>\
             <td>{:.4}</td><td>{:.4}</td><td>{:.1}</td></tr>",
            stats.samples,
            stats.mean,
            stats.min,
            stats.max,
            stats.stddev,
            percent_of_frame(&stats, frame),
            path = html_escape(&range.path),
            name = html_escape(range.name()),
        );
    }

    html.push_str("</table>\n</body></html>\n");
    write_file(dir, PER_RANGE_FILE, &html)
}

/// Writes `summary.html`: frame time, busy/idle split and the bottleneck.
pub fn write_summary_report(dir: &Path, data: &CounterData) -> Result<PathBuf, PerfError> {
    let busy = frame_busy_mean(data);
    let frame = if data.frame_interval_ms.is_empty() {
        busy
    } else {
        mean(&data.frame_interval_ms)
    };
    let busy_pct = if frame > 0.0 { (busy / frame * 100.0).min(100.0) } else { 0.0 };
    let bottleneck = bottleneck(data)
        .map(|r| {
            let stats = RangeStats::from_samples(&r.samples_ms);
            format!("{} ({:.3} ms)", r.path, stats.mean)
        })
        .unwrap_or_else(|| "n/a".to_string());

    let mut html = html_header("Summary report", &data.device_name);
    html.push_str("<table>\n<tr><th>Counter</th><th>Value</th></tr>\n");
    let rows = [
        (Counter::FrameTime, format!("{frame:.4} ms")),
        (Counter::GpuBusy, format!("{busy_pct:.1} %")),
        (Counter::GpuIdle, format!("{:.1} %", 100.0 - busy_pct)),
        (Counter::GpuBottleneck, bottleneck),
        (Counter::Ranges, data.ranges.len().to_string()),
    ];
    for (counter, value) in rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            html_escape(counter.name()),
            html_escape(&value)
        );
    }
    html.push_str("</table>\n</body></html>\n");
    write_file(dir, SUMMARY_FILE, &html)
}

/// Path column of the `metrics.csv` row holding whole-frame GPU time. Its
/// depth column is left empty so it never collides with a range.
pub const FRAME_ROW: &str = "<frame>";

const CSV_HEADER: &str = "range,depth,samples,mean_ms,min_ms,max_ms,stddev_ms,percent_of_frame";

fn csv_stats_row(csv: &mut String, path: &str, depth: &str, s: &RangeStats, percent: f64) {
    let _ = writeln!(
        csv,
        "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.3}",
        csv_field(path),
        depth,
        s.samples,
        s.mean,
        s.min,
        s.max,
        s.stddev,
        percent
    );
}

/// Writes `metrics.csv`: a [`FRAME_ROW`] with the frame busy time, then one
/// row per range.
pub fn write_csv(dir: &Path, data: &CounterData) -> Result<PathBuf, PerfError> {
    let frame = frame_busy_mean(data);
    let mut csv = format!("{CSV_HEADER}\n");
    let busy = RangeStats::from_samples(&data.frame_busy_ms);
    csv_stats_row(&mut csv, FRAME_ROW, "", &busy, if busy.samples > 0 { 100.0 } else { 0.0 });
    for range in &data.ranges {
        let s = RangeStats::from_samples(&range.samples_ms);
        csv_stats_row(&mut csv, &range.path, &range.depth.to_string(), &s, percent_of_frame(&s, frame));
    }
    write_file(dir, CSV_FILE, &csv)
}

/// Mean frame GPU time from a `metrics.csv`, read from its [`FRAME_ROW`].
/// `None` when the file is missing or holds no frame samples.
pub fn read_frame_time(dir: &Path) -> Option<f64> {
    let text = fs::read_to_string(dir.join(CSV_FILE)).ok()?;
    text.lines().skip(1).find_map(|line| {
        // Range names may be quoted; the numeric fields never are.
        let fields: Vec<&str> = line.rsplitn(8, ',').collect();
        if fields.len() < 8 || fields[7] != FRAME_ROW || !fields[6].is_empty() {
            return None;
        }
        let samples: usize = fields[5].parse().ok()?;
        let mean: f64 = fields[4].parse().ok()?;
        (samples > 0).then_some(mean)
    })
}

pub fn readme_html() -> String {
    let mut html = html_header("WronskiFog performance report", "see summary.html");
    let _ = writeln!(
        html,
        "<p>Collected with GPU timestamp queries, one profiling pass per sampled frame.</p>\n\
         <ul>\n<li><a href=\"{SUMMARY_FILE}\">{SUMMARY_FILE}</a>: frame time, GPU busy/idle and the most expensive pass.</li>\n\
         <li><a href=\"{PER_RANGE_FILE}\">{PER_RANGE_FILE}</a>: timings for every named range.</li>\n\
         <li><a href=\"{CSV_FILE}\">{CSV_FILE}</a>: frame busy time and the per-range timings as CSV.</li>\n</ul>\n\
         <p>These files appear once every pass has been decoded.</p>\n</body></html>"
    );
    html
}

pub(crate) fn write_readme(dir: &Path) -> Result<PathBuf, PerfError> {
    write_file(dir, README_FILE, &readme_html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wronski-report-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_data() -> CounterData {
        CounterData {
            device_name: "Test <GPU>".to_string(),
            passes: 2,
            ranges: vec![
                RangeSamples {
                    path: "Frame".to_string(),
                    depth: 0,
                    samples_ms: vec![4.0, 6.0],
                },
                RangeSamples {
                    path: "Frame/Fog accumulation".to_string(),
                    depth: 1,
                    samples_ms: vec![1.0, 1.0],
                },
                RangeSamples {
                    path: "Frame/Colour pass".to_string(),
                    depth: 1,
                    samples_ms: vec![2.0, 3.0],
                },
            ],
            frame_busy_ms: vec![4.0, 6.0],
            frame_interval_ms: vec![10.0],
        }
    }

    #[test]
    fn stats_of_samples() {
        let s = RangeStats::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.samples, 4);
        assert_relative_eq!(s.mean, 2.5);
        assert_relative_eq!(s.min, 1.0);
        assert_relative_eq!(s.max, 4.0);
        assert_relative_eq!(s.stddev, 1.25f64.sqrt());
        assert_eq!(RangeStats::from_samples(&[]), RangeStats::default());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a & 'b'>"), "&lt;a &amp; &#39;b&#39;&gt;");
    }

    #[test]
    fn bottleneck_skips_frame_level_range() {
        let data = sample_data();
        assert_eq!(bottleneck(&data).map(|r| r.path.as_str()), Some("Frame/Colour pass"));
    }

    #[test]
    fn csv_round_trips_frame_time() {
        let dir = temp_dir("csv");
        write_csv(&dir, &sample_data()).unwrap();
        let text = fs::read_to_string(dir.join(CSV_FILE)).unwrap();
        assert!(text.starts_with("range,depth,samples"));
        assert_eq!(text.lines().count(), 5);
        assert!(text.lines().nth(1).unwrap().starts_with("<frame>,,2,5.000000"));
        assert_relative_eq!(read_frame_time(&dir).unwrap(), 5.0);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn frame_time_ignores_ranges_without_a_frame_level_range() {
        let dir = temp_dir("no-frame-range");
        let node = |path: &str, ms: f64| RangeSamples {
            path: path.to_string(),
            depth: 0,
            samples_ms: vec![ms, ms],
        };
        let data = CounterData {
            device_name: "Test GPU".to_string(),
            passes: 2,
            ranges: vec![
                node("Shadow moments", 0.1),
                node("Fog scatter", 1.0),
                node("Colour pass", 2.0),
                node("Fog composite", 1.5),
            ],
            frame_busy_ms: vec![5.0, 5.0],
            frame_interval_ms: vec![16.0],
        };
        write_csv(&dir, &data).unwrap();
        assert_relative_eq!(read_frame_time(&dir).unwrap(), 5.0);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn frame_time_is_none_without_frame_samples() {
        let dir = temp_dir("no-frame-samples");
        let mut data = sample_data();
        data.frame_busy_ms.clear();
        write_csv(&dir, &data).unwrap();
        assert_eq!(read_frame_time(&dir), None);
        assert_eq!(read_frame_time(&dir.join("missing")), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn html_reports_are_escaped() {
        let dir = temp_dir("html");
        let data = sample_data();
        let per_range = write_per_range_report(&dir, &data).unwrap();
        let summary = write_summary_report(&dir, &data).unwrap();

        let per_range = fs::read_to_string(per_range).unwrap();
        assert!(per_range.contains("Test &lt;GPU&gt;"));
        assert!(per_range.contains("Fog accumulation"));

        let summary = fs::read_to_string(summary).unwrap();
        assert!(summary.contains("GPU Bottleneck"));
        assert!(summary.contains("Frame/Colour pass"));
        assert!(summary.contains("50.0 %"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn quoted_range_names_survive_csv() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("plain"), "plain");
    }
}
