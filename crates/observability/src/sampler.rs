//! 采样器监控直方图
//!
//! Rate, size and missed-timeslice accumulators of one run, plus the
//! structural description (names, folders, canvas layout) sent once to the
//! histogram server.

use crate::histogram::{Axis, Histogram1D, HistogramKind, HistogramSnapshot, Profile1D};

const MIB: u64 = 1024 * 1024;

/// Time axis of the evolution plots: 1 s bins over 30 min
fn time_axis() -> Axis {
    Axis::new(1800, 0.0, 1800.0)
}

/// Monitoring accumulators of the sampler
#[derive(Debug, Clone)]
pub struct SamplerHistograms {
    suffix: String,
    ts_rate: Histogram1D,
    ts_size: Histogram1D,
    ts_size_evo: Profile1D,
    ts_max_size_evo: Histogram1D,
    missed_ts: Histogram1D,
    missed_ts_evo: Profile1D,

    /// Start time (ns) of the first timeslice seen, never reset
    start_time_ns: Option<u64>,
    /// Start of the current max-size window (s)
    last_max_time: Option<f64>,
    /// Max size within the current window (MB)
    max_size_mb: f64,
}

impl SamplerHistograms {
    pub fn new(suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        let name = |base: &str| format!("{base}{suffix}");

        Self {
            ts_rate: Histogram1D::new(name("TsRate"), "TS rate; t [s]", time_axis()),
            ts_size: Histogram1D::new(
                name("TsSize"),
                "Size of TS; Size [MB]",
                Axis::new(15000, 0.0, 15000.0),
            ),
            ts_size_evo: Profile1D::new(
                name("TsSizeEvo"),
                "Evolution of the TS Size; t [s]; Mean size [MB]",
                time_axis(),
            ),
            ts_max_size_evo: Histogram1D::with_kind(
                name("TsMaxSizeEvo"),
                "Evolution of maximal TS Size; t [s]; Max size [MB]",
                time_axis(),
                HistogramKind::Values,
            ),
            missed_ts: Histogram1D::new(name("MissedTs"), "Missed TS", Axis::new(2, -0.5, 1.5)),
            missed_ts_evo: Profile1D::new(
                name("MissedTsEvo"),
                "Missed TS evolution; t [s]",
                time_axis(),
            ),
            suffix,
            start_time_ns: None,
            last_max_time: None,
            max_size_mb: 0.0,
        }
    }

    /// Size in MB as accumulated per component (integer MB per component)
    pub fn size_mb<I>(component_sizes: I) -> u64
    where
        I: IntoIterator<Item = u64>,
    {
        component_sizes.into_iter().map(|s| s / MIB).sum()
    }

    /// Seconds since the first timeslice of the run
    pub fn time_since_start(&mut self, start_time_ns: Option<u64>) -> f64 {
        match (self.start_time_ns, start_time_ns) {
            (None, Some(t)) => {
                self.start_time_ns = Some(t);
                0.0
            }
            (Some(start), Some(t)) => t.saturating_sub(start) as f64 / 1e9,
            _ => 0.0,
        }
    }

    /// Account one ingested timeslice
    ///
    /// `gap` is the number of indices skipped right before this timeslice.
    pub fn fill_timeslice(&mut self, start_time_ns: Option<u64>, size_mb: u64, gap: u64) {
        let t = self.time_since_start(start_time_ns);
        let size = size_mb as f64;

        self.ts_rate.fill(t);
        self.ts_size.fill(size);
        self.ts_size_evo.fill(t, size);

        // Max size per 1 s window, window closed by the first timeslice past it
        match self.last_max_time {
            None => {
                self.last_max_time = Some(t);
                self.max_size_mb = size;
            }
            Some(last) if t - last >= 1.0 => {
                self.ts_max_size_evo.fill_weighted(last, self.max_size_mb);
                self.last_max_time = Some(t);
                self.max_size_mb = size;
            }
            Some(_) => {
                self.max_size_mb = self.max_size_mb.max(size);
            }
        }

        if gap > 0 {
            self.missed_ts.fill_weighted(1.0, gap as f64);
            self.missed_ts_evo.fill_weighted(t, 1.0, gap as f64);
        }
        self.missed_ts.fill(0.0);
        self.missed_ts_evo.fill(t, 0.0);
    }

    /// Clear accumulated contents; run clock and max-size window are kept
    pub fn reset(&mut self) {
        self.ts_rate.reset();
        self.ts_size.reset();
        self.ts_size_evo.reset();
        self.ts_max_size_evo.reset();
        self.missed_ts.reset();
        self.missed_ts_evo.reset();
    }

    /// Current contents in publication order
    pub fn snapshots(&self) -> Vec<HistogramSnapshot> {
        vec![
            self.ts_rate.snapshot(),
            self.ts_size.snapshot(),
            self.ts_size_evo.snapshot(),
            self.ts_max_size_evo.snapshot(),
            self.missed_ts.snapshot(),
            self.missed_ts_evo.snapshot(),
        ]
    }

    /// `(histogram name, folder)` pairs
    pub fn descriptors(&self) -> Vec<(String, String)> {
        let folder = format!("Sampler{}", self.suffix);
        [
            self.ts_rate.name(),
            self.ts_size.name(),
            self.ts_size_evo.name(),
            self.ts_max_size_evo.name(),
            self.missed_ts.name(),
            self.missed_ts_evo.name(),
        ]
        .into_iter()
        .map(|name| (name.to_string(), folder.clone()))
        .collect()
    }

    /// `(canvas name, configuration)` pairs
    ///
    /// Configuration: `name;title;padsX;padsY;` then per pad
    /// `gridX,gridY,logX,logY,logZ,(histo,drawOption);`.
    pub fn canvases(&self) -> Vec<(String, String)> {
        let name = format!("cSampSummary{}", self.suffix);
        let pads = [
            ("1,1,0,0,0", self.ts_rate.name(), "hist"),
            ("1,1,1,1,0", self.ts_size.name(), "hist"),
            ("1,1,0,0,0", self.ts_size_evo.name(), "hist"),
            ("1,1,0,0,0", self.ts_max_size_evo.name(), "hist"),
            ("1,1,0,0,0", self.missed_ts.name(), "hist"),
            ("1,1,0,0,0", self.missed_ts_evo.name(), "el"),
        ];

        let mut config = format!("{name};Sampler monitoring plots;2;3;");
        for (flags, histo, option) in pads {
            config.push_str(&format!("{flags},({histo},{option});"));
        }
        vec![(name, config)]
    }

    /// Folder of the canvases
    pub fn canvas_folder(&self) -> String {
        format!("canvases{}", self.suffix)
    }
}
