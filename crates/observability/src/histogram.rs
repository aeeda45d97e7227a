//! 直方图累加器
//!
//! Fixed-binning 1D histograms and profiles, published as
//! [`HistogramSnapshot`] on the metrics channel.

use serde::{Deserialize, Serialize};

/// Uniform binning over `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub nbins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(nbins: usize, min: f64, max: f64) -> Self {
        Self { nbins, min, max }
    }

    /// Bin index of `x`, `None` for under/overflow
    pub fn bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.min && x < self.max) || self.nbins == 0 {
            return None;
        }
        let width = (self.max - self.min) / self.nbins as f64;
        let bin = ((x - self.min) / width) as usize;
        Some(bin.min(self.nbins - 1))
    }
}

/// Histogram flavour, tells the consumer how to read `contents`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramKind {
    /// Integer counts
    Counts,
    /// Arbitrary values set per bin
    Values,
    /// Per-bin mean of filled values, `bin_weights` holds the sum of weights
    Profile,
}

/// Published state of one histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub name: String,
    pub title: String,
    pub kind: HistogramKind,
    pub axis: Axis,
    pub contents: Vec<f64>,
    pub bin_weights: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
    pub entries: u64,
}

/// 1D histogram
#[derive(Debug, Clone)]
pub struct Histogram1D {
    name: String,
    title: String,
    kind: HistogramKind,
    axis: Axis,
    contents: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
}

impl Histogram1D {
    pub fn new(name: impl Into<String>, title: impl Into<String>, axis: Axis) -> Self {
        Self::with_kind(name, title, axis, HistogramKind::Counts)
    }

    pub fn with_kind(
        name: impl Into<String>,
        title: impl Into<String>,
        axis: Axis,
        kind: HistogramKind,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            kind,
            axis,
            contents: vec![0.0; axis.nbins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        self.entries += 1;
        match self.axis.bin(x) {
            Some(bin) => self.contents[bin] += weight,
            None if x < self.axis.min => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Sum of in-range bin contents
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.underflow = 0.0;
        self.overflow = 0.0;
        self.entries = 0;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            name: self.name.clone(),
            title: self.title.clone(),
            kind: self.kind,
            axis: self.axis,
            contents: self.contents.clone(),
            bin_weights: Vec::new(),
            underflow: self.underflow,
            overflow: self.overflow,
            entries: self.entries,
        }
    }
}

/// 1D profile: weighted mean of `y` per bin of `x`
#[derive(Debug, Clone)]
pub struct Profile1D {
    name: String,
    title: String,
    axis: Axis,
    sum_w: Vec<f64>,
    sum_wy: Vec<f64>,
    entries: u64,
}

impl Profile1D {
    pub fn new(name: impl Into<String>, title: impl Into<String>, axis: Axis) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            axis,
            sum_w: vec![0.0; axis.nbins],
            sum_wy: vec![0.0; axis.nbins],
            entries: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, y: f64, weight: f64) {
        self.entries += 1;
        if let Some(bin) = self.axis.bin(x) {
            self.sum_w[bin] += weight;
            self.sum_wy[bin] += weight * y;
        }
    }

    /// Mean of bin `bin`, 0 when empty
    pub fn mean(&self, bin: usize) -> f64 {
        match (self.sum_w.get(bin), self.sum_wy.get(bin)) {
            (Some(&w), Some(&wy)) if w != 0.0 => wy / w,
            _ => 0.0,
        }
    }

    pub fn bin_weight(&self, bin: usize) -> f64 {
        self.sum_w.get(bin).copied().unwrap_or(0.0)
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn reset(&mut self) {
        self.sum_w.iter_mut().for_each(|c| *c = 0.0);
        self.sum_wy.iter_mut().for_each(|c| *c = 0.0);
        self.entries = 0;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            name: self.name.clone(),
            title: self.title.clone(),
            kind: HistogramKind::Profile,
            axis: self.axis,
            contents: (0..self.axis.nbins).map(|b| self.mean(b)).collect(),
            bin_weights: self.sum_w.clone(),
            underflow: 0.0,
            overflow: 0.0,
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_binning() {
        let axis = Axis::new(2, -0.5, 1.5);
        assert_eq!(axis.bin(0.0), Some(0));
        assert_eq!(axis.bin(1.0), Some(1));
        assert_eq!(axis.bin(1.5), None);
        assert_eq!(axis.bin(-0.6), None);
        assert_eq!(axis.bin(f64::NAN), None);
    }

    #[test]
    fn test_histogram_fill_and_reset() {
        let mut h = Histogram1D::new("MissedTs", "Missed TS", Axis::new(2, -0.5, 1.5));
        h.fill(0.0);
        h.fill(0.0);
        h.fill_weighted(1.0, 3.0);
        h.fill(7.0);

        assert_eq!(h.bin_content(0), 2.0);
        assert_eq!(h.bin_content(1), 3.0);
        assert_eq!(h.integral(), 5.0);
        assert_eq!(h.entries(), 4);
        assert_eq!(h.snapshot().overflow, 1.0);

        h.reset();
        assert_eq!(h.integral(), 0.0);
        assert_eq!(h.entries(), 0);
    }

    #[test]
    fn test_profile_mean() {
        let mut p = Profile1D::new("TsSizeEvo", "", Axis::new(10, 0.0, 10.0));
        p.fill(1.2, 4.0);
        p.fill(1.8, 8.0);
        p.fill_weighted(5.0, 1.0, 3.0);

        assert_eq!(p.mean(1), 6.0);
        assert_eq!(p.mean(5), 1.0);
        assert_eq!(p.bin_weight(5), 3.0);
        assert_eq!(p.mean(9), 0.0);

        let snap = p.snapshot();
        assert_eq!(snap.kind, HistogramKind::Profile);
        assert_eq!(snap.contents[1], 6.0);
    }
}
