//! Rolling chart window for heart-rate and SpO2 plots.

use std::collections::VecDeque;

use super::reading::Reading;

/// Default number of samples kept for charting (about two minutes of data).
pub const DEFAULT_CHART_CAPACITY: usize = 120;

/// Fixed-capacity display cache of recent samples.
///
/// Kept separately from the session buffer. Pausing only stops this window
/// from accepting samples; ingestion and persistence continue.
#[derive(Debug, Clone)]
pub struct ChartWindow {
    capacity: usize,
    heart_rate: VecDeque<f64>,
    spo2: VecDeque<f64>,
    labels: VecDeque<String>,
    paused: bool,
}

impl Default for ChartWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_CAPACITY)
    }
}

impl ChartWindow {
    /// Create an empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            heart_rate: VecDeque::with_capacity(capacity),
            spo2: VecDeque::with_capacity(capacity),
            labels: VecDeque::with_capacity(capacity),
            paused: false,
        }
    }

    /// Append a reading's values. Returns `false` if the window is paused.
    pub fn push(&mut self, reading: &Reading) -> bool {
        if self.paused {
            return false;
        }

        self.heart_rate.push_back(reading.heart_rate);
        self.spo2.push_back(reading.spo2);
        self.labels.push_back(reading.time_label());

        if self.heart_rate.len() > self.capacity {
            self.heart_rate.pop_front();
            self.spo2.pop_front();
            self.labels.pop_front();
        }
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Flip the paused flag and return the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn len(&self) -> usize {
        self.heart_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn heart_rate(&self) -> &VecDeque<f64> {
        &self.heart_rate
    }

    pub fn spo2(&self) -> &VecDeque<f64> {
        &self.spo2
    }

    pub fn labels(&self) -> &VecDeque<String> {
        &self.labels
    }

    /// Drop all samples. The paused flag is left as is.
    pub fn clear(&mut self) {
        self.heart_rate.clear();
        self.spo2.clear();
        self.labels.clear();
    }

    /// Heart-rate samples as `(index, value)` plot points, skipping non-finite values.
    pub fn heart_rate_points(&self) -> Vec<(f64, f64)> {
        Self::points(&self.heart_rate)
    }

    /// SpO2 samples as `(index, value)` plot points, skipping non-finite values.
    pub fn spo2_points(&self) -> Vec<(f64, f64)> {
        Self::points(&self.spo2)
    }

    fn points(values: &VecDeque<f64>) -> Vec<(f64, f64)> {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (i as f64, *v))
            .collect()
    }
}
