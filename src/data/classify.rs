//! Health-band and trend classification for readings.
//!
//! Pure functions over reading values plus a small [`Classifier`] that
//! remembers the previous reading for trend direction.

use serde::{Deserialize, Serialize};

use super::reading::Reading;

/// Thresholds for band and trend computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Lowest heart rate in the Normal band (inclusive).
    pub heart_rate_normal_min: f64,
    /// Highest heart rate in the Normal band (inclusive).
    pub heart_rate_normal_max: f64,
    /// Highest heart rate in the Elevated band (inclusive).
    pub heart_rate_elevated_max: f64,
    /// Lowest SpO2 in the Normal band (inclusive).
    pub spo2_normal_min: f64,
    /// Lowest SpO2 in the Low band (inclusive). Anything below is Critical.
    pub spo2_low_min: f64,
    /// Heart-rate change needed to report an up/down trend.
    pub heart_rate_trend_delta: f64,
    /// SpO2 change needed to report an up/down trend.
    pub spo2_trend_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            heart_rate_normal_min: 60.0,
            heart_rate_normal_max: 100.0,
            heart_rate_elevated_max: 120.0,
            spo2_normal_min: 95.0,
            spo2_low_min: 90.0,
            heart_rate_trend_delta: 2.0,
            spo2_trend_delta: 1.0,
        }
    }
}

/// Severity shared by every band, used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }
}

/// Heart-rate band.
///
/// Anything that is neither Normal nor Elevated is High, including rates
/// below the Normal minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartRateBand {
    Normal,
    Elevated,
    High,
}

impl HeartRateBand {
    pub fn label(&self) -> &'static str {
        match self {
            HeartRateBand::Normal => "Normal",
            HeartRateBand::Elevated => "Elevated",
            HeartRateBand::High => "High",
        }
    }

    pub fn status(&self) -> HealthStatus {
        match self {
            HeartRateBand::Normal => HealthStatus::Healthy,
            HeartRateBand::Elevated => HealthStatus::Warning,
            HeartRateBand::High => HealthStatus::Critical,
        }
    }
}

/// SpO2 band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spo2Band {
    Normal,
    Low,
    Critical,
}

impl Spo2Band {
    pub fn label(&self) -> &'static str {
        match self {
            Spo2Band::Normal => "Normal",
            Spo2Band::Low => "Low",
            Spo2Band::Critical => "Critical",
        }
    }

    pub fn status(&self) -> HealthStatus {
        match self {
            Spo2Band::Normal => HealthStatus::Healthy,
            Spo2Band::Low => HealthStatus::Warning,
            Spo2Band::Critical => HealthStatus::Critical,
        }
    }
}

/// Direction of change between two consecutive readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

/// Classified posture label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Good,
    Bad,
    Fall,
    /// Any label outside the known set. Not an error.
    Unknown,
}

impl Posture {
    /// Case-insensitive exact match against GOOD, BAD and FALL.
    pub fn classify(label: &str) -> Self {
        if label.eq_ignore_ascii_case("GOOD") {
            Posture::Good
        } else if label.eq_ignore_ascii_case("BAD") {
            Posture::Bad
        } else if label.eq_ignore_ascii_case("FALL") {
            Posture::Fall
        } else {
            Posture::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Posture::Good => "Good",
            Posture::Bad => "Bad",
            Posture::Fall => "Fall",
            Posture::Unknown => "Unknown",
        }
    }

    /// Severity, or `None` for unrecognized labels.
    pub fn status(&self) -> Option<HealthStatus> {
        match self {
            Posture::Good => Some(HealthStatus::Healthy),
            Posture::Bad => Some(HealthStatus::Warning),
            Posture::Fall => Some(HealthStatus::Critical),
            Posture::Unknown => None,
        }
    }
}

/// Classify a heart rate (beats per minute).
pub fn classify_heart_rate(bpm: f64, thresholds: &Thresholds) -> HeartRateBand {
    if bpm >= thresholds.heart_rate_normal_min && bpm <= thresholds.heart_rate_normal_max {
        HeartRateBand::Normal
    } else if bpm > thresholds.heart_rate_normal_max && bpm <= thresholds.heart_rate_elevated_max {
        HeartRateBand::Elevated
    } else {
        HeartRateBand::High
    }
}

/// Classify an SpO2 percentage.
pub fn classify_spo2(percent: f64, thresholds: &Thresholds) -> Spo2Band {
    if percent >= thresholds.spo2_normal_min {
        Spo2Band::Normal
    } else if percent >= thresholds.spo2_low_min {
        Spo2Band::Low
    } else {
        Spo2Band::Critical
    }
}

/// Trend between `previous` and `current`; `None` without a finite previous value.
pub fn trend(current: f64, previous: Option<f64>, delta: f64) -> Option<Trend> {
    let previous = previous?;
    if !current.is_finite() || !previous.is_finite() {
        return None;
    }
    let change = current - previous;
    Some(if change > delta {
        Trend::Up
    } else if change < -delta {
        Trend::Down
    } else {
        Trend::Stable
    })
}

/// Everything the presentation layer needs to colour one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub heart_rate: HeartRateBand,
    pub spo2: Spo2Band,
    pub heart_rate_trend: Option<Trend>,
    pub spo2_trend: Option<Trend>,
    pub posture: Posture,
    pub finger_detected: bool,
    /// Raises a standing alert until the user dismisses it.
    pub fall_detected: bool,
}

impl Assessment {
    /// Worst severity across heart rate, SpO2, posture and fall flag.
    pub fn overall(&self) -> HealthStatus {
        let fall = if self.fall_detected {
            HealthStatus::Critical
        } else {
            HealthStatus::Healthy
        };
        self.heart_rate
            .status()
            .max(self.spo2.status())
            .max(self.posture.status().unwrap_or(HealthStatus::Healthy))
            .max(fall)
    }
}

/// Stateful classifier remembering the previous accepted values for trends.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    thresholds: Thresholds,
    previous: Option<(f64, f64)>,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            previous: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classify a reading and remember it as the previous value.
    pub fn assess(&mut self, reading: &Reading) -> Assessment {
        let previous_hr = self.previous.map(|(hr, _)| hr);
        let previous_spo2 = self.previous.map(|(_, spo2)| spo2);

        let assessment = Assessment {
            heart_rate: classify_heart_rate(reading.heart_rate, &self.thresholds),
            spo2: classify_spo2(reading.spo2, &self.thresholds),
            heart_rate_trend: trend(
                reading.heart_rate,
                previous_hr,
                self.thresholds.heart_rate_trend_delta,
            ),
            spo2_trend: trend(reading.spo2, previous_spo2, self.thresholds.spo2_trend_delta),
            posture: Posture::classify(&reading.posture_status),
            finger_detected: reading.finger_detected,
            fall_detected: reading.fall_detected,
        };

        self.previous = Some((reading.heart_rate, reading.spo2));
        assessment
    }

    /// Forget the previous reading so the next trend is undefined again.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(hr: f64, spo2: f64) -> Reading {
        Reading {
            timestamp: 0,
            heart_rate: hr,
            spo2,
            squat_count: 0.0,
            posture_status: "GOOD".to_string(),
            finger_detected: true,
            fall_detected: false,
        }
    }

    #[test]
    fn heart_rate_bands() {
        let t = Thresholds::default();
        assert_eq!(classify_heart_rate(60.0, &t), HeartRateBand::Normal);
        assert_eq!(classify_heart_rate(100.0, &t), HeartRateBand::Normal);
        assert_eq!(classify_heart_rate(101.0, &t), HeartRateBand::Elevated);
        assert_eq!(classify_heart_rate(120.0, &t), HeartRateBand::Elevated);
        assert_eq!(classify_heart_rate(121.0, &t), HeartRateBand::High);
    }

    #[test]
    fn heart_rate_below_normal_is_high() {
        let t = Thresholds::default();
        assert_eq!(classify_heart_rate(59.0, &t), HeartRateBand::High);
        assert_eq!(classify_heart_rate(0.0, &t), HeartRateBand::High);
    }

    #[test]
    fn non_finite_heart_rate_is_high() {
        let t = Thresholds::default();
        assert_eq!(classify_heart_rate(f64::NAN, &t), HeartRateBand::High);
    }

    #[test]
    fn spo2_bands() {
        let t = Thresholds::default();
        assert_eq!(classify_spo2(100.0, &t), Spo2Band::Normal);
        assert_eq!(classify_spo2(95.0, &t), Spo2Band::Normal);
        assert_eq!(classify_spo2(94.0, &t), Spo2Band::Low);
        assert_eq!(classify_spo2(90.0, &t), Spo2Band::Low);
        assert_eq!(classify_spo2(89.0, &t), Spo2Band::Critical);
    }

    #[test]
    fn trend_uses_strict_delta() {
        assert_eq!(trend(75.0, Some(72.0), 2.0), Some(Trend::Up));
        assert_eq!(trend(74.0, Some(72.0), 2.0), Some(Trend::Stable));
        assert_eq!(trend(70.0, Some(72.0), 2.0), Some(Trend::Stable));
        assert_eq!(trend(69.0, Some(72.0), 2.0), Some(Trend::Down));
        assert_eq!(trend(72.0, None, 2.0), None);
        assert_eq!(trend(72.0, Some(f64::NAN), 2.0), None);
    }

    #[test]
    fn posture_matching_is_case_insensitive_and_exact() {
        assert_eq!(Posture::classify("GOOD"), Posture::Good);
        assert_eq!(Posture::classify("good"), Posture::Good);
        assert_eq!(Posture::classify("Bad"), Posture::Bad);
        assert_eq!(Posture::classify("fall"), Posture::Fall);
        assert_eq!(Posture::classify("GOODISH"), Posture::Unknown);
        assert_eq!(Posture::classify(" GOOD"), Posture::Unknown);
        assert_eq!(Posture::classify(""), Posture::Unknown);
    }

    #[test]
    fn first_reading_has_no_trend() {
        let mut c = Classifier::default();
        let a = c.assess(&reading(100.0, 97.0));
        assert_eq!(a.heart_rate, HeartRateBand::Normal);
        assert!(a.heart_rate_trend.is_none());
        assert!(a.spo2_trend.is_none());
    }

    #[test]
    fn second_reading_reports_trends() {
        let mut c = Classifier::default();
        c.assess(&reading(80.0, 97.0));
        let a = c.assess(&reading(85.0, 95.5));
        assert_eq!(a.heart_rate_trend, Some(Trend::Up));
        assert_eq!(a.spo2_trend, Some(Trend::Down));

        let a = c.assess(&reading(86.0, 96.0));
        assert_eq!(a.heart_rate_trend, Some(Trend::Stable));
        assert_eq!(a.spo2_trend, Some(Trend::Stable));
    }

    #[test]
    fn reset_clears_trend_history() {
        let mut c = Classifier::default();
        c.assess(&reading(80.0, 97.0));
        c.reset();
        assert!(c.assess(&reading(90.0, 97.0)).heart_rate_trend.is_none());
    }

    #[test]
    fn overall_status_is_worst_component() {
        let mut c = Classifier::default();
        let mut r = reading(72.0, 98.0);
        assert_eq!(c.assess(&r).overall(), HealthStatus::Healthy);

        r.spo2 = 92.0;
        assert_eq!(c.assess(&r).overall(), HealthStatus::Warning);

        r.fall_detected = true;
        assert_eq!(c.assess(&r).overall(), HealthStatus::Critical);
    }

    #[test]
    fn health_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Warning);
        assert!(HealthStatus::Warning < HealthStatus::Critical);
        assert_eq!(HealthStatus::Critical.symbol(), "CRIT");
    }
}
