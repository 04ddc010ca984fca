//! Unit conversion, baseline tracking and time-axis reconstruction.
//!
//! Raw interferometer readings are converted to nanometers with
//! `nm = (effective - phase) * (wavelength / 2) - correction`, where the
//! effective reading is either the raw value (absolute mode) or the raw value
//! minus the file's first reading (relative mode). Time is rebuilt from the
//! sample counter assuming a constant sampling period.

use crate::config::{CalibrationConfig, ConversionMode};

use super::extractor::RawRecord;

/// Convert an effective raw displacement to nanometers.
#[inline]
pub fn raw_to_nm(effective: f64, calibration: &CalibrationConfig) -> f64 {
    (effective - calibration.phase) * (calibration.wavelength / 2.0) - calibration.correction
}

/// Sampling period in milliseconds for a frequency in Hz.
#[inline]
pub fn sample_period_ms(sample_frequency_hz: f64) -> f64 {
    1000.0 / sample_frequency_hz
}

/// Reference reading of a file, taken from its first record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Baseline {
    pub counter0: Option<u64>,
    pub displacement0: Option<f64>,
}

impl Baseline {
    /// An unset baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `record` if nothing has been captured yet and return the
    /// active reference pair.
    pub fn observe(&mut self, record: &RawRecord) -> (u64, f64) {
        let counter0 = *self.counter0.get_or_insert(record.counter);
        let displacement0 = *self.displacement0.get_or_insert(record.displacement);
        (counter0, displacement0)
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.counter0.is_some() && self.displacement0.is_some()
    }
}

/// One converted point of a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedSample {
    pub time_ms: f64,
    pub displacement_nm: f64,
}

/// Stateful converter for the records of a single file.
///
/// Each file gets its own converter so the baseline never leaks between
/// files.
#[derive(Debug, Clone)]
pub struct SampleConverter {
    mode: ConversionMode,
    calibration: CalibrationConfig,
    period_ms: f64,
    baseline: Baseline,
}

impl SampleConverter {
    pub fn new(mode: ConversionMode, sample_frequency_hz: f64, calibration: CalibrationConfig) -> Self {
        Self {
            mode,
            calibration,
            period_ms: sample_period_ms(sample_frequency_hz),
            baseline: Baseline::new(),
        }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn into_baseline(self) -> Baseline {
        self.baseline
    }

    /// Convert the next record of the file.
    pub fn convert(&mut self, record: &RawRecord) -> CalibratedSample {
        let (counter0, displacement0) = self.baseline.observe(record);

        let effective = match self.mode {
            ConversionMode::Absolute => record.displacement,
            ConversionMode::Relative => record.displacement - displacement0,
        };

        // Counters are not required to be monotonic; a step back gives negative time.
        let elapsed = i128::from(record.counter) - i128::from(counter0);

        CalibratedSample {
            time_ms: elapsed as f64 * self.period_ms,
            displacement_nm: raw_to_nm(effective, &self.calibration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_WAVELENGTH: f64 = 632.991372 / 2.0;

    fn record(displacement: f64, counter: u64) -> RawRecord {
        RawRecord {
            displacement,
            counter,
            line: 0,
        }
    }

    #[test]
    fn test_raw_to_nm_defaults() {
        let cal = CalibrationConfig::default();
        assert_eq!(raw_to_nm(0.0, &cal), 0.0);
        assert!((raw_to_nm(2.0, &cal) - 632.991372).abs() < 1e-9);
        assert!((raw_to_nm(-1.0, &cal) + HALF_WAVELENGTH).abs() < 1e-9);
    }

    #[test]
    fn test_raw_to_nm_with_phase_and_correction() {
        let cal = CalibrationConfig {
            wavelength: 600.0,
            phase: 0.5,
            correction: 10.0,
        };
        // (1.5 - 0.5) * 300 - 10
        assert!((raw_to_nm(1.5, &cal) - 290.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_captured_once() {
        let mut baseline = Baseline::new();
        assert!(!baseline.is_set());

        assert_eq!(baseline.observe(&record(10.0, 5)), (5, 10.0));
        assert_eq!(baseline.observe(&record(20.0, 9)), (5, 10.0));
        assert!(baseline.is_set());
        assert_eq!(baseline.counter0, Some(5));
        assert_eq!(baseline.displacement0, Some(10.0));
    }

    #[test]
    fn test_relative_mode_zeroes_first_sample() {
        let mut converter =
            SampleConverter::new(ConversionMode::Relative, 1000.0, CalibrationConfig::default());
        let first = converter.convert(&record(123.456, 42));
        assert_eq!(first.time_ms, 0.0);
        assert_eq!(first.displacement_nm, 0.0);

        let second = converter.convert(&record(124.456, 43));
        assert_eq!(second.time_ms, 1.0);
        assert!((second.displacement_nm - HALF_WAVELENGTH).abs() < 1e-6);
    }

    #[test]
    fn test_absolute_mode_keeps_raw_value_but_captures_baseline() {
        let mut converter =
            SampleConverter::new(ConversionMode::Absolute, 1000.0, CalibrationConfig::default());
        let first = converter.convert(&record(2.0, 100));
        assert_eq!(first.time_ms, 0.0);
        assert!((first.displacement_nm - 632.991372).abs() < 1e-9);
        assert_eq!(converter.baseline().counter0, Some(100));
        assert_eq!(converter.baseline().displacement0, Some(2.0));
    }

    #[test]
    fn test_time_axis_linearity() {
        let mut converter =
            SampleConverter::new(ConversionMode::Relative, 250.0, CalibrationConfig::default());
        let counters = [1000u64, 1001, 1004, 1010];
        for &n in &counters {
            let sample = converter.convert(&record(0.0, n));
            let expected = (n - 1000) as f64 * 1000.0 / 250.0;
            assert!((sample.time_ms - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_counter_step_back_gives_negative_time() {
        let mut converter =
            SampleConverter::new(ConversionMode::Relative, 1000.0, CalibrationConfig::default());
        converter.convert(&record(0.0, 10));
        let sample = converter.convert(&record(0.0, 7));
        assert_eq!(sample.time_ms, -3.0);
    }
}
