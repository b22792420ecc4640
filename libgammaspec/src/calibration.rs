use serde::{Deserialize, Serialize};
use std::path::Path;

use super::calibration_windows::{CalibrationWindow, CalibrationWindows};
use super::constants::*;
use super::error::{CalibrationError, FitError, HistogramError, HistogramFileError};
use super::event::Event;
use super::gaussian_fit::{fit_histogram, GaussianFit};
use super::histogram::{ChannelHistograms, Histogram, Histogram2D};
use super::histogram_file::HistogramFile;

/// Linear raw-to-keV map of a single channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationParams {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Derive the line through (x1, reference[0]) and (x2, reference[1])
    pub fn from_peaks(x1: f64, x2: f64, reference: [f64; 2]) -> Result<Self, FitError> {
        if x1 == x2 {
            return Err(FitError::DegeneratePeaks(x1));
        }
        let slope = (reference[1] - reference[0]) / (x2 - x1);
        let intercept = reference[0] - slope * x1;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(FitError::NonFinite);
        }
        Ok(Self { slope, intercept })
    }

    pub fn calibrate(&self, raw: f64) -> f64 {
        raw * self.slope + self.intercept
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Calibrated,
    #[default]
    NoWindow,
    FitFailed(String),
}

/// The two peak fits a calibration was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakFits {
    pub low: GaussianFit,
    pub high: GaussianFit,
}

/// Outcome of calibrating one channel.
///
/// Channels that are not calibrated (no window, or a failed fit) keep zeroed parameters,
/// so all of their hits land at 0 keV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    pub channel: usize,
    pub status: CalibrationStatus,
    pub params: CalibrationParams,
    pub peaks: Option<PeakFits>,
}

impl ChannelCalibration {
    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    /// Fitted positions (x1, x2) of the two peaks in raw units
    pub fn peak_positions(&self) -> Option<(f64, f64)> {
        self.peaks
            .as_ref()
            .map(|p| (p.low.mean.value, p.high.mean.value))
    }
}

/// Fit the two peaks of a raw histogram and derive the channel's calibration.
///
/// Fit problems never fail the stage; they are logged and reported through the status.
pub fn calibrate_channel(
    channel: usize,
    histo: &Histogram,
    window: Option<&CalibrationWindow>,
    reference: [f64; 2],
) -> ChannelCalibration {
    let mut result = ChannelCalibration {
        channel,
        ..Default::default()
    };
    let Some(window) = window else {
        return result;
    };

    match fit_peaks(histo, window).and_then(|peaks| {
        let params =
            CalibrationParams::from_peaks(peaks.low.mean.value, peaks.high.mean.value, reference)?;
        Ok((peaks, params))
    }) {
        Ok((peaks, params)) => {
            result.status = CalibrationStatus::Calibrated;
            result.params = params;
            result.peaks = Some(peaks);
        }
        Err(e) => {
            spdlog::warn!("Calibration of channel {} failed: {}", channel, e);
            result.status = CalibrationStatus::FitFailed(e.to_string());
        }
    }
    result
}

fn fit_peaks(histo: &Histogram, window: &CalibrationWindow) -> Result<PeakFits, FitError> {
    Ok(PeakFits {
        low: fit_peak(histo, window.low_peak)?,
        high: fit_peak(histo, window.high_peak)?,
    })
}

/// A peak is only usable when the fit converged to a width that fits in its window
fn fit_peak(histo: &Histogram, range: (f64, f64)) -> Result<GaussianFit, FitError> {
    let fit = fit_histogram(histo, range)?;
    let width = range.1 - range.0;
    if !(fit.sigma.value > 0.0 && fit.sigma.value <= width) {
        return Err(FitError::UnphysicalWidth(fit.sigma.value, width));
    }
    if !fit.converged {
        return Err(FitError::NotConverged);
    }
    Ok(fit)
}

/// The calibration of every channel, indexed by channel number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub reference_energies: [f64; 2],
    pub channels: Vec<ChannelCalibration>,
}

impl CalibrationTable {
    /// Calibrate all channels from the raw histograms stored in the histogram file
    pub fn from_histogram_file(
        file: &HistogramFile,
        windows: &CalibrationWindows,
        reference: [f64; 2],
    ) -> Result<Self, HistogramFileError> {
        let mut channels = Vec::with_capacity(windows.get_n_channels());
        for channel in 0..windows.get_n_channels() {
            let window = windows.get_window(channel);
            if window.is_none() {
                channels.push(calibrate_channel(channel, &Histogram::default(), None, reference));
                continue;
            }
            let histo = file.read_histogram(&channel_histo_name(RAW_HISTO_PREFIX, channel))?;
            channels.push(calibrate_channel(channel, &histo, window, reference));
        }
        Ok(Self {
            reference_energies: reference,
            channels,
        })
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelCalibration> {
        self.channels.get(channel)
    }

    /// Calibrated energy of a hit, None if the channel is unknown
    pub fn calibrate(&self, channel: usize, raw: f64) -> Option<f64> {
        self.channels
            .get(channel)
            .map(|c| c.params.calibrate(raw))
    }

    pub fn n_calibrated(&self) -> usize {
        self.channels.iter().filter(|c| c.is_calibrated()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c.status, CalibrationStatus::FitFailed(_)))
            .count()
    }

    /// Write the table as a yaml report
    pub fn write_report(&self, path: &Path) -> Result<(), CalibrationError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    pub fn read_report(path: &Path) -> Result<Self, CalibrationError> {
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml_str)?)
    }
}

/// The histograms filled in the calibrated pass over the events
#[derive(Debug, Clone)]
pub struct CalibratedHistograms {
    pub calibrated: ChannelHistograms,
    pub mult1: ChannelHistograms,
    pub summary: Histogram2D,
    mult1_threshold: f64,
}

impl CalibratedHistograms {
    pub fn new(
        n_channels: usize,
        n_bins: usize,
        range: (f64, f64),
        mult1_threshold: f64,
    ) -> Self {
        Self {
            calibrated: ChannelHistograms::new(
                CAL_HISTO_PREFIX,
                "Calibrated energy of crystal",
                n_channels,
                n_bins,
                range,
            ),
            mult1: ChannelHistograms::new(
                CAL_MULT1_HISTO_PREFIX,
                "Calibrated multiplicity 1 energy of crystal",
                n_channels,
                n_bins,
                range,
            ),
            summary: Histogram2D::new(
                CAL_SUMMARY_NAME,
                "Calibrated energy vs. crystal",
                (n_channels, n_bins),
                (0.0, n_channels as f64),
                range,
            ),
            mult1_threshold,
        }
    }

    /// Calibrate every hit of the event and fill the histograms
    pub fn fill_event(
        &mut self,
        event: &Event,
        table: &CalibrationTable,
    ) -> Result<(), HistogramError> {
        let is_mult1 = event.multiplicity() == 1;
        for (channel, raw) in event.hits() {
            let energy = table
                .calibrate(channel, raw)
                .ok_or(HistogramError::ChannelOutOfRange(channel, table.channels.len()))?;
            self.calibrated.fill(channel, energy)?;
            self.summary.fill(channel as f64, energy);
            if is_mult1 && energy > self.mult1_threshold {
                self.mult1.fill(channel, energy)?;
            }
        }
        Ok(())
    }

    /// Bin-by-bin sum of the per-channel calibrated spectra
    pub fn sum(&self) -> Option<Histogram> {
        self.calibrated
            .sum(CAL_SUM_NAME, "Calibrated energy, sum of all crystals")
    }

    /// Write all calibrated histograms, including the sum, to the histogram file
    pub fn write(&self, file: &HistogramFile) -> Result<(), HistogramFileError> {
        file.write_channel_histograms(&self.calibrated)?;
        file.write_channel_histograms(&self.mult1)?;
        file.write_histogram_2d(&self.summary)?;
        if let Some(sum) = self.sum() {
            file.write_histogram(&sum)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const REFERENCE: [f64; 2] = [CO60_LOW_LINE, CO60_HIGH_LINE];

    fn add_peak(histo: &mut Histogram, amplitude: f64, mean: f64, sigma: f64) {
        for index in 0..histo.bins.len() {
            let x = histo.get_bin_center(index);
            let content = (amplitude * (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()).round();
            histo.bins[index] += content as u64;
        }
    }

    fn two_peak_histogram() -> Histogram {
        let mut histo = Histogram::new("h_raw_0", "raw", 20000, (0.0, 20000.0));
        add_peak(&mut histo, 800.0, 1827.5, 2.5);
        add_peak(&mut histo, 700.0, 2077.5, 2.7);
        histo
    }

    #[test]
    fn test_params_are_linear() {
        let params = CalibrationParams::from_peaks(1827.5, 2077.5, REFERENCE).unwrap();
        assert!((params.calibrate(1827.5) - 1173.2).abs() < 1e-9);
        assert!((params.calibrate(2077.5) - 1332.5).abs() < 1e-9);
        let midpoint = params.calibrate((1827.5 + 2077.5) / 2.0);
        assert!((midpoint - (1173.2 + 1332.5) / 2.0).abs() < 1e-9);
        assert_eq!(
            CalibrationParams::from_peaks(1900.0, 1900.0, REFERENCE),
            Err(FitError::DegeneratePeaks(1900.0))
        );
    }

    #[test]
    fn test_calibrate_channel() {
        let histo = two_peak_histogram();
        let window = CalibrationWindow::new((1815.0, 1840.0), (2065.0, 2090.0));
        let result = calibrate_channel(0, &histo, Some(&window), REFERENCE);
        assert!(result.is_calibrated());
        let (x1, x2) = result.peak_positions().unwrap();
        assert!((x1 - 1827.5).abs() < 0.05, "x1 {x1}");
        assert!((x2 - 2077.5).abs() < 0.05, "x2 {x2}");
        assert!((result.params.calibrate(x1) - 1173.2).abs() < 1e-6);
        assert!((result.params.calibrate(x2) - 1332.5).abs() < 1e-6);
    }

    #[test]
    fn test_uncalibrated_channels_are_zeroed() {
        let histo = two_peak_histogram();
        let no_window = calibrate_channel(3, &histo, None, REFERENCE);
        assert_eq!(no_window.status, CalibrationStatus::NoWindow);
        assert_eq!(no_window.params, CalibrationParams::new(0.0, 0.0));
        assert_eq!(no_window.params.calibrate(1827.5), 0.0);

        let empty = Histogram::new("h_raw_1", "raw", 20000, (0.0, 20000.0));
        let window = CalibrationWindow::new((1815.0, 1840.0), (2065.0, 2090.0));
        let failed = calibrate_channel(1, &empty, Some(&window), REFERENCE);
        assert!(matches!(failed.status, CalibrationStatus::FitFailed(_)));
        assert_eq!(failed.params, CalibrationParams::default());
        assert!(failed.peaks.is_none());
    }

    #[test]
    fn test_flat_window_fails_calibration() {
        let mut histo = two_peak_histogram();
        for index in 40..46 {
            histo.bins[index] = 1;
        }
        let window = CalibrationWindow::new((40.0, 46.0), (2065.0, 2090.0));
        let result = calibrate_channel(0, &histo, Some(&window), REFERENCE);
        assert!(
            matches!(result.status, CalibrationStatus::FitFailed(_)),
            "status {:?}",
            result.status
        );
        assert_eq!(result.params, CalibrationParams::default());
        assert!(result.peaks.is_none());
    }

    #[test]
    fn test_mult1_gate() {
        let table = CalibrationTable {
            reference_energies: REFERENCE,
            channels: vec![
                ChannelCalibration {
                    channel: 0,
                    status: CalibrationStatus::Calibrated,
                    params: CalibrationParams::new(1.0, 0.0),
                    peaks: None,
                },
                ChannelCalibration {
                    channel: 1,
                    status: CalibrationStatus::Calibrated,
                    params: CalibrationParams::new(0.5, 10.0),
                    peaks: None,
                },
            ],
        };
        let mut histos = CalibratedHistograms::new(2, 2000, (0.0, 2000.0), 300.0);
        histos
            .fill_event(&Event::from_parts(vec![0], vec![1173.6]), &table)
            .unwrap();
        histos
            .fill_event(&Event::from_parts(vec![0], vec![250.0]), &table)
            .unwrap();
        histos
            .fill_event(&Event::from_parts(vec![0, 1], vec![500.0, 1000.0]), &table)
            .unwrap();
        assert!(histos
            .fill_event(&Event::from_parts(vec![2], vec![500.0]), &table)
            .is_err());

        let cal_0 = histos.calibrated.get(0).unwrap();
        assert_eq!(cal_0.integral(), 3);
        assert_eq!(histos.calibrated.get(1).unwrap().bins[510], 1);

        let mult1_0 = histos.mult1.get(0).unwrap();
        assert_eq!(mult1_0.integral(), 1);
        assert_eq!(mult1_0.bins[1173], 1);
        assert_eq!(histos.mult1.get(1).unwrap().integral(), 0);

        assert_eq!(histos.summary.integral(), 4);
        let sum = histos.sum().unwrap();
        assert_eq!(sum.name, CAL_SUM_NAME);
        assert_eq!(sum.integral(), 4);
    }

    #[test]
    fn test_report_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("histos_calibration.yml");
        let window = CalibrationWindow::new((1815.0, 1840.0), (2065.0, 2090.0));
        let table = CalibrationTable {
            reference_energies: REFERENCE,
            channels: vec![
                calibrate_channel(0, &two_peak_histogram(), Some(&window), REFERENCE),
                calibrate_channel(1, &Histogram::default(), None, REFERENCE),
                ChannelCalibration {
                    channel: 2,
                    status: CalibrationStatus::FitFailed(String::from("too few points")),
                    ..Default::default()
                },
            ],
        };
        assert_eq!(table.n_calibrated(), 1);
        assert_eq!(table.n_failed(), 1);

        table.write_report(&path).unwrap();
        let read_back = CalibrationTable::read_report(&path).unwrap();
        assert_eq!(read_back.channels.len(), 3);
        assert_eq!(read_back.channels[1].status, CalibrationStatus::NoWindow);
        assert_eq!(read_back.channels[2].status, table.channels[2].status);
        let (x1, _) = read_back.channels[0].peak_positions().unwrap();
        assert!((x1 - 1827.5).abs() < 0.05);
    }
}
