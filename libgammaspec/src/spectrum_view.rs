use super::constants::*;
use super::error::SpectrumViewError;
use super::histogram::Histogram;
use super::histogram_file::HistogramFile;

pub const X_LABEL: &str = "Energy (keV)";

/// One spectrum of the viewer, restricted to the display range
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumPanel {
    pub histogram_name: String,
    pub legend: String,
    /// (bin center, counts) of the bins inside the display range
    pub points: Vec<[f64; 2]>,
    pub counts: u64,
    pub mean: f64,
    pub stdev: f64,
}

impl SpectrumPanel {
    pub fn from_histogram(
        histo: &Histogram,
        legend: &str,
        range: (f64, f64),
    ) -> Result<Self, SpectrumViewError> {
        if !(range.0 < range.1) || range.1 <= histo.range.0 || range.0 >= histo.range.1 {
            return Err(SpectrumViewError::BadRange(
                range.0,
                range.1,
                histo.range.0,
                histo.range.1,
            ));
        }
        let (counts, mean, stdev) = histo.get_statistics(range.0, range.1);
        Ok(Self {
            histogram_name: histo.name.clone(),
            legend: legend.to_string(),
            points: histo
                .get_points_between(range.0, range.1)
                .into_iter()
                .map(|(x, y)| [x, y])
                .collect(),
            counts,
            mean,
            stdev,
        })
    }

    /// Largest bin content shown in the panel
    pub fn max_counts(&self) -> f64 {
        self.points.iter().map(|p| p[1]).fold(0.0, f64::max)
    }
}

/// Two calibrated spectra displayed side by side.
///
/// Everything needed to draw the plots is computed here; the front ends only render it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumView {
    pub panels: [SpectrumPanel; 2],
    pub range: (f64, f64),
    pub x_label: String,
    pub y_label: String,
    pub annotation: String,
}

impl SpectrumView {
    /// Load the calibrated histograms of two channels from the histogram file
    pub fn load(
        file: &HistogramFile,
        channels: [usize; 2],
        range: (f64, f64),
        annotation: &str,
    ) -> Result<Self, SpectrumViewError> {
        let first = file.read_histogram(&channel_histo_name(CAL_HISTO_PREFIX, channels[0]))?;
        let second = file.read_histogram(&channel_histo_name(CAL_HISTO_PREFIX, channels[1]))?;
        let view = Self {
            panels: [
                SpectrumPanel::from_histogram(&first, &format!("Crystal {}", channels[0]), range)?,
                SpectrumPanel::from_histogram(&second, &format!("Crystal {}", channels[1]), range)?,
            ],
            range,
            x_label: String::from(X_LABEL),
            y_label: format!("Counts / {} keV", first.bin_width),
            annotation: annotation.to_string(),
        };
        spdlog::info!(
            "Loaded {} and {} for viewing in [{}, {}] keV.",
            first.name,
            second.name,
            range.0,
            range.1
        );
        Ok(view)
    }
}
