use ndarray::Array2;

use super::error::HistogramError;

/// A fixed-binning 1-D histogram over [x_min, x_max).
///
/// Values outside of the range are not binned, but are tallied in the underflow/overflow counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    pub name: String,
    pub title: String,
    pub bins: Vec<u64>,
    pub range: (f64, f64),
    pub bin_width: f64,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram {
    // Create a new Histogram with specified name, title, number of bins and range
    pub fn new(name: &str, title: &str, number_of_bins: usize, range: (f64, f64)) -> Self {
        Histogram {
            name: name.to_string(),
            title: title.to_string(),
            bins: vec![0; number_of_bins],
            range,
            bin_width: (range.1 - range.0) / number_of_bins as f64,
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, value: f64) {
        match self.get_bin_index(value) {
            Some(index) => self.bins[index] += 1,
            None if value >= self.range.1 => self.overflow += 1,
            // NaN is counted as underflow
            None => self.underflow += 1,
        }
    }

    // Get the bin index for a given x position, None if it falls outside the range
    pub fn get_bin_index(&self, x: f64) -> Option<usize> {
        if !(x >= self.range.0 && x < self.range.1) {
            return None;
        }
        let index = ((x - self.range.0) / self.bin_width) as usize;
        // Guard against rounding at the upper edge
        Some(index.min(self.bins.len() - 1))
    }

    pub fn get_bin_center(&self, index: usize) -> f64 {
        self.range.0 + (index as f64 + 0.5) * self.bin_width
    }

    pub fn get_bin_content(&self, index: usize) -> Option<u64> {
        self.bins.get(index).copied()
    }

    pub fn set_bin_content(&mut self, index: usize, content: u64) {
        if let Some(bin) = self.bins.get_mut(index) {
            *bin = content;
        }
    }

    pub fn set_counts(&mut self, counts: Vec<u64>) -> Result<(), HistogramError> {
        if counts.len() != self.bins.len() {
            return Err(HistogramError::BinCountMismatch(
                self.name.clone(),
                self.bins.len(),
                counts.len(),
            ));
        }
        self.bins = counts;
        Ok(())
    }

    /// Total counts in the visible range (under/overflow excluded)
    pub fn integral(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Total number of fills, including under/overflow
    pub fn entries(&self) -> u64 {
        self.integral() + self.underflow + self.overflow
    }

    /// (bin center, count) pairs of the bins whose centers lie inside [start_x, end_x]
    pub fn get_points_between(&self, start_x: f64, end_x: f64) -> Vec<(f64, f64)> {
        self.bins
            .iter()
            .enumerate()
            .map(|(index, count)| (self.get_bin_center(index), *count as f64))
            .filter(|(center, _)| *center >= start_x && *center <= end_x)
            .collect()
    }

    // Statistics of the histogram within the specified x range: (counts, mean, stdev)
    pub fn get_statistics(&self, start_x: f64, end_x: f64) -> (u64, f64, f64) {
        let points = self.get_points_between(start_x, end_x);
        let total_count: f64 = points.iter().map(|(_, y)| y).sum();
        if total_count == 0.0 {
            return (0, 0.0, 0.0);
        }
        let mean = points.iter().map(|(x, y)| x * y).sum::<f64>() / total_count;
        let variance = points
            .iter()
            .map(|(x, y)| y * (x - mean).powi(2))
            .sum::<f64>()
            / total_count;
        (total_count as u64, mean, variance.sqrt())
    }
}

/// A 2-D histogram with integer channels on x and energy on y, stored densely.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2D {
    pub name: String,
    pub title: String,
    pub counts: Array2<u64>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram2D {
    pub fn new(
        name: &str,
        title: &str,
        bins: (usize, usize),
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            counts: Array2::zeros(bins),
            x_range,
            y_range,
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, x_value: f64, y_value: f64) {
        let (nx, ny) = self.counts.dim();
        if !(x_value >= self.x_range.0) || !(y_value >= self.y_range.0) {
            self.underflow += 1;
        } else if x_value >= self.x_range.1 || y_value >= self.y_range.1 {
            self.overflow += 1;
        } else {
            let x_width = (self.x_range.1 - self.x_range.0) / nx as f64;
            let y_width = (self.y_range.1 - self.y_range.0) / ny as f64;
            let x_index = (((x_value - self.x_range.0) / x_width) as usize).min(nx - 1);
            let y_index = (((y_value - self.y_range.0) / y_width) as usize).min(ny - 1);
            self.counts[[x_index, y_index]] += 1;
        }
    }

    pub fn integral(&self) -> u64 {
        self.counts.sum()
    }
}

/// One histogram per detector channel, indexed by channel number
#[derive(Debug, Clone)]
pub struct ChannelHistograms {
    histograms: Vec<Histogram>,
}

impl ChannelHistograms {
    /// Create `n_channels` histograms named `<prefix>_<channel>`
    pub fn new(
        prefix: &str,
        title: &str,
        n_channels: usize,
        number_of_bins: usize,
        range: (f64, f64),
    ) -> Self {
        let histograms = (0..n_channels)
            .map(|ch| {
                Histogram::new(
                    &format!("{prefix}_{ch}"),
                    &format!("{title} {ch}"),
                    number_of_bins,
                    range,
                )
            })
            .collect();
        Self { histograms }
    }

    pub fn fill(&mut self, channel: usize, value: f64) -> Result<(), HistogramError> {
        let n_channels = self.histograms.len();
        self.histograms
            .get_mut(channel)
            .ok_or(HistogramError::ChannelOutOfRange(channel, n_channels))?
            .fill(value);
        Ok(())
    }

    pub fn get(&self, channel: usize) -> Option<&Histogram> {
        self.histograms.get(channel)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.iter()
    }

    /// Bin-by-bin sum of all channels into a new histogram. Under/overflow are not summed.
    pub fn sum(&self, name: &str, title: &str) -> Option<Histogram> {
        let first = self.histograms.first()?;
        let mut total = Histogram::new(name, title, first.bins.len(), first.range);
        for index in 0..total.bins.len() {
            let content: u64 = self
                .histograms
                .iter()
                .filter_map(|h| h.get_bin_content(index))
                .sum();
            total.set_bin_content(index, content);
        }
        Some(total)
    }
}
