// Defaults of the 60Co calibration run. All of these can be overridden through the Config.

/// Number of HPGe crystals in the array
pub const DEFAULT_N_CHANNELS: usize = 47;
/// Maximum timestamp gap between consecutive hits of the same event
pub const DEFAULT_COINCIDENCE_WINDOW: i64 = 1000;

/// Energy axis of every 1-D spectrum: 1 keV (or 1 raw unit) per bin
pub const DEFAULT_N_BINS: usize = 20_000;
pub const DEFAULT_ENERGY_MIN: f64 = 0.0;
pub const DEFAULT_ENERGY_MAX: f64 = 20_000.0;

/// The two gamma lines of 60Co in keV
pub const CO60_LOW_LINE: f64 = 1173.2;
pub const CO60_HIGH_LINE: f64 = 1332.5;

/// Calibrated energy a multiplicity-1 hit must exceed to enter the h_cal_mult1 spectra
pub const DEFAULT_MULT1_THRESHOLD: f64 = 300.0;

/// Viewer defaults
pub const DEFAULT_VIEW_CHANNELS: [usize; 2] = [0, 1];
pub const DEFAULT_VIEW_RANGE: (f64, f64) = (1000.0, 1500.0);
pub const DEFAULT_VIEW_ANNOTATION: &str = "60Co calibration run";

/// Records (or events) between two progress reports
pub const PROGRESS_INTERVAL: u64 = 100_000;

// Histogram names in the histogram file
pub const RAW_HISTO_PREFIX: &str = "h_raw";
pub const CAL_HISTO_PREFIX: &str = "h_cal";
pub const CAL_MULT1_HISTO_PREFIX: &str = "h_cal_mult1";
pub const RAW_SUMMARY_NAME: &str = "h_raw_summary";
pub const CAL_SUMMARY_NAME: &str = "h_cal_summary";
pub const CAL_SUM_NAME: &str = "h_cal_sum";

/// Name of a per-channel histogram, i.e. h_raw_12
pub fn channel_histo_name(prefix: &str, channel: usize) -> String {
    format!("{prefix}_{channel}")
}
