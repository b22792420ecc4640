use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum HitError {
    #[error("expected 3 fields (timestamp, detector id, energy), found {0}")]
    FieldCount(usize),
    #[error("could not parse timestamp: {0}")]
    BadTimestamp(#[from] std::num::ParseIntError),
    #[error("could not parse energy: {0}")]
    BadEnergy(#[from] std::num::ParseFloatError),
    #[error("could not parse detector id {0:?}")]
    BadDetectorID(String),
    #[error("detector id {0} is outside of the {1} configured channels")]
    DetectorOutOfRange(usize, usize),
}

#[derive(Debug, Error)]
pub enum HitFileError {
    #[error("Could not open HitFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("HitFile {0:?} is empty, expected at least a header line")]
    MissingHeader(PathBuf),
    #[error("HitFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Malformed record at line {line}: {source}")]
    MalformedRecord { line: u64, source: HitError },
}

#[derive(Debug, Error)]
pub enum EventTableError {
    #[error("Could not open event table because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event table failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Event table is inconsistent: multiplicities sum to {0} but {1} hits are stored")]
    HitCountMismatch(u64, u64),
    #[error("Event table is inconsistent: {0} detector ids but {1} energies")]
    ColumnLengthMismatch(usize, usize),
}

#[derive(Debug, Error)]
pub enum HistogramError {
    #[error("Channel {0} is outside of the {1} histogrammed channels")]
    ChannelOutOfRange(usize, usize),
    #[error("Histogram {0} expected {1} bins but was given {2}")]
    BinCountMismatch(String, usize, usize),
}

#[derive(Debug, Error)]
pub enum HistogramFileError {
    #[error("Could not open histogram file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Histogram {0} was not found in the histogram file")]
    MissingHistogram(String),
    #[error("Histogram {0} has an unexpected shape {1:?}")]
    BadShape(String, Vec<usize>),
    #[error("Histogram file failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Histogram file failed due to histogram error: {0}")]
    HistogramError(#[from] HistogramError),
}

#[derive(Debug, Error)]
pub enum CalibrationWindowError {
    #[error("Could not load calibration windows because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("CalibrationWindows failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("CalibrationWindows failed to parse a channel number: {0}")]
    BadChannel(#[from] std::num::ParseIntError),
    #[error("CalibrationWindows failed to parse a window bound: {0}")]
    BadBound(#[from] std::num::ParseFloatError),
    #[error("CalibrationWindows was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("CalibrationWindows has an entry for channel {0}, but only {1} channels are configured")]
    ChannelOutOfRange(usize, usize),
    #[error("CalibrationWindows has an invalid window for channel {0}: {1}")]
    BadWindow(usize, String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("only {0} non-empty bins in the fit range, at least {1} are needed")]
    TooFewPoints(usize, usize),
    #[error("the fit range [{0}, {1}] is empty or inverted")]
    BadRange(f64, f64),
    #[error("could not set up the fit: {0}")]
    BadModel(String),
    #[error("the fit did not converge")]
    NotConverged,
    #[error("the fitted width {0} is outside of (0, {1}]")]
    UnphysicalWidth(f64, f64),
    #[error("the fit produced non-finite parameters")]
    NonFinite,
    #[error("both peaks were fitted at the same position {0}")]
    DegeneratePeaks(f64),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to write yaml report: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SpectrumViewError {
    #[error("Viewer failed due to histogram file error: {0}")]
    HistogramFileError(#[from] HistogramFileError),
    #[error("Viewer range [{0}, {1}] does not overlap the histogram range [{2}, {3})")]
    BadRange(f64, f64, f64, f64),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to HitFile error: {0}")]
    HitFileError(#[from] HitFileError),
    #[error("Processor failed due to event table error: {0}")]
    EventTableError(#[from] EventTableError),
    #[error("Processor failed due to histogram error: {0}")]
    HistogramError(#[from] HistogramError),
    #[error("Processor failed due to histogram file error: {0}")]
    HistogramFileError(#[from] HistogramFileError),
    #[error("Processor failed due to CalibrationWindows error: {0}")]
    WindowError(#[from] CalibrationWindowError),
    #[error("Processor failed due to calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed due to viewer error: {0}")]
    ViewError(#[from] SpectrumViewError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
