// The peak search windows are a hand-curated table: for every crystal, the raw-energy ranges
// in which the 1173.2 keV and 1332.5 keV lines of 60Co show up. They depend on the gain of
// each channel, so they change from run to run. A row of zeros (or a missing row) means the
// crystal is not calibrated.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::{FxHashMap, FxHashSet};

use super::error::CalibrationWindowError;

const ENTRIES_PER_LINE: usize = 5; //channel, low1, high1, low2, high2

/// Load the default windows for windows
#[cfg(target_family = "windows")]
fn load_default_windows() -> String {
    String::from(include_str!("data\\default_windows.csv"))
}

/// Load the default windows for macos and linux
#[cfg(target_family = "unix")]
fn load_default_windows() -> String {
    String::from(include_str!("data/default_windows.csv"))
}

/// The two raw-energy ranges in which a channel's calibration peaks are fitted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationWindow {
    pub low_peak: (f64, f64),
    pub high_peak: (f64, f64),
}

impl CalibrationWindow {
    pub fn new(low_peak: (f64, f64), high_peak: (f64, f64)) -> Self {
        Self {
            low_peak,
            high_peak,
        }
    }

    /// An all-zero row marks a channel without calibration
    fn is_null(&self) -> bool {
        self.low_peak == (0.0, 0.0) && self.high_peak == (0.0, 0.0)
    }

    /// Each range must be ascending and the low peak range must sit below the high peak range
    fn check(&self) -> Result<(), String> {
        if !(self.low_peak.0 < self.low_peak.1) {
            return Err(format!("first range {:?} is not ascending", self.low_peak));
        }
        if !(self.high_peak.0 < self.high_peak.1) {
            return Err(format!("second range {:?} is not ascending", self.high_peak));
        }
        if self.low_peak.1 > self.high_peak.0 {
            return Err(format!(
                "ranges {:?} and {:?} overlap or are out of order",
                self.low_peak, self.high_peak
            ));
        }
        Ok(())
    }
}

/// CalibrationWindows maps channel number to its CalibrationWindow.
///
/// The windows are read from a CSV file with a header line and rows of
/// `channel,peak1_low,peak1_high,peak2_low,peak2_high`. If no file is given, the table of the
/// original 60Co run bundled with the library is used.
#[derive(Debug, Clone, Default)]
pub struct CalibrationWindows {
    map: FxHashMap<usize, CalibrationWindow>,
    n_channels: usize,
}

impl CalibrationWindows {
    /// Create a new CalibrationWindows for `n_channels` channels
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>, n_channels: usize) -> Result<Self, CalibrationWindowError> {
        let mut contents = String::new();
        if let Some(p) = path {
            if !p.exists() {
                return Err(CalibrationWindowError::BadFilePath(p.to_path_buf()));
            }
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_windows();
        }
        Self::parse(&contents, n_channels)
    }

    /// Parse the CSV contents of a window table
    pub fn parse(contents: &str, n_channels: usize) -> Result<Self, CalibrationWindowError> {
        let mut windows = CalibrationWindows {
            map: FxHashMap::default(),
            n_channels,
        };

        let mut seen = FxHashSet::default();
        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').map(|e| e.trim()).collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(CalibrationWindowError::BadFileFormat);
            }

            let channel: usize = entries[0].parse()?;
            if channel >= n_channels {
                return Err(CalibrationWindowError::ChannelOutOfRange(channel, n_channels));
            }
            if !seen.insert(channel) {
                return Err(CalibrationWindowError::BadWindow(
                    channel,
                    String::from("channel is listed more than once"),
                ));
            }
            let window = CalibrationWindow::new(
                (entries[1].parse()?, entries[2].parse()?),
                (entries[3].parse()?, entries[4].parse()?),
            );
            if window.is_null() {
                continue;
            }
            window
                .check()
                .map_err(|reason| CalibrationWindowError::BadWindow(channel, reason))?;
            windows.map.insert(channel, window);
        }

        Ok(windows)
    }

    /// Get the window of a channel.
    ///
    /// If returns None the channel is not calibrated
    pub fn get_window(&self, channel: usize) -> Option<&CalibrationWindow> {
        self.map.get(&channel)
    }

    pub fn get_n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of channels which have a window
    pub fn get_n_calibrated(&self) -> usize {
        self.map.len()
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let windows = match CalibrationWindows::new(None, 47) {
            Ok(w) => w,
            Err(_) => {
                panic!();
            }
        };
        assert_eq!(windows.get_n_channels(), 47);
        assert_eq!(windows.get_n_calibrated(), 38);
        assert_eq!(
            windows.get_window(0),
            Some(&CalibrationWindow::new((1820.0, 1835.0), (2070.0, 2085.0)))
        );
        assert_eq!(
            windows.get_window(45),
            Some(&CalibrationWindow::new((10050.0, 10200.0), (11400.0, 11550.0)))
        );
        for disabled in [2, 3, 4, 7, 11, 15, 19, 23, 43] {
            assert!(windows.get_window(disabled).is_none());
        }
    }

    #[test]
    fn test_default_windows_need_all_channels() {
        let result = CalibrationWindows::new(None, 40);
        assert!(matches!(
            result,
            Err(CalibrationWindowError::ChannelOutOfRange(40, 40))
        ));
    }

    #[test]
    fn test_bad_tables() {
        let header = "channel,peak1_low,peak1_high,peak2_low,peak2_high\n";
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}0,1,2,3\n"), 4),
            Err(CalibrationWindowError::BadFileFormat)
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}x,1,2,3,4\n"), 4),
            Err(CalibrationWindowError::BadChannel(_))
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}0,1,two,3,4\n"), 4),
            Err(CalibrationWindowError::BadBound(_))
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}1,20,10,30,40\n"), 4),
            Err(CalibrationWindowError::BadWindow(1, _))
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}2,10,35,30,40\n"), 4),
            Err(CalibrationWindowError::BadWindow(2, _))
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}3,1,2,3,4\n3,5,6,7,8\n"), 4),
            Err(CalibrationWindowError::BadWindow(3, _))
        ));
        assert!(matches!(
            CalibrationWindows::parse(&format!("{header}3,0,0,0,0\n3,5,6,7,8\n"), 4),
            Err(CalibrationWindowError::BadWindow(3, _))
        ));
    }

    #[test]
    fn test_missing_windows_file() {
        let path = Path::new("/not/here/windows.csv");
        match CalibrationWindows::new(Some(path), 4) {
            Err(CalibrationWindowError::BadFilePath(p)) => assert_eq!(p, path),
            other => panic!("expected a missing file error, got {other:?}"),
        }
    }

    #[test]
    fn test_sparse_table() {
        let contents = concat!(
            "channel,peak1_low,peak1_high,peak2_low,peak2_high\n",
            "\n",
            "3, 100, 110, 200, 210\n",
            "1,0,0,0,0\n"
        );
        let windows = CalibrationWindows::parse(contents, 4).unwrap();
        assert_eq!(windows.get_n_calibrated(), 1);
        assert!(windows.get_window(0).is_none());
        assert!(windows.get_window(1).is_none());
        assert_eq!(windows.get_window(3).unwrap().high_peak, (200.0, 210.0));
    }
}
