use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::ConfigError;
use super::hit_file::MalformedPolicy;

/// Structure representing the application configuration.
/// Contains pathing, binning and calibration information.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub events_file: String,
    pub histogram_file: String,
    pub calibration_windows_path: Option<PathBuf>,
    pub coincidence_window: i64,
    pub n_channels: usize,
    pub n_bins: usize,
    pub energy_min: f64,
    pub energy_max: f64,
    pub reference_energies: [f64; 2],
    pub mult1_threshold: f64,
    pub on_malformed: MalformedPolicy,
    pub view_channels: [usize; 2],
    pub view_range: (f64, f64),
    pub view_annotation: String,
}

impl Default for Config {
    /// Generate a new Config object.
    /// Paths are placeholders, everything else is set for the 60Co run
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data.txt"),
            output_path: PathBuf::from("./output"),
            events_file: String::from("60Co.h5"),
            histogram_file: String::from("histos.h5"),
            calibration_windows_path: None,
            coincidence_window: DEFAULT_COINCIDENCE_WINDOW,
            n_channels: DEFAULT_N_CHANNELS,
            n_bins: DEFAULT_N_BINS,
            energy_min: DEFAULT_ENERGY_MIN,
            energy_max: DEFAULT_ENERGY_MAX,
            reference_energies: [CO60_LOW_LINE, CO60_HIGH_LINE],
            mult1_threshold: DEFAULT_MULT1_THRESHOLD,
            on_malformed: MalformedPolicy::default(),
            view_channels: DEFAULT_VIEW_CHANNELS,
            view_range: DEFAULT_VIEW_RANGE,
            view_annotation: String::from(DEFAULT_VIEW_ANNOTATION),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check the values which cannot be caught by the type system
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coincidence_window < 0 {
            return Err(ConfigError::InvalidValue(format!(
                "coincidence_window must be non-negative, found {}",
                self.coincidence_window
            )));
        }
        if self.n_channels == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "n_channels must be at least 1",
            )));
        }
        if self.n_bins == 0 || self.energy_max <= self.energy_min {
            return Err(ConfigError::InvalidValue(format!(
                "energy axis needs at least one bin and energy_max > energy_min, found {} bins over [{}, {})",
                self.n_bins, self.energy_min, self.energy_max
            )));
        }
        if self.reference_energies[1] <= self.reference_energies[0] {
            return Err(ConfigError::InvalidValue(format!(
                "reference_energies must be ascending, found {:?}",
                self.reference_energies
            )));
        }
        if self.view_range.1 <= self.view_range.0 {
            return Err(ConfigError::InvalidValue(format!(
                "view_range must be ascending, found {:?}",
                self.view_range
            )));
        }
        if let Some(ch) = self.view_channels.iter().find(|c| **c >= self.n_channels) {
            return Err(ConfigError::InvalidValue(format!(
                "view channel {ch} is outside of the {} channels",
                self.n_channels
            )));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get the path to the input text data, which must exist
    pub fn get_input_file(&self) -> Result<PathBuf, ConfigError> {
        if self.input_path.exists() {
            Ok(self.input_path.clone())
        } else {
            Err(ConfigError::BadFilePath(self.input_path.clone()))
        }
    }

    /// Get the path to the event table file. The output directory must exist
    pub fn get_events_file_name(&self) -> Result<PathBuf, ConfigError> {
        self.get_output_file(&self.events_file)
    }

    /// Get the path to the histogram file. The output directory must exist
    pub fn get_histogram_file_name(&self) -> Result<PathBuf, ConfigError> {
        self.get_output_file(&self.histogram_file)
    }

    /// Get the path to the calibration report, which lives next to the histogram file
    pub fn get_calibration_report_name(&self) -> Result<PathBuf, ConfigError> {
        let histo_path = self.get_histogram_file_name()?;
        let stem = histo_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("histos"));
        Ok(self.output_path.join(format!("{stem}_calibration.yml")))
    }

    fn get_output_file(&self, name: &str) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join(name))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.on_malformed = MalformedPolicy::Abort;
        config.view_channels = [5, 6];
        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let parsed: Config = serde_yaml::from_str("input_path: run.txt\nn_channels: 4\n").unwrap();
        assert_eq!(parsed.input_path, PathBuf::from("run.txt"));
        assert_eq!(parsed.n_channels, 4);
        assert_eq!(parsed.coincidence_window, DEFAULT_COINCIDENCE_WINDOW);
        assert_eq!(parsed.reference_energies, [CO60_LOW_LINE, CO60_HIGH_LINE]);
    }

    #[test]
    fn test_validation() {
        assert!(Config::default().is_valid());

        let mut config = Config::default();
        config.reference_energies = [1332.5, 1173.2];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.view_channels = [0, 47];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.energy_max = config.energy_min;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::read_config_file(Path::new("/definitely/not/a/config.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_output_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output_path = dir.path().to_path_buf();
        assert_eq!(
            config.get_histogram_file_name().unwrap(),
            dir.path().join("histos.h5")
        );
        assert_eq!(
            config.get_calibration_report_name().unwrap(),
            dir.path().join("histos_calibration.yml")
        );

        config.output_path = dir.path().join("missing");
        assert!(matches!(
            config.get_events_file_name(),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
