use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File};
use std::path::Path;
use std::str::FromStr;

use super::error::HistogramFileError;
use super::histogram::{ChannelHistograms, Histogram, Histogram2D};

// Structure
// h_raw_#, h_cal_#, h_cal_mult1_#, h_cal_sum (dset[n_bins]) - title, x_min, x_max, underflow, overflow
// h_raw_summary, h_cal_summary (dset[n_channels, n_bins]) - title, x_min, x_max, y_min, y_max, underflow, overflow

/// A handle on the histogram collection (HDF5).
///
/// The file is shared between stages: the raw histograms are written first and the
/// calibrated histograms are added later. Writing a histogram whose name already
/// exists replaces it. The file is closed when the handle is dropped.
#[derive(Debug)]
pub struct HistogramFile {
    file_handle: File,
}

impl HistogramFile {
    /// Open the file for update, creating it if it does not exist yet
    pub fn open_for_update(path: &Path) -> Result<Self, HistogramFileError> {
        Ok(Self {
            file_handle: File::append(path)?,
        })
    }

    /// Open an existing file read-only
    pub fn open(path: &Path) -> Result<Self, HistogramFileError> {
        if !path.exists() {
            return Err(HistogramFileError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            file_handle: File::open(path)?,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.file_handle.link_exists(name)
    }

    /// Write a 1-D histogram, replacing any histogram of the same name
    pub fn write_histogram(&self, histo: &Histogram) -> Result<(), HistogramFileError> {
        self.remove_existing(&histo.name)?;
        let dset = self
            .file_handle
            .new_dataset_builder()
            .with_data(histo.bins.as_slice())
            .create(histo.name.as_str())?;
        write_title(&dset, &histo.title)?;
        write_f64_attr(&dset, "x_min", histo.range.0)?;
        write_f64_attr(&dset, "x_max", histo.range.1)?;
        write_u64_attr(&dset, "underflow", histo.underflow)?;
        write_u64_attr(&dset, "overflow", histo.overflow)?;
        Ok(())
    }

    /// Write every histogram of a channel set
    pub fn write_channel_histograms(
        &self,
        histos: &ChannelHistograms,
    ) -> Result<(), HistogramFileError> {
        for histo in histos.iter() {
            self.write_histogram(histo)?;
        }
        Ok(())
    }

    /// Write a 2-D histogram, replacing any histogram of the same name
    pub fn write_histogram_2d(&self, histo: &Histogram2D) -> Result<(), HistogramFileError> {
        self.remove_existing(&histo.name)?;
        let dset = self
            .file_handle
            .new_dataset_builder()
            .with_data(&histo.counts)
            .create(histo.name.as_str())?;
        write_title(&dset, &histo.title)?;
        write_f64_attr(&dset, "x_min", histo.x_range.0)?;
        write_f64_attr(&dset, "x_max", histo.x_range.1)?;
        write_f64_attr(&dset, "y_min", histo.y_range.0)?;
        write_f64_attr(&dset, "y_max", histo.y_range.1)?;
        write_u64_attr(&dset, "underflow", histo.underflow)?;
        write_u64_attr(&dset, "overflow", histo.overflow)?;
        Ok(())
    }

    /// Read a 1-D histogram by name
    pub fn read_histogram(&self, name: &str) -> Result<Histogram, HistogramFileError> {
        let dset = self.get_dataset(name)?;
        if dset.ndim() != 1 {
            return Err(HistogramFileError::BadShape(name.to_string(), dset.shape()));
        }
        let bins = dset.read_raw::<u64>()?;
        let range = (
            dset.attr("x_min")?.read_scalar::<f64>()?,
            dset.attr("x_max")?.read_scalar::<f64>()?,
        );
        let mut histo = Histogram::new(name, &read_title(&dset)?, bins.len(), range);
        histo.set_counts(bins)?;
        histo.underflow = dset.attr("underflow")?.read_scalar::<u64>()?;
        histo.overflow = dset.attr("overflow")?.read_scalar::<u64>()?;
        Ok(histo)
    }

    /// Read a 2-D histogram by name
    pub fn read_histogram_2d(&self, name: &str) -> Result<Histogram2D, HistogramFileError> {
        let dset = self.get_dataset(name)?;
        if dset.ndim() != 2 {
            return Err(HistogramFileError::BadShape(name.to_string(), dset.shape()));
        }
        let counts = dset.read_2d::<u64>()?;
        Ok(Histogram2D {
            name: name.to_string(),
            title: read_title(&dset)?,
            counts,
            x_range: (
                dset.attr("x_min")?.read_scalar::<f64>()?,
                dset.attr("x_max")?.read_scalar::<f64>()?,
            ),
            y_range: (
                dset.attr("y_min")?.read_scalar::<f64>()?,
                dset.attr("y_max")?.read_scalar::<f64>()?,
            ),
            underflow: dset.attr("underflow")?.read_scalar::<u64>()?,
            overflow: dset.attr("overflow")?.read_scalar::<u64>()?,
        })
    }

    fn get_dataset(&self, name: &str) -> Result<Dataset, HistogramFileError> {
        if !self.contains(name) {
            return Err(HistogramFileError::MissingHistogram(name.to_string()));
        }
        Ok(self.file_handle.dataset(name)?)
    }

    fn remove_existing(&self, name: &str) -> Result<(), HistogramFileError> {
        if self.contains(name) {
            self.file_handle.unlink(name)?;
        }
        Ok(())
    }
}

fn write_title(dset: &Dataset, title: &str) -> Result<(), HistogramFileError> {
    // Titles are plain text; a title with an interior nul is stored empty
    let value = VarLenUnicode::from_str(title).unwrap_or_default();
    dset.new_attr::<VarLenUnicode>()
        .create("title")?
        .write_scalar(&value)?;
    Ok(())
}

fn read_title(dset: &Dataset) -> Result<String, HistogramFileError> {
    let value: VarLenUnicode = dset.attr("title")?.read_scalar()?;
    Ok(value.to_string())
}

fn write_f64_attr(dset: &Dataset, name: &str, value: f64) -> Result<(), HistogramFileError> {
    dset.new_attr::<f64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

fn write_u64_attr(dset: &Dataset, name: &str, value: u64) -> Result<(), HistogramFileError> {
    dset.new_attr::<u64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_histogram_roundtrip_and_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("histos.h5");

        let mut histo = Histogram::new(
            "h_raw_0",
            "raw energy histogram of detector 0",
            100,
            (0.0, 100.0),
        );
        histo.fill(10.5);
        histo.fill(-3.0);
        histo.fill(250.0);
        {
            let file = HistogramFile::open_for_update(&path).unwrap();
            file.write_histogram(&histo).unwrap();
        }

        // Reopen for update and overwrite in place
        histo.fill(10.7);
        {
            let file = HistogramFile::open_for_update(&path).unwrap();
            assert!(file.contains("h_raw_0"));
            file.write_histogram(&histo).unwrap();
        }

        let file = HistogramFile::open(&path).unwrap();
        let read_back = file.read_histogram("h_raw_0").unwrap();
        assert_eq!(read_back, histo);
        assert_eq!(read_back.bins[10], 2);
        assert_eq!(read_back.underflow, 1);
        assert_eq!(read_back.overflow, 1);
    }

    #[test]
    fn test_histogram_2d_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("histos.h5");
        let mut histo = Histogram2D::new(
            "h_raw_summary",
            "raw energy vs. ID",
            (4, 50),
            (0.0, 4.0),
            (0.0, 50.0),
        );
        histo.fill(1.0, 20.0);
        histo.fill(3.0, 49.0);
        histo.fill(5.0, 1.0);

        let file = HistogramFile::open_for_update(&path).unwrap();
        file.write_histogram_2d(&histo).unwrap();
        let read_back = file.read_histogram_2d("h_raw_summary").unwrap();
        assert_eq!(read_back, histo);
        assert!(matches!(
            file.read_histogram("h_raw_summary"),
            Err(HistogramFileError::BadShape(_, _))
        ));
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("histos.h5");
        assert!(matches!(
            HistogramFile::open(&path),
            Err(HistogramFileError::BadFilePath(_))
        ));

        let file = HistogramFile::open_for_update(&path).unwrap();
        assert!(matches!(
            file.read_histogram("h_raw_7"),
            Err(HistogramFileError::MissingHistogram(_))
        ));
    }
}
