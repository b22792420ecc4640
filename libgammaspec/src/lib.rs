//! # gammaspec
//!
//! gammaspec is the analysis chain of a 60Co calibration run of an HPGe crystal array,
//! written in Rust. It takes the plain-text list of detector hits recorded by the
//! acquisition, groups the hits into coincidence events, histograms the raw energies of
//! every crystal, fits the two 60Co lines (1173.2 keV and 1332.5 keV) to derive a linear
//! energy calibration per crystal, and displays the calibrated spectra.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! Before building and running gammaspec, HDF5 must be installed. Typically this will
//! be installed using a package manager (homebrew, apt, etc), and the Rust libraries will
//! auto detect the location of the HDF install. If HDF5 is installed to a custom location,
//! write the following snippet into the file `.cargo/config.toml` in the gammaspec
//! repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the GUI use `cargo install --path ./gammaspec` from the top level
//! repository. To build and install the CLI use `cargo install --path ./gammaspec_cli`.
//!
//! ## Pipeline
//!
//! The analysis is made of four stages which must be run in order:
//!
//! 1. Event building ([`process::build_events`]): hits are read from the input text file
//! and consecutive hits whose timestamps are no more than `coincidence_window` apart are
//! grouped into one event. Events are written to the event table.
//! 2. Raw histograms ([`process::build_raw_histograms`]): one raw energy histogram per
//! crystal (`h_raw_#`) and a crystal vs. raw energy summary (`h_raw_summary`).
//! 3. Calibration ([`process::calibrate`]): a Gaussian is fitted in each of the two
//! calibration windows of a crystal, and the fitted centroids are mapped onto the 60Co
//! lines. The events are then histogrammed again in keV (`h_cal_#`, `h_cal_summary`,
//! `h_cal_mult1_#`, `h_cal_sum`) and a calibration report is written.
//! 4. Viewing ([`process::view`]): two calibrated spectra side by side.
//!
//! [`process::process`] runs stages 1 to 3.
//!
//! ## Configuration
//!
//! A configuration file saved using the UI is compatible with the CLI and vice-versa. The
//! YAML format of a configuration file is as follows:
//!
//! ```yml
//! input_path: data.txt
//! output_path: ./output
//! events_file: 60Co.h5
//! histogram_file: histos.h5
//! calibration_windows_path: null
//! coincidence_window: 1000
//! n_channels: 47
//! n_bins: 20000
//! energy_min: 0.0
//! energy_max: 20000.0
//! reference_energies:
//! - 1173.2
//! - 1332.5
//! mult1_threshold: 300.0
//! on_malformed: skip
//! view_channels:
//! - 0
//! - 1
//! view_range:
//! - 1000.0
//! - 1500.0
//! view_annotation: 60Co calibration run
//! ```
//!
//! Fields which are missing from the file take the values above. `on_malformed` is either
//! `skip` (warn and continue) or `abort` (stop at the first line which cannot be parsed).
//! If `calibration_windows_path` is `null`, the window table of the original 60Co run,
//! bundled with the library, is used.
//!
//! ### Input Format
//!
//! The input is a text file with a header line, followed by one hit per line:
//!
//! ```text
//! timestamp detector_id raw_energy
//! ```
//!
//! ### Calibration Window Format
//!
//! The calibration windows are a CSV file with a header line. The columns are as follows:
//!
//! ```csv
//! channel,peak1_low,peak1_high,peak2_low,peak2_high
//! ```
//!
//! The bounds are in raw energy units. A channel without a row, or with a row of zeros, is
//! not calibrated: its slope and intercept are zero.
//!
//! ## Output
//!
//! gammaspec writes two HDF5 files and a calibration report (YAML) to the output
//! directory, as well as a log file.
//!
//! ### Event Table Format
//!
//! ```text
//! 60Co.h5
//! events - n_events, n_hits, coincidence_window, created, version
//! |---- multiplicity(dset)
//! |---- detector_id(dset)
//! |---- energy(dset)
//! ```
//!
//! Event *k* owns the next `multiplicity[k]` entries of `detector_id` and `energy`.
//!
//! ### Histogram File Format
//!
//! ```text
//! histos.h5
//! h_raw_#, h_cal_#, h_cal_mult1_#, h_cal_sum (dset) - title, x_min, x_max, underflow, overflow
//! h_raw_summary, h_cal_summary (dset) - title, x_min, x_max, y_min, y_max, underflow, overflow
//! ```
pub mod calibration;
pub mod calibration_windows;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod event_builder;
pub mod event_table;
pub mod gaussian_fit;
pub mod histogram;
pub mod histogram_file;
pub mod hit;
pub mod hit_file;
pub mod process;
pub mod spectrum_view;
pub mod worker_status;
