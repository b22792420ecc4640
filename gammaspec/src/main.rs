//! # gammaspec
//!
//! Part of the gammaspec crate family.
//!
//! This is the application to run the 60Co calibration analysis with a GUI using
//! [egui](https://github.com/emilk/egui).
//!
//! ## Install
//!
//! Use `cargo install --path ./gammaspec`
//!
//! ## Use
//!
//! To launch the application simply invoke it after it is installed
//!
//! ```bash
//! gammaspec
//! ```
//!
//! Fill out the configuration fields and click the Run button to build the events, fill the
//! raw histograms and calibrate. Once the run completes, the calibrated spectra of the two
//! viewed channels are displayed side by side. The View button displays them from an
//! existing histogram file without running the analysis.
//!
//! Configurations can be saved using File->Save and loaded using File->Open

mod app;
use app::GammaspecApp;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_FILE: &str = "./gammaspec.log";

/// Log to the log file, the GUI has no terminal to report to
fn init_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from(LOG_FILE))
            .formatter(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            ))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = init_logger() {
        eprintln!("Could not create logger at {LOG_FILE}: {e}");
        return ExitCode::FAILURE;
    }
    spdlog::info!("Starting gammaspec UI");

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("gammaspec")
            .with_inner_size(eframe::epaint::vec2(1200.0, 600.0))
            .with_min_inner_size(eframe::epaint::vec2(800.0, 400.0)),
        ..Default::default()
    };
    match eframe::run_native(
        "gammaspec",
        native_options,
        Box::new(|cc| Ok(Box::new(GammaspecApp::new(cc)))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            spdlog::error!("Eframe error: {}", e);
            ExitCode::FAILURE
        }
    }
}
