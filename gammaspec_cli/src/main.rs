//! # gammaspec_cli
//!
//! Part of the gammaspec crate family.
//!
//! Command line driver of the 60Co calibration analysis.
//!
//! ```bash
//! gammaspec_cli -p config.yml new            # write a template configuration
//! gammaspec_cli -p config.yml build-events   # stage 1
//! gammaspec_cli -p config.yml raw-histograms # stage 2
//! gammaspec_cli -p config.yml calibrate      # stage 3
//! gammaspec_cli -p config.yml view           # stage 4, print the viewed spectra
//! gammaspec_cli -p config.yml run            # stages 1 to 3
//! ```
use clap::{Arg, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;

use libgammaspec::config::Config;
use libgammaspec::error::ProcessorError;
use libgammaspec::process::{build_events, build_raw_histograms, calibrate, process, view};
use libgammaspec::worker_status::WorkerStatus;

const LOG_FILE: &str = "./gammaspec_cli.log";

fn make_template_config(path: &Path) -> Result<(), String> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(|e| e.to_string())?;
    std::fs::write(path, yaml_str).map_err(|e| e.to_string())
}

/// Log to the terminal and to the log file
fn init_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from(LOG_FILE))
            .formatter(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [{^{level}}] - {payload}{eol}"
                ),
            ))
            .truncate(true)
            .build()?,
    );
    let stdout_sink = Arc::new(
        spdlog::sink::StdStreamSink::builder()
            .std_stream(spdlog::sink::StdStream::Stdout)
            .formatter(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!("[{^{level}}] - {payload}{eol}"),
            ))
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .sink(stdout_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

/// Run a stage on a worker thread, showing its progress until it completes
fn run_with_progress<F>(task: F) -> ExitCode
where
    F: FnOnce(Sender<WorkerStatus>) -> Result<String, ProcessorError> + Send + 'static,
{
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{msg:>24} [{bar:40.cyan/blue}] {pos:>3}%") {
        pb.set_style(style);
    }
    let (tx, rx) = channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || task(tx));

    loop {
        // No UI here, so sleep for a bit before trying to update
        std::thread::sleep(std::time::Duration::from_millis(250));
        for status in rx.try_iter() {
            pb.set_message(status.stage.to_string());
            pb.set_position((status.progress * 100.0) as u64);
        }

        if handle.is_finished() {
            pb.finish();
            return match handle.join() {
                Ok(result) => match result {
                    Ok(summary) => {
                        spdlog::info!("{summary}");
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        spdlog::error!("Processing failed with error: {e}");
                        ExitCode::FAILURE
                    }
                },
                Err(_) => {
                    spdlog::error!("Failed to join processing task!");
                    ExitCode::FAILURE
                }
            };
        }
    }
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("gammaspec_cli")
        .about("60Co calibration analysis of an HPGe crystal array")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("build-events").about("Group the input hits into events (stage 1)"),
        )
        .subcommand(
            Command::new("raw-histograms")
                .about("Fill the raw energy histograms from the events (stage 2)"),
        )
        .subcommand(
            Command::new("calibrate")
                .about("Fit the 60Co peaks and fill the calibrated histograms (stage 3)"),
        )
        .subcommand(Command::new("view").about("Summarize the two viewed spectra (stage 4)"))
        .subcommand(Command::new("run").about("Run stages 1 to 3"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    if let Err(e) = init_logger() {
        eprintln!("Could not create logger: {e}");
        return ExitCode::FAILURE;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        spdlog::error!("A configuration path is required");
        return ExitCode::FAILURE;
    };
    let Some((command, _)) = matches.subcommand() else {
        return ExitCode::FAILURE;
    };

    if command == "new" {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        return match make_template_config(&config_path) {
            Ok(()) => {
                spdlog::info!("Done.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                spdlog::error!("Could not write template config: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Input Path: {}", config.input_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    spdlog::info!(
        "Calibration Windows: {}",
        config
            .calibration_windows_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("Default"))
    );
    spdlog::info!(
        "Coincidence Window: {} Channels: {}",
        config.coincidence_window,
        config.n_channels
    );

    let code = match command {
        "build-events" => {
            run_with_progress(move |tx| build_events(&config, &tx).map(|s| s.to_string()))
        }
        "raw-histograms" => {
            run_with_progress(move |tx| build_raw_histograms(&config, &tx).map(|s| s.to_string()))
        }
        "calibrate" => run_with_progress(move |tx| calibrate(&config, &tx).map(|s| s.to_string())),
        "run" => run_with_progress(move |tx| {
            process(config, tx).map(|s| {
                format!("{}\n{}\n{}", s.events, s.raw_histograms, s.calibration)
            })
        }),
        "view" => match view(&config) {
            Ok(summary) => {
                spdlog::info!("{summary}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                spdlog::error!("Viewing failed with error: {e}");
                ExitCode::FAILURE
            }
        },
        _ => ExitCode::FAILURE,
    };

    spdlog::info!("Done.");
    code
}
