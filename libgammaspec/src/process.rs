use std::fmt::Display;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::calibration::{CalibratedHistograms, CalibrationTable};
use super::calibration_windows::CalibrationWindows;
use super::config::Config;
use super::constants::*;
use super::error::{HistogramFileError, ProcessorError};
use super::event_builder::EventBuilder;
use super::event_table::{EventTableReader, EventTableWriter};
use super::histogram::{ChannelHistograms, Histogram2D};
use super::histogram_file::HistogramFile;
use super::hit_file::HitFile;
use super::spectrum_view::SpectrumView;
use super::worker_status::{Stage, WorkerStatus};

/// Outcome of the event building stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub stage: Stage,
    pub n_events: u64,
    pub n_hits: u64,
    pub n_skipped: u64,
    pub n_out_of_order: u64,
}

impl Display for EventSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[stage {}] {} events built from {} hits ({} malformed lines skipped, {} out-of-order timestamps)",
            self.stage.code(),
            self.n_events,
            self.n_hits,
            self.n_skipped,
            self.n_out_of_order
        )
    }
}

/// Outcome of the raw histogram stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHistogramSummary {
    pub stage: Stage,
    pub n_events: u64,
    pub n_hits: u64,
    pub n_underflow: u64,
    pub n_overflow: u64,
}

impl Display for RawHistogramSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[stage {}] {} hits from {} events histogrammed ({} underflow, {} overflow)",
            self.stage.code(),
            self.n_hits,
            self.n_events,
            self.n_underflow,
            self.n_overflow
        )
    }
}

/// Outcome of the calibration stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSummary {
    pub stage: Stage,
    pub table: CalibrationTable,
    pub n_events: u64,
    pub report_path: PathBuf,
}

impl Display for CalibrationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[stage {}] {} of {} channels calibrated ({} failed fits), {} events re-histogrammed, report at {}",
            self.stage.code(),
            self.table.n_calibrated(),
            self.table.channels.len(),
            self.table.n_failed(),
            self.n_events,
            self.report_path.display()
        )
    }
}

/// Outcome of the viewer stage: the panels ready to be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSummary {
    pub stage: Stage,
    pub view: SpectrumView,
}

impl Display for ViewSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[stage {}] {}", self.stage.code(), self.view.annotation)?;
        for panel in self.view.panels.iter() {
            write!(
                f,
                "\n  {} ({}): {} counts in [{}, {}] keV, mean {:.2} keV, stdev {:.2} keV",
                panel.legend,
                panel.histogram_name,
                panel.counts,
                self.view.range.0,
                self.view.range.1,
                panel.mean,
                panel.stdev
            )?;
        }
        Ok(())
    }
}

/// Summaries of the stages run by `process`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub events: EventSummary,
    pub raw_histograms: RawHistogramSummary,
    pub calibration: CalibrationSummary,
}

/// Send a progress update every PROGRESS_INTERVAL items
fn report_progress(
    tx: &Sender<WorkerStatus>,
    count: u64,
    progress: f32,
    stage: Stage,
) -> Result<(), ProcessorError> {
    if count % PROGRESS_INTERVAL == 0 {
        tx.send(WorkerStatus::new(progress, stage))?;
        spdlog::info!("{}: {} processed ({:.0}%)", stage, count, progress * 100.0);
    }
    Ok(())
}

/// The final event of the EventBuilder will need a manual flush
fn flush_final_event(
    mut evb: EventBuilder,
    mut writer: EventTableWriter,
) -> Result<u64, ProcessorError> {
    if let Some(event) = evb.flush_final_event() {
        writer.write_event(&event)?;
    }
    let n_events = writer.get_event_count() as u64;
    writer.close()?;
    Ok(n_events)
}

/// Stage 1: group the hits of the input text file into events and write the event table
pub fn build_events(
    config: &Config,
    tx: &Sender<WorkerStatus>,
) -> Result<EventSummary, ProcessorError> {
    let stage = Stage::BuildEvents;
    let input_path = config.get_input_file()?;
    let events_path = config.get_events_file_name()?;

    let mut hit_file = HitFile::open(&input_path, config.n_channels, config.on_malformed)?;
    spdlog::info!(
        "Building events from {} ({}) with a coincidence window of {}...",
        input_path.display(),
        human_bytes::human_bytes(hit_file.get_size_bytes() as f64),
        config.coincidence_window
    );

    let mut evb = EventBuilder::new(config.coincidence_window);
    let mut writer = EventTableWriter::new(&events_path, config.coincidence_window)?;
    let mut n_hits: u64 = 0;
    tx.send(WorkerStatus::new(0.0, stage))?;
    while let Some(hit) = hit_file.get_next_hit()? {
        n_hits += 1;
        report_progress(tx, n_hits, hit_file.get_progress(), stage)?;
        if let Some(event) = evb.append_hit(&hit) {
            writer.write_event(&event)?;
        }
    }

    let n_out_of_order = evb.get_out_of_order_count();
    let n_events = flush_final_event(evb, writer)?;
    tx.send(WorkerStatus::new(1.0, stage))?;

    if hit_file.get_skipped_count() > 0 {
        spdlog::warn!(
            "{} of {} lines were malformed and skipped in {}.",
            hit_file.get_skipped_count(),
            hit_file.get_line_number(),
            input_path.display()
        );
    }
    if n_out_of_order > 0 {
        spdlog::warn!(
            "{} hits had a timestamp earlier than the previous hit; they were kept in the current event.",
            n_out_of_order
        );
    }
    spdlog::info!("Done building events.");

    Ok(EventSummary {
        stage,
        n_events,
        n_hits,
        n_skipped: hit_file.get_skipped_count(),
        n_out_of_order,
    })
}

/// Stage 2: fill the raw energy histograms from the event table
pub fn build_raw_histograms(
    config: &Config,
    tx: &Sender<WorkerStatus>,
) -> Result<RawHistogramSummary, ProcessorError> {
    let stage = Stage::RawHistograms;
    let reader = EventTableReader::open(&config.get_events_file_name()?)?;
    let histo_path = config.get_histogram_file_name()?;
    let range = (config.energy_min, config.energy_max);
    spdlog::info!(
        "Filling raw histograms from {} events...",
        reader.get_event_count()
    );

    let mut raw = ChannelHistograms::new(
        RAW_HISTO_PREFIX,
        "Raw energy of crystal",
        config.n_channels,
        config.n_bins,
        range,
    );
    let mut summary = Histogram2D::new(
        RAW_SUMMARY_NAME,
        "Raw energy vs. crystal",
        (config.n_channels, config.n_bins),
        (0.0, config.n_channels as f64),
        range,
    );

    let n_events = reader.get_event_count() as u64;
    tx.send(WorkerStatus::new(0.0, stage))?;
    for (index, event) in reader.events().enumerate() {
        for (channel, energy) in event.hits() {
            raw.fill(channel, energy)?;
            summary.fill(channel as f64, energy);
        }
        let count = index as u64 + 1;
        report_progress(tx, count, count as f32 / n_events as f32, stage)?;
    }

    let file = HistogramFile::open_for_update(&histo_path)?;
    file.write_channel_histograms(&raw)?;
    file.write_histogram_2d(&summary)?;
    tx.send(WorkerStatus::new(1.0, stage))?;
    spdlog::info!("Raw histograms written to {}.", histo_path.display());

    Ok(RawHistogramSummary {
        stage,
        n_events,
        n_hits: reader.get_hit_count() as u64,
        n_underflow: raw.iter().map(|h| h.underflow).sum(),
        n_overflow: raw.iter().map(|h| h.overflow).sum(),
    })
}

/// Stage 3: fit the calibration peaks, then fill the calibrated histograms from the event table
pub fn calibrate(
    config: &Config,
    tx: &Sender<WorkerStatus>,
) -> Result<CalibrationSummary, ProcessorError> {
    let stage = Stage::Calibrate;
    let reader = EventTableReader::open(&config.get_events_file_name()?)?;
    let histo_path = config.get_histogram_file_name()?;
    if !histo_path.exists() {
        return Err(HistogramFileError::BadFilePath(histo_path.clone()).into());
    }
    let windows = CalibrationWindows::new(
        config.calibration_windows_path.as_deref(),
        config.n_channels,
    )?;

    let file = HistogramFile::open_for_update(&histo_path)?;
    tx.send(WorkerStatus::new(0.0, stage))?;
    let table =
        CalibrationTable::from_histogram_file(&file, &windows, config.reference_energies)?;
    for channel in table.channels.iter().filter(|c| c.is_calibrated()) {
        spdlog::info!(
            "Channel {} calibrated: slope = {:.6} keV/unit, intercept = {:.3} keV",
            channel.channel,
            channel.params.slope,
            channel.params.intercept
        );
    }
    spdlog::info!(
        "{} of {} channels calibrated, {} fits failed.",
        table.n_calibrated(),
        table.channels.len(),
        table.n_failed()
    );

    let mut histos = CalibratedHistograms::new(
        config.n_channels,
        config.n_bins,
        (config.energy_min, config.energy_max),
        config.mult1_threshold,
    );
    let n_events = reader.get_event_count() as u64;
    for (index, event) in reader.events().enumerate() {
        histos.fill_event(&event, &table)?;
        let count = index as u64 + 1;
        report_progress(tx, count, count as f32 / n_events as f32, stage)?;
    }
    histos.write(&file)?;

    let report_path = config.get_calibration_report_name()?;
    table.write_report(&report_path)?;
    tx.send(WorkerStatus::new(1.0, stage))?;
    spdlog::info!("Calibrated histograms written to {}.", histo_path.display());

    Ok(CalibrationSummary {
        stage,
        table,
        n_events,
        report_path,
    })
}

/// Stage 4: load the two calibrated spectra to display
pub fn view(config: &Config) -> Result<ViewSummary, ProcessorError> {
    let file = HistogramFile::open(&config.get_histogram_file_name()?)?;
    let view = SpectrumView::load(
        &file,
        config.view_channels,
        config.view_range,
        &config.view_annotation,
    )?;
    Ok(ViewSummary {
        stage: Stage::View,
        view,
    })
}

/// The function to be called by a separate thread (typically the UI).
///
/// Runs the event builder, the raw histograms and the calibration in order. The first
/// failing stage stops the run.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<RunSummary, ProcessorError> {
    let events = build_events(&config, &tx)?;
    spdlog::info!("{}", events);
    let raw_histograms = build_raw_histograms(&config, &tx)?;
    spdlog::info!("{}", raw_histograms);
    let calibration = calibrate(&config, &tx)?;
    spdlog::info!("{}", calibration);
    Ok(RunSummary {
        events,
        raw_histograms,
        calibration,
    })
}
