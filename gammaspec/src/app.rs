use std::path::Path;
use std::sync::mpsc;
use std::thread::JoinHandle;

use eframe::egui::{Color32, DragValue, ProgressBar, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use rfd::FileDialog;

use libgammaspec::config::Config;
use libgammaspec::error::ProcessorError;
use libgammaspec::hit_file::MalformedPolicy;
use libgammaspec::process::{process, view, RunSummary};
use libgammaspec::spectrum_view::{SpectrumPanel, SpectrumView};
use libgammaspec::worker_status::WorkerStatus;

const PLOT_COLORS: [Color32; 2] = [Color32::LIGHT_BLUE, Color32::LIGHT_RED];

fn render_error_dialog(show: &mut bool, ctx: &eframe::egui::Context) {
    eframe::egui::Window::new("Error")
        .open(show)
        .show(ctx, |ui| {
            ui.label("There was an error! Check the log file gammaspec.log for more information.")
        });
}

/// Draw one spectrum of the viewer
fn render_panel(
    ui: &mut eframe::egui::Ui,
    id: &str,
    view: &SpectrumView,
    panel: &SpectrumPanel,
    color: Color32,
) {
    ui.label(format!(
        "{}: {} counts, mean {:.2} keV, stdev {:.2} keV",
        panel.legend, panel.counts, panel.mean, panel.stdev
    ));
    Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(view.x_label.clone())
        .y_axis_label(view.y_label.clone())
        .include_x(view.range.0)
        .include_x(view.range.1)
        .include_y(0.0)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(panel.points.clone()))
                    .color(color)
                    .name(panel.legend.clone()),
            );
        });
}

/// The UI app which inherits the eframe::App trait.
///
/// The parent for all processing.
#[derive(Debug)]
pub struct GammaspecApp {
    config: Config,
    worker: Option<JoinHandle<Result<RunSummary, ProcessorError>>>, //processing thread
    worker_status: WorkerStatus,
    spectrum_view: Option<SpectrumView>,
    show_error_window: bool,
    worker_rx: mpsc::Receiver<WorkerStatus>,
    worker_tx: mpsc::Sender<WorkerStatus>,
}

impl GammaspecApp {
    /// Create the application
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut visuals = eframe::egui::Visuals::dark();
        visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        cc.egui_ctx.set_visuals(visuals);
        let (tx, rx) = mpsc::channel::<WorkerStatus>();
        GammaspecApp {
            config: Config::default(),
            worker: None,
            worker_status: WorkerStatus::default(),
            spectrum_view: None,
            show_error_window: false,
            worker_rx: rx,
            worker_tx: tx,
        }
    }

    /// Start the worker running stages 1 to 3
    fn start_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        if let Err(e) = self.config.validate() {
            self.show_error_window = true;
            spdlog::error!("{}", e);
            return;
        }
        self.worker_status = WorkerStatus::default();
        self.spectrum_view = None;
        let conf = self.config.clone();
        let tx = self.worker_tx.clone();
        self.worker = Some(std::thread::spawn(move || process(conf, tx)));
    }

    /// Join the worker once it is done
    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(res) => match res {
                    Ok(summary) => {
                        spdlog::info!("Worker complete");
                        spdlog::info!("{}", summary.calibration);
                        self.load_view();
                    }
                    Err(e) => {
                        self.show_error_window = true;
                        spdlog::error!("Processor error: {e}")
                    }
                },
                Err(_) => {
                    self.show_error_window = true;
                    spdlog::error!("An error occured joining the worker!")
                }
            }
        }
    }

    fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Load the calibrated spectra for display
    fn load_view(&mut self) {
        match view(&self.config) {
            Ok(summary) => {
                spdlog::info!("{}", summary);
                self.spectrum_view = Some(summary.view);
            }
            Err(e) => {
                self.show_error_window = true;
                spdlog::error!("{}", e);
            }
        }
    }

    /// Write the current Config to a file
    fn write_config(&mut self, path: &Path) {
        if let Err(e) = self.config.write_config_file(path) {
            self.show_error_window = true;
            spdlog::error!("Could not write config to {}: {}", path.display(), e);
        }
    }

    fn poll_messages(&mut self) {
        // Check messages
        loop {
            match self.worker_rx.try_recv() {
                Ok(status) => self.worker_status = status,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    spdlog::error!("Channels became disconnected!");
                    self.show_error_window = true;
                    break;
                }
            }
        }
    }

    /// Read the Config from a file
    fn read_config(&mut self, path: &Path) {
        match Config::read_config_file(path) {
            Ok(conf) => self.config = conf,
            Err(e) => {
                self.show_error_window = true;
                spdlog::error!("{}", e)
            }
        }
    }

    fn render_config(&mut self, ui: &mut eframe::egui::Ui) {
        eframe::egui::Grid::new("ConfigGrid").show(ui, |ui| {
            //Input data
            ui.label(format!("Input file: {}", self.config.input_path.display()));
            if ui.button("Open...").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("Text file", &["txt", "dat", "csv"])
                    .pick_file()
                {
                    self.config.input_path = path;
                }
            }
            ui.end_row();

            //Output directory
            ui.label(format!(
                "Output directory: {}",
                self.config.output_path.display()
            ));
            if ui.button("Open...").clicked() {
                if let Some(path) = FileDialog::new().pick_folder() {
                    self.config.output_path = path;
                }
            }
            ui.end_row();

            ui.label("Event table file");
            ui.text_edit_singleline(&mut self.config.events_file);
            ui.end_row();

            ui.label("Histogram file");
            ui.text_edit_singleline(&mut self.config.histogram_file);
            ui.end_row();

            //Calibration windows
            let windows_render_text: String = match &self.config.calibration_windows_path {
                Some(p) => p.to_string_lossy().to_string(),
                None => String::from("Default"),
            };
            ui.label(format!("Calibration windows: {windows_render_text}"));
            ui.horizontal(|ui| {
                if ui.button("Open...").clicked() {
                    if let Some(path) = FileDialog::new()
                        .add_filter("CSV file", &["csv", "CSV", "txt"])
                        .pick_file()
                    {
                        self.config.calibration_windows_path = Some(path);
                    }
                }
                if ui.button("Default").clicked() {
                    self.config.calibration_windows_path = None
                }
            });
            ui.end_row();

            ui.label("Coincidence window");
            ui.add(DragValue::new(&mut self.config.coincidence_window).speed(10));
            ui.end_row();

            ui.label("Number of channels");
            ui.add(DragValue::new(&mut self.config.n_channels).speed(1));
            ui.end_row();

            ui.label("Energy bins, min, max");
            ui.horizontal(|ui| {
                ui.add(DragValue::new(&mut self.config.n_bins).speed(10));
                ui.add(DragValue::new(&mut self.config.energy_min).speed(10.0));
                ui.add(DragValue::new(&mut self.config.energy_max).speed(10.0));
            });
            ui.end_row();

            ui.label("Reference energies (keV)");
            ui.horizontal(|ui| {
                ui.add(DragValue::new(&mut self.config.reference_energies[0]).speed(0.1));
                ui.add(DragValue::new(&mut self.config.reference_energies[1]).speed(0.1));
            });
            ui.end_row();

            ui.label("Multiplicity 1 threshold (keV)");
            ui.add(DragValue::new(&mut self.config.mult1_threshold).speed(1.0));
            ui.end_row();

            ui.label("Malformed lines");
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.config.on_malformed, MalformedPolicy::Skip, "Skip");
                ui.selectable_value(&mut self.config.on_malformed, MalformedPolicy::Abort, "Abort");
            });
            ui.end_row();

            ui.label("Viewed channels");
            ui.horizontal(|ui| {
                ui.add(DragValue::new(&mut self.config.view_channels[0]).speed(1));
                ui.add(DragValue::new(&mut self.config.view_channels[1]).speed(1));
            });
            ui.end_row();

            ui.label("Viewed range (keV)");
            ui.horizontal(|ui| {
                ui.add(DragValue::new(&mut self.config.view_range.0).speed(1.0));
                ui.add(DragValue::new(&mut self.config.view_range.1).speed(1.0));
            });
            ui.end_row();

            ui.label("Annotation");
            ui.text_edit_singleline(&mut self.config.view_annotation);
            ui.end_row();
        });
    }
}

impl eframe::App for GammaspecApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();
        render_error_dialog(&mut self.show_error_window, ctx);
        eframe::egui::SidePanel::left("ConfigPanel").show(ctx, |ui| {
            //Menus
            ui.menu_button("File", |ui| {
                if ui.button("Open...").clicked() {
                    if let Some(path) = FileDialog::new()
                        .add_filter("YAML file", &["yaml", "yml"])
                        .pick_file()
                    {
                        self.read_config(&path);
                    }
                }
                if ui.button("Save...").clicked() {
                    if let Some(path) = FileDialog::new()
                        .add_filter("YAML file", &["yaml", "yml"])
                        .save_file()
                    {
                        self.write_config(&path);
                    }
                }
            });

            //Config
            ui.separator();
            ui.label(
                RichText::new("Configuration")
                    .color(Color32::LIGHT_BLUE)
                    .size(18.0),
            );
            self.render_config(ui);

            //Controls
            // You can only click run if there isn't already someone working
            ui.separator();
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(self.worker.is_none(), eframe::egui::Button::new("Run"))
                    .clicked()
                {
                    spdlog::info!("Starting processor...");
                    self.start_worker();
                } else if self.worker.is_some() && !self.is_worker_alive() {
                    self.stop_worker();
                }
                if ui
                    .add_enabled(self.worker.is_none(), eframe::egui::Button::new("View"))
                    .clicked()
                {
                    self.load_view();
                }
            });

            //Progress
            ui.add(
                ProgressBar::new(self.worker_status.progress)
                    .text(format!(
                        "Stage {} : {} - {}%",
                        self.worker_status.stage.code(),
                        self.worker_status.stage,
                        (self.worker_status.progress * 100.0) as i32
                    ))
                    .fill(Color32::BLUE),
            );
        });

        eframe::egui::CentralPanel::default().show(ctx, |ui| match &self.spectrum_view {
            Some(view) => {
                ui.label(
                    RichText::new(&view.annotation)
                        .color(Color32::LIGHT_BLUE)
                        .size(18.0),
                );
                ui.columns(2, |columns| {
                    for (idx, (column, panel)) in
                        columns.iter_mut().zip(view.panels.iter()).enumerate()
                    {
                        let id = format!("Spectrum{idx}");
                        render_panel(column, &id, view, panel, PLOT_COLORS[idx]);
                    }
                });
            }
            None => {
                ui.label("Run the analysis or press View to display the calibrated spectra.");
            }
        });

        ctx.request_repaint_after(std::time::Duration::from_secs(1));
    }
}
