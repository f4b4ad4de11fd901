/// Main application state and eframe::App implementation
///
/// Ties together the session, the GUI panels and the background crop.

use std::path::{Path, PathBuf};

use eframe::egui;

use ecg_digitizer::data::settings::Settings;
use ecg_digitizer::pipeline::calibration::CalibratedLead;
use ecg_digitizer::pipeline::event::OperatorEvent;
use ecg_digitizer::pipeline::normalize::PendingCrop;
use ecg_digitizer::{Session, SourceImage};

use crate::gui::parameters_panel::{self, ParametersAction, ParametersPanelState};
use crate::gui::strip_view::{self, EditMode, StripViewState};
use crate::gui::theme::{self, AppTheme, ThemeColors};
use crate::gui::toolbar::{self, ToolbarAction};
use crate::gui::waveform_view;

/// The main application
pub struct EcgApp {
    session: Session,
    /// Crop running on a worker thread
    pending_crop: Option<PendingCrop>,
    mode: EditMode,

    /// Calibrated leads for the waveform plot, rebuilt after each change
    calibrated: Option<Vec<CalibratedLead>>,
    calibrated_dirty: bool,

    /// GUI sub-states
    parameters_state: ParametersPanelState,
    strip_view_state: StripViewState,

    status_message: String,
    show_log_window: bool,
    show_about: bool,

    current_theme: AppTheme,
    theme_colors: ThemeColors,

    /// Dropped files buffer
    dropped_files: Vec<PathBuf>,
}

impl EcgApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings, images: Vec<PathBuf>) -> Self {
        let default_theme = AppTheme::Light;
        theme::apply_theme(&cc.egui_ctx, default_theme);

        let ppi = cc.egui_ctx.pixels_per_point();
        let base_size = if ppi > 1.5 { 14.0 } else { 13.0 };
        let mut style = (*cc.egui_ctx.style()).clone();
        style.text_styles.insert(
            egui::TextStyle::Body,
            egui::FontId::new(base_size, egui::FontFamily::Proportional),
        );
        style.text_styles.insert(
            egui::TextStyle::Button,
            egui::FontId::new(base_size, egui::FontFamily::Proportional),
        );
        style.text_styles.insert(
            egui::TextStyle::Heading,
            egui::FontId::new(base_size * 1.25, egui::FontFamily::Proportional),
        );
        style.spacing.item_spacing = egui::vec2(8.0, 5.0);
        style.spacing.button_padding = egui::vec2(8.0, 4.0);
        cc.egui_ctx.set_style(style);

        let mut app = Self {
            session: Session::new(settings),
            pending_crop: None,
            mode: EditMode::Square,
            calibrated: None,
            calibrated_dirty: false,
            parameters_state: ParametersPanelState::default(),
            strip_view_state: StripViewState::default(),
            status_message: "Ready — open ECG strip images to begin".to_string(),
            show_log_window: false,
            show_about: false,
            current_theme: default_theme,
            theme_colors: ThemeColors::from_theme(default_theme),
            dropped_files: Vec::new(),
        };
        app.open_images(&images);
        app.parameters_state.sync_from(&app.session);
        app
    }

    fn open_images(&mut self, paths: &[PathBuf]) {
        for path in paths {
            match SourceImage::open(path) {
                Ok(source) => {
                    self.status_message = format!(
                        "Loaded: {} ({}×{})",
                        source.id,
                        source.image.width(),
                        source.image.height()
                    );
                    self.session.add_image(source);
                }
                Err(e) => {
                    self.status_message = format!("Error loading {}: {}", path.display(), e);
                    log::error!("Load error: {}", e);
                }
            }
        }
        self.parameters_state.sync_from(&self.session);
        self.calibrated_dirty = true;
    }

    /// Apply an event and reflect the outcome in the status bar
    fn apply(&mut self, event: OperatorEvent) {
        let marks = matches!(
            event,
            OperatorEvent::SetCalibrationCorner { .. } | OperatorEvent::SetChannelAnchor { .. }
        );
        if marks && self.pending_crop.is_some() {
            self.status_message = "Crop running; marks are locked until it finishes".to_string();
            return;
        }
        let navigates = matches!(event, OperatorEvent::NextImage | OperatorEvent::PrevImage);
        let field = match &event {
            OperatorEvent::SetField { field, .. } => Some(*field),
            _ => None,
        };
        let description = event.to_string();

        match self.session.apply(event) {
            Ok(()) => {
                if let Some(field) = field {
                    self.parameters_state.clear_error(field);
                }
                if navigates {
                    self.pending_crop = None;
                    self.mode = EditMode::Square;
                    self.parameters_state.sync_from(&self.session);
                }
                self.calibrated_dirty = true;
                self.status_message = description;
            }
            Err(e) => {
                if let Some(field) = field {
                    self.parameters_state.set_error(field, e.to_string());
                }
                log::debug!("Rejected event ({}): {}", description, e);
                self.status_message = e.to_string();
            }
        }
    }

    fn start_crop(&mut self) {
        match self.session.begin_crop() {
            Ok(pending) => {
                self.pending_crop = Some(pending);
                self.status_message = "Cropping…".to_string();
            }
            Err(e) => {
                self.status_message = format!("Crop failed: {}", e);
                log::error!("Crop failed: {}", e);
            }
        }
    }

    fn poll_crop(&mut self, ctx: &egui::Context) {
        let Some(pending) = &self.pending_crop else {
            return;
        };
        match pending.poll() {
            None => ctx.request_repaint(),
            Some(result) => {
                self.pending_crop = None;
                match self.session.finish_crop(result) {
                    Ok(()) => {
                        self.mode = EditMode::Edit;
                        self.calibrated_dirty = true;
                        self.status_message = "Strip normalized — extract traces next".to_string();
                    }
                    Err(e) => {
                        self.status_message = format!("Crop failed: {}", e);
                        log::error!("Crop failed: {}", e);
                    }
                }
            }
        }
    }

    fn refresh_calibrated(&mut self) {
        if !self.calibrated_dirty {
            return;
        }
        self.calibrated_dirty = false;
        self.calibrated = if self.session.traces().is_empty() {
            None
        } else {
            match self.session.calibrated_leads() {
                Ok(leads) => Some(leads),
                Err(e) => {
                    self.status_message = format!("Calibration failed: {}", e);
                    None
                }
            }
        };
    }

    /// Output samples per second of strip time for the waveform plot
    fn sample_rate(&self, samples: usize) -> f64 {
        let Some(strip) = self.session.strip() else {
            return 1.0;
        };
        let seconds = strip.width() as f64 / strip.square_side * 10.0 / self.session.settings().calibration.speed;
        if seconds > 0.0 && samples > 0 {
            samples as f64 / seconds
        } else {
            1.0
        }
    }

    fn export_csv(&mut self, path: &Path) -> Result<(), String> {
        let csv = self.session.export_csv().map_err(|e| e.to_string())?;
        std::fs::write(path, csv).map_err(|e| format!("Write error: {}", e))?;
        log::info!("Exported {}", path.display());
        Ok(())
    }

    /// Handle toolbar actions
    fn handle_toolbar_action(&mut self, action: ToolbarAction) {
        match action {
            ToolbarAction::OpenImages => {
                if let Some(paths) = toolbar::open_images_dialog() {
                    self.open_images(&paths);
                }
            }
            ToolbarAction::SaveSession => {
                let default_name = self
                    .session
                    .current_image()
                    .map(|s| format!("{}.ecgsession", s.id))
                    .unwrap_or_else(|| "session.ecgsession".to_string());
                if let Some(path) = toolbar::save_session_dialog(&default_name) {
                    match self.session.save(&path) {
                        Ok(()) => self.status_message = format!("Session saved: {}", path.display()),
                        Err(e) => self.status_message = format!("Save failed: {}", e),
                    }
                }
            }
            ToolbarAction::LoadSession => {
                if let Some(path) = toolbar::load_session_dialog() {
                    match Session::load(&path) {
                        Ok(session) => {
                            self.session = session;
                            self.pending_crop = None;
                            self.mode = if self.session.strip().is_some() {
                                EditMode::Edit
                            } else {
                                EditMode::Square
                            };
                            self.parameters_state.sync_from(&self.session);
                            self.calibrated_dirty = true;
                            self.status_message = format!("Session loaded: {}", path.display());
                        }
                        Err(e) => self.status_message = format!("Load failed: {}", e),
                    }
                }
            }
            ToolbarAction::LoadSettings => {
                if let Some(path) = toolbar::load_settings_dialog() {
                    match Settings::load_json(&path) {
                        Ok(settings) => {
                            // Settings apply to a fresh session over the same images
                            let images: Vec<PathBuf> =
                                self.session.images().iter().filter_map(|s| s.path.clone()).collect();
                            self.session = Session::new(settings);
                            self.pending_crop = None;
                            self.mode = EditMode::Square;
                            self.open_images(&images);
                            self.status_message = format!("Settings loaded: {}", path.display());
                        }
                        Err(e) => self.status_message = format!("Settings rejected: {}", e),
                    }
                }
            }
            ToolbarAction::ExportCsv => match self.session.export_filename() {
                Ok(default_name) => {
                    if let Some(path) = toolbar::save_csv_dialog(&default_name) {
                        match self.export_csv(&path) {
                            Ok(()) => self.status_message = format!("CSV saved: {}", path.display()),
                            Err(e) => self.status_message = format!("Export failed: {}", e),
                        }
                    }
                }
                Err(e) => self.status_message = format!("Nothing to export: {}", e),
            },
            ToolbarAction::ExportLog => {
                if let Some(path) = toolbar::save_log_dialog() {
                    let ext = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_default();
                    let result = match ext.as_str() {
                        "json" => self.session.log().save_json(&path),
                        _ => self.session.log().save_text(&path),
                    };
                    match result {
                        Ok(_) => self.status_message = format!("Log saved: {}", path.display()),
                        Err(e) => self.status_message = format!("Error saving log: {}", e),
                    }
                }
            }
            ToolbarAction::ExportReplayScript => {
                if let Some(path) = toolbar::save_script_dialog() {
                    match self.session.log().save_script(&path) {
                        Ok(_) => self.status_message = format!("Replay script saved: {}", path.display()),
                        Err(e) => self.status_message = format!("Error saving script: {}", e),
                    }
                }
            }
            ToolbarAction::PrevImage => self.apply(OperatorEvent::PrevImage),
            ToolbarAction::NextImage => self.apply(OperatorEvent::NextImage),
            ToolbarAction::ShowAbout => {
                self.show_about = true;
            }
            ToolbarAction::ThemeToggle => {
                self.current_theme = self.current_theme.next();
                self.theme_colors = ThemeColors::from_theme(self.current_theme);
            }
            ToolbarAction::None => {}
        }
    }

    fn handle_parameters_action(&mut self, action: ParametersAction) {
        match action {
            ParametersAction::SetMode(mode) => self.mode = mode,
            ParametersAction::Crop => self.start_crop(),
            ParametersAction::Apply(event) => {
                let extracting = event == OperatorEvent::Extract;
                self.apply(event);
                if extracting && !self.session.traces().is_empty() {
                    self.mode = EditMode::Edit;
                }
            }
            ParametersAction::None => {}
        }
    }

    fn image_label(&self) -> String {
        match self.session.current_image() {
            Some(source) => format!(
                "{} ({}/{})",
                source.id,
                self.session.current_index() + 1,
                self.session.images().len()
            ),
            None => "no image".to_string(),
        }
    }
}

impl eframe::App for EcgApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        theme::apply_theme(ctx, self.current_theme);

        ctx.input(|i| {
            for file in &i.raw.dropped_files {
                if let Some(path) = &file.path {
                    self.dropped_files.push(path.clone());
                }
            }
        });
        if !self.dropped_files.is_empty() {
            let files = std::mem::take(&mut self.dropped_files);
            self.open_images(&files);
        }

        self.poll_crop(ctx);

        // ── Toolbar ──
        let action = toolbar::show_toolbar(ctx, self.current_theme.label(), &self.image_label());
        self.handle_toolbar_action(action);

        // ── Status bar ──
        let colors = self.theme_colors.clone();
        egui::TopBottomPanel::bottom("status_bar")
            .frame(egui::Frame::new().fill(colors.status_bar_bg).inner_margin(egui::Margin::symmetric(8, 3)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let (label, hint, color) = theme::cursor_mode_label(self.mode, self.session.strip().is_some());
                    ui.label(egui::RichText::new(label).strong().color(color));
                    ui.label(egui::RichText::new(hint).size(11.5).color(colors.text_muted));
                    ui.separator();
                    ui.label(egui::RichText::new(&self.status_message).color(colors.status_text));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("📋 Log").clicked() {
                            self.show_log_window = !self.show_log_window;
                        }
                    });
                });
            });

        // ── Parameters ──
        let crop_running = self.pending_crop.is_some();
        let mut params_action = ParametersAction::None;
        egui::SidePanel::left("parameters_panel")
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    params_action = parameters_panel::show_parameters_panel(
                        ui,
                        &mut self.parameters_state,
                        &self.session,
                        self.mode,
                        crop_running,
                        &colors,
                    );
                });
            });
        self.handle_parameters_action(params_action);

        // ── Waveform ──
        self.refresh_calibrated();
        let selected = self.session.selected_lead();
        let lead = self.calibrated.as_ref().and_then(|leads| leads.get(selected));
        let rate = self.sample_rate(lead.map(|l| l.samples_mv.len()).unwrap_or(0));
        egui::TopBottomPanel::bottom("waveform_panel")
            .resizable(true)
            .default_height(200.0)
            .show(ctx, |ui| {
                waveform_view::show_waveform(ui, lead, rate, &colors);
            });

        // ── Strip ──
        let mut events = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            events = strip_view::show_strip_view(
                ui,
                &mut self.strip_view_state,
                &self.session,
                self.mode,
                &colors,
            );
        });
        for event in events {
            self.apply(event);
        }

        // ── Windows ──
        if self.show_log_window {
            let mut open = true;
            egui::Window::new("📋 Session Log")
                .open(&mut open)
                .default_width(520.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for entry in &self.session.log().entries {
                            ui.monospace(entry.to_text());
                        }
                    });
                });
            self.show_log_window = open;
        }

        if self.show_about {
            let mut open = true;
            egui::Window::new("About")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.heading("ECG Strip Digitizer");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.label("Converts photographed ECG paper strips into calibrated CSV data.");
                });
            self.show_about = open;
        }
    }
}
