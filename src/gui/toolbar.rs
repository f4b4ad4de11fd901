/// Toolbar — top menu bar with file operations and image navigation

use std::path::PathBuf;

/// Actions that can be triggered from the toolbar
#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarAction {
    None,
    OpenImages,
    SaveSession,
    LoadSession,
    LoadSettings,
    ExportCsv,
    ExportLog,
    ExportReplayScript,
    PrevImage,
    NextImage,
    ThemeToggle,
    ShowAbout,
}

/// Render the toolbar and return any triggered action
pub fn show_toolbar(ctx: &egui::Context, theme_label: &str, image_label: &str) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // File menu
            ui.menu_button("📁 File", |ui| {
                if ui.button("📂 Open Images…").clicked() {
                    action = ToolbarAction::OpenImages;
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("💾 Save Session…").clicked() {
                    action = ToolbarAction::SaveSession;
                    ui.close_menu();
                }
                if ui.button("📂 Load Session…").clicked() {
                    action = ToolbarAction::LoadSession;
                    ui.close_menu();
                }
                if ui.button("⚙ Load Settings…").clicked() {
                    action = ToolbarAction::LoadSettings;
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("📊 Export CSV…").clicked() {
                    action = ToolbarAction::ExportCsv;
                    ui.close_menu();
                }
                if ui.button("📋 Export Log…").clicked() {
                    action = ToolbarAction::ExportLog;
                    ui.close_menu();
                }
                if ui.button("▶ Export Replay Script…").clicked() {
                    action = ToolbarAction::ExportReplayScript;
                    ui.close_menu();
                }
            });

            // View menu
            ui.menu_button("🔍 View", |ui| {
                if ui.button(format!("🎨 Theme: {}", theme_label)).clicked() {
                    action = ToolbarAction::ThemeToggle;
                    ui.close_menu();
                }
            });

            // Help menu
            ui.menu_button("❓ Help", |ui| {
                if ui.button("ℹ About").clicked() {
                    action = ToolbarAction::ShowAbout;
                    ui.close_menu();
                }
            });

            ui.separator();
            if ui.button("◀").on_hover_text("Previous image").clicked() {
                action = ToolbarAction::PrevImage;
            }
            ui.label(egui::RichText::new(image_label).size(12.0));
            if ui.button("▶").on_hover_text("Next image").clicked() {
                action = ToolbarAction::NextImage;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.add(egui::Button::new(
                    egui::RichText::new(theme_label).size(12.0)
                ).corner_radius(12.0)).clicked() {
                    action = ToolbarAction::ThemeToggle;
                }
                ui.separator();
                ui.label(
                    egui::RichText::new("ECG Strip Digitizer")
                        .color(egui::Color32::from_rgb(0x70, 0x75, 0x80))
                        .size(12.0),
                );
            });
        });
    });

    action
}

/// Show file-open dialog for strip photos
pub fn open_images_dialog() -> Option<Vec<PathBuf>> {
    rfd::FileDialog::new()
        .set_title("Open ECG Strip Images")
        .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "tif", "tiff"])
        .add_filter("All Files", &["*"])
        .pick_files()
}

pub fn save_session_dialog(default_name: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save Session")
        .set_file_name(default_name)
        .add_filter("ECG Session", &["ecgsession"])
        .save_file()
}

pub fn load_session_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load Session")
        .add_filter("ECG Session", &["ecgsession"])
        .pick_file()
}

pub fn load_settings_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load Settings")
        .add_filter("JSON", &["json"])
        .pick_file()
}

/// Show save dialog for the calibrated CSV
pub fn save_csv_dialog(default_name: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Calibrated Leads")
        .set_file_name(default_name)
        .add_filter("CSV (comma-separated)", &["csv"])
        .save_file()
}

/// Show save dialog for log export
pub fn save_log_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Session Log")
        .add_filter("Text File", &["txt"])
        .add_filter("JSON", &["json"])
        .save_file()
}

pub fn save_script_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Replay Script")
        .set_file_name("replay.json")
        .add_filter("JSON", &["json"])
        .save_file()
}
