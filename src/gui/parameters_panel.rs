/// Parameters panel — left sidebar with mode, lead and calibration controls

use std::collections::HashMap;

use ecg_digitizer::data::settings::SettingField;
use ecg_digitizer::pipeline::event::OperatorEvent;
use ecg_digitizer::Session;

use super::strip_view::EditMode;
use super::theme::ThemeColors;

const FIELDS: [SettingField; 7] = [
    SettingField::Speed,
    SettingField::Amplitude,
    SettingField::PointsPerSquare,
    SettingField::LeadCount,
    SettingField::SourceId,
    SettingField::Sex,
    SettingField::Qt,
];

/// Text buffers and inline validation messages for the editable fields
#[derive(Debug, Clone, Default)]
pub struct ParametersPanelState {
    texts: HashMap<SettingField, String>,
    errors: HashMap<SettingField, String>,
}

impl ParametersPanelState {
    /// Refill every text box from the session
    pub fn sync_from(&mut self, session: &Session) {
        let s = session.settings();
        let p = session.patient();
        for field in FIELDS {
            let text = match field {
                SettingField::Speed => s.calibration.speed.to_string(),
                SettingField::Amplitude => s.calibration.amplitude.to_string(),
                SettingField::PointsPerSquare => s.calibration.points_per_square.to_string(),
                SettingField::LeadCount => s.lead_count.to_string(),
                SettingField::SourceId => p.source_id.clone(),
                SettingField::Sex => p.sex.to_string(),
                SettingField::Qt => p.qt_ms.to_string(),
            };
            self.texts.insert(field, text);
        }
        self.errors.clear();
    }

    pub fn set_error(&mut self, field: SettingField, message: String) {
        self.errors.insert(field, message);
    }

    pub fn clear_error(&mut self, field: SettingField) {
        self.errors.remove(&field);
    }
}

/// Actions triggered by the parameters panel
#[derive(Debug, Clone, PartialEq)]
pub enum ParametersAction {
    None,
    SetMode(EditMode),
    /// Start the crop on a worker thread
    Crop,
    Apply(OperatorEvent),
}

/// Render the parameters panel in the left sidebar
pub fn show_parameters_panel(
    ui: &mut egui::Ui,
    state: &mut ParametersPanelState,
    session: &Session,
    mode: EditMode,
    crop_running: bool,
    colors: &ThemeColors,
) -> ParametersAction {
    let mut action = ParametersAction::None;

    ui.vertical_centered(|ui| {
        ui.heading("⚙️ Digitize");
    });
    ui.separator();

    if session.current_image().is_none() {
        ui.add_space(12.0);
        ui.label(
            egui::RichText::new("Open a strip photo to begin.")
                .size(12.5)
                .color(colors.text_muted),
        );
        return action;
    }

    ui.label(
        egui::RichText::new(format!("📝 {} ops", session.log().len()))
            .size(11.5)
            .color(egui::Color32::from_rgb(0x66, 0x6C, 0x78)),
    );
    ui.add_space(4.0);

    // ── Mode ──
    ui.horizontal(|ui| {
        for (m, label) in [
            (EditMode::Square, "▢ Square"),
            (EditMode::Anchors, "⌖ Anchors"),
            (EditMode::Edit, "✎ Edit"),
        ] {
            if ui.selectable_label(mode == m, label).clicked() && mode != m {
                action = ParametersAction::SetMode(m);
            }
        }
    });
    ui.separator();

    // ── Steps ──
    ui.horizontal(|ui| {
        let can_crop = session.calibration_square().is_some()
            && session.channel_anchors().is_some()
            && !crop_running;
        if ui.add_enabled(can_crop, egui::Button::new("✂ Crop")).clicked() {
            action = ParametersAction::Crop;
        }
        if crop_running {
            ui.spinner();
        }
        let cropped = session.strip().is_some();
        if ui.add_enabled(cropped, egui::Button::new("📈 Extract")).clicked() {
            action = ParametersAction::Apply(OperatorEvent::Extract);
        }
        let extracted = !session.traces().is_empty();
        if ui.add_enabled(extracted, egui::Button::new("🔄 Recompute")).clicked() {
            action = ParametersAction::Apply(OperatorEvent::Recompute);
        }
    });

    // ── Lead selector ──
    let names = session.lead_names();
    let selected = session.selected_lead();
    egui::ComboBox::from_label("Lead")
        .selected_text(names.get(selected).cloned().unwrap_or_default())
        .show_ui(ui, |ui| {
            for (i, name) in names.iter().enumerate() {
                if ui.selectable_label(i == selected, name).clicked() && i != selected {
                    action = ParametersAction::Apply(OperatorEvent::SelectLead { index: i });
                }
            }
        });
    if let Some(trace) = session.traces().get(selected) {
        ui.label(
            egui::RichText::new(format!("{} points, {} pinned", trace.len(), trace.pinned_count()))
                .size(11.5)
                .color(egui::Color32::from_rgb(0x66, 0x6C, 0x78)),
        );
    }
    ui.separator();

    // ── Fields ──
    ui.collapsing("📏 Calibration", |ui| {
        for field in [SettingField::Speed, SettingField::Amplitude, SettingField::PointsPerSquare] {
            field_row(ui, state, field, colors, &mut action);
        }
        if let Some(strip) = session.strip() {
            ui.label(
                egui::RichText::new(format!("Square side: {:.2} px", strip.square_side))
                    .size(11.5)
                    .color(egui::Color32::from_rgb(0x66, 0x6C, 0x78)),
            );
        }
    });
    ui.collapsing("📊 Leads", |ui| {
        field_row(ui, state, SettingField::LeadCount, colors, &mut action);
    });
    ui.collapsing("🧾 Patient", |ui| {
        for field in [SettingField::SourceId, SettingField::Sex, SettingField::Qt] {
            field_row(ui, state, field, colors, &mut action);
        }
    });

    action
}

/// Text edit committed on Enter or focus loss; the error, if any, is shown below
fn field_row(
    ui: &mut egui::Ui,
    state: &mut ParametersPanelState,
    field: SettingField,
    colors: &ThemeColors,
    action: &mut ParametersAction,
) {
    let text = state.texts.entry(field).or_default();
    let response = ui
        .horizontal(|ui| {
            ui.label(field.title());
            ui.add(egui::TextEdit::singleline(text).desired_width(90.0))
        })
        .inner;
    if response.lost_focus() {
        *action = ParametersAction::Apply(OperatorEvent::SetField {
            field,
            text: text.clone(),
        });
    }
    if let Some(message) = state.errors.get(&field) {
        ui.label(
            egui::RichText::new(message)
                .size(11.0)
                .color(colors.error),
        );
    }
}
