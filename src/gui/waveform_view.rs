/// Waveform view — calibrated millivolt preview of the selected lead

use egui_plot::{HLine, Line, Plot, PlotPoints, PlotUi};

use ecg_digitizer::pipeline::calibration::CalibratedLead;

use super::theme::ThemeColors;

/// Plot `lead` against time in seconds; `sample_rate` is samples per second.
pub fn show_waveform(ui: &mut egui::Ui, lead: Option<&CalibratedLead>, sample_rate: f64, colors: &ThemeColors) {
    let Some(lead) = lead else {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("Extract traces to see the calibrated waveform").color(colors.text_muted));
        });
        return;
    };

    let points: PlotPoints = lead
        .samples_mv
        .iter()
        .enumerate()
        .map(|(i, &mv)| [i as f64 / sample_rate, mv])
        .collect();
    let line = Line::new(points)
        .name(&lead.name)
        .color(colors.waveform_line)
        .width(1.2);

    Plot::new("waveform")
        .height(ui.available_height() - 4.0)
        .x_axis_label("Time (s)")
        .y_axis_label("mV")
        .allow_drag(true)
        .allow_zoom(true)
        .allow_scroll(true)
        .show_grid([true, true])
        .legend(
            egui_plot::Legend::default()
                .position(egui_plot::Corner::RightTop)
                .background_alpha(0.6),
        )
        .show(ui, |plot_ui: &mut PlotUi| {
            plot_ui.hline(HLine::new(0.0).color(colors.band_outline).width(0.5));
            plot_ui.line(line);
        });
}
