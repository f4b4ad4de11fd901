/// Theme system — switchable color themes for the application
///
/// Provides a Light ("Chart paper") and a Dark ("Night shift") theme.

use super::strip_view::EditMode;

/// Available themes
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AppTheme {
    Light,
    Night,
}

impl AppTheme {
    pub fn label(&self) -> &'static str {
        match self {
            AppTheme::Light => "☀ Light",
            AppTheme::Night => "🌙 Night",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            AppTheme::Light => AppTheme::Night,
            AppTheme::Night => AppTheme::Light,
        }
    }
}

/// All colors a theme needs to provide
#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Panels & backgrounds
    pub panel_fill: egui::Color32,
    pub window_fill: egui::Color32,
    pub faint_bg: egui::Color32,

    // Widgets
    pub widget_bg: egui::Color32,
    pub widget_bg_stroke: egui::Color32,
    pub widget_inactive_bg: egui::Color32,
    pub widget_hovered_bg: egui::Color32,
    pub widget_hovered_stroke: egui::Color32,
    pub widget_active_bg: egui::Color32,
    pub widget_active_fg: egui::Color32,

    pub selection_bg: egui::Color32,
    pub selection_stroke: egui::Color32,

    // Text
    pub text_secondary: egui::Color32,
    pub text_muted: egui::Color32,
    pub error: egui::Color32,

    // Strip overlays
    pub square_outline: egui::Color32,
    pub anchor_outline: egui::Color32,
    pub band_outline: egui::Color32,
    pub band_selected: egui::Color32,
    pub zero_line: egui::Color32,
    pub trace_line: egui::Color32,
    pub pinned_marker: egui::Color32,

    // Waveform plot
    pub waveform_line: egui::Color32,

    // Status bar
    pub status_bar_bg: egui::Color32,
    pub status_text: egui::Color32,

    pub shadow_color: egui::Color32,
    pub is_dark: bool,
}

impl ThemeColors {
    pub fn from_theme(theme: AppTheme) -> Self {
        match theme {
            AppTheme::Light => Self::light(),
            AppTheme::Night => Self::night(),
        }
    }

    fn light() -> Self {
        Self {
            panel_fill: egui::Color32::from_rgb(0xF7, 0xF7, 0xF8),
            window_fill: egui::Color32::from_rgb(0xFF, 0xFF, 0xFF),
            faint_bg: egui::Color32::from_rgb(0xF0, 0xF1, 0xF3),

            widget_bg: egui::Color32::from_rgb(0xEB, 0xEC, 0xEE),
            widget_bg_stroke: egui::Color32::from_rgb(0xD0, 0xD2, 0xD6),
            widget_inactive_bg: egui::Color32::from_rgb(0xE3, 0xE5, 0xE8),
            widget_hovered_bg: egui::Color32::from_rgb(0xD8, 0xDD, 0xE6),
            widget_hovered_stroke: egui::Color32::from_rgb(0x5B, 0x9B, 0xD5),
            widget_active_bg: egui::Color32::from_rgb(0x3B, 0x7D, 0xC0),
            widget_active_fg: egui::Color32::WHITE,

            selection_bg: egui::Color32::from_rgba_premultiplied(0x3B, 0x7D, 0xC0, 0x40),
            selection_stroke: egui::Color32::from_rgb(0x3B, 0x7D, 0xC0),

            text_secondary: egui::Color32::from_rgb(0x44, 0x48, 0x52),
            text_muted: egui::Color32::from_rgb(0x88, 0x8C, 0x94),
            error: egui::Color32::from_rgb(0xD0, 0x30, 0x30),

            square_outline: egui::Color32::from_rgb(0x00, 0x90, 0x40),
            anchor_outline: egui::Color32::from_rgb(0x20, 0x50, 0xD0),
            band_outline: egui::Color32::from_rgb(0x90, 0x90, 0x98),
            band_selected: egui::Color32::from_rgb(0xE0, 0x80, 0x00),
            zero_line: egui::Color32::from_rgb(0x20, 0xA0, 0xA0),
            trace_line: egui::Color32::from_rgb(0x1A, 0x47, 0x80),
            pinned_marker: egui::Color32::from_rgb(0xD0, 0x30, 0x30),

            waveform_line: egui::Color32::from_rgb(0x1A, 0x47, 0x80),

            status_bar_bg: egui::Color32::from_rgb(0xF0, 0xF1, 0xF3),
            status_text: egui::Color32::from_rgb(0x44, 0x48, 0x52),

            shadow_color: egui::Color32::from_rgba_premultiplied(0, 0, 0, 25),
            is_dark: false,
        }
    }

    fn night() -> Self {
        Self {
            panel_fill: egui::Color32::from_rgb(0x16, 0x18, 0x1D),
            window_fill: egui::Color32::from_rgb(0x1C, 0x1E, 0x24),
            faint_bg: egui::Color32::from_rgb(0x20, 0x23, 0x2A),

            widget_bg: egui::Color32::from_rgb(0x24, 0x27, 0x2F),
            widget_bg_stroke: egui::Color32::from_rgb(0x38, 0x3C, 0x46),
            widget_inactive_bg: egui::Color32::from_rgb(0x2A, 0x2D, 0x36),
            widget_hovered_bg: egui::Color32::from_rgb(0x33, 0x37, 0x42),
            widget_hovered_stroke: egui::Color32::from_rgb(0x6A, 0xB0, 0xF0),
            widget_active_bg: egui::Color32::from_rgb(0x3B, 0x7D, 0xC0),
            widget_active_fg: egui::Color32::WHITE,

            selection_bg: egui::Color32::from_rgba_premultiplied(0x6A, 0xB0, 0xF0, 0x40),
            selection_stroke: egui::Color32::from_rgb(0x6A, 0xB0, 0xF0),

            text_secondary: egui::Color32::from_rgb(0xB8, 0xBC, 0xC6),
            text_muted: egui::Color32::from_rgb(0x7A, 0x7E, 0x88),
            error: egui::Color32::from_rgb(0xFF, 0x55, 0x55),

            square_outline: egui::Color32::from_rgb(0x40, 0xE0, 0x80),
            anchor_outline: egui::Color32::from_rgb(0x60, 0xA0, 0xFF),
            band_outline: egui::Color32::from_rgb(0x70, 0x74, 0x80),
            band_selected: egui::Color32::from_rgb(0xFF, 0xB0, 0x30),
            zero_line: egui::Color32::from_rgb(0x40, 0xD0, 0xD0),
            trace_line: egui::Color32::from_rgb(0x00, 0xC0, 0xFF),
            pinned_marker: egui::Color32::from_rgb(0xFF, 0x50, 0x70),

            waveform_line: egui::Color32::from_rgb(0x00, 0xE5, 0xFF),

            status_bar_bg: egui::Color32::from_rgb(0x10, 0x12, 0x16),
            status_text: egui::Color32::from_rgb(0xB8, 0xBC, 0xC6),

            shadow_color: egui::Color32::from_rgba_premultiplied(0, 0, 0, 60),
            is_dark: true,
        }
    }
}

/// Apply a theme to the egui context
pub fn apply_theme(ctx: &egui::Context, theme: AppTheme) {
    let c = ThemeColors::from_theme(theme);

    let mut visuals = if c.is_dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    visuals.panel_fill = c.panel_fill;
    visuals.window_fill = c.window_fill;
    visuals.faint_bg_color = c.faint_bg;

    visuals.widgets.noninteractive.bg_fill = c.widget_bg;
    visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(0.5, c.widget_bg_stroke);
    visuals.widgets.noninteractive.corner_radius = egui::CornerRadius::same(3);
    visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, c.text_secondary);

    visuals.widgets.inactive.bg_fill = c.widget_inactive_bg;
    visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(4);

    visuals.widgets.hovered.bg_fill = c.widget_hovered_bg;
    visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, c.widget_hovered_stroke);

    visuals.widgets.active.bg_fill = c.widget_active_bg;
    visuals.widgets.active.fg_stroke = egui::Stroke::new(1.5, c.widget_active_fg);

    visuals.selection.bg_fill = c.selection_bg;
    visuals.selection.stroke = egui::Stroke::new(1.5, c.selection_stroke);

    visuals.window_shadow = egui::epaint::Shadow {
        offset: [0, 2],
        blur: 8,
        spread: 0,
        color: c.shadow_color,
    };

    ctx.set_visuals(visuals);
}

/// Label, hint and color for the strip view's current interaction mode
pub fn cursor_mode_label(mode: EditMode, cropped: bool) -> (&'static str, &'static str, egui::Color32) {
    match mode {
        EditMode::Square => (
            "▢ SQUARE",
            "Drag the diagonal of one 10 mm square",
            egui::Color32::from_rgb(0x00, 0x90, 0x40),
        ),
        EditMode::Anchors => (
            "⌖ ANCHORS",
            "Drag from the top-left to the bottom-right lead corner",
            egui::Color32::from_rgb(0x20, 0x50, 0xD0),
        ),
        EditMode::Edit if cropped => (
            "✎ EDIT",
            "Left-drag pins · right-drag unpins · scroll moves zero line · drag band edges",
            egui::Color32::from_rgb(0xE0, 0x80, 0x00),
        ),
        EditMode::Edit => (
            "✎ EDIT",
            "Crop the strip first",
            egui::Color32::from_rgb(0x88, 0x8C, 0x94),
        ),
    }
}
