pub mod parameters_panel;
pub mod strip_view;
pub mod theme;
pub mod toolbar;
pub mod waveform_view;
