/// Digitizer for photographed or scanned ECG paper strips.
///
/// The operator marks the printed calibration square and the corners of the
/// lead grid; the strip is then de-rotated, split into lead bands, traced,
/// hand-corrected and exported as calibrated millivolt samples.

pub use error::{DigitizeError, Result};
pub use pipeline::event::OperatorEvent;
pub use pipeline::session::{Session, SourceImage};

pub mod data;
pub mod error;
pub mod log;
pub mod pipeline;
