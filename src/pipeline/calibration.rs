/// Calibration and unit conversion
///
/// Pixel rows (relative to the band) become millivolts through the
/// calibration square: 10 mm per `square_side` pixels, `amplitude` mm per mV.
/// The sequence is then resampled to the density implied by paper speed and
/// the requested points per square.

use crate::data::settings::CalibrationSettings;
use crate::error::{DigitizeError, Result};

/// Calibrated millivolt samples for one lead
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedLead {
    pub name: String,
    pub samples_mv: Vec<f64>,
}

pub fn mm_per_pixel(square_side: f64) -> f64 {
    10.0 / square_side
}

pub fn mv_per_pixel(square_side: f64, amplitude: f64) -> f64 {
    mm_per_pixel(square_side) / amplitude
}

/// `(zero_point - y) * mv_per_pixel`; image rows grow downward, voltage up
pub fn to_millivolts(ys: &[f64], zero_point: f64, square_side: f64, amplitude: f64) -> Vec<f64> {
    let scale = mv_per_pixel(square_side, amplitude);
    ys.iter().map(|y| (zero_point - y) * scale).collect()
}

/// Resampling may grow a lead at most this many times its column count
pub const MAX_RESAMPLE_FACTOR: usize = 100;

/// Output length for `len` input columns
pub fn resampled_length(len: usize, square_side: f64, settings: &CalibrationSettings) -> usize {
    let current_per_square = (settings.speed / 10.0) * (square_side / settings.points_per_square);
    let scale = settings.points_per_square / current_per_square;
    (len as f64 * scale).round() as usize
}

/// Linear interpolation up to `new_len` samples; endpoints are kept.
pub fn interpolate(values: &[f64], new_len: usize) -> Vec<f64> {
    match (values.len(), new_len) {
        (_, 0) => Vec::new(),
        (0, _) => Vec::new(),
        (1, n) => vec![values[0]; n],
        (_, 1) => vec![values[0]],
        (len, n) => {
            let step = (len - 1) as f64 / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let pos = i as f64 * step;
                    let lo = (pos.floor() as usize).min(len - 1);
                    let hi = (lo + 1).min(len - 1);
                    let frac = pos - lo as f64;
                    values[lo] + (values[hi] - values[lo]) * frac
                })
                .collect()
        }
    }
}

/// Nearest-neighbour decimation down to `new_len` samples.
pub fn thin(values: &[f64], new_len: usize) -> Vec<f64> {
    thin_indices(values.len(), new_len)
        .into_iter()
        .map(|i| values[i])
        .collect()
}

/// Source index picked for each output sample by [`thin`]; non-decreasing.
pub fn thin_indices(len: usize, new_len: usize) -> Vec<usize> {
    match (len, new_len) {
        (0, _) | (_, 0) => Vec::new(),
        (_, 1) => vec![0],
        (len, n) => {
            let step = (len - 1) as f64 / (n - 1) as f64;
            (0..n)
                .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
                .collect()
        }
    }
}

/// Grow with [`interpolate`], shrink with [`thin`]
pub fn resample(values: &[f64], new_len: usize) -> Vec<f64> {
    use std::cmp::Ordering;
    match new_len.cmp(&values.len()) {
        Ordering::Greater => interpolate(values, new_len),
        Ordering::Less => thin(values, new_len),
        Ordering::Equal => values.to_vec(),
    }
}

/// Full conversion of one lead's pixel rows
pub fn calibrate_lead(
    name: &str,
    ys: &[f64],
    zero_point: f64,
    square_side: f64,
    settings: &CalibrationSettings,
) -> Result<CalibratedLead> {
    settings.validate()?;
    if !square_side.is_finite() || square_side <= 0.0 {
        return Err(DigitizeError::InvalidSetting {
            name: "square_side",
            value: square_side,
        });
    }
    let mv = to_millivolts(ys, zero_point, square_side, settings.amplitude);
    let new_len = resampled_length(mv.len(), square_side, settings);
    if new_len > mv.len().max(1).saturating_mul(MAX_RESAMPLE_FACTOR) {
        return Err(DigitizeError::InvalidSetting {
            name: "points_per_square",
            value: settings.points_per_square,
        });
    }
    log::debug!(
        "Calibrating {}: {} columns -> {} samples ({:.4} mV/px)",
        name,
        mv.len(),
        new_len,
        mv_per_pixel(square_side, settings.amplitude)
    );
    Ok(CalibratedLead {
        name: name.to_string(),
        samples_mv: resample(&mv, new_len),
    })
}
