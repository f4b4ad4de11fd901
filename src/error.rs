/// Error type shared by every pipeline stage.

use std::io;
use thiserror::Error;

use crate::data::geometry::GeometryError;

#[derive(Error, Debug)]
pub enum DigitizeError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("No cropped strip available: run the crop step first")]
    NoCrop,
    #[error("No source image loaded")]
    NoImage,
    #[error("{what} is not set")]
    Missing { what: &'static str },
    #[error("Lead sequences differ in length: {name} has {got} samples, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Export has {headers} headers but {columns} columns")]
    HeaderMismatch { headers: usize, columns: usize },
    #[error("Value in field \"{field}\" {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("Invalid setting {name}: {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("Lead index {index} out of range ({count} leads)")]
    LeadOutOfRange { index: usize, count: usize },
    #[error("Already at the {0} image")]
    EndOfImages(&'static str),
    #[error("Crop worker stopped before delivering a result")]
    CropWorker,
    #[error("Marks changed while the crop was running; crop again")]
    StaleCrop,
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DigitizeError>;
