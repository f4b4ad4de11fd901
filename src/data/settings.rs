/// Operator-adjustable settings and boundary validation of typed-in values
///
/// Everything here is plain data with serde so a settings file can be loaded
/// from JSON and a session can be saved with the settings it used.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::leads::Sex;
use crate::error::{DigitizeError, Result};

/// Paper speed, gain and output density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Paper speed in mm/s
    pub speed: f64,
    /// Gain in mm/mV
    pub amplitude: f64,
    /// Output samples per 10 mm calibration square
    pub points_per_square: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            speed: 25.0,
            amplitude: 10.0,
            points_per_square: 10.0,
        }
    }
}

impl CalibrationSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("speed", self.speed),
            ("amplitude", self.amplitude),
            ("points_per_square", self.points_per_square),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DigitizeError::InvalidSetting { name, value });
            }
        }
        Ok(())
    }
}

/// Channel weights for the luma used as darkness proxy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LumaWeights {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl LumaWeights {
    /// ITU-R BT.601
    pub const STANDARD: LumaWeights = LumaWeights {
        r: 0.299,
        g: 0.587,
        b: 0.114,
    };

    /// Red channel ignored; keeps red grid lines from reading as ink
    pub const GREEN_BLUE: LumaWeights = LumaWeights {
        r: 0.0,
        g: 0.587,
        b: 0.114,
    };
}

impl Default for LumaWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Weights of the per-row score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub darkness: f64,
    pub continuity: f64,
    pub centering: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            darkness: 2.0,
            continuity: 3.0,
            centering: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub luma: LumaWeights,
    pub weights: ScoreWeights,
}

/// All session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub calibration: CalibrationSettings,
    pub extraction: ExtractionConfig,
    pub lead_count: usize,
    /// Columns either side of the pointer that a secondary drag un-pins
    pub unpin_radius: usize,
    /// Fit normalized strips into this box (width, height)
    pub target_size: Option<(u32, u32)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calibration: CalibrationSettings::default(),
            extraction: ExtractionConfig::default(),
            lead_count: 12,
            unpin_radius: 15,
            target_size: None,
        }
    }
}

impl Settings {
    pub fn load_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.calibration.validate()?;
        if settings.lead_count == 0 {
            return Err(DigitizeError::InvalidSetting {
                name: "lead_count",
                value: 0.0,
            });
        }
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Operator-editable text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingField {
    Speed,
    Amplitude,
    PointsPerSquare,
    LeadCount,
    SourceId,
    Sex,
    Qt,
}

impl SettingField {
    pub fn title(&self) -> &'static str {
        match self {
            SettingField::Speed => "Speed",
            SettingField::Amplitude => "Amplitude",
            SettingField::PointsPerSquare => "Points per square",
            SettingField::LeadCount => "Lead count",
            SettingField::SourceId => "Source",
            SettingField::Sex => "Sex",
            SettingField::Qt => "QT",
        }
    }
}

/// Parse a strictly positive real number typed into `field`
pub fn parse_positive(field: SettingField, text: &str) -> Result<f64> {
    let value: f64 = text.trim().parse().map_err(|_| invalid(field, "is not a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

/// Parse a non-negative integer typed into `field`
pub fn parse_integer(field: SettingField, text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| invalid(field, "is not Integer"))
}

/// Parse a strictly positive count typed into `field`
pub fn parse_count(field: SettingField, text: &str) -> Result<usize> {
    match parse_integer(field, text)? {
        0 => Err(invalid(field, "must be greater than zero")),
        n => Ok(n as usize),
    }
}

pub fn parse_sex(text: &str) -> Result<Sex> {
    Sex::parse(text).ok_or_else(|| invalid(SettingField::Sex, "must be M, F or U"))
}

fn invalid(field: SettingField, reason: &str) -> DigitizeError {
    DigitizeError::InvalidInput {
        field: field.title().to_string(),
        reason: reason.to_string(),
    }
}
