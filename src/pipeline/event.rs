/// Operator events
///
/// Every mutation of a [`Session`](super::session::Session) is expressed as
/// one of these values. They serialize to tagged JSON so a sequence of them
/// doubles as a replay script for the headless binary.

use serde::{Deserialize, Serialize};

use crate::data::geometry::Point2D;
use crate::data::settings::SettingField;

/// Which of the two operator-placed points is being set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    /// Top-left
    First,
    /// Bottom-right
    Second,
}

/// Edge of a lead band moved by a resize drag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandEdge {
    Top,
    Bottom,
}

/// Point coordinates are source-image pixels for the calibration and anchor
/// events and normalized-strip pixels for everything after the crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum OperatorEvent {
    SetCalibrationCorner { corner: Corner, point: Point2D },
    SetChannelAnchor { corner: Corner, point: Point2D },
    Crop,
    Extract,
    SelectLead { index: usize },
    /// Pin the selected lead at the pointer
    DragPoint { x: f64, y: f64 },
    /// Release pins around the pointer column of the selected lead
    ClearPinsNear { x: f64 },
    Recompute,
    ResizeBand { lead: usize, edge: BandEdge, delta: f64 },
    ScrollZeroLine { lead: usize, delta: f64 },
    /// Raw operator text, validated when applied
    SetField { field: SettingField, text: String },
    NextImage,
    PrevImage,
}

impl OperatorEvent {
    /// Short operation name for the reproducibility log
    pub fn name(&self) -> &'static str {
        match self {
            OperatorEvent::SetCalibrationCorner { .. } => "Calibration Corner",
            OperatorEvent::SetChannelAnchor { .. } => "Channel Anchor",
            OperatorEvent::Crop => "Crop",
            OperatorEvent::Extract => "Extract",
            OperatorEvent::SelectLead { .. } => "Select Lead",
            OperatorEvent::DragPoint { .. } => "Pin Point",
            OperatorEvent::ClearPinsNear { .. } => "Clear Pins",
            OperatorEvent::Recompute => "Recompute",
            OperatorEvent::ResizeBand { .. } => "Resize Band",
            OperatorEvent::ScrollZeroLine { .. } => "Move Zero Line",
            OperatorEvent::SetField { .. } => "Set Field",
            OperatorEvent::NextImage => "Next Image",
            OperatorEvent::PrevImage => "Previous Image",
        }
    }
}

impl std::fmt::Display for OperatorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorEvent::SetCalibrationCorner { corner, point } => {
                write!(f, "Calibration square {:?} corner at {}", corner, point)
            }
            OperatorEvent::SetChannelAnchor { corner, point } => {
                write!(f, "Channel anchor {:?} at {}", corner, point)
            }
            OperatorEvent::Crop => write!(f, "Normalize the marked strip"),
            OperatorEvent::Extract => write!(f, "Segment leads and extract traces"),
            OperatorEvent::SelectLead { index } => write!(f, "Select lead {}", index),
            OperatorEvent::DragPoint { x, y } => write!(f, "Pin point at ({:.1}, {:.1})", x, y),
            OperatorEvent::ClearPinsNear { x } => write!(f, "Clear pins near column {:.0}", x),
            OperatorEvent::Recompute => write!(f, "Recompute unpinned points"),
            OperatorEvent::ResizeBand { lead, edge, delta } => {
                write!(f, "Move {:?} edge of lead {} by {:.1} px", edge, lead, delta)
            }
            OperatorEvent::ScrollZeroLine { lead, delta } => {
                write!(f, "Move zero line of lead {} by {:.1} px", lead, delta)
            }
            OperatorEvent::SetField { field, text } => write!(f, "{} = {:?}", field.title(), text),
            OperatorEvent::NextImage => write!(f, "Go to next image"),
            OperatorEvent::PrevImage => write!(f, "Go to previous image"),
        }
    }
}
