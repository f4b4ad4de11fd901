/// Digitizing session
///
/// Owns everything an operator builds up for the current strip: loaded
/// images, calibration square, channel anchors, the normalized strip, lead
/// bands, traces, settings and the reproducibility log. All mutations go
/// through [`Session::apply`]; a failed event leaves the session untouched
/// and is not logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{RgbaImage, SubImage};
use serde::{Deserialize, Serialize};

use super::calibration::{calibrate_lead, CalibratedLead};
use super::correction::LeadTrace;
use super::event::{BandEdge, Corner, OperatorEvent};
use super::export;
use super::extract::darkness;
use super::normalize::{normalize_quad, NormalizeOptions, NormalizedStrip, PendingCrop};
use super::raster::SoftwareRasterizer;
use super::segment::{band_view, segment_leads};
use crate::data::geometry::{CalibrationSquare, ChannelAnchors, Point2D};
use crate::data::leads::{lead_names, LeadBox, PatientInfo};
use crate::data::settings::{self, SettingField, Settings};
use crate::error::{DigitizeError, Result};
use crate::log::reproducibility::ReproLog;

/// A decoded strip photo
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// File stem, used as default source id
    pub id: String,
    pub path: Option<PathBuf>,
    pub image: Arc<RgbaImage>,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        log::info!("Opened {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Self {
            id,
            path: Some(path.to_path_buf()),
            image: Arc::new(image),
        })
    }

    pub fn from_rgba(id: &str, image: RgbaImage) -> Self {
        Self {
            id: id.to_string(),
            path: None,
            image: Arc::new(image),
        }
    }
}

/// Serializable session state for save/load
#[derive(Serialize, Deserialize)]
struct SessionSave {
    version: u32,
    images: Vec<PathBuf>,
    current: usize,
    settings: Settings,
    patient: PatientInfo,
    square_corners: [Option<Point2D>; 2],
    anchor_corners: [Option<Point2D>; 2],
    cropped: bool,
    boxes: Vec<LeadBox>,
    traces: Vec<LeadTrace>,
    selected_lead: usize,
    log: ReproLog,
}

const SESSION_VERSION: u32 = 1;

#[derive(Debug, Default)]
pub struct Session {
    images: Vec<SourceImage>,
    current: usize,
    square_corners: [Option<Point2D>; 2],
    anchor_corners: [Option<Point2D>; 2],
    strip: Option<NormalizedStrip>,
    boxes: Vec<LeadBox>,
    traces: Vec<LeadTrace>,
    selected_lead: usize,
    settings: Settings,
    patient: PatientInfo,
    log: ReproLog,
    /// Image and marks a deferred crop was started with
    crop_marks: Option<CropMarks>,
}

type CropMarks = (usize, [Option<Point2D>; 2], [Option<Point2D>; 2]);

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    // ── Read access ──

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_image(&self) -> Option<&SourceImage> {
        self.images.get(self.current)
    }

    pub fn square_corners(&self) -> [Option<Point2D>; 2] {
        self.square_corners
    }

    pub fn anchor_corners(&self) -> [Option<Point2D>; 2] {
        self.anchor_corners
    }

    pub fn calibration_square(&self) -> Option<CalibrationSquare> {
        match self.square_corners {
            [Some(p1), Some(p2)] => Some(CalibrationSquare::from_diagonal(p1, p2)),
            _ => None,
        }
    }

    pub fn channel_anchors(&self) -> Option<ChannelAnchors> {
        match self.anchor_corners {
            [Some(p1), Some(p2)] => Some(ChannelAnchors { p1, p2 }),
            _ => None,
        }
    }

    /// Crop quadrilateral in source pixels, once square and anchors are set
    pub fn crop_quad(&self) -> Result<[Point2D; 4]> {
        let square = self.calibration_square().ok_or(DigitizeError::Missing {
            what: "Calibration square",
        })?;
        let anchors = self.channel_anchors().ok_or(DigitizeError::Missing {
            what: "Channel anchors",
        })?;
        Ok(anchors.crop_quad(&square)?)
    }

    pub fn strip(&self) -> Option<&NormalizedStrip> {
        self.strip.as_ref()
    }

    pub fn boxes(&self) -> &[LeadBox] {
        &self.boxes
    }

    pub fn traces(&self) -> &[LeadTrace] {
        &self.traces
    }

    pub fn selected_lead(&self) -> usize {
        self.selected_lead
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn patient(&self) -> &PatientInfo {
        &self.patient
    }

    pub fn log(&self) -> &ReproLog {
        &self.log
    }

    pub fn lead_names(&self) -> Vec<String> {
        let count = if self.boxes.is_empty() {
            self.settings.lead_count
        } else {
            self.boxes.len()
        };
        lead_names(count)
    }

    /// Band of lead `index` as a view into the normalized strip
    pub fn band(&self, index: usize) -> Result<SubImage<&RgbaImage>> {
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        let lead_box = self.boxes.get(index).ok_or(DigitizeError::LeadOutOfRange {
            index,
            count: self.boxes.len(),
        })?;
        Ok(band_view(&strip.image, lead_box))
    }

    // ── Images ──

    /// Append a decoded image; the first one becomes current.
    pub fn add_image(&mut self, source: SourceImage) {
        let first = self.images.is_empty();
        self.log.add_note("Load Image", &source.id);
        self.images.push(source);
        if first {
            self.switch_to(0);
        }
    }

    fn switch_to(&mut self, index: usize) {
        self.current = index;
        self.square_corners = [None, None];
        self.anchor_corners = [None, None];
        self.clear_strip();
        if let Some(source) = self.images.get(index) {
            self.patient.source_id = source.id.clone();
            let name = source
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| source.id.clone());
            self.log.set_source(&name);
        }
    }

    fn clear_strip(&mut self) {
        self.strip = None;
        self.boxes.clear();
        self.traces.clear();
        self.selected_lead = 0;
    }

    // ── Events ──

    /// Apply one operator event and record it in the log.
    pub fn apply(&mut self, event: OperatorEvent) -> Result<()> {
        self.apply_event(&event)?;
        self.log.add_event(&event);
        Ok(())
    }

    /// Apply events in order, stopping at the first failure.
    pub fn replay(&mut self, events: &[OperatorEvent]) -> Result<()> {
        for (i, event) in events.iter().enumerate() {
            self.apply(event.clone()).map_err(|e| {
                log::error!("Replay stopped at event {} ({}): {}", i + 1, event.name(), e);
                e
            })?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: &OperatorEvent) -> Result<()> {
        match event {
            OperatorEvent::SetCalibrationCorner { corner, point } => {
                self.current_image().ok_or(DigitizeError::NoImage)?;
                self.square_corners[corner_index(*corner)] = Some(*point);
                Ok(())
            }
            OperatorEvent::SetChannelAnchor { corner, point } => {
                self.current_image().ok_or(DigitizeError::NoImage)?;
                self.anchor_corners[corner_index(*corner)] = Some(*point);
                Ok(())
            }
            OperatorEvent::Crop => {
                let strip = self.crop()?;
                self.install_strip(strip);
                Ok(())
            }
            OperatorEvent::Extract => self.extract(),
            OperatorEvent::SelectLead { index } => {
                let count = self.lead_names().len();
                if *index >= count {
                    return Err(DigitizeError::LeadOutOfRange { index: *index, count });
                }
                self.selected_lead = *index;
                Ok(())
            }
            OperatorEvent::DragPoint { x, y } => self.drag_point(*x, *y),
            OperatorEvent::ClearPinsNear { x } => {
                self.require_traces()?;
                let lead = self.selected_lead;
                let column = x.round().max(0.0) as usize;
                let released = self.traces[lead].unpin_near(column, self.settings.unpin_radius);
                log::debug!("Released {} pins on lead {}", released, lead);
                Ok(())
            }
            OperatorEvent::Recompute => self.recompute(),
            OperatorEvent::ResizeBand { lead, edge, delta } => self.resize_band(*lead, *edge, *delta),
            OperatorEvent::ScrollZeroLine { lead, delta } => {
                let lead_box = self.box_mut(*lead)?;
                lead_box.zero_point = (lead_box.zero_point + delta).clamp(0.0, lead_box.height);
                Ok(())
            }
            OperatorEvent::SetField { field, text } => self.set_field(*field, text),
            OperatorEvent::NextImage => {
                if self.images.is_empty() {
                    return Err(DigitizeError::NoImage);
                }
                if self.current + 1 >= self.images.len() {
                    return Err(DigitizeError::EndOfImages("last"));
                }
                self.switch_to(self.current + 1);
                Ok(())
            }
            OperatorEvent::PrevImage => {
                if self.images.is_empty() {
                    return Err(DigitizeError::NoImage);
                }
                if self.current == 0 {
                    return Err(DigitizeError::EndOfImages("first"));
                }
                self.switch_to(self.current - 1);
                Ok(())
            }
        }
    }

    // ── Crop ──

    fn crop_inputs(&self) -> Result<(Arc<RgbaImage>, [Point2D; 4], f64, NormalizeOptions)> {
        let source = self.current_image().ok_or(DigitizeError::NoImage)?;
        let quad = self.crop_quad()?;
        let side = self
            .calibration_square()
            .map(|s| s.side())
            .ok_or(DigitizeError::Missing {
                what: "Calibration square",
            })?;
        let options = NormalizeOptions {
            target_size: self.settings.target_size,
        };
        Ok((Arc::clone(&source.image), quad, side, options))
    }

    /// Blocking crop of the current image; does not modify the session.
    pub fn crop(&self) -> Result<NormalizedStrip> {
        let (source, quad, side, options) = self.crop_inputs()?;
        normalize_quad(&SoftwareRasterizer, &*source, &quad, side, &options)
    }

    /// Start the crop on a worker thread.
    pub fn begin_crop(&mut self) -> Result<PendingCrop> {
        let (source, quad, side, options) = self.crop_inputs()?;
        self.crop_marks = Some(self.current_marks());
        Ok(PendingCrop::spawn(source, quad, side, options))
    }

    /// Install the outcome of a [`PendingCrop`] and log it as a crop event.
    ///
    /// The result is discarded with [`DigitizeError::StaleCrop`] when the image
    /// or marks changed after [`Session::begin_crop`].
    pub fn finish_crop(&mut self, result: Result<NormalizedStrip>) -> Result<()> {
        let started = self.crop_marks.take();
        let strip = result?;
        if started != Some(self.current_marks()) {
            return Err(DigitizeError::StaleCrop);
        }
        self.install_strip(strip);
        self.log.add_event(&OperatorEvent::Crop);
        Ok(())
    }

    fn current_marks(&self) -> CropMarks {
        (self.current, self.square_corners, self.anchor_corners)
    }

    fn install_strip(&mut self, strip: NormalizedStrip) {
        log::info!(
            "Normalized strip {}x{}, square side {:.2} px",
            strip.width(),
            strip.height(),
            strip.square_side
        );
        self.clear_strip();
        self.strip = Some(strip);
    }

    // ── Extraction and correction ──

    fn extract(&mut self) -> Result<()> {
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        let fresh = self.boxes.len() != self.settings.lead_count;
        let mut boxes = if fresh {
            segment_leads(strip.height(), self.settings.lead_count)?
        } else {
            self.boxes.clone()
        };

        let traces: Vec<LeadTrace> = boxes
            .iter()
            .map(|b| LeadTrace::extract(&*band_view(&strip.image, b), &self.settings.extraction))
            .collect();

        if fresh {
            for (lead_box, trace) in boxes.iter_mut().zip(&traces) {
                if let Some(first) = trace.points.first() {
                    lead_box.zero_point = first.y;
                }
            }
            self.selected_lead = 0;
        }
        log::info!("Extracted {} leads over {} columns", traces.len(), strip.width());
        self.boxes = boxes;
        self.traces = traces;
        Ok(())
    }

    fn require_traces(&self) -> Result<&NormalizedStrip> {
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        if self.traces.is_empty() {
            return Err(DigitizeError::Missing { what: "Lead traces" });
        }
        Ok(strip)
    }

    fn drag_point(&mut self, x: f64, y: f64) -> Result<()> {
        self.require_traces()?;
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        if !(x >= 0.0 && x < strip.width() as f64 && y >= 0.0 && y < strip.height() as f64) {
            return Err(DigitizeError::InvalidInput {
                field: "pointer".to_string(),
                reason: "is outside the strip".to_string(),
            });
        }

        // A drag into another band selects that lead, so clearing acts on it too
        let selected = self.selected_lead;
        let lead = if self.boxes[selected].contains_row(y) {
            selected
        } else {
            self.boxes
                .iter()
                .position(|b| b.contains_row(y))
                .ok_or_else(|| DigitizeError::InvalidInput {
                    field: "pointer".to_string(),
                    reason: "is not inside a lead band".to_string(),
                })?
        };
        self.selected_lead = lead;

        let column = x.floor() as usize;
        let d = darkness(*strip.image.get_pixel(column as u32, y.floor() as u32), &self.settings.extraction.luma);
        let relative = y - self.boxes[lead].offset;
        self.traces[lead].pin(column, relative, d);
        Ok(())
    }

    fn recompute(&mut self) -> Result<()> {
        self.require_traces()?;
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        let mut changed = 0;
        for (lead_box, trace) in self.boxes.iter().zip(self.traces.iter_mut()) {
            changed += trace.recompute(&*band_view(&strip.image, lead_box), &self.settings.extraction);
        }
        log::info!("Recompute changed {} points", changed);
        Ok(())
    }

    fn box_mut(&mut self, lead: usize) -> Result<&mut LeadBox> {
        if self.strip.is_none() {
            return Err(DigitizeError::NoCrop);
        }
        let count = self.boxes.len();
        self.boxes
            .get_mut(lead)
            .ok_or(DigitizeError::LeadOutOfRange { index: lead, count })
    }

    /// Bands move in whole pixels and stay inside the strip.
    fn resize_band(&mut self, lead: usize, edge: BandEdge, delta: f64) -> Result<()> {
        let image_height = self.strip.as_ref().map(|s| s.height() as f64).unwrap_or(0.0);
        let delta = delta.round();
        let current = *self.box_mut(lead)?;

        let (offset, height) = match edge {
            BandEdge::Top => (current.offset + delta, current.height - delta),
            BandEdge::Bottom => (current.offset, current.height + delta),
        };
        if height < 1.0 {
            return Err(DigitizeError::InvalidSetting {
                name: "band height",
                value: height,
            });
        }
        if offset < 0.0 || offset + height > image_height {
            return Err(DigitizeError::InvalidSetting {
                name: "band offset",
                value: offset,
            });
        }

        // Keep trace rows and the zero line at the same absolute position
        let shift = offset - current.offset;
        if let Some(lead_box) = self.boxes.get_mut(lead) {
            lead_box.offset = offset;
            lead_box.height = height;
            lead_box.zero_point = (current.zero_point - shift).clamp(0.0, height);
        }
        if let Some(trace) = self.traces.get_mut(lead) {
            for point in &mut trace.points {
                point.y -= shift;
            }
        }
        Ok(())
    }

    // ── Settings ──

    fn set_field(&mut self, field: SettingField, text: &str) -> Result<()> {
        match field {
            SettingField::Speed => self.settings.calibration.speed = settings::parse_positive(field, text)?,
            SettingField::Amplitude => {
                self.settings.calibration.amplitude = settings::parse_positive(field, text)?
            }
            SettingField::PointsPerSquare => {
                self.settings.calibration.points_per_square = settings::parse_positive(field, text)?
            }
            SettingField::LeadCount => {
                let count = settings::parse_count(field, text)?;
                if count != self.settings.lead_count {
                    self.settings.lead_count = count;
                    self.boxes.clear();
                    self.traces.clear();
                    self.selected_lead = 0;
                }
            }
            SettingField::SourceId => self.patient.source_id = text.trim().to_string(),
            SettingField::Sex => self.patient.sex = settings::parse_sex(text)?,
            SettingField::Qt => self.patient.qt_ms = settings::parse_integer(field, text)?,
        }
        Ok(())
    }

    // ── Output ──

    /// Millivolt samples for every lead, in lead order
    pub fn calibrated_leads(&self) -> Result<Vec<CalibratedLead>> {
        let strip = self.require_traces()?;
        let names = lead_names(self.traces.len());
        self.boxes
            .iter()
            .zip(&self.traces)
            .zip(&names)
            .map(|((lead_box, trace), name)| {
                calibrate_lead(
                    name,
                    &trace.ys(),
                    lead_box.zero_point,
                    strip.square_side,
                    &self.settings.calibration,
                )
            })
            .collect()
    }

    pub fn export_csv(&self) -> Result<String> {
        export::export_leads(&self.calibrated_leads()?)
    }

    pub fn export_filename(&self) -> Result<String> {
        let strip = self.strip.as_ref().ok_or(DigitizeError::NoCrop)?;
        Ok(export::export_filename(&self.patient, strip.square_side))
    }

    // ── Save / load ──

    pub fn save(&self, path: &Path) -> Result<()> {
        let images: Vec<PathBuf> = self.images.iter().filter_map(|s| s.path.clone()).collect();
        if images.len() != self.images.len() {
            log::warn!("Saving session without in-memory images");
        }
        let save = SessionSave {
            version: SESSION_VERSION,
            images,
            current: self.current,
            settings: self.settings.clone(),
            patient: self.patient.clone(),
            square_corners: self.square_corners,
            anchor_corners: self.anchor_corners,
            cropped: self.strip.is_some(),
            boxes: self.boxes.clone(),
            traces: self.traces.clone(),
            selected_lead: self.selected_lead,
            log: self.log.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&save)?)?;
        log::info!("Session saved: {}", path.display());
        Ok(())
    }

    /// Reopen the images, redo the crop and restore bands and traces.
    pub fn load(path: &Path) -> Result<Session> {
        let json = std::fs::read_to_string(path)?;
        let save: SessionSave = serde_json::from_str(&json)?;

        let mut session = Session::new(save.settings);
        for image_path in &save.images {
            session.images.push(SourceImage::open(image_path)?);
        }
        if !session.images.is_empty() {
            session.current = save.current.min(session.images.len() - 1);
        }
        session.square_corners = save.square_corners;
        session.anchor_corners = save.anchor_corners;

        if save.cropped {
            let strip = session.crop()?;
            let width = strip.width() as usize;
            if save.traces.len() != save.boxes.len() {
                return Err(DigitizeError::HeaderMismatch {
                    headers: save.boxes.len(),
                    columns: save.traces.len(),
                });
            }
            for (trace, name) in save.traces.iter().zip(lead_names(save.traces.len())) {
                if trace.len() != width {
                    return Err(DigitizeError::LengthMismatch {
                        name,
                        expected: width,
                        got: trace.len(),
                    });
                }
            }
            session.strip = Some(strip);
            session.boxes = save.boxes;
            session.traces = save.traces;
            session.selected_lead = save.selected_lead.min(session.boxes.len().saturating_sub(1));
        }
        session.patient = save.patient;
        session.log = save.log;
        log::info!("Session loaded: {}", path.display());
        Ok(session)
    }
}

fn corner_index(corner: Corner) -> usize {
    match corner {
        Corner::First => 0,
        Corner::Second => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::GeometryError;
    use image::Rgba;

    const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// 120x100 photo; three full-width lines at rows 10, 30, 50
    fn strip_photo() -> RgbaImage {
        RgbaImage::from_fn(120, 100, |_, y| if y == 10 || y == 30 || y == 50 { INK } else { PAPER })
    }

    fn marked_session() -> Session {
        let mut session = Session::default();
        session.add_image(SourceImage::from_rgba("case1", strip_photo()));
        let events = [
            OperatorEvent::SetField {
                field: SettingField::LeadCount,
                text: "3".to_string(),
            },
            OperatorEvent::SetCalibrationCorner {
                corner: Corner::First,
                point: Point2D::new(10.0, 10.0),
            },
            OperatorEvent::SetCalibrationCorner {
                corner: Corner::Second,
                point: Point2D::new(20.0, 20.0),
            },
            OperatorEvent::SetChannelAnchor {
                corner: Corner::First,
                point: Point2D::new(0.0, 0.0),
            },
            OperatorEvent::SetChannelAnchor {
                corner: Corner::Second,
                point: Point2D::new(100.0, 60.0),
            },
        ];
        session.replay(&events).unwrap();
        session
    }

    #[test]
    fn test_crop_and_extract() {
        let mut session = marked_session();
        session.apply(OperatorEvent::Crop).unwrap();
        let strip = session.strip().unwrap();
        assert_eq!(strip.image.dimensions(), (100, 60));
        assert!((strip.square_side - 10.0).abs() < 1e-9);

        session.apply(OperatorEvent::Extract).unwrap();
        assert_eq!(session.boxes().len(), 3);
        for (b, t) in session.boxes().iter().zip(session.traces()) {
            assert_eq!(b.height, 20.0);
            assert_eq!(b.zero_point, 10.0);
            assert_eq!(t.len(), 100);
            assert!(t.points.iter().all(|p| p.y == 10.0));
        }

        let leads = session.calibrated_leads().unwrap();
        assert_eq!(leads.len(), 3);
        // 10 px square, 25 mm/s, 10 points per square: x4
        assert_eq!(leads[0].samples_mv.len(), 400);
        assert!(leads[0].samples_mv.iter().all(|v| *v == 0.0));

        let csv = session.export_csv().unwrap();
        assert!(csv.starts_with("I,II,III\n0,0,0\n"));
        assert_eq!(csv.lines().count(), 401);
        assert_eq!(session.export_filename().unwrap(), "case1_U_0_10.csv");
    }

    #[test]
    fn test_preconditions_leave_state_intact() {
        let mut session = Session::default();
        assert!(matches!(
            session.apply(OperatorEvent::SetCalibrationCorner {
                corner: Corner::First,
                point: Point2D::ZERO,
            }),
            Err(DigitizeError::NoImage)
        ));

        let mut session = marked_session();
        let logged = session.log().len();
        assert!(matches!(session.apply(OperatorEvent::Extract), Err(DigitizeError::NoCrop)));
        assert!(matches!(session.apply(OperatorEvent::Recompute), Err(DigitizeError::NoCrop)));
        assert!(session.export_csv().is_err());
        assert_eq!(session.log().len(), logged);
    }

    #[test]
    fn test_invalid_field_text_is_rejected() {
        let mut session = marked_session();
        let err = session
            .apply(OperatorEvent::SetField {
                field: SettingField::Speed,
                text: "fast".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Value in field \"Speed\" is not a number");
        assert_eq!(session.settings().calibration.speed, 25.0);

        session
            .apply(OperatorEvent::SetField {
                field: SettingField::Sex,
                text: "f".to_string(),
            })
            .unwrap();
        assert_eq!(session.patient().sex, crate::data::leads::Sex::Female);
    }

    #[test]
    fn test_drag_pins_band_under_pointer() {
        let mut session = marked_session();
        session.replay(&[OperatorEvent::Crop, OperatorEvent::Extract]).unwrap();

        // Row 35 sits in the second band (20..40)
        assert_eq!(session.selected_lead(), 0);
        session.apply(OperatorEvent::DragPoint { x: 50.0, y: 35.0 }).unwrap();
        assert_eq!(session.selected_lead(), 1);
        let point = session.traces()[1].points[50];
        assert_eq!(point.y, 15.0);
        assert!(point.modified);
        assert_eq!(point.d, 0.0);

        session.apply(OperatorEvent::Recompute).unwrap();
        assert_eq!(session.traces()[1].points[50].y, 15.0);
        assert_eq!(session.traces()[1].points[51].y, 10.0);

        // Clearing acts on the selected lead only
        session.apply(OperatorEvent::SelectLead { index: 0 }).unwrap();
        session.apply(OperatorEvent::ClearPinsNear { x: 50.0 }).unwrap();
        assert_eq!(session.traces()[1].pinned_count(), 1);
        session.apply(OperatorEvent::SelectLead { index: 1 }).unwrap();
        session.apply(OperatorEvent::ClearPinsNear { x: 60.0 }).unwrap();
        assert_eq!(session.traces()[1].pinned_count(), 0);

        assert!(session.apply(OperatorEvent::DragPoint { x: 500.0, y: 5.0 }).is_err());
        assert!(matches!(
            session.apply(OperatorEvent::SelectLead { index: 3 }),
            Err(DigitizeError::LeadOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_failed_recrop_keeps_strip_and_traces() {
        let mut session = marked_session();
        session.replay(&[OperatorEvent::Crop, OperatorEvent::Extract]).unwrap();
        let strip_before = session.strip().unwrap().image.clone();
        let traces_before = session.traces().to_vec();
        let csv_before = session.export_csv().unwrap();

        // Anchors swapped: the edge rays point away from each other
        session
            .replay(&[
                OperatorEvent::SetChannelAnchor {
                    corner: Corner::First,
                    point: Point2D::new(100.0, 60.0),
                },
                OperatorEvent::SetChannelAnchor {
                    corner: Corner::Second,
                    point: Point2D::new(0.0, 0.0),
                },
            ])
            .unwrap();
        let logged = session.log().len();

        assert!(matches!(
            session.apply(OperatorEvent::Crop),
            Err(DigitizeError::Geometry(GeometryError::NoIntersection { .. }))
        ));
        assert_eq!(session.strip().unwrap().image, strip_before);
        assert_eq!(session.traces(), &traces_before[..]);
        assert_eq!(session.log().len(), logged);
        assert_eq!(session.export_csv().unwrap(), csv_before);
    }

    #[test]
    fn test_oversized_points_per_square_fails_calibration() {
        let mut session = marked_session();
        session.replay(&[OperatorEvent::Crop, OperatorEvent::Extract]).unwrap();
        session
            .apply(OperatorEvent::SetField {
                field: SettingField::PointsPerSquare,
                text: "100000".to_string(),
            })
            .unwrap();
        assert!(matches!(
            session.calibrated_leads(),
            Err(DigitizeError::InvalidSetting { .. })
        ));
        assert!(session.export_csv().is_err());
    }

    #[test]
    fn test_resize_and_zero_line() {
        let mut session = marked_session();
        session.replay(&[OperatorEvent::Crop, OperatorEvent::Extract]).unwrap();

        session
            .apply(OperatorEvent::ResizeBand {
                lead: 1,
                edge: BandEdge::Top,
                delta: 4.0,
            })
            .unwrap();
        let b = session.boxes()[1];
        assert_eq!((b.offset, b.height, b.zero_point), (24.0, 16.0, 6.0));
        assert_eq!(session.traces()[1].points[0].y, 6.0);

        // Re-extraction keeps resized bands and finds the line again
        session.apply(OperatorEvent::Extract).unwrap();
        assert_eq!(session.boxes()[1].offset, 24.0);
        assert!(session.traces()[1].points.iter().all(|p| p.y == 6.0));

        assert!(session
            .apply(OperatorEvent::ResizeBand {
                lead: 2,
                edge: BandEdge::Bottom,
                delta: 5.0,
            })
            .is_err());
        assert!(session
            .apply(OperatorEvent::ResizeBand {
                lead: 0,
                edge: BandEdge::Bottom,
                delta: -20.0,
            })
            .is_err());

        session
            .apply(OperatorEvent::ScrollZeroLine { lead: 0, delta: 100.0 })
            .unwrap();
        assert_eq!(session.boxes()[0].zero_point, 20.0);
    }

    #[test]
    fn test_image_navigation_resets_marks() {
        let mut session = marked_session();
        session.add_image(SourceImage::from_rgba("case2", strip_photo()));
        assert_eq!(session.current_index(), 0);
        assert!(session.calibration_square().is_some());

        assert!(matches!(
            session.apply(OperatorEvent::PrevImage),
            Err(DigitizeError::EndOfImages("first"))
        ));
        session.apply(OperatorEvent::NextImage).unwrap();
        assert_eq!(session.current_index(), 1);
        assert!(session.calibration_square().is_none());
        assert!(session.channel_anchors().is_none());
        assert_eq!(session.patient().source_id, "case2");
        assert!(session.apply(OperatorEvent::NextImage).is_err());
    }

    #[test]
    fn test_deferred_crop_matches_blocking() {
        let mut session = marked_session();
        let blocking = session.crop().unwrap();
        let pending = session.begin_crop().unwrap();
        assert!(session.strip().is_none());
        session.finish_crop(pending.wait()).unwrap();
        assert_eq!(session.strip().unwrap().image, blocking.image);
        assert_eq!(session.log().events().last(), Some(&OperatorEvent::Crop));
    }

    #[test]
    fn test_marks_moved_during_crop_discard_result() {
        let mut session = marked_session();
        let logged = session.log().len();
        let pending = session.begin_crop().unwrap();
        session
            .apply(OperatorEvent::SetChannelAnchor {
                corner: Corner::Second,
                point: Point2D::new(90.0, 50.0),
            })
            .unwrap();

        assert!(matches!(
            session.finish_crop(pending.wait()),
            Err(DigitizeError::StaleCrop)
        ));
        assert!(session.strip().is_none());
        assert_eq!(session.log().len(), logged + 1);
        assert!(!session.log().events().contains(&OperatorEvent::Crop));
    }

    #[test]
    fn test_save_and_load_session() {
        let dir = std::env::temp_dir().join(format!("ecg_session_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let image_path = dir.join("strip.png");
        strip_photo().save(&image_path).unwrap();

        let mut session = Session::default();
        session.add_image(SourceImage::open(&image_path).unwrap());
        let mut events = marked_session().log().events();
        events.extend([
            OperatorEvent::Crop,
            OperatorEvent::Extract,
            OperatorEvent::DragPoint { x: 5.0, y: 12.0 },
        ]);
        session.replay(&events).unwrap();

        let session_path = dir.join("session.json");
        session.save(&session_path).unwrap();
        let loaded = Session::load(&session_path).unwrap();
        assert_eq!(loaded.traces(), session.traces());
        assert_eq!(loaded.boxes(), session.boxes());
        assert_eq!(loaded.export_csv().unwrap(), session.export_csv().unwrap());
        assert_eq!(loaded.log().len(), session.log().len());

        std::fs::remove_dir_all(&dir).ok();
    }
}
