/// Strip view — central canvas showing the source photo or the normalized strip
///
/// Before the crop the operator marks the calibration square and the channel
/// anchors on the photo. Afterwards the normalized strip is shown with lead
/// bands, zero lines and traces, and pointer input becomes correction events.

use egui::{Color32, Pos2, Rect, Sense, Stroke};
use image::RgbaImage;

use ecg_digitizer::data::geometry::{CalibrationSquare, Point2D};
use ecg_digitizer::pipeline::event::{BandEdge, Corner, OperatorEvent};
use ecg_digitizer::Session;

use super::theme::ThemeColors;

/// What pointer input on the canvas does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Square,
    Anchors,
    Edit,
}

/// Band edges grab within this many screen pixels
const EDGE_GRAB: f32 = 5.0;

struct CachedTexture {
    key: usize,
    handle: egui::TextureHandle,
}

/// Textures and in-progress drags
#[derive(Default)]
pub struct StripViewState {
    source: Option<CachedTexture>,
    strip: Option<CachedTexture>,
    drag_start: Option<Point2D>,
    /// Last pointer position of the current drag, image pixels
    drag_end: Option<Point2D>,
    edge_drag: Option<(usize, BandEdge, f64)>,
    /// Column and row of the last emitted edit
    last_cell: Option<(usize, usize)>,
}

/// Image-to-screen mapping for the current frame
#[derive(Debug, Clone, Copy)]
struct ViewTransform {
    origin: Pos2,
    scale: f32,
}

impl ViewTransform {
    fn to_screen(&self, x: f64, y: f64) -> Pos2 {
        Pos2::new(
            self.origin.x + x as f32 * self.scale,
            self.origin.y + y as f32 * self.scale,
        )
    }

    fn to_image(&self, pos: Pos2) -> Point2D {
        Point2D::new(
            ((pos.x - self.origin.x) / self.scale) as f64,
            ((pos.y - self.origin.y) / self.scale) as f64,
        )
    }
}

/// Render the canvas and return the events produced by pointer input
pub fn show_strip_view(
    ui: &mut egui::Ui,
    state: &mut StripViewState,
    session: &Session,
    mode: EditMode,
    colors: &ThemeColors,
) -> Vec<OperatorEvent> {
    let mut events = Vec::new();

    let show_strip = mode == EditMode::Edit && session.strip().is_some();
    let image: &RgbaImage = match (show_strip, session.strip(), session.current_image()) {
        (true, Some(strip), _) => &strip.image,
        (_, _, Some(source)) => &source.image,
        _ => {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("📂 Open one or more strip images (File → Open Images)")
                        .size(16.0)
                        .color(colors.text_muted),
                );
            });
            return events;
        }
    };

    let slot = if show_strip { &mut state.strip } else { &mut state.source };
    let texture = cached_texture(ui.ctx(), slot, image, if show_strip { "strip" } else { "source" });

    let avail = ui.available_size();
    let (w, h) = (image.width() as f32, image.height() as f32);
    let scale = (avail.x / w).min(avail.y / h).max(0.01);
    let (response, painter) = ui.allocate_painter(egui::vec2(w * scale, h * scale), Sense::click_and_drag());
    let view = ViewTransform {
        origin: response.rect.min,
        scale,
    };
    painter.image(
        texture.id(),
        response.rect,
        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
        Color32::WHITE,
    );

    if show_strip {
        draw_strip_overlays(&painter, session, view, colors);
        handle_edit_input(ui, state, session, &response, view, &mut events);
    } else {
        draw_source_overlays(&painter, session, view, colors);
        handle_marking_input(state, mode, &response, view, &painter, colors, &mut events);
    }

    events
}

/// Upload `image` unless the cached texture already shows the same buffer
fn cached_texture(
    ctx: &egui::Context,
    slot: &mut Option<CachedTexture>,
    image: &RgbaImage,
    name: &str,
) -> egui::TextureHandle {
    let key = image.as_raw().as_ptr() as usize ^ ((image.width() as usize) << 16) ^ image.height() as usize;
    if let Some(cached) = slot.as_ref().filter(|c| c.key == key) {
        return cached.handle.clone();
    }
    let color_image = egui::ColorImage::from_rgba_unmultiplied(
        [image.width() as usize, image.height() as usize],
        image.as_raw(),
    );
    let handle = ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR);
    *slot = Some(CachedTexture {
        key,
        handle: handle.clone(),
    });
    handle
}

fn quad_outline(painter: &egui::Painter, view: ViewTransform, corners: &[Point2D; 4], stroke: Stroke) {
    let points: Vec<Pos2> = corners.iter().map(|p| view.to_screen(p.x, p.y)).collect();
    painter.add(egui::Shape::closed_line(points, stroke));
}

fn draw_source_overlays(painter: &egui::Painter, session: &Session, view: ViewTransform, colors: &ThemeColors) {
    if let Some(square) = session.calibration_square() {
        quad_outline(painter, view, &square.corners, Stroke::new(2.0, colors.square_outline));
    }
    if let Ok(quad) = session.crop_quad() {
        quad_outline(painter, view, &quad, Stroke::new(1.5, colors.anchor_outline));
    }
    for p in session.anchor_corners().iter().flatten() {
        painter.circle_filled(view.to_screen(p.x, p.y), 4.0, colors.anchor_outline);
    }
}

fn handle_marking_input(
    state: &mut StripViewState,
    mode: EditMode,
    response: &egui::Response,
    view: ViewTransform,
    painter: &egui::Painter,
    colors: &ThemeColors,
    events: &mut Vec<OperatorEvent>,
) {
    if mode == EditMode::Edit {
        return;
    }
    if response.drag_started_by(egui::PointerButton::Primary) {
        state.drag_start = response.interact_pointer_pos().map(|p| view.to_image(p));
    }
    let Some(start) = state.drag_start else {
        return;
    };
    if let Some(pos) = response.interact_pointer_pos() {
        state.drag_end = Some(view.to_image(pos));
    }
    let end = state.drag_end.unwrap_or(start);

    // Live preview
    match mode {
        EditMode::Square => {
            let preview = CalibrationSquare::from_diagonal(start, end);
            quad_outline(painter, view, &preview.corners, Stroke::new(1.0, colors.square_outline));
        }
        _ => {
            painter.line_segment(
                [view.to_screen(start.x, start.y), view.to_screen(end.x, end.y)],
                Stroke::new(1.0, colors.anchor_outline),
            );
        }
    }

    if response.drag_stopped_by(egui::PointerButton::Primary) {
        state.drag_start = None;
        state.drag_end = None;
        if start.distance(end) < 1.0 {
            return;
        }
        match mode {
            EditMode::Square => {
                events.push(OperatorEvent::SetCalibrationCorner {
                    corner: Corner::First,
                    point: start,
                });
                events.push(OperatorEvent::SetCalibrationCorner {
                    corner: Corner::Second,
                    point: end,
                });
            }
            _ => {
                events.push(OperatorEvent::SetChannelAnchor {
                    corner: Corner::First,
                    point: start,
                });
                events.push(OperatorEvent::SetChannelAnchor {
                    corner: Corner::Second,
                    point: end,
                });
            }
        }
    }
}

fn draw_strip_overlays(painter: &egui::Painter, session: &Session, view: ViewTransform, colors: &ThemeColors) {
    let Some(strip) = session.strip() else {
        return;
    };
    let width = strip.width() as f64;
    let selected = session.selected_lead();

    for (i, lead_box) in session.boxes().iter().enumerate() {
        let outline = if i == selected {
            Stroke::new(2.0, colors.band_selected)
        } else {
            Stroke::new(1.0, colors.band_outline)
        };
        let corners = [
            Point2D::new(0.0, lead_box.offset),
            Point2D::new(width, lead_box.offset),
            Point2D::new(width, lead_box.bottom()),
            Point2D::new(0.0, lead_box.bottom()),
        ];
        quad_outline(painter, view, &corners, outline);

        let zero = lead_box.offset + lead_box.zero_point;
        painter.line_segment(
            [view.to_screen(0.0, zero), view.to_screen(width, zero)],
            Stroke::new(1.0, colors.zero_line),
        );
    }

    for (lead_box, trace) in session.boxes().iter().zip(session.traces()) {
        let points: Vec<Pos2> = trace
            .points
            .iter()
            .map(|p| view.to_screen(p.x as f64 + 0.5, lead_box.offset + p.y + 0.5))
            .collect();
        painter.add(egui::Shape::line(points, Stroke::new(1.2, colors.trace_line)));
        for p in trace.points.iter().filter(|p| p.modified) {
            painter.circle_filled(
                view.to_screen(p.x as f64 + 0.5, lead_box.offset + p.y + 0.5),
                2.0,
                colors.pinned_marker,
            );
        }
    }
}

fn handle_edit_input(
    ui: &egui::Ui,
    state: &mut StripViewState,
    session: &Session,
    response: &egui::Response,
    view: ViewTransform,
    events: &mut Vec<OperatorEvent>,
) {
    let selected = session.selected_lead();

    if response.hovered() {
        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 && selected < session.boxes().len() {
            events.push(OperatorEvent::ScrollZeroLine {
                lead: selected,
                delta: -(scroll / view.scale) as f64,
            });
        }
    }

    if let Some(pos) = response.interact_pointer_pos() {
        state.drag_end = Some(view.to_image(pos));
    }
    let Some(at) = state.drag_end else {
        return;
    };

    if response.drag_started_by(egui::PointerButton::Primary) {
        state.last_cell = None;
        state.edge_drag = session.boxes().get(selected).and_then(|b| {
            let grab = (EDGE_GRAB / view.scale) as f64;
            if (at.y - b.offset).abs() <= grab {
                Some((selected, BandEdge::Top, at.y))
            } else if (at.y - b.bottom()).abs() <= grab {
                Some((selected, BandEdge::Bottom, at.y))
            } else {
                None
            }
        });
    }

    if let Some((lead, edge, from)) = state.edge_drag {
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            state.edge_drag = None;
            let delta = (at.y - from).round();
            if delta != 0.0 {
                events.push(OperatorEvent::ResizeBand { lead, edge, delta });
            }
        }
        return;
    }

    let cell = pointer_cell(at);
    if response.dragged_by(egui::PointerButton::Primary) && state.last_cell != Some(cell) {
        events.push(OperatorEvent::DragPoint { x: at.x, y: at.y });
        state.last_cell = Some(cell);
    } else if response.dragged_by(egui::PointerButton::Secondary)
        && state.last_cell.map(|(column, _)| column) != Some(cell.0)
    {
        events.push(OperatorEvent::ClearPinsNear { x: at.x });
        state.last_cell = Some(cell);
    }
    if response.drag_stopped() {
        state.last_cell = None;
        state.drag_end = None;
    }
}

/// Strip pixel under the pointer
fn pointer_cell(at: Point2D) -> (usize, usize) {
    (at.x.max(0.0).floor() as usize, at.y.max(0.0).floor() as usize)
}
