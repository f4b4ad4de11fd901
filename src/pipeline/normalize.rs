/// Rectangle normalizer
///
/// Turns the operator-marked quadrilateral on the source photo into an
/// axis-aligned, de-rotated, owned pixel buffer. The calibration square side
/// is carried through the same scale so later unit conversion knows how many
/// output pixels make 10 mm.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use image::{GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::raster::{Affine2, Rasterizer, SoftwareRasterizer};
use crate::data::geometry::{GeometryError, Point2D};
use crate::error::{DigitizeError, Result};

/// Optional output sizing for the normalized strip
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Fit the crop inside this box, preserving aspect ratio
    pub target_size: Option<(u32, u32)>,
}

/// Result of a crop
#[derive(Debug, Clone)]
pub struct NormalizedStrip {
    pub image: RgbaImage,
    /// Calibration square side (10 mm) in normalized-image pixels
    pub square_side: f64,
}

impl NormalizedStrip {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Rotation that brings the edge `q0 -> q1` onto the +x axis when undone.
pub fn grid_angle(quad: &[Point2D; 4]) -> f64 {
    Point2D::ZERO.angle(quad[0] - quad[1])
}

/// Normalize `quad = [q0, q1, q2, q3]` (top-left, top-right, bottom-right,
/// bottom-left) out of `source`.
///
/// `square_side_src` is the calibration square side in source pixels.
pub fn normalize_quad<R, I>(
    rasterizer: &R,
    source: &I,
    quad: &[Point2D; 4],
    square_side_src: f64,
    options: &NormalizeOptions,
) -> Result<NormalizedStrip>
where
    R: Rasterizer,
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let width = quad[0].distance(quad[1]);
    let height = quad[1].distance(quad[2]);
    if !(width > 0.0 && height > 0.0) || !(square_side_src > 0.0) {
        return Err(GeometryError::Degenerate { width, height }.into());
    }

    let angle = grid_angle(quad);

    let (min_x, max_x) = quad
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let (min_y, max_y) = quad
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let bbox_center = Point2D::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    // Large enough for both the rotated bbox and the upright rectangle
    let canvas_w = (max_x - min_x).max(width).ceil() as u32;
    let canvas_h = (max_y - min_y).max(height).ceil() as u32;

    let mut canvas = rasterizer.create_canvas(canvas_w, canvas_h);
    let transform = Affine2::IDENTITY
        .translate(canvas_w as f64 / 2.0, canvas_h as f64 / 2.0)
        .rotate(-angle)
        .translate(-bbox_center.x, -bbox_center.y);
    rasterizer.draw_image(&mut canvas, source, &transform);

    let crop_w = width.round().max(1.0) as u32;
    let crop_h = height.round().max(1.0) as u32;
    let crop_x = ((canvas_w as i64 - crop_w as i64) as f64 / 2.0).floor() as i64;
    let crop_y = ((canvas_h as i64 - crop_h as i64) as f64 / 2.0).floor() as i64;
    let cropped = rasterizer.read_region(&canvas, crop_x, crop_y, crop_w, crop_h);

    log::debug!(
        "Normalized quad: angle={:.4} rad, canvas {}x{}, crop {}x{} at ({}, {})",
        angle,
        canvas_w,
        canvas_h,
        crop_w,
        crop_h,
        crop_x,
        crop_y
    );

    let Some((target_w, target_h)) = options.target_size else {
        return Ok(NormalizedStrip {
            image: cropped,
            square_side: square_side_src,
        });
    };

    let ratio = fit_ratio(crop_w, crop_h, target_w, target_h);
    let out_w = (crop_w as f64 * ratio).round().max(1.0) as u32;
    let out_h = (crop_h as f64 * ratio).round().max(1.0) as u32;
    let mut scaled = rasterizer.create_canvas(out_w, out_h);
    rasterizer.draw_image(&mut scaled, &cropped, &Affine2::IDENTITY.scale(ratio, ratio));

    Ok(NormalizedStrip {
        image: scaled,
        square_side: square_side_src * ratio,
    })
}

/// Uniform scale that fits `w x h` inside `target_w x target_h`
pub fn fit_ratio(w: u32, h: u32, target_w: u32, target_h: u32) -> f64 {
    (target_w as f64 / w as f64).min(target_h as f64 / h as f64)
}

/// A crop running on a worker thread.
///
/// The normalized strip only becomes reachable through [`PendingCrop::poll`]
/// or [`PendingCrop::wait`] once the worker has finished.
pub struct PendingCrop {
    rx: Receiver<Result<NormalizedStrip>>,
}

impl PendingCrop {
    /// Start normalizing on a background thread with the software rasterizer.
    pub fn spawn(
        source: Arc<RgbaImage>,
        quad: [Point2D; 4],
        square_side_src: f64,
        options: NormalizeOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = normalize_quad(&SoftwareRasterizer, &*source, &quad, square_side_src, &options);
            // Receiver may already be gone if the session moved on
            let _ = tx.send(result);
        });
        Self { rx }
    }

    /// Non-blocking check; `None` while the worker is still running.
    pub fn poll(&self) -> Option<Result<NormalizedStrip>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(DigitizeError::CropWorker)),
        }
    }

    /// Block until the worker delivers.
    pub fn wait(self) -> Result<NormalizedStrip> {
        self.rx.recv().map_err(|_| DigitizeError::CropWorker)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8, 255]))
    }

    fn axis_quad(x: f64, y: f64, w: f64, h: f64) -> [Point2D; 4] {
        [
            Point2D::new(x, y),
            Point2D::new(x + w, y),
            Point2D::new(x + w, y + h),
            Point2D::new(x, y + h),
        ]
    }

    #[test]
    fn test_axis_aligned_crop_is_pixel_identical() {
        let src = gradient_image(80, 60);
        let quad = axis_quad(10.0, 5.0, 40.0, 30.0);
        let strip =
            normalize_quad(&SoftwareRasterizer, &src, &quad, 8.0, &NormalizeOptions::default()).unwrap();

        assert_eq!(strip.image.dimensions(), (40, 30));
        assert_eq!(strip.square_side, 8.0);
        for (x, y, p) in strip.image.enumerate_pixels() {
            assert_eq!(*p, *src.get_pixel(x + 10, y + 5), "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_grid_angle_zero_for_horizontal_edge() {
        assert_eq!(grid_angle(&axis_quad(0.0, 0.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_rotated_quad_recovers_upright_block() {
        // Dark 20x10 block rotated by 30 degrees around (50, 50)
        let theta = std::f64::consts::PI / 6.0;
        let (sin, cos) = theta.sin_cos();
        let center = Point2D::new(50.0, 50.0);
        let rot = |dx: f64, dy: f64| center + Point2D::new(dx * cos - dy * sin, dx * sin + dy * cos);
        let src = RgbaImage::from_fn(100, 100, |x, y| {
            let p = Point2D::new(x as f64 + 0.5, y as f64 + 0.5) - center;
            let local = Point2D::new(p.x * cos + p.y * sin, -p.x * sin + p.y * cos);
            if local.x.abs() < 10.0 && local.y.abs() < 5.0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let quad = [rot(-10.0, -5.0), rot(10.0, -5.0), rot(10.0, 5.0), rot(-10.0, 5.0)];
        assert!((grid_angle(&quad) - theta).abs() < 1e-9);

        let strip =
            normalize_quad(&SoftwareRasterizer, &src, &quad, 10.0, &NormalizeOptions::default()).unwrap();
        assert_eq!(strip.image.dimensions(), (20, 10));
        // Interior is dark after de-rotation
        let center_px = strip.image.get_pixel(10, 5);
        assert!(center_px.0[0] < 40, "center pixel {:?}", center_px);
    }

    #[test]
    fn test_degenerate_quad_fails() {
        let src = gradient_image(10, 10);
        let quad = [Point2D::new(1.0, 1.0); 4];
        let err = normalize_quad(&SoftwareRasterizer, &src, &quad, 1.0, &NormalizeOptions::default());
        assert!(matches!(
            err,
            Err(DigitizeError::Geometry(GeometryError::Degenerate { .. }))
        ));
    }

    #[test]
    fn test_sub_pixel_quad_reads_one_pixel() {
        let src = gradient_image(10, 10);
        let quad = axis_quad(2.0, 3.0, 0.4, 0.6);
        let strip =
            normalize_quad(&SoftwareRasterizer, &src, &quad, 1.0, &NormalizeOptions::default()).unwrap();
        assert_eq!(strip.image.dimensions(), (1, 1));
    }

    #[test]
    fn test_target_size_scales_square_side() {
        let src = gradient_image(100, 100);
        let quad = axis_quad(0.0, 0.0, 50.0, 20.0);
        let options = NormalizeOptions {
            target_size: Some((100, 100)),
        };
        let strip = normalize_quad(&SoftwareRasterizer, &src, &quad, 10.0, &options).unwrap();
        assert_eq!(strip.image.dimensions(), (100, 40));
        assert!((strip.square_side - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_pending_crop_delivers() {
        let src = Arc::new(gradient_image(30, 30));
        let pending = PendingCrop::spawn(src, axis_quad(0.0, 0.0, 20.0, 10.0), 5.0, NormalizeOptions::default());
        let strip = pending.wait().unwrap();
        assert_eq!(strip.image.dimensions(), (20, 10));
    }
}
