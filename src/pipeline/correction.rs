/// Manual correction layer
///
/// Operator pins protect individual points; recompute regenerates every
/// unpinned point from its left neighbour while pins act as fixed anchors.

use image::{GenericImageView, Rgba};
use serde::{Deserialize, Serialize};

use super::extract::{extract_trace, score_column};
use crate::data::leads::LeadPoint;
use crate::data::settings::ExtractionConfig;

/// Per-lead trace, one point per normalized-image column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadTrace {
    pub points: Vec<LeadPoint>,
}

impl LeadTrace {
    pub fn extract<I>(band: &I, config: &ExtractionConfig) -> Self
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        Self {
            points: extract_trace(band, config),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pin column `x` at band-relative row `y`. Returns false when `x` is
    /// outside the trace.
    pub fn pin(&mut self, x: usize, y: f64, d: f64) -> bool {
        match self.points.get_mut(x) {
            Some(point) => {
                point.y = y;
                point.d = d;
                point.modified = true;
                true
            }
            None => false,
        }
    }

    /// Clear pins on columns `x - radius ..= x + radius`; returns how many
    /// pins were released.
    pub fn unpin_near(&mut self, x: usize, radius: usize) -> usize {
        if self.points.is_empty() {
            return 0;
        }
        let lo = x.saturating_sub(radius);
        let hi = x.saturating_add(radius).min(self.points.len() - 1);
        if lo > hi {
            return 0;
        }
        let mut released = 0;
        for point in &mut self.points[lo..=hi] {
            if point.modified {
                point.modified = false;
                released += 1;
            }
        }
        released
    }

    pub fn pinned_count(&self) -> usize {
        self.points.iter().filter(|p| p.modified).count()
    }

    /// Rescore every unpinned column from column 1 onward using the current
    /// point at `x - 1` as the previous row. Column 0 is left as extracted.
    pub fn recompute<I>(&mut self, band: &I, config: &ExtractionConfig) -> usize
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let width = self.points.len().min(band.width() as usize);
        let mut changed = 0;
        for x in 1..width {
            if self.points[x].modified {
                continue;
            }
            let prev_y = self.points[x - 1].y;
            let next = score_column(band, x as u32, prev_y, config);
            if next != self.points[x] {
                changed += 1;
            }
            self.points[x] = next;
        }
        changed
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// Two parallel lines; extraction follows the upper one from the centre
    fn two_line_band() -> RgbaImage {
        RgbaImage::from_fn(40, 40, |_, y| if y == 18 || y == 30 { INK } else { PAPER })
    }

    #[test]
    fn test_pin_survives_recompute() {
        let band = two_line_band();
        let config = ExtractionConfig::default();
        let mut trace = LeadTrace::extract(&band, &config);
        assert_eq!(trace.points[20].y, 18.0);

        assert!(trace.pin(20, 30.0, 255.0));
        for _ in 0..3 {
            trace.recompute(&band, &config);
            assert_eq!(trace.points[20].y, 30.0);
            assert!(trace.points[20].modified);
        }
        // Right neighbour now continues from the pinned row
        assert_eq!(trace.points[21].y, 30.0);
        // Left side is unaffected
        assert_eq!(trace.points[19].y, 18.0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let band = two_line_band();
        let config = ExtractionConfig::default();
        let mut trace = LeadTrace::extract(&band, &config);
        trace.pin(5, 30.0, 255.0);
        trace.recompute(&band, &config);
        let once = trace.clone();
        assert_eq!(trace.recompute(&band, &config), 0);
        assert_eq!(trace, once);
    }

    #[test]
    fn test_unpin_near_releases_radius() {
        let band = two_line_band();
        let config = ExtractionConfig::default();
        let mut trace = LeadTrace::extract(&band, &config);
        for x in [2, 10, 25, 39] {
            trace.pin(x, 30.0, 255.0);
        }
        assert_eq!(trace.unpin_near(12, 2), 1);
        assert_eq!(trace.pinned_count(), 3);
        assert_eq!(trace.unpin_near(0, 15), 1);
        assert_eq!(trace.unpin_near(39, 15), 2);
        assert_eq!(trace.pinned_count(), 0);

        // Released points rejoin the upper line on recompute
        trace.recompute(&band, &config);
        assert!(trace.points[3..].iter().all(|p| p.y == 18.0));
    }

    #[test]
    fn test_pin_out_of_range() {
        let mut trace = LeadTrace::default();
        assert!(!trace.pin(0, 1.0, 0.0));
        assert_eq!(trace.unpin_near(0, 15), 0);
    }
}
