/// Trace extractor
///
/// Walks a band column by column and picks, per column, the row that best
/// balances ink darkness against continuity with the previous column and a
/// weak pull toward the band's mid-line.

use image::{GenericImageView, Rgba};

use crate::data::leads::LeadPoint;
use crate::data::settings::{ExtractionConfig, LumaWeights};

/// Inverted luma: 0 for white paper, 255 for black ink
pub fn darkness(pixel: Rgba<u8>, luma: &LumaWeights) -> f64 {
    let [r, g, b, _] = pixel.0;
    255.0 - (luma.r * r as f64 + luma.g * g as f64 + luma.b * b as f64)
}

/// Best-scoring row of column `x` given the previous column's row.
///
/// Ties go to the smallest row.
pub fn score_column<I>(band: &I, x: u32, prev_y: f64, config: &ExtractionConfig) -> LeadPoint
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let h = band.height();
    let center = h as f64 / 2.0;
    let w = &config.weights;

    let mut best = LeadPoint {
        x: x as usize,
        y: 0.0,
        d: 0.0,
        modified: false,
    };
    let mut best_score = f64::NEG_INFINITY;

    for y in 0..h {
        let d = darkness(band.get_pixel(x, y), &config.luma);
        let yf = y as f64;
        let score = w.darkness * d - w.continuity * (yf - prev_y).abs() - w.centering * (yf - center).abs();
        if score > best_score {
            best_score = score;
            best.y = yf;
            best.d = d;
        }
    }
    best
}

/// Extract one point per column, left to right, seeded at the band centre.
pub fn extract_trace<I>(band: &I, config: &ExtractionConfig) -> Vec<LeadPoint>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let mut prev_y = band.height() as f64 / 2.0;
    (0..band.width())
        .map(|x| {
            let point = score_column(band, x, prev_y, config);
            prev_y = point.y;
            point
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::settings::ScoreWeights;
    use image::RgbaImage;

    const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);
    const PAPER: Rgba<u8> = Rgba([250, 250, 250, 255]);

    fn line_band(w: u32, h: u32, row: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |_, y| if y == row { INK } else { PAPER })
    }

    #[test]
    fn test_darkness_standard_and_red_blind() {
        assert!(darkness(Rgba([255, 255, 255, 255]), &LumaWeights::STANDARD).abs() < 1e-9);
        assert!((darkness(Rgba([0, 0, 0, 255]), &LumaWeights::STANDARD) - 255.0).abs() < 1e-9);
        // Pure red reads as light when red is ignored
        let red = Rgba([255, 0, 0, 255]);
        assert!(darkness(red, &LumaWeights::GREEN_BLUE) > darkness(red, &LumaWeights::STANDARD));
    }

    #[test]
    fn test_single_dark_line_is_followed() {
        let band = line_band(50, 40, 12);
        let trace = extract_trace(&band, &ExtractionConfig::default());
        assert_eq!(trace.len(), 50);
        for (i, p) in trace.iter().enumerate() {
            assert_eq!(p.x, i);
            assert_eq!(p.y, 12.0);
            assert!(!p.modified);
        }
    }

    #[test]
    fn test_blank_band_stays_centered() {
        let band = RgbaImage::from_pixel(10, 20, PAPER);
        let trace = extract_trace(&band, &ExtractionConfig::default());
        assert!(trace.iter().all(|p| p.y == 10.0));
    }

    #[test]
    fn test_ties_break_to_first_row() {
        // Only darkness counts and two rows are equally dark
        let band = RgbaImage::from_fn(1, 10, |_, y| if y == 3 || y == 7 { INK } else { PAPER });
        let config = ExtractionConfig {
            weights: ScoreWeights {
                darkness: 1.0,
                continuity: 0.0,
                centering: 0.0,
            },
            ..Default::default()
        };
        assert_eq!(score_column(&band, 0, 5.0, &config).y, 3.0);
    }

    #[test]
    fn test_continuity_suppresses_isolated_jump() {
        // Faint speck far from the line in one column
        let mut band = line_band(3, 60, 30);
        band.put_pixel(1, 30, PAPER);
        band.put_pixel(1, 2, Rgba([200, 200, 200, 255]));
        let trace = extract_trace(&band, &ExtractionConfig::default());
        assert_eq!(trace[1].y, 30.0);
    }
}
