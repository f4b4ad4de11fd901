/// Lead segmenter: split the normalized strip into equal horizontal bands

use image::{GenericImageView, RgbaImage, SubImage};

use crate::data::leads::LeadBox;
use crate::error::{DigitizeError, Result};

/// One band per lead, `floor(height / lead_count)` rows each, zero line at
/// the band centre until extraction provides a better value.
pub fn segment_leads(image_height: u32, lead_count: usize) -> Result<Vec<LeadBox>> {
    if lead_count == 0 {
        return Err(DigitizeError::InvalidSetting {
            name: "lead_count",
            value: 0.0,
        });
    }
    let band_height = (image_height as usize / lead_count) as f64;
    Ok((0..lead_count)
        .map(|i| LeadBox {
            offset: i as f64 * band_height,
            height: band_height,
            zero_point: band_height / 2.0,
        })
        .collect())
}

/// Integer row range `[top, bottom)` of a band, clipped to the image
pub fn band_rows(lead_box: &LeadBox, image_height: u32) -> (u32, u32) {
    let top = lead_box.offset.round().clamp(0.0, image_height as f64) as u32;
    let bottom = lead_box.bottom().round().clamp(top as f64, image_height as f64) as u32;
    (top, bottom)
}

/// Full-width view of the band's rows
pub fn band_view<'a>(image: &'a RgbaImage, lead_box: &LeadBox) -> SubImage<&'a RgbaImage> {
    let (top, bottom) = band_rows(lead_box, image.height());
    image.view(0, top, image.width(), bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_bands() {
        let boxes = segment_leads(125, 12).unwrap();
        assert_eq!(boxes.len(), 12);
        for (i, b) in boxes.iter().enumerate() {
            assert_eq!(b.height, 10.0);
            assert_eq!(b.offset, i as f64 * 10.0);
            assert_eq!(b.zero_point, 5.0);
        }
    }

    #[test]
    fn test_zero_leads_rejected() {
        assert!(segment_leads(100, 0).is_err());
    }

    #[test]
    fn test_band_rows_clip_to_image() {
        let b = LeadBox {
            offset: 90.0,
            height: 30.0,
            zero_point: 0.0,
        };
        assert_eq!(band_rows(&b, 100), (90, 100));
        let above = LeadBox {
            offset: -10.0,
            height: 5.0,
            zero_point: 0.0,
        };
        assert_eq!(band_rows(&above, 100), (0, 0));
    }

    #[test]
    fn test_band_view_dimensions() {
        let img = RgbaImage::new(40, 60);
        let b = LeadBox {
            offset: 20.0,
            height: 10.0,
            zero_point: 5.0,
        };
        assert_eq!(band_view(&img, &b).dimensions(), (40, 10));
    }
}
