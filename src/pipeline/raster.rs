/// 2D rasterization boundary used by the rectangle normalizer.
///
/// The normalizer only needs three capabilities: a blank canvas, drawing an
/// image through an affine transform, and reading back a region. They are
/// expressed as the `Rasterizer` trait so a GPU or platform canvas can be
/// swapped in; `SoftwareRasterizer` is the CPU implementation.

use image::{GenericImageView, Rgba, RgbaImage};

/// Paper white, used for canvas areas no source pixel lands on
pub const PAPER_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Affine map `(x, y) -> (a·x + c·y + e, b·x + d·y + f)`.
///
/// Builder methods compose like a canvas context: each call applies to the
/// point *before* the transforms already accumulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `self ∘ other`: apply `other` first, then `self`
    pub fn then_apply(&self, other: &Affine2) -> Affine2 {
        Affine2 {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn translate(self, tx: f64, ty: f64) -> Affine2 {
        self.then_apply(&Affine2 {
            e: tx,
            f: ty,
            ..Affine2::IDENTITY
        })
    }

    /// Rotation by `radians`; positive turns +x toward +y (clockwise on screen)
    pub fn rotate(self, radians: f64) -> Affine2 {
        let (sin, cos) = radians.sin_cos();
        self.then_apply(&Affine2 {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        })
    }

    pub fn scale(self, sx: f64, sy: f64) -> Affine2 {
        self.then_apply(&Affine2 {
            a: sx,
            d: sy,
            ..Affine2::IDENTITY
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse map, `None` when the transform collapses the plane
    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Affine2 {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }
}

/// 2D rasterization capability
pub trait Rasterizer {
    /// Blank canvas filled with [`PAPER_WHITE`]
    fn create_canvas(&self, width: u32, height: u32) -> RgbaImage;

    /// Draw `source` onto `canvas`, mapping source pixel coordinates through
    /// `transform`.
    fn draw_image<I>(&self, canvas: &mut RgbaImage, source: &I, transform: &Affine2)
    where
        I: GenericImageView<Pixel = Rgba<u8>>;

    /// Copy a region out of `canvas` into a new owned buffer. Areas outside
    /// the canvas read as paper white.
    fn read_region(&self, canvas: &RgbaImage, x: i64, y: i64, width: u32, height: u32) -> RgbaImage;
}

/// CPU rasterizer with bilinear sampling
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareRasterizer;

impl Rasterizer for SoftwareRasterizer {
    fn create_canvas(&self, width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, PAPER_WHITE)
    }

    fn draw_image<I>(&self, canvas: &mut RgbaImage, source: &I, transform: &Affine2)
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let Some(inverse) = transform.inverse() else {
            log::warn!("Skipping draw: transform is not invertible");
            return;
        };
        let (sw, sh) = source.dimensions();
        if sw == 0 || sh == 0 {
            return;
        }

        for (cx, cy, out) in canvas.enumerate_pixels_mut() {
            // Pixel centres on both sides
            let (sx, sy) = inverse.apply(cx as f64 + 0.5, cy as f64 + 0.5);
            let (sx, sy) = (sx - 0.5, sy - 0.5);
            if sx < -0.5 || sy < -0.5 || sx > sw as f64 - 0.5 || sy > sh as f64 - 0.5 {
                continue;
            }
            *out = sample_bilinear(source, sx, sy);
        }
    }

    fn read_region(&self, canvas: &RgbaImage, x: i64, y: i64, width: u32, height: u32) -> RgbaImage {
        let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
        RgbaImage::from_fn(width, height, |rx, ry| {
            let (px, py) = (x + rx as i64, y + ry as i64);
            if px < 0 || py < 0 || px >= cw || py >= ch {
                PAPER_WHITE
            } else {
                *canvas.get_pixel(px as u32, py as u32)
            }
        })
    }
}

/// Bilinear sample at continuous pixel-index coordinates, clamped to the edge
pub fn sample_bilinear<I>(img: &I, x: f64, y: f64) -> Rgba<u8>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let (w, h) = img.dimensions();
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for ch in 0..4 {
        let v = (1.0 - fx) * (1.0 - fy) * p00[ch] as f64
            + fx * (1.0 - fy) * p10[ch] as f64
            + (1.0 - fx) * fy * p01[ch] as f64
            + fx * fy * p11[ch] as f64;
        out[ch] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_affine_composition_order() {
        // translate last, rotate first
        let t = Affine2::IDENTITY
            .translate(10.0, 0.0)
            .rotate(std::f64::consts::FRAC_PI_2);
        assert!(approx(t.apply(1.0, 0.0), (10.0, 1.0)));
    }

    #[test]
    fn test_affine_inverse_roundtrip() {
        let t = Affine2::IDENTITY
            .translate(3.0, -7.0)
            .rotate(0.3)
            .scale(2.0, 0.5);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(4.0, 9.0);
        assert!(approx(inv.apply(x, y), (4.0, 9.0)));
    }

    #[test]
    fn test_degenerate_transform_has_no_inverse() {
        assert!(Affine2::IDENTITY.scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_identity_draw_copies_pixels() {
        let src = RgbaImage::from_fn(4, 3, |x, y| Rgba([(x * 40) as u8, (y * 60) as u8, 7, 255]));
        let r = SoftwareRasterizer;
        let mut canvas = r.create_canvas(4, 3);
        r.draw_image(&mut canvas, &src, &Affine2::IDENTITY);
        assert_eq!(canvas, src);
    }

    #[test]
    fn test_read_region_pads_with_white() {
        let r = SoftwareRasterizer;
        let canvas = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let region = r.read_region(&canvas, 1, 1, 2, 2);
        assert_eq!(*region.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*region.get_pixel(1, 1), PAPER_WHITE);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 100, 50, 255])
            }
        });
        assert_eq!(sample_bilinear(&img, 0.5, 0.0), Rgba([100, 50, 25, 255]));
    }
}
