//! Progressive-disclosure poster rendering.
//!
//! A [`HintImage`] starts as an opaque black canvas the size of the poster.
//! Each reveal step adds one random circle and paints the true poster pixels
//! inside it onto the canvas, so disclosure can only ever grow within a
//! round. The current composite is kept encoded as JPEG for broadcast.

use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};
use rand::Rng;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    #[error("could not decode poster image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode hint image: {0}")]
    Encode(#[source] image::ImageError),
}

/// One reveal circle in image pixel space. Invariant:
/// `radius <= x <= width - radius` and `radius <= y <= height - radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Circle {
    /// Random circle with `radius = (min + rand * (max - min)) * max(w, h)`,
    /// clamped so the in-bounds invariant stays satisfiable for any fraction
    /// range within `[0, 1]`, and a center uniform over the admissible
    /// rectangle.
    pub fn random(width: u32, height: u32, min_frac: f64, max_frac: f64) -> Self {
        let mut rng = rand::rng();
        let (w, h) = (f64::from(width), f64::from(height));
        let span = (max_frac - min_frac).max(0.0);
        let frac = min_frac + rng.random_range(0.0..=1.0) * span;
        let radius = (frac * w.max(h)).min(w / 2.0).min(h / 2.0).max(0.0);
        let x = rng.random_range(radius..=(w - radius));
        let y = rng.random_range(radius..=(h - radius));
        Self { x, y, radius }
    }

    fn contains(&self, px: u32, py: u32) -> bool {
        let dx = f64::from(px) + 0.5 - self.x;
        let dy = f64::from(py) + 0.5 - self.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Composited hint image for one round. The source poster is fixed for the
/// component's lifetime; circles accumulate and are never removed.
pub struct HintImage {
    source: RgbImage,
    canvas: RgbImage,
    circles: Vec<Circle>,
    jpeg: Vec<u8>,
}

impl HintImage {
    /// Decode the poster and start with a fully black canvas.
    pub fn new(bytes: &[u8]) -> Result<Self, RevealError> {
        let source = image::load_from_memory(bytes)
            .map_err(RevealError::Decode)?
            .to_rgb8();
        let canvas = RgbImage::from_pixel(source.width(), source.height(), Rgb([0, 0, 0]));
        let jpeg = encode_jpeg(&canvas)?;
        Ok(Self {
            source,
            canvas,
            circles: Vec::new(),
            jpeg,
        })
    }

    pub fn width(&self) -> u32 {
        self.source.width()
    }

    pub fn height(&self) -> u32 {
        self.source.height()
    }

    pub fn circle_count(&self) -> usize {
        self.circles.len()
    }

    /// Most recently composited JPEG bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Add one random circle and re-composite.
    pub fn reveal_more(&mut self, min_frac: f64, max_frac: f64) -> Result<(), RevealError> {
        let circle = Circle::random(self.width(), self.height(), min_frac, max_frac);
        self.paint(&circle);
        self.circles.push(circle);
        self.jpeg = encode_jpeg(&self.canvas)?;
        Ok(())
    }

    /// Show the entire poster, bypassing the circle list.
    pub fn reveal_all(&mut self) -> Result<(), RevealError> {
        self.canvas = self.source.clone();
        self.jpeg = encode_jpeg(&self.canvas)?;
        Ok(())
    }

    /// Copy source pixels inside `circle` onto the canvas. Painting only
    /// ever adds revealed pixels, which is what keeps disclosure monotonic.
    fn paint(&mut self, circle: &Circle) {
        let x_lo = (circle.x - circle.radius).floor().max(0.0) as u32;
        let y_lo = (circle.y - circle.radius).floor().max(0.0) as u32;
        let x_hi = ((circle.x + circle.radius).ceil() as u32).min(self.width());
        let y_hi = ((circle.y + circle.radius).ceil() as u32).min(self.height());

        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                if circle.contains(x, y) {
                    self.canvas.put_pixel(x, y, *self.source.get_pixel(x, y));
                }
            }
        }
    }

    #[cfg(test)]
    fn revealed_pixels(&self) -> Vec<bool> {
        // The test poster is pure white, so any non-black canvas pixel is a
        // revealed one.
        self.canvas.pixels().map(|p| p.0 != [0, 0, 0]).collect()
    }
}

fn encode_jpeg(canvas: &RgbImage) -> Result<Vec<u8>, RevealError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    canvas
        .write_with_encoder(encoder)
        .map_err(RevealError::Encode)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;

    fn white_poster(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decode_failure_is_an_error() {
        assert!(matches!(
            HintImage::new(b"not an image"),
            Err(RevealError::Decode(_))
        ));
    }

    #[test]
    fn starts_fully_hidden() {
        let hint = HintImage::new(&white_poster(40, 30)).unwrap();
        assert_eq!(hint.circle_count(), 0);
        assert!(hint.revealed_pixels().iter().all(|r| !r));
        assert!(!hint.jpeg().is_empty());
    }

    #[test]
    fn disclosure_is_monotonic() {
        let mut hint = HintImage::new(&white_poster(64, 48)).unwrap();
        let mut before = hint.revealed_pixels();
        for _ in 0..8 {
            hint.reveal_more(0.05, 0.2).unwrap();
            let after = hint.revealed_pixels();
            for (b, a) in before.iter().zip(&after) {
                assert!(!b || *a, "a previously revealed pixel went dark");
            }
            before = after;
        }
        assert_eq!(hint.circle_count(), 8);
    }

    #[test]
    fn reveal_all_discloses_every_pixel() {
        let mut hint = HintImage::new(&white_poster(32, 32)).unwrap();
        hint.reveal_more(0.01, 0.1).unwrap();
        hint.reveal_all().unwrap();
        assert!(hint.revealed_pixels().iter().all(|r| *r));
    }

    #[test]
    fn circles_stay_inside_bounds_for_extreme_fractions() {
        for (w, h) in [(100, 40), (40, 100), (8, 8)] {
            for (min, max) in [(0.0, 0.0), (0.01, 0.1), (0.5, 1.0), (1.0, 1.0)] {
                for _ in 0..50 {
                    let c = Circle::random(w, h, min, max);
                    assert!(c.radius <= c.x && c.x <= f64::from(w) - c.radius);
                    assert!(c.radius <= c.y && c.y <= f64::from(h) - c.radius);
                }
            }
        }
    }

    #[test]
    fn a_revealed_circle_shows_true_pixels() {
        let mut hint = HintImage::new(&white_poster(50, 50)).unwrap();
        hint.reveal_more(0.2, 0.2).unwrap();
        let revealed = hint.revealed_pixels().iter().filter(|r| **r).count();
        assert!(revealed > 0, "a 0.2-fraction circle reveals something");
    }
}
