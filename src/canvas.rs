//! Canvas - Explicit Render Target
//!
//! Every drawing stage receives the canvas it paints on. There is no ambient
//! "current image": a render owns its canvases and drops them when done.

use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::pipeline::RenderError;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Mutable RGBA buffer (straight alpha, row 0 at the top).
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Allocate a transparent canvas.
    ///
    /// Sizes are chosen by the planner beforehand, so a failed reservation here
    /// means the memory estimate was wrong.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let len = Self::bytes_for(width, height);
        let len = usize::try_from(len)
            .map_err(|_| RenderError::Other(format!("canvas {}x{} exceeds address space", width, height)))?;

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            RenderError::Other(format!(
                "failed to allocate {}x{} canvas despite planning: {}",
                width, height, e
            ))
        })?;
        buf.resize(len, 0);

        let image = RgbaImage::from_raw(width, height, buf)
            .ok_or_else(|| RenderError::Other("canvas buffer size mismatch".into()))?;
        Ok(Self { image })
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Bytes held by a canvas of the given size.
    pub fn bytes_for(width: u32, height: u32) -> u64 {
        width as u64 * height as u64 * 4
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn byte_len(&self) -> u64 {
        Self::bytes_for(self.width(), self.height())
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.image.get_pixel(x, y).0)
    }

    /// Overwrite a pixel, ignoring out-of-bounds coordinates.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if let Some((x, y)) = self.clip(x, y) {
            self.image.put_pixel(x, y, Rgba(color));
        }
    }

    /// Source-over blend a pixel, ignoring out-of-bounds coordinates.
    pub fn blend_pixel(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if let Some((x, y)) = self.clip(x, y) {
            let dst = self.image.get_pixel(x, y).0;
            self.image.put_pixel(x, y, Rgba(blend_over(src, dst)));
        }
    }

    fn clip(&self, x: i64, y: i64) -> Option<(u32, u32)> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            None
        } else {
            Some((x as u32, y as u32))
        }
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Paint a solid rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: Rgba<u8>) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(self.width() as i64);
        let y1 = (y + height as i64).min(self.height() as i64);

        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color.0);
            }
        }
    }

    /// Outline a rectangle with a pen of `stroke` pixels centered on its edges.
    ///
    /// The outlined path runs from `(x, y)` to `(x + width, y + height)`.
    pub fn stroke_rect(&mut self, x: i64, y: i64, width: u32, height: u32, stroke: u32, color: Rgba<u8>) {
        let half = (stroke / 2) as i64;
        let rest = stroke as i64 - half;

        let outer = (x - half, y - half, x + width as i64 + rest, y + height as i64 + rest);
        let inner = (x + rest, y + rest, x + width as i64 - half, y + height as i64 - half);

        for py in outer.1.max(0)..outer.3.min(self.height() as i64) {
            for px in outer.0.max(0)..outer.2.min(self.width() as i64) {
                let inside = px >= inner.0 && px < inner.2 && py >= inner.1 && py < inner.3;
                if !inside {
                    self.blend_pixel(px, py, color.0);
                }
            }
        }
    }

    /// Composite `src` with its top-left corner at `(x, y)`.
    pub fn draw_canvas(&mut self, src: &Canvas, x: i64, y: i64) {
        self.draw_image(&src.image, x, y);
    }

    pub fn draw_image(&mut self, src: &RgbaImage, x: i64, y: i64) {
        for (sx, sy, pixel) in src.enumerate_pixels() {
            if pixel.0[3] == 0 {
                continue;
            }
            self.blend_pixel(x + sx as i64, y + sy as i64, pixel.0);
        }
    }

    /// Repeat `texture` from the top-left corner until the canvas is covered.
    pub fn tile(&mut self, texture: &RgbaImage) {
        let (tw, th) = texture.dimensions();
        if tw == 0 || th == 0 {
            return;
        }
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            *pixel = *texture.get_pixel(x % tw, y % th);
        }
    }
}

/// Straight-alpha source-over.
pub fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    match src[3] {
        0 => return dst,
        255 => return src,
        _ => {}
    }

    let src_a = src[3] as f32 / 255.0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let blend = |s: u8, d: u8| -> u8 {
        let out = (s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a;
        out.round().clamp(0.0, 255.0) as u8
    };

    [
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ]
}

/// Channel-wise multiply, as a tint.
pub fn multiply(pixel: [u8; 4], tint: Rgba<u8>) -> [u8; 4] {
    let mul = |a: u8, b: u8| ((a as u16 * b as u16 + 127) / 255) as u8;
    [
        mul(pixel[0], tint.0[0]),
        mul(pixel[1], tint.0[1]),
        mul(pixel[2], tint.0[2]),
        mul(pixel[3], tint.0[3]),
    ]
}

/// `#rrggbb` / `#rrggbbaa` color as it appears in options and catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub Rgba<u8>);

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(Rgba([r, g, b, 255]))
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| format!("color {:?} must start with '#'", s))?;
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(format!("color {:?} is not a 6 or 8 digit hex color", s));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("color {:?} has invalid hex digits", s))
        };

        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha])))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0 .0;
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_rect_hugs_edges() {
        let mut canvas = Canvas::new(20, 20).unwrap();
        canvas.stroke_rect(2, 2, 16, 16, 4, WHITE);

        // Pen of 4 centered on the path at 2 covers columns 0..4
        assert_eq!(canvas.get_pixel(0, 10), Some([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(3, 10), Some([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(4, 10), Some([0, 0, 0, 0]));
        assert_eq!(canvas.get_pixel(19, 19), Some([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(15, 15), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_tile_repeats_texture() {
        let mut texture = RgbaImage::new(2, 1);
        texture.put_pixel(0, 0, Rgba([10, 0, 0, 255]));
        texture.put_pixel(1, 0, Rgba([20, 0, 0, 255]));

        let mut canvas = Canvas::new(5, 3).unwrap();
        canvas.tile(&texture);

        assert_eq!(canvas.get_pixel(4, 2), Some([10, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(3, 0), Some([20, 0, 0, 255]));
    }

    #[test]
    fn test_blend_over_transparent_keeps_source() {
        let out = blend_over([255, 0, 0, 191], [0, 0, 0, 0]);
        assert_eq!(out, [255, 0, 0, 191]);
    }

    #[test]
    fn test_hex_color_parse() {
        let color: HexColor = "#454545".parse().unwrap();
        assert_eq!(color.0, Rgba([0x45, 0x45, 0x45, 255]));
        assert_eq!(color.to_string(), "#454545");

        assert!("454545".parse::<HexColor>().is_err());
        assert!("#45454".parse::<HexColor>().is_err());
        assert!("#zz4545".parse::<HexColor>().is_err());
    }
}
