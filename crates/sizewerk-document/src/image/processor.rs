// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, colour-mode normalisation, downscaling, and
// quality-controlled encoding. Operates on in-memory images using the `image`
// crate.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ColorType, DynamicImage, ImageFormat};
use sizewerk_core::error::SizewerkError;
use sizewerk_core::types::RasterFormat;
use tracing::{debug, info, instrument};

/// Encoding pipeline for a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor`, so calls
/// chain:
///
/// ```ignore
/// let bytes = ImageProcessor::open("photo.png")?
///     .normalize_for(RasterFormat::Jpeg)
///     .encode(RasterFormat::Jpeg, 70)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SizewerkError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            SizewerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(
            width = img.width(),
            height = img.height(),
            color = ?img.color(),
            "Image loaded"
        );
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, SizewerkError> {
        let img = image::load_from_memory(data).map_err(|err| {
            SizewerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color(&self) -> ColorType {
        self.image.color()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Convert the pixel layout into one the encoder for `format` accepts.
    ///
    /// JPEG takes 8-bit luma or RGB only, so alpha, palette-expanded, 16-bit
    /// and float images become RGB8. GIF needs RGB8/RGBA8. TIFF has no
    /// luma-alpha layout, so any alpha becomes RGBA8. The remaining encoders
    /// take any 8-bit L/LA/RGB/RGBA layout; wider layouts are narrowed to
    /// RGB8 or RGBA8.
    pub fn normalize_for(self, format: RasterFormat) -> Self {
        let color = self.image.color();
        let image = match format {
            RasterFormat::Jpeg => match color {
                ColorType::L8 | ColorType::Rgb8 => self.image,
                ColorType::L16 => DynamicImage::ImageLuma8(self.image.to_luma8()),
                _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            },
            RasterFormat::Gif => match color {
                ColorType::Rgb8 | ColorType::Rgba8 => self.image,
                c if c.has_alpha() => DynamicImage::ImageRgba8(self.image.to_rgba8()),
                _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            },
            RasterFormat::Tiff => match color {
                ColorType::L8 | ColorType::Rgb8 | ColorType::Rgba8 => self.image,
                c if c.has_alpha() => DynamicImage::ImageRgba8(self.image.to_rgba8()),
                _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            },
            RasterFormat::Png | RasterFormat::Bmp | RasterFormat::WebP => {
                match color {
                    ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
                        self.image
                    }
                    c if c.has_alpha() => DynamicImage::ImageRgba8(self.image.to_rgba8()),
                    _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
                }
            }
        };
        if image.color() != color {
            debug!(from = ?color, to = ?image.color(), ?format, "Colour mode normalised");
        }
        Self { image }
    }

    /// A copy scaled to `scale_pct` percent of the current dimensions
    /// (floored, at least one pixel per side), using Lanczos3.
    pub fn scaled(&self, scale_pct: u8) -> Self {
        let scale = |dim: u32| -> u32 {
            let scaled = u64::from(dim) * u64::from(scale_pct) / 100;
            scaled.max(1) as u32
        };
        let (width, height) = (scale(self.image.width()), scale(self.image.height()));
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            width,
            height,
            scale_pct,
            "Downscaling image"
        );
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode for `format`. `quality` (1-100) only affects lossy encoders.
    pub fn encode(&self, format: RasterFormat, quality: u8) -> Result<Vec<u8>, SizewerkError> {
        match format {
            RasterFormat::Jpeg => self.to_jpeg_bytes(quality),
            RasterFormat::Png => self.to_png_bytes(),
            RasterFormat::Gif => encode_to_format(&self.image, ImageFormat::Gif),
            RasterFormat::Bmp => encode_to_format(&self.image, ImageFormat::Bmp),
            RasterFormat::Tiff => encode_to_format(&self.image, ImageFormat::Tiff),
            RasterFormat::WebP => encode_to_format(&self.image, ImageFormat::WebP),
        }
    }

    /// Encode as PNG with the strongest deflate setting.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, SizewerkError> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);
        self.image.write_with_encoder(encoder).map_err(|err| {
            SizewerkError::ImageError(format!("PNG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode as JPEG with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, SizewerkError> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        let result = match self.image.color() {
            ColorType::L8 | ColorType::Rgb8 => self.image.write_with_encoder(encoder),
            _ => self.image.to_rgb8().write_with_encoder(encoder),
        };
        result.map_err(|err| {
            SizewerkError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<Vec<u8>, SizewerkError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        SizewerkError::ImageError(format!("{:?} encoding failed: {}", format, err))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8, 200])
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn jpeg_normalisation_drops_alpha() {
        let processor =
            ImageProcessor::from_dynamic(gradient_rgba(16, 16)).normalize_for(RasterFormat::Jpeg);
        assert_eq!(processor.color(), ColorType::Rgb8);
    }

    #[test]
    fn png_normalisation_keeps_alpha() {
        let processor =
            ImageProcessor::from_dynamic(gradient_rgba(16, 16)).normalize_for(RasterFormat::Png);
        assert_eq!(processor.color(), ColorType::Rgba8);
    }

    #[test]
    fn sixteen_bit_is_narrowed() {
        let wide = DynamicImage::ImageRgb16(image::ImageBuffer::new(4, 4));
        let processor = ImageProcessor::from_dynamic(wide).normalize_for(RasterFormat::Tiff);
        assert_eq!(processor.color(), ColorType::Rgb8);
    }

    #[test]
    fn tiff_has_no_luma_alpha() {
        let la = DynamicImage::ImageLumaA8(image::ImageBuffer::new(4, 4));
        let processor = ImageProcessor::from_dynamic(la).normalize_for(RasterFormat::Tiff);
        assert_eq!(processor.color(), ColorType::Rgba8);
    }

    #[test]
    fn every_layout_encodes_after_normalisation() {
        let layouts = [
            DynamicImage::ImageLuma8(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageLumaA8(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgb8(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgba8(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageLuma16(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageLumaA16(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgb16(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgba16(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgb32F(image::ImageBuffer::new(6, 4)),
            DynamicImage::ImageRgba32F(image::ImageBuffer::new(6, 4)),
        ];
        let formats = [
            RasterFormat::Jpeg,
            RasterFormat::Png,
            RasterFormat::Gif,
            RasterFormat::Bmp,
            RasterFormat::Tiff,
            RasterFormat::WebP,
        ];
        for layout in &layouts {
            for format in formats {
                let processor = ImageProcessor::from_dynamic(layout.clone()).normalize_for(format);
                let (from, to) = (layout.color(), processor.color());
                let bytes = processor.encode(format, 70).unwrap_or_else(|err| {
                    panic!("{format:?} rejected {to:?} (from {from:?}): {err}")
                });
                assert!(!bytes.is_empty());
            }
        }
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let processor =
            ImageProcessor::from_dynamic(gradient_rgba(128, 128)).normalize_for(RasterFormat::Jpeg);
        let high = processor.encode(RasterFormat::Jpeg, 95).unwrap();
        let low = processor.encode(RasterFormat::Jpeg, 10).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn scaling_floors_and_clamps() {
        let processor = ImageProcessor::from_dynamic(gradient_rgba(101, 3));
        let half = processor.scaled(50);
        assert_eq!((half.width(), half.height()), (50, 1));
        let tiny = processor.scaled(1);
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn encoded_bytes_decode_again() {
        let processor =
            ImageProcessor::from_dynamic(gradient_rgba(20, 10)).normalize_for(RasterFormat::Png);
        let bytes = processor.encode(RasterFormat::Png, 50).unwrap();
        let reopened = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((reopened.width(), reopened.height()), (20, 10));
    }
}
