use crate::config::StageOptions;
use crate::config::stage::ImageOptions;
use crate::error::{PipelineError, PipelineResult, TransformResult};
use crate::pipeline::keys::{ASSETS, REPORT, STAGE};
use crate::pipeline::nodes::basic::transform_contents;
use crate::pipeline::{Asset, PipeMap, PipeNode};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};
use tracing::{debug, info};

/// Image optimizer node - re-encode PNG and JPEG, keep whichever is smaller
pub struct ImageOptimizerNode;

#[async_trait]
impl PipeNode for ImageOptimizerNode {
    fn name(&self) -> String {
        "ImageOptimizer".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            ASSETS.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let options = match &data.require(STAGE, &name)?.options {
            StageOptions::Image(options) => options.clone(),
            other => {
                return Err(PipelineError::config(format!(
                    "{name} needs image options, got {other:?}"
                )));
            }
        };
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let optimized = transform_contents(assets, report, |asset| optimize(asset, &options));

        data.insert_typed(ASSETS, optimized);
        Ok(data)
    }
}

/// Optimized bytes for one image, or the original bytes when re-encoding
/// does not help or the format is not handled
pub fn optimize(asset: &Asset, options: &ImageOptions) -> TransformResult<Vec<u8>> {
    let format = match image::guess_format(&asset.contents) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
        _ => {
            debug!("Passing {:?} through unchanged", asset.source);
            return Ok(asset.contents.clone());
        }
    };

    let encoded = reencode(&asset.contents, format, options.jpeg_quality)?;
    Ok(keep_smaller(asset, encoded))
}

fn reencode(bytes: &[u8], format: ImageFormat, jpeg_quality: u8) -> TransformResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, format)?;
    let mut out = Vec::new();

    match format {
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
            encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color())?;
        }
        _ => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
    }

    Ok(out)
}

fn keep_smaller(asset: &Asset, encoded: Vec<u8>) -> Vec<u8> {
    let original_size = asset.contents.len() as u64;
    let encoded_size = encoded.len() as u64;

    if encoded_size < original_size {
        let reduction = (original_size - encoded_size) as f64 / original_size as f64 * 100.0;
        info!(
            "Optimized {} ({} -> {}, {:.1}% smaller)",
            asset.relative.display(),
            format_bytes(original_size),
            format_bytes(encoded_size),
            reduction
        );
        encoded
    } else {
        debug!("Re-encoded {:?} is not smaller, using original", asset.source);
        asset.contents.clone()
    }
}

/// Format bytes into human readable format
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn options() -> ImageOptions {
        ImageOptions { jpeg_quality: 85 }
    }

    fn asset(name: &str, contents: Vec<u8>) -> Asset {
        Asset {
            source: name.into(),
            relative: name.into(),
            contents,
        }
    }

    /// A flat image stored without compression
    fn uncompressed_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 30, 30]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_png_is_recompressed_losslessly() {
        let original = uncompressed_png();
        let optimized = optimize(&asset("logo.png", original.clone()), &options()).unwrap();

        assert!(optimized.len() <= original.len());
        let before = image::load_from_memory(&original).unwrap().to_rgb8();
        let after = image::load_from_memory(&optimized).unwrap().to_rgb8();
        assert_eq!(before, after);
    }

    #[test]
    fn test_jpeg_is_never_larger() {
        let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
        let mut original = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut original, ImageFormat::Jpeg)
            .unwrap();
        let original = original.into_inner();

        let optimized = optimize(&asset("photo.jpg", original.clone()), &options()).unwrap();
        assert!(optimized.len() <= original.len());
        assert!(image::load_from_memory(&optimized).is_ok());
    }

    #[test]
    fn test_other_formats_pass_through() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec();
        assert_eq!(optimize(&asset("icon.svg", svg.clone()), &options()).unwrap(), svg);
    }

    #[test]
    fn test_corrupt_png_fails() {
        let mut bytes = uncompressed_png();
        bytes.truncate(40);
        assert!(matches!(
            optimize(&asset("broken.png", bytes), &options()),
            Err(TransformError::Image(_))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
