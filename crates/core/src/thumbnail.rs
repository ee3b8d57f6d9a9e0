//! Prepares images for upload. With the `thumbnail` feature the image is
//! shrunk so its longest edge is at most [`MAX_EDGE_PX`]; without it the file
//! is sent as-is.

use anyhow::Context;
use providers::ImageUpload;
use std::path::Path;

pub const MAX_EDGE_PX: u32 = 512;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(feature = "thumbnail")]
pub fn prepare_upload(path: &Path) -> anyhow::Result<ImageUpload> {
    use image::{DynamicImage, ImageOutputFormat};
    use std::io::Cursor;

    let decoded =
        image::open(path).with_context(|| format!("could not decode {}", path.display()))?;
    let rgb = DynamicImage::ImageRgb8(fit_within(decoded, MAX_EDGE_PX).to_rgb8());

    let (format, ext) = match extension(path).as_str() {
        "jpg" | "jpeg" => (ImageOutputFormat::Jpeg(90), "jpg"),
        _ => (ImageOutputFormat::Png, "png"),
    };
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, format)
        .with_context(|| format!("could not encode thumbnail of {}", path.display()))?;
    Ok(ImageUpload {
        file_name: format!("image.{}", ext),
        bytes: buf.into_inner(),
    })
}

#[cfg(not(feature = "thumbnail"))]
pub fn prepare_upload(path: &Path) -> anyhow::Result<ImageUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
    Ok(ImageUpload {
        file_name: format!("image.{}", extension(path)),
        bytes,
    })
}

/// Scales down (never up) so both edges fit in `max_edge`, keeping the aspect ratio.
#[cfg(feature = "thumbnail")]
pub fn fit_within(img: image::DynamicImage, max_edge: u32) -> image::DynamicImage {
    use image::GenericImageView;
    let (w, h) = img.dimensions();
    if w.max(h) <= max_edge {
        img
    } else {
        img.resize(max_edge, max_edge, image::imageops::FilterType::Triangle)
    }
}
