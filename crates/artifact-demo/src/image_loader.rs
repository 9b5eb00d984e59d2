//! Image decoding and encoding for the demo host.

use std::path::Path;

use artifact_core::source::FrameBuffer;

/// Load an image from disk as tightly packed RGBA8, top row first.
///
/// Supports the formats enabled on the `image` crate (PNG, JPEG).
pub fn load_image(path: &Path) -> Result<FrameBuffer, ImageLoadError> {
    let img = image::open(path).map_err(ImageLoadError::Decode)?;
    Ok(FrameBuffer::from(img.to_rgba8()))
}

/// Write a graded frame as PNG.
pub fn save_png(frame: FrameBuffer, path: &Path) -> Result<(), ImageLoadError> {
    let (width, height) = (frame.width, frame.height);
    let image = frame
        .into_image()
        .ok_or(ImageLoadError::Malformed { width, height })?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(ImageLoadError::Encode)
}

/// Errors that can occur during image loading and saving.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
    #[error("frame data does not match {width}x{height}")]
    Malformed { width: u32, height: u32 },
}
