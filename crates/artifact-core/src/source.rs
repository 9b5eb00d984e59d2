//! Pixel sources: still images and video frames.
//!
//! Everything the engine can upload is a [`PixelSource`]: tightly packed
//! RGBA8, top row first. Stills may carry an EXIF orientation that has to be
//! normalized before upload; video frames never do.

use image::{RgbaImage, imageops};
use thiserror::Error;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors from constructing a [`FrameBuffer`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("pixel data is {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    DataLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Whether a source is a one-shot still or one frame of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Still,
    VideoFrame,
}

/// EXIF orientation tag values 1–8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// 1: upright.
    #[default]
    Normal,
    /// 2: mirrored left-right.
    FlipHorizontal,
    /// 3: upside down.
    Rotate180,
    /// 4: mirrored top-bottom.
    FlipVertical,
    /// 5: mirrored across the main diagonal.
    Transpose,
    /// 6: needs a 90° clockwise turn to display upright.
    Rotate90,
    /// 7: mirrored across the anti-diagonal.
    Transverse,
    /// 8: needs a 270° clockwise turn to display upright.
    Rotate270,
}

impl Orientation {
    /// Map an EXIF tag value. Unknown values yield `None` (treat as upright).
    pub fn from_exif(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => return None,
        })
    }

    pub fn to_exif(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// True for the four orientations that swap width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Upright dimensions of a `width × height` buffer stored in this orientation.
    pub fn upright_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Apply the correction to a stored image, producing the upright image.
    pub fn apply(self, mut image: RgbaImage) -> RgbaImage {
        match self {
            Self::Normal => image,
            Self::FlipHorizontal => {
                imageops::flip_horizontal_in_place(&mut image);
                image
            }
            Self::Rotate180 => {
                imageops::rotate180_in_place(&mut image);
                image
            }
            Self::FlipVertical => {
                imageops::flip_vertical_in_place(&mut image);
                image
            }
            Self::Transpose => {
                let mut out = imageops::rotate90(&image);
                imageops::flip_horizontal_in_place(&mut out);
                out
            }
            Self::Rotate90 => imageops::rotate90(&image),
            Self::Transverse => {
                let mut out = imageops::rotate270(&image);
                imageops::flip_horizontal_in_place(&mut out);
                out
            }
            Self::Rotate270 => imageops::rotate270(&image),
        }
    }
}

/// Anything the engine can upload as its main texture.
pub trait PixelSource {
    /// `(width, height)` of the stored pixel data.
    fn dimensions(&self) -> (u32, u32);

    /// RGBA8, tightly packed, top row first.
    fn data(&self) -> &[u8];

    /// Stored orientation, if the source carries one.
    fn orientation(&self) -> Option<Orientation> {
        None
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Still
    }
}

/// Owned RGBA8 pixel buffer.
///
/// Also the output type of readback and of the CPU reference grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA8, top row first.
    pub pixels: Vec<u8>,
    pub orientation: Option<Orientation>,
}

impl FrameBuffer {
    /// Wrap `pixels`, checking that the length matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SourceError> {
        let expected = expected_len(width, height);
        if pixels.len() != expected {
            return Err(SourceError::DataLength {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            orientation: None,
        })
    }

    /// A buffer filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(count),
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// RGBA of the pixel at `(x, y)`, `y = 0` being the top row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Convert into an `image` buffer, e.g. for encoding.
    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }
}

impl From<RgbaImage> for FrameBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
            orientation: None,
        }
    }
}

impl PixelSource for FrameBuffer {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn data(&self) -> &[u8] {
        &self.pixels
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }
}

/// Borrowed frame of a video stream. Never carries an orientation.
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

impl<'a> FrameRef<'a> {
    pub fn new(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

impl PixelSource for FrameRef<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn data(&self) -> &[u8] {
        self.pixels
    }

    fn kind(&self) -> SourceKind {
        SourceKind::VideoFrame
    }
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        image::ImageBuffer::dimensions(self)
    }

    fn data(&self) -> &[u8] {
        self.as_raw()
    }
}

/// Expected byte length of a tightly packed RGBA8 buffer.
pub fn expected_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Produce the upright version of `source`.
///
/// Returns `None` when the stored pixels are already upright (no orientation,
/// orientation 1, or a video frame) or when the data length does not match
/// the dimensions; callers then use `source.data()` as-is.
pub fn upright<S: PixelSource + ?Sized>(source: &S) -> Option<RgbaImage> {
    if source.kind() == SourceKind::VideoFrame {
        return None;
    }
    let orientation = source.orientation()?;
    if orientation == Orientation::Normal {
        return None;
    }
    let (width, height) = source.dimensions();
    let stored = RgbaImage::from_raw(width, height, source.data().to_vec())?;
    tracing::debug!(
        "normalizing orientation {} for {}x{} source",
        orientation.to_exif(),
        width,
        height
    );
    Some(orientation.apply(stored))
}
