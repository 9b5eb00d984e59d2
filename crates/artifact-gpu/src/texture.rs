//! Texture Manager: main source and lookup-table textures.
//!
//! Both textures start as 1×1 placeholders (black main, white lookup table)
//! so a program can always be bound. Uploads validate first; a rejected
//! upload leaves the bound texture untouched.
//!
//! Rows are flipped on upload so texture row 0 is the bottom of the image,
//! matching the quad's UV origin at the bottom-left.

use artifact_core::grade::strip_lut_size;
use artifact_core::source::{self, BYTES_PER_PIXEL, PixelSource};

use crate::error::UploadError;

/// Format of every sampled texture.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const MAIN_PLACEHOLDER: [u8; 4] = [0, 0, 0, 255];
const LUT_PLACEHOLDER: [u8; 4] = [255, 255, 255, 255];

/// A 2D RGBA8 texture and its default view. Destroyed on drop.
pub struct GpuTexture {
    label: &'static str,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl GpuTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            label,
            texture,
            view,
            width,
            height,
        }
    }

    fn sampled(device: &wgpu::Device, label: &'static str, width: u32, height: u32) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Copy tightly packed RGBA8 rows into the whole texture.
    fn write(&self, queue: &wgpu::Queue, data: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * BYTES_PER_PIXEL as u32),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.texture.destroy();
        tracing::debug!("released texture '{}' {}x{}", self.label, self.width, self.height);
    }
}

/// Which of the two texture units an upload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Main,
    LookupTable,
}

/// Owns the main and lookup-table textures and their shared sampler.
pub struct TextureManager {
    main: GpuTexture,
    lut: GpuTexture,
    sampler: wgpu::Sampler,
    max_dimension: u32,
    /// Row-flipped copy of the last upload, reused between calls.
    scratch: Vec<u8>,
}

impl TextureManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, max_dimension: u32) -> Self {
        let main = GpuTexture::sampled(device, "artifact_main", 1, 1);
        main.write(queue, &MAIN_PLACEHOLDER);
        let lut = GpuTexture::sampled(device, "artifact_lut", 1, 1);
        lut.write(queue, &LUT_PLACEHOLDER);

        // No mipmaps: sources are usually not power-of-two.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("artifact_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            main,
            lut,
            sampler,
            max_dimension,
            scratch: Vec::new(),
        }
    }

    /// Upload a still image or a video frame as the main texture.
    ///
    /// Orientation metadata is applied before upload. The texture is
    /// recreated only when the upright dimensions change.
    pub fn upload_main<S: PixelSource + ?Sized>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &S,
    ) -> Result<(), UploadError> {
        self.upload(device, queue, source, Unit::Main)
    }

    /// Upload a strip lookup table (`N² × N`).
    pub fn upload_lookup_table<S: PixelSource + ?Sized>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        table: &S,
    ) -> Result<(), UploadError> {
        self.upload(device, queue, table, Unit::LookupTable)
    }

    fn upload<S: PixelSource + ?Sized>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &S,
        unit: Unit,
    ) -> Result<(), UploadError> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(UploadError::InvalidDimensions { width, height });
        }
        let expected = source::expected_len(width, height);
        if source.data().len() != expected {
            return Err(UploadError::DataLength {
                expected,
                actual: source.data().len(),
            });
        }

        let corrected = source::upright(source);
        let ((width, height), data) = match &corrected {
            Some(image) => (image.dimensions(), image.as_raw().as_slice()),
            None => ((width, height), source.data()),
        };

        if width > self.max_dimension || height > self.max_dimension {
            return Err(UploadError::TooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }
        if unit == Unit::LookupTable && strip_lut_size(width, height).is_none() {
            return Err(UploadError::LookupTableShape { width, height });
        }

        flip_rows_into(&mut self.scratch, data, width);

        let slot = match unit {
            Unit::Main => &mut self.main,
            Unit::LookupTable => &mut self.lut,
        };
        if slot.size() != (width, height) {
            let label = slot.label;
            *slot = GpuTexture::sampled(device, label, width, height);
        }
        slot.write(queue, &self.scratch);

        tracing::debug!("uploaded {:?} texture {}x{}", unit, width, height);
        Ok(())
    }

    pub fn main_size(&self) -> (u32, u32) {
        self.main.size()
    }

    pub fn lut_size(&self) -> (u32, u32) {
        self.lut.size()
    }

    pub fn main_view(&self) -> &wgpu::TextureView {
        self.main.view()
    }

    pub fn lut_view(&self) -> &wgpu::TextureView {
        self.lut.view()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// UV size of one main-texture texel.
    pub fn texel_size(&self) -> [f32; 2] {
        let (w, h) = self.main.size();
        [1.0 / w as f32, 1.0 / h as f32]
    }
}

/// Copy `data` into `out` with row order reversed.
fn flip_rows_into(out: &mut Vec<u8>, data: &[u8], width: u32) {
    let row = width as usize * BYTES_PER_PIXEL;
    out.clear();
    out.reserve(data.len());
    for line in data.chunks_exact(row).rev() {
        out.extend_from_slice(line);
    }
}
