//! GPU-to-CPU readback of the output surface.

use artifact_core::source::{BYTES_PER_PIXEL, FrameBuffer};

use crate::error::ReadbackError;
use crate::render::RenderTarget;

/// Row pitch of a texture-to-buffer copy, padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL as u32;
    unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Staging buffer size for a `width × height` readback, checked against the
/// device's `max_buffer_size`.
pub fn staging_size(width: u32, height: u32, max_buffer_size: u64) -> Result<u64, ReadbackError> {
    let size = padded_bytes_per_row(width) as u64 * height as u64;
    if size > max_buffer_size {
        return Err(ReadbackError::TooLarge {
            width,
            height,
            size,
            max: max_buffer_size,
        });
    }
    Ok(size)
}

fn create_staging(device: &wgpu::Device, size: u64) -> Result<wgpu::Buffer, ReadbackError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("artifact_readback_staging"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());
    match out_of_memory.or(validation) {
        Some(error) => {
            buffer.destroy();
            Err(ReadbackError::Staging(error))
        }
        None => Ok(buffer),
    }
}

/// Download `target` into a [`FrameBuffer`], top row first. Blocks until
/// every previously submitted frame has finished.
///
/// `staging_cache` is reused between calls and only reallocated when the
/// output grows.
pub fn download_frame(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
    staging_cache: &mut Option<wgpu::Buffer>,
) -> Result<FrameBuffer, ReadbackError> {
    let (width, height) = target.size();
    let padded_row = padded_bytes_per_row(width);
    let size = staging_size(width, height, device.limits().max_buffer_size)?;

    let staging = match staging_cache.take() {
        Some(buf) if buf.size() >= size => buf,
        old => {
            if let Some(old) = old {
                old.destroy();
            }
            create_staging(device, size)?
        }
    };
    *staging_cache = Some(staging.clone());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("artifact_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..size);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv()??;

    let row = width as usize * BYTES_PER_PIXEL;
    let mut pixels = Vec::with_capacity(row * height as usize);
    {
        let data = slice.get_mapped_range();
        for line in data.chunks_exact(padded_row as usize) {
            pixels.extend_from_slice(&line[..row]);
        }
    }
    staging.unmap();

    Ok(FrameBuffer::new(width, height, pixels)?)
}
