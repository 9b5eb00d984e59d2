//! Render Core: one full-surface draw of the active program.
//!
//! Rendering is a pure function of the bound program, both textures, and the
//! parameter vector. Nothing here reads a clock or a frame counter, so
//! repeated renders of unchanged state produce identical pixels.

use artifact_core::params::ParameterVector;

use crate::error::EngineError;
use crate::program::{ShaderProgram, UniformSlot};
use crate::texture::{GpuTexture, TextureManager};

/// Format of the output surface.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Background outside the drawn quad.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.2,
    b: 0.2,
    a: 1.0,
};

/// Vertices in the two-triangle quad.
const QUAD_VERTICES: u32 = 6;

/// Off-screen output surface.
pub struct RenderTarget {
    texture: GpuTexture,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            texture: GpuTexture::new(
                device,
                "artifact_output",
                width,
                height,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.texture.size()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        self.texture.texture()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}

/// Record and submit one draw of `program` into `target`.
///
/// GPU validation errors are captured in an error scope and returned so the
/// caller can log them without interrupting its frame loop.
pub fn render(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    program: &mut ShaderProgram,
    layout: &wgpu::BindGroupLayout,
    textures: &TextureManager,
    target: &RenderTarget,
    params: &ParameterVector,
) -> Result<(), EngineError> {
    let (width, height) = target.size();
    let uniforms = program.uniforms_mut();
    uniforms.set_params(params);
    uniforms.set_vec2(UniformSlot::TexelSize, textures.texel_size());
    uniforms.set_vec2(UniformSlot::OutputSize, [width as f32, height as f32]);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    program.flush_uniforms(queue);

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("artifact_render_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: program.uniform_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(textures.main_view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(textures.sampler()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(textures.lut_view()),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(textures.sampler()),
            },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("artifact_render_encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("artifact_grade_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(program.pipeline());
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..QUAD_VERTICES, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(EngineError::Render(error)),
        None => Ok(()),
    }
}
