//! Shader Program Manager.
//!
//! Programs are built in two stages. Each WGSL stage is parsed and validated
//! on its own with naga (device-free, so diagnostics carry source spans),
//! then the stages are linked into a `wgpu` render pipeline inside a
//! validation error scope.
//!
//! Uniform locations are resolved once per program into a fixed
//! [`UniformTable`] by reflecting the fragment stage's uniform block. A slot
//! the program does not declare stays absent, and writes to it are no-ops.
//! This lets the render core push the full parameter vector to any program,
//! including the uniform-less pass-through fallback.

use artifact_core::params::{ParamField, ParameterVector};

use crate::config::ShaderSources;
use crate::error::{CompileError, EngineError, ProgramStage};
use crate::render::OUTPUT_FORMAT;

/// Number of uniform slots: one per parameter plus texel and output size.
pub const UNIFORM_SLOT_COUNT: usize = ParamField::COUNT + 2;

/// Minimum size of a uniform buffer binding.
const MIN_UNIFORM_BLOCK: u64 = 16;

// ── Uniform slots ───────────────────────────────────────────────

/// A named member of the grading uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    Param(ParamField),
    /// `vec2<f32>`: `1 / source size`.
    TexelSize,
    /// `vec2<f32>`: output size in pixels.
    OutputSize,
}

impl UniformSlot {
    /// Every slot, in table order.
    pub fn all() -> impl Iterator<Item = UniformSlot> {
        ParamField::ALL
            .into_iter()
            .map(UniformSlot::Param)
            .chain([UniformSlot::TexelSize, UniformSlot::OutputSize])
    }

    pub fn index(self) -> usize {
        match self {
            Self::Param(field) => field.index(),
            Self::TexelSize => ParamField::COUNT,
            Self::OutputSize => ParamField::COUNT + 1,
        }
    }

    /// Struct member name in WGSL.
    pub fn member_name(self) -> &'static str {
        match self {
            Self::Param(field) => field.snake_name(),
            Self::TexelSize => "texel_size",
            Self::OutputSize => "output_size",
        }
    }

    fn is_vec2(self) -> bool {
        matches!(self, Self::TexelSize | Self::OutputSize)
    }
}

/// Byte offsets of each slot inside the uniform block, resolved at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformTable {
    offsets: [Option<u32>; UNIFORM_SLOT_COUNT],
    block_size: u64,
}

impl UniformTable {
    /// A table with no resolved slots.
    pub fn empty() -> Self {
        Self {
            offsets: [None; UNIFORM_SLOT_COUNT],
            block_size: MIN_UNIFORM_BLOCK,
        }
    }

    /// Resolve slots from the uniform block at `@group(0) @binding(0)`.
    ///
    /// Members are matched by name and must be `f32` (parameters) or
    /// `vec2<f32>` (sizes); anything else leaves the slot absent.
    pub fn reflect(module: &naga::Module) -> Self {
        let block_binding = naga::ResourceBinding {
            group: 0,
            binding: 0,
        };
        let Some(block) = module
            .global_variables
            .iter()
            .map(|(_, var)| var)
            .find(|var| {
                var.space == naga::AddressSpace::Uniform && var.binding == Some(block_binding)
            })
        else {
            return Self::empty();
        };
        let naga::TypeInner::Struct { members, span } = &module.types[block.ty].inner else {
            return Self::empty();
        };

        let mut table = Self {
            offsets: [None; UNIFORM_SLOT_COUNT],
            block_size: (*span as u64).next_multiple_of(16).max(MIN_UNIFORM_BLOCK),
        };
        for slot in UniformSlot::all() {
            let Some(member) = members
                .iter()
                .find(|m| m.name.as_deref() == Some(slot.member_name()))
            else {
                continue;
            };
            if member_type_matches(module, member.ty, slot) {
                table.offsets[slot.index()] = Some(member.offset);
            } else {
                tracing::debug!("uniform '{}' has an unexpected type, ignoring", slot.member_name());
            }
        }
        table
    }

    pub fn offset(&self, slot: UniformSlot) -> Option<u32> {
        self.offsets[slot.index()]
    }

    pub fn is_resolved(&self, slot: UniformSlot) -> bool {
        self.offset(slot).is_some()
    }

    pub fn resolved_count(&self) -> usize {
        self.offsets.iter().filter(|o| o.is_some()).count()
    }

    /// Size in bytes of the uniform buffer backing this table.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

fn member_type_matches(module: &naga::Module, ty: naga::Handle<naga::Type>, slot: UniformSlot) -> bool {
    match &module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) => !slot.is_vec2() && *scalar == naga::Scalar::F32,
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar,
        } => slot.is_vec2() && *scalar == naga::Scalar::F32,
        _ => false,
    }
}

/// CPU-side copy of a uniform block. Writes to absent slots are no-ops.
#[derive(Debug, Clone)]
pub struct UniformStaging {
    bytes: Vec<u8>,
    table: UniformTable,
}

impl UniformStaging {
    pub fn new(table: UniformTable) -> Self {
        Self {
            bytes: vec![0; table.block_size() as usize],
            table,
        }
    }

    pub fn set_f32(&mut self, slot: UniformSlot, value: f32) {
        self.write(slot, bytemuck::bytes_of(&value));
    }

    pub fn set_vec2(&mut self, slot: UniformSlot, value: [f32; 2]) {
        self.write(slot, bytemuck::cast_slice(&value));
    }

    /// Write every parameter of `params`.
    pub fn set_params(&mut self, params: &ParameterVector) {
        for (field, value) in params.iter() {
            self.set_f32(UniformSlot::Param(field), value);
        }
    }

    fn write(&mut self, slot: UniformSlot, data: &[u8]) {
        let Some(offset) = self.table.offset(slot) else {
            return;
        };
        let start = offset as usize;
        if let Some(dst) = self.bytes.get_mut(start..start + data.len()) {
            dst.copy_from_slice(data);
        }
    }

    pub fn table(&self) -> &UniformTable {
        &self.table
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ── Programs ────────────────────────────────────────────────────

/// Which program is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    Grading,
    Passthrough,
}

/// A linked program and its uniform buffer. Releases the buffer on drop.
pub struct ShaderProgram {
    label: String,
    kind: ProgramKind,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniforms: UniformStaging,
}

impl ShaderProgram {
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform_buffer
    }

    pub fn uniforms(&self) -> &UniformStaging {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformStaging {
        &mut self.uniforms
    }

    /// Upload the staged uniform values.
    pub fn flush_uniforms(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.as_bytes());
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.uniform_buffer.destroy();
        tracing::debug!("released program '{}'", self.label);
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("resolved_uniforms", &self.uniforms.table().resolved_count())
            .finish()
    }
}

/// Parse and validate one WGSL stage and check its entry point.
pub fn compile_stage(stage: ProgramStage, source: &str) -> Result<naga::Module, CompileError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| CompileError::Stage {
        stage,
        diagnostic: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|e| CompileError::Stage {
            stage,
            diagnostic: e.to_string(),
        })?;

    let naga_stage = match stage {
        ProgramStage::Vertex => naga::ShaderStage::Vertex,
        ProgramStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry_point = stage.entry_point();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.stage == naga_stage && ep.name == entry_point)
    {
        return Err(CompileError::MissingEntryPoint { stage, entry_point });
    }

    Ok(module)
}

/// Owns the bind group and pipeline layouts every program shares:
///
/// | binding | resource |
/// |---|---|
/// | 0 | uniform block |
/// | 1 / 2 | main texture / sampler |
/// | 3 / 4 | lookup-table texture / sampler |
pub struct ProgramManager {
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl ProgramManager {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("artifact_program_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                sampler_entry(2),
                texture_entry(3),
                sampler_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("artifact_program_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            bind_group_layout,
            pipeline_layout,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Compile both stages, resolve uniforms, and link.
    pub fn compile(
        &self,
        device: &wgpu::Device,
        sources: &ShaderSources,
    ) -> Result<ShaderProgram, CompileError> {
        self.build(device, "artifact_grade", ProgramKind::Grading, sources)
    }

    /// The pass-through program shown in Degraded mode.
    pub fn fallback(&self, device: &wgpu::Device) -> Result<ShaderProgram, CompileError> {
        self.build(
            device,
            "artifact_passthrough",
            ProgramKind::Passthrough,
            &ShaderSources::passthrough(),
        )
    }

    /// Compile `sources`, falling back to pass-through on failure.
    ///
    /// Returns the program and, when the fallback was used, the original
    /// compile error. Only a failing fallback is fatal.
    pub fn compile_or_fallback(
        &self,
        device: &wgpu::Device,
        sources: &ShaderSources,
    ) -> Result<(ShaderProgram, Option<CompileError>), EngineError> {
        match self.compile(device, sources) {
            Ok(program) => Ok((program, None)),
            Err(original) => {
                tracing::error!("grading program unavailable: {}", original);
                match self.fallback(device) {
                    Ok(program) => {
                        tracing::warn!("using pass-through fallback program");
                        Ok((program, Some(original)))
                    }
                    Err(fallback) => Err(EngineError::FallbackUnavailable { original, fallback }),
                }
            }
        }
    }

    fn build(
        &self,
        device: &wgpu::Device,
        label: &str,
        kind: ProgramKind,
        sources: &ShaderSources,
    ) -> Result<ShaderProgram, CompileError> {
        // Stage 1: per-stage compile
        compile_stage(ProgramStage::Vertex, &sources.vertex)?;
        let fragment = compile_stage(ProgramStage::Fragment, &sources.fragment)?;
        let table = UniformTable::reflect(&fragment);

        // Stage 2: link
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label}_vs")),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label}_fs")),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(ProgramStage::Vertex.entry_point()),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(ProgramStage::Fragment.entry_point()),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OUTPUT_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(CompileError::Link(error));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_uniforms")),
            size: table.block_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::info!(
            "linked program '{}' ({} of {} uniform slots resolved)",
            label,
            table.resolved_count(),
            UNIFORM_SLOT_COUNT
        );

        Ok(ShaderProgram {
            label: label.to_string(),
            kind,
            pipeline,
            uniform_buffer,
            uniforms: UniformStaging::new(table),
        })
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
