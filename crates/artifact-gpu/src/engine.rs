//! Engine Facade: the public API and its failure/recovery state machine.
//!
//! ```text
//! Uninitialized ──► Ready      (context obtained, grading program linked)
//!               └─► Degraded   (compile/link failed, pass-through active)
//! Ready | Degraded ──destroy()──► Destroyed   (terminal)
//! ```
//!
//! Per-frame failures (bad uploads, render validation errors) are logged and
//! absorbed so one bad frame never stops the host loop. Only construction
//! can fail fatally. After `destroy()` every call returns
//! [`EngineError::Destroyed`].

use artifact_core::looks::Look;
use artifact_core::params::{ParamPatch, ParameterVector, PatchReport};
use artifact_core::source::{FrameBuffer, PixelSource};

use crate::config::{EngineConfig, ShaderSources};
use crate::context::GpuContext;
use crate::error::{CompileError, EngineError};
use crate::program::{ProgramKind, ProgramManager, ShaderProgram};
use crate::readback;
use crate::render::{self, RenderTarget};
use crate::texture::TextureManager;

/// Lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Degraded,
    Destroyed,
}

/// Every GPU resource an engine owns. Fields drop in declaration order.
struct EngineResources {
    program: ShaderProgram,
    textures: TextureManager,
    target: RenderTarget,
    staging: Option<wgpu::Buffer>,
    programs: ProgramManager,
    context: GpuContext,
}

/// A GPU colour-grading engine bound to one device and one output surface.
pub struct Engine {
    state: EngineState,
    params: ParameterVector,
    compile_error: Option<CompileError>,
    resources: Option<EngineResources>,
}

impl Engine {
    /// Acquire a device and build the engine with the built-in shaders.
    pub fn create_blocking(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_shaders(config, ShaderSources::default())
    }

    /// Acquire a device and build the engine with custom shader sources.
    pub fn with_shaders(config: EngineConfig, sources: ShaderSources) -> Result<Self, EngineError> {
        let context = GpuContext::create_blocking(&config)?;
        Self::new(context, &config, &sources)
    }

    /// Build the engine on an existing context.
    ///
    /// A shader compile or link failure does not fail construction: the
    /// engine comes up `Degraded` with the pass-through program.
    pub fn new(
        context: GpuContext,
        config: &EngineConfig,
        sources: &ShaderSources,
    ) -> Result<Self, EngineError> {
        let max = context.max_texture_dimension();
        if config.width == 0 || config.height == 0 || config.width > max || config.height > max {
            return Err(EngineError::InvalidDimensions {
                width: config.width,
                height: config.height,
            });
        }

        let device = &context.device;
        let programs = ProgramManager::new(device);
        let (program, compile_error) = programs.compile_or_fallback(device, sources)?;
        let textures = TextureManager::new(device, &context.queue, max);
        let target = RenderTarget::new(device, config.width, config.height);

        let state = match program.kind() {
            ProgramKind::Grading => EngineState::Ready,
            ProgramKind::Passthrough => EngineState::Degraded,
        };
        tracing::info!(
            "engine {:?} at {}x{}",
            state,
            config.width,
            config.height
        );

        Ok(Self {
            state,
            params: ParameterVector::default(),
            compile_error,
            resources: Some(EngineResources {
                program,
                textures,
                target,
                staging: None,
                programs,
                context,
            }),
        })
    }

    fn live(&self) -> Result<&EngineResources, EngineError> {
        self.resources.as_ref().ok_or(EngineError::Destroyed)
    }

    fn live_mut(&mut self) -> Result<&mut EngineResources, EngineError> {
        self.resources.as_mut().ok_or(EngineError::Destroyed)
    }

    // ── Sources ─────────────────────────────────────────────────

    /// Upload a new source and render it once.
    ///
    /// A degenerate source is skipped with a warning and the previous texture
    /// stays bound.
    pub fn load_source<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<(), EngineError> {
        if self.upload_main(source)? {
            self.render()?;
        }
        Ok(())
    }

    /// Upload one video frame without rendering.
    ///
    /// Returns whether the frame was accepted. Frame pacing is the caller's
    /// concern: each call uploads exactly the frame it is given.
    pub fn upload_main<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<bool, EngineError> {
        let res = self.live_mut()?;
        let ctx = &res.context;
        match res.textures.upload_main(&ctx.device, &ctx.queue, source) {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!("skipping source upload: {}", e);
                Ok(false)
            }
        }
    }

    /// Upload a strip lookup table and render once.
    pub fn load_lookup_table<S: PixelSource + ?Sized>(&mut self, table: &S) -> Result<(), EngineError> {
        let res = self.live_mut()?;
        let ctx = &res.context;
        match res.textures.upload_lookup_table(&ctx.device, &ctx.queue, table) {
            Ok(()) => self.render(),
            Err(e) => {
                tracing::warn!("skipping lookup table upload: {}", e);
                Ok(())
            }
        }
    }

    // ── Parameters ──────────────────────────────────────────────

    /// Merge a partial update into the current parameters. Does not render.
    pub fn set_params(&mut self, patch: &ParamPatch) -> Result<PatchReport, EngineError> {
        self.live()?;
        let report = self.params.apply_patch(patch);
        for field in report.rejected.iter() {
            tracing::warn!("rejected non-finite value for '{}'", field);
        }
        Ok(report)
    }

    /// Merge host-side `name → value` pairs. Unknown names are ignored.
    pub fn set_params_named<'a, I>(&mut self, pairs: I) -> Result<PatchReport, EngineError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        self.set_params(&ParamPatch::from_named(pairs))
    }

    pub fn apply_look(&mut self, look: Look) -> Result<PatchReport, EngineError> {
        tracing::debug!("applying look '{}'", look);
        self.set_params(&look.patch())
    }

    /// Full copy of the current parameters.
    pub fn get_params(&self) -> Result<ParameterVector, EngineError> {
        self.live()?;
        Ok(self.params)
    }

    // ── Frames ──────────────────────────────────────────────────

    /// Draw the current state into the output surface.
    ///
    /// Submits without waiting for completion. Validation failures are
    /// logged, not returned.
    pub fn render(&mut self) -> Result<(), EngineError> {
        let params = self.params;
        let res = self.live_mut()?;
        let ctx = &res.context;
        if let Err(err) = render::render(
            &ctx.device,
            &ctx.queue,
            &mut res.program,
            res.programs.bind_group_layout(),
            &res.textures,
            &res.target,
            &params,
        ) {
            tracing::error!("render failed: {}", err);
        }
        Ok(())
    }

    /// Change the output size. The source does not need re-uploading.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let res = self.live_mut()?;
        let max = res.context.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            tracing::warn!("ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        if res.target.size() == (width, height) {
            return Ok(());
        }
        res.target = RenderTarget::new(&res.context.device, width, height);
        tracing::debug!("resized output to {}x{}", width, height);
        Ok(())
    }

    /// Read the last rendered frame back as RGBA8, top row first.
    pub fn read_pixels(&mut self) -> Result<FrameBuffer, EngineError> {
        let res = self.live_mut()?;
        let frame = readback::download_frame(
            &res.context.device,
            &res.context.queue,
            &res.target,
            &mut res.staging,
        )?;
        Ok(frame)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Release the program, both textures, and the output. Idempotent.
    pub fn destroy(&mut self) {
        let Some(mut res) = self.resources.take() else {
            return;
        };
        if let Some(staging) = res.staging.take() {
            staging.destroy();
        }
        drop(res);
        self.state = EngineState::Destroyed;
        tracing::info!("engine destroyed");
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.state == EngineState::Degraded
    }

    /// Why the engine is degraded, if it is.
    pub fn compile_error(&self) -> Option<&CompileError> {
        self.compile_error.as_ref()
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Upright dimensions of the bound main texture.
    pub fn source_size(&self) -> Result<(u32, u32), EngineError> {
        Ok(self.live()?.textures.main_size())
    }

    pub fn lut_size(&self) -> Result<(u32, u32), EngineError> {
        Ok(self.live()?.textures.lut_size())
    }

    pub fn output_size(&self) -> Result<(u32, u32), EngineError> {
        Ok(self.live()?.target.size())
    }

    /// View of the output surface, for hosts that composite it themselves.
    pub fn output_view(&self) -> Result<&wgpu::TextureView, EngineError> {
        Ok(self.live()?.target.view())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}
