//! Error taxonomy for the engine.

use std::fmt;

use artifact_core::source::SourceError;
use thiserror::Error;

/// Shader stage a compile diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStage {
    Vertex,
    Fragment,
}

impl ProgramStage {
    /// Entry point every program must export for this stage.
    pub const fn entry_point(self) -> &'static str {
        match self {
            Self::Vertex => "vs_main",
            Self::Fragment => "fs_main",
        }
    }
}

impl fmt::Display for ProgramStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

/// Shader compile or link failure. Recoverable: the engine falls back to
/// the pass-through program.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{stage} stage failed to compile:\n{diagnostic}")]
    Stage {
        stage: ProgramStage,
        diagnostic: String,
    },

    #[error("{stage} stage has no `{entry_point}` entry point")]
    MissingEntryPoint {
        stage: ProgramStage,
        entry_point: &'static str,
    },

    #[error("program failed to link: {0}")]
    Link(#[source] wgpu::Error),
}

/// Rejected texture upload. The previously bound texture is kept.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("degenerate source dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("source data is {actual} bytes, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("source {width}x{height} exceeds the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("lookup table {width}x{height} is not an N²×N strip")]
    LookupTableShape { width: u32, height: u32 },
}

/// Adapter or device acquisition failure.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no compatible adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Failure while copying the output surface back to the CPU.
#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("{width}x{height} readback needs {size} bytes, device buffers are limited to {max}")]
    TooLarge {
        width: u32,
        height: u32,
        size: u64,
        max: u64,
    },

    #[error("staging buffer allocation failed: {0}")]
    Staging(#[source] wgpu::Error),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("map callback dropped before completing")]
    Disconnected(#[from] std::sync::mpsc::RecvError),

    #[error(transparent)]
    Frame(#[from] SourceError),
}

/// Errors surfaced by [`crate::Engine`] to its host.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no usable GPU context: {0}")]
    ContextUnavailable(#[from] ContextError),

    #[error("invalid output dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pass-through fallback failed to build after {original}: {fallback}")]
    FallbackUnavailable {
        original: CompileError,
        fallback: CompileError,
    },

    #[error("engine destroyed")]
    Destroyed,

    #[error("render submission failed: {0}")]
    Render(#[source] wgpu::Error),

    #[error("frame readback failed: {0}")]
    Readback(#[from] ReadbackError),
}
