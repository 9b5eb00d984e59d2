//! Artifact GPU — wgpu render engine for parameter-driven colour grading.
//!
//! This crate owns all GPU resources: the device, the grading program and
//! its pass-through fallback, the main and lookup-table textures, and the
//! output surface. Hosts drive it through [`Engine`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod program;
pub mod readback;
pub mod render;
pub mod texture;

pub use config::{EngineConfig, ShaderSources};
pub use context::GpuContext;
pub use engine::{Engine, EngineState};
pub use error::{
    CompileError, ContextError, EngineError, ProgramStage, ReadbackError, UploadError,
};
