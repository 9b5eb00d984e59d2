//! Artifact Core — domain layer for the grading engine.
//!
//! This crate holds the parameter model, pixel-source abstraction,
//! orientation handling, named looks, and the CPU reference of the grading
//! math. No GPU dependencies.

pub mod grade;
pub mod looks;
pub mod params;
pub mod source;

// Re-exports for convenience.
pub use grade::{LookupTable, NeutralLut, StripLut, grade_frame};
pub use looks::Look;
pub use params::{FieldSet, ParamField, ParamGroup, ParamPatch, ParamRange, ParameterVector, PatchReport};
pub use source::{FrameBuffer, FrameRef, Orientation, PixelSource, SourceError, SourceKind};
