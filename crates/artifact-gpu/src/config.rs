//! Engine configuration.

/// Default output width.
const DEFAULT_WIDTH: u32 = 800;
/// Default output height.
const DEFAULT_HEIGHT: u32 = 600;

/// Built-in vertex stage: full-surface quad.
pub const QUAD_VERTEX_WGSL: &str = include_str!("../shaders/quad.wgsl");
/// Built-in fragment stage: the grading pipeline.
pub const GRADE_FRAGMENT_WGSL: &str = include_str!("../shaders/grade.wgsl");
/// Fragment stage of the pass-through fallback.
pub const PASSTHROUGH_FRAGMENT_WGSL: &str = include_str!("../shaders/passthrough.wgsl");

/// Construction-time settings for an [`crate::Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Output surface width in pixels.
    pub width: u32,
    /// Output surface height in pixels.
    pub height: u32,
    pub power_preference: wgpu::PowerPreference,
    pub backends: wgpu::Backends,
    /// Request a software adapter (useful on CI without a GPU).
    pub force_fallback_adapter: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            power_preference: wgpu::PowerPreference::from_env()
                .unwrap_or(wgpu::PowerPreference::HighPerformance),
            backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::all()),
            force_fallback_adapter: std::env::var("ARTIFACT_FORCE_FALLBACK_ADAPTER")
                .is_ok_and(|v| v != "0" && !v.eq_ignore_ascii_case("false")),
        }
    }
}

impl EngineConfig {
    /// Default configuration at the given output size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

/// WGSL sources for the grading program.
///
/// Each stage is compiled on its own, then linked into one pipeline. The
/// vertex stage must export `vs_main`, the fragment stage `fs_main`.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            vertex: QUAD_VERTEX_WGSL.to_string(),
            fragment: GRADE_FRAGMENT_WGSL.to_string(),
        }
    }
}

impl ShaderSources {
    /// Built-in vertex stage with a custom fragment stage.
    pub fn with_fragment(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            ..Self::default()
        }
    }

    pub(crate) fn passthrough() -> Self {
        Self {
            vertex: QUAD_VERTEX_WGSL.to_string(),
            fragment: PASSTHROUGH_FRAGMENT_WGSL.to_string(),
        }
    }
}
