//! Command-line configuration for the demo.

use std::path::PathBuf;

use anyhow::{Context, Result};
use artifact_core::looks::Look;
use artifact_core::params::{ParamPatch, ParameterVector};
use clap::Parser;

/// Default blend ratio between `--look` and `--blend-look`.
const DEFAULT_BLEND_RATIO: f32 = 0.5;

#[derive(Parser, Debug)]
#[command(
    name = "artifact-demo",
    version,
    about = "Grade a still image, or a simulated video loop, with the Artifact engine"
)]
pub struct Args {
    /// Input image (PNG or JPEG).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the graded PNG.
    #[arg(short, long, value_name = "PATH", default_value = "graded.png")]
    pub output: PathBuf,

    /// Parameter override, e.g. `--set exposure=0.5`. Repeatable.
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, f32)>,

    /// Parameters as a flat JSON object, e.g. `{"warmth": 0.3}`.
    #[arg(long, value_name = "JSON")]
    pub params_json: Option<String>,

    /// Named look: bright, soft, vivid, muted, warm, cool, crisp, hazy.
    #[arg(long, value_name = "LOOK")]
    pub look: Option<Look>,

    /// Second look to blend toward.
    #[arg(long, value_name = "LOOK", requires = "look")]
    pub blend_look: Option<Look>,

    /// Blend ratio toward `--blend-look` (0..1).
    #[arg(long, value_name = "RATIO", default_value_t = DEFAULT_BLEND_RATIO)]
    pub blend_ratio: f32,

    /// Strip lookup table image (N² × N).
    #[arg(long, value_name = "PATH")]
    pub lut: Option<PathBuf>,

    /// EXIF orientation tag (1-8) of the input.
    #[arg(long, value_name = "TAG")]
    pub orientation: Option<u16>,

    /// Simulate a video host: upload and render this many moving frames.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub frames: u32,

    /// Grade with the CPU reference instead of the GPU.
    #[arg(long)]
    pub cpu: bool,

    /// Output width (defaults to the upright input width).
    #[arg(long, env = "ARTIFACT_OUTPUT_WIDTH")]
    pub width: Option<u32>,

    /// Output height (defaults to the upright input height).
    #[arg(long, env = "ARTIFACT_OUTPUT_HEIGHT")]
    pub height: Option<u32>,
}

impl Args {
    /// Resolve looks, blending, JSON, and `--set` overrides, in that order.
    pub fn resolve_params(&self) -> Result<ParameterVector> {
        let mut params = ParameterVector::default();
        if let Some(look) = self.look {
            params.apply_patch(&look.patch());
        }
        if let Some(other) = self.blend_look {
            let target = ParameterVector::default().patched(&other.patch());
            params = ParameterVector::blend(&params, &target, self.blend_ratio);
        }
        if let Some(json) = &self.params_json {
            let patch = ParamPatch::from_json(json).context("invalid --params-json")?;
            params.apply_patch(&patch);
        }

        let overrides = ParamPatch::from_named(self.set.iter().map(|(name, v)| (name.as_str(), *v)));
        let report = params.apply_patch(&overrides);
        for field in report.clamped.iter() {
            tracing::warn!("--set {} clamped to {}", field, params.get(field));
        }
        for field in report.rejected.iter() {
            tracing::warn!("--set {} ignored: value is not finite", field);
        }
        Ok(params)
    }
}

fn parse_assignment(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.trim().to_string(), value))
}
