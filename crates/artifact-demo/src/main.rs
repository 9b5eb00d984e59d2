//! Artifact Demo — headless host for the grading engine.
//!
//! Decodes a still image, grades it on the GPU (or the CPU reference), and
//! writes a PNG. With `--frames N` it behaves like a video host instead:
//! every frame is uploaded and rendered, and the last one is written.

mod config;
mod image_loader;

use anyhow::{Context, Result};
use artifact_core::grade::{LookupTable, NeutralLut, StripLut, grade_frame};
use artifact_core::params::{ParamPatch, ParameterVector};
use artifact_core::source::{self, BYTES_PER_PIXEL, FrameBuffer, FrameRef, Orientation};
use artifact_gpu::{Engine, EngineConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Args;

fn main() -> Result<()> {
    initialise_tracing();
    let args = Args::parse();

    let mut source = image_loader::load_image(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    if let Some(tag) = args.orientation {
        match Orientation::from_exif(tag) {
            Some(orientation) => source = source.with_orientation(orientation),
            None => tracing::warn!("unknown orientation tag {}, treating as upright", tag),
        }
    }
    let params = args.resolve_params()?;
    tracing::info!(
        "grading {} ({}x{}), neutral: {}",
        args.input.display(),
        source.width,
        source.height,
        params.is_neutral()
    );

    let frame = if args.cpu {
        grade_on_cpu(&args, &source, &params)?
    } else {
        grade_on_gpu(&args, &source, &params)?
    };

    image_loader::save_png(frame, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!("wrote {}", args.output.display());
    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn grade_on_gpu(args: &Args, source: &FrameBuffer, params: &ParameterVector) -> Result<FrameBuffer> {
    let (src_w, src_h) = source
        .orientation
        .map_or((source.width, source.height), |o| {
            o.upright_dimensions(source.width, source.height)
        });
    let config = EngineConfig::new(args.width.unwrap_or(src_w), args.height.unwrap_or(src_h));
    let mut engine = Engine::create_blocking(config).context("failed to initialise GPU engine")?;
    if let Some(err) = engine.compile_error() {
        tracing::warn!("engine degraded, output is the unmodified source: {}", err);
    }

    if let Some(path) = &args.lut {
        let table = image_loader::load_image(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        engine.load_lookup_table(&table)?;
    }
    engine.set_params(&ParamPatch::from(*params))?;

    if args.frames > 0 {
        simulate_video(&mut engine, source, args.frames)?;
    } else {
        engine.load_source(source)?;
    }

    let frame = engine.read_pixels()?;
    engine.destroy();
    Ok(frame)
}

/// Drive the engine the way a video host does: one upload and one render
/// per frame. Frames pan the source horizontally.
fn simulate_video(engine: &mut Engine, source: &FrameBuffer, frames: u32) -> Result<()> {
    let base = match source::upright(source) {
        Some(image) => FrameBuffer::from(image),
        None => source.clone(),
    };
    let row = base.width as usize * BYTES_PER_PIXEL;
    let mut frame = vec![0u8; base.pixels.len()];

    for i in 0..frames {
        let shift = (i as usize % base.width as usize) * BYTES_PER_PIXEL;
        for (dst, src) in frame.chunks_exact_mut(row).zip(base.pixels.chunks_exact(row)) {
            dst[..row - shift].copy_from_slice(&src[shift..]);
            dst[row - shift..].copy_from_slice(&src[..shift]);
        }
        engine.upload_main(&FrameRef::new(base.width, base.height, &frame))?;
        engine.render()?;
    }
    tracing::info!("rendered {} video frames", frames);
    Ok(())
}

fn grade_on_cpu(args: &Args, source: &FrameBuffer, params: &ParameterVector) -> Result<FrameBuffer> {
    if args.width.is_some() || args.height.is_some() {
        tracing::warn!("--width/--height are ignored on the CPU path");
    }
    let lut: Box<dyn LookupTable> = match &args.lut {
        Some(path) => {
            let table = image_loader::load_image(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            Box::new(
                StripLut::from_source(&table)
                    .context("lookup table must be an N²×N strip")?,
            )
        }
        None => Box::new(NeutralLut),
    };
    Ok(grade_frame(source, params, lut.as_ref()))
}
