//! GPU integration tests. Requires a wgpu adapter; a software adapter is
//! used when no hardware one is available, and each test is skipped when
//! neither exists.
//!
//! Run with: `cargo test -p artifact-gpu`

use artifact_core::grade::{NeutralLut, grade_frame};
use artifact_core::looks::Look;
use artifact_core::params::{ParamField, ParamPatch, ParameterVector};
use artifact_core::source::{FrameBuffer, FrameRef, Orientation};
use artifact_gpu::{Engine, EngineConfig, EngineError, EngineState, ShaderSources};
use parking_lot::Mutex;

/// Serializes device access across tests.
static GPU_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Build an engine, retrying on a software adapter. `None` means skip.
fn create_test_engine_with(width: u32, height: u32, sources: ShaderSources) -> Option<Engine> {
    let mut config = EngineConfig::new(width, height);
    match Engine::with_shaders(config.clone(), sources.clone()) {
        Ok(engine) => Some(engine),
        Err(EngineError::ContextUnavailable(_)) => {
            config.force_fallback_adapter = true;
            match Engine::with_shaders(config, sources) {
                Ok(engine) => Some(engine),
                Err(err) => {
                    eprintln!("skipping GPU test: {err}");
                    None
                }
            }
        }
        Err(err) => panic!("engine construction failed: {err}"),
    }
}

fn create_test_engine(width: u32, height: u32) -> Option<Engine> {
    create_test_engine_with(width, height, ShaderSources::default())
}

/// Deterministic test pattern with varying alpha.
fn create_test_gradient(width: u32, height: u32) -> FrameBuffer {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x * 255 / (width - 1)) as u8,
                (y * 255 / (height - 1)) as u8,
                ((x * 7 + y * 13) % 256) as u8,
                (128 + (x + y) % 128) as u8,
            ]);
        }
    }
    FrameBuffer::new(width, height, pixels).unwrap()
}

fn patch(field: ParamField, value: f32) -> ParamPatch {
    ParamPatch::new().with(field, value)
}

fn assert_close(expected: &[u8], actual: &[u8], tolerance: u8) {
    assert_eq!(expected.len(), actual.len());
    for (i, (a, b)) in expected.iter().zip(actual).enumerate() {
        assert!(
            a.abs_diff(*b) <= tolerance,
            "byte {i} (pixel {}, channel {}): expected {a}, got {b}",
            i / 4,
            i % 4,
        );
    }
}

#[test]
fn test_engine_starts_ready_with_neutral_params() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(engine) = create_test_engine(64, 48) else {
        return;
    };
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(engine.compile_error().is_none());
    assert!(engine.get_params().unwrap().is_neutral());
    assert_eq!(engine.source_size().unwrap(), (1, 1));
    assert_eq!(engine.lut_size().unwrap(), (1, 1));
    assert_eq!(engine.output_size().unwrap(), (64, 48));
}

#[test]
fn test_neutral_render_reproduces_source() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(16, 16) else {
        return;
    };
    let source = create_test_gradient(16, 16);
    engine.load_source(&source).unwrap();
    let frame = engine.read_pixels().unwrap();
    assert_eq!((frame.width, frame.height), (16, 16));
    assert_close(&source.pixels, &frame.pixels, 1);
}

#[test]
fn test_each_neutral_field_reproduces_source() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(8, 8) else {
        return;
    };
    let source = create_test_gradient(8, 8);
    engine.load_source(&source).unwrap();
    for field in ParamField::ALL {
        engine.set_params(&patch(field, field.neutral())).unwrap();
        engine.render().unwrap();
        let frame = engine.read_pixels().unwrap();
        assert_close(&source.pixels, &frame.pixels, 1);
    }
}

#[test]
fn test_render_is_idempotent() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(32, 24) else {
        return;
    };
    engine.load_source(&create_test_gradient(20, 10)).unwrap();
    engine
        .set_params(
            &ParamPatch::new()
                .with(ParamField::Noise, 1.0)
                .with(ParamField::Vignette, 0.8)
                .with(ParamField::Sharpness, 0.5),
        )
        .unwrap();

    engine.render().unwrap();
    let first = engine.read_pixels().unwrap();
    for _ in 0..5 {
        engine.render().unwrap();
    }
    let last = engine.read_pixels().unwrap();
    assert_eq!(first, last);
}

#[test]
fn test_readback_is_top_row_first() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(1, 2) else {
        return;
    };
    let source = FrameBuffer::new(1, 2, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap();
    engine.load_source(&source).unwrap();
    let frame = engine.read_pixels().unwrap();
    assert_close(&source.pixels, &frame.pixels, 1);
}

#[test]
fn test_exposure_clamps_to_declared_max() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(4, 4) else {
        return;
    };
    let report = engine.set_params(&patch(ParamField::Exposure, 999.0)).unwrap();
    assert!(report.clamped.contains(ParamField::Exposure));
    assert_eq!(engine.get_params().unwrap().exposure, 2.0);

    engine.set_params(&patch(ParamField::Exposure, f32::NAN)).unwrap();
    assert_eq!(engine.get_params().unwrap().exposure, 2.0);
}

#[test]
fn test_named_params_and_looks_reach_the_render() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(4, 4) else {
        return;
    };
    let report = engine
        .set_params_named([
            ("warmth", 0.8),
            ("black_point", 0.2),
            ("sparkle", 1.0),
            ("tint", f32::NAN),
        ])
        .unwrap();
    assert_eq!(report.applied.len(), 2);
    assert!(report.rejected.contains(ParamField::Tint));
    let params = engine.get_params().unwrap();
    assert_eq!(params.warmth, 0.8);
    assert_eq!(params.black_point, 0.2);
    assert_eq!(params.tint, 0.0);

    engine.load_source(&FrameBuffer::solid(4, 4, [128, 128, 128, 255])).unwrap();
    let px = engine.read_pixels().unwrap().pixels;
    assert!(px[0] > px[2], "warmth did not reach the shader: {:?}", &px[..4]);

    engine.apply_look(Look::Cool).unwrap();
    let params = engine.get_params().unwrap();
    assert_eq!(params.warmth, -0.3);
    assert_eq!(params.tint, -0.1);
    assert_eq!(params.black_point, 0.2);
    engine.render().unwrap();
    let px = engine.read_pixels().unwrap().pixels;
    assert!(px[2] > px[0], "cool look did not reach the shader: {:?}", &px[..4]);
}

#[test]
fn test_exposure_brightens_gray_monotonically() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(4, 4) else {
        return;
    };
    engine.load_source(&FrameBuffer::solid(4, 4, [40, 40, 40, 255])).unwrap();
    let mut previous = 0u8;
    for exposure in [-1.0, 0.0, 0.5, 1.0, 1.5, 2.0] {
        engine.set_params(&patch(ParamField::Exposure, exposure)).unwrap();
        engine.render().unwrap();
        let value = engine.read_pixels().unwrap().pixels[0];
        assert!(value > previous, "exposure {exposure}: {value} <= {previous}");
        previous = value;
    }
}

#[test]
fn test_invalid_fragment_enters_degraded_pass_through() {
    let _lock = GPU_TEST_LOCK.lock();
    let sources = ShaderSources::with_fragment("@fragment fn fs_main( -> broken");
    let Some(mut engine) = create_test_engine_with(8, 8, sources) else {
        return;
    };
    assert_eq!(engine.state(), EngineState::Degraded);
    assert!(engine.is_degraded());
    assert!(engine.compile_error().is_some());

    let source = create_test_gradient(8, 8);
    engine.load_source(&source).unwrap();
    // Uniform writes are no-ops on the fallback; output stays the source.
    engine.set_params(&patch(ParamField::Saturation, -1.0)).unwrap();
    engine.render().unwrap();
    let frame = engine.read_pixels().unwrap();
    assert_close(&source.pixels, &frame.pixels, 1);
    assert_eq!(engine.state(), EngineState::Degraded);
}

#[test]
fn test_missing_entry_point_enters_degraded() {
    let _lock = GPU_TEST_LOCK.lock();
    let sources = ShaderSources::with_fragment(
        "@fragment fn shade() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
    );
    let Some(engine) = create_test_engine_with(4, 4, sources) else {
        return;
    };
    assert_eq!(engine.state(), EngineState::Degraded);
}

#[test]
fn test_degenerate_source_keeps_bound_texture() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(16, 16) else {
        return;
    };
    engine.load_source(&create_test_gradient(12, 6)).unwrap();
    assert_eq!(engine.source_size().unwrap(), (12, 6));

    engine.load_source(&FrameBuffer::solid(0, 0, [0; 4])).unwrap();
    assert_eq!(engine.source_size().unwrap(), (12, 6));

    // Length mismatch is rejected the same way.
    let short = FrameRef::new(4, 4, &[0u8; 10]);
    engine.load_source(&short).unwrap();
    assert_eq!(engine.source_size().unwrap(), (12, 6));
}

#[test]
fn test_scenario_desaturated_red_is_uniform_gray() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(800, 600) else {
        return;
    };
    engine.load_source(&FrameBuffer::solid(100, 100, [255, 0, 0, 255])).unwrap();
    engine.set_params(&patch(ParamField::Saturation, -1.0)).unwrap();
    engine.render().unwrap();

    let frame = engine.read_pixels().unwrap();
    assert_eq!((frame.width, frame.height), (800, 600));
    let expected = (0.2126_f32 * 255.0).round() as u8;
    for px in frame.pixels.chunks_exact(4) {
        assert!(px[0].abs_diff(expected) <= 1, "red channel {}", px[0]);
        assert!(px[0].abs_diff(px[1]) <= 1 && px[1].abs_diff(px[2]) <= 1);
    }
}

#[test]
fn test_scenario_warmth_raises_red_lowers_blue() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(24, 24) else {
        return;
    };
    let source = create_test_gradient(24, 24);
    engine.load_source(&source).unwrap();
    engine.set_params(&patch(ParamField::Warmth, 1.0)).unwrap();
    engine.render().unwrap();

    let frame = engine.read_pixels().unwrap();
    for (src, out) in source.pixels.chunks_exact(4).zip(frame.pixels.chunks_exact(4)) {
        assert!(out[0] >= src[0], "red {} < {}", out[0], src[0]);
        assert!(out[2] <= src[2], "blue {} > {}", out[2], src[2]);
    }
}

#[test]
fn test_gpu_matches_cpu_reference() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(16, 12) else {
        return;
    };
    let source = create_test_gradient(16, 12);
    let patch = ParamPatch::new()
        .with(ParamField::Exposure, 0.4)
        .with(ParamField::Contrast, 0.3)
        .with(ParamField::Saturation, 0.2)
        .with(ParamField::Warmth, -0.4)
        .with(ParamField::BlackPoint, 0.5);
    engine.load_source(&source).unwrap();
    engine.set_params(&patch).unwrap();
    engine.render().unwrap();
    let gpu = engine.read_pixels().unwrap();

    let params = ParameterVector::default().patched(&patch);
    let cpu = grade_frame(&source, &params, &NeutralLut);
    assert_close(&cpu.pixels, &gpu.pixels, 2);
}

#[test]
fn test_orientation_is_applied_before_upload() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(8, 8) else {
        return;
    };
    let rotated = create_test_gradient(6, 3).with_orientation(Orientation::Rotate90);
    engine.load_source(&rotated).unwrap();
    assert_eq!(engine.source_size().unwrap(), (3, 6));
}

#[test]
fn test_video_loop_reuses_texture() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(10, 10) else {
        return;
    };
    let mut frame = vec![0u8; 10 * 10 * 4];
    for i in 0..30u8 {
        frame.fill(i * 8);
        assert!(engine.upload_main(&FrameRef::new(10, 10, &frame)).unwrap());
        engine.render().unwrap();
    }
    assert_eq!(engine.source_size().unwrap(), (10, 10));
    let last = engine.read_pixels().unwrap();
    assert_close(&frame, &last.pixels, 1);
}

#[test]
fn test_lookup_table_shape_is_validated() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(4, 4) else {
        return;
    };
    engine.load_lookup_table(&FrameBuffer::solid(10, 10, [0; 4])).unwrap();
    assert_eq!(engine.lut_size().unwrap(), (1, 1));

    engine.load_lookup_table(&FrameBuffer::solid(16, 4, [0, 0, 0, 255])).unwrap();
    assert_eq!(engine.lut_size().unwrap(), (16, 4));

    // A black LUT at full intensity turns everything black.
    engine.load_source(&FrameBuffer::solid(4, 4, [200, 150, 100, 255])).unwrap();
    engine.set_params(&patch(ParamField::FilterIntensity, 1.0)).unwrap();
    engine.render().unwrap();
    let frame = engine.read_pixels().unwrap();
    assert!(frame.pixels.chunks_exact(4).all(|px| px[..3] == [0, 0, 0]));
}

#[test]
fn test_resize_changes_output_only() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(16, 16) else {
        return;
    };
    engine.load_source(&create_test_gradient(8, 8)).unwrap();
    engine.resize(32, 8).unwrap();
    assert_eq!(engine.output_size().unwrap(), (32, 8));
    assert_eq!(engine.source_size().unwrap(), (8, 8));

    engine.resize(0, 0).unwrap();
    assert_eq!(engine.output_size().unwrap(), (32, 8));

    engine.render().unwrap();
    let frame = engine.read_pixels().unwrap();
    assert_eq!((frame.width, frame.height), (32, 8));
}

#[test]
fn test_destroy_is_idempotent_and_terminal() {
    let _lock = GPU_TEST_LOCK.lock();
    let Some(mut engine) = create_test_engine(4, 4) else {
        return;
    };
    engine.destroy();
    engine.destroy();
    assert_eq!(engine.state(), EngineState::Destroyed);
    assert!(matches!(engine.render(), Err(EngineError::Destroyed)));
    assert!(matches!(engine.get_params(), Err(EngineError::Destroyed)));
    assert!(matches!(
        engine.load_source(&create_test_gradient(4, 4)),
        Err(EngineError::Destroyed)
    ));
    assert!(matches!(engine.resize(8, 8), Err(EngineError::Destroyed)));
}
