//! CPU reference for the grading pipeline.
//!
//! Mirrors `grade.wgsl` stage for stage. The stage order is fixed:
//!
//! 1. exposure
//! 2. brightness
//! 3. contrast
//! 4. highlights / shadows
//! 5. saturation / vibrance, then clamp
//! 6. warmth / tint
//! 7. sharpness, definition, brilliance, black point
//! 8. lookup-table mix (`filter_intensity`) and vignette
//! 9. noise
//! 10. final clamp
//!
//! Every stage is skipped outright when its parameter is neutral, so a
//! neutral vector returns the input bit-for-bit.

use glam::{Vec2, Vec3};

use crate::params::ParameterVector;
use crate::source::{self, BYTES_PER_PIXEL, FrameBuffer, PixelSource};

/// Rec. 709 luminance weights.
pub const LUMA_REC709: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Offset added per unit of `brightness`.
pub const BRIGHTNESS_SCALE: f32 = 1.0;

/// Neighbourhood radius, in texels, for `sharpness`.
pub const SHARPNESS_RADIUS: i32 = 1;

/// Neighbourhood radius, in texels, for `definition`.
pub const DEFINITION_RADIUS: i32 = 4;

/// Distance from the centre to a corner in UV space.
const VIGNETTE_EXTENT: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Per-pixel inputs to [`grade_pixel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelInput {
    /// Source colour in `[0, 1]`.
    pub rgb: Vec3,
    /// Screen-space UV, `(0, 0)` at the bottom-left.
    pub uv: Vec2,
    /// Mean of the four neighbours at [`SHARPNESS_RADIUS`].
    pub local_mean: Vec3,
    /// Mean of the four neighbours at [`DEFINITION_RADIUS`].
    pub wide_mean: Vec3,
}

impl PixelInput {
    /// A pixel in a flat region: neighbourhood means equal the pixel itself.
    pub fn flat(rgb: Vec3, uv: Vec2) -> Self {
        Self {
            rgb,
            uv,
            local_mean: rgb,
            wide_mean: rgb,
        }
    }
}

// ── Lookup tables ───────────────────────────────────────────────

/// Colour lookup used by the `filter_intensity` stage.
pub trait LookupTable {
    fn lookup(&self, rgb: Vec3) -> Vec3;
}

/// The default table: a 1×1 white texel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralLut;

impl LookupTable for NeutralLut {
    fn lookup(&self, _rgb: Vec3) -> Vec3 {
        Vec3::ONE
    }
}

/// Edge length `N` of a strip LUT image, if `width × height` has the
/// `N² × N` strip shape.
pub fn strip_lut_size(width: u32, height: u32) -> Option<u32> {
    if height == 0 {
        return None;
    }
    (height.checked_mul(height)? == width).then_some(height)
}

/// A 3D LUT stored as a horizontal strip of `N` tiles of `N × N` texels.
///
/// Red runs along x inside a tile, green runs down the rows (top row is
/// green 0), blue picks the tile. Lookups are trilinear.
#[derive(Debug, Clone)]
pub struct StripLut {
    size: u32,
    texels: Vec<Vec3>,
}

impl StripLut {
    /// Build from an RGBA8 strip. Returns `None` if the shape or data length
    /// is wrong.
    pub fn from_source<S: PixelSource + ?Sized>(source: &S) -> Option<Self> {
        let (width, height) = source.dimensions();
        let size = strip_lut_size(width, height)?;
        let data = source.data();
        if data.len() != source::expected_len(width, height) {
            return None;
        }
        let texels = data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| unorm_to_vec3([px[0], px[1], px[2]]))
            .collect();
        Some(Self { size, texels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn texel(&self, r: u32, g: u32, b: u32) -> Vec3 {
        let n = self.size as usize;
        let x = b as usize * n + r as usize;
        let y = g as usize;
        self.texels[y * n * n + x]
    }
}

impl LookupTable for StripLut {
    fn lookup(&self, rgb: Vec3) -> Vec3 {
        if self.size == 1 {
            return self.texel(0, 0, 0);
        }
        let max = (self.size - 1) as f32;
        let c = rgb.clamp(Vec3::ZERO, Vec3::ONE) * max;
        let lo = c.floor();
        let t = c - lo;
        let top = self.size - 1;
        let (r0, g0, b0) = (lo.x as u32, lo.y as u32, lo.z as u32);
        let (r1, g1, b1) = ((r0 + 1).min(top), (g0 + 1).min(top), (b0 + 1).min(top));

        let tile = |b: u32| {
            let low = self.texel(r0, g0, b).lerp(self.texel(r1, g0, b), t.x);
            let high = self.texel(r0, g1, b).lerp(self.texel(r1, g1, b), t.x);
            low.lerp(high, t.y)
        };
        tile(b0).lerp(tile(b1), t.z)
    }
}

// ── Per-pixel grade ─────────────────────────────────────────────

/// Screen-space grain in `[0, 1)`. Depends on UV only.
pub fn grain(uv: Vec2) -> f32 {
    let x = uv.dot(Vec2::new(12.9898, 78.233)).sin() * 43758.5453;
    x - x.floor()
}

/// Weight peaking at mid-tones and vanishing at black and white.
fn midtone_bell(luma: f32) -> f32 {
    let l = luma.clamp(0.0, 1.0);
    4.0 * l * (1.0 - l)
}

/// Grade one pixel. Returns the output colour in `[0, 1]`.
pub fn grade_pixel(input: &PixelInput, params: &ParameterVector, lut: &dyn LookupTable) -> Vec3 {
    let p = params;
    let mut rgb = input.rgb;

    // 1. Exposure
    if p.exposure != 0.0 {
        rgb *= p.exposure.exp2();
    }

    // 2. Brightness
    if p.brightness != 0.0 {
        rgb += Vec3::splat(p.brightness * BRIGHTNESS_SCALE);
    }

    // 3. Contrast
    if p.contrast != 0.0 {
        rgb = rgb.lerp(Vec3::splat(0.5), -p.contrast * 0.5);
    }

    // 4. Highlights / shadows, split at luma 0.5
    if p.highlights != 0.0 || p.shadows != 0.0 {
        let luma = rgb.dot(LUMA_REC709);
        if luma > 0.5 {
            rgb = rgb.lerp(Vec3::ONE, p.highlights);
        } else {
            rgb = rgb.lerp(Vec3::ZERO, -p.shadows);
        }
    }

    // 5. Saturation / vibrance
    if p.saturation != 0.0 || p.vibrance != 0.0 {
        let luma = Vec3::splat(rgb.dot(LUMA_REC709));
        if p.saturation != 0.0 {
            rgb = luma + (rgb - luma) * (1.0 + p.saturation);
        }
        if p.vibrance != 0.0 {
            let chroma = rgb.max_element() - rgb.min_element();
            let weight = p.vibrance * (1.0 - chroma.clamp(0.0, 1.0));
            rgb = luma + (rgb - luma) * (1.0 + weight);
        }
    }
    rgb = rgb.clamp(Vec3::ZERO, Vec3::ONE);

    // 6. Warmth / tint
    if p.warmth != 0.0 {
        rgb.x += p.warmth * 0.1;
        rgb.z -= p.warmth * 0.05;
    }
    if p.tint != 0.0 {
        rgb.y += p.tint * 0.1;
        rgb.x -= p.tint * 0.05;
    }

    // 7. Detail and black point
    if p.sharpness != 0.0 {
        rgb += p.sharpness * (input.rgb - input.local_mean);
    }
    if p.definition != 0.0 {
        let bell = midtone_bell(rgb.dot(LUMA_REC709));
        rgb += p.definition * 0.5 * bell * (input.rgb - input.wide_mean);
    }
    if p.brilliance != 0.0 {
        let bell = midtone_bell(rgb.dot(LUMA_REC709));
        rgb += Vec3::splat(p.brilliance * 0.2 * bell);
    }
    if p.black_point != 0.0 {
        let c = p.black_point * 0.1;
        rgb = (rgb - Vec3::splat(c)) / (1.0 - c);
    }

    // 8. Lookup table, vignette
    if p.filter_intensity != 0.0 {
        rgb = rgb.lerp(lut.lookup(rgb), p.filter_intensity);
    }
    if p.vignette != 0.0 {
        let d = input.uv.distance(Vec2::splat(0.5)) / VIGNETTE_EXTENT;
        rgb *= (1.0 - p.vignette * 0.5 * d * d).max(0.0);
    }

    // 9. Noise
    if p.noise != 0.0 {
        rgb += Vec3::splat(grain(input.uv) * p.noise * 0.1);
    }

    // 10. Final clamp
    rgb.clamp(Vec3::ZERO, Vec3::ONE)
}

// ── Whole-frame grade ───────────────────────────────────────────

fn unorm_to_vec3(px: [u8; 3]) -> Vec3 {
    Vec3::new(px[0] as f32, px[1] as f32, px[2] as f32) / 255.0
}

fn vec3_to_unorm(rgb: Vec3) -> [u8; 3] {
    let v = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [v.x as u8, v.y as u8, v.z as u8]
}

/// Read-only view over tightly packed RGBA8 rows with clamped addressing.
struct Texels<'a> {
    width: i32,
    height: i32,
    data: &'a [u8],
}

impl Texels<'_> {
    fn rgb(&self, x: i32, y: i32) -> Vec3 {
        let x = x.clamp(0, self.width - 1) as usize;
        let y = y.clamp(0, self.height - 1) as usize;
        let i = (y * self.width as usize + x) * BYTES_PER_PIXEL;
        unorm_to_vec3([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    fn cross_mean(&self, x: i32, y: i32, radius: i32) -> Vec3 {
        (self.rgb(x - radius, y)
            + self.rgb(x + radius, y)
            + self.rgb(x, y - radius)
            + self.rgb(x, y + radius))
            * 0.25
    }
}

/// Grade a whole source on the CPU at its upright resolution.
///
/// Orientation metadata is applied first, as the GPU upload does. A source
/// with zero area or mismatched data length yields an empty buffer.
pub fn grade_frame<S: PixelSource + ?Sized>(
    source: &S,
    params: &ParameterVector,
    lut: &dyn LookupTable,
) -> FrameBuffer {
    let corrected = source::upright(source);
    let ((width, height), data) = match &corrected {
        Some(image) => (image.dimensions(), image.as_raw().as_slice()),
        None => (source.dimensions(), source.data()),
    };

    if width == 0 || height == 0 || data.len() != source::expected_len(width, height) {
        tracing::warn!(
            "cannot grade {}x{} source with {} bytes",
            width,
            height,
            data.len()
        );
        return FrameBuffer::solid(0, 0, [0; 4]);
    }

    let texels = Texels {
        width: width as i32,
        height: height as i32,
        data,
    };
    let mut pixels = Vec::with_capacity(data.len());
    for y in 0..texels.height {
        for x in 0..texels.width {
            let rgb = texels.rgb(x, y);
            let uv = Vec2::new(
                (x as f32 + 0.5) / width as f32,
                1.0 - (y as f32 + 0.5) / height as f32,
            );
            let input = PixelInput {
                rgb,
                uv,
                local_mean: if params.sharpness != 0.0 {
                    texels.cross_mean(x, y, SHARPNESS_RADIUS)
                } else {
                    rgb
                },
                wide_mean: if params.definition != 0.0 {
                    texels.cross_mean(x, y, DEFINITION_RADIUS)
                } else {
                    rgb
                },
            };
            let out = vec3_to_unorm(grade_pixel(&input, params, lut));
            let alpha = data[(y as usize * width as usize + x as usize) * BYTES_PER_PIXEL + 3];
            pixels.extend_from_slice(&[out[0], out[1], out[2], alpha]);
        }
    }

    FrameBuffer {
        width,
        height,
        pixels,
        orientation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamField, ParamPatch};

    const EPSILON: f32 = 1e-5;

    fn with(field: ParamField, value: f32) -> ParameterVector {
        ParameterVector::default().patched(&ParamPatch::new().with(field, value))
    }

    fn gradient(width: u32, height: u32) -> FrameBuffer {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[
                    (x * 255 / (width - 1)) as u8,
                    (y * 37 % 256) as u8,
                    ((x + y) * 19 % 256) as u8,
                    200,
                ]);
            }
        }
        FrameBuffer::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_neutral_vector_is_identity() {
        let src = gradient(16, 9);
        let out = grade_frame(&src, &ParameterVector::default(), &NeutralLut);
        assert_eq!(out.pixels, src.pixels);
    }

    #[test]
    fn test_each_field_at_neutral_is_identity() {
        let src = gradient(12, 12);
        for field in ParamField::ALL {
            let params = with(field, field.neutral());
            let out = grade_frame(&src, &params, &NeutralLut);
            assert_eq!(out.pixels, src.pixels, "{field} at neutral changed the frame");
        }
    }

    #[test]
    fn test_noise_is_zero_at_neutral_and_deterministic() {
        let input = PixelInput::flat(Vec3::splat(0.3), Vec2::new(0.25, 0.75));
        let neutral = grade_pixel(&input, &ParameterVector::default(), &NeutralLut);
        assert_eq!(neutral, input.rgb);

        let noisy = with(ParamField::Noise, 1.0);
        let a = grade_pixel(&input, &noisy, &NeutralLut);
        let b = grade_pixel(&input, &noisy, &NeutralLut);
        assert_eq!(a, b);
        assert!(a.x >= input.rgb.x);
    }

    #[test]
    fn test_grain_range() {
        for i in 0..100 {
            let uv = Vec2::new(i as f32 / 100.0, 1.0 - i as f32 / 130.0);
            let g = grain(uv);
            assert!((0.0..1.0).contains(&g), "grain {g} out of range");
        }
    }

    #[test]
    fn test_exposure_is_monotonic_on_gray() {
        let input = PixelInput::flat(Vec3::splat(0.2), Vec2::splat(0.5));
        let mut previous = -1.0;
        for step in -8..=8 {
            let e = step as f32 * 0.25;
            let out = grade_pixel(&input, &with(ParamField::Exposure, e), &NeutralLut);
            let luma = out.dot(LUMA_REC709);
            if previous < 1.0 - EPSILON {
                assert!(luma > previous, "exposure {e} did not brighten");
            }
            previous = luma;
        }
    }

    #[test]
    fn test_full_desaturation_of_red_is_luma_gray() {
        let input = PixelInput::flat(Vec3::new(1.0, 0.0, 0.0), Vec2::splat(0.5));
        let out = grade_pixel(&input, &with(ParamField::Saturation, -1.0), &NeutralLut);
        assert!((out.x - 0.2126).abs() < EPSILON);
        assert!((out.x - out.y).abs() < EPSILON);
        assert!((out.y - out.z).abs() < EPSILON);
    }

    #[test]
    fn test_warmth_raises_red_and_lowers_blue() {
        let src = gradient(10, 10);
        let out = grade_frame(&src, &with(ParamField::Warmth, 1.0), &NeutralLut);
        for (a, b) in src.pixels.chunks(4).zip(out.pixels.chunks(4)) {
            assert!(b[0] >= a[0]);
            assert!(b[2] <= a[2]);
            assert_eq!(b[3], a[3]);
        }
    }

    #[test]
    fn test_tint_shifts_green_over_red() {
        let input = PixelInput::flat(Vec3::splat(0.5), Vec2::splat(0.5));
        let out = grade_pixel(&input, &with(ParamField::Tint, 0.5), &NeutralLut);
        assert!((out.y - 0.55).abs() < EPSILON);
        assert!((out.x - 0.475).abs() < EPSILON);
        assert_eq!(out.z, 0.5);

        let magenta = grade_pixel(&input, &with(ParamField::Tint, -1.0), &NeutralLut);
        assert!(magenta.y < 0.5);
        assert!(magenta.x > 0.5);
    }

    #[test]
    fn test_brightness_adds_offset() {
        let input = PixelInput::flat(Vec3::new(0.3, 0.4, 0.5), Vec2::splat(0.5));
        for b in [-0.2, 0.1, 0.25] {
            let out = grade_pixel(&input, &with(ParamField::Brightness, b), &NeutralLut);
            let expected = input.rgb + Vec3::splat(b * BRIGHTNESS_SCALE);
            assert!((out - expected).abs().max_element() < EPSILON, "brightness {b}");
        }
    }

    #[test]
    fn test_highlights_shadows_split_at_mid_luma() {
        let bright = PixelInput::flat(Vec3::splat(0.8), Vec2::splat(0.5));
        let dark = PixelInput::flat(Vec3::splat(0.2), Vec2::splat(0.5));
        let highlights = with(ParamField::Highlights, 0.5);
        let shadows = with(ParamField::Shadows, 0.5);

        let out = grade_pixel(&bright, &highlights, &NeutralLut);
        assert!((out.x - 0.9).abs() < EPSILON);
        assert_eq!(grade_pixel(&dark, &highlights, &NeutralLut), dark.rgb);

        let out = grade_pixel(&dark, &shadows, &NeutralLut);
        assert!((out.x - 0.3).abs() < EPSILON);
        assert_eq!(grade_pixel(&bright, &shadows, &NeutralLut), bright.rgb);
    }

    fn chroma(rgb: Vec3) -> f32 {
        rgb.max_element() - rgb.min_element()
    }

    #[test]
    fn test_vibrance_spares_saturated_pixels() {
        let muted = PixelInput::flat(Vec3::new(0.5, 0.4, 0.4), Vec2::splat(0.5));
        let vivid = PixelInput::flat(Vec3::new(0.9, 0.1, 0.1), Vec2::splat(0.5));
        let params = with(ParamField::Vibrance, 0.5);

        let muted_gain = chroma(grade_pixel(&muted, &params, &NeutralLut)) / chroma(muted.rgb);
        let vivid_gain = chroma(grade_pixel(&vivid, &params, &NeutralLut)) / chroma(vivid.rgb);
        assert!(muted_gain > 1.0);
        assert!(vivid_gain > 1.0);
        assert!(muted_gain > vivid_gain);
    }

    #[test]
    fn test_vibrance_is_monotonic() {
        let input = PixelInput::flat(Vec3::new(0.5, 0.4, 0.4), Vec2::splat(0.5));
        let range = ParamField::Vibrance.range();
        let mut previous = f32::NEG_INFINITY;
        for step in 0..=10 {
            let v = range.min + (range.max - range.min) * step as f32 / 10.0;
            let out = chroma(grade_pixel(&input, &with(ParamField::Vibrance, v), &NeutralLut));
            assert!(out >= previous - EPSILON, "vibrance not monotonic at {v}");
            previous = out;
        }
    }

    #[test]
    fn test_contrast_pushes_away_from_mid_gray() {
        let input = PixelInput::flat(Vec3::splat(0.7), Vec2::splat(0.5));
        let up = grade_pixel(&input, &with(ParamField::Contrast, 0.5), &NeutralLut);
        let down = grade_pixel(&input, &with(ParamField::Contrast, -0.5), &NeutralLut);
        assert!(up.x > 0.7);
        assert!(down.x < 0.7);
    }

    #[test]
    fn test_detail_stages_are_monotonic() {
        let input = PixelInput {
            rgb: Vec3::splat(0.6),
            uv: Vec2::splat(0.5),
            local_mean: Vec3::splat(0.5),
            wide_mean: Vec3::splat(0.4),
        };
        for field in [
            ParamField::Sharpness,
            ParamField::Definition,
            ParamField::Brilliance,
        ] {
            let range = field.range();
            let mut previous = f32::NEG_INFINITY;
            for step in 0..=10 {
                let v = range.min + (range.max - range.min) * step as f32 / 10.0;
                let out = grade_pixel(&input, &with(field, v), &NeutralLut).x;
                assert!(out >= previous - EPSILON, "{field} not monotonic at {v}");
                previous = out;
            }
        }
    }

    #[test]
    fn test_black_point_darkens_as_it_rises() {
        let input = PixelInput::flat(Vec3::splat(0.5), Vec2::splat(0.5));
        let low = grade_pixel(&input, &with(ParamField::BlackPoint, -1.0), &NeutralLut);
        let high = grade_pixel(&input, &with(ParamField::BlackPoint, 1.0), &NeutralLut);
        assert!(low.x > 0.5);
        assert!(high.x < 0.5);
    }

    #[test]
    fn test_vignette_leaves_centre_and_darkens_corners() {
        let params = with(ParamField::Vignette, 1.0);
        let centre = PixelInput::flat(Vec3::splat(0.8), Vec2::splat(0.5));
        let corner = PixelInput::flat(Vec3::splat(0.8), Vec2::ZERO);
        assert!((grade_pixel(&centre, &params, &NeutralLut).x - 0.8).abs() < EPSILON);
        assert!((grade_pixel(&corner, &params, &NeutralLut).x - 0.4).abs() < EPSILON);
    }

    #[test]
    fn test_filter_intensity_mixes_toward_white_default() {
        let input = PixelInput::flat(Vec3::splat(0.2), Vec2::splat(0.5));
        let out = grade_pixel(&input, &with(ParamField::FilterIntensity, 0.5), &NeutralLut);
        assert!((out.x - 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_identity_strip_lut() {
        let n = 4u32;
        let mut pixels = Vec::new();
        for g in 0..n {
            for b in 0..n {
                for r in 0..n {
                    let scale = |v: u32| (v * 255 / (n - 1)) as u8;
                    pixels.extend_from_slice(&[scale(r), scale(g), scale(b), 255]);
                }
            }
        }
        let strip = FrameBuffer::new(n * n, n, pixels).unwrap();
        let lut = StripLut::from_source(&strip).unwrap();
        assert_eq!(lut.size(), 4);

        let sample = Vec3::new(0.1, 0.5, 0.9);
        let out = lut.lookup(sample);
        assert!((out - sample).abs().max_element() < 1.0 / 255.0 + EPSILON);
    }

    #[test]
    fn test_strip_lut_shape() {
        assert_eq!(strip_lut_size(1, 1), Some(1));
        assert_eq!(strip_lut_size(256, 16), Some(16));
        assert_eq!(strip_lut_size(100, 100), None);
        assert_eq!(strip_lut_size(0, 0), None);
    }

    #[test]
    fn test_degenerate_source_yields_empty_frame() {
        let src = FrameBuffer::solid(0, 0, [0; 4]);
        let out = grade_frame(&src, &ParameterVector::default(), &NeutralLut);
        assert!(out.pixels.is_empty());
    }
}
