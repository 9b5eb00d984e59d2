//! The 16-knob parameter vector and its validated patch merge.
//!
//! `ParameterVector` is the single source of truth for a grade. Every host
//! writes through `ParamPatch`; the render core reads the full vector.
//! Applying a patch is a pure merge + clamp: identical inputs from an
//! identical starting vector always produce bit-identical results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared `[min, max]` range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range. `value` must be finite.
    pub fn clamp(self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Whether `value` lies inside the range (inclusive).
    pub fn contains(self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// UI grouping of the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamGroup {
    Tone,
    Color,
    Detail,
    Post,
}

/// Identifies one of the 16 grading knobs.
///
/// The discriminant doubles as the field's index in fixed-size tables
/// (`ParamPatch`, `FieldSet`, the GPU uniform slot table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamField {
    Exposure,
    Brightness,
    Contrast,
    Highlights,
    Shadows,
    BlackPoint,
    Saturation,
    Vibrance,
    Warmth,
    Tint,
    Brilliance,
    Sharpness,
    Definition,
    Noise,
    Vignette,
    FilterIntensity,
}

impl ParamField {
    /// Number of parameters.
    pub const COUNT: usize = 16;

    /// Every field, in index order.
    pub const ALL: [ParamField; Self::COUNT] = [
        ParamField::Exposure,
        ParamField::Brightness,
        ParamField::Contrast,
        ParamField::Highlights,
        ParamField::Shadows,
        ParamField::BlackPoint,
        ParamField::Saturation,
        ParamField::Vibrance,
        ParamField::Warmth,
        ParamField::Tint,
        ParamField::Brilliance,
        ParamField::Sharpness,
        ParamField::Definition,
        ParamField::Noise,
        ParamField::Vignette,
        ParamField::FilterIntensity,
    ];

    /// Index into fixed-size per-field tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical (camelCase) name used by hosts.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exposure => "exposure",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Highlights => "highlights",
            Self::Shadows => "shadows",
            Self::BlackPoint => "blackPoint",
            Self::Saturation => "saturation",
            Self::Vibrance => "vibrance",
            Self::Warmth => "warmth",
            Self::Tint => "tint",
            Self::Brilliance => "brilliance",
            Self::Sharpness => "sharpness",
            Self::Definition => "definition",
            Self::Noise => "noise",
            Self::Vignette => "vignette",
            Self::FilterIntensity => "filterIntensity",
        }
    }

    /// snake_case name, as used by shader uniform members.
    pub const fn snake_name(self) -> &'static str {
        match self {
            Self::BlackPoint => "black_point",
            Self::FilterIntensity => "filter_intensity",
            other => other.name(),
        }
    }

    /// Resolve a field from its camelCase or snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == name || field.snake_name() == name)
    }

    /// Declared value range.
    pub const fn range(self) -> ParamRange {
        match self {
            Self::Exposure => ParamRange::new(-2.0, 2.0),
            Self::Sharpness | Self::Definition | Self::Vignette => ParamRange::new(0.0, 2.0),
            Self::Noise | Self::FilterIntensity => ParamRange::new(0.0, 1.0),
            _ => ParamRange::new(-1.0, 1.0),
        }
    }

    /// Value at which the field's pipeline stage is an exact no-op.
    pub const fn neutral(self) -> f32 {
        0.0
    }

    pub const fn group(self) -> ParamGroup {
        match self {
            Self::Exposure
            | Self::Brightness
            | Self::Contrast
            | Self::Highlights
            | Self::Shadows
            | Self::BlackPoint => ParamGroup::Tone,
            Self::Saturation | Self::Vibrance | Self::Warmth | Self::Tint => ParamGroup::Color,
            Self::Brilliance | Self::Sharpness | Self::Definition | Self::Noise => {
                ParamGroup::Detail
            }
            Self::Vignette | Self::FilterIntensity => ParamGroup::Post,
        }
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The complete grade. Always fully populated.
///
/// The engine only ever holds a vector produced by [`ParameterVector::default`]
/// and [`ParameterVector::apply_patch`], so every field stays inside its
/// declared range for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterVector {
    // Tone
    /// Photographic stops; the stage multiplies by `2^exposure`.
    pub exposure: f32,
    pub brightness: f32,
    /// Positive pushes away from mid-gray, negative pulls toward it.
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub black_point: f32,

    // Color
    /// -1.0 fully desaturates to BT.709 luma.
    pub saturation: f32,
    pub vibrance: f32,
    pub warmth: f32,
    pub tint: f32,

    // Detail
    pub brilliance: f32,
    pub sharpness: f32,
    pub definition: f32,
    /// Grain amount. The grain pattern depends on screen-space UV only.
    pub noise: f32,

    // Post
    pub vignette: f32,
    /// Mix toward the lookup-table output.
    pub filter_intensity: f32,
}

impl Default for ParameterVector {
    /// Every field at its neutral value: the grade passes the source through.
    fn default() -> Self {
        Self {
            exposure: 0.0,
            brightness: 0.0,
            contrast: 0.0,
            highlights: 0.0,
            shadows: 0.0,
            black_point: 0.0,
            saturation: 0.0,
            vibrance: 0.0,
            warmth: 0.0,
            tint: 0.0,
            brilliance: 0.0,
            sharpness: 0.0,
            definition: 0.0,
            noise: 0.0,
            vignette: 0.0,
            filter_intensity: 0.0,
        }
    }
}

impl ParameterVector {
    /// Read one field.
    pub fn get(&self, field: ParamField) -> f32 {
        match field {
            ParamField::Exposure => self.exposure,
            ParamField::Brightness => self.brightness,
            ParamField::Contrast => self.contrast,
            ParamField::Highlights => self.highlights,
            ParamField::Shadows => self.shadows,
            ParamField::BlackPoint => self.black_point,
            ParamField::Saturation => self.saturation,
            ParamField::Vibrance => self.vibrance,
            ParamField::Warmth => self.warmth,
            ParamField::Tint => self.tint,
            ParamField::Brilliance => self.brilliance,
            ParamField::Sharpness => self.sharpness,
            ParamField::Definition => self.definition,
            ParamField::Noise => self.noise,
            ParamField::Vignette => self.vignette,
            ParamField::FilterIntensity => self.filter_intensity,
        }
    }

    fn slot_mut(&mut self, field: ParamField) -> &mut f32 {
        match field {
            ParamField::Exposure => &mut self.exposure,
            ParamField::Brightness => &mut self.brightness,
            ParamField::Contrast => &mut self.contrast,
            ParamField::Highlights => &mut self.highlights,
            ParamField::Shadows => &mut self.shadows,
            ParamField::BlackPoint => &mut self.black_point,
            ParamField::Saturation => &mut self.saturation,
            ParamField::Vibrance => &mut self.vibrance,
            ParamField::Warmth => &mut self.warmth,
            ParamField::Tint => &mut self.tint,
            ParamField::Brilliance => &mut self.brilliance,
            ParamField::Sharpness => &mut self.sharpness,
            ParamField::Definition => &mut self.definition,
            ParamField::Noise => &mut self.noise,
            ParamField::Vignette => &mut self.vignette,
            ParamField::FilterIntensity => &mut self.filter_intensity,
        }
    }

    /// Iterate `(field, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamField, f32)> + '_ {
        ParamField::ALL.into_iter().map(|field| (field, self.get(field)))
    }

    /// Values in index order.
    pub fn to_array(&self) -> [f32; ParamField::COUNT] {
        ParamField::ALL.map(|field| self.get(field))
    }

    /// True when every field sits at its neutral value.
    pub fn is_neutral(&self) -> bool {
        self.iter().all(|(field, value)| value == field.neutral())
    }

    /// Merge `patch` into this vector.
    ///
    /// Each present value is clamped to its field's range. Non-finite values
    /// (NaN, ±∞) are rejected per field and the prior value is kept for that
    /// field only.
    pub fn apply_patch(&mut self, patch: &ParamPatch) -> PatchReport {
        let mut report = PatchReport::default();
        for (field, value) in patch.iter() {
            if !value.is_finite() {
                report.rejected.insert(field);
                continue;
            }
            let clamped = field.range().clamp(value);
            if clamped != value {
                report.clamped.insert(field);
            }
            *self.slot_mut(field) = clamped;
            report.applied.insert(field);
        }
        report
    }

    /// Copy of `self` with `patch` applied.
    pub fn patched(mut self, patch: &ParamPatch) -> Self {
        self.apply_patch(patch);
        self
    }

    /// Dual-slot blend: `a·(1 − ratio) + b·ratio` per field.
    ///
    /// `ratio` is clamped to `[0, 1]` (NaN counts as 0), so the result of
    /// blending two in-range vectors is itself in range.
    pub fn blend(a: &Self, b: &Self, ratio: f32) -> Self {
        let t = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let mut out = *a;
        for field in ParamField::ALL {
            let value = a.get(field) * (1.0 - t) + b.get(field) * t;
            *out.slot_mut(field) = field.range().clamp(value);
        }
        out
    }
}

/// A partial update: one optional value per field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParamPatch {
    values: [Option<f32>; ParamField::COUNT],
}

impl ParamPatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, field: ParamField, value: f32) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: ParamField, value: f32) {
        self.values[field.index()] = Some(value);
    }

    pub fn get(&self, field: ParamField) -> Option<f32> {
        self.values[field.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Present `(field, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamField, f32)> + '_ {
        ParamField::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
    }

    /// Build a patch from host-side `name → value` pairs.
    ///
    /// Unknown names are ignored.
    pub fn from_named<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut patch = Self::new();
        for (name, value) in pairs {
            match ParamField::from_name(name) {
                Some(field) => patch.set(field, value),
                None => tracing::debug!("ignoring unknown parameter '{}'", name),
            }
        }
        patch
    }

    /// Parse a flat JSON object of numbers, e.g. `{"exposure": 0.5}`.
    ///
    /// Members that are not numbers or not known parameter names are skipped.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut patch = Self::new();
        for (name, value) in &object {
            let Some(field) = ParamField::from_name(name) else {
                tracing::debug!("ignoring unknown parameter '{}'", name);
                continue;
            };
            match value.as_f64() {
                Some(number) => patch.set(field, narrow_json_number(number)),
                None => tracing::debug!("ignoring non-numeric value for '{}'", name),
            }
        }
        Ok(patch)
    }
}

/// JSON numbers are f64. Finite values outside f32 range saturate so they
/// still clamp to the field's limit; NaN and infinities stay non-finite.
fn narrow_json_number(number: f64) -> f32 {
    if number.is_finite() {
        number.clamp(f32::MIN as f64, f32::MAX as f64) as f32
    } else {
        number as f32
    }
}

impl FromIterator<(ParamField, f32)> for ParamPatch {
    fn from_iter<T: IntoIterator<Item = (ParamField, f32)>>(iter: T) -> Self {
        let mut patch = Self::new();
        for (field, value) in iter {
            patch.set(field, value);
        }
        patch
    }
}

impl From<ParameterVector> for ParamPatch {
    /// A patch that sets every field.
    fn from(vector: ParameterVector) -> Self {
        vector.iter().collect()
    }
}

/// Compact set of fields, one bit per [`ParamField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSet(u16);

impl FieldSet {
    pub fn insert(&mut self, field: ParamField) {
        self.0 |= 1 << field.index();
    }

    pub fn contains(&self, field: ParamField) -> bool {
        self.0 & (1 << field.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ParamField> + '_ {
        ParamField::ALL
            .into_iter()
            .filter(|field| self.contains(*field))
    }
}

/// Outcome of [`ParameterVector::apply_patch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchReport {
    /// Fields written (possibly after clamping).
    pub applied: FieldSet,
    /// Fields whose incoming value was outside the declared range.
    pub clamped: FieldSet,
    /// Fields left unchanged because the incoming value was not finite.
    pub rejected: FieldSet,
}
