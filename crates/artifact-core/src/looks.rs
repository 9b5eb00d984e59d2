//! Named looks: aesthetic words mapped to partial parameter updates.

use std::fmt;
use std::str::FromStr;

use crate::params::{ParamField, ParamPatch};

/// A preset aesthetic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Look {
    Bright,
    Soft,
    Vivid,
    Muted,
    Warm,
    Cool,
    Crisp,
    Hazy,
}

impl Look {
    pub const ALL: [Look; 8] = [
        Look::Bright,
        Look::Soft,
        Look::Vivid,
        Look::Muted,
        Look::Warm,
        Look::Cool,
        Look::Crisp,
        Look::Hazy,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bright => "bright",
            Self::Soft => "soft",
            Self::Vivid => "vivid",
            Self::Muted => "muted",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Crisp => "crisp",
            Self::Hazy => "hazy",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|look| look.name().eq_ignore_ascii_case(name))
    }

    /// The partial update this look applies.
    ///
    /// Values are not pre-clamped; they go through the normal merge.
    pub fn patch(self) -> ParamPatch {
        use ParamField::*;
        let entries: &[(ParamField, f32)] = match self {
            Self::Bright => &[(Exposure, 0.3), (Brightness, 0.2), (Highlights, 0.1)],
            Self::Soft => &[(Exposure, -0.1), (Contrast, -0.2), (Highlights, -0.3)],
            Self::Vivid => &[(Saturation, 0.3), (Vibrance, 0.2)],
            Self::Muted => &[(Saturation, -0.2), (Vibrance, -0.1)],
            Self::Warm => &[(Warmth, 0.3), (Tint, 0.1)],
            Self::Cool => &[(Warmth, -0.3), (Tint, -0.1)],
            Self::Crisp => &[(Sharpness, 0.5), (Definition, 0.3)],
            Self::Hazy => &[(Sharpness, -0.3), (Noise, 0.2)],
        };
        entries.iter().copied().collect()
    }
}

impl fmt::Display for Look {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown look name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown look '{0}'")]
pub struct UnknownLook(pub String);

impl FromStr for Look {
    type Err = UnknownLook;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownLook(s.to_string()))
    }
}
