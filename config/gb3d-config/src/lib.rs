//! User-facing options for the depth-layered renderer

use gb3d_proc_macros::{EnumAll, EnumDisplay};

/// How sprites are selected on each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumDisplay, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SpriteAccuracy {
    // Sort by X coordinate and apply the 10-sprites-per-line limit
    #[default]
    Accurate,
    // Draw every sprite on the line in reverse OAM order
    Fast,
}

impl SpriteAccuracy {
    #[inline]
    #[must_use]
    pub fn sprite_limit(self) -> Option<usize> {
        match self {
            Self::Accurate => Some(10),
            Self::Fast => None,
        }
    }
}

/// Where depth layers are stored and how they reach the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumDisplay, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum DisplayVariant {
    // Linear RGBA framebuffers, flattened by the compositor
    #[default]
    Framebuffer,
    // Swizzled GPU textures with rotating backups, one plane per layer
    Texture,
}

impl DisplayVariant {
    /// Number of depth layers each variant is usually configured with.
    #[inline]
    #[must_use]
    pub fn default_z_layers(self) -> usize {
        match self {
            Self::Framebuffer => 50,
            Self::Texture => 15,
        }
    }
}
