use std::fmt::{Display, Formatter};

/// Intensity of each DMG shade, 0 = lightest and 3 = darkest.
pub const INTENSITY_LEVELS: [f32; 4] = [1.0, 0.66, 0.33, 0.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    #[must_use]
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    #[inline]
    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[must_use]
    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Linear interpolation towards `other`, channel by channel including alpha.
    ///
    /// `factor` is clamped to `[0, 1]`; results are truncated towards zero.
    #[must_use]
    pub fn lerp(self, other: Self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * factor) as u8;

        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Pack as the GPU's RGBA8 texel word (red in the most significant byte).
    #[must_use]
    #[inline]
    pub const fn to_rgba8_word(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    #[must_use]
    #[inline]
    pub const fn from_rgba8_word(word: u32) -> Self {
        let [r, g, b, a] = word.to_be_bytes();
        Self { r, g, b, a }
    }
}

impl Default for Color {
    #[inline]
    fn default() -> Self {
        Self::BLACK
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[inline]
#[must_use]
pub fn shade_intensity(shade: u8) -> f32 {
    INTENSITY_LEVELS[(shade & 3) as usize]
}

/// Untinted shade, used when a tile has no metadata.
#[inline]
#[must_use]
pub fn grayscale(intensity: f32) -> Color {
    let level = (intensity * 255.0) as u8;
    Color::rgb(level, level, level)
}

/// Color of a pixel with the given shade intensity, tinted towards `tint` if the tile has one.
#[inline]
#[must_use]
pub fn shade_color(tint: Option<Color>, intensity: f32) -> Color {
    match tint {
        Some(tint) => tint.lerp(Color::WHITE, intensity),
        None => grayscale(intensity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_levels() {
        let levels: Vec<_> = (0..4).map(|shade| grayscale(shade_intensity(shade)).r).collect();
        assert_eq!(levels, vec![255, 168, 84, 0]);
    }

    #[test]
    fn tint_blends_towards_white() {
        let red = Color::rgb(255, 0, 0);
        assert_eq!(shade_color(Some(red), 0.0), red);
        assert_eq!(shade_color(Some(red), 1.0), Color::WHITE);
        assert_eq!(shade_color(Some(red), 0.66), Color::rgb(255, 168, 168));
    }

    #[test]
    fn tint_alpha_is_interpolated() {
        let clear_blue = Color::rgba(0, 0, 255, 0);
        assert!(shade_color(Some(clear_blue), 0.0).is_transparent());
        assert_eq!(shade_color(Some(clear_blue), 1.0).a, 255);
    }

    #[test]
    fn rgba8_word_layout() {
        let color = Color::rgba(0x12, 0x34, 0x56, 0x78);
        assert_eq!(color.to_rgba8_word(), 0x1234_5678);
        assert_eq!(Color::from_rgba8_word(0x1234_5678), color);
    }
}
