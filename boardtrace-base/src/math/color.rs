//! Color data types. This module is private but reexported by its parent.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Sub};

use euclid::{Vector3D, vec3};

/// A floating-point RGB color value.
///
/// * Color components are linear (gamma = 1), but use the same RGB primaries as sRGB
///   (Rec. 709).
/// * Components are nominally in the range 0 to 1. Intermediate results of shading
///   may go outside it; [`Rgb::clamp01`] is applied before anything is displayed.
#[derive(Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(Vector3D<f32, Intensity>);

/// A floating-point RGBA color value.
///
/// * Color components are linear (gamma = 1), with sRGB primaries.
/// * The alpha is not premultiplied.
#[derive(Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba {
    rgb: Rgb,
    alpha: f32,
}

/// Unit-of-measure type for vectors that contain color channels.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug, Eq, PartialEq)]
pub enum Intensity {}

impl Rgb {
    /// Black.
    pub const ZERO: Rgb = Rgb(vec3(0., 0., 0.));
    /// Nominal white.
    pub const ONE: Rgb = Rgb(vec3(1., 1., 1.));

    /// Constructs a color from components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self(vec3(r, g, b))
    }

    /// Constructs a shade of gray (components all equal).
    #[inline]
    pub const fn from_luminance(luminance: f32) -> Self {
        Self(vec3(luminance, luminance, luminance))
    }

    /// Adds an alpha component to produce an [`Rgba`] color.
    #[inline]
    pub const fn with_alpha(self, alpha: f32) -> Rgba {
        Rgba { rgb: self, alpha }
    }

    /// Adds an alpha component of `1.0` (fully opaque) to produce an [`Rgba`] color.
    #[inline]
    pub const fn with_alpha_one(self) -> Rgba {
        self.with_alpha(1.0)
    }

    /// Returns the red color component.
    #[inline]
    pub const fn red(self) -> f32 {
        self.0.x
    }
    /// Returns the green color component.
    #[inline]
    pub const fn green(self) -> f32 {
        self.0.y
    }
    /// Returns the blue color component.
    #[inline]
    pub const fn blue(self) -> f32 {
        self.0.z
    }

    /// Combines the red, green, and blue components to obtain a luminance ("grayscale")
    /// value. This will be equal to 1 if all components are 1.
    #[inline]
    pub fn luminance(self) -> f32 {
        self.red() * 0.212671 + self.green() * 0.715160 + self.blue() * 0.072169
    }

    /// Converts sRGB 8-bits-per-component color to the corresponding linear [`Rgb`] value.
    #[inline]
    pub fn from_srgb8(rgb: [u8; 3]) -> Self {
        Self::new(
            component_from_srgb8(rgb[0]),
            component_from_srgb8(rgb[1]),
            component_from_srgb8(rgb[2]),
        )
    }

    /// Clamps each component to the range 0 to 1.
    #[must_use]
    #[inline]
    pub fn clamp01(self) -> Self {
        Self(self.0.clamp(vec3(0., 0., 0.), vec3(1., 1., 1.)))
    }

    /// Linear interpolation; `t = 0` gives `self` and `t = 1` gives `other`.
    #[must_use]
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self(self.0.lerp(other.0, t))
    }

    /// Average of two colors.
    #[must_use]
    #[inline]
    pub fn mean2(a: Self, b: Self) -> Self {
        (a + b) * 0.5
    }

    /// Average of three colors.
    #[must_use]
    #[inline]
    pub fn mean3(a: Self, b: Self, c: Self) -> Self {
        (a + b + c) * (1.0 / 3.0)
    }
}

impl Rgba {
    /// Constructs a color from components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            rgb: Rgb::new(r, g, b),
            alpha: a,
        }
    }

    /// Converts this color lossily to sRGB 8-bits-per-component color.
    #[inline]
    pub fn to_srgb8(self) -> [u8; 4] {
        [
            component_to_srgb8(self.rgb.red()),
            component_to_srgb8(self.rgb.green()),
            component_to_srgb8(self.rgb.blue()),
            component_to_linear8(self.alpha),
        ]
    }

    /// Converts this color lossily to 8-bits-per-component color without applying the
    /// sRGB transfer function.
    ///
    /// Used for intermediate images which will be overwritten by a final
    /// [`to_srgb8()`](Self::to_srgb8) pass.
    #[inline]
    pub fn to_linear8(self) -> [u8; 4] {
        [
            component_to_linear8(self.rgb.red()),
            component_to_linear8(self.rgb.green()),
            component_to_linear8(self.rgb.blue()),
            component_to_linear8(self.alpha),
        ]
    }
}

impl Add<Rgb> for Rgb {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}
impl AddAssign<Rgb> for Rgb {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}
impl Sub<Rgb> for Rgb {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}
/// Multiplies two color values componentwise.
impl Mul<Rgb> for Rgb {
    type Output = Self;
    #[inline]
    fn mul(self, other: Rgb) -> Self {
        Self(self.0.component_mul(other.0))
    }
}
/// Multiplies this color value by a scalar.
impl Mul<f32> for Rgb {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self(self.0 * scalar)
    }
}
impl Div<f32> for Rgb {
    type Output = Self;
    #[inline]
    fn div(self, scalar: f32) -> Self {
        Self(self.0 / scalar)
    }
}
impl fmt::Debug for Rgb {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "Rgb({:?}, {:?}, {:?})", self.red(), self.green(), self.blue())
    }
}
impl fmt::Debug for Rgba {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "Rgba({:?}, {:?}, {:?}, {:?})",
            self.rgb.red(),
            self.rgb.green(),
            self.rgb.blue(),
            self.alpha
        )
    }
}

/// Apply the sRGB encoding function. Do not use this on alpha values.
#[inline]
fn component_to_srgb(c: f32) -> f32 {
    // Source: <https://en.wikipedia.org/w/index.php?title=SRGB&oldid=1002296118#The_forward_transformation_(CIE_XYZ_to_sRGB)> (version as of Feb 3, 2020)
    let c = c.max(0.0);
    if c <= 0.0031308 {
        c * (323. / 25.)
    } else {
        // `libm` rather than `f32::powf` so that results do not vary by platform.
        (211. * libm::powf(c, 5. / 12.) - 11.) / 200.
    }
}

#[inline]
fn component_to_srgb8(c: f32) -> u8 {
    // out of range values will be clamped by `as u8`
    (component_to_srgb(c) * 255.).round() as u8
}

#[inline]
fn component_to_linear8(c: f32) -> u8 {
    (c * 255.).round() as u8
}

/// Implements sRGB decoding using the standard arithmetic.
#[inline]
fn component_from_srgb8(c: u8) -> f32 {
    // Source: <https://en.wikipedia.org/w/index.php?title=SRGB&oldid=1002296118#The_reverse_transformation> (version as of Feb 3, 2020)
    let c = f32::from(c) / 255.0;
    if c <= 0.04045 {
        c * (25. / 323.)
    } else {
        libm::powf((200. * c + 11.) / 211., 12. / 5.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools as _;

    #[test]
    fn rgba_to_srgb8() {
        assert_eq!(
            Rgba::new(0.125, 0.25, 0.5, 0.75).to_srgb8(),
            [99, 137, 188, 191]
        );

        // Test saturation
        assert_eq!(
            Rgba::new(0.5, -0.0, 10.0, 1.0).to_srgb8(),
            [188, 0, 255, 255]
        );
        assert_eq!(Rgba::new(-3.0, 0.0, 0.0, 1.0).to_srgb8(), [0, 0, 0, 255]);
    }

    #[test]
    fn linear8_skips_transfer_function() {
        assert_eq!(
            Rgba::new(0.5, 0.0, 1.0, 1.0).to_linear8(),
            [128, 0, 255, 255]
        );
    }

    #[test]
    fn rgb_rgba_debug() {
        assert_eq!(
            format!("{:#?}", Rgb::new(0.1, 0.2, 0.3)),
            "Rgb(0.1, 0.2, 0.3)"
        );
        assert_eq!(
            format!("{:#?}", Rgba::new(0.1, 0.2, 0.3, 0.4)),
            "Rgba(0.1, 0.2, 0.3, 0.4)"
        );
    }

    /// Test that [`Rgb::from_srgb8`] agrees with [`Rgba::to_srgb8`].
    #[test]
    fn srgb_round_trip() {
        let srgb_figures = [
            0x00, 0x05, 0x10, 0x22, 0x33, 0x44, 0x55, 0x77, 0x7f, 0xDD, 0xFF,
        ];
        let bad = srgb_figures
            .iter()
            .cartesian_product(srgb_figures.iter())
            .map(|(&r, &g)| {
                let srgb = [r, g, 0, 255];
                (srgb, Rgb::from_srgb8([r, g, 0]).with_alpha_one().to_srgb8())
            })
            .filter(|(o, r)| o != r)
            .collect::<Vec<_>>();
        assert_eq!(bad, vec![]);
    }

    #[test]
    fn blending() {
        let a = Rgb::new(1.0, 0.0, 0.0);
        let b = Rgb::new(0.0, 1.0, 0.0);
        let c = Rgb::new(0.0, 0.0, 1.0);
        assert_eq!(Rgb::mean2(a, b), Rgb::new(0.5, 0.5, 0.0));
        let m3 = Rgb::mean3(a, b, c);
        assert!((m3.red() - 1.0 / 3.0).abs() < 1e-6);
        assert!((m3.luminance() - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.lerp(b, 0.25), Rgb::new(0.75, 0.25, 0.0));
    }

    #[test]
    fn clamp01() {
        assert_eq!(
            Rgb::new(-0.5, 0.5, 1.5).clamp01(),
            Rgb::new(0.0, 0.5, 1.0)
        );
    }
}
