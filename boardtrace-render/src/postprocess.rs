//! Screen-space post-processing: ambient occlusion computed from a G-buffer of traced
//! surfaces, blurred and multiplied into the final colors.

use core::fmt;

use boardtrace_base::math::{FreeCoordinate, FreePoint, FreeVector, Rgb};
use imgref::{ImgRef, ImgVec};

/// Surface information recorded for one pixel while tracing, for post-processing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct GPixel {
    /// Color computed by tracing, before post-processing.
    pub color: Rgb,
    /// Unit normal of the surface seen through the pixel.
    pub normal: FreeVector,
    /// Point on that surface.
    pub position: FreePoint,
    /// Distance from the camera to [`GPixel::position`], or infinity if the pixel shows
    /// the background.
    pub depth: FreeCoordinate,
    /// Fraction of light reaching the surface, as [`HitInfo::shadow_factor`].
    ///
    /// [`HitInfo::shadow_factor`]: crate::HitInfo::shadow_factor
    pub shadow: f32,
}

impl GPixel {
    /// A pixel showing only the background.
    pub const fn background(color: Rgb) -> Self {
        Self {
            color,
            normal: FreeVector::new(0., 0., 0.),
            position: FreePoint::new(0., 0., 0.),
            depth: FreeCoordinate::INFINITY,
            shadow: 1.0,
        }
    }

    /// A pixel showing a surface.
    pub fn surface(
        color: Rgb,
        normal: FreeVector,
        position: FreePoint,
        depth: FreeCoordinate,
        shadow: f32,
    ) -> Self {
        Self {
            color,
            normal,
            position,
            depth,
            shadow,
        }
    }

    /// Whether no surface was hit through this pixel.
    #[inline]
    pub fn is_background(&self) -> bool {
        self.depth == FreeCoordinate::INFINITY
    }
}

impl Default for GPixel {
    fn default() -> Self {
        Self::background(Rgb::ZERO)
    }
}

/// Per-pixel surface information for a whole render buffer.
pub type GBuffer = ImgVec<GPixel>;

// -------------------------------------------------------------------------------------------------

/// Computes a screen-space shading term for each pixel of a [`GBuffer`].
///
/// The term is blurred and then combined with the traced color by
/// [`PostShader::apply_shade_color()`].
pub trait PostShader: fmt::Debug + Send + Sync {
    /// Returns the shade of the pixel at column `x` and row `y`; zero means unshaded.
    fn shade(&self, gbuffer: ImgRef<'_, GPixel>, x: usize, y: usize) -> Rgb;

    /// Combines a traced color with its blurred shade.
    fn apply_shade_color(&self, input: Rgb, shade: Rgb) -> Rgb {
        input * (Rgb::ONE - shade)
    }
}

/// A [`PostShader`] which never shades anything, so post-processing leaves the traced
/// colors unchanged.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[expect(clippy::exhaustive_structs)]
pub struct IdentityShader;

impl PostShader for IdentityShader {
    fn shade(&self, _: ImgRef<'_, GPixel>, _: usize, _: usize) -> Rgb {
        Rgb::ZERO
    }
}

/// Screen-space ambient occlusion, darkened further where the surface is in shadow.
#[derive(Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct Ssao {
    /// Distance in pixels to the neighbors that are sampled.
    pub radius: usize,
    /// Cosine below which a neighbor does not occlude.
    pub bias: f32,
    /// How quickly occlusion decreases with the distance to the occluder.
    pub falloff: f32,
    /// Shade added for a fully shadowed surface.
    pub shadow_weight: f32,
}

/// Directions of the sampled neighbors.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

impl Default for Ssao {
    fn default() -> Self {
        Self {
            radius: 3,
            bias: 0.1,
            falloff: 3.0,
            shadow_weight: 0.6,
        }
    }
}

impl PostShader for Ssao {
    fn shade(&self, gbuffer: ImgRef<'_, GPixel>, x: usize, y: usize) -> Rgb {
        let center = gbuffer[(x, y)];
        if center.is_background() {
            return Rgb::ZERO;
        }

        let radius = self.radius as isize;
        let mut occlusion = 0.0;
        for (dx, dy) in NEIGHBORS {
            let (Some(nx), Some(ny)) = (
                x.checked_add_signed(dx * radius),
                y.checked_add_signed(dy * radius),
            ) else {
                continue;
            };
            if nx >= gbuffer.width() || ny >= gbuffer.height() {
                continue;
            }
            let neighbor = gbuffer[(nx, ny)];
            if neighbor.is_background() {
                continue;
            }
            let to_neighbor = neighbor.position - center.position;
            let distance = to_neighbor.length();
            if distance <= FreeCoordinate::EPSILON {
                continue;
            }
            let cosine = center.normal.dot(to_neighbor / distance);
            occlusion += (cosine - self.bias).max(0.0) / (1.0 + self.falloff * distance);
        }
        occlusion /= NEIGHBORS.len() as f32;

        // Shadowed colors were already attenuated when traced. This second darkening is
        // intentional: it deepens shadows and lets the blur soften their edges.
        Rgb::from_luminance(
            (occlusion + (1.0 - center.shadow) * self.shadow_weight).clamp(0.0, 1.0),
        )
    }
}

impl fmt::Debug for Ssao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            radius,
            bias,
            falloff,
            shadow_weight,
        } = self;
        f.debug_struct("Ssao")
            .field("radius", radius)
            .field("bias", bias)
            .field("falloff", falloff)
            .field("shadow_weight", shadow_weight)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Weights of the blur applied to the shade buffer.
const BLUR_KERNEL: [[u16; 5]; 5] = [
    [1, 4, 7, 4, 1],
    [4, 16, 26, 16, 4],
    [7, 26, 41, 26, 7],
    [4, 16, 26, 16, 4],
    [1, 4, 7, 4, 1],
];

/// Weighted mean of the 5×5 neighborhood of `(x, y)` in `shade`, ignoring taps outside
/// the image.
pub fn blur(shade: ImgRef<'_, Rgb>, x: usize, y: usize) -> Rgb {
    let mut sum = Rgb::ZERO;
    let mut total_weight = 0u32;
    for (ky, kernel_row) in BLUR_KERNEL.iter().enumerate() {
        let Some(sy) = (y + ky).checked_sub(2).filter(|&sy| sy < shade.height()) else {
            continue;
        };
        for (kx, &weight) in kernel_row.iter().enumerate() {
            let Some(sx) = (x + kx).checked_sub(2).filter(|&sx| sx < shade.width()) else {
                continue;
            };
            sum += shade[(sx, sy)] * f32::from(weight);
            total_weight += u32::from(weight);
        }
    }
    if total_weight == 0 {
        Rgb::ZERO
    } else {
        sum / total_weight as f32
    }
}

/// Fills `shade` with `shader`’s value for each pixel of `gbuffer`.
pub(crate) fn shade_pass(
    shader: &dyn PostShader,
    gbuffer: ImgRef<'_, GPixel>,
    shade: &mut ImgVec<Rgb>,
) {
    let width = shade.width();
    for_each_row(shade.buf_mut(), width, |y, row| {
        for (x, pixel) in row.iter_mut().enumerate() {
            *pixel = shader.shade(gbuffer, x, y);
        }
    });
}

/// Blurs `shade`, combines it with the traced colors of `gbuffer`, and writes the
/// final sRGB pixels to `output`, which has the same dimensions.
pub(crate) fn blur_and_finish(
    shader: &dyn PostShader,
    gbuffer: ImgRef<'_, GPixel>,
    shade: ImgRef<'_, Rgb>,
    output: &mut [[u8; 4]],
) {
    let width = gbuffer.width();
    for_each_row(output, width, |y, row| {
        for (x, pixel) in row.iter_mut().enumerate() {
            let color = shader.apply_shade_color(gbuffer[(x, y)].color, blur(shade, x, y));
            *pixel = color.clamp01().with_alpha_one().to_srgb8();
        }
    });
}

/// Calls `f` with the index and contents of each row of `width` elements of `data`,
/// in parallel if possible.
#[cfg(feature = "auto-threads")]
pub(crate) fn for_each_row<T, F>(data: &mut [T], width: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    use rayon::iter::{IndexedParallelIterator as _, ParallelIterator as _};
    use rayon::slice::ParallelSliceMut as _;

    // A zero width has no rows, but chunks must be nonempty.
    data.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| f(y, row));
}

/// Calls `f` with the index and contents of each row of `width` elements of `data`,
/// in parallel if possible.
#[cfg(not(feature = "auto-threads"))]
pub(crate) fn for_each_row<T, F>(data: &mut [T], width: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    data.chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| f(y, row));
}
