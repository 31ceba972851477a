use core::fmt;

use boardtrace_base::math::FreeCoordinate;
use boardtrace_base::time::Duration;

use crate::BlockOrder;

/// Options controlling the quality and cost of a rendering.
///
/// Changing options restarts the image; see
/// [`Raytracer::set_options()`](crate::Raytracer::set_options).
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct RenderOptions {
    /// Whether lights are blocked by objects between them and the surface.
    pub shadows: bool,

    /// Whether to trace several jittered samples per pixel.
    pub antialiasing: bool,

    /// Whether reflective materials show their surroundings.
    pub reflections: bool,

    /// Whether transparent materials show what is behind them.
    pub refractions: bool,

    /// Whether to apply ambient occlusion and a blur once every block is traced.
    pub post_processing: bool,

    /// Number of shadow rays per light for soft shadows.
    pub shadow_samples: u32,

    /// Random displacement of soft shadow rays, as a fraction of the ray direction.
    pub shadow_spread: FreeCoordinate,

    /// Number of rays cast from a reflective surface.
    pub reflection_samples: u32,

    /// Random displacement of all but the first reflection ray.
    pub reflection_spread: FreeCoordinate,

    /// Maximum number of successive reflections.
    pub reflection_depth: u32,

    /// Number of rays cast through a transparent surface.
    pub refraction_samples: u32,

    /// Random displacement of all but the first refraction ray.
    pub refraction_spread: FreeCoordinate,

    /// Maximum number of successive refractions.
    pub refraction_depth: u32,

    /// Recursion depth beyond which a surface gets only its ambient and emissive light.
    pub max_recursion: u32,

    /// Thickness of the thinnest layers of the board, used to move ray origins off of
    /// surfaces.
    pub non_copper_thickness: FreeCoordinate,

    /// Order in which blocks are traced.
    pub block_order: BlockOrder,

    /// How long one call to [`Raytracer::render()`](crate::Raytracer::render) may spend
    /// tracing, or [`None`] to choose automatically from the number of blocks.
    pub timeslice: Option<Duration>,
}

impl RenderOptions {
    /// Constrain fields to valid/practical values.
    #[must_use]
    pub fn repair(mut self) -> Self {
        self.shadow_samples = self.shadow_samples.clamp(1, 64);
        self.reflection_samples = self.reflection_samples.clamp(1, 64);
        self.refraction_samples = self.refraction_samples.clamp(1, 64);
        self.reflection_depth = self.reflection_depth.min(64);
        self.refraction_depth = self.refraction_depth.min(64);
        self.max_recursion = self.max_recursion.min(64);
        self.shadow_spread = clamp_or_zero(self.shadow_spread, 1.0);
        self.reflection_spread = clamp_or_zero(self.reflection_spread, 1.0);
        self.refraction_spread = clamp_or_zero(self.refraction_spread, 1.0);
        self.non_copper_thickness = clamp_or_zero(self.non_copper_thickness, 10.0);
        self
    }
}

fn clamp_or_zero(value: FreeCoordinate, max: FreeCoordinate) -> FreeCoordinate {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            shadows: true,
            antialiasing: true,
            reflections: true,
            refractions: true,
            post_processing: true,
            shadow_samples: 3,
            shadow_spread: 0.05,
            reflection_samples: 3,
            reflection_spread: 0.025,
            reflection_depth: 3,
            refraction_samples: 4,
            refraction_spread: 0.025,
            refraction_depth: 2,
            max_recursion: 7,
            non_copper_thickness: 0.02,
            block_order: BlockOrder::CenterOut,
            timeslice: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            shadows,
            antialiasing,
            reflections,
            refractions,
            post_processing,
            shadow_samples,
            shadow_spread,
            reflection_samples,
            reflection_spread,
            reflection_depth,
            refraction_samples,
            refraction_spread,
            refraction_depth,
            max_recursion,
            non_copper_thickness,
            block_order,
            timeslice,
        } = self;
        f.debug_struct("RenderOptions")
            .field("shadows", shadows)
            .field("antialiasing", antialiasing)
            .field("reflections", reflections)
            .field("refractions", refractions)
            .field("post_processing", post_processing)
            .field("shadow_samples", shadow_samples)
            .field("shadow_spread", shadow_spread)
            .field("reflection_samples", reflection_samples)
            .field("reflection_spread", reflection_spread)
            .field("reflection_depth", reflection_depth)
            .field("refraction_samples", refraction_samples)
            .field("refraction_spread", refraction_spread)
            .field("refraction_depth", refraction_depth)
            .field("max_recursion", max_recursion)
            .field("non_copper_thickness", non_copper_thickness)
            .field("block_order", block_order)
            .field("timeslice", timeslice)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn debug() {
        let options = RenderOptions::default();
        assert_eq!(
            format!("{options:#?}"),
            indoc::indoc! {
                r"RenderOptions {
                    shadows: true,
                    antialiasing: true,
                    reflections: true,
                    refractions: true,
                    post_processing: true,
                    shadow_samples: 3,
                    shadow_spread: 0.05,
                    reflection_samples: 3,
                    reflection_spread: 0.025,
                    reflection_depth: 3,
                    refraction_samples: 4,
                    refraction_spread: 0.025,
                    refraction_depth: 2,
                    max_recursion: 7,
                    non_copper_thickness: 0.02,
                    block_order: CenterOut,
                    timeslice: None,
                }"
            }
        );
    }

    #[test]
    fn default_is_clean() {
        assert_eq!(RenderOptions::default(), RenderOptions::default().repair());
    }

    #[test]
    fn repair_clamps() {
        let mut options = RenderOptions::default();
        options.shadow_samples = 0;
        options.max_recursion = 1000;
        options.shadow_spread = f32::NAN;
        options.non_copper_thickness = -1.0;
        let repaired = options.repair();
        assert_eq!(repaired.shadow_samples, 1);
        assert_eq!(repaired.max_recursion, 64);
        assert_eq!(repaired.shadow_spread, 0.0);
        assert_eq!(repaired.non_copper_thickness, 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_partial() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"antialiasing": false, "block_order": "Morton"}"#).unwrap();
        let mut expected = RenderOptions::default();
        expected.antialiasing = false;
        expected.block_order = BlockOrder::Morton;
        assert_eq!(options, expected);
        let round_trip: RenderOptions =
            serde_json::from_str(&serde_json::to_string(&options).unwrap()).unwrap();
        assert_eq!(round_trip, options);
    }
}
