use boardtrace_base::math::{FreeCoordinate, FreePoint, FreeVector, Rgb};

/// A light source illuminating a [`Scene`](crate::Scene).
///
/// In addition to these, the renderer always adds a directional headlight shining from
/// the camera, whose color is [`Scene::headlight()`](crate::Scene::headlight).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Light {
    /// Light radiating equally in all directions from a point.
    #[non_exhaustive]
    Point {
        /// Location of the light.
        position: FreePoint,
        /// Color and intensity.
        color: Rgb,
        /// Whether objects block this light.
        cast_shadows: bool,
    },

    /// Light arriving from infinitely far away along parallel rays.
    #[non_exhaustive]
    Directional {
        /// Unit vector pointing from the scene toward the light.
        direction_to_light: FreeVector,
        /// Color and intensity.
        color: Rgb,
        /// Whether objects block this light.
        cast_shadows: bool,
    },
}

/// Where a [`Light`] is and how bright it is, as seen from one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LightSample {
    /// Unit vector from the point toward the light.
    pub direction: FreeVector,
    pub color: Rgb,
    /// Distance to the light, or infinity for directional lights.
    pub distance: FreeCoordinate,
}

impl Light {
    /// A shadow-casting point light.
    pub fn point(position: impl Into<FreePoint>, color: Rgb) -> Self {
        Self::Point {
            position: position.into(),
            color,
            cast_shadows: true,
        }
    }

    /// A shadow-casting directional light shining from `direction_to_light`,
    /// which need not be normalized.
    pub fn directional(direction_to_light: impl Into<FreeVector>, color: Rgb) -> Self {
        Self::Directional {
            direction_to_light: direction_to_light.into().normalize(),
            color,
            cast_shadows: true,
        }
    }

    /// Returns this light with shadow casting set to `value`.
    #[must_use]
    pub fn with_cast_shadows(mut self, value: bool) -> Self {
        match &mut self {
            Self::Point { cast_shadows, .. } | Self::Directional { cast_shadows, .. } => {
                *cast_shadows = value;
            }
        }
        self
    }

    /// Whether objects block this light.
    pub fn casts_shadows(&self) -> bool {
        match *self {
            Self::Point { cast_shadows, .. } | Self::Directional { cast_shadows, .. } => {
                cast_shadows
            }
        }
    }

    /// Color and intensity.
    pub fn color(&self) -> Rgb {
        match *self {
            Self::Point { color, .. } | Self::Directional { color, .. } => color,
        }
    }

    pub(crate) fn sample_at(&self, point: FreePoint) -> LightSample {
        match *self {
            Self::Point {
                position, color, ..
            } => {
                let to_light = position - point;
                let distance = to_light.length();
                let direction = if distance > 0.0 {
                    to_light / distance
                } else {
                    FreeVector::zero()
                };
                LightSample {
                    direction,
                    color,
                    distance,
                }
            }
            Self::Directional {
                direction_to_light,
                color,
                ..
            } => LightSample {
                direction: direction_to_light,
                color,
                distance: FreeCoordinate::INFINITY,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardtrace_base::euclid::{point3, vec3};

    #[test]
    fn point_light_sample() {
        let light = Light::point(point3(0., 0., 10.), Rgb::ONE);
        let sample = light.sample_at(point3(0., 0., 4.));
        assert_eq!(sample.direction, vec3(0., 0., 1.));
        assert_eq!(sample.distance, 6.0);
    }

    #[test]
    fn directional_light_is_normalized_and_infinitely_far() {
        let light = Light::directional(vec3(0., 3., 4.), Rgb::ONE);
        let sample = light.sample_at(point3(100., -7., 2.));
        assert!((sample.direction - vec3(0., 0.6, 0.8)).length() < 1e-6);
        assert_eq!(sample.distance, f32::INFINITY);
    }

    #[test]
    fn shadow_casting_toggle() {
        let light = Light::point(point3(0., 0., 0.), Rgb::ONE);
        assert!(light.casts_shadows());
        assert!(!light.with_cast_shadows(false).casts_shadows());
    }
}
