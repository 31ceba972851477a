use core::fmt;

use boardtrace_base::math::{FreeVector, Rgb};

/// Index of a [`Material`] within a [`Scene`](crate::Scene), as returned by
/// [`SceneBuilder::add_material()`](crate::SceneBuilder::add_material).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MaterialId(pub(crate) u16);

impl MaterialId {
    /// Position of the material in the scene's material list.
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Debug for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterialId({})", self.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// Surface properties shared by many scene objects, evaluated with the Blinn-Phong model.
///
/// The diffuse color is not part of the material; it belongs to each
/// [`SceneObject`](crate::SceneObject), since boards reuse one material (for example
/// “copper” or “solder mask”) with many colors.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct Material {
    /// Light reflected regardless of the lights in the scene.
    pub ambient: Rgb,

    /// Light emitted by the surface itself.
    pub emissive: Rgb,

    /// Color of specular highlights.
    pub specular: Rgb,

    /// Blinn-Phong exponent; larger values give smaller, sharper highlights.
    pub shininess: f32,

    /// Fraction of light contributed by mirror reflection, in `[0, 1]`.
    pub reflection: f32,

    /// Fraction of light transmitted through the surface, in `[0, 1]`.
    pub transparency: f32,

    /// How strongly light is absorbed per unit distance inside a transparent object.
    pub absorbance: f32,

    /// Whether objects with this material block light from reaching other surfaces.
    pub cast_shadows: bool,
}

impl Material {
    /// A matte material with a little ambient light and no other effects.
    pub const MATTE: Self = Self {
        ambient: Rgb::new(0.1, 0.1, 0.1),
        emissive: Rgb::ZERO,
        specular: Rgb::ZERO,
        shininess: 1.0,
        reflection: 0.0,
        transparency: 0.0,
        absorbance: 1.0,
        cast_shadows: true,
    };

    /// Computes the light reflected toward `-ray_direction` from one light, for a surface
    /// with unit `normal` and `diffuse` color.
    ///
    /// `direction_to_light` must be unit length. `shadow` is the fraction of the light
    /// which is not blocked, in `[0, 1]`.
    pub fn shade(
        &self,
        ray_direction: FreeVector,
        normal: FreeVector,
        diffuse: Rgb,
        direction_to_light: FreeVector,
        light_color: Rgb,
        shadow: f32,
    ) -> Rgb {
        let n_dot_l = normal.dot(direction_to_light);
        if n_dot_l <= f32::EPSILON || shadow <= f32::EPSILON {
            return Rgb::ZERO;
        }
        let halfway = (direction_to_light - ray_direction).normalize();
        let n_dot_h = normal.dot(halfway).max(0.0);
        let specular_intensity = n_dot_h.powf(self.shininess);

        (diffuse * n_dot_l + self.specular * specular_intensity) * light_color * shadow
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::MATTE
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            ambient,
            emissive,
            specular,
            shininess,
            reflection,
            transparency,
            absorbance,
            cast_shadows,
        } = self;
        f.debug_struct("Material")
            .field("ambient", ambient)
            .field("emissive", emissive)
            .field("specular", specular)
            .field("shininess", shininess)
            .field("reflection", reflection)
            .field("transparency", transparency)
            .field("absorbance", absorbance)
            .field("cast_shadows", cast_shadows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardtrace_base::euclid::vec3;

    #[test]
    fn light_from_behind_contributes_nothing() {
        let material = Material::MATTE;
        let color = material.shade(
            vec3(0., 0., -1.),
            vec3(0., 0., 1.),
            Rgb::ONE,
            vec3(0., 0., -1.),
            Rgb::ONE,
            1.0,
        );
        assert_eq!(color, Rgb::ZERO);
    }

    #[test]
    fn diffuse_follows_cosine() {
        let material = Material::MATTE;
        let light = vec3(1.0f32, 0., 1.).normalize();
        let color = material.shade(
            vec3(0., 0., -1.),
            vec3(0., 0., 1.),
            Rgb::new(1.0, 0.5, 0.0),
            light,
            Rgb::ONE,
            1.0,
        );
        let cos = core::f32::consts::FRAC_1_SQRT_2;
        assert!((color.red() - cos).abs() < 1e-5, "{color:?}");
        assert!((color.green() - 0.5 * cos).abs() < 1e-5, "{color:?}");
        assert_eq!(color.blue(), 0.0);
    }

    #[test]
    fn specular_highlight_peaks_at_mirror_direction() {
        let mut material = Material::MATTE;
        material.specular = Rgb::ONE;
        material.shininess = 32.0;
        let normal = vec3(0., 0., 1.);
        let at = |light: FreeVector| {
            material
                .shade(vec3(0., 0., -1.), normal, Rgb::ZERO, light.normalize(), Rgb::ONE, 1.0)
                .red()
        };
        assert!(at(vec3(0., 0., 1.)) > at(vec3(0.5, 0., 1.)));
        assert!((at(vec3(0., 0., 1.)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shadow_scales_result() {
        let material = Material::MATTE;
        let shade = |shadow| {
            material.shade(
                vec3(0., 0., -1.),
                vec3(0., 0., 1.),
                Rgb::ONE,
                vec3(0., 0., 1.),
                Rgb::ONE,
                shadow,
            )
        };
        assert_eq!(shade(0.0), Rgb::ZERO);
        assert!((shade(0.5).red() - 0.5).abs() < 1e-6);
    }
}
