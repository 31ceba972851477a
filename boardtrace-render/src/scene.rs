use core::fmt;

use boardtrace_base::math::Rgb;

use crate::accel::Bvh;
use crate::object::Object3;
use crate::{Light, Material, MaterialId, ObjectId, RenderError};

// -------------------------------------------------------------------------------------------------

/// One piece of geometry in a [`Scene`], with its appearance.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct SceneObject {
    /// The geometry.
    pub shape: Object3,
    /// Shared surface properties.
    pub material: MaterialId,
    /// Base color of the surface.
    pub diffuse: Rgb,
    /// Copied from the material so that shadow rays need not look it up.
    pub casts_shadows: bool,
}

/// Vertical color gradient drawn where rays hit nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[expect(clippy::exhaustive_structs)]
pub struct Background {
    /// Color at the top row of the window.
    pub top: Rgb,
    /// Color at the bottom row of the window.
    pub bottom: Rgb,
}

impl Background {
    /// A background of one color.
    pub const fn uniform(color: Rgb) -> Self {
        Self {
            top: color,
            bottom: color,
        }
    }

    /// Color of window row `y` of `height`.
    #[inline]
    pub fn at_row(&self, y: f32, height: u32) -> Rgb {
        let t = if height > 1 {
            (y / (height - 1) as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.top.lerp(self.bottom, t)
    }
}

impl Default for Background {
    fn default() -> Self {
        Self {
            top: Rgb::new(0.8, 0.8, 0.9),
            bottom: Rgb::new(0.4, 0.4, 0.5),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Everything the raytracer needs to know about a board: geometry indexed by a [`Bvh`],
/// materials, lights, and background.
///
/// A scene is immutable once built. To change the board, build a new scene and pass it
/// to [`Raytracer::reload()`](crate::Raytracer::reload).
pub struct Scene {
    accelerator: Bvh,
    materials: Vec<Material>,
    lights: Vec<Light>,
    headlight: Rgb,
    background: Background,
}

impl Scene {
    /// Starts building a scene.
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }

    /// The accelerator, which owns the objects.
    pub fn accelerator(&self) -> &Bvh {
        &self.accelerator
    }

    /// Returns the object with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID did not come from this scene.
    pub fn object(&self, id: ObjectId) -> &SceneObject {
        crate::Accelerator::object(&self.accelerator, id)
    }

    /// Returns the material with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID did not come from this scene.
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// Lights other than the headlight.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Color of the directional light that shines from the camera.
    pub fn headlight(&self) -> Rgb {
        self.headlight
    }

    /// The background.
    pub fn background(&self) -> Background {
        self.background
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            accelerator,
            materials,
            lights,
            headlight,
            background,
        } = self;
        f.debug_struct("Scene")
            .field("accelerator", accelerator)
            .field("materials", &materials.len())
            .field("lights", lights)
            .field("headlight", headlight)
            .field("background", background)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Collects the contents of a [`Scene`].
#[derive(Clone, Debug)]
#[must_use]
pub struct SceneBuilder {
    objects: Vec<SceneObject>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    headlight: Rgb,
    background: Background,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            materials: Vec::new(),
            lights: Vec::new(),
            headlight: Rgb::from_luminance(0.5),
            background: Background::default(),
        }
    }
}

impl SceneBuilder {
    /// Adds a material and returns its ID.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u16);
        self.materials.push(material);
        id
    }

    /// Adds an object and returns its ID.
    ///
    /// `material` is checked when the scene is [built](Self::build).
    pub fn add_object(
        &mut self,
        shape: impl Into<Object3>,
        material: MaterialId,
        diffuse: Rgb,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(SceneObject {
            shape: shape.into(),
            material,
            diffuse,
            casts_shadows: true,
        });
        id
    }

    /// Adds a light.
    pub fn add_light(&mut self, light: Light) -> &mut Self {
        self.lights.push(light);
        self
    }

    /// Sets the color of the light which shines from the camera.
    pub fn headlight(&mut self, color: Rgb) -> &mut Self {
        self.headlight = color;
        self
    }

    /// Sets the background.
    pub fn background(&mut self, background: Background) -> &mut Self {
        self.background = background;
        self
    }

    /// Validates the contents and builds the accelerator.
    ///
    /// Returns an error if an object refers to a material that was never added.
    pub fn build(self) -> Result<Scene, RenderError> {
        let Self {
            mut objects,
            materials,
            lights,
            headlight,
            background,
        } = self;
        for (index, object) in objects.iter_mut().enumerate() {
            let Some(material) = materials.get(object.material.index()) else {
                return Err(RenderError::MissingMaterial {
                    object: ObjectId(index as u32),
                    material: object.material,
                });
            };
            object.casts_shadows = material.cast_shadows;
        }
        log::trace!(
            "building scene of {} objects and {} materials",
            objects.len(),
            materials.len()
        );
        Ok(Scene {
            accelerator: Bvh::new(objects),
            materials,
            lights,
            headlight,
            background,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::LayerItem;
    use crate::shapes::FilledCircle;
    use boardtrace_base::euclid::point2;

    #[test]
    fn missing_material() {
        let mut builder = Scene::builder();
        let material = builder.add_material(Material::default());
        builder.add_object(
            LayerItem::new(FilledCircle::new(point2(0., 0.), 1.0), 0.0, 1.0),
            material,
            Rgb::ONE,
        );
        let bad = builder.add_object(
            LayerItem::new(FilledCircle::new(point2(5., 0.), 1.0), 0.0, 1.0),
            MaterialId(7),
            Rgb::ONE,
        );
        assert_eq!(
            builder.build().unwrap_err(),
            RenderError::MissingMaterial {
                object: bad,
                material: MaterialId(7)
            }
        );
    }

    #[test]
    fn shadow_casting_copied_from_material() {
        let mut builder = Scene::builder();
        let mut glass = Material::default();
        glass.cast_shadows = false;
        let glass = builder.add_material(glass);
        let id = builder.add_object(
            LayerItem::new(FilledCircle::new(point2(0., 0.), 1.0), 0.0, 1.0),
            glass,
            Rgb::ONE,
        );
        let scene = builder.build().unwrap();
        assert!(!scene.object(id).casts_shadows);
    }

    #[test]
    fn background_gradient() {
        let bg = Background {
            top: Rgb::ONE,
            bottom: Rgb::ZERO,
        };
        assert_eq!(bg.at_row(0.0, 11), Rgb::ONE);
        assert_eq!(bg.at_row(10.0, 11), Rgb::ZERO);
        assert!((bg.at_row(5.0, 11).red() - 0.5).abs() < 1e-6);
        assert_eq!(bg.at_row(3.0, 1), Rgb::ONE);
    }
}
