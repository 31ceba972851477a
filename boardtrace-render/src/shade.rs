//! Computing the color of surfaces hit by rays: direct lighting with shadows, and
//! recursive reflection and refraction.

use core::iter;
use core::ops;

use boardtrace_base::math::{FreeCoordinate, Rgb, reflect, refract};
use boardtrace_base::raycast::Ray;
use boardtrace_base::rng::WorkerRng;

use crate::light::LightSample;
use crate::{
    Accelerator as _, Camera, HitInfo, Light, Material, RenderOptions, Scene, SceneObject,
};

/// Refractive index of air.
const AIR_INDEX: FreeCoordinate = 1.000_293;
/// Refractive index of glass, used for every transparent material.
const GLASS_INDEX: FreeCoordinate = 1.49;

/// Offsets of shading points from surfaces, as multiples of
/// [`RenderOptions::non_copper_thickness`].
const SURFACE_OFFSET: FreeCoordinate = 0.6;
const REFRACTION_START_OFFSET: FreeCoordinate = 0.25;

/// Counts of work done while shading, for tests and performance reporting.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ShadeStats {
    /// Number of secondary (shadow, reflection, and refraction) rays traced.
    pub rays_cast: u64,
    /// The deepest recursion level at which lighting was computed.
    pub max_depth: u32,
}

impl ops::AddAssign for ShadeStats {
    fn add_assign(&mut self, other: Self) {
        self.rays_cast += other.rays_cast;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Per-worker mutable state used while shading.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Sampler {
    /// Source of sample jitter.
    pub rng: WorkerRng,
    /// Accumulated statistics.
    pub stats: ShadeStats,
}

impl Sampler {
    /// Creates a sampler with zeroed statistics.
    pub fn new(rng: WorkerRng) -> Self {
        Self {
            rng,
            stats: ShadeStats::default(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Shades hits in one [`Scene`] as seen from one [`Camera`].
#[derive(Clone, Debug)]
pub struct Shader<'a> {
    scene: &'a Scene,
    options: &'a RenderOptions,
    headlight: Light,
    window_height: u32,
    preview: bool,
}

impl<'a> Shader<'a> {
    /// Creates a shader for full-quality rendering.
    pub fn new(scene: &'a Scene, options: &'a RenderOptions, camera: &Camera) -> Self {
        Self {
            scene,
            options,
            headlight: Light::directional(-camera.forward(), scene.headlight())
                .with_cast_shadows(false),
            window_height: camera.viewport().height,
            preview: false,
        }
    }

    /// Sets whether to shade cheaply for the fast preview: only the headlight is
    /// evaluated, and there are no reflections or refractions.
    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// The scene being shaded.
    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// Background color for rays through window row `window_y`.
    #[inline]
    pub fn background_at(&self, window_y: FreeCoordinate) -> Rgb {
        self.scene.background().at_row(window_y, self.window_height)
    }

    /// Computes the color seen along `ray`, which produced `hit`.
    ///
    /// `bg` is the color used for refracted rays which hit nothing. `depth` is 0 for
    /// camera rays and increases by one for each reflection or refraction. If
    /// `test_shadow` is false, every light is assumed unobstructed.
    ///
    /// Moves [`HitInfo::point`] slightly off the surface and sets
    /// [`HitInfo::shadow_factor`].
    #[allow(clippy::too_many_arguments)]
    pub fn shade_hit(
        &self,
        sampler: &mut Sampler,
        bg: Rgb,
        ray: &Ray,
        hit: &mut HitInfo,
        inside_object: bool,
        depth: u32,
        test_shadow: bool,
    ) -> Rgb {
        let Some(object_id) = hit.object else {
            return bg;
        };
        let object = self.scene.object(object_id);
        let material = self.scene.material(object.material);

        let mut color = material.emissive + material.ambient;
        if depth > self.options.max_recursion {
            return color;
        }
        sampler.stats.max_depth = sampler.stats.max_depth.max(depth);

        hit.point += hit.normal * (SURFACE_OFFSET * self.options.non_copper_thickness);

        let light_count = if self.preview { 1 } else { usize::MAX };
        let mut shadow_sum = 0.0;
        let mut shadowing_lights = 0u32;
        for light in iter::once(&self.headlight)
            .chain(self.scene.lights())
            .take(light_count)
        {
            let sample = light.sample_at(hit.point);
            if hit.normal.dot(sample.direction) < FreeCoordinate::EPSILON {
                continue;
            }
            let mut shadow = 1.0;
            if test_shadow && self.options.shadows && light.casts_shadows() {
                shadow = self.shadow_attenuation(sampler, hit, &sample, depth);
                shadow_sum += shadow;
                shadowing_lights += 1;
            }
            color += material.shade(
                ray.direction(),
                hit.normal,
                object.diffuse,
                sample.direction,
                sample.color,
                shadow,
            );
        }
        hit.shadow_factor = if shadowing_lights > 0 {
            shadow_sum / shadowing_lights as f32
        } else {
            1.0
        };
        color = color.clamp01();

        if self.preview {
            return color;
        }

        if !inside_object
            && material.reflection > 0.0
            && self.options.reflections
            && depth < self.options.reflection_depth
        {
            color += self.reflection(sampler, bg, ray, hit, object, material, depth);
        }

        if material.transparency > 0.0
            && self.options.refractions
            && depth < self.options.refraction_depth
        {
            color = self.refraction(
                sampler,
                bg,
                ray,
                hit,
                object,
                material,
                color,
                inside_object,
                depth,
            );
        }

        color.clamp01()
    }

    /// Fraction of the light in `sample` reaching `hit`.
    fn shadow_attenuation(
        &self,
        sampler: &mut Sampler,
        hit: &HitInfo,
        sample: &LightSample,
        depth: u32,
    ) -> f32 {
        let accelerator = self.scene.accelerator();
        let soft = depth == 0 && self.options.antialiasing && self.options.post_processing;
        if !soft {
            sampler.stats.rays_cast += 1;
            let blocked =
                accelerator.intersect_p(&Ray::new(hit.point, sample.direction), sample.distance);
            return if blocked { 0.0 } else { 1.0 };
        }

        let samples = self.options.shadow_samples.max(1);
        let per_sample = 1.0 / samples as f32;
        let mut attenuation = 1.0;
        for i in 0..samples {
            let direction = if i == 0 {
                sample.direction
            } else {
                (sample.direction + sampler.rng.unit_sphere() * self.options.shadow_spread)
                    .normalize()
            };
            sampler.stats.rays_cast += 1;
            if accelerator.intersect_p(&Ray::new(hit.point, direction), sample.distance) {
                attenuation -= per_sample;
            }
        }
        attenuation.max(0.0)
    }

    #[allow(clippy::too_many_arguments)]
    fn reflection(
        &self,
        sampler: &mut Sampler,
        bg: Rgb,
        ray: &Ray,
        hit: &HitInfo,
        object: &SceneObject,
        material: &Material,
        depth: u32,
    ) -> Rgb {
        let reflected = reflect(ray.direction(), hit.normal);
        let tint = (object.diffuse + material.specular) * material.reflection;
        let samples = self.options.reflection_samples.max(1);
        let mut sum = Rgb::ZERO;
        for i in 0..samples {
            let direction = if i == 0 {
                reflected
            } else {
                (reflected + sampler.rng.unit_sphere() * self.options.reflection_spread)
                    .normalize()
            };
            if direction.dot(hit.normal) <= 0.0 {
                continue;
            }
            let reflected_ray = Ray::new(hit.point, direction);
            sampler.stats.rays_cast += 1;
            let mut reflected_hit = HitInfo::NONE;
            if self
                .scene
                .accelerator()
                .intersect(&reflected_ray, &mut reflected_hit)
            {
                let t = reflected_hit.t_hit;
                let seen = self.shade_hit(
                    sampler,
                    bg,
                    &reflected_ray,
                    &mut reflected_hit,
                    false,
                    depth + 1,
                    false,
                );
                sum += seen * tint * (1.0 / (1.0 + 0.75 * t * t));
            }
        }
        sum / samples as f32
    }

    #[allow(clippy::too_many_arguments)]
    fn refraction(
        &self,
        sampler: &mut Sampler,
        bg: Rgb,
        ray: &Ray,
        hit: &HitInfo,
        object: &SceneObject,
        material: &Material,
        direct: Rgb,
        inside_object: bool,
        depth: u32,
    ) -> Rgb {
        let transparency = material.transparency;
        let eta_ratio = if inside_object {
            GLASS_INDEX / AIR_INDEX
        } else {
            AIR_INDEX / GLASS_INDEX
        };
        let normal = if hit.normal.dot(ray.direction()) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };

        let Some(refracted) = refract(ray.direction(), normal, eta_ratio) else {
            // Total internal reflection.
            return direct * (1.0 - transparency) + bg * transparency;
        };

        let start = ray.at(hit.t_hit + REFRACTION_START_OFFSET * self.options.non_copper_thickness);
        let absorption = (Rgb::ONE - object.diffuse) * ((1.0 - transparency) * material.absorbance);
        let samples = self.options.refraction_samples.max(1);
        let mut sum = Rgb::ZERO;
        for i in 0..samples {
            let direction = if i == 0 {
                refracted
            } else {
                (refracted + sampler.rng.unit_sphere() * self.options.refraction_spread)
                    .normalize()
            };
            let refracted_ray = Ray::new(start, direction);
            sampler.stats.rays_cast += 1;
            let mut refracted_hit = HitInfo::NONE;
            if self
                .scene
                .accelerator()
                .intersect(&refracted_ray, &mut refracted_hit)
            {
                let t = refracted_hit.t_hit;
                let seen = self.shade_hit(
                    sampler,
                    bg,
                    &refracted_ray,
                    &mut refracted_hit,
                    !inside_object,
                    depth + 1,
                    false,
                );
                sum += seen * transmittance(absorption * t);
            } else {
                sum += bg;
            }
        }
        direct * (1.0 - transparency) + (sum / samples as f32) * transparency
    }
}

/// Per-channel `1 / (1 + absorbed)`.
fn transmittance(absorbed: Rgb) -> Rgb {
    Rgb::new(
        1.0 / (1.0 + absorbed.red()),
        1.0 / (1.0 + absorbed.green()),
        1.0 / (1.0 + absorbed.blue()),
    )
}
