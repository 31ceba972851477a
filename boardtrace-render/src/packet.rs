//! Square bundles of camera rays traced together.

use core::fmt;

use boardtrace_base::euclid::vec2;
use boardtrace_base::math::{FreeCoordinate, PlaneVector};
use boardtrace_base::raycast::Ray;
use boardtrace_base::rng::WorkerRng;

use crate::camera::{Camera, WindowPoint};
use crate::HitInfo;

/// Width and height of a [`RayPacket`], and of a rendering block, in pixels.
pub const PACKET_DIM: u32 = 8;

/// Number of rays in a [`RayPacket`].
pub const RAYS_PER_PACKET: usize = (PACKET_DIM * PACKET_DIM) as usize;

/// The nearest hit of each ray of a [`RayPacket`], in the same order.
pub type PacketHits = [HitInfo; RAYS_PER_PACKET];

/// Returns a [`PacketHits`] in which no ray has hit anything.
#[inline]
pub fn no_hits() -> PacketHits {
    [HitInfo::NONE; RAYS_PER_PACKET]
}

/// Index into a packet of the ray in column `x` and row `y`.
#[inline]
pub const fn packet_index(x: u32, y: u32) -> usize {
    (y * PACKET_DIM + x) as usize
}

// -------------------------------------------------------------------------------------------------

/// [`PACKET_DIM`]×[`PACKET_DIM`] rays from one camera, in row-major order.
///
/// Neighboring rays are nearly parallel, so they tend to visit the same accelerator
/// nodes; [`Accelerator::intersect_packet()`](crate::Accelerator::intersect_packet)
/// uses that to skip box tests.
#[derive(Clone)]
pub struct RayPacket {
    rays: [Ray; RAYS_PER_PACKET],
}

impl RayPacket {
    /// Rays through the pixel centers of the block whose upper left corner is
    /// `window_pos`.
    pub fn new(camera: &Camera, window_pos: WindowPoint) -> Self {
        Self::with_stride(camera, window_pos, 1.0)
    }

    /// Rays through the pixel centers `window_pos + stride * (x, y)` for
    /// `x, y` in `0..PACKET_DIM`.
    pub fn with_stride(camera: &Camera, window_pos: WindowPoint, stride: FreeCoordinate) -> Self {
        Self::from_fn(|x, y| {
            camera.make_ray(
                window_pos + vec2(x as FreeCoordinate * stride + 0.5, y as FreeCoordinate * stride + 0.5),
            )
        })
    }

    /// Rays through the pixel centers of the block, each of whose directions is displaced
    /// by up to `factor` along each axis and then normalized.
    pub fn with_direction_jitter(
        camera: &Camera,
        window_pos: WindowPoint,
        factor: FreeCoordinate,
        rng: &mut WorkerRng,
    ) -> Self {
        Self::from_fn(|x, y| {
            let ray = camera.make_ray(
                window_pos + vec2(x as FreeCoordinate + 0.5, y as FreeCoordinate + 0.5),
            );
            let direction = (ray.direction() + rng.signed_unit_3() * factor).normalize();
            Ray::new(ray.origin(), direction)
        })
    }

    /// Rays through `window_pos + (x, y) + offset`, each displaced by up to `factor` pixels
    /// along each axis.
    pub fn with_position_jitter(
        camera: &Camera,
        window_pos: WindowPoint,
        offset: PlaneVector,
        factor: FreeCoordinate,
        rng: &mut WorkerRng,
    ) -> Self {
        Self::from_fn(|x, y| {
            let jitter = offset + rng.signed_unit_2() * factor;
            camera.make_ray(
                window_pos + vec2(x as FreeCoordinate + jitter.x, y as FreeCoordinate + jitter.y),
            )
        })
    }

    fn from_fn(mut f: impl FnMut(u32, u32) -> Ray) -> Self {
        Self {
            rays: core::array::from_fn(|i| f(i as u32 % PACKET_DIM, i as u32 / PACKET_DIM)),
        }
    }

    /// All the rays, in row-major order.
    #[inline]
    pub fn rays(&self) -> &[Ray; RAYS_PER_PACKET] {
        &self.rays
    }

    /// The ray in column `x` and row `y`.
    #[inline]
    pub fn ray(&self, x: u32, y: u32) -> &Ray {
        &self.rays[packet_index(x, y)]
    }
}

impl fmt::Debug for RayPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { rays } = self;
        f.debug_struct("RayPacket")
            .field("first", &rays[0])
            .field("last", &rays[RAYS_PER_PACKET - 1])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use boardtrace_base::euclid::{point2, point3, size2, vec3};

    fn camera() -> Camera {
        let mut camera = Camera::new(
            Projection::Orthographic { view_height: 64.0 },
            size2(64, 64),
        );
        camera.look_at(point3(32., -32., 10.), point3(32., -32., 0.), vec3(0., 1., 0.));
        camera
    }

    #[test]
    fn rays_through_pixel_centers() {
        let camera = camera();
        let packet = RayPacket::new(&camera, point2(8., 16.));
        // One board unit per pixel, with window (0, 0) at board (0, 0).
        let origin = packet.ray(3, 2).origin();
        assert!((origin.x - 11.5).abs() < 1e-4, "{origin:?}");
        assert!((origin.y - -18.5).abs() < 1e-4, "{origin:?}");
    }

    #[test]
    fn stride() {
        let camera = camera();
        let packet = RayPacket::with_stride(&camera, point2(0., 0.), 4.0);
        let origin = packet.ray(7, 0).origin();
        assert!((origin.x - 28.5).abs() < 1e-4, "{origin:?}");
    }

    #[test]
    fn direction_jitter_stays_normalized_and_close() {
        let camera = camera();
        let mut rng = WorkerRng::new(1);
        let packet = RayPacket::with_direction_jitter(&camera, point2(0., 0.), 0.01, &mut rng);
        for ray in packet.rays() {
            assert!((ray.direction().length() - 1.0).abs() < 1e-5);
            assert!((ray.direction() - vec3(0., 0., -1.)).length() < 0.02);
        }
    }

    #[test]
    fn position_jitter_within_bounds() {
        let camera = camera();
        let mut rng = WorkerRng::new(2);
        let packet = RayPacket::with_position_jitter(
            &camera,
            point2(0., 0.),
            vec2(0.25, 0.25),
            0.1,
            &mut rng,
        );
        let origin = packet.ray(0, 0).origin();
        assert!((0.15..=0.35).contains(&origin.x), "{origin:?}");
        assert!((-0.35..=-0.15).contains(&origin.y), "{origin:?}");
    }
}
