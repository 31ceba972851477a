//! Mathematical utilities and decisions.

use euclid::{Point2D, Point3D, Vector2D, Vector3D};

mod aab;
pub use aab::*;
mod color;
pub use color::*;

// -------------------------------------------------------------------------------------------------

/// Unit-of-measure type for board-space coordinates.
///
/// The scale is chosen by whoever builds the scene; the raytracer only assumes that
/// +Z points up out of the top side of the board.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug, Eq, PartialEq)]
pub enum Board {}

/// Coordinates that are not locked to any grid.
///
/// Single precision is used throughout since the ULP-stepping robustness offsets of
/// layer items are expressed in `f32` steps.
pub type FreeCoordinate = f32;

/// Point in board space.
pub type FreePoint = Point3D<FreeCoordinate, Board>;

/// Vector in board space.
pub type FreeVector = Vector3D<FreeCoordinate, Board>;

/// Point in the XY plane of the board (a layer's 2D geometry).
pub type PlanePoint = Point2D<FreeCoordinate, Board>;

/// Vector in the XY plane of the board.
pub type PlaneVector = Vector2D<FreeCoordinate, Board>;

// -------------------------------------------------------------------------------------------------

/// Converts an inclination from +Z and an azimuth from +X (both in radians) to a unit vector.
#[inline]
pub fn spherical_to_cartesian(inclination: FreeCoordinate, azimuth: FreeCoordinate) -> FreeVector {
    let sin_inclination = inclination.sin();
    FreeVector::new(
        sin_inclination * azimuth.cos(),
        sin_inclination * azimuth.sin(),
        inclination.cos(),
    )
}

/// Mirror `incident` about the plane whose normal is `normal` (which must be unit length).
#[inline]
pub fn reflect(incident: FreeVector, normal: FreeVector) -> FreeVector {
    incident - normal * (2.0 * incident.dot(normal))
}

/// Refracts `incident` through a surface with unit `normal` facing against it, where
/// `eta_ratio` is the refractive index of the medium being left divided by that of the
/// medium being entered (Snell's law).
///
/// Returns [`None`] on total internal reflection.
#[inline]
pub fn refract(
    incident: FreeVector,
    normal: FreeVector,
    eta_ratio: FreeCoordinate,
) -> Option<FreeVector> {
    let cos_theta_i = -normal.dot(incident);
    let sin2_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0);
    let sin2_theta_t = eta_ratio * eta_ratio * sin2_theta_i;
    if sin2_theta_t >= 1.0 {
        return None;
    }
    let cos_theta_t = (1.0 - sin2_theta_t).sqrt();
    Some((incident * eta_ratio + normal * (eta_ratio * cos_theta_i - cos_theta_t)).normalize())
}

/// Sorts the two arguments so that the smaller one is first.
#[inline]
pub fn sort_two(a: &mut FreeCoordinate, b: &mut FreeCoordinate) {
    if *a > *b {
        core::mem::swap(a, b);
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::vec3;

    fn assert_close(a: FreeVector, b: FreeVector) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn spherical_axes() {
        assert_close(spherical_to_cartesian(0.0, 0.0), vec3(0., 0., 1.));
        assert_close(
            spherical_to_cartesian(core::f32::consts::FRAC_PI_2, 0.0),
            vec3(1., 0., 0.),
        );
        assert_close(
            spherical_to_cartesian(core::f32::consts::FRAC_PI_2, core::f32::consts::FRAC_PI_2),
            vec3(0., 1., 0.),
        );
    }

    #[test]
    fn reflect_off_floor() {
        assert_close(
            reflect(vec3(1., 0., -1.), vec3(0., 0., 1.)),
            vec3(1., 0., 1.),
        );
    }

    #[test]
    fn refract_normal_incidence_passes_straight() {
        let down = vec3(0., 0., -1.);
        assert_close(refract(down, vec3(0., 0., 1.), 1.0 / 1.49).unwrap(), down);
    }

    #[test]
    fn refract_bends_toward_normal_entering_denser_medium() {
        let incident = vec3(1.0f32, 0., -1.).normalize();
        let refracted = refract(incident, vec3(0., 0., 1.), 1.0 / 1.49).unwrap();
        // Angle from the normal shrinks.
        assert!(refracted.x < incident.x);
        assert!(refracted.z < 0.0);
        assert!((refracted.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn total_internal_reflection() {
        // Leaving glass at a grazing angle.
        let incident = vec3(1.0f32, 0., -0.2).normalize();
        assert_eq!(refract(incident, vec3(0., 0., 1.), 1.49), None);
    }

    #[test]
    fn sort_two_orders() {
        let (mut a, mut b) = (3.0, 1.0);
        sort_two(&mut a, &mut b);
        assert_eq!((a, b), (1.0, 3.0));
    }
}
