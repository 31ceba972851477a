use core::fmt;

use crate::math::{FreeCoordinate, FreePoint, FreeVector};
use crate::raycast::RayClassification;

/// A ray; a half-infinite line segment, with the auxiliary data needed to test it
/// against axis-aligned boxes quickly.
///
/// All of the auxiliary data is derived from `origin` and `direction` in [`Ray::new()`]
/// and cannot be modified independently, so it is always consistent with them.
///
/// The direction is expected to be normalized by the caller; distances reported by
/// intersection routines are then in board units.
#[derive(Clone, Copy, PartialEq)]
pub struct Ray {
    origin: FreePoint,
    direction: FreeVector,
    /// Component-wise reciprocal of `direction`. Zero components produce infinities,
    /// which the slab test relies on.
    inv_direction: FreeVector,
    slopes: RaySlopes,
    dir_is_negative: [bool; 3],
    classification: RayClassification,
}

impl Ray {
    /// Constructs a [`Ray`] from convertible types (e.g. tuples or 3-element arrays).
    ///
    /// Never fails; a zero direction gives infinite inverses and the `OOO` classification.
    #[inline]
    pub fn new(origin: impl Into<FreePoint>, direction: impl Into<FreeVector>) -> Self {
        let origin = origin.into();
        let direction = direction.into();
        let inv_direction = FreeVector::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        Self {
            origin,
            direction,
            inv_direction,
            slopes: RaySlopes::new(origin, direction, inv_direction),
            dir_is_negative: [direction.x < 0.0, direction.y < 0.0, direction.z < 0.0],
            classification: RayClassification::of(direction),
        }
    }

    /// The sole point on the ray with `t = 0`.
    #[inline]
    pub const fn origin(&self) -> FreePoint {
        self.origin
    }

    /// The direction of the ray.
    #[inline]
    pub const fn direction(&self) -> FreeVector {
        self.direction
    }

    /// Component-wise reciprocal of the direction; infinite for zero components.
    #[inline]
    pub const fn inv_direction(&self) -> FreeVector {
        self.inv_direction
    }

    /// Slope cross terms and line offsets of the ray's projections onto the
    /// coordinate planes.
    #[inline]
    pub const fn slopes(&self) -> &RaySlopes {
        &self.slopes
    }

    /// Whether each component of the direction is negative, in X, Y, Z order.
    #[inline]
    pub const fn dir_is_negative(&self) -> [bool; 3] {
        self.dir_is_negative
    }

    /// The sign pattern of the direction.
    #[inline]
    pub const fn classification(&self) -> RayClassification {
        self.classification
    }

    /// Returns the point at parametric distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: FreeCoordinate) -> FreePoint {
        self.origin + self.direction * t
    }

    /// Returns a ray with the same direction starting at `origin`.
    ///
    /// Cheaper than [`Ray::new()`] since only the line offsets change.
    #[must_use]
    #[inline]
    pub fn with_origin(&self, origin: FreePoint) -> Self {
        Self {
            origin,
            slopes: RaySlopes::new(origin, self.direction, self.inv_direction),
            ..*self
        }
    }
}

impl fmt::Debug for Ray {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            origin,
            direction,
            inv_direction: _,
            slopes: _,
            dir_is_negative: _,
            classification,
        } = self;
        fmt.debug_struct("Ray")
            .field("origin", origin)
            .field("direction", direction)
            .field("classification", classification)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------

/// For each ordered pair of axes, the slope of the ray's projected line and the offset
/// of that line, such that the second coordinate is `slope * first + offset`.
///
/// The naming follows `i`, `j`, `k` for the X, Y, Z direction components:
/// `jbyi` is `dir.y / dir.x`, and `c_xy` is the Y intercept of the XY projection.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub struct RaySlopes {
    pub ibyj: FreeCoordinate,
    pub jbyi: FreeCoordinate,
    pub kbyj: FreeCoordinate,
    pub jbyk: FreeCoordinate,
    pub ibyk: FreeCoordinate,
    pub kbyi: FreeCoordinate,
    pub c_xy: FreeCoordinate,
    pub c_yx: FreeCoordinate,
    pub c_zy: FreeCoordinate,
    pub c_yz: FreeCoordinate,
    pub c_xz: FreeCoordinate,
    pub c_zx: FreeCoordinate,
}

impl RaySlopes {
    fn new(origin: FreePoint, dir: FreeVector, inv: FreeVector) -> Self {
        let ibyj = dir.x * inv.y;
        let jbyi = dir.y * inv.x;
        let kbyj = dir.z * inv.y;
        let jbyk = dir.y * inv.z;
        let ibyk = dir.x * inv.z;
        let kbyi = dir.z * inv.x;
        Self {
            ibyj,
            jbyi,
            kbyj,
            jbyk,
            ibyk,
            kbyi,
            c_xy: origin.y - jbyi * origin.x,
            c_yx: origin.x - ibyj * origin.y,
            c_zy: origin.y - jbyk * origin.z,
            c_yz: origin.z - kbyj * origin.y,
            c_xz: origin.z - kbyi * origin.x,
            c_zx: origin.x - ibyk * origin.z,
        }
    }

    /// Returns `(slope, offset)` of the projected line mapping the coordinate on axis
    /// `from` to the coordinate on axis `to`.
    ///
    /// Panics if the axes are equal or out of range.
    #[inline]
    #[track_caller]
    pub fn line(&self, from: usize, to: usize) -> (FreeCoordinate, FreeCoordinate) {
        match (from, to) {
            (0, 1) => (self.jbyi, self.c_xy),
            (1, 0) => (self.ibyj, self.c_yx),
            (1, 2) => (self.kbyj, self.c_yz),
            (2, 1) => (self.jbyk, self.c_zy),
            (0, 2) => (self.kbyi, self.c_xz),
            (2, 0) => (self.ibyk, self.c_zx),
            _ => panic!("no projected line from axis {from} to axis {to}"),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::{point3, vec3};

    #[test]
    fn zero_components_give_infinite_inverse() {
        let ray = Ray::new(point3(0., 0., 0.), vec3(0., 0., -1.));
        assert_eq!(ray.inv_direction().x, f32::INFINITY);
        assert_eq!(ray.inv_direction().z, -1.0);
        assert_eq!(ray.dir_is_negative(), [false, false, true]);
        assert_eq!(ray.classification(), RayClassification::OOM);
    }

    #[test]
    fn slopes_describe_projected_lines() {
        let origin = point3(1.0, 2.0, 3.0);
        let direction = vec3(2.0f32, 1.0, -4.0).normalize();
        let ray = Ray::new(origin, direction);
        let p = ray.at(2.5);
        let coords = p.to_array();
        for (from, to) in [(0, 1), (1, 0), (1, 2), (2, 1), (0, 2), (2, 0)] {
            let (slope, offset) = ray.slopes().line(from, to);
            let predicted = slope * coords[from] + offset;
            assert!(
                (predicted - coords[to]).abs() < 1e-4,
                "{from}->{to}: {predicted} vs {}",
                coords[to]
            );
        }
    }

    #[test]
    fn with_origin_matches_new() {
        let direction = vec3(0.3f32, -0.4, 0.5).normalize();
        let ray = Ray::new(point3(0., 0., 0.), direction);
        let moved = ray.with_origin(point3(1., 2., 3.));
        assert_eq!(moved, Ray::new(point3(1., 2., 3.), direction));
    }

    #[test]
    fn at() {
        let ray = Ray::new([1., 1., 1.], [0., 1., 0.]);
        assert_eq!(ray.at(3.0), point3(1., 4., 1.));
    }
}
