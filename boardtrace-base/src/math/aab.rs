use core::fmt;

use euclid::Point3D;

use crate::math::{FreeCoordinate, FreePoint, FreeVector, PlanePoint, PlaneVector};
use crate::raycast::{AxisSign, Ray};

// -------------------------------------------------------------------------------------------------

/// Axis-Aligned Box data type.
///
/// Boxes of zero size along any axis are permitted, since flat objects (for example,
/// a layer item whose top and bottom coincide) still need bounds.
#[derive(Copy, Clone, PartialEq)]
pub struct Aab {
    lower_bounds: FreePoint,
    upper_bounds: FreePoint,
}

impl Aab {
    /// The [`Aab`] of zero size at the origin.
    pub const ZERO: Aab = Aab {
        lower_bounds: Point3D::new(0., 0., 0.),
        upper_bounds: Point3D::new(0., 0., 0.),
    };

    /// Constructs an [`Aab`] from most-negative and most-positive corner points.
    ///
    /// Panics if the points are not in the proper order or if they are NaN.
    #[inline]
    #[track_caller]
    pub fn from_lower_upper(
        lower_bounds: impl Into<FreePoint>,
        upper_bounds: impl Into<FreePoint>,
    ) -> Self {
        let lower_bounds = lower_bounds.into();
        let upper_bounds = upper_bounds.into();
        match Self::checked_from_lower_upper(lower_bounds, upper_bounds) {
            Some(aab) => aab,
            None => panic!(
                "invalid AAB points that are misordered or NaN: \
                lower {lower_bounds:?} upper {upper_bounds:?}"
            ),
        }
    }

    /// Constructs an [`Aab`] from most-negative and most-positive corner points.
    ///
    /// Returns [`None`] if the points are not in the proper order or if they are NaN.
    #[inline]
    pub fn checked_from_lower_upper(
        lower_bounds: FreePoint,
        upper_bounds: FreePoint,
    ) -> Option<Self> {
        if lower_bounds.x <= upper_bounds.x
            && lower_bounds.y <= upper_bounds.y
            && lower_bounds.z <= upper_bounds.z
        {
            Some(Self {
                lower_bounds,
                upper_bounds,
            })
        } else {
            None
        }
    }

    /// Constructs the smallest [`Aab`] containing all of the given points,
    /// or [`None`] if there are none.
    #[inline]
    pub fn from_points(points: impl IntoIterator<Item = FreePoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                lower_bounds: first,
                upper_bounds: first,
            },
            Self::include_point,
        ))
    }

    /// Extrudes a 2D box between two heights, which may be given in either order.
    #[inline]
    pub fn from_plane(plane: Aab2, z0: FreeCoordinate, z1: FreeCoordinate) -> Self {
        let (lower_z, upper_z) = if z0 <= z1 { (z0, z1) } else { (z1, z0) };
        Self {
            lower_bounds: plane.lower_bounds.extend(lower_z),
            upper_bounds: plane.upper_bounds.extend(upper_z),
        }
    }

    /// The most negative corner of the box.
    #[inline]
    pub const fn lower_bounds_p(&self) -> FreePoint {
        self.lower_bounds
    }

    /// The most positive corner of the box.
    #[inline]
    pub const fn upper_bounds_p(&self) -> FreePoint {
        self.upper_bounds
    }

    /// Size of the box in each axis.
    #[inline]
    pub fn size(&self) -> FreeVector {
        self.upper_bounds - self.lower_bounds
    }

    /// The center of the box.
    #[inline]
    pub fn center(&self) -> FreePoint {
        self.lower_bounds.lerp(self.upper_bounds, 0.5)
    }

    /// Total area of the six faces, as used by the surface area heuristic.
    #[inline]
    pub fn surface_area(&self) -> FreeCoordinate {
        let s = self.size();
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    /// Index (0, 1, or 2) of the axis along which the box is largest.
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            0
        } else if s.y >= s.z {
            1
        } else {
            2
        }
    }

    /// Returns the smallest box containing both `self` and `other`.
    #[must_use]
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            lower_bounds: self.lower_bounds.min(other.lower_bounds),
            upper_bounds: self.upper_bounds.max(other.upper_bounds),
        }
    }

    /// Enlarges the box, if necessary, so that it contains `point`.
    #[must_use]
    #[inline]
    pub fn include_point(self, point: FreePoint) -> Self {
        Self {
            lower_bounds: self.lower_bounds.min(point),
            upper_bounds: self.upper_bounds.max(point),
        }
    }

    /// Returns whether the point lies within the box, boundaries included.
    #[inline]
    pub fn contains_point(&self, point: FreePoint) -> bool {
        let l = self.lower_bounds;
        let u = self.upper_bounds;
        (l.x..=u.x).contains(&point.x)
            && (l.y..=u.y).contains(&point.y)
            && (l.z..=u.z).contains(&point.z)
    }

    /// Slab test of the ray against the box.
    ///
    /// Returns the parametric entry and exit distances along the ray, with the entry
    /// distance clamped to be at least zero (so a ray starting inside reports an entry
    /// of `0.0`), or [`None`] if the ray misses.
    ///
    /// Infinite inverse direction components are expected; the comparisons are arranged
    /// so that a resulting NaN never narrows the interval.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<(FreeCoordinate, FreeCoordinate)> {
        let mut t0: FreeCoordinate = 0.0;
        let mut t1 = FreeCoordinate::MAX;
        let origin = ray.origin().to_array();
        let inv = ray.inv_direction().to_array();
        let lower = self.lower_bounds.to_array();
        let upper = self.upper_bounds.to_array();
        for axis in 0..3 {
            let mut t_near = (lower[axis] - origin[axis]) * inv[axis];
            let mut t_far = (upper[axis] - origin[axis]) * inv[axis];
            if t_near > t_far {
                core::mem::swap(&mut t_near, &mut t_far);
            }
            if t_near > t0 {
                t0 = t_near;
            }
            if t_far < t1 {
                t1 = t_far;
            }
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }

    /// Boolean overlap test of the ray against the box using ray slopes.
    ///
    /// The code path is selected by the ray's [`RayClassification`](crate::raycast::RayClassification):
    /// axes along which the ray does not move need only a containment test of the origin,
    /// and each pair of moving axes is checked in projection with the precomputed slope
    /// and offset of the ray's line.
    #[inline]
    pub fn intersect_p(&self, ray: &Ray) -> bool {
        let signs = ray.classification().signs();
        let origin = ray.origin().to_array();
        let lower = self.lower_bounds.to_array();
        let upper = self.upper_bounds.to_array();

        // The origin must not already be past the box on any axis.
        for axis in 0..3 {
            let past = match signs[axis] {
                AxisSign::Minus => origin[axis] < lower[axis],
                AxisSign::Plus => origin[axis] > upper[axis],
                AxisSign::Zero => origin[axis] < lower[axis] || origin[axis] > upper[axis],
            };
            if past {
                return false;
            }
        }

        // For each ordered pair of moving axes, find where the ray leaves the slab of the
        // first axis and check that it has not overshot the second axis's slab by then.
        for (from, to) in [(0, 1), (1, 0), (1, 2), (2, 1), (0, 2), (2, 0)] {
            let (AxisSign::Minus | AxisSign::Plus, AxisSign::Minus | AxisSign::Plus) =
                (signs[from], signs[to])
            else {
                continue;
            };
            let (slope, offset) = ray.slopes().line(from, to);
            let far_from = match signs[from] {
                AxisSign::Minus => lower[from],
                _ => upper[from],
            };
            let to_at_far = slope * far_from + offset;
            let overshot = match signs[to] {
                AxisSign::Minus => to_at_far > upper[to],
                _ => to_at_far < lower[to],
            };
            if overshot {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for Aab {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Aab {
            lower_bounds: l,
            upper_bounds: u,
        } = *self;
        fmt.debug_tuple("Aab")
            .field(&(l.x..=u.x))
            .field(&(l.y..=u.y))
            .field(&(l.z..=u.z))
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Axis-aligned box in the plane of the board; the bounds of a 2D shape.
#[derive(Copy, Clone, PartialEq)]
pub struct Aab2 {
    lower_bounds: PlanePoint,
    upper_bounds: PlanePoint,
}

impl Aab2 {
    /// Constructs the smallest [`Aab2`] containing all of the given points,
    /// or [`None`] if there are none.
    #[inline]
    pub fn from_points(points: impl IntoIterator<Item = PlanePoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                lower_bounds: first,
                upper_bounds: first,
            },
            |aab, p| Self {
                lower_bounds: aab.lower_bounds.min(p),
                upper_bounds: aab.upper_bounds.max(p),
            },
        ))
    }

    /// Box centered on `center` extending `half_size` in each direction.
    #[inline]
    pub fn around(center: PlanePoint, half_size: PlaneVector) -> Self {
        let half_size = half_size.abs();
        Self {
            lower_bounds: center - half_size,
            upper_bounds: center + half_size,
        }
    }

    /// The most negative corner of the box.
    #[inline]
    pub const fn lower_bounds_p(&self) -> PlanePoint {
        self.lower_bounds
    }

    /// The most positive corner of the box.
    #[inline]
    pub const fn upper_bounds_p(&self) -> PlanePoint {
        self.upper_bounds
    }

    /// The center of the box.
    #[inline]
    pub fn center(&self) -> PlanePoint {
        self.lower_bounds.lerp(self.upper_bounds, 0.5)
    }

    /// Returns the smallest box containing both `self` and `other`.
    #[must_use]
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            lower_bounds: self.lower_bounds.min(other.lower_bounds),
            upper_bounds: self.upper_bounds.max(other.upper_bounds),
        }
    }

    /// Returns whether the point lies within the box, boundaries included.
    #[inline]
    pub fn contains_point(&self, point: PlanePoint) -> bool {
        (self.lower_bounds.x..=self.upper_bounds.x).contains(&point.x)
            && (self.lower_bounds.y..=self.upper_bounds.y).contains(&point.y)
    }
}

impl fmt::Debug for Aab2 {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Aab2 {
            lower_bounds: l,
            upper_bounds: u,
        } = *self;
        fmt.debug_tuple("Aab2")
            .field(&(l.x..=u.x))
            .field(&(l.y..=u.y))
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::{point2, point3, vec3};
    use rand::{Rng as _, SeedableRng as _};

    fn unit_box() -> Aab {
        Aab::from_lower_upper([0., 0., 0.], [1., 1., 1.])
    }

    #[test]
    fn debug() {
        assert_eq!(
            format!("{:?}", Aab::from_lower_upper([1., 2., 3.], [4., 5., 6.])),
            "Aab(1.0..=4.0, 2.0..=5.0, 3.0..=6.0)"
        );
    }

    #[test]
    #[should_panic(expected = "invalid AAB points that are misordered or NaN")]
    fn new_wrong_order() {
        Aab::from_lower_upper([2., 0., 0.], [1., 1., 1.]);
    }

    #[test]
    fn from_plane_sorts_heights() {
        let plane = Aab2::from_points([point2(0., 0.), point2(2., 3.)]).unwrap();
        let aab = Aab::from_plane(plane, 1.5, -0.5);
        assert_eq!(aab.lower_bounds_p(), point3(0., 0., -0.5));
        assert_eq!(aab.upper_bounds_p(), point3(2., 3., 1.5));
    }

    #[test]
    fn slab_from_outside() {
        let ray = Ray::new(point3(0.5, 0.5, 5.0), vec3(0., 0., -1.));
        assert_eq!(unit_box().intersect(&ray), Some((4.0, 5.0)));
    }

    #[test]
    fn slab_from_inside_starts_at_zero() {
        let ray = Ray::new(point3(0.5, 0.5, 0.5), vec3(1., 0., 0.));
        assert_eq!(unit_box().intersect(&ray), Some((0.0, 0.5)));
    }

    #[test]
    fn slab_miss_and_behind() {
        let aab = unit_box();
        assert_eq!(
            aab.intersect(&Ray::new(point3(2., 0.5, 5.0), vec3(0., 0., -1.))),
            None
        );
        assert_eq!(
            aab.intersect(&Ray::new(point3(0.5, 0.5, 5.0), vec3(0., 0., 1.))),
            None
        );
    }

    /// The slope test and the slab test must agree, apart from rays grazing an edge
    /// where rounding may go either way.
    #[test]
    fn slope_test_agrees_with_slab_test() {
        let aab = Aab::from_lower_upper([-1., -2., -0.5], [1., 2., 0.5]);
        let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(0);
        let mut checked = 0;
        let mut hits = 0;
        let mut disagreements = Vec::new();
        for _ in 0..5000 {
            let origin = point3(
                rng.random_range(-4.0..4.0),
                rng.random_range(-4.0..4.0),
                rng.random_range(-4.0..4.0),
            );
            // Snap some components to zero to exercise the axis-aligned classifications.
            let mut component = || {
                if rng.random_bool(0.25) {
                    0.0
                } else {
                    rng.random_range(-1.0f32..1.0)
                }
            };
            let direction = vec3(component(), component(), component());
            if direction.length() < 1e-3 {
                continue;
            }
            let ray = Ray::new(origin, direction.normalize());
            let slab = aab.intersect(&ray).is_some();
            if slab != aab.intersect_p(&ray) {
                disagreements.push(ray);
            }
            hits += usize::from(slab);
            checked += 1;
        }
        assert!(checked > 4000);
        assert!(hits > 100, "too few hits ({hits}) to be a meaningful test");
        assert!(disagreements.len() <= 2, "{disagreements:#?}");
    }

    #[test]
    fn contains_point_includes_boundary() {
        let aab = unit_box();
        assert!(aab.contains_point(point3(1., 0., 0.5)));
        assert!(!aab.contains_point(point3(1.01, 0., 0.5)));
    }

    #[test]
    fn surface_area_and_axis() {
        let aab = Aab::from_lower_upper([0., 0., 0.], [1., 2., 3.]);
        assert_eq!(aab.surface_area(), 22.0);
        assert_eq!(aab.longest_axis(), 2);
    }

    #[test]
    fn aab2_union_and_center() {
        let a = Aab2::around(point2(0., 0.), euclid::vec2(1., 1.));
        let b = Aab2::around(point2(4., 0.), euclid::vec2(1., 2.));
        let u = a.union(b);
        assert_eq!(u.lower_bounds_p(), point2(-1., -2.));
        assert_eq!(u.upper_bounds_p(), point2(5., 2.));
        assert_eq!(u.center(), point2(2., 0.));
    }
}
