use crate::math::{FreeCoordinate, PlanePoint, PlaneVector};

/// Threshold below which a 2D direction component, cross product, or discriminant is
/// treated as zero.
const EPSILON: FreeCoordinate = FreeCoordinate::EPSILON;

/// A finite ray in the board plane from `start` to `end`.
///
/// This is the projection of a 3D ray's passage through a layer item's bounding box, and
/// is intersected against the side walls of 2D shapes. Parameters returned by the
/// intersection methods are fractions of the segment's length, in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaySegment2 {
    start: PlanePoint,
    end: PlanePoint,
    end_minus_start: PlaneVector,
    /// Unit direction, or zero for a zero-length segment.
    direction: PlaneVector,
    /// Reciprocal of `direction`, finite even for zero components.
    inv_direction: PlaneVector,
    length: FreeCoordinate,
    length_squared: FreeCoordinate,
}

/// Both points where a [`RaySegment2`]'s line crosses a circle.
///
/// Parameters are in units of the segment length and may lie outside `[0, 1]`;
/// callers choose which root is meaningful for them.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub struct CircleCrossing {
    pub t_near: FreeCoordinate,
    pub t_far: FreeCoordinate,
    pub normal_near: PlaneVector,
    pub normal_far: PlaneVector,
}

impl RaySegment2 {
    /// Constructs the segment from `start` to `end`.
    ///
    /// Zero-length segments are allowed, and intersect nothing.
    #[inline]
    pub fn new(start: PlanePoint, end: PlanePoint) -> Self {
        let end_minus_start = end - start;
        let length_squared = end_minus_start.square_length();
        let length = length_squared.sqrt();
        let direction = if length > 0.0 {
            end_minus_start / length
        } else {
            PlaneVector::zero()
        };
        let large = FreeCoordinate::MAX.next_down();
        let inverse = |d: FreeCoordinate| {
            if d.abs() < EPSILON {
                large.copysign(d)
            } else {
                1.0 / d
            }
        };
        Self {
            start,
            end,
            end_minus_start,
            direction,
            inv_direction: PlaneVector::new(inverse(direction.x), inverse(direction.y)),
            length,
            length_squared,
        }
    }

    /// The starting point.
    #[inline]
    pub const fn start(&self) -> PlanePoint {
        self.start
    }

    /// The ending point.
    #[inline]
    pub const fn end(&self) -> PlanePoint {
        self.end
    }

    /// `end - start`.
    #[inline]
    pub const fn end_minus_start(&self) -> PlaneVector {
        self.end_minus_start
    }

    /// Unit direction, or zero if the segment has no length.
    #[inline]
    pub const fn direction(&self) -> PlaneVector {
        self.direction
    }

    /// Reciprocal of the unit direction, with large finite values in place of infinities.
    #[inline]
    pub const fn inv_direction(&self) -> PlaneVector {
        self.inv_direction
    }

    /// Euclidean length.
    #[inline]
    pub const fn length(&self) -> FreeCoordinate {
        self.length
    }

    /// Returns the point `t` units of length from the start.
    #[inline]
    pub fn at(&self, t: FreeCoordinate) -> PlanePoint {
        self.start + self.direction * t
    }

    /// Intersects this segment with the segment from `other_start` to
    /// `other_start + other_end_minus_start`.
    ///
    /// Returns the parameter along `self`, or [`None`] if the segments are parallel
    /// or do not cross within both of their extents.
    #[inline]
    pub fn intersect_segment(
        &self,
        other_start: PlanePoint,
        other_end_minus_start: PlaneVector,
    ) -> Option<FreeCoordinate> {
        let rxs = self.end_minus_start.cross(other_end_minus_start);
        if rxs.abs() <= EPSILON {
            return None;
        }
        let inv_rxs = 1.0 / rxs;
        let pq = other_start - self.start;
        let t = pq.cross(other_end_minus_start) * inv_rxs;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let u = pq.cross(self.end_minus_start) * inv_rxs;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        Some(t)
    }

    /// Intersects the line of this segment with the circle of `radius` around `center`.
    ///
    /// The normals point from the center to the crossing points.
    /// Returns [`None`] if the line misses or only grazes the circle.
    #[inline]
    pub fn intersect_circle(
        &self,
        center: PlanePoint,
        radius: FreeCoordinate,
    ) -> Option<CircleCrossing> {
        let e = self.start - center;
        let a = self.direction.square_length();
        let b = 2.0 * self.direction.dot(e);
        let c = e.square_length() - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < EPSILON {
            return None;
        }
        // Computing one root from the other avoids cancellation when the start is very
        // close to the circle.
        let q = -0.5 * (b + discriminant.sqrt().copysign(b));
        let (r0, r1) = (q / a, c / q);
        let (t_near, t_far) = if r0 <= r1 { (r0, r1) } else { (r1, r0) };
        let inv_radius = 1.0 / radius;
        Some(CircleCrossing {
            t_near: t_near / self.length,
            t_far: t_far / self.length,
            normal_near: (self.at(t_near) - center) * inv_radius,
            normal_far: (self.at(t_far) - center) * inv_radius,
        })
    }

    /// Squared distance from `point` to the nearest point of the segment.
    #[inline]
    pub fn distance_to_point_squared(&self, point: PlanePoint) -> FreeCoordinate {
        let w = point - self.start;
        let c1 = w.dot(self.end_minus_start);
        if c1 <= 0.0 {
            return w.square_length();
        }
        if self.length_squared <= c1 {
            return (point - self.end).square_length();
        }
        let projected = self.start + self.end_minus_start * (c1 / self.length_squared);
        (point - projected).square_length()
    }
}
