//! 2D shapes which layer items extrude into 3D.
//!
//! Every shape answers the same four questions: its bounding box, its centroid, whether
//! it contains a point, and where a [`RaySegment2`] first crosses its boundary. That is
//! an entry for segments starting outside the shape and an exit for those starting
//! inside. Intersection results are `(t, normal)` where `t` is a fraction of the
//! segment's length in `[0, 1]` and `normal` is the unit normal of the boundary at that
//! point, turned to face the segment's start.

use boardtrace_base::math::{Aab2, FreeCoordinate, PlanePoint, PlaneVector};
use boardtrace_base::raycast::RaySegment2;

/// Parametric distance along a segment and the boundary normal where it crosses a shape.
pub type SegmentHit = (FreeCoordinate, PlaneVector);

// -------------------------------------------------------------------------------------------------

/// Any of the 2D shapes a board layer is made of.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Shape2 {
    /// An annulus, such as a via pad or the copper ring of a plated hole.
    Ring(Ring),
    /// A disc, such as a round pad.
    Circle(FilledCircle),
    /// A convex quadrilateral, such as a rectangular pad or a straight board edge.
    Quad(Polygon4),
    /// A line segment with rounded ends, such as a copper track.
    RoundSegment(RoundSegment),
    /// A triangle, such as one piece of a triangulated copper zone.
    Triangle(Triangle2),
}

impl Shape2 {
    /// The smallest axis-aligned box containing the shape.
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        match self {
            Shape2::Ring(s) => s.bounding_box(),
            Shape2::Circle(s) => s.bounding_box(),
            Shape2::Quad(s) => s.bounding_box(),
            Shape2::RoundSegment(s) => s.bounding_box(),
            Shape2::Triangle(s) => s.bounding_box(),
        }
    }

    /// The center of the shape's area.
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        match self {
            Shape2::Ring(s) => s.centroid(),
            Shape2::Circle(s) => s.centroid(),
            Shape2::Quad(s) => s.centroid(),
            Shape2::RoundSegment(s) => s.centroid(),
            Shape2::Triangle(s) => s.centroid(),
        }
    }

    /// Whether the point is inside the shape or on its boundary.
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        match self {
            Shape2::Ring(s) => s.contains(point),
            Shape2::Circle(s) => s.contains(point),
            Shape2::Quad(s) => s.contains(point),
            Shape2::RoundSegment(s) => s.contains(point),
            Shape2::Triangle(s) => s.contains(point),
        }
    }

    /// Finds where the segment first crosses the shape's boundary going inward.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        match self {
            Shape2::Ring(s) => s.intersect(segment),
            Shape2::Circle(s) => s.intersect(segment),
            Shape2::Quad(s) => s.intersect(segment),
            Shape2::RoundSegment(s) => s.intersect(segment),
            Shape2::Triangle(s) => s.intersect(segment),
        }
    }
}

macro_rules! impl_from_shape {
    ($($variant:ident($t:ty)),*) => {
        $(
            impl From<$t> for Shape2 {
                #[inline]
                fn from(value: $t) -> Self {
                    Shape2::$variant(value)
                }
            }
        )*
    };
}
impl_from_shape!(
    Ring(Ring),
    Circle(FilledCircle),
    Quad(Polygon4),
    RoundSegment(RoundSegment),
    Triangle(Triangle2)
);

// -------------------------------------------------------------------------------------------------

/// Region between two concentric circles.
#[derive(Clone, Debug, PartialEq)]
pub struct Ring {
    center: PlanePoint,
    inner_radius: FreeCoordinate,
    outer_radius: FreeCoordinate,
    inner_radius_squared: FreeCoordinate,
    outer_radius_squared: FreeCoordinate,
    bounding_box: Aab2,
}

impl Ring {
    /// Constructs a ring. The radii may be given in either order.
    #[inline]
    pub fn new(center: PlanePoint, radius_a: FreeCoordinate, radius_b: FreeCoordinate) -> Self {
        let inner_radius = radius_a.min(radius_b).max(0.0);
        let outer_radius = radius_a.max(radius_b);
        Self {
            center,
            inner_radius,
            outer_radius,
            inner_radius_squared: inner_radius * inner_radius,
            outer_radius_squared: outer_radius * outer_radius,
            bounding_box: Aab2::around(center, PlaneVector::splat(outer_radius)),
        }
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        self.bounding_box
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        self.center
    }

    /// True iff `inner² <= |point - center|² <= outer²`.
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        let d2 = (point - self.center).square_length();
        self.inner_radius_squared <= d2 && d2 <= self.outer_radius_squared
    }

    /// Nearest crossing of either circle.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        let outer = first_circle_crossing(segment, self.center, self.outer_radius);
        let inner = if self.inner_radius > 0.0 {
            first_circle_crossing(segment, self.center, self.inner_radius)
        } else {
            None
        };
        nearest(outer, inner).map(|(t, normal)| (t, facing(segment, normal)))
    }
}

/// The first crossing of a circle's boundary within the segment, whether entering or
/// leaving it. The normal points away from the center.
fn first_circle_crossing(
    segment: &RaySegment2,
    center: PlanePoint,
    radius: FreeCoordinate,
) -> Option<SegmentHit> {
    let crossing = segment.intersect_circle(center, radius)?;
    [
        (crossing.t_near, crossing.normal_near),
        (crossing.t_far, crossing.normal_far),
    ]
    .into_iter()
    .find(|(t, _)| (0.0..1.0).contains(t))
}

fn nearest(a: Option<SegmentHit>, b: Option<SegmentHit>) -> Option<SegmentHit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Flips `normal` if needed so that it opposes the direction of `segment`.
fn facing(segment: &RaySegment2, normal: PlaneVector) -> PlaneVector {
    if normal.dot(segment.end_minus_start()) > 0.0 {
        -normal
    } else {
        normal
    }
}

// -------------------------------------------------------------------------------------------------

/// A disc.
#[derive(Clone, Debug, PartialEq)]
pub struct FilledCircle {
    center: PlanePoint,
    radius: FreeCoordinate,
    radius_squared: FreeCoordinate,
    bounding_box: Aab2,
}

impl FilledCircle {
    #[allow(missing_docs)]
    #[inline]
    pub fn new(center: PlanePoint, radius: FreeCoordinate) -> Self {
        let radius = radius.abs();
        Self {
            center,
            radius,
            radius_squared: radius * radius,
            bounding_box: Aab2::around(center, PlaneVector::splat(radius)),
        }
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        self.bounding_box
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        self.center
    }

    /// True iff `|point - center|² <= radius²`.
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        (point - self.center).square_length() <= self.radius_squared
    }

    /// Entry through the circle, or the exit if the segment starts inside.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        first_circle_crossing(segment, self.center, self.radius)
            .map(|(t, normal)| (t, facing(segment, normal)))
    }
}

// -------------------------------------------------------------------------------------------------

/// Straight edges of a convex polygon, with outward normals.
#[derive(Clone, Debug, PartialEq)]
struct ConvexEdges<const N: usize> {
    starts: [PlanePoint; N],
    vectors: [PlaneVector; N],
    normals: [PlaneVector; N],
    centroid: PlanePoint,
    bounding_box: Aab2,
}

impl<const N: usize> ConvexEdges<N> {
    fn new(points: [PlanePoint; N]) -> Self {
        let centroid = points
            .iter()
            .fold(PlanePoint::origin(), |sum, &p| sum + p.to_vector())
            / N as FreeCoordinate;
        let vectors: [PlaneVector; N] = core::array::from_fn(|i| points[(i + 1) % N] - points[i]);
        let normals = core::array::from_fn(|i| {
            let v = vectors[i];
            let perpendicular = PlaneVector::new(v.y, -v.x);
            let length = perpendicular.length();
            if length <= 0.0 {
                return PlaneVector::zero();
            }
            let perpendicular = perpendicular / length;
            // Either winding is accepted, so orient each normal away from the centroid.
            let midpoint = points[i] + v * 0.5;
            if perpendicular.dot(midpoint - centroid) < 0.0 {
                -perpendicular
            } else {
                perpendicular
            }
        });
        Self {
            starts: points,
            vectors,
            normals,
            centroid,
            // N is never zero, so there is always a first point.
            bounding_box: Aab2::from_points(points)
                .unwrap_or_else(|| Aab2::around(centroid, PlaneVector::zero())),
        }
    }

    /// Same-side test: the point is on the inner side of every edge.
    fn contains(&self, point: PlanePoint) -> bool {
        let mut positive = false;
        let mut negative = false;
        for i in 0..N {
            let cross = self.vectors[i].cross(point - self.starts[i]);
            positive |= cross > 0.0;
            negative |= cross < 0.0;
        }
        !(positive && negative)
    }

    fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        let mut best: Option<SegmentHit> = None;
        for i in 0..N {
            if let Some(t) = segment.intersect_segment(self.starts[i], self.vectors[i]) {
                if best.is_none_or(|(best_t, _)| t < best_t) {
                    best = Some((t, self.normals[i]));
                }
            }
        }
        best.map(|(t, normal)| (t, facing(segment, normal)))
    }
}

/// A convex quadrilateral, with vertices in either winding order.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon4(ConvexEdges<4>);

impl Polygon4 {
    /// Constructs the quadrilateral with the given vertices in order around it.
    #[inline]
    pub fn new(points: [PlanePoint; 4]) -> Self {
        Self(ConvexEdges::new(points))
    }

    /// Constructs an axis-aligned rectangle from two opposite corners.
    #[inline]
    pub fn rectangle(a: PlanePoint, b: PlanePoint) -> Self {
        Self::new([a, PlanePoint::new(b.x, a.y), b, PlanePoint::new(a.x, b.y)])
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        self.0.bounding_box
    }

    /// The mean of the vertices.
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        self.0.centroid
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        self.0.contains(point)
    }

    /// Nearest crossing of any of the four edges.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        self.0.intersect(segment)
    }
}

/// A triangle, with vertices in either winding order.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle2(ConvexEdges<3>);

impl Triangle2 {
    #[allow(missing_docs)]
    #[inline]
    pub fn new(points: [PlanePoint; 3]) -> Self {
        Self(ConvexEdges::new(points))
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        self.0.bounding_box
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        self.0.centroid
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        self.0.contains(point)
    }

    /// Nearest crossing of any of the three edges.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        self.0.intersect(segment)
    }
}

// -------------------------------------------------------------------------------------------------

/// All points within `width / 2` of a line segment (a “stadium” shape).
#[derive(Clone, Debug, PartialEq)]
pub struct RoundSegment {
    axis: RaySegment2,
    radius: FreeCoordinate,
    radius_squared: FreeCoordinate,
    /// Unit normal to the axis on its left side.
    left_normal: PlaneVector,
    /// Unit direction of the axis; arbitrary if the axis has zero length.
    axis_direction: PlaneVector,
    left_start: PlanePoint,
    right_start: PlanePoint,
    bounding_box: Aab2,
}

impl RoundSegment {
    #[allow(missing_docs)]
    #[inline]
    pub fn new(start: PlanePoint, end: PlanePoint, width: FreeCoordinate) -> Self {
        let axis = RaySegment2::new(start, end);
        let radius = width.abs() * 0.5;
        let axis_direction = if axis.length() > 0.0 {
            axis.direction()
        } else {
            PlaneVector::new(1.0, 0.0)
        };
        let left_normal = PlaneVector::new(-axis_direction.y, axis_direction.x);
        let extent = PlaneVector::splat(radius);
        Self {
            axis,
            radius,
            radius_squared: radius * radius,
            left_normal,
            axis_direction,
            left_start: start + left_normal * radius,
            right_start: start - left_normal * radius,
            bounding_box: Aab2::around(start, extent).union(Aab2::around(end, extent)),
        }
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab2 {
        self.bounding_box
    }

    /// The midpoint of the axis.
    #[inline]
    pub fn centroid(&self) -> PlanePoint {
        self.axis.start().lerp(self.axis.end(), 0.5)
    }

    /// True iff the squared distance to the axis is at most `radius²`.
    #[inline]
    pub fn contains(&self, point: PlanePoint) -> bool {
        self.axis.distance_to_point_squared(point) <= self.radius_squared
    }

    /// Nearest crossing of the two straight sides and the two end caps.
    ///
    /// A cap crossing only counts on the half of the cap circle beyond its end of the
    /// axis; the other half lies inside the straight part.
    #[inline]
    pub fn intersect(&self, segment: &RaySegment2) -> Option<SegmentHit> {
        let side = self.axis.end_minus_start();
        let mut best: Option<SegmentHit> = None;
        let mut consider = |t: FreeCoordinate, normal: PlaneVector| {
            if best.is_none_or(|(best_t, _)| t < best_t) {
                best = Some((t, normal));
            }
        };

        if let Some(t) = segment.intersect_segment(self.left_start, side) {
            consider(t, self.left_normal);
        }
        if let Some(t) = segment.intersect_segment(self.right_start, side) {
            consider(t, -self.left_normal);
        }
        for (center, outward) in [
            (self.axis.start(), -self.axis_direction),
            (self.axis.end(), self.axis_direction),
        ] {
            if let Some(crossing) = segment.intersect_circle(center, self.radius) {
                for (t, normal) in [
                    (crossing.t_near, crossing.normal_near),
                    (crossing.t_far, crossing.normal_far),
                ] {
                    if (0.0..=1.0).contains(&t) && normal.dot(outward) >= 0.0 {
                        consider(t, normal);
                    }
                }
            }
        }
        best.map(|(t, normal)| (t, facing(segment, normal)))
    }
}

// -------------------------------------------------------------------------------------------------
