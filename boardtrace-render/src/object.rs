//! 3D objects that rays can hit.

use boardtrace_base::math::{
    Aab, Aab2, FreeCoordinate, FreePoint, FreeVector, PlanePoint, PlaneVector,
};
use boardtrace_base::raycast::{Ray, RaySegment2};

use crate::HitInfo;
use crate::shapes::Shape2;

const EPSILON: FreeCoordinate = FreeCoordinate::EPSILON;

/// Any of the 3D primitives a scene is built from.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Object3 {
    /// A 2D shape extruded vertically; copper, solder mask, silkscreen, and board body.
    LayerItem(LayerItem),
    /// A face of an imported component model.
    Triangle(Triangle3),
    /// The wall of a plated hole.
    Cylinder(Cylinder),
}

impl Object3 {
    /// The smallest axis-aligned box containing the object.
    #[inline]
    pub fn bounding_box(&self) -> Aab {
        match self {
            Object3::LayerItem(o) => o.bounding_box(),
            Object3::Triangle(o) => o.bounding_box(),
            Object3::Cylinder(o) => o.bounding_box(),
        }
    }

    /// Updates `hit` and returns true if the ray hits this object closer than `hit.t_hit`.
    ///
    /// Does not set [`HitInfo::object`] or [`HitInfo::node`]; those are the caller's.
    #[inline]
    pub fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool {
        match self {
            Object3::LayerItem(o) => o.intersect(ray, hit),
            Object3::Triangle(o) => o.intersect(ray, hit),
            Object3::Cylinder(o) => o.intersect(ray, hit),
        }
    }

    /// Whether the ray hits this object closer than `max_distance`.
    #[inline]
    pub fn intersect_p(&self, ray: &Ray, max_distance: FreeCoordinate) -> bool {
        self.intersect(ray, &mut HitInfo::within(max_distance))
    }
}

impl From<LayerItem> for Object3 {
    #[inline]
    fn from(value: LayerItem) -> Self {
        Object3::LayerItem(value)
    }
}
impl From<Triangle3> for Object3 {
    #[inline]
    fn from(value: Triangle3) -> Self {
        Object3::Triangle(value)
    }
}
impl From<Cylinder> for Object3 {
    #[inline]
    fn from(value: Cylinder) -> Self {
        Object3::Cylinder(value)
    }
}

// -------------------------------------------------------------------------------------------------

/// A [`Shape2`] swept vertically between a bottom and a top height; a prism.
///
/// Ray intersection tests the top and bottom faces as planes with a 2D containment
/// check, and the side wall as a 2D segment intersection of the ray's projection.
/// Plane hit distances are nudged one ULP toward the ray origin so that points
/// computed from them land on the near side of the face, which keeps secondary rays
/// leaving the face from immediately hitting it again.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerItem {
    shape: Shape2,
    bottom: FreeCoordinate,
    top: FreeCoordinate,
    bounding_box: Aab,
}

impl LayerItem {
    /// Constructs a layer item. The heights may be given in either order.
    #[inline]
    pub fn new(shape: impl Into<Shape2>, z_bottom: FreeCoordinate, z_top: FreeCoordinate) -> Self {
        let shape = shape.into();
        let (bottom, top) = if z_bottom <= z_top {
            (z_bottom, z_top)
        } else {
            (z_top, z_bottom)
        };
        Self {
            bounding_box: Aab::from_plane(shape.bounding_box(), bottom, top),
            shape,
            bottom,
            top,
        }
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn shape(&self) -> &Shape2 {
        &self.shape
    }

    /// Height of the bottom face; never greater than [`Self::top()`].
    #[inline]
    pub fn bottom(&self) -> FreeCoordinate {
        self.bottom
    }

    /// Height of the top face.
    #[inline]
    pub fn top(&self) -> FreeCoordinate {
        self.top
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab {
        self.bounding_box
    }

    #[allow(missing_docs)]
    pub fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool {
        let Some((t_start, t_end)) = self.bounding_box.intersect(ray) else {
            return false;
        };
        if t_start >= hit.t_hit || (t_start - t_end).abs() <= EPSILON {
            return false;
        }

        let origin = ray.origin();
        let direction = ray.direction();
        let project = |t: FreeCoordinate| {
            let p = ray.at(t);
            PlanePoint::new(p.x, p.y)
        };

        if !self.bounding_box.contains_point(origin) {
            let mut plane_hits: [Option<(FreeCoordinate, FreeVector)>; 2] = [None, None];
            if direction.z.abs() > EPSILON {
                let start_adjusted = t_start.next_up();
                let inv_z = ray.inv_direction().z;
                for (slot, (z, normal_z)) in
                    plane_hits.iter_mut().zip([(self.bottom, -1.0), (self.top, 1.0)])
                {
                    let t = (z - origin.z) * inv_z;
                    // Only the face the ray enters the box through can be hit from outside.
                    if t > EPSILON && t <= start_adjusted {
                        *slot = Some((t.next_down(), FreeVector::new(0.0, 0.0, normal_z)));
                    }
                }
            }

            let nearest_plane = plane_hits
                .into_iter()
                .flatten()
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((t, normal)) = nearest_plane {
                if self.shape.contains(project(t)) {
                    return hit.accept(t, ray.at(t), normal);
                }
            }

            // The ray enters through the side wall, or misses.
            let t_start = t_start.next_down();
            let t_end = t_end.next_up();
            let start = ray.at(t_start);
            let end = ray.at(t_end);
            let segment = RaySegment2::new(
                PlanePoint::new(start.x, start.y),
                PlanePoint::new(end.x, end.y),
            );
            if let Some((t_segment, normal)) = self.shape.intersect(&segment) {
                let point = start.lerp(end, t_segment);
                let t = (point - origin).length();
                return hit.accept(t, point, normal.extend(0.0));
            }
            false
        } else {
            // Starting inside the box: the first wall crossing, entering or leaving the
            // shape, comes before any face the ray would leave through.
            let origin_2d = PlanePoint::new(origin.x, origin.y);
            let t_end = t_end.next_up();
            let segment = RaySegment2::new(origin_2d, project(t_end));
            if let Some((t_segment, normal)) = self.shape.intersect(&segment) {
                let t = t_end * t_segment;
                return hit.accept(t, ray.at(t), normal.extend(0.0));
            }

            // No wall is crossed, so a ray starting within the shape leaves through the
            // face it reaches before leaving the box.
            if direction.z.abs() > EPSILON && self.shape.contains(origin_2d) {
                let (z, normal_z) = if direction.z < 0.0 {
                    (self.bottom, 1.0)
                } else {
                    (self.top, -1.0)
                };
                let t = (z - origin.z) * ray.inv_direction().z;
                if t > 0.0 && t <= t_end {
                    return hit.accept(t, ray.at(t), FreeVector::new(0.0, 0.0, normal_z));
                }
            }
            false
        }
    }

    /// Whether the ray hits this item closer than `max_distance`.
    #[inline]
    pub fn intersect_p(&self, ray: &Ray, max_distance: FreeCoordinate) -> bool {
        self.intersect(ray, &mut HitInfo::within(max_distance))
    }
}

// -------------------------------------------------------------------------------------------------

/// A triangle in space, optionally with per-vertex normals for smooth shading.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle3 {
    vertices: [FreePoint; 3],
    edge1: FreeVector,
    edge2: FreeVector,
    normal: FreeVector,
    vertex_normals: Option<[FreeVector; 3]>,
    bounding_box: Aab,
}

impl Triangle3 {
    /// Constructs a flat-shaded triangle.
    #[inline]
    pub fn new(vertices: [FreePoint; 3]) -> Self {
        let edge1 = vertices[1] - vertices[0];
        let edge2 = vertices[2] - vertices[0];
        let normal = edge1.cross(edge2);
        let normal = if normal.length() > 0.0 {
            normal.normalize()
        } else {
            FreeVector::new(0.0, 0.0, 1.0)
        };
        Self {
            vertices,
            edge1,
            edge2,
            normal,
            vertex_normals: None,
            bounding_box: Aab::from_points(vertices).unwrap_or(Aab::ZERO),
        }
    }

    /// Uses the given normals at each vertex, interpolated across the face.
    #[must_use]
    #[inline]
    pub fn with_vertex_normals(mut self, normals: [FreeVector; 3]) -> Self {
        self.vertex_normals = Some(normals.map(|n| n.normalize()));
        self
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab {
        self.bounding_box
    }

    /// Möller–Trumbore intersection. The reported normal always faces the ray.
    pub fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool {
        let direction = ray.direction();
        let p = direction.cross(self.edge2);
        let determinant = self.edge1.dot(p);
        if determinant.abs() < EPSILON {
            return false;
        }
        let inv_determinant = 1.0 / determinant;
        let s = ray.origin() - self.vertices[0];
        let u = s.dot(p) * inv_determinant;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }
        let q = s.cross(self.edge1);
        let v = direction.dot(q) * inv_determinant;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }
        let t = self.edge2.dot(q) * inv_determinant;
        if t <= EPSILON || t >= hit.t_hit {
            return false;
        }
        let normal = match self.vertex_normals {
            Some([n0, n1, n2]) => (n0 * (1.0 - u - v) + n1 * u + n2 * v).normalize(),
            None => self.normal,
        };
        let normal = if normal.dot(direction) > 0.0 {
            -normal
        } else {
            normal
        };
        hit.accept(t, ray.at(t), normal)
    }
}

// -------------------------------------------------------------------------------------------------

/// An open vertical cylinder wall, such as the barrel of a plated hole.
#[derive(Clone, Debug, PartialEq)]
pub struct Cylinder {
    center: PlanePoint,
    radius: FreeCoordinate,
    bottom: FreeCoordinate,
    top: FreeCoordinate,
    bounding_box: Aab,
}

impl Cylinder {
    /// Constructs a cylinder wall. The heights may be given in either order.
    #[inline]
    pub fn new(
        center: PlanePoint,
        radius: FreeCoordinate,
        z_bottom: FreeCoordinate,
        z_top: FreeCoordinate,
    ) -> Self {
        let radius = radius.abs();
        let (bottom, top) = if z_bottom <= z_top {
            (z_bottom, z_top)
        } else {
            (z_top, z_bottom)
        };
        let plane = Aab2::around(center, PlaneVector::splat(radius));
        Self {
            center,
            radius,
            bottom,
            top,
            bounding_box: Aab::from_plane(plane, bottom, top),
        }
    }

    #[allow(missing_docs)]
    #[inline]
    pub fn bounding_box(&self) -> Aab {
        self.bounding_box
    }

    /// Nearest crossing of the wall within its height. The normal points away from the
    /// axis when hit from outside and toward it when hit from inside.
    pub fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool {
        let direction = ray.direction();
        let origin = ray.origin();
        let a = direction.x * direction.x + direction.y * direction.y;
        if a < EPSILON {
            // Parallel to the wall.
            return false;
        }
        let qx = origin.x - self.center.x;
        let qy = origin.y - self.center.y;
        let b = 2.0 * (qx * direction.x + qy * direction.y);
        let c = qx * qx + qy * qy - self.radius * self.radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < EPSILON {
            return false;
        }
        let root = discriminant.sqrt();
        for t in [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)] {
            if t <= EPSILON || t >= hit.t_hit {
                continue;
            }
            let point = ray.at(t);
            if point.z < self.bottom || point.z > self.top {
                continue;
            }
            let outward = FreeVector::new(point.x - self.center.x, point.y - self.center.y, 0.0)
                / self.radius;
            let normal = if outward.dot(direction) > 0.0 {
                -outward
            } else {
                outward
            };
            return hit.accept(t, point, normal);
        }
        false
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{FilledCircle, Polygon4, Ring, RoundSegment};
    use boardtrace_base::euclid::{point2, point3, vec3};
    use rand::{Rng as _, SeedableRng as _};

    fn disc_item() -> LayerItem {
        LayerItem::new(FilledCircle::new(point2(0., 0.), 5.0), 0.0, 1.0)
    }

    #[test]
    fn heights_are_sorted() {
        let item = LayerItem::new(FilledCircle::new(point2(0., 0.), 1.0), 2.0, -1.0);
        assert_eq!((item.bottom(), item.top()), (-1.0, 2.0));
        assert_eq!(item.bounding_box().lower_bounds_p().z, -1.0);
    }

    #[test]
    fn hit_top_face_from_above() {
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([1., 1., 10.], [0., 0., -1.]), &mut hit));
        assert_eq!(hit.normal, vec3(0., 0., 1.));
        // One ULP short of the exact distance, so the hit point is not inside the item.
        assert!(hit.t_hit < 9.0 && hit.t_hit > 8.9999);
        assert!(hit.point.z >= 1.0);
    }

    #[test]
    fn hit_bottom_face_from_below() {
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([1., 1., -3.], [0., 0., 1.]), &mut hit));
        assert_eq!(hit.normal, vec3(0., 0., -1.));
        assert!((hit.t_hit - 3.0).abs() < 1e-5);
    }

    #[test]
    fn straight_down_beside_shape_misses() {
        // Inside the bounding box's footprint but outside the circle.
        let mut hit = HitInfo::NONE;
        assert!(!disc_item().intersect(&Ray::new([4.9, 4.9, 10.], [0., 0., -1.]), &mut hit));
        assert_eq!(hit, HitInfo::NONE);
    }

    #[test]
    fn hit_side_wall_horizontally() {
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([-10., 0., 0.5], [1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 5.0).abs() < 1e-4, "{hit:?}");
        assert!((hit.normal - vec3(-1., 0., 0.)).length() < 1e-4);
    }

    #[test]
    fn ring_hole_is_empty() {
        let item = LayerItem::new(Ring::new(point2(0., 0.), 1.0, 2.0), 0.0, 1.0);
        let mut hit = HitInfo::NONE;
        assert!(!item.intersect(&Ray::new([0., 0., 10.], [0., 0., -1.]), &mut hit));
        assert!(item.intersect(&Ray::new([1.5, 0., 10.], [0., 0., -1.]), &mut hit));
    }

    #[test]
    fn starting_inside_exits_through_bottom() {
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([0., 0., 0.5], [0., 0., -1.]), &mut hit));
        assert!((hit.t_hit - 0.5).abs() < 1e-5);
        // Moving downward, the exit face normal is +Z.
        assert_eq!(hit.normal, vec3(0., 0., 1.));
    }

    #[test]
    fn starting_inside_exits_through_side_wall() {
        let diagonal = vec3(1.0f32, 1.0, 0.0).normalize();
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([0., 0., 0.5], diagonal), &mut hit));
        assert!((hit.t_hit - 5.0).abs() < 1e-4, "{hit:?}");
        assert!((hit.normal + diagonal).length() < 1e-4, "{hit:?}");
        assert!((hit.point.z - 0.5).abs() < 1e-6);
    }

    /// The box is left through its side exactly where the circle touches it, which must
    /// not be mistaken for leaving through a face.
    #[test]
    fn starting_inside_exits_where_circle_touches_box() {
        let mut hit = HitInfo::NONE;
        assert!(disc_item().intersect(&Ray::new([0., 0., 0.5], [1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 5.0).abs() < 1e-4, "{hit:?}");
        assert!((hit.normal - vec3(-1., 0., 0.)).length() < 1e-4, "{hit:?}");
    }

    #[test]
    fn starting_inside_ring_exits_into_hole() {
        let item = LayerItem::new(Ring::new(point2(0., 0.), 1.0, 2.0), 0.0, 1.0);
        let mut hit = HitInfo::NONE;
        assert!(item.intersect(&Ray::new([1.5, 0., 0.5], [-1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 0.5).abs() < 1e-4, "{hit:?}");
        assert!((hit.normal - vec3(1., 0., 0.)).length() < 1e-4, "{hit:?}");
    }

    #[test]
    fn starting_inside_track_exits_through_cap() {
        let item = LayerItem::new(
            RoundSegment::new(point2(0., 0.), point2(10., 0.), 2.0),
            0.0,
            0.1,
        );
        let mut hit = HitInfo::NONE;
        assert!(item.intersect(&Ray::new([5., 0., 0.05], [1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 6.0).abs() < 1e-4, "{hit:?}");
        assert!((hit.normal - vec3(-1., 0., 0.)).length() < 1e-4, "{hit:?}");
    }

    #[test]
    fn starting_inside_in_shape_corner_gap_hits_nothing_going_up() {
        // Within the disc's bounding box but outside the disc, moving away from it.
        let mut hit = HitInfo::NONE;
        assert!(!disc_item().intersect(&Ray::new([4.9, 4.9, 0.5], [0., 0., 1.]), &mut hit));
        assert_eq!(hit, HitInfo::NONE);
    }

    #[test]
    fn farther_than_existing_hit_is_rejected() {
        let mut hit = HitInfo::within(5.0);
        assert!(!disc_item().intersect(&Ray::new([1., 1., 10.], [0., 0., -1.]), &mut hit));
        assert_eq!(hit.t_hit, 5.0);
        assert!(disc_item().intersect_p(&Ray::new([1., 1., 10.], [0., 0., -1.]), 20.0));
        assert!(!disc_item().intersect_p(&Ray::new([1., 1., 10.], [0., 0., -1.]), 5.0));
    }

    /// Hits from arbitrary directions always land on the item's height range, give or
    /// take rounding.
    #[test]
    fn hits_stay_within_heights() {
        let item = LayerItem::new(Polygon4::rectangle(point2(-2., -1.), point2(2., 1.)), 0.25, 0.75);
        let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(0);
        let mut hits = 0;
        for _ in 0..5000 {
            let origin = point3(
                rng.random_range(-6.0..6.0),
                rng.random_range(-6.0..6.0),
                rng.random_range(-6.0..6.0),
            );
            let target = point3(
                rng.random_range(-2.5..2.5),
                rng.random_range(-1.5..1.5),
                rng.random_range(0.0..1.0),
            );
            let ray = Ray::new(origin, (target - origin).normalize());
            let mut hit = HitInfo::NONE;
            if item.intersect(&ray, &mut hit) {
                hits += 1;
                let tolerance = 1e-4;
                assert!(
                    hit.point.z >= 0.25 - tolerance && hit.point.z <= 0.75 + tolerance,
                    "{ray:?} hit at {hit:?}"
                );
                assert!((hit.normal.length() - 1.0).abs() < 1e-4);
                assert!(hit.t_hit > 0.0);
            }
        }
        assert!(hits > 800, "{hits}");
    }

    #[test]
    fn triangle_normal_faces_ray() {
        let tri = Triangle3::new([point3(0., 0., 0.), point3(1., 0., 0.), point3(0., 1., 0.)]);
        let mut hit = HitInfo::NONE;
        assert!(tri.intersect(&Ray::new([0.2, 0.2, -1.], [0., 0., 1.]), &mut hit));
        assert_eq!(hit.normal, vec3(0., 0., -1.));
        assert!((hit.t_hit - 1.0).abs() < 1e-6);
        let mut hit = HitInfo::NONE;
        assert!(!tri.intersect(&Ray::new([0.8, 0.8, -1.], [0., 0., 1.]), &mut hit));
    }

    #[test]
    fn cylinder_outside_and_inside() {
        let barrel = Cylinder::new(point2(0., 0.), 1.0, 0.0, 2.0);
        let mut hit = HitInfo::NONE;
        assert!(barrel.intersect(&Ray::new([-5., 0., 1.], [1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 4.0).abs() < 1e-5);
        assert!((hit.normal - vec3(-1., 0., 0.)).length() < 1e-5);

        let mut hit = HitInfo::NONE;
        assert!(barrel.intersect(&Ray::new([0., 0., 1.], [1., 0., 0.]), &mut hit));
        assert!((hit.t_hit - 1.0).abs() < 1e-5);
        assert!((hit.normal - vec3(-1., 0., 0.)).length() < 1e-5);

        // Above the top.
        let mut hit = HitInfo::NONE;
        assert!(!barrel.intersect(&Ray::new([-5., 0., 3.], [1., 0., 0.]), &mut hit));
        // Straight down the axis.
        assert!(!barrel.intersect(&Ray::new([0., 0., 5.], [0., 0., -1.]), &mut hit));
    }
}
