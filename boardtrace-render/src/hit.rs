use core::fmt;

use boardtrace_base::math::{FreeCoordinate, FreePoint, FreeVector};

/// Index of a [`SceneObject`](crate::SceneObject) within its [`Scene`](crate::Scene).
///
/// This is a plain index, not an owning reference; it is only meaningful together with
/// the scene whose accelerator produced it.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId(pub(crate) u32);

/// Index of a node of a [`Bvh`](crate::Bvh), recorded by hits so that neighboring rays
/// can be tested against the same small subtree first.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub(crate) u32);

impl ObjectId {
    /// Position of the object in the scene's object list.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    /// Position of the node in the accelerator's node list.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}
impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// The nearest intersection found so far along one ray.
///
/// Intersection routines only ever replace the contents with a hit strictly closer
/// than [`HitInfo::t_hit`], so `t_hit` decreases monotonically as more objects are tested.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct HitInfo {
    /// Distance along the ray to the hit, or infinity if there is none.
    pub t_hit: FreeCoordinate,
    /// Point of the hit. During shading this is moved slightly off the surface.
    pub point: FreePoint,
    /// Unit surface normal at the hit.
    pub normal: FreeVector,
    /// Fraction of light not blocked by shadows, in `[0, 1]`; written by shading.
    pub shadow_factor: f32,
    /// The object that was hit.
    pub object: Option<ObjectId>,
    /// The accelerator leaf containing the object that was hit.
    pub node: Option<NodeId>,
}

impl HitInfo {
    /// No hit yet.
    pub const NONE: Self = Self {
        t_hit: FreeCoordinate::INFINITY,
        point: FreePoint::new(0., 0., 0.),
        normal: FreeVector::new(0., 0., 0.),
        shadow_factor: 1.0,
        object: None,
        node: None,
    };

    /// No hit yet, and none farther than `max_distance` will be accepted.
    #[inline]
    pub fn within(max_distance: FreeCoordinate) -> Self {
        Self {
            t_hit: max_distance,
            ..Self::NONE
        }
    }

    /// Whether an object has been hit.
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.object.is_some()
    }

    /// Records a hit at distance `t` if it is strictly closer than the current one.
    /// Returns whether it was recorded.
    ///
    /// The object and node are left for the accelerator to fill in.
    #[inline]
    pub fn accept(&mut self, t: FreeCoordinate, point: FreePoint, normal: FreeVector) -> bool {
        if t < self.t_hit {
            self.t_hit = t;
            self.point = point;
            self.normal = normal;
            true
        } else {
            false
        }
    }
}

impl Default for HitInfo {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardtrace_base::euclid::{point3, vec3};

    #[test]
    fn accept_only_strictly_closer() {
        let mut hit = HitInfo::NONE;
        assert!(hit.accept(5.0, point3(0., 0., 5.), vec3(0., 0., 1.)));
        assert!(!hit.accept(5.0, point3(1., 1., 1.), vec3(1., 0., 0.)));
        assert!(!hit.accept(6.0, point3(1., 1., 1.), vec3(1., 0., 0.)));
        assert_eq!(hit.point, point3(0., 0., 5.));
        assert!(hit.accept(4.5, point3(0., 0., 4.5), vec3(0., 0., 1.)));
        assert_eq!(hit.t_hit, 4.5);
    }

    #[test]
    fn within_rejects_farther() {
        let mut hit = HitInfo::within(2.0);
        assert!(!hit.accept(3.0, point3(0., 0., 0.), vec3(0., 0., 1.)));
        assert!(!hit.is_hit());
    }
}
