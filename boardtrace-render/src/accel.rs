//! Spatial index for finding which scene object a ray hits first.

use core::fmt;

use boardtrace_base::math::{Aab, FreeCoordinate, FreePoint};
use boardtrace_base::raycast::Ray;

use crate::packet::{PacketHits, RAYS_PER_PACKET, RayPacket};
use crate::{HitInfo, NodeId, ObjectId, SceneObject};

/// Finds intersections between rays and the objects of a scene.
///
/// All methods which take a [`HitInfo`] only overwrite it with hits strictly closer than
/// its current [`HitInfo::t_hit`], and record the object and the leaf node that
/// produced the hit.
pub trait Accelerator: Send + Sync {
    /// Finds the nearest hit of `ray`. Returns whether `hit` was updated.
    fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool;

    /// As [`Accelerator::intersect()`], but only considering objects below `node`,
    /// which is normally the [`HitInfo::node`] of a hit by a neighboring ray.
    fn intersect_from_node(&self, ray: &Ray, hit: &mut HitInfo, node: NodeId) -> bool;

    /// Finds the nearest hit of each ray of `packet`. Returns whether any ray hit.
    fn intersect_packet(&self, packet: &RayPacket, hits: &mut PacketHits) -> bool;

    /// Returns whether anything that casts shadows lies along `ray` closer than
    /// `max_distance`.
    fn intersect_p(&self, ray: &Ray, max_distance: FreeCoordinate) -> bool;

    /// Returns the object with the given ID.
    ///
    /// # Panics
    ///
    /// May panic if the ID was not produced by this accelerator.
    fn object(&self, id: ObjectId) -> &SceneObject;
}

// -------------------------------------------------------------------------------------------------

/// Number of candidate split positions considered per node.
const SAH_BUCKETS: usize = 12;
/// Nodes with this many objects or fewer become leaves.
const MAX_LEAF_OBJECTS: usize = 4;
/// From this depth on, splits are made at the median so the tree stays shallow enough for
/// the fixed traversal stack.
const SAH_MAX_DEPTH: usize = 24;
const STACK_SIZE: usize = 64;

/// Bounding volume hierarchy built with the surface area heuristic.
///
/// Nodes are stored depth-first: an interior node's first child immediately follows it,
/// and the node records the index of its second child.
pub struct Bvh {
    objects: Vec<SceneObject>,
    /// Object indices, in leaf order.
    leaf_objects: Vec<ObjectId>,
    nodes: Vec<LinearNode>,
}

#[derive(Clone, Copy, Debug)]
struct LinearNode {
    bounds: Aab,
    kind: NodeKind,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Leaf { first: u32, count: u32 },
    Interior { second_child: u32, axis: u8 },
}

/// An object as seen by the builder.
#[derive(Clone, Copy)]
struct BuildItem {
    id: ObjectId,
    bounds: Aab,
    centroid: FreePoint,
}

#[derive(Clone, Copy)]
struct Bucket {
    count: usize,
    bounds: Option<Aab>,
}

impl Bvh {
    /// Builds the hierarchy over `objects`. [`ObjectId`]s are indices into `objects`.
    pub fn new(objects: Vec<SceneObject>) -> Self {
        let mut items: Vec<BuildItem> = objects
            .iter()
            .enumerate()
            .map(|(index, object)| {
                let bounds = object.shape.bounding_box();
                BuildItem {
                    id: ObjectId(index as u32),
                    bounds,
                    centroid: bounds.center(),
                }
            })
            .collect();

        let mut bvh = Self {
            leaf_objects: Vec::with_capacity(objects.len()),
            nodes: Vec::with_capacity(objects.len() * 2),
            objects,
        };
        if !items.is_empty() {
            bvh.build_recursive(&mut items, 0);
        }
        log::trace!(
            "built BVH with {} nodes for {} objects",
            bvh.nodes.len(),
            bvh.objects.len()
        );
        bvh
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether there are no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bounds of everything, or [`None`] if there are no objects.
    pub fn bounds(&self) -> Option<Aab> {
        self.nodes.first().map(|node| node.bounds)
    }

    /// All objects, in [`ObjectId`] order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn build_recursive(&mut self, items: &mut [BuildItem], depth: usize) -> usize {
        let node_index = self.nodes.len();
        let bounds = items
            .iter()
            .map(|item| item.bounds)
            .reduce(Aab::union)
            .unwrap_or(Aab::ZERO);

        if items.len() <= MAX_LEAF_OBJECTS {
            self.push_leaf(bounds, items);
            return node_index;
        }

        let centroid_bounds = Aab::from_points(items.iter().map(|item| item.centroid))
            .unwrap_or(bounds);
        let axis = centroid_bounds.longest_axis();
        let axis_min = centroid_bounds.lower_bounds_p().to_array()[axis];
        let extent = centroid_bounds.size().to_array()[axis];

        let mid = if extent <= FreeCoordinate::EPSILON || depth >= SAH_MAX_DEPTH {
            // All centroids coincide, or the tree is deep; split by count.
            median_split(items, axis)
        } else {
            let bucket_of = |item: &BuildItem| {
                let relative = (item.centroid.to_array()[axis] - axis_min) / extent;
                ((relative * SAH_BUCKETS as FreeCoordinate) as usize).min(SAH_BUCKETS - 1)
            };
            let best = best_sah_split(items, bounds, &bucket_of);
            let mid = itertools::partition(items.iter_mut(), |item| bucket_of(item) <= best);
            if mid == 0 || mid == items.len() {
                median_split(items, axis)
            } else {
                mid
            }
        };

        self.nodes.push(LinearNode {
            bounds,
            kind: NodeKind::Interior {
                second_child: 0,
                axis: axis as u8,
            },
        });
        let (first, second) = items.split_at_mut(mid);
        self.build_recursive(first, depth + 1);
        let second_index = self.build_recursive(second, depth + 1);
        self.nodes[node_index].kind = NodeKind::Interior {
            second_child: second_index as u32,
            axis: axis as u8,
        };
        node_index
    }

    fn push_leaf(&mut self, bounds: Aab, items: &[BuildItem]) {
        self.nodes.push(LinearNode {
            bounds,
            kind: NodeKind::Leaf {
                first: self.leaf_objects.len() as u32,
                count: items.len() as u32,
            },
        });
        self.leaf_objects.extend(items.iter().map(|item| item.id));
    }

    fn leaf_range(first: u32, count: u32) -> core::ops::Range<usize> {
        first as usize..(first + count) as usize
    }

    /// Nearest-hit traversal of the subtree at `root`.
    fn intersect_subtree(&self, ray: &Ray, hit: &mut HitInfo, root: usize) -> bool {
        if root >= self.nodes.len() {
            return false;
        }
        let dir_is_negative = ray.dir_is_negative();
        let mut stack = [0u32; STACK_SIZE];
        let mut stack_len = 0;
        let mut current = root;
        let mut found = false;

        loop {
            let node = &self.nodes[current];
            let visit = match node.bounds.intersect(ray) {
                Some((t_near, _)) => t_near < hit.t_hit,
                None => false,
            };
            if visit {
                match node.kind {
                    NodeKind::Leaf { first, count } => {
                        for &id in &self.leaf_objects[Self::leaf_range(first, count)] {
                            if self.objects[id.index()].shape.intersect(ray, hit) {
                                hit.object = Some(id);
                                hit.node = Some(NodeId(current as u32));
                                found = true;
                            }
                        }
                    }
                    NodeKind::Interior { second_child, axis } => {
                        // Visit the child nearer to the ray origin first.
                        if dir_is_negative[usize::from(axis)] {
                            stack[stack_len] = current as u32 + 1;
                            current = second_child as usize;
                        } else {
                            stack[stack_len] = second_child;
                            current += 1;
                        }
                        stack_len += 1;
                        continue;
                    }
                }
            }
            if stack_len == 0 {
                break;
            }
            stack_len -= 1;
            current = stack[stack_len] as usize;
        }
        found
    }
}

/// Returns the bucket index such that items in buckets `0..=index` go to the first child.
fn best_sah_split(
    items: &[BuildItem],
    bounds: Aab,
    bucket_of: impl Fn(&BuildItem) -> usize,
) -> usize {
    let mut buckets = [Bucket {
        count: 0,
        bounds: None,
    }; SAH_BUCKETS];
    for item in items {
        let bucket = &mut buckets[bucket_of(item)];
        bucket.count += 1;
        bucket.bounds = Some(match bucket.bounds {
            Some(b) => b.union(item.bounds),
            None => item.bounds,
        });
    }

    let merge = |buckets: &[Bucket]| {
        buckets.iter().fold((0usize, None::<Aab>), |(count, acc), bucket| {
            let bounds = match (acc, bucket.bounds) {
                (Some(a), Some(b)) => Some(a.union(b)),
                (a, b) => a.or(b),
            };
            (count + bucket.count, bounds)
        })
    };
    let area = |b: Option<Aab>| b.map_or(0.0, |b| b.surface_area());

    let total_area = bounds.surface_area().max(FreeCoordinate::MIN_POSITIVE);
    let mut best = 0;
    let mut best_cost = FreeCoordinate::INFINITY;
    for split in 0..SAH_BUCKETS - 1 {
        let (count_a, bounds_a) = merge(&buckets[..=split]);
        let (count_b, bounds_b) = merge(&buckets[split + 1..]);
        let cost = 0.125
            + (count_a as FreeCoordinate * area(bounds_a)
                + count_b as FreeCoordinate * area(bounds_b))
                / total_area;
        if cost < best_cost {
            best_cost = cost;
            best = split;
        }
    }
    best
}

fn median_split(items: &mut [BuildItem], axis: usize) -> usize {
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        a.centroid.to_array()[axis].total_cmp(&b.centroid.to_array()[axis])
    });
    mid
}

impl Accelerator for Bvh {
    fn intersect(&self, ray: &Ray, hit: &mut HitInfo) -> bool {
        self.intersect_subtree(ray, hit, 0)
    }

    fn intersect_from_node(&self, ray: &Ray, hit: &mut HitInfo, node: NodeId) -> bool {
        self.intersect_subtree(ray, hit, node.index())
    }

    fn intersect_packet(&self, packet: &RayPacket, hits: &mut PacketHits) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let rays = packet.rays();
        // Each entry is a node and the first ray which may still hit it; rays before that
        // are known to miss the node's parent.
        let mut stack = [(0u32, 0u8); STACK_SIZE];
        let mut stack_len = 1;
        let mut found = false;

        while stack_len > 0 {
            stack_len -= 1;
            let (current, first_candidate) = stack[stack_len];
            let node = &self.nodes[current as usize];

            let enters = |i: usize| match node.bounds.intersect(&rays[i]) {
                Some((t_near, _)) => t_near < hits[i].t_hit,
                None => false,
            };
            let Some(first_active) =
                (usize::from(first_candidate)..RAYS_PER_PACKET).find(|&i| enters(i))
            else {
                continue;
            };

            match node.kind {
                NodeKind::Leaf { first, count } => {
                    for i in first_active..RAYS_PER_PACKET {
                        let ray = &rays[i];
                        let hit = &mut hits[i];
                        for &id in &self.leaf_objects[Self::leaf_range(first, count)] {
                            if self.objects[id.index()].shape.intersect(ray, hit) {
                                hit.object = Some(id);
                                hit.node = Some(NodeId(current));
                                found = true;
                            }
                        }
                    }
                }
                NodeKind::Interior { second_child, axis } => {
                    let first_active = first_active as u8;
                    let near_first =
                        !rays[usize::from(first_active)].dir_is_negative()[usize::from(axis)];
                    let (near, far) = if near_first {
                        (current + 1, second_child)
                    } else {
                        (second_child, current + 1)
                    };
                    stack[stack_len] = (far, first_active);
                    stack[stack_len + 1] = (near, first_active);
                    stack_len += 2;
                }
            }
        }
        found
    }

    fn intersect_p(&self, ray: &Ray, max_distance: FreeCoordinate) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack = [0u32; STACK_SIZE];
        let mut stack_len = 1;
        while stack_len > 0 {
            stack_len -= 1;
            let node = &self.nodes[stack[stack_len] as usize];
            let current = stack[stack_len];
            match node.bounds.intersect(ray) {
                Some((t_near, _)) if t_near < max_distance => {}
                _ => continue,
            }
            match node.kind {
                NodeKind::Leaf { first, count } => {
                    for &id in &self.leaf_objects[Self::leaf_range(first, count)] {
                        let object = &self.objects[id.index()];
                        if object.casts_shadows && object.shape.intersect_p(ray, max_distance) {
                            return true;
                        }
                    }
                }
                NodeKind::Interior { second_child, .. } => {
                    stack[stack_len] = second_child;
                    stack[stack_len + 1] = current + 1;
                    stack_len += 2;
                }
            }
        }
        false
    }

    fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.index()]
    }
}

impl fmt::Debug for Bvh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            objects,
            leaf_objects: _,
            nodes,
        } = self;
        f.debug_struct("Bvh")
            .field("objects", &objects.len())
            .field("nodes", &nodes.len())
            .field("bounds", &self.bounds())
            .finish_non_exhaustive()
    }
}
