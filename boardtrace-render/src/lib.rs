//! Software raytracer for 3D views of printed circuit boards.
//!
//! A [`Scene`] holds board geometry (2D layer shapes extruded between two heights,
//! plated-hole barrels, and triangles of imported component models), materials, and
//! lights, indexed by a bounding volume hierarchy. A [`Raytracer`] renders it from a
//! [`Camera`] progressively: each call to [`Raytracer::render()`] traces as many 8×8
//! pixel blocks as fit in a timeslice, then post-processes the image with screen-space
//! ambient occlusion and a blur once every block is done. While the camera is moving,
//! [`Raytracer::render_preview()`] produces a cheap interpolated image instead.
//!
//! ## Package features
//!
//! This package, `boardtrace-render`, defines the following feature flags:
//!
//! * `"auto-threads"` (enabled by default):
//!   Trace blocks and post-process rows in parallel on [`rayon`]’s global thread pool.
//!   This feature does not affect the public API, only performance and dependencies.
//! * `"serde"`:
//!   Implements serialization for [`RenderOptions`] and scene description types.

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

// -------------------------------------------------------------------------------------------------

pub mod accel;
pub use accel::{Accelerator, Bvh};

mod blocks;
pub use blocks::{BlockLayout, BlockOrder};

pub mod camera;
pub use camera::{Camera, ImageSize, Projection};

mod flaws;
pub use flaws::Flaws;

mod hit;
pub use hit::{HitInfo, NodeId, ObjectId};

mod light;
pub use light::Light;

mod material;
pub use material::{Material, MaterialId};

pub mod object;

mod options;
pub use options::RenderOptions;

pub mod packet;

pub mod postprocess;

mod preview;

mod renderer;
pub use renderer::{
    RenderState, Raytracer, Rendering, StatusReporter, StopFlag, WAIT_FOR_EDITING_TIMEOUT,
};

mod scene;
pub use scene::{Background, Scene, SceneBuilder, SceneObject};

pub mod shade;

pub mod shapes;

// -------------------------------------------------------------------------------------------------

/// An error indicating that a [`Raytracer`] or [`Scene`] could not be set up or used
/// as requested.
#[derive(Clone, Debug, Eq, Hash, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum RenderError {
    /// The output buffer does not have the same number of pixels as the render buffer.
    #[displaydoc("output buffer has {actual} pixels but {expected} were expected")]
    BufferSize {
        /// Number of pixels required, [`Raytracer::buffer_size()`]’s area.
        expected: usize,
        /// Number of pixels in the buffer that was provided.
        actual: usize,
    },

    /// The camera's viewport has zero width or height.
    #[displaydoc("cannot render to a viewport of zero size")]
    EmptyViewport,

    /// A scene object refers to a material which was never added to the scene.
    #[displaydoc("scene object {object:?} uses material {material:?}, which does not exist")]
    MissingMaterial {
        /// The object that has the bad reference.
        object: ObjectId,
        /// The material that was not found.
        material: MaterialId,
    },
}

impl std::error::Error for RenderError {}
