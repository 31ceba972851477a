//! Projecting pixels of the output image into rays in board space.

use core::fmt;

use boardtrace_base::euclid::{Point2D, Size2D};
use boardtrace_base::math::{FreeCoordinate, FreePoint, FreeVector};
use boardtrace_base::raycast::Ray;

// -------------------------------------------------------------------------------------------------

/// Unit-of-measure type for pixel coordinates of the window being rendered into.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug, Eq, PartialEq)]
pub enum ImagePixel {}

/// Size of an image or window in whole pixels.
pub type ImageSize = Size2D<u32, ImagePixel>;

/// A position in window pixel coordinates, where `(0.5, 0.5)` is the center of the
/// upper left pixel and +Y points down.
pub type WindowPoint = Point2D<FreeCoordinate, ImagePixel>;

/// Calculate area and convert to `usize`, which is a common operation for image data lengths.
#[inline]
pub(crate) fn area_usize(size: ImageSize) -> usize {
    size.width as usize * size.height as usize
}

// -------------------------------------------------------------------------------------------------

/// How a [`Camera`] maps the window onto the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Projection {
    /// Rays diverge from the eye.
    Perspective {
        /// Vertical field of view, in radians.
        fov_y: FreeCoordinate,
    },
    /// Rays are parallel to the view direction.
    Orthographic {
        /// Height of the visible region, in board units.
        view_height: FreeCoordinate,
    },
}

/// Viewpoint, view direction, projection, and window size of a rendering.
///
/// Every modification marks the camera as changed; the [`Raytracer`](crate::Raytracer)
/// consumes that flag with [`Camera::take_changed()`] and restarts the image when it
/// was set.
#[derive(Clone, PartialEq)]
pub struct Camera {
    eye: FreePoint,
    forward: FreeVector,
    right: FreeVector,
    up: FreeVector,
    projection: Projection,
    viewport: ImageSize,
    changed: bool,
}

impl Camera {
    /// Creates a camera at the origin looking down the −Z axis with +Y up.
    pub fn new(projection: Projection, viewport: ImageSize) -> Self {
        Self {
            eye: FreePoint::origin(),
            forward: FreeVector::new(0., 0., -1.),
            right: FreeVector::new(1., 0., 0.),
            up: FreeVector::new(0., 1., 0.),
            projection,
            viewport,
            changed: true,
        }
    }

    /// Positions the camera at `eye` looking toward `target`.
    ///
    /// `up_hint` need not be perpendicular to the view direction. If it is parallel to
    /// it, some other perpendicular direction is chosen.
    pub fn look_at(
        &mut self,
        eye: impl Into<FreePoint>,
        target: impl Into<FreePoint>,
        up_hint: impl Into<FreeVector>,
    ) {
        let eye = eye.into();
        let forward = (target.into() - eye).normalize();
        if !forward.x.is_finite() || !forward.y.is_finite() || !forward.z.is_finite() {
            log::warn!("Camera::look_at() given coincident eye and target; ignoring");
            return;
        }
        let mut right = forward.cross(up_hint.into());
        if right.square_length() < FreeCoordinate::EPSILON {
            right = forward.cross(FreeVector::new(0., 1., 0.));
            if right.square_length() < FreeCoordinate::EPSILON {
                right = forward.cross(FreeVector::new(1., 0., 0.));
            }
        }
        let right = right.normalize();
        self.eye = eye;
        self.forward = forward;
        self.right = right;
        self.up = right.cross(forward);
        self.changed = true;
    }

    /// Changes the projection.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.changed = true;
    }

    /// Changes the window size.
    pub fn set_viewport(&mut self, viewport: ImageSize) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.changed = true;
        }
    }

    /// Returns whether the camera has changed since the last call, and clears the flag.
    pub fn take_changed(&mut self) -> bool {
        core::mem::replace(&mut self.changed, false)
    }

    /// Returns whether the camera has changed since the last [`Camera::take_changed()`].
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The eye position. For orthographic cameras, this is the center of the view plane.
    pub fn eye(&self) -> FreePoint {
        self.eye
    }

    /// Unit view direction.
    pub fn forward(&self) -> FreeVector {
        self.forward
    }

    /// Unit vector toward the right edge of the window.
    pub fn right(&self) -> FreeVector {
        self.right
    }

    /// Unit vector toward the top edge of the window.
    pub fn up(&self) -> FreeVector {
        self.up
    }

    /// The projection.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// The window size.
    pub fn viewport(&self) -> ImageSize {
        self.viewport
    }

    /// Returns the ray through `point` of the window.
    #[inline]
    pub fn make_ray(&self, point: WindowPoint) -> Ray {
        let width = self.viewport.width.max(1) as FreeCoordinate;
        let height = self.viewport.height.max(1) as FreeCoordinate;
        let aspect = width / height;
        let ndc_x = 2.0 * point.x / width - 1.0;
        let ndc_y = 1.0 - 2.0 * point.y / height;

        match self.projection {
            Projection::Perspective { fov_y } => {
                let tan_half = (fov_y * 0.5).tan();
                let direction = self.forward
                    + self.right * (ndc_x * tan_half * aspect)
                    + self.up * (ndc_y * tan_half);
                Ray::new(self.eye, direction.normalize())
            }
            Projection::Orthographic { view_height } => {
                let half = view_height * 0.5;
                let origin =
                    self.eye + self.right * (ndc_x * half * aspect) + self.up * (ndc_y * half);
                Ray::new(origin, self.forward)
            }
        }
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            eye,
            forward,
            right: _,
            up,
            projection,
            viewport,
            changed,
        } = self;
        f.debug_struct("Camera")
            .field("eye", eye)
            .field("forward", forward)
            .field("up", up)
            .field("projection", projection)
            .field("viewport", viewport)
            .field("changed", changed)
            .finish_non_exhaustive()
    }
}
