use core::fmt;

bitflags::bitflags! {
    /// Deficiencies of a rendering.
    ///
    /// This type describes the ways in which a rendered image could fail to accurately
    /// represent the scene, or fail to comply with the requested [`RenderOptions`].
    ///
    /// It is a [`bitflags`] generated bit-flag type. *Note: We make no guarantees that
    /// the numeric value of flags will stay the same across versions*; please treat this
    /// as a set of named values only.
    ///
    /// The [empty](Self::empty) set means no flaws are present.
    ///
    /// [`RenderOptions`]: crate::RenderOptions
    #[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flaws: u16 {
        /// The rendering is incomplete because not every block has been traced yet,
        /// or post-processing has not yet run.
        const UNFINISHED = 1 << 0;

        /// The image is a fast preview interpolated from a sparse grid of samples.
        const PREVIEW = 1 << 1;

        /// Antialiasing has not been used,
        /// despite being requested by the render options.
        const NO_ANTIALIASING = 1 << 2;

        /// Ambient occlusion and blur have not been applied,
        /// despite being requested by the render options.
        const NO_POST_PROCESSING = 1 << 3;
    }
}

impl Default for Flaws {
    /// Equivalent to [`Self::empty()`].
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Flaws {
    /// Displays the flags as text like “`UNFINISHED | PREVIEW`".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Flaws::default().to_string(), "");

        assert_eq!(Flaws::UNFINISHED.to_string(), "UNFINISHED");
        assert_eq!(
            (Flaws::UNFINISHED | Flaws::NO_POST_PROCESSING).to_string(),
            "UNFINISHED | NO_POST_PROCESSING"
        );
    }
}
