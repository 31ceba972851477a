use crate::math::FreeVector;

/// The sign of one component of a ray direction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(test, derive(exhaust::Exhaust))]
#[expect(clippy::exhaustive_enums)]
pub enum AxisSign {
    /// The ray moves toward negative coordinates on this axis.
    Minus = 0,
    /// The ray does not move along this axis (the component is zero).
    Zero = 1,
    /// The ray moves toward positive coordinates on this axis.
    Plus = 2,
}

impl AxisSign {
    /// Classifies a single direction component. Both zeroes (and NaN) are [`AxisSign::Zero`].
    #[inline]
    pub fn of(component: f32) -> Self {
        if component > 0.0 {
            Self::Plus
        } else if component < 0.0 {
            Self::Minus
        } else {
            Self::Zero
        }
    }

    const fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Minus,
            1 => Self::Zero,
            _ => Self::Plus,
        }
    }
}

/// Classification of a ray direction by the sign of each of its components, used to
/// select the code path of the slope-based box test.
///
/// Each variant is named by three letters giving the X, Y, and Z signs in order:
/// `M` for negative, `O` for zero, and `P` for positive.
/// There are 27 variants; `OOO` is the degenerate zero direction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(clippy::exhaustive_enums)]
#[allow(clippy::upper_case_acronyms, missing_docs)]
#[repr(u8)]
#[rustfmt::skip]
pub enum RayClassification {
    MMM, MMO, MMP, MOM, MOO, MOP, MPM, MPO, MPP,
    OMM, OMO, OMP, OOM, OOO, OOP, OPM, OPO, OPP,
    PMM, PMO, PMP, POM, POO, POP, PPM, PPO, PPP,
}

impl RayClassification {
    /// All classifications, ordered so that the index is `9 * x + 3 * y + z` for
    /// [`AxisSign`] discriminants `x`, `y`, `z`.
    pub const ALL: [Self; 27] = {
        use RayClassification::*;
        [
            MMM, MMO, MMP, MOM, MOO, MOP, MPM, MPO, MPP, //
            OMM, OMO, OMP, OOM, OOO, OOP, OPM, OPO, OPP, //
            PMM, PMO, PMP, POM, POO, POP, PPM, PPO, PPP,
        ]
    };

    /// Classifies a direction vector.
    #[inline]
    pub fn of(direction: FreeVector) -> Self {
        Self::from_signs([
            AxisSign::of(direction.x),
            AxisSign::of(direction.y),
            AxisSign::of(direction.z),
        ])
    }

    /// Returns the classification with the given per-axis signs.
    #[inline]
    pub const fn from_signs(signs: [AxisSign; 3]) -> Self {
        Self::ALL[signs[0] as usize * 9 + signs[1] as usize * 3 + signs[2] as usize]
    }

    /// Returns the per-axis signs, X first.
    #[inline]
    pub const fn signs(self) -> [AxisSign; 3] {
        let index = self as u8;
        [
            AxisSign::from_index(index / 9),
            AxisSign::from_index((index / 3) % 3),
            AxisSign::from_index(index % 3),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhaust::Exhaust as _;
    use std::collections::HashSet;

    fn component(sign: AxisSign) -> f32 {
        match sign {
            AxisSign::Minus => -0.5,
            AxisSign::Zero => 0.0,
            AxisSign::Plus => 0.25,
        }
    }

    #[test]
    fn all_table_matches_discriminants() {
        for (index, classification) in RayClassification::ALL.into_iter().enumerate() {
            assert_eq!(classification as usize, index);
        }
    }

    /// Every sign pattern gets exactly one label, all labels are distinct, and the label
    /// depends only on the sign pattern.
    #[test]
    fn classification_is_a_bijection_of_sign_patterns() {
        let mut seen = HashSet::new();
        for (x, y, z) in <(AxisSign, AxisSign, AxisSign)>::exhaust() {
            let direction = FreeVector::new(component(x), component(y), component(z));
            let classification = RayClassification::of(direction);
            assert_eq!(classification.signs(), [x, y, z]);
            assert_eq!(RayClassification::of(direction), classification);
            // Magnitude does not matter, only sign.
            assert_eq!(RayClassification::of(direction * 7.0), classification);
            assert!(seen.insert(classification), "duplicate {classification:?}");
        }
        assert_eq!(seen.len(), 27);
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(
            RayClassification::of(FreeVector::new(-0.0, 0.0, -1.0)),
            RayClassification::OOM
        );
    }
}
