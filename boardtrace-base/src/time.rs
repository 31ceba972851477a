use core::fmt;
use core::ops;

// -------------------------------------------------------------------------------------------------

#[doc(no_inline)]
pub use core::time::Duration;
#[doc(no_inline)]
pub use web_time::Instant;

// -------------------------------------------------------------------------------------------------

/// A request regarding how much real time should be spent on a computation.
#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Deadline {
    /// Stop immediately after the minimum necessary activities.
    ///
    /// Arithmetically, this is “negative infinity”; it is less than all finite deadlines.
    Asap,
    /// Stop as close to the given time (before or after) as is feasible.
    At(Instant),
    /// Don't stop until all the work is done.
    ///
    /// This choice is appropriate when deterministic results are desired.
    ///
    /// Arithmetically, this is “positive infinity”; it is greater than all finite deadlines.
    Whenever,
}

impl Deadline {
    /// Returns whether the deadline has passed at time `now`.
    ///
    /// [`Deadline::Asap`] is always past and [`Deadline::Whenever`] never is.
    #[inline]
    pub fn is_past(&self, now: Instant) -> bool {
        match *self {
            Deadline::Asap => true,
            Deadline::At(deadline) => deadline <= now,
            Deadline::Whenever => false,
        }
    }

    /// Returns the deadline `duration` after `now`.
    #[inline]
    pub fn after(now: Instant, duration: Duration) -> Self {
        Deadline::At(now + duration)
    }
}

// -------------------------------------------------------------------------------------------------

/// Summary of the time taken by a set of events, such as the timeslices of a render pass.
///
/// It may be created by [`TimeStats::default()`] (empty), or [`TimeStats::one()`] (single event),
/// and multiple events may be aggregated using the `+=` operator.
/// It may be formatted for reading using the [`fmt::Display`] implementation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions)]
pub struct TimeStats {
    /// The number of events aggregated into this [`TimeStats`].
    pub count: usize,
    /// The sum of the durations of all events.
    pub sum: Duration,
    /// The minimum duration of all events, or [`None`] if there were no events.
    pub min: Option<Duration>,
    /// The maximum duration of all events, or [`Duration::ZERO`] if there were no events.
    pub max: Duration,
}

impl TimeStats {
    /// Constructs a [`TimeStats`] for a single event.
    ///
    /// Multiple of these may then be aggregated using the `+=` operator.
    #[inline]
    pub const fn one(duration: Duration) -> Self {
        Self {
            count: 1,
            sum: duration,
            min: Some(duration),
            max: duration,
        }
    }
}

impl ops::AddAssign for TimeStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = TimeStats {
            count: self.count + rhs.count,
            sum: self.sum + rhs.sum,
            min: self.min.map_or(rhs.min, |value| Some(value.min(rhs.min?))),
            max: self.max.max(rhs.max),
        };
    }
}

impl fmt::Display for TimeStats {
    #[allow(clippy::missing_inline_in_public_items)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            count,
            sum,
            min,
            max,
        } = *self;
        let max = max.as_secs_f32();
        let sum = sum.as_secs_f32();
        match min {
            None => write!(f, "(------ .. {max:.3}s) for {count:3}, total {sum:.3}s"),
            Some(min) => {
                let min = min.as_secs_f32();
                write!(f, "({min:.3}s .. {max:.3}s) for {count:3}, total {sum:.3}s")
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deadline_ordering() {
        let i = Instant::now();
        let mut deadlines = [
            Deadline::At(i + Duration::from_secs(1)),
            Deadline::Asap,
            Deadline::Whenever,
            Deadline::At(i),
        ];
        deadlines.sort();
        assert_eq!(
            deadlines,
            [
                Deadline::Asap,
                Deadline::At(i),
                Deadline::At(i + Duration::from_secs(1)),
                Deadline::Whenever,
            ]
        );
    }

    #[test]
    fn deadline_is_past() {
        let i = Instant::now();
        assert!(Deadline::Asap.is_past(i));
        assert!(!Deadline::Whenever.is_past(i));
        assert!(Deadline::At(i).is_past(i));
        assert!(!Deadline::At(i + Duration::from_secs(5)).is_past(i));
    }

    #[test]
    fn time_stats_aggregate_and_display() {
        let mut stats = TimeStats::default();
        assert_eq!(
            stats.to_string(),
            "(------ .. 0.000s) for   0, total 0.000s"
        );
        stats += TimeStats::one(Duration::from_millis(250));
        stats += TimeStats::one(Duration::from_millis(100));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Some(Duration::from_millis(100)));
        assert_eq!(
            stats.to_string(),
            "(0.100s .. 0.250s) for   2, total 0.350s"
        );
    }
}
