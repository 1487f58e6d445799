//! Valid-range normalization.
//!
//! Declared valid values and ranges arrive as an unordered list of intervals, each tagged with
//! the version window it applies to. [`merge`] sorts them by window and value, folds adjacent or
//! overlapping intervals sharing a window and returns the minimal covering set ordered by value.
//!
//! Integer bounds keep their signedness so that `u64::MAX` never compares as `-1`. Float bounds
//! order NaN after everything, and infinite or NaN bounds are never folded into a neighbour.

use std::cmp::Ordering;
use std::fmt;

use crate::common::NOT_YET_DEPRECATED;

/// A range bound: signed or unsigned 64-bit integer, or a float.
#[derive(Debug, Clone, Copy)]
pub enum NumericOrFp {
    Signed(i64),
    Unsigned(u64),
    Fp(f64),
}

impl NumericOrFp {
    fn as_i128(self) -> Option<i128> {
        match self {
            NumericOrFp::Signed(v) => Some(i128::from(v)),
            NumericOrFp::Unsigned(v) => Some(i128::from(v)),
            NumericOrFp::Fp(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            NumericOrFp::Signed(v) => v as f64,
            NumericOrFp::Unsigned(v) => v as f64,
            NumericOrFp::Fp(v) => v,
        }
    }

    /// NaN or an infinity.
    pub fn is_special(self) -> bool {
        match self {
            NumericOrFp::Fp(v) => !v.is_finite(),
            _ => false,
        }
    }
}

fn fp_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl Ord for NumericOrFp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_i128(), other.as_i128()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => fp_cmp(self.as_f64(), other.as_f64()),
        }
    }
}

impl PartialOrd for NumericOrFp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NumericOrFp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumericOrFp {}

impl fmt::Display for NumericOrFp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericOrFp::Signed(v) => write!(f, "{}", v),
            NumericOrFp::Unsigned(v) => write!(f, "{}", v),
            NumericOrFp::Fp(v) => write!(f, "{}", v),
        }
    }
}

/// Inclusive `[min, max]` interval active during `[since_version, deprecated_since)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeInterval {
    pub min: NumericOrFp,
    pub max: NumericOrFp,
    pub since_version: u32,
    pub deprecated_since: u32,
    merged_away: bool,
}

impl RangeInterval {
    pub fn new(min: NumericOrFp, max: NumericOrFp) -> Self {
        RangeInterval {
            min,
            max,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            merged_away: false,
        }
    }

    pub fn value(v: NumericOrFp) -> Self {
        Self::new(v, v)
    }

    pub fn with_versions(mut self, since_version: u32, deprecated_since: u32) -> Self {
        self.since_version = since_version;
        self.deprecated_since = deprecated_since;
        self
    }

    pub fn contains_value(&self, v: NumericOrFp) -> bool {
        self.min <= v && v <= self.max
    }

    pub fn active_at(&self, version: u32) -> bool {
        self.since_version <= version && version < self.deprecated_since
    }

    fn same_window(&self, other: &Self) -> bool {
        self.since_version == other.since_version && self.deprecated_since == other.deprecated_since
    }
}

/// How adjacent intervals may be folded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// `a.max + 1 >= b.min` merges.
    Integral,
    /// Only overlapping finite bounds merge.
    FloatingPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub mode: MergeMode,
    /// When false every interval is treated as valid in all versions.
    pub version_aware: bool,
}

impl MergePolicy {
    pub fn integral(version_aware: bool) -> Self {
        MergePolicy {
            mode: MergeMode::Integral,
            version_aware,
        }
    }

    pub fn floating_point() -> Self {
        MergePolicy {
            mode: MergeMode::FloatingPoint,
            version_aware: true,
        }
    }
}

fn can_merge(mode: MergeMode, prev: &RangeInterval, next: &RangeInterval) -> bool {
    match mode {
        MergeMode::Integral => match (prev.max.as_i128(), next.min.as_i128()) {
            (Some(max), Some(min)) => min <= max + 1,
            _ => next.min <= prev.max,
        },
        MergeMode::FloatingPoint => {
            if prev.max.is_special() || next.min.is_special() {
                return false;
            }
            next.min <= prev.max
        }
    }
}

/// Normalize `ranges` into the minimal covering set, ordered by `(min, max)`.
pub fn merge(mut ranges: Vec<RangeInterval>, policy: MergePolicy) -> ValidRanges {
    if !policy.version_aware {
        for r in ranges.iter_mut() {
            r.since_version = 0;
            r.deprecated_since = NOT_YET_DEPRECATED;
        }
    }
    for r in ranges.iter_mut() {
        r.merged_away = false;
        if r.max < r.min {
            std::mem::swap(&mut r.min, &mut r.max);
        }
    }

    ranges.sort_by(|a, b| {
        a.since_version
            .cmp(&b.since_version)
            .then(a.deprecated_since.cmp(&b.deprecated_since))
            .then(a.min.cmp(&b.min))
            .then(a.max.cmp(&b.max))
    });

    for i in 0..ranges.len() {
        if ranges[i].merged_away {
            continue;
        }
        for j in (i + 1)..ranges.len() {
            if !ranges[i].same_window(&ranges[j]) || !can_merge(policy.mode, &ranges[i], &ranges[j]) {
                break;
            }
            let next_max = ranges[j].max;
            if ranges[i].max < next_max {
                ranges[i].max = next_max;
            }
            ranges[j].merged_away = true;
        }
    }

    ranges.retain(|r| !r.merged_away);
    ranges.sort_by(|a, b| {
        a.min
            .cmp(&b.min)
            .then(a.max.cmp(&b.max))
            .then(a.since_version.cmp(&b.since_version))
            .then(a.deprecated_since.cmp(&b.deprecated_since))
    });
    ValidRanges { intervals: ranges }
}

/// Whether two finite intervals of the same version window share more than a boundary point.
pub fn has_intersecting(ranges: &[RangeInterval]) -> bool {
    let finite: Vec<&RangeInterval> = ranges
        .iter()
        .filter(|r| !r.min.is_special() && !r.max.is_special())
        .collect();
    finite.iter().enumerate().any(|(i, a)| {
        finite[i + 1..].iter().any(|b| {
            let (lo_a, hi_a) = (a.min.min(a.max), a.min.max(a.max));
            let (lo_b, hi_b) = (b.min.min(b.max), b.min.max(b.max));
            a.same_window(b) && lo_a < hi_b && lo_b < hi_a
        })
    })
}

/// Merged intervals ordered by `(min, max)` for lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidRanges {
    intervals: Vec<RangeInterval>,
}

impl ValidRanges {
    pub fn intervals(&self) -> &[RangeInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether `value` is valid, optionally restricted to intervals active at `version`.
    pub fn contains(&self, value: NumericOrFp, version: Option<u32>) -> bool {
        let end = self.intervals.partition_point(|r| r.min <= value);
        self.intervals[..end]
            .iter()
            .rev()
            .any(|r| value <= r.max && version.map_or(true, |v| r.active_at(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: i64) -> NumericOrFp {
        NumericOrFp::Signed(v)
    }

    #[test]
    fn adjacent_integers_merge() {
        let merged = merge(
            vec![
                RangeInterval::new(s(5), s(7)),
                RangeInterval::value(s(0)),
                RangeInterval::new(s(1), s(4)),
                RangeInterval::value(s(10)),
            ],
            MergePolicy::integral(false),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.intervals()[0].min, s(0));
        assert_eq!(merged.intervals()[0].max, s(7));
        assert_eq!(merged.intervals()[1].min, s(10));
    }

    #[test]
    fn unsigned_extremes_do_not_overflow() {
        let merged = merge(
            vec![
                RangeInterval::value(NumericOrFp::Unsigned(u64::MAX)),
                RangeInterval::value(NumericOrFp::Unsigned(u64::MAX - 1)),
            ],
            MergePolicy::integral(false),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.intervals()[0].max, NumericOrFp::Unsigned(u64::MAX));
    }

    #[test]
    fn float_specials_never_merge() {
        let merged = merge(
            vec![
                RangeInterval::new(NumericOrFp::Fp(0.0), NumericOrFp::Fp(1.0)),
                RangeInterval::new(NumericOrFp::Fp(0.5), NumericOrFp::Fp(f64::INFINITY)),
                RangeInterval::value(NumericOrFp::Fp(f64::INFINITY)),
                RangeInterval::value(NumericOrFp::Fp(f64::NAN)),
            ],
            MergePolicy::floating_point(),
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.intervals()[0].max, NumericOrFp::Fp(f64::INFINITY));
        assert!(merged.intervals()[2].min.as_f64().is_nan());
    }

    #[test]
    fn intersecting_finite_ranges() {
        let fp = NumericOrFp::Fp;
        assert!(has_intersecting(&[
            RangeInterval::new(fp(0.0), fp(2.0)),
            RangeInterval::new(fp(1.0), fp(3.0)),
        ]));
        assert!(!has_intersecting(&[
            RangeInterval::new(fp(0.0), fp(1.0)),
            RangeInterval::new(fp(1.0), fp(3.0)),
        ]));
        assert!(!has_intersecting(&[
            RangeInterval::new(fp(0.0), fp(2.0)),
            RangeInterval::new(fp(1.0), fp(3.0)).with_versions(2, NOT_YET_DEPRECATED),
        ]));
        assert!(!has_intersecting(&[
            RangeInterval::value(fp(f64::NAN)),
            RangeInterval::value(fp(f64::NAN)),
        ]));
    }

    #[test]
    fn floats_merge_only_on_overlap() {
        let merged = merge(
            vec![
                RangeInterval::new(NumericOrFp::Fp(0.0), NumericOrFp::Fp(1.0)),
                RangeInterval::new(NumericOrFp::Fp(1.5), NumericOrFp::Fp(2.0)),
            ],
            MergePolicy::floating_point(),
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn nan_sorts_last() {
        assert!(NumericOrFp::Fp(f64::NAN) > NumericOrFp::Fp(f64::INFINITY));
        assert!(NumericOrFp::Fp(f64::NEG_INFINITY) < NumericOrFp::Fp(-1e300));
        assert_eq!(NumericOrFp::Fp(f64::NAN), NumericOrFp::Fp(f64::NAN));
    }

    #[test]
    fn lookup_honours_windows() {
        let merged = merge(
            vec![RangeInterval::new(s(0), s(3)).with_versions(2, 5)],
            MergePolicy::integral(true),
        );
        assert!(merged.contains(s(1), None));
        assert!(!merged.contains(s(1), Some(1)));
        assert!(merged.contains(s(1), Some(4)));
        assert!(!merged.contains(s(1), Some(5)));
        assert!(!merged.contains(s(4), None));
    }
}
