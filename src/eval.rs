//! Onset matching and detection scores.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::{Error, Result};

/// Default matching tolerance in seconds.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// True positive, false positive and false negative counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Outcome {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl Outcome {
    pub fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        Self { tp, fp, fn_ }
    }

    pub fn scores(&self) -> Scores {
        Scores::from(*self)
    }
}

impl Add for Outcome {
    type Output = Outcome;

    fn add(self, rhs: Outcome) -> Outcome {
        Outcome {
            tp: self.tp + rhs.tp,
            fp: self.fp + rhs.fp,
            fn_: self.fn_ + rhs.fn_,
        }
    }
}

impl AddAssign for Outcome {
    fn add_assign(&mut self, rhs: Outcome) {
        *self = *self + rhs;
    }
}

impl Sum for Outcome {
    fn sum<I: Iterator<Item = Outcome>>(iter: I) -> Self {
        iter.fold(Outcome::default(), Add::add)
    }
}

impl<'a> Sum<&'a Outcome> for Outcome {
    fn sum<I: Iterator<Item = &'a Outcome>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TP={}, FP={}, FN={}", self.tp, self.fp, self.fn_)
    }
}

/// Precision, recall and F-measure. A ratio with a zero denominator is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

impl From<Outcome> for Scores {
    fn from(o: Outcome) -> Self {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        Scores {
            precision: ratio(o.tp, o.tp + o.fp),
            recall: ratio(o.tp, o.tp + o.fn_),
            f_measure: ratio(2 * o.tp, 2 * o.tp + o.fp + o.fn_),
        }
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision = {:.4}, recall = {:.4}, F-measure = {:.4}",
            self.precision, self.recall, self.f_measure
        )
    }
}

fn check_sorted(which: &'static str, onsets: &[f64]) -> Result<()> {
    match onsets.windows(2).position(|w| !(w[0] <= w[1])) {
        Some(i) => Err(Error::UnsortedOnsets {
            which,
            index: i + 1,
        }),
        None => Ok(()),
    }
}

/// Greedily match estimated onsets to reference onsets, both in seconds.
///
/// For each reference onset in order, the estimate cursor moves forward while
/// the next estimate is strictly closer, charging a false positive for every
/// estimate it skips. The estimate under the cursor is a true positive if it
/// lies within `tolerance` (inclusive) and is then consumed; otherwise the
/// reference onset is a false negative. Once the estimates run out the
/// remaining reference onsets are false negatives. Estimates left behind the
/// cursor after the last reference onset are false positives, except the one
/// under the cursor itself.
///
/// # Example
/// ```
/// use rattle::eval::{Outcome, match_onsets};
///
/// let outcome = match_onsets(&[1.0, 2.0, 3.0], &[1.02, 2.9, 5.0], 0.05).unwrap();
/// assert_eq!(outcome, Outcome::new(1, 1, 2));
/// ```
pub fn match_onsets(reference: &[f64], estimated: &[f64], tolerance: f64) -> Result<Outcome> {
    check_sorted("reference", reference)?;
    check_sorted("estimated", estimated)?;

    let mut outcome = Outcome::default();
    let mut cursor = 0;
    for (i, &onset) in reference.iter().enumerate() {
        if cursor >= estimated.len() {
            outcome.fn_ += reference.len() - i;
            break;
        }
        let mut distance = (onset - estimated[cursor]).abs();
        while cursor + 1 < estimated.len() && (onset - estimated[cursor + 1]).abs() < distance {
            outcome.fp += 1;
            cursor += 1;
            distance = (onset - estimated[cursor]).abs();
        }
        if distance <= tolerance {
            outcome.tp += 1;
            cursor += 1;
        } else {
            outcome.fn_ += 1;
        }
    }
    if cursor + 1 < estimated.len() {
        outcome.fp += estimated.len() - cursor - 1;
    }
    Ok(outcome)
}
