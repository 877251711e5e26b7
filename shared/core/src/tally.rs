use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Count of correct answers out of a number of graded questions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    correct: usize,
    total: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// `correct / total`, or `None` when nothing has been graded.
    pub fn accuracy(&self) -> Option<f64> {
        match self.total {
            0 => None,
            total => Some(self.correct as f64 / total as f64),
        }
    }
}

impl FromIterator<bool> for Tally {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut tally = Tally::new();
        for correct in iter {
            tally.record(correct);
        }
        tally
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Self) -> Self::Output {
        Tally {
            correct: self.correct + rhs.correct,
            total: self.total + rhs.total,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Tally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Tally::new(), |acc, x| acc + x)
    }
}
