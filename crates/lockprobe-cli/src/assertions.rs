use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
}

impl Relation {
    fn describe(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not equal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedExpectation {
    pub label: String,
    pub relation: Relation,
    pub left: String,
    pub right: String,
}

impl fmt::Display for FailedExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, left = {}, right = {}",
            self.label,
            self.relation.describe(),
            self.left,
            self.right
        )
    }
}

/// Every expectation that did not hold in one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub scenario: String,
    pub evaluated: usize,
    pub failures: Vec<FailedExpectation>,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} expectations failed in {}",
            self.failures.len(),
            self.evaluated,
            self.scenario
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

/// Collects expectation results instead of stopping at the first mismatch.
#[derive(Debug, Default)]
pub struct Checks {
    evaluated: usize,
    failures: Vec<FailedExpectation>,
}

impl Checks {
    pub fn equal<T>(&mut self, label: impl Into<String>, left: &T, right: &T)
    where
        T: PartialEq + fmt::Debug + ?Sized,
    {
        self.record(label.into(), Relation::Equal, left, right, left == right);
    }

    pub fn not_equal<T>(&mut self, label: impl Into<String>, left: &T, right: &T)
    where
        T: PartialEq + fmt::Debug + ?Sized,
    {
        self.record(label.into(), Relation::NotEqual, left, right, left != right);
    }

    /// Number of passed expectations, or all mismatches.
    pub fn finish(self, scenario: &str) -> Result<usize, AssertionFailure> {
        if self.failures.is_empty() {
            return Ok(self.evaluated);
        }
        Err(AssertionFailure {
            scenario: scenario.to_string(),
            evaluated: self.evaluated,
            failures: self.failures,
        })
    }

    fn record<T>(&mut self, label: String, relation: Relation, left: &T, right: &T, held: bool)
    where
        T: fmt::Debug + ?Sized,
    {
        self.evaluated += 1;
        if !held {
            self.failures.push(FailedExpectation {
                label,
                relation,
                left: format!("{left:?}"),
                right: format!("{right:?}"),
            });
        }
    }
}
