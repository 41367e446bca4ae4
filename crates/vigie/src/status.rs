use serde::{Deserialize, Serialize};

/// Execution outcome of a TestStep, TestCase or TestSuite.
///
/// Comparison between statuses always goes through [`Status::severity`],
/// never through the declaration order: the storage representation and the
/// ranking are deliberately decoupled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    NotDefined,
    Success,
    Failure,
    AssertFailure,
    Timeout,
    Error,
}

impl Status {
    /// Severity rank, higher is worse:
    /// `Success < AssertFailure < Failure < Timeout < Error`.
    ///
    /// `NotDefined` ranks below `Success` so a step that has never run
    /// can never drag an aggregate down.
    pub fn severity(self) -> u8 {
        match self {
            Status::NotDefined => 0,
            Status::Success => 1,
            Status::AssertFailure => 2,
            Status::Failure => 3,
            Status::Timeout => 4,
            Status::Error => 5,
        }
    }

    /// The worse of two statuses under [`Status::severity`].
    pub fn worse_of(self, other: Status) -> Status {
        if other.severity() > self.severity() { other } else { self }
    }

    /// Fold per-outcome statuses into the ranked worst case.
    ///
    /// `Error` short-circuits the scan: nothing outranks it. An empty
    /// iterator yields `NotDefined`.
    pub fn worst(statuses: impl IntoIterator<Item = Status>) -> Status {
        let mut current = Status::NotDefined;
        for status in statuses {
            if status == Status::Error {
                return Status::Error;
            }
            current = current.worse_of(status);
        }
        current
    }

    /// True for statuses that do not count against a parent aggregate.
    pub fn is_healthy(self) -> bool {
        matches!(self, Status::Success | Status::NotDefined)
    }

    /// Binary roll-up for TestCase and TestSuite: any unhealthy child
    /// makes the parent `Failure`, otherwise `Success`. Parents record
    /// *that* a child failed, not why.
    pub fn rollup(children: impl IntoIterator<Item = Status>) -> Status {
        for child in children {
            if !child.is_healthy() {
                return Status::Failure;
            }
        }
        Status::Success
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::NotDefined
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::NotDefined => write!(f, "notdefined"),
            Status::Success => write!(f, "success"),
            Status::Failure => write!(f, "failure"),
            Status::AssertFailure => write!(f, "assertfailure"),
            Status::Timeout => write!(f, "timeout"),
            Status::Error => write!(f, "error"),
        }
    }
}
