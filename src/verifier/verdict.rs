use crate::errors::AffinityError;
use std::fmt;

pub const EXIT_AFFINE: i32 = 0;
pub const EXIT_BROKEN: i32 = 1;
pub const EXIT_INCONCLUSIVE: i32 = 2;

/// Outcome of one session. Non-affine verdicts carry the error that decided them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Affine,
    Broken(AffinityError),
    Inconclusive(AffinityError),
}

impl Verdict {
    /// Routing failures break affinity; everything else leaves it undecided.
    pub fn from_error(error: AffinityError) -> Self {
        if error.is_routing_failure() {
            Verdict::Broken(error)
        } else {
            Verdict::Inconclusive(error)
        }
    }

    pub fn is_affine(&self) -> bool {
        matches!(self, Verdict::Affine)
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Verdict::Broken(_))
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Verdict::Inconclusive(_))
    }

    pub fn reason(&self) -> Option<&AffinityError> {
        match self {
            Verdict::Affine => None,
            Verdict::Broken(e) | Verdict::Inconclusive(e) => Some(e),
        }
    }

    /// Process exit code: success, failure, or indeterminate.
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Affine => EXIT_AFFINE,
            Verdict::Broken(_) => EXIT_BROKEN,
            Verdict::Inconclusive(_) => EXIT_INCONCLUSIVE,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Affine => f.write_str("AFFINE"),
            Verdict::Broken(e) => write!(f, "BROKEN({})", e.label()),
            Verdict::Inconclusive(e) => write!(f, "INCONCLUSIVE({})", e.label()),
        }
    }
}
